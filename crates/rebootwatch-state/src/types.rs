//! Runtime state tracked per device and per process.

use rebootwatch_core::{AlertId, DeviceName, VendorHandle};

/// `last_reboot_at` value meaning "never rebooted".
pub const NEVER: i64 = 0;

/// Mutable remediation state of one configured device.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeviceState {
    pub name: DeviceName,
    pub vendor_handle: VendorHandle,
    /// Remediations issued since the device was last seen online.
    pub reboot_count: u32,
    /// Unix seconds of the last issued remediation, [`NEVER`] if none.
    pub last_reboot_at: i64,
    /// Notification currently open for this device.
    pub active_alert: Option<AlertId>,
}

impl DeviceState {
    pub fn new(name: impl Into<DeviceName>, vendor_handle: VendorHandle) -> Self {
        Self {
            name: name.into(),
            vendor_handle,
            reboot_count: 0,
            last_reboot_at: NEVER,
            active_alert: None,
        }
    }

    /// Whether the device is in the alerted state (at least one
    /// remediation since it was last online).
    pub fn is_alerted(&self) -> bool {
        self.reboot_count != 0
    }

    pub fn never_rebooted(&self) -> bool {
        self.last_reboot_at == NEVER
    }
}

/// Process-wide upstream ban flag.
///
/// Only edges matter: the flag exists so a ban is announced once per
/// contiguous banned episode.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BanState {
    pub banned: bool,
}
