//! Domain types shared by every rebootwatch crate.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Unique name of a monitored device (key into the device registry).
pub type DeviceName = String;

/// Identifier of a management endpoint.
pub type ServerId = String;

/// Opaque handle of an open notification, as returned by the channel.
pub type AlertId = String;

/// Operating mode reported for devices that are parked on purpose.
pub const IDLE_MODE: &str = "Idle";

/// Vendor address used to reach a device's power controller.
///
/// Only the power control transport interprets it (for SNMP: the PoE port
/// index appended to the admin-enable OID).
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct VendorHandle(String);

impl VendorHandle {
    pub fn new(handle: impl Into<String>) -> Self {
        Self(handle.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for VendorHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// HTTP basic-auth credentials for a management endpoint.
#[derive(Clone, PartialEq, Eq)]
pub struct Credentials {
    pub user: String,
    pub password: String,
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("user", &self.user)
            .field("password", &"<redacted>")
            .finish()
    }
}

/// A management endpoint that reports the status of its devices.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServerSpec {
    pub id: ServerId,
    /// Base URL, without the trailing `/get_status`.
    pub endpoint: String,
    pub credentials: Option<Credentials>,
}

/// Target state of a PoE port.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PowerState {
    Off,
    On,
}

impl fmt::Display for PowerState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PowerState::Off => f.write_str("off"),
            PowerState::On => f.write_str("on"),
        }
    }
}

/// One device entry from a server's status listing.
///
/// Ephemeral: built per poll and dropped once evaluated.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeviceReport {
    pub name: DeviceName,
    /// Unix seconds of the last useful data; `None` if nothing ever arrived.
    pub last_report_at: Option<i64>,
    /// Interval the device sleeps between reports, in seconds.
    pub sleep_interval_secs: i64,
    pub mode: Option<String>,
}

impl DeviceReport {
    /// Devices in the idle mode are parked and exempt from evaluation.
    pub fn is_idle(&self) -> bool {
        self.mode.as_deref() == Some(IDLE_MODE)
    }
}
