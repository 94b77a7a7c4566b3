//! Reboot cooldown governor.
//!
//! Permits at most one remediation per device per cooldown window. The
//! decision and the timestamp update happen together, so a device reported
//! stale twice within one sweep (e.g. by two servers) is rebooted once.

use tracing::info;

use rebootwatch_state::DeviceState;

#[derive(Debug, Clone, Copy)]
pub struct CooldownGovernor {
    cooldown_secs: i64,
}

impl CooldownGovernor {
    /// Create a governor with a cooldown window of `cooldown_minutes`.
    pub fn new(cooldown_minutes: u32) -> Self {
        Self {
            cooldown_secs: i64::from(cooldown_minutes) * 60,
        }
    }

    pub fn cooldown_secs(&self) -> i64 {
        self.cooldown_secs
    }

    /// Whether a remediation would be permitted at `now`, without claiming it.
    pub fn is_eligible(&self, device: &DeviceState, now: i64) -> bool {
        device.never_rebooted() || now - device.last_reboot_at >= self.cooldown_secs
    }

    /// Seconds until the device becomes eligible again (0 if eligible).
    pub fn remaining_secs(&self, device: &DeviceState, now: i64) -> i64 {
        if device.never_rebooted() {
            return 0;
        }
        (device.last_reboot_at + self.cooldown_secs - now).max(0)
    }

    /// Check-and-set: if a remediation is permitted, stamp
    /// `last_reboot_at = now` and return `true`.
    pub fn try_acquire(&self, device: &mut DeviceState, now: i64) -> bool {
        if !self.is_eligible(device, now) {
            info!(
                device = %device.name,
                remaining_secs = self.remaining_secs(device, now),
                "device was rebooted in the recent past, skipping for now"
            );
            return false;
        }
        device.last_reboot_at = now;
        true
    }
}
