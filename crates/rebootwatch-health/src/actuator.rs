//! Remediation actuator: power-cycles one device's PoE port.

use std::sync::Arc;
use std::time::Duration;

use tracing::{info, warn};

use rebootwatch_core::PowerState;
use rebootwatch_state::DeviceState;

use crate::contracts::{PowerControl, PowerError};

/// Issues the off → settle → on sequence for devices the governor cleared.
pub struct RemediationActuator {
    power: Arc<dyn PowerControl>,
    settle_delay: Duration,
}

impl RemediationActuator {
    pub fn new(power: Arc<dyn PowerControl>, settle_delay: Duration) -> Self {
        Self {
            power,
            settle_delay,
        }
    }

    /// Power-cycle `device` and count the attempt.
    ///
    /// `reboot_count` is bumped before any command goes out: it counts
    /// attempts, since nothing confirms a reboot other than the next
    /// sweep's freshness result. The power-on command is sent even when
    /// power-off failed so a half-applied cycle never leaves a port dark;
    /// the first error is returned.
    pub async fn power_cycle(&self, device: &mut DeviceState) -> Result<(), PowerError> {
        device.reboot_count += 1;
        let handle = &device.vendor_handle;

        info!(device = %device.name, %handle, attempt = device.reboot_count, "shutting down device");
        let off = self.power.set_power_state(handle, PowerState::Off).await;
        if let Err(ref e) = off {
            warn!(device = %device.name, error = %e, "power off failed");
        }

        tokio::time::sleep(self.settle_delay).await;

        info!(device = %device.name, %handle, "booting up device");
        let on = self.power.set_power_state(handle, PowerState::On).await;
        if let Err(ref e) = on {
            warn!(device = %device.name, error = %e, "power on failed");
        }

        off.and(on)
    }
}
