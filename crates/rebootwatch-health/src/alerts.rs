//! Alert lifecycle — one notification per troubled device.
//!
//! ```text
//!            stale + permitted (create)
//!   CLEAR ───────────────────────────────► ALERTED ──┐
//!     ▲                                       │      │ stale + permitted
//!     │          online (edit to resolved)    │      │ (edit in place,
//!     └───────────────────────────────────────┘ ◄────┘  recreate if gone)
//! ```
//!
//! CLEAR is `reboot_count == 0` with no alert handle, ALERTED is
//! `reboot_count >= 1`. Channel failures are logged and never roll back
//! the device's count or cooldown stamp.

use std::sync::Arc;

use tracing::{debug, info, warn};

use rebootwatch_state::DeviceState;

use crate::contracts::{AlertContent, AlertStatus, Notifier, NotifyError};

/// What [`AlertLifecycle`] did for a device.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AlertTransition {
    /// CLEAR → ALERTED, a new alert was posted.
    Opened,
    /// ALERTED → ALERTED, the open alert now shows the new count.
    Refreshed,
    /// ALERTED → CLEAR, the alert was edited to its resolved form.
    Resolved,
    /// Nothing to do (steady state, or the channel call failed).
    Unchanged,
}

pub struct AlertLifecycle {
    notifier: Arc<dyn Notifier>,
    stale_after_minutes: u32,
}

impl AlertLifecycle {
    pub fn new(notifier: Arc<dyn Notifier>, stale_after_minutes: u32) -> Self {
        Self {
            notifier,
            stale_after_minutes,
        }
    }

    /// Open or refresh the alert after a remediation was issued.
    ///
    /// Expects `reboot_count` to already include the new attempt.
    pub async fn on_remediated(&self, device: &mut DeviceState, now: i64) -> AlertTransition {
        let content = self.stale_content(device, now);

        if let Some(id) = device.active_alert.clone() {
            match self.notifier.update_alert(&id, &content).await {
                Ok(()) => {
                    debug!(device = %device.name, alert = %id, count = device.reboot_count, "alert refreshed");
                    return AlertTransition::Refreshed;
                }
                Err(NotifyError::NotFound(_)) => {
                    // Someone removed the message; post a fresh one so the
                    // device keeps exactly one visible alert.
                    info!(device = %device.name, alert = %id, "open alert vanished, recreating");
                    device.active_alert = None;
                }
                Err(e) => {
                    warn!(device = %device.name, alert = %id, error = %e, "failed to refresh alert");
                    return AlertTransition::Unchanged;
                }
            }
        }

        match self.notifier.create_alert(&content).await {
            Ok(id) => {
                info!(device = %device.name, alert = %id, count = device.reboot_count, "alert opened");
                let opened = device.reboot_count <= 1;
                device.active_alert = Some(id);
                if opened {
                    AlertTransition::Opened
                } else {
                    AlertTransition::Refreshed
                }
            }
            Err(e) => {
                warn!(device = %device.name, error = %e, "failed to open alert");
                AlertTransition::Unchanged
            }
        }
    }

    /// Resolve the device's alert if it was alerted; reset its count.
    ///
    /// If the resolve edit fails the device stays ALERTED with its handle,
    /// so the next online sweep retries and a later stale cycle refreshes
    /// the same message instead of opening a second one.
    pub async fn on_online(&self, device: &mut DeviceState, now: i64) -> AlertTransition {
        if !device.is_alerted() {
            return AlertTransition::Unchanged;
        }

        if let Some(id) = device.active_alert.clone() {
            let content = self.resolved_content(device, now);
            match self.notifier.update_alert(&id, &content).await {
                Ok(()) => info!(device = %device.name, alert = %id, "alert resolved"),
                Err(NotifyError::NotFound(_)) => {
                    debug!(device = %device.name, alert = %id, "open alert already gone");
                }
                Err(e) => {
                    warn!(device = %device.name, alert = %id, error = %e, "failed to resolve alert, will retry");
                    return AlertTransition::Unchanged;
                }
            }
        } else {
            debug!(device = %device.name, "device recovered with no open alert");
        }

        info!(device = %device.name, reboots = device.reboot_count, "device is back online");
        device.active_alert = None;
        device.reboot_count = 0;
        AlertTransition::Resolved
    }

    fn stale_content(&self, device: &DeviceState, now: i64) -> AlertContent {
        AlertContent {
            device: device.name.clone(),
            status: AlertStatus::Open,
            description: format!(
                "{} has not reported for more than {} minutes; reboot count: {}",
                device.name, self.stale_after_minutes, device.reboot_count
            ),
            reboot_count: device.reboot_count,
            at: now,
        }
    }

    fn resolved_content(&self, device: &DeviceState, now: i64) -> AlertContent {
        AlertContent {
            device: device.name.clone(),
            status: AlertStatus::Resolved,
            description: format!(
                "{} is reporting again; fixed after {} reboot(s)",
                device.name, device.reboot_count
            ),
            reboot_count: device.reboot_count,
            at: now,
        }
    }
}
