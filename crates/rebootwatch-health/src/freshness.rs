//! Staleness rule for device reports.

use rebootwatch_core::DeviceReport;

/// Outcome of evaluating one device report.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Freshness {
    Online,
    Stale,
}

/// Decide whether a device is still reporting.
///
/// The threshold is pushed back by the device's own sleep interval, so only
/// a gap longer than both the grace period and the device's cadence counts
/// as stale. A device that never reported is stale.
pub fn evaluate(
    last_report_at: Option<i64>,
    sleep_interval_secs: i64,
    stale_after_minutes: u32,
    now: i64,
) -> Freshness {
    let Some(last) = last_report_at else {
        return Freshness::Stale;
    };
    let threshold = now - i64::from(stale_after_minutes) * 60 - sleep_interval_secs.max(0);
    if last > threshold {
        Freshness::Online
    } else {
        Freshness::Stale
    }
}

/// [`evaluate`] bound to the configured grace period.
#[derive(Debug, Clone, Copy)]
pub struct FreshnessPolicy {
    stale_after_minutes: u32,
}

impl FreshnessPolicy {
    /// Create a policy with the given grace period.
    pub fn new(stale_after_minutes: u32) -> Self {
        Self {
            stale_after_minutes,
        }
    }

    pub fn stale_after_minutes(&self) -> u32 {
        self.stale_after_minutes
    }

    /// Classify one status report at `now`.
    pub fn evaluate(&self, report: &DeviceReport, now: i64) -> Freshness {
        evaluate(
            report.last_report_at,
            report.sleep_interval_secs,
            self.stale_after_minutes,
            now,
        )
    }
}
