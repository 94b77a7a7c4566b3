//! Poll orchestrator — drives sweeps across all configured servers.
//!
//! One sweep fetches every server's device listing in turn and feeds each
//! registered, non-idle device through freshness → governor → actuator →
//! alert lifecycle. Sweeps never overlap and a failing server only costs
//! its own devices one cycle.

use std::sync::Arc;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use tokio::sync::watch;
use tracing::{debug, info, warn};

use rebootwatch_core::{DeviceReport, ServerSpec, Settings};
use rebootwatch_state::DeviceStore;

use crate::actuator::RemediationActuator;
use crate::alerts::{AlertLifecycle, AlertTransition};
use crate::contracts::{FetchError, Notifier, OutageProbe, PowerControl, StatusSource};
use crate::freshness::{Freshness, FreshnessPolicy};
use crate::governor::CooldownGovernor;
use crate::outage::{GateDecision, OutageGate};

/// The network-facing pieces a poller is assembled from.
#[derive(Clone)]
pub struct Collaborators {
    pub source: Arc<dyn StatusSource>,
    pub power: Arc<dyn PowerControl>,
    pub notifier: Arc<dyn Notifier>,
    /// `None` when the outage check is disabled.
    pub probe: Option<Arc<dyn OutageProbe>>,
}

/// Tally of one sweep.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SweepReport {
    pub servers_ok: u32,
    pub servers_failed: u32,
    pub evaluated: u32,
    pub online: u32,
    pub stale: u32,
    pub remediated: u32,
    pub cooldown_denied: u32,
    pub power_failures: u32,
    pub recovered: u32,
    pub skipped_idle: u32,
    pub skipped_unknown: u32,
}

/// Result of one loop iteration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TickOutcome {
    Swept(SweepReport),
    /// The outage gate is shut; nothing was polled.
    Gated,
}

pub struct Poller {
    store: DeviceStore,
    servers: Vec<ServerSpec>,
    source: Arc<dyn StatusSource>,
    freshness: FreshnessPolicy,
    governor: CooldownGovernor,
    actuator: RemediationActuator,
    alerts: AlertLifecycle,
    gate: OutageGate,
    poll_interval: Duration,
    ban_backoff: Duration,
    request_timeout: Duration,
}

impl Poller {
    pub fn new(settings: &Settings, collaborators: Collaborators) -> Self {
        let monitor = &settings.monitor;
        let operator_mention = settings
            .notify
            .as_ref()
            .and_then(|n| n.operator_mention.clone());
        let ban_duration_minutes = settings
            .outage
            .as_ref()
            .map(|o| o.ban_duration_minutes)
            .unwrap_or_default();
        // A probe without outage settings would have no ban duration.
        let probe = settings.outage.as_ref().and(collaborators.probe);

        Self {
            store: DeviceStore::from_registry(&settings.devices),
            servers: settings.servers.clone(),
            source: collaborators.source,
            freshness: FreshnessPolicy::new(monitor.stale_after_minutes),
            governor: CooldownGovernor::new(monitor.reboot_cooldown_minutes),
            actuator: RemediationActuator::new(collaborators.power, monitor.settle_delay),
            alerts: AlertLifecycle::new(
                collaborators.notifier.clone(),
                monitor.stale_after_minutes,
            ),
            gate: OutageGate::new(
                probe,
                collaborators.notifier,
                operator_mention,
                ban_duration_minutes,
            ),
            poll_interval: monitor.poll_interval,
            ban_backoff: monitor.ban_backoff,
            request_timeout: monitor.request_timeout,
        }
    }

    pub fn store(&self) -> &DeviceStore {
        &self.store
    }

    pub fn is_banned(&self) -> bool {
        self.gate.is_banned()
    }

    /// Outage check followed, if clear, by one sweep.
    pub async fn tick(&mut self, now: i64) -> TickOutcome {
        match self.gate.check(now).await {
            GateDecision::Clear => TickOutcome::Swept(self.sweep(now).await),
            GateDecision::Tripped | GateDecision::Held => TickOutcome::Gated,
        }
    }

    /// Evaluate every device reported by every server.
    pub async fn sweep(&mut self, now: i64) -> SweepReport {
        info!(servers = self.servers.len(), "checking devices");
        let mut report = SweepReport::default();

        let servers = self.servers.clone();
        for server in &servers {
            let devices = match self.fetch(server).await {
                Ok(devices) => {
                    report.servers_ok += 1;
                    devices
                }
                Err(e) => {
                    warn!(server = %server.id, error = %e, "failed to fetch device status, skipping server");
                    report.servers_failed += 1;
                    continue;
                }
            };
            debug!(server = %server.id, devices = devices.len(), "device status fetched");

            for device_report in &devices {
                self.evaluate(device_report, now, &mut report).await;
            }
        }

        info!(
            evaluated = report.evaluated,
            stale = report.stale,
            remediated = report.remediated,
            recovered = report.recovered,
            servers_failed = report.servers_failed,
            "done checking devices"
        );
        report
    }

    /// Run sweeps until `shutdown` flips.
    pub async fn run(&mut self, mut shutdown: watch::Receiver<bool>) {
        info!(
            interval_secs = self.poll_interval.as_secs(),
            ban_backoff_secs = self.ban_backoff.as_secs(),
            devices = self.store.len(),
            "poller started"
        );

        loop {
            let wait = match self.tick(epoch_secs()).await {
                TickOutcome::Swept(_) => self.poll_interval,
                TickOutcome::Gated => self.ban_backoff,
            };

            tokio::select! {
                _ = tokio::time::sleep(wait) => {}
                _ = shutdown.changed() => {
                    info!("poller shutting down");
                    break;
                }
            }
        }
    }

    async fn fetch(&self, server: &ServerSpec) -> Result<Vec<DeviceReport>, FetchError> {
        match tokio::time::timeout(self.request_timeout, self.source.statuses(server)).await {
            Ok(result) => result,
            Err(_) => Err(FetchError::Timeout {
                server: server.id.clone(),
            }),
        }
    }

    async fn evaluate(&mut self, device_report: &DeviceReport, now: i64, report: &mut SweepReport) {
        let name = &device_report.name;
        if device_report.is_idle() {
            debug!(device = %name, "device is idle, skipping");
            report.skipped_idle += 1;
            return;
        }

        if !self.store.contains(name) {
            if self.store.note_unknown(name) {
                warn!(device = %name, "device is not in the device registry, skipping");
            } else {
                debug!(device = %name, "unregistered device, skipping");
            }
            report.skipped_unknown += 1;
            return;
        }
        let Ok(device) = self.store.get_mut(name) else {
            return;
        };
        report.evaluated += 1;

        match self.freshness.evaluate(device_report, now) {
            Freshness::Online => {
                report.online += 1;
                if self.alerts.on_online(device, now).await == AlertTransition::Resolved {
                    report.recovered += 1;
                }
            }
            Freshness::Stale => {
                report.stale += 1;
                info!(device = %name, last_report_at = ?device_report.last_report_at, "device is not online");

                if !self.governor.try_acquire(device, now) {
                    report.cooldown_denied += 1;
                    return;
                }

                if let Err(e) = self.actuator.power_cycle(device).await {
                    warn!(device = %name, error = %e, "power cycle incomplete");
                    report.power_failures += 1;
                }
                report.remediated += 1;
                self.alerts.on_remediated(device, now).await;
            }
        }
    }
}

/// Current wall-clock time in unix seconds.
pub fn epoch_secs() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs() as i64)
        .unwrap_or_default()
}
