//! In-process fakes for the health pipeline's collaborators.

#![allow(dead_code)]

use std::collections::{HashMap, HashSet, VecDeque};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;

use rebootwatch_core::{AlertId, DeviceReport, PowerState, ServerSpec, Settings, VendorHandle};
use rebootwatch_health::*;

pub fn settings(extra: &str) -> Settings {
    let toml_str = format!(
        r#"
[monitor]
stale_after_minutes = 5
reboot_cooldown_minutes = 10
settle_delay_ms = 0
request_timeout_secs = 5
{extra}

[snmp]
target = "127.0.0.1:161"
community = "private"

[[servers]]
id = "a"
endpoint = "http://a.local"

[[servers]]
id = "b"
endpoint = "http://b.local"

[devices]
cam1 = "1"
cam2 = "2"
cam3 = "3"
"#
    );
    Settings::from_toml_str(&toml_str).unwrap()
}

pub fn report(name: &str, last_report_at: Option<i64>) -> DeviceReport {
    DeviceReport {
        name: name.to_string(),
        last_report_at,
        sleep_interval_secs: 0,
        mode: Some("mon_mitm".to_string()),
    }
}

pub fn idle(name: &str) -> DeviceReport {
    DeviceReport {
        mode: Some("Idle".to_string()),
        ..report(name, None)
    }
}

/// Status listings keyed by server id; missing servers are unreachable,
/// hanging servers never answer.
#[derive(Default)]
pub struct FakeSource {
    listings: Mutex<HashMap<String, Vec<DeviceReport>>>,
    hanging: Mutex<HashSet<String>>,
}

impl FakeSource {
    pub fn set(&self, server: &str, reports: Vec<DeviceReport>) {
        self.listings
            .lock()
            .unwrap()
            .insert(server.to_string(), reports);
    }

    pub fn fail(&self, server: &str) {
        self.listings.lock().unwrap().remove(server);
    }

    pub fn hang(&self, server: &str) {
        self.hanging.lock().unwrap().insert(server.to_string());
    }
}

#[async_trait]
impl StatusSource for FakeSource {
    async fn statuses(&self, server: &ServerSpec) -> Result<Vec<DeviceReport>, FetchError> {
        let hangs = self.hanging.lock().unwrap().contains(&server.id);
        if hangs {
            return std::future::pending().await;
        }
        self.listings
            .lock()
            .unwrap()
            .get(&server.id)
            .cloned()
            .ok_or_else(|| FetchError::Unreachable {
                server: server.id.clone(),
                reason: "connection refused".to_string(),
            })
    }
}

#[derive(Default)]
pub struct FakePower {
    pub calls: Mutex<Vec<(String, PowerState)>>,
    pub failing: Mutex<bool>,
}

impl FakePower {
    pub fn cycles_for(&self, handle: &str) -> usize {
        self.calls
            .lock()
            .unwrap()
            .iter()
            .filter(|(h, s)| h == handle && *s == PowerState::Off)
            .count()
    }
}

#[async_trait]
impl PowerControl for FakePower {
    async fn set_power_state(
        &self,
        handle: &VendorHandle,
        state: PowerState,
    ) -> Result<(), PowerError> {
        self.calls
            .lock()
            .unwrap()
            .push((handle.to_string(), state));
        if *self.failing.lock().unwrap() {
            return Err(PowerError::Command {
                handle: handle.clone(),
                state,
                reason: "no response".to_string(),
            });
        }
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NotifyCall {
    Create(AlertId, AlertContent),
    Update(AlertId, AlertContent),
    Delete(AlertId),
    Broadcast(Broadcast),
}

#[derive(Default)]
pub struct FakeNotifier {
    pub calls: Mutex<Vec<NotifyCall>>,
    next_id: Mutex<u32>,
    pub failing: Mutex<bool>,
}

impl FakeNotifier {
    pub fn calls(&self) -> Vec<NotifyCall> {
        self.calls.lock().unwrap().clone()
    }

    pub fn broadcasts(&self) -> usize {
        self.calls()
            .iter()
            .filter(|c| matches!(c, NotifyCall::Broadcast(_)))
            .count()
    }

    fn check_failing(&self) -> Result<(), NotifyError> {
        if *self.failing.lock().unwrap() {
            return Err(NotifyError::Transport("webhook down".to_string()));
        }
        Ok(())
    }
}

#[async_trait]
impl Notifier for FakeNotifier {
    async fn create_alert(&self, content: &AlertContent) -> Result<AlertId, NotifyError> {
        self.check_failing()?;
        let id = {
            let mut next = self.next_id.lock().unwrap();
            *next += 1;
            format!("msg-{next}")
        };
        self.calls
            .lock()
            .unwrap()
            .push(NotifyCall::Create(id.clone(), content.clone()));
        Ok(id)
    }

    async fn update_alert(&self, id: &AlertId, content: &AlertContent) -> Result<(), NotifyError> {
        self.check_failing()?;
        self.calls
            .lock()
            .unwrap()
            .push(NotifyCall::Update(id.clone(), content.clone()));
        Ok(())
    }

    async fn delete_alert(&self, id: &AlertId) -> Result<(), NotifyError> {
        self.check_failing()?;
        self.calls
            .lock()
            .unwrap()
            .push(NotifyCall::Delete(id.clone()));
        Ok(())
    }

    async fn post_broadcast(&self, broadcast: &Broadcast) -> Result<(), NotifyError> {
        self.check_failing()?;
        self.calls
            .lock()
            .unwrap()
            .push(NotifyCall::Broadcast(broadcast.clone()));
        Ok(())
    }
}

pub struct FakeProbe {
    outcomes: Mutex<VecDeque<ProbeOutcome>>,
}

impl FakeProbe {
    pub fn new(outcomes: Vec<ProbeOutcome>) -> Self {
        Self {
            outcomes: Mutex::new(outcomes.into()),
        }
    }
}

#[async_trait]
impl OutageProbe for FakeProbe {
    async fn check(&self) -> Result<ProbeOutcome, ProbeError> {
        Ok(self
            .outcomes
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or(ProbeOutcome::Reachable))
    }
}

pub struct Harness {
    pub source: Arc<FakeSource>,
    pub power: Arc<FakePower>,
    pub notifier: Arc<FakeNotifier>,
    pub poller: Poller,
}

impl Harness {
    pub fn new(settings: &Settings, probe: Option<Arc<FakeProbe>>) -> Self {
        let source = Arc::new(FakeSource::default());
        let power = Arc::new(FakePower::default());
        let notifier = Arc::new(FakeNotifier::default());
        let collaborators = Collaborators {
            source: source.clone(),
            power: power.clone(),
            notifier: notifier.clone(),
            probe: probe.map(|p| p as Arc<dyn OutageProbe>),
        };
        let poller = Poller::new(settings, collaborators);
        Self {
            source,
            power,
            notifier,
            poller,
        }
    }
}
