//! Outage gate — halts polling while the host is banned upstream.
//!
//! Edge-triggered: the first banned probe of an episode posts one
//! broadcast with an estimated unban time; further banned probes only hold
//! the gate shut. The first clear probe reopens it silently.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use tracing::{debug, info, warn};

use rebootwatch_state::BanState;

use crate::contracts::{Broadcast, Notifier, OutageProbe, ProbeOutcome};

/// Whether the current cycle may poll.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GateDecision {
    /// Not banned; run the sweep.
    Clear,
    /// A ban episode just started; skip the sweep.
    Tripped,
    /// Still inside a ban episode; skip the sweep.
    Held,
}

impl GateDecision {
    pub fn is_clear(self) -> bool {
        self == GateDecision::Clear
    }
}

pub struct OutageGate {
    /// `None` disables the gate entirely.
    probe: Option<Arc<dyn OutageProbe>>,
    notifier: Arc<dyn Notifier>,
    operator_mention: Option<String>,
    ban_duration_secs: i64,
    state: BanState,
}

impl OutageGate {
    pub fn new(
        probe: Option<Arc<dyn OutageProbe>>,
        notifier: Arc<dyn Notifier>,
        operator_mention: Option<String>,
        ban_duration_minutes: u32,
    ) -> Self {
        Self {
            probe,
            notifier,
            operator_mention,
            ban_duration_secs: i64::from(ban_duration_minutes) * 60,
            state: BanState::default(),
        }
    }

    /// A gate that never trips.
    pub fn disabled(notifier: Arc<dyn Notifier>) -> Self {
        Self::new(None, notifier, None, 0)
    }

    pub fn is_banned(&self) -> bool {
        self.state.banned
    }

    /// Fold one probe result into the ban state.
    pub fn observe(&mut self, banned: bool) -> GateDecision {
        let was_banned = self.state.banned;
        self.state.banned = banned;
        match (was_banned, banned) {
            (false, true) => GateDecision::Tripped,
            (true, true) => GateDecision::Held,
            (true, false) => {
                info!("upstream ban lifted, resuming polling");
                GateDecision::Clear
            }
            (false, false) => GateDecision::Clear,
        }
    }

    /// Probe upstream and decide whether this cycle may poll.
    ///
    /// A probe that fails to run counts as not banned.
    pub async fn check(&mut self, now: i64) -> GateDecision {
        let Some(probe) = self.probe.clone() else {
            return GateDecision::Clear;
        };

        let banned = match probe.check().await {
            Ok(ProbeOutcome::Banned) => true,
            Ok(ProbeOutcome::Reachable) => false,
            Err(e) => {
                warn!(error = %e, "outage probe failed, treating as reachable");
                false
            }
        };

        let decision = self.observe(banned);
        match decision {
            GateDecision::Tripped => {
                let unban_at = now + self.ban_duration_secs;
                warn!(unban_at, "upstream ban detected, pausing polling");
                let broadcast = self.ban_broadcast(unban_at);
                if let Err(e) = self.notifier.post_broadcast(&broadcast).await {
                    warn!(error = %e, "failed to post ban notification");
                }
            }
            GateDecision::Held => debug!("still banned upstream"),
            GateDecision::Clear => {}
        }
        decision
    }

    fn ban_broadcast(&self, unban_at: i64) -> Broadcast {
        let eta = DateTime::<Utc>::from_timestamp(unban_at, 0)
            .map(|t| t.format("%Y-%m-%d %H:%M:%S UTC").to_string())
            .unwrap_or_else(|| format!("unix {unban_at}"));
        Broadcast {
            mention: self.operator_mention.clone(),
            text: format!(
                "This host appears to be banned upstream; device polling is paused. \
                 Estimated unban time: {eta}"
            ),
        }
    }
}
