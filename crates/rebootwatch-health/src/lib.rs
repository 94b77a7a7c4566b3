//! rebootwatch-health — device health evaluation and self-healing.
//!
//! Decides which PoE devices have gone silent, power-cycles them under a
//! per-device cooldown, and keeps one notification per troubled device in
//! step with its state.
//!
//! # Architecture
//!
//! ```text
//! Poller (one sweep per poll interval)
//!   ├── OutageGate        upstream ban check, one broadcast per episode
//!   └── per server: StatusSource::statuses()
//!       └── per device report
//!           ├── freshness::evaluate()   → Online | Stale
//!           ├── Online: AlertLifecycle::on_online()       (resolve, count → 0)
//!           └── Stale:  CooldownGovernor::try_acquire()   (check-and-set)
//!                       ├── RemediationActuator::power_cycle()  off, settle, on
//!                       └── AlertLifecycle::on_remediated()     (create / refresh)
//! ```
//!
//! All collaborators that touch the network sit behind the traits in
//! [`contracts`], so every decision here can be driven with an injected
//! `now` and in-process fakes.

pub mod actuator;
pub mod alerts;
pub mod contracts;
pub mod freshness;
pub mod governor;
pub mod outage;
pub mod poller;

pub use actuator::RemediationActuator;
pub use alerts::{AlertLifecycle, AlertTransition};
pub use contracts::*;
pub use freshness::{Freshness, FreshnessPolicy};
pub use governor::CooldownGovernor;
pub use outage::{GateDecision, OutageGate};
pub use poller::{Collaborators, Poller, SweepReport, TickOutcome, epoch_secs};
