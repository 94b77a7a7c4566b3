//! Contracts for the network-facing collaborators of the health pipeline.
//!
//! Concrete transports live in `rebootwatch-transport`; tests use fakes.

use async_trait::async_trait;
use thiserror::Error;

use rebootwatch_core::{AlertId, DeviceReport, PowerState, ServerSpec, VendorHandle};

/// Failure to obtain a server's device listing.
#[derive(Debug, Error)]
pub enum FetchError {
    #[error("server {server} unreachable: {reason}")]
    Unreachable { server: String, reason: String },

    #[error("server {server} timed out")]
    Timeout { server: String },

    #[error("malformed status payload from {server}: {reason}")]
    Malformed { server: String, reason: String },
}

/// Failure to issue a power command.
#[derive(Debug, Error)]
pub enum PowerError {
    #[error("power {state} for {handle} failed: {reason}")]
    Command {
        handle: VendorHandle,
        state: PowerState,
        reason: String,
    },

    #[error("power {state} for {handle} timed out")]
    Timeout {
        handle: VendorHandle,
        state: PowerState,
    },
}

/// Failure of a notification call.
#[derive(Debug, Error)]
pub enum NotifyError {
    #[error("notification transport error: {0}")]
    Transport(String),

    #[error("notification rejected with status {status}: {body}")]
    Rejected { status: u16, body: String },

    /// The referenced alert no longer exists on the channel.
    #[error("alert {0} not found")]
    NotFound(AlertId),

    #[error("malformed notification response: {0}")]
    Malformed(String),
}

/// Failure to run the upstream outage probe.
#[derive(Debug, Error)]
#[error("outage probe failed: {0}")]
pub struct ProbeError(pub String);

/// Result of the upstream reachability check.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProbeOutcome {
    Reachable,
    Banned,
}

/// Whether an alert describes an ongoing problem or a recovery.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AlertStatus {
    Open,
    Resolved,
}

/// Content of a per-device alert.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AlertContent {
    pub device: String,
    pub status: AlertStatus,
    pub description: String,
    pub reboot_count: u32,
    /// Unix seconds the content was produced.
    pub at: i64,
}

/// A one-shot operator notification, independent of any device alert.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Broadcast {
    /// Operator id to mention, if configured.
    pub mention: Option<String>,
    pub text: String,
}

/// Source of per-server device status listings.
#[async_trait]
pub trait StatusSource: Send + Sync {
    async fn statuses(&self, server: &ServerSpec) -> Result<Vec<DeviceReport>, FetchError>;
}

/// Remote PoE port power control.
#[async_trait]
pub trait PowerControl: Send + Sync {
    async fn set_power_state(
        &self,
        handle: &VendorHandle,
        state: PowerState,
    ) -> Result<(), PowerError>;
}

/// Notification channel.
///
/// Per-device alerts are persistent and editable; broadcasts are
/// fire-and-forget and never referenced again.
#[async_trait]
pub trait Notifier: Send + Sync {
    async fn create_alert(&self, content: &AlertContent) -> Result<AlertId, NotifyError>;

    async fn update_alert(&self, id: &AlertId, content: &AlertContent) -> Result<(), NotifyError>;

    async fn delete_alert(&self, id: &AlertId) -> Result<(), NotifyError>;

    async fn post_broadcast(&self, broadcast: &Broadcast) -> Result<(), NotifyError>;
}

/// Upstream ban check run before every sweep.
#[async_trait]
pub trait OutageProbe: Send + Sync {
    async fn check(&self) -> Result<ProbeOutcome, ProbeError>;
}
