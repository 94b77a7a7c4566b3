//! Notifier used when no webhook is configured.

use std::sync::atomic::{AtomicU64, Ordering};

use async_trait::async_trait;
use tracing::{info, warn};

use rebootwatch_core::AlertId;
use rebootwatch_health::{AlertContent, AlertStatus, Broadcast, Notifier, NotifyError};

/// Writes alerts to the log and hands out local ids so alert bookkeeping
/// behaves the same as with a real channel.
#[derive(Default)]
pub struct LogNotifier {
    next_id: AtomicU64,
}

impl LogNotifier {
    pub fn new() -> Self {
        Self::default()
    }

    fn log(id: &str, content: &AlertContent) {
        match content.status {
            AlertStatus::Open => warn!(
                alert = id,
                device = %content.device,
                reboot_count = content.reboot_count,
                "{}",
                content.description
            ),
            AlertStatus::Resolved => info!(
                alert = id,
                device = %content.device,
                "{}",
                content.description
            ),
        }
    }
}

#[async_trait]
impl Notifier for LogNotifier {
    async fn create_alert(&self, content: &AlertContent) -> Result<AlertId, NotifyError> {
        let id = format!("local-{}", self.next_id.fetch_add(1, Ordering::Relaxed) + 1);
        Self::log(&id, content);
        Ok(id)
    }

    async fn update_alert(&self, id: &AlertId, content: &AlertContent) -> Result<(), NotifyError> {
        Self::log(id, content);
        Ok(())
    }

    async fn delete_alert(&self, _id: &AlertId) -> Result<(), NotifyError> {
        Ok(())
    }

    async fn post_broadcast(&self, broadcast: &Broadcast) -> Result<(), NotifyError> {
        warn!("{}", broadcast.text);
        Ok(())
    }
}
