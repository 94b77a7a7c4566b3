//! Discord webhook notifier.
//!
//! Alerts are single-embed webhook messages. Creating one posts with
//! `?wait=true` so Discord returns the message id, which is what later
//! edits (`PATCH /messages/{id}`) and deletes address.

use std::time::Duration;

use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::Deserialize;
use serde_json::{json, Value};
use tracing::debug;

use rebootwatch_core::{AlertId, NotifySettings};
use rebootwatch_health::{AlertContent, AlertStatus, Broadcast, Notifier, NotifyError};

const COLOR_OPEN: u32 = 16_711_680;
const COLOR_RESOLVED: u32 = 65_280;
const AVATAR_URL: &str = "https://upload.wikimedia.org/wikipedia/commons/thumb/f/f6/OOjs_UI_icon_alert-destructive.svg/500px-OOjs_UI_icon_alert-destructive.svg.png";
const THUMBNAIL_URL: &str = "https://img.icons8.com/plasticine/344/restart.png";
const FOOTER: &str = "Powered by rebootwatch";

#[derive(Debug, Deserialize)]
struct WebhookMessage {
    id: String,
}

#[derive(Clone)]
pub struct DiscordWebhook {
    http: reqwest::Client,
    url: String,
    username: String,
}

impl DiscordWebhook {
    pub fn new(settings: &NotifySettings, request_timeout: Duration) -> Result<Self> {
        let http = reqwest::Client::builder()
            .user_agent(concat!("rebootwatch/", env!("CARGO_PKG_VERSION")))
            .timeout(request_timeout)
            .build()
            .context("failed to create discord webhook client")?;
        Ok(Self {
            http,
            url: settings.webhook_url.trim_end_matches('/').to_string(),
            username: settings.username.clone(),
        })
    }

    fn message_url(&self, id: &str) -> String {
        format!("{}/messages/{id}", self.url)
    }

    fn alert_payload(&self, content: &AlertContent) -> Value {
        let (title, color) = match content.status {
            AlertStatus::Open => ("Device restarted!".to_string(), COLOR_OPEN),
            AlertStatus::Resolved => ("✅ Device fixed!".to_string(), COLOR_RESOLVED),
        };
        let timestamp = DateTime::<Utc>::from_timestamp(content.at, 0)
            .unwrap_or_else(Utc::now)
            .to_rfc3339();
        json!({
            "username": self.username,
            "avatar_url": AVATAR_URL,
            "embeds": [{
                "title": title,
                "description": content.description,
                "color": color,
                "timestamp": timestamp,
                "footer": { "text": FOOTER },
                "thumbnail": { "url": THUMBNAIL_URL },
            }],
        })
    }

    async fn check(response: reqwest::Response, id: Option<&str>) -> Result<reqwest::Response, NotifyError> {
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }
        if status == reqwest::StatusCode::NOT_FOUND
            && let Some(id) = id
        {
            return Err(NotifyError::NotFound(id.to_string()));
        }
        let body = response.text().await.unwrap_or_default();
        Err(NotifyError::Rejected {
            status: status.as_u16(),
            body,
        })
    }
}

fn transport(e: reqwest::Error) -> NotifyError {
    NotifyError::Transport(e.to_string())
}

#[async_trait]
impl Notifier for DiscordWebhook {
    async fn create_alert(&self, content: &AlertContent) -> Result<AlertId, NotifyError> {
        let response = self
            .http
            .post(&self.url)
            .query(&[("wait", "true")])
            .json(&self.alert_payload(content))
            .send()
            .await
            .map_err(transport)?;
        let response = Self::check(response, None).await?;
        let message: WebhookMessage = response
            .json()
            .await
            .map_err(|e| NotifyError::Malformed(e.to_string()))?;
        debug!(device = %content.device, id = %message.id, "webhook alert posted");
        Ok(message.id)
    }

    async fn update_alert(&self, id: &AlertId, content: &AlertContent) -> Result<(), NotifyError> {
        let response = self
            .http
            .patch(self.message_url(id))
            .json(&self.alert_payload(content))
            .send()
            .await
            .map_err(transport)?;
        Self::check(response, Some(id)).await?;
        debug!(device = %content.device, %id, "webhook alert edited");
        Ok(())
    }

    async fn delete_alert(&self, id: &AlertId) -> Result<(), NotifyError> {
        let response = self
            .http
            .delete(self.message_url(id))
            .send()
            .await
            .map_err(transport)?;
        Self::check(response, Some(id)).await?;
        Ok(())
    }

    async fn post_broadcast(&self, broadcast: &Broadcast) -> Result<(), NotifyError> {
        let content = match &broadcast.mention {
            Some(user) => format!("<@{user}> {}", broadcast.text),
            None => broadcast.text.clone(),
        };
        let response = self
            .http
            .post(&self.url)
            .json(&json!({
                "username": self.username,
                "avatar_url": AVATAR_URL,
                "content": content,
            }))
            .send()
            .await
            .map_err(transport)?;
        Self::check(response, None).await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use httpmock::prelude::*;

    fn webhook(base_url: String) -> DiscordWebhook {
        let settings = NotifySettings {
            webhook_url: format!("{base_url}/api/webhooks/1/token"),
            operator_mention: Some("42".to_string()),
            username: "Alert!".to_string(),
        };
        DiscordWebhook::new(&settings, Duration::from_secs(2)).unwrap()
    }

    fn content(status: AlertStatus) -> AlertContent {
        AlertContent {
            device: "cam1".to_string(),
            status,
            description: "cam1 has not reported for more than 5 minutes; reboot count: 1"
                .to_string(),
            reboot_count: 1,
            at: 1_700_000_000,
        }
    }

    #[tokio::test]
    async fn create_returns_message_id() {
        let server = MockServer::start();
        let create = server.mock(|when, then| {
            when.method(POST)
                .path("/api/webhooks/1/token")
                .query_param("wait", "true")
                .body_includes("reboot count: 1")
                .body_includes("16711680")
                .body_includes("2023-11-14T22:13:20+00:00");
            then.status(200).json_body(serde_json::json!({"id": "1234", "type": 0}));
        });

        let id = webhook(server.base_url())
            .create_alert(&content(AlertStatus::Open))
            .await
            .unwrap();
        create.assert_calls(1);
        assert_eq!(id, "1234");
    }

    #[tokio::test]
    async fn resolve_edits_message_green() {
        let server = MockServer::start();
        let edit = server.mock(|when, then| {
            when.method(PATCH)
                .path("/api/webhooks/1/token/messages/1234")
                .body_includes("65280")
                .body_includes("Device fixed");
            then.status(200).json_body(serde_json::json!({"id": "1234"}));
        });

        webhook(server.base_url())
            .update_alert(&"1234".to_string(), &content(AlertStatus::Resolved))
            .await
            .unwrap();
        edit.assert_calls(1);
    }

    #[tokio::test]
    async fn editing_deleted_message_is_not_found() {
        let server = MockServer::start();
        server.mock(|when, then| {
            when.method(PATCH).path("/api/webhooks/1/token/messages/99");
            then.status(404).json_body(serde_json::json!({"message": "Unknown Message", "code": 10008}));
        });

        let err = webhook(server.base_url())
            .update_alert(&"99".to_string(), &content(AlertStatus::Open))
            .await
            .unwrap_err();
        assert!(matches!(err, NotifyError::NotFound(id) if id == "99"));
    }

    #[tokio::test]
    async fn delete_addresses_message() {
        let server = MockServer::start();
        let delete = server.mock(|when, then| {
            when.method(DELETE).path("/api/webhooks/1/token/messages/7");
            then.status(204);
        });

        webhook(server.base_url())
            .delete_alert(&"7".to_string())
            .await
            .unwrap();
        delete.assert_calls(1);
    }

    #[tokio::test]
    async fn broadcast_mentions_operator() {
        let server = MockServer::start();
        let post = server.mock(|when, then| {
            when.method(POST)
                .path("/api/webhooks/1/token")
                .body_includes("<@42> banned");
            then.status(204);
        });

        webhook(server.base_url())
            .post_broadcast(&Broadcast {
                mention: Some("42".to_string()),
                text: "banned".to_string(),
            })
            .await
            .unwrap();
        post.assert_calls(1);
    }

    #[tokio::test]
    async fn rate_limit_is_rejected() {
        let server = MockServer::start();
        server.mock(|when, then| {
            when.method(POST).path("/api/webhooks/1/token");
            then.status(429).body("slow down");
        });

        let err = webhook(server.base_url())
            .create_alert(&content(AlertStatus::Open))
            .await
            .unwrap_err();
        assert!(matches!(err, NotifyError::Rejected { status: 429, body } if body == "slow down"));
    }
}
