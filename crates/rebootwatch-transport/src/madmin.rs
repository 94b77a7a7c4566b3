//! MAD admin status client.
//!
//! `GET {endpoint}/get_status` returns a JSON array with one object per
//! device. Only the fields the health pipeline needs are decoded.

use std::time::Duration;

use anyhow::{Context, Result};
use async_trait::async_trait;
use serde::Deserialize;
use tracing::debug;

use rebootwatch_core::{DeviceReport, ServerSpec};
use rebootwatch_health::{FetchError, StatusSource};

#[derive(Debug, Deserialize)]
struct MadminDevice {
    name: String,
    #[serde(rename = "lastProtoDateTime", default)]
    last_proto: Option<serde_json::Number>,
    #[serde(rename = "currentSleepTime", default)]
    current_sleep: Option<serde_json::Number>,
    #[serde(default)]
    mode: Option<String>,
}

impl MadminDevice {
    fn into_report(self) -> DeviceReport {
        DeviceReport {
            name: self.name,
            // A zero timestamp means the device never sent anything.
            last_report_at: self.last_proto.as_ref().and_then(whole_secs).filter(|t| *t > 0),
            sleep_interval_secs: self
                .current_sleep
                .as_ref()
                .and_then(whole_secs)
                .unwrap_or(0)
                .max(0),
            mode: self.mode,
        }
    }
}

fn whole_secs(n: &serde_json::Number) -> Option<i64> {
    n.as_i64().or_else(|| n.as_f64().map(|f| f as i64))
}

/// [`StatusSource`] backed by the MAD admin HTTP API.
#[derive(Clone)]
pub struct MadminClient {
    http: reqwest::Client,
}

impl MadminClient {
    pub fn new(request_timeout: Duration) -> Result<Self> {
        let http = reqwest::Client::builder()
            .user_agent(concat!("rebootwatch/", env!("CARGO_PKG_VERSION")))
            .timeout(request_timeout)
            .build()
            .context("failed to create MAD admin client")?;
        Ok(Self { http })
    }
}

#[async_trait]
impl StatusSource for MadminClient {
    async fn statuses(&self, server: &ServerSpec) -> Result<Vec<DeviceReport>, FetchError> {
        let url = format!("{}/get_status", server.endpoint);
        let mut request = self.http.get(&url);
        if let Some(creds) = &server.credentials {
            request = request.basic_auth(&creds.user, Some(&creds.password));
        }

        let response = request
            .send()
            .await
            .map_err(|e| transport_error(server, e))?;
        let status = response.status();
        if !status.is_success() {
            return Err(FetchError::Unreachable {
                server: server.id.clone(),
                reason: format!("HTTP {status}"),
            });
        }

        let body = response
            .bytes()
            .await
            .map_err(|e| transport_error(server, e))?;
        let devices: Vec<MadminDevice> =
            serde_json::from_slice(&body).map_err(|e| FetchError::Malformed {
                server: server.id.clone(),
                reason: e.to_string(),
            })?;
        debug!(server = %server.id, devices = devices.len(), "status decoded");

        Ok(devices.into_iter().map(MadminDevice::into_report).collect())
    }
}

fn transport_error(server: &ServerSpec, e: reqwest::Error) -> FetchError {
    if e.is_timeout() {
        FetchError::Timeout {
            server: server.id.clone(),
        }
    } else {
        FetchError::Unreachable {
            server: server.id.clone(),
            reason: e.to_string(),
        }
    }
}
