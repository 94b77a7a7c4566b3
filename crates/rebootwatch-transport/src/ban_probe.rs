//! Upstream ban probe.
//!
//! The upstream sign-in endpoint answers `403 Forbidden` while the
//! deployment's egress address is banned. Any other status means the ban,
//! if there was one, has lifted.

use std::time::Duration;

use anyhow::{Context, Result};
use async_trait::async_trait;
use reqwest::StatusCode;
use tracing::debug;

use rebootwatch_health::{OutageProbe, ProbeError, ProbeOutcome};

pub struct HttpBanProbe {
    http: reqwest::Client,
    url: String,
}

impl HttpBanProbe {
    pub fn new(url: impl Into<String>, request_timeout: Duration) -> Result<Self> {
        let http = reqwest::Client::builder()
            .user_agent(concat!("rebootwatch/", env!("CARGO_PKG_VERSION")))
            .timeout(request_timeout)
            .redirect(reqwest::redirect::Policy::none())
            .build()
            .context("failed to create ban probe client")?;
        Ok(Self {
            http,
            url: url.into(),
        })
    }
}

#[async_trait]
impl OutageProbe for HttpBanProbe {
    async fn check(&self) -> Result<ProbeOutcome, ProbeError> {
        let response = self
            .http
            .get(&self.url)
            .send()
            .await
            .map_err(|e| ProbeError(e.to_string()))?;
        let status = response.status();
        debug!(url = %self.url, %status, "ban probe answered");
        Ok(if status == StatusCode::FORBIDDEN {
            ProbeOutcome::Banned
        } else {
            ProbeOutcome::Reachable
        })
    }
}
