//! rebootwatch.toml configuration parser.
//!
//! The file is read into [`RebootwatchConfig`] (a direct mirror of the TOML
//! layout, every tunable optional) and then validated into [`Settings`],
//! which carries defaults applied and durations converted.

use std::collections::{BTreeMap, HashSet};
use std::net::{IpAddr, SocketAddr};
use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;
use url::Url;

use crate::types::{Credentials, DeviceName, ServerSpec, VendorHandle};

const DEFAULT_STALE_AFTER_MINUTES: u32 = 5;
const DEFAULT_REBOOT_COOLDOWN_MINUTES: u32 = 10;
const DEFAULT_POLL_INTERVAL_SECS: u64 = 60;
const DEFAULT_BAN_BACKOFF_SECS: u64 = 300;
const DEFAULT_REQUEST_TIMEOUT_SECS: u64 = 15;
const DEFAULT_SETTLE_DELAY_MS: u64 = 1000;
const DEFAULT_BAN_DURATION_MINUTES: u32 = 180;
const DEFAULT_WEBHOOK_USERNAME: &str = "Alert!";
const DEFAULT_SNMP_PORT: u16 = 161;

/// Errors raised while loading or validating the configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read {path}: {source}")]
    Read {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse config: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("invalid config: {0}")]
    Invalid(String),
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RebootwatchConfig {
    pub monitor: Option<MonitorConfig>,
    pub notify: Option<NotifyConfig>,
    pub outage: Option<OutageConfig>,
    pub snmp: SnmpConfig,
    #[serde(default)]
    pub servers: Vec<ServerConfig>,
    #[serde(default)]
    pub devices: BTreeMap<DeviceName, String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct MonitorConfig {
    pub stale_after_minutes: Option<u32>,
    pub reboot_cooldown_minutes: Option<u32>,
    pub poll_interval_secs: Option<u64>,
    pub ban_backoff_secs: Option<u64>,
    pub request_timeout_secs: Option<u64>,
    pub settle_delay_ms: Option<u64>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NotifyConfig {
    pub webhook_url: String,
    pub operator_mention: Option<String>,
    pub username: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OutageConfig {
    pub enabled: Option<bool>,
    pub probe_url: String,
    pub ban_duration_minutes: Option<u32>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SnmpConfig {
    pub target: String,
    pub community: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    pub id: String,
    pub endpoint: String,
    pub user: Option<String>,
    pub password: Option<String>,
}

/// Validated runtime settings.
#[derive(Debug, Clone)]
pub struct Settings {
    pub monitor: MonitorSettings,
    pub notify: Option<NotifySettings>,
    /// `None` when the outage check is absent or disabled.
    pub outage: Option<OutageSettings>,
    pub snmp: SnmpSettings,
    pub servers: Vec<ServerSpec>,
    pub devices: BTreeMap<DeviceName, VendorHandle>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MonitorSettings {
    pub stale_after_minutes: u32,
    pub reboot_cooldown_minutes: u32,
    pub poll_interval: Duration,
    pub ban_backoff: Duration,
    pub request_timeout: Duration,
    pub settle_delay: Duration,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NotifySettings {
    pub webhook_url: String,
    pub operator_mention: Option<String>,
    pub username: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutageSettings {
    pub probe_url: String,
    pub ban_duration_minutes: u32,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SnmpSettings {
    /// `host:port` of the switch's SNMP agent.
    pub target: String,
    pub community: String,
}

impl RebootwatchConfig {
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.display().to_string(),
            source,
        })?;
        Self::parse(&content)
    }

    pub fn parse(content: &str) -> Result<Self, ConfigError> {
        Ok(toml::from_str(content)?)
    }

    /// Apply defaults and check every value the daemon relies on.
    pub fn into_settings(self) -> Result<Settings, ConfigError> {
        let monitor = self.monitor.unwrap_or_default();
        let stale_after_minutes = monitor
            .stale_after_minutes
            .unwrap_or(DEFAULT_STALE_AFTER_MINUTES);
        if stale_after_minutes == 0 {
            return Err(invalid("monitor.stale_after_minutes must be greater than 0"));
        }
        let poll_interval_secs = monitor
            .poll_interval_secs
            .unwrap_or(DEFAULT_POLL_INTERVAL_SECS);
        if poll_interval_secs == 0 {
            return Err(invalid("monitor.poll_interval_secs must be greater than 0"));
        }
        let request_timeout_secs = monitor
            .request_timeout_secs
            .unwrap_or(DEFAULT_REQUEST_TIMEOUT_SECS);
        if request_timeout_secs == 0 {
            return Err(invalid("monitor.request_timeout_secs must be greater than 0"));
        }

        let monitor = MonitorSettings {
            stale_after_minutes,
            reboot_cooldown_minutes: monitor
                .reboot_cooldown_minutes
                .unwrap_or(DEFAULT_REBOOT_COOLDOWN_MINUTES),
            poll_interval: Duration::from_secs(poll_interval_secs),
            ban_backoff: Duration::from_secs(
                monitor.ban_backoff_secs.unwrap_or(DEFAULT_BAN_BACKOFF_SECS),
            ),
            request_timeout: Duration::from_secs(request_timeout_secs),
            settle_delay: Duration::from_millis(
                monitor.settle_delay_ms.unwrap_or(DEFAULT_SETTLE_DELAY_MS),
            ),
        };

        let notify = match self.notify {
            Some(n) => {
                check_url("notify.webhook_url", &n.webhook_url)?;
                Some(NotifySettings {
                    webhook_url: n.webhook_url.trim_end_matches('/').to_string(),
                    operator_mention: n.operator_mention.filter(|m| !m.trim().is_empty()),
                    username: n
                        .username
                        .unwrap_or_else(|| DEFAULT_WEBHOOK_USERNAME.to_string()),
                })
            }
            None => None,
        };

        let outage = match self.outage {
            Some(o) if o.enabled.unwrap_or(true) => {
                check_url("outage.probe_url", &o.probe_url)?;
                Some(OutageSettings {
                    probe_url: o.probe_url,
                    ban_duration_minutes: o
                        .ban_duration_minutes
                        .unwrap_or(DEFAULT_BAN_DURATION_MINUTES),
                })
            }
            _ => None,
        };

        let target = self.snmp.target.trim();
        if target.is_empty() {
            return Err(invalid("snmp.target must not be empty"));
        }
        let snmp = SnmpSettings {
            target: with_default_port(target, DEFAULT_SNMP_PORT),
            community: self.snmp.community,
        };

        if self.servers.is_empty() {
            return Err(invalid("at least one [[servers]] entry is required"));
        }
        let mut seen = HashSet::new();
        let mut servers = Vec::with_capacity(self.servers.len());
        for server in self.servers {
            if server.id.trim().is_empty() {
                return Err(invalid("server id must not be empty"));
            }
            if !seen.insert(server.id.clone()) {
                return Err(invalid(&format!("duplicate server id `{}`", server.id)));
            }
            check_url(&format!("servers.{}.endpoint", server.id), &server.endpoint)?;
            let credentials = match (server.user, server.password) {
                (Some(user), password) => Some(Credentials {
                    user,
                    password: password.unwrap_or_default(),
                }),
                (None, Some(_)) => {
                    return Err(invalid(&format!(
                        "server `{}` has a password but no user",
                        server.id
                    )));
                }
                (None, None) => None,
            };
            servers.push(ServerSpec {
                id: server.id,
                endpoint: server.endpoint.trim_end_matches('/').to_string(),
                credentials,
            });
        }

        let mut devices = BTreeMap::new();
        for (name, handle) in self.devices {
            let handle = handle.trim();
            if handle.is_empty() {
                return Err(invalid(&format!("device `{name}` has an empty vendor handle")));
            }
            devices.insert(name, VendorHandle::new(handle));
        }

        Ok(Settings {
            monitor,
            notify,
            outage,
            snmp,
            servers,
            devices,
        })
    }
}

impl Settings {
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        RebootwatchConfig::from_file(path)?.into_settings()
    }

    pub fn from_toml_str(content: &str) -> Result<Self, ConfigError> {
        RebootwatchConfig::parse(content)?.into_settings()
    }
}

/// Append `port` unless `target` already names one. Bare IPv6 literals
/// are bracketed.
fn with_default_port(target: &str, port: u16) -> String {
    if target.parse::<SocketAddr>().is_ok() {
        return target.to_string();
    }
    if let Ok(ip) = target.parse::<IpAddr>() {
        return SocketAddr::new(ip, port).to_string();
    }
    if target.starts_with('[') && target.ends_with(']') {
        return format!("{target}:{port}");
    }
    if target.contains(':') {
        target.to_string()
    } else {
        format!("{target}:{port}")
    }
}

fn invalid(msg: &str) -> ConfigError {
    ConfigError::Invalid(msg.to_string())
}

fn check_url(field: &str, raw: &str) -> Result<(), ConfigError> {
    let parsed = Url::parse(raw)
        .map_err(|e| invalid(&format!("{field} is not a valid URL (`{raw}`): {e}")))?;
    if !matches!(parsed.scheme(), "http" | "https") {
        return Err(invalid(&format!("{field} must be an http(s) URL, got `{raw}`")));
    }
    if parsed.host_str().is_none_or(str::is_empty) {
        return Err(invalid(&format!("{field} has no host: `{raw}`")));
    }
    Ok(())
}
