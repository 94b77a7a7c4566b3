//! Assembles concrete transports from validated settings.

use std::sync::Arc;

use anyhow::Result;
use tracing::info;

use rebootwatch_core::Settings;
use rebootwatch_health::{Collaborators, Notifier, OutageProbe};
use rebootwatch_transport::{
    DiscordWebhook, HttpBanProbe, LogNotifier, MadminClient, SnmpPowerControl,
};

pub fn collaborators(settings: &Settings) -> Result<Collaborators> {
    let timeout = settings.monitor.request_timeout;

    let source = Arc::new(MadminClient::new(timeout)?);
    let power = Arc::new(SnmpPowerControl::new(&settings.snmp, timeout));
    info!(snmp_target = %settings.snmp.target, "snmp power control configured");

    let notifier: Arc<dyn Notifier> = match &settings.notify {
        Some(notify) => {
            info!("discord webhook notifications enabled");
            Arc::new(DiscordWebhook::new(notify, timeout)?)
        }
        None => {
            info!("no webhook configured, alerts go to the log");
            Arc::new(LogNotifier::new())
        }
    };

    let probe = match &settings.outage {
        Some(outage) => {
            info!(url = %outage.probe_url, "outage check enabled");
            Some(Arc::new(HttpBanProbe::new(outage.probe_url.clone(), timeout)?) as Arc<dyn OutageProbe>)
        }
        None => None,
    };

    Ok(Collaborators {
        source,
        power,
        notifier,
        probe,
    })
}

/// One-paragraph summary printed by `rebootd check`.
pub fn describe(settings: &Settings) -> String {
    let monitor = &settings.monitor;
    let mut lines = vec![
        format!(
            "servers: {} ({})",
            settings.servers.len(),
            settings
                .servers
                .iter()
                .map(|s| s.id.as_str())
                .collect::<Vec<_>>()
                .join(", ")
        ),
        format!("devices: {}", settings.devices.len()),
        format!(
            "stale after {} min, reboot cooldown {} min, poll every {}s",
            monitor.stale_after_minutes,
            monitor.reboot_cooldown_minutes,
            monitor.poll_interval.as_secs()
        ),
        format!("snmp target: {}", settings.snmp.target),
    ];
    lines.push(match &settings.notify {
        Some(_) => "notifications: discord webhook".to_string(),
        None => "notifications: log only".to_string(),
    });
    lines.push(match &settings.outage {
        Some(outage) => format!(
            "outage check: {} (ban lasts ~{} min)",
            outage.probe_url, outage.ban_duration_minutes
        ),
        None => "outage check: disabled".to_string(),
    });
    lines.join("\n")
}
