//! rebootwatch-transport — network implementations of the health
//! pipeline's collaborator traits.
//!
//! | Trait          | Implementation      | Wire                          |
//! |----------------|---------------------|-------------------------------|
//! | `StatusSource` | [`MadminClient`]    | HTTP GET `/get_status`, JSON  |
//! | `PowerControl` | [`SnmpPowerControl`]| SNMPv2c SetRequest over UDP   |
//! | `Notifier`     | [`DiscordWebhook`]  | Discord webhook messages      |
//! | `Notifier`     | [`LogNotifier`]     | log lines only                |
//! | `OutageProbe`  | [`HttpBanProbe`]    | HTTP GET, 403 means banned    |

pub mod ban_probe;
pub mod discord;
pub mod log_notifier;
pub mod madmin;
pub mod snmp;

pub use ban_probe::HttpBanProbe;
pub use discord::DiscordWebhook;
pub use log_notifier::LogNotifier;
pub use madmin::MadminClient;
pub use snmp::SnmpPowerControl;
