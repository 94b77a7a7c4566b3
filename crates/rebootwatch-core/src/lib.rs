pub mod config;
pub mod types;

pub use config::{
    ConfigError, MonitorSettings, NotifySettings, OutageSettings, RebootwatchConfig, Settings,
    SnmpSettings,
};
pub use types::*;
