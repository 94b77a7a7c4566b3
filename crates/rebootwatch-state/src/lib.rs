//! rebootwatch-state — in-memory device registry for rebootwatch.
//!
//! Holds the mutable remediation state of every configured device
//! (reboot count, last reboot time, open alert handle) plus the
//! process-wide ban flag. Nothing here is persisted: the registry is
//! rebuilt from configuration on every start.
//!
//! The `DeviceStore` is owned by the poll orchestrator and mutated through
//! `&mut`, so evaluation of a single device is always serialized.

pub mod error;
pub mod store;
pub mod types;

pub use error::{StateError, StateResult};
pub use store::DeviceStore;
pub use types::*;
