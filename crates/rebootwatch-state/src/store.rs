//! DeviceStore — the registry of configured devices and their state.

use std::collections::{BTreeMap, HashMap, HashSet};

use tracing::debug;

use rebootwatch_core::{DeviceName, VendorHandle};

use crate::error::{StateError, StateResult};
use crate::types::DeviceState;

/// Registry of every configured device, keyed by name.
///
/// Devices are inserted once from configuration and never removed. Lookups
/// are by name only, whichever server happened to report the device.
#[derive(Debug, Default)]
pub struct DeviceStore {
    devices: HashMap<DeviceName, DeviceState>,
    /// Unregistered names already reported once.
    unknown_seen: HashSet<DeviceName>,
}

impl DeviceStore {
    /// Build the registry from the configured name → vendor handle map.
    pub fn from_registry(registry: &BTreeMap<DeviceName, VendorHandle>) -> Self {
        let devices = registry
            .iter()
            .map(|(name, handle)| (name.clone(), DeviceState::new(name.clone(), handle.clone())))
            .collect::<HashMap<_, _>>();
        debug!(devices = devices.len(), "device registry built");
        Self {
            devices,
            unknown_seen: HashSet::new(),
        }
    }

    /// Look up a registered device.
    pub fn get(&self, name: &str) -> Option<&DeviceState> {
        self.devices.get(name)
    }

    /// Mutable access to a registered device; unknown names are an error.
    pub fn get_mut(&mut self, name: &str) -> StateResult<&mut DeviceState> {
        self.devices
            .get_mut(name)
            .ok_or_else(|| StateError::UnknownDevice(name.to_string()))
    }

    /// Whether `name` is in the registry.
    pub fn contains(&self, name: &str) -> bool {
        self.devices.contains_key(name)
    }

    /// Record that `name` was reported but is not registered.
    ///
    /// Returns `true` the first time a given name is seen, so callers can
    /// warn once and stay quiet afterwards.
    pub fn note_unknown(&mut self, name: &str) -> bool {
        if self.unknown_seen.contains(name) {
            return false;
        }
        self.unknown_seen.insert(name.to_string())
    }

    /// Number of registered devices.
    pub fn len(&self) -> usize {
        self.devices.len()
    }

    pub fn is_empty(&self) -> bool {
        self.devices.is_empty()
    }

    /// Iterate over all registered devices, in no particular order.
    pub fn iter(&self) -> impl Iterator<Item = &DeviceState> {
        self.devices.values()
    }

    /// Number of devices currently in the alerted state.
    pub fn alerted_count(&self) -> usize {
        self.devices.values().filter(|d| d.is_alerted()).count()
    }
}
