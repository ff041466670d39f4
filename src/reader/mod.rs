//! # Reader State
//!
//! Live view of what the reader module reports:
//!
//! - [`tags`] - bounded cache of recently seen tags, partitioned by collection mode
//! - [`power`] - last known antenna power levels and the in-flight query flag
//!
//! plus [`InventoryState`], which tracks which collection modes asked for inventory.
//! The hardware inventory is running exactly when at least one mode wants it; stopping
//! one mode never silently stops the other.

pub mod power;
pub mod tags;

use serde::{Deserialize, Serialize};

pub use power::{PowerCache, PowerLevels};
pub use tags::{Tag, TagRecord, TagStore, UpsertOutcome};

/// Which client-facing channel a batch of sightings is attributed to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CollectionMode {
    /// Local web console.
    Local,
    /// Remote broker.
    Remote,
}

impl CollectionMode {
    pub const ALL: [CollectionMode; 2] = [CollectionMode::Local, CollectionMode::Remote];

    pub fn as_str(&self) -> &'static str {
        match self {
            CollectionMode::Local => "local",
            CollectionMode::Remote => "remote",
        }
    }
}

/// What the hardware must do after a mode transition.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HardwareAction {
    Start,
    Stop,
    None,
}

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct InventoryState {
    local: bool,
    remote: bool,
}

impl InventoryState {
    pub fn is_enabled(&self, mode: CollectionMode) -> bool {
        match mode {
            CollectionMode::Local => self.local,
            CollectionMode::Remote => self.remote,
        }
    }

    /// Derived on every read; never stored.
    pub fn hardware_enabled(&self) -> bool {
        self.local || self.remote
    }

    pub fn enabled_modes(&self) -> Vec<CollectionMode> {
        CollectionMode::ALL
            .into_iter()
            .filter(|m| self.is_enabled(*m))
            .collect()
    }

    pub fn enable(&mut self, mode: CollectionMode) -> HardwareAction {
        let was_running = self.hardware_enabled();
        self.set(mode, true);
        if was_running {
            HardwareAction::None
        } else {
            HardwareAction::Start
        }
    }

    pub fn disable(&mut self, mode: CollectionMode) -> HardwareAction {
        let was_running = self.hardware_enabled();
        self.set(mode, false);
        if was_running && !self.hardware_enabled() {
            HardwareAction::Stop
        } else {
            HardwareAction::None
        }
    }

    fn set(&mut self, mode: CollectionMode, on: bool) {
        match mode {
            CollectionMode::Local => self.local = on,
            CollectionMode::Remote => self.remote = on,
        }
    }
}
