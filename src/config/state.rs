// Application state module
// Bundles configuration with the storage components shared by every request

use std::sync::Arc;

use super::types::Config;
use crate::storage::{naming, DirectoryLister, DiskStore, NameGenerator};

/// Application state
pub struct AppState {
    pub config: Config,
    pub store: DiskStore,
    pub lister: DirectoryLister,
}

impl AppState {
    /// Build state using the naming strategy from configuration
    pub fn new(config: Config) -> Arc<Self> {
        let names = naming::from_strategy(config.storage.naming);
        Self::with_names(config, names)
    }

    /// Build state with an explicit name generator
    pub fn with_names(config: Config, names: Box<dyn NameGenerator>) -> Arc<Self> {
        let store = DiskStore::new(&config.storage, names);
        let lister = DirectoryLister::new(&config.storage);

        Arc::new(Self {
            config,
            store,
            lister,
        })
    }
}
