//! Generic plugin repository and registry.

use std::collections::HashMap;
use std::sync::Arc;

use crate::model::identifier::Identifier;
use crate::plugin::traits::{FileFormat, Plugin, ProcessorFactory};

/// Generic container for plugins of a specific type.
pub struct PluginRepository<T: ?Sized> {
    plugins: HashMap<Identifier, Arc<T>>,
}

impl<T: ?Sized + Plugin> PluginRepository<T> {
    pub fn new() -> Self {
        Self {
            plugins: HashMap::new(),
        }
    }

    pub fn register(&mut self, id: Identifier, plugin: Arc<T>) -> Option<Arc<T>> {
        self.plugins.insert(id, plugin)
    }

    pub fn get(&self, id: Identifier) -> Option<&Arc<T>> {
        self.plugins.get(&id)
    }

    pub fn find_by_name(&self, name: &str) -> Option<Identifier> {
        self.plugins
            .iter()
            .find(|(_, plugin)| plugin.name() == name)
            .map(|(id, _)| *id)
    }

    pub fn iter(&self) -> impl Iterator<Item = (Identifier, &Arc<T>)> {
        self.plugins.iter().map(|(id, plugin)| (*id, plugin))
    }
}

impl<T: ?Sized + Plugin> Default for PluginRepository<T> {
    fn default() -> Self {
        Self::new()
    }
}

/// Internal registry holding all plugin repositories.
#[derive(Default)]
pub(crate) struct PluginRegistry {
    pub formats: PluginRepository<dyn FileFormat>,
    pub processors: PluginRepository<dyn ProcessorFactory>,
}
