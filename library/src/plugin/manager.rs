//! Plugin manager for registering and looking up formats and processors.

use std::sync::{Arc, PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};

use log::{debug, warn};

use crate::error::LibraryError;
use crate::model::identifier::{Identifier, IdentifierInterner};
use crate::plugin::PluginCategory;
use crate::plugin::repository::PluginRegistry;
use crate::plugin::traits::{FileFormat, Plugin, ProcessorFactory};

/// Registry entry as shown to callers.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PluginInfo {
    pub id: Identifier,
    pub name: String,
    pub version: u32,
    pub category: PluginCategory,
}

/// Main plugin manager.
pub struct PluginManager {
    identifiers: Arc<IdentifierInterner>,
    inner: RwLock<PluginRegistry>,
}

impl PluginManager {
    pub fn new(identifiers: Arc<IdentifierInterner>) -> Self {
        Self {
            identifiers,
            inner: RwLock::new(PluginRegistry::default()),
        }
    }

    /// A manager with the builtin formats and processors registered.
    pub fn with_builtins(identifiers: Arc<IdentifierInterner>) -> Self {
        let manager = Self::new(identifiers);
        crate::builtin::register_builtins(&manager);
        manager
    }

    pub fn identifiers(&self) -> &Arc<IdentifierInterner> {
        &self.identifiers
    }

    fn read(&self) -> RwLockReadGuard<'_, PluginRegistry> {
        self.inner.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write(&self) -> RwLockWriteGuard<'_, PluginRegistry> {
        self.inner.write().unwrap_or_else(PoisonError::into_inner)
    }

    fn intern<T: Plugin + ?Sized>(&self, plugin: &T) -> Identifier {
        self.identifiers.intern(plugin.name(), plugin.uuid())
    }

    pub fn register_format(&self, plugin: Arc<dyn FileFormat>) -> Identifier {
        let id = self.intern(plugin.as_ref());
        debug!("PluginManager: registering format '{}' as {}", plugin.name(), id);
        if self.write().formats.register(id, plugin).is_some() {
            warn!("Format {} was registered twice; keeping the latest", id);
        }
        id
    }

    pub fn register_processor(&self, plugin: Arc<dyn ProcessorFactory>) -> Identifier {
        let id = self.intern(plugin.as_ref());
        debug!(
            "PluginManager: registering processor '{}' as {}",
            plugin.name(),
            id
        );
        if self.write().processors.register(id, plugin).is_some() {
            warn!("Processor {} was registered twice; keeping the latest", id);
        }
        id
    }

    pub fn lookup_format(&self, id: Identifier) -> Result<Arc<dyn FileFormat>, LibraryError> {
        self.read()
            .formats
            .get(id)
            .cloned()
            .ok_or_else(|| LibraryError::RegistryLookup(self.identifiers.describe(id)))
    }

    pub fn lookup_processor(
        &self,
        id: Identifier,
    ) -> Result<Arc<dyn ProcessorFactory>, LibraryError> {
        self.read()
            .processors
            .get(id)
            .cloned()
            .ok_or_else(|| LibraryError::RegistryLookup(self.identifiers.describe(id)))
    }

    pub fn format_id(&self, name: &str) -> Option<Identifier> {
        self.read().formats.find_by_name(name)
    }

    pub fn processor_id(&self, name: &str) -> Option<Identifier> {
        self.read().processors.find_by_name(name)
    }

    /// Version of whichever plugin is registered under `id`.
    pub fn version_of(&self, id: Identifier) -> Option<u32> {
        let inner = self.read();
        inner
            .formats
            .get(id)
            .map(|p| p.version())
            .or_else(|| inner.processors.get(id).map(|p| p.version()))
    }

    pub fn plugins(&self) -> Vec<PluginInfo> {
        let inner = self.read();
        let mut infos: Vec<PluginInfo> = inner
            .formats
            .iter()
            .map(|(id, p)| info(id, p.as_ref()))
            .chain(inner.processors.iter().map(|(id, p)| info(id, p.as_ref())))
            .collect();
        infos.sort_by_key(|info| info.id);
        infos
    }
}

fn info<T: Plugin + ?Sized>(id: Identifier, plugin: &T) -> PluginInfo {
    PluginInfo {
        id,
        name: plugin.display_name(),
        version: plugin.version(),
        category: plugin.category(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::builtin::formats::INTEGER_TEXT_FORMAT;

    #[test]
    fn test_builtins_are_registered() {
        let manager = PluginManager::with_builtins(Arc::new(IdentifierInterner::new()));
        let id = manager.format_id(INTEGER_TEXT_FORMAT).unwrap();
        assert!(manager.lookup_format(id).is_ok());
        assert!(manager.lookup_processor(id).is_err());
        assert_eq!(manager.version_of(id), Some(1));
        assert!(manager.plugins().iter().any(|p| p.category == PluginCategory::Processor));
    }

    #[test]
    fn test_unknown_identifier_is_a_lookup_error() {
        let identifiers = Arc::new(IdentifierInterner::new());
        let stray = identifiers.intern("nobody.registered", uuid::Uuid::new_v4());
        let manager = PluginManager::new(identifiers);
        match manager.lookup_format(stray) {
            Err(LibraryError::RegistryLookup(name)) => assert_eq!(name, "nobody.registered"),
            other => panic!("unexpected lookup result: {:?}", other.map(|_| ())),
        }
    }
}
