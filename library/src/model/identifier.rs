//! Process-local interning of factory identifiers.
//!
//! Registries and serialized graphs refer to formats and processors by an
//! [`Identifier`], a small discriminator handed out by an
//! [`IdentifierInterner`]. Discriminators are only stable inside one
//! interner; the name/UUID pair behind them is what travels between
//! processes (see `GraphBundle`).

use std::collections::HashMap;
use std::fmt;
use std::sync::{PoisonError, RwLock};

use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Serialize, Deserialize, Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[serde(transparent)]
pub struct Identifier(u32);

impl Identifier {
    pub fn discriminator(&self) -> u32 {
        self.0
    }
}

impl fmt::Display for Identifier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq, Hash)]
pub struct IdentifierKey {
    pub name: String,
    pub uuid: Uuid,
}

impl fmt::Display for IdentifierKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({})", self.name, self.uuid)
    }
}

/// One entry of an interner, as recorded next to a serialized graph.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq)]
pub struct IdentifierSnapshot {
    pub identifier: Identifier,
    pub key: IdentifierKey,
}

#[derive(Default)]
struct InternTable {
    by_key: HashMap<IdentifierKey, Identifier>,
    keys: Vec<IdentifierKey>,
}

/// Interning table behind a single reader/writer lock.
///
/// Lookups take the shared lock; only a first-time registration takes the
/// exclusive one.
#[derive(Default)]
pub struct IdentifierInterner {
    table: RwLock<InternTable>,
}

impl IdentifierInterner {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn intern(&self, name: &str, uuid: Uuid) -> Identifier {
        let key = IdentifierKey {
            name: name.to_string(),
            uuid,
        };
        if let Some(id) = self.read_table(|table| table.by_key.get(&key).copied()) {
            return id;
        }

        let mut table = self.table.write().unwrap_or_else(PoisonError::into_inner);
        // Another registration may have won the race between the two locks.
        if let Some(id) = table.by_key.get(&key) {
            return *id;
        }
        let id = Identifier(table.keys.len() as u32);
        table.keys.push(key.clone());
        table.by_key.insert(key, id);
        id
    }

    pub fn find(&self, name: &str, uuid: Uuid) -> Option<Identifier> {
        let key = IdentifierKey {
            name: name.to_string(),
            uuid,
        };
        self.read_table(|table| table.by_key.get(&key).copied())
    }

    pub fn resolve(&self, id: Identifier) -> Option<IdentifierKey> {
        self.read_table(|table| table.keys.get(id.0 as usize).cloned())
    }

    /// Name for diagnostics; unknown discriminators render as `#n`.
    pub fn describe(&self, id: Identifier) -> String {
        self.resolve(id)
            .map(|key| key.name)
            .unwrap_or_else(|| id.to_string())
    }

    pub fn snapshot_of(&self, ids: impl IntoIterator<Item = Identifier>) -> Vec<IdentifierSnapshot> {
        let mut ids: Vec<Identifier> = ids.into_iter().collect();
        ids.sort();
        ids.dedup();
        self.read_table(|table| {
            ids.iter()
                .filter_map(|id| {
                    table.keys.get(id.0 as usize).map(|key| IdentifierSnapshot {
                        identifier: *id,
                        key: key.clone(),
                    })
                })
                .collect()
        })
    }

    pub fn len(&self) -> usize {
        self.read_table(|table| table.keys.len())
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn read_table<R>(&self, f: impl FnOnce(&InternTable) -> R) -> R {
        let table = self.table.read().unwrap_or_else(PoisonError::into_inner);
        f(&table)
    }
}
