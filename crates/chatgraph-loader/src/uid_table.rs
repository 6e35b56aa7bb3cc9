//! Temporary id → permanent uid, per entity kind.

use chatgraph_dgraph::Uid;
use chatgraph_ingest_csv::{EntityKind, TempId};
use std::collections::BTreeMap;

use crate::LoadError;

/// Uids assigned during one pipeline run.
///
/// Append-only: a pair may be merged again, but a temp id never changes its
/// uid. Lookups of ids that were never merged fail with
/// [`LoadError::Resolution`].
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct UidTable {
    tables: BTreeMap<EntityKind, BTreeMap<TempId, Uid>>,
}

impl UidTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record the mapping returned by one entity load.
    ///
    /// Either every pair is merged or none is.
    pub fn merge(&mut self, kind: EntityKind, mapping: BTreeMap<TempId, Uid>) -> Result<(), LoadError> {
        let table = self.tables.entry(kind).or_default();
        for (temp_id, uid) in &mapping {
            if let Some(existing) = table.get(temp_id) {
                if existing != uid {
                    return Err(LoadError::Conflict {
                        kind,
                        temp_id: temp_id.to_string(),
                        existing: existing.clone(),
                        new: uid.clone(),
                    });
                }
            }
        }
        table.extend(mapping);
        Ok(())
    }

    pub fn resolve(&self, kind: EntityKind, temp_id: &TempId) -> Result<&Uid, LoadError> {
        self.tables
            .get(&kind)
            .and_then(|t| t.get(temp_id))
            .ok_or_else(|| LoadError::Resolution {
                kind,
                temp_id: temp_id.to_string(),
            })
    }

    /// Resolve a list, keeping its order. Fails on the first unknown id.
    pub fn resolve_all(&self, kind: EntityKind, temp_ids: &[TempId]) -> Result<Vec<Uid>, LoadError> {
        temp_ids
            .iter()
            .map(|id| self.resolve(kind, id).cloned())
            .collect()
    }

    pub fn len(&self, kind: EntityKind) -> usize {
        self.tables.get(&kind).map_or(0, BTreeMap::len)
    }

    pub fn is_empty(&self) -> bool {
        self.tables.values().all(BTreeMap::is_empty)
    }

    /// Every uid recorded so far, grouped by kind in load order of kinds.
    pub fn all_uids(&self) -> Vec<Uid> {
        self.tables
            .values()
            .flat_map(|t| t.values().cloned())
            .collect()
    }
}
