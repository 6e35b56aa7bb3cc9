//! Entity batches: one set-mutation and one commit per kind.

use chatgraph_dgraph::{with_txn, GraphClient, Mutation, Transaction, Uid};
use chatgraph_ingest_csv::{
    CsvEntity, EntityKind, GroupRecord, MessageRecord, StatusRecord, TempId, UserRecord,
};
use serde_json::{json, Map, Value};
use std::collections::{BTreeMap, BTreeSet};

use crate::LoadError;

/// An entity that becomes one node.
///
/// Only scalar predicates are written here; relationship columns are
/// materialized later by the edge passes.
pub trait GraphEntity: CsvEntity {
    fn predicates(&self) -> Map<String, Value>;

    /// The node object submitted in the set mutation.
    fn to_node(&self) -> Value {
        let mut node = Map::new();
        node.insert("uid".to_string(), Value::String(self.temp_id().blank_node()));
        node.insert(
            "dgraph.type".to_string(),
            Value::String(Self::KIND.dgraph_type().to_string()),
        );
        node.extend(self.predicates());
        Value::Object(node)
    }
}

fn predicates<const N: usize>(pairs: [(&str, Value); N]) -> Map<String, Value> {
    pairs
        .into_iter()
        .map(|(name, value)| (name.to_string(), value))
        .collect()
}

impl GraphEntity for UserRecord {
    fn predicates(&self) -> Map<String, Value> {
        predicates([
            ("name", json!(self.name)),
            ("description", json!(self.description)),
            ("phone", json!(self.phone)),
            ("location", json!(self.location)),
        ])
    }
}

impl GraphEntity for GroupRecord {
    fn predicates(&self) -> Map<String, Value> {
        predicates([
            ("name", json!(self.name)),
            ("description", json!(self.description)),
        ])
    }
}

impl GraphEntity for MessageRecord {
    fn predicates(&self) -> Map<String, Value> {
        predicates([
            ("content", json!(self.content)),
            ("reactions", json!(self.reactions)),
            ("sendAt", json!(self.send_at)),
        ])
    }
}

impl GraphEntity for StatusRecord {
    fn predicates(&self) -> Map<String, Value> {
        predicates([
            ("content", json!(self.content)),
            ("text", json!(self.text)),
            ("postedAt", json!(self.posted_at)),
        ])
    }
}

/// Create every record as a node in one transaction.
///
/// Returns the uid assigned to each record's temporary id. The batch fails,
/// and its transaction is discarded, when a temp id repeats or when the
/// server's assignment does not cover the batch with distinct uids.
pub fn load_entities<C, T>(client: &C, records: &[T]) -> Result<BTreeMap<TempId, Uid>, LoadError>
where
    C: GraphClient + ?Sized,
    T: GraphEntity,
{
    let kind = T::KIND;
    let mut seen = BTreeSet::new();
    for record in records {
        if !seen.insert(record.temp_id()) {
            return Err(LoadError::Duplicate {
                kind,
                temp_id: record.temp_id().to_string(),
            });
        }
    }
    if records.is_empty() {
        tracing::info!(%kind, "empty batch, nothing to load");
        return Ok(BTreeMap::new());
    }

    let mutation = Mutation::set(records.iter().map(T::to_node).collect());
    let mapping = with_txn(client, |txn| {
        let assigned = txn.mutate(&mutation)?;
        collect_assignment(kind, records, &assigned.uids)
    })?;

    tracing::info!(%kind, count = mapping.len(), "entity batch committed");
    Ok(mapping)
}

fn collect_assignment<T: CsvEntity>(
    kind: EntityKind,
    records: &[T],
    uids: &BTreeMap<String, Uid>,
) -> Result<BTreeMap<TempId, Uid>, LoadError> {
    let mut mapping = BTreeMap::new();
    let mut distinct = BTreeSet::new();
    for record in records {
        let temp_id = record.temp_id();
        let uid = uids
            .get(temp_id.as_str())
            .filter(|uid| !uid.as_str().is_empty())
            .ok_or_else(|| LoadError::Assignment {
                kind,
                message: format!("no uid for `{temp_id}`"),
            })?;
        if !distinct.insert(uid.clone()) {
            return Err(LoadError::Assignment {
                kind,
                message: format!("uid {uid} assigned twice (at `{temp_id}`)"),
            });
        }
        mapping.insert(temp_id.clone(), uid.clone());
    }
    Ok(mapping)
}
