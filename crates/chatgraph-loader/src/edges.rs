//! Edge materialization.
//!
//! Planning is pure: records plus the [`UidTable`] give a list of
//! [`EdgeMutation`]s, one per (source row, relation) with a non-empty target
//! list. Repeated targets in a cell collapse to their first occurrence, so the
//! edge count matches what the server stores. Applying sends them one by one inside a single transaction per pass.

use chatgraph_dgraph::{with_txn, GraphClient, Mutation, Transaction, Uid};
use chatgraph_ingest_csv::{
    EntityKind, GroupRecord, MessageRecord, MessageTarget, StatusRecord, TempId, UserRecord,
};
use serde_json::{json, Value};
use std::collections::BTreeSet;
use std::fmt;

use crate::{LoadError, UidTable};

// ============================================================================
// Relations
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Relation {
    /// Group → User (many)
    Has,
    /// User → Message (many)
    Send,
    /// User → Status (many)
    Post,
    /// Message → User (one)
    Receive,
    /// Message → Group (one)
    BelongsTo,
    /// Status → User (many)
    Seen,
}

impl Relation {
    pub fn predicate(self) -> &'static str {
        match self {
            Relation::Has => "HAS",
            Relation::Send => "SEND",
            Relation::Post => "POST",
            Relation::Receive => "RECEIVE",
            Relation::BelongsTo => "BELONGS_TO",
            Relation::Seen => "SEEN",
        }
    }

    pub fn source_kind(self) -> EntityKind {
        match self {
            Relation::Has => EntityKind::Group,
            Relation::Send | Relation::Post => EntityKind::User,
            Relation::Receive | Relation::BelongsTo => EntityKind::Message,
            Relation::Seen => EntityKind::Status,
        }
    }

    pub fn target_kind(self) -> EntityKind {
        match self {
            Relation::Has | Relation::Receive | Relation::Seen => EntityKind::User,
            Relation::Send => EntityKind::Message,
            Relation::Post => EntityKind::Status,
            Relation::BelongsTo => EntityKind::Group,
        }
    }
}

impl fmt::Display for Relation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.predicate())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EdgeTargets {
    Single(Uid),
    Many(Vec<Uid>),
}

impl EdgeTargets {
    pub fn len(&self) -> usize {
        match self {
            EdgeTargets::Single(_) => 1,
            EdgeTargets::Many(uids) => uids.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn uids(&self) -> Vec<&Uid> {
        match self {
            EdgeTargets::Single(uid) => vec![uid],
            EdgeTargets::Many(uids) => uids.iter().collect(),
        }
    }
}

/// Edges of one relation leaving one source node.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EdgeMutation {
    pub source: Uid,
    pub relation: Relation,
    pub targets: EdgeTargets,
}

impl EdgeMutation {
    pub fn to_mutation(&self) -> Mutation {
        let targets = match &self.targets {
            EdgeTargets::Single(uid) => uid.to_ref(),
            EdgeTargets::Many(uids) => Value::Array(uids.iter().map(Uid::to_ref).collect()),
        };
        let mut object = json!({ "uid": self.source.as_str() });
        if let Value::Object(map) = &mut object {
            map.insert(self.relation.predicate().to_string(), targets);
        }
        Mutation::set_one(object)
    }
}

// ============================================================================
// Planning
// ============================================================================

fn plan_many(
    table: &UidTable,
    relation: Relation,
    source: &TempId,
    targets: &[TempId],
) -> Result<Option<EdgeMutation>, LoadError> {
    if targets.is_empty() {
        return Ok(None);
    }
    // A repeated id is one edge; keep its first position.
    let mut seen = BTreeSet::new();
    let mut uids = table.resolve_all(relation.target_kind(), targets)?;
    uids.retain(|uid| seen.insert(uid.clone()));
    Ok(Some(EdgeMutation {
        source: table.resolve(relation.source_kind(), source)?.clone(),
        relation,
        targets: EdgeTargets::Many(uids),
    }))
}

/// `HAS` for every group with members.
pub fn plan_group_members(
    groups: &[GroupRecord],
    table: &UidTable,
) -> Result<Vec<EdgeMutation>, LoadError> {
    let mut planned = Vec::new();
    for group in groups {
        planned.extend(plan_many(table, Relation::Has, &group.uid, &group.has)?);
    }
    Ok(planned)
}

/// `SEND` for every user, then `RECEIVE`/`BELONGS_TO` for every message.
pub fn plan_message_links(
    users: &[UserRecord],
    messages: &[MessageRecord],
    table: &UidTable,
) -> Result<Vec<EdgeMutation>, LoadError> {
    let mut planned = Vec::new();
    for user in users {
        planned.extend(plan_many(table, Relation::Send, &user.uid, &user.send)?);
    }
    for message in messages {
        let (relation, target) = match &message.target {
            MessageTarget::ToUser(user) => (Relation::Receive, user),
            MessageTarget::ToGroup(group) => (Relation::BelongsTo, group),
        };
        planned.push(EdgeMutation {
            source: table.resolve(EntityKind::Message, &message.uid)?.clone(),
            relation,
            targets: EdgeTargets::Single(table.resolve(relation.target_kind(), target)?.clone()),
        });
    }
    Ok(planned)
}

/// `POST` for every user, then `SEEN` for every status.
pub fn plan_status_links(
    users: &[UserRecord],
    statuses: &[StatusRecord],
    table: &UidTable,
) -> Result<Vec<EdgeMutation>, LoadError> {
    let mut planned = Vec::new();
    for user in users {
        planned.extend(plan_many(table, Relation::Post, &user.uid, &user.post)?);
    }
    for status in statuses {
        planned.extend(plan_many(table, Relation::Seen, &status.uid, &status.seen)?);
    }
    Ok(planned)
}

// ============================================================================
// Applying
// ============================================================================

/// Send every edge mutation of one pass and commit once.
///
/// Returns the number of edges written (targets, not mutations).
pub fn apply_edges<C>(client: &C, pass: &str, edges: &[EdgeMutation]) -> Result<usize, LoadError>
where
    C: GraphClient + ?Sized,
{
    if edges.is_empty() {
        tracing::info!(pass, "no edges to write");
        return Ok(0);
    }

    let written = with_txn(client, |txn| {
        let mut written = 0;
        for edge in edges {
            tracing::debug!(
                pass,
                source = %edge.source,
                relation = %edge.relation,
                targets = edge.targets.len(),
                "edge mutation"
            );
            txn.mutate(&edge.to_mutation())?;
            written += edge.targets.len();
        }
        Ok::<_, LoadError>(written)
    })?;

    tracing::info!(pass, mutations = edges.len(), edges = written, "edge pass committed");
    Ok(written)
}
