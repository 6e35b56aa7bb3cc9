//! In-process stand-in for a Dgraph alpha.
//!
//! `MemoryGraph` keeps nodes as JSON objects keyed by uid. It mirrors the parts
//! of Dgraph the loader relies on:
//!
//! - blank nodes (`"_:x"`) get fresh uids when the mutation is sent, and the
//!   same blank name within one mutation maps to one uid;
//! - nothing is visible until commit; discard drops the buffered operations;
//! - list predicates accumulate (set semantics), scalar predicates replace;
//! - deleting `{"uid": U}` removes the node, deleting `{"uid": U, "p": ...}`
//!   removes just those values.
//!
//! Queries are not evaluated. They are recorded and answered from a queue of
//! canned `data` objects (an empty object when the queue is empty).

use parking_lot::Mutex;
use serde_json::{Map, Value};
use std::collections::{BTreeMap, VecDeque};
use std::sync::Arc;

use crate::{Assigned, DgraphError, GraphClient, Mutation, Operation, Transaction, Uid, Variables};

type Node = Map<String, Value>;

#[derive(Default)]
struct State {
    next_uid: u64,
    nodes: BTreeMap<Uid, Node>,
    commits: usize,
    commit_attempts: usize,
    discards: usize,
    drops: usize,
    schema_history: Vec<String>,
    mutations: Vec<Mutation>,
    queries: Vec<(String, Variables)>,
    responses: VecDeque<Value>,
    fail_commit_number: Option<usize>,
    fail_mutation_containing: Option<String>,
}

impl State {
    fn fresh_uid(&mut self) -> Uid {
        self.next_uid += 1;
        Uid::new(format!("0x{:x}", self.next_uid))
    }
}

/// Cheaply cloneable handle; clones share the same graph.
#[derive(Clone, Default)]
pub struct MemoryGraph {
    state: Arc<Mutex<State>>,
}

impl MemoryGraph {
    pub fn new() -> Self {
        Self::default()
    }

    // ------------------------------------------------------------------
    // Inspection
    // ------------------------------------------------------------------

    pub fn node(&self, uid: &Uid) -> Option<Node> {
        self.state.lock().nodes.get(uid).cloned()
    }

    pub fn node_count(&self) -> usize {
        self.state.lock().nodes.len()
    }

    /// Uids of committed nodes whose `dgraph.type` is `ty`, in uid order.
    pub fn nodes_of_type(&self, ty: &str) -> Vec<Uid> {
        let state = self.state.lock();
        state
            .nodes
            .iter()
            .filter(|(_, node)| has_type(node, ty))
            .map(|(uid, _)| uid.clone())
            .collect()
    }

    /// First committed node of type `ty` whose `name` equals `name`.
    pub fn find_by_name(&self, ty: &str, name: &str) -> Option<Uid> {
        let state = self.state.lock();
        state
            .nodes
            .iter()
            .find(|(_, node)| has_type(node, ty) && node.get("name") == Some(&Value::from(name)))
            .map(|(uid, _)| uid.clone())
    }

    /// Targets of `predicate` on `uid`, in insertion order. Works for both
    /// single (`{"uid": ..}`) and list edges.
    pub fn edge_targets(&self, uid: &Uid, predicate: &str) -> Vec<Uid> {
        let state = self.state.lock();
        let Some(value) = state.nodes.get(uid).and_then(|n| n.get(predicate)) else {
            return Vec::new();
        };
        let refs: Vec<&Value> = match value {
            Value::Array(items) => items.iter().collect(),
            other => vec![other],
        };
        refs.into_iter()
            .filter_map(|v| v.get("uid").and_then(Value::as_str))
            .map(Uid::new)
            .collect()
    }

    pub fn commit_count(&self) -> usize {
        self.state.lock().commits
    }

    /// Read-write transactions rolled back while still open.
    pub fn discarded_count(&self) -> usize {
        self.state.lock().discards
    }

    pub fn drop_count(&self) -> usize {
        self.state.lock().drops
    }

    pub fn schema_history(&self) -> Vec<String> {
        self.state.lock().schema_history.clone()
    }

    /// Every mutation accepted by `mutate`, committed or not.
    pub fn recorded_mutations(&self) -> Vec<Mutation> {
        self.state.lock().mutations.clone()
    }

    pub fn recorded_queries(&self) -> Vec<(String, Variables)> {
        self.state.lock().queries.clone()
    }

    // ------------------------------------------------------------------
    // Scripting
    // ------------------------------------------------------------------

    /// Queue the `data` object returned by the next query.
    pub fn push_query_response(&self, data: Value) {
        self.state.lock().responses.push_back(data);
    }

    /// Make the `n`-th commit attempt (1-based, counted from now on) fail.
    pub fn fail_commit_number(&self, n: usize) {
        let mut state = self.state.lock();
        state.fail_commit_number = Some(state.commit_attempts + n);
    }

    /// Reject any mutation whose JSON contains `needle`.
    pub fn fail_mutation_containing(&self, needle: &str) {
        self.state.lock().fail_mutation_containing = Some(needle.to_string());
    }

    pub fn clear_failures(&self) {
        let mut state = self.state.lock();
        state.fail_commit_number = None;
        state.fail_mutation_containing = None;
    }
}

fn has_type(node: &Node, ty: &str) -> bool {
    match node.get("dgraph.type") {
        Some(Value::String(t)) => t == ty,
        Some(Value::Array(ts)) => ts.iter().any(|t| t.as_str() == Some(ty)),
        _ => false,
    }
}

impl GraphClient for MemoryGraph {
    type Txn = MemoryTxn;

    fn alter(&self, op: &Operation) -> Result<(), DgraphError> {
        let mut state = self.state.lock();
        match op {
            Operation::Schema(text) => state.schema_history.push(text.clone()),
            Operation::DropAll => {
                state.nodes.clear();
                state.drops += 1;
            }
        }
        Ok(())
    }

    fn txn(&self) -> MemoryTxn {
        MemoryTxn::new(self.state.clone(), false)
    }

    fn read_only_txn(&self) -> MemoryTxn {
        MemoryTxn::new(self.state.clone(), true)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum TxnState {
    Open,
    Committed,
    Discarded,
}

enum PendingOp {
    Set(Value),
    Delete(Value),
}

pub struct MemoryTxn {
    state: Arc<Mutex<State>>,
    read_only: bool,
    pending: Vec<PendingOp>,
    status: TxnState,
}

impl MemoryTxn {
    fn new(state: Arc<Mutex<State>>, read_only: bool) -> Self {
        Self {
            state,
            read_only,
            pending: Vec::new(),
            status: TxnState::Open,
        }
    }

    fn ensure_open(&self) -> Result<(), DgraphError> {
        match self.status {
            TxnState::Open => Ok(()),
            TxnState::Committed => Err(DgraphError::Finished("committed")),
            TxnState::Discarded => Err(DgraphError::Finished("discarded")),
        }
    }
}

/// Replace `"_:x"` uids with fresh uids, recording the assignment.
fn assign_blank_nodes(value: &mut Value, state: &mut State, assigned: &mut BTreeMap<String, Uid>) {
    match value {
        Value::Object(map) => {
            if let Some(Value::String(uid)) = map.get_mut("uid") {
                if let Some(blank) = uid.strip_prefix("_:") {
                    let blank = blank.to_string();
                    let real = match assigned.get(&blank) {
                        Some(real) => real.clone(),
                        None => {
                            let real = state.fresh_uid();
                            assigned.insert(blank, real.clone());
                            real
                        }
                    };
                    *uid = real.as_str().to_string();
                }
            }
            for (key, child) in map.iter_mut() {
                if key != "uid" {
                    assign_blank_nodes(child, state, assigned);
                }
            }
        }
        Value::Array(items) => {
            for item in items {
                assign_blank_nodes(item, state, assigned);
            }
        }
        _ => {}
    }
}

fn object_uid(value: &Value) -> Option<Uid> {
    value.get("uid").and_then(Value::as_str).map(Uid::new)
}

/// Apply a nested object and return the reference stored on the parent.
fn link(value: &Value, nodes: &mut BTreeMap<Uid, Node>) -> Value {
    match value {
        Value::Object(map) if map.contains_key("uid") => {
            if map.len() > 1 {
                apply_set(value, nodes);
            }
            let uid = map.get("uid").cloned().unwrap_or(Value::Null);
            serde_json::json!({ "uid": uid })
        }
        other => other.clone(),
    }
}

fn apply_set(object: &Value, nodes: &mut BTreeMap<Uid, Node>) {
    let (Some(uid), Some(map)) = (object_uid(object), object.as_object()) else {
        return;
    };
    let mut updates = Vec::new();
    for (key, value) in map {
        if key == "uid" {
            continue;
        }
        let stored = match value {
            Value::Array(items) => Value::Array(items.iter().map(|v| link(v, nodes)).collect()),
            other => link(other, nodes),
        };
        updates.push((key.clone(), stored));
    }

    let node = nodes.entry(uid).or_default();
    for (key, value) in updates {
        if let (Some(Value::Array(existing)), Value::Array(new)) = (node.get_mut(&key), &value) {
            for item in new {
                if !existing.contains(item) {
                    existing.push(item.clone());
                }
            }
            continue;
        }
        node.insert(key, value);
    }
}

fn apply_delete(object: &Value, nodes: &mut BTreeMap<Uid, Node>) {
    let (Some(uid), Some(map)) = (object_uid(object), object.as_object()) else {
        return;
    };
    if map.len() == 1 {
        nodes.remove(&uid);
        return;
    }
    let Some(node) = nodes.get_mut(&uid) else {
        return;
    };
    for (key, value) in map {
        if key == "uid" {
            continue;
        }
        let remove_predicate = match (node.get_mut(key), value) {
            (_, Value::Null) => true,
            (Some(Value::Array(existing)), Value::Array(gone)) => {
                existing.retain(|item| !gone.contains(item));
                false
            }
            (Some(current), gone) => *current == *gone,
            (None, _) => false,
        };
        if remove_predicate {
            node.remove(key);
        }
    }
}

impl Transaction for MemoryTxn {
    fn query(&mut self, query: &str, vars: &Variables) -> Result<Value, DgraphError> {
        self.ensure_open()?;
        let mut state = self.state.lock();
        state.queries.push((query.to_string(), vars.clone()));
        Ok(state
            .responses
            .pop_front()
            .unwrap_or_else(|| Value::Object(Map::new())))
    }

    fn mutate(&mut self, mutation: &Mutation) -> Result<Assigned, DgraphError> {
        self.ensure_open()?;
        if self.read_only {
            return Err(DgraphError::ReadOnly("mutate"));
        }

        let mut state = self.state.lock();
        if let Some(needle) = &state.fail_mutation_containing {
            let text = serde_json::to_string(mutation).map_err(|e| DgraphError::Decode(e.to_string()))?;
            if text.contains(needle.as_str()) {
                return Err(DgraphError::Server {
                    messages: vec![format!("injected mutation failure on `{needle}`")],
                });
            }
        }

        let mut assigned = BTreeMap::new();
        for object in &mutation.set {
            let mut object = object.clone();
            assign_blank_nodes(&mut object, &mut state, &mut assigned);
            self.pending.push(PendingOp::Set(object));
        }
        for object in &mutation.delete {
            self.pending.push(PendingOp::Delete(object.clone()));
        }
        state.mutations.push(mutation.clone());
        Ok(Assigned { uids: assigned })
    }

    fn commit(&mut self) -> Result<(), DgraphError> {
        self.ensure_open()?;
        if self.read_only {
            return Err(DgraphError::ReadOnly("commit"));
        }

        let mut state = self.state.lock();
        state.commit_attempts += 1;
        if state.fail_commit_number == Some(state.commit_attempts) {
            return Err(DgraphError::Server {
                messages: vec!["Transaction has been aborted. Please retry".to_string()],
            });
        }

        for op in self.pending.drain(..) {
            match op {
                PendingOp::Set(object) => apply_set(&object, &mut state.nodes),
                PendingOp::Delete(object) => apply_delete(&object, &mut state.nodes),
            }
        }
        state.commits += 1;
        self.status = TxnState::Committed;
        Ok(())
    }

    fn discard(&mut self) -> Result<(), DgraphError> {
        if self.status != TxnState::Open {
            return Ok(());
        }
        self.status = TxnState::Discarded;
        self.pending.clear();
        if !self.read_only {
            self.state.lock().discards += 1;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn blank_nodes_share_a_uid_within_one_mutation() {
        let graph = MemoryGraph::new();
        let mut txn = graph.txn();
        let assigned = txn
            .mutate(&Mutation::set(vec![
                json!({"uid": "_:a", "name": "A"}),
                json!({"uid": "_:b", "name": "B", "friend": {"uid": "_:a"}}),
            ]))
            .unwrap();
        assert_eq!(assigned.uids.len(), 2);
        assert_eq!(graph.node_count(), 0, "nothing visible before commit");
        txn.commit().unwrap();

        let b = &assigned.uids["b"];
        assert_eq!(graph.edge_targets(b, "friend"), vec![assigned.uids["a"].clone()]);
    }

    #[test]
    fn list_predicates_accumulate_and_scalars_replace() {
        let graph = MemoryGraph::new();
        let mut txn = graph.txn();
        let uid = txn
            .mutate(&Mutation::set_one(json!({"uid": "_:g", "name": "Dev"})))
            .unwrap()
            .uids["g"]
            .clone();
        txn.mutate(&Mutation::set_one(
            json!({"uid": uid.as_str(), "HAS": [{"uid": "0x10"}], "name": "Ops"}),
        ))
        .unwrap();
        txn.mutate(&Mutation::set_one(
            json!({"uid": uid.as_str(), "HAS": [{"uid": "0x10"}, {"uid": "0x11"}]}),
        ))
        .unwrap();
        txn.commit().unwrap();

        assert_eq!(graph.node(&uid).unwrap()["name"], "Ops");
        assert_eq!(
            graph.edge_targets(&uid, "HAS"),
            vec![Uid::new("0x10"), Uid::new("0x11")]
        );
    }

    #[test]
    fn delete_of_bare_uid_removes_the_node() {
        let graph = MemoryGraph::new();
        let mut txn = graph.txn();
        let uid = txn
            .mutate(&Mutation::set_one(json!({"uid": "_:s", "dgraph.type": "Status"})))
            .unwrap()
            .uids["s"]
            .clone();
        txn.commit().unwrap();
        assert_eq!(graph.nodes_of_type("Status"), vec![uid.clone()]);

        let mut txn = graph.txn();
        txn.mutate(&Mutation::delete(vec![uid.to_ref()])).unwrap();
        txn.commit().unwrap();
        assert!(graph.node(&uid).is_none());
    }

    #[test]
    fn injected_commit_failure_leaves_the_graph_untouched() {
        let graph = MemoryGraph::new();
        graph.fail_commit_number(1);
        let mut txn = graph.txn();
        txn.mutate(&Mutation::set_one(json!({"uid": "_:a"}))).unwrap();
        assert!(matches!(txn.commit(), Err(DgraphError::Server { .. })));
        txn.discard().unwrap();
        assert_eq!(graph.node_count(), 0);
        assert_eq!(graph.discarded_count(), 1);
    }

    #[test]
    fn queries_are_answered_from_the_queue() {
        let graph = MemoryGraph::new();
        graph.push_query_response(json!({"q": [1]}));
        let mut txn = graph.read_only_txn();
        assert_eq!(txn.query("{ q }", &Variables::new()).unwrap(), json!({"q": [1]}));
        assert_eq!(txn.query("{ q }", &Variables::new()).unwrap(), json!({}));
        assert_eq!(graph.recorded_queries().len(), 2);
        assert!(matches!(
            txn.mutate(&Mutation::default()),
            Err(DgraphError::ReadOnly(_))
        ));
    }
}
