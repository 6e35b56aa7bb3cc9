//! Dgraph client boundary for chatgraph
//!
//! Everything the demo needs from the database goes through two traits:
//!
//! - [`GraphClient`]: schema alteration, drop-all, and transaction creation;
//! - [`Transaction`]: query, mutate, commit, discard.
//!
//! Two implementations ship with the crate:
//!
//! - [`http::HttpClient`]: the Dgraph HTTP API (`/alter`, `/query`, `/mutate`,
//!   `/commit`), blocking, one request at a time;
//! - [`memory::MemoryGraph`]: an in-process graph that assigns uids, buffers
//!   mutations until commit and answers queries from canned responses. Used by
//!   tests that exercise the loader without a server.

pub mod http;
pub mod memory;

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;
use std::fmt;
use thiserror::Error;

pub use http::{ClientConfig, HttpClient, HttpTxn, DEFAULT_DGRAPH_URL};
pub use memory::{MemoryGraph, MemoryTxn};

/// Query variables (`$name` → value). Dgraph takes every variable as a string.
pub type Variables = BTreeMap<String, String>;

/// A permanent, server-assigned uid (`0x1a`).
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Uid(String);

impl Uid {
    pub fn new(uid: impl Into<String>) -> Self {
        Self(uid.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// `{"uid": "0x1a"}`, the reference form used inside mutations.
    pub fn to_ref(&self) -> Value {
        serde_json::json!({ "uid": self.0 })
    }
}

impl fmt::Display for Uid {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// One JSON mutation: objects to set and objects to delete.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct Mutation {
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub set: Vec<Value>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub delete: Vec<Value>,
}

impl Mutation {
    pub fn set(objects: Vec<Value>) -> Self {
        Self {
            set: objects,
            delete: Vec::new(),
        }
    }

    pub fn set_one(object: Value) -> Self {
        Self::set(vec![object])
    }

    pub fn delete(objects: Vec<Value>) -> Self {
        Self {
            set: Vec::new(),
            delete: objects,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.set.is_empty() && self.delete.is_empty()
    }
}

/// Uids assigned to the blank nodes of a mutation, keyed by blank-node name
/// without the `_:` marker.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Assigned {
    pub uids: BTreeMap<String, Uid>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Operation {
    /// Schema text in Dgraph's schema language.
    Schema(String),
    DropAll,
}

#[derive(Debug, Error)]
pub enum DgraphError {
    #[error("failed to reach dgraph at {url}: {message}")]
    Transport { url: String, message: String },
    #[error("dgraph http error {status}: {body}")]
    Http { status: u16, body: String },
    #[error("dgraph rejected the request: {}", .messages.join("; "))]
    Server { messages: Vec<String> },
    #[error("unexpected dgraph response: {0}")]
    Decode(String),
    #[error("transaction already {0}")]
    Finished(&'static str),
    #[error("read-only transaction cannot {0}")]
    ReadOnly(&'static str),
}

/// Client-side handle to a Dgraph cluster.
pub trait GraphClient {
    type Txn: Transaction;

    fn alter(&self, op: &Operation) -> Result<(), DgraphError>;

    /// A read-write transaction.
    fn txn(&self) -> Self::Txn;

    fn read_only_txn(&self) -> Self::Txn;
}

pub trait Transaction {
    /// Run a query; returns the `data` object.
    fn query(&mut self, query: &str, vars: &Variables) -> Result<Value, DgraphError>;

    fn mutate(&mut self, mutation: &Mutation) -> Result<Assigned, DgraphError>;

    fn commit(&mut self) -> Result<(), DgraphError>;

    /// Abort the transaction. A no-op once committed or discarded.
    fn discard(&mut self) -> Result<(), DgraphError>;
}

/// Run `f` inside a fresh read-write transaction and commit when it succeeds.
///
/// Discard runs on every exit path: after a successful commit it is a no-op,
/// after a failure it rolls back whatever `f` managed to send. A discard
/// failure is reported only when nothing else failed first.
pub fn with_txn<C, T, E, F>(client: &C, f: F) -> Result<T, E>
where
    C: GraphClient + ?Sized,
    E: From<DgraphError>,
    F: FnOnce(&mut C::Txn) -> Result<T, E>,
{
    let mut txn = client.txn();
    let outcome = f(&mut txn).and_then(|value| {
        txn.commit()?;
        Ok(value)
    });
    let discarded = txn.discard();

    match (outcome, discarded) {
        (Ok(value), Ok(())) => Ok(value),
        (Ok(_), Err(e)) => Err(e.into()),
        (Err(e), Ok(())) => Err(e),
        (Err(e), Err(discard_err)) => {
            tracing::warn!(error = %discard_err, "discard after failed transaction also failed");
            Err(e)
        }
    }
}

/// Run one query in a read-only transaction.
pub fn query_read_only<C>(client: &C, query: &str, vars: &Variables) -> Result<Value, DgraphError>
where
    C: GraphClient + ?Sized,
{
    let mut txn = client.read_only_txn();
    let result = txn.query(query, vars);
    txn.discard()?;
    result
}
