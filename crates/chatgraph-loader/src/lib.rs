//! chatgraph bulk loader
//!
//! Turns the four CSV exports into a connected graph:
//!
//! ```text
//!  users.csv ──► load users ───────┐
//!  groups.csv ─► load groups ──────┤
//!                                  ├─► link group members   (Group -HAS-> User)
//!  messages.csv► load messages ────┤
//!                                  ├─► link messages        (User -SEND-> Message,
//!                                  │                         Message -RECEIVE/BELONGS_TO->)
//!  statuses.csv► load statuses ────┘
//!                                  └─► link statuses        (User -POST-> Status,
//!                                                            Status -SEEN-> User)
//! ```
//!
//! Entity loads create nodes with blank-node uids and record the
//! server-assigned uids in a [`UidTable`]. Edge passes re-read the CSVs and
//! resolve every temporary id through that table.
//!
//! Each batch and each edge pass is its own transaction. A failure aborts the
//! run; what was already committed stays unless compensation is requested
//! (see [`LoadOptions::compensate`]).

pub mod edges;
pub mod entity;
pub mod pipeline;
pub mod plan;
pub mod provision;
pub mod uid_table;

use chatgraph_dgraph::{DgraphError, Uid};
use chatgraph_ingest_csv::{EntityKind, IngestError};
use chatgraph_schema::SchemaError;
use thiserror::Error;

pub use edges::{EdgeMutation, EdgeTargets, Relation};
pub use entity::{load_entities, GraphEntity};
pub use pipeline::{create_all, run_plan, LoadContext, LoadOptions, LoadReport, PhaseReport};
pub use plan::{LoadPlan, Phase, PhaseOutcome, PlanError};
pub use provision::{apply_schema, drop_all};
pub use uid_table::UidTable;

#[derive(Debug, Error)]
pub enum LoadError {
    #[error(transparent)]
    Ingest(#[from] IngestError),

    #[error(transparent)]
    Dgraph(#[from] DgraphError),

    #[error(transparent)]
    Schema(#[from] SchemaError),

    #[error("unknown {kind} id `{temp_id}` (not loaded in this run)")]
    Resolution { kind: EntityKind, temp_id: String },

    #[error("duplicate {kind} id `{temp_id}` in one batch")]
    Duplicate { kind: EntityKind, temp_id: String },

    #[error("incomplete uid assignment for {kind} batch: {message}")]
    Assignment { kind: EntityKind, message: String },

    #[error("{kind} id `{temp_id}` already maps to {existing}, refusing {new}")]
    Conflict {
        kind: EntityKind,
        temp_id: String,
        existing: Uid,
        new: Uid,
    },

    #[error(transparent)]
    Plan(#[from] PlanError),

    #[error("phase `{phase}` failed (committed before it: {}): {source}", completed_list(.completed))]
    Phase {
        phase: &'static str,
        completed: Vec<&'static str>,
        /// Entities deleted by compensation, when it ran and succeeded.
        compensated: Option<usize>,
        source: Box<LoadError>,
    },
}

fn completed_list(completed: &[&'static str]) -> String {
    if completed.is_empty() {
        "none".to_string()
    } else {
        completed.join(", ")
    }
}

impl LoadError {
    /// The innermost error, skipping the phase wrapper.
    pub fn root(&self) -> &LoadError {
        match self {
            LoadError::Phase { source, .. } => source.root(),
            other => other,
        }
    }
}
