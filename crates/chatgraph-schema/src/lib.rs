//! chatgraph schema artifact
//!
//! The Dgraph schema used by the demo is kept as a typed, versioned data
//! structure instead of an embedded string. It is validated structurally
//! before it is rendered into Dgraph schema text and sent to `/alter`.

pub mod digest;
pub mod schema_v1;

pub use schema_v1::{IndexKind, PredicateDefV1, SchemaError, SchemaV1, TypeDefV1, ValueType};
