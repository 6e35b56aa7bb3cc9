//! Schema and drop-all.

use chatgraph_dgraph::{GraphClient, Operation};
use chatgraph_schema::SchemaV1;

use crate::LoadError;

/// Validate, render and submit `schema`. Returns the schema digest.
pub fn apply_schema<C>(client: &C, schema: &SchemaV1) -> Result<String, LoadError>
where
    C: GraphClient + ?Sized,
{
    let text = schema.render()?;
    let digest = schema.digest()?;
    client.alter(&Operation::Schema(text))?;
    tracing::info!(version = %schema.version, %digest, "schema applied");
    Ok(digest)
}

/// Remove every node, edge and predicate.
pub fn drop_all<C>(client: &C) -> Result<(), LoadError>
where
    C: GraphClient + ?Sized,
{
    client.alter(&Operation::DropAll)?;
    tracing::info!("dropped all data");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use chatgraph_dgraph::MemoryGraph;

    #[test]
    fn apply_schema_sends_rendered_text() {
        let graph = MemoryGraph::new();
        let schema = SchemaV1::chat_v1();
        let digest = apply_schema(&graph, &schema).unwrap();
        assert_eq!(digest, schema.digest().unwrap());

        let history = graph.schema_history();
        assert_eq!(history.len(), 1);
        assert!(history[0].contains("HAS: [uid] @reverse ."));
        assert!(history[0].contains("type User {"));
    }

    #[test]
    fn invalid_schema_never_reaches_the_server() {
        let graph = MemoryGraph::new();
        let mut schema = SchemaV1::chat_v1();
        schema.predicates.push(schema.predicates[0].clone());
        assert!(matches!(apply_schema(&graph, &schema), Err(LoadError::Schema(_))));
        assert!(graph.schema_history().is_empty());
    }
}
