//! The fixed chatgraph queries
//!
//! | function                    | exercises                                   |
//! |-----------------------------|---------------------------------------------|
//! | [`groups_by_user`]          | exact index, reverse edge (`~HAS`)          |
//! | [`messages_between`]        | int index, two node types, `@cascade`       |
//! | [`statuses_page`]           | ordering, pagination, reverse edge (`~POST`)|
//! | [`users_overview`]          | `count(uid)`, ordering                      |
//! | [`search_messages`]         | fulltext index (`anyoftext`)                |
//! | [`delete_statuses_through`] | query + delete in one transaction           |
//!
//! Parameters are checked before anything is sent.

pub mod dql;

use chatgraph_dgraph::{
    query_read_only, with_txn, DgraphError, GraphClient, Mutation, Transaction, Uid, Variables,
};
use chatgraph_ingest_csv::Timestamp;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum QueryError {
    #[error("invalid `{name}`: {message}")]
    InvalidParameter { name: &'static str, message: String },

    #[error(transparent)]
    Dgraph(#[from] DgraphError),

    #[error("could not decode `{block}` result: {message}")]
    Decode { block: &'static str, message: String },
}

// ============================================================================
// Result shapes
// ============================================================================

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct MessageSummary {
    #[serde(default)]
    pub content: String,
    #[serde(default)]
    pub reactions: Vec<String>,
    #[serde(rename = "sendAt", default)]
    pub send_at: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct StatusSummary {
    #[serde(default)]
    pub content: String,
    #[serde(default)]
    pub text: String,
    #[serde(rename = "postedAt", default)]
    pub posted_at: Option<String>,
    /// Names of the users who posted it (`~POST`).
    #[serde(rename = "~POST", default, deserialize_with = "names")]
    pub posted_by: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct UserSummary {
    pub name: String,
    #[serde(default)]
    pub phone: Option<i64>,
    #[serde(default)]
    pub location: Option<Value>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct UsersOverview {
    pub total: u64,
    pub users: Vec<UserSummary>,
}

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct DeletedStatus {
    pub uid: Uid,
    #[serde(default)]
    pub content: String,
    #[serde(rename = "postedAt", default)]
    pub posted_at: Option<String>,
}

#[derive(Deserialize)]
struct Named {
    name: String,
}

fn names<'de, D: serde::Deserializer<'de>>(de: D) -> Result<Vec<String>, D::Error> {
    let named: Vec<Named> = Vec::deserialize(de)?;
    Ok(named.into_iter().map(|n| n.name).collect())
}

// ============================================================================
// Helpers
// ============================================================================

fn vars<const N: usize>(pairs: [(&str, String); N]) -> Variables {
    pairs.into_iter().map(|(k, v)| (k.to_string(), v)).collect()
}

/// Decode `data[block]` as a list; a missing block is an empty result.
fn rows<T: DeserializeOwned>(data: &Value, block: &'static str) -> Result<Vec<T>, QueryError> {
    match data.get(block) {
        None | Some(Value::Null) => Ok(Vec::new()),
        Some(value) => serde_json::from_value(value.clone()).map_err(|e| QueryError::Decode {
            block,
            message: e.to_string(),
        }),
    }
}

fn non_negative(name: &'static str, value: i64) -> Result<(), QueryError> {
    if value < 0 {
        return Err(QueryError::InvalidParameter {
            name,
            message: format!("must not be negative, got {value}"),
        });
    }
    Ok(())
}

// ============================================================================
// Queries
// ============================================================================

/// Names of the groups that have a user called `name` as a member.
pub fn groups_by_user<C>(client: &C, name: &str) -> Result<Vec<String>, QueryError>
where
    C: GraphClient + ?Sized,
{
    #[derive(Deserialize)]
    struct Row {
        #[serde(rename = "~HAS", default, deserialize_with = "names")]
        groups: Vec<String>,
    }

    let name = name.trim();
    if name.is_empty() {
        return Err(QueryError::InvalidParameter {
            name: "name",
            message: "must not be empty".to_string(),
        });
    }

    let data = query_read_only(client, dql::GROUPS_BY_USER, &vars([("$name", name.to_string())]))?;
    let users: Vec<Row> = rows(&data, "groups_by_user")?;
    Ok(users.into_iter().flat_map(|u| u.groups).collect())
}

/// Up to `n` messages sent from the user with phone `from` to the user with
/// phone `to`.
pub fn messages_between<C>(client: &C, n: i64, from: i64, to: i64) -> Result<Vec<MessageSummary>, QueryError>
where
    C: GraphClient + ?Sized,
{
    #[derive(Deserialize)]
    struct Row {
        #[serde(rename = "SEND", default)]
        sent: Vec<MessageSummary>,
    }

    non_negative("n", n)?;
    let data = query_read_only(
        client,
        dql::MESSAGES_BETWEEN,
        &vars([
            ("$n", n.to_string()),
            ("$from", from.to_string()),
            ("$to", to.to_string()),
        ]),
    )?;
    let senders: Vec<Row> = rows(&data, "messages_between")?;
    Ok(senders.into_iter().flat_map(|s| s.sent).collect())
}

/// Statuses ordered by `postedAt`, skipping `offset` and returning `first`.
pub fn statuses_page<C>(client: &C, first: i64, offset: i64) -> Result<Vec<StatusSummary>, QueryError>
where
    C: GraphClient + ?Sized,
{
    non_negative("first", first)?;
    non_negative("offset", offset)?;
    let data = query_read_only(
        client,
        dql::STATUSES_PAGE,
        &vars([("$first", first.to_string()), ("$offset", offset.to_string())]),
    )?;
    rows(&data, "statuses_page")
}

/// Every user ordered by name, with the total count.
pub fn users_overview<C>(client: &C) -> Result<UsersOverview, QueryError>
where
    C: GraphClient + ?Sized,
{
    let data = query_read_only(client, dql::USERS_OVERVIEW, &Variables::new())?;
    let entries: Vec<Value> = rows(&data, "users_overview")?;

    let mut total = None;
    let mut users = Vec::new();
    for entry in entries {
        if let Some(count) = entry.get("total").and_then(Value::as_u64) {
            total = Some(count);
            continue;
        }
        let user: UserSummary = serde_json::from_value(entry).map_err(|e| QueryError::Decode {
            block: "users_overview",
            message: e.to_string(),
        })?;
        users.push(user);
    }

    Ok(UsersOverview {
        total: total.unwrap_or(users.len() as u64),
        users,
    })
}

/// Messages whose content matches any of the whitespace-separated `terms`.
pub fn search_messages<C>(client: &C, terms: &str) -> Result<Vec<MessageSummary>, QueryError>
where
    C: GraphClient + ?Sized,
{
    let terms = terms.trim();
    if terms.is_empty() {
        return Err(QueryError::InvalidParameter {
            name: "terms",
            message: "must not be empty".to_string(),
        });
    }
    let data = query_read_only(client, dql::SEARCH_MESSAGES, &vars([("$terms", terms.to_string())]))?;
    rows(&data, "search_messages")
}

/// Delete every status posted on or before `date`.
///
/// The lookup and the deletes share one transaction, so a status posted
/// concurrently cannot slip between them. Returns what was deleted.
pub fn delete_statuses_through<C>(client: &C, date: &str) -> Result<Vec<DeletedStatus>, QueryError>
where
    C: GraphClient + ?Sized,
{
    let cutoff = Timestamp::parse(date).map_err(|message| QueryError::InvalidParameter {
        name: "date",
        message,
    })?;

    let deleted = with_txn(client, |txn| {
        let data = txn.query(dql::STATUSES_THROUGH, &vars([("$date", cutoff.to_rfc3339())]))?;
        let statuses: Vec<DeletedStatus> = rows(&data, "statuses_through")?;
        if !statuses.is_empty() {
            let deletes = statuses.iter().map(|s| s.uid.to_ref()).collect();
            txn.mutate(&Mutation::delete(deletes))?;
        }
        Ok::<_, QueryError>(statuses)
    })?;

    tracing::info!(%cutoff, count = deleted.len(), "statuses deleted");
    Ok(deleted)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chatgraph_dgraph::MemoryGraph;
    use serde_json::json;

    #[test]
    fn groups_are_flattened_across_matching_users() {
        let graph = MemoryGraph::new();
        graph.push_query_response(json!({
            "groups_by_user": [
                {"name": "Alice", "~HAS": [{"name": "Dev"}, {"name": "Football"}]},
                {"name": "Alice"}
            ]
        }));
        assert_eq!(groups_by_user(&graph, "Alice").unwrap(), vec!["Dev", "Football"]);

        let (query, vars) = &graph.recorded_queries()[0];
        assert!(query.contains("~HAS"));
        assert_eq!(vars["$name"], "Alice");
    }

    #[test]
    fn unknown_user_has_no_groups() {
        let graph = MemoryGraph::new();
        graph.push_query_response(json!({"groups_by_user": []}));
        assert!(groups_by_user(&graph, "Nobody").unwrap().is_empty());
    }

    #[test]
    fn messages_between_passes_numbers_as_variables() {
        let graph = MemoryGraph::new();
        graph.push_query_response(json!({
            "messages_between": [{"SEND": [
                {"content": "hi", "reactions": ["👍"], "sendAt": "2023-01-01T00:00:00Z", "RECEIVE": {"uid": "0x2"}}
            ]}]
        }));
        let messages = messages_between(&graph, 5, 5550001, 5550002).unwrap();
        assert_eq!(messages.len(), 1);
        assert_eq!(messages[0].reactions, vec!["👍"]);

        let (_, vars) = &graph.recorded_queries()[0];
        assert_eq!(vars["$n"], "5");
        assert_eq!(vars["$from"], "5550001");
        assert_eq!(vars["$to"], "5550002");
    }

    #[test]
    fn negative_paging_is_rejected_locally() {
        let graph = MemoryGraph::new();
        assert!(matches!(
            statuses_page(&graph, -1, 0),
            Err(QueryError::InvalidParameter { name: "first", .. })
        ));
        assert!(matches!(
            messages_between(&graph, -3, 1, 2),
            Err(QueryError::InvalidParameter { name: "n", .. })
        ));
        assert!(graph.recorded_queries().is_empty());
    }

    #[test]
    fn status_page_collects_posters() {
        let graph = MemoryGraph::new();
        graph.push_query_response(json!({
            "statuses_page": [
                {"content": "c", "text": "t", "postedAt": "2023-01-01T00:00:00Z", "~POST": [{"name": "Alice"}]},
                {"content": "d", "text": "u", "postedAt": "2023-02-01T00:00:00Z"}
            ]
        }));
        let page = statuses_page(&graph, 2, 0).unwrap();
        assert_eq!(page[0].posted_by, vec!["Alice"]);
        assert!(page[1].posted_by.is_empty());
    }

    #[test]
    fn users_overview_splits_count_from_rows() {
        let graph = MemoryGraph::new();
        graph.push_query_response(json!({
            "users_overview": [
                {"total": 2},
                {"name": "Alice", "phone": 5550001, "location": {"type": "Point", "coordinates": [10.0, 20.0]}},
                {"name": "Bob", "phone": 5550002}
            ]
        }));
        let overview = users_overview(&graph).unwrap();
        assert_eq!(overview.total, 2);
        let names: Vec<&str> = overview.users.iter().map(|u| u.name.as_str()).collect();
        assert_eq!(names, vec!["Alice", "Bob"]);
        assert!(overview.users[1].location.is_none());
    }

    #[test]
    fn blank_search_is_rejected() {
        let graph = MemoryGraph::new();
        assert!(search_messages(&graph, "   ").is_err());
    }

    #[test]
    fn delete_through_date_deletes_what_the_query_found() {
        let graph = MemoryGraph::new();
        graph.push_query_response(json!({
            "statuses_through": [
                {"uid": "0x7", "content": "a", "postedAt": "2023-01-01T00:00:00Z"},
                {"uid": "0x9", "content": "b", "postedAt": "2023-06-01T00:00:00Z"}
            ]
        }));
        let deleted = delete_statuses_through(&graph, "2023-12-31").unwrap();
        assert_eq!(deleted.len(), 2);

        let (_, vars) = &graph.recorded_queries()[0];
        assert_eq!(vars["$date"], "2023-12-31T00:00:00Z");
        let mutations = graph.recorded_mutations();
        assert_eq!(mutations.len(), 1);
        assert_eq!(mutations[0].delete, vec![json!({"uid": "0x7"}), json!({"uid": "0x9"})]);
        assert_eq!(graph.commit_count(), 1);
    }

    #[test]
    fn delete_with_nothing_to_delete_sends_no_mutation() {
        let graph = MemoryGraph::new();
        graph.push_query_response(json!({"statuses_through": []}));
        assert!(delete_statuses_through(&graph, "2020-01-01").unwrap().is_empty());
        assert!(graph.recorded_mutations().is_empty());
    }

    #[test]
    fn unparsable_date_is_rejected_before_any_call() {
        let graph = MemoryGraph::new();
        assert!(matches!(
            delete_statuses_through(&graph, "yesterday"),
            Err(QueryError::InvalidParameter { name: "date", .. })
        ));
        assert!(graph.recorded_queries().is_empty());
    }
}
