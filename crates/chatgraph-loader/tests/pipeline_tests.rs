//! Loader behaviour against the in-memory graph.

use chatgraph_dgraph::{MemoryGraph, Uid};
use chatgraph_ingest_csv::{DataSet, EntityKind, IngestError};
use chatgraph_loader::plan::{LINK_GROUP_MEMBERS, LINK_MESSAGES, LOAD_GROUPS, LOAD_MESSAGES, LOAD_USERS};
use chatgraph_loader::{create_all, LoadError, LoadOptions};
use std::fs;
use tempfile::TempDir;

const USERS: &str = "\
uid,name,description,phone,location,SEND,POST
_:u1,Alice,dev,555,\"(10, 20)\",\"['_:m1']\",\"['_:s1']\"
_:u2,Bob,ops,556,\"(11, 21)\",\"['_:m2']\",[]
_:u3,Carol,qa,557,\"(12, 22)\",[],[]
";

const GROUPS: &str = "\
uid,name,description,HAS
_:g1,Dev,Developers,\"['_:u1']\"
";

const MESSAGES: &str = "\
uid,content,reactions,sendAt,BELONGS_TO,RECEIVE
_:m1,hello bob,\"['👍']\",2023-01-01,,_:u2
_:m2,hi team,[],2023-01-02,_:g1,
";

const STATUSES: &str = "\
uid,content,text,postedAt,SEEN
_:s1,mood,Feeling good,2023-01-01,\"['_:u3', '_:u2']\"
";

struct Fixture {
    _dir: TempDir,
    dataset: DataSet,
}

fn fixture_with(overrides: &[(EntityKind, &str)]) -> Fixture {
    let dir = tempfile::tempdir().unwrap();
    let dataset = DataSet::from_dir(dir.path());
    for (kind, default) in [
        (EntityKind::User, USERS),
        (EntityKind::Group, GROUPS),
        (EntityKind::Message, MESSAGES),
        (EntityKind::Status, STATUSES),
    ] {
        let contents = overrides
            .iter()
            .find(|(k, _)| *k == kind)
            .map(|(_, c)| *c)
            .unwrap_or(default);
        fs::write(dataset.path(kind), contents).unwrap();
    }
    Fixture { _dir: dir, dataset }
}

fn fixture() -> Fixture {
    fixture_with(&[])
}

fn user(graph: &MemoryGraph, name: &str) -> Uid {
    graph.find_by_name("User", name).unwrap()
}

#[test]
fn loads_entities_and_every_relation() {
    let fx = fixture();
    let graph = MemoryGraph::new();
    let report = create_all(&graph, &fx.dataset, LoadOptions::default()).unwrap();

    assert_eq!(report.entities(), 7);
    assert_eq!(report.edges(), 8);
    assert_eq!(graph.node_count(), 7);
    assert_eq!(graph.commit_count(), 7, "one commit per batch and per pass");

    let alice = user(&graph, "Alice");
    let bob = user(&graph, "Bob");
    let carol = user(&graph, "Carol");
    let dev = graph.find_by_name("Group", "Dev").unwrap();
    assert_eq!(graph.edge_targets(&dev, "HAS"), vec![alice.clone()]);

    let messages = graph.nodes_of_type("Message");
    assert_eq!(messages.len(), 2);
    let sent_by_alice = graph.edge_targets(&alice, "SEND");
    assert_eq!(sent_by_alice.len(), 1);
    assert_eq!(graph.edge_targets(&sent_by_alice[0], "RECEIVE"), vec![bob.clone()]);
    assert!(graph.edge_targets(&sent_by_alice[0], "BELONGS_TO").is_empty());

    let sent_by_bob = graph.edge_targets(&bob, "SEND");
    assert_eq!(graph.edge_targets(&sent_by_bob[0], "BELONGS_TO"), vec![dev]);

    let posted = graph.edge_targets(&alice, "POST");
    assert_eq!(posted.len(), 1);
    assert_eq!(graph.edge_targets(&posted[0], "SEEN"), vec![carol, bob]);
    assert!(graph.edge_targets(&user(&graph, "Bob"), "POST").is_empty());
}

#[test]
fn entity_nodes_carry_scalars_only() {
    let fx = fixture();
    let graph = MemoryGraph::new();
    create_all(&graph, &fx.dataset, LoadOptions::default()).unwrap();

    let alice = graph.node(&user(&graph, "Alice")).unwrap();
    assert_eq!(alice["dgraph.type"], "User");
    assert_eq!(alice["phone"], 555);
    assert_eq!(alice["location"]["coordinates"][0], 10.0);

    let first_batch = &graph.recorded_mutations()[0];
    assert_eq!(first_batch.set.len(), 3);
    assert!(first_batch.set.iter().all(|n| n.get("SEND").is_none()));
}

#[test]
fn running_twice_duplicates_instead_of_merging() {
    let fx = fixture();
    let graph = MemoryGraph::new();
    create_all(&graph, &fx.dataset, LoadOptions::default()).unwrap();
    create_all(&graph, &fx.dataset, LoadOptions::default()).unwrap();

    assert_eq!(graph.node_count(), 14);
    assert_eq!(graph.nodes_of_type("User").len(), 6);

    // Each run links its own copies.
    let devs = graph.nodes_of_type("Group");
    let members: Vec<Vec<Uid>> = devs.iter().map(|g| graph.edge_targets(g, "HAS")).collect();
    assert_eq!(members.len(), 2);
    assert_ne!(members[0], members[1]);
}

#[test]
fn unknown_member_aborts_before_the_edge_pass_is_sent() {
    let fx = fixture_with(&[(
        EntityKind::Group,
        "uid,name,description,HAS\n_:g1,Dev,,\"['_:u1', '_:ghost']\"\n",
    )]);
    let graph = MemoryGraph::new();
    let err = create_all(&graph, &fx.dataset, LoadOptions::default()).unwrap_err();

    match &err {
        LoadError::Phase {
            phase,
            completed,
            compensated,
            ..
        } => {
            assert_eq!(*phase, LINK_GROUP_MEMBERS);
            assert_eq!(completed, &vec![LOAD_USERS, LOAD_GROUPS]);
            assert_eq!(*compensated, None);
        }
        other => panic!("unexpected error: {other}"),
    }
    assert!(matches!(
        err.root(),
        LoadError::Resolution { kind: EntityKind::User, temp_id } if temp_id == "ghost"
    ));

    // Earlier batches stay committed; no edges were written.
    assert_eq!(graph.node_count(), 4);
    let dev = graph.find_by_name("Group", "Dev").unwrap();
    assert!(graph.edge_targets(&dev, "HAS").is_empty());
}

#[test]
fn failed_commit_discards_the_pass() {
    let fx = fixture();
    let graph = MemoryGraph::new();
    // users, groups, members, messages, then the message-link pass.
    graph.fail_commit_number(5);
    let err = create_all(&graph, &fx.dataset, LoadOptions::default()).unwrap_err();

    assert!(matches!(err, LoadError::Phase { phase, .. } if phase == LINK_MESSAGES));
    assert!(matches!(err.root(), LoadError::Dgraph(_)));
    assert_eq!(graph.discarded_count(), 1);
    assert!(graph.edge_targets(&user(&graph, "Alice"), "SEND").is_empty());
    assert_eq!(graph.nodes_of_type("Message").len(), 2);
}

#[test]
fn compensation_removes_everything_this_run_created() {
    let fx = fixture();
    let graph = MemoryGraph::new();
    graph.fail_commit_number(5);
    let err = create_all(&graph, &fx.dataset, LoadOptions { compensate: true }).unwrap_err();

    match err {
        LoadError::Phase { compensated, .. } => assert_eq!(compensated, Some(6)),
        other => panic!("unexpected error: {other}"),
    }
    assert_eq!(graph.node_count(), 0);
}

#[test]
fn compensation_leaves_earlier_runs_alone() {
    let fx = fixture();
    let graph = MemoryGraph::new();
    create_all(&graph, &fx.dataset, LoadOptions::default()).unwrap();

    graph.fail_mutation_containing("SEEN");
    let err = create_all(&graph, &fx.dataset, LoadOptions { compensate: true }).unwrap_err();
    assert!(matches!(err, LoadError::Phase { compensated: Some(7), .. }));
    assert_eq!(graph.node_count(), 7);
}

#[test]
fn duplicate_temp_id_rejects_the_batch() {
    let fx = fixture_with(&[(
        EntityKind::User,
        "uid,name,description,phone,location,SEND,POST\n\
         _:u1,Alice,,1,\"(0, 0)\",[],[]\n\
         u1,Alias,,2,\"(0, 0)\",[],[]\n",
    )]);
    let graph = MemoryGraph::new();
    let err = create_all(&graph, &fx.dataset, LoadOptions::default()).unwrap_err();

    assert!(matches!(
        err.root(),
        LoadError::Duplicate { kind: EntityKind::User, temp_id } if temp_id == "u1"
    ));
    assert_eq!(graph.node_count(), 0);
    assert_eq!(graph.commit_count(), 0);
}

#[test]
fn message_with_two_targets_fails_its_load() {
    let fx = fixture_with(&[(
        EntityKind::Message,
        "uid,content,reactions,sendAt,BELONGS_TO,RECEIVE\n_:m1,x,[],2023-01-01,_:g1,_:u2\n",
    )]);
    let graph = MemoryGraph::new();
    let err = create_all(&graph, &fx.dataset, LoadOptions::default()).unwrap_err();

    assert!(matches!(err, LoadError::Phase { phase, .. } if phase == LOAD_MESSAGES));
    assert!(matches!(
        err.root(),
        LoadError::Ingest(IngestError::MessageTarget { .. })
    ));
}

#[test]
fn missing_file_is_reported_before_any_request() {
    let fx = fixture();
    fs::remove_file(&fx.dataset.statuses).unwrap();
    let graph = MemoryGraph::new();
    let err = create_all(&graph, &fx.dataset, LoadOptions::default()).unwrap_err();

    assert!(matches!(err, LoadError::Ingest(IngestError::Open { .. })));
    assert!(graph.recorded_mutations().is_empty());
}
