//! Reading the CSV exports from disk.

use chatgraph_ingest_csv::{
    read_all, DataSet, EntityKind, IngestError, MessageTarget, StatusRecord, UserRecord,
};
use std::fs;
use tempfile::tempdir;

#[test]
fn reads_users_from_a_file() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("users.csv");
    fs::write(
        &path,
        "uid,name,description,phone,location,SEND,POST\n\
         _:u1,Alice,Backend dev,555,\"(10, 20)\",\"['_:m1']\",[]\n\
         _:u2,Bob,,556,\"(-1.5, 2)\",[],\"['_:s1', '_:s2']\"\n",
    )
    .unwrap();

    let users: Vec<UserRecord> = read_all(&path).unwrap();
    assert_eq!(users.len(), 2);
    assert_eq!(users[0].name, "Alice");
    assert_eq!(users[1].location.coordinates, [-1.5, 2.0]);
    assert_eq!(users[1].post.len(), 2);
    assert_eq!(users[1].post[1].as_str(), "s2");
}

#[test]
fn locations_outside_geojson_bounds_fail_the_load() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("users.csv");
    for (location, reason) in [
        ("(1e400, 20)", "finite"),
        ("(10, nan)", "invalid literal"),
        ("(190, 20)", "longitude"),
        ("(-70.6, -95)", "latitude"),
    ] {
        fs::write(
            &path,
            format!("uid,name,description,phone,location,SEND,POST\n_:u1,Alice,,555,\"{location}\",[],[]\n"),
        )
        .unwrap();

        match read_all::<UserRecord>(&path) {
            Err(IngestError::Literal { row, column, source, .. }) => {
                assert_eq!(row, 1);
                assert_eq!(column, "location");
                assert!(source.message.contains(reason), "{location}: {source}");
            }
            other => panic!("{location}: expected a literal error, got {other:?}"),
        }
    }
}

#[test]
fn statuses_decode_dates() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("statuses.csv");
    fs::write(
        &path,
        "uid,content,text,postedAt,SEEN\n\
         _:s1,photo,beach,2023-01-01,\"['_:u1']\"\n\
         _:s2,text,hello,2024-01-01T08:00:00Z,[]\n",
    )
    .unwrap();

    let statuses: Vec<StatusRecord> = read_all(&path).unwrap();
    assert_eq!(statuses[0].posted_at.to_rfc3339(), "2023-01-01T00:00:00Z");
    assert!(statuses[0].posted_at < statuses[1].posted_at);
}

#[test]
fn missing_file_is_reported_with_its_path() {
    let dir = tempdir().unwrap();
    let dataset = DataSet::from_dir(dir.path());
    match dataset.check() {
        Err(IngestError::Open { path, .. }) => {
            assert_eq!(path, dir.path().join(EntityKind::User.file_name()))
        }
        other => panic!("expected open error, got {other:?}"),
    }
}

#[test]
fn shipped_sample_data_reads_cleanly() {
    let data_dir = std::path::PathBuf::from(env!("CARGO_MANIFEST_DIR")).join("../../data");
    let dataset = DataSet::from_dir(&data_dir);
    dataset.check().expect("sample data present");

    let users: Vec<UserRecord> = read_all(&dataset.users).unwrap();
    assert!(!users.is_empty());
    // Cells are GeoJSON order: longitude first.
    let carol = users.iter().find(|u| u.name == "Carol").unwrap();
    assert_eq!(carol.location.coordinates, [-99.1332, 19.4326]);
    let messages: Vec<chatgraph_ingest_csv::MessageRecord> = read_all(&dataset.messages).unwrap();
    assert!(messages
        .iter()
        .any(|m| matches!(m.target, MessageTarget::ToGroup(_))));
    assert!(messages
        .iter()
        .any(|m| matches!(m.target, MessageTarget::ToUser(_))));
}
