use chatgraph_ingest_csv::literal::parse_string_list;
use chatgraph_ingest_csv::TempId;
use proptest::prelude::*;

fn temp_id_text() -> impl Strategy<Value = String> {
    proptest::string::string_regex("[a-z][a-z0-9_]{0,8}").unwrap()
}

fn python_list(items: &[String], prefixed: bool) -> String {
    let quoted: Vec<String> = items
        .iter()
        .map(|id| {
            if prefixed {
                format!("'_:{id}'")
            } else {
                format!("'{id}'")
            }
        })
        .collect();
    format!("[{}]", quoted.join(", "))
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(128))]

    #[test]
    fn list_cells_keep_item_order(items in proptest::collection::vec(temp_id_text(), 0..12)) {
        let parsed = parse_string_list(&python_list(&items, false)).expect("parse");
        prop_assert_eq!(parsed, items);
    }

    #[test]
    fn prefixed_and_bare_lists_normalize_alike(items in proptest::collection::vec(temp_id_text(), 1..8)) {
        let prefixed = parse_string_list(&python_list(&items, true)).expect("parse");
        let bare = parse_string_list(&python_list(&items, false)).expect("parse");
        let a: Vec<Option<TempId>> = prefixed.iter().map(|s| TempId::parse(s)).collect();
        let b: Vec<Option<TempId>> = bare.iter().map(|s| TempId::parse(s)).collect();
        prop_assert_eq!(a, b);
    }

    #[test]
    fn normalization_is_idempotent(raw in "(_:)?[a-z0-9]{1,8}") {
        let once = TempId::normalize(&raw).to_string();
        prop_assert_eq!(TempId::normalize(&once), once.as_str());
    }
}
