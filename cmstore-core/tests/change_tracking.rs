//! End-to-end tests for the change-tracking protocol and definition diffs.

use cmstore_core::component::{ActionType, action_set, diff};
use cmstore_core::{
    BackEndCredential, ComponentState, FromXml, TrackedSet, parse_str, write_document,
};

fn credential(alias: &str, server: &str) -> BackEndCredential {
    BackEndCredential::new(alias, "oracle:thin", server).unwrap()
}

#[test]
fn edit_session_flushes_one_batch() {
    // A set loaded from the persisted form
    let mut set = TrackedSet::from_loaded([
        credential("inventoryDb", "//dbhost:1521/INV"),
        credential("archiveDb", "//dbhost:1521/ARC"),
    ])
    .unwrap();
    assert!(!set.has_changes());

    // An editing session: repoint one, add one, drop one
    set.modify("inventoryDb", |c| c.set_server("//newhost:1521/INV"))
        .unwrap();
    set.insert(credential("reportsDb", "//dbhost:1521/RPT"))
        .unwrap();
    set.remove("archiveDb").unwrap();

    assert_eq!(set.state("inventoryDb"), Some(ComponentState::Updated));
    assert_eq!(set.state("reportsDb"), Some(ComponentState::Inserted));
    assert_eq!(set.state("archiveDb"), Some(ComponentState::Deleted));

    let batch = set.flush().expect("session produced changes");
    let actions: Vec<(&str, &str)> = batch
        .children_named("Action")
        .map(|action| {
            (
                action.attribute("type").unwrap(),
                action.children()[0].attribute("alias").unwrap(),
            )
        })
        .collect();
    assert_eq!(
        actions,
        vec![
            ("update", "inventoryDb"),
            ("delete", "archiveDb"),
            ("insert", "reportsDb"),
        ]
    );

    // The batch is consumable XML
    let xml = write_document(&batch).unwrap();
    let reparsed = parse_str(&xml).unwrap();
    assert_eq!(reparsed.children_named("Action").count(), 3);

    // A second flush owes the back end nothing
    assert!(!set.has_changes());
    assert!(set.flush().is_none());
    assert_eq!(set.len(), 2);
}

#[test]
fn action_payload_round_trips_the_component() {
    let mut set = TrackedSet::new();
    let mut secret = credential("inventoryDb", "//dbhost:1521/INV");
    secret.set_secret(Some("hunter2".to_string()));
    set.insert(secret.clone()).unwrap();

    let batch = set.flush().unwrap();
    let action = batch.children_named("Action").next().unwrap();
    let payload = BackEndCredential::from_xml(&action.children()[0]).unwrap();
    assert_eq!(payload, secret);
}

#[test]
fn diff_of_loaded_definitions_matches_edit_session() {
    let baseline = [
        credential("inventoryDb", "//dbhost:1521/INV"),
        credential("archiveDb", "//dbhost:1521/ARC"),
    ];
    let edited = [
        credential("inventoryDb", "//newhost:1521/INV"),
        credential("reportsDb", "//dbhost:1521/RPT"),
    ];

    let actions = diff(&baseline, &edited);
    let kinds: Vec<ActionType> = actions.iter().map(|(a, _)| *a).collect();
    assert_eq!(
        kinds,
        vec![ActionType::Update, ActionType::Insert, ActionType::Delete]
    );

    let batch = action_set(&actions).unwrap();
    assert_eq!(batch.name(), "ActionSet");
    assert!(batch.attribute("batchId").is_some());
    assert_eq!(batch.children_named("Action").count(), 3);
}

#[test]
fn diff_of_identical_sets_is_empty() {
    let baseline = [credential("inventoryDb", "//dbhost:1521/INV")];
    let actions = diff(&baseline, &baseline);
    assert!(actions.is_empty());
    assert!(action_set(&actions).is_none());
}

#[test]
fn rejected_edit_does_not_dirty_the_set() {
    let mut set = TrackedSet::from_loaded([credential("inventoryDb", "//dbhost:1521/INV")])
        .unwrap();

    // Empty server violates the setter invariant
    let result = set.modify("inventoryDb", |c| c.set_server(""));
    assert!(result.is_err());
    assert!(!set.has_changes());
}
