//! Engine Lifecycle and Notification Tests

use mediasearch_core::{DocId, Error, IndexedDocument, Limits};
use mediasearch_engine::{ChangeEvent, ChangeHub, SearchEngine};
use std::collections::HashMap;
use std::sync::Arc;

fn running() -> SearchEngine {
    let engine = SearchEngine::ephemeral();
    engine.init().unwrap();
    engine
}

// ============================================================================
// Lifecycle
// ============================================================================

#[test]
fn test_full_lifecycle() {
    let engine = SearchEngine::ephemeral();
    assert!(!engine.is_running());
    assert!(matches!(engine.search("x"), Err(Error::NotInitialized)));

    engine.init().unwrap();
    engine.init().unwrap();
    assert!(engine.is_running());

    engine.shutdown().unwrap();
    engine.shutdown().unwrap();
    assert!(matches!(engine.search("x"), Err(Error::ShutDown)));
    assert!(matches!(engine.remove(vec!["1".into()]), Err(Error::ShutDown)));
    assert!(matches!(engine.flush(), Err(Error::ShutDown)));
}

#[test]
fn test_empty_query_is_the_only_search_error() {
    let engine = running();
    assert!(matches!(engine.search(""), Err(Error::EmptyQuery)));
    assert!(matches!(engine.search("   "), Err(Error::EmptyQuery)));
    assert!(engine.search("?!").unwrap().is_empty());
    assert!(engine.search("nothing indexed").unwrap().is_empty());
}

#[test]
fn test_rejected_documents_reported() {
    let engine = SearchEngine::ephemeral().with_limits(Limits::with_small_limits());
    engine.init().unwrap();

    let report = engine
        .add_or_update(vec![
            IndexedDocument::named("1", "Heat"),
            IndexedDocument::named("an-id-that-is-way-too-long", "Ronin"),
        ])
        .unwrap();
    assert_eq!(report.applied, 1);
    assert_eq!(report.skipped.len(), 1);
    assert_eq!(engine.search("heat").unwrap(), vec![DocId::from("1")]);
    assert!(engine.search("ronin").unwrap().is_empty());
}

#[test]
fn test_search_items_with_map() {
    let engine = running();
    engine
        .add_or_update(vec![
            IndexedDocument::named("1", "Alien"),
            IndexedDocument::named("2", "Aliens"),
        ])
        .unwrap();

    let mut library = HashMap::new();
    library.insert(DocId::from("2"), "Aliens (1986)");

    let items = engine.search_items("alien", &library).unwrap();
    assert_eq!(items, vec!["Aliens (1986)"]);
}

// ============================================================================
// Notifications
// ============================================================================

#[test]
fn test_notifications_applied_in_order() {
    let engine = running();
    let hub = Arc::new(ChangeHub::new());
    engine.subscribe(hub.clone()).unwrap();

    for i in 0..100 {
        hub.publish(ChangeEvent::updated(vec![IndexedDocument::named(
            "movie",
            format!("Title{}", i),
        )]));
    }
    engine.flush().unwrap();

    assert_eq!(engine.search("title99").unwrap(), vec![DocId::from("movie")]);
    let stats = engine.stats().unwrap();
    assert_eq!(stats.documents, 1);
    assert_eq!(stats.queue_depth, 0);
}

#[test]
fn test_mixed_event_upserts_then_removes() {
    let engine = running();
    let hub = Arc::new(ChangeHub::new());
    engine.subscribe(hub.clone()).unwrap();

    hub.publish(ChangeEvent {
        added: vec![IndexedDocument::named("1", "Heat")],
        updated: vec![IndexedDocument::named("2", "Ronin")],
        removed: vec!["1".into()],
    });
    engine.flush().unwrap();

    assert!(engine.search("heat").unwrap().is_empty());
    assert_eq!(engine.search("ronin").unwrap(), vec![DocId::from("2")]);
}

#[test]
fn test_shutdown_drains_pending_notifications() {
    let engine = running();
    let hub = Arc::new(ChangeHub::new());
    engine.subscribe(hub.clone()).unwrap();

    for i in 0..20 {
        hub.publish(ChangeEvent::added(vec![IndexedDocument::named(
            i.to_string(),
            "Heat",
        )]));
    }
    engine.shutdown().unwrap();
    assert_eq!(hub.listener_count(), 0);

    // Events after shutdown go nowhere
    hub.publish(ChangeEvent::added(vec![IndexedDocument::named("x", "Heat")]));
}

#[test]
fn test_multiple_sources() {
    let engine = running();
    let movies = Arc::new(ChangeHub::new());
    let shows = Arc::new(ChangeHub::new());
    let a = engine.subscribe(movies.clone()).unwrap();
    let b = engine.subscribe(shows.clone()).unwrap();
    assert_eq!(a, b); // separate hubs number independently

    movies.publish(ChangeEvent::added(vec![IndexedDocument::named("m1", "Heat")]));
    shows.publish(ChangeEvent::added(vec![IndexedDocument::named("s1", "Heat Wave")]));
    engine.flush().unwrap();

    assert_eq!(engine.search("heat").unwrap().len(), 2);
}
