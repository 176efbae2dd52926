// Persistor and loader behavior against the memory and file backends.
use std::sync::Arc;

use pathstate::api::{
    Backend, FileBackend, MemoryBackend, Persistor, SetOptions, Store, StoreConfig, load,
};
use serde_json::json;

#[tokio::test]
async fn writes_are_flattened_and_replace_stale_keys() {
    let backend = Arc::new(MemoryBackend::new());
    let mut store = Store::new();
    let persistor = Persistor::attach(&mut store, Arc::clone(&backend));

    store
        .set("app.location", json!({"city": "Austin", "zip": "78701"}))
        .expect("set");
    store.set("app.locationPrevious", json!("Dallas")).expect("set");
    store.set("app.location", json!({"city": "Reno"})).expect("set");
    persistor.flush().await.expect("flush");

    let snapshot = backend.snapshot().expect("snapshot");
    let keys: Vec<&str> = snapshot.keys().map(String::as_str).collect();
    assert_eq!(keys, ["location.city", "locationPrevious"]);
    assert_eq!(snapshot["location.city"], "\"Reno\"");

    persistor.shutdown(&mut store).await.expect("shutdown");
}

#[tokio::test]
async fn leaf_writes_removals_and_immutable_values() {
    let backend = Arc::new(MemoryBackend::new());
    let mut store = Store::new();
    let persistor = Persistor::attach(&mut store, Arc::clone(&backend));

    store.set("app.list", json!(["a", "b", "c"])).expect("set");
    store.remove("app.list[2]").expect("remove");
    store.set("app.count", json!(3)).expect("set");
    store
        .set_with(
            "app.config",
            json!({"theme": "dark"}),
            SetOptions::new().with_immutable(true),
        )
        .expect("set");
    persistor.flush().await.expect("flush");

    assert_eq!(backend.get("list[0]").expect("get").as_deref(), Some("\"a\""));
    assert_eq!(backend.get("list[2]").expect("get"), None);
    assert_eq!(backend.get("count").expect("get").as_deref(), Some("3"));
    assert_eq!(
        backend.get("config").expect("get").as_deref(),
        Some("{\"theme\":\"dark\"}")
    );

    persistor.shutdown(&mut store).await.expect("shutdown");
}

#[tokio::test]
async fn unpersisted_and_silent_changes_are_skipped() {
    let backend = Arc::new(MemoryBackend::new());
    let mut store = Store::new();
    let persistor = Persistor::attach(&mut store, Arc::clone(&backend));

    store
        .set_with("app.session", json!("tmp"), SetOptions::new().with_persist(false))
        .expect("set");
    store
        .set_with("app.quiet", json!(1), SetOptions::new().with_notify(false))
        .expect("set");
    persistor.flush().await.expect("flush");
    assert!(backend.records().expect("records").is_empty());

    // A silent write only reaches the backend once a later change covers it.
    store.set("app.quiet", json!(2)).expect("set");
    persistor.shutdown(&mut store).await.expect("shutdown");
    assert_eq!(backend.keys().expect("keys"), ["quiet"]);

    store.set("app.after", json!(1)).expect("set");
    assert_eq!(store.listener_count("app"), 0);
    assert_eq!(backend.keys().expect("keys"), ["quiet"]);
}

#[tokio::test]
async fn file_backend_round_trip() {
    let dir = tempfile::tempdir().expect("tempdir");
    let path = dir.path().join("state.json");

    let backend = Arc::new(FileBackend::new(&path));
    let mut store = Store::new();
    let persistor = Persistor::attach(&mut store, Arc::clone(&backend));
    store
        .set("app.user", json!({"name": "Ada", "langs": ["en", "fr"]}))
        .expect("set");
    store.set("app.user.langs[2]", json!("de")).expect("set");
    store.set("app.greeting", json!("hi")).expect("set");
    persistor.shutdown(&mut store).await.expect("shutdown");

    let mut restored = Store::new();
    let outcome = load(&mut restored, &FileBackend::new(&path)).expect("load");
    assert_eq!(outcome.skipped, 0);
    assert_eq!(
        restored.get("app").expect("get"),
        store.get("app").expect("get")
    );
    assert!(restored.notifications_enabled());
}

#[tokio::test]
async fn custom_root_is_stripped_from_keys() {
    let backend = Arc::new(MemoryBackend::new());
    let mut store = Store::with_config(StoreConfig::new("state"));
    let persistor = Persistor::attach(&mut store, Arc::clone(&backend));
    store.set("state.a.b", json!(true)).expect("set");
    persistor.shutdown(&mut store).await.expect("shutdown");

    assert_eq!(backend.get("a.b").expect("get").as_deref(), Some("true"));

    let mut restored = Store::with_config(StoreConfig::new("state"));
    load(&mut restored, backend.as_ref()).expect("load");
    assert_eq!(restored.get("state.a.b").expect("get"), Some(&json!(true)));
}

#[tokio::test]
async fn removal_through_an_alias_drops_the_concrete_records() {
    let backend = Arc::new(MemoryBackend::new());
    let mut store = Store::new();
    let persistor = Persistor::attach(&mut store, Arc::clone(&backend));

    store
        .set("app.assessments.a1", json!({"x": 1, "y": 2}))
        .expect("set");
    store.link("app.assessments.a1", "app.current").expect("link");
    store.remove("app.current.x").expect("remove");
    store.set("app.current.z", json!(3)).expect("set");
    persistor.shutdown(&mut store).await.expect("shutdown");

    assert_eq!(
        backend.keys().expect("keys"),
        ["assessments.a1.y", "assessments.a1.z"]
    );

    let mut restored = Store::new();
    load(&mut restored, backend.as_ref()).expect("load");
    assert_eq!(
        restored.get("app.assessments.a1").expect("get"),
        Some(&json!({"y": 2, "z": 3}))
    );
}
