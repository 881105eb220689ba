//! End-to-end behaviour of DocumentStore over the in-memory database

use docstore_session::{
    modify_fn, Collection, Database, Document, DocumentStore, Filter, MemoryDatabase,
    ReapingStatus, SessionData, SessionError, SessionStore, StoreOptions,
};
use serde_json::{json, Value};
use std::time::Duration;
use tokio_test::{assert_err, assert_ok};
use uuid::Uuid;

const COLLECTION: &str = "sessions_test";

fn init_tracing() {
    let _ = tracing_subscriber::fmt().with_test_writer().try_init();
}

fn new_sid() -> String {
    Uuid::new_v4().to_string()
}

fn session(value: Value) -> SessionData {
    serde_json::from_value(value).unwrap()
}

async fn open(options: StoreOptions) -> (MemoryDatabase, DocumentStore) {
    init_tracing();
    let db = MemoryDatabase::new();
    let store = DocumentStore::connect(&db, options.with_collection_name(COLLECTION), None)
        .await
        .unwrap();
    (db, store)
}

#[tokio::test]
async fn test_set_writes_document_shape() {
    let (db, store) = open(StoreOptions::default()).await;
    let sid = new_sid();

    store
        .set(&sid, &session(json!({"cookie": {"maxAge": 3000}, "name": "SOME_NAME"})))
        .await
        .unwrap();

    let col = db.collection(COLLECTION).await.unwrap();
    let doc = col.find_one(&Filter::id(sid.as_str())).await.unwrap().unwrap();
    assert_eq!(doc["_id"], sid.as_str());
    assert_eq!(
        doc["session"],
        r#"{"cookie":{"maxAge":3000},"name":"SOME_NAME"}"#
    );
    assert!(doc["expires"].as_i64().is_some());
}

#[tokio::test]
async fn test_get_returns_what_was_set() {
    let (_db, store) = open(StoreOptions::default()).await;
    let sid = new_sid();
    let original = session(json!({
        "cookie": {"maxAge": 3000, "path": "/"},
        "name": "SOME_NAME",
        "cart": [{"sku": "a-1", "qty": 2}],
        "nested": {"deep": {"list": [1, 2.5, "three", null, false]}}
    }));

    store.set(&sid, &original).await.unwrap();
    let loaded = store.get(&sid).await.unwrap();

    assert_eq!(loaded, Some(original));
}

#[tokio::test]
async fn test_null_cookie_round_trips() {
    let (db, store) = open(StoreOptions::default()).await;
    let sid = new_sid();
    let original = session(json!({"cookie": null, "name": "SOME_NAME"}));

    store.set(&sid, &original).await.unwrap();

    let col = db.collection(COLLECTION).await.unwrap();
    let doc = col.find_one(&Filter::id(sid.as_str())).await.unwrap().unwrap();
    assert_eq!(doc["session"], r#"{"cookie":null,"name":"SOME_NAME"}"#);

    let loaded = store.get(&sid).await.unwrap().unwrap();
    assert!(loaded.cookie.as_ref().unwrap().is_null());
    assert_eq!(loaded, original);
}

#[tokio::test]
async fn test_get_unknown_sid() {
    let (_db, store) = open(StoreOptions::default()).await;
    assert!(store.get(&new_sid()).await.unwrap().is_none());
}

#[tokio::test]
async fn test_destroy_removes_session() {
    let (_db, store) = open(StoreOptions::default()).await;
    let sid = new_sid();

    assert_ok!(store.set(&sid, &SessionData::with_max_age(3000)).await);
    let removed = assert_ok!(store.destroy(&sid).await);
    assert_eq!(removed.deleted, 1);

    assert!(store.get(&sid).await.unwrap().is_none());
    assert_eq!(store.length().await.unwrap(), 0);
}

#[tokio::test]
async fn test_overwrite_does_not_duplicate() {
    let (_db, store) = open(StoreOptions::default()).await;
    let sid = new_sid();

    let mut data = SessionData::with_max_age(60);
    data.set("views", 1);
    store.set(&sid, &data).await.unwrap();
    data.set("views", 2);
    store.set(&sid, &data).await.unwrap();

    assert_eq!(store.length().await.unwrap(), 1);
    let loaded = store.get(&sid).await.unwrap().unwrap();
    assert_eq!(loaded.get::<u32>("views"), Some(2));
}

#[tokio::test]
async fn test_length_and_clear() {
    let (_db, store) = open(StoreOptions::default()).await;

    for _ in 0..3 {
        store.set(&new_sid(), &SessionData::new()).await.unwrap();
    }
    assert_eq!(store.length().await.unwrap(), 3);

    store.clear().await.unwrap();
    assert_eq!(store.length().await.unwrap(), 0);
}

#[tokio::test]
async fn test_expired_sessions_are_reaped() {
    let options = StoreOptions::new()
        .with_ttl_ms(150)
        .with_reap_interval_ms(500)
        .with_log_reaping(true);
    let (_db, store) = open(options).await;
    let sid = new_sid();

    store.set(&sid, &SessionData::with_max_age(3000)).await.unwrap();
    assert_eq!(store.length().await.unwrap(), 1);

    tokio::time::sleep(Duration::from_millis(1200)).await;

    assert_eq!(store.length().await.unwrap(), 0);
    assert!(store.get(&sid).await.unwrap().is_none());

    store.shutdown().await;
    assert_eq!(store.reaping_status(), ReapingStatus::Stopped);
}

#[tokio::test]
async fn test_live_sessions_survive_reaping() {
    let options = StoreOptions::new().with_reap_interval_ms(500);
    let (_db, store) = open(options).await;
    let sid = new_sid();

    store.set(&sid, &SessionData::with_max_age(3600)).await.unwrap();
    tokio::time::sleep(Duration::from_millis(700)).await;

    assert!(store.get(&sid).await.unwrap().is_some());
    store.shutdown().await;
}

#[tokio::test]
async fn test_modify_hook_projects_queryable_fields() {
    init_tracing();
    let db = MemoryDatabase::new();
    let hook = modify_fn(|session| {
        let user = session.get::<String>("user")?;
        let mut extra = Document::new();
        extra.insert("user_id".to_string(), Value::String(user));
        Some(extra)
    });
    let store = DocumentStore::connect(&db, StoreOptions::default(), Some(hook))
        .await
        .unwrap();

    let mut alice = SessionData::new();
    alice.set("user", "alice");
    store.set("s1", &alice).await.unwrap();
    store.set("s2", &SessionData::new()).await.unwrap();

    let col = db.memory_collection("sessions");
    assert_eq!(col.document("s1").unwrap()["user_id"], "alice");
    assert!(col.document("s2").unwrap().get("user_id").is_none());

    // Only the session payload comes back
    assert_eq!(store.get("s1").await.unwrap(), Some(alice));
}

#[tokio::test]
async fn test_corrupt_document_is_an_error() {
    let (db, store) = open(StoreOptions::default()).await;
    let col = db.memory_collection(COLLECTION);
    col.insert_raw(
        json!({"_id": "broken", "session": "{\"cookie\":", "expires": 1})
            .as_object()
            .unwrap()
            .clone(),
    );

    let err = assert_err!(store.get("broken").await);
    assert!(matches!(err, SessionError::Corrupt { .. }));
    assert!(err.to_string().contains("broken"));
}

#[tokio::test]
async fn test_store_usable_as_trait_object() {
    let (_db, store) = open(StoreOptions::default()).await;
    let store: Box<dyn SessionStore> = Box::new(store);

    assert_ok!(store.set("SID", &SessionData::with_max_age(10)).await);
    let touched = assert_ok!(store.touch("SID", &SessionData::with_max_age(20)).await);
    assert_eq!(touched.matched, 1);
    assert_eq!(store.length().await.unwrap(), 1);
}
