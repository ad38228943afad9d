use super::*;

#[tokio::test]
async fn stores_overwrites_and_removes_values() {
    let storage = Storage::new("sqlite::memory:").await.expect("db");

    assert_eq!(storage.get("authToken").await.expect("get"), None);

    storage.set("authToken", "abc").await.expect("set");
    storage.set("authToken", "def").await.expect("overwrite");
    assert_eq!(
        storage.get("authToken").await.expect("get"),
        Some("def".to_string())
    );

    storage.remove("authToken").await.expect("remove");
    assert_eq!(storage.get("authToken").await.expect("get"), None);
}

#[tokio::test]
async fn health_check_succeeds_for_live_pool() {
    let storage = Storage::new("sqlite::memory:").await.expect("db");
    storage.health_check().await.expect("health check");
}

#[tokio::test]
async fn lists_keys_in_order() {
    let storage = Storage::new("sqlite::memory:").await.expect("db");
    storage.set("chatbotQuery", "q").await.expect("set");
    storage.set("authToken", "t").await.expect("set");
    assert_eq!(
        storage.keys().await.expect("keys"),
        vec!["authToken".to_string(), "chatbotQuery".to_string()]
    );
}

#[tokio::test]
async fn creates_database_file_when_missing() {
    let suffix = std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .expect("clock")
        .as_nanos();
    let temp_root = std::env::temp_dir().join(format!("shop_storage_test_{suffix}"));
    let db_path = temp_root.join("nested").join("shop.db");
    let database_url = format!("sqlite://{}", db_path.to_string_lossy().replace('\\', "/"));

    let storage = Storage::new(&database_url).await.expect("db");
    storage.set("compareProductId", "lap-9").await.expect("set");
    drop(storage);

    let reopened = Storage::new(&database_url).await.expect("reopen");
    assert_eq!(
        reopened.get("compareProductId").await.expect("get"),
        Some("lap-9".to_string())
    );
    drop(reopened);

    assert!(
        db_path.exists(),
        "database file should exist: {}",
        db_path.display()
    );

    std::fs::remove_dir_all(temp_root).expect("cleanup");
}

#[tokio::test]
async fn json_helpers_round_trip_and_ignore_garbage() {
    let store = MemoryStore::with_entries([("broken", "{not json")]);

    save_json(&store, "ids", &vec!["a", "b"]).await.expect("save");
    let ids: Option<Vec<String>> = load_json(&store, "ids").await.expect("load");
    assert_eq!(ids, Some(vec!["a".to_string(), "b".to_string()]));

    let broken: Option<Vec<String>> = load_json(&store, "broken").await.expect("load");
    assert_eq!(broken, None);

    let missing: Option<Vec<String>> = load_json(&store, "missing").await.expect("load");
    assert_eq!(missing, None);
}
