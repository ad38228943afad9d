use std::{collections::HashMap, sync::Arc};

use super::*;
use anyhow::Result;
use axum::{
    extract::{Path, Query, State},
    http::{HeaderMap, StatusCode as HttpStatus},
    routing::{get, post, put},
    Json, Router,
};
use serde_json::{json, Value};
use shared::domain::SortOrder;
use tokio::{net::TcpListener, sync::Mutex};

use crate::filter_state::FilterState;

#[derive(Clone, Default)]
struct MockShopState {
    listing_queries: Arc<Mutex<Vec<HashMap<String, String>>>>,
    chatbot_messages: Arc<Mutex<Vec<Value>>>,
    auth_headers: Arc<Mutex<Vec<Option<String>>>>,
    login_bodies: Arc<Mutex<Vec<Value>>>,
    profile_updates: Arc<Mutex<Vec<(i64, Option<String>, Value)>>>,
}

async fn mock_list_laptops(
    State(state): State<MockShopState>,
    Query(params): Query<HashMap<String, String>>,
) -> Json<Value> {
    state.listing_queries.lock().await.push(params);
    Json(json!({
        "count": 41,
        "next": "http://shop.test/api/laptops/?page=2",
        "previous": null,
        "results": [
            {
                "id": 7,
                "name": "XPS 13",
                "brand": "Dell",
                "price": "89999.00",
                "image_url": "/media/xps.png",
                "in_stock": true
            },
            { "name": "orphan without id" }
        ]
    }))
}

async fn mock_laptop_detail(Path(id): Path<String>) -> (HttpStatus, Json<Value>) {
    if id == "404" {
        return (
            HttpStatus::NOT_FOUND,
            Json(json!({ "error": "Laptop not found" })),
        );
    }
    (
        HttpStatus::OK,
        Json(json!({
            "id": id,
            "name": format!("Laptop {id}"),
            "brand": "Lenovo",
            "imageUrl": "https://cdn.example/x.png",
            "inStock": "yes"
        })),
    )
}

async fn mock_chatbot(
    State(state): State<MockShopState>,
    Json(body): Json<Value>,
) -> Json<Value> {
    state.chatbot_messages.lock().await.push(body.clone());
    Json(json!({
        "laptops": [{ "ID": "a1", "Model": "ROG Strix", "Brand": "ASUS", "GPU": "RTX 4060" }],
        "message": "Found 1 laptop",
        "extracted_specs": { "gpu": "RTX" },
        "user_message": body["message"]
    }))
}

async fn mock_favorite_ids(
    State(state): State<MockShopState>,
    headers: HeaderMap,
) -> Json<Value> {
    let header = headers
        .get("authorization")
        .and_then(|value| value.to_str().ok())
        .map(str::to_string);
    state.auth_headers.lock().await.push(header);
    Json(json!([3, "9"]))
}

async fn mock_login(
    State(state): State<MockShopState>,
    Json(body): Json<Value>,
) -> (HttpStatus, Json<Value>) {
    state.login_bodies.lock().await.push(body.clone());
    if body["password"] != "hunter2" {
        return (
            HttpStatus::BAD_REQUEST,
            Json(json!({ "error": "Invalid credentials" })),
        );
    }
    (
        HttpStatus::OK,
        Json(json!({
            "token": "tok-123",
            "user": { "id": 5, "username": "ana", "email": "ana@example.com" },
            "message": "Login successful"
        })),
    )
}

async fn mock_signup(Json(body): Json<Value>) -> (HttpStatus, Json<Value>) {
    if body["username"] == "taken" {
        return (
            HttpStatus::BAD_REQUEST,
            Json(json!({ "error": "Username already exists" })),
        );
    }
    (
        HttpStatus::CREATED,
        Json(json!({
            "message": "Signup successful",
            "user": { "id": 11, "username": body["username"], "email": body["email"] },
            "token": "tok-new"
        })),
    )
}

async fn mock_update_profile(
    State(state): State<MockShopState>,
    Path(id): Path<i64>,
    headers: HeaderMap,
    Json(body): Json<Value>,
) -> Json<Value> {
    let header = headers
        .get("authorization")
        .and_then(|value| value.to_str().ok())
        .map(str::to_string);
    state
        .profile_updates
        .lock()
        .await
        .push((id, header, body.clone()));
    Json(json!({
        "message": "Profile updated successfully",
        "user": { "id": id, "username": body["username"], "email": "ana@example.com" }
    }))
}

async fn mock_garbage() -> &'static str {
    "<html>not json</html>"
}

async fn spawn_shop_server() -> Result<(String, MockShopState)> {
    std::env::set_var("NO_PROXY", "127.0.0.1,localhost");
    let listener = TcpListener::bind("127.0.0.1:0").await?;
    let addr = listener.local_addr()?;
    let state = MockShopState::default();
    let app = Router::new()
        .route("/api/laptops/", get(mock_list_laptops))
        .route("/api/laptops/:id/", get(mock_laptop_detail))
        .route("/api/chatbot/", post(mock_chatbot))
        .route("/api/favorites/laptop_ids/", get(mock_favorite_ids))
        .route("/api/auth/login/", post(mock_login))
        .route("/api/auth/signup/", post(mock_signup))
        .route("/api/auth/profile/:id/", put(mock_update_profile))
        .route("/api/laptop-finder/", post(mock_garbage))
        .with_state(state.clone());
    tokio::spawn(async move {
        let _ = axum::serve(listener, app).await;
    });
    Ok((format!("http://{addr}/api"), state))
}

#[tokio::test]
async fn list_laptops_sends_filters_and_normalizes_page() {
    let (base, state) = spawn_shop_server().await.expect("spawn server");
    let api = ShopApi::new(&format!("{base}/")).expect("api");

    let mut filters = FilterState {
        search_text: "xps".into(),
        sort_order: SortOrder::PriceAscending,
        ..FilterState::default()
    };
    filters.toggle(shared::domain::FacetGroup::Brand, "Dell");
    filters.toggle(shared::domain::FacetGroup::Brand, "HP");

    let page = api
        .list_laptops(&ListingQuery::from_state(&filters))
        .await
        .expect("listing");

    assert_eq!(page.total_count, Some(41));
    assert_eq!(page.items.len(), 1);
    let product = &page.items[0];
    assert_eq!(product.id.as_str(), "7");
    assert_eq!(product.price, Some(89_999.0));
    assert_eq!(
        product.image_url.as_deref(),
        Some(format!("{base}/media/xps.png").as_str())
    );

    let queries = state.listing_queries.lock().await;
    let sent = &queries[0];
    assert_eq!(sent.get("search").map(String::as_str), Some("xps"));
    assert_eq!(sent.get("brand").map(String::as_str), Some("Dell,HP"));
    assert_eq!(sent.get("ordering").map(String::as_str), Some("price"));
    assert_eq!(sent.get("page").map(String::as_str), Some("1"));
    assert_eq!(sent.get("min_price").map(String::as_str), Some("0"));
    assert_eq!(sent.get("max_price").map(String::as_str), Some("260000"));
}

#[tokio::test]
async fn compare_fetches_both_products() {
    let (base, _state) = spawn_shop_server().await.expect("spawn server");
    let api = ShopApi::new(&base).expect("api");

    let (first, second) = api
        .compare(&LaptopId::from("11"), &LaptopId::from("12"))
        .await
        .expect("compare");
    assert_eq!(first.name, "Laptop 11");
    assert_eq!(second.name, "Laptop 12");
    assert!(second.in_stock);

    let err = api
        .compare(&LaptopId::from("11"), &LaptopId::from("404"))
        .await
        .expect_err("missing product");
    match err {
        ApiClientError::Status {
            status, message, ..
        } => {
            assert_eq!(status, 404);
            assert_eq!(message, "Laptop not found");
        }
        other => panic!("unexpected error: {other:?}"),
    }
}

#[tokio::test]
async fn chatbot_posts_message_and_normalizes_dataset_columns() {
    let (base, state) = spawn_shop_server().await.expect("spawn server");
    let api = ShopApi::new(&base).expect("api");

    let reply = api.chatbot("gaming under 90k").await.expect("chatbot");
    assert_eq!(reply.laptops.len(), 1);
    assert_eq!(reply.laptops[0].name, "ROG Strix");
    assert_eq!(reply.laptops[0].graphics.as_deref(), Some("RTX 4060"));
    assert_eq!(reply.message.as_deref(), Some("Found 1 laptop"));

    let messages = state.chatbot_messages.lock().await;
    assert_eq!(messages[0], json!({ "message": "gaming under 90k" }));
}

#[tokio::test]
async fn favorites_require_a_token_before_any_request() {
    let (base, state) = spawn_shop_server().await.expect("spawn server");
    let api = ShopApi::new(&base).expect("api");

    let err = api.favorite_ids().await.expect_err("anonymous");
    assert!(err.requires_login());
    assert!(state.auth_headers.lock().await.is_empty());
}

#[tokio::test]
async fn login_stores_token_for_later_requests() {
    let (base, state) = spawn_shop_server().await.expect("spawn server");
    let api = ShopApi::new(&base).expect("api");

    let rejected = api
        .login(&LoginRequest {
            username: Some("ana".into()),
            email: None,
            password: "wrong".into(),
        })
        .await
        .expect_err("bad password");
    assert!(matches!(rejected, ApiClientError::Status { status: 400, .. }));
    assert!(!api.is_authenticated().await);

    let response = api
        .login(&LoginRequest {
            username: Some("ana".into()),
            email: None,
            password: "hunter2".into(),
        })
        .await
        .expect("login");
    assert_eq!(response.user.username, "ana");
    assert!(api.is_authenticated().await);

    let ids = api.favorite_ids().await.expect("favorite ids");
    assert_eq!(ids, vec![LaptopId::from("3"), LaptopId::from("9")]);
    assert_eq!(
        state.auth_headers.lock().await.as_slice(),
        &[Some("Token tok-123".to_string())]
    );
    assert!(state.login_bodies.lock().await[0].get("email").is_none());

    api.logout().await;
    assert!(!api.is_authenticated().await);
}

#[tokio::test]
async fn signup_signs_in_with_the_new_account() {
    let (base, _state) = spawn_shop_server().await.expect("spawn server");
    let api = ShopApi::new(&base).expect("api");

    let err = api
        .signup(&SignupRequest {
            username: "taken".into(),
            email: "t@example.com".into(),
            password: "longenough".into(),
        })
        .await
        .expect_err("duplicate username");
    match err {
        ApiClientError::Status { status, message, .. } => {
            assert_eq!(status, 400);
            assert_eq!(message, "Username already exists");
        }
        other => panic!("unexpected error: {other:?}"),
    }
    assert!(!api.is_authenticated().await);

    let response = api
        .signup(&SignupRequest {
            username: "ben".into(),
            email: "ben@example.com".into(),
            password: "longenough".into(),
        })
        .await
        .expect("signup");
    assert_eq!(response.token, "tok-new");
    assert_eq!(response.user.id, UserId(11));
    assert_eq!(response.user.email.as_deref(), Some("ben@example.com"));
    assert!(api.is_authenticated().await);
}

#[tokio::test]
async fn update_profile_puts_changes_with_token() {
    let (base, state) = spawn_shop_server().await.expect("spawn server");
    let api = ShopApi::new(&base).expect("api");
    let update = ProfileUpdate {
        username: Some("ana2".into()),
        ..ProfileUpdate::default()
    };

    let err = api
        .update_profile(UserId(5), &update)
        .await
        .expect_err("anonymous");
    assert!(err.requires_login());
    assert!(state.profile_updates.lock().await.is_empty());

    api.login(&LoginRequest {
        username: Some("ana".into()),
        email: None,
        password: "hunter2".into(),
    })
    .await
    .expect("login");
    let user = api
        .update_profile(UserId(5), &update)
        .await
        .expect("update");
    assert_eq!(user.username, "ana2");

    let updates = state.profile_updates.lock().await;
    let (id, header, body) = &updates[0];
    assert_eq!(*id, 5);
    assert_eq!(header.as_deref(), Some("Token tok-123"));
    assert_eq!(body, &json!({ "username": "ana2" }));
}

#[test]
fn google_login_starts_at_the_api() {
    let api = ShopApi::new("https://shop.example/server/api").expect("api");
    assert_eq!(
        api.google_login_url(),
        "https://shop.example/server/api/auth/google/"
    );
}

#[tokio::test]
async fn stored_token_is_loaded_from_store() {
    let api = ShopApi::new("http://127.0.0.1:9/api").expect("api");
    let store = storage::MemoryStore::with_entries([(store_keys::AUTH_TOKEN, "persisted")]);

    assert!(api.load_auth_token(&store).await.expect("load token"));
    assert!(api.is_authenticated().await);

    let empty = storage::MemoryStore::new();
    assert!(!api.load_auth_token(&empty).await.expect("load token"));
    assert!(!api.is_authenticated().await);
}

#[tokio::test]
async fn non_json_body_is_reported_as_malformed() {
    let (base, _state) = spawn_shop_server().await.expect("spawn server");
    let api = ShopApi::new(&base).expect("api");

    let err = api
        .laptop_finder(&FinderRequest {
            query: "thin".into(),
            filters: Default::default(),
        })
        .await
        .expect_err("garbage body");
    assert!(matches!(err, ApiClientError::Malformed { .. }));
}

#[tokio::test]
async fn unreachable_server_is_a_transport_error() {
    std::env::set_var("NO_PROXY", "127.0.0.1,localhost");
    let listener = TcpListener::bind("127.0.0.1:0").await.expect("bind");
    let addr = listener.local_addr().expect("addr");
    drop(listener);

    let api = ShopApi::new(&format!("http://{addr}/api")).expect("api");
    let err = api
        .list_laptops(&ListingQuery::from_state(&FilterState::default()))
        .await
        .expect_err("connection refused");
    assert!(matches!(err, ApiClientError::Transport { .. }));
    assert!(!err.requires_login());
}

#[test]
fn rejects_unusable_base_urls() {
    assert!(matches!(
        ShopApi::new("not a url"),
        Err(ApiClientError::InvalidBaseUrl(_))
    ));
    assert!(matches!(
        ShopApi::new("ftp://shop.example/api"),
        Err(ApiClientError::InvalidBaseUrl(_))
    ));
    let api = ShopApi::new("https://shop.example/api///").expect("api");
    assert_eq!(api.base_url(), "https://shop.example/api");
    assert_eq!(
        api.endpoint(&["laptops", "42"]).as_str(),
        "https://shop.example/api/laptops/42/"
    );
}
