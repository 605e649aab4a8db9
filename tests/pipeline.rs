//! The HTTP pipeline, tested against a mock backend.

use dashboard_client::{
    endpoints::{data, DataQuery, RecordInput},
    ApiClient, ApiError, AuthListener, Config, CredentialStore, Id,
    MemoryStore,
};
use serde_json::json;
use std::sync::{
    atomic::{AtomicUsize, Ordering},
    Arc, Weak,
};
use wiremock::{
    matchers::{header, method, path, query_param},
    Mock, MockServer, ResponseTemplate,
};

#[derive(Default)]
struct CountingListener(AtomicUsize);

impl AuthListener for CountingListener {
    fn authentication_lost(&self) { self.0.fetch_add(1, Ordering::SeqCst); }
}

fn client_for(server: &MockServer, store: Arc<MemoryStore>) -> ApiClient {
    let config = Config::default().with_base_url(&server.uri()).unwrap();
    ApiClient::new(&config, store).unwrap()
}

fn closed_port() -> String {
    let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
    let addr = listener.local_addr().unwrap();
    drop(listener);

    format!("http://{}", addr)
}

#[tokio::test]
async fn the_token_is_read_from_the_store_on_every_request() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/api/user/stats"))
        .and(header("Authorization", "Bearer late-token"))
        .respond_with(
            ResponseTemplate::new(200).set_body_json(json!({"stats": {}})),
        )
        .expect(1)
        .mount(&server)
        .await;
    let store = Arc::new(MemoryStore::new());
    let client = client_for(&server, store.clone());

    // written after the client was built
    store.set("late-token").unwrap();
    let got = dashboard_client::endpoints::user::stats(&client).await;

    assert!(got.is_ok());
}

#[tokio::test]
async fn anonymous_requests_carry_no_authorization() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/api/data/stats/summary"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(json!({"summary": {"total": 3}})),
        )
        .mount(&server)
        .await;
    let client = client_for(&server, Arc::new(MemoryStore::new()));

    let got = data::summary(&client).await.unwrap();

    assert_eq!(got, json!({"total": 3}));
    let requests = server.received_requests().await.unwrap();
    assert_eq!(requests.len(), 1);
    assert!(requests[0].headers.get("authorization").is_none());
    assert_eq!(
        requests[0].headers.get("content-type").unwrap(),
        "application/json"
    );
}

#[tokio::test]
async fn unauthorized_responses_drop_the_token_and_tell_the_listener() {
    let server = MockServer::start().await;
    Mock::given(path("/api/data"))
        .respond_with(
            ResponseTemplate::new(401)
                .set_body_json(json!({"error": "Token expired"})),
        )
        .mount(&server)
        .await;
    let store = Arc::new(MemoryStore::with_token("stale"));
    let client = client_for(&server, store.clone());
    client.set_bearer("stale").unwrap();
    let listener = Arc::new(CountingListener::default());
    let weak = Arc::downgrade(&listener);
    let weak: Weak<dyn AuthListener> = weak;
    client.set_listener(weak);

    let err = data::list(&client, &DataQuery::default()).await.unwrap_err();

    match &err {
        ApiError::Unauthorized { .. } => {},
        other => panic!("Expected a 401, got {:?}", other),
    }
    assert_eq!(err.payload_message(), Some("Token expired"));
    assert_eq!(store.get().unwrap(), None);
    assert_eq!(client.bearer(), None);
    assert_eq!(listener.0.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn server_errors_are_normalised() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/api/data"))
        .respond_with(
            ResponseTemplate::new(503)
                .set_body_json(json!({"error": "database on fire"})),
        )
        .mount(&server)
        .await;
    let client = client_for(&server, Arc::new(MemoryStore::new()));

    let err = data::create(&client, &RecordInput::new("Revenue", 1.0))
        .await
        .unwrap_err();

    assert!(matches!(err, ApiError::Server { .. }));
    assert_eq!(err.describe(), "Server error. Please try again later.");
}

#[tokio::test]
async fn validation_errors_keep_their_message() {
    let server = MockServer::start().await;
    Mock::given(method("PUT"))
        .and(path("/api/data/r1"))
        .respond_with(
            ResponseTemplate::new(400)
                .set_body_json(json!({"message": "Title is required"})),
        )
        .mount(&server)
        .await;
    let client = client_for(&server, Arc::new(MemoryStore::with_token("t")));

    let err = data::update(&client, &Id::from("r1"), &RecordInput::new("", 1.0))
        .await
        .unwrap_err();

    assert!(matches!(err, ApiError::Rejected { .. }));
    assert_eq!(err.describe(), "Title is required");
    assert!(!err.is_network());
}

#[tokio::test]
async fn missing_servers_are_network_errors() {
    let config = Config::default().with_base_url(&closed_port()).unwrap();
    let client = ApiClient::new(&config, Arc::new(MemoryStore::new())).unwrap();

    let err = data::summary(&client).await.unwrap_err();

    assert!(err.is_network());
    assert_eq!(err.describe(), "Network error. Please check your connection.");
}

#[tokio::test]
async fn deleting_accepts_an_empty_204() {
    let server = MockServer::start().await;
    Mock::given(method("DELETE"))
        .and(path("/api/data/r1"))
        .respond_with(ResponseTemplate::new(204))
        .expect(1)
        .mount(&server)
        .await;
    let client = client_for(&server, Arc::new(MemoryStore::with_token("t")));

    data::delete(&client, &Id::from("r1")).await.unwrap();
}

#[tokio::test]
async fn listing_sends_the_query_string() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/api/data"))
        .and(query_param("page", "2"))
        .and(query_param("limit", "10"))
        .and(query_param("search", "revenue"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "data": [{"_id": "r1", "title": "Revenue", "value": 10}],
            "pagination": {"page": 2, "limit": 10, "total": 11, "pages": 2}
        })))
        .expect(1)
        .mount(&server)
        .await;
    let client = client_for(&server, Arc::new(MemoryStore::with_token("t")));
    let query = DataQuery {
        search: Some(String::from("revenue")),
        ..DataQuery::page(2)
    };

    let page = data::list(&client, &query).await.unwrap();

    assert_eq!(page.data.len(), 1);
    assert_eq!(page.data[0].title, "Revenue");
    assert_eq!(page.pagination.pages, 2);
}

#[tokio::test]
async fn garbage_success_bodies_are_decode_errors() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/api/user/profile"))
        .respond_with(ResponseTemplate::new(200).set_body_string("<html>"))
        .mount(&server)
        .await;
    let client = client_for(&server, Arc::new(MemoryStore::with_token("t")));

    let err = dashboard_client::endpoints::profile(&client)
        .await
        .unwrap_err();

    assert!(matches!(err, ApiError::Decode(_)));
}
