use axum::body::Body;
use axum::http::{header, Method, Request, StatusCode};
use axum::Router;
use base64::Engine;
use deltacloud::collections::{router, AppState};
use deltacloud::drivers::{MockDriver, RhevmDriver};
use serde_json::{json, Value};
use std::sync::Arc;
use tower::ServiceExt;

fn mock_app() -> Router {
    router(AppState::new(Arc::new(MockDriver::new()), None, None))
}

fn basic(user: &str, password: &str) -> String {
    let encoded = base64::engine::general_purpose::STANDARD.encode(format!("{}:{}", user, password));
    format!("Basic {}", encoded)
}

fn request(method: Method, uri: &str) -> axum::http::request::Builder {
    Request::builder()
        .method(method)
        .uri(uri)
        .header(header::HOST, "localhost:3001")
        .header(header::AUTHORIZATION, basic("mockuser", "mockpassword"))
}

async fn send(app: &Router, request: Request<Body>) -> (StatusCode, Value) {
    let response = app.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    let body = if bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&bytes).unwrap()
    };
    (status, body)
}

async fn get(app: &Router, uri: &str) -> (StatusCode, Value) {
    send(app, request(Method::GET, uri).body(Body::empty()).unwrap()).await
}

async fn post_json(app: &Router, uri: &str, body: Value) -> (StatusCode, Value) {
    let request = request(Method::POST, uri)
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from(body.to_string()))
        .unwrap();
    send(app, request).await
}

#[tokio::test]
async fn test_entry_point() {
    let app = mock_app();
    let request = Request::builder()
        .uri("/api")
        .header(header::HOST, "localhost:3001")
        .body(Body::empty())
        .unwrap();
    let (status, body) = send(&app, request).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["api"]["driver"], "mock");
    let links = body["api"]["links"].as_array().unwrap();
    let rels: Vec<&str> = links.iter().map(|l| l["rel"].as_str().unwrap()).collect();
    assert!(rels.contains(&"realms"));
    assert!(rels.contains(&"ports"));
    assert!(!rels.contains(&"address_templates"));

    let instances = links.iter().find(|l| l["rel"] == "instances").unwrap();
    assert_eq!(instances["href"], "http://localhost:3001/api/instances");
    assert!(instances["features"]
        .as_array()
        .unwrap()
        .contains(&json!("user_data")));
    let operations = instances["operations"].as_array().unwrap();
    assert!(operations.contains(&json!({ "name": "start", "method": "POST" })));
    assert!(operations.contains(&json!({ "name": "destroy", "method": "DELETE" })));
    assert!(operations.contains(&json!({ "name": "index", "method": "GET" })));
}

#[tokio::test]
async fn test_routes_answer_only_their_declared_method() {
    let app = mock_app();

    let (status, _) = get(&app, "/api/instances/inst1/start").await;
    assert_eq!(status, StatusCode::METHOD_NOT_ALLOWED);

    let (status, _) = post_json(&app, "/api/instances/inst1", json!({})).await;
    assert_eq!(status, StatusCode::METHOD_NOT_ALLOWED);

    let request = request(Method::DELETE, "/api/realms").body(Body::empty()).unwrap();
    let (status, _) = send(&app, request).await;
    assert_eq!(status, StatusCode::METHOD_NOT_ALLOWED);

    let (status, _) = get(&app, "/api/realms").await;
    assert_eq!(status, StatusCode::OK);
}

#[tokio::test]
async fn test_missing_credentials() {
    let app = mock_app();
    let request = Request::builder()
        .uri("/api/realms")
        .body(Body::empty())
        .unwrap();
    let response = app.oneshot(request).await.unwrap();

    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    assert_eq!(
        response.headers().get(header::WWW_AUTHENTICATE).unwrap(),
        "Basic realm=\"Deltacloud\""
    );
}

#[tokio::test]
async fn test_wrong_credentials() {
    let app = mock_app();
    let request = Request::builder()
        .uri("/api/realms")
        .header(header::AUTHORIZATION, basic("mockuser", "nope"))
        .body(Body::empty())
        .unwrap();
    let (status, body) = send(&app, request).await;

    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["error"]["code"], 401);
    assert_eq!(body["error"]["message"], "Authentication Failure");
}

#[tokio::test]
async fn test_realms() {
    let app = mock_app();

    let (status, body) = get(&app, "/api/realms").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["realms"].as_array().unwrap().len(), 2);

    let (status, body) = get(&app, "/api/realms/us").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["realm"]["id"], "us");
    assert_eq!(body["realm"]["href"], "http://localhost:3001/api/realms/us");

    let (status, body) = get(&app, "/api/realms/nowhere").await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["error"]["code"], 404);
}

#[tokio::test]
async fn test_index_filters() {
    let app = mock_app();

    let (status, body) = get(&app, "/api/instances?state=STOPPED").await;
    assert_eq!(status, StatusCode::OK);
    let instances = body["instances"].as_array().unwrap();
    assert_eq!(instances.len(), 1);
    assert_eq!(instances[0]["id"], "inst1");

    let (_, body) = get(&app, "/api/instances?realm_id=us").await;
    assert!(body["instances"]
        .as_array()
        .unwrap()
        .iter()
        .all(|i| i["realm_id"] == "us"));
}

#[tokio::test]
async fn test_instance_actions_follow_state_machine() {
    let app = mock_app();

    let (_, body) = get(&app, "/api/instances/inst0").await;
    assert_eq!(body["instance"]["state"], "RUNNING");
    assert_eq!(body["instance"]["actions"], json!(["reboot", "stop"]));

    let (status, body) = post_json(&app, "/api/instances/inst1/stop", json!({})).await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(body["error"]["code"], 409);

    let (status, body) = post_json(&app, "/api/instances/inst0/stop", json!({})).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["instance"]["state"], "STOPPED");
    assert_eq!(body["instance"]["actions"], json!(["start", "destroy"]));

    let request = request(Method::DELETE, "/api/instances/inst0")
        .body(Body::empty())
        .unwrap();
    let (status, _) = send(&app, request).await;
    assert_eq!(status, StatusCode::NO_CONTENT);

    let (status, _) = get(&app, "/api/instances/inst0").await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_create_instance() {
    let app = mock_app();

    let (status, body) = post_json(
        &app,
        "/api/instances",
        json!({ "image_id": "img1", "name": "web", "user_data": "aGVsbG8=" }),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(body["instance"]["image_id"], "img1");
    assert!(body["instance"]["href"]
        .as_str()
        .unwrap()
        .starts_with("http://localhost:3001/api/instances/"));

    let (status, body) = post_json(&app, "/api/instances", json!({ "name": "web" })).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body["error"]["message"].as_str().unwrap().contains("image_id"));
}

#[tokio::test]
async fn test_ports_lifecycle() {
    let app = mock_app();

    let req = request(Method::POST, "/api/ports")
        .header(header::CONTENT_TYPE, "application/x-www-form-urlencoded")
        .body(Body::from("network=net1"))
        .unwrap();
    let (status, body) = send(&app, req).await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(body["port"]["network_id"], "net1");
    let id = body["port"]["id"].as_str().unwrap().to_string();

    let (_, body) = get(&app, "/api/ports?network_id=net1").await;
    assert!(body["ports"]
        .as_array()
        .unwrap()
        .iter()
        .any(|p| p["id"] == id.as_str()));

    let req = request(Method::DELETE, &format!("/api/ports/{}", id))
        .body(Body::empty())
        .unwrap();
    let (status, body) = send(&app, req).await;
    assert_eq!(status, StatusCode::NO_CONTENT);
    assert_eq!(body, Value::Null);

    let (status, _) = get(&app, &format!("/api/ports/{}", id)).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_create_port_requires_network() {
    let app = mock_app();
    let (status, body) = post_json(&app, "/api/ports", json!({})).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body["error"]["message"].as_str().unwrap().contains("network"));
}

#[tokio::test]
async fn test_routes_follow_driver_capabilities() {
    let driver = RhevmDriver::new("https://rhevm.example.com/api", reqwest::Client::new());
    let app = router(AppState::new(Arc::new(driver), None, None));

    let (status, _) = get(&app, "/api/ports").await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let (status, _) = post_json(&app, "/api/networks", json!({ "name": "lab" })).await;
    assert_eq!(status, StatusCode::METHOD_NOT_ALLOWED);

    // Rejected before the backend is contacted.
    let (status, body) = post_json(
        &app,
        "/api/instances",
        json!({ "image_id": "tpl-1", "keyname": "mykey" }),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body["error"]["message"]
        .as_str()
        .unwrap()
        .contains("authentication_key"));
}
