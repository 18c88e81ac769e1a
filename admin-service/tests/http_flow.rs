//! End-to-end request flow over the router with the in-memory store.
use std::sync::Arc;

use admin_service::identity::ensure_admin;
use admin_service::store::Stores;
use admin_service::{build_router, AppState};
use axum::body::Body;
use axum::http::{header, Request, StatusCode};
use axum::Router;
use common_auth::{JwtConfig, TokenService};
use common_observability::AdminMetrics;
use common_security::bearer_request;
use http_body_util::BodyExt;
use serde_json::{json, Value};
use tower::util::ServiceExt;

const ADMIN_EMAIL: &str = "admin@example.com";
const ADMIN_PASSWORD: &str = "admin-pass";

async fn app() -> Router {
    let stores = Stores::memory();
    ensure_admin(stores.customers.as_ref(), ADMIN_EMAIL, ADMIN_PASSWORD).await.unwrap();
    let tokens = Arc::new(TokenService::new(JwtConfig::new("integration-secret")).unwrap());
    let metrics = Arc::new(AdminMetrics::new().unwrap());
    build_router(AppState::new(stores, tokens, metrics), &["http://localhost:5173".to_string()])
}

fn json_request(method: &str, uri: &str, body: Value) -> Request<Body> {
    Request::builder()
        .method(method)
        .uri(uri)
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from(body.to_string()))
        .unwrap()
}

fn get(uri: &str) -> Request<Body> {
    Request::builder().uri(uri).body(Body::empty()).unwrap()
}

async fn send(app: &Router, req: Request<Body>) -> (StatusCode, axum::http::HeaderMap, Value) {
    let resp = app.clone().oneshot(req).await.unwrap();
    let status = resp.status();
    let headers = resp.headers().clone();
    let bytes = resp.into_body().collect().await.unwrap().to_bytes();
    let body = if bytes.is_empty() { Value::Null } else { serde_json::from_slice(&bytes).unwrap_or(Value::Null) };
    (status, headers, body)
}

async fn login(app: &Router, email: &str, password: &str) -> String {
    let (status, headers, body) =
        send(app, json_request("POST", "/login", json!({"email": email, "password": password}))).await;
    assert_eq!(status, StatusCode::OK);
    let token = body["token"].as_str().unwrap().to_string();
    assert_eq!(headers.get(header::AUTHORIZATION).unwrap(), &format!("Bearer {token}"));
    token
}

fn signup_body(email: &str) -> Value {
    json!({
        "name": "Maria Silva",
        "email": email,
        "document": "52998224725",
        "kind": "INDIVIDUAL",
        "password": "maria-pass",
        "street": "Rua Flores",
        "number": "300",
        "district": "Jardim",
        "zip_code": "38220834",
        "city_id": 1,
        "phones": ["27363323"]
    })
}

#[tokio::test]
async fn health_is_public() {
    let app = app().await;
    let (status, _, _) = send(&app, get("/healthz")).await;
    assert_eq!(status, StatusCode::OK);
}

#[tokio::test]
async fn bad_credentials_are_rejected_uniformly() {
    let app = app().await;
    for (email, password) in [(ADMIN_EMAIL, "wrong"), ("nobody@example.com", ADMIN_PASSWORD)] {
        let (status, headers, body) =
            send(&app, json_request("POST", "/login", json!({"email": email, "password": password}))).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
        assert_eq!(headers.get("X-Error-Code").unwrap(), "invalid_credentials");
        assert_eq!(body["code"], "invalid_credentials");
    }
}

#[tokio::test]
async fn admin_manages_categories() {
    let app = app().await;
    let token = login(&app, ADMIN_EMAIL, ADMIN_PASSWORD).await;

    let mut req = json_request("POST", "/categories", json!({"name": "Gardening"}));
    bearer_request!(req, token = &token);
    let (status, headers, body) = send(&app, req).await;
    assert_eq!(status, StatusCode::CREATED);
    let id = body["id"].as_i64().unwrap();
    assert_eq!(headers.get(header::LOCATION).unwrap(), &format!("/categories/{id}"));

    let (status, _, body) = send(&app, get(&format!("/categories/{id}"))).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["name"], "Gardening");

    let mut req = json_request("PUT", &format!("/categories/{id}"), json!({"name": "Garden tools"}));
    bearer_request!(req, token = &token);
    let (status, _, _) = send(&app, req).await;
    assert_eq!(status, StatusCode::NO_CONTENT);

    let (_, _, body) = send(&app, get("/categories/page?linesPerPage=5")).await;
    assert_eq!(body["total_count"], 1);
    assert_eq!(body["items"][0]["name"], "Garden tools");

    let mut req = json_request("POST", "/categories", json!({"name": "abc"}));
    bearer_request!(req, token = &token);
    let (status, _, body) = send(&app, req).await;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
    assert_eq!(body["errors"][0]["field"], "name");

    let mut req = Request::builder().method("DELETE").uri(format!("/categories/{id}")).body(Body::empty()).unwrap();
    bearer_request!(req, token = &token);
    let (status, _, _) = send(&app, req).await;
    assert_eq!(status, StatusCode::NO_CONTENT);

    let (status, headers, _) = send(&app, get(&format!("/categories/{id}"))).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(headers.get("X-Error-Code").unwrap(), "category_not_found");
}

#[tokio::test]
async fn writes_without_or_with_bad_tokens_are_refused() {
    let app = app().await;

    let (status, _, body) = send(&app, json_request("POST", "/categories", json!({"name": "Gardening"}))).await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    assert_eq!(body["code"], "forbidden");

    let mut req = json_request("POST", "/categories", json!({"name": "Gardening"}));
    bearer_request!(req, token = "not.a.token");
    let (status, headers, _) = send(&app, req).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(headers.get("X-Error-Code").unwrap(), "token_invalid");
}

#[tokio::test]
async fn public_reads_refuse_bad_tokens() {
    let app = app().await;

    for uri in ["/categories", "/categories/page", "/categories/1", "/products", "/products/1"] {
        let (status, _, _) = send(&app, get(uri)).await;
        assert_ne!(status, StatusCode::UNAUTHORIZED, "{uri} should be public");

        let mut req = get(uri);
        bearer_request!(req, token = "not.a.token");
        let (status, headers, _) = send(&app, req).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED, "{uri}");
        assert_eq!(headers.get("X-Error-Code").unwrap(), "token_invalid");
    }
}

#[tokio::test]
async fn customers_reach_only_their_own_record() {
    let app = app().await;
    let (status, headers, body) = send(&app, json_request("POST", "/customers", signup_body("maria@example.com"))).await;
    assert_eq!(status, StatusCode::CREATED);
    assert!(headers.get(header::LOCATION).is_some());
    assert!(body.get("password_hash").is_none());
    let maria_id = body["id"].as_i64().unwrap();

    let token = login(&app, "maria@example.com", "maria-pass").await;

    let mut req = get(&format!("/customers/{maria_id}"));
    bearer_request!(req, token = &token);
    let (status, _, body) = send(&app, req).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["email"], "maria@example.com");

    let mut req = get("/customers/email?value=admin@example.com");
    bearer_request!(req, token = &token);
    let (status, _, _) = send(&app, req).await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let mut req = get("/customers");
    bearer_request!(req, token = &token);
    let (status, headers, body) = send(&app, req).await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    assert_eq!(headers.get("X-Error-Code").unwrap(), "missing_role");
    assert_eq!(body["missing_role"], "ADMIN");

    let (status, _, body) = send(&app, json_request("POST", "/customers", signup_body("maria@example.com"))).await;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
    assert_eq!(body["errors"][0]["field"], "email");
}

#[tokio::test]
async fn refresh_issues_a_new_token_for_the_caller() {
    let app = app().await;
    let token = login(&app, ADMIN_EMAIL, ADMIN_PASSWORD).await;

    let mut req = Request::builder().method("POST").uri("/auth/refresh_token").body(Body::empty()).unwrap();
    bearer_request!(req, token = &token);
    let (status, headers, body) = send(&app, req).await;
    assert_eq!(status, StatusCode::OK);
    assert!(headers.get(header::AUTHORIZATION).is_some());
    assert!(body["expires_at"].is_string());

    let req = Request::builder().method("POST").uri("/auth/refresh_token").body(Body::empty()).unwrap();
    let (status, _, _) = send(&app, req).await;
    assert_eq!(status, StatusCode::FORBIDDEN);
}

#[tokio::test]
async fn product_search_and_order_flow() {
    let app = app().await;
    let admin = login(&app, ADMIN_EMAIL, ADMIN_PASSWORD).await;

    let mut req = json_request("POST", "/categories", json!({"name": "Clothing"}));
    bearer_request!(req, token = &admin);
    let (_, _, category) = send(&app, req).await;
    let category_id = category["id"].as_i64().unwrap();

    let mut product_ids = Vec::new();
    for (name, price) in [("Red Shirt", "80.00"), ("Shirt Box", "15.50"), ("Red Hat", "30.00")] {
        let mut req = json_request(
            "POST",
            "/products",
            json!({"name": name, "price": price, "category_ids": [category_id]}),
        );
        bearer_request!(req, token = &admin);
        let (status, _, body) = send(&app, req).await;
        assert_eq!(status, StatusCode::CREATED);
        product_ids.push(body["id"].as_i64().unwrap());
    }

    let (status, _, page) = send(&app, get(&format!("/products?nome=shirt&categorias={category_id}&linesPerPage=10"))).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(page["total_count"], 2);
    assert_eq!(page["items"][0]["name"], "Red Shirt");
    assert_eq!(page["items"][1]["name"], "Shirt Box");

    let (status, headers, _) = send(&app, get("/products?linesPerPage=0")).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(headers.get("X-Error-Code").unwrap(), "invalid_argument");

    let (status, _, _) = send(&app, json_request("POST", "/customers", signup_body("maria@example.com"))).await;
    assert_eq!(status, StatusCode::CREATED);
    let maria = login(&app, "maria@example.com", "maria-pass").await;

    let mut req = json_request(
        "POST",
        "/orders",
        json!({
            "payment": {"type": "card", "installments": 2},
            "items": [{"product_id": product_ids[0], "quantity": 2}]
        }),
    );
    bearer_request!(req, token = &maria);
    let (status, headers, order) = send(&app, req).await;
    assert_eq!(status, StatusCode::CREATED);
    assert!(headers.get(header::LOCATION).is_some());
    let order_id = order["id"].as_i64().unwrap();

    let mut req = get("/orders");
    bearer_request!(req, token = &maria);
    let (_, _, page) = send(&app, req).await;
    assert_eq!(page["total_count"], 1);

    let mut req = get(&format!("/orders/{order_id}"));
    bearer_request!(req, token = &admin);
    let (status, _, _) = send(&app, req).await;
    assert_eq!(status, StatusCode::OK);

    let mut req = Request::builder()
        .method("DELETE")
        .uri(format!("/products/{}", product_ids[0]))
        .body(Body::empty())
        .unwrap();
    bearer_request!(req, token = &admin);
    let (status, headers, _) = send(&app, req).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(headers.get("X-Error-Code").unwrap(), "data_integrity");

    let (status, _, body) = send(&app, get(&format!("/products/{}", product_ids[0]))).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["id"], product_ids[0]);

    let (status, _, _) = send(&app, get("/metrics")).await;
    assert_eq!(status, StatusCode::OK);
}
