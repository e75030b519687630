//! Shared helpers for integration tests: the full router over a migrated test database.
#![allow(dead_code)]

use axum::body::Body;
use axum::http::{header, HeaderMap, Method, Request, StatusCode};
use axum::Router;
use http_body_util::BodyExt;
use movies_data_rest::{app, apply_migrations, resolve, AppState, FullConfig, ServerConfig};
use serde_json::Value;
use sqlx::PgPool;
use tower::ServiceExt;

pub const ORIGIN: &str = "http://localhost";

pub fn test_config() -> ServerConfig {
    ServerConfig {
        database_url: "postgres://localhost/movies_test".into(),
        ..ServerConfig::default()
    }
}

/// Router with the middleware stack used in production, over the built-in catalog.
pub async fn build_test_app(pool: PgPool) -> Router {
    let catalog = FullConfig::builtin().unwrap();
    apply_migrations(&pool, &catalog).await.unwrap();
    let model = resolve(&catalog).unwrap();
    let config = test_config();
    app(AppState::new(pool, model, config.api_base_path.clone()), &config).unwrap()
}

pub struct TestResponse {
    pub status: StatusCode,
    pub headers: HeaderMap,
    pub body: Value,
}

impl TestResponse {
    pub fn content_type(&self) -> &str {
        self.headers
            .get(header::CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .unwrap_or_default()
    }
}

pub async fn send(app: &Router, request: Request<Body>) -> TestResponse {
    let response = app.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let headers = response.headers().clone();
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    let body = if bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&bytes).unwrap()
    };
    TestResponse { status, headers, body }
}

fn request(method: Method, uri: &str, content_type: Option<&str>, body: String) -> Request<Body> {
    let mut builder = Request::builder().method(method).uri(uri);
    if let Some(ct) = content_type {
        builder = builder.header(header::CONTENT_TYPE, ct);
    }
    builder.body(Body::from(body)).unwrap()
}

pub async fn get(app: &Router, uri: &str) -> TestResponse {
    send(app, request(Method::GET, uri, None, String::new())).await
}

pub async fn get_accepting(app: &Router, uri: &str, accept: &str) -> TestResponse {
    let req = Request::builder()
        .uri(uri)
        .header(header::ACCEPT, accept)
        .body(Body::empty())
        .unwrap();
    send(app, req).await
}

pub async fn post_json(app: &Router, uri: &str, body: Value) -> TestResponse {
    send(app, request(Method::POST, uri, Some("application/json"), body.to_string())).await
}

pub async fn post_raw(app: &Router, uri: &str, content_type: Option<&str>, body: &str) -> TestResponse {
    send(app, request(Method::POST, uri, content_type, body.to_string())).await
}

pub async fn put_json(app: &Router, uri: &str, body: Value) -> TestResponse {
    send(app, request(Method::PUT, uri, Some("application/json"), body.to_string())).await
}

pub async fn patch_json(app: &Router, uri: &str, body: Value) -> TestResponse {
    send(app, request(Method::PATCH, uri, Some("application/json"), body.to_string())).await
}

pub async fn delete(app: &Router, uri: &str) -> TestResponse {
    send(app, request(Method::DELETE, uri, None, String::new())).await
}

fn uri_list<S: AsRef<str>>(uris: &[S]) -> String {
    uris.iter().map(AsRef::as_ref).collect::<Vec<_>>().join("\n")
}

pub async fn put_uri_list<S: AsRef<str>>(app: &Router, uri: &str, uris: &[S]) -> TestResponse {
    send(app, request(Method::PUT, uri, Some("text/uri-list"), uri_list(uris))).await
}

pub async fn post_uri_list<S: AsRef<str>>(app: &Router, uri: &str, uris: &[S]) -> TestResponse {
    send(app, request(Method::POST, uri, Some("text/uri-list"), uri_list(uris))).await
}

/// Request path of an absolute link.
pub fn path_of(href: &Value) -> String {
    let href = href.as_str().unwrap();
    href.strip_prefix(ORIGIN).unwrap_or(href).to_string()
}

pub fn self_href(item: &Value) -> String {
    path_of(&item["_links"]["self"]["href"])
}

/// POST and return the created item's path.
pub async fn create(app: &Router, collection: &str, body: Value) -> String {
    let res = post_json(app, collection, body).await;
    assert_eq!(res.status, StatusCode::CREATED, "{}", res.body);
    self_href(&res.body)
}

pub async fn create_actor(app: &Router, first: &str, last: &str, birth: &str, death: Option<&str>) -> String {
    create(
        app,
        "/api/actors",
        serde_json::json!({
            "first_name": first,
            "last_name": last,
            "birth_date": birth,
            "death_date": death,
        }),
    )
    .await
}

pub async fn create_director(app: &Router, first: &str, last: &str) -> String {
    create(app, "/api/directors", serde_json::json!({ "first_name": first, "last_name": last })).await
}

/// Absolute URI of a path, as clients send it in link properties.
pub fn uri(path: &str) -> String {
    format!("{}{}", ORIGIN, path)
}

/// Values of `field` in the embedded list under `rel`.
pub fn embedded_field(body: &Value, rel: &str, field: &str) -> Vec<Value> {
    body["_embedded"][rel]
        .as_array()
        .unwrap()
        .iter()
        .map(|item| item[field].clone())
        .collect()
}
