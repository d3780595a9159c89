//! End-to-end tests of the assembled router over an in-memory object store
//! and wiremock upstreams.

use std::sync::Arc;

use axum::body::Body;
use axum::http::header::{AUTHORIZATION, CONTENT_LENGTH, CONTENT_TYPE, WWW_AUTHENTICATE};
use axum::http::{Method, Request, StatusCode};
use axum::Router;
use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use http_body_util::BodyExt;
use serde_json::{json, Value};
use tower::ServiceExt;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

use depot_api::auth::AuthConfig;
use depot_api::config::AppConfig;
use depot_api::state::AppState;
use depot_store::MemoryBackend;

struct TestApp {
    backend: Arc<MemoryBackend>,
    state: AppState,
}

impl TestApp {
    fn new() -> Self {
        Self::with_auth(AuthConfig::default())
    }

    fn with_auth(auth: AuthConfig) -> Self {
        let backend = Arc::new(MemoryBackend::new());
        let config = AppConfig {
            auth,
            ..AppConfig::default()
        };
        let state = AppState::new(backend.clone(), &config).unwrap();
        Self { backend, state }
    }

    fn router(&self) -> Router {
        depot_api::app(self.state.clone())
    }

    async fn send(&self, request: Request<Body>) -> axum::response::Response {
        self.router().oneshot(request).await.unwrap()
    }

    async fn get(&self, uri: &str) -> axum::response::Response {
        self.send(Request::get(uri).body(Body::empty()).unwrap()).await
    }

    async fn add_proxy(&self, name: &str, url: &str) {
        let resp = self
            .send(json_request(Method::POST, "/proxies", json!({"name": name, "url": url})))
            .await;
        assert_eq!(resp.status(), StatusCode::CREATED);
    }
}

fn json_request(method: Method, uri: &str, body: Value) -> Request<Body> {
    Request::builder()
        .method(method)
        .uri(uri)
        .header(CONTENT_TYPE, "application/json")
        .body(Body::from(body.to_string()))
        .unwrap()
}

fn put_request(uri: &str, data: &'static [u8]) -> Request<Body> {
    Request::put(uri)
        .header(CONTENT_LENGTH, data.len())
        .header(CONTENT_TYPE, "application/java-archive")
        .body(Body::from(data))
        .unwrap()
}

async fn body_bytes(resp: axum::response::Response) -> Vec<u8> {
    resp.into_body().collect().await.unwrap().to_bytes().to_vec()
}

async fn body_json(resp: axum::response::Response) -> Value {
    serde_json::from_slice(&body_bytes(resp).await).unwrap()
}

fn entry_names(listing: &Value) -> Vec<String> {
    listing
        .as_array()
        .unwrap()
        .iter()
        .map(|e| e["name"].as_str().unwrap().to_string())
        .collect()
}

// -- Health and documents ---------------------------------------------------

#[tokio::test]
async fn healthz_is_ok_without_credentials() {
    let app = TestApp::with_auth(AuthConfig::new("admin", "secret"));
    let resp = app.get("/healthz").await;
    assert_eq!(resp.status(), StatusCode::OK);
    assert_eq!(body_bytes(resp).await, b"ok");
}

#[tokio::test]
async fn openapi_document_is_served() {
    let app = TestApp::new();
    let resp = app.get("/openapi.json").await;
    assert_eq!(resp.status(), StatusCode::OK);
    let doc = body_json(resp).await;
    assert!(doc["paths"]["/catalog"].is_object());
}

#[tokio::test]
async fn metrics_router_reports_requests() {
    let app = TestApp::new();
    app.get("/healthz").await;
    app.get("/catalog").await;

    let resp = depot_api::metrics_router(app.state.metrics.clone())
        .oneshot(Request::get("/metrics").body(Body::empty()).unwrap())
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::OK);
    assert!(resp.headers()[CONTENT_TYPE]
        .to_str()
        .unwrap()
        .starts_with("text/plain"));
    let text = String::from_utf8(body_bytes(resp).await).unwrap();
    assert!(text.contains("depot_http_requests_total"));
    assert!(text.contains("depot_http_inflight_requests"));
}

// -- Authentication ---------------------------------------------------------

#[tokio::test]
async fn missing_credentials_get_basic_challenge() {
    let app = TestApp::with_auth(AuthConfig::new("admin", "secret"));
    let resp = app.get("/catalog").await;
    assert_eq!(resp.status(), StatusCode::UNAUTHORIZED);
    assert_eq!(resp.headers()[WWW_AUTHENTICATE], "Basic realm=\"depot\"");
}

#[tokio::test]
async fn valid_credentials_reach_artifacts() {
    let app = TestApp::with_auth(AuthConfig::new("admin", "secret"));
    app.backend.insert("com/acme/a.jar", "jar", "application/java-archive");

    let token = STANDARD.encode("admin:secret");
    let resp = app
        .send(
            Request::get("/com/acme/a.jar")
                .header(AUTHORIZATION, format!("Basic {token}"))
                .body(Body::empty())
                .unwrap(),
        )
        .await;
    assert_eq!(resp.status(), StatusCode::OK);

    let wrong = STANDARD.encode("admin:nope");
    let resp = app
        .send(
            Request::get("/com/acme/a.jar")
                .header(AUTHORIZATION, format!("Basic {wrong}"))
                .body(Body::empty())
                .unwrap(),
        )
        .await;
    assert_eq!(resp.status(), StatusCode::UNAUTHORIZED);
}

// -- Direct artifact access -------------------------------------------------

#[tokio::test]
async fn put_stores_artifact_and_sidecars() {
    let app = TestApp::new();
    let resp = app.send(put_request("/com/acme/a.jar", b"hello")).await;
    assert_eq!(resp.status(), StatusCode::CREATED);

    assert_eq!(app.backend.object("com/acme/a.jar").unwrap().as_ref(), b"hello");
    assert_eq!(
        app.backend.object("com/acme/a.jar.sha1").unwrap().as_ref(),
        b"aaf4c61ddcc5e8a2dabede0f3b482cd9aea9434d"
    );
    assert_eq!(
        app.backend.object("com/acme/a.jar.md5").unwrap().as_ref(),
        b"5d41402abc4b2a76b9719d911017c592"
    );

    let resp = app.get("/com/acme/a.jar").await;
    assert_eq!(resp.status(), StatusCode::OK);
    assert_eq!(resp.headers()[CONTENT_LENGTH], "5");
    assert_eq!(resp.headers()[CONTENT_TYPE], "application/java-archive");
    assert_eq!(body_bytes(resp).await, b"hello");
}

#[tokio::test]
async fn put_without_content_length_is_411() {
    let app = TestApp::new();
    let resp = app
        .send(Request::put("/a.jar").body(Body::from("data")).unwrap())
        .await;
    assert_eq!(resp.status(), StatusCode::LENGTH_REQUIRED);
    assert!(!app.backend.contains("a.jar"));
}

#[tokio::test]
async fn put_into_reserved_namespace_is_rejected() {
    let app = TestApp::new();
    let resp = app.send(put_request("/__proxycfg__/evil.json", b"{}")).await;
    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
    assert!(!app.backend.contains("__proxycfg__/evil.json"));
}

#[tokio::test]
async fn reserved_records_are_not_readable() {
    let app = TestApp::new();
    app.add_proxy("central", "http://127.0.0.1:1").await;
    let resp = app.get("/__proxycfg__/central.json").await;
    assert_eq!(resp.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn head_returns_metadata_without_body() {
    let app = TestApp::new();
    app.backend.insert("lib/x.pom", "<project/>", "text/xml");
    let resp = app
        .send(Request::head("/lib/x.pom").body(Body::empty()).unwrap())
        .await;
    assert_eq!(resp.status(), StatusCode::OK);
    assert_eq!(resp.headers()[CONTENT_LENGTH], "10");
    assert!(body_bytes(resp).await.is_empty());
}

#[tokio::test]
async fn missing_artifact_is_404_and_root_is_404() {
    let app = TestApp::new();
    assert_eq!(app.get("/nope/a.jar").await.status(), StatusCode::NOT_FOUND);
    assert_eq!(app.get("/").await.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn unsupported_method_is_405() {
    let app = TestApp::new();
    let resp = app
        .send(Request::delete("/a.jar").body(Body::empty()).unwrap())
        .await;
    assert_eq!(resp.status(), StatusCode::METHOD_NOT_ALLOWED);
}

#[tokio::test]
async fn proxied_get_fetches_and_caches() {
    let upstream = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/com/acme/a.jar"))
        .respond_with(ResponseTemplate::new(200).set_body_bytes(b"remote".to_vec()))
        .expect(1)
        .mount(&upstream)
        .await;

    let app = TestApp::new();
    app.add_proxy("central", &upstream.uri()).await;

    let resp = app.get("/central/com/acme/a.jar").await;
    assert_eq!(resp.status(), StatusCode::OK);
    assert_eq!(body_bytes(resp).await, b"remote");
    assert!(app.backend.contains("central/com/acme/a.jar"));

    // Served from the cache the second time.
    let resp = app.get("/central/com/acme/a.jar").await;
    assert_eq!(body_bytes(resp).await, b"remote");
}

#[tokio::test]
async fn upstream_denial_status_is_passed_through() {
    let upstream = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(403))
        .mount(&upstream)
        .await;

    let app = TestApp::new();
    app.add_proxy("private", &upstream.uri()).await;
    let resp = app.get("/private/secret.jar").await;
    assert_eq!(resp.status(), StatusCode::FORBIDDEN);
}

// -- Catalog ----------------------------------------------------------------

#[tokio::test]
async fn root_catalog_lists_local_group_and_proxies() {
    let app = TestApp::new();
    app.backend.insert("com/acme/a.jar", "a", "t");
    app.add_proxy("central", "http://127.0.0.1:1").await;

    let resp = app.get("/catalog").await;
    assert_eq!(resp.status(), StatusCode::OK);
    let listing = body_json(resp).await;
    assert_eq!(entry_names(&listing), vec!["com/", "packages/", "central/"]);
    assert_eq!(listing[1]["type"], "group");
    assert_eq!(listing[2]["type"], "proxy");
}

#[tokio::test]
async fn catalog_limit_falls_back_to_default() {
    let app = TestApp::new();
    for i in 0..3 {
        app.backend.insert(&format!("lib/{i}.jar"), "x", "t");
    }
    let listing = body_json(app.get("/catalog?path=lib&limit=2").await).await;
    assert_eq!(entry_names(&listing), vec!["0.jar", "1.jar"]);

    let listing = body_json(app.get("/catalog?path=lib&limit=5000").await).await;
    assert_eq!(entry_names(&listing).len(), 3);
}

#[tokio::test]
async fn catalog_never_shows_proxy_records() {
    let app = TestApp::new();
    app.add_proxy("central", "http://127.0.0.1:1").await;
    let listing = body_json(app.get("/catalog?path=__proxycfg__").await).await;
    assert!(listing.as_array().unwrap().is_empty());
}

// -- Proxy management -------------------------------------------------------

#[tokio::test]
async fn proxy_crud_round() {
    let app = TestApp::new();

    let resp = app
        .send(json_request(
            Method::POST,
            "/proxies",
            json!({"name": " central ", "url": "https://repo.example.org/maven2/ "}),
        ))
        .await;
    assert_eq!(resp.status(), StatusCode::CREATED);
    let created = body_json(resp).await;
    assert_eq!(created["name"], "central");
    assert_eq!(created["url"], "https://repo.example.org/maven2/");

    let resp = app
        .send(json_request(
            Method::PUT,
            "/proxies/central",
            json!({"url": "https://mirror.example.org/"}),
        ))
        .await;
    assert_eq!(resp.status(), StatusCode::OK);

    let listing = body_json(app.get("/proxies").await).await;
    assert_eq!(listing, json!([{"name": "central", "url": "https://mirror.example.org/"}]));

    let resp = app
        .send(Request::delete("/proxies/central").body(Body::empty()).unwrap())
        .await;
    assert_eq!(resp.status(), StatusCode::NO_CONTENT);
    let listing = body_json(app.get("/proxies").await).await;
    assert_eq!(listing, json!([]));

    // Deleting again still succeeds.
    let resp = app
        .send(Request::delete("/proxies/central").body(Body::empty()).unwrap())
        .await;
    assert_eq!(resp.status(), StatusCode::NO_CONTENT);
}

#[tokio::test]
async fn invalid_proxy_definitions_are_400() {
    let app = TestApp::new();
    let bad_name = app
        .send(json_request(Method::POST, "/proxies", json!({"name": "a/b", "url": "http://x"})))
        .await;
    assert_eq!(bad_name.status(), StatusCode::BAD_REQUEST);

    let no_url = app
        .send(json_request(Method::POST, "/proxies", json!({"name": "central"})))
        .await;
    assert_eq!(no_url.status(), StatusCode::BAD_REQUEST);

    let malformed = app
        .send(
            Request::post("/proxies")
                .header(CONTENT_TYPE, "application/json")
                .body(Body::from("{not json"))
                .unwrap(),
        )
        .await;
    assert_eq!(malformed.status(), StatusCode::BAD_REQUEST);
    let body = body_json(malformed).await;
    assert_eq!(body["error"]["code"], "VALIDATION_ERROR");
}

// -- Packages group ---------------------------------------------------------

#[tokio::test]
async fn packages_resolve_local_then_proxy_cache_then_upstream() {
    let upstream = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/org/remote.jar"))
        .respond_with(ResponseTemplate::new(200).set_body_bytes(b"upstream".to_vec()))
        .mount(&upstream)
        .await;

    let app = TestApp::new();
    app.add_proxy("central", &upstream.uri()).await;
    app.backend.insert("org/local.jar", "local", "t");
    app.backend.insert("central/org/cached.jar", "cached", "t");

    let resp = app.get("/packages/org/local.jar").await;
    assert_eq!(body_bytes(resp).await, b"local");

    let resp = app.get("/packages/org/cached.jar").await;
    assert_eq!(body_bytes(resp).await, b"cached");

    let resp = app.get("/packages/org/remote.jar").await;
    assert_eq!(resp.status(), StatusCode::OK);
    assert_eq!(body_bytes(resp).await, b"upstream");
    assert!(app.backend.contains("central/org/remote.jar"));

    let resp = app.get("/packages/org/absent.jar").await;
    assert_eq!(resp.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn packages_head_uses_upstream_metadata() {
    let upstream = MockServer::start().await;
    Mock::given(method("HEAD"))
        .and(path("/org/remote.jar"))
        .respond_with(
            ResponseTemplate::new(200)
                .insert_header("content-type", "application/java-archive")
                .insert_header("last-modified", "Wed, 21 Oct 2015 07:28:00 GMT"),
        )
        .mount(&upstream)
        .await;

    let app = TestApp::new();
    app.add_proxy("central", &upstream.uri()).await;
    let resp = app
        .send(Request::head("/packages/org/remote.jar").body(Body::empty()).unwrap())
        .await;
    assert_eq!(resp.status(), StatusCode::OK);
    assert_eq!(resp.headers()[CONTENT_TYPE], "application/java-archive");
    assert!(!app.backend.contains("central/org/remote.jar"));
}
