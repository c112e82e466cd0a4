use std::sync::Arc;
use std::time::Duration;

use axum::body::Body;
use axum::http::{header, Request, StatusCode};
use axum::Router;
use base64::{engine::general_purpose::STANDARD, Engine as _};
use goo_backend::metrics::register_process_metrics;
use goo_backend::{build_router, AppState};
use goo_db::{create_pool, Database, DbConnectionConfig};
use goo_email::Email;
use goo_job_queue::{CancellationToken, MemoryQueue, Message, Queue};
use prometheus::Registry;
use tower::util::ServiceExt;

const ADMIN_PASSWORD: &str = "admin-secret";
const METRICS_PASSWORD: &str = "metrics-secret";

struct TestApp {
    app: Router,
    state: Arc<AppState>,
    queue: Arc<MemoryQueue>,
}

impl TestApp {
    async fn new() -> Self {
        Self::with_registry(Registry::new()).await
    }

    async fn with_registry(registry: Registry) -> Self {
        let pool = create_pool(&DbConnectionConfig::in_memory()).await.unwrap();
        let db = Database::new(pool);
        db.migrate_up().await.unwrap();

        let queue = Arc::new(MemoryQueue::new(
            Duration::from_millis(10),
            Duration::from_secs(30),
        ));
        let state = Arc::new(
            AppState::new(db, queue.clone(), registry)
                .unwrap()
                .with_admin_password(Some(ADMIN_PASSWORD.to_string()))
                .with_metrics_password(Some(METRICS_PASSWORD.to_string())),
        );
        Self {
            app: build_router(state.clone()),
            state,
            queue,
        }
    }

    async fn send(&self, req: Request<Body>) -> (StatusCode, axum::http::HeaderMap, String) {
        let res = self.app.clone().oneshot(req).await.unwrap();
        let status = res.status();
        let headers = res.headers().clone();
        let bytes = axum::body::to_bytes(res.into_body(), usize::MAX).await.unwrap();
        (status, headers, String::from_utf8(bytes.to_vec()).unwrap())
    }

    async fn get(&self, uri: &str) -> (StatusCode, axum::http::HeaderMap, String) {
        self.send(Request::builder().method("GET").uri(uri).body(Body::empty()).unwrap())
            .await
    }

    async fn received(&self) -> Option<Message> {
        self.queue
            .receive(&CancellationToken::new())
            .await
            .unwrap()
            .map(|delivery| delivery.message)
    }
}

fn form(uri: &str, body: &str) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri(uri)
        .header(header::CONTENT_TYPE, "application/x-www-form-urlencoded")
        .body(Body::from(body.to_string()))
        .unwrap()
}

fn basic(user: &str, password: &str) -> String {
    format!("Basic {}", STANDARD.encode(format!("{user}:{password}")))
}

fn admin_form(uri: &str, body: &str) -> Request<Body> {
    let mut req = form(uri, body);
    req.headers_mut().insert(
        header::AUTHORIZATION,
        basic("admin", ADMIN_PASSWORD).parse().unwrap(),
    );
    req
}

#[tokio::test]
async fn health_returns_ok() {
    let app = TestApp::new().await;
    let (status, _, body) = app.get("/health").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, "OK");
}

#[tokio::test]
async fn health_returns_bad_gateway_when_database_is_down() {
    let app = TestApp::new().await;
    app.state.db.pool().close().await;
    let (status, _, _) = app.get("/health").await;
    assert_eq!(status, StatusCode::BAD_GATEWAY);
}

#[tokio::test]
async fn pages_render() {
    let app = TestApp::new().await;
    for uri in ["/", "/newsletter/thanks", "/newsletter/confirmed"] {
        let (status, headers, body) = app.get(uri).await;
        assert_eq!(status, StatusCode::OK, "{uri}");
        assert!(headers[header::CONTENT_TYPE].to_str().unwrap().starts_with("text/html"));
        assert!(body.contains("<html"));
    }
}

#[tokio::test]
async fn signup_rejects_invalid_email() {
    let app = TestApp::new().await;
    for body in ["email=notanemail", "email=", ""] {
        let (status, _, text) = app.send(form("/newsletter/signup", body)).await;
        assert_eq!(status, StatusCode::BAD_REQUEST, "{body}");
        assert_eq!(text, "email is invalid");
    }
    assert!(app.queue.is_empty().await);
}

#[tokio::test]
async fn signup_stores_subscriber_and_queues_confirmation_email() {
    let app = TestApp::new().await;
    let (status, headers, _) = app
        .send(form("/newsletter/signup", "email=me%40example.com"))
        .await;
    assert_eq!(status, StatusCode::FOUND);
    assert_eq!(headers[header::LOCATION], "/newsletter/thanks");

    let subscriber = app
        .state
        .db
        .get_subscriber(&Email::new("me@example.com"))
        .await
        .unwrap()
        .unwrap();
    assert!(!subscriber.confirmed);

    let message = app.received().await.expect("a queued message");
    assert_eq!(message.job(), Some("confirmation_email"));
    assert_eq!(message.get("email"), Some("me@example.com"));
    assert_eq!(message.get("token"), Some(subscriber.token.as_str()));
}

#[tokio::test]
async fn signup_reports_storage_errors_as_bad_gateway() {
    let app = TestApp::new().await;
    app.state.db.pool().close().await;
    let (status, _, text) = app
        .send(form("/newsletter/signup", "email=me%40example.com"))
        .await;
    assert_eq!(status, StatusCode::BAD_GATEWAY);
    assert_eq!(text, "error signing up, refresh to try again");
    assert!(app.queue.is_empty().await);
}

#[tokio::test]
async fn confirm_page_escapes_token() {
    let app = TestApp::new().await;
    let (status, _, body) = app
        .get("/newsletter/confirm?token=%22%3E%3Cscript%3Ealert(1)%3C%2Fscript%3E")
        .await;
    assert_eq!(status, StatusCode::OK);
    assert!(!body.contains("\"><script>"));
    assert!(body.contains("&quot;"));

    let (status, _, body) = app.get("/newsletter/confirm?token=abc123").await;
    assert_eq!(status, StatusCode::OK);
    assert!(body.contains(r#"value="abc123""#));
}

#[tokio::test]
async fn confirm_page_requires_token() {
    let app = TestApp::new().await;
    let (status, _, _) = app.get("/newsletter/confirm").await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn confirm_marks_subscriber_and_queues_welcome_email() {
    let app = TestApp::new().await;
    let email = Email::new("me@example.com");
    let token = app.state.db.signup_for_newsletter(&email).await.unwrap();

    let (status, headers, _) = app
        .send(form("/newsletter/confirm", &format!("token={token}")))
        .await;
    assert_eq!(status, StatusCode::FOUND);
    assert_eq!(headers[header::LOCATION], "/newsletter/confirmed");

    let subscriber = app.state.db.get_subscriber(&email).await.unwrap().unwrap();
    assert!(subscriber.confirmed);

    let message = app.received().await.expect("a queued message");
    assert_eq!(message.job(), Some("welcome_email"));
    assert_eq!(message.get("email"), Some("me@example.com"));
}

#[tokio::test]
async fn confirm_rejects_unknown_token() {
    let app = TestApp::new().await;
    let (status, _, _) = app.send(form("/newsletter/confirm", "token=nope")).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(app.queue.is_empty().await);
}

#[tokio::test]
async fn metrics_require_basic_auth() {
    let app = TestApp::new().await;
    let (status, headers, _) = app.get("/metrics").await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert!(headers.contains_key(header::WWW_AUTHENTICATE));

    let req = Request::builder()
        .uri("/metrics")
        .header(header::AUTHORIZATION, basic("admin", METRICS_PASSWORD))
        .body(Body::empty())
        .unwrap();
    let (status, _, _) = app.send(req).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn metrics_count_requests_by_path_and_code() {
    let app = TestApp::new().await;
    assert_eq!(app.get("/health").await.0, StatusCode::OK);
    assert_eq!(app.get("/doesnotexist").await.0, StatusCode::NOT_FOUND);

    let req = Request::builder()
        .uri("/metrics")
        .header(header::AUTHORIZATION, basic("metrics", METRICS_PASSWORD))
        .body(Body::empty())
        .unwrap();
    let (status, headers, body) = app.send(req).await;
    assert_eq!(status, StatusCode::OK);
    assert!(headers[header::CONTENT_TYPE].to_str().unwrap().starts_with("text/plain"));

    let requests: Vec<&str> = body
        .lines()
        .filter(|line| line.starts_with("app_http_requests_total{"))
        .collect();
    assert!(requests
        .iter()
        .any(|l| l.contains(r#"path="/health""#) && l.contains(r#"code="200""#) && l.ends_with(" 1")));
    assert!(requests
        .iter()
        .any(|l| l.contains(r#"path="/doesnotexist""#) && l.contains(r#"code="404""#) && l.ends_with(" 1")));
    assert!(body.contains(r#"app_http_request_duration_seconds_count{code="200"} 1"#));
    assert!(body.contains(r#"app_http_request_duration_seconds_count{code="404"} 1"#));
}

#[tokio::test]
async fn metrics_include_pool_and_process_series() {
    let registry = Registry::new();
    register_process_metrics(&registry).unwrap();
    let app = TestApp::with_registry(registry).await;

    let req = Request::builder()
        .uri("/metrics")
        .header(header::AUTHORIZATION, basic("metrics", METRICS_PASSWORD))
        .body(Body::empty())
        .unwrap();
    let (status, _, body) = app.send(req).await;
    assert_eq!(status, StatusCode::OK);
    assert!(body.contains("app_db_connections_open 1"), "{body}");
    assert!(body.contains("app_db_connections_idle"));
    assert!(body.contains("app_db_connections_in_use"));
    #[cfg(target_os = "linux")]
    assert!(body.contains("process_resident_memory_bytes"));
}

#[tokio::test]
async fn migrate_requires_admin_auth() {
    let app = TestApp::new().await;
    let (status, _, _) = app.send(form("/migrate/up", "")).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    let (status, _, _) = app.send(form("/migrate/to", "version=1")).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn migrate_to_validates_version() {
    let app = TestApp::new().await;
    let (status, _, text) = app.send(admin_form("/migrate/to", "version=")).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(text, "version is empty");

    let (status, _, text) = app.send(admin_form("/migrate/to", "version=abc")).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(text, "version is not number");

    let (status, _, _) = app.send(admin_form("/migrate/to", "version=99")).await;
    assert_eq!(status, StatusCode::BAD_GATEWAY);
}

#[tokio::test]
async fn migrate_to_and_up_change_the_schema_version() {
    let app = TestApp::new().await;
    let (status, _, _) = app.send(admin_form("/migrate/to", "version=1")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(app.state.db.migration_version().await.unwrap(), 1);

    let (status, _, _) = app.send(admin_form("/migrate/up", "")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(app.state.db.migration_version().await.unwrap(), 2);
}
