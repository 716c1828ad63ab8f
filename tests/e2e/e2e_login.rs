use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use axum::Json;
use axum::Router;
use axum::extract::State;
use axum::http::StatusCode;
use axum::routing::post;
use guru_auth_client::{AuthClient, RestErrorKind};
use sonic_rs::{Value, json};
use tokio::net::TcpListener;

#[derive(Debug, serde::Deserialize)]
struct Credentials {
    username: String,
    password: String,
}

#[derive(Debug, serde::Deserialize, PartialEq)]
struct Session {
    token: String,
}

#[derive(Clone, Default)]
struct AppState {
    hits: Arc<AtomicUsize>,
}

#[tokio::test]
async fn e2e_login_success_roundtrip() {
    let server = TestServer::start().await;
    let client = AuthClient::new().with_base_url(server.base_url.clone());

    let session: Session = client
        .login(&json!({"username": "alice", "password": "secret"}))
        .await
        .expect("valid credentials should log in");

    assert_eq!(
        session,
        Session {
            token: "abc123".to_string()
        }
    );
    assert_eq!(server.hits(), 1);
}

#[tokio::test]
async fn e2e_login_rejection_surfaces_status() {
    let server = TestServer::start().await;
    let client = AuthClient::new().with_base_url(server.base_url.clone());

    let err = client
        .login::<_, Value>(&json!({"username": "bob", "password": "wrong"}))
        .await
        .expect_err("wrong password should be rejected");

    assert_eq!(err.kind(), RestErrorKind::Rejected);
    assert_eq!(err.status(), Some(401));
    assert_eq!(err.body(), Some(br#"{"error":"invalid credentials"}"#.as_slice()));
    assert_eq!(server.hits(), 1);
}

#[tokio::test]
async fn e2e_unreachable_backend_fails_without_value() {
    let listener = TcpListener::bind("127.0.0.1:0")
        .await
        .expect("bind probe listener");
    let addr = listener.local_addr().expect("local addr");
    drop(listener);

    let client = AuthClient::new().with_base_url(format!("http://{addr}"));
    let err = client
        .login::<_, Value>(&json!({"username": "alice", "password": "secret"}))
        .await
        .expect_err("closed port should fail");

    assert_eq!(err.kind(), RestErrorKind::Connect);
    assert_eq!(err.status(), None);
}

struct TestServer {
    base_url: String,
    state: AppState,
    task: tokio::task::JoinHandle<()>,
}

impl TestServer {
    async fn start() -> Self {
        let state = AppState::default();
        let app = Router::new()
            .route("/auth/login", post(login_handler))
            .with_state(state.clone());

        let listener = TcpListener::bind("127.0.0.1:0")
            .await
            .expect("bind test listener");
        let addr = listener.local_addr().expect("local addr");
        let base_url = format!("http://{}", addr);

        let task = tokio::spawn(async move {
            let _ = axum::serve(listener, app).await;
        });

        Self {
            base_url,
            state,
            task,
        }
    }

    fn hits(&self) -> usize {
        self.state.hits.load(Ordering::SeqCst)
    }
}

impl Drop for TestServer {
    fn drop(&mut self) {
        self.task.abort();
    }
}

async fn login_handler(
    State(state): State<AppState>,
    Json(credentials): Json<Credentials>,
) -> (StatusCode, &'static str) {
    state.hits.fetch_add(1, Ordering::SeqCst);
    if credentials.username == "alice" && credentials.password == "secret" {
        (StatusCode::OK, r#"{"token":"abc123"}"#)
    } else {
        (StatusCode::UNAUTHORIZED, r#"{"error":"invalid credentials"}"#)
    }
}
