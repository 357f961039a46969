use std::sync::Arc;

use axum::{
    extract::{Query, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
    Form, Json, Router,
};
use serde::{Deserialize, Serialize};
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use tracing::{debug, info};

use crate::messages::Message;
use crate::service::ChatService;

// -----------------------------------------------------------------------------
// Wire types (form-encoded requests in, JSON responses out)
// -----------------------------------------------------------------------------

#[derive(Debug, Deserialize)]
pub struct LoginRequest {
    pub username: String,
    pub password: String,
}

#[derive(Debug, Deserialize)]
pub struct LogoutRequest {
    pub username: String,
}

#[derive(Debug, Deserialize)]
pub struct SendRequest {
    pub username: String,
    pub message: String,
    #[serde(rename = "toUser")]
    pub to_user: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct PollQuery {
    /// The number of messages the client has already consumed.
    pub count: u64,
}

#[derive(Debug, Serialize)]
pub struct SuccessResponse {
    pub success: bool,
}

#[derive(Debug, Serialize)]
pub struct SendResponse {
    pub success: bool,
    #[serde(rename = "totalMessages")]
    pub total_messages: u64,
}

#[derive(Debug, Serialize)]
pub struct PollResponse {
    #[serde(rename = "newMessages")]
    pub new_messages: Vec<Message>,
    #[serde(rename = "totalMessages")]
    pub total_messages: u64,
}

#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub error: String,
}

// -----------------------------------------------------------------------------
// Router
// -----------------------------------------------------------------------------

/// Build the HTTP surface over a shared [`ChatService`].
///
/// Browser clients poll from other origins, so CORS stays permissive.
pub fn router(service: Arc<ChatService>) -> Router {
    Router::new()
        .route("/login", post(login_handler))
        .route("/logout", post(logout_handler))
        .route("/send", post(send_handler))
        .route("/messages", get(messages_handler))
        .route("/list", get(list_handler))
        .with_state(service)
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
}

async fn login_handler(
    State(service): State<Arc<ChatService>>,
    Form(req): Form<LoginRequest>,
) -> Json<SuccessResponse> {
    let success = service.login(&req.username, &req.password);
    info!(
        "Login attempt for {}: {}",
        req.username,
        if success { "accepted" } else { "rejected" }
    );
    Json(SuccessResponse { success })
}

async fn logout_handler(
    State(service): State<Arc<ChatService>>,
    Form(req): Form<LogoutRequest>,
) -> Json<SuccessResponse> {
    let success = service.logout(&req.username);
    info!(
        "Logout for {}: {}",
        req.username,
        if success { "done" } else { "not active" }
    );
    Json(SuccessResponse { success })
}

async fn send_handler(
    State(service): State<Arc<ChatService>>,
    Form(req): Form<SendRequest>,
) -> Json<SendResponse> {
    let total_messages = service.publish(&req.username, &req.message, req.to_user);
    Json(SendResponse {
        success: true,
        total_messages,
    })
}

async fn messages_handler(
    State(service): State<Arc<ChatService>>,
    Query(query): Query<PollQuery>,
) -> Response {
    match service.poll(query.count) {
        Ok((new_messages, total_messages)) => {
            debug!(
                "Poll from offset {} returned {} messages",
                query.count,
                new_messages.len()
            );
            Json(PollResponse {
                new_messages,
                total_messages,
            })
            .into_response()
        }
        Err(e) => {
            info!("Rejected poll: {}", e);
            (
                StatusCode::BAD_REQUEST,
                Json(ErrorResponse {
                    error: e.to_string(),
                }),
            )
                .into_response()
        }
    }
}

async fn list_handler(State(service): State<Arc<ChatService>>) -> Json<Vec<String>> {
    Json(service.list_active_users())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::activity::FileActivitySink;
    use crate::credentials::CredentialStore;
    use std::io::Cursor;

    /// Bind the router on an ephemeral port and return its base URL.
    async fn spawn_server() -> (String, tempfile::TempDir) {
        let dir = tempfile::tempdir().unwrap();
        let credentials = CredentialStore::load(Cursor::new("alice pw1\nbob pw2\n")).unwrap();
        let sink = Arc::new(FileActivitySink::new(dir.path().join("logs.txt")));
        let service = Arc::new(ChatService::new(credentials, sink));

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, router(service)).await.unwrap();
        });
        (format!("http://{addr}"), dir)
    }

    #[tokio::test]
    async fn login_route_speaks_the_wire_protocol() {
        let (base, _dir) = spawn_server().await;
        let client = reqwest::Client::new();

        let body: serde_json::Value = client
            .post(format!("{base}/login"))
            .form(&[("username", "alice"), ("password", "pw1")])
            .send()
            .await
            .unwrap()
            .json()
            .await
            .unwrap();
        assert_eq!(body, serde_json::json!({"success": true}));

        let body: serde_json::Value = client
            .post(format!("{base}/login"))
            .form(&[("username", "alice"), ("password", "nope")])
            .send()
            .await
            .unwrap()
            .json()
            .await
            .unwrap();
        assert_eq!(body, serde_json::json!({"success": false}));
    }

    #[tokio::test]
    async fn send_then_poll_round_trip() {
        let (base, _dir) = spawn_server().await;
        let client = reqwest::Client::new();

        let body: serde_json::Value = client
            .post(format!("{base}/send"))
            .form(&[("username", "alice"), ("message", "hi")])
            .send()
            .await
            .unwrap()
            .json()
            .await
            .unwrap();
        assert_eq!(body, serde_json::json!({"success": true, "totalMessages": 1}));

        let body: serde_json::Value = client
            .post(format!("{base}/send"))
            .form(&[
                ("username", "alice"),
                ("message", "@bob secret"),
                ("toUser", "bob"),
            ])
            .send()
            .await
            .unwrap()
            .json()
            .await
            .unwrap();
        assert_eq!(body["totalMessages"], 2);

        let body: serde_json::Value = client
            .get(format!("{base}/messages"))
            .query(&[("count", 0u64)])
            .send()
            .await
            .unwrap()
            .json()
            .await
            .unwrap();
        assert_eq!(body["totalMessages"], 2);
        let new_messages = body["newMessages"].as_array().unwrap();
        assert_eq!(new_messages.len(), 2);
        assert_eq!(
            new_messages[0],
            serde_json::json!({"index": 0, "username": "alice", "message": "hi"})
        );
        assert_eq!(new_messages[1]["toUser"], "bob");

        // Caught up: valid empty read.
        let body: serde_json::Value = client
            .get(format!("{base}/messages"))
            .query(&[("count", 2u64)])
            .send()
            .await
            .unwrap()
            .json()
            .await
            .unwrap();
        assert!(body["newMessages"].as_array().unwrap().is_empty());
    }

    #[tokio::test]
    async fn poll_past_the_end_is_a_bad_request() {
        let (base, _dir) = spawn_server().await;
        let client = reqwest::Client::new();

        let resp = client
            .get(format!("{base}/messages"))
            .query(&[("count", 5u64)])
            .send()
            .await
            .unwrap();
        assert_eq!(resp.status(), reqwest::StatusCode::BAD_REQUEST);
        let body: serde_json::Value = resp.json().await.unwrap();
        assert!(body["error"].as_str().unwrap().contains("invalid offset"));
    }

    #[tokio::test]
    async fn non_numeric_count_is_rejected_before_the_core() {
        let (base, _dir) = spawn_server().await;
        let client = reqwest::Client::new();

        let resp = client
            .get(format!("{base}/messages"))
            .query(&[("count", "-1")])
            .send()
            .await
            .unwrap();
        assert_eq!(resp.status(), reqwest::StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn list_route_reflects_logins_and_logouts() {
        let (base, _dir) = spawn_server().await;
        let client = reqwest::Client::new();

        let users: Vec<String> = client
            .get(format!("{base}/list"))
            .send()
            .await
            .unwrap()
            .json()
            .await
            .unwrap();
        assert!(users.is_empty());

        client
            .post(format!("{base}/login"))
            .form(&[("username", "alice"), ("password", "pw1")])
            .send()
            .await
            .unwrap();
        client
            .post(format!("{base}/login"))
            .form(&[("username", "bob"), ("password", "pw2")])
            .send()
            .await
            .unwrap();

        let users: Vec<String> = client
            .get(format!("{base}/list"))
            .send()
            .await
            .unwrap()
            .json()
            .await
            .unwrap();
        assert_eq!(users, vec!["alice".to_string(), "bob".to_string()]);

        let body: serde_json::Value = client
            .post(format!("{base}/logout"))
            .form(&[("username", "bob")])
            .send()
            .await
            .unwrap()
            .json()
            .await
            .unwrap();
        assert_eq!(body, serde_json::json!({"success": true}));

        let users: Vec<String> = client
            .get(format!("{base}/list"))
            .send()
            .await
            .unwrap()
            .json()
            .await
            .unwrap();
        assert_eq!(users, vec!["alice".to_string()]);
    }
}
