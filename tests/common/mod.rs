#![allow(dead_code)]

use axum::{
    Json, Router,
    extract::{Path, State},
    http::{HeaderMap, StatusCode},
    routing,
};
use serde_json::Value;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;

/// A status post as seen by the fake GitHub server.
#[derive(Debug, Clone)]
pub struct ReceivedStatus {
    pub sha: String,
    pub authorization: Option<String>,
    pub accept: Option<String>,
    pub body: Value,
}

struct FakeGithub {
    reply: StatusCode,
    seen: mpsc::UnboundedSender<ReceivedStatus>,
}

async fn create_status(
    State(state): State<Arc<FakeGithub>>,
    Path((_owner, _repo, sha)): Path<(String, String, String)>,
    headers: HeaderMap,
    Json(body): Json<Value>,
) -> (StatusCode, Json<Value>) {
    let header = |name: &str| {
        headers
            .get(name)
            .and_then(|v| v.to_str().ok())
            .map(String::from)
    };
    let _ = state.seen.send(ReceivedStatus {
        sha,
        authorization: header("authorization"),
        accept: header("accept"),
        body,
    });
    (state.reply, Json(serde_json::json!({ "message": "ok" })))
}

/// Start a stand-in for the statuses API that answers every post with `reply`.
pub async fn spawn_fake_github(
    reply: StatusCode,
) -> (SocketAddr, mpsc::UnboundedReceiver<ReceivedStatus>) {
    let (seen, rx) = mpsc::unbounded_channel();
    let app = Router::new()
        .route(
            "/repos/{owner}/{repo}/statuses/{sha}",
            routing::post(create_status),
        )
        .with_state(Arc::new(FakeGithub { reply, seen }));

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    (addr, rx)
}

pub async fn next_status(rx: &mut mpsc::UnboundedReceiver<ReceivedStatus>) -> Option<ReceivedStatus> {
    tokio::time::timeout(Duration::from_secs(2), rx.recv())
        .await
        .ok()
        .flatten()
}
