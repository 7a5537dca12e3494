//! HTTP transport: build systems POST events here and they are published on the bus.

use axum::{
    Router,
    body::Bytes,
    extract::{Path, State as AxumState},
    http::{HeaderMap, StatusCode},
    routing,
};
use std::sync::Arc;
use tracing::{debug, error, warn};

use crate::bus::{Event, EventBus};
use crate::signature::{SIGNATURE_HEADER, verify_signature};

pub struct IngressState {
    pub bus: EventBus,
    pub secret: Option<String>,
}

pub type SharedIngress = Arc<IngressState>;

pub fn router(state: SharedIngress) -> Router {
    Router::new()
        .route("/events/{topic}", routing::post(publish_event))
        .with_state(state)
}

fn valid_topic(topic: &str) -> bool {
    !topic.is_empty()
        && topic
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || matches!(c, '.' | '_' | '-'))
}

/// POST /events/{topic} - publish the request body as an event on `topic`
pub async fn publish_event(
    AxumState(state): AxumState<SharedIngress>,
    Path(topic): Path<String>,
    headers: HeaderMap,
    body: Bytes,
) -> StatusCode {
    if !valid_topic(&topic) {
        warn!("Rejecting event with invalid topic {:?}", topic);
        return StatusCode::BAD_REQUEST;
    }

    if let Some(secret) = state.secret.as_deref() {
        let Some(signature) = headers.get(SIGNATURE_HEADER).and_then(|v| v.to_str().ok()) else {
            error!("Event for '{}' has no {} header", topic, SIGNATURE_HEADER);
            return StatusCode::UNAUTHORIZED;
        };
        if !verify_signature(secret, &body, signature) {
            error!("Signature verification failed for event on '{}'", topic);
            return StatusCode::UNAUTHORIZED;
        }
    }

    let event = Event::new(topic, body.to_vec());
    let (topic, delivery_id) = (event.topic.clone(), event.delivery_id);
    let receivers = state.bus.publish(event);
    debug!(
        "Published {} on '{}' to {} subscription(s)",
        delivery_id, topic, receivers
    );

    StatusCode::ACCEPTED
}
