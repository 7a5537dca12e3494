//! Translates build events into pull request commit statuses.

use async_trait::async_trait;
use std::sync::Arc;
use tracing::{error, info, warn};

use crate::bus::{Event, EventHandler, EventSubscriber};
use crate::config::ProductProfile;
use crate::error::{NotifierError, Result};
use crate::events::{BuildEnqueuedEvent, BuildFinishedEvent, BuildResult};
use crate::status::{StatusClient, StatusState, StatusUpdate};

/// What a handler did with an event.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    Posted,
    /// The build was not triggered by a pull request.
    NotPullRequest,
}

pub struct StatusNotifier {
    product: ProductProfile,
    client: Arc<dyn StatusClient>,
}

impl StatusNotifier {
    pub fn new(product: ProductProfile, client: Arc<dyn StatusClient>) -> Self {
        Self { product, client }
    }

    pub fn product(&self) -> &ProductProfile {
        &self.product
    }

    /// Register both handlers with `subscriber` under the product's topics.
    pub fn subscribe(self: &Arc<Self>, subscriber: &dyn EventSubscriber) -> Result<()> {
        subscriber.subscribe(
            &self.product.enqueued_topic(),
            Arc::new(OnBuildEnqueued(Arc::clone(self))),
        )?;
        subscriber.subscribe(
            &self.product.finished_topic(),
            Arc::new(OnBuildFinished(Arc::clone(self))),
        )?;
        Ok(())
    }

    /// Post a pending status for a freshly queued pull request build.
    pub async fn handle_enqueued(&self, event: &Event) -> Result<Outcome> {
        let body: BuildEnqueuedEvent = event.decode()?;

        let Some(pr) = body.pull_request else {
            info!("ENQUEUED event received, but not a pull request, skipping...");
            return Ok(Outcome::NotPullRequest);
        };

        info!("Setting status for {} to PENDING", pr.html_url);
        let update = StatusUpdate {
            state: StatusState::Pending,
            description: self.product.pending_message(),
            target_url: None,
            context: self.product.context.clone(),
        };
        self.client.post(&pr.statuses_url, &update).await?;
        Ok(Outcome::Posted)
    }

    /// Post the terminal status derived from the build result.
    pub async fn handle_finished(&self, event: &Event) -> Result<Outcome> {
        let body: BuildFinishedEvent = event.decode()?;

        let Some(pr) = body.pull_request.as_ref() else {
            info!("FINISHED event received, but not a pull request, skipping...");
            return Ok(Outcome::NotPullRequest);
        };
        let result = body.build_result()?;

        info!(
            "Setting status for {} to {}",
            pr.html_url,
            result.as_str().to_uppercase()
        );
        let update = StatusUpdate {
            state: result.into(),
            description: finished_description(&self.product, result, body.error.as_deref()),
            target_url: body.output_url,
            context: self.product.context.clone(),
        };
        self.client.post(&pr.statuses_url, &update).await?;
        Ok(Outcome::Posted)
    }
}

/// Human readable description for a finished build.
pub fn finished_description(
    product: &ProductProfile,
    result: BuildResult,
    error: Option<&str>,
) -> String {
    match result {
        BuildResult::Success => product.success_message(),
        BuildResult::Failure => product.failure_message(),
        BuildResult::Error => match error {
            Some(message) if !message.is_empty() => message.to_string(),
            _ => product.error_fallback_message(),
        },
    }
}

/// Logs a handler failure. Nothing is retried or reported back to the bus.
fn report(event: &Event, err: NotifierError) {
    match err {
        NotifierError::MalformedPayload { .. } => {
            warn!(topic = %event.topic, delivery = %event.delivery_id, "{}", err)
        }
        _ => error!(topic = %event.topic, delivery = %event.delivery_id, "{}", err),
    }
}

struct OnBuildEnqueued(Arc<StatusNotifier>);

#[async_trait]
impl EventHandler for OnBuildEnqueued {
    async fn handle(&self, event: Event) {
        if let Err(e) = self.0.handle_enqueued(&event).await {
            report(&event, e);
        }
    }
}

struct OnBuildFinished(Arc<StatusNotifier>);

#[async_trait]
impl EventHandler for OnBuildFinished {
    async fn handle(&self, event: Event) {
        if let Err(e) = self.0.handle_finished(&event).await {
            report(&event, e);
        }
    }
}
