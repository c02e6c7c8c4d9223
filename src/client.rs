//! Single-attempt webhook delivery over HTTP

use crate::config::ClientConfig;
use crate::delivery::{Delivery, DeliveryStatus, FailureKind};
use crate::event::Event;
use crate::signature::{Signer, headers};
use crate::webhook::Webhook;
use std::collections::HashMap;
use std::time::Duration;
use tracing::{debug, info, warn};
use url::Url;

/// Outcome of one delivery attempt: the record plus, on failure, the
/// classification the retry scheduler acts on
#[derive(Debug)]
pub struct AttemptOutcome {
    /// The delivery record for this attempt
    pub delivery: Delivery,

    /// Failure classification; `None` on success
    pub failure: Option<FailureKind>,
}

/// Client performing signed HTTP delivery
///
/// Performs exactly one attempt per call and never retries internally —
/// retry scheduling is the delivery queue's responsibility.
#[derive(Debug, Clone)]
pub struct WebhookClient {
    http: reqwest::Client,
}

impl WebhookClient {
    /// Create a new client
    pub fn new(config: ClientConfig) -> Self {
        let http = reqwest::Client::builder()
            .user_agent(&config.user_agent)
            .danger_accept_invalid_certs(!config.verify_ssl)
            .build()
            .expect("Failed to create HTTP client");

        Self { http }
    }

    /// Deliver an event to a webhook, one attempt
    ///
    /// Always produces a delivery record; `Err` is reserved for usage
    /// errors (a malformed webhook URL), which are never attempted.
    pub async fn deliver(&self, webhook: &Webhook, event: &Event) -> crate::Result<Delivery> {
        Ok(self.attempt(webhook, event, 1).await?.delivery)
    }

    /// Perform attempt number `attempt` and classify the outcome
    pub(crate) async fn attempt(
        &self,
        webhook: &Webhook,
        event: &Event,
        attempt: u32,
    ) -> crate::Result<AttemptOutcome> {
        let url = Url::parse(&webhook.url)?;

        let mut delivery = Delivery::new(&webhook.id, &event.id, &webhook.url, attempt);
        delivery.status = DeliveryStatus::InProgress;

        let payload = match event.to_bytes() {
            Ok(payload) => payload,
            Err(err) => {
                delivery.mark_failed(format!("Payload error: {err}"));
                return Ok(AttemptOutcome {
                    delivery,
                    failure: Some(FailureKind::Serialization(err.to_string())),
                });
            }
        };
        delivery.payload = String::from_utf8_lossy(&payload).into_owned();

        let mut sent_headers = HashMap::new();
        sent_headers.insert("Content-Type".to_string(), "application/json".to_string());
        sent_headers.insert(headers::WEBHOOK_ID.to_string(), webhook.id.clone());
        sent_headers.insert(headers::EVENT_ID.to_string(), event.id.clone());
        sent_headers.insert(headers::EVENT_TYPE.to_string(), event.event_type.clone());
        for (key, value) in &webhook.headers {
            sent_headers.insert(key.clone(), value.clone());
        }
        if !webhook.secret.is_empty() {
            let signature = Signer::new(&webhook.secret).sign(&payload);
            sent_headers.insert(headers::SIGNATURE.to_string(), signature);
        }

        let mut request = self
            .http
            .post(url)
            .timeout(webhook.retry.timeout)
            .body(payload);
        for (key, value) in &sent_headers {
            request = request.header(key.as_str(), value.as_str());
        }
        delivery.headers = sent_headers;

        debug!(
            webhook = %webhook.id,
            event = %event.id,
            attempt,
            "delivering webhook"
        );

        match request.send().await {
            Ok(response) => {
                let status = response.status();
                let retry_after = parse_retry_after(response.headers());
                let body = response.text().await.ok();

                if status.is_success() {
                    info!(
                        webhook = %webhook.id,
                        event = %event.id,
                        attempt,
                        status = status.as_u16(),
                        "webhook delivered"
                    );
                    delivery.mark_succeeded(status.as_u16(), body);
                    Ok(AttemptOutcome {
                        delivery,
                        failure: None,
                    })
                } else {
                    warn!(
                        webhook = %webhook.id,
                        event = %event.id,
                        attempt,
                        status = status.as_u16(),
                        "webhook delivery failed"
                    );
                    delivery.mark_failed_with_status(status.as_u16(), body);
                    Ok(AttemptOutcome {
                        delivery,
                        failure: Some(FailureKind::from_status(status.as_u16(), retry_after)),
                    })
                }
            }
            Err(err) => {
                warn!(
                    webhook = %webhook.id,
                    event = %event.id,
                    attempt,
                    error = %err,
                    "webhook delivery error"
                );
                delivery.mark_failed(err.to_string());
                Ok(AttemptOutcome {
                    delivery,
                    failure: Some(FailureKind::Transport(err.to_string())),
                })
            }
        }
    }
}

impl Default for WebhookClient {
    fn default() -> Self {
        Self::new(ClientConfig::default())
    }
}

/// Parse a Retry-After header in delta-seconds form
///
/// HTTP-date values are not handled; the computed backoff applies instead.
fn parse_retry_after(headers: &reqwest::header::HeaderMap) -> Option<Duration> {
    headers
        .get(reqwest::header::RETRY_AFTER)?
        .to_str()
        .ok()?
        .trim()
        .parse::<u64>()
        .ok()
        .map(Duration::from_secs)
}
