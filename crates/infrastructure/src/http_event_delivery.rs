use std::time::Duration;

use async_trait::async_trait;
use reqwest::StatusCode;
use reqwest::header::CONTENT_TYPE;
use tracing::{debug, info, warn};
use url::Url;

use auditrelay_application::EventDelivery;
use auditrelay_core::{AuditError, AuditResult};
use auditrelay_domain::NormalizedEvent;

use crate::certificate_transport::CertificateTransport;

/// Ingestion endpoint path, joined onto the service base URL.
pub const INGESTION_EVENTS_PATH: &str = "/ingestion/v1/events";

/// Total delivery attempts per batch, the first try included.
pub const DELIVERY_ATTEMPTS: u8 = 3;

/// Per-request timeout applied to every delivery attempt.
pub const DELIVERY_TIMEOUT: Duration = Duration::from_secs(30);

const RETRY_BACKOFF_MS: u64 = 250;
const NO_BODY_PLACEHOLDER: &str = "<no body>";

/// Retry and timeout knobs for batch delivery.
#[derive(Debug, Clone)]
pub struct DeliveryPolicy {
    /// Per-request timeout.
    pub timeout: Duration,
    /// Total attempts per batch, at least one.
    pub attempts: u8,
    /// Linear backoff step between attempts.
    pub retry_backoff_ms: u64,
}

impl Default for DeliveryPolicy {
    fn default() -> Self {
        Self {
            timeout: DELIVERY_TIMEOUT,
            attempts: DELIVERY_ATTEMPTS,
            retry_backoff_ms: RETRY_BACKOFF_MS,
        }
    }
}

/// Delivers normalized event batches over certificate-authenticated HTTP.
pub struct HttpEventDelivery {
    transport: CertificateTransport,
    events_url: Url,
    policy: DeliveryPolicy,
}

impl HttpEventDelivery {
    /// Binds the delivery client to the ingestion endpoint under `base_url`.
    pub fn new(
        transport: CertificateTransport,
        base_url: &Url,
        policy: DeliveryPolicy,
    ) -> AuditResult<Self> {
        let events_url = base_url.join(INGESTION_EVENTS_PATH).map_err(|error| {
            AuditError::InvalidConfiguration(format!(
                "cannot derive ingestion endpoint from '{base_url}': {error}"
            ))
        })?;
        Ok(Self {
            transport,
            events_url,
            policy,
        })
    }
}

fn is_accepted(status: StatusCode) -> bool {
    matches!(
        status,
        StatusCode::OK | StatusCode::CREATED | StatusCode::NO_CONTENT
    )
}

#[async_trait]
impl EventDelivery for HttpEventDelivery {
    async fn send_batch(&self, events: &[NormalizedEvent]) -> AuditResult<String> {
        let body = serde_json::to_vec(events)
            .map_err(|error| AuditError::SerializationFailure(error.to_string()))?;

        let attempts = self.policy.attempts.max(1);
        let mut last_error = String::new();

        for attempt in 1..=attempts {
            debug!(
                attempt,
                batch_size = events.len(),
                url = %self.events_url,
                "sending audit event batch"
            );
            let request = self
                .transport
                .client()
                .post(self.events_url.clone())
                .header(CONTENT_TYPE, "application/json")
                .timeout(self.policy.timeout)
                .body(body.clone());

            match self.transport.execute(request).await {
                Ok(response) => {
                    let status = response.status();
                    if is_accepted(status) {
                        let text = response.text().await.unwrap_or_default();
                        info!(
                            batch_size = events.len(),
                            status = status.as_u16(),
                            "audit event batch accepted"
                        );
                        return Ok(text);
                    }
                    // A decided rejection from the service is final.
                    let text = response
                        .text()
                        .await
                        .unwrap_or_else(|_| NO_BODY_PLACEHOLDER.to_owned());
                    return Err(AuditError::UnexpectedResponseStatus {
                        status: status.as_u16(),
                        body: text,
                    });
                }
                Err(error) => {
                    warn!(attempt, error = %error, "audit event delivery attempt failed");
                    last_error = error.to_string();
                }
            }

            if attempt < attempts {
                let backoff = self.policy.retry_backoff_ms.saturating_mul(u64::from(attempt));
                tokio::time::sleep(Duration::from_millis(backoff)).await;
            }
        }

        Err(AuditError::ServiceUnavailable(format!(
            "giving up after {attempts} attempts: {last_error}"
        )))
    }
}
