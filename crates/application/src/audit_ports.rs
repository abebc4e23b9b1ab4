use async_trait::async_trait;
use auditrelay_core::AuditResult;
use auditrelay_domain::NormalizedEvent;

/// Port for resolving the provider default tenant.
///
/// Used when the acting identity carries no tenant of its own.
#[async_trait]
pub trait TenantResolver: Send + Sync {
    /// Returns the provider default tenant identifier.
    async fn read_provider_tenant(&self) -> AuditResult<String>;
}

/// Port for delivering one normalized event batch to the ingestion
/// endpoint.
///
/// One domain event produces one batch and one synchronous delivery call;
/// there is no queuing or batching across calls.
#[async_trait]
pub trait EventDelivery: Send + Sync {
    /// Delivers the batch and returns the endpoint response body.
    ///
    /// Implementations retry transient transport failures within a bounded
    /// budget; a retried delivery assumes the endpoint treats the batch
    /// idempotently.
    async fn send_batch(&self, events: &[NormalizedEvent]) -> AuditResult<String>;
}
