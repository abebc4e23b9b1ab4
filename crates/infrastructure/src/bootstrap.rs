use std::sync::Arc;

use tracing::info;

use auditrelay_application::{AuditLogService, TenantResolver};
use auditrelay_core::AuditResult;

use crate::certificate_transport::{CertificateTransport, TransportConfig};
use crate::http_event_delivery::{
    DELIVERY_ATTEMPTS, DELIVERY_TIMEOUT, DeliveryPolicy, HttpEventDelivery,
};
use crate::service_binding::ServiceBinding;

/// Wires a ready-to-use [`AuditLogService`] from a validated service binding.
///
/// Fails when the binding is incomplete or the certificate material cannot
/// be loaded; a partially constructed service is never returned.
pub fn build_audit_log_service(
    binding: &ServiceBinding,
    tenants: Arc<dyn TenantResolver>,
) -> AuditResult<AuditLogService> {
    binding.validate()?;
    let base_url = binding.base_url()?;

    let transport = CertificateTransport::new(TransportConfig {
        cert_pem: binding.cert.clone(),
        key_pem: binding.key.clone(),
        passphrase: binding.passphrase.clone(),
        max_retries: DELIVERY_ATTEMPTS,
        timeout: DELIVERY_TIMEOUT,
    })?;

    let delivery = HttpEventDelivery::new(transport, &base_url, DeliveryPolicy::default())?;

    info!(
        region = %binding.region,
        namespace = %binding.namespace,
        url = %base_url,
        "audit log service configured"
    );
    Ok(AuditLogService::new(
        Arc::new(delivery),
        tenants,
        binding.region.clone(),
        binding.namespace.clone(),
    ))
}
