//! Outbound adapters for audit event delivery.
//!
//! Binds the application ports to certificate-authenticated HTTP: service
//! binding parsing, TLS client identity handling, and the retrying
//! ingestion client.

#![forbid(unsafe_code)]

mod bootstrap;
mod certificate_transport;
mod http_event_delivery;
mod service_binding;

pub use bootstrap::build_audit_log_service;
pub use certificate_transport::{CertificateTransport, TransportConfig};
pub use http_event_delivery::{
    DELIVERY_ATTEMPTS, DELIVERY_TIMEOUT, DeliveryPolicy, HttpEventDelivery,
    INGESTION_EVENTS_PATH,
};
pub use service_binding::ServiceBinding;
