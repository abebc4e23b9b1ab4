//! Application services and ports: event normalization and delivery
//! dispatch.

#![forbid(unsafe_code)]

mod audit_log_service;
mod audit_ports;

pub use audit_log_service::{
    AuditEvent, AuditLogService, ConfigChangeLogContext, DataAccessLogContext,
    DataModificationLogContext, GeneralEventContext, SecurityLogContext,
};
pub use audit_ports::{EventDelivery, TenantResolver};
