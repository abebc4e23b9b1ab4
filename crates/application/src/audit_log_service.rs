use std::sync::Arc;

use chrono::{SecondsFormat, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{debug, error};
use uuid::Uuid;

use auditrelay_core::{AuditError, AuditResult};
use auditrelay_domain::{
    ActorContext, ChangedAttribute, ConfigChangeLog, ConfigurationChangePayload, DataAccessLog,
    DataAccessPayload, DataModificationLog, DataModificationPayload, DataObject, DataSubject,
    EventPayload, NormalizedEvent, SecurityLog, SecurityWrapperPayload, format_identifier_pairs,
};

use crate::audit_ports::{EventDelivery, TenantResolver};

const IDENTITY_PROVIDER: &str = "$IDP";
const CHANNEL_NOT_SPECIFIED: &str = "not specified";
const NULL_LITERAL: &str = "null";
const GENERAL_DATA_KEY: &str = "data";
const GENERAL_INNER_EVENT_KEY: &str = "event";

/// Context for a security event.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SecurityLogContext {
    /// Security event data.
    #[serde(default)]
    pub data: Option<SecurityLog>,
    /// Acting identity.
    #[serde(default)]
    pub user: Option<ActorContext>,
}

/// Context for a data access event.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DataAccessLogContext {
    /// Data access event data.
    #[serde(default)]
    pub data: Option<DataAccessLog>,
    /// Acting identity.
    #[serde(default)]
    pub user: Option<ActorContext>,
}

/// Context for a configuration change event.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConfigChangeLogContext {
    /// Configuration change event data.
    #[serde(default)]
    pub data: Option<ConfigChangeLog>,
    /// Acting identity.
    #[serde(default)]
    pub user: Option<ActorContext>,
}

/// Context for a data modification event.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DataModificationLogContext {
    /// Data modification event data.
    #[serde(default)]
    pub data: Option<DataModificationLog>,
    /// Acting identity.
    #[serde(default)]
    pub user: Option<ActorContext>,
}

/// Context for a generic passthrough event.
///
/// The dispatcher supplies the event type name and a raw extras map; the
/// payload is expected under the fixed `"data"` key as a mapping whose
/// `"event"` entry holds a JSON-encoded string.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GeneralEventContext {
    /// Event type name, used as the wire type and payload key.
    pub event: String,
    /// Acting identity.
    #[serde(default)]
    pub user: Option<ActorContext>,
    /// Raw context entries supplied by the dispatcher.
    #[serde(default)]
    pub extras: serde_json::Map<String, Value>,
}

/// One domain event as supplied by the external dispatcher.
///
/// Closed tagged union: the dispatcher selects the variant, the service
/// dispatches on it. No runtime handler registration exists.
#[derive(Debug, Clone)]
pub enum AuditEvent {
    /// Security action event.
    Security(SecurityLogContext),
    /// Personal-data access event.
    DataAccess(DataAccessLogContext),
    /// Configuration change event.
    ConfigChange(ConfigChangeLogContext),
    /// Personal-data modification event.
    DataModification(DataModificationLogContext),
    /// Generic passthrough event.
    General(GeneralEventContext),
}

impl AuditEvent {
    /// Returns a stable label for logging.
    #[must_use]
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Security(_) => "security",
            Self::DataAccess(_) => "data_access",
            Self::ConfigChange(_) => "config_change",
            Self::DataModification(_) => "data_modification",
            Self::General(_) => "general",
        }
    }
}

/// Application service normalizing domain events and delivering them
/// through the [`EventDelivery`] port.
#[derive(Clone)]
pub struct AuditLogService {
    delivery: Arc<dyn EventDelivery>,
    tenants: Arc<dyn TenantResolver>,
    region: String,
    namespace: String,
}

impl AuditLogService {
    /// Creates a service from its ports and the source coordinates.
    #[must_use]
    pub fn new(
        delivery: Arc<dyn EventDelivery>,
        tenants: Arc<dyn TenantResolver>,
        region: impl Into<String>,
        namespace: impl Into<String>,
    ) -> Self {
        Self {
            delivery,
            tenants,
            region: region.into(),
            namespace: namespace.into(),
        }
    }

    /// Normalizes and delivers one domain event, returning the endpoint
    /// response body.
    ///
    /// Any failure aborts the invocation before delivery; nothing is
    /// partially sent on a precondition violation.
    pub async fn handle(&self, event: AuditEvent) -> AuditResult<String> {
        let kind = event.kind();
        let result = match event {
            AuditEvent::Security(context) => self.handle_security_event(context).await,
            AuditEvent::DataAccess(context) => self.handle_data_access_event(context).await,
            AuditEvent::ConfigChange(context) => self.handle_config_change_event(context).await,
            AuditEvent::DataModification(context) => {
                self.handle_data_modification_event(context).await
            }
            AuditEvent::General(context) => self.handle_general_event(context).await,
        };
        if let Err(ref failure) = result {
            error!(kind, error = %failure, "audit event handling failed");
        }
        result
    }

    /// Normalizes and delivers one security event.
    pub async fn handle_security_event(&self, context: SecurityLogContext) -> AuditResult<String> {
        let data = context
            .data
            .as_ref()
            .ok_or_else(|| missing("security_log.data"))?;
        let user = context
            .user
            .as_ref()
            .ok_or_else(|| missing("security_log.user"))?;
        let source = self.event_source(user).await?;
        let orig_event = build_security_orig_event(user, data)?;
        let events = vec![NormalizedEvent::new(
            source,
            EventPayload::SecurityWrapper(SecurityWrapperPayload { orig_event }),
        )];
        self.send(events).await
    }

    /// Normalizes and delivers one data access event.
    ///
    /// Fan-out: one normalized event per access record, per attribute, per
    /// attachment; a single null-attachment pass when the access has no
    /// attachments. The cross product is explicit and not deduplicated.
    pub async fn handle_data_access_event(
        &self,
        context: DataAccessLogContext,
    ) -> AuditResult<String> {
        let user = context
            .user
            .as_ref()
            .ok_or_else(|| missing("data_access_log.user"))?;
        let data = context
            .data
            .as_ref()
            .ok_or_else(|| missing("data_access_log.data"))?;
        let accesses = data
            .accesses
            .as_ref()
            .ok_or_else(|| missing("data_access_log.accesses"))?;
        let source = self.event_source(user).await?;

        let mut events = Vec::new();
        for access in accesses {
            let subject = access
                .data_subject
                .as_ref()
                .ok_or_else(|| missing("access.data_subject"))?;
            let (subject_type, subject_id) =
                subject_details(Some(subject), "access.data_subject")?;
            let object = access
                .data_object
                .as_ref()
                .ok_or_else(|| missing("access.data_object"))?;
            let (object_type, object_id) = object_details(object, "access.data_object")?;
            let attributes = access
                .attributes
                .as_ref()
                .ok_or_else(|| missing("access.attributes"))?;

            for attribute in attributes {
                let attribute_name = attribute
                    .name
                    .as_deref()
                    .ok_or_else(|| missing("access.attributes.name"))?;
                let access_payload = |attachment_type: Option<String>,
                                      attachment_id: Option<String>| {
                    EventPayload::DataAccess(DataAccessPayload {
                        channel_type: CHANNEL_NOT_SPECIFIED.to_owned(),
                        channel_id: CHANNEL_NOT_SPECIFIED.to_owned(),
                        data_subject_type: subject_type.clone(),
                        data_subject_id: subject_id.clone(),
                        object_type: object_type.clone(),
                        object_id: object_id.clone(),
                        attribute: attribute_name.to_owned(),
                        attachment_type,
                        attachment_id,
                    })
                };
                match access.attachments.as_deref() {
                    Some(attachments) if !attachments.is_empty() => {
                        for attachment in attachments {
                            events.push(NormalizedEvent::new(
                                source.clone(),
                                access_payload(attachment.name.clone(), attachment.id.clone()),
                            ));
                        }
                    }
                    _ => {
                        events.push(NormalizedEvent::new(source.clone(), access_payload(None, None)));
                    }
                }
            }
        }
        self.send(events).await
    }

    /// Normalizes and delivers one configuration change event.
    ///
    /// Fan-out: one normalized event per changed attribute per
    /// configuration item.
    pub async fn handle_config_change_event(
        &self,
        context: ConfigChangeLogContext,
    ) -> AuditResult<String> {
        let data = context
            .data
            .as_ref()
            .ok_or_else(|| missing("config_change_log.data"))?;
        let user = context
            .user
            .as_ref()
            .ok_or_else(|| missing("config_change_log.user"))?;
        let configurations = data
            .configurations
            .as_ref()
            .ok_or_else(|| missing("config_change_log.configurations"))?;
        let source = self.event_source(user).await?;

        let mut events = Vec::new();
        for change in configurations {
            let attributes = change
                .attributes
                .as_ref()
                .ok_or_else(|| missing("configuration.attributes"))?;
            let object = change
                .data_object
                .as_ref()
                .ok_or_else(|| missing("configuration.data_object"))?;
            let (object_type, object_id) = object_details(object, "configuration.data_object")?;
            for attribute in attributes {
                let (property_name, new_value, old_value) =
                    changed_value_details(attribute, "configuration.attributes")?;
                events.push(NormalizedEvent::new(
                    source.clone(),
                    EventPayload::ConfigurationChange(ConfigurationChangePayload {
                        property_name,
                        new_value,
                        old_value,
                        object_type: object_type.clone(),
                        object_id: object_id.clone(),
                    }),
                ));
            }
        }
        self.send(events).await
    }

    /// Normalizes and delivers one data modification event.
    ///
    /// Fan-out: one normalized event per changed attribute per
    /// modification record. Unlike data access, the data subject may
    /// legitimately be absent here and renders as `"null"`.
    pub async fn handle_data_modification_event(
        &self,
        context: DataModificationLogContext,
    ) -> AuditResult<String> {
        let data = context
            .data
            .as_ref()
            .ok_or_else(|| missing("data_modification_log.data"))?;
        let user = context
            .user
            .as_ref()
            .ok_or_else(|| missing("data_modification_log.user"))?;
        let modifications = data
            .modifications
            .as_ref()
            .ok_or_else(|| missing("data_modification_log.modifications"))?;
        let source = self.event_source(user).await?;

        let mut events = Vec::new();
        for modification in modifications {
            let object = modification
                .data_object
                .as_ref()
                .ok_or_else(|| missing("modification.data_object"))?;
            let (object_type, object_id) = object_details(object, "modification.data_object")?;
            let (subject_type, subject_id) = subject_details(
                modification.data_subject.as_ref(),
                "modification.data_subject",
            )?;
            let attributes = modification
                .attributes
                .as_ref()
                .ok_or_else(|| missing("modification.attributes"))?;
            for attribute in attributes {
                let (attribute_name, new_value, old_value) =
                    changed_value_details(attribute, "modification.attributes")?;
                events.push(NormalizedEvent::new(
                    source.clone(),
                    EventPayload::DataModification(DataModificationPayload {
                        attribute: attribute_name,
                        new_value,
                        old_value,
                        object_type: object_type.clone(),
                        object_id: object_id.clone(),
                        data_subject_type: subject_type.clone(),
                        data_subject_id: subject_id.clone(),
                    }),
                ));
            }
        }
        self.send(events).await
    }

    /// Normalizes and delivers one generic passthrough event.
    pub async fn handle_general_event(&self, context: GeneralEventContext) -> AuditResult<String> {
        let user = context
            .user
            .as_ref()
            .ok_or_else(|| missing("general_event.user"))?;
        let source = self.event_source(user).await?;
        let payload = general_payload(&context)?;
        let events = vec![NormalizedEvent::new(source, payload)];
        self.send(events).await
    }

    async fn send(&self, events: Vec<NormalizedEvent>) -> AuditResult<String> {
        debug!(batch_size = events.len(), "delivering normalized event batch");
        self.delivery.send_batch(&events).await
    }

    /// Composes the event source, falling back to the provider tenant when
    /// the acting identity carries no tenant.
    async fn event_source(&self, user: &ActorContext) -> AuditResult<String> {
        let tenant = match user.tenant.as_deref() {
            Some(tenant) if !tenant.is_empty() => tenant.to_owned(),
            _ => self.tenants.read_provider_tenant().await?,
        };
        Ok(format!("/{}/{}/{}", self.region, self.namespace, tenant))
    }
}

fn missing(path: &str) -> AuditError {
    AuditError::MissingRequiredField(path.to_owned())
}

/// Serializes the wrapped original security event to its inner JSON
/// string. Newline sequences in the free-text detail are escaped to the
/// literal `\n` so the value survives the double encoding.
fn build_security_orig_event(user: &ActorContext, data: &SecurityLog) -> AuditResult<String> {
    let formatted = format!(
        "action: {}, data: {}",
        data.action.as_deref().unwrap_or(NULL_LITERAL),
        data.data.as_deref().unwrap_or(NULL_LITERAL),
    )
    .replace("\r\n", "\\n")
    .replace('\n', "\\n");

    let orig_event = serde_json::json!({
        "uuid": Uuid::new_v4().to_string(),
        "user": user.name.as_deref().unwrap_or("unknown"),
        "identityProvider": IDENTITY_PROVIDER,
        "time": Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true),
        "data": formatted,
    });
    serde_json::to_string(&orig_event)
        .map_err(|error| AuditError::SerializationFailure(error.to_string()))
}

fn general_payload(context: &GeneralEventContext) -> AuditResult<EventPayload> {
    let data = context.extras.get(GENERAL_DATA_KEY).ok_or_else(|| {
        AuditError::MalformedGeneralEvent(format!(
            "general event '{}' has no '{GENERAL_DATA_KEY}' entry",
            context.event
        ))
    })?;
    let inner = data
        .get(GENERAL_INNER_EVENT_KEY)
        .and_then(Value::as_str)
        .ok_or_else(|| {
            AuditError::MalformedGeneralEvent(format!(
                "general event '{}' carries no '{GENERAL_INNER_EVENT_KEY}' JSON string",
                context.event
            ))
        })?;
    let value: Value = serde_json::from_str(inner).map_err(|error| {
        AuditError::MalformedGeneralEvent(format!(
            "general event '{}' payload is not valid JSON: {error}",
            context.event
        ))
    })?;
    Ok(EventPayload::General {
        name: context.event.clone(),
        value,
    })
}

fn object_details(object: &DataObject, path: &str) -> AuditResult<(String, String)> {
    let ids = object
        .id
        .as_ref()
        .ok_or_else(|| missing(&format!("{path}.id")))?;
    let object_type = object
        .object_type
        .clone()
        .unwrap_or_else(|| NULL_LITERAL.to_owned());
    Ok((object_type, format_identifier_pairs(ids)))
}

fn subject_details(subject: Option<&DataSubject>, path: &str) -> AuditResult<(String, String)> {
    match subject {
        None => Ok((NULL_LITERAL.to_owned(), NULL_LITERAL.to_owned())),
        Some(subject) => {
            let ids = subject
                .id
                .as_ref()
                .ok_or_else(|| missing(&format!("{path}.id")))?;
            let subject_type = subject
                .subject_type
                .clone()
                .unwrap_or_else(|| NULL_LITERAL.to_owned());
            Ok((subject_type, format_identifier_pairs(ids)))
        }
    }
}

/// Extracts the mandatory name and new value plus the defaulted old value
/// of one changed attribute.
fn changed_value_details(
    attribute: &ChangedAttribute,
    path: &str,
) -> AuditResult<(String, String, String)> {
    let name = attribute
        .name
        .clone()
        .ok_or_else(|| missing(&format!("{path}.name")))?;
    let new_value = attribute
        .new_value
        .clone()
        .ok_or_else(|| missing(&format!("{path}.new_value")))?;
    let old_value = attribute
        .old_value
        .clone()
        .unwrap_or_else(|| NULL_LITERAL.to_owned());
    Ok((name, new_value, old_value))
}

#[cfg(test)]
mod tests;
