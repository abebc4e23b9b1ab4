use std::sync::Arc;

use async_trait::async_trait;
use serde_json::{Value, json};
use tokio::sync::Mutex;

use auditrelay_core::{AuditError, AuditResult};
use auditrelay_domain::{
    Access, AccessAttribute, ActorContext, Attachment, ChangedAttribute, ConfigChange,
    ConfigChangeLog, DataAccessLog, DataModification, DataModificationLog, DataObject, DataSubject,
    EventPayload, KeyValuePair, NormalizedEvent, SecurityLog,
};

use crate::{
    AuditEvent, AuditLogService, ConfigChangeLogContext, DataAccessLogContext,
    DataModificationLogContext, EventDelivery, GeneralEventContext, SecurityLogContext,
    TenantResolver,
};

struct CapturingDelivery {
    batches: Mutex<Vec<Vec<NormalizedEvent>>>,
}

impl CapturingDelivery {
    fn new() -> Self {
        Self {
            batches: Mutex::new(Vec::new()),
        }
    }

    async fn last_batch(&self) -> Vec<NormalizedEvent> {
        self.batches.lock().await.last().cloned().unwrap_or_default()
    }
}

#[async_trait]
impl EventDelivery for CapturingDelivery {
    async fn send_batch(&self, events: &[NormalizedEvent]) -> AuditResult<String> {
        self.batches.lock().await.push(events.to_vec());
        Ok("accepted".to_owned())
    }
}

struct FailingDelivery;

#[async_trait]
impl EventDelivery for FailingDelivery {
    async fn send_batch(&self, _events: &[NormalizedEvent]) -> AuditResult<String> {
        Err(AuditError::UnexpectedResponseStatus {
            status: 500,
            body: "internal error".to_owned(),
        })
    }
}

struct FixedTenantResolver {
    tenant: String,
    calls: Mutex<u32>,
}

impl FixedTenantResolver {
    fn new(tenant: &str) -> Self {
        Self {
            tenant: tenant.to_owned(),
            calls: Mutex::new(0),
        }
    }

    async fn call_count(&self) -> u32 {
        *self.calls.lock().await
    }
}

#[async_trait]
impl TenantResolver for FixedTenantResolver {
    async fn read_provider_tenant(&self) -> AuditResult<String> {
        *self.calls.lock().await += 1;
        Ok(self.tenant.clone())
    }
}

fn service_with(
    delivery: Arc<dyn EventDelivery>,
    tenants: Arc<FixedTenantResolver>,
) -> AuditLogService {
    AuditLogService::new(delivery, tenants, "eu10", "com.example.shop")
}

fn actor(tenant: Option<&str>) -> ActorContext {
    ActorContext {
        name: Some("alice".to_owned()),
        tenant: tenant.map(str::to_owned),
    }
}

fn data_object() -> DataObject {
    DataObject {
        object_type: Some("Orders".to_owned()),
        id: Some(vec![
            KeyValuePair::new("zKey", "zValue"),
            KeyValuePair::new("aKey", "aValue"),
            KeyValuePair::new("mKey", "mValue"),
        ]),
    }
}

fn data_subject() -> DataSubject {
    DataSubject {
        subject_type: Some("customer".to_owned()),
        id: Some(vec![KeyValuePair::new("id", "42")]),
    }
}

fn access(attribute_names: &[&str], attachments: Option<Vec<Attachment>>) -> Access {
    Access {
        data_object: Some(data_object()),
        data_subject: Some(data_subject()),
        attributes: Some(
            attribute_names
                .iter()
                .map(|name| AccessAttribute {
                    name: Some((*name).to_owned()),
                })
                .collect(),
        ),
        attachments,
    }
}

fn changed_attribute(name: &str, old_value: Option<&str>, new_value: &str) -> ChangedAttribute {
    ChangedAttribute {
        name: Some(name.to_owned()),
        old_value: old_value.map(str::to_owned),
        new_value: Some(new_value.to_owned()),
    }
}

#[tokio::test]
async fn security_event_produces_one_wrapped_event() {
    let delivery = Arc::new(CapturingDelivery::new());
    let tenants = Arc::new(FixedTenantResolver::new("provider-tenant"));
    let service = service_with(delivery.clone(), tenants);

    let context = SecurityLogContext {
        data: Some(SecurityLog {
            action: Some("login".to_owned()),
            data: Some("first line\nsecond line".to_owned()),
        }),
        user: Some(actor(Some("tenant-a"))),
    };
    let result = service.handle(AuditEvent::Security(context)).await;
    assert!(result.is_ok());

    let batch = delivery.last_batch().await;
    assert_eq!(batch.len(), 1);
    let event = &batch[0];
    assert_eq!(event.event_type, "legacySecurityWrapper");
    assert_eq!(event.source, "/eu10/com.example.shop/tenant-a");

    let EventPayload::SecurityWrapper(ref payload) = event.data.data else {
        panic!("expected security wrapper payload");
    };
    let inner: Value = serde_json::from_str(&payload.orig_event).unwrap_or(Value::Null);
    assert_eq!(inner["user"], json!("alice"));
    assert_eq!(inner["identityProvider"], json!("$IDP"));
    assert_eq!(
        inner["data"],
        json!("action: login, data: first line\\nsecond line")
    );
    assert!(inner["uuid"].is_string());
    assert!(inner["time"].is_string());
}

#[tokio::test]
async fn security_event_defaults_unknown_user_and_null_action() {
    let delivery = Arc::new(CapturingDelivery::new());
    let tenants = Arc::new(FixedTenantResolver::new("provider-tenant"));
    let service = service_with(delivery.clone(), tenants);

    let context = SecurityLogContext {
        data: Some(SecurityLog {
            action: None,
            data: Some("security event data".to_owned()),
        }),
        user: Some(ActorContext {
            name: None,
            tenant: Some("tenant-a".to_owned()),
        }),
    };
    let result = service.handle_security_event(context).await;
    assert!(result.is_ok());

    let batch = delivery.last_batch().await;
    let EventPayload::SecurityWrapper(ref payload) = batch[0].data.data else {
        panic!("expected security wrapper payload");
    };
    let inner: Value = serde_json::from_str(&payload.orig_event).unwrap_or(Value::Null);
    assert_eq!(inner["user"], json!("unknown"));
    assert_eq!(inner["data"], json!("action: null, data: security event data"));
}

#[tokio::test]
async fn data_access_fans_out_per_attribute_and_attachment() {
    let delivery = Arc::new(CapturingDelivery::new());
    let tenants = Arc::new(FixedTenantResolver::new("provider-tenant"));
    let service = service_with(delivery.clone(), tenants);

    let attachments = vec![
        Attachment {
            name: Some("document".to_owned()),
            id: Some("doc-1".to_owned()),
        },
        Attachment {
            name: Some("image".to_owned()),
            id: Some("img-2".to_owned()),
        },
    ];
    let context = DataAccessLogContext {
        data: Some(DataAccessLog {
            accesses: Some(vec![access(&["amount", "currency"], Some(attachments))]),
        }),
        user: Some(actor(Some("tenant-a"))),
    };
    let result = service.handle_data_access_event(context).await;
    assert!(result.is_ok());

    let batch = delivery.last_batch().await;
    assert_eq!(batch.len(), 4);
    for event in &batch {
        assert_eq!(event.event_type, "dppDataAccess");
        let EventPayload::DataAccess(ref payload) = event.data.data else {
            panic!("expected data access payload");
        };
        assert_eq!(payload.channel_type, "not specified");
        assert_eq!(payload.object_id, "aKey:aValue mKey:mValue zKey:zValue");
        assert!(payload.attachment_type.is_some());
        assert!(payload.attachment_id.is_some());
    }
}

#[tokio::test]
async fn data_access_without_attachments_emits_one_event_per_attribute() {
    let delivery = Arc::new(CapturingDelivery::new());
    let tenants = Arc::new(FixedTenantResolver::new("provider-tenant"));
    let service = service_with(delivery.clone(), tenants);

    let context = DataAccessLogContext {
        data: Some(DataAccessLog {
            accesses: Some(vec![access(&["amount", "currency"], None)]),
        }),
        user: Some(actor(Some("tenant-a"))),
    };
    let result = service.handle_data_access_event(context).await;
    assert!(result.is_ok());

    let batch = delivery.last_batch().await;
    assert_eq!(batch.len(), 2);
    for event in &batch {
        let EventPayload::DataAccess(ref payload) = event.data.data else {
            panic!("expected data access payload");
        };
        assert!(payload.attachment_type.is_none());
        assert!(payload.attachment_id.is_none());
    }
}

#[tokio::test]
async fn data_access_requires_attributes() {
    let delivery = Arc::new(CapturingDelivery::new());
    let tenants = Arc::new(FixedTenantResolver::new("provider-tenant"));
    let service = service_with(delivery.clone(), tenants);

    let mut broken = access(&["amount"], None);
    broken.attributes = None;
    let context = DataAccessLogContext {
        data: Some(DataAccessLog {
            accesses: Some(vec![broken]),
        }),
        user: Some(actor(Some("tenant-a"))),
    };
    let result = service.handle_data_access_event(context).await;
    match result {
        Err(AuditError::MissingRequiredField(path)) => {
            assert_eq!(path, "access.attributes");
        }
        other => panic!("expected MissingRequiredField, got {other:?}"),
    }
    assert!(delivery.batches.lock().await.is_empty());
}

#[tokio::test]
async fn config_change_emits_one_event_per_changed_attribute() {
    let delivery = Arc::new(CapturingDelivery::new());
    let tenants = Arc::new(FixedTenantResolver::new("provider-tenant"));
    let service = service_with(delivery.clone(), tenants);

    let context = ConfigChangeLogContext {
        data: Some(ConfigChangeLog {
            configurations: Some(vec![ConfigChange {
                data_object: Some(data_object()),
                attributes: Some(vec![
                    changed_attribute("retention", Some("30"), "90"),
                    changed_attribute("mode", None, "strict"),
                ]),
            }]),
        }),
        user: Some(actor(Some("tenant-a"))),
    };
    let result = service.handle_config_change_event(context).await;
    assert!(result.is_ok());

    let batch = delivery.last_batch().await;
    assert_eq!(batch.len(), 2);
    let EventPayload::ConfigurationChange(ref second) = batch[1].data.data else {
        panic!("expected configuration change payload");
    };
    assert_eq!(second.property_name, "mode");
    assert_eq!(second.new_value, "strict");
    assert_eq!(second.old_value, "null");
    assert_eq!(second.object_type, "Orders");
}

#[tokio::test]
async fn config_change_requires_new_value() {
    let delivery = Arc::new(CapturingDelivery::new());
    let tenants = Arc::new(FixedTenantResolver::new("provider-tenant"));
    let service = service_with(delivery, tenants);

    let context = ConfigChangeLogContext {
        data: Some(ConfigChangeLog {
            configurations: Some(vec![ConfigChange {
                data_object: Some(data_object()),
                attributes: Some(vec![ChangedAttribute {
                    name: Some("retention".to_owned()),
                    old_value: Some("30".to_owned()),
                    new_value: None,
                }]),
            }]),
        }),
        user: Some(actor(Some("tenant-a"))),
    };
    let result = service.handle_config_change_event(context).await;
    match result {
        Err(AuditError::MissingRequiredField(path)) => {
            assert_eq!(path, "configuration.attributes.new_value");
        }
        other => panic!("expected MissingRequiredField, got {other:?}"),
    }
}

#[tokio::test]
async fn data_modification_emits_one_event_per_record_attribute() {
    let delivery = Arc::new(CapturingDelivery::new());
    let tenants = Arc::new(FixedTenantResolver::new("provider-tenant"));
    let service = service_with(delivery.clone(), tenants);

    let modifications: Vec<DataModification> = (0..100)
        .map(|index| DataModification {
            data_object: Some(data_object()),
            data_subject: None,
            attributes: Some(vec![changed_attribute(
                "name",
                None,
                &format!("value-{index}"),
            )]),
        })
        .collect();
    let context = DataModificationLogContext {
        data: Some(DataModificationLog {
            modifications: Some(modifications),
        }),
        user: Some(actor(Some("tenant-a"))),
    };
    let result = service.handle_data_modification_event(context).await;
    assert!(result.is_ok());

    let batch = delivery.last_batch().await;
    assert_eq!(batch.len(), 100);

    // Identifier ordering survives the wire representation.
    let encoded = serde_json::to_string(&batch).unwrap_or_default();
    let decoded: Vec<NormalizedEvent> = serde_json::from_str(&encoded).unwrap_or_default();
    assert_eq!(decoded.len(), 100);
    for event in &decoded {
        let EventPayload::DataModification(ref payload) = event.data.data else {
            panic!("expected data modification payload");
        };
        assert_eq!(payload.object_id, "aKey:aValue mKey:mValue zKey:zValue");
        assert_eq!(payload.data_subject_type, "null");
        assert_eq!(payload.data_subject_id, "null");
        assert_eq!(payload.old_value, "null");
    }
}

#[tokio::test]
async fn tenant_falls_back_to_provider_when_absent_or_empty() {
    let delivery = Arc::new(CapturingDelivery::new());
    let tenants = Arc::new(FixedTenantResolver::new("provider-tenant"));
    let service = service_with(delivery.clone(), tenants.clone());

    let context = SecurityLogContext {
        data: Some(SecurityLog {
            action: Some("login".to_owned()),
            data: Some("detail".to_owned()),
        }),
        user: Some(actor(Some(""))),
    };
    let result = service.handle_security_event(context).await;
    assert!(result.is_ok());
    assert_eq!(tenants.call_count().await, 1);

    let batch = delivery.last_batch().await;
    assert_eq!(batch[0].source, "/eu10/com.example.shop/provider-tenant");
}

#[tokio::test]
async fn explicit_tenant_skips_provider_lookup() {
    let delivery = Arc::new(CapturingDelivery::new());
    let tenants = Arc::new(FixedTenantResolver::new("provider-tenant"));
    let service = service_with(delivery.clone(), tenants.clone());

    let context = SecurityLogContext {
        data: Some(SecurityLog {
            action: Some("login".to_owned()),
            data: Some("detail".to_owned()),
        }),
        user: Some(actor(Some("tenant-a"))),
    };
    let result = service.handle_security_event(context).await;
    assert!(result.is_ok());
    assert_eq!(tenants.call_count().await, 0);
}

#[tokio::test]
async fn general_event_wraps_parsed_inner_payload_under_event_name() {
    let delivery = Arc::new(CapturingDelivery::new());
    let tenants = Arc::new(FixedTenantResolver::new("provider-tenant"));
    let service = service_with(delivery.clone(), tenants);

    let mut extras = serde_json::Map::new();
    extras.insert(
        "data".to_owned(),
        json!({
            "event": "{\"channelType\":\"UNSPECIFIED\",\"channelId\":\"string\",\"destinationUri\":\"string\"}"
        }),
    );
    let context = GeneralEventContext {
        event: "dataExport".to_owned(),
        user: Some(actor(Some("tenant-a"))),
        extras,
    };
    let result = service.handle(AuditEvent::General(context)).await;
    assert!(result.is_ok());

    let batch = delivery.last_batch().await;
    assert_eq!(batch.len(), 1);
    assert_eq!(batch[0].event_type, "dataExport");
    let EventPayload::General {
        ref name,
        ref value,
    } = batch[0].data.data
    else {
        panic!("expected general payload");
    };
    assert_eq!(name, "dataExport");
    assert_eq!(value["channelType"], json!("UNSPECIFIED"));
    assert_eq!(value["channelId"], json!("string"));
}

#[tokio::test]
async fn general_event_with_unparseable_payload_is_malformed() {
    let delivery = Arc::new(CapturingDelivery::new());
    let tenants = Arc::new(FixedTenantResolver::new("provider-tenant"));
    let service = service_with(delivery.clone(), tenants);

    let mut extras = serde_json::Map::new();
    extras.insert("data".to_owned(), json!({ "event": "{not json" }));
    let context = GeneralEventContext {
        event: "dataExport".to_owned(),
        user: Some(actor(Some("tenant-a"))),
        extras,
    };
    let result = service.handle_general_event(context).await;
    assert!(matches!(result, Err(AuditError::MalformedGeneralEvent(_))));
    assert!(delivery.batches.lock().await.is_empty());
}

#[tokio::test]
async fn general_event_without_data_entry_is_malformed() {
    let delivery = Arc::new(CapturingDelivery::new());
    let tenants = Arc::new(FixedTenantResolver::new("provider-tenant"));
    let service = service_with(delivery, tenants);

    let context = GeneralEventContext {
        event: "dataExport".to_owned(),
        user: Some(actor(Some("tenant-a"))),
        extras: serde_json::Map::new(),
    };
    let result = service.handle_general_event(context).await;
    assert!(matches!(result, Err(AuditError::MalformedGeneralEvent(_))));
}

#[tokio::test]
async fn delivery_failure_propagates_to_the_caller() {
    let tenants = Arc::new(FixedTenantResolver::new("provider-tenant"));
    let service = service_with(Arc::new(FailingDelivery), tenants);

    let context = SecurityLogContext {
        data: Some(SecurityLog {
            action: Some("login".to_owned()),
            data: Some("detail".to_owned()),
        }),
        user: Some(actor(Some("tenant-a"))),
    };
    let result = service.handle(AuditEvent::Security(context)).await;
    match result {
        Err(AuditError::UnexpectedResponseStatus { status, body }) => {
            assert_eq!(status, 500);
            assert_eq!(body, "internal error");
        }
        other => panic!("expected UnexpectedResponseStatus, got {other:?}"),
    }
}

#[tokio::test]
async fn missing_user_context_fails_fast() {
    let delivery = Arc::new(CapturingDelivery::new());
    let tenants = Arc::new(FixedTenantResolver::new("provider-tenant"));
    let service = service_with(delivery.clone(), tenants);

    let context = SecurityLogContext {
        data: Some(SecurityLog::default()),
        user: None,
    };
    let result = service.handle_security_event(context).await;
    match result {
        Err(AuditError::MissingRequiredField(path)) => {
            assert_eq!(path, "security_log.user");
        }
        other => panic!("expected MissingRequiredField, got {other:?}"),
    }
    assert!(delivery.batches.lock().await.is_empty());
}
