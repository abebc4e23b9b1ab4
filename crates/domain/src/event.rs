use serde::{Deserialize, Serialize};

use crate::identifier::KeyValuePair;

/// Acting identity attached to a domain event.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ActorContext {
    /// Acting user name.
    #[serde(default)]
    pub name: Option<String>,
    /// Tenant of the acting identity; the provider tenant is used when
    /// absent or empty.
    #[serde(default)]
    pub tenant: Option<String>,
}

/// Security event data supplied by the host dispatcher.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SecurityLog {
    /// Performed security action.
    #[serde(default)]
    pub action: Option<String>,
    /// Free-text event detail.
    #[serde(default)]
    pub data: Option<String>,
}

/// Data access event data: one or more access records.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DataAccessLog {
    /// Access records to normalize.
    #[serde(default)]
    pub accesses: Option<Vec<Access>>,
}

/// One read access to personal data.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Access {
    /// Accessed data object.
    #[serde(default)]
    pub data_object: Option<DataObject>,
    /// Data subject whose data was accessed.
    #[serde(default)]
    pub data_subject: Option<DataSubject>,
    /// Accessed attributes; one event is emitted per attribute.
    #[serde(default)]
    pub attributes: Option<Vec<AccessAttribute>>,
    /// Accessed attachments; crossed with attributes during fan-out.
    #[serde(default)]
    pub attachments: Option<Vec<Attachment>>,
}

/// One accessed attribute.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AccessAttribute {
    /// Attribute name.
    #[serde(default)]
    pub name: Option<String>,
}

/// One accessed attachment.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Attachment {
    /// Attachment type label.
    #[serde(default)]
    pub name: Option<String>,
    /// Attachment identifier.
    #[serde(default)]
    pub id: Option<String>,
}

/// Configuration change event data: one or more change records.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConfigChangeLog {
    /// Configuration change records to normalize.
    #[serde(default)]
    pub configurations: Option<Vec<ConfigChange>>,
}

/// One changed configuration item.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConfigChange {
    /// Changed configuration object.
    #[serde(default)]
    pub data_object: Option<DataObject>,
    /// Changed attributes; one event is emitted per attribute.
    #[serde(default)]
    pub attributes: Option<Vec<ChangedAttribute>>,
}

/// Data modification event data: one or more modification records.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DataModificationLog {
    /// Modification records to normalize.
    #[serde(default)]
    pub modifications: Option<Vec<DataModification>>,
}

/// One modification of personal data.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DataModification {
    /// Modified data object.
    #[serde(default)]
    pub data_object: Option<DataObject>,
    /// Data subject whose data was modified; may legitimately be absent.
    #[serde(default)]
    pub data_subject: Option<DataSubject>,
    /// Changed attributes; one event is emitted per attribute.
    #[serde(default)]
    pub attributes: Option<Vec<ChangedAttribute>>,
}

/// One changed attribute with its value transition.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChangedAttribute {
    /// Attribute name; mandatory for normalization.
    #[serde(default)]
    pub name: Option<String>,
    /// Previous value; rendered as the literal `"null"` when absent.
    #[serde(default)]
    pub old_value: Option<String>,
    /// New value; mandatory for normalization.
    #[serde(default)]
    pub new_value: Option<String>,
}

/// Object affected by an access, change, or modification.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DataObject {
    /// Object type label.
    #[serde(default, rename = "type")]
    pub object_type: Option<String>,
    /// Identifier components; mandatory for normalization.
    #[serde(default)]
    pub id: Option<Vec<KeyValuePair>>,
}

/// Person whose data is affected.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DataSubject {
    /// Subject type label.
    #[serde(default, rename = "type")]
    pub subject_type: Option<String>,
    /// Identifier components; mandatory when a subject is present.
    #[serde(default)]
    pub id: Option<Vec<KeyValuePair>>,
}
