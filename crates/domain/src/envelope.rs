use chrono::{DateTime, Utc};
use serde::ser::SerializeMap;
use serde::{Deserialize, Deserializer, Serialize, Serializer, de};
use serde_json::Value;
use uuid::Uuid;

/// Schema version stamped into every normalized event.
pub const SPEC_VERSION: u32 = 1;

/// Runtime tag carried in event metadata.
pub const RUNTIME_TYPE: &str = "Rust";

/// Platform tag carried in event metadata.
pub const PLATFORM_NAME: &str = "relay";

const SECURITY_WRAPPER_TYPE: &str = "legacySecurityWrapper";
const DATA_ACCESS_TYPE: &str = "dppDataAccess";
const CONFIGURATION_CHANGE_TYPE: &str = "configurationChange";
const DATA_MODIFICATION_TYPE: &str = "dppDataModification";

/// The canonical event unit sent to the ingestion endpoint.
///
/// Constructed fresh per domain event, held in memory only for the
/// duration of serialization and delivery, then discarded.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NormalizedEvent {
    /// Unique event identifier, generated fresh per event.
    pub id: Uuid,
    /// Schema version, always [`SPEC_VERSION`].
    pub specversion: u32,
    /// Composed source string `/{region}/{namespace}/{tenant}`.
    pub source: String,
    /// Event type discriminant; matches the payload key under `data.data`.
    #[serde(rename = "type")]
    pub event_type: String,
    /// Event creation timestamp, UTC.
    pub time: DateTime<Utc>,
    /// Metadata and type-keyed payload.
    pub data: EventData,
}

impl NormalizedEvent {
    /// Creates an event with a fresh id and timestamps for the payload.
    #[must_use]
    pub fn new(source: String, payload: EventPayload) -> Self {
        Self {
            id: Uuid::new_v4(),
            specversion: SPEC_VERSION,
            source,
            event_type: payload.type_name().to_owned(),
            time: Utc::now(),
            data: EventData {
                metadata: EventMetadata::now(),
                data: payload,
            },
        }
    }
}

/// Outer `data` object of a normalized event.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EventData {
    /// Static descriptive tags plus the event creation timestamp.
    pub metadata: EventMetadata,
    /// Payload keyed by the event type name.
    pub data: EventPayload,
}

/// Static descriptive tags plus an event-creation timestamp.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EventMetadata {
    /// Event creation timestamp, UTC.
    pub ts: DateTime<Utc>,
    /// Runtime description.
    pub infrastructure: InfrastructureTag,
    /// Platform description.
    pub platform: PlatformTag,
}

impl EventMetadata {
    /// Creates metadata stamped with the current instant.
    #[must_use]
    pub fn now() -> Self {
        Self {
            ts: Utc::now(),
            infrastructure: InfrastructureTag {
                other: RuntimeTag {
                    runtime_type: RUNTIME_TYPE.to_owned(),
                },
            },
            platform: PlatformTag {
                other: PlatformNameTag {
                    platform_name: PLATFORM_NAME.to_owned(),
                },
            },
        }
    }
}

/// Infrastructure metadata wrapper.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InfrastructureTag {
    /// Free-form infrastructure tags.
    pub other: RuntimeTag,
}

/// Runtime type tag.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RuntimeTag {
    /// Implementation runtime, e.g. `"Rust"`.
    pub runtime_type: String,
}

/// Platform metadata wrapper.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlatformTag {
    /// Free-form platform tags.
    pub other: PlatformNameTag,
}

/// Platform name tag.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PlatformNameTag {
    /// Hosting platform name.
    pub platform_name: String,
}

/// Type-specific payload under `data.data`, serialized as a single-entry
/// map keyed by the event type name.
///
/// Event names outside the four specific shapes round-trip through the
/// [`EventPayload::General`] variant.
#[derive(Debug, Clone, PartialEq)]
pub enum EventPayload {
    /// Wrapped legacy security event.
    SecurityWrapper(SecurityWrapperPayload),
    /// Personal-data access record.
    DataAccess(DataAccessPayload),
    /// Configuration change record.
    ConfigurationChange(ConfigurationChangePayload),
    /// Personal-data modification record.
    DataModification(DataModificationPayload),
    /// Passthrough payload for a generic event name.
    General {
        /// Event type name used as the payload key.
        name: String,
        /// Parsed payload object.
        value: Value,
    },
}

impl EventPayload {
    /// Returns the wire type name keying this payload.
    #[must_use]
    pub fn type_name(&self) -> &str {
        match self {
            Self::SecurityWrapper(_) => SECURITY_WRAPPER_TYPE,
            Self::DataAccess(_) => DATA_ACCESS_TYPE,
            Self::ConfigurationChange(_) => CONFIGURATION_CHANGE_TYPE,
            Self::DataModification(_) => DATA_MODIFICATION_TYPE,
            Self::General { name, .. } => name.as_str(),
        }
    }
}

impl Serialize for EventPayload {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        let mut map = serializer.serialize_map(Some(1))?;
        match self {
            Self::SecurityWrapper(payload) => {
                map.serialize_entry(SECURITY_WRAPPER_TYPE, payload)?;
            }
            Self::DataAccess(payload) => {
                map.serialize_entry(DATA_ACCESS_TYPE, payload)?;
            }
            Self::ConfigurationChange(payload) => {
                map.serialize_entry(CONFIGURATION_CHANGE_TYPE, payload)?;
            }
            Self::DataModification(payload) => {
                map.serialize_entry(DATA_MODIFICATION_TYPE, payload)?;
            }
            Self::General { name, value } => {
                map.serialize_entry(name, value)?;
            }
        }
        map.end()
    }
}

impl<'de> Deserialize<'de> for EventPayload {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let entries = serde_json::Map::<String, Value>::deserialize(deserializer)?;
        if entries.len() != 1 {
            return Err(de::Error::custom(
                "event payload must contain exactly one type-keyed entry",
            ));
        }
        let Some((name, value)) = entries.into_iter().next() else {
            return Err(de::Error::custom("event payload is empty"));
        };

        match name.as_str() {
            SECURITY_WRAPPER_TYPE => serde_json::from_value(value)
                .map(Self::SecurityWrapper)
                .map_err(de::Error::custom),
            DATA_ACCESS_TYPE => serde_json::from_value(value)
                .map(Self::DataAccess)
                .map_err(de::Error::custom),
            CONFIGURATION_CHANGE_TYPE => serde_json::from_value(value)
                .map(Self::ConfigurationChange)
                .map_err(de::Error::custom),
            DATA_MODIFICATION_TYPE => serde_json::from_value(value)
                .map(Self::DataModification)
                .map_err(de::Error::custom),
            _ => Ok(Self::General { name, value }),
        }
    }
}

/// Legacy security event wrapped as a JSON-encoded string.
///
/// The double encoding is intentional: the outer transport JSON carries an
/// inner JSON string under `origEvent`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SecurityWrapperPayload {
    /// Serialized original security event.
    pub orig_event: String,
}

/// One attribute (and optionally attachment) of a data-access record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DataAccessPayload {
    /// Access channel type; `"not specified"` when unknown.
    pub channel_type: String,
    /// Access channel identifier; `"not specified"` when unknown.
    pub channel_id: String,
    /// Data subject type, or the literal `"null"`.
    pub data_subject_type: String,
    /// Formatted data subject identifier, or the literal `"null"`.
    pub data_subject_id: String,
    /// Accessed object type, or the literal `"null"`.
    pub object_type: String,
    /// Formatted accessed object identifier.
    pub object_id: String,
    /// Accessed attribute name.
    pub attribute: String,
    /// Attachment type; omitted entirely when the access had none.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub attachment_type: Option<String>,
    /// Attachment identifier; omitted entirely when the access had none.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub attachment_id: Option<String>,
}

/// One changed attribute of a configuration change record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConfigurationChangePayload {
    /// Changed property name.
    pub property_name: String,
    /// New property value.
    pub new_value: String,
    /// Previous property value, or the literal `"null"`.
    pub old_value: String,
    /// Changed object type, or the literal `"null"`.
    pub object_type: String,
    /// Formatted changed object identifier.
    pub object_id: String,
}

/// One changed attribute of a data modification record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DataModificationPayload {
    /// Changed attribute name.
    pub attribute: String,
    /// New attribute value.
    pub new_value: String,
    /// Previous attribute value, or the literal `"null"`.
    pub old_value: String,
    /// Modified object type, or the literal `"null"`.
    pub object_type: String,
    /// Formatted modified object identifier.
    pub object_id: String,
    /// Data subject type, or the literal `"null"`.
    pub data_subject_type: String,
    /// Formatted data subject identifier, or the literal `"null"`.
    pub data_subject_id: String,
}
