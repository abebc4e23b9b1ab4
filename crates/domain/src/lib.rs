//! Domain model: normalized event envelope, payload variants, and the
//! domain-event input shapes supplied by the host dispatcher.

#![forbid(unsafe_code)]

mod envelope;
mod event;
mod identifier;

pub use envelope::{
    ConfigurationChangePayload, DataAccessPayload, DataModificationPayload, EventData,
    EventMetadata, EventPayload, InfrastructureTag, NormalizedEvent, PLATFORM_NAME,
    PlatformNameTag, PlatformTag, RUNTIME_TYPE, RuntimeTag, SPEC_VERSION, SecurityWrapperPayload,
};
pub use event::{
    Access, AccessAttribute, ActorContext, Attachment, ChangedAttribute, ConfigChange,
    ConfigChangeLog, DataAccessLog, DataModification, DataModificationLog, DataObject, DataSubject,
    SecurityLog,
};
pub use identifier::{KeyValuePair, format_identifier_pairs};
