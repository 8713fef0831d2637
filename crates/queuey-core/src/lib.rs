//! Pure domain crate: message ids, the queue/application/message model,
//! the storage and metadata port traits, principal/ACL assembly,
//! request-payload validation, and the engine that ties them together.
//! No backend driver, no HTTP framework, those live in `queuey-memory`,
//! `queuey-scylla` and `queuey-server`.

pub mod engine;
pub mod error;
pub mod model;
pub mod ports;
pub mod principal;
pub mod timeuuid;
pub mod validation;

pub use engine::{PolicyConfig, QueueEngine};
pub use error::QueueyError;
pub use model::{
    ConsistencyTier, MessageRecord, Order, PartitionedId, QueueAttrs, QueueAttrsPatch, QueueType,
};
pub use principal::{Acl, Permission, Principal};
pub use timeuuid::TimeUuid;
