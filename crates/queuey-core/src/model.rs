//! Data model: application → queue → partition → message.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::timeuuid::TimeUuid;

/// `consistency` tier selecting a (CL, delay) pair the engine's policy
/// table resolves per request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConsistencyTier {
    Weak,
    Strong,
    VeryStrong,
}

impl ConsistencyTier {
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "weak" => Some(Self::Weak),
            "strong" => Some(Self::Strong),
            "very_strong" => Some(Self::VeryStrong),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Weak => "weak",
            Self::Strong => "strong",
            Self::VeryStrong => "very_strong",
        }
    }
}

impl Default for ConsistencyTier {
    fn default() -> Self {
        Self::Weak
    }
}

/// `type` attribute: `public` grants read to everyone.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum QueueType {
    User,
    Public,
}

impl QueueType {
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "user" => Some(Self::User),
            "public" => Some(Self::Public),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::User => "user",
            Self::Public => "public",
        }
    }
}

impl Default for QueueType {
    fn default() -> Self {
        Self::User
    }
}

/// A principal grant recorded on a queue, `app:<name>` or `bid:<local>@<domain>`.
/// Distinct from the *authenticated* `Principal` the auth layer derives per
/// request (`crate::principal::Principal`); this is the stored string form.
pub type PrincipalGrant = String;

/// Mutable queue attributes. `queue_name`/`application`/`created` are
/// immutable once registered; everything else can be updated subject to
/// the engine's monotonicity and no-clobber rules.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QueueAttrs {
    pub queue_name: String,
    pub application: String,
    pub partitions: u32,
    #[serde(rename = "type")]
    pub queue_type: QueueType,
    pub consistency: ConsistencyTier,
    pub principals: Vec<PrincipalGrant>,
    pub created: Decimal,
}

impl QueueAttrs {
    pub fn new(application: impl Into<String>, queue_name: impl Into<String>, created: Decimal) -> Self {
        Self {
            queue_name: queue_name.into(),
            application: application.into(),
            partitions: 1,
            queue_type: QueueType::default(),
            consistency: ConsistencyTier::default(),
            principals: Vec::new(),
            created,
        }
    }
}

/// A subset of `QueueAttrs` supplied on create/update.
/// Absent fields are left untouched on update, never clobbered.
#[derive(Debug, Clone, Default)]
pub struct QueueAttrsPatch {
    pub queue_name: Option<String>,
    pub partitions: Option<u32>,
    pub queue_type: Option<QueueType>,
    pub consistency: Option<ConsistencyTier>,
    pub principals: Option<Vec<PrincipalGrant>>,
}

/// A stored message as returned to callers.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MessageRecord {
    pub message_id: TimeUuid,
    pub timestamp: Decimal,
    pub body: Vec<u8>,
    pub metadata: std::collections::BTreeMap<String, String>,
    /// The `<queue>:<partition>` tail, not the bare queue name.
    pub queue_name: String,
    pub partition: u32,
}

/// Ascending/descending traversal order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Order {
    Ascending,
    Descending,
}

impl Order {
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "ascending" => Some(Self::Ascending),
            "descending" => Some(Self::Descending),
            _ => None,
        }
    }
}

/// A message id paired with the partition it was addressed to, the
/// external key clients use to address a single message. Message-id
/// tokens on the wire are `[<partition>:]<32-hex>`; a bare token implies
/// partition 1.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub struct PartitionedId {
    pub partition: u32,
    pub message_id: TimeUuid,
}
