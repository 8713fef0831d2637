//! Helpers shared by the application/queue/message handlers: header
//! extraction, the create/update queue form, and message-record JSON
//! rendering.

use axum::http::HeaderMap;
use rust_decimal::Decimal;
use serde::Deserialize;
use serde_json::{json, Value};

use queuey_core::model::{ConsistencyTier, MessageRecord, QueueAttrsPatch, QueueType};
use queuey_core::{validation, QueueyError};

use crate::auth::principals_from_header;
use crate::state::AppState;

pub fn authorization_header(headers: &HeaderMap) -> Option<&str> {
    headers.get(axum::http::header::AUTHORIZATION).and_then(|v| v.to_str().ok())
}

pub fn principals(headers: &HeaderMap, state: &AppState) -> Result<Vec<queuey_core::Principal>, QueueyError> {
    principals_from_header(authorization_header(headers), &state.app_keys)
}

/// Decimal seconds since the Unix epoch, `created`'s type and the
/// timestamp a queue's `created` attribute is stamped with on first
/// registration. 100-ns precision is only load-bearing for message ids;
/// queue creation times tolerate float-derived seconds.
pub fn now_decimal() -> Decimal {
    let dur = std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .unwrap_or_default();
    Decimal::new(dur.as_secs() as i64, 0) + Decimal::new(dur.subsec_millis() as i64, 3)
}

/// `POST /v1/<app>` and `PUT /v1/<app>/<q>` share this field set; all
/// coming in as form strings so the engine's integer/CSV coercions apply.
#[derive(Debug, Default, Deserialize)]
pub struct QueueForm {
    pub queue_name: Option<String>,
    pub partitions: Option<String>,
    #[serde(rename = "type")]
    pub queue_type: Option<String>,
    pub consistency: Option<String>,
    pub principals: Option<String>,
}

/// Build a patch from a `QueueForm`. `default_partitions` fills in the
/// create-time default (1) when the field is absent; pass `None` on
/// update so an absent `partitions` field leaves the attribute untouched.
pub fn patch_from_form(form: &QueueForm, default_partitions: Option<u32>) -> Result<QueueAttrsPatch, QueueyError> {
    let mut patch = QueueAttrsPatch::default();

    patch.partitions = match (&form.partitions, default_partitions) {
        (Some(raw), _) => Some(validation::parse_partitions_count(Some(raw), 1)?),
        (None, default) => default,
    };
    if let Some(t) = &form.queue_type {
        patch.queue_type =
            Some(QueueType::parse(t).ok_or_else(|| QueueyError::InvalidParameter(format!("invalid type: {t}")))?);
    }
    if let Some(c) = &form.consistency {
        patch.consistency = Some(
            ConsistencyTier::parse(c)
                .ok_or_else(|| QueueyError::InvalidParameter(format!("invalid consistency: {c}")))?,
        );
    }
    if let Some(p) = &form.principals {
        if !p.trim().is_empty() {
            patch.principals = Some(validation::parse_principals_csv(p)?);
        }
    }
    Ok(patch)
}

/// Bodies are opaque bytes at rest; the wire format renders them as a
/// JSON string, a lossy UTF-8 decode for payloads that aren't valid text.
pub fn message_json(record: &MessageRecord) -> Value {
    json!({
        "message_id": record.message_id.to_hex(),
        "timestamp": record.timestamp.to_string(),
        "body": String::from_utf8_lossy(&record.body),
        "partition": record.partition,
        "metadata": record.metadata,
    })
}

pub fn validate_ttl_bound(ttl: u32) -> Result<u32, QueueyError> {
    if !(validation::MIN_TTL..=validation::MAX_TTL).contains(&ttl) {
        return Err(QueueyError::InvalidParameter(format!(
            "ttl must be between {} and {}",
            validation::MIN_TTL,
            validation::MAX_TTL
        )));
    }
    Ok(ttl)
}
