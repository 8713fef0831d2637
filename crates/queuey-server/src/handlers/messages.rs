//! `/v1/<application>/<queue>/<ids>` — point lookups, in-place body
//! updates, and deletes over an explicit batch of message ids (§6).
//! `<ids>` is a comma-joined list of `[<partition>:]<32-hex>` tokens.

use std::collections::BTreeMap;

use axum::body::Bytes;
use axum::extract::{Path, State};
use axum::http::HeaderMap;
use axum::Json;
use serde_json::{json, Value};

use queuey_core::model::PartitionedId;
use queuey_core::{validation, QueueyError};

use crate::error::AppError;
use crate::handlers::common::{message_json, principals};
use crate::state::AppState;

pub async fn get_batch(
    State(state): State<AppState>,
    Path((application, queue, ids)): Path<(String, String, String)>,
    headers: HeaderMap,
) -> Result<Json<Value>, AppError> {
    let principals = principals(&headers, &state)?;
    let targets = validation::parse_message_id_batch(&ids)?;

    let mut messages = Vec::with_capacity(targets.len());
    for id in targets {
        if let Some(record) = state.engine.get_message(&application, &queue, &principals, id, true).await? {
            messages.push(message_json(&record));
        }
    }
    Ok(Json(json!({"status": "ok", "messages": messages})))
}

pub async fn update_batch(
    State(state): State<AppState>,
    Path((application, queue, ids)): Path<(String, String, String)>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<Json<Value>, AppError> {
    let principals = principals(&headers, &state)?;
    let targets = validation::parse_message_id_batch(&ids)?;
    validation::validate_body_nonempty(&body)?;

    let partition = single_partition(&targets)?;
    for target in &targets {
        state
            .engine
            .push(
                &application,
                &queue,
                &principals,
                Some(partition),
                body.to_vec(),
                BTreeMap::new(),
                validation::DEFAULT_TTL,
                Some(target.message_id),
                None,
            )
            .await?;
    }
    Ok(Json(json!({"status": "ok"})))
}

pub async fn delete_batch(
    State(state): State<AppState>,
    Path((application, queue, ids)): Path<(String, String, String)>,
    headers: HeaderMap,
) -> Result<Json<Value>, AppError> {
    let principals = principals(&headers, &state)?;
    let targets = validation::parse_message_id_batch(&ids)?;
    state.engine.delete_messages(&application, &queue, &principals, targets).await?;
    Ok(Json(json!({"status": "ok"})))
}

/// A message-batch update must target a single partition; mixing
/// partition-qualified tokens in one PUT is `invalid-update` (§7).
fn single_partition(targets: &[PartitionedId]) -> Result<u32, QueueyError> {
    let mut partitions = targets.iter().map(|t| t.partition);
    let first = partitions
        .next()
        .ok_or_else(|| QueueyError::InvalidParameter("message id batch must not be empty".to_string()))?;
    if partitions.any(|p| p != first) {
        return Err(QueueyError::InvalidUpdate(
            "message batch update must target a single partition".to_string(),
        ));
    }
    Ok(first)
}
