//! `/v1/<application>/<queue>` — GET reads a range of messages, POST
//! pushes (single body or a JSON batch), PUT updates attributes, DELETE
//! truncates and deregisters the queue (§6).

use std::collections::BTreeMap;

use axum::body::Bytes;
use axum::extract::{Path, Query, State};
use axum::http::{header, HeaderMap, StatusCode};
use axum::{Form, Json};
use serde::Deserialize;
use serde_json::{json, Value};

use queuey_core::model::Order;
use queuey_core::{validation, QueueyError};

use crate::error::AppError;
use crate::handlers::common::{message_json, now_decimal, patch_from_form, principals, validate_ttl_bound, QueueForm};
use crate::state::AppState;

#[derive(Debug, Deserialize)]
pub struct GetMessagesQuery {
    since: Option<String>,
    limit: Option<String>,
    order: Option<String>,
    partitions: Option<String>,
}

const DEFAULT_MESSAGE_LIMIT: u32 = 100;

pub async fn get_messages(
    State(state): State<AppState>,
    Path((application, queue)): Path<(String, String)>,
    headers: HeaderMap,
    Query(query): Query<GetMessagesQuery>,
) -> Result<Json<Value>, AppError> {
    let principals = principals(&headers, &state)?;

    let since = query.since.as_deref().map(validation::parse_since).transpose()?;
    // Default order is `descending` for a plain read, `ascending` once a
    // `since` cursor anchors the scan (§9 open-question decision #4).
    let default_order = if query.since.is_some() { Order::Ascending } else { Order::Descending };
    let order = validation::parse_order(query.order.as_deref(), default_order)?;
    let limit = validation::parse_limit(query.limit.as_deref(), DEFAULT_MESSAGE_LIMIT)?;
    let partitions_list = match &query.partitions {
        Some(csv) => validation::parse_partitions_csv(csv)?,
        None => vec![1],
    };

    let records = state
        .engine
        .get_messages(&application, &queue, &principals, partitions_list, Some(limit), since, order, true)
        .await?;

    let messages: Vec<Value> = records.iter().map(message_json).collect();
    Ok(Json(json!({"status": "ok", "messages": messages})))
}

#[derive(Debug, Deserialize)]
struct JsonMessageItem {
    body: String,
    partition: Option<u32>,
    ttl: Option<u32>,
}

#[derive(Debug, Deserialize)]
struct JsonPushBody {
    messages: Vec<JsonMessageItem>,
}

pub async fn push(
    State(state): State<AppState>,
    Path((application, queue)): Path<(String, String)>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<(StatusCode, Json<Value>), AppError> {
    let principals = principals(&headers, &state)?;
    let is_json = headers
        .get(header::CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .map(|ct| ct.starts_with("application/json"))
        .unwrap_or(false);

    if is_json {
        let parsed: JsonPushBody = serde_json::from_slice(&body)
            .map_err(|e| QueueyError::InvalidParameter(format!("invalid JSON body: {e}")))?;
        let mut items = Vec::with_capacity(parsed.messages.len());
        for m in parsed.messages {
            let ttl = match m.ttl {
                Some(t) => validate_ttl_bound(t)?,
                None => validation::DEFAULT_TTL,
            };
            items.push((m.partition, m.body.into_bytes(), BTreeMap::new(), ttl));
        }
        let results = state.engine.push_batch(&application, &queue, &principals, items).await?;
        let messages: Vec<Value> = results
            .into_iter()
            .map(|(r, partition)| {
                json!({
                    "key": r.message_id.to_hex(),
                    "timestamp": r.timestamp.to_string(),
                    "partition": partition,
                })
            })
            .collect();
        Ok((StatusCode::CREATED, Json(json!({"status": "ok", "messages": messages}))))
    } else {
        validation::validate_body_nonempty(&body)?;
        let ttl = match header_str(&headers, "x-ttl") {
            Some(raw) => validation::parse_ttl(Some(raw))?,
            None => validation::DEFAULT_TTL,
        };
        let partition = match header_str(&headers, "x-partition") {
            Some(raw) => Some(validation::coerce_u32(raw, "partition")?),
            None => None,
        };
        let (result, partition) = state
            .engine
            .push(&application, &queue, &principals, partition, body.to_vec(), BTreeMap::new(), ttl, None, None)
            .await?;
        Ok((
            StatusCode::CREATED,
            Json(json!({
                "status": "ok",
                "messages": [{
                    "key": result.message_id.to_hex(),
                    "timestamp": result.timestamp.to_string(),
                    "partition": partition,
                }],
            })),
        ))
    }
}

pub async fn update_queue(
    State(state): State<AppState>,
    Path((application, queue)): Path<(String, String)>,
    headers: HeaderMap,
    Form(form): Form<QueueForm>,
) -> Result<Json<Value>, AppError> {
    let principals = principals(&headers, &state)?;
    if !queuey_core::engine::can_administer_application(&principals, &application) {
        return Err(QueueyError::AccessDenied(format!("no grant to update {application}/{queue}")).into());
    }

    let patch = patch_from_form(&form, None)?;
    let attrs = state.engine.register_queue(&application, &queue, patch, now_decimal()).await?;

    Ok(Json(json!({
        "status": "ok",
        "queue_name": attrs.queue_name,
        "partitions": attrs.partitions,
        "created": attrs.created.to_string(),
        "principals": attrs.principals,
        "type": attrs.queue_type.as_str(),
    })))
}

pub async fn delete_queue(
    State(state): State<AppState>,
    Path((application, queue)): Path<(String, String)>,
    headers: HeaderMap,
) -> Result<Json<Value>, AppError> {
    let principals = principals(&headers, &state)?;
    state.engine.remove_queue(&application, &queue, &principals).await?;
    Ok(Json(json!({"status": "ok"})))
}

fn header_str<'a>(headers: &'a HeaderMap, name: &str) -> Option<&'a str> {
    headers.get(name).and_then(|v| v.to_str().ok())
}
