//! `/v1/<application>` — GET lists queues, POST creates one (§6).

use axum::extract::{Path, Query, State};
use axum::http::{HeaderMap, StatusCode};
use axum::{Form, Json};
use serde::Deserialize;
use serde_json::{json, Value};
use uuid::Uuid;

use queuey_core::engine::can_administer_application;
use queuey_core::QueueyError;

use crate::error::AppError;
use crate::handlers::common::{now_decimal, patch_from_form, principals, QueueForm};
use crate::state::AppState;

#[derive(Debug, Deserialize)]
pub struct ListQueuesQuery {
    limit: Option<String>,
    offset: Option<String>,
    include_count: Option<String>,
    details: Option<String>,
}

const DEFAULT_QUEUE_LIST_LIMIT: u32 = 100;

pub async fn list_queues(
    State(state): State<AppState>,
    Path(application): Path<String>,
    headers: HeaderMap,
    Query(query): Query<ListQueuesQuery>,
) -> Result<Json<Value>, AppError> {
    let principals = principals(&headers, &state)?;
    if !can_administer_application(&principals, &application) {
        return Err(QueueyError::AccessDenied(format!("no grant to list queues for {application}")).into());
    }

    let limit = queuey_core::validation::parse_limit(query.limit.as_deref(), DEFAULT_QUEUE_LIST_LIMIT)?;
    let names = state.engine.queue_list(&application, limit, query.offset).await?;

    // Plain `GET /` returns bare names; `details=true` resolves each one
    // to its full attribute set via `queue_information` (§4.C multi-get).
    let queues = if query.details.as_deref() == Some("true") {
        let attrs = state.engine.queue_information(&application, &names).await?;
        json!(attrs
            .into_iter()
            .zip(names.iter())
            .map(|(attrs, name)| match attrs {
                Some(a) => json!({
                    "queue_name": a.queue_name,
                    "partitions": a.partitions,
                    "type": a.queue_type.as_str(),
                    "consistency": a.consistency.as_str(),
                    "principals": a.principals,
                    "created": a.created.to_string(),
                }),
                None => json!({"queue_name": name}),
            })
            .collect::<Vec<_>>())
    } else {
        json!(names)
    };

    let mut body = json!({"status": "ok", "queues": queues});
    if query.include_count.as_deref() == Some("true") {
        let count = state.engine.queue_count(&application).await?;
        body["queue_count"] = json!(count);
    }
    Ok(Json(body))
}

pub async fn create_queue(
    State(state): State<AppState>,
    Path(application): Path<String>,
    headers: HeaderMap,
    Form(form): Form<QueueForm>,
) -> Result<(StatusCode, Json<Value>), AppError> {
    let principals = principals(&headers, &state)?;
    if !can_administer_application(&principals, &application) {
        return Err(QueueyError::AccessDenied(format!("no grant to create queues for {application}")).into());
    }

    let queue_name = form.queue_name.clone().filter(|s| !s.is_empty()).unwrap_or_else(fresh_queue_name);
    let patch = patch_from_form(&form, Some(1))?;
    let attrs = state
        .engine
        .register_queue(&application, &queue_name, patch, now_decimal())
        .await?;

    Ok((
        StatusCode::CREATED,
        Json(json!({
            "status": "ok",
            "queue_name": attrs.queue_name,
            "partitions": attrs.partitions,
            "type": attrs.queue_type.as_str(),
            "consistency": attrs.consistency.as_str(),
            "principals": attrs.principals,
        })),
    ))
}

/// A fresh queue name: 32-char lowercase hex, a uuid4 with its dashes
/// stripped (the default when `queue_name` is omitted on create).
fn fresh_queue_name() -> String {
    Uuid::new_v4().simple().to_string()
}
