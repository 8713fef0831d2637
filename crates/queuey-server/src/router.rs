//! Router construction: the three-tier URL surface from §4.G/§6 —
//! application, queue, and message-batch — each mapped to method
//! dispatch on one resource.

use axum::routing::get;
use axum::Router;
use tower_http::trace::TraceLayer;

use crate::handlers;
use crate::state::AppState;

pub fn build_router(state: AppState) -> Router {
    Router::new()
        .route(
            "/v1/:application",
            get(handlers::application::list_queues).post(handlers::application::create_queue),
        )
        .route(
            "/v1/:application/:queue",
            get(handlers::queue::get_messages)
                .post(handlers::queue::push)
                .put(handlers::queue::update_queue)
                .delete(handlers::queue::delete_queue),
        )
        .route(
            "/v1/:application/:queue/:ids",
            get(handlers::messages::get_batch)
                .put(handlers::messages::update_batch)
                .delete(handlers::messages::delete_batch),
        )
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
