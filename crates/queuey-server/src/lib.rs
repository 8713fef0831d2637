//! queuey-server — the HTTP surface: axum router, application-key auth
//! middleware, request handlers, and the JSON error envelope. Wires one
//! of `queuey-memory`/`queuey-scylla` in from environment configuration;
//! nothing in this crate knows which backend is active beyond `Config`.

pub mod auth;
pub mod config;
pub mod error;
pub mod handlers;
pub mod router;
pub mod state;
