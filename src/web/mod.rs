//! Web/API layer: server-rendered UI plus the JSON REST API.

pub mod api;
pub mod auth;
pub mod server;
pub mod templates;

pub use server::{AppState, build_router, start_server};
