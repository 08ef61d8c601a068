//! HTTP service that turns JSON payloads into Oracle SQL and forwards the
//! result to downstream services chosen by pattern-matched routing tables.

pub mod config;
pub mod error;
pub mod forwarding;
pub mod handlers;
pub mod middleware;
pub mod observability;
pub mod server;

pub use config::AppConfig;
pub use error::ApiError;
pub use server::{AppState, ServerBuilder, SqlGateServer, build_app, build_router};
