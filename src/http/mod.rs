//! HTTP transport module.
//!
//! Exposes the admission controller over HTTP: every inbound request is
//! checked against the client's window before routing, and every decision
//! is audited.

mod handlers;
mod server;

pub use handlers::AppState;
pub use server::HttpServer;
