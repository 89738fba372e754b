//! Gatekeeper - Per-Client Request Admission Control
//!
//! This crate implements an HTTP-fronted admission controller: each
//! inbound request is checked against the originating client's trailing
//! request window, rejected with 429 once the configured limit is hit,
//! and recorded in an append-only audit log either way.

pub mod admission;
pub mod audit;
pub mod config;
pub mod error;
pub mod http;
pub mod metrics;
