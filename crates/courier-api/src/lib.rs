//! # courier-api
//!
//! HTTP layer for Courier built on Axum.
//!
//! Hosts the WebSocket endpoint that drives the presence registry and the
//! relay, plus health and presence endpoints, middleware (CORS, logging),
//! DTOs, and error mapping.

pub mod dto;
pub mod error;
pub mod handlers;
pub mod middleware;
pub mod router;
pub mod state;

pub use router::build_router;
pub use state::AppState;
