//! Axum HTTP server: routing, handlers, and middleware.
//!
//! # Responsibilities
//! - Define the Axum router with all routes and shared middleware.
//! - Stream uploads through the encryptor and downloads through the
//!   streaming decrypt stage.
//! - Inject shared application state (`AppState`) into handlers.

pub mod handlers;
pub mod middleware;
pub mod router;
pub mod state;
