//! Library surface for the image dispatch service.
//!
//! Exists so integration tests can build the axum `Router` and `AppState`
//! directly and drive them in-process with `tower::ServiceExt::oneshot`,
//! rather than spawning a subprocess for every request/response assertion.

pub mod app_state;
pub mod artifact;
pub mod config;
pub mod error;
pub mod logging;
pub mod server;
pub mod storage;
