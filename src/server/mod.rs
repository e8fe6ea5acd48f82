//! HTTP surface for the image dispatch service.

pub mod http_api;
pub mod server;

pub use server::run_server;
