//! HTTP transport for admission checks.

mod server;
mod service;

pub use server::HttpServer;
pub use service::{router, CheckRequest};
