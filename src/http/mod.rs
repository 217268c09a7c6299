//! HTTP surface: routes, handlers, and server lifecycle.

mod handlers;
mod server;

pub use handlers::{AppState, TravelQueryRequest};
pub use server::HttpServer;
