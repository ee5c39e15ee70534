//! HTTP surface of the caching service.
//!
//! Free handler functions in `routes` keep the request/response mapping in
//! one place; `server` owns the socket and graceful shutdown.

pub mod routes;
pub mod server;
pub mod types;

pub use routes::AppState;
pub use server::ApiServer;
