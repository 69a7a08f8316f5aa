//! HTTP adapter: configuration, the tenant boundary middleware, handlers and
//! the server lifecycle.

pub mod config;
pub mod error;
pub mod handlers;
pub mod middleware;
pub mod module;

pub use config::*;
pub use error::ApiError;
pub use handlers::AppState;
pub use module::NetworkModule;
