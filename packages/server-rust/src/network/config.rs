//! Network configuration types for the tenantscope server.

use std::time::Duration;

/// Top-level network configuration for the server.
#[derive(Debug, Clone)]
pub struct NetworkConfig {
    /// Bind address for the server.
    pub host: String,
    /// Port to listen on. 0 means OS-assigned.
    pub port: u16,
    /// Maximum time to wait for a request to complete.
    pub request_timeout: Duration,
    /// Shared secret required in `x-admin-token` on admin routes. `None`
    /// leaves admin routes open (development only).
    pub admin_token: Option<String>,
    /// HS256 secret for bearer tokens. `None` disables claim extraction, so
    /// only the tenant header can establish a context.
    pub jwt_secret: Option<String>,
}

impl Default for NetworkConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 0,
            request_timeout: Duration::from_secs(30),
            admin_token: None,
            jwt_secret: None,
        }
    }
}
