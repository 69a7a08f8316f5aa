/// Configuration for the scoped operation pipeline.
#[derive(Debug, Clone)]
pub struct ScopeConfig {
    /// Upper bound on a single persistence operation, in milliseconds.
    pub operation_timeout_ms: u64,
}

impl Default for ScopeConfig {
    fn default() -> Self {
        Self {
            operation_timeout_ms: 30_000,
        }
    }
}
