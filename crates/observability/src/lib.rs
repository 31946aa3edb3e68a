//! Tracing and logging setup shared by every binary and test harness that
//! embeds the costing engine.

use serde::Deserialize;

/// Initialize process-wide tracing from `config`.
///
/// Safe to call multiple times; subsequent calls become no-ops.
pub fn init(config: &ObservabilityConfig) {
    tracing::init(config);
}

/// Tracing configuration (filters, layers).
pub mod tracing;

/// Log filter and output format.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct ObservabilityConfig {
    /// `EnvFilter` directive used when `RUST_LOG` is not set.
    pub filter: String,
    /// Emit JSON lines instead of human-readable output.
    pub json: bool,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            filter: "info".to_string(),
            json: true,
        }
    }
}
