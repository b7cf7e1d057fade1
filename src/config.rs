use std::time::Duration;

/// Application-level constants
pub const APP_NAME: &str = "FirstLine";
pub const APP_VERSION: &str = env!("CARGO_PKG_VERSION");

/// Default tracing filter when RUST_LOG is not set.
pub fn default_log_filter() -> &'static str {
    "info,firstline_triage=debug"
}

/// Default disclaimer attached to any result that arrives without one.
pub const DEFAULT_DISCLAIMER: &str =
    "This is not a diagnosis. Seek professional medical care.";

/// Retention window for persisted entities: 90 days, whole seconds.
pub const RETENTION_SECONDS: i64 = 90 * 86_400;

/// Operating mode for the triage pipeline.
///
/// `Mock` replaces the classifier stages with a deterministic keyword
/// heuristic and never touches the AI provider. Selected only here, at
/// construction time; nothing in the pipeline reads the environment.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TriageMode {
    Production,
    Mock,
}

/// Explicit configuration injected into the orchestrator.
#[derive(Debug, Clone)]
pub struct TriageConfig {
    pub mode: TriageMode,
    /// Upper bound on each AI provider call. Timeout is treated as failure.
    pub ai_timeout: Duration,
    /// Base delay for storage retry backoff (delay = base * 2^attempt).
    pub storage_retry_base: Duration,
}

impl Default for TriageConfig {
    fn default() -> Self {
        Self {
            mode: TriageMode::Production,
            ai_timeout: Duration::from_secs(30),
            storage_retry_base: Duration::from_millis(200),
        }
    }
}

impl TriageConfig {
    pub fn mock() -> Self {
        Self {
            mode: TriageMode::Mock,
            ..Self::default()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_is_production() {
        let config = TriageConfig::default();
        assert_eq!(config.mode, TriageMode::Production);
    }

    #[test]
    fn mock_config_keeps_timeouts() {
        let config = TriageConfig::mock();
        assert_eq!(config.mode, TriageMode::Mock);
        assert_eq!(config.ai_timeout, TriageConfig::default().ai_timeout);
    }

    #[test]
    fn retention_is_ninety_days() {
        assert_eq!(RETENTION_SECONDS, 7_776_000);
    }
}
