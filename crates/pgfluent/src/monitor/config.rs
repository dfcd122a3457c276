use std::time::Duration;

pub(crate) const DEFAULT_MAX_SQL_LENGTH: usize = 1024;

/// Configuration for [`InstrumentedClient`](super::InstrumentedClient).
///
/// Defaults: no timeout, no slow-query threshold, SQL logging on and
/// truncated to 1024 bytes.
#[derive(Debug, Clone)]
pub struct MonitorConfig {
    /// `None` means no timeout.
    pub query_timeout: Option<Duration>,
    pub slow_query_threshold: Option<Duration>,
    /// Longest SQL prefix, in bytes, written to logs.
    pub max_sql_length: usize,
    pub logging_enabled: bool,
}

impl Default for MonitorConfig {
    fn default() -> Self {
        Self {
            query_timeout: None,
            slow_query_threshold: None,
            max_sql_length: DEFAULT_MAX_SQL_LENGTH,
            logging_enabled: true,
        }
    }
}

impl MonitorConfig {
    pub fn new() -> Self {
        Self::default()
    }

    /// Statements running longer are cancelled and fail with
    /// [`FluentError::Timeout`](crate::FluentError::Timeout).
    pub fn with_query_timeout(mut self, timeout: Duration) -> Self {
        self.query_timeout = Some(timeout);
        self
    }

    /// Statements running longer are reported as slow.
    pub fn with_slow_query_threshold(mut self, threshold: Duration) -> Self {
        self.slow_query_threshold = Some(threshold);
        self
    }

    pub fn with_max_sql_length(mut self, max_bytes: usize) -> Self {
        self.max_sql_length = max_bytes;
        self
    }

    pub fn enable_logging(mut self) -> Self {
        self.logging_enabled = true;
        self
    }

    pub fn disable_logging(mut self) -> Self {
        self.logging_enabled = false;
        self
    }
}
