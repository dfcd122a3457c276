use std::fmt;
use std::time::Duration;

/// The kind of statement being executed, detected from its text.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StatementKind {
    Select,
    Insert,
    Update,
    Delete,
    Truncate,
    /// DDL and anything else.
    Other,
}

impl StatementKind {
    /// Detect the statement kind from SQL text.
    ///
    /// Leading comments and parentheses are skipped. For `WITH ...` the
    /// keyword after the last top-level CTE body decides.
    pub fn from_sql(sql: &str) -> Self {
        use crate::sql::{starts_with_keyword, strip_sql_prefix};

        let trimmed = strip_sql_prefix(sql);
        if starts_with_keyword(trimmed, "WITH") {
            return Self::detect_cte_dml(trimmed);
        }
        Self::from_keyword(trimmed).unwrap_or(Self::Other)
    }

    fn from_keyword(sql: &str) -> Option<Self> {
        use crate::sql::starts_with_keyword;

        [
            ("SELECT", Self::Select),
            ("INSERT", Self::Insert),
            ("UPDATE", Self::Update),
            ("DELETE", Self::Delete),
            ("TRUNCATE", Self::Truncate),
        ]
        .into_iter()
        .find(|(kw, _)| starts_with_keyword(sql, kw))
        .map(|(_, kind)| kind)
    }

    fn detect_cte_dml(sql: &str) -> Self {
        let mut depth: i32 = 0;
        let mut last_top_level = 0;
        let bytes = sql.as_bytes();
        let mut i = 0;
        while i < bytes.len() {
            match bytes[i] {
                b'(' => depth += 1,
                b')' => {
                    depth -= 1;
                    if depth == 0 {
                        last_top_level = i + 1;
                    }
                }
                b'\'' => {
                    i += 1;
                    while i < bytes.len() {
                        if bytes[i] == b'\'' {
                            if i + 1 < bytes.len() && bytes[i + 1] == b'\'' {
                                i += 1;
                            } else {
                                break;
                            }
                        }
                        i += 1;
                    }
                }
                _ => {}
            }
            i += 1;
        }

        match Self::from_keyword(sql[last_top_level..].trim_start()) {
            Some(Self::Truncate) | None => Self::Select,
            Some(kind) => kind,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Select => "SELECT",
            Self::Insert => "INSERT",
            Self::Update => "UPDATE",
            Self::Delete => "DELETE",
            Self::Truncate => "TRUNCATE",
            Self::Other => "OTHER",
        }
    }
}

impl fmt::Display for StatementKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// What is known about a statement before it runs.
#[derive(Debug, Clone)]
pub struct QueryContext {
    pub sql: String,
    pub param_count: usize,
    pub kind: StatementKind,
    pub tag: Option<String>,
}

impl QueryContext {
    pub fn new(sql: &str, param_count: usize) -> Self {
        Self {
            sql: sql.to_string(),
            param_count,
            kind: StatementKind::from_sql(sql),
            tag: None,
        }
    }

    pub fn with_tag(mut self, tag: impl Into<String>) -> Self {
        self.tag = Some(tag.into());
        self
    }
}

const MAX_ERROR_LEN: usize = 512;

/// Outcome of a statement, for monitoring.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum QueryOutcome {
    Rows(usize),
    Affected(u64),
    /// Single-row fetch: whether a row came back.
    OptionalRow(bool),
    TimedOut(Duration),
    /// Error message, truncated to 512 bytes.
    Error(String),
}

impl QueryOutcome {
    pub fn error(msg: String) -> Self {
        if msg.len() <= MAX_ERROR_LEN {
            return Self::Error(msg);
        }
        Self::Error(format!("{}...", super::truncate_sql_bytes(&msg, MAX_ERROR_LEN)))
    }

    pub fn is_error(&self) -> bool {
        matches!(self, Self::TimedOut(_) | Self::Error(_))
    }
}

impl fmt::Display for QueryOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Rows(n) => write!(f, "{n} rows"),
            Self::Affected(n) => write!(f, "{n} affected"),
            Self::OptionalRow(found) => f.write_str(if *found { "1 row" } else { "0 rows" }),
            Self::TimedOut(d) => write!(f, "timeout after {d:?}"),
            Self::Error(e) => write!(f, "error: {e}"),
        }
    }
}

/// Receives execution events from an [`InstrumentedClient`](super::InstrumentedClient).
pub trait QueryMonitor: Send + Sync {
    fn on_query_start(&self, _ctx: &QueryContext) {}

    fn on_query_complete(&self, ctx: &QueryContext, duration: Duration, outcome: &QueryOutcome);

    fn on_slow_query(&self, _ctx: &QueryContext, _duration: Duration) {}
}
