//! Error types for pgfluent

use crate::value::Value;
use thiserror::Error;

/// Result type alias for pgfluent operations
pub type FluentResult<T> = Result<T, FluentError>;

/// Broad classification of a [`FluentError`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// Builder structure is invalid; raised at the mutating call.
    Structural,
    /// Builder state cannot be compiled; raised by `compile()`.
    Compilation,
    /// API misuse.
    Usage,
    /// `?` markers and parameters disagree.
    Placeholder,
    /// Connection, execution or decoding failure.
    Driver,
}

/// Error types for query building and execution
#[derive(Debug, Error)]
pub enum FluentError {
    // ── Structural ──
    /// A second MAIN table was registered.
    #[error("Duplicate main table '{alias}': main table '{existing}' already registered")]
    DuplicateMainTable { alias: String, existing: String },

    /// A table alias was registered twice.
    #[error("Duplicate table alias '{0}'")]
    DuplicateAlias(String),

    /// The query needs a MAIN table but none was registered.
    #[error("No main table registered for {0} query")]
    NoMainTable(&'static str),

    /// A sub-query or raw fragment was registered as a table without an alias.
    #[error("Alias required for table source '{0}'")]
    AliasRequired(String),

    /// A value cannot be used as a table/column source.
    #[error("Invalid column type: {0}")]
    InvalidColumnType(String),

    /// A list value was given as INSERT/UPDATE data; it would expand into
    /// several placeholders. Bind real Postgres arrays with `Value::param`.
    #[error("Array value for column '{0}' cannot be used as row data; bind it with Value::param")]
    ArrayInData(String),

    /// An identifier failed validation.
    #[error("Invalid identifier: {0}")]
    InvalidIdentifier(String),

    // ── Compilation ──
    /// SELECT query without a select list.
    #[error("No columns to select")]
    NoColumnsToSelect,

    /// A non-CROSS join has no ON condition.
    #[error("No join conditions for alias '{0}'")]
    NoJoinConditions(String),

    /// INSERT without data rows or a select source.
    #[error("No data to insert into '{0}'")]
    NoDataToInsert(String),

    /// UPDATE without SET data.
    #[error("No data to update in '{0}'")]
    NoDataToUpdate(String),

    /// UPDATE with joins but no FROM table for them to attach to.
    #[error("UPDATE of '{0}' has joins but no FROM table")]
    UpdateJoinWithoutFrom(String),

    /// Unrecognized query type name.
    #[error("Bad query type '{0}'")]
    BadQueryType(String),

    /// A condition's placeholder count does not match its parameter count.
    #[error("Bad param count in condition '{fragment}': expected {expected}, got {actual}")]
    BadParamCount {
        fragment: String,
        expected: usize,
        actual: usize,
    },

    // ── Usage ──
    /// Parameters were passed along with a structured condition.
    #[error("Only string conditions can have params (got {0} params)")]
    OnlyStringConditionCanHaveParams(usize),

    /// `reset()` called with an unknown field name.
    #[error("Unknown query param '{0}'")]
    UnknownParam(String),

    /// The query was mutated after execution started.
    #[error("Can't mutate query after execute")]
    CantMutateAfterExecute,

    /// Cursor navigation above the root condition.
    #[error("Condition has no parent")]
    NoParent,

    /// Cursor is not attached to a query.
    #[error("Condition is not attached to a query")]
    NoQuery,

    /// Indexed condition access out of range.
    #[error("Condition offset {offset} out of range (len {len})")]
    BadOffset { offset: usize, len: usize },

    // ── Placeholder ──
    /// More `?` markers than parameters.
    #[error("Missing param for placeholder #{position} in '{sql}'")]
    MissingParam { sql: String, position: usize },

    /// Parameters left after the last `?` marker.
    #[error("Extra params: {unused} unused after {placeholders} placeholders in '{sql}'")]
    ExtraParam {
        sql: String,
        placeholders: usize,
        unused: usize,
    },

    /// An empty array was bound where a list of placeholders is expected.
    #[error("Empty array bound at placeholder #{position} in '{sql}'")]
    EmptyArray { sql: String, position: usize },

    // ── Driver ──
    /// Database connection error
    #[error("Connection error: {0}")]
    Connection(String),

    /// Statement execution failed.
    #[error("Query failed: {message} (sql: {sql})")]
    QueryFailed {
        sql: String,
        params: Vec<Value>,
        message: String,
        #[source]
        source: Option<tokio_postgres::Error>,
    },

    /// Row not found
    #[error("Not found: {0}")]
    NotFound(String),

    /// More rows than expected.
    #[error("Too many rows: expected {expected}, got {got}")]
    TooManyRows { expected: usize, got: usize },

    /// Unique constraint violation
    #[error("Unique constraint violation: {0}")]
    UniqueViolation(String),

    /// Foreign key constraint violation
    #[error("Foreign key violation: {0}")]
    ForeignKeyViolation(String),

    /// Check constraint violation
    #[error("Check constraint violation: {0}")]
    CheckViolation(String),

    /// Row decode/mapping error
    #[error("Decode error on column '{column}': {message}")]
    Decode { column: String, message: String },

    /// Pool error
    #[cfg(feature = "pool")]
    #[error("Pool error: {0}")]
    Pool(String),

    /// Query timeout error
    #[error("Query timeout after {0:?}")]
    Timeout(std::time::Duration),

    /// Commit/rollback bookkeeping failed.
    #[error("Transaction error: {0}")]
    Transaction(String),
}

impl FluentError {
    /// Classify this error.
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::DuplicateMainTable { .. }
            | Self::DuplicateAlias(_)
            | Self::NoMainTable(_)
            | Self::AliasRequired(_)
            | Self::InvalidColumnType(_)
            | Self::ArrayInData(_)
            | Self::InvalidIdentifier(_) => ErrorKind::Structural,
            Self::NoColumnsToSelect
            | Self::NoJoinConditions(_)
            | Self::NoDataToInsert(_)
            | Self::NoDataToUpdate(_)
            | Self::UpdateJoinWithoutFrom(_)
            | Self::BadQueryType(_)
            | Self::BadParamCount { .. } => ErrorKind::Compilation,
            Self::OnlyStringConditionCanHaveParams(_)
            | Self::UnknownParam(_)
            | Self::CantMutateAfterExecute
            | Self::NoParent
            | Self::NoQuery
            | Self::BadOffset { .. } => ErrorKind::Usage,
            Self::MissingParam { .. } | Self::ExtraParam { .. } | Self::EmptyArray { .. } => {
                ErrorKind::Placeholder
            }
            _ => ErrorKind::Driver,
        }
    }

    /// Create a decode error for a specific column
    pub fn decode(column: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Decode {
            column: column.into(),
            message: message.into(),
        }
    }

    /// Create a not found error
    pub fn not_found(message: impl Into<String>) -> Self {
        Self::NotFound(message.into())
    }

    /// Create a too-many-rows error
    pub fn too_many_rows(expected: usize, got: usize) -> Self {
        Self::TooManyRows { expected, got }
    }

    /// Check if this is a unique violation error
    pub fn is_unique_violation(&self) -> bool {
        matches!(self, Self::UniqueViolation(_))
    }

    /// Check if this is a not found error
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound(_))
    }

    /// Check if this is a timeout error
    pub fn is_timeout(&self) -> bool {
        matches!(self, Self::Timeout(_))
    }

    /// Translate a driver error raised while running `sql` with `params`.
    ///
    /// Constraint violations map to their dedicated variants; everything else
    /// becomes [`FluentError::QueryFailed`] carrying the statement.
    pub fn from_query_error(err: tokio_postgres::Error, sql: &str, params: &[Value]) -> Self {
        if let Some(db_err) = err.as_db_error() {
            let constraint = db_err.constraint().unwrap_or("unknown");
            let message = db_err.message();

            match db_err.code().code() {
                "23505" => return Self::UniqueViolation(format!("{constraint}: {message}")),
                "23503" => return Self::ForeignKeyViolation(format!("{constraint}: {message}")),
                "23514" => return Self::CheckViolation(format!("{constraint}: {message}")),
                _ => {}
            }
        }
        Self::QueryFailed {
            sql: sql.to_string(),
            params: params.to_vec(),
            message: err.to_string(),
            source: Some(err),
        }
    }

    /// Translate a driver error that is not tied to a specific statement
    /// (BEGIN/COMMIT/ROLLBACK, connection setup).
    pub fn from_db_error(err: tokio_postgres::Error) -> Self {
        if err.is_closed() {
            return Self::Connection(err.to_string());
        }
        Self::QueryFailed {
            sql: String::new(),
            params: Vec::new(),
            message: err.to_string(),
            source: Some(err),
        }
    }
}

impl From<tokio_postgres::Error> for FluentError {
    fn from(err: tokio_postgres::Error) -> Self {
        Self::from_db_error(err)
    }
}

#[cfg(feature = "pool")]
impl From<deadpool_postgres::PoolError> for FluentError {
    fn from(err: deadpool_postgres::PoolError) -> Self {
        Self::Pool(err.to_string())
    }
}
