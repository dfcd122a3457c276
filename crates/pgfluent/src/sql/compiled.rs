use crate::value::Value;
use serde::Serialize;
use tokio_postgres::types::ToSql;

/// Final SQL text with `$n` placeholders and its flat parameter list.
///
/// The parameter count always equals the highest placeholder number in the
/// text; the first parameter binds `$1`.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct CompiledQuery {
    sql: String,
    params: Vec<Value>,
}

impl CompiledQuery {
    pub(crate) fn new(sql: String, params: Vec<Value>) -> Self {
        Self { sql, params }
    }

    pub fn sql(&self) -> &str {
        &self.sql
    }

    pub fn params(&self) -> &[Value] {
        &self.params
    }

    /// Parameter refs compatible with `tokio-postgres`.
    pub fn params_ref(&self) -> Vec<&(dyn ToSql + Sync)> {
        self.params
            .iter()
            .map(|p| p as &(dyn ToSql + Sync))
            .collect()
    }

    pub fn into_parts(self) -> (String, Vec<Value>) {
        (self.sql, self.params)
    }

    impl_query_exec! {
        prepare(self) {
            (self, None::<&str>)
        }
    }
}

impl std::fmt::Display for CompiledQuery {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.sql)
    }
}
