//! A [`Query`] bound to a client.
//!
//! [`Statement`] owns the query and borrows the connection. The first
//! execution marks the query final; from then on [`Statement::query_mut`]
//! refuses to hand out the builder, so the SQL that ran is the SQL you can
//! still inspect.
//!
//! ```ignore
//! let mut q = pgfluent::select();
//! q.select(["id", "email"]).table("users")?.where_("active", true)?;
//!
//! let mut stmt = q.bind_to(&client);
//! let rows = stmt.fetch_all().await?;
//! assert!(stmt.query_mut().is_err());
//! ```

use crate::client::GenericClient;
use crate::error::{FluentError, FluentResult};
use crate::qb::Query;
use crate::row::FromRow;
use crate::sql::CompiledQuery;
use tokio_postgres::Row;

/// A query plus the client it will run on.
pub struct Statement<'c, C> {
    query: Query,
    client: &'c C,
}

impl<'c, C: GenericClient> Statement<'c, C> {
    pub fn new(query: Query, client: &'c C) -> Self {
        Self { query, client }
    }

    pub fn query(&self) -> &Query {
        &self.query
    }

    /// Mutable access to the builder, refused once the query has executed.
    pub fn query_mut(&mut self) -> FluentResult<&mut Query> {
        if self.query.is_final() {
            return Err(FluentError::CantMutateAfterExecute);
        }
        Ok(&mut self.query)
    }

    pub fn client(&self) -> &'c C {
        self.client
    }

    pub fn into_query(self) -> Query {
        self.query
    }

    /// Compile and mark the query final.
    fn prepare(&mut self) -> FluentResult<CompiledQuery> {
        let compiled = self.query.compile()?;
        self.query.mark_final();
        Ok(compiled)
    }

    pub async fn fetch_all(&mut self) -> FluentResult<Vec<Row>> {
        let compiled = self.prepare()?;
        self.client.query(compiled.sql(), compiled.params()).await
    }

    pub async fn fetch_all_as<T: FromRow>(&mut self) -> FluentResult<Vec<T>> {
        let rows = self.fetch_all().await?;
        rows.iter().map(T::from_row).collect()
    }

    /// First row; `NotFound` when there is none.
    pub async fn fetch_one(&mut self) -> FluentResult<Row> {
        let compiled = self.prepare()?;
        self.client.query_one(compiled.sql(), compiled.params()).await
    }

    pub async fn fetch_one_as<T: FromRow>(&mut self) -> FluentResult<T> {
        let row = self.fetch_one().await?;
        T::from_row(&row)
    }

    pub async fn fetch_opt(&mut self) -> FluentResult<Option<Row>> {
        let compiled = self.prepare()?;
        self.client.query_opt(compiled.sql(), compiled.params()).await
    }

    pub async fn fetch_opt_as<T: FromRow>(&mut self) -> FluentResult<Option<T>> {
        let row = self.fetch_opt().await?;
        row.as_ref().map(T::from_row).transpose()
    }

    /// Affected row count.
    pub async fn execute(&mut self) -> FluentResult<u64> {
        let compiled = self.prepare()?;
        self.client.execute(compiled.sql(), compiled.params()).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::value::Value;
    use std::sync::Mutex;

    /// Records what it was asked to run and returns no rows.
    #[derive(Default)]
    struct Recorder {
        calls: Mutex<Vec<(String, Vec<Value>)>>,
    }

    impl GenericClient for Recorder {
        async fn query(&self, sql: &str, params: &[Value]) -> FluentResult<Vec<Row>> {
            self.calls
                .lock()
                .unwrap()
                .push((sql.to_string(), params.to_vec()));
            Ok(Vec::new())
        }

        async fn execute(&self, sql: &str, params: &[Value]) -> FluentResult<u64> {
            self.calls
                .lock()
                .unwrap()
                .push((sql.to_string(), params.to_vec()));
            Ok(3)
        }
    }

    fn users_query() -> Query {
        let mut q = crate::qb::delete("users");
        q.where_("id", 7).unwrap();
        q
    }

    #[tokio::test]
    async fn execution_marks_the_query_final() {
        let client = Recorder::default();
        let mut stmt = users_query().bind_to(&client);

        stmt.query_mut().unwrap().returning(["id"]);
        assert!(!stmt.query().is_final());

        let affected = stmt.execute().await.unwrap();
        assert_eq!(affected, 3);
        assert!(stmt.query().is_final());
        assert!(matches!(
            stmt.query_mut(),
            Err(FluentError::CantMutateAfterExecute)
        ));

        let calls = client.calls.lock().unwrap();
        assert_eq!(
            calls.as_slice(),
            &[(
                "DELETE FROM users WHERE id = $1 RETURNING id".to_string(),
                vec![Value::Int(7)]
            )]
        );
    }

    #[tokio::test]
    async fn compile_errors_leave_the_query_editable() {
        let client = Recorder::default();
        let mut stmt = crate::qb::insert("users").bind_to(&client);

        assert!(matches!(
            stmt.execute().await,
            Err(FluentError::NoDataToInsert(_))
        ));
        assert!(stmt.query_mut().is_ok());
        assert!(client.calls.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn fetch_opt_on_empty_result() {
        let client = Recorder::default();
        let mut stmt = users_query().bind_to(&client);
        assert!(stmt.fetch_opt().await.unwrap().is_none());
        assert!(matches!(
            stmt.fetch_one().await,
            Err(FluentError::NotFound(_))
        ));
    }

    #[test]
    fn into_query_keeps_the_builder() {
        let client = Recorder::default();
        let stmt = users_query().bind_to(&client);
        let q = stmt.into_query();
        assert_eq!(q.to_sql().unwrap(), "DELETE FROM users WHERE id = $1");
    }
}
