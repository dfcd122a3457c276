/// Generate the query execution methods for a type that can provide
/// `(compiled: CompiledQuery or &CompiledQuery, tag: Option<&str>)`.
///
/// Usage:
/// ```ignore
/// impl_query_exec! {
///     prepare(self) {
///         (self.compile()?, self.tag.as_deref())
///     }
/// }
/// ```
macro_rules! impl_query_exec {
    (prepare($this:ident) $prepare:block) => {

        /// Execute and return all rows.
        pub async fn fetch_all(&$this, conn: &impl $crate::client::GenericClient) -> $crate::error::FluentResult<Vec<tokio_postgres::Row>> {
            let (compiled, tag) = $prepare;
            match tag {
                Some(tag) => conn.query_tagged(tag, compiled.sql(), compiled.params()).await,
                None => conn.query(compiled.sql(), compiled.params()).await,
            }
        }

        /// Execute and return all rows mapped to `T`.
        pub async fn fetch_all_as<T: $crate::row::FromRow>(&$this, conn: &impl $crate::client::GenericClient) -> $crate::error::FluentResult<Vec<T>> {
            let rows = $this.fetch_all(conn).await?;
            rows.iter().map(T::from_row).collect()
        }

        /// Execute and return the **first** row (`NotFound` when empty).
        pub async fn fetch_one(&$this, conn: &impl $crate::client::GenericClient) -> $crate::error::FluentResult<tokio_postgres::Row> {
            let (compiled, tag) = $prepare;
            match tag {
                Some(tag) => conn.query_one_tagged(tag, compiled.sql(), compiled.params()).await,
                None => conn.query_one(compiled.sql(), compiled.params()).await,
            }
        }

        pub async fn fetch_one_as<T: $crate::row::FromRow>(&$this, conn: &impl $crate::client::GenericClient) -> $crate::error::FluentResult<T> {
            let row = $this.fetch_one(conn).await?;
            T::from_row(&row)
        }

        /// Execute and return the first row, if any.
        pub async fn fetch_opt(&$this, conn: &impl $crate::client::GenericClient) -> $crate::error::FluentResult<Option<tokio_postgres::Row>> {
            let (compiled, tag) = $prepare;
            match tag {
                Some(tag) => conn.query_opt_tagged(tag, compiled.sql(), compiled.params()).await,
                None => conn.query_opt(compiled.sql(), compiled.params()).await,
            }
        }

        pub async fn fetch_opt_as<T: $crate::row::FromRow>(&$this, conn: &impl $crate::client::GenericClient) -> $crate::error::FluentResult<Option<T>> {
            let row = $this.fetch_opt(conn).await?;
            row.as_ref().map(T::from_row).transpose()
        }

        /// Execute and require **exactly one** row.
        pub async fn fetch_one_strict(&$this, conn: &impl $crate::client::GenericClient) -> $crate::error::FluentResult<tokio_postgres::Row> {
            let (compiled, tag) = $prepare;
            match tag {
                Some(tag) => conn.query_one_strict_tagged(tag, compiled.sql(), compiled.params()).await,
                None => conn.query_one_strict(compiled.sql(), compiled.params()).await,
            }
        }

        /// Execute and return the affected row count.
        pub async fn execute(&$this, conn: &impl $crate::client::GenericClient) -> $crate::error::FluentResult<u64> {
            let (compiled, tag) = $prepare;
            match tag {
                Some(tag) => conn.execute_tagged(tag, compiled.sql(), compiled.params()).await,
                None => conn.execute(compiled.sql(), compiled.params()).await,
            }
        }

        // ── Tagged variants ──

        /// Execute and return all rows, associating a tag.
        pub async fn fetch_all_tagged(&$this, conn: &impl $crate::client::GenericClient, tag: &str) -> $crate::error::FluentResult<Vec<tokio_postgres::Row>> {
            let (compiled, _) = $prepare;
            conn.query_tagged(tag, compiled.sql(), compiled.params()).await
        }

        /// Execute and return the affected row count, associating a tag.
        pub async fn execute_tagged(&$this, conn: &impl $crate::client::GenericClient, tag: &str) -> $crate::error::FluentResult<u64> {
            let (compiled, _) = $prepare;
            conn.execute_tagged(tag, compiled.sql(), compiled.params()).await
        }

        // ── Streaming ──

        /// Execute and return a row stream.
        pub async fn stream(&$this, conn: &impl $crate::client::StreamingClient) -> $crate::error::FluentResult<$crate::client::RowStream> {
            let (compiled, tag) = $prepare;
            match tag {
                Some(tag) => conn.query_stream_tagged(tag, compiled.sql(), compiled.params()).await,
                None => conn.query_stream(compiled.sql(), compiled.params()).await,
            }
        }

        // ── Scalar convenience ──

        /// Execute and return exactly one scalar value from column 0.
        pub async fn fetch_scalar_one<T>(&$this, conn: &impl $crate::client::GenericClient) -> $crate::error::FluentResult<T>
        where
            T: for<'__b> tokio_postgres::types::FromSql<'__b> + Send + Sync,
        {
            let row = $this.fetch_one(conn).await?;
            row.try_get(0)
                .map_err(|e| $crate::error::FluentError::decode("0", e.to_string()))
        }

        /// Execute and return all scalar values from column 0.
        pub async fn fetch_scalar_all<T>(&$this, conn: &impl $crate::client::GenericClient) -> $crate::error::FluentResult<Vec<T>>
        where
            T: for<'__b> tokio_postgres::types::FromSql<'__b> + Send + Sync,
        {
            let rows = $this.fetch_all(conn).await?;
            rows.iter()
                .map(|r| r.try_get(0)
                    .map_err(|e| $crate::error::FluentError::decode("0", e.to_string())))
                .collect()
        }

        /// Check if any rows exist by wrapping the statement in `SELECT EXISTS(...)`.
        ///
        /// Fails with `QueryFailed` for anything but `SELECT`/`WITH` statements.
        pub async fn exists(&$this, conn: &impl $crate::client::GenericClient) -> $crate::error::FluentResult<bool> {
            let (compiled, tag) = $prepare;
            let inner_sql = compiled.sql().trim_end();
            let inner_sql = inner_sql.strip_suffix(';').unwrap_or(inner_sql).trim_end();

            let trimmed = $crate::sql::strip_sql_prefix(inner_sql);
            if !$crate::sql::starts_with_keyword(trimmed, "SELECT")
                && !$crate::sql::starts_with_keyword(trimmed, "WITH")
            {
                return Err($crate::error::FluentError::QueryFailed {
                    sql: inner_sql.to_string(),
                    params: compiled.params().to_vec(),
                    message: "exists() only works with SELECT statements (including WITH ... SELECT)".to_string(),
                    source: None,
                });
            }

            let wrapped_sql = format!("SELECT EXISTS({inner_sql})");
            let row = match tag {
                Some(tag) => conn.query_one_tagged(tag, &wrapped_sql, compiled.params()).await?,
                None => conn.query_one(&wrapped_sql, compiled.params()).await?,
            };
            row.try_get(0)
                .map_err(|e| $crate::error::FluentError::decode("0", e.to_string()))
        }
    };
}
