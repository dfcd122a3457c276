use super::config::MonitorConfig;
use super::monitors::NoopMonitor;
use super::types::{QueryContext, QueryMonitor, QueryOutcome};
use crate::client::GenericClient;
use crate::error::{FluentError, FluentResult};
use crate::value::Value;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio_postgres::Row;

/// A [`GenericClient`] wrapper adding timeouts, slow-query detection and
/// SQL logging.
///
/// With the `tracing` feature every statement is logged at `debug` on target
/// `pgfluent.sql`, and slow statements at `warn`.
pub struct InstrumentedClient<C> {
    client: C,
    monitor: Arc<dyn QueryMonitor>,
    config: MonitorConfig,
}

impl<C: GenericClient> InstrumentedClient<C> {
    pub fn new(client: C) -> Self {
        Self {
            client,
            monitor: Arc::new(NoopMonitor),
            config: MonitorConfig::default(),
        }
    }

    pub fn with_config(mut self, config: MonitorConfig) -> Self {
        self.config = config;
        self
    }

    pub fn with_monitor<M: QueryMonitor + 'static>(mut self, monitor: M) -> Self {
        self.monitor = Arc::new(monitor);
        self
    }

    /// Share one monitor between several clients.
    pub fn with_monitor_arc(mut self, monitor: Arc<dyn QueryMonitor>) -> Self {
        self.monitor = monitor;
        self
    }

    pub fn config(&self) -> &MonitorConfig {
        &self.config
    }

    pub fn config_mut(&mut self) -> &mut MonitorConfig {
        &mut self.config
    }

    pub fn inner(&self) -> &C {
        &self.client
    }

    pub fn into_inner(self) -> C {
        self.client
    }

    async fn with_timeout<T, F>(&self, future: F) -> FluentResult<T>
    where
        F: std::future::Future<Output = FluentResult<T>> + Send,
    {
        let Some(timeout) = self.config.query_timeout else {
            return future.await;
        };

        tokio::pin!(future);
        tokio::select! {
            result = &mut future => result,
            _ = tokio::time::sleep(timeout) => {
                if let Some(cancel_token) = self.client.cancel_token() {
                    tokio::spawn(async move {
                        let _ = cancel_token.cancel_query(tokio_postgres::NoTls).await;
                    });
                }
                Err(FluentError::Timeout(timeout))
            }
        }
    }

    async fn run<T, F>(
        &self,
        ctx: QueryContext,
        future: F,
        outcome: fn(&T) -> QueryOutcome,
    ) -> FluentResult<T>
    where
        F: std::future::Future<Output = FluentResult<T>> + Send,
    {
        self.log_start(&ctx);
        self.monitor.on_query_start(&ctx);

        let start = Instant::now();
        let result = self.with_timeout(future).await;
        let duration = start.elapsed();

        let outcome = match &result {
            Ok(value) => outcome(value),
            Err(FluentError::Timeout(d)) => QueryOutcome::TimedOut(*d),
            Err(FluentError::NotFound(_)) => QueryOutcome::OptionalRow(false),
            Err(e) => QueryOutcome::error(e.to_string()),
        };

        self.log_complete(&ctx, duration, &outcome);
        self.monitor.on_query_complete(&ctx, duration, &outcome);

        if let Some(threshold) = self.config.slow_query_threshold {
            if duration > threshold {
                self.log_slow(&ctx, duration, threshold);
                self.monitor.on_slow_query(&ctx, duration);
            }
        }

        result
    }

    fn context(&self, tag: Option<&str>, sql: &str, params: &[Value]) -> QueryContext {
        let ctx = QueryContext::new(sql, params.len());
        match tag {
            Some(tag) => ctx.with_tag(tag),
            None => ctx,
        }
    }

    #[cfg(feature = "tracing")]
    fn log_start(&self, ctx: &QueryContext) {
        if !self.config.logging_enabled {
            return;
        }
        tracing::debug!(
            target: "pgfluent.sql",
            kind = %ctx.kind,
            tag = ctx.tag.as_deref().unwrap_or("-"),
            param_count = ctx.param_count,
            sql = %super::truncate_sql_bytes(&ctx.sql, self.config.max_sql_length),
            "executing"
        );
    }

    #[cfg(not(feature = "tracing"))]
    fn log_start(&self, _ctx: &QueryContext) {}

    #[cfg(feature = "tracing")]
    fn log_complete(&self, ctx: &QueryContext, duration: Duration, outcome: &QueryOutcome) {
        if !self.config.logging_enabled {
            return;
        }
        tracing::debug!(
            target: "pgfluent.sql",
            kind = %ctx.kind,
            tag = ctx.tag.as_deref().unwrap_or("-"),
            duration_ms = duration.as_secs_f64() * 1000.0,
            outcome = %outcome,
            "finished"
        );
    }

    #[cfg(not(feature = "tracing"))]
    fn log_complete(&self, _ctx: &QueryContext, _duration: Duration, _outcome: &QueryOutcome) {}

    #[cfg(feature = "tracing")]
    fn log_slow(&self, ctx: &QueryContext, duration: Duration, threshold: Duration) {
        if !self.config.logging_enabled {
            return;
        }
        tracing::warn!(
            target: "pgfluent.sql",
            kind = %ctx.kind,
            tag = ctx.tag.as_deref().unwrap_or("-"),
            duration_ms = duration.as_secs_f64() * 1000.0,
            threshold_ms = threshold.as_secs_f64() * 1000.0,
            sql = %super::truncate_sql_bytes(&ctx.sql, self.config.max_sql_length),
            "slow query"
        );
    }

    #[cfg(not(feature = "tracing"))]
    fn log_slow(&self, _ctx: &QueryContext, _duration: Duration, _threshold: Duration) {}

    async fn query_inner(
        &self,
        tag: Option<&str>,
        sql: &str,
        params: &[Value],
    ) -> FluentResult<Vec<Row>> {
        let ctx = self.context(tag, sql, params);
        self.run(ctx, self.client.query(sql, params), |rows: &Vec<Row>| {
            QueryOutcome::Rows(rows.len())
        })
        .await
    }

    async fn query_one_inner(&self, tag: Option<&str>, sql: &str, params: &[Value]) -> FluentResult<Row> {
        let ctx = self.context(tag, sql, params);
        self.run(ctx, self.client.query_one(sql, params), |_: &Row| {
            QueryOutcome::OptionalRow(true)
        })
        .await
    }

    async fn query_opt_inner(
        &self,
        tag: Option<&str>,
        sql: &str,
        params: &[Value],
    ) -> FluentResult<Option<Row>> {
        let ctx = self.context(tag, sql, params);
        self.run(ctx, self.client.query_opt(sql, params), |row: &Option<Row>| {
            QueryOutcome::OptionalRow(row.is_some())
        })
        .await
    }

    async fn execute_inner(&self, tag: Option<&str>, sql: &str, params: &[Value]) -> FluentResult<u64> {
        let ctx = self.context(tag, sql, params);
        self.run(ctx, self.client.execute(sql, params), |n: &u64| {
            QueryOutcome::Affected(*n)
        })
        .await
    }
}

impl<C: GenericClient> GenericClient for InstrumentedClient<C> {
    async fn query(&self, sql: &str, params: &[Value]) -> FluentResult<Vec<Row>> {
        self.query_inner(None, sql, params).await
    }

    async fn query_tagged(&self, tag: &str, sql: &str, params: &[Value]) -> FluentResult<Vec<Row>> {
        self.query_inner(Some(tag), sql, params).await
    }

    async fn query_one(&self, sql: &str, params: &[Value]) -> FluentResult<Row> {
        self.query_one_inner(None, sql, params).await
    }

    async fn query_one_tagged(&self, tag: &str, sql: &str, params: &[Value]) -> FluentResult<Row> {
        self.query_one_inner(Some(tag), sql, params).await
    }

    async fn query_opt(&self, sql: &str, params: &[Value]) -> FluentResult<Option<Row>> {
        self.query_opt_inner(None, sql, params).await
    }

    async fn query_opt_tagged(
        &self,
        tag: &str,
        sql: &str,
        params: &[Value],
    ) -> FluentResult<Option<Row>> {
        self.query_opt_inner(Some(tag), sql, params).await
    }

    async fn execute(&self, sql: &str, params: &[Value]) -> FluentResult<u64> {
        self.execute_inner(None, sql, params).await
    }

    async fn execute_tagged(&self, tag: &str, sql: &str, params: &[Value]) -> FluentResult<u64> {
        self.execute_inner(Some(tag), sql, params).await
    }

    fn cancel_token(&self) -> Option<tokio_postgres::CancelToken> {
        self.client.cancel_token()
    }
}
