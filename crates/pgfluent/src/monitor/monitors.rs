use super::types::{QueryContext, QueryMonitor, QueryOutcome, StatementKind};
use std::sync::Mutex;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

/// Ignores every event.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopMonitor;

impl QueryMonitor for NoopMonitor {
    fn on_query_complete(&self, _ctx: &QueryContext, _duration: Duration, _outcome: &QueryOutcome) {}
}

/// Snapshot of [`StatsMonitor`] counters.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct QueryStats {
    pub total_queries: u64,
    pub failed_queries: u64,
    pub timed_out_queries: u64,
    pub slow_queries: u64,
    pub total_duration: Duration,
    pub max_duration: Duration,
    pub slowest_query: Option<String>,
    pub select_count: u64,
    pub insert_count: u64,
    pub update_count: u64,
    pub delete_count: u64,
}

/// Aggregates counters in memory.
#[derive(Debug, Default)]
pub struct StatsMonitor {
    total_queries: AtomicU64,
    failed_queries: AtomicU64,
    timed_out_queries: AtomicU64,
    slow_queries: AtomicU64,
    total_duration_nanos: AtomicU64,
    max_duration_nanos: AtomicU64,
    slowest_query: Mutex<Option<String>>,
    select_count: AtomicU64,
    insert_count: AtomicU64,
    update_count: AtomicU64,
    delete_count: AtomicU64,
}

impl StatsMonitor {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn stats(&self) -> QueryStats {
        QueryStats {
            total_queries: self.total_queries.load(Ordering::Relaxed),
            failed_queries: self.failed_queries.load(Ordering::Relaxed),
            timed_out_queries: self.timed_out_queries.load(Ordering::Relaxed),
            slow_queries: self.slow_queries.load(Ordering::Relaxed),
            total_duration: Duration::from_nanos(self.total_duration_nanos.load(Ordering::Relaxed)),
            max_duration: Duration::from_nanos(self.max_duration_nanos.load(Ordering::Relaxed)),
            slowest_query: self.slowest().clone(),
            select_count: self.select_count.load(Ordering::Relaxed),
            insert_count: self.insert_count.load(Ordering::Relaxed),
            update_count: self.update_count.load(Ordering::Relaxed),
            delete_count: self.delete_count.load(Ordering::Relaxed),
        }
    }

    pub fn reset(&self) {
        for counter in [
            &self.total_queries,
            &self.failed_queries,
            &self.timed_out_queries,
            &self.slow_queries,
            &self.total_duration_nanos,
            &self.max_duration_nanos,
            &self.select_count,
            &self.insert_count,
            &self.update_count,
            &self.delete_count,
        ] {
            counter.store(0, Ordering::Relaxed);
        }
        *self.slowest() = None;
    }

    // A poisoned lock only means another thread panicked mid-update of a
    // diagnostic string.
    fn slowest(&self) -> std::sync::MutexGuard<'_, Option<String>> {
        self.slowest_query
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

impl QueryMonitor for StatsMonitor {
    fn on_query_complete(&self, ctx: &QueryContext, duration: Duration, outcome: &QueryOutcome) {
        let nanos = u64::try_from(duration.as_nanos()).unwrap_or(u64::MAX);

        self.total_queries.fetch_add(1, Ordering::Relaxed);
        self.total_duration_nanos.fetch_add(nanos, Ordering::Relaxed);

        match outcome {
            QueryOutcome::TimedOut(_) => {
                self.failed_queries.fetch_add(1, Ordering::Relaxed);
                self.timed_out_queries.fetch_add(1, Ordering::Relaxed);
            }
            QueryOutcome::Error(_) => {
                self.failed_queries.fetch_add(1, Ordering::Relaxed);
            }
            _ => {}
        }

        let counter = match ctx.kind {
            StatementKind::Select => Some(&self.select_count),
            StatementKind::Insert => Some(&self.insert_count),
            StatementKind::Update => Some(&self.update_count),
            StatementKind::Delete => Some(&self.delete_count),
            StatementKind::Truncate | StatementKind::Other => None,
        };
        if let Some(counter) = counter {
            counter.fetch_add(1, Ordering::Relaxed);
        }

        if self.max_duration_nanos.fetch_max(nanos, Ordering::Relaxed) < nanos {
            *self.slowest() = Some(ctx.sql.clone());
        }
    }

    fn on_slow_query(&self, _ctx: &QueryContext, _duration: Duration) {
        self.slow_queries.fetch_add(1, Ordering::Relaxed);
    }
}
