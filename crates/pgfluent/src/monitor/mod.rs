//! Execution monitoring: timeouts, slow-query detection and SQL logging.
//!
//! Wrap any [`GenericClient`](crate::GenericClient) in an
//! [`InstrumentedClient`]; builder statements run through it unchanged.
//!
//! ```rust,ignore
//! use pgfluent::monitor::{InstrumentedClient, MonitorConfig, StatsMonitor};
//! use std::time::Duration;
//!
//! let client = InstrumentedClient::new(db_client)
//!     .with_config(
//!         MonitorConfig::new()
//!             .with_query_timeout(Duration::from_secs(30))
//!             .with_slow_query_threshold(Duration::from_millis(200))
//!             .with_max_sql_length(512),
//!     )
//!     .with_monitor(StatsMonitor::new());
//!
//! let mut q = pgfluent::select();
//! q.select(["id"]).table("users")?;
//! let rows = q.bind_to(&client).fetch_all().await?;
//! ```

mod config;
mod instrumented;
mod monitors;
mod types;


pub use config::MonitorConfig;
pub use instrumented::InstrumentedClient;
pub use monitors::{NoopMonitor, QueryStats, StatsMonitor};
pub use types::{QueryContext, QueryMonitor, QueryOutcome, StatementKind};

pub(crate) fn truncate_sql_bytes(sql: &str, max_bytes: usize) -> &str {
    if sql.len() <= max_bytes {
        return sql;
    }
    let mut end = max_bytes;
    while end > 0 && !sql.is_char_boundary(end) {
        end -= 1;
    }
    &sql[..end]
}
