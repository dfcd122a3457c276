//! Raw SQL fragments and placeholder numbering.
//!
//! Everything the builder produces is first assembled in `?` form: plain SQL
//! text where each unescaped `?` stands for the next parameter and `\?` is a
//! literal question mark. Numbering then rewrites the text into Postgres'
//! `$1, $2, ...` form while expanding array parameters and splicing nested
//! fragments and sub-queries in place.
//!
//! # Example
//!
//! ```ignore
//! use pgfluent::sql;
//!
//! let mut q = sql("SELECT id, username FROM users WHERE 1=1");
//! if let Some(status) = status {
//!     q.push(" AND status = ").push_bind(status);
//! }
//! q.push(" ORDER BY created_at DESC");
//!
//! let users: Vec<User> = q.fetch_all_as(&conn).await?;
//! ```

#[macro_use]
mod exec_macros;

mod builder;
mod compiled;
pub(crate) mod placeholder;

#[cfg(test)]
mod tests;

pub use builder::Sql;
pub use compiled::CompiledQuery;
pub use placeholder::number;

/// Start building a SQL fragment.
///
/// Unescaped `?` in `initial_sql` are placeholders; bind them with
/// [`Sql::bind`].
pub fn sql(initial_sql: impl Into<String>) -> Sql {
    Sql::new(initial_sql)
}

/// Strip leading whitespace, SQL comments (`--` and `/* */`), and parentheses
/// from a SQL string to find the first meaningful keyword.
pub(crate) fn strip_sql_prefix(sql: &str) -> &str {
    let mut s = sql;
    loop {
        let before = s;
        s = s.trim_start();
        if s.starts_with("--") {
            if let Some(pos) = s.find('\n') {
                s = &s[pos + 1..];
                continue;
            }
            return "";
        }
        if s.starts_with("/*") {
            if let Some(pos) = s.find("*/") {
                s = &s[pos + 2..];
                continue;
            }
            return "";
        }
        if let Some(rest) = s.strip_prefix('(') {
            s = rest;
            continue;
        }
        if s == before {
            break;
        }
    }
    s
}

pub(crate) fn starts_with_keyword(s: &str, keyword: &str) -> bool {
    match s.get(0..keyword.len()) {
        Some(prefix) => prefix.eq_ignore_ascii_case(keyword),
        None => false,
    }
}
