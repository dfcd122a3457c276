//! `?` → `$n` placeholder numbering.

use super::CompiledQuery;
use crate::error::{FluentError, FluentResult};
use crate::value::Value;
use std::fmt::Write;

/// Rewrite `?` placeholders into `$1, $2, ...` and flatten `params`.
///
/// Walks `sql` once, left to right:
/// - `\?` is unescaped to a literal `?` and consumes nothing;
/// - `?` consumes the next parameter. Arrays expand to a comma-separated list
///   of placeholders, [`Sql`](crate::Sql) fragments and sub-queries are spliced
///   in with their own parameters numbered from the running counter.
///
/// Fails with [`FluentError::MissingParam`] when parameters run out and
/// [`FluentError::ExtraParam`] when some are left over.
pub fn number(sql: &str, params: &[Value]) -> FluentResult<CompiledQuery> {
    let mut numbering = Numbering::default();
    numbering.walk(sql, params)?;
    Ok(CompiledQuery::new(numbering.out, numbering.params))
}

#[derive(Default)]
struct Numbering {
    out: String,
    params: Vec<Value>,
}

impl Numbering {
    fn walk(&mut self, sql: &str, params: &[Value]) -> FluentResult<()> {
        self.out.reserve(sql.len());
        let mut remaining = params.iter();
        let mut position = 0;
        let mut rest = sql;

        while let Some(idx) = rest.find(['?', '\\']) {
            let (head, tail) = rest.split_at(idx);
            self.out.push_str(head);

            if let Some(after) = tail.strip_prefix("\\?") {
                self.out.push('?');
                rest = after;
                continue;
            }
            if let Some(after) = tail.strip_prefix('\\') {
                self.out.push('\\');
                rest = after;
                continue;
            }

            position += 1;
            let value = remaining.next().ok_or_else(|| FluentError::MissingParam {
                sql: sql.to_string(),
                position,
            })?;
            self.bind(value, sql, position)?;
            rest = &tail[1..];
        }
        self.out.push_str(rest);

        let unused = remaining.len();
        if unused > 0 {
            return Err(FluentError::ExtraParam {
                sql: sql.to_string(),
                placeholders: position,
                unused,
            });
        }
        Ok(())
    }

    fn bind(&mut self, value: &Value, sql: &str, position: usize) -> FluentResult<()> {
        match value {
            Value::Array(items) => {
                if items.is_empty() {
                    return Err(FluentError::EmptyArray {
                        sql: sql.to_string(),
                        position,
                    });
                }
                for (i, item) in items.iter().enumerate() {
                    if i > 0 {
                        self.out.push_str(", ");
                    }
                    self.bind(item, sql, position)?;
                }
            }
            Value::Sql(fragment) => self.walk(fragment.text(), fragment.params())?,
            Value::Query(query) => {
                let fragment = query.to_fragment()?;
                self.walk(fragment.text(), fragment.params())?;
            }
            scalar => {
                self.params.push(scalar.clone());
                let _ = write!(self.out, "${}", self.params.len());
            }
        }
        Ok(())
    }
}

/// Count unescaped `?` markers. Only `\?` is an escape, exactly as in
/// [`number`]; any other backslash is ordinary text.
pub(crate) fn count_placeholders(sql: &str) -> usize {
    let mut count = 0;
    let mut chars = sql.chars().peekable();
    while let Some(c) = chars.next() {
        match c {
            '\\' => {
                chars.next_if_eq(&'?');
            }
            '?' => count += 1,
            _ => {}
        }
    }
    count
}

/// Escape every `?` so it survives numbering as a literal.
pub(crate) fn escape(sql: &str) -> String {
    sql.replace('?', "\\?")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sql::Sql;

    fn ints(values: &[i64]) -> Vec<Value> {
        values.iter().copied().map(Value::Int).collect()
    }

    #[test]
    fn numbers_left_to_right() {
        let q = number("a = ? AND b = ?", &ints(&[1, 2])).unwrap();
        assert_eq!(q.sql(), "a = $1 AND b = $2");
        assert_eq!(q.params(), ints(&[1, 2]).as_slice());
    }

    #[test]
    fn escaped_marker_is_literal() {
        let q = number(r"name ILIKE 'What\?' AND id = ?", &ints(&[5])).unwrap();
        assert_eq!(q.sql(), "name ILIKE 'What?' AND id = $1");
        assert_eq!(q.params().len(), 1);
    }

    #[test]
    fn other_backslashes_pass_through() {
        let q = number(r"x = E'\n'", &[]).unwrap();
        assert_eq!(q.sql(), r"x = E'\n'");
    }

    #[test]
    fn arrays_expand_in_place() {
        let q = number(
            "a = ? AND id IN (?) AND c = ?",
            &[Value::Int(1), Value::from(vec![10, 11, 12]), Value::Int(2)],
        )
        .unwrap();
        assert_eq!(q.sql(), "a = $1 AND id IN ($2, $3, $4) AND c = $5");
        assert_eq!(q.params(), ints(&[1, 10, 11, 12, 2]).as_slice());
    }

    #[test]
    fn fragments_splice_with_running_counter() {
        let inner = Sql::new("lower(?) || ?").bind("A").bind("b");
        let q = number("x = ? AND y = ?", &[Value::Int(1), Value::Sql(inner)]).unwrap();
        assert_eq!(q.sql(), "x = $1 AND y = lower($2) || $3");
        assert_eq!(
            q.params(),
            &[Value::Int(1), Value::from("A"), Value::from("b")]
        );
    }

    #[test]
    fn missing_param_is_reported() {
        let err = number("a = ? AND b = ?", &ints(&[1])).unwrap_err();
        assert!(matches!(err, FluentError::MissingParam { position: 2, .. }));
    }

    #[test]
    fn extra_param_is_reported() {
        let err = number("a = ?", &ints(&[1, 2])).unwrap_err();
        assert!(matches!(
            err,
            FluentError::ExtraParam {
                placeholders: 1,
                unused: 1,
                ..
            }
        ));
    }

    #[test]
    fn empty_array_fails_fast() {
        let err = number("id IN (?)", &[Value::Array(vec![])]).unwrap_err();
        assert!(matches!(err, FluentError::EmptyArray { position: 1, .. }));
    }

    #[test]
    fn counts_only_unescaped_markers() {
        assert_eq!(count_placeholders(r"a = ? AND b = '\?' AND c = ?"), 2);
        assert_eq!(count_placeholders("no markers"), 0);
        assert_eq!(escape("a ? b"), r"a \? b");
    }

    #[test]
    fn counter_agrees_with_numbering_on_backslashes() {
        // A doubled backslash is plain text; the `\?` after it is still an escape.
        let text = r"x = '\\?' AND y = ?";
        assert_eq!(count_placeholders(text), 1);
        let q = number(text, &ints(&[1])).unwrap();
        assert_eq!(q.sql(), r"x = '\?' AND y = $1");
        assert_eq!(q.params().len(), count_placeholders(text));

        assert_eq!(count_placeholders(r"a\b = ?"), 1);
        assert_eq!(number(r"a\b = ?", &ints(&[2])).unwrap().sql(), r"a\b = $1");
    }
}
