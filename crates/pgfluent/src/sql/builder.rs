use super::CompiledQuery;
use super::placeholder::{self, count_placeholders};
use crate::condition::Condition;
use crate::error::FluentResult;
use crate::ident::{Ident, IntoIdent};
use crate::value::Value;

/// A raw SQL fragment with positional parameters.
///
/// The text is kept in `?` form: each unescaped `?` is a placeholder for the
/// next parameter and `\?` is a literal question mark. `$n` numbering happens
/// once, in [`Sql::compile`], so fragments can be nested inside each other and
/// inside [`Query`](crate::Query) values without renumbering by hand.
#[must_use]
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Sql {
    text: String,
    params: Vec<Value>,
    tag: Option<String>,
}

impl Sql {
    /// Create a fragment from `?`-form text.
    ///
    /// ```ignore
    /// let expr = Sql::new("lower(?)").bind("Alice");
    /// ```
    pub fn new(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            params: Vec::new(),
            tag: None,
        }
    }

    /// Create an empty fragment.
    pub fn empty() -> Self {
        Self::default()
    }

    /// Associate a tag for monitoring/observability.
    pub fn tag(&mut self, tag: impl Into<String>) -> &mut Self {
        self.tag = Some(tag.into());
        self
    }

    /// Consuming counterpart of [`Sql::tag`].
    pub fn tagged(mut self, tag: impl Into<String>) -> Self {
        self.tag = Some(tag.into());
        self
    }

    /// Append literal SQL text. Question marks are escaped, so they never
    /// consume a parameter.
    pub fn push(&mut self, sql: &str) -> &mut Self {
        if sql.contains('?') {
            self.text.push_str(&placeholder::escape(sql));
        } else {
            self.text.push_str(sql);
        }
        self
    }

    /// Append `?`-form text together with the parameters it consumes.
    pub(crate) fn push_fragment(&mut self, text: &str, params: &[Value]) -> &mut Self {
        self.text.push_str(text);
        self.params.extend_from_slice(params);
        self
    }

    /// Append a placeholder and bind its value.
    ///
    /// Arrays expand to a comma-separated list of placeholders; fragments and
    /// queries are spliced in place.
    pub fn push_bind(&mut self, value: impl Into<Value>) -> &mut Self {
        self.text.push('?');
        self.params.push(value.into());
        self
    }

    /// Append a comma-separated list of placeholders and bind all values.
    ///
    /// An empty list appends `NULL`, so `IN (NULL)` stays valid SQL and
    /// matches nothing.
    pub fn push_bind_list<T: Into<Value>>(
        &mut self,
        values: impl IntoIterator<Item = T>,
    ) -> &mut Self {
        let mut iter = values.into_iter();
        let Some(first) = iter.next() else {
            return self.push("NULL");
        };

        self.push_bind(first);
        for v in iter {
            self.push(", ");
            self.push_bind(v);
        }
        self
    }

    /// Append another fragment, consuming it.
    pub fn push_sql(&mut self, mut other: Sql) -> &mut Self {
        self.text.push_str(&other.text);
        self.params.append(&mut other.params);
        if self.tag.is_none() {
            self.tag = other.tag;
        }
        self
    }

    /// Append a SQL identifier (schema/table/column) safely.
    ///
    /// Identifiers cannot be parameterized, so they are validated via
    /// [`crate::Ident`] instead.
    pub fn push_ident<I: IntoIdent>(&mut self, ident: I) -> FluentResult<&mut Self> {
        let ident = ident.into_ident()?;
        Ok(self.push_ident_ref(&ident))
    }

    /// Append a pre-validated [`Ident`].
    pub fn push_ident_ref(&mut self, ident: &Ident) -> &mut Self {
        ident.write_sql(&mut self.text);
        self
    }

    /// Append a compiled [`Condition`]. An empty condition appends nothing.
    pub fn push_condition(&mut self, condition: &Condition) -> FluentResult<&mut Self> {
        let mut text = String::new();
        let mut params = Vec::new();
        condition.compile_into(&mut text, &mut params, false)?;
        Ok(self.push_fragment(&text, &params))
    }

    /// Append ` WHERE <condition>` unless the condition is empty.
    pub fn push_where(&mut self, condition: &Condition) -> FluentResult<&mut Self> {
        if condition.is_blank() {
            return Ok(self);
        }
        self.push(" WHERE ");
        self.push_condition(condition)
    }

    /// Append ` LIMIT ?` with a bound parameter.
    pub fn limit(&mut self, n: i64) -> &mut Self {
        self.push(" LIMIT ").push_bind(n)
    }

    /// Append ` OFFSET ?` with a bound parameter.
    pub fn offset(&mut self, n: i64) -> &mut Self {
        self.push(" OFFSET ").push_bind(n)
    }

    pub fn limit_offset(&mut self, limit: i64, offset: i64) -> &mut Self {
        self.limit(limit).offset(offset)
    }

    /// Bind a value to the next placeholder already present in the text.
    ///
    /// ```ignore
    /// pgfluent::sql("SELECT * FROM users WHERE status = ?").bind("active")
    /// ```
    pub fn bind(mut self, value: impl Into<Value>) -> Self {
        self.params.push(value.into());
        self
    }

    /// The `?`-form text.
    pub fn text(&self) -> &str {
        &self.text
    }

    pub fn params(&self) -> &[Value] {
        &self.params
    }

    pub fn tag_name(&self) -> Option<&str> {
        self.tag.as_deref()
    }

    /// Number of unescaped `?` markers in the text.
    pub fn placeholder_count(&self) -> usize {
        count_placeholders(&self.text)
    }

    pub fn is_empty(&self) -> bool {
        self.text.is_empty()
    }

    /// Number the placeholders and flatten the parameters.
    pub fn compile(&self) -> FluentResult<CompiledQuery> {
        placeholder::number(&self.text, &self.params)
    }

    /// Render SQL with `$1, $2, ...` placeholders.
    pub fn to_sql(&self) -> FluentResult<String> {
        Ok(self.compile()?.into_parts().0)
    }

    impl_query_exec! {
        prepare(self) {
            (self.compile()?, self.tag.as_deref())
        }
    }
}

impl From<&str> for Sql {
    fn from(text: &str) -> Self {
        Sql::new(text)
    }
}

impl From<String> for Sql {
    fn from(text: String) -> Self {
        Sql::new(text)
    }
}
