//! The fluent [`Query`] facade.

use super::compiler;
use super::expr::{Expr, JoinKind, SelectItem, SetOp, TableKind, TableRef, TableSource};
use super::params::{DataRow, ParamField, QueryParams, QueryType};
use crate::condition::{Combinator, Cond, Condition, ConditionMut, Slot};
use crate::error::{FluentError, FluentResult};
use crate::exec::Statement;
use crate::ident::Ident;
use crate::sql::{CompiledQuery, Sql, number};
use crate::value::{IntoParams, Value};
use std::sync::OnceLock;

/// A SQL statement under construction.
///
/// Mutating methods take `&mut self` and return `&mut Self` (or a
/// [`FluentResult`] of it when the input can be rejected), so calls chain:
///
/// ```ignore
/// let mut q = pgfluent::select();
/// q.table_as("users", "u")?
///     .select(["u.id", "u.name"])
///     .where_("u.active", true)?
///     .order_by(["u.id"])
///     .limit(20);
///
/// let compiled = q.compile()?;
/// // SELECT u.id, u.name FROM users AS u WHERE u.active = $1 ORDER BY u.id LIMIT $2
/// ```
///
/// Structural mistakes (duplicate aliases, a second main table, ...) fail at
/// the offending call; incomplete state (no columns, a join without ON, ...)
/// fails in [`compile`](Self::compile).
///
/// The compiled form is memoized until the next mutation. A `Query` is meant
/// to be owned by one caller; share the [`CompiledQuery`] instead.
#[derive(Debug, Default)]
pub struct Query {
    kind: QueryType,
    pub(crate) params: QueryParams,
    compiled: OnceLock<CompiledQuery>,
    is_final: bool,
}

impl Clone for Query {
    fn clone(&self) -> Self {
        Self {
            kind: self.kind,
            params: self.params.clone(),
            compiled: OnceLock::new(),
            is_final: false,
        }
    }
}

impl PartialEq for Query {
    fn eq(&self, other: &Self) -> bool {
        self.kind == other.kind && self.params == other.params
    }
}

impl Query {
    /// Empty SELECT query.
    pub fn new() -> Self {
        Self::default()
    }

    /// Empty query of the given kind.
    pub fn of(kind: QueryType) -> Self {
        Self {
            kind,
            ..Self::default()
        }
    }

    // Every mutation funnels through here.
    fn params_mut(&mut self) -> &mut QueryParams {
        self.compiled.take();
        &mut self.params
    }

    pub fn query_type(&self) -> QueryType {
        self.kind
    }

    /// Switch the statement kind by name (`"select"`, `"insert"`, ...).
    pub fn set_query_type(&mut self, kind: &str) -> FluentResult<&mut Self> {
        let kind = kind.parse()?;
        self.params_mut();
        self.kind = kind;
        Ok(self)
    }

    fn set_kind(&mut self, kind: QueryType) -> &mut Self {
        self.params_mut();
        self.kind = kind;
        self
    }

    // ==================== Tables ====================

    fn add_table(
        &mut self,
        source: Value,
        alias: Option<&str>,
        kind: TableKind,
    ) -> FluentResult<&mut Self> {
        let source = TableSource::try_from(source)?;
        let alias = match (alias, &source) {
            (Some(alias), _) => alias.to_string(),
            (None, TableSource::Name(name)) => name.clone(),
            (None, other) => return Err(FluentError::AliasRequired(other.describe())),
        };

        if kind == TableKind::Main {
            if let Some(existing) = &self.params.main {
                return Err(FluentError::DuplicateMainTable {
                    alias,
                    existing: existing.clone(),
                });
            }
        }
        if self.params.table(&alias).is_some() {
            return Err(FluentError::DuplicateAlias(alias));
        }

        let params = self.params_mut();
        if kind == TableKind::Main {
            params.main = Some(alias.clone());
        }
        params.tables.push(TableRef {
            alias,
            source,
            kind,
        });
        Ok(self)
    }

    /// Fresh query of `kind` whose main table is the plain name `table`.
    pub(super) fn with_main_table(kind: QueryType, table: &str) -> Self {
        let mut query = Self::of(kind);
        query.params.main = Some(table.to_string());
        query.params.tables.push(TableRef {
            alias: table.to_string(),
            source: TableSource::Name(table.to_string()),
            kind: TableKind::Main,
        });
        query
    }

    /// Register the main table.
    pub fn table(&mut self, source: impl Into<Value>) -> FluentResult<&mut Self> {
        self.add_table(source.into(), None, TableKind::Main)
    }

    /// Register the main table under an alias.
    pub fn table_as(&mut self, source: impl Into<Value>, alias: &str) -> FluentResult<&mut Self> {
        self.add_table(source.into(), Some(alias), TableKind::Main)
    }

    /// Add a FROM table; the first one becomes the main table.
    pub fn from(&mut self, source: impl Into<Value>) -> FluentResult<&mut Self> {
        let kind = self.from_kind();
        self.add_table(source.into(), None, kind)
    }

    pub fn from_as(&mut self, source: impl Into<Value>, alias: &str) -> FluentResult<&mut Self> {
        let kind = self.from_kind();
        self.add_table(source.into(), Some(alias), kind)
    }

    fn from_kind(&self) -> TableKind {
        if self.params.main.is_some() {
            TableKind::From
        } else {
            TableKind::Main
        }
    }

    /// Register a joined table, optionally with its first ON condition.
    ///
    /// Every join except [`JoinKind::Cross`] needs an ON condition by the time
    /// the query compiles; add more with [`on`](Self::on).
    pub fn join(
        &mut self,
        kind: JoinKind,
        source: impl Into<Value>,
        alias: Option<&str>,
        on: Option<Cond>,
    ) -> FluentResult<&mut Self> {
        self.add_table(source.into(), alias, TableKind::Join(kind))?;
        if let Some(on) = on {
            let alias = match alias {
                Some(alias) => alias.to_string(),
                None => self.params.tables.last().map(|t| t.alias.clone()).unwrap_or_default(),
            };
            self.on_cond(&alias, on, ())?;
        }
        Ok(self)
    }

    pub fn inner_join(
        &mut self,
        source: impl Into<Value>,
        alias: &str,
        on: impl Into<Cond>,
    ) -> FluentResult<&mut Self> {
        self.join(JoinKind::Inner, source, Some(alias), Some(on.into()))
    }

    pub fn left_join(
        &mut self,
        source: impl Into<Value>,
        alias: &str,
        on: impl Into<Cond>,
    ) -> FluentResult<&mut Self> {
        self.join(JoinKind::Left, source, Some(alias), Some(on.into()))
    }

    pub fn right_join(
        &mut self,
        source: impl Into<Value>,
        alias: &str,
        on: impl Into<Cond>,
    ) -> FluentResult<&mut Self> {
        self.join(JoinKind::Right, source, Some(alias), Some(on.into()))
    }

    pub fn full_join(
        &mut self,
        source: impl Into<Value>,
        alias: &str,
        on: impl Into<Cond>,
    ) -> FluentResult<&mut Self> {
        self.join(JoinKind::Full, source, Some(alias), Some(on.into()))
    }

    pub fn cross_join(
        &mut self,
        source: impl Into<Value>,
        alias: Option<&str>,
    ) -> FluentResult<&mut Self> {
        self.join(JoinKind::Cross, source, alias, None)
    }

    /// Cursor into the ON condition of the join registered as `alias`.
    pub fn on(&mut self, alias: &str) -> ConditionMut<'_> {
        let slot = Slot::On(alias.to_string());
        self.condition_root_mut(&slot);
        ConditionMut::attached(self, slot, Vec::new())
    }

    /// Add one condition to the ON clause of `alias`.
    pub fn on_cond(
        &mut self,
        alias: &str,
        cond: impl Into<Cond>,
        params: impl IntoParams,
    ) -> FluentResult<&mut Self> {
        self.condition_root_mut(&Slot::On(alias.to_string()))
            .add(cond, params)?;
        Ok(self)
    }

    // ==================== Conditions ====================

    pub(crate) fn condition_root(&self, slot: &Slot) -> Option<&Condition> {
        match slot {
            Slot::Where => self.params.where_.as_ref(),
            Slot::Having => self.params.having.as_ref(),
            Slot::On(alias) => self.params.joins.get(alias),
        }
    }

    /// Root of a condition tree, created (as AND) on first use.
    pub(crate) fn condition_root_mut(&mut self, slot: &Slot) -> &mut Condition {
        let params = self.params_mut();
        match slot {
            Slot::Where => params.where_.get_or_insert_with(Condition::default),
            Slot::Having => params.having.get_or_insert_with(Condition::default),
            Slot::On(alias) => params.joins.entry(alias.clone()).or_default(),
        }
    }

    fn nested(&mut self, slot: Slot, combinator: Combinator) -> ConditionMut<'_> {
        let offset = self.condition_root_mut(&slot).push_branch(combinator);
        ConditionMut::attached(self, slot, vec![offset])
    }

    /// AND a condition into WHERE.
    ///
    /// With zero `?` markers and one parameter the comparison is inferred:
    /// `where_("id", 5)` is `id = ?`, `where_("id", Value::array([1, 2]))` is
    /// `id IN (?)` and `where_("deleted_at", Value::Null)` is
    /// `deleted_at IS NULL`.
    pub fn where_(&mut self, cond: impl Into<Cond>, params: impl IntoParams) -> FluentResult<&mut Self> {
        self.condition_root_mut(&Slot::Where).add(cond, params)?;
        Ok(self)
    }

    /// Open a nested AND group inside WHERE.
    pub fn where_and(&mut self) -> ConditionMut<'_> {
        self.nested(Slot::Where, Combinator::And)
    }

    /// Open a nested OR group inside WHERE.
    pub fn where_or(&mut self) -> ConditionMut<'_> {
        self.nested(Slot::Where, Combinator::Or)
    }

    pub fn having(&mut self, cond: impl Into<Cond>, params: impl IntoParams) -> FluentResult<&mut Self> {
        self.condition_root_mut(&Slot::Having).add(cond, params)?;
        Ok(self)
    }

    pub fn having_and(&mut self) -> ConditionMut<'_> {
        self.nested(Slot::Having, Combinator::And)
    }

    pub fn having_or(&mut self) -> ConditionMut<'_> {
        self.nested(Slot::Having, Combinator::Or)
    }

    // ==================== SELECT ====================

    /// Append select-list items.
    pub fn select<E: Into<Expr>>(&mut self, items: impl IntoIterator<Item = E>) -> &mut Self {
        let items = items.into_iter().map(|e| SelectItem {
            alias: None,
            expr: e.into(),
        });
        self.params_mut().select.extend(items);
        self
    }

    /// Append one select-list item emitted as `expr AS "alias"`.
    pub fn select_as(&mut self, alias: &str, expr: impl Into<Expr>) -> FluentResult<&mut Self> {
        Ident::quoted(alias)?;
        self.params_mut().select.push(SelectItem {
            alias: Some(alias.to_string()),
            expr: expr.into(),
        });
        Ok(self)
    }

    pub fn distinct(&mut self, distinct: bool) -> &mut Self {
        self.params_mut().distinct = distinct;
        self
    }

    pub fn group_by<E: Into<Expr>>(&mut self, items: impl IntoIterator<Item = E>) -> &mut Self {
        self.params_mut()
            .group_by
            .extend(items.into_iter().map(Into::into));
        self
    }

    pub fn order_by<E: Into<Expr>>(&mut self, items: impl IntoIterator<Item = E>) -> &mut Self {
        self.params_mut()
            .order_by
            .extend(items.into_iter().map(Into::into));
        self
    }

    /// `LIMIT ?`, bound as a parameter.
    pub fn limit(&mut self, limit: i64) -> &mut Self {
        self.params_mut().limit = Some(limit);
        self
    }

    /// `OFFSET ?`, bound as a parameter.
    pub fn offset(&mut self, offset: i64) -> &mut Self {
        self.params_mut().offset = Some(offset);
        self
    }

    fn combine(&mut self, op: SetOp, other: Value) -> FluentResult<&mut Self> {
        match other {
            Value::Query(_) | Value::Sql(_) => {
                self.params_mut().combine.push((op, other));
                Ok(self)
            }
            other => Err(FluentError::InvalidColumnType(format!(
                "{} cannot be combined with {}",
                other.describe(),
                op.keyword()
            ))),
        }
    }

    /// Append `UNION (other)`; `other` is a [`Query`] or [`Sql`].
    pub fn union(&mut self, other: impl Into<Value>) -> FluentResult<&mut Self> {
        self.combine(SetOp::Union, other.into())
    }

    pub fn union_all(&mut self, other: impl Into<Value>) -> FluentResult<&mut Self> {
        self.combine(SetOp::UnionAll, other.into())
    }

    pub fn intersect(&mut self, other: impl Into<Value>) -> FluentResult<&mut Self> {
        self.combine(SetOp::Intersect, other.into())
    }

    pub fn except(&mut self, other: impl Into<Value>) -> FluentResult<&mut Self> {
        self.combine(SetOp::Except, other.into())
    }

    // ==================== INSERT / UPDATE / DELETE / TRUNCATE ====================

    /// Turn this into an INSERT into `table`.
    pub fn insert(&mut self, table: impl Into<Value>) -> FluentResult<&mut Self> {
        self.set_kind(QueryType::Insert).table(table)
    }

    /// Explicit INSERT column list.
    pub fn columns<S: Into<String>>(&mut self, columns: impl IntoIterator<Item = S>) -> FluentResult<&mut Self> {
        let columns = validated_columns(columns)?;
        self.params_mut().columns.extend(columns);
        Ok(self)
    }

    /// Merge column values into the data row; later keys win.
    pub fn values<K, V>(&mut self, data: impl IntoIterator<Item = (K, V)>) -> FluentResult<&mut Self>
    where
        K: Into<String>,
        V: Into<Value>,
    {
        let row = data_row(data)?;
        QueryParams::merge_into(&mut self.params_mut().data, row);
        Ok(self)
    }

    /// Append whole rows for a multi-row INSERT.
    pub fn rows<R, K, V>(&mut self, rows: impl IntoIterator<Item = R>) -> FluentResult<&mut Self>
    where
        R: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<Value>,
    {
        let rows = rows.into_iter().map(data_row).collect::<FluentResult<Vec<_>>>()?;
        self.params_mut().rows.extend(rows);
        Ok(self)
    }

    /// INSERT ... SELECT: insert the result of `source`.
    pub fn select_source(&mut self, source: Query) -> &mut Self {
        self.params_mut().source = Some(Box::new(source));
        self
    }

    /// Turn this into an UPDATE of `table`.
    pub fn update(&mut self, table: impl Into<Value>) -> FluentResult<&mut Self> {
        self.set_kind(QueryType::Update).table(table)
    }

    /// `SET column = value`; merges into the data row like [`values`](Self::values).
    pub fn set(&mut self, column: impl Into<String>, value: impl Into<Value>) -> FluentResult<&mut Self> {
        self.values([(column.into(), value.into())])
    }

    /// Turn this into a DELETE from `table`.
    pub fn delete(&mut self, table: impl Into<Value>) -> FluentResult<&mut Self> {
        self.set_kind(QueryType::Delete).table(table)
    }

    /// Turn this into a TRUNCATE of `table`.
    pub fn truncate(&mut self, table: impl Into<Value>) -> FluentResult<&mut Self> {
        self.set_kind(QueryType::Truncate).table(table)
    }

    pub fn returning<E: Into<Expr>>(&mut self, items: impl IntoIterator<Item = E>) -> &mut Self {
        let items = items.into_iter().map(|e| SelectItem {
            alias: None,
            expr: e.into(),
        });
        self.params_mut().returning.extend(items);
        self
    }

    pub fn returning_as(&mut self, alias: &str, expr: impl Into<Expr>) -> FluentResult<&mut Self> {
        Ident::quoted(alias)?;
        self.params_mut().returning.push(SelectItem {
            alias: Some(alias.to_string()),
            expr: expr.into(),
        });
        Ok(self)
    }

    // ==================== Prefix / suffix / reset ====================

    /// Fragment emitted before the statement, e.g. a `WITH` clause.
    pub fn prefix(&mut self, fragment: impl Into<Sql>) -> &mut Self {
        self.params_mut().prefix.push(fragment.into());
        self
    }

    /// Fragment emitted after the statement body, e.g. `FOR UPDATE`.
    pub fn suffix(&mut self, fragment: impl Into<Sql>) -> &mut Self {
        self.params_mut().suffix.push(fragment.into());
        self
    }

    /// Reset one field by name (`"where"`, `"order"`, `"limit"`, ...).
    pub fn reset(&mut self, field: &str) -> FluentResult<&mut Self> {
        let field: ParamField = field.parse()?;
        Ok(self.reset_field(field))
    }

    pub fn reset_field(&mut self, field: ParamField) -> &mut Self {
        self.params_mut().reset(field);
        self
    }

    // ==================== Compilation ====================

    /// Compile into `?` form without numbering.
    pub fn to_fragment(&self) -> FluentResult<Sql> {
        compiler::compile(self.kind, &self.params)
    }

    /// Compile into SQL with `$n` placeholders and the flat parameter list.
    ///
    /// Memoized: a second call without mutation in between returns the same
    /// result without recompiling.
    pub fn compile(&self) -> FluentResult<CompiledQuery> {
        if let Some(compiled) = self.compiled.get() {
            return Ok(compiled.clone());
        }
        let fragment = self.to_fragment()?;
        let compiled = number(fragment.text(), fragment.params())?;

        #[cfg(feature = "tracing")]
        tracing::trace!(
            target: "pgfluent.compile",
            query_type = %self.kind,
            param_count = compiled.params().len(),
            sql = %compiled.sql(),
            "compiled query"
        );

        Ok(self.compiled.get_or_init(|| compiled).clone())
    }

    pub fn to_sql(&self) -> FluentResult<String> {
        Ok(self.compile()?.into_parts().0)
    }

    pub fn params(&self) -> FluentResult<Vec<Value>> {
        Ok(self.compile()?.into_parts().1)
    }

    // ==================== Execution ====================

    /// Mark the query as handed to a connection. Checked by [`Statement`].
    pub fn mark_final(&mut self) -> &mut Self {
        self.is_final = true;
        self
    }

    pub fn is_final(&self) -> bool {
        self.is_final
    }

    /// Bind this query to a client for execution.
    pub fn bind_to<C: crate::client::GenericClient>(self, client: &C) -> Statement<'_, C> {
        Statement::new(self, client)
    }

    impl_query_exec! {
        prepare(self) {
            (self.compile()?, None::<&str>)
        }
    }
}

fn validated_columns<S: Into<String>>(columns: impl IntoIterator<Item = S>) -> FluentResult<Vec<String>> {
    columns
        .into_iter()
        .map(|c| {
            let c = c.into();
            Ident::parse(&c)?;
            Ok(c)
        })
        .collect()
}

fn data_row<K, V>(data: impl IntoIterator<Item = (K, V)>) -> FluentResult<DataRow>
where
    K: Into<String>,
    V: Into<Value>,
{
    let mut row = DataRow::new();
    for (column, value) in data {
        let column = column.into();
        Ident::parse(&column)?;
        let value = value.into();
        if matches!(value, Value::Array(_)) {
            return Err(FluentError::ArrayInData(column));
        }
        QueryParams::merge_into(&mut row, vec![(column, value)]);
    }
    Ok(row)
}
