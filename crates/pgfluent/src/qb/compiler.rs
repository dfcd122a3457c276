//! Compiles [`QueryParams`] into a `?`-form [`Sql`] fragment.
//!
//! Each clause appends its text and its parameters to one shared fragment in
//! a fixed order; that order is the parameter-position contract. Numbering
//! into `$n` happens afterwards, in one pass over the whole fragment.

use super::expr::{Expr, JoinKind, SelectItem, TableKind, TableRef, TableSource};
use super::params::{DataRow, QueryParams, QueryType};
use crate::condition::Condition;
use crate::error::{FluentError, FluentResult};
use crate::ident::Ident;
use crate::sql::Sql;
use crate::value::Value;

pub(crate) fn compile(kind: QueryType, params: &QueryParams) -> FluentResult<Sql> {
    let mut compiler = Compiler {
        p: params,
        out: Sql::empty(),
    };
    match kind {
        QueryType::Select => compiler.select()?,
        QueryType::Insert => compiler.insert()?,
        QueryType::Update => compiler.update()?,
        QueryType::Delete => compiler.delete()?,
        QueryType::Truncate => compiler.truncate()?,
    }
    Ok(compiler.out)
}

struct Compiler<'p> {
    p: &'p QueryParams,
    out: Sql,
}

impl<'p> Compiler<'p> {
    // ── statements ──

    fn select(&mut self) -> FluentResult<()> {
        self.prefix();
        self.select_body()?;
        self.combine();
        self.suffix();
        Ok(())
    }

    fn select_body(&mut self) -> FluentResult<()> {
        let p = self.p;
        if p.select.is_empty() {
            return Err(FluentError::NoColumnsToSelect);
        }
        self.out.push(if p.distinct {
            "SELECT DISTINCT "
        } else {
            "SELECT "
        });
        self.items(&p.select)?;

        if !p.tables.is_empty() {
            let main = self.main_table("SELECT")?;
            self.out.push(" FROM ");
            self.table(main);
            for t in p.tables_of(TableKind::From) {
                self.out.push(", ");
                self.table(t);
            }
            self.joins()?;
        }

        self.condition(" WHERE ", p.where_.as_ref())?;
        if !p.group_by.is_empty() {
            self.out.push(" GROUP BY ");
            self.exprs(&p.group_by);
        }
        self.condition(" HAVING ", p.having.as_ref())?;
        if !p.order_by.is_empty() {
            self.out.push(" ORDER BY ");
            self.exprs(&p.order_by);
        }
        if let Some(limit) = p.limit {
            self.out.limit(limit);
        }
        if let Some(offset) = p.offset {
            self.out.offset(offset);
        }
        Ok(())
    }

    fn insert(&mut self) -> FluentResult<()> {
        let p = self.p;
        let main = self.main_table("INSERT")?;
        self.prefix();
        self.out.push("INSERT INTO ");
        self.table_name(main);

        if let Some(source) = p.source.as_deref() {
            let columns = if p.columns.is_empty() {
                inferred_columns(&source.params.select)
            } else {
                parsed_columns(&p.columns)?
            };
            self.column_list(&columns);
            self.out.push(" ");
            let fragment = source.to_fragment()?;
            self.out.push_fragment(fragment.text(), fragment.params());
        } else {
            let rows: Vec<&DataRow> = std::iter::once(&p.data)
                .chain(&p.rows)
                .filter(|row| !row.is_empty())
                .collect();
            if rows.is_empty() {
                return Err(FluentError::NoDataToInsert(main.alias.clone()));
            }
            let names = if p.columns.is_empty() {
                collect_columns(&rows)
            } else {
                p.columns.clone()
            };
            self.column_list(&parsed_columns(&names)?);
            self.out.push(" VALUES");
            for (i, row) in rows.iter().enumerate() {
                if i > 0 {
                    self.out.push(",");
                }
                self.out.push(if i > 0 { " (" } else { "(" });
                for (j, name) in names.iter().enumerate() {
                    if j > 0 {
                        self.out.push(", ");
                    }
                    match row.iter().find(|(c, _)| c == name) {
                        Some((_, value)) => self.value(value),
                        None => {
                            self.out.push("DEFAULT");
                        }
                    }
                }
                self.out.push(")");
            }
        }

        self.suffix();
        self.returning()?;
        Ok(())
    }

    fn update(&mut self) -> FluentResult<()> {
        let p = self.p;
        let main = self.main_table("UPDATE")?;
        if p.data.is_empty() {
            return Err(FluentError::NoDataToUpdate(main.alias.clone()));
        }
        self.prefix();
        self.out.push("UPDATE ");
        self.table(main);
        self.out.push(" SET ");
        for (i, (column, value)) in p.data.iter().enumerate() {
            if i > 0 {
                self.out.push(", ");
            }
            self.out.push_ident_ref(&Ident::parse(column)?);
            self.out.push(" = ");
            self.value(value);
        }

        let mut extra = p.tables_of(TableKind::From).peekable();
        // Postgres only accepts joins hanging off the UPDATE's FROM list.
        if extra.peek().is_none() && p.joined_tables().next().is_some() {
            return Err(FluentError::UpdateJoinWithoutFrom(main.alias.clone()));
        }
        if extra.peek().is_some() {
            self.out.push(" FROM ");
            for (i, t) in extra.enumerate() {
                if i > 0 {
                    self.out.push(", ");
                }
                self.table(t);
            }
        }
        self.joins()?;
        self.condition(" WHERE ", p.where_.as_ref())?;
        self.suffix();
        self.returning()?;
        Ok(())
    }

    fn delete(&mut self) -> FluentResult<()> {
        let main = self.main_table("DELETE")?;
        self.prefix();
        self.out.push("DELETE FROM ");
        self.table(main);
        let p = self.p;
        self.condition(" WHERE ", p.where_.as_ref())?;
        self.suffix();
        self.returning()?;
        Ok(())
    }

    fn truncate(&mut self) -> FluentResult<()> {
        let main = self.main_table("TRUNCATE")?;
        self.out.push("TRUNCATE ");
        self.table_name(main);
        self.suffix();
        Ok(())
    }

    // ── clauses ──

    fn main_table(&self, statement: &'static str) -> FluentResult<&'p TableRef> {
        let p = self.p;
        p.main_table().ok_or(FluentError::NoMainTable(statement))
    }

    fn prefix(&mut self) {
        let p = self.p;
        for fragment in &p.prefix {
            self.out.push_fragment(fragment.text(), fragment.params());
            self.out.push(" ");
        }
    }

    fn suffix(&mut self) {
        let p = self.p;
        for fragment in &p.suffix {
            self.out.push(" ");
            self.out.push_fragment(fragment.text(), fragment.params());
        }
    }

    fn combine(&mut self) {
        let p = self.p;
        for (op, query) in &p.combine {
            self.out.push(" ");
            self.out.push(op.keyword());
            self.out.push(" (");
            self.out.push_bind(query.clone());
            self.out.push(")");
        }
    }

    fn joins(&mut self) -> FluentResult<()> {
        let p = self.p;
        for t in p.joined_tables() {
            let TableKind::Join(kind) = t.kind else {
                continue;
            };
            self.out.push(" ");
            self.out.push(kind.keyword());
            self.out.push(" ");
            self.table(t);
            if kind == JoinKind::Cross {
                continue;
            }
            let on = p
                .joins
                .get(&t.alias)
                .filter(|c| !c.is_blank())
                .ok_or_else(|| FluentError::NoJoinConditions(t.alias.clone()))?;
            self.condition(" ON ", Some(on))?;
        }
        Ok(())
    }

    fn condition(&mut self, keyword: &str, condition: Option<&Condition>) -> FluentResult<()> {
        let Some(condition) = condition.filter(|c| !c.is_blank()) else {
            return Ok(());
        };
        let mut text = String::new();
        let mut params = Vec::new();
        condition.compile_into(&mut text, &mut params, false)?;
        self.out.push(keyword);
        self.out.push_fragment(&text, &params);
        Ok(())
    }

    fn returning(&mut self) -> FluentResult<()> {
        let p = self.p;
        if p.returning.is_empty() {
            return Ok(());
        }
        self.out.push(" RETURNING ");
        self.items(&p.returning)
    }

    // ── pieces ──

    fn table(&mut self, t: &TableRef) {
        match &t.source {
            TableSource::Name(name) => {
                self.out.push(name);
                if *name == t.alias {
                    return;
                }
            }
            TableSource::Sql(fragment) => {
                self.out.push_bind(fragment.clone());
            }
            TableSource::Query(query) => {
                self.out.push("(");
                self.out.push_bind(Value::Query(query.clone()));
                self.out.push(")");
            }
        }
        self.out.push(" AS ");
        self.out.push(&t.alias);
    }

    /// Target of INSERT/TRUNCATE, which take no alias.
    fn table_name(&mut self, t: &TableRef) {
        match &t.source {
            TableSource::Name(name) => {
                self.out.push(name);
            }
            _ => self.table(t),
        }
    }

    fn items(&mut self, items: &[SelectItem]) -> FluentResult<()> {
        for (i, item) in items.iter().enumerate() {
            if i > 0 {
                self.out.push(", ");
            }
            self.expr(&item.expr);
            if let Some(alias) = &item.alias {
                self.out.push(" AS ");
                self.out.push_ident_ref(&Ident::quoted(alias)?);
            }
        }
        Ok(())
    }

    fn exprs(&mut self, exprs: &[Expr]) {
        for (i, expr) in exprs.iter().enumerate() {
            if i > 0 {
                self.out.push(", ");
            }
            self.expr(expr);
        }
    }

    fn expr(&mut self, expr: &Expr) {
        match expr {
            Expr::Raw(sql) => {
                self.out.push(sql);
            }
            Expr::Value(value) => self.value(value),
        }
    }

    /// Substitute a bound value: booleans are inlined, sub-queries
    /// parenthesized, everything else becomes a placeholder.
    fn value(&mut self, value: &Value) {
        match value {
            Value::Bool(true) => {
                self.out.push("TRUE");
            }
            Value::Bool(false) => {
                self.out.push("FALSE");
            }
            Value::Query(_) => {
                self.out.push("(");
                self.out.push_bind(value.clone());
                self.out.push(")");
            }
            other => {
                self.out.push_bind(other.clone());
            }
        }
    }

    fn column_list(&mut self, columns: &[Ident]) {
        if columns.is_empty() {
            return;
        }
        self.out.push("(");
        for (i, column) in columns.iter().enumerate() {
            if i > 0 {
                self.out.push(", ");
            }
            self.out.push_ident_ref(column);
        }
        self.out.push(")");
    }
}

/// Union of the row keys, in first-seen order.
fn collect_columns(rows: &[&DataRow]) -> Vec<String> {
    let mut names: Vec<String> = Vec::new();
    for row in rows {
        for (column, _) in row.iter() {
            if !names.contains(column) {
                names.push(column.clone());
            }
        }
    }
    names
}

fn parsed_columns(names: &[String]) -> FluentResult<Vec<Ident>> {
    names.iter().map(|n| Ident::parse(n)).collect()
}

/// Column list for INSERT ... SELECT, taken from the select aliases.
/// Empty (no list emitted) unless every item names a column.
fn inferred_columns(select: &[SelectItem]) -> Vec<Ident> {
    select
        .iter()
        .map(|item| match &item.alias {
            Some(alias) => Ident::quoted(alias).ok(),
            None => item.expr.column_ident(),
        })
        .collect::<Option<Vec<_>>>()
        .unwrap_or_default()
}
