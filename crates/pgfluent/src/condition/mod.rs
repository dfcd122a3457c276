//! AND/OR condition trees for WHERE, HAVING and JOIN ... ON clauses.
//!
//! A [`Condition`] is a branch: a combinator plus an ordered list of children,
//! each either a [`Leaf`] (a `?`-form SQL fragment with its parameters) or a
//! nested [`Condition`]. Branches own their children outright; navigation back
//! up the tree goes through [`ConditionMut`], which addresses nodes by their
//! index path from the root.
//!
//! # Example
//!
//! ```ignore
//! use pgfluent::{Condition, Cond};
//!
//! let mut c = Condition::and(["deleted_at IS NULL"]);
//! c.add("status", "active")?;
//! c.add(Condition::or(["role = 'admin'", "role = 'owner'"]), ())?;
//!
//! // (deleted_at IS NULL) AND (status = ?) AND ((role = 'admin') OR (role = 'owner'))
//! ```

mod cursor;


pub use cursor::ConditionMut;
pub(crate) use cursor::Slot;

use crate::error::{FluentError, FluentResult};
use crate::sql::{CompiledQuery, Sql, number, placeholder::count_placeholders};
use crate::value::{IntoParams, Value};

/// How the children of a [`Condition`] are joined.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Combinator {
    #[default]
    And,
    Or,
}

impl Combinator {
    pub fn keyword(self) -> &'static str {
        match self {
            Combinator::And => "AND",
            Combinator::Or => "OR",
        }
    }
}

/// Atomic predicate: `?`-form text plus the parameters it consumes.
#[derive(Debug, Clone, PartialEq)]
pub struct Leaf {
    sql: String,
    params: Vec<Value>,
}

impl Leaf {
    pub fn sql(&self) -> &str {
        &self.sql
    }

    pub fn params(&self) -> &[Value] {
        &self.params
    }

    /// Emit this leaf, inferring the placeholder for a lone parameter.
    ///
    /// With zero `?` markers and exactly one parameter the predicate is
    /// completed as `IN (?)` for arrays and sub-queries, `IS NULL` for null
    /// (the parameter is dropped) and `= ?` otherwise.
    fn compile_into(&self, out: &mut String, params: &mut Vec<Value>) -> FluentResult<()> {
        let expected = count_placeholders(&self.sql);
        let actual = self.params.len();
        out.push_str(&self.sql);

        if expected == actual {
            params.extend_from_slice(&self.params);
            return Ok(());
        }
        match self.params.as_slice() {
            [value] if expected == 0 => {
                if value.is_list_like() {
                    out.push_str(" IN (?)");
                    params.push(value.clone());
                } else if value.is_null() {
                    out.push_str(" IS NULL");
                } else {
                    out.push_str(" = ?");
                    params.push(value.clone());
                }
                Ok(())
            }
            _ => Err(FluentError::BadParamCount {
                fragment: self.sql.clone(),
                expected,
                actual,
            }),
        }
    }
}

/// A child of a [`Condition`].
#[derive(Debug, Clone, PartialEq)]
pub enum Node {
    Leaf(Leaf),
    Branch(Condition),
}

impl Node {
    fn is_blank(&self) -> bool {
        match self {
            Node::Leaf(_) => false,
            Node::Branch(c) => c.is_blank(),
        }
    }

    fn compile_into(
        &self,
        out: &mut String,
        params: &mut Vec<Value>,
        wrap: bool,
    ) -> FluentResult<()> {
        match self {
            Node::Leaf(leaf) if wrap => {
                out.push('(');
                leaf.compile_into(out, params)?;
                out.push(')');
                Ok(())
            }
            Node::Leaf(leaf) => leaf.compile_into(out, params),
            Node::Branch(c) => c.compile_into(out, params, wrap),
        }
    }
}

/// Input accepted wherever a condition is added.
///
/// Only [`Cond::Text`] may come with extra parameters; fragments carry their
/// own and branches are already complete.
#[derive(Debug, Clone, PartialEq)]
pub enum Cond {
    Text(String),
    Sql(Sql),
    Branch(Condition),
}

impl Cond {
    /// Turn this input and its parameters into a tree node.
    pub(crate) fn into_node(self, params: Vec<Value>) -> FluentResult<Node> {
        match self {
            Cond::Text(sql) => Ok(Node::Leaf(Leaf { sql, params })),
            other if params.is_empty() => Ok(other.into_bare_node()),
            _ => Err(FluentError::OnlyStringConditionCanHaveParams(params.len())),
        }
    }

    fn into_bare_node(self) -> Node {
        match self {
            Cond::Text(sql) => Node::Leaf(Leaf {
                sql,
                params: Vec::new(),
            }),
            Cond::Sql(fragment) => Node::Leaf(Leaf {
                sql: "?".to_string(),
                params: vec![Value::Sql(fragment)],
            }),
            Cond::Branch(c) => Node::Branch(c),
        }
    }
}

impl From<&str> for Cond {
    fn from(s: &str) -> Self {
        Cond::Text(s.to_string())
    }
}

impl From<String> for Cond {
    fn from(s: String) -> Self {
        Cond::Text(s)
    }
}

impl From<&String> for Cond {
    fn from(s: &String) -> Self {
        Cond::Text(s.clone())
    }
}

impl From<Sql> for Cond {
    fn from(s: Sql) -> Self {
        Cond::Sql(s)
    }
}

impl From<Condition> for Cond {
    fn from(c: Condition) -> Self {
        Cond::Branch(c)
    }
}

/// A branch of the condition tree.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Condition {
    combinator: Combinator,
    children: Vec<Node>,
}

impl Condition {
    /// Empty branch with the given combinator.
    pub fn new(combinator: Combinator) -> Self {
        Self {
            combinator,
            children: Vec::new(),
        }
    }

    /// AND branch seeded with parameterless conditions.
    pub fn and<C: Into<Cond>>(conditions: impl IntoIterator<Item = C>) -> Self {
        Self::with_children(Combinator::And, conditions)
    }

    /// OR branch seeded with parameterless conditions.
    pub fn or<C: Into<Cond>>(conditions: impl IntoIterator<Item = C>) -> Self {
        Self::with_children(Combinator::Or, conditions)
    }

    fn with_children<C: Into<Cond>>(
        combinator: Combinator,
        conditions: impl IntoIterator<Item = C>,
    ) -> Self {
        let children = conditions
            .into_iter()
            .map(|c| c.into().into_bare_node())
            .collect();
        Self {
            combinator,
            children,
        }
    }

    pub fn combinator(&self) -> Combinator {
        self.combinator
    }

    /// Append a condition.
    ///
    /// `params` may only be non-empty for plain-text conditions; with zero `?`
    /// markers and one parameter the comparison is inferred at compile time.
    pub fn add(
        &mut self,
        cond: impl Into<Cond>,
        params: impl IntoParams,
    ) -> FluentResult<&mut Self> {
        let node = cond.into().into_node(params.into_params())?;
        self.children.push(node);
        Ok(self)
    }

    pub(crate) fn push_branch(&mut self, combinator: Combinator) -> usize {
        self.children.push(Node::Branch(Condition::new(combinator)));
        self.children.len() - 1
    }

    pub fn get(&self, offset: usize) -> Option<&Node> {
        self.children.get(offset)
    }

    /// Replace the child at `offset`, or append when `offset == len()`.
    pub fn set(
        &mut self,
        offset: usize,
        cond: impl Into<Cond>,
        params: impl IntoParams,
    ) -> FluentResult<&mut Self> {
        let len = self.children.len();
        if offset > len {
            return Err(FluentError::BadOffset { offset, len });
        }
        let node = cond.into().into_node(params.into_params())?;
        if offset == len {
            self.children.push(node);
        } else {
            self.children[offset] = node;
        }
        Ok(self)
    }

    pub fn exists(&self, offset: usize) -> bool {
        offset < self.children.len()
    }

    /// Remove and return the child at `offset`.
    pub fn remove(&mut self, offset: usize) -> Option<Node> {
        (offset < self.children.len()).then(|| self.children.remove(offset))
    }

    pub fn len(&self) -> usize {
        self.children.len()
    }

    pub fn is_empty(&self) -> bool {
        self.children.is_empty()
    }

    /// Whether compiling this branch produces no text at all.
    pub(crate) fn is_blank(&self) -> bool {
        self.children.iter().all(Node::is_blank)
    }

    /// Navigate this tree with a cursor.
    pub fn cursor(&mut self) -> ConditionMut<'_> {
        ConditionMut::detached(self)
    }

    pub(crate) fn child_branch_mut(&mut self, offset: usize) -> Option<&mut Condition> {
        match self.children.get_mut(offset) {
            Some(Node::Branch(c)) => Some(c),
            _ => None,
        }
    }

    /// Append the `?`-form text of this branch to `out` and its parameters to
    /// `params`.
    ///
    /// A single (non-blank) child is emitted bare and inherits `wrap`; two or
    /// more are each wrapped in parentheses and joined by the combinator, and
    /// the whole group is parenthesized when `wrap` is set.
    pub(crate) fn compile_into(
        &self,
        out: &mut String,
        params: &mut Vec<Value>,
        wrap: bool,
    ) -> FluentResult<()> {
        let children: Vec<&Node> = self.children.iter().filter(|n| !n.is_blank()).collect();
        match children.as_slice() {
            [] => Ok(()),
            [only] => only.compile_into(out, params, wrap),
            many => {
                if wrap {
                    out.push('(');
                }
                for (i, child) in many.iter().enumerate() {
                    if i > 0 {
                        out.push(' ');
                        out.push_str(self.combinator.keyword());
                        out.push(' ');
                    }
                    child.compile_into(out, params, true)?;
                }
                if wrap {
                    out.push(')');
                }
                Ok(())
            }
        }
    }

    /// Compile into an un-numbered fragment.
    pub fn to_fragment(&self) -> FluentResult<Sql> {
        let mut text = String::new();
        let mut params = Vec::new();
        self.compile_into(&mut text, &mut params, false)?;
        let mut fragment = Sql::empty();
        fragment.push_fragment(&text, &params);
        Ok(fragment)
    }

    /// Compile and number the placeholders.
    pub fn compile(&self) -> FluentResult<CompiledQuery> {
        let fragment = self.to_fragment()?;
        number(fragment.text(), fragment.params())
    }
}
