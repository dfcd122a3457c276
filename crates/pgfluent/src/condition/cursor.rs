use super::{Combinator, Cond, Condition, Node};
use crate::error::{FluentError, FluentResult};
use crate::qb::Query;
use crate::value::IntoParams;

/// Which condition tree of a [`Query`] a cursor points into.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum Slot {
    Where,
    Having,
    On(String),
}

enum Anchor<'a> {
    Detached(&'a mut Condition),
    Query { query: &'a mut Query, slot: Slot },
}

/// Mutable cursor into a condition tree.
///
/// The cursor remembers the index path from the root to the branch it
/// currently edits, which is what makes [`parent`](Self::parent) and
/// [`query`](Self::query) possible without back-pointers. Chaining methods
/// consume the cursor and hand it back:
///
/// ```ignore
/// let mut q = pgfluent::select();
/// q.table("users")?.select(["id"]);
/// q.where_or()
///     .add("role", "admin")?
///     .and()?
///     .add("role", "member")?
///     .add("verified", true)?
///     .query()?
///     .limit(10);
/// // WHERE (role = $1) OR ((role = $2) AND (verified = $3)) LIMIT $4
/// ```
pub struct ConditionMut<'a> {
    anchor: Anchor<'a>,
    path: Vec<usize>,
}

impl<'a> ConditionMut<'a> {
    pub(crate) fn detached(root: &'a mut Condition) -> Self {
        Self {
            anchor: Anchor::Detached(root),
            path: Vec::new(),
        }
    }

    pub(crate) fn attached(query: &'a mut Query, slot: Slot, path: Vec<usize>) -> Self {
        Self {
            anchor: Anchor::Query { query, slot },
            path,
        }
    }

    fn current(&self) -> Option<&Condition> {
        let mut node = match &self.anchor {
            Anchor::Detached(root) => &**root,
            Anchor::Query { query, slot } => query.condition_root(slot)?,
        };
        for &offset in &self.path {
            match node.get(offset) {
                Some(Node::Branch(c)) => node = c,
                _ => return None,
            }
        }
        Some(node)
    }

    // Resolving through the query marks it dirty.
    fn current_mut(&mut self) -> FluentResult<&mut Condition> {
        let mut node = match &mut self.anchor {
            Anchor::Detached(root) => &mut **root,
            Anchor::Query { query, slot } => query.condition_root_mut(slot),
        };
        for &offset in &self.path {
            let len = node.len();
            node = node
                .child_branch_mut(offset)
                .ok_or(FluentError::BadOffset { offset, len })?;
        }
        Ok(node)
    }

    /// Append a condition to the current branch.
    pub fn add(mut self, cond: impl Into<Cond>, params: impl IntoParams) -> FluentResult<Self> {
        self.current_mut()?.add(cond, params)?;
        Ok(self)
    }

    /// Append an AND branch and move into it.
    pub fn and(self) -> FluentResult<Self> {
        self.descend(Combinator::And)
    }

    /// Append an OR branch and move into it.
    pub fn or(self) -> FluentResult<Self> {
        self.descend(Combinator::Or)
    }

    fn descend(mut self, combinator: Combinator) -> FluentResult<Self> {
        let offset = self.current_mut()?.push_branch(combinator);
        self.path.push(offset);
        Ok(self)
    }

    /// Move to the enclosing branch.
    pub fn parent(mut self) -> FluentResult<Self> {
        self.path.pop().ok_or(FluentError::NoParent)?;
        Ok(self)
    }

    /// Give back the query this tree belongs to.
    pub fn query(self) -> FluentResult<&'a mut Query> {
        match self.anchor {
            Anchor::Query { query, .. } => Ok(query),
            Anchor::Detached(_) => Err(FluentError::NoQuery),
        }
    }

    pub fn get(&self, offset: usize) -> Option<&Node> {
        self.current()?.get(offset)
    }

    /// Replace the child at `offset` (or append at `offset == len()`).
    pub fn set(
        mut self,
        offset: usize,
        cond: impl Into<Cond>,
        params: impl IntoParams,
    ) -> FluentResult<Self> {
        self.current_mut()?.set(offset, cond, params)?;
        Ok(self)
    }

    pub fn exists(&self, offset: usize) -> bool {
        self.current().is_some_and(|c| c.exists(offset))
    }

    pub fn remove(&mut self, offset: usize) -> FluentResult<Option<Node>> {
        Ok(self.current_mut()?.remove(offset))
    }

    pub fn len(&self) -> usize {
        self.current().map_or(0, Condition::len)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn combinator(&self) -> Combinator {
        self.current().map_or_else(Combinator::default, Condition::combinator)
    }

    /// Depth below the root; `0` at the root.
    pub fn depth(&self) -> usize {
        self.path.len()
    }
}
