//! Update expressions.
//!
//! An [`Update`] is an ordered list of statements. Compiling it prepares
//! every statement and the optional condition on one shared
//! [`ExpressionContext`], collapses statements that target the same path
//! (the later statement wins, the earlier position is kept) and renders the
//! clauses in `SET ADD REMOVE DELETE` order:
//!
//! ```text
//! SET #A = :B, #C = if_not_exists(#C, :D) ADD #E :F REMOVE #G
//! ```

use std::collections::HashMap;
use std::fmt;

use dynamap_model::AttributeValue;
use indexmap::IndexMap;
use tracing::trace;

use crate::condition::{Condition, bind_typed};
use crate::config::CompilerConfig;
use crate::error::ExpressionError;
use crate::path::{Path, ResolvedPath};
use crate::placeholder::ExpressionContext;
use crate::registry::{EntitySchema, Literal};

/// Arithmetic operators allowed in `SET` values.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MathOp {
    /// `+`
    Add,
    /// `-`
    Subtract,
}

impl fmt::Display for MathOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Add => "+",
            Self::Subtract => "-",
        })
    }
}

/// The right-hand side of an update statement.
#[derive(Debug, Clone, PartialEq)]
pub enum ValueExpr {
    /// A literal.
    Constant(AttributeValue),
    /// The current value of another attribute.
    PathRef(Path),
    /// `a + b` or `a - b`.
    Math(Box<ValueExpr>, MathOp, Box<ValueExpr>),
    /// `list_append(a, b)`.
    ListAppend(Box<ValueExpr>, Box<ValueExpr>),
}

impl ValueExpr {
    /// A literal operand.
    #[must_use]
    pub fn value(value: impl Literal) -> Self {
        Self::Constant(value.into_attribute_value())
    }

    /// An attribute operand.
    #[must_use]
    pub fn path(path: impl Into<Path>) -> Self {
        Self::PathRef(path.into())
    }

    /// `self + other`.
    #[must_use]
    pub fn plus(self, other: impl Into<ValueExpr>) -> Self {
        Self::Math(Box::new(self), MathOp::Add, Box::new(other.into()))
    }

    /// `self - other`.
    #[must_use]
    pub fn minus(self, other: impl Into<ValueExpr>) -> Self {
        Self::Math(Box::new(self), MathOp::Subtract, Box::new(other.into()))
    }

    /// `list_append(head, tail)`.
    #[must_use]
    pub fn list_append(head: impl Into<ValueExpr>, tail: impl Into<ValueExpr>) -> Self {
        Self::ListAppend(Box::new(head.into()), Box::new(tail.into()))
    }

    /// Bind placeholders and render, recording what was bound in `used`.
    ///
    /// A top-level constant is checked against `target`'s declared type.
    fn prepare(
        &self,
        ctx: &mut ExpressionContext,
        schema: &dyn EntitySchema,
        target: Option<&ResolvedPath>,
        used: &mut Placeholders,
    ) -> Result<String, ExpressionError> {
        match self {
            Self::Constant(value) => {
                let bound = match target {
                    Some(path) => bind_typed(ctx, path, value)?,
                    None => ctx.bind_value(value.clone())?,
                };
                used.values.insert(bound.placeholder.clone(), bound.value);
                Ok(bound.placeholder)
            }
            Self::PathRef(path) => {
                let resolved = path.resolve(ctx, schema)?;
                used.names.extend(resolved.names);
                Ok(resolved.expression)
            }
            Self::Math(left, op, right) => {
                let left = left.prepare(ctx, schema, None, used)?;
                let right = right.prepare(ctx, schema, None, used)?;
                Ok(format!("{left} {op} {right}"))
            }
            Self::ListAppend(head, tail) => {
                let head = head.prepare(ctx, schema, None, used)?;
                let tail = tail.prepare(ctx, schema, None, used)?;
                Ok(format!("list_append({head}, {tail})"))
            }
        }
    }
}

impl<L: Literal> From<L> for ValueExpr {
    fn from(value: L) -> Self {
        Self::value(value)
    }
}

impl From<Path> for ValueExpr {
    fn from(path: Path) -> Self {
        Self::PathRef(path)
    }
}

impl From<&Path> for ValueExpr {
    fn from(path: &Path) -> Self {
        Self::PathRef(path.clone())
    }
}

/// One update statement.
#[derive(Debug, Clone, PartialEq)]
pub enum UpdateStatement {
    /// `SET path = value`, or `SET path = if_not_exists(path, value)` when
    /// `overwrite` is false.
    Set {
        /// Target attribute.
        path: Path,
        /// New value.
        value: ValueExpr,
        /// Replace an existing value.
        overwrite: bool,
    },
    /// `ADD path value`: numeric increment or set union.
    Add {
        /// Target attribute.
        path: Path,
        /// Increment or members.
        value: ValueExpr,
    },
    /// `REMOVE path`.
    Remove {
        /// Target attribute.
        path: Path,
    },
    /// `DELETE path value`: set difference.
    Delete {
        /// Target set attribute.
        path: Path,
        /// Members to remove.
        value: ValueExpr,
    },
}

impl UpdateStatement {
    /// The attribute this statement writes.
    #[must_use]
    pub fn path(&self) -> &Path {
        match self {
            Self::Set { path, .. }
            | Self::Add { path, .. }
            | Self::Remove { path }
            | Self::Delete { path, .. } => path,
        }
    }

    fn clause(&self) -> Clause {
        match self {
            Self::Set { .. } => Clause::Set,
            Self::Add { .. } => Clause::Add,
            Self::Remove { .. } => Clause::Remove,
            Self::Delete { .. } => Clause::Delete,
        }
    }

    fn prepare(
        &self,
        ctx: &mut ExpressionContext,
        schema: &dyn EntitySchema,
    ) -> Result<PreparedStatement, ExpressionError> {
        let target = self.path().resolve(ctx, schema)?;
        if target.root_is_key {
            return Err(ExpressionError::KeyUpdate {
                field: target.literal,
            });
        }

        let mut used = Placeholders {
            names: target.names.clone(),
            values: HashMap::new(),
        };
        let p = &target.expression;
        let rendered = match self {
            Self::Set {
                value,
                overwrite: true,
                ..
            } => format!("{p} = {}", value.prepare(ctx, schema, Some(&target), &mut used)?),
            Self::Set {
                value,
                overwrite: false,
                ..
            } => format!(
                "{p} = if_not_exists({p}, {})",
                value.prepare(ctx, schema, Some(&target), &mut used)?
            ),
            Self::Add { value, .. } | Self::Delete { value, .. } => {
                format!("{p} {}", value.prepare(ctx, schema, None, &mut used)?)
            }
            Self::Remove { .. } => p.clone(),
        };

        Ok(PreparedStatement {
            clause: self.clause(),
            literal: target.literal,
            rendered,
            used,
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Clause {
    Set,
    Add,
    Remove,
    Delete,
}

impl Clause {
    const ORDER: [Self; 4] = [Self::Set, Self::Add, Self::Remove, Self::Delete];

    fn keyword(self) -> &'static str {
        match self {
            Self::Set => "SET",
            Self::Add => "ADD",
            Self::Remove => "REMOVE",
            Self::Delete => "DELETE",
        }
    }
}

#[derive(Debug, Default)]
struct Placeholders {
    names: HashMap<String, String>,
    values: HashMap<String, AttributeValue>,
}

#[derive(Debug)]
struct PreparedStatement {
    clause: Clause,
    literal: String,
    rendered: String,
    used: Placeholders,
}

/// An ordered list of update statements.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Update {
    statements: Vec<UpdateStatement>,
}

impl Update {
    /// An empty update.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Append any statement.
    #[must_use]
    pub fn push(mut self, statement: UpdateStatement) -> Self {
        self.statements.push(statement);
        self
    }

    /// `SET path = value`.
    #[must_use]
    pub fn set(self, path: impl Into<Path>, value: impl Into<ValueExpr>) -> Self {
        self.push(UpdateStatement::Set {
            path: path.into(),
            value: value.into(),
            overwrite: true,
        })
    }

    /// `SET path = if_not_exists(path, value)`.
    #[must_use]
    pub fn set_if_empty(self, path: impl Into<Path>, value: impl Into<ValueExpr>) -> Self {
        self.push(UpdateStatement::Set {
            path: path.into(),
            value: value.into(),
            overwrite: false,
        })
    }

    /// `ADD path value`.
    #[must_use]
    pub fn add(self, path: impl Into<Path>, value: impl Into<ValueExpr>) -> Self {
        self.push(UpdateStatement::Add {
            path: path.into(),
            value: value.into(),
        })
    }

    /// `REMOVE path`.
    #[must_use]
    pub fn remove(self, path: impl Into<Path>) -> Self {
        self.push(UpdateStatement::Remove { path: path.into() })
    }

    /// `DELETE path value`.
    #[must_use]
    pub fn delete(self, path: impl Into<Path>, value: impl Into<ValueExpr>) -> Self {
        self.push(UpdateStatement::Delete {
            path: path.into(),
            value: value.into(),
        })
    }

    /// The statements in insertion order.
    #[must_use]
    pub fn statements(&self) -> &[UpdateStatement] {
        &self.statements
    }

    /// Whether no statement has been added.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.statements.is_empty()
    }

    /// Compile with a fresh context.
    ///
    /// # Errors
    ///
    /// See [`Update::compile_with`].
    pub fn compile(
        &self,
        schema: &dyn EntitySchema,
        condition: Option<&Condition>,
        config: &CompilerConfig,
    ) -> Result<CompiledUpdate, ExpressionError> {
        let mut ctx = ExpressionContext::new(config);
        self.compile_with(&mut ctx, schema, condition)
    }

    /// Compile on a caller-provided context.
    ///
    /// # Errors
    ///
    /// Returns [`ExpressionError::KeyUpdate`] when a statement targets a key
    /// attribute, plus every error of path resolution and
    /// [`Condition::prepare`].
    pub fn compile_with(
        &self,
        ctx: &mut ExpressionContext,
        schema: &dyn EntitySchema,
        condition: Option<&Condition>,
    ) -> Result<CompiledUpdate, ExpressionError> {
        let prepared = self
            .statements
            .iter()
            .map(|statement| statement.prepare(ctx, schema))
            .collect::<Result<Vec<_>, _>>()?;
        let condition = condition
            .map(|condition| condition.prepare(ctx, schema))
            .transpose()?;

        let mut surviving: IndexMap<String, PreparedStatement> = IndexMap::new();
        for statement in prepared {
            if let Some(previous) = surviving.insert(statement.literal.clone(), statement) {
                trace!(path = %previous.literal, "update statement overwritten");
            }
        }

        let mut names = HashMap::new();
        let mut values = HashMap::new();
        let mut groups = Vec::new();
        for clause in Clause::ORDER {
            let parts: Vec<&str> = surviving
                .values()
                .filter(|s| s.clause == clause)
                .map(|s| s.rendered.as_str())
                .collect();
            if !parts.is_empty() {
                groups.push(format!("{} {}", clause.keyword(), parts.join(", ")));
            }
        }
        for statement in surviving.into_values() {
            names.extend(statement.used.names);
            values.extend(statement.used.values);
        }

        let condition_expression = condition.map(|condition| {
            names.extend(condition.attribute_names());
            values.extend(condition.attribute_values());
            condition.serialize()
        });

        Ok(CompiledUpdate {
            update_expression: (!groups.is_empty()).then(|| groups.join(" ")),
            condition_expression,
            names,
            values,
        })
    }
}

/// The fragments of a compiled update.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CompiledUpdate {
    /// `SET ... ADD ... REMOVE ... DELETE ...`, absent when there are no
    /// statements.
    pub update_expression: Option<String>,
    /// The attached condition, if any.
    pub condition_expression: Option<String>,
    /// `#name` placeholder -> field name.
    pub names: HashMap<String, String>,
    /// `:value` placeholder -> wire value.
    pub values: HashMap<String, AttributeValue>,
}
