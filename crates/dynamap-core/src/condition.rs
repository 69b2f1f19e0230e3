//! Condition expressions.
//!
//! A [`Condition`] is built from [`Path`]s and literals, then prepared
//! against an entity schema and a shared [`ExpressionContext`]. Preparing
//! validates every path, binds every placeholder and produces a
//! [`ResolvedCondition`], whose serialization is a pure function.
//!
//! ```text
//! Condition::eq(Path::attr("name"), "Han").and_also(Condition::exists(Path::attr("age")))
//!     =>  ( #A = :B ) and ( attribute_exists(#C) )
//! ```

use std::collections::HashMap;
use std::fmt;

use dynamap_model::{AttributeType, AttributeValue};

use crate::config::CompilerConfig;
use crate::error::ExpressionError;
use crate::path::{Path, ResolvedPath};
use crate::placeholder::{BoundValue, ExpressionContext};
use crate::registry::{EntitySchema, Literal};

/// Comparison operators.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CompareOp {
    /// `=`
    Eq,
    /// `<>`
    Ne,
    /// `<`
    Lt,
    /// `<=`
    Le,
    /// `>`
    Gt,
    /// `>=`
    Ge,
}

impl CompareOp {
    /// The operator token.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Eq => "=",
            Self::Ne => "<>",
            Self::Lt => "<",
            Self::Le => "<=",
            Self::Gt => ">",
            Self::Ge => ">=",
        }
    }
}

impl fmt::Display for CompareOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// An unresolved condition tree.
#[derive(Debug, Clone, PartialEq)]
pub enum Condition {
    /// Caller-written expression text with its own placeholder maps.
    Fixed {
        /// Expression text, e.g. `#v = :expected`.
        text: String,
        /// `#name` placeholder -> field name.
        names: HashMap<String, String>,
        /// `:value` placeholder -> wire value.
        values: HashMap<String, AttributeValue>,
    },
    /// `attribute_exists` / `attribute_not_exists`.
    Exists {
        /// Checked attribute.
        path: Path,
        /// `true` for `attribute_exists`.
        should_exist: bool,
    },
    /// `attribute_type`.
    IsType {
        /// Checked attribute.
        path: Path,
        /// Expected wire type.
        attribute_type: AttributeType,
    },
    /// Attribute compared to a literal.
    Compare {
        /// Left-hand attribute.
        path: Path,
        /// Operator.
        op: CompareOp,
        /// Right-hand literal.
        value: AttributeValue,
    },
    /// Attribute compared to another attribute.
    CompareToField {
        /// Left-hand attribute.
        path: Path,
        /// Operator.
        op: CompareOp,
        /// Right-hand attribute.
        other: Path,
    },
    /// Inclusive range check.
    Between {
        /// Checked attribute.
        path: Path,
        /// Lower bound.
        low: AttributeValue,
        /// Upper bound.
        high: AttributeValue,
    },
    /// `begins_with`.
    BeginsWith {
        /// Checked attribute.
        path: Path,
        /// Expected prefix.
        prefix: AttributeValue,
    },
    /// `contains`.
    Contains {
        /// Checked attribute (string, set or list).
        path: Path,
        /// Substring or member.
        operand: AttributeValue,
    },
    /// Membership in a literal list.
    In {
        /// Checked attribute.
        path: Path,
        /// Candidate values.
        candidates: Vec<AttributeValue>,
    },
    /// Conjunction.
    And(Vec<Condition>),
    /// Disjunction.
    Or(Vec<Condition>),
    /// Negation.
    Not(Box<Condition>),
}

impl Condition {
    /// Wrap caller-written expression text.
    #[must_use]
    #[allow(clippy::implicit_hasher)]
    pub fn fixed(
        text: impl Into<String>,
        names: HashMap<String, String>,
        values: HashMap<String, AttributeValue>,
    ) -> Self {
        Self::Fixed {
            text: text.into(),
            names,
            values,
        }
    }

    /// `attribute_exists(path)`.
    #[must_use]
    pub fn exists(path: impl Into<Path>) -> Self {
        Self::Exists {
            path: path.into(),
            should_exist: true,
        }
    }

    /// `attribute_not_exists(path)`.
    #[must_use]
    pub fn not_exists(path: impl Into<Path>) -> Self {
        Self::Exists {
            path: path.into(),
            should_exist: false,
        }
    }

    /// `attribute_type(path, type)`.
    #[must_use]
    pub fn is_type(path: impl Into<Path>, attribute_type: AttributeType) -> Self {
        Self::IsType {
            path: path.into(),
            attribute_type,
        }
    }

    /// `path op value`.
    #[must_use]
    pub fn compare(path: impl Into<Path>, op: CompareOp, value: impl Literal) -> Self {
        Self::Compare {
            path: path.into(),
            op,
            value: value.into_attribute_value(),
        }
    }

    /// `path = value`.
    #[must_use]
    pub fn eq(path: impl Into<Path>, value: impl Literal) -> Self {
        Self::compare(path, CompareOp::Eq, value)
    }

    /// `path <> value`.
    #[must_use]
    pub fn ne(path: impl Into<Path>, value: impl Literal) -> Self {
        Self::compare(path, CompareOp::Ne, value)
    }

    /// `path < value`.
    #[must_use]
    pub fn lt(path: impl Into<Path>, value: impl Literal) -> Self {
        Self::compare(path, CompareOp::Lt, value)
    }

    /// `path <= value`.
    #[must_use]
    pub fn le(path: impl Into<Path>, value: impl Literal) -> Self {
        Self::compare(path, CompareOp::Le, value)
    }

    /// `path > value`.
    #[must_use]
    pub fn gt(path: impl Into<Path>, value: impl Literal) -> Self {
        Self::compare(path, CompareOp::Gt, value)
    }

    /// `path >= value`.
    #[must_use]
    pub fn ge(path: impl Into<Path>, value: impl Literal) -> Self {
        Self::compare(path, CompareOp::Ge, value)
    }

    /// `path op other`.
    #[must_use]
    pub fn compare_to_field(path: impl Into<Path>, op: CompareOp, other: impl Into<Path>) -> Self {
        Self::CompareToField {
            path: path.into(),
            op,
            other: other.into(),
        }
    }

    /// `path between low and high`.
    #[must_use]
    pub fn between(path: impl Into<Path>, low: impl Literal, high: impl Literal) -> Self {
        Self::Between {
            path: path.into(),
            low: low.into_attribute_value(),
            high: high.into_attribute_value(),
        }
    }

    /// `begins_with(path, prefix)`.
    #[must_use]
    pub fn begins_with(path: impl Into<Path>, prefix: impl Literal) -> Self {
        Self::BeginsWith {
            path: path.into(),
            prefix: prefix.into_attribute_value(),
        }
    }

    /// `contains(path, operand)`.
    #[must_use]
    pub fn contains(path: impl Into<Path>, operand: impl Literal) -> Self {
        Self::Contains {
            path: path.into(),
            operand: operand.into_attribute_value(),
        }
    }

    /// `path in (candidates...)`.
    #[must_use]
    pub fn is_in<L: Literal>(path: impl Into<Path>, candidates: impl IntoIterator<Item = L>) -> Self {
        Self::In {
            path: path.into(),
            candidates: candidates
                .into_iter()
                .map(Literal::into_attribute_value)
                .collect(),
        }
    }

    /// Conjunction of `children`.
    #[must_use]
    pub fn and(children: impl IntoIterator<Item = Condition>) -> Self {
        Self::And(children.into_iter().collect())
    }

    /// Disjunction of `children`.
    #[must_use]
    pub fn or(children: impl IntoIterator<Item = Condition>) -> Self {
        Self::Or(children.into_iter().collect())
    }

    /// Negation of `condition`.
    #[must_use]
    #[allow(clippy::should_implement_trait)]
    pub fn not(condition: Condition) -> Self {
        Self::Not(Box::new(condition))
    }

    /// `self and other`, flattening into an existing conjunction.
    #[must_use]
    pub fn and_also(self, other: Condition) -> Self {
        match self {
            Self::And(mut children) => {
                children.push(other);
                Self::And(children)
            }
            single => Self::And(vec![single, other]),
        }
    }

    /// `self or other`, flattening into an existing disjunction.
    #[must_use]
    pub fn or_else(self, other: Condition) -> Self {
        match self {
            Self::Or(mut children) => {
                children.push(other);
                Self::Or(children)
            }
            single => Self::Or(vec![single, other]),
        }
    }

    /// Validate against `schema` and bind placeholders in `ctx`.
    ///
    /// # Errors
    ///
    /// Returns [`ExpressionError::UnknownField`] or
    /// [`ExpressionError::InvalidPath`] for bad paths,
    /// [`ExpressionError::TypeMismatch`] when a literal does not carry the
    /// field's wire type, [`ExpressionError::InvalidCondition`] for empty
    /// groups and [`ExpressionError::PlaceholderConflict`] when a fixed
    /// expression collides with placeholders already bound.
    pub fn prepare(
        &self,
        ctx: &mut ExpressionContext,
        schema: &dyn EntitySchema,
    ) -> Result<ResolvedCondition, ExpressionError> {
        let resolved = match self {
            Self::Fixed {
                text,
                names,
                values,
            } => {
                for (placeholder, field) in names {
                    ctx.reserve_name(placeholder, field)?;
                }
                for (placeholder, value) in values {
                    ctx.reserve_value(placeholder, value)?;
                }
                ResolvedCondition::Fixed {
                    text: text.clone(),
                    names: names.clone(),
                    values: values.clone(),
                }
            }
            Self::Exists { path, should_exist } => ResolvedCondition::Exists {
                path: path.resolve(ctx, schema)?,
                should_exist: *should_exist,
            },
            Self::IsType {
                path,
                attribute_type,
            } => {
                let path = path.resolve(ctx, schema)?;
                let tag = ctx.bind_value(AttributeValue::string(attribute_type.as_str()))?;
                ResolvedCondition::IsType { path, tag }
            }
            Self::Compare { path, op, value } => {
                let path = path.resolve(ctx, schema)?;
                let value = bind_typed(ctx, &path, value)?;
                ResolvedCondition::Compare {
                    path,
                    op: *op,
                    value,
                }
            }
            Self::CompareToField { path, op, other } => ResolvedCondition::CompareToField {
                path: path.resolve(ctx, schema)?,
                op: *op,
                other: other.resolve(ctx, schema)?,
            },
            Self::Between { path, low, high } => {
                let path = path.resolve(ctx, schema)?;
                let low = bind_typed(ctx, &path, low)?;
                let high = bind_typed(ctx, &path, high)?;
                ResolvedCondition::Between { path, low, high }
            }
            Self::BeginsWith { path, prefix } => {
                let path = path.resolve(ctx, schema)?;
                let prefix = bind_typed(ctx, &path, prefix)?;
                ResolvedCondition::BeginsWith { path, prefix }
            }
            Self::Contains { path, operand } => {
                let path = path.resolve(ctx, schema)?;
                let operand = ctx.bind_value(operand.clone())?;
                ResolvedCondition::Contains { path, operand }
            }
            Self::In { path, candidates } => {
                if candidates.is_empty() {
                    return Err(ExpressionError::InvalidCondition {
                        reason: "`in` requires at least one candidate".to_owned(),
                    });
                }
                let path = path.resolve(ctx, schema)?;
                let candidates = candidates
                    .iter()
                    .map(|candidate| bind_typed(ctx, &path, candidate))
                    .collect::<Result<Vec<_>, _>>()?;
                ResolvedCondition::In { path, candidates }
            }
            Self::And(children) => ResolvedCondition::And(prepare_group("and", children, ctx, schema)?),
            Self::Or(children) => ResolvedCondition::Or(prepare_group("or", children, ctx, schema)?),
            Self::Not(child) => ResolvedCondition::Not(Box::new(child.prepare(ctx, schema)?)),
        };
        Ok(resolved)
    }

    /// Compile this condition on its own, with a fresh context.
    ///
    /// # Errors
    ///
    /// Same as [`Condition::prepare`], plus allocation failures.
    pub fn compile(
        &self,
        schema: &dyn EntitySchema,
        config: &CompilerConfig,
    ) -> Result<CompiledCondition, ExpressionError> {
        let mut ctx = ExpressionContext::new(config);
        let resolved = self.prepare(&mut ctx, schema)?;
        Ok(CompiledCondition {
            expression: resolved.serialize(),
            names: resolved.attribute_names(),
            values: resolved.attribute_values(),
        })
    }
}

fn prepare_group(
    kind: &str,
    children: &[Condition],
    ctx: &mut ExpressionContext,
    schema: &dyn EntitySchema,
) -> Result<Vec<ResolvedCondition>, ExpressionError> {
    if children.is_empty() {
        return Err(ExpressionError::InvalidCondition {
            reason: format!("`{kind}` requires at least one operand"),
        });
    }
    children
        .iter()
        .map(|child| child.prepare(ctx, schema))
        .collect()
}

/// Bind `value`, checking it against the declared type of `path`.
///
/// `NULL` literals and paths without a known scalar type are not checked.
pub(crate) fn bind_typed(
    ctx: &mut ExpressionContext,
    path: &ResolvedPath,
    value: &AttributeValue,
) -> Result<BoundValue, ExpressionError> {
    if let Some(expected) = path.attribute_type {
        let actual = value.attribute_type();
        if !value.is_null() && actual != expected {
            return Err(ExpressionError::TypeMismatch {
                path: path.literal.clone(),
                expected,
                actual,
            });
        }
    }
    ctx.bind_value(value.clone())
}

/// A condition with every placeholder bound.
#[derive(Debug, Clone, PartialEq)]
pub enum ResolvedCondition {
    /// Caller-written text.
    Fixed {
        /// Expression text.
        text: String,
        /// `#name` placeholder -> field name.
        names: HashMap<String, String>,
        /// `:value` placeholder -> wire value.
        values: HashMap<String, AttributeValue>,
    },
    /// Existence check.
    Exists {
        /// Checked attribute.
        path: ResolvedPath,
        /// `true` for `attribute_exists`.
        should_exist: bool,
    },
    /// Type check.
    IsType {
        /// Checked attribute.
        path: ResolvedPath,
        /// Type tag bound as a string value.
        tag: BoundValue,
    },
    /// Comparison with a literal.
    Compare {
        /// Left-hand attribute.
        path: ResolvedPath,
        /// Operator.
        op: CompareOp,
        /// Right-hand literal.
        value: BoundValue,
    },
    /// Comparison with another attribute.
    CompareToField {
        /// Left-hand attribute.
        path: ResolvedPath,
        /// Operator.
        op: CompareOp,
        /// Right-hand attribute.
        other: ResolvedPath,
    },
    /// Range check.
    Between {
        /// Checked attribute.
        path: ResolvedPath,
        /// Lower bound.
        low: BoundValue,
        /// Upper bound.
        high: BoundValue,
    },
    /// Prefix check.
    BeginsWith {
        /// Checked attribute.
        path: ResolvedPath,
        /// Expected prefix.
        prefix: BoundValue,
    },
    /// Containment check.
    Contains {
        /// Checked attribute.
        path: ResolvedPath,
        /// Substring or member.
        operand: BoundValue,
    },
    /// Membership check.
    In {
        /// Checked attribute.
        path: ResolvedPath,
        /// Candidate values.
        candidates: Vec<BoundValue>,
    },
    /// Conjunction.
    And(Vec<ResolvedCondition>),
    /// Disjunction.
    Or(Vec<ResolvedCondition>),
    /// Negation.
    Not(Box<ResolvedCondition>),
}

impl ResolvedCondition {
    /// Render the expression string.
    #[must_use]
    pub fn serialize(&self) -> String {
        self.to_string()
    }

    /// `#name` placeholder -> field name for every reference in the tree.
    #[must_use]
    pub fn attribute_names(&self) -> HashMap<String, String> {
        let mut out = HashMap::new();
        self.collect_names(&mut out);
        out
    }

    /// `:value` placeholder -> wire value for every literal in the tree.
    #[must_use]
    pub fn attribute_values(&self) -> HashMap<String, AttributeValue> {
        let mut out = HashMap::new();
        self.collect_values(&mut out);
        out
    }

    fn collect_names(&self, out: &mut HashMap<String, String>) {
        match self {
            Self::Fixed { names, .. } => out.extend(names.clone()),
            Self::Exists { path, .. }
            | Self::IsType { path, .. }
            | Self::Compare { path, .. }
            | Self::Between { path, .. }
            | Self::BeginsWith { path, .. }
            | Self::Contains { path, .. }
            | Self::In { path, .. } => out.extend(path.names.clone()),
            Self::CompareToField { path, other, .. } => {
                out.extend(path.names.clone());
                out.extend(other.names.clone());
            }
            Self::And(children) | Self::Or(children) => {
                for child in children {
                    child.collect_names(out);
                }
            }
            Self::Not(child) => child.collect_names(out),
        }
    }

    fn collect_values(&self, out: &mut HashMap<String, AttributeValue>) {
        match self {
            Self::Fixed { values, .. } => out.extend(values.clone()),
            Self::Exists { .. } | Self::CompareToField { .. } => {}
            Self::IsType { tag: bound, .. }
            | Self::Compare { value: bound, .. }
            | Self::BeginsWith { prefix: bound, .. }
            | Self::Contains {
                operand: bound, ..
            } => insert_bound(out, bound),
            Self::Between { low, high, .. } => {
                insert_bound(out, low);
                insert_bound(out, high);
            }
            Self::In { candidates, .. } => {
                for bound in candidates {
                    insert_bound(out, bound);
                }
            }
            Self::And(children) | Self::Or(children) => {
                for child in children {
                    child.collect_values(out);
                }
            }
            Self::Not(child) => child.collect_values(out),
        }
    }
}

fn insert_bound(out: &mut HashMap<String, AttributeValue>, bound: &BoundValue) {
    out.insert(bound.placeholder.clone(), bound.value.clone());
}

fn write_group(
    f: &mut fmt::Formatter<'_>,
    children: &[ResolvedCondition],
    joiner: &str,
) -> fmt::Result {
    for (i, child) in children.iter().enumerate() {
        if i > 0 {
            f.write_str(joiner)?;
        }
        write!(f, "( {child} )")?;
    }
    Ok(())
}

impl fmt::Display for ResolvedCondition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Fixed { text, .. } => f.write_str(text),
            Self::Exists {
                path,
                should_exist: true,
            } => write!(f, "attribute_exists({})", path.expression),
            Self::Exists {
                path,
                should_exist: false,
            } => write!(f, "attribute_not_exists({})", path.expression),
            Self::IsType { path, tag } => {
                write!(f, "attribute_type({}, {})", path.expression, tag.placeholder)
            }
            Self::Compare { path, op, value } => {
                write!(f, "{} {op} {}", path.expression, value.placeholder)
            }
            Self::CompareToField { path, op, other } => {
                write!(f, "{} {op} {}", path.expression, other.expression)
            }
            Self::Between { path, low, high } => write!(
                f,
                "{} between {} and {}",
                path.expression, low.placeholder, high.placeholder
            ),
            Self::BeginsWith { path, prefix } => {
                write!(f, "begins_with({}, {})", path.expression, prefix.placeholder)
            }
            Self::Contains { path, operand } => {
                write!(f, "contains({}, {})", path.expression, operand.placeholder)
            }
            Self::In { path, candidates } => {
                let list: Vec<&str> = candidates.iter().map(|c| c.placeholder.as_str()).collect();
                write!(f, "{} in ({})", path.expression, list.join(", "))
            }
            Self::And(children) => write_group(f, children, " and "),
            Self::Or(children) => write_group(f, children, " or "),
            Self::Not(child) => write!(f, "NOT ({child})"),
        }
    }
}

/// A standalone compiled condition.
#[derive(Debug, Clone, PartialEq)]
pub struct CompiledCondition {
    /// The condition expression.
    pub expression: String,
    /// `#name` placeholder -> field name.
    pub names: HashMap<String, String>,
    /// `:value` placeholder -> wire value.
    pub values: HashMap<String, AttributeValue>,
}
