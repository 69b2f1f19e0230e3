//! Navigable locations inside a (possibly nested) document.
//!
//! A [`Path`] is a small immutable tree built fluently from the root:
//!
//! ```text
//! Path::attr("employees").index(5)?.field("id")   =>   employees[5].id
//! ```
//!
//! It serializes in two modes: the literal form used to identify a target
//! (and to deduplicate update statements), and the placeholder form used in
//! expressions, where every field segment is replaced by its `#name`
//! placeholder while list indices stay literal.

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use dynamap_model::AttributeType;

use crate::error::ExpressionError;
use crate::placeholder::ExpressionContext;
use crate::registry::{EntitySchema, FieldShape};

/// A location inside a document.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Path {
    /// The document itself. Never serialized on its own.
    Root,
    /// A named attribute of the parent.
    Field {
        /// Enclosing path.
        parent: Arc<Path>,
        /// Attribute name.
        name: String,
    },
    /// An element of the parent list.
    Index {
        /// Enclosing list path.
        parent: Arc<Path>,
        /// Zero-based element ordinal.
        ordinal: usize,
    },
    /// Transparent wrapper that serializes exactly like its parent; used as
    /// the element path of lists of primitives.
    Alias(Arc<Path>),
}

/// One step of a flattened path.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Segment<'a> {
    /// A field name.
    Field(&'a str),
    /// A list index.
    Index(usize),
}

impl Path {
    /// The document root.
    #[must_use]
    pub fn root() -> Self {
        Self::Root
    }

    /// A top-level attribute; shorthand for `Path::root().field(name)`.
    #[must_use]
    pub fn attr(name: impl Into<String>) -> Self {
        Self::Root.field(name)
    }

    /// A named attribute below this path.
    #[must_use]
    pub fn field(&self, name: impl Into<String>) -> Self {
        Self::Field {
            parent: Arc::new(self.clone()),
            name: name.into(),
        }
    }

    /// An element of the list at this path.
    ///
    /// # Errors
    ///
    /// Returns [`ExpressionError::InvalidPath`] when this path is the root:
    /// the document itself is never a list.
    pub fn index(&self, ordinal: usize) -> Result<Self, ExpressionError> {
        if self.is_root() {
            return Err(ExpressionError::InvalidPath {
                reason: format!("index [{ordinal}] requires a list attribute, found the root"),
            });
        }
        Ok(self.element(ordinal))
    }

    fn element(&self, ordinal: usize) -> Self {
        Self::Index {
            parent: Arc::new(self.clone()),
            ordinal,
        }
    }

    /// A transparent alias of this path; usable directly as the element
    /// factory of a primitive list.
    #[must_use]
    pub fn alias(self) -> Self {
        Self::Alias(Arc::new(self))
    }

    /// A typed list attribute below this path whose elements are built by
    /// `factory`.
    #[must_use]
    pub fn collection<P>(&self, name: impl Into<String>, factory: fn(Path) -> P) -> Collection<P> {
        Collection::new(self, name, factory)
    }

    /// Returns `true` for the root and for aliases of the root.
    #[must_use]
    pub fn is_root(&self) -> bool {
        match self {
            Self::Root => true,
            Self::Alias(parent) => parent.is_root(),
            Self::Field { .. } | Self::Index { .. } => false,
        }
    }

    /// The flattened steps of this path, root first.
    #[must_use]
    pub fn segments(&self) -> Vec<Segment<'_>> {
        let mut out = Vec::new();
        self.push_segments(&mut out);
        out
    }

    fn push_segments<'a>(&'a self, out: &mut Vec<Segment<'a>>) {
        match self {
            Self::Root => {}
            Self::Field { parent, name } => {
                parent.push_segments(out);
                out.push(Segment::Field(name));
            }
            Self::Index { parent, ordinal } => {
                parent.push_segments(out);
                out.push(Segment::Index(*ordinal));
            }
            Self::Alias(parent) => parent.push_segments(out),
        }
    }

    /// Field names touched along the path, root first; indices are skipped.
    #[must_use]
    pub fn field_names(&self) -> Vec<&str> {
        self.segments()
            .into_iter()
            .filter_map(|segment| match segment {
                Segment::Field(name) => Some(name),
                Segment::Index(_) => None,
            })
            .collect()
    }

    /// Literal form, e.g. `department.employees[5].id`.
    ///
    /// # Errors
    ///
    /// Returns [`ExpressionError::InvalidPath`] for a bare root.
    pub fn serialize(&self) -> Result<String, ExpressionError> {
        self.render(|name| Ok(name.to_owned()))
    }

    /// Placeholder form: every field segment is replaced by `names[field]`
    /// verbatim; indices remain literal.
    ///
    /// # Errors
    ///
    /// Returns [`ExpressionError::InvalidPath`] for a bare root and
    /// [`ExpressionError::UnresolvedName`] when a field has no entry.
    #[allow(clippy::implicit_hasher)]
    pub fn serialize_with_placeholders(
        &self,
        names: &HashMap<String, String>,
    ) -> Result<String, ExpressionError> {
        self.render(|name| {
            names
                .get(name)
                .cloned()
                .ok_or_else(|| ExpressionError::UnresolvedName {
                    field: name.to_owned(),
                })
        })
    }

    fn render<F>(&self, mut name_of: F) -> Result<String, ExpressionError>
    where
        F: FnMut(&str) -> Result<String, ExpressionError>,
    {
        if self.is_root() {
            return Err(ExpressionError::InvalidPath {
                reason: "a bare root path cannot be serialized".to_owned(),
            });
        }

        let mut out = String::new();
        for segment in self.segments() {
            match segment {
                Segment::Field(name) => {
                    if !out.is_empty() {
                        out.push('.');
                    }
                    out.push_str(&name_of(name)?);
                }
                Segment::Index(ordinal) => {
                    if out.is_empty() {
                        return Err(ExpressionError::InvalidPath {
                            reason: format!("index [{ordinal}] has no enclosing list attribute"),
                        });
                    }
                    out.push('[');
                    out.push_str(&ordinal.to_string());
                    out.push(']');
                }
            }
        }
        Ok(out)
    }

    /// Validate this path against `schema`, bind its field names in `ctx`
    /// and render the placeholder form.
    ///
    /// # Errors
    ///
    /// Returns [`ExpressionError::UnknownField`] for fields the schema does
    /// not declare, [`ExpressionError::InvalidPath`] for a bare root or an
    /// index on a non-list attribute, and allocation failures.
    pub fn resolve(
        &self,
        ctx: &mut ExpressionContext,
        schema: &dyn EntitySchema,
    ) -> Result<ResolvedPath, ExpressionError> {
        let literal = self.serialize()?;
        let walk = walk_schema(self, schema, &literal)?;

        let mut names = HashMap::new();
        for (field, short_code) in walk.fields {
            let placeholder = ctx.bind_name(field, short_code)?;
            names.insert(placeholder, field.to_owned());
        }
        let expression = self.serialize_with_placeholders(ctx.names())?;

        Ok(ResolvedPath {
            expression,
            literal,
            names,
            attribute_type: walk.attribute_type,
            root_is_key: walk.root_is_key,
        })
    }
}

impl fmt::Display for Path {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.serialize() {
            Ok(literal) => f.write_str(&literal),
            Err(_) => f.write_str("<root>"),
        }
    }
}

impl From<&Path> for Path {
    fn from(path: &Path) -> Self {
        path.clone()
    }
}

/// A path with its placeholders bound.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedPath {
    /// Placeholder form, e.g. `#A[5].#B`.
    pub expression: String,
    /// Literal form, e.g. `employees[5].id`.
    pub literal: String,
    /// `#name` placeholder -> field name for every field on the path.
    pub names: HashMap<String, String>,
    /// Declared wire type of the addressed attribute, when the schema knows it.
    pub attribute_type: Option<AttributeType>,
    /// Whether the first segment is a key field of the root entity.
    pub root_is_key: bool,
}

struct SchemaWalk<'p> {
    fields: Vec<(&'p str, Option<&'p str>)>,
    attribute_type: Option<AttributeType>,
    root_is_key: bool,
}

/// Follow `path` through `schema` and nested entity schemas.
fn walk_schema<'p>(
    path: &'p Path,
    schema: &'p dyn EntitySchema,
    literal: &str,
) -> Result<SchemaWalk<'p>, ExpressionError> {
    let mut walk = SchemaWalk {
        fields: Vec::new(),
        attribute_type: None,
        root_is_key: false,
    };
    let mut cursor: Option<&'p dyn EntitySchema> = Some(schema);
    let mut element: Option<&'p dyn EntitySchema> = None;
    let mut owner = schema.entity_name().to_owned();
    let mut first = true;

    for segment in path.segments() {
        match segment {
            Segment::Field(name) => {
                let descriptor = cursor
                    .and_then(|s| s.field(name))
                    .ok_or_else(|| ExpressionError::UnknownField {
                        field: name.to_owned(),
                        entity: owner.clone(),
                    })?;
                if first {
                    walk.root_is_key = descriptor.is_key;
                    first = false;
                }
                walk.fields
                    .push((name, descriptor.short_code.as_deref()));
                walk.attribute_type = Some(descriptor.shape.wire_type());
                (cursor, element) = match descriptor.shape {
                    FieldShape::Entity(schema_of) => {
                        let nested = schema_of();
                        owner = nested.entity_name().to_owned();
                        (Some(nested), None)
                    }
                    FieldShape::EntityList(schema_of) => {
                        owner = descriptor.wire_name.clone();
                        (None, Some(schema_of()))
                    }
                    FieldShape::Scalar(_) => {
                        owner = descriptor.wire_name.clone();
                        (None, None)
                    }
                };
            }
            Segment::Index(ordinal) => {
                if !matches!(walk.attribute_type, None | Some(AttributeType::L)) {
                    return Err(ExpressionError::InvalidPath {
                        reason: format!("index [{ordinal}] applied to a non-list attribute in {literal}"),
                    });
                }
                cursor = element.take();
                walk.attribute_type = None;
                if let Some(nested) = cursor {
                    owner = nested.entity_name().to_owned();
                    walk.attribute_type = Some(AttributeType::M);
                }
            }
        }
    }

    Ok(walk)
}

/// A typed list attribute.
///
/// `at(i)` builds the `Index` node for element `i` and hands it to the
/// element factory, which wraps it in whatever typed path the element needs.
/// Lists of primitives use [`Path::alias`] as the factory.
pub struct Collection<P> {
    path: Path,
    factory: fn(Path) -> P,
}

impl<P> Collection<P> {
    /// A list attribute `name` below `parent`.
    #[must_use]
    pub fn new(parent: &Path, name: impl Into<String>, factory: fn(Path) -> P) -> Self {
        Self {
            path: parent.field(name),
            factory,
        }
    }

    /// The typed path of element `ordinal`.
    #[must_use]
    pub fn at(&self, ordinal: usize) -> P {
        (self.factory)(self.path.element(ordinal))
    }

    /// The path of the list itself.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl<P> Clone for Collection<P> {
    fn clone(&self) -> Self {
        Self {
            path: self.path.clone(),
            factory: self.factory,
        }
    }
}

impl<P> fmt::Debug for Collection<P> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Collection")
            .field("path", &self.path)
            .finish_non_exhaustive()
    }
}

impl<P> From<&Collection<P>> for Path {
    fn from(collection: &Collection<P>) -> Self {
        collection.path.clone()
    }
}
