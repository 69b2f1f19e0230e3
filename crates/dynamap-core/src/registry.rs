//! Declarative field registries bridging domain objects and wire maps.
//!
//! A [`FieldRegistry`] is an ordered table of [`FieldMapping`]s built once per
//! entity type, usually inside a `LazyLock`, and read concurrently afterward.
//! Each mapping pairs a wire name with two closures: one folding a wire value
//! into a domain object, one extracting the wire value from it.
//!
//! ```text
//! FieldRegistry::builder("Employee")
//!     .field(FieldSpec::key("id"), |e: &Employee| &e.id, |e, v| e.id = v)
//!     .optional(FieldSpec::new("title"), |e: &Employee| e.title.as_ref(), |e, v| e.title = Some(v))
//!     .entity(FieldSpec::new("manager"), |e: &Employee| e.manager.as_deref(), |e, m| e.manager = Some(Box::new(m)))
//!     .build()
//! ```
//!
//! The compiler itself never sees the domain type: it validates paths through
//! the object-safe [`EntitySchema`] view.

use std::collections::{BTreeSet, HashMap, HashSet};
use std::fmt;

use dynamap_model::{AttributeType, AttributeValue};
use tracing::trace;

use crate::error::{CodecError, MappingError, RegistryError};
use crate::path::Path;
use crate::update::{Update, ValueExpr};

// ---------------------------------------------------------------------------
// Codecs
// ---------------------------------------------------------------------------

/// A domain type with a declared wire type.
pub trait AttributeCodec: Sized {
    /// The wire type values of this type are stored as.
    const ATTRIBUTE_TYPE: AttributeType;

    /// Encode into a wire value.
    ///
    /// Non-finite floats render as `NaN` or `inf`. Exports and expression
    /// binding reject those through [`AttributeValue::invalid_number`].
    fn to_attribute(&self) -> AttributeValue;

    /// Decode from a wire value.
    ///
    /// # Errors
    ///
    /// Returns a [`CodecError`] if the value has the wrong tag or does not fit.
    fn from_attribute(value: &AttributeValue) -> Result<Self, CodecError>;
}

fn mismatch(expected: AttributeType, value: &AttributeValue) -> CodecError {
    CodecError::TypeMismatch {
        expected,
        actual: value.attribute_type(),
    }
}

fn parse_number<N: std::str::FromStr>(raw: &str) -> Result<N, CodecError> {
    raw.parse().map_err(|_| CodecError::InvalidNumber {
        value: raw.to_owned(),
    })
}

impl AttributeCodec for String {
    const ATTRIBUTE_TYPE: AttributeType = AttributeType::S;

    fn to_attribute(&self) -> AttributeValue {
        AttributeValue::S(self.clone())
    }

    fn from_attribute(value: &AttributeValue) -> Result<Self, CodecError> {
        value
            .as_s()
            .map(str::to_owned)
            .ok_or_else(|| mismatch(Self::ATTRIBUTE_TYPE, value))
    }
}

impl AttributeCodec for bool {
    const ATTRIBUTE_TYPE: AttributeType = AttributeType::Bool;

    fn to_attribute(&self) -> AttributeValue {
        AttributeValue::Bool(*self)
    }

    fn from_attribute(value: &AttributeValue) -> Result<Self, CodecError> {
        value
            .as_bool()
            .ok_or_else(|| mismatch(Self::ATTRIBUTE_TYPE, value))
    }
}

macro_rules! impl_number_codec {
    ($($ty:ty),* $(,)?) => {
        $(
            impl AttributeCodec for $ty {
                const ATTRIBUTE_TYPE: AttributeType = AttributeType::N;

                fn to_attribute(&self) -> AttributeValue {
                    AttributeValue::N(self.to_string())
                }

                fn from_attribute(value: &AttributeValue) -> Result<Self, CodecError> {
                    let raw = value
                        .as_n()
                        .ok_or_else(|| mismatch(Self::ATTRIBUTE_TYPE, value))?;
                    parse_number(raw)
                }
            }
        )*
    };
}

impl_number_codec!(i32, i64, u32, u64, f32, f64);

impl AttributeCodec for bytes::Bytes {
    const ATTRIBUTE_TYPE: AttributeType = AttributeType::B;

    fn to_attribute(&self) -> AttributeValue {
        AttributeValue::B(self.clone())
    }

    fn from_attribute(value: &AttributeValue) -> Result<Self, CodecError> {
        value
            .as_b()
            .cloned()
            .ok_or_else(|| mismatch(Self::ATTRIBUTE_TYPE, value))
    }
}

/// Lists of strings travel as a wire list of `S` values.
impl AttributeCodec for Vec<String> {
    const ATTRIBUTE_TYPE: AttributeType = AttributeType::L;

    fn to_attribute(&self) -> AttributeValue {
        AttributeValue::L(self.iter().map(String::to_attribute).collect())
    }

    fn from_attribute(value: &AttributeValue) -> Result<Self, CodecError> {
        value
            .as_l()
            .ok_or_else(|| mismatch(Self::ATTRIBUTE_TYPE, value))?
            .iter()
            .map(String::from_attribute)
            .collect()
    }
}

impl AttributeCodec for BTreeSet<String> {
    const ATTRIBUTE_TYPE: AttributeType = AttributeType::Ss;

    fn to_attribute(&self) -> AttributeValue {
        AttributeValue::Ss(self.iter().cloned().collect())
    }

    fn from_attribute(value: &AttributeValue) -> Result<Self, CodecError> {
        value
            .as_ss()
            .map(|members| members.iter().cloned().collect())
            .ok_or_else(|| mismatch(Self::ATTRIBUTE_TYPE, value))
    }
}

impl AttributeCodec for BTreeSet<i64> {
    const ATTRIBUTE_TYPE: AttributeType = AttributeType::Ns;

    fn to_attribute(&self) -> AttributeValue {
        AttributeValue::Ns(self.iter().map(ToString::to_string).collect())
    }

    fn from_attribute(value: &AttributeValue) -> Result<Self, CodecError> {
        value
            .as_ns()
            .ok_or_else(|| mismatch(Self::ATTRIBUTE_TYPE, value))?
            .iter()
            .map(|raw| parse_number(raw))
            .collect()
    }
}

/// Anything usable as an expression literal.
///
/// Typed values go through their [`AttributeCodec`]; raw wire values and
/// string slices are accepted as-is.
pub trait Literal {
    /// Convert into the wire value bound to a `:value` placeholder.
    fn into_attribute_value(self) -> AttributeValue;
}

impl<T: AttributeCodec> Literal for T {
    fn into_attribute_value(self) -> AttributeValue {
        self.to_attribute()
    }
}

impl Literal for AttributeValue {
    fn into_attribute_value(self) -> AttributeValue {
        self
    }
}

impl Literal for &str {
    fn into_attribute_value(self) -> AttributeValue {
        AttributeValue::string(self)
    }
}

// ---------------------------------------------------------------------------
// Schema view
// ---------------------------------------------------------------------------

/// Lazily resolves the schema of a nested entity; a function pointer so that
/// recursive entities can reference their own registry.
pub type SchemaFn = fn() -> &'static dyn EntitySchema;

/// How a field is laid out on the wire.
#[derive(Debug, Clone, Copy)]
pub enum FieldShape {
    /// A primitive (or list/set of primitives) with the given wire type.
    Scalar(AttributeType),
    /// A nested entity stored as a wire map.
    Entity(SchemaFn),
    /// A list of nested entities stored as a wire list of maps.
    EntityList(SchemaFn),
}

impl FieldShape {
    /// The wire type of the whole field.
    #[must_use]
    pub fn wire_type(&self) -> AttributeType {
        match self {
            Self::Scalar(ty) => *ty,
            Self::Entity(_) => AttributeType::M,
            Self::EntityList(_) => AttributeType::L,
        }
    }
}

/// Type-independent description of one field.
#[derive(Debug, Clone)]
pub struct FieldDescriptor {
    /// Attribute name on the wire.
    pub wire_name: String,
    /// Whether the field is part of the primary key.
    pub is_key: bool,
    /// Preferred `#name` placeholder code.
    pub short_code: Option<String>,
    /// Wire layout.
    pub shape: FieldShape,
}

/// Object-safe view of a registry used while compiling expressions.
pub trait EntitySchema: Send + Sync {
    /// Entity name used in error messages.
    fn entity_name(&self) -> &str;

    /// Look up a field by wire name.
    fn field(&self, wire_name: &str) -> Option<&FieldDescriptor>;

    /// All fields in declaration order.
    fn fields(&self) -> Vec<&FieldDescriptor>;
}

/// A domain type with a process-wide registry.
pub trait Entity: Default + Send + Sync + 'static {
    /// The registry for this type, built once.
    fn registry() -> &'static FieldRegistry<Self>;
}

fn schema_of<E: Entity>() -> &'static dyn EntitySchema {
    E::registry()
}

// ---------------------------------------------------------------------------
// Registry
// ---------------------------------------------------------------------------

type ToDomain<T> = Box<dyn Fn(&mut T, &AttributeValue) -> Result<(), MappingError> + Send + Sync>;
type ToWire<T> =
    Box<dyn Fn(&T) -> Result<Option<AttributeValue>, MappingError> + Send + Sync>;

/// One row of a registry: a descriptor plus its two conversion closures.
pub struct FieldMapping<T> {
    descriptor: FieldDescriptor,
    to_domain: ToDomain<T>,
    to_wire: ToWire<T>,
}

impl<T> FieldMapping<T> {
    /// The type-independent description of this field.
    #[must_use]
    pub fn descriptor(&self) -> &FieldDescriptor {
        &self.descriptor
    }
}

impl<T> fmt::Debug for FieldMapping<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FieldMapping")
            .field("descriptor", &self.descriptor)
            .finish_non_exhaustive()
    }
}

/// Name and flags of a field being declared.
#[derive(Debug, Clone)]
pub struct FieldSpec {
    wire_name: String,
    is_key: bool,
    short_code: Option<String>,
}

impl FieldSpec {
    /// A plain (non-key) field.
    #[must_use]
    pub fn new(wire_name: impl Into<String>) -> Self {
        Self {
            wire_name: wire_name.into(),
            is_key: false,
            short_code: None,
        }
    }

    /// A primary-key field.
    #[must_use]
    pub fn key(wire_name: impl Into<String>) -> Self {
        Self {
            is_key: true,
            ..Self::new(wire_name)
        }
    }

    /// Preferred `#name` placeholder code for this field.
    #[must_use]
    pub fn short_code(mut self, code: impl Into<String>) -> Self {
        self.short_code = Some(code.into());
        self
    }

    fn describe(self, shape: FieldShape) -> FieldDescriptor {
        FieldDescriptor {
            wire_name: self.wire_name,
            is_key: self.is_key,
            short_code: self.short_code,
            shape,
        }
    }
}

/// Per-entity table of field mappings.
pub struct FieldRegistry<T> {
    entity: String,
    fields: Vec<FieldMapping<T>>,
    index: HashMap<String, usize>,
}

impl<T> fmt::Debug for FieldRegistry<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FieldRegistry")
            .field("entity", &self.entity)
            .field("fields", &self.fields)
            .finish_non_exhaustive()
    }
}

impl<T: 'static> FieldRegistry<T> {
    /// Start declaring the registry of `entity`.
    #[must_use]
    pub fn builder(entity: impl Into<String>) -> FieldRegistryBuilder<T> {
        FieldRegistryBuilder {
            entity: entity.into(),
            fields: Vec::new(),
        }
    }
}

impl<T> FieldRegistry<T> {
    /// All mappings in declaration order.
    #[must_use]
    pub fn mappings(&self) -> &[FieldMapping<T>] {
        &self.fields
    }

    /// Wire names of the key fields, in declaration order.
    #[must_use]
    pub fn key_names(&self) -> Vec<&str> {
        self.fields
            .iter()
            .filter(|m| m.descriptor.is_key)
            .map(|m| m.descriptor.wire_name.as_str())
            .collect()
    }

    /// Build a domain object from a wire map.
    ///
    /// Starts from `T::default()` and folds every known entry into it.
    /// Unknown keys are ignored and explicit `NULL`s are treated as absent.
    ///
    /// # Errors
    ///
    /// Returns a [`MappingError`] naming the first field that fails to decode.
    #[allow(clippy::implicit_hasher)]
    pub fn transform(&self, item: &HashMap<String, AttributeValue>) -> Result<T, MappingError>
    where
        T: Default,
    {
        let mut entity = T::default();
        for (name, value) in item {
            let Some(&position) = self.index.get(name) else {
                trace!(entity = %self.entity, field = %name, "ignoring unknown attribute");
                continue;
            };
            if value.is_null() {
                continue;
            }
            (self.fields[position].to_domain)(&mut entity, value)?;
        }
        Ok(entity)
    }

    /// Convert a domain object into a wire map; absent fields are omitted.
    ///
    /// # Errors
    ///
    /// Returns a [`MappingError`] for a field whose value has no wire form,
    /// such as a non-finite float.
    pub fn export(&self, entity: &T) -> Result<HashMap<String, AttributeValue>, MappingError> {
        self.export_where(entity, |_| true)
    }

    /// The minimal identity map of `entity`: key fields only.
    ///
    /// # Errors
    ///
    /// Same as [`FieldRegistry::export`].
    pub fn export_keys(&self, entity: &T) -> Result<HashMap<String, AttributeValue>, MappingError> {
        self.export_where(entity, |d| d.is_key)
    }

    fn export_where<F>(
        &self,
        entity: &T,
        include: F,
    ) -> Result<HashMap<String, AttributeValue>, MappingError>
    where
        F: Fn(&FieldDescriptor) -> bool,
    {
        let mut item = HashMap::new();
        for mapping in self.fields.iter().filter(|m| include(&m.descriptor)) {
            if let Some(value) = (mapping.to_wire)(entity)? {
                item.insert(mapping.descriptor.wire_name.clone(), value);
            }
        }
        Ok(item)
    }

    /// One unconditional `SET` per present non-key field, in declaration
    /// order. Explicit statements added afterward override these by path.
    ///
    /// # Errors
    ///
    /// Same as [`FieldRegistry::export`].
    pub fn derive_update(&self, entity: &T) -> Result<Update, MappingError> {
        let mut update = Update::new();
        for mapping in self.fields.iter().filter(|m| !m.descriptor.is_key) {
            if let Some(value) = (mapping.to_wire)(entity)? {
                update = update.set(
                    Path::attr(mapping.descriptor.wire_name.clone()),
                    ValueExpr::Constant(value),
                );
            }
        }
        Ok(update)
    }
}

impl<T> EntitySchema for FieldRegistry<T> {
    fn entity_name(&self) -> &str {
        &self.entity
    }

    fn field(&self, wire_name: &str) -> Option<&FieldDescriptor> {
        self.index
            .get(wire_name)
            .map(|&position| &self.fields[position].descriptor)
    }

    fn fields(&self) -> Vec<&FieldDescriptor> {
        self.fields.iter().map(|m| &m.descriptor).collect()
    }
}

/// Builder for [`FieldRegistry`].
pub struct FieldRegistryBuilder<T> {
    entity: String,
    fields: Vec<FieldMapping<T>>,
}

impl<T> fmt::Debug for FieldRegistryBuilder<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FieldRegistryBuilder")
            .field("entity", &self.entity)
            .field("fields", &self.fields.len())
            .finish()
    }
}

impl<T: 'static> FieldRegistryBuilder<T> {
    /// A field that is always present.
    #[must_use]
    pub fn field<V, G, S>(self, spec: FieldSpec, get: G, set: S) -> Self
    where
        V: AttributeCodec + 'static,
        G: Fn(&T) -> &V + Send + Sync + 'static,
        S: Fn(&mut T, V) + Send + Sync + 'static,
    {
        self.optional(spec, move |entity| Some(get(entity)), set)
    }

    /// A field that may be absent; absent values are omitted on export.
    #[must_use]
    pub fn optional<V, G, S>(self, spec: FieldSpec, get: G, set: S) -> Self
    where
        V: AttributeCodec + 'static,
        G: Fn(&T) -> Option<&V> + Send + Sync + 'static,
        S: Fn(&mut T, V) + Send + Sync + 'static,
    {
        let field = spec.wire_name.clone();
        let wire_field = field.clone();
        self.push(FieldMapping {
            descriptor: spec.describe(FieldShape::Scalar(V::ATTRIBUTE_TYPE)),
            to_domain: Box::new(move |entity, value| {
                let decoded = V::from_attribute(value).map_err(|source| MappingError::Field {
                    field: field.clone(),
                    source,
                })?;
                set(entity, decoded);
                Ok(())
            }),
            to_wire: Box::new(move |entity| {
                let Some(value) = get(entity).map(AttributeCodec::to_attribute) else {
                    return Ok(None);
                };
                if let Some(raw) = value.invalid_number() {
                    return Err(MappingError::Field {
                        field: wire_field.clone(),
                        source: CodecError::InvalidNumber {
                            value: raw.to_owned(),
                        },
                    });
                }
                Ok(Some(value))
            }),
        })
    }

    /// A nested entity stored as a wire map.
    #[must_use]
    pub fn entity<U, G, S>(self, spec: FieldSpec, get: G, set: S) -> Self
    where
        U: Entity,
        G: Fn(&T) -> Option<&U> + Send + Sync + 'static,
        S: Fn(&mut T, U) + Send + Sync + 'static,
    {
        let field = spec.wire_name.clone();
        let wire_field = field.clone();
        self.push(FieldMapping {
            descriptor: spec.describe(FieldShape::Entity(schema_of::<U>)),
            to_domain: Box::new(move |entity, value| {
                let nested = decode_entity::<U>(value).map_err(|source| MappingError::Nested {
                    field: field.clone(),
                    source: Box::new(source),
                })?;
                set(entity, nested);
                Ok(())
            }),
            to_wire: Box::new(move |entity| {
                get(entity)
                    .map(|nested| {
                        U::registry()
                            .export(nested)
                            .map(AttributeValue::M)
                            .map_err(|source| MappingError::Nested {
                                field: wire_field.clone(),
                                source: Box::new(source),
                            })
                    })
                    .transpose()
            }),
        })
    }

    /// A list of nested entities stored as a wire list of maps.
    #[must_use]
    pub fn entity_list<U, G, S>(self, spec: FieldSpec, get: G, set: S) -> Self
    where
        U: Entity,
        G: Fn(&T) -> &[U] + Send + Sync + 'static,
        S: Fn(&mut T, Vec<U>) + Send + Sync + 'static,
    {
        let field = spec.wire_name.clone();
        let wire_field = field.clone();
        self.push(FieldMapping {
            descriptor: spec.describe(FieldShape::EntityList(schema_of::<U>)),
            to_domain: Box::new(move |entity, value| {
                let elements = value.as_l().ok_or_else(|| MappingError::Field {
                    field: field.clone(),
                    source: mismatch(AttributeType::L, value),
                })?;
                let decoded = elements
                    .iter()
                    .enumerate()
                    .map(|(i, element)| {
                        decode_entity::<U>(element).map_err(|source| MappingError::Nested {
                            field: format!("{field}[{i}]"),
                            source: Box::new(source),
                        })
                    })
                    .collect::<Result<Vec<_>, _>>()?;
                set(entity, decoded);
                Ok(())
            }),
            to_wire: Box::new(move |entity| {
                let registry = U::registry();
                let elements = get(entity)
                    .iter()
                    .enumerate()
                    .map(|(i, nested)| {
                        registry.export(nested).map(AttributeValue::M).map_err(|source| {
                            MappingError::Nested {
                                field: format!("{wire_field}[{i}]"),
                                source: Box::new(source),
                            }
                        })
                    })
                    .collect::<Result<Vec<_>, _>>()?;
                Ok(Some(AttributeValue::L(elements)))
            }),
        })
    }

    fn push(mut self, mapping: FieldMapping<T>) -> Self {
        self.fields.push(mapping);
        self
    }

    /// Finish the registry.
    ///
    /// # Errors
    ///
    /// Returns a [`RegistryError`] for empty or duplicate wire names and for
    /// malformed or duplicate short codes.
    pub fn build(self) -> Result<FieldRegistry<T>, RegistryError> {
        let mut index = HashMap::with_capacity(self.fields.len());
        let mut codes = HashSet::new();
        for (position, mapping) in self.fields.iter().enumerate() {
            let descriptor = &mapping.descriptor;
            if descriptor.wire_name.is_empty() {
                return Err(RegistryError::EmptyWireName {
                    entity: self.entity,
                });
            }
            if index
                .insert(descriptor.wire_name.clone(), position)
                .is_some()
            {
                return Err(RegistryError::DuplicateField {
                    entity: self.entity,
                    field: descriptor.wire_name.clone(),
                });
            }
            if let Some(code) = &descriptor.short_code {
                if !is_placeholder_token(code) {
                    return Err(RegistryError::InvalidShortCode {
                        entity: self.entity,
                        code: code.clone(),
                    });
                }
                if !codes.insert(code.clone()) {
                    return Err(RegistryError::DuplicateShortCode {
                        entity: self.entity,
                        code: code.clone(),
                    });
                }
            }
        }

        Ok(FieldRegistry {
            entity: self.entity,
            fields: self.fields,
            index,
        })
    }
}

fn is_placeholder_token(code: &str) -> bool {
    !code.is_empty() && code.chars().all(|c| c.is_ascii_alphanumeric() || c == '_')
}

fn decode_entity<U: Entity>(value: &AttributeValue) -> Result<U, MappingError> {
    match value.as_m() {
        Some(map) => U::registry().transform(map),
        None => Err(MappingError::Field {
            field: U::registry().entity.clone(),
            source: mismatch(AttributeType::M, value),
        }),
    }
}
