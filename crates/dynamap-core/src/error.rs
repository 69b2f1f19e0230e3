//! Error types for expression compilation and entity mapping.
//!
//! Every error here is a schema or programming error raised before any
//! request fragment is produced; none of them are transient.

use dynamap_model::AttributeType;
use thiserror::Error;

/// Errors raised while preparing or serializing expressions.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ExpressionError {
    /// The placeholder alphabet cannot produce valid codes.
    #[error("cannot allocate placeholder: {reason}")]
    Allocation {
        /// Why the alphabet was rejected.
        reason: String,
    },
    /// A path references a field the entity registry does not declare.
    #[error("unknown field '{field}' for entity {entity}")]
    UnknownField {
        /// The offending field name.
        field: String,
        /// The entity (or enclosing field) that was searched.
        entity: String,
    },
    /// A path is structurally invalid.
    #[error("invalid path: {reason}")]
    InvalidPath {
        /// Explanation.
        reason: String,
    },
    /// A field segment has no placeholder in the supplied name map.
    #[error("no placeholder bound for field '{field}'")]
    UnresolvedName {
        /// The field without a placeholder.
        field: String,
    },
    /// A condition node is malformed (e.g. an empty `and` group).
    #[error("invalid condition: {reason}")]
    InvalidCondition {
        /// Explanation.
        reason: String,
    },
    /// A literal does not carry the field's declared wire type.
    #[error("type mismatch for '{path}': expected {expected}, found {actual}")]
    TypeMismatch {
        /// Literal form of the path.
        path: String,
        /// Declared wire type of the field.
        expected: AttributeType,
        /// Wire type of the literal.
        actual: AttributeType,
    },
    /// A literal carries a number string the store cannot represent.
    #[error("invalid number literal '{value}'")]
    InvalidNumber {
        /// The raw number string.
        value: String,
    },
    /// An entity could not be encoded into its wire map.
    #[error("cannot encode entity: {0}")]
    Mapping(#[from] MappingError),
    /// An update statement targets a key attribute.
    #[error("cannot update attribute {field}: this attribute is part of the key")]
    KeyUpdate {
        /// The key field.
        field: String,
    },
    /// A caller-supplied placeholder is already bound to something else.
    #[error("placeholder {placeholder} is already bound to a different {kind}")]
    PlaceholderConflict {
        /// The placeholder token.
        placeholder: String,
        /// `name` or `value`.
        kind: &'static str,
    },
    /// An expression references a placeholder missing from the maps.
    #[error("expression references undefined placeholder {placeholder}")]
    UndefinedPlaceholder {
        /// The placeholder token.
        placeholder: String,
    },
    /// A map defines a placeholder no expression references.
    #[error("placeholder {placeholder} is provided but unused in expressions")]
    UnusedPlaceholder {
        /// The placeholder token.
        placeholder: String,
    },
}

/// Errors raised when a single value cannot be encoded or decoded.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CodecError {
    /// The value has the wrong wire tag.
    #[error("expected {expected} attribute, found {actual}")]
    TypeMismatch {
        /// Expected wire type.
        expected: AttributeType,
        /// Actual wire type.
        actual: AttributeType,
    },
    /// A number string does not fit the target type.
    #[error("invalid number '{value}'")]
    InvalidNumber {
        /// The raw number string.
        value: String,
    },
}

/// Errors raised while converting between a wire map and a domain object.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum MappingError {
    /// A field's value could not be decoded.
    #[error("field '{field}': {source}")]
    Field {
        /// The wire field name.
        field: String,
        /// The decoding failure.
        #[source]
        source: CodecError,
    },
    /// A nested entity (or list element) failed to decode.
    #[error("field '{field}': {source}")]
    Nested {
        /// The wire field name, with `[i]` for list elements.
        field: String,
        /// The failure inside the nested entity.
        #[source]
        source: Box<MappingError>,
    },
}

/// Errors raised while building a field registry.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RegistryError {
    /// Two mappings share a wire name.
    #[error("entity {entity} declares field '{field}' more than once")]
    DuplicateField {
        /// Entity name.
        entity: String,
        /// The duplicated wire name.
        field: String,
    },
    /// Two mappings share a placeholder short code.
    #[error("entity {entity} declares short code '{code}' more than once")]
    DuplicateShortCode {
        /// Entity name.
        entity: String,
        /// The duplicated code.
        code: String,
    },
    /// A short code cannot be used as a `#name` placeholder.
    #[error("entity {entity} declares short code '{code}', expected one or more of [A-Za-z0-9_]")]
    InvalidShortCode {
        /// Entity name.
        entity: String,
        /// The rejected code.
        code: String,
    },
    /// A mapping has an empty wire name.
    #[error("entity {entity} declares a field with an empty wire name")]
    EmptyWireName {
        /// Entity name.
        entity: String,
    },
}
