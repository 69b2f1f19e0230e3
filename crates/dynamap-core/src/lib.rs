//! Client-side expression compiler for DynamoDB-style document stores.
//!
//! Callers describe *what* to read, write or check using typed [`Path`]s,
//! [`Condition`] trees and [`Update`] statement lists over an entity whose
//! [`FieldRegistry`] is declared once. The compiler validates every path
//! against the registry, binds collision-free `#name` / `:value`
//! placeholders and emits byte-exact expression strings plus their maps.
//! [`Table`] packages the result into the request shapes of
//! [`dynamap_model`]; sending them is left to a transport.
//!
//! Compilation is synchronous and deterministic. Registries are immutable
//! and shared; every compiled request owns its own [`ExpressionContext`].
#![allow(clippy::doc_markdown, clippy::module_name_repetitions)]

pub mod condition;
pub mod config;
pub mod error;
pub mod path;
pub mod placeholder;
pub mod registry;
pub mod request;
pub mod update;
pub mod validate;

#[cfg(test)]
mod fixtures;

pub use condition::{CompareOp, CompiledCondition, Condition, ResolvedCondition};
pub use config::CompilerConfig;
pub use error::{CodecError, ExpressionError, MappingError, RegistryError};
pub use path::{Collection, Path, ResolvedPath};
pub use placeholder::{ExpressionContext, PlaceholderAllocator};
pub use registry::{
    AttributeCodec, Entity, EntitySchema, FieldDescriptor, FieldRegistry, FieldShape, FieldSpec,
    Literal,
};
pub use request::{Get, Query, Scan, Table};
pub use update::{CompiledUpdate, MathOp, Update, UpdateStatement, ValueExpr};
