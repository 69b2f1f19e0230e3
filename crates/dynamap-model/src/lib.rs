//! Wire types for dynamap.
//!
//! This crate holds the document-store side of the contract: the tagged
//! [`AttributeValue`] representation with its JSON codec, and the request
//! shapes (`GetItem`, `PutItem`, `UpdateItem`, ...) that the expression
//! compiler fills in and an external transport sends.
// "DynamoDB" appears in virtually every doc comment in this crate.
#![allow(clippy::doc_markdown)]
#![allow(clippy::module_name_repetitions)]

pub mod attribute_value;
pub mod input;
pub mod operations;
pub mod request;

pub use attribute_value::{AttributeType, AttributeValue};
pub use operations::DynamoDBOperation;
pub use request::Request;
