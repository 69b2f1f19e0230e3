//! Envelope over the item-level request shapes.
//!
//! A transport receives a [`Request`], sends `to_json()` as the body and
//! `operation().target()` as the `X-Amz-Target` header.

use serde::Serialize;

use crate::input::{
    DeleteItemInput, GetItemInput, PutItemInput, QueryInput, ScanInput, UpdateItemInput,
};
use crate::operations::DynamoDBOperation;

/// A fully assembled request, ready for a transport.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum Request {
    /// `GetItem` request.
    GetItem(GetItemInput),
    /// `PutItem` request.
    PutItem(PutItemInput),
    /// `UpdateItem` request.
    UpdateItem(UpdateItemInput),
    /// `DeleteItem` request.
    DeleteItem(DeleteItemInput),
    /// `Query` request.
    Query(QueryInput),
    /// `Scan` request.
    Scan(ScanInput),
}

impl Request {
    /// The operation this request addresses.
    #[must_use]
    pub fn operation(&self) -> DynamoDBOperation {
        match self {
            Self::GetItem(_) => DynamoDBOperation::GetItem,
            Self::PutItem(_) => DynamoDBOperation::PutItem,
            Self::UpdateItem(_) => DynamoDBOperation::UpdateItem,
            Self::DeleteItem(_) => DynamoDBOperation::DeleteItem,
            Self::Query(_) => DynamoDBOperation::Query,
            Self::Scan(_) => DynamoDBOperation::Scan,
        }
    }

    /// The `X-Amz-Target` header value, e.g. `DynamoDB_20120810.Query`.
    #[must_use]
    pub fn target(&self) -> String {
        self.operation().target()
    }

    /// The table the request targets.
    #[must_use]
    pub fn table_name(&self) -> &str {
        match self {
            Self::GetItem(i) => &i.table_name,
            Self::PutItem(i) => &i.table_name,
            Self::UpdateItem(i) => &i.table_name,
            Self::DeleteItem(i) => &i.table_name,
            Self::Query(i) => &i.table_name,
            Self::Scan(i) => &i.table_name,
        }
    }

    /// Serialize the request body.
    ///
    /// # Errors
    ///
    /// Returns a `serde_json::Error` if serialization fails.
    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string(self)
    }
}

macro_rules! impl_from_input {
    ($($input:ty => $variant:ident),* $(,)?) => {
        $(
            impl From<$input> for Request {
                fn from(input: $input) -> Self {
                    Self::$variant(input)
                }
            }
        )*
    };
}

impl_from_input! {
    GetItemInput => GetItem,
    PutItemInput => PutItem,
    UpdateItemInput => UpdateItem,
    DeleteItemInput => DeleteItem,
    QueryInput => Query,
    ScanInput => Scan,
}
