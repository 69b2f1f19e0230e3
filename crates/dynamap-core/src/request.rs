//! Request assembly.
//!
//! A [`Table`] binds an entity type to a table name and packages compiled
//! expressions into the request shapes of `dynamap-model`. Every request is
//! compiled on its own [`ExpressionContext`], so all expressions of one
//! request (condition, update, key condition, filter, projection) share a
//! single placeholder namespace.

use std::collections::HashMap;
use std::fmt;
use std::marker::PhantomData;

use dynamap_model::input::{
    DeleteItemInput, GetItemInput, PutItemInput, QueryInput, ScanInput, UpdateItemInput,
};
use dynamap_model::{AttributeValue, DynamoDBOperation};
use tracing::debug;

use crate::condition::Condition;
use crate::config::CompilerConfig;
use crate::error::ExpressionError;
use crate::path::Path;
use crate::placeholder::ExpressionContext;
use crate::registry::{Entity, EntitySchema};
use crate::update::Update;
use crate::validate::check_placeholders;

/// Point-read parameters.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Get {
    projection: Vec<Path>,
    consistent_read: bool,
}

impl Get {
    /// Read the whole item.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Return only these attributes.
    #[must_use]
    pub fn project(mut self, paths: impl IntoIterator<Item = Path>) -> Self {
        self.projection.extend(paths);
        self
    }

    /// Request a strongly consistent read.
    #[must_use]
    pub fn consistent_read(mut self) -> Self {
        self.consistent_read = true;
        self
    }
}

/// Query parameters: a key condition plus optional refinements.
#[derive(Debug, Clone, PartialEq)]
pub struct Query {
    key_condition: Condition,
    index: Option<String>,
    filter: Option<Condition>,
    projection: Vec<Path>,
    limit: Option<i32>,
    descending: bool,
    consistent_read: bool,
}

impl Query {
    /// A query selecting items by `key_condition`.
    #[must_use]
    pub fn new(key_condition: Condition) -> Self {
        Self {
            key_condition,
            index: None,
            filter: None,
            projection: Vec::new(),
            limit: None,
            descending: false,
            consistent_read: false,
        }
    }

    /// Query a secondary index instead of the table.
    #[must_use]
    pub fn index(mut self, name: impl Into<String>) -> Self {
        self.index = Some(name.into());
        self
    }

    /// Filter applied after the key condition.
    #[must_use]
    pub fn filter(mut self, condition: Condition) -> Self {
        self.filter = Some(condition);
        self
    }

    /// Return only these attributes.
    #[must_use]
    pub fn project(mut self, paths: impl IntoIterator<Item = Path>) -> Self {
        self.projection.extend(paths);
        self
    }

    /// Evaluate at most `limit` items.
    #[must_use]
    pub fn limit(mut self, limit: i32) -> Self {
        self.limit = Some(limit);
        self
    }

    /// Walk the sort key in descending order.
    #[must_use]
    pub fn descending(mut self) -> Self {
        self.descending = true;
        self
    }

    /// Request a strongly consistent read.
    #[must_use]
    pub fn consistent_read(mut self) -> Self {
        self.consistent_read = true;
        self
    }
}

/// Scan parameters.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Scan {
    index: Option<String>,
    filter: Option<Condition>,
    projection: Vec<Path>,
    limit: Option<i32>,
    consistent_read: bool,
}

impl Scan {
    /// A scan over the whole table.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Scan a secondary index instead of the table.
    #[must_use]
    pub fn index(mut self, name: impl Into<String>) -> Self {
        self.index = Some(name.into());
        self
    }

    /// Filter applied to every scanned item.
    #[must_use]
    pub fn filter(mut self, condition: Condition) -> Self {
        self.filter = Some(condition);
        self
    }

    /// Return only these attributes.
    #[must_use]
    pub fn project(mut self, paths: impl IntoIterator<Item = Path>) -> Self {
        self.projection.extend(paths);
        self
    }

    /// Evaluate at most `limit` items.
    #[must_use]
    pub fn limit(mut self, limit: i32) -> Self {
        self.limit = Some(limit);
        self
    }

    /// Request a strongly consistent read.
    #[must_use]
    pub fn consistent_read(mut self) -> Self {
        self.consistent_read = true;
        self
    }
}

/// Accumulated fragments of one request.
#[derive(Default)]
struct Fragments {
    names: HashMap<String, String>,
    values: HashMap<String, AttributeValue>,
}

impl Fragments {
    fn condition(
        &mut self,
        ctx: &mut ExpressionContext,
        schema: &dyn EntitySchema,
        condition: Option<&Condition>,
    ) -> Result<Option<String>, ExpressionError> {
        let Some(condition) = condition else {
            return Ok(None);
        };
        let resolved = condition.prepare(ctx, schema)?;
        self.names.extend(resolved.attribute_names());
        self.values.extend(resolved.attribute_values());
        Ok(Some(resolved.serialize()))
    }

    fn projection(
        &mut self,
        ctx: &mut ExpressionContext,
        schema: &dyn EntitySchema,
        paths: &[Path],
    ) -> Result<Option<String>, ExpressionError> {
        if paths.is_empty() {
            return Ok(None);
        }
        let mut parts = Vec::with_capacity(paths.len());
        for path in paths {
            let resolved = path.resolve(ctx, schema)?;
            self.names.extend(resolved.names);
            parts.push(resolved.expression);
        }
        Ok(Some(parts.join(", ")))
    }
}

/// A table storing entities of type `T`.
pub struct Table<T> {
    name: String,
    config: CompilerConfig,
    _entity: PhantomData<fn() -> T>,
}

impl<T> fmt::Debug for Table<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Table")
            .field("name", &self.name)
            .field("config", &self.config)
            .finish()
    }
}

impl<T> Clone for Table<T> {
    fn clone(&self) -> Self {
        Self {
            name: self.name.clone(),
            config: self.config.clone(),
            _entity: PhantomData,
        }
    }
}

impl<T: Entity> Table<T> {
    /// A table with the default compiler configuration.
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        Self::with_config(name, CompilerConfig::default())
    }

    /// A table with an explicit compiler configuration.
    #[must_use]
    pub fn with_config(name: impl Into<String>, config: CompilerConfig) -> Self {
        Self {
            name: name.into(),
            config,
            _entity: PhantomData,
        }
    }

    /// The table name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// The compiler configuration.
    #[must_use]
    pub fn config(&self) -> &CompilerConfig {
        &self.config
    }

    fn context(&self) -> ExpressionContext {
        ExpressionContext::new(&self.config)
    }

    fn finish(
        &self,
        operation: DynamoDBOperation,
        expressions: &[Option<&str>],
        fragments: &Fragments,
    ) -> Result<(), ExpressionError> {
        if self.config.validate_placeholders {
            check_placeholders(
                expressions.iter().flatten().copied(),
                &fragments.names,
                &fragments.values,
            )?;
        }
        debug!(
            table = %self.name,
            operation = %operation,
            names = fragments.names.len(),
            values = fragments.values.len(),
            "compiled request"
        );
        Ok(())
    }

    /// `GetItem` for the item identified by the keys of `key`.
    ///
    /// # Errors
    ///
    /// Returns an [`ExpressionError`] if a key field cannot be encoded.
    pub fn get(&self, key: &T) -> Result<GetItemInput, ExpressionError> {
        self.read(key, &Get::new())
    }

    /// `GetItem` returning only the attributes at `paths`.
    ///
    /// # Errors
    ///
    /// Returns an [`ExpressionError`] if a path does not resolve.
    pub fn get_projected(&self, key: &T, paths: &[Path]) -> Result<GetItemInput, ExpressionError> {
        self.read(key, &Get::new().project(paths.iter().cloned()))
    }

    /// `GetItem` with explicit read options.
    ///
    /// # Errors
    ///
    /// Returns an [`ExpressionError`] if a projected path does not resolve
    /// or a key field cannot be encoded.
    pub fn read(&self, key: &T, get: &Get) -> Result<GetItemInput, ExpressionError> {
        let schema = T::registry();
        let mut ctx = self.context();
        let mut fragments = Fragments::default();
        let projection = fragments.projection(&mut ctx, schema, &get.projection)?;
        self.finish(
            DynamoDBOperation::GetItem,
            &[projection.as_deref()],
            &fragments,
        )?;

        Ok(GetItemInput {
            table_name: self.name.clone(),
            key: schema.export_keys(key)?,
            consistent_read: get.consistent_read.then_some(true),
            projection_expression: projection,
            expression_attribute_names: fragments.names,
        })
    }

    /// `PutItem` writing every present field of `item`.
    ///
    /// # Errors
    ///
    /// Returns an [`ExpressionError`] if the condition does not compile or a
    /// field cannot be encoded.
    pub fn put(&self, item: &T, condition: Option<&Condition>) -> Result<PutItemInput, ExpressionError> {
        let schema = T::registry();
        let mut ctx = self.context();
        let mut fragments = Fragments::default();
        let condition_expression = fragments.condition(&mut ctx, schema, condition)?;
        self.finish(
            DynamoDBOperation::PutItem,
            &[condition_expression.as_deref()],
            &fragments,
        )?;

        Ok(PutItemInput {
            table_name: self.name.clone(),
            item: schema.export(item)?,
            condition_expression,
            expression_attribute_names: fragments.names,
            expression_attribute_values: fragments.values,
        })
    }

    /// `DeleteItem` for the item identified by the keys of `key`.
    ///
    /// # Errors
    ///
    /// Returns an [`ExpressionError`] if the condition does not compile.
    pub fn delete(
        &self,
        key: &T,
        condition: Option<&Condition>,
    ) -> Result<DeleteItemInput, ExpressionError> {
        let schema = T::registry();
        let mut ctx = self.context();
        let mut fragments = Fragments::default();
        let condition_expression = fragments.condition(&mut ctx, schema, condition)?;
        self.finish(
            DynamoDBOperation::DeleteItem,
            &[condition_expression.as_deref()],
            &fragments,
        )?;

        Ok(DeleteItemInput {
            table_name: self.name.clone(),
            key: schema.export_keys(key)?,
            condition_expression,
            expression_attribute_names: fragments.names,
            expression_attribute_values: fragments.values,
        })
    }

    /// `UpdateItem` applying `update` to the item identified by `key`.
    ///
    /// # Errors
    ///
    /// Returns an [`ExpressionError`] if the update or condition does not
    /// compile.
    pub fn update(
        &self,
        key: &T,
        update: &Update,
        condition: Option<&Condition>,
    ) -> Result<UpdateItemInput, ExpressionError> {
        let schema = T::registry();
        let mut ctx = self.context();
        let compiled = update.compile_with(&mut ctx, schema, condition)?;
        let fragments = Fragments {
            names: compiled.names,
            values: compiled.values,
        };
        self.finish(
            DynamoDBOperation::UpdateItem,
            &[
                compiled.update_expression.as_deref(),
                compiled.condition_expression.as_deref(),
            ],
            &fragments,
        )?;

        Ok(UpdateItemInput {
            table_name: self.name.clone(),
            key: schema.export_keys(key)?,
            update_expression: compiled.update_expression,
            condition_expression: compiled.condition_expression,
            expression_attribute_names: fragments.names,
            expression_attribute_values: fragments.values,
        })
    }

    /// Upsert every present non-key field of `item`.
    ///
    /// # Errors
    ///
    /// Returns an [`ExpressionError`] if the derived update or the condition
    /// does not compile.
    pub fn save(
        &self,
        item: &T,
        condition: Option<&Condition>,
    ) -> Result<UpdateItemInput, ExpressionError> {
        let update = T::registry().derive_update(item)?;
        self.update(item, &update, condition)
    }

    /// `Scan` with optional filter and projection.
    ///
    /// # Errors
    ///
    /// Returns an [`ExpressionError`] if the filter or a projected path does
    /// not compile.
    pub fn scan(&self, scan: &Scan) -> Result<ScanInput, ExpressionError> {
        let schema = T::registry();
        let mut ctx = self.context();
        let mut fragments = Fragments::default();
        let filter_expression = fragments.condition(&mut ctx, schema, scan.filter.as_ref())?;
        let projection_expression = fragments.projection(&mut ctx, schema, &scan.projection)?;
        self.finish(
            DynamoDBOperation::Scan,
            &[filter_expression.as_deref(), projection_expression.as_deref()],
            &fragments,
        )?;

        Ok(ScanInput {
            table_name: self.name.clone(),
            index_name: scan.index.clone(),
            filter_expression,
            projection_expression,
            expression_attribute_names: fragments.names,
            expression_attribute_values: fragments.values,
            limit: scan.limit,
            consistent_read: scan.consistent_read.then_some(true),
        })
    }

    /// `Query` with a key condition and optional filter and projection.
    ///
    /// # Errors
    ///
    /// Returns an [`ExpressionError`] if the key condition, filter or a
    /// projected path does not compile.
    pub fn query(&self, query: &Query) -> Result<QueryInput, ExpressionError> {
        let schema = T::registry();
        let mut ctx = self.context();
        let mut fragments = Fragments::default();
        let key_condition_expression =
            fragments.condition(&mut ctx, schema, Some(&query.key_condition))?;
        let filter_expression = fragments.condition(&mut ctx, schema, query.filter.as_ref())?;
        let projection_expression = fragments.projection(&mut ctx, schema, &query.projection)?;
        self.finish(
            DynamoDBOperation::Query,
            &[
                key_condition_expression.as_deref(),
                filter_expression.as_deref(),
                projection_expression.as_deref(),
            ],
            &fragments,
        )?;

        Ok(QueryInput {
            table_name: self.name.clone(),
            index_name: query.index.clone(),
            key_condition_expression,
            filter_expression,
            projection_expression,
            expression_attribute_names: fragments.names,
            expression_attribute_values: fragments.values,
            scan_index_forward: query.descending.then_some(false),
            limit: query.limit,
            consistent_read: query.consistent_read.then_some(true),
        })
    }
}
