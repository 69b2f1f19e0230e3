//! Placeholder allocation and the per-request placeholder namespace.
//!
//! Codes are produced in bijective base-N over a configurable alphabet, the
//! same numbering as spreadsheet columns: `A, B, ..., Z, AA, AB, ...`. There
//! is no "zero" digit, so every code is distinct and codes grow in length
//! only when all shorter codes are exhausted.
//!
//! [`ExpressionContext`] owns one allocator plus the name and value maps of a
//! single compiled request. Every `prepare` call of that request receives the
//! same context by `&mut`, so all clauses share one collision-free namespace.

use std::collections::{HashMap, HashSet};

use dynamap_model::AttributeValue;
use tracing::trace;

use crate::config::CompilerConfig;
use crate::error::ExpressionError;

/// Generates unique placeholder codes from an alphabet.
///
/// One allocator serves one compiled request; it is not meant to be reused.
#[derive(Debug, Clone)]
pub struct PlaceholderAllocator {
    alphabet: Vec<char>,
    position: u64,
}

impl PlaceholderAllocator {
    /// Create an allocator over the given symbols.
    ///
    /// The alphabet is only checked when the first code is requested.
    #[must_use]
    pub fn new(alphabet: &str) -> Self {
        Self {
            alphabet: alphabet.chars().collect(),
            position: 0,
        }
    }

    /// Number of codes handed out so far.
    #[must_use]
    pub fn position(&self) -> u64 {
        self.position
    }

    /// Return the next code.
    ///
    /// # Errors
    ///
    /// Returns [`ExpressionError::Allocation`] if the alphabet is empty,
    /// blank, has duplicate symbols, or has symbols that cannot appear in a
    /// placeholder token.
    #[allow(clippy::should_implement_trait)]
    pub fn next(&mut self) -> Result<String, ExpressionError> {
        self.check_alphabet()?;
        let code = encode(&self.alphabet, self.position);
        self.position += 1;
        Ok(code)
    }

    fn check_alphabet(&self) -> Result<(), ExpressionError> {
        if self.alphabet.iter().all(|c| c.is_whitespace()) {
            return Err(allocation_error("placeholder alphabet is empty or blank"));
        }
        let mut seen = HashSet::with_capacity(self.alphabet.len());
        for &symbol in &self.alphabet {
            if !(symbol.is_ascii_alphanumeric() || symbol == '_') {
                return Err(allocation_error(format!(
                    "symbol {symbol:?} cannot appear in a placeholder"
                )));
            }
            if !seen.insert(symbol) {
                return Err(allocation_error(format!(
                    "symbol {symbol:?} appears more than once"
                )));
            }
        }
        Ok(())
    }
}

fn check_numbers(value: &AttributeValue) -> Result<(), ExpressionError> {
    match value.invalid_number() {
        Some(raw) => Err(ExpressionError::InvalidNumber {
            value: raw.to_owned(),
        }),
        None => Ok(()),
    }
}

fn allocation_error(reason: impl Into<String>) -> ExpressionError {
    ExpressionError::Allocation {
        reason: reason.into(),
    }
}

/// Bijective base-N encoding of `n` (0-indexed).
#[allow(clippy::cast_possible_truncation)]
fn encode(alphabet: &[char], mut n: u64) -> String {
    let base = alphabet.len() as u64;
    let mut digits = Vec::new();
    loop {
        digits.push(alphabet[(n % base) as usize]);
        let rest = n / base;
        if rest == 0 {
            break;
        }
        n = rest - 1;
    }
    digits.iter().rev().collect()
}

/// A literal bound to a freshly minted `:value` placeholder.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BoundValue {
    /// The placeholder, including the `:` prefix.
    pub placeholder: String,
    /// The wire value behind the placeholder.
    pub value: AttributeValue,
}

/// Shared placeholder accumulator for one compiled request.
///
/// Field names are interned: every reference to the same field within a
/// request reuses one `#name` placeholder. Literals are not: each literal
/// gets a fresh `:value` placeholder even when an identical value was bound
/// before.
#[derive(Debug)]
pub struct ExpressionContext {
    allocator: PlaceholderAllocator,
    /// field name -> `#code`
    names: HashMap<String, String>,
    /// `#code` -> field name
    name_owners: HashMap<String, String>,
    /// `:code` -> wire value
    values: HashMap<String, AttributeValue>,
}

impl ExpressionContext {
    /// Create a context with the configured alphabet.
    #[must_use]
    pub fn new(config: &CompilerConfig) -> Self {
        Self::with_alphabet(&config.placeholder_alphabet)
    }

    /// Create a context over an explicit alphabet.
    #[must_use]
    pub fn with_alphabet(alphabet: &str) -> Self {
        Self {
            allocator: PlaceholderAllocator::new(alphabet),
            names: HashMap::new(),
            name_owners: HashMap::new(),
            values: HashMap::new(),
        }
    }

    /// Bind a field name to its `#name` placeholder.
    ///
    /// Reuses the field's existing placeholder. Otherwise `preferred` (the
    /// registry's short code) is used when it is still free, falling back to
    /// allocator-issued codes.
    ///
    /// # Errors
    ///
    /// Returns [`ExpressionError::Allocation`] if a code must be minted and
    /// the alphabet is unusable.
    pub fn bind_name(
        &mut self,
        field: &str,
        preferred: Option<&str>,
    ) -> Result<String, ExpressionError> {
        if let Some(existing) = self.names.get(field) {
            return Ok(existing.clone());
        }

        let preferred = preferred
            .map(|code| format!("#{code}"))
            .filter(|placeholder| !self.name_owners.contains_key(placeholder));
        let placeholder = match preferred {
            Some(placeholder) => placeholder,
            None => loop {
                let candidate = format!("#{}", self.allocator.next()?);
                if !self.name_owners.contains_key(&candidate) {
                    break candidate;
                }
            },
        };

        trace!(field, %placeholder, "bound name placeholder");
        self.names.insert(field.to_owned(), placeholder.clone());
        self.name_owners
            .insert(placeholder.clone(), field.to_owned());
        Ok(placeholder)
    }

    /// Bind a literal to a fresh `:value` placeholder.
    ///
    /// # Errors
    ///
    /// Returns [`ExpressionError::InvalidNumber`] for a non-finite number
    /// anywhere in `value`, and [`ExpressionError::Allocation`] if the
    /// alphabet is unusable.
    pub fn bind_value(&mut self, value: AttributeValue) -> Result<BoundValue, ExpressionError> {
        check_numbers(&value)?;
        let placeholder = loop {
            let candidate = format!(":{}", self.allocator.next()?);
            if !self.values.contains_key(&candidate) {
                break candidate;
            }
        };

        trace!(%placeholder, value = %value, "bound value placeholder");
        self.values.insert(placeholder.clone(), value.clone());
        Ok(BoundValue { placeholder, value })
    }

    /// Reserve a caller-supplied `#name` placeholder.
    ///
    /// # Errors
    ///
    /// Returns [`ExpressionError::PlaceholderConflict`] if the placeholder is
    /// already bound to a different field.
    pub fn reserve_name(&mut self, placeholder: &str, field: &str) -> Result<(), ExpressionError> {
        match self.name_owners.get(placeholder) {
            Some(owner) if owner != field => Err(ExpressionError::PlaceholderConflict {
                placeholder: placeholder.to_owned(),
                kind: "name",
            }),
            Some(_) => Ok(()),
            None => {
                self.name_owners
                    .insert(placeholder.to_owned(), field.to_owned());
                self.names
                    .entry(field.to_owned())
                    .or_insert_with(|| placeholder.to_owned());
                Ok(())
            }
        }
    }

    /// Reserve a caller-supplied `:value` placeholder.
    ///
    /// # Errors
    ///
    /// Returns [`ExpressionError::PlaceholderConflict`] if the placeholder is
    /// already bound to a different value, and
    /// [`ExpressionError::InvalidNumber`] for a non-finite number.
    pub fn reserve_value(
        &mut self,
        placeholder: &str,
        value: &AttributeValue,
    ) -> Result<(), ExpressionError> {
        check_numbers(value)?;
        match self.values.get(placeholder) {
            Some(existing) if existing != value => Err(ExpressionError::PlaceholderConflict {
                placeholder: placeholder.to_owned(),
                kind: "value",
            }),
            Some(_) => Ok(()),
            None => {
                self.values.insert(placeholder.to_owned(), value.clone());
                Ok(())
            }
        }
    }

    /// Field name -> `#name` placeholder, as consumed by
    /// [`Path::serialize_with_placeholders`](crate::path::Path::serialize_with_placeholders).
    #[must_use]
    pub fn names(&self) -> &HashMap<String, String> {
        &self.names
    }

    /// `:value` placeholder -> wire value, for everything bound so far.
    #[must_use]
    pub fn values(&self) -> &HashMap<String, AttributeValue> {
        &self.values
    }

    /// Number of codes the allocator has issued.
    #[must_use]
    pub fn allocated(&self) -> u64 {
        self.allocator.position()
    }
}
