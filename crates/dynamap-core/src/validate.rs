//! Placeholder consistency checks for assembled requests.
//!
//! The store rejects a request whose expressions reference an undefined
//! `#name` or `:value`, and also one whose maps carry an entry no expression
//! references. Compiled requests are checked for both before they leave the
//! compiler.

use std::collections::{BTreeSet, HashMap};

use dynamap_model::AttributeValue;

use crate::error::ExpressionError;

/// Collect every `#token` and `:token` referenced by `expression`.
fn collect_references<'a>(expression: &'a str, out: &mut BTreeSet<&'a str>) {
    let bytes = expression.as_bytes();
    let mut i = 0;
    while i < bytes.len() {
        if matches!(bytes[i], b'#' | b':') {
            let start = i;
            i += 1;
            while i < bytes.len() && (bytes[i].is_ascii_alphanumeric() || bytes[i] == b'_') {
                i += 1;
            }
            if i > start + 1 {
                out.insert(&expression[start..i]);
            }
        } else {
            i += 1;
        }
    }
}

/// Check that `expressions` and the placeholder maps agree exactly.
///
/// # Errors
///
/// Returns [`ExpressionError::UndefinedPlaceholder`] for the first (in
/// lexical order) reference missing from the maps, then
/// [`ExpressionError::UnusedPlaceholder`] for the first map entry no
/// expression references.
#[allow(clippy::implicit_hasher)]
pub fn check_placeholders<'a, I>(
    expressions: I,
    names: &HashMap<String, String>,
    values: &HashMap<String, AttributeValue>,
) -> Result<(), ExpressionError>
where
    I: IntoIterator<Item = &'a str>,
{
    let mut referenced = BTreeSet::new();
    for expression in expressions {
        collect_references(expression, &mut referenced);
    }

    if let Some(missing) = referenced
        .iter()
        .find(|token| !names.contains_key(**token) && !values.contains_key(**token))
    {
        return Err(ExpressionError::UndefinedPlaceholder {
            placeholder: (*missing).to_owned(),
        });
    }

    let unused = names
        .keys()
        .chain(values.keys())
        .filter(|key| !referenced.contains(key.as_str()))
        .min();
    if let Some(unused) = unused {
        return Err(ExpressionError::UnusedPlaceholder {
            placeholder: unused.clone(),
        });
    }

    Ok(())
}
