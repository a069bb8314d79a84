//! Word tokens of a record, as a lexical engine would see them.
//!
//! Diagnostic only: indexing itself is done by the text store's analyzer.

use regex::Regex;
use serde_json::{Map, Value};
use std::collections::BTreeSet;
use std::sync::LazyLock;

use crate::error::{Error, Result};

static NON_WORD: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\W+").expect("static regex"));

/// Lowercase, split on runs of non-word characters, dedupe and sort.
pub fn tokenize(text: &str) -> Vec<String> {
    let lowered = text.to_lowercase();
    let unique: BTreeSet<&str> = NON_WORD.split(&lowered).filter(|w| !w.is_empty()).collect();
    unique.into_iter().map(str::to_string).collect()
}

/// Tokens of the given `fields` of `doc`, joined with a space.
///
/// A missing (or null) field is an error, never silently skipped.
pub fn get_words(doc: &Map<String, Value>, fields: &[&str]) -> Result<Vec<String>> {
    let mut parts = Vec::with_capacity(fields.len());
    for field in fields {
        match doc.get(*field) {
            None | Some(Value::Null) => return Err(Error::FieldNotFound((*field).to_string())),
            Some(Value::String(s)) => parts.push(s.clone()),
            Some(other) => parts.push(other.to_string()),
        }
    }
    Ok(tokenize(&parts.join(" ")))
}
