//! Stored documents.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// A stored document: a flat JSON object of named fields.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Document {
    fields: Map<String, Value>,
}

impl Document {
    pub fn new() -> Document {
        Document::default()
    }

    pub fn from_fields(fields: Map<String, Value>) -> Document {
        Document { fields }
    }

    /// Adds or replaces a field, returning the document for chaining.
    pub fn with_field(mut self, name: impl Into<String>, value: impl Into<Value>) -> Document {
        self.fields.insert(name.into(), value.into());
        self
    }

    pub fn get(&self, name: &str) -> Option<&Value> {
        self.fields.get(name)
    }

    /// Returns the field as a term. Only non-empty strings qualify; numbers would be
    /// rendered through `f64` and lose the stored text, so they yield `None` along with
    /// booleans, nulls, arrays and objects.
    pub fn get_text(&self, name: &str) -> Option<String> {
        self.fields.get(name).and_then(value_as_text)
    }

    pub fn fields(&self) -> &Map<String, Value> {
        &self.fields
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }
}

pub(crate) fn value_as_text(value: &Value) -> Option<String> {
    match value {
        Value::String(s) if !s.is_empty() => Some(s.clone()),
        _ => None,
    }
}
