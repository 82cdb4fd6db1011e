//! Attribute documents
//!
//! The structured key/value payload exchanged during handshakes and persisted
//! through the metadata store plugins. A small tagged union rather than a
//! backend-specific type, so plugin implementations convert at their edges.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// A structured document: nested maps/arrays over scalar leaves.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum AttributeDocument {
    Null,
    Bool(bool),
    Int(i64),
    Float(f64),
    Str(String),
    Array(Vec<AttributeDocument>),
    Map(BTreeMap<String, AttributeDocument>),
}

impl AttributeDocument {
    /// Empty map document
    pub fn map() -> Self {
        AttributeDocument::Map(BTreeMap::new())
    }

    /// Look up a field of a map document
    pub fn get(&self, key: &str) -> Option<&AttributeDocument> {
        match self {
            AttributeDocument::Map(m) => m.get(key),
            _ => None,
        }
    }

    /// Insert a field into a map document; ignored for non-maps.
    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<AttributeDocument>) {
        if let AttributeDocument::Map(m) = self {
            m.insert(key.into(), value.into());
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            AttributeDocument::Str(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_i64(&self) -> Option<i64> {
        match self {
            AttributeDocument::Int(n) => Some(*n),
            _ => None,
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            AttributeDocument::Bool(b) => Some(*b),
            _ => None,
        }
    }

    pub fn is_null(&self) -> bool {
        matches!(self, AttributeDocument::Null)
    }
}

impl From<&str> for AttributeDocument {
    fn from(s: &str) -> Self {
        AttributeDocument::Str(s.to_string())
    }
}

impl From<String> for AttributeDocument {
    fn from(s: String) -> Self {
        AttributeDocument::Str(s)
    }
}

impl From<i64> for AttributeDocument {
    fn from(n: i64) -> Self {
        AttributeDocument::Int(n)
    }
}

impl From<u64> for AttributeDocument {
    fn from(n: u64) -> Self {
        AttributeDocument::Int(n as i64)
    }
}

impl From<bool> for AttributeDocument {
    fn from(b: bool) -> Self {
        AttributeDocument::Bool(b)
    }
}

impl From<Vec<AttributeDocument>> for AttributeDocument {
    fn from(v: Vec<AttributeDocument>) -> Self {
        AttributeDocument::Array(v)
    }
}

impl From<serde_json::Value> for AttributeDocument {
    fn from(v: serde_json::Value) -> Self {
        match v {
            serde_json::Value::Null => AttributeDocument::Null,
            serde_json::Value::Bool(b) => AttributeDocument::Bool(b),
            serde_json::Value::Number(n) => {
                if let Some(i) = n.as_i64() {
                    AttributeDocument::Int(i)
                } else {
                    AttributeDocument::Float(n.as_f64().unwrap_or(f64::NAN))
                }
            }
            serde_json::Value::String(s) => AttributeDocument::Str(s),
            serde_json::Value::Array(a) => {
                AttributeDocument::Array(a.into_iter().map(Into::into).collect())
            }
            serde_json::Value::Object(o) => AttributeDocument::Map(
                o.into_iter().map(|(k, v)| (k, v.into())).collect(),
            ),
        }
    }
}

impl From<AttributeDocument> for serde_json::Value {
    fn from(d: AttributeDocument) -> Self {
        match d {
            AttributeDocument::Null => serde_json::Value::Null,
            AttributeDocument::Bool(b) => serde_json::Value::Bool(b),
            AttributeDocument::Int(n) => serde_json::Value::from(n),
            AttributeDocument::Float(f) => {
                serde_json::Number::from_f64(f).map_or(serde_json::Value::Null, Into::into)
            }
            AttributeDocument::Str(s) => serde_json::Value::String(s),
            AttributeDocument::Array(a) => {
                serde_json::Value::Array(a.into_iter().map(Into::into).collect())
            }
            AttributeDocument::Map(m) => serde_json::Value::Object(
                m.into_iter().map(|(k, v)| (k, v.into())).collect(),
            ),
        }
    }
}
