//! Tracing spans.

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Unique span identifier.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct SpanId(String);

impl SpanId {
    pub fn generate() -> Self {
        Self(Uuid::new_v4().to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for SpanId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for SpanId {
    fn from(id: &str) -> Self {
        Self(id.to_string())
    }
}

/// Opaque handle a sink returns for a span it started.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SpanHandle(pub String);

/// Scalar span attribute.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum AttributeValue {
    Bool(bool),
    Int(i64),
    Float(f64),
    Str(String),
}

impl From<bool> for AttributeValue {
    fn from(v: bool) -> Self {
        AttributeValue::Bool(v)
    }
}

impl From<i64> for AttributeValue {
    fn from(v: i64) -> Self {
        AttributeValue::Int(v)
    }
}

impl From<f64> for AttributeValue {
    fn from(v: f64) -> Self {
        AttributeValue::Float(v)
    }
}

impl From<&str> for AttributeValue {
    fn from(v: &str) -> Self {
        AttributeValue::Str(v.to_string())
    }
}

impl From<String> for AttributeValue {
    fn from(v: String) -> Self {
        AttributeValue::Str(v)
    }
}

/// A span as stored by the tracer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Span {
    pub id: SpanId,
    pub name: String,
    pub start_time: u64,
    pub end_time: Option<u64>,
    pub parent_id: Option<SpanId>,
    pub attributes: BTreeMap<String, AttributeValue>,
    #[serde(skip)]
    pub handle: Option<SpanHandle>,
}

impl Span {
    pub fn duration_ms(&self) -> Option<u64> {
        self.end_time.map(|end| end.saturating_sub(self.start_time))
    }
}

/// What a caller holds for an in-flight operation.
///
/// Unsampled references carry no id; every tracer call made with one is a no-op.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SpanRef {
    id: Option<SpanId>,
    name: String,
}

impl SpanRef {
    pub(crate) fn sampled(id: SpanId, name: impl Into<String>) -> Self {
        Self {
            id: Some(id),
            name: name.into(),
        }
    }

    pub(crate) fn unsampled(name: impl Into<String>) -> Self {
        Self {
            id: None,
            name: name.into(),
        }
    }

    pub fn id(&self) -> Option<&SpanId> {
        self.id.as_ref()
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn is_sampled(&self) -> bool {
        self.id.is_some()
    }
}

/// Caller-supplied context for a new span.
#[derive(Debug, Clone, Default)]
pub struct SpanContext {
    /// Forces the sampling decision when set.
    pub sampled: Option<bool>,
    pub parent_id: Option<SpanId>,
}

impl SpanContext {
    pub fn child_of(parent: &SpanRef) -> Self {
        Self {
            sampled: Some(parent.is_sampled()),
            parent_id: parent.id().cloned(),
        }
    }
}
