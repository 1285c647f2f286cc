//! Health signals and error reports.

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum HealthStatus {
    Healthy,
    Degraded,
    Unhealthy,
}

impl fmt::Display for HealthStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            HealthStatus::Healthy => "healthy",
            HealthStatus::Degraded => "degraded",
            HealthStatus::Unhealthy => "unhealthy",
        };
        f.write_str(s)
    }
}

/// Health signal for one component.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HealthCheck {
    pub component: String,
    pub status: HealthStatus,
    pub message: String,
    pub timestamp: u64,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub details: BTreeMap<String, String>,
}

impl HealthCheck {
    pub fn new(
        component: impl Into<String>,
        status: HealthStatus,
        message: impl Into<String>,
        timestamp: u64,
    ) -> Self {
        Self {
            component: component.into(),
            status,
            message: message.into(),
            timestamp,
            details: BTreeMap::new(),
        }
    }

    pub fn with_detail(mut self, key: impl Into<String>, value: impl ToString) -> Self {
        self.details.insert(key.into(), value.to_string());
        self
    }
}

/// An application error handed to the pipeline by a producer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ErrorReport {
    pub message: String,
    pub timestamp: u64,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub context: BTreeMap<String, String>,
}

impl ErrorReport {
    pub fn new(message: impl Into<String>, timestamp: u64) -> Self {
        Self {
            message: message.into(),
            timestamp,
            context: BTreeMap::new(),
        }
    }

    /// Build a report from any error, flattening its source chain into the message.
    pub fn from_error(err: &(dyn std::error::Error + 'static), timestamp: u64) -> Self {
        let mut message = err.to_string();
        let mut source = err.source();
        while let Some(cause) = source {
            message.push_str(": ");
            message.push_str(&cause.to_string());
            source = cause.source();
        }
        Self::new(message, timestamp)
    }

    pub fn with_context(mut self, context: BTreeMap<String, String>) -> Self {
        self.context.extend(context);
        self
    }

    /// Component the error is attributed to, `application` when unknown.
    pub fn source(&self) -> &str {
        self.context
            .get("source")
            .or_else(|| self.context.get("component"))
            .map(String::as_str)
            .unwrap_or("application")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug, thiserror::Error)]
    #[error("outer")]
    struct Outer(#[source] std::io::Error);

    #[test]
    fn test_from_error_flattens_chain() {
        let err = Outer(std::io::Error::new(std::io::ErrorKind::Other, "disk full"));
        let report = ErrorReport::from_error(&err, 7);
        assert_eq!(report.message, "outer: disk full");
        assert_eq!(report.source(), "application");
    }

    #[test]
    fn test_source_from_context() {
        let mut ctx = BTreeMap::new();
        ctx.insert("component".to_string(), "database".to_string());
        let report = ErrorReport::new("timeout", 0).with_context(ctx);
        assert_eq!(report.source(), "database");
    }
}
