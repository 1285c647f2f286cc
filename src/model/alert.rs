//! Alerts consumed by the correlator.

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::{PipelineError, Result};

/// Alert type produced for recorded errors.
pub const ERROR_ALERT: &str = "error";

/// Alert type of synthetic alerts emitted by the correlator.
pub const CORRELATION_ALERT: &str = "correlation";

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AlertSeverity {
    Low,
    Medium,
    High,
    Critical,
}

impl fmt::Display for AlertSeverity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            AlertSeverity::Low => "low",
            AlertSeverity::Medium => "medium",
            AlertSeverity::High => "high",
            AlertSeverity::Critical => "critical",
        };
        f.write_str(s)
    }
}

/// A raw or synthetic alert.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Alert {
    pub id: String,
    /// Component that raised the alert (e.g. `api_gateway`).
    pub source: String,
    #[serde(rename = "type")]
    pub alert_type: String,
    pub severity: AlertSeverity,
    /// Epoch milliseconds.
    pub timestamp: u64,
    pub message: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub context: Option<BTreeMap<String, String>>,
}

impl Alert {
    /// Create an alert with a fresh random id.
    pub fn new(
        source: impl Into<String>,
        alert_type: impl Into<String>,
        severity: AlertSeverity,
        timestamp: u64,
        message: impl Into<String>,
    ) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            source: source.into(),
            alert_type: alert_type.into(),
            severity,
            timestamp,
            message: message.into(),
            context: None,
        }
    }

    pub fn with_context(mut self, context: BTreeMap<String, String>) -> Self {
        self.context = Some(context);
        self
    }

    pub fn validate(&self) -> Result<()> {
        if self.source.trim().is_empty() || self.alert_type.trim().is_empty() {
            return Err(PipelineError::Validation(format!(
                "alert {} must carry a source and a type",
                self.id
            )));
        }
        Ok(())
    }
}
