//! Metric samples.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::error::{PipelineError, Result};

/// Metric labels. Ordering is canonical, so two label sets with the same
/// pairs always serialize to the same key.
pub type Labels = BTreeMap<String, String>;

/// A single metric sample.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Metric {
    pub name: String,
    pub value: f64,
    /// Epoch milliseconds.
    pub timestamp: u64,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub labels: Labels,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub unit: Option<String>,
}

impl Metric {
    pub fn new(name: impl Into<String>, value: f64, timestamp: u64) -> Self {
        Self {
            name: name.into(),
            value,
            timestamp,
            labels: Labels::new(),
            unit: None,
        }
    }

    pub fn with_label(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.labels.insert(key.into(), value.into());
        self
    }

    pub fn with_labels<K, V>(mut self, labels: impl IntoIterator<Item = (K, V)>) -> Self
    where
        K: Into<String>,
        V: Into<String>,
    {
        self.labels
            .extend(labels.into_iter().map(|(k, v)| (k.into(), v.into())));
        self
    }

    pub fn with_unit(mut self, unit: impl Into<String>) -> Self {
        self.unit = Some(unit.into());
        self
    }

    /// Reject samples that can never be exported meaningfully.
    pub fn validate(&self) -> Result<()> {
        if self.name.trim().is_empty() {
            return Err(PipelineError::Validation("metric name is empty".into()));
        }
        if !self.value.is_finite() {
            return Err(PipelineError::Validation(format!(
                "metric '{}' has non-finite value {}",
                self.name, self.value
            )));
        }
        if self.labels.keys().any(|k| k.is_empty()) {
            return Err(PipelineError::Validation(format!(
                "metric '{}' has an empty label key",
                self.name
            )));
        }
        Ok(())
    }

    /// Buffer key: name followed by the serialized label set.
    pub fn series_key(&self) -> String {
        let labels = serde_json::to_string(&self.labels).unwrap_or_default();
        format!("{}{}", self.name, labels)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_series_key_ignores_insertion_order() {
        let a = Metric::new("latency", 1.0, 0)
            .with_label("route", "/book")
            .with_label("region", "eu");
        let b = Metric::new("latency", 2.0, 5)
            .with_label("region", "eu")
            .with_label("route", "/book");

        assert_eq!(a.series_key(), b.series_key());
        assert_eq!(a.series_key(), r#"latency{"region":"eu","route":"/book"}"#);
    }

    #[test]
    fn test_validation() {
        assert!(Metric::new("ok", 1.0, 0).validate().is_ok());
        assert!(Metric::new("", 1.0, 0).validate().is_err());
        assert!(Metric::new("nan", f64::NAN, 0).validate().is_err());
        assert!(Metric::new("inf", f64::INFINITY, 0).validate().is_err());
        assert!(Metric::new("label", 1.0, 0)
            .with_label("", "x")
            .validate()
            .is_err());
    }
}
