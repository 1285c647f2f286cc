//! Correlation rule definitions.

use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};

use crate::model::{Alert, ERROR_ALERT};

/// One clause of a rule: at least `threshold` alerts of `alert_type`.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct RuleCondition {
    #[serde(rename = "type")]
    pub alert_type: String,
    pub threshold: u32,
    /// Restricts matches to these alert sources when set.
    #[serde(default)]
    pub sources: Option<BTreeSet<String>>,
}

impl RuleCondition {
    pub fn new(alert_type: impl Into<String>, threshold: u32) -> Self {
        Self {
            alert_type: alert_type.into(),
            threshold,
            sources: None,
        }
    }

    pub fn from_sources<I, S>(mut self, sources: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.sources = Some(sources.into_iter().map(Into::into).collect());
        self
    }

    pub fn matches(&self, alert: &Alert) -> bool {
        alert.alert_type == self.alert_type
            && self
                .sources
                .as_ref()
                .map_or(true, |sources| sources.contains(&alert.source))
    }
}

/// Fires when every condition is met by alerts inside the time window.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct CorrelationRule {
    pub name: String,
    pub time_window_ms: u64,
    pub conditions: Vec<RuleCondition>,
}

/// The built-in rule set, used when no rules are configured.
pub fn default_rules() -> Vec<CorrelationRule> {
    vec![
        CorrelationRule {
            name: "High Error Rate".to_string(),
            time_window_ms: 5 * 60 * 1000,
            conditions: vec![RuleCondition::new(ERROR_ALERT, 5)],
        },
        CorrelationRule {
            name: "Service Degradation".to_string(),
            time_window_ms: 10 * 60 * 1000,
            conditions: vec![
                RuleCondition::new("latency", 3).from_sources(["api_gateway", "database"]),
                RuleCondition::new(ERROR_ALERT, 2),
            ],
        },
        CorrelationRule {
            name: "System Overload".to_string(),
            time_window_ms: 5 * 60 * 1000,
            conditions: vec![
                RuleCondition::new("cpu_usage", 3),
                RuleCondition::new("memory_usage", 3),
            ],
        },
    ]
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::AlertSeverity;

    #[test]
    fn test_source_filter() {
        let condition = RuleCondition::new("latency", 1).from_sources(["database"]);
        let db = Alert::new("database", "latency", AlertSeverity::Medium, 0, "slow");
        let cache = Alert::new("cache", "latency", AlertSeverity::Medium, 0, "slow");
        let db_error = Alert::new("database", "error", AlertSeverity::Medium, 0, "down");

        assert!(condition.matches(&db));
        assert!(!condition.matches(&cache));
        assert!(!condition.matches(&db_error));
    }

    #[test]
    fn test_rules_deserialize() {
        let rule: CorrelationRule = toml::from_str(
            r#"
name = "Payment Outage"
time_window_ms = 60000

[[conditions]]
type = "error"
threshold = 2
sources = ["payments"]
"#,
        )
        .unwrap();

        assert_eq!(rule.conditions[0].alert_type, "error");
        assert!(rule.conditions[0].sources.as_ref().unwrap().contains("payments"));
    }
}
