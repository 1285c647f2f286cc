//! Sliding-window alert correlator.

use std::collections::{BTreeMap, HashSet, VecDeque};
use std::sync::Arc;

use parking_lot::Mutex;

use crate::config::CorrelationConfig;
use crate::correlation::rules::{default_rules, CorrelationRule};
use crate::lifecycle::Clock;
use crate::model::{
    Alert, AlertSeverity, ErrorReport, HealthCheck, HealthStatus, CORRELATION_ALERT, ERROR_ALERT,
};
use crate::observability::metrics;
use crate::resilience::RetryHandler;
use crate::sink::Sink;

const COMPONENT: &str = "alert_correlator";

/// How many generations of synthetic alerts are fed back.
const MAX_FEEDBACK_DEPTH: usize = 4;

#[derive(Debug)]
struct LoggedAlert {
    alert: Alert,
    /// Rules this alert already contributed to.
    consumed_by: HashSet<usize>,
}

#[derive(Debug)]
pub struct AlertCorrelator {
    rules: Vec<CorrelationRule>,
    log: Mutex<VecDeque<LoggedAlert>>,
    max_alert_age_ms: u64,
    max_alerts: usize,
    clock: Arc<dyn Clock>,
    sink: Arc<dyn Sink>,
    retry: RetryHandler,
}

impl AlertCorrelator {
    pub fn new(
        config: &CorrelationConfig,
        clock: Arc<dyn Clock>,
        sink: Arc<dyn Sink>,
        retry: RetryHandler,
    ) -> Self {
        let rules = if config.rules.is_empty() {
            default_rules()
        } else {
            config.rules.clone()
        };

        Self {
            rules,
            log: Mutex::new(VecDeque::new()),
            max_alert_age_ms: config.max_alert_age_ms,
            max_alerts: config.max_alerts.max(1),
            clock,
            sink,
            retry,
        }
    }

    pub fn rules(&self) -> &[CorrelationRule] {
        &self.rules
    }

    /// Log `alert`, evaluate every rule, and feed correlations back in.
    ///
    /// Returns the correlation alerts synthesized along the way.
    pub async fn process_alert(&self, alert: Alert) -> Vec<Alert> {
        let mut queue = VecDeque::from([(alert, 0usize)]);
        let mut correlated = Vec::new();

        while let Some((alert, depth)) = queue.pop_front() {
            for (rule, synthetic, contributing) in self.ingest(alert) {
                tracing::warn!(
                    rule = %rule,
                    alerts = contributing,
                    correlation_id = %synthetic.id,
                    "Correlation rule fired"
                );
                metrics::record_correlation(&rule);
                self.emit_health(&rule, contributing, synthetic.timestamp).await;

                if depth + 1 < MAX_FEEDBACK_DEPTH {
                    queue.push_back((synthetic.clone(), depth + 1));
                } else {
                    tracing::debug!(rule = %rule, "Correlation feedback depth reached");
                }
                correlated.push(synthetic);
            }
        }
        correlated
    }

    /// Turn an application error into an `error` alert and process it.
    pub async fn process_error(&self, report: &ErrorReport) -> Vec<Alert> {
        let mut alert = Alert::new(
            report.source(),
            ERROR_ALERT,
            AlertSeverity::Medium,
            self.clock.now_ms(),
            report.message.clone(),
        );
        if !report.context.is_empty() {
            alert = alert.with_context(report.context.clone());
        }
        self.process_alert(alert).await
    }

    /// Drop alerts older than `max_alert_age`. Returns how many were removed.
    pub fn prune(&self) -> usize {
        let now = self.clock.now_ms();
        let max_age = self.max_alert_age_ms;

        let mut log = self.log.lock();
        let before = log.len();
        log.retain(|entry| now.saturating_sub(entry.alert.timestamp) <= max_age);
        let pruned = before - log.len();

        if pruned > 0 {
            tracing::debug!(pruned = pruned, remaining = log.len(), "Expired alerts pruned");
        }
        pruned
    }

    /// Alerts currently held in the log.
    pub fn alert_count(&self) -> usize {
        self.log.lock().len()
    }

    /// Append `alert` and return `(rule name, synthetic alert, contributing count)` per firing.
    fn ingest(&self, alert: Alert) -> Vec<(String, Alert, usize)> {
        let now = self.clock.now_ms();
        let mut log = self.log.lock();

        let mut evicted = 0;
        while log.len() >= self.max_alerts {
            log.pop_front();
            evicted += 1;
        }
        if evicted > 0 {
            tracing::debug!(evicted = evicted, "Alert log full, evicting oldest");
            metrics::record_evicted("alert", evicted);
        }

        tracing::trace!(alert_type = %alert.alert_type, source = %alert.source, "Alert logged");
        log.push_back(LoggedAlert {
            alert,
            consumed_by: HashSet::new(),
        });

        let mut fired = Vec::new();
        for (index, rule) in self.rules.iter().enumerate() {
            let Some(contributing) = evaluate(rule, index, &log, now) else {
                continue;
            };

            let ids: Vec<String> = contributing
                .iter()
                .map(|&i| log[i].alert.id.clone())
                .collect();
            for &i in &contributing {
                log[i].consumed_by.insert(index);
            }

            let mut context = BTreeMap::new();
            context.insert("rule".to_string(), rule.name.clone());
            context.insert("alert_ids".to_string(), ids.join(","));
            context.insert("alert_count".to_string(), ids.len().to_string());

            let synthetic = Alert::new(
                COMPONENT,
                CORRELATION_ALERT,
                AlertSeverity::High,
                now,
                format!("Correlated alerts matched rule '{}'", rule.name),
            )
            .with_context(context);

            fired.push((rule.name.clone(), synthetic, ids.len()));
        }
        fired
    }

    async fn emit_health(&self, rule: &str, contributing: usize, timestamp: u64) {
        let check = HealthCheck::new(
            COMPONENT,
            HealthStatus::Degraded,
            format!("Correlation rule '{}' fired", rule),
            timestamp,
        )
        .with_detail("rule", rule)
        .with_detail("alert_count", contributing);

        let sink = &self.sink;
        let check = &check;
        if let Err(e) = self
            .retry
            .with_retry("correlation health", move || sink.record_health_check(check))
            .await
        {
            tracing::error!(rule = %rule, error = %e, "Dropping correlation health signal");
            metrics::record_dropped("health", 1);
        }
    }
}

/// Indices of the alerts that satisfy `rule`, or `None` when any condition falls short.
fn evaluate(
    rule: &CorrelationRule,
    rule_index: usize,
    log: &VecDeque<LoggedAlert>,
    now: u64,
) -> Option<Vec<usize>> {
    let mut contributing = Vec::new();

    for condition in &rule.conditions {
        let matched: Vec<usize> = log
            .iter()
            .enumerate()
            .filter(|(_, entry)| {
                !entry.consumed_by.contains(&rule_index)
                    && now.saturating_sub(entry.alert.timestamp) <= rule.time_window_ms
                    && condition.matches(&entry.alert)
            })
            .map(|(i, _)| i)
            .collect();

        if matched.len() < condition.threshold as usize {
            return None;
        }
        contributing.extend(matched);
    }

    contributing.sort_unstable();
    contributing.dedup();
    Some(contributing)
}
