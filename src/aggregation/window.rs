//! A single aggregation window and its reductions.

use crate::aggregation::AggregationType;
use crate::model::Labels;

const DEFAULT_PERCENTILE: f64 = 50.0;

/// Values collected for one key over `[start_time, end_time)`.
#[derive(Debug, Clone, PartialEq)]
pub struct AggregationWindow {
    pub metric: String,
    pub values: Vec<f64>,
    pub start_time: u64,
    pub end_time: u64,
    /// Labels carried onto the emitted aggregate.
    pub labels: Labels,
    pub unit: Option<String>,
}

impl AggregationWindow {
    pub fn new(
        metric: impl Into<String>,
        start_time: u64,
        window_ms: u64,
        labels: Labels,
        unit: Option<String>,
    ) -> Self {
        Self {
            metric: metric.into(),
            values: Vec::new(),
            start_time,
            end_time: start_time.saturating_add(window_ms),
            labels,
            unit,
        }
    }

    pub fn is_expired(&self, now: u64) -> bool {
        now >= self.end_time
    }

    /// Replace this window with an empty `window_ms` one starting at `now`, returning the old one.
    pub fn roll(&mut self, now: u64, window_ms: u64) -> AggregationWindow {
        let fresh = AggregationWindow::new(
            self.metric.clone(),
            now,
            window_ms,
            self.labels.clone(),
            self.unit.clone(),
        );
        std::mem::replace(self, fresh)
    }
}

/// Reduce `values` by `kind`. `None` for an empty window.
pub fn reduce(kind: AggregationType, values: &[f64], percentile: Option<f64>) -> Option<f64> {
    if values.is_empty() {
        return None;
    }

    let result = match kind {
        AggregationType::Sum => values.iter().sum::<f64>(),
        AggregationType::Avg => values.iter().sum::<f64>() / values.len() as f64,
        AggregationType::Min => values.iter().copied().fold(f64::INFINITY, f64::min),
        AggregationType::Max => values.iter().copied().fold(f64::NEG_INFINITY, f64::max),
        AggregationType::Percentile => {
            percentile_of(values, percentile.unwrap_or(DEFAULT_PERCENTILE))
        }
    };
    Some(result)
}

/// Nearest-rank percentile: index `ceil(p/100 * n) - 1`, clamped to the data.
fn percentile_of(values: &[f64], p: f64) -> f64 {
    let mut sorted = values.to_vec();
    sorted.sort_by(f64::total_cmp);

    let n = sorted.len();
    let rank = (p / 100.0 * n as f64).ceil() as i64 - 1;
    let index = rank.clamp(0, n as i64 - 1) as usize;
    sorted[index]
}
