//! Exponential backoff with jitter.

use std::time::Duration;
use rand::Rng;

/// Share of the exponential term added as random jitter.
const JITTER_RATIO: f64 = 0.3;

/// Delay before retry number `attempt` (1-based).
///
/// `min(base * 2^(attempt-1) + jitter, max)` where jitter is drawn from
/// `[0, 30%)` of the exponential term.
pub fn calculate_backoff(attempt: u32, base_ms: u64, max_ms: u64) -> Duration {
    if attempt == 0 {
        return Duration::from_millis(0);
    }

    let exponential_base = 2u64.saturating_pow(attempt - 1);
    let delay_ms = base_ms.saturating_mul(exponential_base);

    let jitter_range = (delay_ms as f64 * JITTER_RATIO) as u64;
    let jitter = if jitter_range > 0 {
        rand::thread_rng().gen_range(0..jitter_range)
    } else {
        0
    };

    Duration::from_millis(delay_ms.saturating_add(jitter).min(max_ms))
}
