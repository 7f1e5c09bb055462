use std::time::Duration;

use rand::Rng;

/// Base delay, doubled per attempt.
const BASE_DELAY_MS: u64 = 20;
/// Exponent cap; keeps the pre-jitter ceiling at 640 ms.
const MAX_SHIFT: u32 = 5;
/// Minimum delay between attempts.
const FLOOR_MS: u64 = 50;
/// Jitter spread as a fraction of the base delay.
const JITTER_FRACTION: f64 = 0.2;

/// Jittered exponential backoff before retry attempt `attempt` (1-based):
/// `max(50ms, 20ms * 2^min(attempt, 5) ± 20%)`.
pub fn backoff_delay(attempt: u32) -> Duration {
    let base = (BASE_DELAY_MS << attempt.min(MAX_SHIFT)) as f64;
    let spread = base * JITTER_FRACTION;
    let jitter = rand::thread_rng().gen_range(-spread..=spread);
    let delay_ms = (base + jitter).max(FLOOR_MS as f64);
    Duration::from_millis(delay_ms as u64)
}

#[cfg(test)]
mod tests {
    use super::backoff_delay;
    use std::time::Duration;

    #[test]
    fn delay_never_drops_below_the_floor() {
        for attempt in 0..8 {
            for _ in 0..32 {
                assert!(backoff_delay(attempt) >= Duration::from_millis(50));
            }
        }
    }

    #[test]
    fn delay_stays_within_the_jitter_band() {
        for (attempt, base_ms) in [(1_u32, 40_u64), (3, 160), (5, 640)] {
            let high = Duration::from_millis(base_ms + base_ms / 5);
            let low = Duration::from_millis((base_ms - base_ms / 5).max(50));
            for _ in 0..32 {
                let delay = backoff_delay(attempt);
                assert!(delay >= low, "attempt {attempt}: {delay:?} below band");
                assert!(delay <= high, "attempt {attempt}: {delay:?} above band");
            }
        }
    }

    #[test]
    fn exponent_is_capped() {
        let ceiling = Duration::from_millis(640 + 640 / 5);
        for _ in 0..32 {
            assert!(backoff_delay(100) <= ceiling);
        }
    }
}
