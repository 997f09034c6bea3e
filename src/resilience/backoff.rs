//! Backoff with jitter.

use std::time::Duration;
use rand::Rng;

/// Delay before retry number `attempt` (1-based): `base * 2^(attempt-1)`
/// capped at `max`, plus up to 10% jitter. With `base == max` this is a
/// fixed delay that still spreads out simultaneous restarts.
pub fn calculate_backoff(attempt: u32, base: Duration, max: Duration) -> Duration {
    if attempt == 0 {
        return Duration::ZERO;
    }

    let base_ms = base.as_millis() as u64;
    let max_ms = max.as_millis() as u64;
    let exponential_base = 2u64.saturating_pow(attempt - 1);
    let capped_delay = base_ms.saturating_mul(exponential_base).min(max_ms);

    let jitter_range = capped_delay / 10;
    let jitter = if jitter_range > 0 {
        rand::thread_rng().gen_range(0..jitter_range)
    } else {
        0
    };

    Duration::from_millis(capped_delay + jitter)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_backoff_calculation() {
        let ms = Duration::from_millis;

        let b1 = calculate_backoff(1, ms(100), ms(2000));
        assert!(b1 >= ms(100) && b1 < ms(110));

        let b2 = calculate_backoff(2, ms(100), ms(2000));
        assert!(b2 >= ms(200));

        let max = calculate_backoff(10, ms(100), ms(1000));
        assert!(max >= ms(1000) && max < ms(1100));
    }

    #[test]
    fn test_fixed_delay() {
        let five = Duration::from_secs(5);
        for attempt in 1..6 {
            let delay = calculate_backoff(attempt, five, five);
            assert!(delay >= five && delay < Duration::from_millis(5500));
        }
        assert_eq!(calculate_backoff(0, five, five), Duration::ZERO);
    }
}
