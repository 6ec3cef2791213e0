//! Randomized poll pacing.

use rand::prelude::*;
use rand::rngs::StdRng;
use std::time::Duration;
use tokio::time::{sleep, Sleep};

/// Pause between two lifecycle reports and between two heartbeats
pub const STEP_PAUSE: Duration = Duration::from_secs(1);

/// Draw a whole number of seconds uniformly from `[low, high]`.
///
/// Bounds given in the wrong order are swapped; equal bounds always yield
/// exactly that duration.
pub fn jitter_between(rng: &mut StdRng, low: u64, high: u64) -> Duration {
    let (low, high) = if low <= high { (low, high) } else { (high, low) };
    if low == high {
        return Duration::from_secs(low);
    }
    Duration::from_secs(rng.random_range(low..=high))
}

/// Sleep for a jittered duration between `low` and `high` seconds.
///
/// The delay is drawn before the returned future is polled, so the RNG is
/// not borrowed while waiting.
pub fn wait_between(rng: &mut StdRng, low: u64, high: u64) -> Sleep {
    sleep(jitter_between(rng, low, high))
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::time::Instant;

    #[test]
    fn test_degenerate_range_is_exact() {
        let mut rng = StdRng::seed_from_u64(3);
        for _ in 0..100 {
            assert_eq!(jitter_between(&mut rng, 4, 4), Duration::from_secs(4));
        }
    }

    #[test]
    fn test_jitter_within_bounds() {
        let mut rng = StdRng::seed_from_u64(11);
        let mut seen_low = false;
        let mut seen_high = false;

        for _ in 0..2_000 {
            let d = jitter_between(&mut rng, 1, 10);
            assert!(d >= Duration::from_secs(1) && d <= Duration::from_secs(10));
            seen_low |= d == Duration::from_secs(1);
            seen_high |= d == Duration::from_secs(10);
        }

        // Both ends of the range are reachable
        assert!(seen_low);
        assert!(seen_high);
    }

    #[test]
    fn test_reversed_bounds() {
        let mut rng = StdRng::seed_from_u64(5);
        for _ in 0..100 {
            let d = jitter_between(&mut rng, 9, 2);
            assert!(d >= Duration::from_secs(2) && d <= Duration::from_secs(9));
        }
    }

    #[test]
    fn test_same_seed_same_delays() {
        let mut a = StdRng::seed_from_u64(42);
        let mut b = StdRng::seed_from_u64(42);
        for _ in 0..50 {
            assert_eq!(jitter_between(&mut a, 1, 60), jitter_between(&mut b, 1, 60));
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_wait_between_sleeps() {
        let mut rng = StdRng::seed_from_u64(9);

        let start = Instant::now();
        wait_between(&mut rng, 3, 3).await;
        let elapsed = start.elapsed();
        assert!(elapsed >= Duration::from_secs(3) && elapsed < Duration::from_millis(3_010));

        let start = Instant::now();
        wait_between(&mut rng, 2, 5).await;
        let elapsed = start.elapsed();
        assert!(elapsed >= Duration::from_secs(2) && elapsed < Duration::from_millis(5_010));
    }
}
