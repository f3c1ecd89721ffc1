//! Retry-delay computation (C3).
//!
//! Nine strategies: {EXPONENTIAL, LINEAR, FIXED} crossed with an optional
//! {no jitter, FULL_JITTER, EQUAL_JITTER} variant. `compute_delay` is a
//! pure function of its inputs for the non-jittered strategies (P8); the
//! jittered variants take an injected RNG so callers can make them
//! deterministic in tests.

use rand::Rng;

use crate::models::RetryPolicy;

/// Base delay (pre-jitter, pre-cap) for attempt `n` under `strategy`.
fn base_delay_ms(policy: &RetryPolicy, attempt: u32) -> f64 {
    use crate::models::RetryStrategy::*;

    let n = attempt as f64;
    let factor = policy.backoff_factor_ms as f64;

    match policy.strategy {
        Exponential | ExponentialFullJitter | ExponentialEqualJitter => {
            factor * policy.exponent.powf(n - 1.0)
        }
        Linear | LinearFullJitter | LinearEqualJitter => factor * n,
        Fixed | FixedFullJitter | FixedEqualJitter => factor,
    }
}

fn has_jitter(policy: &RetryPolicy) -> Option<JitterKind> {
    use crate::models::RetryStrategy::*;

    match policy.strategy {
        ExponentialFullJitter | LinearFullJitter | FixedFullJitter => Some(JitterKind::Full),
        ExponentialEqualJitter | LinearEqualJitter | FixedEqualJitter => Some(JitterKind::Equal),
        Exponential | Linear | Fixed => None,
    }
}

enum JitterKind {
    Full,
    Equal,
}

/// Compute the delay in milliseconds before retrying, given the 1-indexed
/// attempt number of the state that just errored (the first attempt is
/// `1`, so the delay before its first retry is computed at `attempt = 1`,
/// not `2`). `attempt == 0` is invalid.
///
/// Delegates randomness to `rng` so non-jittered strategies remain pure
/// and jittered ones stay testable.
pub fn compute_delay(policy: &RetryPolicy, attempt: u32, rng: &mut impl Rng) -> u64 {
    debug_assert!(attempt >= 1, "attempt must be >= 1");

    let base = base_delay_ms(policy, attempt);

    let delay = match has_jitter(policy) {
        None => base,
        Some(JitterKind::Full) => rng.gen_range(0.0..=base.max(0.0)),
        Some(JitterKind::Equal) => {
            let half = base / 2.0;
            rng.gen_range(half.min(base)..=half.max(base))
        }
    };

    let capped = match policy.max_delay_ms {
        Some(max) => delay.min(max as f64),
        None => delay,
    };

    capped.max(0.0).round() as u64
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::RetryStrategy;
    use rand::SeedableRng;
    use rand::rngs::StdRng;

    fn policy(strategy: RetryStrategy, max_delay_ms: Option<u64>) -> RetryPolicy {
        RetryPolicy {
            max_retries: 5,
            strategy,
            backoff_factor_ms: 1000,
            exponent: 2.0,
            max_delay_ms,
        }
    }

    #[test]
    fn exponential_without_cap_doubles_each_attempt() {
        let p = policy(RetryStrategy::Exponential, None);
        let mut rng = StdRng::seed_from_u64(0);
        assert_eq!(compute_delay(&p, 1, &mut rng), 1000);
        assert_eq!(compute_delay(&p, 2, &mut rng), 2000);
        assert_eq!(compute_delay(&p, 3, &mut rng), 4000);
    }

    #[test]
    fn exponential_respects_max_delay_cap() {
        let p = policy(RetryStrategy::Exponential, Some(1500));
        let mut rng = StdRng::seed_from_u64(0);
        assert_eq!(compute_delay(&p, 1, &mut rng), 1000);
        assert_eq!(compute_delay(&p, 2, &mut rng), 1500);
        assert_eq!(compute_delay(&p, 3, &mut rng), 1500);
    }

    #[test]
    fn linear_scales_with_attempt_number() {
        let p = policy(RetryStrategy::Linear, None);
        let mut rng = StdRng::seed_from_u64(0);
        assert_eq!(compute_delay(&p, 1, &mut rng), 1000);
        assert_eq!(compute_delay(&p, 3, &mut rng), 3000);
    }

    #[test]
    fn fixed_ignores_attempt_number() {
        let p = policy(RetryStrategy::Fixed, None);
        let mut rng = StdRng::seed_from_u64(0);
        assert_eq!(compute_delay(&p, 1, &mut rng), 1000);
        assert_eq!(compute_delay(&p, 5, &mut rng), 1000);
    }

    #[test]
    fn full_jitter_stays_within_base_bound() {
        let p = policy(RetryStrategy::ExponentialFullJitter, None);
        let mut rng = StdRng::seed_from_u64(42);
        for attempt in 1..=4 {
            let base = base_delay_ms(&p, attempt);
            let delay = compute_delay(&p, attempt, &mut rng);
            assert!((delay as f64) <= base);
        }
    }

    #[test]
    fn equal_jitter_stays_within_half_to_full_bound() {
        let p = policy(RetryStrategy::LinearEqualJitter, None);
        let mut rng = StdRng::seed_from_u64(7);
        for attempt in 1..=4 {
            let base = base_delay_ms(&p, attempt);
            let delay = compute_delay(&p, attempt, &mut rng) as f64;
            assert!(delay >= base / 2.0 - 1.0 && delay <= base + 1.0);
        }
    }
}
