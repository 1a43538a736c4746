//! Backoff strategy for retried requests.
//!
//! [`RetryStrategy::interval`] is a pure function of the attempt index plus
//! jitter: the raw delay is clamped to `[minimum, maximum]`, scaled by a
//! uniform factor in `[0.5, 1.0]` (equal jitter), then floored at `minimum`.

use rand::Rng;
use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use crate::error::ConfigError;

/// Raw (unclamped, unjittered) delay as a function of the attempt index.
#[derive(Clone)]
pub enum DelayFunction {
    /// Same delay for every attempt.
    Linear { interval: Duration },
    /// `interval * rate^attempt`.
    Exponential { interval: Duration, rate: f64 },
    /// Caller-supplied function.
    Custom(Arc<dyn Fn(u32) -> Duration + Send + Sync>),
}

impl DelayFunction {
    /// Raw delay in seconds. May be infinite or NaN for extreme inputs.
    fn seconds(&self, attempt: u32) -> f64 {
        match self {
            Self::Linear { interval } => interval.as_secs_f64(),
            Self::Exponential { interval, rate } => {
                let exponent = i32::try_from(attempt).unwrap_or(i32::MAX);
                interval.as_secs_f64() * rate.powi(exponent)
            }
            Self::Custom(function) => function(attempt).as_secs_f64(),
        }
    }
}

impl fmt::Debug for DelayFunction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Linear { interval } => {
                f.debug_struct("Linear").field("interval", interval).finish()
            }
            Self::Exponential { interval, rate } => f
                .debug_struct("Exponential")
                .field("interval", interval)
                .field("rate", rate)
                .finish(),
            Self::Custom(_) => f.write_str("Custom(<fn>)"),
        }
    }
}

/// Immutable retry schedule.
#[derive(Debug, Clone)]
pub struct RetryStrategy {
    function: DelayFunction,
    maximum_retries: u32,
    minimum: Duration,
    maximum: Duration,
}

impl RetryStrategy {
    /// Build a strategy, rejecting `minimum > maximum`.
    pub fn new(
        function: DelayFunction,
        maximum_retries: u32,
        minimum: Duration,
        maximum: Duration,
    ) -> Result<Self, ConfigError> {
        if minimum > maximum {
            return Err(ConfigError::Invalid(format!(
                "retry minimum delay {minimum:?} exceeds maximum delay {maximum:?}"
            )));
        }
        if let DelayFunction::Exponential { rate, .. } = &function {
            if !rate.is_finite() || *rate <= 0.0 {
                return Err(ConfigError::Invalid(format!(
                    "retry rate must be a positive number, got {rate}"
                )));
            }
        }
        Ok(Self {
            function,
            maximum_retries,
            minimum,
            maximum,
        })
    }

    /// Exponential strategy with no floor and a generous ceiling.
    pub fn exponential(maximum_retries: u32, interval: Duration, rate: f64) -> Self {
        Self {
            function: DelayFunction::Exponential {
                interval,
                rate: if rate.is_finite() && rate > 0.0 { rate } else { 1.0 },
            },
            maximum_retries,
            minimum: Duration::ZERO,
            maximum: Duration::from_secs(60),
        }
    }

    /// Constant-delay strategy with no floor and a generous ceiling.
    pub fn linear(maximum_retries: u32, interval: Duration) -> Self {
        Self {
            function: DelayFunction::Linear { interval },
            maximum_retries,
            minimum: Duration::ZERO,
            maximum: interval.max(Duration::from_secs(60)),
        }
    }

    pub fn maximum_retries(&self) -> u32 {
        self.maximum_retries
    }

    pub fn minimum(&self) -> Duration {
        self.minimum
    }

    pub fn maximum(&self) -> Duration {
        self.maximum
    }

    /// Delay before the next attempt, given `attempt` retries already made,
    /// or `None` once retries are exhausted.
    pub fn interval(&self, attempt: u32) -> Option<Duration> {
        self.interval_with(attempt, &mut rand::thread_rng())
    }

    /// Same as [`interval`](Self::interval) with an explicit randomness source.
    pub fn interval_with<R: Rng>(&self, attempt: u32, rng: &mut R) -> Option<Duration> {
        if attempt >= self.maximum_retries {
            return None;
        }
        let factor = rng.gen_range(0.5..=1.0);
        Some(self.jittered(attempt, factor))
    }

    fn jittered(&self, attempt: u32, factor: f64) -> Duration {
        let minimum = self.minimum.as_secs_f64();
        let maximum = self.maximum.as_secs_f64();
        let raw = self.function.seconds(attempt);
        let clamped = if raw.is_nan() {
            maximum
        } else {
            raw.clamp(minimum, maximum)
        };
        let seconds = (clamped * factor).max(minimum).min(maximum);
        // Float round-trips can land a nanosecond outside the bounds.
        Duration::from_secs_f64(seconds).clamp(self.minimum, self.maximum)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    fn documented_strategy() -> RetryStrategy {
        RetryStrategy::new(
            DelayFunction::Exponential {
                interval: Duration::from_secs(1),
                rate: 2.0,
            },
            3,
            Duration::from_millis(500),
            Duration::from_secs(10),
        )
        .unwrap()
    }

    #[test]
    fn exponential_interval_applies_equal_jitter() {
        let strategy = documented_strategy();
        let mut rng = StdRng::seed_from_u64(7);
        for _ in 0..500 {
            let delay = strategy.interval_with(2, &mut rng).unwrap();
            assert!(delay >= Duration::from_secs(2), "{delay:?}");
            assert!(delay <= Duration::from_secs(4), "{delay:?}");
        }
    }

    #[test]
    fn jitter_extremes_hit_half_and_full_delay() {
        let strategy = documented_strategy();
        assert_eq!(strategy.jittered(2, 0.5), Duration::from_secs(2));
        assert_eq!(strategy.jittered(2, 1.0), Duration::from_secs(4));
    }

    #[test]
    fn interval_is_floored_at_minimum_and_capped_at_maximum() {
        let strategy = RetryStrategy::new(
            DelayFunction::Exponential {
                interval: Duration::from_millis(100),
                rate: 10.0,
            },
            u32::MAX,
            Duration::from_millis(80),
            Duration::from_secs(5),
        )
        .unwrap();
        let mut rng = StdRng::seed_from_u64(11);
        for attempt in [0, 1, 2, 3, 10, 400, 100_000] {
            let delay = strategy.interval_with(attempt, &mut rng).unwrap();
            assert!(delay >= strategy.minimum(), "attempt {attempt}: {delay:?}");
            assert!(delay <= strategy.maximum(), "attempt {attempt}: {delay:?}");
        }
        // 100ms * 0.5 would dip below the floor.
        assert_eq!(strategy.jittered(0, 0.5), Duration::from_millis(80));
    }

    #[test]
    fn stops_once_maximum_retries_reached() {
        let strategy = documented_strategy();
        assert!(strategy.interval(2).is_some());
        assert!(strategy.interval(3).is_none());
        assert!(strategy.interval(4).is_none());
    }

    #[test]
    fn zero_maximum_retries_never_retries() {
        let strategy = RetryStrategy::linear(0, Duration::from_millis(10));
        assert!(strategy.interval(0).is_none());
    }

    #[test]
    fn minimum_above_maximum_is_rejected() {
        let err = RetryStrategy::new(
            DelayFunction::Linear {
                interval: Duration::from_secs(1),
            },
            3,
            Duration::from_secs(5),
            Duration::from_secs(1),
        )
        .unwrap_err();
        assert!(err.to_string().contains("exceeds maximum"), "got: {err}");
    }

    #[test]
    fn non_positive_rate_is_rejected() {
        let err = RetryStrategy::new(
            DelayFunction::Exponential {
                interval: Duration::from_secs(1),
                rate: f64::NAN,
            },
            3,
            Duration::ZERO,
            Duration::from_secs(1),
        )
        .unwrap_err();
        assert!(matches!(err, ConfigError::Invalid(_)));
    }

    #[test]
    fn custom_function_is_clamped() {
        let strategy = RetryStrategy::new(
            DelayFunction::Custom(Arc::new(|attempt| {
                Duration::from_secs(u64::from(attempt) * 100)
            })),
            5,
            Duration::from_millis(10),
            Duration::from_secs(1),
        )
        .unwrap();
        assert_eq!(strategy.jittered(0, 1.0), Duration::from_millis(10));
        assert_eq!(strategy.jittered(4, 1.0), Duration::from_secs(1));
    }

    #[cfg(feature = "fuzz-tests")]
    mod prop_tests {
        use super::*;
        use proptest::prelude::*;

        proptest! {
            #[test]
            fn interval_stays_within_bounds(
                attempt in 0u32..64,
                interval_ms in 0u64..10_000,
                rate in 0.1f64..8.0,
                minimum_ms in 0u64..1_000,
                span_ms in 0u64..60_000,
                factor in 0.5f64..=1.0,
            ) {
                let minimum = Duration::from_millis(minimum_ms);
                let maximum = Duration::from_millis(minimum_ms + span_ms);
                let strategy = RetryStrategy::new(
                    DelayFunction::Exponential { interval: Duration::from_millis(interval_ms), rate },
                    u32::MAX,
                    minimum,
                    maximum,
                ).expect("valid strategy");

                let delay = strategy.jittered(attempt, factor);
                prop_assert!(delay >= minimum);
                prop_assert!(delay <= maximum);
            }
        }
    }
}
