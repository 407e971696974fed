use rand::Rng;
use std::time::Duration;

/// Computes how long to wait before a retry.
pub trait IntervalFunction: Send + Sync {
    /// Delay before retry number `retry + 1`; `retry` is zero for the wait
    /// after the first failed attempt.
    fn next_interval(&self, retry: usize) -> Duration;
}

/// The same delay before every retry.
#[derive(Debug, Clone, Copy)]
pub struct FixedInterval {
    delay: Duration,
}

impl FixedInterval {
    pub fn new(delay: Duration) -> Self {
        Self { delay }
    }
}

impl IntervalFunction for FixedInterval {
    fn next_interval(&self, _retry: usize) -> Duration {
        self.delay
    }
}

/// `initial × multiplier^retry`, capped at `max_interval` when set.
#[derive(Debug, Clone, Copy)]
pub struct ExponentialBackoff {
    initial: Duration,
    multiplier: f64,
    cap: Option<Duration>,
}

impl ExponentialBackoff {
    /// Doubles on every retry until a cap is set.
    pub fn new(initial: Duration) -> Self {
        Self {
            initial,
            multiplier: 2.0,
            cap: None,
        }
    }

    pub fn multiplier(mut self, multiplier: f64) -> Self {
        self.multiplier = multiplier;
        self
    }

    pub fn max_interval(mut self, cap: Duration) -> Self {
        self.cap = Some(cap);
        self
    }

    fn base(&self, retry: usize) -> Duration {
        let exponent = i32::try_from(retry).unwrap_or(i32::MAX);
        let factor = self.multiplier.powi(exponent);
        let scaled = self.initial.as_secs_f64() * factor;

        let grown = Duration::try_from_secs_f64(scaled.max(0.0)).unwrap_or(Duration::MAX);

        match self.cap {
            Some(cap) => grown.min(cap),
            None => grown,
        }
    }
}

impl IntervalFunction for ExponentialBackoff {
    fn next_interval(&self, retry: usize) -> Duration {
        self.base(retry)
    }
}

/// [`ExponentialBackoff`] with each delay drawn uniformly from
/// `delay × [1 - factor, 1 + factor]`.
#[derive(Debug, Clone, Copy)]
pub struct ExponentialRandomBackoff {
    exponential: ExponentialBackoff,
    randomization_factor: f64,
}

impl ExponentialRandomBackoff {
    /// `randomization_factor` is clamped to `0.0..=1.0`; NaN means no jitter.
    pub fn new(initial: Duration, randomization_factor: f64) -> Self {
        let randomization_factor = if randomization_factor.is_nan() {
            0.0
        } else {
            randomization_factor.clamp(0.0, 1.0)
        };
        Self {
            exponential: ExponentialBackoff::new(initial),
            randomization_factor,
        }
    }

    pub fn multiplier(mut self, multiplier: f64) -> Self {
        self.exponential = self.exponential.multiplier(multiplier);
        self
    }

    /// Caps the delay before jitter is applied.
    pub fn max_interval(mut self, cap: Duration) -> Self {
        self.exponential = self.exponential.max_interval(cap);
        self
    }

    fn jitter(&self, delay: Duration) -> Duration {
        if self.randomization_factor == 0.0 || delay.is_zero() || delay == Duration::MAX {
            return delay;
        }
        let secs = delay.as_secs_f64();
        let spread = secs * self.randomization_factor;
        let drawn = rand::rng().random_range((secs - spread)..=(secs + spread));
        // the upper half of the spread can pass Duration::MAX
        Duration::try_from_secs_f64(drawn.max(0.0)).unwrap_or(Duration::MAX)
    }
}

impl IntervalFunction for ExponentialRandomBackoff {
    fn next_interval(&self, retry: usize) -> Duration {
        self.jitter(self.exponential.base(retry))
    }
}

/// Delays computed by a closure.
pub struct FnInterval<F> {
    f: F,
}

impl<F> FnInterval<F>
where
    F: Fn(usize) -> Duration + Send + Sync,
{
    pub fn new(f: F) -> Self {
        Self { f }
    }
}

impl<F> IntervalFunction for FnInterval<F>
where
    F: Fn(usize) -> Duration + Send + Sync,
{
    fn next_interval(&self, retry: usize) -> Duration {
        (self.f)(retry)
    }
}
