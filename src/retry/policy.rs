//! Backoff policy types and configuration.

use std::time::Duration;

const DEFAULT_INITIAL: Duration = Duration::from_secs(1);
const DEFAULT_MAX: Duration = Duration::from_secs(30);
const DEFAULT_MULTIPLIER: f64 = 2.0;

/// An exponential backoff policy.
///
/// Policies are pure data: they describe how pauses grow between attempts
/// but hold no per-call state. Each retry loop draws its own [`Pauses`]
/// sequence from the policy, so one policy can be shared by any number of
/// concurrent calls.
///
/// The pause before retry `n` (0-indexed) is `initial * multiplier^n`,
/// capped at `max`.
///
/// # Zero Values
///
/// `Backoff::default()` is the zero value. Zero fields fall back to fixed
/// defaults: an initial pause of one second, a cap of thirty seconds and a
/// multiplier of two. A multiplier below `1.0` (or not finite) also falls
/// back to two, so pauses never shrink.
///
/// # Examples
///
/// ```rust
/// use redial::Backoff;
/// use std::time::Duration;
///
/// let backoff = Backoff::new(
///     Duration::from_millis(100),
///     Duration::from_millis(500),
///     2.0,
/// );
///
/// assert_eq!(backoff.pause(0), Duration::from_millis(100));
/// assert_eq!(backoff.pause(1), Duration::from_millis(200));
/// assert_eq!(backoff.pause(2), Duration::from_millis(400));
/// assert_eq!(backoff.pause(3), Duration::from_millis(500)); // capped
/// ```
#[derive(Debug, Clone, PartialEq, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(default))]
pub struct Backoff {
    initial: Duration,
    max: Duration,
    multiplier: f64,
    jitter: Jitter,
}

/// Strategy for adding randomness to pauses.
#[derive(Debug, Clone, PartialEq, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum Jitter {
    /// No jitter applied.
    #[default]
    None,
    /// Random pause between zero and the calculated pause.
    Full,
    /// Add ±percentage randomness to the pause.
    Proportional(f64),
}

impl Backoff {
    /// Create a policy from its three parameters.
    pub fn new(initial: Duration, max: Duration, multiplier: f64) -> Self {
        Self {
            initial,
            max,
            multiplier,
            jitter: Jitter::None,
        }
    }

    /// Set the first pause.
    pub fn with_initial(mut self, initial: Duration) -> Self {
        self.initial = initial;
        self
    }

    /// Set the pause cap.
    ///
    /// Pauses never exceed this value, with or without jitter.
    pub fn with_max(mut self, max: Duration) -> Self {
        self.max = max;
        self
    }

    /// Set the growth factor applied after every pause.
    pub fn with_multiplier(mut self, multiplier: f64) -> Self {
        self.multiplier = multiplier;
        self
    }

    /// Add proportional jitter to pauses.
    ///
    /// `0.25` means each pause lands within ±25% of the calculated value.
    ///
    /// **Note**: Requires the `jitter` feature. Without it, pauses are not
    /// randomized.
    pub fn with_jitter(mut self, factor: f64) -> Self {
        self.jitter = Jitter::Proportional(jitter_factor(factor));
        self
    }

    /// Use full jitter: each pause is random between zero and the calculated
    /// value.
    ///
    /// **Note**: Requires the `jitter` feature. Without it, pauses are not
    /// randomized.
    pub fn with_full_jitter(mut self) -> Self {
        self.jitter = Jitter::Full;
        self
    }

    /// The first pause, after zero-value defaults are applied.
    pub fn initial(&self) -> Duration {
        if self.initial.is_zero() {
            DEFAULT_INITIAL
        } else {
            self.initial
        }
    }

    /// The pause cap, after zero-value defaults are applied.
    pub fn max(&self) -> Duration {
        if self.max.is_zero() {
            DEFAULT_MAX
        } else {
            self.max
        }
    }

    /// The growth factor, after defaults are applied.
    pub fn multiplier(&self) -> f64 {
        if self.multiplier.is_finite() && self.multiplier >= 1.0 {
            self.multiplier
        } else {
            DEFAULT_MULTIPLIER
        }
    }

    /// Get the jitter strategy.
    pub fn jitter(&self) -> &Jitter {
        &self.jitter
    }

    /// The un-jittered pause before retry `attempt` (0-indexed).
    ///
    /// Non-decreasing in `attempt` and never above [`Backoff::max`].
    pub fn pause(&self, attempt: u32) -> Duration {
        let max = self.max();
        let exponent = i32::try_from(attempt).unwrap_or(i32::MAX);
        let nanos = (self.initial().as_nanos() as f64 * self.multiplier().powi(exponent)).round();
        if nanos >= max.as_nanos() as f64 {
            max
        } else {
            Duration::from_nanos(nanos as u64)
        }
    }

    /// A fresh sequence of pauses for one retry loop.
    pub fn pauses(&self) -> Pauses<'_> {
        Pauses {
            backoff: self,
            attempt: 0,
        }
    }

    /// Check the configured values.
    ///
    /// Zero values are valid (they select defaults). Returns an error for a
    /// negative or non-finite multiplier, a multiplier below one, or an
    /// initial pause larger than the cap.
    pub fn validate(&self) -> Result<(), &'static str> {
        if self.multiplier != 0.0 && !(self.multiplier.is_finite() && self.multiplier >= 1.0) {
            return Err("Backoff multiplier must be a finite value of at least 1.0");
        }
        if self.initial() > self.max() {
            return Err("Backoff initial pause must not exceed the max pause");
        }
        if let Jitter::Proportional(factor) = self.jitter {
            if !(0.0..=1.0).contains(&factor) {
                return Err("Backoff jitter factor must be within 0.0..=1.0");
            }
        }
        Ok(())
    }
}

/// The pauses of a single retry loop.
///
/// An endless iterator: once pauses reach the cap they stay there.
#[derive(Debug, Clone)]
pub struct Pauses<'a> {
    backoff: &'a Backoff,
    attempt: u32,
}

impl Pauses<'_> {
    /// The next pause, with jitter applied.
    pub fn next_pause(&mut self) -> Duration {
        let base = self.backoff.pause(self.attempt);
        self.attempt = self.attempt.saturating_add(1);
        self.backoff.jitter.apply(base, self.backoff.max())
    }

    /// How many pauses have been handed out.
    pub fn taken(&self) -> u32 {
        self.attempt
    }
}

impl Iterator for Pauses<'_> {
    type Item = Duration;

    fn next(&mut self) -> Option<Duration> {
        Some(self.next_pause())
    }
}

/// Clamp a proportional jitter factor into `0.0..=1.0`; NaN and infinities
/// disable jitter.
fn jitter_factor(factor: f64) -> f64 {
    if factor.is_finite() {
        factor.clamp(0.0, 1.0)
    } else {
        0.0
    }
}

impl Jitter {
    /// Apply jitter to a calculated pause, never exceeding `max`.
    pub fn apply(&self, pause: Duration, max: Duration) -> Duration {
        let jittered = match self {
            Jitter::None => pause,
            #[cfg(feature = "jitter")]
            Jitter::Full => {
                use rand::Rng;
                let max_nanos = u64::try_from(pause.as_nanos()).unwrap_or(u64::MAX);
                if max_nanos == 0 {
                    Duration::ZERO
                } else {
                    Duration::from_nanos(rand::rng().random_range(0..=max_nanos))
                }
            }
            #[cfg(not(feature = "jitter"))]
            Jitter::Full => pause,
            #[cfg(feature = "jitter")]
            Jitter::Proportional(factor) => {
                use rand::Rng;
                let factor = jitter_factor(*factor);
                let base_nanos = pause.as_nanos() as f64;
                let min = base_nanos * (1.0 - factor);
                let max = base_nanos * (1.0 + factor);
                if max <= min {
                    pause
                } else {
                    Duration::from_nanos(rand::rng().random_range(min..=max) as u64)
                }
            }
            #[cfg(not(feature = "jitter"))]
            Jitter::Proportional(_) => pause,
        };

        jittered.min(max)
    }
}

#[cfg(feature = "proptest")]
use proptest::prelude::*;

#[cfg(feature = "proptest")]
impl Arbitrary for Jitter {
    type Parameters = ();
    type Strategy = BoxedStrategy<Self>;

    fn arbitrary_with(_: Self::Parameters) -> Self::Strategy {
        prop_oneof![
            Just(Jitter::None),
            Just(Jitter::Full),
            (0.0f64..=1.0).prop_map(Jitter::Proportional),
        ]
        .boxed()
    }
}

/// Valid policies: millisecond pauses with `initial <= max` and a
/// multiplier in `1.0..10.0`.
#[cfg(feature = "proptest")]
impl Arbitrary for Backoff {
    type Parameters = ();
    type Strategy = BoxedStrategy<Self>;

    fn arbitrary_with(_: Self::Parameters) -> Self::Strategy {
        (1u64..1_000, 0u64..60_000, 1.0f64..10.0, any::<Jitter>())
            .prop_map(|(initial, extra, multiplier, jitter)| Backoff {
                initial: Duration::from_millis(initial),
                max: Duration::from_millis(initial + extra),
                multiplier,
                jitter,
            })
            .boxed()
    }
}
