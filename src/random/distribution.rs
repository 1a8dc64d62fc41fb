//! Selection of the distribution used for each value category

use std::fmt;

use rand::distr::uniform::SampleUniform;
use rand::distr::{Bernoulli, Distribution, Uniform};
use rand::Rng;

use crate::error::{Error, Result};
use crate::random::ValueCategory;

/// Distribution bound to exactly one [`ValueCategory`]
///
/// Bounds are inclusive and fixed once the strategy is built.
pub enum DistributionStrategy<S: SampleUniform> {
    /// Fair coin flip, independent of any range
    CoinFlip(Bernoulli),
    /// Discrete uniform draw over the tick count of a timestamp
    Ticks { lower: S, upper: S, uniform: Uniform<S> },
    /// Continuous uniform draw over `[lower, upper]`
    Continuous { lower: S, upper: S, uniform: Uniform<S> },
    /// Discrete uniform draw over `[lower, upper]`
    Discrete { lower: S, upper: S, uniform: Uniform<S> },
}

/// Picks the distribution for `category`
///
/// Booleans get a coin flip and ignore the bounds; timestamps get a discrete
/// draw over their tick representation; floating-point values a continuous
/// draw; every other integral type a discrete draw.
pub fn select_strategy<S>(
    category: ValueCategory,
    lower: S,
    upper: S,
) -> Result<DistributionStrategy<S>>
where
    S: SampleUniform + Copy + PartialOrd + fmt::Debug,
{
    let strategy = match category {
        ValueCategory::Boolean => {
            let coin = Bernoulli::new(0.5).map_err(|e| invalid_range(lower, upper, e))?;
            DistributionStrategy::CoinFlip(coin)
        }
        ValueCategory::Temporal => DistributionStrategy::Ticks {
            lower,
            upper,
            uniform: inclusive(lower, upper)?,
        },
        ValueCategory::FloatingPoint => DistributionStrategy::Continuous {
            lower,
            upper,
            uniform: inclusive(lower, upper)?,
        },
        ValueCategory::Integral => DistributionStrategy::Discrete {
            lower,
            upper,
            uniform: inclusive(lower, upper)?,
        },
    };
    Ok(strategy)
}

fn inclusive<S>(lower: S, upper: S) -> Result<Uniform<S>>
where
    S: SampleUniform + Copy + PartialOrd + fmt::Debug,
{
    // Also rejects NaN bounds
    if !(lower <= upper) {
        return Err(invalid_range(
            lower,
            upper,
            "lower bound must not exceed upper bound",
        ));
    }
    Uniform::new_inclusive(lower, upper).map_err(|e| invalid_range(lower, upper, e))
}

fn invalid_range<S: fmt::Debug>(lower: S, upper: S, reason: impl fmt::Display) -> Error {
    Error::InvalidRange {
        lower: format!("{lower:?}"),
        upper: format!("{upper:?}"),
        reason: reason.to_string(),
    }
}

impl<S> DistributionStrategy<S>
where
    S: SampleUniform + Copy + From<bool>,
{
    pub fn category(&self) -> ValueCategory {
        match self {
            DistributionStrategy::CoinFlip(_) => ValueCategory::Boolean,
            DistributionStrategy::Ticks { .. } => ValueCategory::Temporal,
            DistributionStrategy::Continuous { .. } => ValueCategory::FloatingPoint,
            DistributionStrategy::Discrete { .. } => ValueCategory::Integral,
        }
    }

    /// Inclusive bounds of the values this strategy can produce
    pub fn bounds(&self) -> (S, S) {
        match self {
            DistributionStrategy::CoinFlip(_) => (S::from(false), S::from(true)),
            DistributionStrategy::Ticks { lower, upper, .. }
            | DistributionStrategy::Continuous { lower, upper, .. }
            | DistributionStrategy::Discrete { lower, upper, .. } => (*lower, *upper),
        }
    }

    /// Draws one value using `rng`
    pub fn sample<R: Rng + ?Sized>(&self, rng: &mut R) -> S {
        match self {
            DistributionStrategy::CoinFlip(coin) => S::from(coin.sample(rng)),
            DistributionStrategy::Ticks { uniform, .. }
            | DistributionStrategy::Continuous { uniform, .. }
            | DistributionStrategy::Discrete { uniform, .. } => uniform.sample(rng),
        }
    }
}

impl<S> Clone for DistributionStrategy<S>
where
    S: SampleUniform + Copy,
    S::Sampler: Clone,
{
    fn clone(&self) -> Self {
        match self {
            DistributionStrategy::CoinFlip(coin) => DistributionStrategy::CoinFlip(*coin),
            DistributionStrategy::Ticks {
                lower,
                upper,
                uniform,
            } => DistributionStrategy::Ticks {
                lower: *lower,
                upper: *upper,
                uniform: uniform.clone(),
            },
            DistributionStrategy::Continuous {
                lower,
                upper,
                uniform,
            } => DistributionStrategy::Continuous {
                lower: *lower,
                upper: *upper,
                uniform: uniform.clone(),
            },
            DistributionStrategy::Discrete {
                lower,
                upper,
                uniform,
            } => DistributionStrategy::Discrete {
                lower: *lower,
                upper: *upper,
                uniform: uniform.clone(),
            },
        }
    }
}

impl<S> fmt::Debug for DistributionStrategy<S>
where
    S: SampleUniform + fmt::Debug,
{
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DistributionStrategy::CoinFlip(_) => f.write_str("CoinFlip"),
            DistributionStrategy::Ticks { lower, upper, .. } => f
                .debug_struct("Ticks")
                .field("lower", lower)
                .field("upper", upper)
                .finish(),
            DistributionStrategy::Continuous { lower, upper, .. } => f
                .debug_struct("Continuous")
                .field("lower", lower)
                .field("upper", upper)
                .finish(),
            DistributionStrategy::Discrete { lower, upper, .. } => f
                .debug_struct("Discrete")
                .field("lower", lower)
                .field("upper", upper)
                .finish(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    #[test]
    fn test_selection_follows_category() {
        let s = select_strategy(ValueCategory::Integral, 0i64, 10).unwrap();
        assert!(matches!(s, DistributionStrategy::Discrete { .. }));
        assert_eq!(s.category(), ValueCategory::Integral);

        let s = select_strategy(ValueCategory::FloatingPoint, 0.0f64, 1.0).unwrap();
        assert!(matches!(s, DistributionStrategy::Continuous { .. }));

        let s = select_strategy(ValueCategory::Temporal, 0i64, 1_000).unwrap();
        assert!(matches!(s, DistributionStrategy::Ticks { .. }));

        let s = select_strategy(ValueCategory::Boolean, 0u8, 1).unwrap();
        assert!(matches!(s, DistributionStrategy::CoinFlip(_)));
        assert_eq!(s.bounds(), (0, 1));
    }

    #[test]
    fn test_coin_flip_ignores_bounds() {
        // The bounds are never used to build a coin flip, even inverted ones
        let s = select_strategy(ValueCategory::Boolean, 1u8, 0).unwrap();
        assert_eq!(s.category(), ValueCategory::Boolean);
    }

    #[test]
    fn test_inverted_range_rejected() {
        let err = select_strategy(ValueCategory::Integral, 10i32, 0).unwrap_err();
        assert!(matches!(err, Error::InvalidRange { .. }));

        let err = select_strategy(ValueCategory::Temporal, 5i64, -5).unwrap_err();
        assert!(matches!(err, Error::InvalidRange { .. }));
    }

    #[test]
    fn test_non_finite_range_rejected() {
        assert!(select_strategy(ValueCategory::FloatingPoint, f64::NAN, 1.0).is_err());
        assert!(select_strategy(ValueCategory::FloatingPoint, 0.0, f64::INFINITY).is_err());
        assert!(select_strategy(ValueCategory::FloatingPoint, f64::MIN, f64::MAX).is_err());
    }

    #[test]
    fn test_degenerate_range() {
        let s = select_strategy(ValueCategory::Integral, 7u16, 7).unwrap();
        let mut rng = StdRng::seed_from_u64(1);
        for _ in 0..100 {
            assert_eq!(s.sample(&mut rng), 7);
        }
    }

    #[test]
    fn test_sample_within_bounds() {
        let s = select_strategy(ValueCategory::Integral, -3i8, 3).unwrap();
        let mut rng = StdRng::seed_from_u64(42);
        for _ in 0..1_000 {
            let v = s.sample(&mut rng);
            assert!((-3..=3).contains(&v));
        }
    }

    #[test]
    fn test_clone_and_debug() {
        let s = select_strategy(ValueCategory::FloatingPoint, 0.5f32, 2.5).unwrap();
        let copy = s.clone();
        assert_eq!(copy.bounds(), (0.5, 2.5));
        assert_eq!(format!("{copy:?}"), "Continuous { lower: 0.5, upper: 2.5 }");
        assert_eq!(
            format!("{:?}", select_strategy(ValueCategory::Boolean, 0u8, 1).unwrap()),
            "CoinFlip"
        );
    }
}
