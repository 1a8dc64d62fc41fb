use std::fmt;
use std::marker::PhantomData;

use rand::rngs::StdRng;
use rand::{RngCore, SeedableRng};

use crate::error::{Error, Result};
use crate::random::{select_strategy, DistributionStrategy, RandomValue, ValueCategory};

/// Provides uniform random number generation.
///
/// Intended as a convenient source of random test data. Each generator owns its
/// own engine, seeded from the operating system when it is built, so two
/// processes never produce the same sequence unless [`seeded`] is used.
///
/// # Example
///
/// ```
/// use pandrs_testkit::random::UniformRandomGenerator;
///
/// let mut g = UniformRandomGenerator::<u32>::with_range(0, 100).unwrap();
/// let v = g.generate(); // a random number in [0, 100]
/// assert!(v <= 100);
/// ```
///
/// [`seeded`]: UniformRandomGenerator::seeded
pub struct UniformRandomGenerator<T: RandomValue, R = StdRng> {
    strategy: DistributionStrategy<T::Repr>,
    rng: R,
    _marker: PhantomData<T>,
}

impl<T: RandomValue> UniformRandomGenerator<T> {
    /// Generator over the natural range of `T`
    ///
    /// `[0, MAX]` for integers and timestamp ticks, `[0, 1]` for floats and both
    /// values for booleans.
    pub fn new() -> Self {
        let (lower, upper) = T::natural_range();
        let strategy = select_strategy(T::CATEGORY, lower, upper)
            .expect("natural range of a RandomValue type is never empty");
        Self::from_parts(strategy, StdRng::from_os_rng())
    }

    /// Generator over the inclusive range `[lower, upper]`
    ///
    /// Booleans only accept the full `(false, true)` range, which is the same as
    /// [`new`](Self::new); any narrower range is rejected with
    /// [`Error::RangeNotApplicable`].
    pub fn with_range(lower: T, upper: T) -> Result<Self> {
        Self::with_engine(lower, upper, StdRng::from_os_rng())
    }
}

impl<T: RandomValue> Default for UniformRandomGenerator<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T, R> UniformRandomGenerator<T, R>
where
    T: RandomValue,
    R: RngCore,
{
    /// Generator over `[lower, upper]` driven by the given engine
    pub fn with_engine(lower: T, upper: T, rng: R) -> Result<Self> {
        let (lower, upper) = (lower.to_repr(), upper.to_repr());
        if T::CATEGORY == ValueCategory::Boolean
            && (lower != <T::Repr as From<bool>>::from(false)
                || upper != <T::Repr as From<bool>>::from(true))
        {
            return Err(Error::RangeNotApplicable(T::CATEGORY));
        }
        let strategy = select_strategy(T::CATEGORY, lower, upper)?;
        Ok(Self::from_parts(strategy, rng))
    }

    fn from_parts(strategy: DistributionStrategy<T::Repr>, rng: R) -> Self {
        Self {
            strategy,
            rng,
            _marker: PhantomData,
        }
    }

    /// Returns the next random value.
    pub fn generate(&mut self) -> T {
        T::from_repr(self.strategy.sample(&mut self.rng))
    }

    /// Returns the next `n` random values.
    pub fn generate_n(&mut self, n: usize) -> Vec<T> {
        (0..n).map(|_| self.generate()).collect()
    }

    pub fn category(&self) -> ValueCategory {
        self.strategy.category()
    }

    /// Inclusive lower bound of generated values
    pub fn lower(&self) -> T {
        T::from_repr(self.strategy.bounds().0)
    }

    /// Inclusive upper bound of generated values
    pub fn upper(&self) -> T {
        T::from_repr(self.strategy.bounds().1)
    }
}

impl<T, R> UniformRandomGenerator<T, R>
where
    T: RandomValue,
    R: RngCore + SeedableRng,
{
    /// Reproducible generator: the same seed always yields the same sequence
    pub fn seeded(lower: T, upper: T, seed: u64) -> Result<Self> {
        Self::with_engine(lower, upper, R::seed_from_u64(seed))
    }
}

impl<T: RandomValue, R> fmt::Debug for UniformRandomGenerator<T, R> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("UniformRandomGenerator")
            .field("strategy", &self.strategy)
            .finish_non_exhaustive()
    }
}
