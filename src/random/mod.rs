//! Typed uniform random data generation
//!
//! Every type that can be generated implements [`RandomValue`], which fixes its
//! [`ValueCategory`] and the representation the distribution actually samples.
//! The category decides the distribution once, when a
//! [`UniformRandomGenerator`] is built; types without a category simply do not
//! implement the trait and are rejected by the compiler.
//!
//! ```
//! use pandrs_testkit::random::UniformRandomGenerator;
//!
//! let mut g = UniformRandomGenerator::<i32>::with_range(0, 100).unwrap();
//! let value = g.generate();
//! assert!((0..=100).contains(&value));
//! ```
//!
//! ```compile_fail
//! use pandrs_testkit::random::UniformRandomGenerator;
//!
//! // `String` has no value category
//! let _g = UniformRandomGenerator::<String>::new();
//! ```

mod distribution;
mod generator;

use std::fmt;

use num_traits::{Bounded, Zero};
use rand::distr::uniform::SampleUniform;

pub use self::distribution::{select_strategy, DistributionStrategy};
pub use self::generator::UniformRandomGenerator;

/// Closed classification of the types a generator can produce
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ValueCategory {
    /// Integers other than booleans
    Integral,
    /// `f32` and `f64`
    FloatingPoint,
    /// `bool`
    Boolean,
    /// Timestamps, sampled through their integer tick count
    Temporal,
}

impl fmt::Display for ValueCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ValueCategory::Integral => "integral",
            ValueCategory::FloatingPoint => "floating-point",
            ValueCategory::Boolean => "boolean",
            ValueCategory::Temporal => "temporal",
        };
        f.write_str(name)
    }
}

/// A type that a [`UniformRandomGenerator`] can produce
pub trait RandomValue: Copy + fmt::Debug {
    /// Category that selects the distribution for this type
    const CATEGORY: ValueCategory;

    /// Representation sampled by the distribution
    ///
    /// For timestamps this is the tick count, for booleans `0`/`1`.
    type Repr: SampleUniform + Copy + PartialOrd + From<bool> + fmt::Debug;

    /// Range used when a generator is built without explicit bounds
    fn natural_range() -> (Self::Repr, Self::Repr);

    fn to_repr(self) -> Self::Repr;

    fn from_repr(repr: Self::Repr) -> Self;
}

macro_rules! impl_integral_random_value {
    ($($t:ty),* $(,)?) => {
        $(
            impl RandomValue for $t {
                const CATEGORY: ValueCategory = ValueCategory::Integral;
                type Repr = $t;

                fn natural_range() -> ($t, $t) {
                    (<$t as Zero>::zero(), <$t as Bounded>::max_value())
                }

                fn to_repr(self) -> $t {
                    self
                }

                fn from_repr(repr: $t) -> Self {
                    repr
                }
            }
        )*
    };
}

impl_integral_random_value!(i8, i16, i32, i64, u8, u16, u32, u64, usize);

// rand has no uniform sampler for `isize`; sample its 64-bit equivalent
impl RandomValue for isize {
    const CATEGORY: ValueCategory = ValueCategory::Integral;
    type Repr = i64;

    fn natural_range() -> (i64, i64) {
        (0, isize::MAX as i64)
    }

    fn to_repr(self) -> i64 {
        self as i64
    }

    fn from_repr(repr: i64) -> Self {
        repr as isize
    }
}

macro_rules! impl_float_random_value {
    ($($t:ty),* $(,)?) => {
        $(
            impl RandomValue for $t {
                const CATEGORY: ValueCategory = ValueCategory::FloatingPoint;
                type Repr = $t;

                fn natural_range() -> ($t, $t) {
                    (0.0, 1.0)
                }

                fn to_repr(self) -> $t {
                    self
                }

                fn from_repr(repr: $t) -> Self {
                    repr
                }
            }
        )*
    };
}

impl_float_random_value!(f32, f64);

impl RandomValue for bool {
    const CATEGORY: ValueCategory = ValueCategory::Boolean;
    type Repr = u8;

    fn natural_range() -> (u8, u8) {
        (0, 1)
    }

    fn to_repr(self) -> u8 {
        u8::from(self)
    }

    fn from_repr(repr: u8) -> Self {
        repr != 0
    }
}
