//! Timestamp types used as test data
//!
//! Each timestamp is a count of ticks since the Unix epoch in a fixed
//! [`TimeUnit`]. Random generation works on the tick count, so a range of
//! timestamps is a range of integers.

use std::fmt;

use chrono::{DateTime, Utc};

use crate::random::{RandomValue, ValueCategory};

/// Resolution of a timestamp's tick count
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TimeUnit {
    Days,
    Seconds,
    Milliseconds,
    Microseconds,
    Nanoseconds,
}

impl TimeUnit {
    /// Short suffix used when formatting raw tick counts
    pub fn suffix(&self) -> &'static str {
        match self {
            TimeUnit::Days => "D",
            TimeUnit::Seconds => "s",
            TimeUnit::Milliseconds => "ms",
            TimeUnit::Microseconds => "us",
            TimeUnit::Nanoseconds => "ns",
        }
    }

    /// Converts a tick count in this unit to a UTC date-time
    ///
    /// Returns `None` when the instant is outside chrono's supported range.
    pub fn to_datetime(&self, ticks: i64) -> Option<DateTime<Utc>> {
        match self {
            TimeUnit::Days => DateTime::from_timestamp(ticks.checked_mul(86_400)?, 0),
            TimeUnit::Seconds => DateTime::from_timestamp(ticks, 0),
            TimeUnit::Milliseconds => DateTime::from_timestamp_millis(ticks),
            TimeUnit::Microseconds => DateTime::from_timestamp_micros(ticks),
            TimeUnit::Nanoseconds => Some(DateTime::from_timestamp_nanos(ticks)),
        }
    }
}

macro_rules! timestamp_type {
    ($(#[$meta:meta])* $name:ident, $rep:ty, $unit:expr) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
        pub struct $name($rep);

        impl $name {
            pub const UNIT: TimeUnit = $unit;

            pub const fn new(ticks: $rep) -> Self {
                Self(ticks)
            }

            /// Number of ticks since the Unix epoch
            pub const fn ticks(&self) -> $rep {
                self.0
            }

            pub fn to_datetime(&self) -> Option<DateTime<Utc>> {
                Self::UNIT.to_datetime(i64::from(self.0))
            }
        }

        impl From<$rep> for $name {
            fn from(ticks: $rep) -> Self {
                Self(ticks)
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                match self.to_datetime() {
                    Some(dt) => write!(f, "{}", dt.to_rfc3339()),
                    None => write!(f, "{}{}", self.0, Self::UNIT.suffix()),
                }
            }
        }

        impl RandomValue for $name {
            const CATEGORY: ValueCategory = ValueCategory::Temporal;
            type Repr = $rep;

            fn natural_range() -> ($rep, $rep) {
                (0, <$rep>::MAX)
            }

            fn to_repr(self) -> $rep {
                self.0
            }

            fn from_repr(repr: $rep) -> Self {
                Self(repr)
            }
        }
    };
}

timestamp_type!(
    /// Days since the Unix epoch
    TimestampDays,
    i32,
    TimeUnit::Days
);
timestamp_type!(
    /// Seconds since the Unix epoch
    TimestampSeconds,
    i64,
    TimeUnit::Seconds
);
timestamp_type!(
    /// Milliseconds since the Unix epoch
    TimestampMillis,
    i64,
    TimeUnit::Milliseconds
);
timestamp_type!(
    /// Microseconds since the Unix epoch
    TimestampMicros,
    i64,
    TimeUnit::Microseconds
);
timestamp_type!(
    /// Nanoseconds since the Unix epoch
    TimestampNanos,
    i64,
    TimeUnit::Nanoseconds
);
