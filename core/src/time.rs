//! Time units accepted by the timeout setters.

use std::time::Duration;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TimeUnit {
    Nanoseconds,
    Microseconds,
    Milliseconds,
    Seconds,
    Minutes,
    Hours,
    Days,
}

impl TimeUnit {
    /// Convert `amount` of this unit into a `Duration`.
    ///
    /// Returns `None` when the result does not fit in a `Duration`.
    pub fn to_duration(self, amount: u64) -> Option<Duration> {
        match self {
            TimeUnit::Nanoseconds => Some(Duration::from_nanos(amount)),
            TimeUnit::Microseconds => Some(Duration::from_micros(amount)),
            TimeUnit::Milliseconds => Some(Duration::from_millis(amount)),
            TimeUnit::Seconds => Some(Duration::from_secs(amount)),
            TimeUnit::Minutes => amount.checked_mul(60).map(Duration::from_secs),
            TimeUnit::Hours => amount.checked_mul(60 * 60).map(Duration::from_secs),
            TimeUnit::Days => amount.checked_mul(24 * 60 * 60).map(Duration::from_secs),
        }
    }
}
