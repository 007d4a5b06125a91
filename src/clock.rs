//! Clock abstraction for claim arithmetic
//!
//! All time-based claim checks read the current time through a [`Clock`]
//! owned by the signer or verifier, so a fixed reference clock can be
//! injected for deterministic tokens and tests.

use std::{
    sync::{
        atomic::{AtomicU64, Ordering},
        Arc,
    },
    time::SystemTime,
};

use chrono::{TimeZone, Utc};
use serde::{Deserialize, Serialize};

/// Unix time in whole seconds since 1970-01-01T00:00:00Z
#[derive(
    Clone, Copy, Debug, Default, PartialEq, Eq, Ord, PartialOrd, Serialize, Deserialize,
)]
#[serde(transparent)]
#[repr(transparent)]
pub struct UnixTime(pub u64);

impl UnixTime {
    /// This instant in milliseconds since the Unix epoch
    #[must_use]
    pub const fn as_millis(self) -> u64 {
        self.0 * 1000
    }
}

impl From<SystemTime> for UnixTime {
    fn from(t: SystemTime) -> Self {
        let secs = t
            .duration_since(SystemTime::UNIX_EPOCH)
            .expect("times before the Unix epoch are not expected")
            .as_secs();
        UnixTime(secs)
    }
}

/// A source of the current time
pub trait Clock {
    /// The current time according to this clock
    fn now(&self) -> UnixTime;
}

/// The system clock, backed by [`SystemTime`]
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct System;

impl Clock for System {
    #[inline]
    fn now(&self) -> UnixTime {
        UnixTime::from(SystemTime::now())
    }
}

/// A settable clock, for deterministic timestamps and tests
///
/// Clones share the same underlying instant, so a clock handed to a signer
/// or verifier can still be advanced from the outside.
#[derive(Clone, Debug, Default)]
pub struct TestClock(Arc<AtomicU64>);

impl Clock for TestClock {
    #[inline]
    fn now(&self) -> UnixTime {
        UnixTime(self.0.load(Ordering::Relaxed))
    }
}

impl TestClock {
    /// A clock reading `time`
    #[must_use]
    pub fn new(time: UnixTime) -> Self {
        Self(Arc::new(AtomicU64::new(time.0)))
    }

    /// Moves the clock to `val`
    pub fn set(&self, val: UnixTime) {
        self.0.store(val.0, Ordering::Relaxed);
    }

    /// Advances the clock by `inc` seconds
    pub fn advance(&self, inc: u64) {
        self.0.fetch_add(inc, Ordering::Relaxed);
    }
}

/// Formats an epoch-milliseconds instant as an ISO-8601 UTC timestamp.
///
/// Used when reporting the boundary a time-based claim check failed against.
pub(crate) fn iso_timestamp(epoch_ms: i64) -> String {
    match Utc.timestamp_millis_opt(epoch_ms).single() {
        Some(t) => t.to_rfc3339_opts(chrono::SecondsFormat::Millis, true),
        None => format!("{epoch_ms}ms"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_clock_is_settable() {
        let clock = TestClock::new(UnixTime(100));
        assert_eq!(clock.now(), UnixTime(100));
        clock.advance(5);
        assert_eq!(clock.now().as_millis(), 105_000);

        let shared = clock.clone();
        clock.set(UnixTime(500));
        assert_eq!(shared.now(), UnixTime(500));
    }

    #[test]
    fn boundaries_render_as_iso() {
        assert_eq!(iso_timestamp(1_000), "1970-01-01T00:00:01.000Z");
    }
}
