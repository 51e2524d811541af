//! Millisecond wall-clock timestamps

use std::fmt;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use serde::{Deserialize, Serialize};

/// Milliseconds since the Unix epoch
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(transparent)]
pub struct Timestamp(u64);

impl Timestamp {
    /// Construct from milliseconds since the epoch
    pub const fn from_millis(millis: u64) -> Self {
        Self(millis)
    }

    /// Current system time. A clock set before the epoch reads as zero.
    pub fn now() -> Self {
        let millis = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_millis() as u64)
            .unwrap_or_default();
        Self(millis)
    }

    /// Milliseconds since the epoch
    pub const fn as_millis(&self) -> u64 {
        self.0
    }

    /// Add a duration, saturating at the maximum representable instant
    pub fn saturating_add(self, duration: Duration) -> Self {
        Self(self.0.saturating_add(duration.as_millis() as u64))
    }

    /// Subtract a duration, saturating at the epoch
    pub fn saturating_sub(self, duration: Duration) -> Self {
        Self(self.0.saturating_sub(duration.as_millis() as u64))
    }

    /// Time elapsed from `earlier` to `self`, zero if `earlier` is later
    pub fn duration_since(self, earlier: Timestamp) -> Duration {
        Duration::from_millis(self.0.saturating_sub(earlier.0))
    }
}

impl fmt::Display for Timestamp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_saturating_arithmetic() {
        let ts = Timestamp::from_millis(1_000);
        assert_eq!(ts.saturating_add(Duration::from_secs(2)).as_millis(), 3_000);
        assert_eq!(ts.saturating_sub(Duration::from_secs(5)).as_millis(), 0);
        assert_eq!(
            Timestamp::from_millis(u64::MAX).saturating_add(Duration::from_millis(1)),
            Timestamp::from_millis(u64::MAX)
        );
    }

    #[test]
    fn test_duration_since() {
        let a = Timestamp::from_millis(500);
        let b = Timestamp::from_millis(1_250);
        assert_eq!(b.duration_since(a), Duration::from_millis(750));
        assert_eq!(a.duration_since(b), Duration::ZERO);
    }
}
