//! Time primitives
//!
//! Timestamps are nanoseconds since the unix epoch on a monotonic axis.
//! Ranges are half-open: `[start, end)`.

use derive_more::{Add, Display, From, Into, Sub};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Nanosecond-resolution point on the time axis
#[derive(
    Clone,
    Copy,
    Default,
    PartialEq,
    Eq,
    PartialOrd,
    Ord,
    Hash,
    Serialize,
    Deserialize,
    From,
    Into,
    Display,
)]
#[display("{_0}ns")]
pub struct TimeStamp(i64);

impl TimeStamp {
    /// The unix epoch
    pub const ZERO: Self = Self(0);
    /// Largest representable timestamp
    pub const MAX: Self = Self(i64::MAX);
    /// Smallest representable timestamp
    pub const MIN: Self = Self(i64::MIN);

    #[must_use]
    pub const fn new(nanos: i64) -> Self {
        Self(nanos)
    }

    #[must_use]
    pub const fn seconds(secs: i64) -> Self {
        Self(secs * TimeSpan::SECOND.0)
    }

    #[must_use]
    pub const fn milliseconds(ms: i64) -> Self {
        Self(ms * TimeSpan::MILLISECOND.0)
    }

    /// Raw nanosecond value
    #[must_use]
    pub const fn nanos(self) -> i64 {
        self.0
    }

    /// Shift the timestamp forward by `span`, saturating at the axis bounds
    #[must_use]
    pub const fn saturating_add(self, span: TimeSpan) -> Self {
        Self(self.0.saturating_add(span.0))
    }

    #[must_use]
    pub const fn is_zero(self) -> bool {
        self.0 == 0
    }
}

impl fmt::Debug for TimeStamp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "TimeStamp({})", self.0)
    }
}

/// A signed duration in nanoseconds
#[derive(
    Clone,
    Copy,
    Default,
    PartialEq,
    Eq,
    PartialOrd,
    Ord,
    Hash,
    Serialize,
    Deserialize,
    From,
    Into,
    Add,
    Sub,
)]
pub struct TimeSpan(i64);

impl TimeSpan {
    pub const ZERO: Self = Self(0);
    pub const NANOSECOND: Self = Self(1);
    pub const MICROSECOND: Self = Self(1_000);
    pub const MILLISECOND: Self = Self(1_000_000);
    pub const SECOND: Self = Self(1_000_000_000);
    pub const MINUTE: Self = Self(60 * Self::SECOND.0);

    #[must_use]
    pub const fn new(nanos: i64) -> Self {
        Self(nanos)
    }

    #[must_use]
    pub const fn seconds(secs: i64) -> Self {
        Self(secs * Self::SECOND.0)
    }

    #[must_use]
    pub const fn milliseconds(ms: i64) -> Self {
        Self(ms * Self::MILLISECOND.0)
    }

    #[must_use]
    pub const fn nanos(self) -> i64 {
        self.0
    }

    #[must_use]
    pub const fn is_zero(self) -> bool {
        self.0 == 0
    }

    /// Sum of two spans, clamped to the representable range
    #[must_use]
    pub const fn saturating_add(self, other: Self) -> Self {
        Self(self.0.saturating_add(other.0))
    }
}

impl fmt::Debug for TimeSpan {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "TimeSpan({self})")
    }
}

impl fmt::Display for TimeSpan {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        // Largest unit that divides the span evenly
        let units = [
            (Self::MINUTE.0, "m"),
            (Self::SECOND.0, "s"),
            (Self::MILLISECOND.0, "ms"),
            (Self::MICROSECOND.0, "us"),
        ];
        for (size, suffix) in units {
            if self.0 != 0 && self.0 % size == 0 {
                return write!(f, "{}{suffix}", self.0 / size);
            }
        }
        write!(f, "{}ns", self.0)
    }
}

/// Half-open interval `[start, end)` on the time axis
#[derive(Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TimeRange {
    pub start: TimeStamp,
    pub end: TimeStamp,
}

impl TimeRange {
    #[must_use]
    pub const fn new(start: TimeStamp, end: TimeStamp) -> Self {
        Self { start, end }
    }

    /// Shorthand for a range between two whole-second offsets
    #[must_use]
    pub const fn seconds(start: i64, end: i64) -> Self {
        Self::new(TimeStamp::seconds(start), TimeStamp::seconds(end))
    }

    /// Distance from start to end. Negative for an inverted range.
    #[must_use]
    pub const fn span(&self) -> TimeSpan {
        TimeSpan(self.end.0.saturating_sub(self.start.0))
    }

    /// `start <= end`
    #[must_use]
    pub fn is_valid(&self) -> bool {
        self.start <= self.end
    }

    /// Zero-length ranges cover no time at all
    #[must_use]
    pub fn is_zero(&self) -> bool {
        self.start == self.end
    }

    /// Whether `stamp` lies in `[start, end)`
    #[must_use]
    pub fn contains_stamp(&self, stamp: TimeStamp) -> bool {
        self.start <= stamp && stamp < self.end
    }

    /// Whether `other` lies entirely within this range
    #[must_use]
    pub fn contains_range(&self, other: &Self) -> bool {
        self.start <= other.start && other.end <= self.end
    }

    /// Strict half-open overlap: ranges that only share a boundary do not overlap.
    #[must_use]
    pub fn overlaps_with(&self, other: &Self) -> bool {
        self.start < other.end && other.start < self.end
    }

    /// Adjacent or overlapping. This is the merge rule for stored segments.
    #[must_use]
    pub fn touches(&self, other: &Self) -> bool {
        self.start <= other.end && other.start <= self.end
    }

    /// Smallest range covering both
    #[must_use]
    pub fn union(&self, other: &Self) -> Self {
        Self::new(self.start.min(other.start), self.end.max(other.end))
    }
}

impl fmt::Debug for TimeRange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "TimeRange[{}, {})", self.start.0, self.end.0)
    }
}

impl fmt::Display for TimeRange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}, {}) ({})", self.start, self.end, self.span())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_span_formatting() {
        assert_eq!(TimeSpan::seconds(2).to_string(), "2s");
        assert_eq!(TimeSpan::milliseconds(1500).to_string(), "1500ms");
        assert_eq!(TimeSpan::new(7).to_string(), "7ns");
        assert_eq!(TimeSpan::ZERO.to_string(), "0ns");
    }

    #[test]
    fn test_contains_stamp_half_open() {
        let tr = TimeRange::seconds(1, 4);
        assert!(tr.contains_stamp(TimeStamp::seconds(1)));
        assert!(tr.contains_stamp(TimeStamp::seconds(3)));
        assert!(!tr.contains_stamp(TimeStamp::seconds(4)));
    }

    #[test]
    fn test_overlap_vs_touch() {
        let a = TimeRange::seconds(1, 4);
        let b = TimeRange::seconds(4, 6);
        assert!(!a.overlaps_with(&b));
        assert!(a.touches(&b));
        assert!(b.touches(&a));

        let c = TimeRange::seconds(5, 6);
        assert!(!a.touches(&c));
        assert!(a.overlaps_with(&TimeRange::seconds(3, 5)));
        assert!(a.overlaps_with(&a));
    }

    #[test]
    fn test_union() {
        let a = TimeRange::seconds(1, 4);
        let b = TimeRange::seconds(3, 8);
        assert_eq!(a.union(&b), TimeRange::seconds(1, 8));
        assert_eq!(b.union(&a), TimeRange::seconds(1, 8));
    }

    #[test]
    fn test_validity() {
        assert!(!TimeRange::seconds(5, 2).is_valid());
        assert!(TimeRange::seconds(3, 3).is_valid());
        assert!(TimeRange::seconds(3, 3).is_zero());
    }

    #[test]
    fn test_span_saturates_at_axis_bounds() {
        let whole = TimeRange::new(TimeStamp::MIN, TimeStamp::MAX);
        assert_eq!(whole.span(), TimeSpan::new(i64::MAX));
        assert_eq!(
            TimeSpan::new(i64::MAX).saturating_add(TimeSpan::SECOND),
            TimeSpan::new(i64::MAX)
        );
        assert_eq!(
            TimeSpan::seconds(2).saturating_add(TimeSpan::MILLISECOND),
            TimeSpan::milliseconds(2001)
        );
    }
}
