use chrono::{DateTime, Duration, Utc};
use serde::Serialize;

/// A half-open interval `[start, end)`.
///
/// The end instant is exclusive: a booking ending at 11:00 and one starting
/// at 11:00 do not overlap.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Interval {
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
}

impl Interval {
    pub fn new(start: DateTime<Utc>, end: DateTime<Utc>) -> Self {
        Self { start, end }
    }

    /// `end` saturates at the representable range instead of overflowing.
    pub fn from_minutes(start: DateTime<Utc>, duration_minutes: i32) -> Self {
        let end = start
            .checked_add_signed(Duration::minutes(duration_minutes as i64))
            .unwrap_or(if duration_minutes < 0 {
                DateTime::<Utc>::MIN_UTC
            } else {
                DateTime::<Utc>::MAX_UTC
            });
        Self { start, end }
    }

    /// Zero-length (or inverted) intervals occupy no time.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.end <= self.start
    }

    pub fn overlaps(&self, other: &Interval) -> bool {
        overlaps(self, other)
    }
}

/// Whether two half-open intervals share any instant.
///
/// Empty intervals never overlap anything, including intervals that
/// strictly contain them.
pub fn overlaps(a: &Interval, b: &Interval) -> bool {
    if a.is_empty() || b.is_empty() {
        return false;
    }
    a.start < b.end && b.start < a.end
}
