//! Half-open time ranges.

use core::fmt;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};
use time::format_description::well_known::Rfc3339;
use time::{Duration, OffsetDateTime};

use crate::error::{ParseError, ParseResult};

/// A half-open interval `[start, end)` of absolute time.
///
/// `start <= end` always holds; an equal pair is an empty range.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct TimeRange {
    start: OffsetDateTime,
    end: OffsetDateTime,
}

impl TimeRange {
    /// Create a range, rejecting `start > end`.
    ///
    /// ```
    /// use sensorkit_types::TimeRange;
    /// use time::macros::datetime;
    ///
    /// let range = TimeRange::new(datetime!(2024-01-01 0:00 UTC), datetime!(2024-01-02 0:00 UTC)).unwrap();
    /// assert_eq!(range.duration(), time::Duration::days(1));
    /// assert!(TimeRange::new(range.end(), range.start()).is_err());
    /// ```
    pub fn new(start: OffsetDateTime, end: OffsetDateTime) -> ParseResult<Self> {
        if start > end {
            return Err(ParseError::InvalidTimeRange {
                start: format_instant(start),
                end: format_instant(end),
            });
        }
        Ok(Self { start, end })
    }

    /// The range `[start, start + duration)`; negative durations are rejected.
    pub fn starting_at(start: OffsetDateTime, duration: Duration) -> ParseResult<Self> {
        Self::new(start, start.saturating_add(duration))
    }

    /// Inclusive start.
    #[must_use]
    pub fn start(&self) -> OffsetDateTime {
        self.start
    }

    /// Exclusive end.
    #[must_use]
    pub fn end(&self) -> OffsetDateTime {
        self.end
    }

    #[must_use]
    pub fn duration(&self) -> Duration {
        self.end - self.start
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.start == self.end
    }

    /// Whether `instant` lies in `[start, end)`.
    #[must_use]
    pub fn contains(&self, instant: OffsetDateTime) -> bool {
        self.start <= instant && instant < self.end
    }

    /// Clamp the end of the range to `limit`, keeping `start <= end`.
    #[must_use]
    pub fn clamp_end(&self, limit: OffsetDateTime) -> Self {
        let end = self.end.min(limit).max(self.start);
        Self {
            start: self.start,
            end,
        }
    }
}

impl fmt::Display for TimeRange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "[{}, {})",
            format_instant(self.start),
            format_instant(self.end)
        )
    }
}

fn format_instant(instant: OffsetDateTime) -> String {
    instant
        .format(&Rfc3339)
        .unwrap_or_else(|_| instant.unix_timestamp().to_string())
}
