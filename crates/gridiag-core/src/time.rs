//! Timestamps attached to stored records.
//!
//! A driver may run against a calendar (absolute date-times) or a plain
//! elapsed clock. The two are kept apart so the stored record carries
//! exactly what the driver passed in.

use std::cmp::Ordering;
use std::fmt;

use chrono::{NaiveDateTime, TimeDelta};

/// The time of a stored record.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Timestamp {
    /// A calendar date-time (UTC, no zone attached).
    Absolute(NaiveDateTime),
    /// Time elapsed since the start of the run.
    Elapsed(TimeDelta),
}

/// Which variant a [`Timestamp`] is.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum TimestampKind {
    /// [`Timestamp::Absolute`].
    Absolute,
    /// [`Timestamp::Elapsed`].
    Elapsed,
}

impl Timestamp {
    /// The variant of this timestamp.
    pub fn kind(&self) -> TimestampKind {
        match self {
            Self::Absolute(_) => TimestampKind::Absolute,
            Self::Elapsed(_) => TimestampKind::Elapsed,
        }
    }

    /// Order two timestamps of the same kind; `None` across kinds.
    pub fn compare(&self, other: &Self) -> Option<Ordering> {
        match (self, other) {
            (Self::Absolute(a), Self::Absolute(b)) => Some(a.cmp(b)),
            (Self::Elapsed(a), Self::Elapsed(b)) => Some(a.cmp(b)),
            _ => None,
        }
    }
}

impl From<NaiveDateTime> for Timestamp {
    fn from(t: NaiveDateTime) -> Self {
        Self::Absolute(t)
    }
}

impl From<TimeDelta> for Timestamp {
    fn from(d: TimeDelta) -> Self {
        Self::Elapsed(d)
    }
}

impl fmt::Display for TimestampKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Absolute => f.write_str("absolute"),
            Self::Elapsed => f.write_str("elapsed"),
        }
    }
}

impl fmt::Display for Timestamp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Absolute(t) => write!(f, "{t}"),
            Self::Elapsed(d) => write!(f, "+{}s", d.num_milliseconds() as f64 / 1000.0),
        }
    }
}
