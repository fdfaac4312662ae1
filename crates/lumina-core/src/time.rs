//! Time helpers.

use time::OffsetDateTime;

/// Current UTC timestamp.
#[must_use]
pub fn now_utc() -> OffsetDateTime {
    OffsetDateTime::now_utc()
}
