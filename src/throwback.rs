//! Picking an older track to resurface on the timeline.

use chrono::{DateTime, Datelike, Utc};
use rand::Rng;

use crate::domain::track::TrackRecord;

/// Size of the pool used when nothing predates the current month
pub const FALLBACK_POOL_SIZE: usize = 5;

/// Whole calendar months from `now` back to `then`; negative for the past.
fn month_diff(then: DateTime<Utc>, now: DateTime<Utc>) -> i64 {
    let years = i64::from(then.year() - now.year());
    let months = i64::from(then.month0()) - i64::from(now.month0());
    years * 12 + months
}

/// Records added in a calendar month strictly before the one containing
/// `now`. A record from the 31st of last month qualifies on the 1st.
pub fn eligible<'a>(records: &'a [TrackRecord], now: DateTime<Utc>) -> Vec<&'a TrackRecord> {
    records
        .iter()
        .filter(|r| month_diff(r.added_at, now) <= -1)
        .collect()
}

/// The pool a throwback is drawn from: the eligible records, or the
/// [`FALLBACK_POOL_SIZE`] oldest when none are eligible.
pub fn throwback_pool<'a>(records: &'a [TrackRecord], now: DateTime<Utc>) -> Vec<&'a TrackRecord> {
    let pool = eligible(records, now);
    if !pool.is_empty() {
        return pool;
    }

    let mut oldest = records.iter().collect::<Vec<_>>();
    oldest.sort_by_key(|r| r.added_at);
    oldest.truncate(FALLBACK_POOL_SIZE);
    oldest
}

/// Uniform pick from [`throwback_pool`]. `None` only for an empty record set.
pub fn select_throwback<'a, R: Rng + ?Sized>(
    records: &'a [TrackRecord],
    now: DateTime<Utc>,
    rng: &mut R,
) -> Option<&'a TrackRecord> {
    let pool = throwback_pool(records, now);
    if pool.is_empty() {
        return None;
    }
    Some(pool[rng.random_range(0..pool.len())])
}
