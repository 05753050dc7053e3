//! Fixed retry backoff schedule for failed deliveries.

use chrono::{DateTime, Duration, Utc};

/// Backoff schedule (in seconds): 5s, 5m, 30m, 2h, 5h, 10h, 14h, 20h, 24h.
///
/// A message gets one initial attempt plus one retry per schedule entry;
/// the 10th consecutive failure is terminal.
pub const RETRY_INTERVALS_SECS: [i64; 9] =
    [5, 300, 1_800, 7_200, 18_000, 36_000, 50_400, 72_000, 86_400];

/// Maximum delivery attempts per message (initial + 9 retries).
pub const MAX_ATTEMPTS: usize = RETRY_INTERVALS_SECS.len() + 1;

/// Calculate when the next delivery attempt should run.
///
/// `attempt_number` is the 1-based number of the attempt that just failed.
/// Returns `None` once the schedule is exhausted, leaving the message in its
/// terminal failed state.
#[must_use]
pub fn next_delivery_attempt(
    attempt_number: usize,
    attempted_at: DateTime<Utc>,
) -> Option<DateTime<Utc>> {
    let idx = attempt_number.checked_sub(1)?;
    let delay_secs = RETRY_INTERVALS_SECS.get(idx).copied()?;
    Some(attempted_at + Duration::seconds(delay_secs))
}
