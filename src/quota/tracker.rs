use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Local, NaiveDate, Utc};
use serde::{Serialize, Serializer};

use crate::config::QuotaConfig;
use crate::quota::store::{StoreError, UsageStore};

/// Result of a quota evaluation. Derived, never persisted.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct QuotaDecision {
    pub allowed: bool,
    pub remaining: u32,
    #[serde(rename = "time_until_reset_secs", serialize_with = "serialize_secs")]
    pub time_until_reset: Duration,
}

fn serialize_secs<S: Serializer>(d: &Duration, s: S) -> Result<S::Ok, S::Error> {
    s.serialize_u64(d.as_secs())
}

/// Tracks per-identity daily usage against a cap with a rolling reset window.
///
/// The tracker is a stateless service over an injected [`UsageStore`]; all
/// mutation goes through the store's atomic `update` so concurrent calls for
/// the same identity cannot both consume the last slot. A due reset is
/// evaluated lazily on every call, before the cap check, rather than by a
/// background timer.
pub struct QuotaTracker {
    store: Arc<dyn UsageStore>,
    cap: u32,
    reset_window: Duration,
}

impl QuotaTracker {
    pub fn new(store: Arc<dyn UsageStore>, config: &QuotaConfig) -> Self {
        Self {
            store,
            cap: config.daily_cap,
            reset_window: config.reset_window(),
        }
    }

    /// Evaluate the quota for `identity` and, if allowed, consume one slot in
    /// the same atomic step. Returns the post-operation decision.
    ///
    /// Premium identities always pass and do not consume against the cap.
    pub fn check_and_consume(
        &self,
        identity: &str,
        premium: bool,
    ) -> Result<QuotaDecision, StoreError> {
        if premium {
            tracing::debug!(identity = %identity, "Premium identity, quota bypassed");
            return Ok(QuotaDecision {
                allowed: true,
                remaining: self.cap,
                time_until_reset: Duration::ZERO,
            });
        }

        let now = Utc::now();
        let window = self.reset_window;
        let cap = self.cap;
        let mut allowed = false;

        let record = self.store.update(identity, local_day(), &mut |rec| {
            if elapsed_since(now, rec.last_reset) >= window {
                rec.count = 0;
                rec.last_reset = now;
            }
            allowed = rec.count < cap;
            if allowed {
                rec.count += 1;
            }
        })?;

        let decision = QuotaDecision {
            allowed,
            remaining: cap.saturating_sub(record.count),
            time_until_reset: until_reset(now, record.last_reset, window),
        };

        if !decision.allowed {
            tracing::info!(
                identity = %identity,
                reset_in_secs = decision.time_until_reset.as_secs(),
                "Quota exceeded"
            );
        }

        Ok(decision)
    }

    /// Same evaluation as [`check_and_consume`](Self::check_and_consume)
    /// without consuming a slot. A due reset is observed (count treated as 0)
    /// but not persisted; the next mutating call writes it.
    pub fn peek(&self, identity: &str) -> Result<QuotaDecision, StoreError> {
        let now = Utc::now();
        let record = self.store.get_or_create(identity, local_day())?;

        let (count, last_reset) = if elapsed_since(now, record.last_reset) >= self.reset_window {
            (0, now)
        } else {
            (record.count, record.last_reset)
        };

        Ok(QuotaDecision {
            allowed: count < self.cap,
            remaining: self.cap.saturating_sub(count),
            time_until_reset: until_reset(now, last_reset, self.reset_window),
        })
    }
}

/// Calendar day in the caller's local timezone; usage records are keyed by it.
fn local_day() -> NaiveDate {
    Local::now().date_naive()
}

fn elapsed_since(now: DateTime<Utc>, then: DateTime<Utc>) -> Duration {
    (now - then).to_std().unwrap_or(Duration::ZERO)
}

fn until_reset(now: DateTime<Utc>, last_reset: DateTime<Utc>, window: Duration) -> Duration {
    let window = chrono::Duration::from_std(window).unwrap_or(chrono::Duration::MAX);
    last_reset
        .checked_add_signed(window)
        .map(|next| (next - now).to_std().unwrap_or(Duration::ZERO))
        .unwrap_or(Duration::MAX)
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::Database;
    use crate::quota::store::SqliteUsageStore;

    fn test_tracker(cap: u32, window: Duration) -> (QuotaTracker, Arc<SqliteUsageStore>) {
        let store = Arc::new(SqliteUsageStore::new(Database::open_in_memory().unwrap()));
        let config = QuotaConfig {
            daily_cap: cap,
            reset_window_secs: window.as_secs(),
        };
        let mut tracker = QuotaTracker::new(store.clone(), &config);
        // QuotaConfig carries whole seconds; tests with sub-second windows
        // override the duration directly.
        tracker.reset_window = window;
        (tracker, store)
    }

    /// Backdate the stored last_reset so the record looks `age` old.
    fn age_record(store: &SqliteUsageStore, identity: &str, age: Duration) {
        let stamp = Utc::now() - chrono::Duration::from_std(age).unwrap();
        store
            .update(identity, local_day(), &mut |rec| rec.last_reset = stamp)
            .unwrap();
    }

    #[test]
    fn test_allowed_increments_by_one() {
        let (tracker, store) = test_tracker(15, Duration::from_secs(21_600));

        let decision = tracker.check_and_consume("u1", false).unwrap();
        assert!(decision.allowed);
        assert_eq!(decision.remaining, 14);
        assert_eq!(store.get_or_create("u1", local_day()).unwrap().count, 1);
    }

    #[test]
    fn test_cap_boundary_sequence() {
        // 15 sequential allowed calls, then exactly one denial on the 16th.
        let (tracker, _) = test_tracker(15, Duration::from_secs(21_600));

        for i in 0..15 {
            let decision = tracker.check_and_consume("u1", false).unwrap();
            assert!(decision.allowed, "call {} should be allowed", i + 1);
        }
        let denied = tracker.check_and_consume("u1", false).unwrap();
        assert!(!denied.allowed);
        assert_eq!(denied.remaining, 0);
        assert!(denied.time_until_reset > Duration::ZERO);
    }

    #[test]
    fn test_last_allowed_call_reports_zero_remaining() {
        // cap=15, count=14, last reset 2 hours into a 6 hour window.
        let (tracker, store) = test_tracker(15, Duration::from_secs(6 * 3600));
        store
            .update("u1", local_day(), &mut |rec| rec.count = 14)
            .unwrap();
        age_record(&store, "u1", Duration::from_secs(2 * 3600));

        let decision = tracker.check_and_consume("u1", false).unwrap();
        assert!(decision.allowed);
        assert_eq!(decision.remaining, 0);

        let followup = tracker.check_and_consume("u1", false).unwrap();
        assert!(!followup.allowed);
        assert_eq!(followup.remaining, 0);
        // Roughly 4 hours until reset.
        let secs = followup.time_until_reset.as_secs();
        assert!((14_300..=14_400).contains(&secs), "got {secs}s");
    }

    #[test]
    fn test_denied_does_not_increment() {
        let (tracker, store) = test_tracker(1, Duration::from_secs(21_600));

        tracker.check_and_consume("u1", false).unwrap();
        tracker.check_and_consume("u1", false).unwrap();
        tracker.check_and_consume("u1", false).unwrap();

        assert_eq!(store.get_or_create("u1", local_day()).unwrap().count, 1);
    }

    #[test]
    fn test_expired_window_resets_before_cap_check() {
        let (tracker, store) = test_tracker(2, Duration::from_secs(60));
        store
            .update("u1", local_day(), &mut |rec| rec.count = 2)
            .unwrap();
        age_record(&store, "u1", Duration::from_secs(61));

        let decision = tracker.check_and_consume("u1", false).unwrap();
        assert!(decision.allowed);
        assert_eq!(decision.remaining, 1);
        // The reset epoch restarted at this call.
        assert!(decision.time_until_reset > Duration::from_secs(59));
    }

    #[test]
    fn test_peek_observes_expired_reset_without_persisting() {
        let (tracker, store) = test_tracker(2, Duration::from_secs(60));
        store
            .update("u1", local_day(), &mut |rec| rec.count = 2)
            .unwrap();
        age_record(&store, "u1", Duration::from_secs(61));

        let decision = tracker.peek("u1").unwrap();
        assert!(decision.allowed);
        assert_eq!(decision.remaining, 2);

        // The stored record is untouched; peek never mutates.
        assert_eq!(store.get_or_create("u1", local_day()).unwrap().count, 2);
    }

    #[test]
    fn test_peek_does_not_consume() {
        let (tracker, _) = test_tracker(15, Duration::from_secs(21_600));

        tracker.check_and_consume("u1", false).unwrap();
        let first = tracker.peek("u1").unwrap();
        let second = tracker.peek("u1").unwrap();
        assert_eq!(first.remaining, 14);
        assert_eq!(second.remaining, 14);
    }

    #[test]
    fn test_compressed_window_reset_cycle() {
        let (tracker, _) = test_tracker(2, Duration::from_millis(50));

        assert!(tracker.check_and_consume("u1", false).unwrap().allowed);
        assert!(tracker.check_and_consume("u1", false).unwrap().allowed);
        assert!(!tracker.check_and_consume("u1", false).unwrap().allowed);

        std::thread::sleep(Duration::from_millis(60));

        let decision = tracker.check_and_consume("u1", false).unwrap();
        assert!(decision.allowed);
        assert_eq!(decision.remaining, 1);
    }

    #[test]
    fn test_premium_bypasses_cap_and_count() {
        let (tracker, store) = test_tracker(1, Duration::from_secs(21_600));

        tracker.check_and_consume("u1", false).unwrap();
        let denied = tracker.check_and_consume("u1", false).unwrap();
        assert!(!denied.allowed);

        let premium = tracker.check_and_consume("u1", true).unwrap();
        assert!(premium.allowed);
        assert_eq!(store.get_or_create("u1", local_day()).unwrap().count, 1);
    }

    #[test]
    fn test_identities_are_isolated() {
        let (tracker, _) = test_tracker(1, Duration::from_secs(21_600));

        assert!(tracker.check_and_consume("u1", false).unwrap().allowed);
        assert!(!tracker.check_and_consume("u1", false).unwrap().allowed);
        assert!(tracker.check_and_consume("u2", false).unwrap().allowed);
    }

    #[test]
    fn test_concurrent_calls_admit_at_most_one_at_last_slot() {
        let (tracker, store) = test_tracker(15, Duration::from_secs(21_600));
        store
            .update("u1", local_day(), &mut |rec| rec.count = 14)
            .unwrap();

        let tracker = Arc::new(tracker);
        let handles: Vec<_> = (0..8)
            .map(|_| {
                let tracker = tracker.clone();
                std::thread::spawn(move || tracker.check_and_consume("u1", false).unwrap())
            })
            .collect();

        let allowed = handles
            .into_iter()
            .map(|h| h.join().unwrap())
            .filter(|d| d.allowed)
            .count();
        assert_eq!(allowed, 1);
        assert_eq!(store.get_or_create("u1", local_day()).unwrap().count, 15);
    }

    #[test]
    fn test_decision_serializes_reset_as_seconds() {
        let decision = QuotaDecision {
            allowed: false,
            remaining: 0,
            time_until_reset: Duration::from_secs(14_340),
        };
        let json = serde_json::to_value(&decision).unwrap();
        assert_eq!(json["allowed"], false);
        assert_eq!(json["remaining"], 0);
        assert_eq!(json["time_until_reset_secs"], 14_340);
    }
}
