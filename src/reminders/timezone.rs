use std::sync::Arc;

use chrono::{DateTime, FixedOffset, NaiveDateTime, Utc};
use mockable::{Clock, DefaultClock};

/// Clock shared by every component that needs "now".
pub type SharedClock = Arc<dyn Clock + Send + Sync>;

/// Injected clock pinned to the configured reminder timezone.
///
/// Reminders are stored as wall-clock times; they are compared against
/// `local_now()`, never against the host's local zone.
#[derive(Clone)]
pub struct ReminderClock {
    clock: SharedClock,
    offset: FixedOffset,
}

impl ReminderClock {
    pub fn new(clock: SharedClock, offset: FixedOffset) -> Self {
        Self { clock, offset }
    }

    /// Wall clock of the host, evaluated in `offset`.
    pub fn system(offset: FixedOffset) -> Self {
        Self::new(Arc::new(DefaultClock), offset)
    }

    pub fn offset(&self) -> FixedOffset {
        self.offset
    }

    pub fn now_utc(&self) -> DateTime<Utc> {
        self.clock.utc()
    }

    pub fn local_now(&self) -> NaiveDateTime {
        self.to_local(self.now_utc())
    }

    pub fn to_local(&self, instant: DateTime<Utc>) -> NaiveDateTime {
        instant.with_timezone(&self.offset).naive_local()
    }
}

/// Settable clock for tests.
#[cfg(test)]
pub(crate) mod fixture {
    use std::sync::Mutex;

    use chrono::{DateTime, Local, NaiveDateTime, TimeZone, Utc};
    use mockable::Clock;

    pub struct FixtureClock {
        now: Mutex<DateTime<Utc>>,
    }

    impl FixtureClock {
        pub fn at(now: DateTime<Utc>) -> Self {
            Self {
                now: Mutex::new(now),
            }
        }

        /// Clock whose UTC instant equals the given naive date-time.
        pub fn at_naive_utc(now: NaiveDateTime) -> Self {
            Self::at(Utc.from_utc_datetime(&now))
        }

        pub fn set(&self, now: DateTime<Utc>) {
            *self.now.lock().unwrap() = now;
        }

        pub fn advance(&self, by: chrono::Duration) {
            let mut now = self.now.lock().unwrap();
            *now += by;
        }
    }

    impl Clock for FixtureClock {
        fn local(&self) -> DateTime<Local> {
            self.utc().with_timezone(&Local)
        }

        fn utc(&self) -> DateTime<Utc> {
            *self.now.lock().unwrap()
        }
    }
}
