//! Clock abstraction
//!
//! Every time-driven decision (expiry, grace period, renewal) reads "now"
//! from an injected `Clock` so it can be pinned in tests.

use chrono::{DateTime, Duration, NaiveDate, NaiveTime, Utc};
use parking_lot::RwLock;

/// Source of the current instant
pub trait Clock: Send + Sync {
    /// Current UTC instant
    fn now(&self) -> DateTime<Utc>;

    /// Current UTC calendar date
    fn today(&self) -> NaiveDate {
        self.now().date_naive()
    }
}

/// Wall clock
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

/// Manually driven clock for tests and replays
#[derive(Debug)]
pub struct ManualClock {
    now: RwLock<DateTime<Utc>>,
}

impl ManualClock {
    /// Create clock pinned at `now`
    pub fn new(now: DateTime<Utc>) -> Self {
        Self { now: RwLock::new(now) }
    }

    /// Create clock pinned at midday UTC of `date`
    pub fn at_date(date: NaiveDate) -> Self {
        Self::new(midday(date))
    }

    /// Move the clock to `now`
    pub fn set(&self, now: DateTime<Utc>) {
        *self.now.write() = now;
    }

    /// Move the clock to midday UTC of `date`
    pub fn set_date(&self, date: NaiveDate) {
        self.set(midday(date));
    }

    /// Advance the clock
    pub fn advance(&self, by: Duration) {
        let mut now = self.now.write();
        *now += by;
    }
}

impl Clock for ManualClock {
    fn now(&self) -> DateTime<Utc> {
        *self.now.read()
    }
}

fn midday(date: NaiveDate) -> DateTime<Utc> {
    (date.and_time(NaiveTime::default()) + Duration::hours(12)).and_utc()
}
