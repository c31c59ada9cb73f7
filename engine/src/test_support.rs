//! Test utilities shared by the crate's unit tests.

use chrono::{DateTime, Local, TimeZone, Utc};
use mockable::Clock;

/// Clock frozen at `now`; defaults to Wednesday 2026-03-04 12:00 UTC.
#[derive(Debug, Clone, Copy)]
pub struct FixtureClock {
    pub now: DateTime<Utc>,
}

impl Default for FixtureClock {
    fn default() -> Self {
        let now = Utc
            .with_ymd_and_hms(2026, 3, 4, 12, 0, 0)
            .single()
            .expect("valid fixture timestamp");
        Self { now }
    }
}

impl Clock for FixtureClock {
    fn local(&self) -> DateTime<Local> {
        self.now.with_timezone(&Local)
    }

    fn utc(&self) -> DateTime<Utc> {
        self.now
    }
}
