use chrono::{DateTime, Datelike, Days, NaiveDate, NaiveTime, TimeDelta, Timelike, Utc, Weekday};
use serde::Serialize;

/// Weekly anchor at which hidden tracks become visible. All arithmetic is UTC.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RevealSchedule {
    weekday: Weekday,
    time: NaiveTime,
}

impl Default for RevealSchedule {
    /// Sunday, midday
    fn default() -> Self {
        Self {
            weekday: Weekday::Sun,
            time: NaiveTime::MIN + TimeDelta::hours(12),
        }
    }
}

impl RevealSchedule {
    /// `None` if `hour` is not a valid hour of day
    pub fn new(weekday: Weekday, hour: u32) -> Option<Self> {
        let time = NaiveTime::from_hms_opt(hour, 0, 0)?;
        Some(Self { weekday, time })
    }

    pub fn weekday(&self) -> Weekday {
        self.weekday
    }

    pub fn hour(&self) -> u32 {
        self.time.hour()
    }

    fn anchor_on(&self, date: NaiveDate) -> DateTime<Utc> {
        date.and_time(self.time).and_utc()
    }

    /// The nearest anchor at or after `now`.
    ///
    /// The exact anchor instant is still "due" and is returned as is; any
    /// later instant on the anchor day rolls over to the following week.
    pub fn next_reveal_instant(&self, now: DateTime<Utc>) -> DateTime<Utc> {
        let today = now.date_naive();
        let days_ahead = (7 + self.weekday.num_days_from_sunday()
            - now.weekday().num_days_from_sunday())
            % 7;

        if days_ahead == 0 {
            let anchor_today = self.anchor_on(today);
            if now <= anchor_today {
                anchor_today
            } else {
                anchor_today + TimeDelta::days(7)
            }
        } else {
            self.anchor_on(today + Days::new(u64::from(days_ahead)))
        }
    }

    /// Point-in-time check: anchor weekday, anchor hour, minute zero.
    pub fn is_reveal_due(&self, now: DateTime<Utc>) -> bool {
        now.weekday() == self.weekday && now.hour() == self.hour() && now.minute() == 0
    }

    pub fn countdown(&self, now: DateTime<Utc>) -> Countdown {
        Countdown::until(now, self.next_reveal_instant(now))
    }
}

/// Time left until an instant, broken down for display
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Countdown {
    pub days: i64,
    pub hours: i64,
    pub minutes: i64,
    pub seconds: i64,
}

impl Countdown {
    /// zero once `target` has passed
    pub fn until(now: DateTime<Utc>, target: DateTime<Utc>) -> Self {
        let total = (target - now).num_seconds().max(0);
        Self {
            days: total / 86_400,
            hours: (total % 86_400) / 3_600,
            minutes: (total % 3_600) / 60,
            seconds: total % 60,
        }
    }
}
