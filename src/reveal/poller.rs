use std::{
    sync::{Arc, Mutex},
    thread::{self, JoinHandle},
    time::Duration,
};

use anyhow::anyhow;
use chrono::{DateTime, NaiveDate, Utc};
use log::{error, info};

use crate::{
    reveal::{
        executor::{self, RevealOutcome, VisibilityStore},
        schedule::RevealSchedule,
    },
    storage::error::StorageError,
};

/// Background trigger for the weekly reveal.
///
/// Ticks on a fixed interval and runs the executor on the first tick that
/// lands in the due minute. Later ticks in the same minute are skipped, so a
/// song added right after the reveal waits for the next week.
pub struct RevealPoller<S> {
    storage: Arc<Mutex<S>>,
    schedule: RevealSchedule,
    interval: Duration,
    /// day of the last scheduled run
    last_run: Option<NaiveDate>,
}

impl<S: VisibilityStore + Send + 'static> RevealPoller<S> {
    /// `interval` is expected to be under a minute, see `RevealConfig::poll_interval`
    pub fn new(storage: Arc<Mutex<S>>, schedule: RevealSchedule, interval: Duration) -> Self {
        Self {
            storage,
            schedule,
            interval: interval.max(Duration::from_secs(1)),
            last_run: None,
        }
    }

    /// `Ok(None)` when no reveal is due at `now` or it already ran
    pub fn tick(&mut self, now: DateTime<Utc>) -> Result<Option<RevealOutcome>, StorageError> {
        if !self.schedule.is_reveal_due(now) || self.last_run == Some(now.date_naive()) {
            return Ok(None);
        }

        let mut storage = self.storage.lock().map_err(|e| {
            StorageError::Internal(anyhow!("Could not access storage under lock: {e}"))
        })?;
        let outcome = executor::reveal(&mut *storage, now)?;
        self.last_run = Some(now.date_naive());

        if !outcome.is_empty() {
            info!(
                "Scheduled reveal at {}: {} songs revealed",
                now, outcome.revealed_count
            );
        }
        Ok(Some(outcome))
    }

    pub fn spawn(mut self) -> JoinHandle<()> {
        info!(
            "Reveal poller started, reveals every {} at {:02}:00 UTC, next at {}",
            self.schedule.weekday(),
            self.schedule.hour(),
            self.schedule.next_reveal_instant(Utc::now())
        );

        thread::spawn(move || {
            loop {
                thread::sleep(self.interval);
                if let Err(e) = self.tick(Utc::now()) {
                    error!("Scheduled reveal failed: {e}");
                }
            }
        })
    }
}

#[cfg(test)]
mod tests {
    use chrono::TimeZone;

    use super::*;
    use crate::{
        domain::track::tests::metadata,
        storage::operations::{Storage, tests::setup_storage},
    };

    fn poller_with_hidden(hidden: usize) -> anyhow::Result<(RevealPoller<Storage>, Arc<Mutex<Storage>>)> {
        let mut storage = setup_storage()?;
        for i in 0..hidden {
            storage.insert_track(&metadata(&format!("song {i}")))?;
        }
        let storage = Arc::new(Mutex::new(storage));
        let poller = RevealPoller::new(
            Arc::clone(&storage),
            RevealSchedule::default(),
            Duration::from_secs(20),
        );
        Ok((poller, storage))
    }

    #[test]
    fn test_tick_outside_due_minute_does_nothing() -> anyhow::Result<()> {
        let (mut poller, storage) = poller_with_hidden(2)?;

        let wednesday = Utc.with_ymd_and_hms(2024, 3, 13, 12, 0, 0).unwrap();
        assert!(poller.tick(wednesday)?.is_none());
        assert_eq!(storage.lock().unwrap().count_hidden()?, 2);

        Ok(())
    }

    #[test]
    fn test_repeated_ticks_in_due_minute_reveal_once() -> anyhow::Result<()> {
        let (mut poller, storage) = poller_with_hidden(2)?;
        let due = Utc.with_ymd_and_hms(2024, 3, 10, 12, 0, 0).unwrap();

        let first = poller.tick(due)?.unwrap();
        assert_eq!(first.revealed_count, 2);

        // a late contribution inside the due minute waits for next week
        storage.lock().unwrap().insert_track(&metadata("late"))?;
        assert!(poller.tick(due + chrono::TimeDelta::seconds(20))?.is_none());
        assert!(poller.tick(due + chrono::TimeDelta::seconds(40))?.is_none());

        let mut locked = storage.lock().unwrap();
        assert_eq!(locked.count_hidden()?, 1);
        assert_eq!(locked.last_reveal()?.unwrap().revealed_count, 2);
        drop(locked);

        let next_week = due + chrono::TimeDelta::days(7);
        assert_eq!(poller.tick(next_week)?.unwrap().revealed_count, 1);

        Ok(())
    }

    #[test]
    fn test_empty_due_minute_still_counts_as_run() -> anyhow::Result<()> {
        let (mut poller, storage) = poller_with_hidden(0)?;
        let due = Utc.with_ymd_and_hms(2024, 3, 10, 12, 0, 0).unwrap();

        assert!(poller.tick(due)?.unwrap().is_empty());

        storage.lock().unwrap().insert_track(&metadata("late"))?;
        assert!(poller.tick(due + chrono::TimeDelta::seconds(30))?.is_none());
        assert_eq!(storage.lock().unwrap().count_hidden()?, 1);

        Ok(())
    }
}
