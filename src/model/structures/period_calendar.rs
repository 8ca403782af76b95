use chrono::{DateTime, Duration, TimeZone, Utc};

use crate::error::ProcessorError;

/// Maps real timestamps to period ids and back. Period 1 starts at `epoch`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PeriodCalendar {
    pub epoch: DateTime<Utc>,
    pub period_length: Duration
}

impl Default for PeriodCalendar {
    fn default() -> Self {
        PeriodCalendar {
            epoch: Utc.with_ymd_and_hms(2021, 6, 19, 0, 0, 0).unwrap(),
            period_length: Duration::days(1)
        }
    }
}

impl PeriodCalendar {
    pub fn new(epoch: DateTime<Utc>, period_length: Duration) -> PeriodCalendar {
        PeriodCalendar { epoch, period_length }
    }

    /// The period containing `timestamp`. Timestamps before the epoch map to
    /// periods below 1.
    pub fn period_for(&self, timestamp: DateTime<Utc>) -> Result<i32, ProcessorError> {
        let elapsed = (timestamp - self.epoch).num_seconds();
        let length = self.period_length.num_seconds().max(1);

        elapsed
            .div_euclid(length)
            .checked_add(1)
            .and_then(|period| i32::try_from(period).ok())
            .ok_or(ProcessorError::TimestampOutOfRange(timestamp))
    }

    /// The instant a period begins. This is the `as_of` used when a period is
    /// replayed.
    pub fn start_of(&self, period_id: i32) -> Result<DateTime<Utc>, ProcessorError> {
        period_id
            .checked_sub(1)
            .and_then(|offset| self.period_length.checked_mul(offset))
            .and_then(|elapsed| self.epoch.checked_add_signed(elapsed))
            .ok_or(ProcessorError::PeriodOutOfRange(period_id))
    }
}
