use chrono::{DateTime, Datelike, Duration, NaiveTime, Utc};
use strum_macros::{Display, EnumIter, EnumString};

use crate::{error::ProcessorError, model::structures::period_calendar::PeriodCalendar};

/// Restricts which periods' results feed a leaderboard
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PeriodFilter {
    AllTime,
    Since(i32),
    /// Inclusive on both ends
    Between(i32, i32)
}

impl PeriodFilter {
    pub fn contains(&self, period_id: i32) -> bool {
        match *self {
            PeriodFilter::AllTime => true,
            PeriodFilter::Since(from) => period_id >= from,
            PeriodFilter::Between(from, to) => period_id >= from && period_id <= to
        }
    }

    /// Inclusive lower and upper bounds, `None` where the filter is open
    pub fn bounds(&self) -> (Option<i32>, Option<i32>) {
        match *self {
            PeriodFilter::AllTime => (None, None),
            PeriodFilter::Since(from) => (Some(from), None),
            PeriodFilter::Between(from, to) => (Some(from), Some(to))
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Display, EnumString, EnumIter)]
#[strum(serialize_all = "lowercase")]
pub enum LeaderboardWindow {
    #[strum(to_string = "all", serialize = "alltime")]
    AllTime,
    Weekly,
    Monthly
}

impl LeaderboardWindow {
    /// Resolves the window relative to `reference`. Weeks start on Monday and
    /// months on the 1st, both at midnight UTC.
    pub fn filter(&self, calendar: &PeriodCalendar, reference: DateTime<Utc>) -> Result<PeriodFilter, ProcessorError> {
        let today = reference.date_naive();
        let start = match self {
            LeaderboardWindow::AllTime => return Ok(PeriodFilter::AllTime),
            LeaderboardWindow::Weekly => today - Duration::days(today.weekday().num_days_from_monday() as i64),
            LeaderboardWindow::Monthly => today - Duration::days(today.day0() as i64)
        };

        Ok(PeriodFilter::Since(
            calendar.period_for(start.and_time(NaiveTime::default()).and_utc())?
        ))
    }
}
