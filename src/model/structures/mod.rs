pub mod period_calendar;
pub mod period_filter;
pub mod rating_adjustment_type;
pub mod score;
