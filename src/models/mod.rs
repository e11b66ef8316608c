pub mod schedule;
pub mod summary;

pub use schedule::{NewSchedule, Schedule, ScheduleDetail, ScheduleFilter};
pub use summary::{DaySummary, SchedulePage, SummaryPage};
