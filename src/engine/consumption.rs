// ==========================================
// FieldOps stock engine - weekly consumption window
// ==========================================
// Resupply runs on Wednesdays. Consumption is read over the
// previous cycle: from the Wednesday before the most recent one
// (00:00:00) through the most recent Wednesday (23:59:59).
// The next cycle closes one week after the most recent Wednesday.
// ==========================================

use chrono::{Datelike, Duration, NaiveDate, NaiveDateTime, NaiveTime, Weekday};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConsumptionWindow {
    pub previous_wednesday: NaiveDate,
    pub current_wednesday: NaiveDate,
    pub next_wednesday: NaiveDate,
}

impl ConsumptionWindow {
    /// Window whose current Wednesday is the latest one on or before `anchor`
    pub fn for_anchor(anchor: NaiveDate) -> Self {
        let back = (anchor.weekday().num_days_from_monday() + 7
            - Weekday::Wed.num_days_from_monday())
            % 7;
        let current_wednesday = anchor - Duration::days(back as i64);
        Self {
            previous_wednesday: current_wednesday - Duration::days(7),
            current_wednesday,
            next_wednesday: current_wednesday + Duration::days(7),
        }
    }

    /// First instant counted (inclusive)
    pub fn start(&self) -> NaiveDateTime {
        self.previous_wednesday.and_time(NaiveTime::MIN)
    }

    /// Last instant counted (inclusive, whole seconds)
    pub fn end(&self) -> NaiveDateTime {
        self.current_wednesday
            .and_hms_opt(23, 59, 59)
            .unwrap_or_else(|| self.current_wednesday.and_time(NaiveTime::MIN))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[test]
    fn test_window_anchors() {
        // 2024-07-10 is a Wednesday
        let on_wednesday = ConsumptionWindow::for_anchor(date(2024, 7, 10));
        assert_eq!(on_wednesday.current_wednesday, date(2024, 7, 10));
        assert_eq!(on_wednesday.previous_wednesday, date(2024, 7, 3));
        assert_eq!(on_wednesday.next_wednesday, date(2024, 7, 17));

        let saturday = ConsumptionWindow::for_anchor(date(2024, 7, 13));
        assert_eq!(saturday.current_wednesday, date(2024, 7, 10));

        // Sunday through Tuesday still belong to the previous Wednesday
        let sunday = ConsumptionWindow::for_anchor(date(2024, 7, 14));
        assert_eq!(sunday.current_wednesday, date(2024, 7, 10));
        let tuesday = ConsumptionWindow::for_anchor(date(2024, 7, 9));
        assert_eq!(tuesday.current_wednesday, date(2024, 7, 3));
    }

    #[test]
    fn test_window_bounds_are_inclusive_days() {
        let w = ConsumptionWindow::for_anchor(date(2024, 7, 10));
        assert_eq!(w.start().to_string(), "2024-07-03 00:00:00");
        assert_eq!(w.end().to_string(), "2024-07-10 23:59:59");
    }
}
