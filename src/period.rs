use chrono::{Datelike, NaiveDate};

use crate::models::{PeriodMode, PeriodSelector};

/// Filter handed to every retrieval query for one run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct QueryPredicate {
    pub month: u32,
    pub year: i32,
    pub week: Option<u8>,
}

/// Out-of-range months or weeks are passed through untouched; they simply
/// match no stored rows.
pub fn resolve(selector: &PeriodSelector) -> QueryPredicate {
    let week = match selector.mode {
        PeriodMode::Week => Some(selector.week),
        PeriodMode::Month => None,
    };

    QueryPredicate {
        month: selector.month,
        year: selector.year,
        week,
    }
}

pub fn label(selector: &PeriodSelector) -> String {
    match selector.mode {
        PeriodMode::Week => format!(
            "week {} of {:02}/{}",
            selector.week, selector.month, selector.year
        ),
        PeriodMode::Month => format!("{:02}/{}", selector.month, selector.year),
    }
}

/// Reporting week a date falls in: days 1-7 are week 1, 29-31 are week 5.
pub fn week_of_month(date: NaiveDate) -> u8 {
    ((date.day() - 1) / 7 + 1) as u8
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn month_mode_leaves_week_unbounded() {
        let predicate = resolve(&PeriodSelector::month(3, 2024));
        assert_eq!(
            predicate,
            QueryPredicate {
                month: 3,
                year: 2024,
                week: None
            }
        );
    }

    #[test]
    fn week_mode_adds_equality_on_week() {
        let predicate = resolve(&PeriodSelector::week(2, 3, 2024));
        assert_eq!(predicate.week, Some(2));
        assert_eq!((predicate.month, predicate.year), (3, 2024));
    }

    #[test]
    fn out_of_range_selector_is_passed_through() {
        let predicate = resolve(&PeriodSelector::week(9, 13, 2024));
        assert_eq!(predicate.month, 13);
        assert_eq!(predicate.week, Some(9));
    }

    #[test]
    fn week_of_month_uses_seven_day_blocks() {
        let day = |d| NaiveDate::from_ymd_opt(2024, 3, d).unwrap();
        assert_eq!(week_of_month(day(1)), 1);
        assert_eq!(week_of_month(day(7)), 1);
        assert_eq!(week_of_month(day(8)), 2);
        assert_eq!(week_of_month(day(28)), 4);
        assert_eq!(week_of_month(day(31)), 5);
    }

    #[test]
    fn labels_read_naturally() {
        assert_eq!(label(&PeriodSelector::month(3, 2024)), "03/2024");
        assert_eq!(label(&PeriodSelector::week(4, 11, 2025)), "week 4 of 11/2025");
    }
}
