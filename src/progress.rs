//! Completion percentages for goals.
//!
//! Every function here is pure: the caller supplies "today" and the records.

use crate::models::{DailyRecord, Goal, GoalKind};
use chrono::{Datelike, Duration, NaiveDate};
use std::collections::BTreeSet;

/// Inclusive calendar range.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Period {
    pub start: NaiveDate,
    pub end: NaiveDate,
}

impl Period {
    pub fn contains(&self, date: NaiveDate) -> bool {
        self.start <= date && date <= self.end
    }

    pub fn days(&self) -> i64 {
        (self.end - self.start).num_days() + 1
    }

    /// Whole weeks touched by the period, at least one.
    pub fn elapsed_weeks(&self) -> i64 {
        ((self.days() + 6) / 7).max(1)
    }
}

/// `round(current / target * 100)` clamped to `0..=100`.
pub fn quantitative_progress(current: f64, target: f64) -> u8 {
    if !current.is_finite() || !target.is_finite() || target <= 0.0 {
        return 0;
    }
    clamp_percent(current / target * 100.0)
}

/// Distinct completed days in `period` over the expected completions.
pub fn habit_progress(weekly_frequency: u8, records: &[DailyRecord], period: Period) -> u8 {
    if weekly_frequency == 0 || period.end < period.start {
        return 0;
    }
    let done = completed_days(records, period);
    let expected = i64::from(weekly_frequency) * period.elapsed_weeks();
    clamp_percent(done as f64 / expected as f64 * 100.0)
}

/// The Monday-to-Sunday week holding `today`, clipped to the goal's dates.
///
/// Returns `None` when the goal's date range does not overlap that week.
pub fn current_week(today: NaiveDate, start_date: NaiveDate, end_date: Option<NaiveDate>) -> Option<Period> {
    let monday = week_start(today);
    let sunday = monday + Duration::days(6);
    let start = monday.max(start_date);
    let end = end_date.map_or(sunday, |end| sunday.min(end));
    (start <= end).then_some(Period { start, end })
}

/// Headline progress for a goal: stored total for quantitative goals,
/// completions in the current week for habits.
pub fn goal_progress(goal: &Goal, records: &[DailyRecord], today: NaiveDate) -> u8 {
    match &goal.kind {
        GoalKind::Quantitative {
            target_value,
            current_value,
            ..
        } => quantitative_progress(*current_value, *target_value),
        GoalKind::Habit { weekly_frequency } => {
            match current_week(today, goal.start_date, goal.end_date) {
                Some(period) => habit_progress(*weekly_frequency, &own_records(goal, records), period),
                None => 0,
            }
        }
    }
}

/// Habit adherence across the goal's whole elapsed lifetime.
pub fn habit_adherence(goal: &Goal, records: &[DailyRecord], today: NaiveDate) -> u8 {
    let GoalKind::Habit { weekly_frequency } = goal.kind else {
        return 0;
    };
    let end = goal.end_date.map_or(today, |end| end.min(today));
    if end < goal.start_date {
        return 0;
    }
    let period = Period {
        start: goal.start_date,
        end,
    };
    habit_progress(weekly_frequency, &own_records(goal, records), period)
}

pub fn week_start(date: NaiveDate) -> NaiveDate {
    date - Duration::days(date.weekday().num_days_from_monday() as i64)
}

fn completed_days(records: &[DailyRecord], period: Period) -> usize {
    records
        .iter()
        .filter(|record| record.completed == Some(true) && period.contains(record.date))
        .map(|record| record.date)
        .collect::<BTreeSet<_>>()
        .len()
}

fn own_records(goal: &Goal, records: &[DailyRecord]) -> Vec<DailyRecord> {
    records
        .iter()
        .filter(|record| record.goal_id == goal.id)
        .cloned()
        .collect()
}

fn clamp_percent(raw: f64) -> u8 {
    if raw.is_nan() {
        return 0;
    }
    raw.round().clamp(0.0, 100.0) as u8
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{Category, GoalStatus};
    use chrono::Utc;
    use uuid::Uuid;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    fn habit_goal(frequency: u8, start: NaiveDate) -> Goal {
        Goal {
            id: Uuid::new_v4(),
            user_id: Uuid::new_v4(),
            title: "Read".into(),
            description: None,
            category: Category::Learning,
            kind: GoalKind::Habit {
                weekly_frequency: frequency,
            },
            start_date: start,
            end_date: None,
            status: GoalStatus::Active,
            created_at: Utc::now(),
            updated_at: Utc::now(),
            completed_at: None,
        }
    }

    fn done(goal: &Goal, on: NaiveDate) -> DailyRecord {
        DailyRecord {
            id: Uuid::new_v4(),
            goal_id: goal.id,
            date: on,
            value: None,
            completed: Some(true),
            note: None,
            submission_id: None,
            created_at: Utc::now(),
        }
    }

    #[test]
    fn quantitative_rounds_and_clamps() {
        assert_eq!(quantitative_progress(800.0, 900.0), 89);
        assert_eq!(quantitative_progress(750.0, 900.0), 83);
        assert_eq!(quantitative_progress(2000.0, 900.0), 100);
        assert_eq!(quantitative_progress(-5.0, 900.0), 0);
        assert_eq!(quantitative_progress(0.0, 900.0), 0);
    }

    #[test]
    fn quantitative_guards_zero_target() {
        assert_eq!(quantitative_progress(10.0, 0.0), 0);
        assert_eq!(quantitative_progress(10.0, -3.0), 0);
        assert_eq!(quantitative_progress(f64::NAN, 10.0), 0);
        assert_eq!(quantitative_progress(10.0, f64::INFINITY), 0);
    }

    #[test]
    fn quantitative_stays_in_bounds() {
        for target in [1.0, 3.0, 7.5, 900.0] {
            for step in 0..50 {
                let current = step as f64 * target / 20.0;
                let progress = quantitative_progress(current, target);
                assert!(progress <= 100);
                let expected = (current / target * 100.0).round().min(100.0) as u8;
                assert_eq!(progress, expected);
            }
        }
    }

    #[test]
    fn habit_with_no_records_this_week_is_zero() {
        // Wednesday; goal started months ago with plenty of old completions.
        let today = date(2026, 1, 7);
        let goal = habit_goal(3, date(2025, 10, 1));
        let records = vec![done(&goal, date(2025, 12, 29)), done(&goal, date(2026, 1, 4))];
        assert_eq!(goal_progress(&goal, &records, today), 0);
    }

    #[test]
    fn habit_counts_distinct_days_in_current_week() {
        let today = date(2026, 1, 7);
        let goal = habit_goal(3, date(2025, 10, 1));
        let records = vec![
            done(&goal, date(2026, 1, 5)),
            done(&goal, date(2026, 1, 5)),
            done(&goal, date(2026, 1, 6)),
        ];
        assert_eq!(goal_progress(&goal, &records, today), 67);
    }

    #[test]
    fn habit_ignores_incomplete_and_foreign_records() {
        let today = date(2026, 1, 7);
        let goal = habit_goal(2, date(2025, 10, 1));
        let other = habit_goal(2, date(2025, 10, 1));
        let mut skipped = done(&goal, date(2026, 1, 5));
        skipped.completed = Some(false);
        let records = vec![skipped, done(&other, date(2026, 1, 6))];
        assert_eq!(goal_progress(&goal, &records, today), 0);
    }

    #[test]
    fn habit_caps_at_full() {
        let today = date(2026, 1, 11);
        let goal = habit_goal(1, date(2025, 10, 1));
        let records = vec![done(&goal, date(2026, 1, 5)), done(&goal, date(2026, 1, 6))];
        assert_eq!(goal_progress(&goal, &records, today), 100);
    }

    #[test]
    fn habit_adherence_spans_elapsed_weeks() {
        // Two weeks elapsed (Jan 5..=Jan 14 touches two 7-day blocks).
        let today = date(2026, 1, 14);
        let goal = habit_goal(2, date(2026, 1, 5));
        let records = vec![
            done(&goal, date(2026, 1, 5)),
            done(&goal, date(2026, 1, 8)),
            done(&goal, date(2026, 1, 13)),
        ];
        assert_eq!(habit_adherence(&goal, &records, today), 75);
    }

    #[test]
    fn current_week_clips_to_goal_dates() {
        let today = date(2026, 1, 7);
        let period = current_week(today, date(2026, 1, 6), Some(date(2026, 1, 9))).unwrap();
        assert_eq!(period.start, date(2026, 1, 6));
        assert_eq!(period.end, date(2026, 1, 9));
        assert!(current_week(today, date(2026, 2, 1), None).is_none());
    }
}
