use crate::models::{
    Category, CategoryPoint, DailyPoint, DailyRecord, DashboardStats, Goal, GoalKind, GoalStatus,
    GoalView, StatsResponse, TrendPoint, WeeklyPoint,
};
use crate::progress::{habit_progress, quantitative_progress, week_start, Period};
use chrono::{Datelike, Duration, NaiveDate};
use std::collections::{BTreeMap, BTreeSet};

const WEEK_COUNT: usize = 8;

pub fn build_stats_at(today: NaiveDate, goals: &[GoalView], records: &[DailyRecord]) -> StatsResponse {
    let per_day = records_per_day(records);

    let mut last_7_days = Vec::with_capacity(7);
    for offset in (0..7).rev() {
        let date = today - Duration::days(offset as i64);
        last_7_days.push(DailyPoint {
            date: date.to_string(),
            record_count: per_day.get(&date).copied().unwrap_or(0),
        });
    }

    let current_week_start = week_start(today);
    let mut weekly_totals = Vec::with_capacity(WEEK_COUNT);
    for offset in (0..WEEK_COUNT).rev() {
        let start = current_week_start - Duration::weeks(offset as i64);
        let end = start + Duration::days(6);
        let (record_count, active_days) = week_activity(&per_day, start);
        weekly_totals.push(WeeklyPoint {
            week: week_label(start),
            start_date: start.to_string(),
            end_date: end.to_string(),
            record_count,
            active_days,
        });
    }

    StatsResponse {
        dashboard: dashboard_at(today, goals, &per_day),
        categories: category_distribution(goals),
        last_7_days,
        weekly_totals,
    }
}

fn dashboard_at(today: NaiveDate, goals: &[GoalView], per_day: &BTreeMap<NaiveDate, u64>) -> DashboardStats {
    let active: Vec<&GoalView> = goals
        .iter()
        .filter(|view| view.goal.status == GoalStatus::Active)
        .collect();
    let completed = goals
        .iter()
        .filter(|view| view.goal.status == GoalStatus::Completed)
        .count();

    let this_week = week_start(today);
    let (this_week_count, _) = week_activity(per_day, this_week);
    let (last_week_count, _) = week_activity(per_day, this_week - Duration::weeks(1));

    let active_weeks: BTreeSet<NaiveDate> = per_day.keys().map(|date| week_start(*date)).collect();
    let mut week_streak = 0u32;
    let mut cursor = this_week;
    while active_weeks.contains(&cursor) {
        week_streak += 1;
        cursor = cursor - Duration::weeks(1);
    }

    DashboardStats {
        total_goals: goals.len() as u64,
        active_goals: active.len() as u64,
        completed_goals: completed as u64,
        average_progress: average_progress(&active),
        today_updates: per_day.get(&today).copied().unwrap_or(0),
        week_streak,
        weekly_comparison: this_week_count as i64 - last_week_count as i64,
    }
}

/// Active goals per category with their mean progress; empty categories are omitted.
pub fn category_distribution(goals: &[GoalView]) -> Vec<CategoryPoint> {
    Category::ALL
        .iter()
        .filter_map(|category| {
            let members: Vec<&GoalView> = goals
                .iter()
                .filter(|view| view.goal.status == GoalStatus::Active && view.goal.category == *category)
                .collect();
            (!members.is_empty()).then(|| CategoryPoint {
                category: *category,
                count: members.len() as u64,
                avg_progress: average_progress(&members),
            })
        })
        .collect()
}

/// Cumulative progress of one goal, oldest record first.
pub fn goal_trend(goal: &Goal, records: &[DailyRecord]) -> Vec<TrendPoint> {
    let mut own: Vec<&DailyRecord> = records.iter().filter(|record| record.goal_id == goal.id).collect();
    own.sort_by(|a, b| a.date.cmp(&b.date).then(a.created_at.cmp(&b.created_at)));

    let mut cumulative = 0.0;
    let mut seen: Vec<DailyRecord> = Vec::with_capacity(own.len());
    own.into_iter()
        .map(|record| {
            seen.push(record.clone());
            let (value, progress) = match &goal.kind {
                GoalKind::Quantitative { target_value, .. } => {
                    let value = record.value.unwrap_or(0.0);
                    cumulative += value;
                    (value, quantitative_progress(cumulative, *target_value))
                }
                GoalKind::Habit { weekly_frequency } => {
                    let value = if record.completed == Some(true) { 1.0 } else { 0.0 };
                    cumulative += value;
                    let period = Period {
                        start: goal.start_date,
                        end: record.date,
                    };
                    (value, habit_progress(*weekly_frequency, &seen, period))
                }
            };
            TrendPoint {
                date: record.date.to_string(),
                value,
                cumulative,
                progress,
            }
        })
        .collect()
}

fn records_per_day(records: &[DailyRecord]) -> BTreeMap<NaiveDate, u64> {
    let mut per_day = BTreeMap::new();
    for record in records {
        *per_day.entry(record.date).or_insert(0u64) += 1;
    }
    per_day
}

fn week_activity(per_day: &BTreeMap<NaiveDate, u64>, start: NaiveDate) -> (u64, u8) {
    let mut count = 0u64;
    let mut active_days = 0u8;
    for day_offset in 0..7 {
        if let Some(n) = per_day.get(&(start + Duration::days(day_offset))) {
            count = count.saturating_add(*n);
            active_days += 1;
        }
    }
    (count, active_days)
}

fn average_progress(goals: &[&GoalView]) -> u8 {
    if goals.is_empty() {
        return 0;
    }
    let sum: u64 = goals.iter().map(|view| u64::from(view.progress)).sum();
    (sum as f64 / goals.len() as f64).round() as u8
}

fn week_label(date: NaiveDate) -> String {
    let iso = date.iso_week();
    format!("{}-W{:02}", iso.year(), iso.week())
}
