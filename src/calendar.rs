use std::collections::HashMap;

use chrono::{Datelike, NaiveDate};
use serde::Serialize;
use sqlx::{Pool, Sqlite};
use tracing::instrument;

use crate::db::{get_goals_between, get_practices_between, get_tasks};
use crate::error::AppError;
use crate::models::{Goal, Practice};

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DayCounts {
    pub day: u32,
    pub goals: usize,
    pub practices: usize,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MonthSummary {
    pub month: u32,
    /// Only days with at least one goal or practice.
    pub days: Vec<DayCounts>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct YearView {
    pub year: i32,
    pub months: Vec<MonthSummary>,
}

/// Monday-first weeks; days outside the month are `None`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MonthView {
    pub year: i32,
    pub month: u32,
    pub weeks: Vec<Vec<Option<DayCounts>>>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PracticeEntry {
    pub task_label: String,
    #[serde(flatten)]
    pub practice: Practice,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DayView {
    pub date: NaiveDate,
    pub goals: Vec<Goal>,
    pub practices: Vec<PracticeEntry>,
}

fn invalid_date() -> AppError {
    AppError::NotFound("No such date".to_string())
}

fn month_bounds(year: i32, month: u32) -> Option<(NaiveDate, NaiveDate)> {
    let first = NaiveDate::from_ymd_opt(year, month, 1)?;
    let next = if month == 12 {
        NaiveDate::from_ymd_opt(year.checked_add(1)?, 1, 1)?
    } else {
        NaiveDate::from_ymd_opt(year, month + 1, 1)?
    };
    Some((first, next.pred_opt()?))
}

fn counts_by_date(goals: &[Goal], practices: &[Practice]) -> HashMap<NaiveDate, (usize, usize)> {
    let mut counts: HashMap<NaiveDate, (usize, usize)> = HashMap::new();
    for date in goals.iter().filter_map(|goal| goal.date) {
        counts.entry(date).or_default().0 += 1;
    }
    for practice in practices {
        counts.entry(practice.date).or_default().1 += 1;
    }
    counts
}

fn day_counts(date: NaiveDate, counts: &HashMap<NaiveDate, (usize, usize)>) -> DayCounts {
    let (goals, practices) = counts.get(&date).copied().unwrap_or_default();
    DayCounts {
        day: date.day(),
        goals,
        practices,
    }
}

/// Lays a month out in Monday-first weeks, annotating every day.
pub fn month_weeks(
    year: i32,
    month: u32,
    goals: &[Goal],
    practices: &[Practice],
) -> Option<Vec<Vec<Option<DayCounts>>>> {
    let (first, last) = month_bounds(year, month)?;
    let counts = counts_by_date(goals, practices);

    let mut weeks = Vec::new();
    let padding = first.weekday().num_days_from_monday() as usize;
    let mut week: Vec<Option<DayCounts>> = vec![None; padding];

    for date in first.iter_days().take_while(|date| *date <= last) {
        week.push(Some(day_counts(date, &counts)));
        if week.len() == 7 {
            weeks.push(std::mem::take(&mut week));
        }
    }
    if !week.is_empty() {
        week.resize(7, None);
        weeks.push(week);
    }

    Some(weeks)
}

/// Per-month activity of a year, keeping only active days.
pub fn year_months(year: i32, goals: &[Goal], practices: &[Practice]) -> Option<Vec<MonthSummary>> {
    let counts = counts_by_date(goals, practices);

    (1..=12)
        .map(|month| {
            let (first, last) = month_bounds(year, month)?;
            let days = first
                .iter_days()
                .take_while(|date| *date <= last)
                .filter(|date| counts.contains_key(date))
                .map(|date| day_counts(date, &counts))
                .collect();
            Some(MonthSummary { month, days })
        })
        .collect()
}

#[instrument(skip(pool))]
pub async fn year_view(pool: &Pool<Sqlite>, user_id: i64, year: i32) -> Result<YearView, AppError> {
    let from = NaiveDate::from_ymd_opt(year, 1, 1).ok_or_else(invalid_date)?;
    let to = NaiveDate::from_ymd_opt(year, 12, 31).ok_or_else(invalid_date)?;

    let goals = get_goals_between(pool, user_id, from, to).await?;
    let practices = get_practices_between(pool, user_id, from, to).await?;

    Ok(YearView {
        year,
        months: year_months(year, &goals, &practices).ok_or_else(invalid_date)?,
    })
}

#[instrument(skip(pool))]
pub async fn month_view(
    pool: &Pool<Sqlite>,
    user_id: i64,
    year: i32,
    month: u32,
) -> Result<MonthView, AppError> {
    let (from, to) = month_bounds(year, month).ok_or_else(invalid_date)?;

    let goals = get_goals_between(pool, user_id, from, to).await?;
    let practices = get_practices_between(pool, user_id, from, to).await?;

    Ok(MonthView {
        year,
        month,
        weeks: month_weeks(year, month, &goals, &practices).ok_or_else(invalid_date)?,
    })
}

#[instrument(skip(pool))]
pub async fn day_view(
    pool: &Pool<Sqlite>,
    user_id: i64,
    year: i32,
    month: u32,
    day: u32,
) -> Result<DayView, AppError> {
    let date = NaiveDate::from_ymd_opt(year, month, day).ok_or_else(invalid_date)?;

    let goals = get_goals_between(pool, user_id, date, date).await?;
    let practices = get_practices_between(pool, user_id, date, date).await?;

    let labels: HashMap<i64, String> = get_tasks(pool, user_id)
        .await?
        .into_iter()
        .map(|task| (task.id, task.label()))
        .collect();

    let practices = practices
        .into_iter()
        .map(|practice| PracticeEntry {
            task_label: labels.get(&practice.task_id).cloned().unwrap_or_default(),
            practice,
        })
        .collect();

    Ok(DayView {
        date,
        goals,
        practices,
    })
}
