use std::collections::BTreeMap;

use chrono::NaiveDate;
use serde::Serialize;

use crate::models::{Challenge, Practice};

/// Where a challenge stands relative to its practice history.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ChallengeState {
    Pending,
    FulfilledUnconfirmed,
    Completed,
}

/// Outcome of checking a challenge against the practices of its task.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Evaluation {
    pub qualifying_days: i64,
    pub total_repetitions: i64,
    pub days_requirement_met: bool,
    pub repetitions_requirement_met: bool,
    pub is_fulfilled: bool,
    pub state: ChallengeState,
}

fn repetitions_per_day(practices: &[Practice]) -> BTreeMap<NaiveDate, i64> {
    let mut per_day = BTreeMap::new();
    for practice in practices {
        *per_day.entry(practice.date).or_insert(0) += practice.repetitions;
    }
    per_day
}

fn qualifying_days(challenge: &Challenge, practices: &[Practice]) -> i64 {
    repetitions_per_day(practices)
        .values()
        .filter(|&&repetitions| repetitions >= challenge.minimum_number_of_repetitions)
        .count() as i64
}

fn total_repetitions(practices: &[Practice]) -> i64 {
    practices.iter().map(|practice| practice.repetitions).sum()
}

/// Day-count check. A day counts when the repetitions logged on it reach
/// `minimum_number_of_repetitions`.
pub fn check_number_of_days(challenge: &Challenge, practices: &[Practice]) -> bool {
    if practices.is_empty() {
        return false;
    }
    if challenge.minimum_number_of_days <= 0 {
        return true;
    }
    qualifying_days(challenge, practices) >= challenge.minimum_number_of_days
}

pub fn check_total_repetitions(challenge: &Challenge, practices: &[Practice]) -> bool {
    if practices.is_empty() {
        return false;
    }
    if challenge.minimum_total_repetitions <= 0 {
        return true;
    }
    total_repetitions(practices) >= challenge.minimum_total_repetitions
}

pub fn check_if_fulfilled(challenge: &Challenge, practices: &[Practice]) -> bool {
    check_number_of_days(challenge, practices) && check_total_repetitions(challenge, practices)
}

pub fn state_of(challenge: &Challenge, is_fulfilled: bool) -> ChallengeState {
    if challenge.is_completed {
        ChallengeState::Completed
    } else if is_fulfilled {
        ChallengeState::FulfilledUnconfirmed
    } else {
        ChallengeState::Pending
    }
}

pub fn evaluate(challenge: &Challenge, practices: &[Practice]) -> Evaluation {
    let days_requirement_met = check_number_of_days(challenge, practices);
    let repetitions_requirement_met = check_total_repetitions(challenge, practices);
    let is_fulfilled = days_requirement_met && repetitions_requirement_met;

    Evaluation {
        qualifying_days: qualifying_days(challenge, practices),
        total_repetitions: total_repetitions(practices),
        days_requirement_met,
        repetitions_requirement_met,
        is_fulfilled,
        state: state_of(challenge, is_fulfilled),
    }
}
