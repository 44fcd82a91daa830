use chrono::{DateTime, NaiveDate, NaiveDateTime, NaiveTime, Utc};
use serde::{Deserialize, Serialize};

fn to_utc(value: Option<NaiveDateTime>) -> DateTime<Utc> {
    value
        .map(|dt| DateTime::<Utc>::from_naive_utc_and_offset(dt, Utc))
        .unwrap_or_else(Utc::now)
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct Goal {
    pub id: i64,
    pub user_id: i64,
    pub name: String,
    pub piece: String,
    pub date: Option<NaiveDate>,
    pub time: Option<NaiveTime>,
    pub is_concluded: bool,
    pub additional_info: String,
    pub piece_ids: Vec<i64>,
}

#[derive(sqlx::FromRow, Clone)]
pub struct DbGoal {
    pub id: Option<i64>,
    pub user_id: Option<i64>,
    pub name: Option<String>,
    pub piece: Option<String>,
    pub date: Option<NaiveDate>,
    pub time: Option<NaiveTime>,
    pub is_concluded: Option<bool>,
    pub additional_info: Option<String>,
}

impl From<DbGoal> for Goal {
    fn from(goal: DbGoal) -> Self {
        Self {
            id: goal.id.unwrap_or_default(),
            user_id: goal.user_id.unwrap_or_default(),
            name: goal.name.unwrap_or_default(),
            piece: goal.piece.unwrap_or_default(),
            date: goal.date,
            time: goal.time,
            is_concluded: goal.is_concluded.unwrap_or_default(),
            additional_info: goal.additional_info.unwrap_or_default(),
            piece_ids: Vec::new(),
        }
    }
}

impl Goal {
    pub fn label(&self) -> String {
        if !self.name.is_empty() {
            self.name.clone()
        } else if !self.piece.is_empty() {
            self.piece.clone()
        } else {
            format!("Goal #{}", self.id)
        }
    }
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, sqlx::FromRow)]
pub struct Composer {
    pub id: i64,
    pub user_id: i64,
    pub name: String,
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, sqlx::FromRow)]
pub struct Part {
    pub id: i64,
    pub user_id: i64,
    pub name: String,
}

/// Catalogue metadata kept beside a piece.
#[derive(Debug, Serialize, Deserialize, Clone, Default, PartialEq, sqlx::FromRow)]
pub struct PieceInformation {
    pub collection: String,
    pub style: String,
    pub genre: String,
    pub piece_type: String,
    pub opus: String,
    pub number: String,
    pub musical_key: String,
    pub period: String,
    pub time_to_master_days: Option<i64>,
}

impl PieceInformation {
    pub fn is_empty(&self) -> bool {
        self.collection.is_empty()
            && self.style.is_empty()
            && self.genre.is_empty()
            && self.piece_type.is_empty()
            && self.opus.is_empty()
            && self.number.is_empty()
            && self.musical_key.is_empty()
            && self.period.is_empty()
            && self.time_to_master_days.is_none()
    }
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct Piece {
    pub id: i64,
    pub user_id: i64,
    pub name_to_display: String,
    pub is_mastered: bool,
    pub is_archived: bool,
    pub is_cleared: bool,
    pub composers: Vec<Composer>,
    pub goal_ids: Vec<i64>,
    pub information: Option<PieceInformation>,
}

#[derive(sqlx::FromRow, Clone)]
pub struct DbPiece {
    pub id: Option<i64>,
    pub user_id: Option<i64>,
    pub name_to_display: Option<String>,
    pub is_mastered: Option<bool>,
    pub is_archived: Option<bool>,
    pub is_cleared: Option<bool>,
}

impl From<DbPiece> for Piece {
    fn from(piece: DbPiece) -> Self {
        Self {
            id: piece.id.unwrap_or_default(),
            user_id: piece.user_id.unwrap_or_default(),
            name_to_display: piece.name_to_display.unwrap_or_default(),
            is_mastered: piece.is_mastered.unwrap_or_default(),
            is_archived: piece.is_archived.unwrap_or_default(),
            is_cleared: piece.is_cleared.unwrap_or_default(),
            composers: Vec::new(),
            goal_ids: Vec::new(),
            information: None,
        }
    }
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct Task {
    pub id: i64,
    pub user_id: i64,
    pub goal_id: Option<i64>,
    pub piece_id: Option<i64>,
    pub goal_name: Option<String>, // Denormalized for convenience
    pub piece_name: Option<String>,
    pub element: String,
    pub method: String,
    pub is_suggested: bool,
    pub are_suggestions_enabled: bool,
    pub was_practiced: bool,
    pub part_ids: Vec<i64>,
    pub created_at: DateTime<Utc>,
}

#[derive(sqlx::FromRow, Clone, Default)]
pub struct DbTask {
    pub id: Option<i64>,
    pub user_id: Option<i64>,
    pub goal_id: Option<i64>,
    pub piece_id: Option<i64>,
    pub goal_name: Option<String>,
    pub piece_name: Option<String>,
    pub element: Option<String>,
    pub method: Option<String>,
    pub is_suggested: Option<bool>,
    pub are_suggestions_enabled: Option<bool>,
    pub was_practiced: Option<bool>,
    pub created_at: Option<NaiveDateTime>,
}

impl From<DbTask> for Task {
    fn from(db: DbTask) -> Self {
        Self {
            id: db.id.unwrap_or_default(),
            user_id: db.user_id.unwrap_or_default(),
            goal_id: db.goal_id,
            piece_id: db.piece_id,
            goal_name: db.goal_name,
            piece_name: db.piece_name,
            element: db.element.unwrap_or_default(),
            method: db.method.unwrap_or_default(),
            is_suggested: db.is_suggested.unwrap_or_default(),
            are_suggestions_enabled: db.are_suggestions_enabled.unwrap_or_default(),
            was_practiced: db.was_practiced.unwrap_or_default(),
            part_ids: Vec::new(),
            created_at: to_utc(db.created_at),
        }
    }
}

impl Task {
    /// Human readable name built from whatever the task is attached to.
    pub fn label(&self) -> String {
        let subject = self
            .piece_name
            .as_deref()
            .filter(|name| !name.is_empty())
            .or(self.goal_name.as_deref().filter(|name| !name.is_empty()));

        let mut parts: Vec<&str> = Vec::new();
        if let Some(subject) = subject {
            parts.push(subject);
        }
        if !self.element.is_empty() {
            parts.push(&self.element);
        }
        if !self.method.is_empty() {
            parts.push(&self.method);
        }

        if parts.is_empty() {
            format!("Task #{}", self.id)
        } else {
            parts.join(" / ")
        }
    }
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, sqlx::FromRow)]
pub struct Practice {
    pub id: i64,
    pub task_id: i64,
    pub date: NaiveDate,
    pub start_time: Option<NaiveTime>,
    pub end_time: Option<NaiveTime>,
    pub repetitions: i64,
    pub is_summarized: bool,
    pub is_completed: bool,
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct Challenge {
    pub id: i64,
    pub user_id: i64,
    pub task_id: i64,
    pub start_date: Option<NaiveDate>,
    pub minimum_number_of_days: i64,
    pub minimum_number_of_repetitions: i64,
    pub minimum_total_repetitions: i64,
    pub are_requirements_fulfilled: bool,
    pub is_completed: bool,
    pub created_at: DateTime<Utc>,
}

#[derive(sqlx::FromRow, Clone, Default)]
pub struct DbChallenge {
    pub id: Option<i64>,
    pub user_id: Option<i64>,
    pub task_id: Option<i64>,
    pub start_date: Option<NaiveDate>,
    pub minimum_number_of_days: Option<i64>,
    pub minimum_number_of_repetitions: Option<i64>,
    pub minimum_total_repetitions: Option<i64>,
    pub are_requirements_fulfilled: Option<bool>,
    pub is_completed: Option<bool>,
    pub created_at: Option<NaiveDateTime>,
}

impl From<DbChallenge> for Challenge {
    fn from(db: DbChallenge) -> Self {
        Self {
            id: db.id.unwrap_or_default(),
            user_id: db.user_id.unwrap_or_default(),
            task_id: db.task_id.unwrap_or_default(),
            start_date: db.start_date,
            minimum_number_of_days: db.minimum_number_of_days.unwrap_or_default(),
            minimum_number_of_repetitions: db.minimum_number_of_repetitions.unwrap_or_default(),
            minimum_total_repetitions: db.minimum_total_repetitions.unwrap_or_default(),
            are_requirements_fulfilled: db.are_requirements_fulfilled.unwrap_or_default(),
            is_completed: db.is_completed.unwrap_or_default(),
            created_at: to_utc(db.created_at),
        }
    }
}

/// Cleaned goal fields, ready to be written.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct GoalData {
    pub name: String,
    pub piece: String,
    pub piece_ids: Vec<i64>,
    pub date: Option<NaiveDate>,
    pub time: Option<NaiveTime>,
    pub is_concluded: bool,
    pub additional_info: String,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct PieceData {
    pub name_to_display: String,
    pub composer_ids: Vec<i64>,
    pub goal_ids: Vec<i64>,
    pub is_mastered: bool,
    pub is_archived: bool,
    pub is_cleared: bool,
    pub information: PieceInformation,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct TaskData {
    pub goal_id: Option<i64>,
    pub piece_id: Option<i64>,
    pub element: String,
    pub method: String,
    pub part_ids: Vec<i64>,
    pub is_suggested: bool,
    pub are_suggestions_enabled: bool,
}

#[derive(Debug, Clone, PartialEq)]
pub struct PracticeData {
    pub date: NaiveDate,
    pub start_time: Option<NaiveTime>,
    pub end_time: Option<NaiveTime>,
    pub repetitions: i64,
    pub is_summarized: bool,
    pub is_completed: bool,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct ChallengeData {
    pub start_date: Option<NaiveDate>,
    pub minimum_number_of_days: i64,
    pub minimum_number_of_repetitions: i64,
    pub minimum_total_repetitions: i64,
    pub is_completed: bool,
}
