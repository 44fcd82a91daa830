use chrono::{NaiveDate, NaiveTime};
use once_cell::sync::Lazy;
use regex::Regex;
use rocket::{FromForm, FromFormField};
use sqlx::{Pool, Sqlite};
use validator::{Validate, ValidateEmail};

use crate::auth::ProfileRole;
use crate::db::all_owned_by;
use crate::error::AppError;
use crate::models::{ChallengeData, GoalData, PieceData, PieceInformation, PracticeData, TaskData};
use crate::validation::{FormErrors, NON_FIELD_ERRORS};

pub const REQUIRED: &str = "This field is required.";
pub const AT_LEAST_ONE: &str = "At least one of these fields must be filled.";
pub const TAMPERED: &str = "Form tampered. Please do not do this.";

/// Accepted spellings of a date. Two digit years come first so that
/// `01.02.24` is read as 2024.
const DATE_FORMATS: &[&str] = &[
    "%d.%m.%y",
    "%d.%m.%Y",
    "%d/%m/%y",
    "%d/%m/%Y",
    "%d-%m-%y",
    "%d-%m-%Y",
    "%d %m %y",
    "%d %m %Y",
    "%Y-%m-%d",
    "%Y/%m/%d",
    "%Y.%m.%d",
];

const TIME_FORMATS: &[&str] = &["%H:%M", "%H:%M:%S"];

static USERNAME_REGEX: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[A-Za-z0-9@.+_-]+$").expect("username pattern is valid"));

/// Year-first spellings apply only when the value opens with four digits,
/// otherwise chrono would read `01-02-24` as the year 1.
pub fn parse_date(value: &str) -> Option<NaiveDate> {
    let value = value.trim();
    let year_first = value.chars().take_while(char::is_ascii_digit).count() == 4;
    DATE_FORMATS
        .iter()
        .filter(|format| format.starts_with("%Y") == year_first)
        .find_map(|format| NaiveDate::parse_from_str(value, format).ok())
}

pub fn parse_time(value: &str) -> Option<NaiveTime> {
    let value = value.trim();
    TIME_FORMATS
        .iter()
        .find_map(|format| NaiveTime::parse_from_str(value, format).ok())
}

fn text(value: &Option<String>) -> String {
    value.as_deref().map(str::trim).unwrap_or_default().to_string()
}

fn filled(value: &Option<String>) -> Option<&str> {
    value.as_deref().map(str::trim).filter(|v| !v.is_empty())
}

fn optional_date(
    value: &Option<String>,
    field: &str,
    errors: &mut FormErrors,
) -> Option<NaiveDate> {
    let raw = filled(value)?;
    let parsed = parse_date(raw);
    if parsed.is_none() {
        errors.add(field, "Enter a valid date.");
    }
    parsed
}

fn optional_time(
    value: &Option<String>,
    field: &str,
    errors: &mut FormErrors,
) -> Option<NaiveTime> {
    let raw = filled(value)?;
    let parsed = parse_time(raw);
    if parsed.is_none() {
        errors.add(field, "Enter a valid time.");
    }
    parsed
}

fn validated<T: Validate>(form: &T) -> FormErrors {
    match form.validate() {
        Ok(()) => FormErrors::new(),
        Err(e) => FormErrors::from(e),
    }
}

/// Adds an error to `field` unless every id names a row of `table` owned by
/// `user_id`.
async fn check_owned(
    pool: &Pool<Sqlite>,
    table: &'static str,
    user_id: i64,
    ids: &[i64],
    field: &str,
    errors: &mut FormErrors,
) -> Result<(), AppError> {
    if !all_owned_by(pool, table, user_id, ids).await? {
        errors.add(field, "Select a valid choice.");
    }
    Ok(())
}

fn combine<T>(cleaned: Result<T, FormErrors>, mut errors: FormErrors) -> Result<T, FormErrors> {
    match cleaned {
        Ok(data) => errors.finish(data),
        Err(cleaning_errors) => {
            errors.merge(cleaning_errors);
            Err(errors)
        }
    }
}

/// The `Tak`/`Nie` answer of a confirmation form.
#[derive(FromFormField, Debug, Clone, Copy, PartialEq, Eq)]
pub enum Operation {
    #[field(value = "Tak")]
    Yes,
    #[field(value = "Nie")]
    No,
}

#[derive(FromForm, Debug)]
pub struct ConfirmationForm {
    pub operation: Operation,
}

#[derive(FromForm, Validate, Debug, Default)]
pub struct GoalForm {
    #[validate(length(max = 200, message = "Ensure this value has at most 200 characters."))]
    pub name: Option<String>,
    #[validate(length(max = 200, message = "Ensure this value has at most 200 characters."))]
    pub piece: Option<String>,
    pub pieces: Vec<i64>,
    pub date: Option<String>,
    pub time: Option<String>,
    pub is_concluded: bool,
    pub additional_info: Option<String>,
}

impl GoalForm {
    pub fn clean(&self) -> Result<GoalData, FormErrors> {
        let mut errors = validated(self);

        let data = GoalData {
            name: text(&self.name),
            piece: text(&self.piece),
            piece_ids: self.pieces.clone(),
            date: optional_date(&self.date, "date", &mut errors),
            time: optional_time(&self.time, "time", &mut errors),
            is_concluded: self.is_concluded,
            additional_info: text(&self.additional_info),
        };

        if data.name.is_empty()
            && data.piece.is_empty()
            && data.piece_ids.is_empty()
            && data.additional_info.is_empty()
        {
            for field in ["name", "piece", "pieces", "additional_info"] {
                errors.add(field, AT_LEAST_ONE);
            }
        }

        errors.finish(data)
    }

    /// Cleans the form and checks that the selected pieces belong to `user_id`.
    pub async fn clean_owned(
        &self,
        pool: &Pool<Sqlite>,
        user_id: i64,
    ) -> Result<Result<GoalData, FormErrors>, AppError> {
        let mut errors = FormErrors::new();
        check_owned(pool, "pieces", user_id, &self.pieces, "pieces", &mut errors).await?;
        Ok(combine(self.clean(), errors))
    }
}

#[derive(FromForm, Validate, Debug, Default)]
pub struct PieceForm {
    #[validate(length(max = 200, message = "Ensure this value has at most 200 characters."))]
    pub name_to_display: Option<String>,
    pub composers: Vec<i64>,
    pub goals: Vec<i64>,
    pub is_mastered: bool,
    pub is_archived: bool,
    pub is_cleared: bool,
    pub collection: Option<String>,
    pub style: Option<String>,
    pub genre: Option<String>,
    pub piece_type: Option<String>,
    pub opus: Option<String>,
    pub number: Option<String>,
    pub key: Option<String>,
    pub period: Option<String>,
    #[validate(range(min = 0, message = "Ensure this value is greater than or equal to 0."))]
    pub time_to_master_days: Option<i64>,
}

impl PieceForm {
    pub fn clean(&self) -> Result<PieceData, FormErrors> {
        let mut errors = validated(self);

        let name_to_display = text(&self.name_to_display);
        if name_to_display.is_empty() {
            errors.add("name_to_display", REQUIRED);
        }

        errors.finish(PieceData {
            name_to_display,
            composer_ids: self.composers.clone(),
            goal_ids: self.goals.clone(),
            is_mastered: self.is_mastered,
            is_archived: self.is_archived,
            is_cleared: self.is_cleared,
            information: PieceInformation {
                collection: text(&self.collection),
                style: text(&self.style),
                genre: text(&self.genre),
                piece_type: text(&self.piece_type),
                opus: text(&self.opus),
                number: text(&self.number),
                musical_key: text(&self.key),
                period: text(&self.period),
                time_to_master_days: self.time_to_master_days,
            },
        })
    }

    pub async fn clean_owned(
        &self,
        pool: &Pool<Sqlite>,
        user_id: i64,
    ) -> Result<Result<PieceData, FormErrors>, AppError> {
        let mut errors = FormErrors::new();
        check_owned(pool, "composers", user_id, &self.composers, "composers", &mut errors).await?;
        check_owned(pool, "goals", user_id, &self.goals, "goals", &mut errors).await?;
        Ok(combine(self.clean(), errors))
    }
}

/// Composers and parts are just a name.
#[derive(FromForm, Validate, Debug, Default)]
pub struct NameForm {
    #[validate(length(max = 200, message = "Ensure this value has at most 200 characters."))]
    pub name: Option<String>,
}

impl NameForm {
    pub fn clean(&self) -> Result<String, FormErrors> {
        let mut errors = validated(self);
        let name = text(&self.name);
        if name.is_empty() {
            errors.add("name", REQUIRED);
        }
        errors.finish(name)
    }
}

#[derive(FromForm, Validate, Debug, Default)]
pub struct TaskForm {
    pub goal: Option<i64>,
    pub piece: Option<i64>,
    #[validate(length(max = 200, message = "Ensure this value has at most 200 characters."))]
    pub element: Option<String>,
    #[validate(length(max = 200, message = "Ensure this value has at most 200 characters."))]
    pub method: Option<String>,
    pub parts: Vec<i64>,
    pub is_suggested: bool,
    pub are_suggestions_enabled: bool,
}

impl TaskForm {
    pub fn clean(&self) -> Result<TaskData, FormErrors> {
        let mut errors = validated(self);

        if self.goal.is_none() && self.piece.is_none() {
            errors.add("goal", AT_LEAST_ONE);
            errors.add("piece", AT_LEAST_ONE);
        }

        errors.finish(TaskData {
            goal_id: self.goal,
            piece_id: self.piece,
            element: text(&self.element),
            method: text(&self.method),
            part_ids: self.parts.clone(),
            is_suggested: self.is_suggested,
            are_suggestions_enabled: self.are_suggestions_enabled,
        })
    }

    /// Cleans the form. Referenced goal, piece and parts must belong to
    /// `user_id`.
    pub async fn clean_owned(
        &self,
        pool: &Pool<Sqlite>,
        user_id: i64,
    ) -> Result<Result<TaskData, FormErrors>, AppError> {
        let mut errors = FormErrors::new();
        if let Some(goal_id) = self.goal {
            check_owned(pool, "goals", user_id, &[goal_id], "goal", &mut errors).await?;
        }
        if let Some(piece_id) = self.piece {
            check_owned(pool, "pieces", user_id, &[piece_id], "piece", &mut errors).await?;
        }
        check_owned(pool, "parts", user_id, &self.parts, "parts", &mut errors).await?;
        Ok(combine(self.clean(), errors))
    }
}

#[derive(FromForm, Validate, Debug, Default)]
pub struct PracticeForm {
    pub date: Option<String>,
    pub start_time: Option<String>,
    pub end_time: Option<String>,
    #[validate(range(min = 0, message = "Ensure this value is greater than or equal to 0."))]
    pub repetitions: Option<i64>,
    pub is_summarized: bool,
    pub is_completed: bool,
}

impl PracticeForm {
    pub fn clean(&self) -> Result<PracticeData, FormErrors> {
        let mut errors = validated(self);

        let date = match filled(&self.date) {
            Some(_) => optional_date(&self.date, "date", &mut errors),
            None => {
                errors.add("date", REQUIRED);
                None
            }
        };
        let start_time = optional_time(&self.start_time, "start_time", &mut errors);
        let end_time = optional_time(&self.end_time, "end_time", &mut errors);

        match date {
            Some(date) if errors.is_empty() => Ok(PracticeData {
                date,
                start_time,
                end_time,
                repetitions: self.repetitions.unwrap_or_default(),
                is_summarized: self.is_summarized,
                is_completed: self.is_completed,
            }),
            _ => Err(errors),
        }
    }
}

/// A task, optionally logged together with its first practice.
#[derive(FromForm, Debug, Default)]
pub struct TaskCreateForm {
    pub goal: Option<i64>,
    pub piece: Option<i64>,
    pub element: Option<String>,
    pub method: Option<String>,
    pub parts: Vec<i64>,
    pub is_suggested: bool,
    pub are_suggestions_enabled: bool,
    pub date: Option<String>,
    pub start_time: Option<String>,
    pub end_time: Option<String>,
    pub repetitions: Option<i64>,
    pub is_summarized: bool,
    pub is_completed: bool,
}

impl TaskCreateForm {
    /// Splits into the task and, when a date was given, the practice.
    pub fn split(self) -> (TaskForm, Option<PracticeForm>) {
        let practice = filled(&self.date).is_some().then(|| PracticeForm {
            date: self.date.clone(),
            start_time: self.start_time.clone(),
            end_time: self.end_time.clone(),
            repetitions: self.repetitions,
            is_summarized: self.is_summarized,
            is_completed: self.is_completed,
        });

        let task = TaskForm {
            goal: self.goal,
            piece: self.piece,
            element: self.element,
            method: self.method,
            parts: self.parts,
            is_suggested: self.is_suggested,
            are_suggestions_enabled: self.are_suggestions_enabled,
        };

        (task, practice)
    }
}

#[derive(FromForm, Validate, Debug, Default)]
pub struct ChallengeForm {
    pub start_date: Option<String>,
    #[validate(range(min = 0, message = "Ensure this value is greater than or equal to 0."))]
    pub minimum_number_of_days: Option<i64>,
    #[validate(range(min = 0, message = "Ensure this value is greater than or equal to 0."))]
    pub minimum_number_of_repetitions: Option<i64>,
    #[validate(range(min = 0, message = "Ensure this value is greater than or equal to 0."))]
    pub minimum_total_repetitions: Option<i64>,
    pub is_completed: bool,
}

impl ChallengeForm {
    pub fn clean(&self) -> Result<ChallengeData, FormErrors> {
        let mut errors = validated(self);
        let start_date = optional_date(&self.start_date, "start_date", &mut errors);

        errors.finish(ChallengeData {
            start_date,
            minimum_number_of_days: self.minimum_number_of_days.unwrap_or_default(),
            minimum_number_of_repetitions: self.minimum_number_of_repetitions.unwrap_or_default(),
            minimum_total_repetitions: self.minimum_total_repetitions.unwrap_or_default(),
            is_completed: self.is_completed,
        })
    }
}

/// A challenge together with the task it is about.
#[derive(FromForm, Debug, Default)]
pub struct ChallengeCreateForm {
    pub goal: Option<i64>,
    pub piece: Option<i64>,
    pub element: Option<String>,
    pub method: Option<String>,
    pub parts: Vec<i64>,
    pub start_date: Option<String>,
    pub minimum_number_of_days: Option<i64>,
    pub minimum_number_of_repetitions: Option<i64>,
    pub minimum_total_repetitions: Option<i64>,
    pub is_completed: bool,
}

impl ChallengeCreateForm {
    pub fn split(self) -> (TaskForm, ChallengeForm) {
        let task = TaskForm {
            goal: self.goal,
            piece: self.piece,
            element: self.element,
            method: self.method,
            parts: self.parts,
            ..TaskForm::default()
        };
        let challenge = ChallengeForm {
            start_date: self.start_date,
            minimum_number_of_days: self.minimum_number_of_days,
            minimum_number_of_repetitions: self.minimum_number_of_repetitions,
            minimum_total_repetitions: self.minimum_total_repetitions,
            is_completed: self.is_completed,
        };
        (task, challenge)
    }
}

#[derive(FromForm, Validate, Debug)]
pub struct RegisterForm {
    #[validate(
        length(min = 3, max = 150, message = "Username must be between 3 and 150 characters."),
        regex(
            path = *USERNAME_REGEX,
            message = "Username may contain only letters, digits and @.+-_"
        )
    )]
    pub username: String,
    #[validate(length(min = 8, message = "Password must be at least 8 characters long."))]
    pub password1: String,
    #[validate(must_match(other = "password1", message = "The two password fields didn't match."))]
    pub password2: String,
    pub email: Option<String>,
}

impl RegisterForm {
    /// Returns the e-mail address to store, if any.
    pub fn clean(&self) -> Result<Option<String>, FormErrors> {
        let mut errors = validated(self);
        let email = filled(&self.email).map(str::to_string);
        if let Some(email) = &email {
            if !email.validate_email() {
                errors.add("email", "Enter a valid email address.");
            }
        }
        errors.finish(email)
    }
}

#[derive(FromForm, Debug)]
pub struct LoginForm {
    pub username: String,
    pub password: String,
}

#[derive(FromForm, Validate, Debug, Default)]
pub struct AccountForm {
    #[validate(length(max = 150, message = "Ensure this value has at most 150 characters."))]
    pub first_name: Option<String>,
    #[validate(length(max = 150, message = "Ensure this value has at most 150 characters."))]
    pub last_name: Option<String>,
    pub email: Option<String>,
}

/// Cleaned account details: first name, last name and optional e-mail.
pub type AccountData = (String, String, Option<String>);

impl AccountForm {
    pub fn clean(&self) -> Result<AccountData, FormErrors> {
        let mut errors = validated(self);
        let email = filled(&self.email).map(str::to_string);
        if let Some(email) = &email {
            if !email.validate_email() {
                errors.add("email", "Enter a valid email address.");
            }
        }
        errors.finish((text(&self.first_name), text(&self.last_name), email))
    }
}

#[derive(FromForm, Validate, Debug, Default)]
pub struct InvitationForm {
    #[validate(length(max = 50, message = "Ensure this value has at most 50 characters."))]
    pub invited: Option<String>,
    pub inviting: Option<String>,
    pub invitation_type: Option<String>,
}

impl InvitationForm {
    /// Returns the invited username and the role the signed-in account takes.
    /// `inviting`, when sent, must name the signed-in account.
    pub fn clean(&self, signed_in: &str) -> Result<(String, ProfileRole), FormErrors> {
        let mut errors = validated(self);

        let role = ProfileRole::from_str(filled(&self.invitation_type).unwrap_or_default());
        let tampered = role.is_err()
            || filled(&self.inviting).is_some_and(|inviting| inviting != signed_in);
        if tampered {
            errors.add(NON_FIELD_ERRORS, TAMPERED);
        }

        let invited = text(&self.invited);
        if invited.is_empty() {
            errors.add("invited", REQUIRED);
        }

        match role {
            Ok(role) => errors.finish((invited, role)),
            Err(_) => Err(errors),
        }
    }
}
