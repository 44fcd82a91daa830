use rocket::State;
use rocket::serde::json::Json;
use sqlx::{Pool, Sqlite};

use crate::auth::{Access, User, authorize};
use crate::calendar::{DayView, MonthView, YearView, day_view, month_view, year_view};
use crate::validation::{ApiError, AppErrorExt};

// Ranked below every `/<username>/<resource>/...` route.

#[get("/<username>/<year>", rank = 3)]
pub async fn calendar_year(
    username: &str,
    year: i32,
    user: User,
    db: &State<Pool<Sqlite>>,
) -> Result<Json<YearView>, ApiError> {
    let owner = authorize(db, &user, username, Access::OwnerOrTeacher)
        .await
        .validate_custom()?;

    Ok(Json(year_view(db, owner.id, year).await.validate_custom()?))
}

#[get("/<username>/<year>/<month>", rank = 3)]
pub async fn calendar_month(
    username: &str,
    year: i32,
    month: u32,
    user: User,
    db: &State<Pool<Sqlite>>,
) -> Result<Json<MonthView>, ApiError> {
    let owner = authorize(db, &user, username, Access::OwnerOrTeacher)
        .await
        .validate_custom()?;

    Ok(Json(
        month_view(db, owner.id, year, month)
            .await
            .validate_custom()?,
    ))
}

#[get("/<username>/<year>/<month>/<day>", rank = 3)]
pub async fn calendar_day(
    username: &str,
    year: i32,
    month: u32,
    day: u32,
    user: User,
    db: &State<Pool<Sqlite>>,
) -> Result<Json<DayView>, ApiError> {
    let owner = authorize(db, &user, username, Access::OwnerOrTeacher)
        .await
        .validate_custom()?;

    Ok(Json(
        day_view(db, owner.id, year, month, day)
            .await
            .validate_custom()?,
    ))
}

pub fn routes() -> Vec<rocket::Route> {
    routes![calendar_year, calendar_month, calendar_day]
}
