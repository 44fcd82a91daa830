use sqlx::{Pool, Sqlite, SqliteConnection};
use tracing::{info, instrument};

use crate::error::AppError;
use crate::models::{Composer, DbPiece, Piece, PieceData, PieceInformation};

const PIECE_SELECT: &str =
    "SELECT id, user_id, name_to_display, is_mastered, is_archived, is_cleared FROM pieces";

async fn load_relations(pool: &Pool<Sqlite>, row: DbPiece) -> Result<Piece, AppError> {
    let mut piece = Piece::from(row);

    piece.composers = sqlx::query_as::<_, Composer>(
        "SELECT c.id, c.user_id, c.name
         FROM composers c
         JOIN piece_composers pc ON pc.composer_id = c.id
         WHERE pc.piece_id = ?
         ORDER BY c.name",
    )
    .bind(piece.id)
    .fetch_all(pool)
    .await?;

    piece.goal_ids =
        sqlx::query_scalar("SELECT goal_id FROM goal_pieces WHERE piece_id = ? ORDER BY goal_id")
            .bind(piece.id)
            .fetch_all(pool)
            .await?;

    piece.information = sqlx::query_as::<_, PieceInformation>(
        "SELECT collection, style, genre, piece_type, opus, number, musical_key, period,
                time_to_master_days
         FROM piece_information WHERE piece_id = ?",
    )
    .bind(piece.id)
    .fetch_optional(pool)
    .await?;

    Ok(piece)
}

async fn write_relations_in(
    conn: &mut SqliteConnection,
    piece_id: i64,
    data: &PieceData,
) -> Result<(), AppError> {
    sqlx::query("DELETE FROM piece_composers WHERE piece_id = ?")
        .bind(piece_id)
        .execute(&mut *conn)
        .await?;
    for composer_id in &data.composer_ids {
        sqlx::query("INSERT OR IGNORE INTO piece_composers (piece_id, composer_id) VALUES (?, ?)")
            .bind(piece_id)
            .bind(composer_id)
            .execute(&mut *conn)
            .await?;
    }

    sqlx::query("DELETE FROM goal_pieces WHERE piece_id = ?")
        .bind(piece_id)
        .execute(&mut *conn)
        .await?;
    for goal_id in &data.goal_ids {
        sqlx::query("INSERT OR IGNORE INTO goal_pieces (goal_id, piece_id) VALUES (?, ?)")
            .bind(goal_id)
            .bind(piece_id)
            .execute(&mut *conn)
            .await?;
    }

    let info = &data.information;
    if info.is_empty() {
        sqlx::query("DELETE FROM piece_information WHERE piece_id = ?")
            .bind(piece_id)
            .execute(&mut *conn)
            .await?;
    } else {
        sqlx::query(
            "INSERT INTO piece_information
                (piece_id, collection, style, genre, piece_type, opus, number, musical_key,
                 period, time_to_master_days)
             VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
             ON CONFLICT(piece_id) DO UPDATE SET
                collection = excluded.collection,
                style = excluded.style,
                genre = excluded.genre,
                piece_type = excluded.piece_type,
                opus = excluded.opus,
                number = excluded.number,
                musical_key = excluded.musical_key,
                period = excluded.period,
                time_to_master_days = excluded.time_to_master_days",
        )
        .bind(piece_id)
        .bind(&info.collection)
        .bind(&info.style)
        .bind(&info.genre)
        .bind(&info.piece_type)
        .bind(&info.opus)
        .bind(&info.number)
        .bind(&info.musical_key)
        .bind(&info.period)
        .bind(info.time_to_master_days)
        .execute(&mut *conn)
        .await?;
    }

    Ok(())
}

#[instrument(skip(pool))]
pub async fn get_pieces(pool: &Pool<Sqlite>, user_id: i64) -> Result<Vec<Piece>, AppError> {
    info!("Fetching pieces of user");
    let rows = sqlx::query_as::<_, DbPiece>(&format!(
        "{} WHERE user_id = ? ORDER BY name_to_display, id",
        PIECE_SELECT
    ))
    .bind(user_id)
    .fetch_all(pool)
    .await?;

    let mut pieces = Vec::with_capacity(rows.len());
    for row in rows {
        pieces.push(load_relations(pool, row).await?);
    }
    Ok(pieces)
}

#[instrument(skip(pool))]
pub async fn get_piece(
    pool: &Pool<Sqlite>,
    user_id: i64,
    piece_id: i64,
) -> Result<Piece, AppError> {
    info!("Fetching piece");
    let row = sqlx::query_as::<_, DbPiece>(&format!(
        "{} WHERE id = ? AND user_id = ?",
        PIECE_SELECT
    ))
    .bind(piece_id)
    .bind(user_id)
    .fetch_optional(pool)
    .await?;

    match row {
        Some(row) => load_relations(pool, row).await,
        _ => Err(AppError::not_found("Piece", piece_id)),
    }
}

#[instrument(skip(pool))]
pub async fn create_piece(
    pool: &Pool<Sqlite>,
    user_id: i64,
    data: &PieceData,
) -> Result<i64, AppError> {
    info!("Creating piece");
    let mut tx = pool.begin().await?;

    let res = sqlx::query(
        "INSERT INTO pieces (user_id, name_to_display, is_mastered, is_archived, is_cleared)
         VALUES (?, ?, ?, ?, ?)",
    )
    .bind(user_id)
    .bind(&data.name_to_display)
    .bind(data.is_mastered)
    .bind(data.is_archived)
    .bind(data.is_cleared)
    .execute(&mut *tx)
    .await?;

    let piece_id = res.last_insert_rowid();
    write_relations_in(&mut tx, piece_id, data).await?;

    tx.commit().await?;
    Ok(piece_id)
}

#[instrument(skip(pool))]
pub async fn update_piece(
    pool: &Pool<Sqlite>,
    user_id: i64,
    piece_id: i64,
    data: &PieceData,
) -> Result<(), AppError> {
    info!("Updating piece");
    let mut tx = pool.begin().await?;

    let res = sqlx::query(
        "UPDATE pieces SET name_to_display = ?, is_mastered = ?, is_archived = ?, is_cleared = ?
         WHERE id = ? AND user_id = ?",
    )
    .bind(&data.name_to_display)
    .bind(data.is_mastered)
    .bind(data.is_archived)
    .bind(data.is_cleared)
    .bind(piece_id)
    .bind(user_id)
    .execute(&mut *tx)
    .await?;

    if res.rows_affected() == 0 {
        return Err(AppError::not_found("Piece", piece_id));
    }

    write_relations_in(&mut tx, piece_id, data).await?;

    tx.commit().await?;
    Ok(())
}

#[instrument(skip(pool))]
pub async fn delete_piece(
    pool: &Pool<Sqlite>,
    user_id: i64,
    piece_id: i64,
) -> Result<(), AppError> {
    info!("Deleting piece");
    let res = sqlx::query("DELETE FROM pieces WHERE id = ? AND user_id = ?")
        .bind(piece_id)
        .bind(user_id)
        .execute(pool)
        .await?;

    if res.rows_affected() == 0 {
        return Err(AppError::not_found("Piece", piece_id));
    }

    Ok(())
}

#[instrument(skip(pool))]
pub async fn get_composers(pool: &Pool<Sqlite>, user_id: i64) -> Result<Vec<Composer>, AppError> {
    info!("Fetching composers of user");
    let rows = sqlx::query_as::<_, Composer>(
        "SELECT id, user_id, name FROM composers WHERE user_id = ? ORDER BY name",
    )
    .bind(user_id)
    .fetch_all(pool)
    .await?;

    Ok(rows)
}

#[instrument(skip(pool))]
pub async fn create_composer(
    pool: &Pool<Sqlite>,
    user_id: i64,
    name: &str,
) -> Result<i64, AppError> {
    info!("Creating composer");
    let res = sqlx::query("INSERT INTO composers (user_id, name) VALUES (?, ?)")
        .bind(user_id)
        .bind(name)
        .execute(pool)
        .await?;

    Ok(res.last_insert_rowid())
}
