use sqlx::SqliteConnection;

use crate::db_types::{NewUser, User};

pub async fn insert_user(user: NewUser, conn: &mut SqliteConnection) -> Result<User, sqlx::Error> {
    let user = sqlx::query_as(
        "INSERT INTO users (email, business_name, password_hash) VALUES ($1, $2, $3) RETURNING *",
    )
    .bind(user.email.trim())
    .bind(user.business_name)
    .bind(user.password_hash)
    .fetch_one(conn)
    .await?;
    Ok(user)
}

pub async fn fetch_user_by_id(id: i64, conn: &mut SqliteConnection) -> Result<Option<User>, sqlx::Error> {
    let user = sqlx::query_as("SELECT * FROM users WHERE id = $1").bind(id).fetch_optional(conn).await?;
    Ok(user)
}

/// The `email` column is declared `COLLATE NOCASE`, so this comparison ignores case.
pub async fn fetch_user_by_email(email: &str, conn: &mut SqliteConnection) -> Result<Option<User>, sqlx::Error> {
    let user =
        sqlx::query_as("SELECT * FROM users WHERE email = $1").bind(email.trim()).fetch_optional(conn).await?;
    Ok(user)
}
