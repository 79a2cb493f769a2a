use anyhow::Result;
use sqlx::{SqlitePool, sqlite::SqliteConnectOptions};
use std::str::FromStr;
use tracing::info;

pub async fn init_db(database_url: &str) -> Result<SqlitePool> {
    let options = SqliteConnectOptions::from_str(database_url)?.create_if_missing(true);
    let pool = SqlitePool::connect_with(options).await?;
    run_migrations(&pool).await?;
    Ok(pool)
}

pub async fn run_migrations(pool: &SqlitePool) -> Result<()> {
    info!("Running database migrations...");

    create_users_table(pool).await?;
    create_refresh_tokens_table(pool).await?;
    create_attendance_records_table(pool).await?;

    info!("Database migrations completed");
    Ok(())
}

async fn create_users_table(pool: &SqlitePool) -> Result<()> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS users (
            id INTEGER PRIMARY KEY,
            username TEXT UNIQUE NOT NULL,
            password TEXT NOT NULL,
            display_name TEXT,
            timezone TEXT,
            default_work_duration_minutes INTEGER NOT NULL DEFAULT 480,
            is_active BOOLEAN NOT NULL DEFAULT TRUE,
            created_at DATETIME DEFAULT CURRENT_TIMESTAMP,
            last_login_at DATETIME
        )
        "#,
    )
    .execute(pool)
    .await?;

    Ok(())
}

async fn create_refresh_tokens_table(pool: &SqlitePool) -> Result<()> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS refresh_tokens (
            id INTEGER PRIMARY KEY,
            user_id INTEGER NOT NULL,
            jti TEXT UNIQUE NOT NULL,
            expires_at DATETIME NOT NULL,
            revoked BOOLEAN NOT NULL DEFAULT FALSE,
            created_at DATETIME DEFAULT CURRENT_TIMESTAMP,
            FOREIGN KEY (user_id) REFERENCES users (id)
        )
        "#,
    )
    .execute(pool)
    .await?;

    Ok(())
}

async fn create_attendance_records_table(pool: &SqlitePool) -> Result<()> {
    // UNIQUE(user_id, date) is the enforcement point for one record per
    // attendance day; a racing second check-in loses here.
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS attendance_records (
            id INTEGER PRIMARY KEY,
            user_id INTEGER NOT NULL,
            date TEXT NOT NULL,
            check_in_at DATETIME NOT NULL,
            computed_check_out_at DATETIME NOT NULL,
            check_out_at DATETIME,
            manual_check_out_at DATETIME,
            is_checked_out BOOLEAN NOT NULL DEFAULT FALSE,
            note TEXT,
            created_at DATETIME DEFAULT CURRENT_TIMESTAMP,
            updated_at DATETIME DEFAULT CURRENT_TIMESTAMP,
            FOREIGN KEY (user_id) REFERENCES users (id),
            UNIQUE (user_id, date)
        )
        "#,
    )
    .execute(pool)
    .await?;

    Ok(())
}
