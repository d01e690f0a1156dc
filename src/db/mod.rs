pub mod models;
pub mod repo;

use sqlx::{sqlite::SqlitePoolOptions, SqlitePool};

/// Open the pool and make sure the schema exists.
pub async fn connect(db_url: &str, max_connections: u32) -> Result<SqlitePool, sqlx::Error> {
    let pool = SqlitePoolOptions::new()
        .max_connections(max_connections)
        .connect(db_url)
        .await?;

    repo::create_user_table(&pool).await?;

    Ok(pool)
}
