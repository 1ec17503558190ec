//! Settings database queries
//!
//! The table holds exactly one row (id = 1).

use anyhow::Result;
use sqlx::PgPool;

use crate::types::Settings;

/// Load settings, falling back to defaults when the row is missing
pub async fn get_settings(pool: &PgPool) -> Result<Settings> {
    let settings = sqlx::query_as::<_, Settings>(
        "SELECT start_hour, page_title FROM settings WHERE id = 1",
    )
    .fetch_optional(pool)
    .await?;

    Ok(settings.unwrap_or_default())
}

/// Replace the settings row (last write wins)
pub async fn save_settings(pool: &PgPool, start_hour: f64, page_title: &str) -> Result<Settings> {
    let settings = sqlx::query_as::<_, Settings>(
        r#"
        INSERT INTO settings (id, start_hour, page_title)
        VALUES (1, $1, $2)
        ON CONFLICT (id) DO UPDATE SET
            start_hour = EXCLUDED.start_hour,
            page_title = EXCLUDED.page_title
        RETURNING start_hour, page_title
        "#,
    )
    .bind(start_hour)
    .bind(page_title.trim())
    .fetch_one(pool)
    .await?;

    Ok(settings)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    #[ignore] // requires PostgreSQL
    async fn test_save_twice_leaves_one_row() {
        let url = std::env::var("DATABASE_URL").expect("DATABASE_URL must be set for DB tests");
        let pool = crate::db::create_pool(&url).await.unwrap();
        crate::db::run_migrations(&pool).await.unwrap();

        save_settings(&pool, 8.5, "Poranne").await.unwrap();
        let saved = save_settings(&pool, 11.0, "Transporty").await.unwrap();
        assert_eq!(saved.start_hour, 11.0);

        let rows: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM settings")
            .fetch_one(&pool)
            .await
            .unwrap();
        assert_eq!(rows, 1);

        let loaded = get_settings(&pool).await.unwrap();
        assert_eq!(loaded.start_hour, 11.0);
        assert_eq!(loaded.page_title, "Transporty");
    }
}
