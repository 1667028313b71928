use serde::{Deserialize, Serialize};
use sqlx::FromRow;

use crate::database::Database;

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Feedback {
    pub id: i64,
    pub user_id: i64,
    pub user_name: String,
    pub text: String,
    pub photo_id: Option<String>,
    pub rating: Option<i64>,
    pub created_at: String,
}

impl Feedback {
    /// Stores the feedback and returns true when this submission pushed the
    /// user's review count over the discount threshold.
    pub async fn add(
        db: &Database,
        user_id: i64,
        user_name: &str,
        text: &str,
        photo_id: Option<&str>,
        rating: Option<i64>,
        discount_threshold: i64,
    ) -> Result<bool, sqlx::Error> {
        sqlx::query(
            "INSERT INTO feedback (user_id, user_name, text, photo_id, rating) VALUES (?, ?, ?, ?, ?)",
        )
        .bind(user_id)
        .bind(user_name)
        .bind(text)
        .bind(photo_id)
        .bind(rating)
        .execute(&db.pool)
        .await?;

        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM feedback WHERE user_id = ?")
            .bind(user_id)
            .fetch_one(&db.pool)
            .await?;

        if count >= discount_threshold {
            sqlx::query(
                r#"
                INSERT INTO user_settings (user_id, discount_eligible) VALUES (?, 1)
                ON CONFLICT(user_id) DO UPDATE SET discount_eligible = 1
                "#,
            )
            .bind(user_id)
            .execute(&db.pool)
            .await?;
            return Ok(count == discount_threshold);
        }

        Ok(false)
    }

    /// The `offset`-th feedback entry, newest first. None past the end.
    pub async fn nth(db: &Database, offset: i64) -> Result<Option<Feedback>, sqlx::Error> {
        sqlx::query_as::<_, Feedback>(
            "SELECT id, user_id, user_name, text, photo_id, rating, created_at
             FROM feedback ORDER BY created_at DESC, id DESC LIMIT 1 OFFSET ?",
        )
        .bind(offset)
        .fetch_optional(&db.pool)
        .await
    }
}
