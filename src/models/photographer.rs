use serde::{Deserialize, Serialize};
use sqlx::FromRow;

use crate::database::Database;

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Photographer {
    pub id: i64,
    pub user_id: i64,
    pub username: String,
    pub specialties: String,
}

impl Photographer {
    pub async fn all(db: &Database) -> Result<Vec<Photographer>, sqlx::Error> {
        sqlx::query_as::<_, Photographer>(
            "SELECT id, user_id, username, specialties FROM photographers ORDER BY id",
        )
        .fetch_all(&db.pool)
        .await
    }

    pub async fn add(
        db: &Database,
        user_id: i64,
        username: &str,
        specialties: &str,
    ) -> Result<(), sqlx::Error> {
        sqlx::query("INSERT INTO photographers (user_id, username, specialties) VALUES (?, ?, ?)")
            .bind(user_id)
            .bind(username)
            .bind(specialties)
            .execute(&db.pool)
            .await?;
        Ok(())
    }

    pub async fn by_username(
        db: &Database,
        username: &str,
    ) -> Result<Option<Photographer>, sqlx::Error> {
        sqlx::query_as::<_, Photographer>(
            "SELECT id, user_id, username, specialties FROM photographers WHERE username = ?",
        )
        .bind(username)
        .fetch_optional(&db.pool)
        .await
    }

    /// The photographer assigned to a slot, if any.
    pub async fn for_slot(db: &Database, slot_id: i64) -> Result<Option<Photographer>, sqlx::Error> {
        sqlx::query_as::<_, Photographer>(
            r#"
            SELECT p.id, p.user_id, p.username, p.specialties
            FROM slots s
            JOIN photographers p ON s.photographer_id = p.id
            WHERE s.id = ?
            "#,
        )
        .bind(slot_id)
        .fetch_optional(&db.pool)
        .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Slot;
    use chrono::NaiveDate;

    #[tokio::test]
    async fn for_slot_resolves_assignment() {
        let db = Database::in_memory().await.unwrap();

        Photographer::add(&db, 555, "lena_photo", "portraits").await.unwrap();
        let photographer = Photographer::by_username(&db, "lena_photo").await.unwrap().unwrap();
        assert!(Photographer::by_username(&db, "nobody").await.unwrap().is_none());

        let day = NaiveDate::from_ymd_opt(2025, 5, 1).unwrap();
        Slot::add(&db, day.and_hms_opt(10, 0, 0).unwrap(), None).await.unwrap();
        Slot::add(&db, day.and_hms_opt(12, 0, 0).unwrap(), Some(photographer.id))
            .await
            .unwrap();

        let slot_ids: Vec<i64> = sqlx::query_scalar("SELECT id FROM slots ORDER BY datetime")
            .fetch_all(&db.pool)
            .await
            .unwrap();

        assert!(Photographer::for_slot(&db, slot_ids[0]).await.unwrap().is_none());
        let assigned = Photographer::for_slot(&db, slot_ids[1]).await.unwrap().unwrap();
        assert_eq!(assigned.username, "lena_photo");
    }
}
