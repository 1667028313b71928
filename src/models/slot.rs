use chrono::{Duration, NaiveDateTime};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

use crate::database::{from_db_datetime, to_db_datetime, Database};

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Slot {
    pub id: i64,
    pub datetime: String,
    pub photographer_id: Option<i64>,
}

/// A slot with no booking, joined with its photographer's username.
#[derive(Debug, Clone, FromRow)]
pub struct FreeSlot {
    pub id: i64,
    pub datetime: String,
    pub photographer_username: Option<String>,
}

impl FreeSlot {
    pub fn scheduled_at(&self) -> Option<NaiveDateTime> {
        from_db_datetime(&self.datetime)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeleteSlotOutcome {
    Deleted,
    NotFound,
    Booked,
}

impl Slot {
    /// Returns false when a slot with the same timestamp already exists.
    pub async fn add(
        db: &Database,
        dt: NaiveDateTime,
        photographer_id: Option<i64>,
    ) -> Result<bool, sqlx::Error> {
        let result = sqlx::query("INSERT OR IGNORE INTO slots(datetime, photographer_id) VALUES (?, ?)")
            .bind(to_db_datetime(dt))
            .bind(photographer_id)
            .execute(&db.pool)
            .await?;

        Ok(result.rows_affected() > 0)
    }

    pub async fn id_at(db: &Database, dt: NaiveDateTime) -> Result<Option<i64>, sqlx::Error> {
        sqlx::query_scalar("SELECT id FROM slots WHERE datetime = ?")
            .bind(to_db_datetime(dt))
            .fetch_optional(&db.pool)
            .await
    }

    /// A slot can only be deleted while unbooked; the timestamp is immutable,
    /// so deletion and photographer assignment are the only mutations.
    pub async fn delete(db: &Database, dt: NaiveDateTime) -> Result<DeleteSlotOutcome, sqlx::Error> {
        let Some(slot_id) = Slot::id_at(db, dt).await? else {
            return Ok(DeleteSlotOutcome::NotFound);
        };

        let booked: Option<i64> = sqlx::query_scalar("SELECT 1 FROM bookings WHERE slot_id = ?")
            .bind(slot_id)
            .fetch_optional(&db.pool)
            .await?;
        if booked.is_some() {
            return Ok(DeleteSlotOutcome::Booked);
        }

        sqlx::query("DELETE FROM slots WHERE id = ?")
            .bind(slot_id)
            .execute(&db.pool)
            .await?;

        Ok(DeleteSlotOutcome::Deleted)
    }

    /// Free slots inside the booking horizon, ordered by timestamp.
    pub async fn free_within(
        db: &Database,
        from: NaiveDateTime,
        days_ahead: i64,
    ) -> Result<Vec<FreeSlot>, sqlx::Error> {
        let until = from + Duration::days(days_ahead);

        sqlx::query_as::<_, FreeSlot>(
            r#"
            SELECT s.id, s.datetime, p.username AS photographer_username
            FROM slots s
            LEFT JOIN bookings b ON s.id = b.slot_id
            LEFT JOIN photographers p ON s.photographer_id = p.id
            WHERE b.slot_id IS NULL AND s.datetime >= ? AND s.datetime <= ?
            ORDER BY s.datetime
            "#,
        )
        .bind(to_db_datetime(from))
        .bind(to_db_datetime(until))
        .fetch_all(&db.pool)
        .await
    }

    /// Sets (or replaces) the photographer on an existing slot.
    pub async fn assign_photographer(
        db: &Database,
        slot_id: i64,
        photographer_id: i64,
    ) -> Result<(), sqlx::Error> {
        sqlx::query("UPDATE slots SET photographer_id = ? WHERE id = ?")
            .bind(photographer_id)
            .bind(slot_id)
            .execute(&db.pool)
            .await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn dt(day: u32, hour: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2025, 5, day)
            .unwrap()
            .and_hms_opt(hour, 0, 0)
            .unwrap()
    }

    #[tokio::test]
    async fn add_rejects_duplicate_timestamp() {
        let db = Database::in_memory().await.unwrap();

        assert!(Slot::add(&db, dt(1, 10), None).await.unwrap());
        assert!(!Slot::add(&db, dt(1, 10), None).await.unwrap());
    }

    #[tokio::test]
    async fn delete_unbooked_succeeds_and_missing_reports_not_found() {
        let db = Database::in_memory().await.unwrap();

        Slot::add(&db, dt(1, 10), None).await.unwrap();
        assert_eq!(Slot::delete(&db, dt(1, 10)).await.unwrap(), DeleteSlotOutcome::Deleted);
        assert_eq!(Slot::delete(&db, dt(1, 10)).await.unwrap(), DeleteSlotOutcome::NotFound);
    }

    #[tokio::test]
    async fn delete_booked_slot_is_refused() {
        let db = Database::in_memory().await.unwrap();

        Slot::add(&db, dt(1, 10), None).await.unwrap();
        let slots = Slot::free_within(&db, dt(1, 0), 30).await.unwrap();
        sqlx::query("INSERT INTO bookings (slot_id, user_id, name, contact, shoot_type) VALUES (?, 1, 'Anna', '+79990001111', 'portrait')")
            .bind(slots[0].id)
            .execute(&db.pool)
            .await
            .unwrap();

        assert_eq!(Slot::delete(&db, dt(1, 10)).await.unwrap(), DeleteSlotOutcome::Booked);

        let remaining: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM bookings")
            .fetch_one(&db.pool)
            .await
            .unwrap();
        assert_eq!(remaining, 1);
    }

    #[tokio::test]
    async fn assign_photographer_updates_existing_slot() {
        let db = Database::in_memory().await.unwrap();

        Slot::add(&db, dt(1, 10), None).await.unwrap();
        let slot_id = Slot::id_at(&db, dt(1, 10)).await.unwrap().unwrap();
        assert!(Slot::id_at(&db, dt(1, 11)).await.unwrap().is_none());

        crate::models::Photographer::add(&db, 555, "lena_photo", "").await.unwrap();
        let photographer = crate::models::Photographer::by_username(&db, "lena_photo")
            .await
            .unwrap()
            .unwrap();

        Slot::assign_photographer(&db, slot_id, photographer.id).await.unwrap();

        let free = Slot::free_within(&db, dt(1, 0), 7).await.unwrap();
        assert_eq!(free[0].photographer_username.as_deref(), Some("lena_photo"));
    }

    #[tokio::test]
    async fn free_within_hides_booked_and_out_of_horizon_slots() {
        let db = Database::in_memory().await.unwrap();

        Slot::add(&db, dt(1, 10), None).await.unwrap();
        Slot::add(&db, dt(2, 11), None).await.unwrap();
        Slot::add(&db, dt(31, 12), None).await.unwrap(); // outside a 7-day horizon

        let free = Slot::free_within(&db, dt(1, 0), 7).await.unwrap();
        assert_eq!(free.len(), 2);

        sqlx::query("INSERT INTO bookings (slot_id, user_id, name, contact, shoot_type) VALUES (?, 1, 'Anna', '+79990001111', 'portrait')")
            .bind(free[0].id)
            .execute(&db.pool)
            .await
            .unwrap();

        let free = Slot::free_within(&db, dt(1, 0), 7).await.unwrap();
        assert_eq!(free.len(), 1);
        assert_eq!(free[0].datetime, "2025-05-02 11:00:00");
    }
}
