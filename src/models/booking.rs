use chrono::{Duration, NaiveDateTime};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

use crate::database::{to_db_datetime, Database};

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Booking {
    pub id: i64,
    pub slot_id: i64,
    pub user_id: i64,
    pub name: String,
    pub contact: String,
    pub shoot_type: String,
    pub reminder_sent: i64,
    pub review_requested: i64,
    pub created_at: String,
}

/// A user's booking joined with its slot and photographer, for /mybooking.
#[derive(Debug, Clone, FromRow)]
pub struct BookingView {
    pub datetime: String,
    pub name: String,
    pub contact: String,
    pub shoot_type: String,
    pub photographer: Option<String>,
}

/// Read-only listing row for the export consumer, slot-timestamp ordered.
#[derive(Debug, Clone, FromRow)]
pub struct ExportRow {
    pub datetime: String,
    pub name: String,
    pub contact: String,
    pub shoot_type: String,
    pub created_at: String,
    pub photographer: Option<String>,
}

/// Booking due a reminder: slot within the next 24 hours, reminder not yet sent.
#[derive(Debug, Clone, FromRow)]
pub struct DueReminder {
    pub id: i64,
    pub user_id: i64,
    pub datetime: String,
    pub name: String,
    pub contact: String,
}

/// Booking whose appointment finished at least 24 hours ago, review not yet requested.
#[derive(Debug, Clone, FromRow)]
pub struct ReviewPrompt {
    pub id: i64,
    pub user_id: i64,
}

#[derive(Debug, Clone, Copy)]
pub struct Stats {
    pub total: i64,
    pub last_week: i64,
    pub free_slots: i64,
    pub avg_rating: f64,
}

impl Booking {
    pub async fn upcoming_for_user(
        db: &Database,
        user_id: i64,
        now: NaiveDateTime,
    ) -> Result<Option<BookingView>, sqlx::Error> {
        sqlx::query_as::<_, BookingView>(
            r#"
            SELECT s.datetime, b.name, b.contact, b.shoot_type, p.username AS photographer
            FROM bookings b
            JOIN slots s ON b.slot_id = s.id
            LEFT JOIN photographers p ON s.photographer_id = p.id
            WHERE b.user_id = ? AND s.datetime >= ?
            ORDER BY s.datetime LIMIT 1
            "#,
        )
        .bind(user_id)
        .bind(to_db_datetime(now))
        .fetch_optional(&db.pool)
        .await
    }

    pub async fn export_rows(db: &Database) -> Result<Vec<ExportRow>, sqlx::Error> {
        sqlx::query_as::<_, ExportRow>(
            r#"
            SELECT s.datetime, b.name, b.contact, b.shoot_type, b.created_at,
                   p.username AS photographer
            FROM bookings b
            JOIN slots s ON b.slot_id = s.id
            LEFT JOIN photographers p ON s.photographer_id = p.id
            ORDER BY s.datetime
            "#,
        )
        .fetch_all(&db.pool)
        .await
    }

    pub async fn due_reminders(
        db: &Database,
        now: NaiveDateTime,
    ) -> Result<Vec<DueReminder>, sqlx::Error> {
        let until = now + Duration::hours(24);

        sqlx::query_as::<_, DueReminder>(
            r#"
            SELECT b.id, b.user_id, s.datetime, b.name, b.contact
            FROM bookings b
            JOIN slots s ON b.slot_id = s.id
            WHERE b.reminder_sent = 0 AND s.datetime BETWEEN ? AND ?
            "#,
        )
        .bind(to_db_datetime(now))
        .bind(to_db_datetime(until))
        .fetch_all(&db.pool)
        .await
    }

    pub async fn mark_reminder_sent(db: &Database, booking_id: i64) -> Result<(), sqlx::Error> {
        sqlx::query("UPDATE bookings SET reminder_sent = 1 WHERE id = ?")
            .bind(booking_id)
            .execute(&db.pool)
            .await?;
        Ok(())
    }

    pub async fn due_review_prompts(
        db: &Database,
        now: NaiveDateTime,
    ) -> Result<Vec<ReviewPrompt>, sqlx::Error> {
        let cutoff = now - Duration::hours(24);

        sqlx::query_as::<_, ReviewPrompt>(
            r#"
            SELECT b.id, b.user_id
            FROM bookings b
            JOIN slots s ON b.slot_id = s.id
            WHERE b.review_requested = 0 AND s.datetime <= ?
            "#,
        )
        .bind(to_db_datetime(cutoff))
        .fetch_all(&db.pool)
        .await
    }

    pub async fn mark_review_requested(db: &Database, booking_id: i64) -> Result<(), sqlx::Error> {
        sqlx::query("UPDATE bookings SET review_requested = 1 WHERE id = ?")
            .bind(booking_id)
            .execute(&db.pool)
            .await?;
        Ok(())
    }

    pub async fn stats(db: &Database, now: NaiveDateTime) -> Result<Stats, sqlx::Error> {
        let total: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM bookings")
            .fetch_one(&db.pool)
            .await?;

        let last_week: i64 = sqlx::query_scalar(
            "SELECT COUNT(*) FROM bookings WHERE datetime(created_at) >= datetime('now', '-7 days')",
        )
        .fetch_one(&db.pool)
        .await?;

        let free_slots: i64 = sqlx::query_scalar(
            r#"
            SELECT COUNT(*)
            FROM slots s
            LEFT JOIN bookings b ON s.id = b.slot_id
            WHERE b.slot_id IS NULL AND s.datetime >= ?
            "#,
        )
        .bind(to_db_datetime(now))
        .fetch_one(&db.pool)
        .await?;

        let avg_rating: Option<f64> =
            sqlx::query_scalar("SELECT AVG(rating) FROM feedback WHERE rating IS NOT NULL")
                .fetch_one(&db.pool)
                .await?;

        Ok(Stats {
            total,
            last_week,
            free_slots,
            avg_rating: avg_rating.unwrap_or(0.0),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Slot;
    use chrono::NaiveDate;

    fn dt(day: u32, hour: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2025, 5, day)
            .unwrap()
            .and_hms_opt(hour, 0, 0)
            .unwrap()
    }

    async fn book(db: &Database, slot_dt: NaiveDateTime, user_id: i64) -> i64 {
        Slot::add(db, slot_dt, None).await.unwrap();
        let slot_id: i64 = sqlx::query_scalar("SELECT id FROM slots WHERE datetime = ?")
            .bind(crate::database::to_db_datetime(slot_dt))
            .fetch_one(&db.pool)
            .await
            .unwrap();
        sqlx::query(
            "INSERT INTO bookings (slot_id, user_id, name, contact, shoot_type) VALUES (?, ?, 'Anna', '+79990001111', 'portrait')",
        )
        .bind(slot_id)
        .bind(user_id)
        .execute(&db.pool)
        .await
        .unwrap()
        .last_insert_rowid()
    }

    #[tokio::test]
    async fn due_reminders_selects_only_next_24h_unsent() {
        let db = Database::in_memory().await.unwrap();
        let now = dt(1, 9);

        let soon = book(&db, dt(1, 18), 1).await; // inside window
        book(&db, dt(3, 10), 2).await; // outside window
        let sent = book(&db, dt(1, 20), 3).await;
        Booking::mark_reminder_sent(&db, sent).await.unwrap();

        let due = Booking::due_reminders(&db, now).await.unwrap();
        assert_eq!(due.len(), 1);
        assert_eq!(due[0].id, soon);
    }

    #[tokio::test]
    async fn review_prompts_need_24h_elapsed() {
        let db = Database::in_memory().await.unwrap();
        let now = dt(3, 12);

        let old = book(&db, dt(1, 10), 1).await; // > 24h past
        book(&db, dt(3, 10), 2).await; // too recent

        let due = Booking::due_review_prompts(&db, now).await.unwrap();
        assert_eq!(due.len(), 1);
        assert_eq!(due[0].id, old);

        Booking::mark_review_requested(&db, old).await.unwrap();
        assert!(Booking::due_review_prompts(&db, now).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn upcoming_for_user_picks_earliest_future_booking() {
        let db = Database::in_memory().await.unwrap();

        book(&db, dt(5, 10), 7).await;
        book(&db, dt(2, 10), 7).await;

        let view = Booking::upcoming_for_user(&db, 7, dt(1, 0)).await.unwrap().unwrap();
        assert_eq!(view.datetime, "2025-05-02 10:00:00");

        assert!(Booking::upcoming_for_user(&db, 99, dt(1, 0)).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn export_rows_ordered_by_slot_datetime() {
        let db = Database::in_memory().await.unwrap();

        book(&db, dt(9, 10), 1).await;
        book(&db, dt(2, 10), 2).await;

        let rows = Booking::export_rows(&db).await.unwrap();
        assert_eq!(rows.len(), 2);
        assert!(rows[0].datetime < rows[1].datetime);
    }
}
