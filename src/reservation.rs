//! Slot reservation engine.
//!
//! The pre-insert checks exist only to produce precise user-facing errors;
//! they may observe stale state. The single INSERT below, guarded by the
//! UNIQUE index on `bookings.slot_id`, is what actually decides races.

use crate::database::Database;
use crate::models::Photographer;

#[derive(Debug, Clone)]
pub enum ReserveOutcome {
    Confirmed { photographer: Option<Photographer> },
    AlreadyBookedThisSlot,
    DoubleBookingSameDay,
    SlotTakenRace,
}

pub async fn reserve(
    db: &Database,
    slot_id: i64,
    user_id: i64,
    name: &str,
    contact: &str,
    shoot_type: &str,
) -> Result<ReserveOutcome, sqlx::Error> {
    let same_slot: Option<i64> =
        sqlx::query_scalar("SELECT 1 FROM bookings WHERE slot_id = ? AND user_id = ?")
            .bind(slot_id)
            .bind(user_id)
            .fetch_optional(&db.pool)
            .await?;
    if same_slot.is_some() {
        return Ok(ReserveOutcome::AlreadyBookedThisSlot);
    }

    let same_day: Option<i64> = sqlx::query_scalar(
        r#"
        SELECT 1 FROM bookings b
        JOIN slots s ON b.slot_id = s.id
        WHERE b.user_id = ?
          AND date(s.datetime) = (SELECT date(datetime) FROM slots WHERE id = ?)
        "#,
    )
    .bind(user_id)
    .bind(slot_id)
    .fetch_optional(&db.pool)
    .await?;
    if same_day.is_some() {
        return Ok(ReserveOutcome::DoubleBookingSameDay);
    }

    let insert = sqlx::query(
        "INSERT INTO bookings (slot_id, user_id, name, contact, shoot_type) VALUES (?, ?, ?, ?, ?)",
    )
    .bind(slot_id)
    .bind(user_id)
    .bind(name)
    .bind(contact)
    .bind(shoot_type)
    .execute(&db.pool)
    .await;

    match insert {
        Ok(_) => {
            // Best effort: a failed lookup must not undo a confirmed booking.
            let photographer = match Photographer::for_slot(db, slot_id).await {
                Ok(p) => p,
                Err(e) => {
                    log::error!("Photographer lookup failed for slot {}: {}", slot_id, e);
                    None
                }
            };
            Ok(ReserveOutcome::Confirmed { photographer })
        }
        Err(sqlx::Error::Database(e)) if e.is_unique_violation() => {
            log::warn!(
                "Slot {} taken concurrently, user {} lost the race",
                slot_id,
                user_id
            );
            Ok(ReserveOutcome::SlotTakenRace)
        }
        Err(e) => Err(e),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Slot;
    use chrono::{NaiveDate, NaiveDateTime};

    fn dt(day: u32, hour: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2025, 5, day)
            .unwrap()
            .and_hms_opt(hour, 0, 0)
            .unwrap()
    }

    async fn add_slot(db: &Database, at: NaiveDateTime) -> i64 {
        Slot::add(db, at, None).await.unwrap();
        sqlx::query_scalar("SELECT id FROM slots WHERE datetime = ?")
            .bind(crate::database::to_db_datetime(at))
            .fetch_one(&db.pool)
            .await
            .unwrap()
    }

    async fn booking_count(db: &Database) -> i64 {
        sqlx::query_scalar("SELECT COUNT(*) FROM bookings")
            .fetch_one(&db.pool)
            .await
            .unwrap()
    }

    #[tokio::test]
    async fn valid_reservation_is_confirmed() {
        let db = Database::in_memory().await.unwrap();
        let slot = add_slot(&db, dt(1, 10)).await;

        let outcome = reserve(&db, slot, 100, "Anna", "+79990001111", "portrait")
            .await
            .unwrap();
        assert!(matches!(outcome, ReserveOutcome::Confirmed { .. }));
        assert_eq!(booking_count(&db).await, 1);

        let reminder_sent: i64 = sqlx::query_scalar("SELECT reminder_sent FROM bookings")
            .fetch_one(&db.pool)
            .await
            .unwrap();
        assert_eq!(reminder_sent, 0);
    }

    #[tokio::test]
    async fn repeat_reservation_of_same_slot_is_rejected() {
        let db = Database::in_memory().await.unwrap();
        let slot = add_slot(&db, dt(1, 10)).await;

        reserve(&db, slot, 100, "Anna", "+79990001111", "portrait")
            .await
            .unwrap();
        let outcome = reserve(&db, slot, 100, "Anna", "+79990001111", "portrait")
            .await
            .unwrap();

        assert!(matches!(outcome, ReserveOutcome::AlreadyBookedThisSlot));
        assert_eq!(booking_count(&db).await, 1);
    }

    #[tokio::test]
    async fn second_booking_on_same_day_is_rejected() {
        let db = Database::in_memory().await.unwrap();
        let morning = add_slot(&db, dt(1, 10)).await;
        let evening = add_slot(&db, dt(1, 18)).await;
        let other_day = add_slot(&db, dt(2, 10)).await;

        reserve(&db, morning, 100, "Anna", "+79990001111", "portrait")
            .await
            .unwrap();

        let outcome = reserve(&db, evening, 100, "Anna", "+79990001111", "wedding")
            .await
            .unwrap();
        assert!(matches!(outcome, ReserveOutcome::DoubleBookingSameDay));
        assert_eq!(booking_count(&db).await, 1);

        // a different calendar date is fine
        let outcome = reserve(&db, other_day, 100, "Anna", "+79990001111", "wedding")
            .await
            .unwrap();
        assert!(matches!(outcome, ReserveOutcome::Confirmed { .. }));
    }

    #[tokio::test]
    async fn taken_slot_reports_race_to_other_users() {
        let db = Database::in_memory().await.unwrap();
        let slot = add_slot(&db, dt(1, 10)).await;

        reserve(&db, slot, 100, "Anna", "+79990001111", "portrait")
            .await
            .unwrap();
        let outcome = reserve(&db, slot, 200, "Boris", "+79990002222", "portrait")
            .await
            .unwrap();

        assert!(matches!(outcome, ReserveOutcome::SlotTakenRace));
        assert_eq!(booking_count(&db).await, 1);
    }

    #[tokio::test]
    async fn concurrent_reservations_confirm_exactly_one() {
        let db = Database::in_memory().await.unwrap();
        let slot = add_slot(&db, dt(1, 10)).await;

        let mut handles = Vec::new();
        for user in 0..8i64 {
            let db = db.clone();
            handles.push(tokio::spawn(async move {
                reserve(&db, slot, 1000 + user, "User", "+79990001111", "portrait").await
            }));
        }

        let mut confirmed = 0;
        let mut raced = 0;
        for handle in handles {
            match handle.await.unwrap().unwrap() {
                ReserveOutcome::Confirmed { .. } => confirmed += 1,
                ReserveOutcome::SlotTakenRace => raced += 1,
                other => panic!("unexpected outcome: {:?}", other),
            }
        }

        assert_eq!(confirmed, 1);
        assert_eq!(raced, 7);
        assert_eq!(booking_count(&db).await, 1);
    }

    #[tokio::test]
    async fn confirmed_outcome_carries_assigned_photographer() {
        let db = Database::in_memory().await.unwrap();

        crate::models::Photographer::add(&db, 555, "lena_photo", "").await.unwrap();
        let photographer_id: i64 = sqlx::query_scalar("SELECT id FROM photographers")
            .fetch_one(&db.pool)
            .await
            .unwrap();

        Slot::add(&db, dt(1, 10), Some(photographer_id)).await.unwrap();
        let slot: i64 = sqlx::query_scalar("SELECT id FROM slots")
            .fetch_one(&db.pool)
            .await
            .unwrap();

        let outcome = reserve(&db, slot, 100, "Anna", "+79990001111", "portrait")
            .await
            .unwrap();
        match outcome {
            ReserveOutcome::Confirmed { photographer } => {
                assert_eq!(photographer.unwrap().username, "lena_photo");
            }
            other => panic!("unexpected outcome: {:?}", other),
        }
    }
}
