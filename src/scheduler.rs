//! Background jobs: reminder and review-request sweeps over the booking
//! table, plus the admin session expiry sweep. The loops only communicate
//! with the handlers through the shared store.

use std::sync::Arc;
use std::time::Duration;

use chrono::{Local, NaiveDateTime};
use tokio::time;

use crate::database::{from_db_datetime, Database};
use crate::models::Booking;
use crate::notify::Notifier;
use crate::sessions::AdminSessions;
use crate::templates::Templates;

pub const SWEEP_PERIOD: Duration = Duration::from_secs(600);
pub const SESSION_SWEEP_PERIOD: Duration = Duration::from_secs(300);
const RETRY_BACKOFF: Duration = Duration::from_secs(60);

/// Sends reminders for bookings inside the 24-hour look-ahead window.
/// Marks `reminder_sent` when at least one delivery succeeded, so a partly
/// failed fan-out is not repeated forever. Returns the number of bookings
/// marked.
pub async fn reminder_sweep(
    db: &Database,
    notifier: &dyn Notifier,
    templates: &Templates,
    admin_ids: &[i64],
    now: NaiveDateTime,
) -> Result<u32, sqlx::Error> {
    let due = Booking::due_reminders(db, now).await?;
    let mut marked = 0;

    for booking in due {
        let time_str = from_db_datetime(&booking.datetime)
            .map(|dt| dt.format("%H:%M").to_string())
            .unwrap_or_else(|| booking.datetime.clone());

        let client_text = templates
            .render("reminder_client", &[("time", &time_str)])
            .await;
        let mut delivered = match notifier.send(booking.user_id, &client_text).await {
            Ok(()) => true,
            Err(e) => {
                log::error!("{}", e);
                false
            }
        };

        let admin_text = templates
            .render(
                "reminder_admin",
                &[("time", &time_str), ("name", &booking.name), ("phone", &booking.contact)],
            )
            .await;
        for admin_id in admin_ids {
            match notifier.send(*admin_id, &admin_text).await {
                Ok(()) => delivered = true,
                Err(e) => log::error!("{}", e),
            }
        }

        if delivered {
            Booking::mark_reminder_sent(db, booking.id).await?;
            marked += 1;
            log::info!("Sent reminder for booking {}", booking.id);
        }
    }

    Ok(marked)
}

/// Prompts for a review once the appointment is at least 24 hours in the
/// past. Unlike reminders there is a single recipient, so the flag is set
/// only when that delivery succeeded.
pub async fn review_sweep(
    db: &Database,
    notifier: &dyn Notifier,
    templates: &Templates,
    now: NaiveDateTime,
) -> Result<u32, sqlx::Error> {
    let due = Booking::due_review_prompts(db, now).await?;
    let mut marked = 0;

    for prompt in due {
        let text = templates.get("review_request").await;
        match notifier.send(prompt.user_id, &text).await {
            Ok(()) => {
                Booking::mark_review_requested(db, prompt.id).await?;
                marked += 1;
                log::info!("Review prompt sent to user {}", prompt.user_id);
            }
            Err(e) => log::error!("{}", e),
        }
    }

    Ok(marked)
}

/// Reminder + review loop. A failed iteration backs off briefly and
/// retries instead of terminating the job.
pub async fn reminder_task(
    db: Database,
    notifier: Arc<dyn Notifier>,
    templates: Templates,
    admin_ids: Vec<i64>,
) {
    loop {
        let now = Local::now().naive_local();

        let reminders = reminder_sweep(&db, notifier.as_ref(), &templates, &admin_ids, now).await;
        let reviews = review_sweep(&db, notifier.as_ref(), &templates, now).await;

        match (reminders, reviews) {
            (Ok(_), Ok(_)) => time::sleep(SWEEP_PERIOD).await,
            (r1, r2) => {
                if let Err(e) = r1 {
                    log::error!("Reminder sweep failed: {}", e);
                }
                if let Err(e) = r2 {
                    log::error!("Review sweep failed: {}", e);
                }
                time::sleep(RETRY_BACKOFF).await;
            }
        }
    }
}

/// Evicts idle admin sessions even when no admin command comes in.
pub async fn session_cleanup_task(sessions: AdminSessions, timeout: chrono::Duration) {
    let mut interval = time::interval(SESSION_SWEEP_PERIOD);
    loop {
        interval.tick().await;
        let evicted = sessions.sweep(timeout).await;
        if evicted > 0 {
            log::info!("Evicted {} expired admin sessions", evicted);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Slot;
    use crate::notify::test_support::RecordingNotifier;
    use chrono::NaiveDate;
    use tempfile::tempdir;

    fn dt(day: u32, hour: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2025, 5, day)
            .unwrap()
            .and_hms_opt(hour, 0, 0)
            .unwrap()
    }

    fn templates() -> Templates {
        let dir = tempdir().unwrap();
        Templates::load(&dir.path().join("templates.json"))
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
    async fn reminder_sweep_is_idempotent() {
        let db = Database::in_memory().await.unwrap();
        let templates = templates();
        let notifier = RecordingNotifier::new();
        let now = dt(1, 9);

        book(&db, dt(1, 18), 100).await;

        let marked = reminder_sweep(&db, &notifier, &templates, &[7, 8], now).await.unwrap();
        assert_eq!(marked, 1);
        assert_eq!(notifier.sent_to(100), 1);
        assert_eq!(notifier.sent_to(7), 1);
        assert_eq!(notifier.sent_to(8), 1);

        // second run over the same data sends nothing
        let marked = reminder_sweep(&db, &notifier, &templates, &[7, 8], now).await.unwrap();
        assert_eq!(marked, 0);
        assert_eq!(notifier.total_sent(), 3);
    }

    #[tokio::test]
    async fn partial_delivery_still_marks_reminder() {
        let db = Database::in_memory().await.unwrap();
        let templates = templates();
        let notifier = RecordingNotifier::new();
        notifier.fail_for(100); // the client is unreachable

        book(&db, dt(1, 18), 100).await;

        let marked = reminder_sweep(&db, &notifier, &templates, &[7], dt(1, 9)).await.unwrap();
        assert_eq!(marked, 1);
        assert_eq!(notifier.sent_to(7), 1);
    }

    #[tokio::test]
    async fn total_delivery_failure_leaves_reminder_pending() {
        let db = Database::in_memory().await.unwrap();
        let templates = templates();
        let notifier = RecordingNotifier::new();
        notifier.fail_for(100);
        notifier.fail_for(7);

        book(&db, dt(1, 18), 100).await;

        let marked = reminder_sweep(&db, &notifier, &templates, &[7], dt(1, 9)).await.unwrap();
        assert_eq!(marked, 0);

        // next cycle retries once delivery works again
        let ok_notifier = RecordingNotifier::new();
        let marked = reminder_sweep(&db, &ok_notifier, &templates, &[7], dt(1, 9)).await.unwrap();
        assert_eq!(marked, 1);
    }

    #[tokio::test]
    async fn review_prompt_marks_only_on_success() {
        let db = Database::in_memory().await.unwrap();
        let templates = templates();
        let now = dt(3, 12);

        book(&db, dt(1, 10), 100).await;

        let failing = RecordingNotifier::new();
        failing.fail_for(100);
        assert_eq!(review_sweep(&db, &failing, &templates, now).await.unwrap(), 0);

        let notifier = RecordingNotifier::new();
        assert_eq!(review_sweep(&db, &notifier, &templates, now).await.unwrap(), 1);
        assert_eq!(notifier.sent_to(100), 1);

        // already requested, nothing more to send
        assert_eq!(review_sweep(&db, &notifier, &templates, now).await.unwrap(), 0);
        assert_eq!(notifier.sent_to(100), 1);
    }

    #[tokio::test]
    async fn reminder_message_carries_slot_time() {
        let db = Database::in_memory().await.unwrap();
        let templates = templates();
        let notifier = RecordingNotifier::new();

        book(&db, dt(1, 18), 100).await;
        reminder_sweep(&db, &notifier, &templates, &[], dt(1, 9)).await.unwrap();

        let sent = notifier.sent.lock().unwrap();
        assert!(sent[0].1.contains("18:00"));
    }
}
