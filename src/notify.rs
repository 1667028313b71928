//! Outbound notification seam. The scheduler and the booking fan-out talk
//! to this trait, not to teloxide directly, so delivery can be recorded in
//! tests. Delivery failures are isolated per recipient and never bubble up
//! into reservation or sweep outcomes.

use async_trait::async_trait;
use teloxide::prelude::*;
use thiserror::Error;

#[derive(Debug, Error)]
#[error("notification to {recipient} failed: {reason}")]
pub struct NotifyError {
    pub recipient: i64,
    pub reason: String,
}

#[async_trait]
pub trait Notifier: Send + Sync {
    async fn send(&self, recipient: i64, text: &str) -> Result<(), NotifyError>;
}

pub struct TelegramNotifier {
    bot: Bot,
}

impl TelegramNotifier {
    pub fn new(bot: Bot) -> Self {
        Self { bot }
    }
}

#[async_trait]
impl Notifier for TelegramNotifier {
    async fn send(&self, recipient: i64, text: &str) -> Result<(), NotifyError> {
        self.bot
            .send_message(ChatId(recipient), text)
            .await
            .map(|_| ())
            .map_err(|e| NotifyError {
                recipient,
                reason: e.to_string(),
            })
    }
}

#[cfg(test)]
pub mod test_support {
    use super::*;
    use std::collections::HashSet;
    use std::sync::Mutex;

    /// Records every delivery; recipients listed in `failing` error out.
    #[derive(Default)]
    pub struct RecordingNotifier {
        pub sent: Mutex<Vec<(i64, String)>>,
        pub failing: Mutex<HashSet<i64>>,
    }

    impl RecordingNotifier {
        pub fn new() -> Self {
            Self::default()
        }

        pub fn fail_for(&self, recipient: i64) {
            self.failing.lock().unwrap().insert(recipient);
        }

        pub fn sent_to(&self, recipient: i64) -> usize {
            self.sent
                .lock()
                .unwrap()
                .iter()
                .filter(|(r, _)| *r == recipient)
                .count()
        }

        pub fn total_sent(&self) -> usize {
            self.sent.lock().unwrap().len()
        }
    }

    #[async_trait]
    impl Notifier for RecordingNotifier {
        async fn send(&self, recipient: i64, text: &str) -> Result<(), NotifyError> {
            if self.failing.lock().unwrap().contains(&recipient) {
                return Err(NotifyError {
                    recipient,
                    reason: "forced failure".into(),
                });
            }
            self.sent.lock().unwrap().push((recipient, text.to_string()));
            Ok(())
        }
    }
}
