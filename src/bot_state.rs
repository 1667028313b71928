use std::collections::HashMap;
use std::sync::Arc;

use teloxide::types::ChatId;
use tokio::sync::RwLock;

use crate::config::Config;
use crate::database::Database;
use crate::dialogue::DialogueState;
use crate::sessions::AdminSessions;
use crate::templates::Templates;

/// Discount policy, adjustable by admins while the bot is running.
#[derive(Debug, Clone, Copy)]
pub struct DiscountSettings {
    pub percent: i64,
    pub min_reviews: i64,
}

/// Shared handler state: the store plus the in-memory conversation and
/// admin-session maps. Cloning is cheap; the maps are shared.
#[derive(Clone)]
pub struct BotState {
    pub db: Database,
    pub config: Arc<Config>,
    pub templates: Templates,
    pub admin_sessions: AdminSessions,
    dialogues: Arc<RwLock<HashMap<ChatId, DialogueState>>>,
    // admins can rotate the password at runtime; the hash lives behind a lock
    password_hash: Arc<RwLock<String>>,
    // same story for the discount policy, seeded from the environment
    discounts: Arc<RwLock<DiscountSettings>>,
}

impl BotState {
    pub fn new(db: Database, config: Config, templates: Templates) -> Self {
        let password_hash = Arc::new(RwLock::new(config.admin_password_hash.clone()));
        let discounts = Arc::new(RwLock::new(DiscountSettings {
            percent: config.discount_percent,
            min_reviews: config.min_reviews_for_discount,
        }));
        Self {
            db,
            config: Arc::new(config),
            templates,
            admin_sessions: AdminSessions::new(),
            dialogues: Arc::new(RwLock::new(HashMap::new())),
            password_hash,
            discounts,
        }
    }

    pub async fn dialogue(&self, chat_id: ChatId) -> Option<DialogueState> {
        self.dialogues.read().await.get(&chat_id).cloned()
    }

    pub async fn set_dialogue(&self, chat_id: ChatId, state: DialogueState) {
        self.dialogues.write().await.insert(chat_id, state);
    }

    /// Drops the conversation session, discarding all collected fields.
    pub async fn clear_dialogue(&self, chat_id: ChatId) {
        self.dialogues.write().await.remove(&chat_id);
    }

    pub async fn password_hash(&self) -> String {
        self.password_hash.read().await.clone()
    }

    pub async fn set_password_hash(&self, hash: String) {
        *self.password_hash.write().await = hash;
    }

    pub async fn discounts(&self) -> DiscountSettings {
        *self.discounts.read().await
    }

    pub async fn set_discount_percent(&self, percent: i64) {
        self.discounts.write().await.percent = percent;
    }

    pub async fn set_min_reviews(&self, min_reviews: i64) {
        self.discounts.write().await.min_reviews = min_reviews;
    }

    pub fn is_admin(&self, user_id: i64) -> bool {
        self.config.is_admin(user_id)
    }

    /// Sliding-expiration check used by every privileged handler.
    pub async fn authorize_admin(&self, user_id: i64) -> bool {
        self.is_admin(user_id)
            && self
                .admin_sessions
                .authorize(user_id, self.config.session_timeout())
                .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dialogue::DialogueState;
    use tempfile::tempdir;

    pub(crate) fn test_config() -> Config {
        Config {
            admin_ids: vec![1],
            admin_password_hash: bcrypt::hash("sunshinepass", 4).unwrap(),
            database_url: "sqlite::memory:".into(),
            templates_path: "templates.json".into(),
            slots_days_ahead: 30,
            session_timeout_minutes: 30,
            default_language: "ru".into(),
            min_reviews_for_discount: 3,
            discount_percent: 10,
        }
    }

    #[tokio::test]
    async fn dialogue_map_set_get_clear() {
        let dir = tempdir().unwrap();
        let state = BotState::new(
            Database::in_memory().await.unwrap(),
            test_config(),
            Templates::load(&dir.path().join("templates.json")),
        );
        let chat = ChatId(42);

        assert!(state.dialogue(chat).await.is_none());

        state.set_dialogue(chat, DialogueState::FeedbackText).await;
        assert!(matches!(state.dialogue(chat).await, Some(DialogueState::FeedbackText)));

        state.clear_dialogue(chat).await;
        assert!(state.dialogue(chat).await.is_none());
    }

    #[tokio::test]
    async fn discount_settings_are_runtime_mutable_and_shared() {
        let dir = tempdir().unwrap();
        let state = BotState::new(
            Database::in_memory().await.unwrap(),
            test_config(),
            Templates::load(&dir.path().join("templates.json")),
        );
        let handler_clone = state.clone();

        let initial = state.discounts().await;
        assert_eq!(initial.percent, 10);
        assert_eq!(initial.min_reviews, 3);

        handler_clone.set_discount_percent(25).await;
        handler_clone.set_min_reviews(5).await;

        // every clone observes the update, no restart needed
        let updated = state.discounts().await;
        assert_eq!(updated.percent, 25);
        assert_eq!(updated.min_reviews, 5);
    }

    #[tokio::test]
    async fn authorize_admin_requires_listed_id_and_login() {
        let dir = tempdir().unwrap();
        let state = BotState::new(
            Database::in_memory().await.unwrap(),
            test_config(),
            Templates::load(&dir.path().join("templates.json")),
        );

        assert!(!state.authorize_admin(1).await); // listed but not logged in

        let hash = state.password_hash().await;
        assert!(state.admin_sessions.login(1, "sunshinepass", &hash).await);
        assert!(state.authorize_admin(1).await);
        assert!(!state.authorize_admin(2).await); // not in ADMIN_IDS
    }
}
