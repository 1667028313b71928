//! Password-gated admin sessions with sliding expiration.

use std::collections::HashMap;
use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};
use tokio::sync::Mutex;

/// Process-wide map of admin id to last-activity time. Shared between the
/// command handlers and the expiry sweep, hence the mutex.
#[derive(Clone, Default)]
pub struct AdminSessions {
    inner: Arc<Mutex<HashMap<i64, DateTime<Utc>>>>,
}

impl AdminSessions {
    pub fn new() -> Self {
        Self::default()
    }

    /// Verifies the password against the stored bcrypt hash and opens (or
    /// refreshes) the session on success.
    pub async fn login(&self, admin_id: i64, password: &str, password_hash: &str) -> bool {
        let verified = match bcrypt::verify(password, password_hash) {
            Ok(ok) => ok,
            Err(e) => {
                log::error!("Password verification failed: {}", e);
                false
            }
        };

        if verified {
            self.inner.lock().await.insert(admin_id, Utc::now());
            log::info!("Admin {} logged in", admin_id);
        } else {
            log::warn!("Admin login failed for user {}", admin_id);
        }
        verified
    }

    /// Sliding check: false when no session exists or it idled out (expired
    /// entries are removed here); otherwise refreshes last activity.
    pub async fn authorize(&self, admin_id: i64, timeout: Duration) -> bool {
        let mut sessions = self.inner.lock().await;

        let Some(last_activity) = sessions.get(&admin_id).copied() else {
            return false;
        };

        if Utc::now() - last_activity > timeout {
            sessions.remove(&admin_id);
            log::info!("Admin session expired: {}", admin_id);
            return false;
        }

        sessions.insert(admin_id, Utc::now());
        true
    }

    pub async fn logout(&self, admin_id: i64) {
        if self.inner.lock().await.remove(&admin_id).is_some() {
            log::info!("Admin {} logged out", admin_id);
        }
    }

    /// Evicts every idle session, bounding growth independently of
    /// `authorize` being called again.
    pub async fn sweep(&self, timeout: Duration) -> usize {
        let mut sessions = self.inner.lock().await;
        let now = Utc::now();
        let before = sessions.len();

        sessions.retain(|admin_id, last_activity| {
            let keep = now - *last_activity <= timeout;
            if !keep {
                log::info!("Admin session expired: {}", admin_id);
            }
            keep
        });

        before - sessions.len()
    }

    #[cfg(test)]
    pub async fn backdate(&self, admin_id: i64, by: Duration) {
        let mut sessions = self.inner.lock().await;
        if let Some(last) = sessions.get_mut(&admin_id) {
            *last -= by;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    // bcrypt hash of "sunshinepass", cost 4 (fast for tests)
    fn test_hash() -> String {
        bcrypt::hash("sunshinepass", 4).unwrap()
    }

    #[tokio::test]
    async fn login_then_authorize() {
        let sessions = AdminSessions::new();
        let hash = test_hash();

        assert!(!sessions.authorize(1, Duration::minutes(30)).await);
        assert!(!sessions.login(1, "wrong", &hash).await);
        assert!(!sessions.authorize(1, Duration::minutes(30)).await);

        assert!(sessions.login(1, "sunshinepass", &hash).await);
        assert!(sessions.authorize(1, Duration::minutes(30)).await);
    }

    #[tokio::test]
    async fn idle_session_expires_and_is_removed() {
        let sessions = AdminSessions::new();
        let hash = test_hash();

        assert!(sessions.login(1, "sunshinepass", &hash).await);
        sessions.backdate(1, Duration::minutes(31)).await;

        assert!(!sessions.authorize(1, Duration::minutes(30)).await);
        // entry was dropped, a second call still fails fast
        assert!(!sessions.authorize(1, Duration::minutes(30)).await);
    }

    #[tokio::test]
    async fn authorize_refreshes_last_activity() {
        let sessions = AdminSessions::new();
        let hash = test_hash();

        assert!(sessions.login(1, "sunshinepass", &hash).await);
        sessions.backdate(1, Duration::minutes(20)).await;

        // still inside the window, so this refreshes the clock
        assert!(sessions.authorize(1, Duration::minutes(30)).await);
        sessions.backdate(1, Duration::minutes(20)).await;
        assert!(sessions.authorize(1, Duration::minutes(30)).await);
    }

    #[tokio::test]
    async fn logout_is_unconditional() {
        let sessions = AdminSessions::new();
        let hash = test_hash();

        sessions.logout(1).await; // no session, no panic

        assert!(sessions.login(1, "sunshinepass", &hash).await);
        sessions.logout(1).await;
        assert!(!sessions.authorize(1, Duration::minutes(30)).await);
    }

    #[tokio::test]
    async fn sweep_evicts_only_idle_sessions() {
        let sessions = AdminSessions::new();
        let hash = test_hash();

        assert!(sessions.login(1, "sunshinepass", &hash).await);
        assert!(sessions.login(2, "sunshinepass", &hash).await);
        sessions.backdate(1, Duration::minutes(45)).await;

        assert_eq!(sessions.sweep(Duration::minutes(30)).await, 1);
        assert!(!sessions.authorize(1, Duration::minutes(30)).await);
        assert!(sessions.authorize(2, Duration::minutes(30)).await);
    }
}
