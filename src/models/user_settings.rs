use crate::database::Database;

pub struct UserSettings;

impl UserSettings {
    pub async fn language(db: &Database, user_id: i64, default: &str) -> Result<String, sqlx::Error> {
        let lang: Option<String> =
            sqlx::query_scalar("SELECT language FROM user_settings WHERE user_id = ?")
                .bind(user_id)
                .fetch_optional(&db.pool)
                .await?;

        Ok(lang.unwrap_or_else(|| default.to_string()))
    }

    pub async fn set_language(db: &Database, user_id: i64, language: &str) -> Result<(), sqlx::Error> {
        // Upsert rather than REPLACE so discount_eligible survives a language change.
        sqlx::query(
            r#"
            INSERT INTO user_settings (user_id, language) VALUES (?, ?)
            ON CONFLICT(user_id) DO UPDATE SET language = excluded.language
            "#,
        )
        .bind(user_id)
        .bind(language)
        .execute(&db.pool)
        .await?;
        Ok(())
    }

    pub async fn discount_eligible(db: &Database, user_id: i64) -> Result<bool, sqlx::Error> {
        let eligible: Option<i64> =
            sqlx::query_scalar("SELECT discount_eligible FROM user_settings WHERE user_id = ?")
                .bind(user_id)
                .fetch_optional(&db.pool)
                .await?;

        Ok(eligible.unwrap_or(0) != 0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn language_defaults_and_updates() {
        let db = Database::in_memory().await.unwrap();

        assert_eq!(UserSettings::language(&db, 1, "ru").await.unwrap(), "ru");

        UserSettings::set_language(&db, 1, "en").await.unwrap();
        assert_eq!(UserSettings::language(&db, 1, "ru").await.unwrap(), "en");
    }

    #[tokio::test]
    async fn language_change_keeps_discount_flag() {
        let db = Database::in_memory().await.unwrap();

        sqlx::query("INSERT INTO user_settings (user_id, language, discount_eligible) VALUES (1, 'ru', 1)")
            .execute(&db.pool)
            .await
            .unwrap();

        UserSettings::set_language(&db, 1, "en").await.unwrap();
        assert!(UserSettings::discount_eligible(&db, 1).await.unwrap());
    }
}
