use std::env;
use std::path::PathBuf;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("no admin IDs configured (ADMIN_IDS)")]
    NoAdmins,
    #[error("admin password hash not configured (ADMIN_PASSWORD_HASH)")]
    NoPasswordHash,
    #[error("invalid value for {0}: {1}")]
    BadValue(&'static str, String),
}

/// Runtime configuration, read once from the environment at startup.
#[derive(Debug, Clone)]
pub struct Config {
    pub admin_ids: Vec<i64>,
    pub admin_password_hash: String,
    pub database_url: String,
    pub templates_path: PathBuf,
    /// How far into the future slots are offered for booking, in days.
    pub slots_days_ahead: i64,
    /// Admin session idle timeout, in minutes.
    pub session_timeout_minutes: i64,
    pub default_language: String,
    pub min_reviews_for_discount: i64,
    pub discount_percent: i64,
}

impl Config {
    pub fn from_env() -> Result<Self, ConfigError> {
        let admin_ids = parse_id_list(&env::var("ADMIN_IDS").unwrap_or_default())?;
        if admin_ids.is_empty() {
            return Err(ConfigError::NoAdmins);
        }

        let admin_password_hash =
            env::var("ADMIN_PASSWORD_HASH").map_err(|_| ConfigError::NoPasswordHash)?;
        if admin_password_hash.is_empty() {
            return Err(ConfigError::NoPasswordHash);
        }

        Ok(Config {
            admin_ids,
            admin_password_hash,
            database_url: env::var("DATABASE_URL")
                .unwrap_or_else(|_| "sqlite:bot.db?mode=rwc".to_string()),
            templates_path: env::var("TEMPLATES_PATH")
                .unwrap_or_else(|_| "templates.json".to_string())
                .into(),
            slots_days_ahead: parse_int("SLOTS_DAYS_AHEAD", 30)?,
            session_timeout_minutes: parse_int("SESSION_TIMEOUT_MINUTES", 30)?,
            default_language: env::var("DEFAULT_LANGUAGE").unwrap_or_else(|_| "ru".to_string()),
            min_reviews_for_discount: parse_int("MIN_REVIEWS_FOR_DISCOUNT", 3)?,
            discount_percent: parse_int("DISCOUNT_PERCENT", 0)?,
        })
    }

    pub fn session_timeout(&self) -> chrono::Duration {
        chrono::Duration::minutes(self.session_timeout_minutes)
    }

    pub fn is_admin(&self, user_id: i64) -> bool {
        self.admin_ids.contains(&user_id)
    }
}

fn parse_id_list(raw: &str) -> Result<Vec<i64>, ConfigError> {
    raw.split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(|s| {
            s.parse::<i64>()
                .map_err(|_| ConfigError::BadValue("ADMIN_IDS", s.to_string()))
        })
        .collect()
}

fn parse_int(name: &'static str, default: i64) -> Result<i64, ConfigError> {
    match env::var(name) {
        Ok(raw) => raw
            .trim()
            .parse::<i64>()
            .map_err(|_| ConfigError::BadValue(name, raw)),
        Err(_) => Ok(default),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn id_list_parses_and_skips_blanks() {
        assert_eq!(parse_id_list("1, 2,,3").unwrap(), vec![1, 2, 3]);
        assert!(parse_id_list("").unwrap().is_empty());
        assert!(parse_id_list("1,abc").is_err());
    }
}
