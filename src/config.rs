use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub oauth: OAuthConfig,
    #[serde(default)]
    pub api: ApiConfig,
    #[serde(default)]
    pub cleanup: CleanupConfig,
    #[serde(default)]
    pub scan: ScanConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OAuthConfig {
    pub client_id: String,
    pub client_secret: Option<String>,
    pub auth_url: String,
    pub token_url: String,
    pub revoke_url: String,
    pub userinfo_url: String,
    pub scopes: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApiConfig {
    pub base_url: String,
    /// Bound on auth status checks; converted to a negative result, never an
    /// error.
    pub status_check_timeout_ms: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CleanupConfig {
    /// Hard cap on ids resolved into a single batch mutation.
    pub max_batch_size: u32,
    /// Wall-clock window during which an archive may be undone.
    pub undo_window_secs: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScanConfig {
    /// Age threshold for the "old mail" estimate.
    pub old_mail_threshold_days: i64,
    /// Messages listed per requested ranking entry in top-senders.
    pub sender_oversample: u32,
}

impl Default for OAuthConfig {
    fn default() -> Self {
        Self {
            client_id: String::new(),
            client_secret: None,
            auth_url: "https://accounts.google.com/o/oauth2/v2/auth".to_string(),
            token_url: "https://oauth2.googleapis.com/token".to_string(),
            revoke_url: "https://oauth2.googleapis.com/revoke".to_string(),
            userinfo_url: "https://www.googleapis.com/oauth2/v2/userinfo".to_string(),
            scopes: vec![
                "https://www.googleapis.com/auth/gmail.modify".to_string(),
                "https://www.googleapis.com/auth/userinfo.email".to_string(),
                "https://www.googleapis.com/auth/userinfo.profile".to_string(),
            ],
        }
    }
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            base_url: "https://www.googleapis.com/gmail/v1".to_string(),
            status_check_timeout_ms: 2000,
        }
    }
}

impl Default for CleanupConfig {
    fn default() -> Self {
        Self {
            max_batch_size: 100,
            undo_window_secs: 5,
        }
    }
}

impl Default for ScanConfig {
    fn default() -> Self {
        Self {
            old_mail_threshold_days: 365,
            sender_oversample: 5,
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            oauth: OAuthConfig::default(),
            api: ApiConfig::default(),
            cleanup: CleanupConfig::default(),
            scan: ScanConfig::default(),
        }
    }
}

impl Config {
    /// Read `settings.toml` from the working directory, falling back to
    /// defaults if it is missing or does not parse.
    pub fn load() -> Self {
        use std::fs;
        if let Ok(content) = fs::read_to_string("settings.toml") {
            if let Ok(config) = toml::from_str(&content) {
                return config;
            }
            tracing::warn!("settings.toml present but unreadable, using defaults");
        }
        Self::default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_documented_limits() {
        let config = Config::default();
        assert_eq!(config.cleanup.max_batch_size, 100);
        assert_eq!(config.cleanup.undo_window_secs, 5);
        assert_eq!(config.api.status_check_timeout_ms, 2000);
        assert_eq!(config.scan.old_mail_threshold_days, 365);
        assert_eq!(config.scan.sender_oversample, 5);
    }

    #[test]
    fn partial_toml_fills_missing_sections_with_defaults() {
        let config: Config = toml::from_str(
            r#"
            [cleanup]
            max_batch_size = 50
            undo_window_secs = 10
            "#,
        )
        .unwrap();
        assert_eq!(config.cleanup.max_batch_size, 50);
        assert_eq!(config.cleanup.undo_window_secs, 10);
        assert_eq!(config.api.base_url, "https://www.googleapis.com/gmail/v1");
        assert!(config.oauth.scopes.iter().any(|s| s.contains("gmail.modify")));
    }
}
