use once_cell::sync::Lazy;
use serde::{Deserialize, Serialize};
use std::env;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    pub environment: Environment,
    pub store: StoreConfig,
    pub security: SecurityConfig,
    pub push: PushConfig,
    pub integrations: IntegrationsConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum Environment {
    Development,
    Staging,
    Production,
}

/// How the managed entity store is reached.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoreConfig {
    /// "memory" for local development and tests, "remote" for the managed platform
    pub backend: String,
    pub base_url: String,
    pub api_key: String,
    pub max_concurrent_requests: usize,
    pub request_timeout_secs: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SecurityConfig {
    pub jwt_secret: String,
    pub jwt_expiry_hours: u64,
    pub enable_cors: bool,
    pub cors_origins: Vec<String>,
}

/// Web-push key pair. Only the public key may ever leave the process.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PushConfig {
    pub vapid_public_key: Option<String>,
    pub vapid_private_key: Option<String>,
}

/// Optional third-party providers. Presence of a key means "configured";
/// values are never serialized into responses.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IntegrationsConfig {
    pub chat_webhook_url: Option<String>,
    pub accounting_api_key: Option<String>,
    pub weather_api_key: Option<String>,
    pub llm_api_key: Option<String>,
}

impl AppConfig {
    pub fn from_env() -> Self {
        let environment = match env::var("APP_ENV").as_deref() {
            Ok("production") | Ok("prod") => Environment::Production,
            Ok("staging") | Ok("stage") => Environment::Staging,
            _ => Environment::Development,
        };

        // Set defaults based on environment, then override with specific env vars
        match environment {
            Environment::Production => Self::production(),
            Environment::Staging => Self::staging(),
            Environment::Development => Self::development(),
        }
        .with_env_overrides()
    }

    fn with_env_overrides(mut self) -> Self {
        // Store overrides
        if let Ok(v) = env::var("STORE_BACKEND") {
            self.store.backend = v;
        }
        if let Ok(v) = env::var("STORE_BASE_URL") {
            self.store.base_url = v;
        }
        if let Ok(v) = env::var("STORE_API_KEY") {
            self.store.api_key = v;
        }
        if let Ok(v) = env::var("STORE_MAX_CONCURRENT_REQUESTS") {
            self.store.max_concurrent_requests =
                v.parse().unwrap_or(self.store.max_concurrent_requests);
        }
        if let Ok(v) = env::var("STORE_REQUEST_TIMEOUT_SECS") {
            self.store.request_timeout_secs = v.parse().unwrap_or(self.store.request_timeout_secs);
        }

        // Security overrides
        if let Ok(v) = env::var("SECURITY_JWT_SECRET") {
            self.security.jwt_secret = v;
        }
        if let Ok(v) = env::var("SECURITY_JWT_EXPIRY_HOURS") {
            self.security.jwt_expiry_hours = v.parse().unwrap_or(self.security.jwt_expiry_hours);
        }
        if let Ok(v) = env::var("SECURITY_ENABLE_CORS") {
            self.security.enable_cors = v.parse().unwrap_or(self.security.enable_cors);
        }
        if let Ok(v) = env::var("SECURITY_CORS_ORIGINS") {
            self.security.cors_origins = v.split(',').map(|s| s.trim().to_string()).collect();
        }

        // Push notification keys
        if let Ok(v) = env::var("PUSH_VAPID_PUBLIC_KEY") {
            self.push.vapid_public_key = Some(v);
        }
        if let Ok(v) = env::var("PUSH_VAPID_PRIVATE_KEY") {
            self.push.vapid_private_key = Some(v);
        }

        // Integration secrets
        if let Ok(v) = env::var("INTEGRATION_CHAT_WEBHOOK_URL") {
            self.integrations.chat_webhook_url = Some(v);
        }
        if let Ok(v) = env::var("INTEGRATION_ACCOUNTING_API_KEY") {
            self.integrations.accounting_api_key = Some(v);
        }
        if let Ok(v) = env::var("INTEGRATION_WEATHER_API_KEY") {
            self.integrations.weather_api_key = Some(v);
        }
        if let Ok(v) = env::var("INTEGRATION_LLM_API_KEY") {
            self.integrations.llm_api_key = Some(v);
        }

        self
    }

    fn development() -> Self {
        Self {
            environment: Environment::Development,
            store: StoreConfig {
                backend: "memory".to_string(),
                base_url: "http://localhost:8090".to_string(),
                api_key: String::new(),
                max_concurrent_requests: 8,
                request_timeout_secs: 30,
            },
            security: SecurityConfig {
                jwt_secret: "sitework-dev-secret".to_string(),
                jwt_expiry_hours: 24 * 7, // 1 week
                enable_cors: true,
                cors_origins: vec![
                    "http://localhost:3000".to_string(),
                    "http://localhost:5173".to_string(),
                ],
            },
            push: PushConfig {
                vapid_public_key: None,
                vapid_private_key: None,
            },
            integrations: IntegrationsConfig {
                chat_webhook_url: None,
                accounting_api_key: None,
                weather_api_key: None,
                llm_api_key: None,
            },
        }
    }

    fn staging() -> Self {
        Self {
            environment: Environment::Staging,
            store: StoreConfig {
                backend: "remote".to_string(),
                base_url: "https://platform-staging.example.com".to_string(),
                api_key: String::new(),
                max_concurrent_requests: 6,
                request_timeout_secs: 15,
            },
            security: SecurityConfig {
                jwt_secret: String::new(),
                jwt_expiry_hours: 24,
                enable_cors: true,
                cors_origins: vec!["https://staging.sitework.example.com".to_string()],
            },
            push: PushConfig {
                vapid_public_key: None,
                vapid_private_key: None,
            },
            integrations: IntegrationsConfig {
                chat_webhook_url: None,
                accounting_api_key: None,
                weather_api_key: None,
                llm_api_key: None,
            },
        }
    }

    fn production() -> Self {
        Self {
            environment: Environment::Production,
            store: StoreConfig {
                backend: "remote".to_string(),
                base_url: "https://platform.example.com".to_string(),
                api_key: String::new(),
                max_concurrent_requests: 6,
                request_timeout_secs: 10,
            },
            security: SecurityConfig {
                jwt_secret: String::new(),
                jwt_expiry_hours: 4,
                enable_cors: true,
                cors_origins: vec!["https://app.sitework.example.com".to_string()],
            },
            push: PushConfig {
                vapid_public_key: None,
                vapid_private_key: None,
            },
            integrations: IntegrationsConfig {
                chat_webhook_url: None,
                accounting_api_key: None,
                weather_api_key: None,
                llm_api_key: None,
            },
        }
    }
}

// Global singleton config - initialized once at startup
pub static CONFIG: Lazy<AppConfig> = Lazy::new(AppConfig::from_env);

// Convenience function for accessing config
pub fn config() -> &'static AppConfig {
    &CONFIG
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_development_config() {
        let config = AppConfig::development();
        assert_eq!(config.store.backend, "memory");
        assert!(!config.security.jwt_secret.is_empty());
        assert!(config.security.enable_cors);
    }

    #[test]
    fn test_default_production_config() {
        let config = AppConfig::production();
        assert_eq!(config.store.backend, "remote");
        assert_eq!(config.security.jwt_expiry_hours, 4);
        assert!(config.push.vapid_private_key.is_none());
    }
}
