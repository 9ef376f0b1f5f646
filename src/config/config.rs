use serde::Deserialize;

use crate::models::{StorageOptions, StorageType};

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 3000,
        }
    }
}

/// Upstream OpenAI-compatible inference gateway.
#[derive(Debug, Deserialize, Clone, Default)]
#[serde(default)]
pub struct GatewayConfig {
    pub url: Option<String>,
    pub api_key: Option<String>,
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct StorageConfig {
    #[serde(rename = "type")]
    pub storage_type: String,
    pub connection_url: Option<String>,
    /// JSON file backing the local store; in-memory when unset.
    pub local_path: Option<String>,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            storage_type: "local".to_string(),
            connection_url: None,
            local_path: None,
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct CacheConfig {
    /// `redis://...` for a remote cache, `memory://` for an in-process map.
    pub url: String,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            url: "redis://localhost:6379".to_string(),
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct RateLimitConfig {
    pub enabled: bool,
    pub window_ms: u64,
    pub max_requests: u32,
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            window_ms: 60_000,
            max_requests: 60,
        }
    }
}

#[derive(Debug, Deserialize, Clone, Default)]
#[serde(default)]
pub struct AuthConfig {
    pub enabled: bool,
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct SearchConfig {
    pub base_url: String,
}

impl Default for SearchConfig {
    fn default() -> Self {
        Self {
            base_url: "https://html.duckduckgo.com".to_string(),
        }
    }
}

#[derive(Debug, Deserialize, Clone, Default)]
#[serde(default)]
pub struct AppConfig {
    pub server: ServerConfig,
    pub gateway: GatewayConfig,
    pub storage: StorageConfig,
    pub cache: CacheConfig,
    pub rate_limit: RateLimitConfig,
    pub auth: AuthConfig,
    pub search: SearchConfig,
}

impl AppConfig {
    pub fn load(path: &str) -> Result<Self, config::ConfigError> {
        dotenv::dotenv().ok();

        let settings = config::Config::builder()
            .add_source(config::File::with_name(path).required(false))
            .add_source(
                config::Environment::with_prefix("CHATGATE")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?;

        let mut app_config: AppConfig = settings.try_deserialize()?;

        // Expand environment variables if present like ${GATEWAY_API_KEY}
        app_config.server.host = expand_env(&app_config.server.host);
        app_config.cache.url = expand_env(&app_config.cache.url);
        app_config.gateway.url = app_config.gateway.url.as_deref().map(expand_env);
        app_config.gateway.api_key = app_config.gateway.api_key.as_deref().map(expand_env);
        app_config.storage.connection_url =
            app_config.storage.connection_url.as_deref().map(expand_env);

        Ok(app_config)
    }

    pub fn storage_type(&self) -> StorageType {
        StorageType::parse(&self.storage.storage_type)
    }

    /// Storage selection for one request, scoped to `user_id`.
    pub fn storage_options(&self, user_id: Option<String>) -> StorageOptions {
        StorageOptions {
            storage_type: self.storage_type(),
            user_id,
            connection_url: self
                .storage
                .connection_url
                .clone()
                .filter(|url| !url.is_empty()),
        }
    }
}

fn expand_env(val: &str) -> String {
    if val.starts_with("${") && val.ends_with('}') {
        let var_name = &val[2..val.len() - 1];
        std::env::var(var_name).unwrap_or_default()
    } else {
        val.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_boot_without_a_config_file() {
        let config = AppConfig::default();
        assert_eq!(config.server.port, 3000);
        assert_eq!(config.rate_limit.window_ms, 60_000);
        assert_eq!(config.rate_limit.max_requests, 60);
        assert!(!config.rate_limit.enabled);
        assert_eq!(config.storage_type(), StorageType::Local);
    }

    #[test]
    fn empty_connection_url_is_treated_as_missing() {
        let mut config = AppConfig::default();
        config.storage.storage_type = "relational".to_string();
        config.storage.connection_url = Some(String::new());

        let options = config.storage_options(Some("alice".to_string()));
        assert_eq!(options.storage_type, StorageType::Relational);
        assert!(options.connection_url.is_none());
        assert_eq!(options.user_id.as_deref(), Some("alice"));
    }

    #[test]
    fn expands_braced_variables() {
        std::env::set_var("CHATGATE_TEST_EXPAND", "secret");
        assert_eq!(expand_env("${CHATGATE_TEST_EXPAND}"), "secret");
        assert_eq!(expand_env("plain"), "plain");
        assert_eq!(expand_env("${CHATGATE_TEST_UNSET_VAR}"), "");
    }
}
