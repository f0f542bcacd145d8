use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use scrape_core::{Environment, User, DEFAULT_PAGE_SIZE, MAX_PAGE_SIZE};
use scrape_engine::{EngineConfig, FetchSettings, StaticTokenIdentity};
use scrape_logging::{scrape_info, scrape_warn};
use serde::{Deserialize, Serialize};

/// Environment variable that overrides the configured deployment mode.
const ENV_VAR: &str = "ENV";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenGrant {
    pub token: String,
    pub id: String,
    pub email: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub environment: Environment,
    pub request_timeout_secs: u64,
    pub cache_ttl_secs: u64,
    pub cache_enabled: bool,
    pub max_response_bytes: u64,
    pub history_path: PathBuf,
    pub default_page_size: usize,
    pub max_page_size: usize,
    pub tokens: Vec<TokenGrant>,
}

impl Default for AppConfig {
    fn default() -> Self {
        let fetch = FetchSettings::default();
        Self {
            environment: Environment::Development,
            request_timeout_secs: fetch.request_timeout.as_secs(),
            cache_ttl_secs: 3600,
            cache_enabled: true,
            max_response_bytes: fetch.max_bytes,
            history_path: PathBuf::from("scrape_history.json"),
            default_page_size: DEFAULT_PAGE_SIZE,
            max_page_size: MAX_PAGE_SIZE,
            tokens: Vec::new(),
        }
    }
}

impl AppConfig {
    pub fn engine_config(&self) -> EngineConfig {
        EngineConfig {
            fetch: FetchSettings {
                request_timeout: Duration::from_secs(self.request_timeout_secs),
                max_bytes: self.max_response_bytes,
                ..FetchSettings::default()
            },
            cache_ttl: Duration::from_secs(self.cache_ttl_secs),
            cache_enabled: self.cache_enabled,
        }
    }

    pub fn identity(&self) -> StaticTokenIdentity {
        self.tokens
            .iter()
            .fold(StaticTokenIdentity::new(), |identity, grant| {
                identity.with_user(
                    grant.token.clone(),
                    User {
                        id: grant.id.clone(),
                        email: grant.email.clone(),
                    },
                )
            })
    }

    fn apply_environment_override(mut self, value: Option<String>) -> Self {
        let Some(value) = value else {
            return self;
        };
        match value.parse::<Environment>() {
            Ok(environment) => self.environment = environment,
            Err(err) => scrape_warn!("Ignoring {}={:?}: {}", ENV_VAR, value, err),
        }
        self
    }
}

/// Loads the RON config at `path`, falling back to defaults when the file is
/// missing or unreadable. `ENV` overrides the environment either way.
pub fn load_config(path: &Path) -> AppConfig {
    read_config_file(path).apply_environment_override(std::env::var(ENV_VAR).ok())
}

fn read_config_file(path: &Path) -> AppConfig {
    match fs::read_to_string(path) {
        Ok(text) => match ron::from_str::<AppConfig>(&text) {
            Ok(config) => {
                scrape_info!("Loaded config from {:?}", path);
                config
            }
            Err(err) => {
                scrape_warn!("Failed to parse config from {:?}: {}", path, err);
                AppConfig::default()
            }
        },
        Err(err) if err.kind() == std::io::ErrorKind::NotFound => {
            scrape_info!("No config at {:?}; using defaults", path);
            AppConfig::default()
        }
        Err(err) => {
            scrape_warn!("Failed to read config from {:?}: {}", path, err);
            AppConfig::default()
        }
    }
}
