//! Configuration Management
//!
//! Loads the agent configuration from a JSON file, with environment
//! fallbacks for the common knobs so a bare `tabletalk` invocation works
//! with nothing but `GEMINI_API_KEY` set.
//!
//! # Resolution Precedence
//! 1. Explicit `--config` path (must exist)
//! 2. Default config file (`~/.config/tabletalk/config.json`)
//! 3. Environment variables only
//!
//! # Secrets
//! Secrets never need to live in the file: `api_key_env` / `password_env`
//! name an environment variable to resolve at load time instead.

use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

use crate::context::DEFAULT_MAX_CONTEXT;
use crate::engine::DataSource;
use crate::error::{Result, TabletalkError};
use crate::model::{GeminiModel, DEFAULT_BASE_URL, DEFAULT_MODEL};
use crate::pipeline::AgentOptions;
use crate::prompt::DEFAULT_GUIDANCE;

/// Default environment variable holding the model API key
pub const API_KEY_ENV: &str = "GEMINI_API_KEY";

/// Top-level agent configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Data source selection
    pub database: DatabaseConfig,

    /// Language model settings
    #[serde(default)]
    pub model: ModelConfig,

    /// Context cap (turns retained)
    #[serde(default = "default_max_context")]
    pub max_context: usize,

    /// Trailing turns visible to every prompt stage; absent = full context
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub prompt_window: Option<usize>,

    /// Deployment-specific table-selection guidance for the generation prompt
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub guidance: Option<String>,
}

const fn default_max_context() -> usize {
    DEFAULT_MAX_CONTEXT
}

/// Data source configuration, tagged by engine
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "engine", rename_all = "lowercase")]
pub enum DatabaseConfig {
    /// `SQLite` file-backed database
    Sqlite {
        /// Database file path (or `:memory:`)
        file: PathBuf,
    },

    /// `MySQL` client-server database
    Mysql {
        /// Hostname
        host: String,
        /// Port number
        #[serde(default = "default_mysql_port")]
        port: u16,
        /// Username
        user: String,
        /// Password (prefer `password_env`)
        #[serde(default, skip_serializing_if = "Option::is_none")]
        password: Option<String>,
        /// Environment variable name for the password
        #[serde(default, skip_serializing_if = "Option::is_none")]
        password_env: Option<String>,
        /// Database name
        database: String,
    },
}

const fn default_mysql_port() -> u16 {
    3306
}

/// Language model settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModelConfig {
    /// API key (prefer `api_key_env`)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_key: Option<String>,

    /// Environment variable name for the API key
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_key_env: Option<String>,

    /// Model name
    #[serde(default = "default_model_name")]
    pub model: String,

    /// Non-default API endpoint (proxies, tests)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub base_url: Option<String>,
}

fn default_model_name() -> String {
    DEFAULT_MODEL.to_string()
}

impl Default for ModelConfig {
    fn default() -> Self {
        Self { api_key: None, api_key_env: None, model: default_model_name(), base_url: None }
    }
}

impl ModelConfig {
    /// Resolve the API key: direct value first, then the environment
    pub fn resolve_api_key(&self) -> Result<String> {
        if let Some(key) = &self.api_key {
            return Ok(key.clone());
        }

        let env_var = self.api_key_env.as_deref().unwrap_or(API_KEY_ENV);
        std::env::var(env_var).map_err(|_| {
            TabletalkError::config_error(format!(
                "no API key configured and environment variable {env_var} is not set"
            ))
        })
    }
}

/// Get the default config file path (`~/.config/tabletalk/config.json`)
pub fn default_config_path() -> Result<PathBuf> {
    let config_dir = dirs::config_dir()
        .ok_or_else(|| TabletalkError::config_error("could not determine user config directory"))?;

    Ok(config_dir.join("tabletalk").join("config.json"))
}

impl Config {
    /// Load configuration
    ///
    /// An explicit path must exist and parse. Without one, the default
    /// config file is used when present, otherwise the environment.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        if let Some(path) = path {
            return Self::from_file(path);
        }

        let default_path = default_config_path()?;
        if default_path.exists() {
            Self::from_file(&default_path)
        } else {
            Self::from_env()
        }
    }

    /// Parse a config file
    pub fn from_file(path: &Path) -> Result<Self> {
        let raw = fs::read_to_string(path).map_err(|e| {
            TabletalkError::config_error(format!("could not read {}: {e}", path.display()))
        })?;

        serde_json::from_str(&raw).map_err(|e| {
            TabletalkError::config_error(format!("invalid config {}: {e}", path.display()))
        })
    }

    /// Build configuration from environment variables only
    ///
    /// `DATABASE_TYPE` selects the engine (default sqlite). SQLite reads
    /// `TABLETALK_DB`; MySQL reads the `MYSQL_*` family.
    pub fn from_env() -> Result<Self> {
        let database = match std::env::var("DATABASE_TYPE").as_deref() {
            Ok("mysql") => DatabaseConfig::Mysql {
                host: std::env::var("MYSQL_HOST").unwrap_or_else(|_| "localhost".to_string()),
                port: std::env::var("MYSQL_PORT")
                    .ok()
                    .and_then(|p| p.parse().ok())
                    .unwrap_or_else(default_mysql_port),
                user: std::env::var("MYSQL_USER").unwrap_or_else(|_| "root".to_string()),
                password: None,
                password_env: Some("MYSQL_PASSWORD".to_string()),
                database: std::env::var("MYSQL_DATABASE").map_err(|_| {
                    TabletalkError::config_error("MYSQL_DATABASE is required for the mysql engine")
                })?,
            },
            Ok("sqlite") | Err(_) => DatabaseConfig::Sqlite {
                file: std::env::var("TABLETALK_DB")
                    .map(PathBuf::from)
                    .map_err(|_| {
                        TabletalkError::config_error(
                            "TABLETALK_DB must point at the SQLite database file",
                        )
                    })?,
            },
            Ok(other) => {
                return Err(TabletalkError::config_error(format!(
                    "unsupported DATABASE_TYPE '{other}' (expected sqlite or mysql)"
                )));
            }
        };

        let model = ModelConfig {
            api_key: None,
            api_key_env: None,
            model: std::env::var("GEMINI_MODEL").unwrap_or_else(|_| default_model_name()),
            base_url: None,
        };

        Ok(Self {
            database,
            model,
            max_context: DEFAULT_MAX_CONTEXT,
            prompt_window: None,
            guidance: None,
        })
    }

    /// Construct the language model client
    pub fn build_model(&self) -> Result<GeminiModel> {
        let api_key = self.model.resolve_api_key()?;
        let base_url = self.model.base_url.as_deref().unwrap_or(DEFAULT_BASE_URL);

        Ok(GeminiModel::with_base_url(api_key, self.model.model.clone(), base_url))
    }

    /// Construct the data source
    pub fn build_data_source(&self) -> Result<DataSource> {
        match &self.database {
            DatabaseConfig::Sqlite { file } => {
                #[cfg(feature = "sqlite")]
                {
                    Ok(DataSource::SQLite(crate::engine::sqlite::SqliteExecutor::new(file)))
                }
                #[cfg(not(feature = "sqlite"))]
                {
                    let _ = file;
                    Err(TabletalkError::config_error("built without sqlite support"))
                }
            }
            DatabaseConfig::Mysql { host, port, user, password, password_env, database } => {
                #[cfg(feature = "mysql")]
                {
                    let password = resolve_password(password.as_deref(), password_env.as_deref())?;
                    Ok(DataSource::MySQL(crate::engine::mysql::MySqlExecutor::new(
                        host.clone(),
                        *port,
                        user.clone(),
                        password,
                        database.clone(),
                    )))
                }
                #[cfg(not(feature = "mysql"))]
                {
                    let _ = (host, port, user, password, password_env, database);
                    Err(TabletalkError::config_error("built without mysql support"))
                }
            }
        }
    }

    /// Agent tunables derived from this configuration
    #[must_use]
    pub fn agent_options(&self) -> AgentOptions {
        AgentOptions {
            max_context: self.max_context,
            prompt_window: self.prompt_window,
            guidance: self.guidance.clone().unwrap_or_else(|| DEFAULT_GUIDANCE.to_string()),
        }
    }
}

/// Resolve a password: direct value first, then the named environment variable
#[cfg(feature = "mysql")]
fn resolve_password(password: Option<&str>, password_env: Option<&str>) -> Result<String> {
    if let Some(password) = password {
        return Ok(password.to_string());
    }

    match password_env {
        Some(env_var) => std::env::var(env_var).map_err(|_| {
            TabletalkError::config_error(format!(
                "environment variable {env_var} not found for password"
            ))
        }),
        None => Ok(String::new()),
    }
}
