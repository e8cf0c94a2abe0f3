//! Connection Configuration
//!
//! Named connections describe how to reach an LLM endpoint. Each one is a
//! JSON file under the config root:
//!
//! ```text
//! $TASKLINE_CONFIG_DIR/connections/<name>.json   (when the variable is set)
//! ~/.config/taskline/connections/<name>.json     (otherwise)
//! ```
//!
//! A file holds `provider`, `model`, `base_url` and `api_key`. Files are
//! created as templates by [`ConnectionStore::initialize`] and filled in by
//! the user; [`ConnectionStore::get`] rejects files that are still empty.

use std::fs;
use std::path::{Path, PathBuf};

use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::error::{Result, TasklineError};

/// Connection used when a step names none
pub const DEFAULT_CONNECTION: &str = "default";

/// Environment variable overriding the config root
pub const CONFIG_DIR_ENV: &str = "TASKLINE_CONFIG_DIR";

static CONNECTION_NAME: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[A-Za-z0-9_.-]+$").expect("connection name pattern is valid"));

fn default_provider() -> String {
    "openai".to_string()
}

/// How to reach one LLM endpoint
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Connection {
    /// Provider kind (`openai` or `mock`)
    #[serde(default = "default_provider")]
    pub provider: String,

    /// Model name sent with every request
    pub model: String,

    /// Endpoint root, e.g. `https://api.openai.com/v1`
    pub base_url: String,

    pub api_key: String,
}

impl Connection {
    /// Build and validate a connection
    pub fn new(
        provider: impl Into<String>,
        model: impl Into<String>,
        base_url: impl Into<String>,
        api_key: impl Into<String>,
    ) -> Result<Self> {
        Self {
            provider: provider.into(),
            model: model.into(),
            base_url: base_url.into(),
            api_key: api_key.into(),
        }
        .validated()
    }

    /// In-process connection backed by the mock provider
    pub fn mock(model: impl Into<String>) -> Self {
        Self {
            provider: "mock".to_string(),
            model: model.into(),
            base_url: String::new(),
            api_key: String::new(),
        }
    }

    /// Template written by `initialize`
    fn template() -> Self {
        Self {
            provider: default_provider(),
            model: String::new(),
            base_url: String::new(),
            api_key: String::new(),
        }
    }

    pub fn is_mock(&self) -> bool {
        self.provider.eq_ignore_ascii_case("mock")
    }

    /// Trim every field and check the ones the provider needs
    fn validated(self) -> Result<Self> {
        let provider = self.provider.trim().to_lowercase();
        let model = self.model.trim().to_string();
        let api_key = self.api_key.trim().to_string();
        let base_url = self.base_url.trim().trim_end_matches('/').to_string();

        if provider.is_empty() {
            return Err(invalid("provider must not be empty"));
        }
        if model.is_empty() {
            return Err(invalid("model must not be empty"));
        }

        let connection = Self {
            provider,
            model,
            base_url,
            api_key,
        };
        if connection.is_mock() {
            return Ok(connection);
        }

        if connection.base_url.is_empty() {
            return Err(invalid("base_url must not be empty"));
        }
        url::Url::parse(&connection.base_url).map_err(|e| {
            invalid(format!(
                "base_url '{}' is not a valid URL: {}",
                connection.base_url, e
            ))
        })?;
        if connection.api_key.is_empty() {
            return Err(invalid("api_key must not be empty"));
        }

        Ok(connection)
    }
}

fn invalid(details: impl Into<String>) -> TasklineError {
    TasklineError::InvalidConnection {
        details: details.into(),
    }
}

/// Reads and writes named connection files
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConnectionStore {
    root: PathBuf,
}

impl ConnectionStore {
    /// Store rooted at an explicit directory
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// Store rooted at `$TASKLINE_CONFIG_DIR`, or the platform config dir
    ///
    /// Returns `~/.config/taskline/` on Unix, `%APPDATA%/taskline/` on Windows
    pub fn from_env() -> Self {
        match std::env::var_os(CONFIG_DIR_ENV) {
            Some(dir) if !dir.is_empty() => Self::new(dir),
            _ => Self::new(
                dirs::config_dir()
                    .unwrap_or_else(|| PathBuf::from("."))
                    .join("taskline"),
            ),
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn connections_dir(&self) -> PathBuf {
        self.root.join("connections")
    }

    /// Path of a connection file; rejects names that are not plain file stems
    pub fn connection_path(&self, name: &str) -> Result<PathBuf> {
        if !CONNECTION_NAME.is_match(name) || name.chars().all(|c| c == '.') {
            return Err(TasklineError::InvalidConnectionName {
                name: name.to_string(),
            });
        }
        Ok(self.connections_dir().join(format!("{}.json", name)))
    }

    pub fn exists(&self, name: &str) -> Result<bool> {
        Ok(self.connection_path(name)?.is_file())
    }

    /// Write a template file for `name`
    ///
    /// An existing file is left untouched. Returns the file path.
    pub fn initialize(&self, name: &str) -> Result<PathBuf> {
        let path = self.connection_path(name)?;
        if path.exists() {
            tracing::debug!(
                connection = name,
                path = %path.display(),
                "Connection file already exists"
            );
            return Ok(path);
        }

        fs::create_dir_all(self.connections_dir())?;
        let content = serde_json::to_string_pretty(&Connection::template())?;
        fs::write(&path, content)?;

        tracing::info!(connection = name, path = %path.display(), "Connection template written");
        Ok(path)
    }

    /// Load and validate a connection
    pub fn get(&self, name: &str) -> Result<Connection> {
        let path = self.connection_path(name)?;
        if !path.is_file() {
            return Err(TasklineError::ConnectionNotFound {
                name: name.to_string(),
                path,
            });
        }

        let illegal = |details: String| TasklineError::IllegalConfiguration {
            name: name.to_string(),
            path: path.clone(),
            details,
        };

        let content = fs::read_to_string(&path)?;
        let connection: Connection =
            serde_json::from_str(&content).map_err(|e| illegal(e.to_string()))?;
        connection.validated().map_err(|err| match err {
            TasklineError::InvalidConnection { details } => illegal(details),
            other => other,
        })
    }

    /// Write a connection file, replacing any existing one
    pub fn save(&self, name: &str, connection: &Connection) -> Result<PathBuf> {
        let path = self.connection_path(name)?;
        fs::create_dir_all(self.connections_dir())?;
        fs::write(&path, serde_json::to_string_pretty(connection)?)?;
        Ok(path)
    }
}

/// Mask an API key for display
///
/// Shows first N chars + asterisks, e.g. "sk-proj***"
pub fn mask_api_key(key: &str, visible_chars: usize) -> String {
    if key.is_empty() {
        return String::new();
    }

    let visible: String = key.chars().take(visible_chars).collect();
    format!("{}***", visible)
}
