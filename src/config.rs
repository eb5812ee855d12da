//! Runtime configuration from `CARDIORISK_*` environment variables.

use std::path::PathBuf;

/// Where log output goes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogMode {
    File,
    Stdout,
    /// File when stdout is a terminal (log lines would corrupt the TUI),
    /// stdout otherwise.
    Auto,
}

impl LogMode {
    fn parse(raw: &str) -> Self {
        match raw {
            "file" => Self::File,
            "stdout" => Self::Stdout,
            _ => Self::Auto,
        }
    }

    /// Resolve `Auto` against whether stdout is interactive.
    #[must_use]
    pub fn use_file(self, interactive: bool) -> bool {
        match self {
            Self::File => true,
            Self::Stdout => false,
            Self::Auto => interactive,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AppConfig {
    /// Directory holding columns.json, scaler.json and model.json
    pub model_path: PathBuf,
    pub allow_unsigned_models: bool,
    /// Base64 Ed25519 verifying key; defaults to `<model_path>/model.pub`
    pub model_pubkey_file: Option<PathBuf>,
    pub log_mode: LogMode,
    pub log_file: PathBuf,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            model_path: PathBuf::from("models"),
            allow_unsigned_models: false,
            model_pubkey_file: None,
            log_mode: LogMode::Auto,
            log_file: PathBuf::from("cardiorisk.log"),
        }
    }
}

/// `1`, `true`, `TRUE`, `yes` and `YES` are true; anything else is false.
#[must_use]
pub fn parse_bool(value: &str) -> bool {
    matches!(value, "1" | "true" | "TRUE" | "yes" | "YES")
}

impl AppConfig {
    /// Read configuration from the process environment.
    #[must_use]
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Read configuration through an arbitrary variable lookup.
    pub fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let defaults = Self::default();
        Self {
            model_path: lookup("CARDIORISK_MODEL_PATH")
                .map(PathBuf::from)
                .unwrap_or(defaults.model_path),
            allow_unsigned_models: lookup("CARDIORISK_ALLOW_UNSIGNED_MODELS")
                .map(|v| parse_bool(&v))
                .unwrap_or(defaults.allow_unsigned_models),
            model_pubkey_file: lookup("CARDIORISK_MODEL_PUBKEY_B64_FILE")
                .map(|v| PathBuf::from(v.trim())),
            log_mode: lookup("CARDIORISK_LOG_MODE")
                .map(|v| LogMode::parse(&v))
                .unwrap_or(defaults.log_mode),
            log_file: lookup("CARDIORISK_LOG_FILE")
                .map(PathBuf::from)
                .unwrap_or(defaults.log_file),
        }
    }
}
