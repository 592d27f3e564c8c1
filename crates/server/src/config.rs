use std::{collections::HashMap, fs};

use tracing::warn;

const SETTINGS_FILE: &str = "server.toml";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Settings {
    pub server_bind: String,
    pub database_url: String,
    pub cors_allowed_origin: Option<String>,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            server_bind: "127.0.0.1:3000".into(),
            database_url: "sqlite://./data/todos.db".into(),
            cors_allowed_origin: None,
        }
    }
}

pub fn load_settings() -> Settings {
    let file_raw = fs::read_to_string(SETTINGS_FILE).ok();
    settings_from_sources(file_raw.as_deref(), |key| std::env::var(key).ok())
}

/// Layers `server.toml` keys and then environment variables over the defaults.
/// Later sources win; `APP__*` names win over the short names.
pub(crate) fn settings_from_sources(
    file_raw: Option<&str>,
    env: impl Fn(&str) -> Option<String>,
) -> Settings {
    let mut settings = Settings::default();

    if let Some(raw) = file_raw {
        match toml::from_str::<HashMap<String, String>>(raw) {
            Ok(file_cfg) => {
                if let Some(v) = file_cfg.get("bind_addr") {
                    settings.server_bind = v.clone();
                }
                if let Some(v) = file_cfg.get("database_url") {
                    settings.database_url = v.clone();
                }
                if let Some(v) = file_cfg.get("cors_allowed_origin") {
                    settings.cors_allowed_origin = Some(v.clone());
                }
            }
            Err(error) => warn!(%error, file = SETTINGS_FILE, "ignoring unparseable settings file"),
        }
    }

    for key in ["SERVER_BIND", "APP__BIND_ADDR"] {
        if let Some(v) = env(key) {
            settings.server_bind = v;
        }
    }
    for key in ["DATABASE_URL", "APP__DATABASE_URL"] {
        if let Some(v) = env(key) {
            settings.database_url = v;
        }
    }
    if let Some(v) = env("APP__CORS_ALLOWED_ORIGIN") {
        settings.cors_allowed_origin = Some(v).filter(|origin| !origin.trim().is_empty());
    }

    settings
}

/// Turns a bare file path into a `sqlite://` url; urls pass through.
pub fn normalize_database_url(raw_database_url: &str) -> String {
    let raw_database_url = raw_database_url.trim();

    if raw_database_url.is_empty() {
        return Settings::default().database_url;
    }

    if raw_database_url.starts_with("sqlite:") || raw_database_url.contains("://") {
        return raw_database_url.to_string();
    }

    format!("sqlite://{}", raw_database_url.replace('\\', "/"))
}

#[cfg(test)]
#[path = "tests/config_tests.rs"]
mod tests;
