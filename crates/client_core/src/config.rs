use std::{fs, str::FromStr, time::Duration};

use serde::Deserialize;
use tracing::warn;

use crate::controller::SyncStrategy;

const SETTINGS_FILE: &str = "client.toml";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClientSettings {
    pub server_url: String,
    pub request_timeout: Duration,
    pub sync_strategy: SyncStrategy,
}

impl Default for ClientSettings {
    fn default() -> Self {
        Self {
            server_url: "http://127.0.0.1:3000".into(),
            request_timeout: Duration::from_secs(10),
            sync_strategy: SyncStrategy::Refetch,
        }
    }
}

#[derive(Debug, Default, Deserialize)]
struct SettingsFile {
    server_url: Option<String>,
    request_timeout_secs: Option<u64>,
    sync_strategy: Option<SyncStrategy>,
}

pub fn load_client_settings() -> ClientSettings {
    let file_raw = fs::read_to_string(SETTINGS_FILE).ok();
    client_settings_from_sources(file_raw.as_deref(), |key| std::env::var(key).ok())
}

/// Layers `client.toml` and then `TODO_*` environment variables over the
/// defaults. Malformed values are logged and skipped.
pub fn client_settings_from_sources(
    file_raw: Option<&str>,
    env: impl Fn(&str) -> Option<String>,
) -> ClientSettings {
    let mut settings = ClientSettings::default();

    if let Some(raw) = file_raw {
        match toml::from_str::<SettingsFile>(raw) {
            Ok(file) => {
                if let Some(v) = file.server_url {
                    settings.server_url = v;
                }
                match file.request_timeout_secs {
                    Some(0) => warn!(file = SETTINGS_FILE, "ignoring zero request_timeout_secs"),
                    Some(v) => settings.request_timeout = Duration::from_secs(v),
                    None => {}
                }
                if let Some(v) = file.sync_strategy {
                    settings.sync_strategy = v;
                }
            }
            Err(error) => warn!(%error, file = SETTINGS_FILE, "ignoring unparseable settings file"),
        }
    }

    if let Some(v) = env("TODO_SERVER_URL") {
        settings.server_url = v;
    }
    if let Some(v) = env("TODO_REQUEST_TIMEOUT_SECS") {
        match v.parse::<u64>() {
            Ok(secs) if secs > 0 => settings.request_timeout = Duration::from_secs(secs),
            _ => warn!(value = %v, "ignoring invalid TODO_REQUEST_TIMEOUT_SECS"),
        }
    }
    if let Some(v) = env("TODO_SYNC_STRATEGY") {
        match SyncStrategy::from_str(&v) {
            Ok(strategy) => settings.sync_strategy = strategy,
            Err(error) => warn!(%error, "ignoring invalid TODO_SYNC_STRATEGY"),
        }
    }

    settings
}
