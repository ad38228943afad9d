use std::{collections::HashMap, fs, path::Path};

use serde::Deserialize;
use shared::domain::DEFAULT_PAGE_SIZE;

pub const DEFAULT_SETTINGS_FILE: &str = "shop.toml";

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct ClientSettings {
    pub api_base_url: String,
    pub page_size: u32,
    pub request_timeout_seconds: Option<u64>,
    pub store_url: String,
}

impl Default for ClientSettings {
    fn default() -> Self {
        Self {
            api_base_url: "http://127.0.0.1:8000/api".into(),
            page_size: DEFAULT_PAGE_SIZE,
            request_timeout_seconds: None,
            store_url: "sqlite://./data/shop.db".into(),
        }
    }
}

pub fn load_settings() -> ClientSettings {
    load_settings_from(Path::new(DEFAULT_SETTINGS_FILE), |key| std::env::var(key).ok())
}

/// Defaults, then the flat TOML file at `path`, then environment variables.
pub fn load_settings_from(path: &Path, env: impl Fn(&str) -> Option<String>) -> ClientSettings {
    let mut settings = ClientSettings::default();

    if let Ok(raw) = fs::read_to_string(path) {
        if let Ok(file_cfg) = toml::from_str::<HashMap<String, toml::Value>>(&raw) {
            if let Some(v) = file_cfg.get("api_base_url").and_then(toml::Value::as_str) {
                settings.api_base_url = v.to_string();
            }
            if let Some(v) = file_cfg.get("page_size").and_then(toml::Value::as_integer) {
                apply_page_size(&mut settings, &v.to_string());
            }
            if let Some(v) = file_cfg
                .get("request_timeout_seconds")
                .and_then(toml::Value::as_integer)
            {
                apply_timeout(&mut settings, &v.to_string());
            }
            if let Some(v) = file_cfg.get("store_url").and_then(toml::Value::as_str) {
                settings.store_url = v.to_string();
            }
        }
    }

    if let Some(v) = env("SHOP_API_URL") {
        settings.api_base_url = v;
    }
    if let Some(v) = env("APP__API_BASE_URL") {
        settings.api_base_url = v;
    }

    if let Some(v) = env("APP__PAGE_SIZE") {
        apply_page_size(&mut settings, &v);
    }

    if let Some(v) = env("APP__REQUEST_TIMEOUT_SECONDS") {
        apply_timeout(&mut settings, &v);
    }

    if let Some(v) = env("SHOP_STORE_URL") {
        settings.store_url = v;
    }
    if let Some(v) = env("APP__STORE_URL") {
        settings.store_url = v;
    }

    settings.api_base_url = settings.api_base_url.trim().trim_end_matches('/').to_string();
    settings.store_url = normalize_store_url(&settings.store_url);
    settings
}

fn apply_page_size(settings: &mut ClientSettings, raw: &str) {
    if let Ok(parsed) = raw.trim().parse::<u32>() {
        if parsed > 0 {
            settings.page_size = parsed;
        }
    }
}

fn apply_timeout(settings: &mut ClientSettings, raw: &str) {
    if let Ok(parsed) = raw.trim().parse::<u64>() {
        settings.request_timeout_seconds = (parsed > 0).then_some(parsed);
    }
}

pub fn normalize_store_url(raw_store_url: &str) -> String {
    let raw_store_url = raw_store_url.trim();

    if raw_store_url.is_empty() {
        return ClientSettings::default().store_url;
    }

    if raw_store_url.starts_with("sqlite::memory:")
        || raw_store_url.starts_with("sqlite://")
        || raw_store_url.contains("://")
    {
        return raw_store_url.to_string();
    }

    if let Some(path) = raw_store_url.strip_prefix("sqlite:") {
        let path = path.replace('\\', "/");
        return format!("sqlite://{path}");
    }

    format!("sqlite://{}", raw_store_url.replace('\\', "/"))
}
