use std::{
    collections::HashMap,
    fs,
    path::{Path, PathBuf},
    time::Duration,
};

use anyhow::Context;

pub const DEFAULT_SETTINGS_FILE: &str = "fortune.toml";
pub const DEFAULT_CLOUD_NAME: &str = "dpsu7sqdk";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClientSettings {
    pub api_base_url: String,
    pub asset_host_base_url: String,
    pub cloud_name: String,
    pub upload_preset: String,
    pub download_dir: PathBuf,
    pub download_file_name: String,
    pub share_intent_url: String,
    pub share_text: String,
    pub request_timeout_secs: u64,
}

impl Default for ClientSettings {
    fn default() -> Self {
        Self {
            api_base_url: "http://127.0.0.1:3000".into(),
            asset_host_base_url: "https://api.cloudinary.com/v1_1".into(),
            cloud_name: DEFAULT_CLOUD_NAME.into(),
            upload_preset: "fortune".into(),
            download_dir: PathBuf::from("."),
            download_file_name: "magic-card.png".into(),
            share_intent_url: "https://twitter.com/intent/tweet".into(),
            share_text: "Check out this magical fortune card I generated! 🧙‍♂️✨".into(),
            request_timeout_secs: 30,
        }
    }
}

impl ClientSettings {
    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs.max(1))
    }

    /// Endpoint the rendered card is uploaded to.
    pub fn upload_url(&self) -> String {
        format!(
            "{}/{}/image/upload",
            self.asset_host_base_url, self.cloud_name
        )
    }

    fn apply_file_table(&mut self, table: &HashMap<String, String>) {
        if let Some(v) = table.get("api_base_url") {
            self.api_base_url = v.clone();
        }
        if let Some(v) = table.get("asset_host_base_url") {
            self.asset_host_base_url = v.clone();
        }
        if let Some(v) = table.get("cloud_name") {
            self.cloud_name = v.clone();
        }
        if let Some(v) = table.get("upload_preset") {
            self.upload_preset = v.clone();
        }
        if let Some(v) = table.get("download_dir") {
            self.download_dir = PathBuf::from(v);
        }
        if let Some(v) = table.get("download_file_name") {
            self.download_file_name = v.clone();
        }
        if let Some(v) = table.get("share_intent_url") {
            self.share_intent_url = v.clone();
        }
        if let Some(v) = table.get("share_text") {
            self.share_text = v.clone();
        }
        if let Some(v) = table.get("request_timeout_secs") {
            if let Ok(parsed) = v.parse::<u64>() {
                self.request_timeout_secs = parsed;
            }
        }
    }

    /// Later names win, so the `APP__*` spelling overrides the bare one.
    pub fn apply_env_with(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        if let Some(v) = lookup("FORTUNE_API_BASE_URL") {
            self.api_base_url = v;
        }
        if let Some(v) = lookup("APP__API_BASE_URL") {
            self.api_base_url = v;
        }

        if let Some(v) = lookup("APP__ASSET_HOST_BASE_URL") {
            self.asset_host_base_url = v;
        }

        if let Some(v) = lookup("CLOUDINARY_API_KEY") {
            self.cloud_name = v;
        }
        if let Some(v) = lookup("CLOUDINARY_CLOUD_NAME") {
            self.cloud_name = v;
        }
        if let Some(v) = lookup("APP__CLOUD_NAME") {
            self.cloud_name = v;
        }

        if let Some(v) = lookup("APP__UPLOAD_PRESET") {
            self.upload_preset = v;
        }

        if let Some(v) = lookup("APP__DOWNLOAD_DIR") {
            self.download_dir = PathBuf::from(v);
        }

        if let Some(v) = lookup("APP__REQUEST_TIMEOUT_SECS") {
            if let Ok(parsed) = v.parse::<u64>() {
                self.request_timeout_secs = parsed;
            }
        }
    }

    /// Trims base URLs and falls back to defaults for blank values.
    pub fn normalized(mut self) -> Self {
        let defaults = Self::default();
        self.api_base_url = normalize_base_url(&self.api_base_url, &defaults.api_base_url);
        self.asset_host_base_url =
            normalize_base_url(&self.asset_host_base_url, &defaults.asset_host_base_url);
        self.share_intent_url =
            normalize_base_url(&self.share_intent_url, &defaults.share_intent_url);

        let cloud_name = self.cloud_name.trim();
        self.cloud_name = if cloud_name.is_empty() {
            defaults.cloud_name
        } else {
            cloud_name.to_string()
        };

        if self.upload_preset.trim().is_empty() {
            self.upload_preset = defaults.upload_preset;
        }
        if self.download_file_name.trim().is_empty() {
            self.download_file_name = defaults.download_file_name;
        }
        self
    }
}

fn normalize_base_url(raw: &str, fallback: &str) -> String {
    let trimmed = raw.trim().trim_end_matches('/');
    if trimmed.is_empty() {
        return fallback.to_string();
    }
    trimmed.to_string()
}

/// Defaults, then `fortune.toml` in the working directory if present, then the environment.
pub fn load_settings() -> ClientSettings {
    let mut settings = ClientSettings::default();

    if let Ok(raw) = fs::read_to_string(DEFAULT_SETTINGS_FILE) {
        if let Ok(table) = toml::from_str::<HashMap<String, String>>(&raw) {
            settings.apply_file_table(&table);
        }
    }

    settings.apply_env_with(|name| std::env::var(name).ok());
    settings.normalized()
}

/// Like [`load_settings`], but an explicitly named file must exist and parse.
pub fn load_settings_from(path: &Path) -> anyhow::Result<ClientSettings> {
    let raw = fs::read_to_string(path)
        .with_context(|| format!("failed to read settings file '{}'", path.display()))?;
    let table = toml::from_str::<HashMap<String, String>>(&raw)
        .with_context(|| format!("failed to parse settings file '{}'", path.display()))?;

    let mut settings = ClientSettings::default();
    settings.apply_file_table(&table);
    settings.apply_env_with(|name| std::env::var(name).ok());
    Ok(settings.normalized())
}
