use crate::llm::{Credentials, DEFAULT_MODEL};
use anyhow::{ensure, Context};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::PathBuf;

pub const KEY_API: &str = "investment_app_api_key";
pub const KEY_MODEL: &str = "investment_app_model";
pub const KEY_THEME: &str = "investment_app_theme";

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Theme {
    #[default]
    Dark,
    Light,
}

impl Theme {
    pub fn as_str(self) -> &'static str {
        match self {
            Theme::Dark => "dark",
            Theme::Light => "light",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value.trim() {
            "dark" => Some(Theme::Dark),
            "light" => Some(Theme::Light),
            _ => None,
        }
    }

    pub fn toggled(self) -> Self {
        match self {
            Theme::Dark => Theme::Light,
            Theme::Light => Theme::Dark,
        }
    }
}

/// Flat string key-value settings persisted as one JSON object.
///
/// A key seeded from the environment lives outside `values` and is never
/// written to disk.
#[derive(Debug, Clone)]
pub struct SettingsStore {
    path: Option<PathBuf>,
    values: BTreeMap<String, String>,
    env_api_key: Option<String>,
}

impl SettingsStore {
    /// Loads the file at `path`; a missing file is an empty store.
    pub fn open(path: impl Into<PathBuf>) -> anyhow::Result<Self> {
        let path = path.into();
        let values = match std::fs::read_to_string(&path) {
            Ok(text) if text.trim().is_empty() => BTreeMap::new(),
            Ok(text) => serde_json::from_str::<BTreeMap<String, String>>(&text)
                .with_context(|| format!("settings file is not a JSON string map: {}", path.display()))?,
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => BTreeMap::new(),
            Err(err) => {
                return Err(err).with_context(|| format!("failed to read {}", path.display()));
            }
        };

        tracing::debug!(path = %path.display(), keys = values.len(), "settings loaded");
        Ok(Self {
            path: Some(path),
            values,
            env_api_key: None,
        })
    }

    /// A store that never touches disk.
    pub fn in_memory() -> Self {
        Self {
            path: None,
            values: BTreeMap::new(),
            env_api_key: None,
        }
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.values.get(key).map(String::as_str)
    }

    pub fn credentials(&self) -> Credentials {
        Credentials {
            api_key: self
                .get(KEY_API)
                .filter(|k| !k.trim().is_empty())
                .or(self.env_api_key.as_deref())
                .unwrap_or_default()
                .to_string(),
            selected_model: self
                .get(KEY_MODEL)
                .filter(|m| !m.trim().is_empty())
                .unwrap_or(DEFAULT_MODEL)
                .to_string(),
        }
    }

    pub fn theme(&self) -> Theme {
        self.get(KEY_THEME).and_then(Theme::parse).unwrap_or_default()
    }

    /// Stores the API key and, when non-blank, the model. A blank key keeps
    /// the current one and is rejected only when there is none.
    pub fn save_credentials(&mut self, api_key: &str, model: &str) -> anyhow::Result<Credentials> {
        let api_key = api_key.trim();
        if api_key.is_empty() {
            ensure!(self.credentials().has_api_key(), "APIキーを入力してください。");
        } else {
            self.values.insert(KEY_API.to_string(), api_key.to_string());
        }
        let model = model.trim();
        if !model.is_empty() {
            self.values.insert(KEY_MODEL.to_string(), model.to_string());
        }
        self.flush()?;
        Ok(self.credentials())
    }

    pub fn save_theme(&mut self, theme: Theme) -> anyhow::Result<()> {
        self.values
            .insert(KEY_THEME.to_string(), theme.as_str().to_string());
        self.flush()
    }

    /// Fallback API key (e.g. from the environment). A stored key wins, and
    /// the seed is never flushed.
    pub fn seed_api_key(&mut self, api_key: &str) {
        let api_key = api_key.trim();
        self.env_api_key = (!api_key.is_empty()).then(|| api_key.to_string());
    }

    fn flush(&self) -> anyhow::Result<()> {
        let Some(path) = &self.path else {
            return Ok(());
        };
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("failed to create {}", parent.display()))?;
        }
        let text = serde_json::to_string_pretty(&self.values).context("settings serialize failed")?;
        std::fs::write(path, text).with_context(|| format!("failed to write {}", path.display()))?;
        tracing::debug!(path = %path.display(), "settings saved");
        Ok(())
    }
}
