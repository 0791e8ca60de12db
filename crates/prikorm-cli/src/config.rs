//! Persistent CLI configuration.

use std::path::{Path, PathBuf};

use prikorm_core::config::{RemoteConfig, SUPABASE_ANON_KEY_ENV, SUPABASE_URL_ENV};
use prikorm_core::util::normalize_text_option;
use serde::{Deserialize, Serialize};

const CONFIG_FILE_NAME: &str = "cli-config.json";

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct CliConfig {
    #[serde(default = "default_config_version")]
    pub version: u32,
    #[serde(default)]
    pub supabase_url: Option<String>,
    #[serde(default)]
    pub supabase_anon_key: Option<String>,
    #[serde(default)]
    pub table: Option<String>,
}

const fn default_config_version() -> u32 {
    1
}

pub fn default_config_path() -> PathBuf {
    dirs::config_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("prikorm")
        .join(CONFIG_FILE_NAME)
}

impl CliConfig {
    pub fn load() -> Result<Self, String> {
        Self::load_from_path(&default_config_path())
    }

    pub fn load_from_path(path: &Path) -> Result<Self, String> {
        if !path.exists() {
            return Ok(Self::default());
        }

        let raw = std::fs::read_to_string(path)
            .map_err(|error| format!("Failed to read config at {}: {}", path.display(), error))?;
        let mut config = serde_json::from_str::<Self>(&raw)
            .map_err(|error| format!("Failed to parse config at {}: {}", path.display(), error))?;
        config.normalize();
        Ok(config)
    }

    pub fn save_to_path(&self, path: &Path) -> Result<(), String> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(|error| {
                format!(
                    "Failed to create config directory {}: {}",
                    parent.display(),
                    error
                )
            })?;
        }

        let mut normalized = self.clone();
        normalized.normalize();
        let serialized = serde_json::to_string_pretty(&normalized)
            .map_err(|error| format!("Failed to serialize config: {error}"))?;
        std::fs::write(path, serialized)
            .map_err(|error| format!("Failed to write config at {}: {}", path.display(), error))
    }

    /// Effective remote settings: environment first, then the saved file.
    pub fn resolve_remote(
        &self,
        lookup: impl Fn(&str) -> Option<String>,
    ) -> Result<Option<RemoteConfig>, String> {
        let url = normalize_text_option(lookup(SUPABASE_URL_ENV))
            .or_else(|| normalize_text_option(self.supabase_url.clone()));
        let anon_key = normalize_text_option(lookup(SUPABASE_ANON_KEY_ENV))
            .or_else(|| normalize_text_option(self.supabase_anon_key.clone()));

        match (url, anon_key) {
            (Some(url), Some(anon_key)) => RemoteConfig::new(url, anon_key, self.table.clone())
                .map(Some)
                .map_err(|error| error.to_string()),
            (None, None) => Ok(None),
            (Some(_), None) => Err(format!("{SUPABASE_ANON_KEY_ENV} is missing")),
            (None, Some(_)) => Err(format!("{SUPABASE_URL_ENV} is missing")),
        }
    }

    fn normalize(&mut self) {
        self.supabase_url = normalize_text_option(self.supabase_url.clone())
            .map(|url| url.trim_end_matches('/').to_string());
        self.supabase_anon_key = normalize_text_option(self.supabase_anon_key.clone());
        self.table = normalize_text_option(self.table.clone());
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn config_roundtrip_normalizes_values() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join(CONFIG_FILE_NAME);

        let config = CliConfig {
            version: 1,
            supabase_url: Some(" https://project.supabase.co/ ".to_string()),
            supabase_anon_key: Some(" anon-key ".to_string()),
            table: Some("  ".to_string()),
        };
        config.save_to_path(&path).unwrap();

        let loaded = CliConfig::load_from_path(&path).unwrap();
        assert_eq!(
            loaded.supabase_url.as_deref(),
            Some("https://project.supabase.co")
        );
        assert_eq!(loaded.supabase_anon_key.as_deref(), Some("anon-key"));
        assert_eq!(loaded.table, None);
    }

    #[test]
    fn missing_file_loads_default() {
        let dir = tempfile::tempdir().unwrap();
        let loaded = CliConfig::load_from_path(&dir.path().join("absent.json")).unwrap();
        assert_eq!(loaded, CliConfig::default());
    }

    #[test]
    fn environment_overrides_saved_values() {
        let config = CliConfig {
            version: 1,
            supabase_url: Some("https://saved.supabase.co".to_string()),
            supabase_anon_key: Some("saved-key".to_string()),
            table: Some("families".to_string()),
        };

        let remote = config
            .resolve_remote(|name| {
                (name == SUPABASE_URL_ENV).then(|| "https://env.supabase.co".to_string())
            })
            .unwrap()
            .unwrap();
        assert_eq!(remote.url, "https://env.supabase.co");
        assert_eq!(remote.anon_key, "saved-key");
        assert_eq!(remote.table, "families");
    }

    #[test]
    fn partial_remote_settings_are_rejected() {
        let config = CliConfig {
            supabase_url: Some("https://saved.supabase.co".to_string()),
            ..CliConfig::default()
        };
        assert!(config.resolve_remote(|_| None).is_err());
        assert_eq!(CliConfig::default().resolve_remote(|_| None).unwrap(), None);
    }
}
