use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use crate::error::{KassaError, Result};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Settings {
    pub data_dir: String,
    #[serde(default = "default_csv_pattern")]
    pub csv_pattern: String,
    #[serde(default = "default_csv_delimiter")]
    pub csv_delimiter: String,
}

fn default_csv_pattern() -> String {
    "hist*.csv".to_string()
}

fn default_csv_delimiter() -> String {
    ";".to_string()
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            data_dir: default_data_dir().to_string_lossy().to_string(),
            csv_pattern: default_csv_pattern(),
            csv_delimiter: default_csv_delimiter(),
        }
    }
}

impl Settings {
    pub fn delimiter_byte(&self) -> u8 {
        self.csv_delimiter.bytes().next().unwrap_or(b';')
    }
}

fn config_dir() -> PathBuf {
    if let Ok(dir) = std::env::var("KASSA_CONFIG_DIR") {
        return PathBuf::from(dir);
    }
    dirs::home_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(".config")
        .join("kassa")
}

fn settings_path() -> PathBuf {
    config_dir().join("settings.json")
}

fn default_data_dir() -> PathBuf {
    dirs::home_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("Documents")
        .join("kassa")
}

pub fn load_settings() -> Settings {
    let path = settings_path();
    if path.exists() {
        let content = std::fs::read_to_string(&path).unwrap_or_default();
        serde_json::from_str(&content).unwrap_or_default()
    } else {
        Settings::default()
    }
}

pub fn save_settings(settings: &Settings) -> Result<()> {
    let dir = config_dir();
    std::fs::create_dir_all(&dir)?;
    let json = serde_json::to_string_pretty(settings)
        .map_err(|e| KassaError::Settings(e.to_string()))?;
    std::fs::write(settings_path(), format!("{json}\n"))?;
    Ok(())
}

pub fn get_data_dir() -> PathBuf {
    PathBuf::from(&load_settings().data_dir)
}

pub fn shellexpand_path(path: &str) -> String {
    if path.starts_with('~') {
        if let Some(home) = dirs::home_dir() {
            return path.replacen('~', &home.to_string_lossy(), 1);
        }
    }
    std::fs::canonicalize(path)
        .unwrap_or_else(|_| PathBuf::from(path))
        .to_string_lossy()
        .to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_save_and_load_roundtrip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("settings.json");
        let settings = Settings {
            data_dir: "/tmp/test".to_string(),
            csv_pattern: "export*.csv".to_string(),
            csv_delimiter: ",".to_string(),
        };
        let json = serde_json::to_string_pretty(&settings).unwrap();
        std::fs::write(&path, &json).unwrap();
        let content = std::fs::read_to_string(&path).unwrap();
        let loaded: Settings = serde_json::from_str(&content).unwrap();
        assert_eq!(loaded.data_dir, "/tmp/test");
        assert_eq!(loaded.csv_pattern, "export*.csv");
        assert_eq!(loaded.delimiter_byte(), b',');
    }

    #[test]
    fn test_defaults() {
        let s = Settings::default();
        assert_eq!(s.csv_pattern, "hist*.csv");
        assert_eq!(s.delimiter_byte(), b';');
        assert!(!s.data_dir.is_empty());
    }

    #[test]
    fn test_load_merges_with_defaults() {
        let json = r#"{"data_dir": "/tmp/test"}"#;
        let s: Settings = serde_json::from_str(json).unwrap();
        assert_eq!(s.csv_pattern, "hist*.csv");
        assert_eq!(s.csv_delimiter, ";");
    }
}
