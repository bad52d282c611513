use anyhow::{Context, Result};
use serde::Deserialize;
use std::path::Path;

#[derive(Debug, Deserialize, Default)]
#[serde(default)]
pub struct FileConfig {
    // Core settings (can override CLI)
    pub catalog_db: Option<String>,
    pub library_dir: Option<String>,
    pub downloads_dir: Option<String>,
    pub import_timeout_sec: Option<u64>,
    pub http_timeout_sec: Option<u64>,

    // Session settings
    pub session: Option<SessionConfig>,
}

#[derive(Debug, Deserialize, Default, Clone)]
#[serde(default)]
pub struct SessionConfig {
    pub progression_flush_interval_ms: Option<u64>,
}

impl FileConfig {
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {:?}", path))?;
        toml::from_str(&content).with_context(|| format!("Failed to parse config file: {:?}", path))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_load_partial_config() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(
            &path,
            r#"
library_dir = "/data/library"
import_timeout_sec = 30

[session]
progression_flush_interval_ms = 500
"#,
        )
        .unwrap();

        let config = FileConfig::load(&path).unwrap();
        assert_eq!(config.library_dir.as_deref(), Some("/data/library"));
        assert_eq!(config.import_timeout_sec, Some(30));
        assert_eq!(config.catalog_db, None);
        assert_eq!(
            config.session.unwrap().progression_flush_interval_ms,
            Some(500)
        );
    }

    #[test]
    fn test_load_missing_file() {
        assert!(FileConfig::load(Path::new("/nope/config.toml")).is_err());
    }
}
