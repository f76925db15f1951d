// Load settings from ~/.byteforge/config.toml with environment fallbacks
//
// Precedence: environment variables > config file > built-in defaults.
// A missing config file is not an error.

use super::settings::Settings;
use anyhow::{Context, Result};
use std::path::PathBuf;

pub const CONFIG_DIR: &str = ".byteforge";
pub const CONFIG_FILE: &str = "config.toml";

pub fn default_config_path() -> Option<PathBuf> {
    dirs::home_dir().map(|home| home.join(CONFIG_DIR).join(CONFIG_FILE))
}

/// Load settings from the given path, or the default location when None.
pub fn load_settings(path: Option<PathBuf>) -> Result<Settings> {
    let path = path.or_else(default_config_path);

    let mut settings = match path {
        Some(ref p) if p.is_file() => {
            let raw = std::fs::read_to_string(p)
                .with_context(|| format!("failed to read config at {}", p.display()))?;
            let parsed: Settings = toml::from_str(&raw)
                .with_context(|| format!("invalid config at {}", p.display()))?;
            tracing::debug!(path = %p.display(), "loaded config file");
            parsed
        }
        _ => {
            tracing::debug!("no config file found, using defaults");
            Settings::default()
        }
    };

    apply_env_overrides(&mut settings);
    Ok(settings)
}

fn apply_env_overrides(settings: &mut Settings) {
    if let Ok(key) = std::env::var("BYTEFORGE_API_KEY") {
        if !key.is_empty() {
            settings.api_key = key;
        }
    }
    if let Ok(url) = std::env::var("BYTEFORGE_API_URL") {
        if !url.is_empty() {
            settings.api_url = url;
        }
    }
    if let Ok(model) = std::env::var("BYTEFORGE_MODEL") {
        if !model.is_empty() {
            settings.model = model;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_missing_file_yields_defaults() {
        let settings = load_settings(Some(PathBuf::from("/no/such/config.toml"))).unwrap();
        assert!(settings.model.len() > 0);
    }

    #[test]
    fn test_loads_from_file() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(&path, "api_key = \"sk-from-file\"\nmax_iterations = 7\n").unwrap();

        let settings = load_settings(Some(path)).unwrap();
        assert_eq!(settings.api_key, "sk-from-file");
        assert_eq!(settings.max_iterations, 7);
    }

    #[test]
    fn test_invalid_toml_is_an_error() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(&path, "max_iterations = \"lots\"").unwrap();
        assert!(load_settings(Some(path)).is_err());
    }
}
