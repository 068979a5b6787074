//! Configuration loading for the host.
//!
//! Sources, lowest to highest priority:
//! 1. Built-in [`SessionConfig`] defaults
//! 2. User config file (`~/.config/parallax/config.toml`)
//! 3. Project-local `./parallax.toml`
//! 4. Environment variables (`PARALLAX_AUTO_SAVE`, `PARALLAX_RENDERER`,
//!    `PARALLAX_DATA_DIR`)
//!
//! Files are merged key by key, so a local file only needs the keys it
//! overrides.

use std::path::{Path, PathBuf};

use parallax_core::config::SessionConfig;
use thiserror::Error;
use toml::Table;

const LOCAL_CONFIG: &str = "parallax.toml";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("cannot read {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid TOML in {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },

    #[error("invalid configuration: {0}")]
    Invalid(#[from] toml::de::Error),
}

/// Path of the per-user config file, if the platform has a config dir.
pub fn user_config_path() -> Option<PathBuf> {
    dirs::config_dir().map(|dir| dir.join("parallax").join("config.toml"))
}

/// Load configuration from every source.
pub fn load() -> Result<SessionConfig, ConfigError> {
    let mut files = Vec::new();
    if let Some(user) = user_config_path() {
        files.push(user);
    }
    files.push(PathBuf::from(LOCAL_CONFIG));
    load_from(&files, |key| std::env::var(key).ok())
}

/// Merge the given files (later wins) and environment lookups.
///
/// Missing files are skipped; unreadable or malformed ones are errors.
pub fn load_from(
    files: &[PathBuf],
    env: impl Fn(&str) -> Option<String>,
) -> Result<SessionConfig, ConfigError> {
    let mut merged = Table::new();
    for path in files {
        if let Some(table) = read_table(path)? {
            tracing::debug!(path = %path.display(), "merging config file");
            merged.extend(table);
        }
    }
    apply_env_overrides(&mut merged, env);

    let config: SessionConfig = toml::Value::Table(merged).try_into()?;
    tracing::debug!(?config, "loaded configuration");
    Ok(config)
}

fn read_table(path: &Path) -> Result<Option<Table>, ConfigError> {
    let text = match std::fs::read_to_string(path) {
        Ok(text) => text,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
        Err(source) => {
            return Err(ConfigError::Read {
                path: path.to_path_buf(),
                source,
            });
        }
    };
    text.parse::<Table>()
        .map(Some)
        .map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })
}

fn apply_env_overrides(table: &mut Table, env: impl Fn(&str) -> Option<String>) {
    if let Some(value) = env("PARALLAX_AUTO_SAVE") {
        let enabled = matches!(value.to_ascii_lowercase().as_str(), "1" | "true" | "yes" | "on");
        table.insert("auto_save".into(), toml::Value::Boolean(enabled));
    }
    if let Some(value) = env("PARALLAX_RENDERER") {
        table.insert("renderer".into(), toml::Value::String(value.to_ascii_lowercase()));
    }
    if let Some(value) = env("PARALLAX_DATA_DIR") {
        table.insert("data_dir".into(), toml::Value::String(value));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use parallax_core::config::RendererMode;

    fn no_env(_: &str) -> Option<String> {
        None
    }

    #[test]
    fn missing_files_give_defaults() {
        let config = load_from(&[PathBuf::from("/nonexistent/parallax.toml")], no_env).unwrap();
        assert_eq!(config, SessionConfig::default());
    }

    #[test]
    fn later_files_override_earlier_keys() {
        let dir = tempfile::tempdir().unwrap();
        let user = dir.path().join("user.toml");
        let local = dir.path().join("local.toml");
        std::fs::write(&user, "tick_default_ms = 20\nauto_save = false\n").unwrap();
        std::fs::write(&local, "auto_save = true\nrenderer = \"interlaced\"\n").unwrap();

        let config = load_from(&[user, local], no_env).unwrap();
        assert_eq!(config.tick_default_ms, 20);
        assert!(config.auto_save);
        assert_eq!(config.renderer, RendererMode::Interlaced);
    }

    #[test]
    fn environment_wins_over_files() {
        let dir = tempfile::tempdir().unwrap();
        let local = dir.path().join("local.toml");
        std::fs::write(&local, "auto_save = true\n").unwrap();

        let env = |key: &str| match key {
            "PARALLAX_AUTO_SAVE" => Some("0".to_string()),
            "PARALLAX_RENDERER" => Some("SDK".to_string()),
            "PARALLAX_DATA_DIR" => Some("/tmp/parallax".to_string()),
            _ => None,
        };
        let config = load_from(&[local], env).unwrap();
        assert!(!config.auto_save);
        assert_eq!(config.renderer, RendererMode::Sdk);
        assert_eq!(config.data_dir, Some(PathBuf::from("/tmp/parallax")));
    }

    #[test]
    fn malformed_file_is_reported() {
        let dir = tempfile::tempdir().unwrap();
        let bad = dir.path().join("bad.toml");
        std::fs::write(&bad, "auto_save = = true").unwrap();

        assert!(matches!(
            load_from(&[bad], no_env),
            Err(ConfigError::Parse { .. })
        ));
    }

    #[test]
    fn unknown_renderer_is_invalid() {
        let dir = tempfile::tempdir().unwrap();
        let file = dir.path().join("c.toml");
        std::fs::write(&file, "renderer = \"hologram\"").unwrap();

        assert!(matches!(
            load_from(&[file], no_env),
            Err(ConfigError::Invalid(_))
        ));
    }
}
