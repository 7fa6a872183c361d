pub mod error;
pub mod profile;

pub use error::*;
pub use profile::{PollProfile, PollProfiles};

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Environment variable pointing at an explicit settings file
pub const CONFIG_PATH_ENV: &str = "CLOUDNGFW_CONFIG_PATH";

const CANDIDATES: [&str; 2] = ["cloudngfw.local.yaml", "cloudngfw.yaml"];
const GLOBAL_FILE: &str = "config.yaml";

fn default_scope() -> String {
    "Local".to_string()
}

/// Settings shared by every workflow
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Settings {
    /// Scope prefixed onto legacy single-token rulestack ids
    #[serde(default = "default_scope")]
    pub default_scope: String,

    #[serde(default)]
    pub poll: PollProfiles,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            default_scope: default_scope(),
            poll: PollProfiles::default(),
        }
    }
}

impl Settings {
    /// Parse a settings file
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        if !path.exists() {
            return Err(ConfigError::SettingsFileNotFound(path.to_path_buf()));
        }
        let content = std::fs::read_to_string(path)?;
        let settings: Settings =
            serde_yaml::from_str(&content).map_err(|source| ConfigError::Parse {
                path: path.to_path_buf(),
                source,
            })?;
        settings.poll.validate()?;
        Ok(settings)
    }
}

/// Config directory (`~/.config/cloudngfw`). Lookup only; nothing is created.
pub fn get_config_dir() -> Result<PathBuf> {
    dirs::config_dir()
        .map(|dir| dir.join("cloudngfw"))
        .ok_or(ConfigError::ConfigDirNotFound)
}

/// Locate the settings file
///
/// Search order:
/// 1. `CLOUDNGFW_CONFIG_PATH`
/// 2. current directory: cloudngfw.local.yaml, cloudngfw.yaml
/// 3. ~/.config/cloudngfw/config.yaml
pub fn find_settings_file() -> Result<Option<PathBuf>> {
    if let Ok(config_path) = std::env::var(CONFIG_PATH_ENV) {
        let path = PathBuf::from(config_path);
        if path.exists() {
            return Ok(Some(path));
        }
        return Err(ConfigError::SettingsFileNotFound(path));
    }

    let current_dir = std::env::current_dir()?;
    for filename in &CANDIDATES {
        let path = current_dir.join(filename);
        if path.exists() {
            return Ok(Some(path));
        }
    }

    if let Ok(config_dir) = get_config_dir() {
        let global = config_dir.join(GLOBAL_FILE);
        if global.exists() {
            return Ok(Some(global));
        }
    }

    Ok(None)
}

/// Load settings, falling back to built-in defaults when no file exists
pub fn load_settings() -> Result<Settings> {
    match find_settings_file()? {
        Some(path) => Settings::from_file(path),
        None => Ok(Settings::default()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serial_test::serial;
    use std::fs;

    #[test]
    fn test_defaults() {
        let settings = Settings::default();
        assert_eq!(settings.default_scope, "Local");
        assert_eq!(settings.poll, PollProfiles::default());
    }

    #[test]
    fn test_from_file() {
        let temp_dir = tempfile::tempdir().unwrap();
        let path = temp_dir.path().join("cloudngfw.yaml");
        fs::write(
            &path,
            "default_scope: Global\npoll:\n  commit:\n    interval_secs: 2\n    timeout_secs: 600\n",
        )
        .unwrap();

        let settings = Settings::from_file(&path).unwrap();
        assert_eq!(settings.default_scope, "Global");
        assert_eq!(settings.poll.commit.interval_secs, 2);
        assert_eq!(settings.poll.commit.timeout_secs, Some(600));
        assert_eq!(settings.poll.firewall, PollProfile::fixed(30, 120));
    }

    #[test]
    fn test_from_file_invalid_yaml() {
        let temp_dir = tempfile::tempdir().unwrap();
        let path = temp_dir.path().join("cloudngfw.yaml");
        fs::write(&path, "poll: [not, a, map]\n").unwrap();

        assert!(matches!(
            Settings::from_file(&path),
            Err(ConfigError::Parse { .. })
        ));
    }

    #[test]
    fn test_from_file_rejects_zero_attempts() {
        let temp_dir = tempfile::tempdir().unwrap();
        let path = temp_dir.path().join("cloudngfw.yaml");
        fs::write(
            &path,
            "poll:\n  firewall:\n    interval_secs: 30\n    max_attempts: 0\n",
        )
        .unwrap();

        assert!(matches!(
            Settings::from_file(&path),
            Err(ConfigError::InvalidProfile { .. })
        ));
    }

    #[test]
    #[serial]
    fn test_find_settings_file_env_var() {
        let temp_dir = tempfile::tempdir().unwrap();
        let path = temp_dir.path().join("custom.yaml");
        fs::write(&path, "default_scope: Global\n").unwrap();

        temp_env::with_var(CONFIG_PATH_ENV, Some(path.to_str().unwrap()), || {
            assert_eq!(find_settings_file().unwrap(), Some(path.clone()));
            assert_eq!(load_settings().unwrap().default_scope, "Global");
        });
    }

    #[test]
    #[serial]
    fn test_find_settings_file_env_var_missing() {
        temp_env::with_var(CONFIG_PATH_ENV, Some("/nonexistent/cloudngfw.yaml"), || {
            assert!(matches!(
                find_settings_file(),
                Err(ConfigError::SettingsFileNotFound(_))
            ));
        });
    }

    #[test]
    #[serial]
    fn test_find_settings_file_local_priority() {
        let temp_dir = tempfile::tempdir().unwrap();
        let original_dir = std::env::current_dir().unwrap();

        fs::write(temp_dir.path().join("cloudngfw.yaml"), "default_scope: Global\n").unwrap();
        fs::write(
            temp_dir.path().join("cloudngfw.local.yaml"),
            "default_scope: Local\n",
        )
        .unwrap();

        std::env::set_current_dir(&temp_dir).unwrap();

        let result = temp_env::with_var_unset(CONFIG_PATH_ENV, find_settings_file);

        std::env::set_current_dir(original_dir).unwrap();

        assert!(result.unwrap().unwrap().ends_with("cloudngfw.local.yaml"));
    }

    #[test]
    #[serial]
    #[cfg(target_os = "linux")]
    fn test_find_settings_file_global_dir() {
        let cwd = tempfile::tempdir().unwrap();
        let xdg = tempfile::tempdir().unwrap();
        let original_dir = std::env::current_dir().unwrap();
        std::env::set_current_dir(&cwd).unwrap();

        let (dir, found) = temp_env::with_vars(
            [
                (CONFIG_PATH_ENV, None),
                ("XDG_CONFIG_HOME", Some(xdg.path().to_str().unwrap())),
            ],
            || {
                let dir = get_config_dir().unwrap();
                assert!(!dir.exists());
                fs::create_dir_all(&dir).unwrap();
                fs::write(dir.join("config.yaml"), "default_scope: Global\n").unwrap();
                (dir, find_settings_file())
            },
        );

        std::env::set_current_dir(original_dir).unwrap();

        assert_eq!(dir, xdg.path().join("cloudngfw"));
        assert_eq!(found.unwrap(), Some(dir.join("config.yaml")));
    }
}
