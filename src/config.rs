use std::{fs::read_to_string, path::{Path, PathBuf}, time::Duration};

use anyhow::{Context, Result};
use colored::Colorize;
use directories::ProjectDirs;
use serde::{Deserialize, Serialize};

use crate::time::TimeParser;

/// Global configuration values for the `postpone` CLI
///
/// The configuration is stored in a TOML file in the current user's
/// config directory, which is `~/.config/postpone/config.toml` by default.
///
/// A config can be loaded from a file with [`Config::load`].
/// You can also use [`Config::init`] or [`Config::init_default`] to create
/// a default config file if one does not exist at the given path.
///
/// To save a config to the filesystem, use [`Config::save`].
///
/// ## File Format
///
/// The configuration file is written as a TOML file.
/// See the documentation for each field to learn how they are serialized.
#[derive(Debug, PartialEq, Deserialize, Serialize)]
pub struct Config {
    /// Directory to find hook executables
    ///
    /// Default is a directory called `hooks` inside the config directory.
    /// Serialized as an absolute path.
    #[serde(default = "default_hooks_directory")]
    pub hooks_directory: PathBuf,
    /// How often the progress bar is redrawn
    ///
    /// Default is 250 milliseconds.
    /// Accepts an integer count of milliseconds or a time expression like `"1s"`,
    /// and is serialized as an integer count of milliseconds.
    #[serde(default = "default_refresh_interval", with = "crate::time::duration::millis")]
    pub refresh_interval: Duration,
    /// Width of the progress bar, in characters
    #[serde(default = "default_progress_bar_width")]
    pub progress_bar_width: usize,
    /// Count unknown time units as milliseconds instead of rejecting them
    #[serde(default)]
    pub lenient_units: bool,
    /// Auto-stop count for repeating timers started without `--times`
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub default_times: Option<u32>,
}

impl Config {
    /// Returns the current config, creating a default config file if one does not exist
    pub fn init(config_path: &Path) -> Result<Self> {
        if let Some(conf) = Config::load(config_path)? {
            Ok(conf)
        } else {
            let conf = Config::default();

            eprintln!(
                "Creating config file at {}",
                config_path.display().to_string().cyan()
            );

            conf.save(config_path)?;

            Ok(conf)
        }
    }

    /// Returns the current config from the default location, and creates the file if one does not exist
    pub fn init_default() -> Result<Self> {
        let path = default_config_path()?;
        Self::init(&path)
    }

    /// Reads a TOML config file
    pub fn load(path: &Path) -> Result<Option<Self>> {
        if path.exists() {
            let config_str = read_to_string(path)
                .with_context(|| format!("Unable to read config file {}", path.display()))?;

            toml::from_str(&config_str)
                .map(Some)
                .with_context(|| "Failed to parse config from TOML")
        } else {
            Ok(None)
        }
    }

    /// Write this config file to the filesystem
    pub fn save(&self, path: &Path) -> Result<()> {
        let toml = toml::to_string(&self)
            .with_context(|| "Unable to format config as TOML")?;

        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("Unable to create config directory {}", parent.display()))?;
        }

        std::fs::write(path, toml)
            .with_context(|| format!("Unable to write config TOML to path {}", path.display()))
    }

    /// The time expression parser this config asks for
    pub fn parser(&self) -> TimeParser {
        if self.lenient_units {
            TimeParser::lenient()
        } else {
            TimeParser::strict()
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            hooks_directory: default_hooks_directory(),
            refresh_interval: default_refresh_interval(),
            progress_bar_width: default_progress_bar_width(),
            lenient_units: false,
            default_times: None,
        }
    }
}

fn project_dirs() -> Result<ProjectDirs> {
    ProjectDirs::from("dev", "Cosmicrose", "Postpone")
        .with_context(|| "Unable to determine XDG directories")
}

/// Get the default location of the config file
pub fn default_config_path() -> Result<PathBuf> {
    let conf_path = project_dirs()?
        .config_dir()
        .join("config.toml");

    Ok(conf_path)
}

fn default_hooks_directory() -> PathBuf {
    project_dirs()
        .map(|dirs| dirs.config_dir().join("hooks"))
        .unwrap_or_else(|_| PathBuf::from("hooks"))
}

fn default_refresh_interval() -> Duration {
    Duration::from_millis(250)
}

fn default_progress_bar_width() -> usize {
    40
}

#[cfg(test)]
mod test {
    use std::time::Duration;

    use super::Config;

    #[test]
    fn empty_file_is_all_defaults() {
        let config: Config = toml::from_str("").unwrap();

        assert_eq!(config, Config::default());
        assert_eq!(config.refresh_interval, Duration::from_millis(250));
        assert_eq!(config.progress_bar_width, 40);
        assert!(!config.parser().is_lenient());
    }

    #[test]
    fn refresh_interval_accepts_time_expressions() {
        let config: Config = toml::from_str(
            r#"
            refresh_interval = "1 second and 500ms"
            lenient_units = true
            default_times = 3
            "#,
        )
        .unwrap();

        assert_eq!(config.refresh_interval, Duration::from_millis(1_500));
        assert!(config.parser().is_lenient());
        assert_eq!(config.default_times, Some(3));
    }

    #[test]
    fn refresh_interval_accepts_millis() {
        let config: Config = toml::from_str("refresh_interval = 100").unwrap();

        assert_eq!(config.refresh_interval, Duration::from_millis(100));
    }

    #[test]
    fn bad_refresh_interval_is_an_error() {
        assert!(toml::from_str::<Config>(r#"refresh_interval = "soon""#).is_err());
    }

    #[test]
    fn writes_millis_back() {
        let config = Config {
            refresh_interval: Duration::from_secs(2),
            ..Config::default()
        };

        let toml = toml::to_string(&config).unwrap();

        assert!(toml.contains("refresh_interval = 2000"));
        assert!(!toml.contains("default_times"));
        assert_eq!(toml::from_str::<Config>(&toml).unwrap(), config);
    }
}
