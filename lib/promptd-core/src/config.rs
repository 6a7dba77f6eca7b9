use crate::paths;
use crate::platform::Bounds;
use crate::request::SurfaceKind;
use log::{trace, warn};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;

pub type ConfigRef = Arc<Config>;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Could not determine default config directory")]
    NoConfigDir,
    #[error("Failed to access config file '{path}': {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("Failed to parse config file '{path}': {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_yaml::Error,
    },
    #[error("Failed to serialize config: {0}")]
    Serialize(#[from] serde_yaml::Error),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// The path the config file was loaded from
    #[serde(skip)]
    pub config_path: Option<PathBuf>,

    /// Whether to exit once the last prompt has been dismissed
    pub exit_when_idle: bool,
    /// How long the platform may take to create a surface before the request is dropped
    pub create_timeout_ms: u64,
    /// Display bounds to assume until the host reports the real display
    pub display: Bounds,
    /// Window background color (#AARRGGBB)
    pub background_color: String,
    /// Corner radius for surfaces narrower than the display
    pub corner_radius: u32,
    /// Page loaded into permission dialogs
    pub dialog_page: String,
    /// Page loaded into security toasts
    pub toast_page: String,
    /// Page loaded into the global switch panel
    pub control_panel_page: String,
    /// Headless only: close every surface after this many milliseconds
    pub headless_auto_dismiss_ms: Option<u64>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            config_path: None,
            exit_when_idle: true,
            create_timeout_ms: 5000,
            display: Bounds::new(0, 0, 1080, 2340),
            background_color: "#00000000".to_string(),
            corner_radius: 16,
            dialog_page: "pages/dialogPlus".to_string(),
            toast_page: "pages/securityDialog".to_string(),
            control_panel_page: "pages/globalSwitch".to_string(),
            headless_auto_dismiss_ms: None,
        }
    }
}

impl Config {
    pub fn default_config_path() -> Option<PathBuf> {
        paths::default_config_path()
    }

    pub fn load(config_path: Option<&Path>, save: bool) -> Result<Self, ConfigError> {
        let path = match config_path {
            Some(p) => p.to_path_buf(),
            None => Self::default_config_path().ok_or(ConfigError::NoConfigDir)?,
        };

        if !path.exists() {
            Self::default().save_to_file(&path)?;
            trace!("Created default config file at: {}", path.display());
        }

        let contents = fs::read_to_string(&path).map_err(|source| ConfigError::Io {
            path: path.clone(),
            source,
        })?;

        let mut config: Config =
            serde_yaml::from_str(&contents).map_err(|source| ConfigError::Parse {
                path: path.clone(),
                source,
            })?;

        config.config_path = Some(path.clone());

        // Save the config back so missing fields show up with their defaults
        if save {
            if let Err(e) = config.save_to_file(&path) {
                warn!("Failed to update config file with missing fields: {e}");
            }
        }

        Ok(config)
    }

    pub fn save_to_file(&self, path: &Path) -> Result<(), ConfigError> {
        let io_error = |source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        };

        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).map_err(io_error)?;
        }

        let header = "# promptd configuration file\n\n";
        let serialized_config = serde_yaml::to_string(self)?;
        fs::write(path, format!("{header}{serialized_config}")).map_err(io_error)?;
        Ok(())
    }

    pub fn create_timeout(&self) -> Duration {
        Duration::from_millis(self.create_timeout_ms)
    }

    pub fn headless_auto_dismiss(&self) -> Option<Duration> {
        self.headless_auto_dismiss_ms.map(Duration::from_millis)
    }

    pub fn page_for(&self, kind: SurfaceKind) -> &str {
        match kind {
            SurfaceKind::Dialog => &self.dialog_page,
            SurfaceKind::Toast => &self.toast_page,
            SurfaceKind::ControlPanel => &self.control_panel_page,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_load_creates_default_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("config.yaml");

        let config = Config::load(Some(&path), false).unwrap();
        assert!(path.exists());
        assert_eq!(config.config_path.as_deref(), Some(path.as_path()));
        assert_eq!(
            Config {
                config_path: None,
                ..config
            },
            Config::default()
        );
    }

    #[test]
    fn test_missing_fields_use_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.yaml");
        fs::write(&path, "create_timeout_ms: 250\nexit_when_idle: false\n").unwrap();

        let config = Config::load(Some(&path), true).unwrap();
        assert_eq!(config.create_timeout(), Duration::from_millis(250));
        assert!(!config.exit_when_idle);
        assert_eq!(config.dialog_page, "pages/dialogPlus");

        // Saving back fills in the rest of the fields
        let saved = fs::read_to_string(&path).unwrap();
        assert!(saved.contains("control_panel_page"));
    }

    #[test]
    fn test_invalid_yaml_is_reported() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.yaml");
        fs::write(&path, "create_timeout_ms: [not a number\n").unwrap();

        match Config::load(Some(&path), false) {
            Err(ConfigError::Parse { path: reported, .. }) => assert_eq!(reported, path),
            other => panic!("Expected a parse error, got {:?}", other),
        }
    }

    #[test]
    fn test_page_for_kind() {
        let config = Config::default();
        assert_eq!(config.page_for(SurfaceKind::Dialog), "pages/dialogPlus");
        assert_eq!(config.page_for(SurfaceKind::Toast), "pages/securityDialog");
        assert_eq!(
            config.page_for(SurfaceKind::ControlPanel),
            "pages/globalSwitch"
        );
    }
}
