use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// INI file older releases kept in the working directory.
pub const LEGACY_CONFIG_FILE: &str = "config.ini";

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    /// Directory the file and folder pickers open in. Empty when never set.
    pub last_folder: String,
    pub ffmpeg_path: Option<PathBuf>,
    pub ffprobe_path: Option<PathBuf>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub settings: Settings,
    #[serde(skip)]
    dirty: bool,
}

impl AppConfig {
    pub fn load() -> Self {
        Self::load_or_import(&Self::config_path(), Path::new(LEGACY_CONFIG_FILE))
    }

    /// Like `load_from`, but when `path` does not exist yet the remembered
    /// folder is taken from a legacy INI file. The imported value is marked
    /// dirty so the next save writes it out as JSON.
    pub fn load_or_import(path: &Path, legacy_path: &Path) -> Self {
        if path.exists() || !legacy_path.exists() {
            return Self::load_from(path);
        }

        let mut config = Self::default();
        match std::fs::read_to_string(legacy_path) {
            Ok(content) => match legacy_last_folder(&content) {
                Some(folder) if !folder.is_empty() => {
                    log::info!("Imported last folder from {}", legacy_path.display());
                    config.set_last_folder(Path::new(&folder));
                }
                _ => log::info!("No last folder in {}, using defaults", legacy_path.display()),
            },
            Err(e) => log::warn!("Failed to read legacy config at {}: {}", legacy_path.display(), e),
        }
        config
    }

    /// Reads the config at `path`. Anything unreadable falls back to defaults.
    pub fn load_from(path: &Path) -> Self {
        if !path.exists() {
            log::info!("No config file at {}, using defaults", path.display());
            return Self::default();
        }

        let content = match std::fs::read_to_string(path) {
            Ok(content) => content,
            Err(e) => {
                log::warn!("Failed to read config file at {}: {}", path.display(), e);
                return Self::default();
            }
        };

        match serde_json::from_str::<Self>(&content) {
            Ok(config) => {
                log::info!("Loaded existing config from {}", path.display());
                config
            }
            Err(e) => {
                log::warn!("Config file exists but has issues ({}), using defaults", e);
                Self::default()
            }
        }
    }

    pub fn save_to(&mut self, path: &Path) -> anyhow::Result<()> {
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)
                    .map_err(|e| anyhow::anyhow!("Failed to create config directory {}: {}", parent.display(), e))?;
            }
        }
        let content = serde_json::to_string_pretty(self)?;
        std::fs::write(path, content)
            .map_err(|e| anyhow::anyhow!("Failed to write config file at {}: {}", path.display(), e))?;
        self.dirty = false;
        log::debug!("Config saved to {}", path.display());
        Ok(())
    }

    pub fn config_path() -> PathBuf {
        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("frame-sampler")
            .join("config.json")
    }

    pub fn last_folder(&self) -> Option<PathBuf> {
        if self.settings.last_folder.is_empty() {
            None
        } else {
            Some(PathBuf::from(&self.settings.last_folder))
        }
    }

    pub fn set_last_folder(&mut self, folder: &Path) {
        let folder = folder.to_string_lossy().into_owned();
        if folder != self.settings.last_folder {
            self.settings.last_folder = folder;
            self.dirty = true;
        }
    }

    /// True when there are changes that have not been written yet.
    pub fn is_dirty(&self) -> bool {
        self.dirty
    }

    pub fn ffmpeg_command(&self) -> PathBuf {
        self.settings.ffmpeg_path.clone().unwrap_or_else(|| PathBuf::from("ffmpeg"))
    }

    pub fn ffprobe_command(&self) -> PathBuf {
        self.settings.ffprobe_path.clone().unwrap_or_else(|| PathBuf::from("ffprobe"))
    }
}

/// `last_folder` from the `[settings]` section of an INI document.
fn legacy_last_folder(content: &str) -> Option<String> {
    let mut in_settings = false;
    for line in content.lines().map(str::trim) {
        if line.is_empty() || line.starts_with('#') || line.starts_with(';') {
            continue;
        }
        if let Some(section) = line.strip_prefix('[').and_then(|rest| rest.strip_suffix(']')) {
            in_settings = section.trim() == "settings";
            continue;
        }
        if !in_settings {
            continue;
        }
        if let Some((key, value)) = line.split_once('=').or_else(|| line.split_once(':')) {
            if key.trim() == "last_folder" {
                return Some(value.trim().to_string());
            }
        }
    }
    None
}
