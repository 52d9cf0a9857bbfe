//! Engine configuration: output sizes for previews and thumbnails.

use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use std::sync::mpsc::{self, Receiver, Sender};

use directories::ProjectDirs;
use log::{info, warn};
use serde::{Deserialize, Serialize};

use crate::error::LibraryError;
use crate::model::ImageSize;
use crate::util::sync::lock;

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq)]
#[serde(default)]
pub struct EngineSettings {
    pub preview_size: ImageSize,
    pub thumbnail_size: ImageSize,
}

impl Default for EngineSettings {
    fn default() -> Self {
        Self {
            preview_size: ImageSize::new(500, 500),
            thumbnail_size: ImageSize::new(250, 250),
        }
    }
}

impl EngineSettings {
    pub fn from_toml(text: &str) -> Result<Self, LibraryError> {
        Ok(toml::from_str(text)?)
    }

    pub fn to_toml(&self) -> Result<String, LibraryError> {
        Ok(toml::to_string_pretty(self)?)
    }
}

/// Holds the current [`EngineSettings`] and tells subscribers when they change.
pub struct SettingsManager {
    settings: Mutex<EngineSettings>,
    subscribers: Mutex<Vec<Sender<EngineSettings>>>,
}

impl SettingsManager {
    pub fn new(settings: EngineSettings) -> Self {
        Self {
            settings: Mutex::new(settings),
            subscribers: Mutex::new(Vec::new()),
        }
    }

    /// Per-user config file, e.g. `~/.config/texgen/settings.toml` on Linux.
    pub fn default_path() -> Option<PathBuf> {
        ProjectDirs::from("org", "texgen", "texgen")
            .map(|dirs| dirs.config_dir().join("settings.toml"))
    }

    pub fn load(path: &Path) -> Result<Self, LibraryError> {
        let text = fs::read_to_string(path)?;
        Ok(Self::new(EngineSettings::from_toml(&text)?))
    }

    /// Like [`load`](Self::load), but falls back to defaults on any error.
    pub fn load_or_default(path: &Path) -> Self {
        if !path.exists() {
            return Self::new(EngineSettings::default());
        }
        match Self::load(path) {
            Ok(manager) => manager,
            Err(e) => {
                warn!("Failed to load settings from {}, using defaults: {}", path.display(), e);
                Self::new(EngineSettings::default())
            }
        }
    }

    pub fn save(&self, path: &Path) -> Result<(), LibraryError> {
        if let Some(dir) = path.parent() {
            fs::create_dir_all(dir)?;
        }
        fs::write(path, self.current().to_toml()?)?;
        info!("Settings saved to {}", path.display());
        Ok(())
    }

    pub fn current(&self) -> EngineSettings {
        lock(&self.settings).clone()
    }

    pub fn preview_size(&self) -> ImageSize {
        lock(&self.settings).preview_size
    }

    pub fn thumbnail_size(&self) -> ImageSize {
        lock(&self.settings).thumbnail_size
    }

    /// Receives the full settings after every change.
    pub fn subscribe(&self) -> Receiver<EngineSettings> {
        let (sender, receiver) = mpsc::channel();
        lock(&self.subscribers).push(sender);
        receiver
    }

    /// Replaces the settings. Subscribers are only notified if something changed.
    pub fn set(&self, settings: EngineSettings) -> bool {
        {
            let mut current = lock(&self.settings);
            if *current == settings {
                return false;
            }
            *current = settings.clone();
        }
        lock(&self.subscribers).retain(|s| s.send(settings.clone()).is_ok());
        true
    }

    pub fn set_preview_size(&self, size: ImageSize) -> bool {
        let mut settings = self.current();
        settings.preview_size = size;
        self.set(settings)
    }

    pub fn set_thumbnail_size(&self, size: ImageSize) -> bool {
        let mut settings = self.current();
        settings.thumbnail_size = size;
        self.set(settings)
    }
}

impl Default for SettingsManager {
    fn default() -> Self {
        Self::new(EngineSettings::default())
    }
}
