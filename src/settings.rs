use crate::delay::{DEFAULT_MAX_DELAY, DEFAULT_MIN_DELAY};
use serde::{Deserialize, Serialize};
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use thiserror::Error;

pub const SETTINGS_FOLDER: &str = "AutoClicker";
pub const SETTINGS_FILE: &str = "settings.json";

// Room left below the window for the taskbar when a saved position runs off screen.
const TASKBAR_MARGIN: i32 = 40;

#[derive(Debug, Error)]
pub enum SettingsError {
    #[error("failed to read settings from {path}: {source}")]
    Read { path: PathBuf, source: io::Error },
    #[error("failed to write settings to {path}: {source}")]
    Write { path: PathBuf, source: io::Error },
    #[error("failed to remove settings at {path}: {source}")]
    Remove { path: PathBuf, source: io::Error },
    #[error("malformed settings in {path}: {source}")]
    Parse {
        path: PathBuf,
        source: serde_json::Error,
    },
    #[error("failed to encode settings: {0}")]
    Encode(#[from] serde_json::Error),
    #[error("no directory available for the settings file")]
    NoLocation,
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(default)]
pub struct Settings {
    pub min_delay: f64,
    pub max_delay: f64,
    pub start_key: String,
    pub quit_key: String,
    pub save_settings: bool,
    #[serde(rename = "winfo_x")]
    pub window_x: Option<i32>,
    #[serde(rename = "winfo_y")]
    pub window_y: Option<i32>,
    pub always_on_top: bool,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            min_delay: DEFAULT_MIN_DELAY,
            max_delay: DEFAULT_MAX_DELAY,
            start_key: "f8".to_string(),
            quit_key: "f9".to_string(),
            save_settings: false,
            window_x: None,
            window_y: None,
            always_on_top: true,
        }
    }
}

impl Settings {
    pub fn saved_position(&self) -> Option<(i32, i32)> {
        Some((self.window_x?, self.window_y?))
    }
}

#[derive(Debug, Clone)]
pub struct SettingsStore {
    path: PathBuf,
}

impl SettingsStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// `<config dir>/AutoClicker/settings.json`, or next to the executable when
    /// the platform has no config directory.
    pub fn default_location() -> Result<Self, SettingsError> {
        if let Some(config_dir) = dirs::config_dir() {
            return Ok(Self::new(config_dir.join(SETTINGS_FOLDER).join(SETTINGS_FILE)));
        }
        let exe = std::env::current_exe().map_err(|_| SettingsError::NoLocation)?;
        let dir = exe.parent().ok_or(SettingsError::NoLocation)?;
        Ok(Self::new(dir.join(SETTINGS_FILE)))
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// A missing file is not an error; it yields the defaults.
    pub fn load(&self) -> Result<Settings, SettingsError> {
        let data = match fs::read_to_string(&self.path) {
            Ok(data) => data,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(Settings::default()),
            Err(source) => {
                return Err(SettingsError::Read {
                    path: self.path.clone(),
                    source,
                })
            }
        };
        serde_json::from_str(&data).map_err(|source| SettingsError::Parse {
            path: self.path.clone(),
            source,
        })
    }

    pub fn save(&self, settings: &Settings) -> Result<(), SettingsError> {
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent).map_err(|source| SettingsError::Write {
                path: parent.to_path_buf(),
                source,
            })?;
        }
        let json = serde_json::to_string_pretty(settings)?;
        fs::write(&self.path, json).map_err(|source| SettingsError::Write {
            path: self.path.clone(),
            source,
        })?;
        tracing::debug!("Saved settings to {}", self.path.display());
        Ok(())
    }

    pub fn reset(&self) -> Result<(), SettingsError> {
        match fs::remove_file(&self.path) {
            Ok(()) => {
                tracing::debug!("Removed settings at {}", self.path.display());
                Ok(())
            }
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(()),
            Err(source) => Err(SettingsError::Remove {
                path: self.path.clone(),
                source,
            }),
        }
    }
}

/// Top-left corner for the window: the saved position pulled back on screen,
/// or centered when nothing was saved.
pub fn window_origin(saved: Option<(i32, i32)>, screen: (i32, i32), size: (i32, i32)) -> (i32, i32) {
    let (screen_w, screen_h) = screen;
    let (w, h) = size;
    match saved {
        Some((x, y)) => {
            let mut x = x.max(0);
            let mut y = y.max(0);
            if x + w > screen_w {
                x = (screen_w - w).max(0);
            }
            if y + h > screen_h {
                y = (screen_h - h - TASKBAR_MARGIN).max(0);
            }
            (x, y)
        }
        None => (screen_w / 2 - w / 2, screen_h / 2 - h / 2),
    }
}

/// Converts a display size in physical pixels to egui points.
pub fn screen_in_points(physical: (i32, i32), pixels_per_point: f32) -> (i32, i32) {
    if !pixels_per_point.is_finite() || pixels_per_point <= 0.0 {
        return physical;
    }
    let scale = |px: i32| (px as f32 / pixels_per_point).round() as i32;
    (scale(physical.0), scale(physical.1))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::{SystemTime, UNIX_EPOCH};

    fn scratch_store(name: &str) -> SettingsStore {
        let nanos = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .unwrap()
            .as_nanos();
        let dir = std::env::temp_dir().join(format!(
            "autoclicker-test-{}-{}-{}",
            name,
            std::process::id(),
            nanos
        ));
        SettingsStore::new(dir.join(SETTINGS_FOLDER).join(SETTINGS_FILE))
    }

    #[test]
    fn test_missing_file_loads_defaults() {
        let store = scratch_store("missing");
        assert_eq!(store.load().unwrap(), Settings::default());
    }

    #[test]
    fn test_save_then_load() {
        let store = scratch_store("save");
        let settings = Settings {
            min_delay: 0.5,
            max_delay: 1.25,
            start_key: "f6".to_string(),
            quit_key: "q".to_string(),
            save_settings: true,
            window_x: Some(120),
            window_y: Some(340),
            always_on_top: false,
        };
        store.save(&settings).unwrap();
        assert_eq!(store.load().unwrap(), settings);

        let raw = fs::read_to_string(store.path()).unwrap();
        assert!(raw.contains("\n  \"min_delay\": 0.5"), "{raw}");
        assert!(raw.contains("\"winfo_x\": 120"));
    }

    #[test]
    fn test_partial_file_fills_defaults() {
        let store = scratch_store("partial");
        fs::create_dir_all(store.path().parent().unwrap()).unwrap();
        fs::write(
            store.path(),
            r#"{"min_delay": 1.0, "start_key": "f7", "winfo_x": null, "extra": 3}"#,
        )
        .unwrap();

        let settings = store.load().unwrap();
        assert_eq!(settings.min_delay, 1.0);
        assert_eq!(settings.max_delay, DEFAULT_MAX_DELAY);
        assert_eq!(settings.start_key, "f7");
        assert_eq!(settings.quit_key, "f9");
        assert_eq!(settings.saved_position(), None);
        assert!(settings.always_on_top);
    }

    #[test]
    fn test_malformed_file_is_an_error() {
        let store = scratch_store("malformed");
        fs::create_dir_all(store.path().parent().unwrap()).unwrap();
        fs::write(store.path(), "{ not json").unwrap();
        assert!(matches!(store.load(), Err(SettingsError::Parse { .. })));
    }

    #[test]
    fn test_reset_removes_file_and_tolerates_absence() {
        let store = scratch_store("reset");
        store.reset().unwrap();

        store.save(&Settings::default()).unwrap();
        assert!(store.path().exists());
        store.reset().unwrap();
        assert!(!store.path().exists());
        assert_eq!(store.load().unwrap(), Settings::default());
    }

    #[test]
    fn test_saved_position_needs_both_coordinates() {
        let mut settings = Settings {
            window_x: Some(10),
            ..Settings::default()
        };
        assert_eq!(settings.saved_position(), None);
        settings.window_y = Some(0);
        assert_eq!(settings.saved_position(), Some((10, 0)));
    }

    #[test]
    fn test_window_origin_centers_without_saved_position() {
        assert_eq!(window_origin(None, (1920, 1080), (490, 180)), (715, 450));
    }

    #[test]
    fn test_window_origin_keeps_visible_position() {
        assert_eq!(
            window_origin(Some((300, 200)), (1920, 1080), (490, 180)),
            (300, 200)
        );
    }

    #[test]
    fn test_window_origin_clamps_off_screen_position() {
        assert_eq!(window_origin(Some((-50, -20)), (1920, 1080), (490, 180)), (0, 0));
        assert_eq!(
            window_origin(Some((100, 1000)), (1920, 1080), (490, 180)),
            (100, 860)
        );
        assert_eq!(
            window_origin(Some((1800, 100)), (1920, 1080), (490, 180)),
            (1430, 100)
        );
    }

    #[test]
    fn test_screen_in_points_follows_display_scale() {
        assert_eq!(screen_in_points((1920, 1080), 1.0), (1920, 1080));
        assert_eq!(screen_in_points((2880, 1620), 1.5), (1920, 1080));
        assert_eq!(screen_in_points((3840, 2160), 2.0), (1920, 1080));
        assert_eq!(screen_in_points((1920, 1080), 0.0), (1920, 1080));
    }

    #[test]
    fn test_scaled_screen_keeps_window_visible() {
        // Bottom-right corner of a 150% display, in points.
        let screen = screen_in_points((2880, 1620), 1.5);
        assert_eq!(window_origin(Some((1800, 1000)), screen, (490, 180)), (1430, 860));
    }
}
