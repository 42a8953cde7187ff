use serde::Deserialize;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum SettingsError {
    #[error("cannot read {path}: {source}")]
    Io { path: PathBuf, source: io::Error },
    #[error("invalid settings in {path}: {source}")]
    Toml { path: PathBuf, source: toml::de::Error },
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub feed: FeedSettings,
    pub map: MapSettings,
    pub visual: VisualSettings,
    pub log: LogSettings,
}

#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct FeedSettings {
    pub url: Option<String>,      // Base URL serving attacks.json and summary.json
    pub dir: Option<PathBuf>,     // Directory the producer writes both files to
    pub poll_interval_ms: u64,
    pub timeout_ms: u64,
    pub feed_lines: usize,
}

impl Default for FeedSettings {
    fn default() -> Self {
        Self {
            url: None,
            dir: None,
            poll_interval_ms: 2000,
            timeout_ms: 5000,
            feed_lines: 200,
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct MapSettings {
    pub asset: Option<String>,    // GeoJSON path or http(s) URL
    pub drag_margin: f64,
    pub min_scale: f64,
    pub max_scale: f64,
    pub zoom_step: f64,
}

impl Default for MapSettings {
    fn default() -> Self {
        Self {
            asset: None,
            drag_margin: 40.0,
            min_scale: 1.0,
            max_scale: 8.0,
            zoom_step: 1.25,
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct VisualSettings {
    pub delay_secs: u64,
    pub queue_tick_ms: u64,
    pub fps: u32,
    pub highlight_ms: u64,
    pub sensor_lat: f64,          // Where every path lands
    pub sensor_lon: f64,
}

impl Default for VisualSettings {
    fn default() -> Self {
        Self {
            delay_secs: 30,
            queue_tick_ms: 1000,
            fps: 30,
            highlight_ms: 2300,
            sensor_lat: 50.11,
            sensor_lon: 8.68,
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct LogSettings {
    pub level: String,
    pub file: Option<PathBuf>,
}

impl Default for LogSettings {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            file: None,
        }
    }
}

impl Settings {
    /// A missing file means defaults.
    pub fn load_from(path: &Path) -> Result<Self, SettingsError> {
        if !path.exists() {
            return Ok(Self::default());
        }
        let content = fs::read_to_string(path).map_err(|source| SettingsError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        toml::from_str(&content).map_err(|source| SettingsError::Toml {
            path: path.to_path_buf(),
            source,
        })
    }

    pub fn config_path() -> PathBuf {
        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("threatmap")
            .join("config.toml")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_file_gives_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let settings = Settings::load_from(&dir.path().join("config.toml")).unwrap();
        assert_eq!(settings.feed.poll_interval_ms, 2000);
        assert_eq!(settings.visual.delay_secs, 30);
        assert_eq!(settings.log.level, "info");
    }

    #[test]
    fn partial_file_keeps_other_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        fs::write(&path, "[feed]\nurl = \"http://sensor.local/\"\n\n[visual]\ndelay_secs = 5\n").unwrap();
        let settings = Settings::load_from(&path).unwrap();
        assert_eq!(settings.feed.url.as_deref(), Some("http://sensor.local/"));
        assert_eq!(settings.feed.timeout_ms, 5000);
        assert_eq!(settings.visual.delay_secs, 5);
        assert_eq!(settings.visual.fps, 30);
        assert_eq!(settings.map.max_scale, 8.0);
    }

    #[test]
    fn malformed_file_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        fs::write(&path, "[feed\nurl = ").unwrap();
        assert!(matches!(Settings::load_from(&path), Err(SettingsError::Toml { .. })));
    }
}
