use crate::camera::CameraConfig;
use crate::feed::{DemoFeed, DirFeed, FeedSource, HttpFeed};
use crate::map::{default_asset_path, MapAsset, MapError};
use crate::path::PathTiming;
use crate::settings::Settings;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

/// Which feed to poll
#[derive(Clone, Debug, PartialEq)]
pub enum FeedChoice {
    Http { url: String, timeout: Duration },
    Dir(PathBuf),
    Demo,
}

impl FeedChoice {
    pub fn open(&self) -> Arc<dyn FeedSource> {
        match self {
            FeedChoice::Http { url, timeout } => Arc::new(HttpFeed::new(url, *timeout)),
            FeedChoice::Dir(dir) => Arc::new(DirFeed::new(dir.clone())),
            FeedChoice::Demo => Arc::new(DemoFeed::new()),
        }
    }
}

/// Where the map asset comes from
#[derive(Clone, Debug, PartialEq)]
pub enum MapLocation {
    File(PathBuf),
    Url(String),
}

impl MapLocation {
    fn parse(raw: &str) -> Self {
        if raw.starts_with("http://") || raw.starts_with("https://") {
            MapLocation::Url(raw.to_string())
        } else {
            MapLocation::File(PathBuf::from(raw))
        }
    }

    pub fn load(&self, timeout: Duration) -> Result<MapAsset, MapError> {
        match self {
            MapLocation::File(path) => MapAsset::load(path),
            MapLocation::Url(url) => MapAsset::fetch(url, timeout),
        }
    }
}

impl std::fmt::Display for MapLocation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            MapLocation::File(path) => write!(f, "{}", path.display()),
            MapLocation::Url(url) => f.write_str(url),
        }
    }
}

/// Command-line values that take precedence over the settings file
#[derive(Clone, Debug, Default)]
pub struct Overrides {
    pub url: Option<String>,
    pub dir: Option<PathBuf>,
    pub demo: bool,
    pub map: Option<String>,
    pub interval_ms: Option<u64>,
    pub delay_secs: Option<u64>,
    pub fps: Option<u32>,
}

/// Resolved configuration for the live engine
#[derive(Clone, Debug)]
pub struct LiveConfig {
    pub feed: FeedChoice,
    pub poll_interval: Duration,
    pub request_timeout: Duration,
    pub feed_lines: usize,
    pub map: MapLocation,
    pub camera: CameraConfig,
    pub timing: PathTiming,
    pub delay: Duration,
    pub queue_tick: Duration,
    pub frame: Duration,
    pub highlight: Duration,
    pub sensor: (f64, f64),
}

impl LiveConfig {
    pub fn resolve(settings: &Settings, overrides: &Overrides) -> Self {
        let request_timeout = Duration::from_millis(settings.feed.timeout_ms.max(100));
        let feed = if overrides.demo {
            FeedChoice::Demo
        } else if let Some(url) = overrides.url.clone().or_else(|| settings.feed.url.clone()) {
            FeedChoice::Http {
                url,
                timeout: request_timeout,
            }
        } else if let Some(dir) = overrides.dir.clone().or_else(|| settings.feed.dir.clone()) {
            FeedChoice::Dir(dir)
        } else {
            FeedChoice::Demo
        };

        let map = overrides
            .map
            .as_deref()
            .or(settings.map.asset.as_deref())
            .map(MapLocation::parse)
            .unwrap_or_else(|| MapLocation::File(default_asset_path()));

        let fps = overrides.fps.unwrap_or(settings.visual.fps).clamp(1, 120);
        let frame = Duration::from_secs_f64(1.0 / fps as f64);
        let min_scale = settings.map.min_scale.max(0.1);

        let camera = CameraConfig {
            min_scale,
            max_scale: settings.map.max_scale.max(min_scale),
            zoom_step: settings.map.zoom_step.max(1.01),
            drag_margin: settings.map.drag_margin.max(0.0),
            frame,
            ..CameraConfig::default()
        };

        Self {
            feed,
            poll_interval: Duration::from_millis(
                overrides.interval_ms.unwrap_or(settings.feed.poll_interval_ms).max(100),
            ),
            request_timeout,
            feed_lines: settings.feed.feed_lines.max(1),
            map,
            camera,
            timing: PathTiming::default(),
            delay: Duration::from_secs(overrides.delay_secs.unwrap_or(settings.visual.delay_secs)),
            queue_tick: Duration::from_millis(settings.visual.queue_tick_ms.max(10)),
            frame,
            highlight: Duration::from_millis(settings.visual.highlight_ms),
            sensor: (settings.visual.sensor_lat, settings.visual.sensor_lon),
        }
    }
}
