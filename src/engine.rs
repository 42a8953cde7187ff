//! Engine state
//!
//! Everything the live view mutates lives in one owned `Engine`, driven from
//! the main thread: poll results come in through `apply_poll`, time moves
//! through `update`, and the renderer reads the rest.

use crate::camera::{Camera, Vec2};
use crate::config::LiveConfig;
use crate::event::AttackEvent;
use crate::geo::{GeoPoint, GeoResolver, ViewBox};
use crate::map::MapAsset;
use crate::palette::ColorRegistry;
use crate::path::PathScheduler;
use crate::queue::DelayQueue;
use crate::regions::RegionHighlighter;
use crate::stats::Aggregates;
use crate::sync::{PollResult, SyncLoop};
use chrono::{DateTime, Local, Utc};
use crossterm::style::Color;
use std::cell::Cell;
use std::collections::VecDeque;
use std::rc::Rc;
use std::time::{Duration, Instant};

/// Map asset plus the region state drawn on it. Absent when the asset
/// failed to load; the feed and charts keep working without it.
pub struct MapSurface {
    pub asset: MapAsset,
    pub highlighter: RegionHighlighter,
}

impl MapSurface {
    pub fn new(asset: MapAsset) -> Self {
        let highlighter = RegionHighlighter::new(&asset);
        Self { asset, highlighter }
    }
}

/// One line of the text feed.
#[derive(Clone, Debug, PartialEq)]
pub struct FeedLine {
    pub text: String,
    pub color: Color,
}

/// `HH:MM:SS  <ip>  → <SERVICE>:<port>  <city>, <country>` in local time.
pub fn format_feed_line(event: &AttackEvent) -> String {
    let local: DateTime<Local> = event.timestamp.with_timezone(&Local);
    let service = event.service_name().to_uppercase();
    let target = match event.dest_port {
        Some(port) => format!("{}:{}", service, port),
        None => service,
    };
    let place = match (&event.city, &event.country) {
        (Some(city), Some(country)) => format!("{}, {}", city, country),
        (None, Some(country)) => country.clone(),
        (Some(city), None) => city.clone(),
        (None, None) => "Unknown".to_string(),
    };
    format!("{}  {}  → {}  {}", local.format("%H:%M:%S"), event.source_ip, target, place)
}

/// Initial viewport before the first layout, in dots.
const DEFAULT_VIEWPORT: Vec2 = Vec2 { x: 160.0, y: 80.0 };

pub struct Engine {
    surface: Option<MapSurface>,
    resolver: GeoResolver,
    colors: ColorRegistry,
    legend_changed: Rc<Cell<bool>>,
    queue: DelayQueue,
    paths: PathScheduler,
    sync: SyncLoop,
    camera: Camera,
    /// Map units → content units at scale 1.
    fit: f64,
    sensor: GeoPoint,
    feed: VecDeque<FeedLine>,
    feed_limit: usize,
    aggregates: Aggregates,
    highlight: Duration,
    queue_tick: Duration,
    next_queue_tick: Instant,
    paused: bool,
}

impl Engine {
    pub fn new(config: &LiveConfig, asset: Option<MapAsset>, now: Instant) -> Self {
        let view_box = asset.as_ref().map(MapAsset::view_box).unwrap_or_default();
        let resolver = GeoResolver::new(view_box);
        let sensor = resolver.project(config.sensor.0, config.sensor.1);

        let legend_changed = Rc::new(Cell::new(false));
        let mut colors = ColorRegistry::new();
        let flag = Rc::clone(&legend_changed);
        colors.subscribe(Box::new(move |service, _| {
            tracing::info!(service, "new service category");
            flag.set(true);
        }));

        let fit = fit_scale(DEFAULT_VIEWPORT, view_box);
        let content = Vec2::new(view_box.width * fit, view_box.height * fit);

        Self {
            surface: asset.map(MapSurface::new),
            resolver,
            colors,
            legend_changed,
            queue: DelayQueue::new(config.delay),
            paths: PathScheduler::new(config.timing.clone()),
            sync: SyncLoop::new(),
            camera: Camera::new(config.camera.clone(), DEFAULT_VIEWPORT, content),
            fit,
            sensor,
            feed: VecDeque::with_capacity(config.feed_lines),
            feed_limit: config.feed_lines,
            aggregates: Aggregates::default(),
            highlight: config.highlight,
            queue_tick: config.queue_tick,
            next_queue_tick: now + config.queue_tick,
            paused: false,
        }
    }

    // ------------------------------------------------------------------
    // Ingestion
    // ------------------------------------------------------------------

    /// Apply one poll cycle. New events go to the text feed at once and to
    /// the delay queue for the map. The first cycle is history: it fills the
    /// text feed only. Aggregates are recomputed every cycle.
    pub fn apply_poll(&mut self, result: PollResult, wall: DateTime<Utc>) {
        let outcome = self.sync.apply(result);

        let skip = if outcome.baseline {
            outcome.fresh.len().saturating_sub(self.feed_limit)
        } else {
            0
        };
        let mut queued = 0;
        for event in outcome.fresh.into_iter().skip(skip) {
            self.push_feed_line(&event);
            if !outcome.baseline && self.queue.enqueue(event, wall) {
                queued += 1;
            }
        }
        if queued > 0 {
            tracing::info!(queued, pending = self.queue.len(), "new attacks");
        }

        self.aggregates = Aggregates::compute(self.sync.snapshot(), self.sync.summary(), wall);
        // Summary-only categories still need a legend color
        for service in &self.aggregates.services {
            self.colors.color_for(&service.name);
        }
    }

    fn push_feed_line(&mut self, event: &AttackEvent) {
        let color = self.colors.color_for(&event.service_name());
        self.feed.push_back(FeedLine {
            text: format_feed_line(event),
            color,
        });
        while self.feed.len() > self.feed_limit {
            self.feed.pop_front();
        }
    }

    // ------------------------------------------------------------------
    // Time
    // ------------------------------------------------------------------

    /// Per-frame update: queue cadence, camera smoothing, animations.
    pub fn update(&mut self, now: Instant, wall: DateTime<Utc>) {
        if now >= self.next_queue_tick {
            self.next_queue_tick = now + self.queue_tick;
            if !self.paused && !self.queue.is_empty() {
                let due = self.queue.tick(wall);
                if !due.is_empty() {
                    tracing::debug!(promoted = due.len(), pending = self.queue.len(), "queue promoted events");
                }
                for event in due {
                    self.dispatch(&event, now);
                }
            }
        }

        self.camera.tick();

        for arrival in self.paths.advance(now) {
            if let (Some(surface), Some(region)) = (self.surface.as_mut(), arrival.region.as_deref()) {
                surface.highlighter.mark_permanent(region);
            }
        }
        if let Some(surface) = self.surface.as_mut() {
            surface.highlighter.expire(now);
        }
    }

    /// Start the map animation for a promoted event.
    fn dispatch(&mut self, event: &AttackEvent, now: Instant) {
        if self.surface.is_none() {
            return;
        }
        let Some(origin) = self.resolver.resolve(event) else {
            tracing::debug!(key = %event.key(), "no location for event, not drawn");
            return;
        };
        let color = self.colors.color_for(&event.service_name());
        if let (Some(surface), Some(country)) = (self.surface.as_mut(), event.country.as_deref()) {
            surface.highlighter.highlight(country, color, self.highlight, now);
        }
        self.paths.animate(origin, self.sensor, color, event.country.clone());
        tracing::debug!(key = %event.key(), "attack path started");
    }

    // ------------------------------------------------------------------
    // View
    // ------------------------------------------------------------------

    /// Map pane resized to `cols×rows` cells.
    pub fn layout(&mut self, cols: u16, rows: u16) {
        let viewport = Vec2::new(cols as f64 * 2.0, rows as f64 * 4.0);
        let view_box = self.resolver.view_box();
        self.fit = fit_scale(viewport, view_box);
        let content = Vec2::new(view_box.width * self.fit, view_box.height * self.fit);
        self.camera.resize(viewport, content);
    }

    /// Map-space point → dot position in the map pane.
    pub fn to_screen(&self, p: GeoPoint) -> (f64, f64) {
        let s = self.camera.to_screen(Vec2::new(p.x * self.fit, p.y * self.fit));
        (s.x, s.y)
    }

    pub fn camera(&self) -> &Camera {
        &self.camera
    }

    pub fn camera_mut(&mut self) -> &mut Camera {
        &mut self.camera
    }

    pub fn toggle_pause(&mut self) -> bool {
        self.paused = !self.paused;
        tracing::info!(paused = self.paused, "map dispatch toggled");
        self.paused
    }

    pub fn is_paused(&self) -> bool {
        self.paused
    }

    pub fn surface(&self) -> Option<&MapSurface> {
        self.surface.as_ref()
    }

    pub fn paths(&self) -> &PathScheduler {
        &self.paths
    }

    pub fn sensor(&self) -> GeoPoint {
        self.sensor
    }

    pub fn feed(&self) -> &VecDeque<FeedLine> {
        &self.feed
    }

    pub fn aggregates(&self) -> &Aggregates {
        &self.aggregates
    }

    pub fn colors(&self) -> &ColorRegistry {
        &self.colors
    }

    pub fn pending(&self) -> usize {
        self.queue.len()
    }

    /// When the next queued attack reaches the map.
    pub fn next_reveal(&self) -> Option<DateTime<Utc>> {
        self.queue.next_due()
    }

    /// Whether a new category appeared since the last call.
    pub fn take_legend_changed(&self) -> bool {
        self.legend_changed.replace(false)
    }
}

/// Largest scale at which the whole view box fits the viewport.
fn fit_scale(viewport: Vec2, view_box: ViewBox) -> f64 {
    let fx = viewport.x / view_box.width.max(f64::EPSILON);
    let fy = viewport.y / view_box.height.max(f64::EPSILON);
    fx.min(fy).max(f64::EPSILON)
}
