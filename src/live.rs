//! Live view
//!
//! One loop on the main thread: drain finished poll cycles, handle input,
//! advance the engine, draw. The poller thread only fetches.

use crate::camera::Vec2;
use crate::canvas::{BrailleCanvas, Layer};
use crate::config::LiveConfig;
use crate::engine::Engine;
use crate::geo::GeoPoint;
use crate::help::{render_help_overlay, HELP, HELP_TITLE};
use crate::palette::{brighten, fade, rgb};
use crate::path::arrowhead;
use crate::regions::RegionLook;
use crate::stats::sparkline;
use crate::sync::Poller;
use crate::terminal::{MouseCaptureGuard, Terminal};
use chrono::Utc;
use crossterm::event::{
    Event, KeyCode, KeyEvent, KeyEventKind, KeyModifiers, MouseButton, MouseEvent, MouseEventKind,
};
use crossterm::style::Color;
use std::io;
use std::time::Instant;

const LAND: Color = rgb(70, 85, 100);
const ATTACKED: Color = rgb(150, 45, 55);
const SENSOR: Color = rgb(255, 255, 255);
const DIM: Color = Color::DarkGrey;
const TEXT: Color = Color::Grey;

/// Pan step for keyboard panning, as a fraction of the viewport.
const PAN_STEP: f64 = 0.1;
/// Arrowhead size and impact ring reach, in dots.
const ARROW_SIZE: f64 = 4.0;
const IMPACT_RADIUS: f64 = 10.0;
/// Dash pattern for attack lines (on, off), in dots.
const DASH: (usize, usize) = (4, 2);

const MIN_PANEL_WIDTH: u16 = 60;

#[derive(Copy, Clone, Default, Debug, PartialEq)]
struct Area {
    x: u16,
    y: u16,
    width: u16,
    height: u16,
}

impl Area {
    fn contains(&self, col: u16, row: u16) -> bool {
        col >= self.x && col < self.x + self.width && row >= self.y && row < self.y + self.height
    }
}

/// Screen split: status bar on top, map with chart panel to its right,
/// feed along the bottom.
#[derive(Copy, Clone, Default, Debug, PartialEq)]
struct Panes {
    status: Area,
    map: Area,
    charts: Area,
    feed: Area,
}

fn layout(width: u16, height: u16) -> Panes {
    let feed_h = if height > 20 { (height / 4).clamp(4, 12) } else { 0 };
    let chart_w = if width >= MIN_PANEL_WIDTH { (width / 4).clamp(24, 40) } else { 0 };
    let body_h = height.saturating_sub(1 + feed_h);
    Panes {
        status: Area { x: 0, y: 0, width, height: 1.min(height) },
        map: Area { x: 0, y: 1, width: width - chart_w, height: body_h },
        charts: Area { x: width - chart_w, y: 1, width: chart_w, height: body_h },
        feed: Area { x: 0, y: 1 + body_h, width, height: feed_h },
    }
}

/// Mouse position → dot position inside the map pane (centre of the cell).
fn pointer(map: Area, col: u16, row: u16) -> Vec2 {
    Vec2::new(
        (col.saturating_sub(map.x)) as f64 * 2.0 + 1.0,
        (row.saturating_sub(map.y)) as f64 * 4.0 + 2.0,
    )
}

struct View {
    panes: Panes,
    canvas: BrailleCanvas,
    show_help: bool,
    /// Why the map is missing, shown in its place.
    map_error: Option<String>,
    source: String,
    /// Service swatches, rebuilt when a new category gets a colour.
    legend: Vec<(String, Color)>,
}

pub fn run(term: &mut Terminal, config: &LiveConfig) -> io::Result<()> {
    let (asset, map_error) = match config.map.load(config.request_timeout) {
        Ok(asset) => {
            tracing::info!(map = %config.map, regions = asset.regions().len(), "map asset loaded");
            (Some(asset), None)
        }
        Err(e) => {
            tracing::warn!(map = %config.map, error = %e, "map asset unavailable, running without map");
            (None, Some(format!("map unavailable: {}", e)))
        }
    };

    let feed = config.feed.open();
    let source = feed.describe();
    let poller = Poller::spawn(feed, config.poll_interval);
    let _mouse_guard = MouseCaptureGuard::enable()?;

    let (width, height) = term.size();
    let panes = layout(width, height);
    let mut engine = Engine::new(config, asset, Instant::now());
    engine.layout(panes.map.width, panes.map.height);

    let mut view = View {
        panes,
        canvas: BrailleCanvas::new(panes.map.width, panes.map.height),
        show_help: false,
        map_error,
        source,
        legend: Vec::new(),
    };
    let (mut prev_w, mut prev_h) = (width, height);

    loop {
        let frame_start = Instant::now();

        if let Ok((w, h)) = crossterm::terminal::size() {
            if w != prev_w || h != prev_h {
                term.resize(w, h);
                term.clear_screen()?;
                view.panes = layout(w, h);
                view.canvas.resize(view.panes.map.width, view.panes.map.height);
                engine.layout(view.panes.map.width, view.panes.map.height);
                prev_w = w;
                prev_h = h;
            }
        }

        for result in poller.drain() {
            engine.apply_poll(result, Utc::now());
        }

        // Input until the frame budget is spent
        loop {
            let remaining = config.frame.saturating_sub(frame_start.elapsed());
            let Some(event) = term.next_event(remaining)? else {
                break;
            };
            if handle_event(&event, &mut engine, &mut view) {
                return Ok(());
            }
            if remaining.is_zero() {
                break;
            }
        }

        let now = Instant::now();
        engine.update(now, Utc::now());
        if engine.take_legend_changed() {
            view.legend = engine.colors().legend().map(|(name, c)| (name.to_string(), c)).collect();
            tracing::debug!(categories = view.legend.len(), "legend refreshed");
        }

        term.clear();
        draw_map(term, &engine, &mut view, now);
        draw_status(term, &engine, &view);
        draw_charts(term, &engine, view.panes.charts, &view.legend);
        draw_feed(term, &engine, view.panes.feed);
        if view.show_help {
            let (w, h) = term.size();
            render_help_overlay(term, w, h, HELP_TITLE, HELP);
        }
        term.present()?;
    }
}

/// Returns true to quit.
fn handle_event(event: &Event, engine: &mut Engine, view: &mut View) -> bool {
    match event {
        Event::Key(key) if key.kind != KeyEventKind::Release => handle_key(key, engine, view),
        Event::Mouse(mouse) => {
            handle_mouse(mouse, engine, view.panes.map);
            false
        }
        _ => false,
    }
}

fn handle_key(key: &KeyEvent, engine: &mut Engine, view: &mut View) -> bool {
    if key.code == KeyCode::Char('c') && key.modifiers.contains(KeyModifiers::CONTROL) {
        return true;
    }
    let map = view.panes.map;
    let step_x = map.width as f64 * 2.0 * PAN_STEP;
    let step_y = map.height as f64 * 4.0 * PAN_STEP;
    let camera = engine.camera_mut();
    match key.code {
        KeyCode::Char('q') | KeyCode::Esc => return true,
        KeyCode::Char('?') => view.show_help = !view.show_help,
        KeyCode::Char('+') | KeyCode::Char('=') => camera.zoom_centered(1),
        KeyCode::Char('-') | KeyCode::Char('_') => camera.zoom_centered(-1),
        KeyCode::Char('0') => camera.reset(),
        KeyCode::Left | KeyCode::Char('h') => camera.pan_by(Vec2::new(step_x, 0.0)),
        KeyCode::Right | KeyCode::Char('l') => camera.pan_by(Vec2::new(-step_x, 0.0)),
        KeyCode::Up | KeyCode::Char('k') => camera.pan_by(Vec2::new(0.0, step_y)),
        KeyCode::Down | KeyCode::Char('j') => camera.pan_by(Vec2::new(0.0, -step_y)),
        KeyCode::Char(' ') => {
            engine.toggle_pause();
        }
        _ => {}
    }
    false
}

fn handle_mouse(mouse: &MouseEvent, engine: &mut Engine, map: Area) {
    let now = Instant::now();
    let inside = map.contains(mouse.column, mouse.row);
    let at = pointer(map, mouse.column, mouse.row);
    let camera = engine.camera_mut();
    match mouse.kind {
        MouseEventKind::ScrollUp if inside => camera.zoom(1, at),
        MouseEventKind::ScrollDown if inside => camera.zoom(-1, at),
        MouseEventKind::Down(MouseButton::Left) if inside => camera.pointer_down(at, now),
        MouseEventKind::Drag(MouseButton::Left) => camera.pointer_move(at, now),
        MouseEventKind::Up(MouseButton::Left) => camera.pointer_up(now),
        _ => {}
    }
}

// ============================================================================
// Drawing
// ============================================================================

fn draw_map(term: &mut Terminal, engine: &Engine, view: &mut View, now: Instant) {
    let area = view.panes.map;
    if area.width == 0 || area.height == 0 {
        return;
    }
    let Some(surface) = engine.surface() else {
        let msg = view.map_error.as_deref().unwrap_or("map unavailable");
        let x = (area.width as usize).saturating_sub(msg.chars().count()) / 2;
        term.set_str(area.x as i32 + x as i32, (area.y + area.height / 2) as i32, msg, Some(DIM), false);
        return;
    };

    let canvas = &mut view.canvas;
    canvas.clear();
    let (dot_w, dot_h) = canvas.dot_size();
    let screen = |p: GeoPoint| engine.to_screen(p);

    for region in surface.asset.regions() {
        let look = surface.highlighter.look(region.id, now);
        for ring in &region.rings {
            let points: Vec<(f64, f64)> = ring.iter().map(|&p| screen(p)).collect();
            if !overlaps(&points, dot_w as f64, dot_h as f64) {
                continue;
            }
            match look {
                RegionLook::Plain => canvas.polyline(&points, LAND, Layer::Land),
                RegionLook::Attacked => canvas.polyline(&points, ATTACKED, Layer::Region),
                RegionLook::Highlighted(color) => {
                    canvas.fill_polygon(&points, fade(color, 0.55), Layer::Region);
                    canvas.polyline(&points, color, Layer::Region);
                }
            }
        }
    }

    let paths = engine.paths();
    for frame in paths.path_frames(now) {
        let color = fade(frame.color, frame.opacity);
        let from = screen(frame.source);
        if frame.dash_offset < 1.0 {
            canvas.dashed_line(from, screen(frame.line_end()), color, Layer::Path, Some(DASH));
        }
        let marker = screen(frame.marker);
        canvas.disc(marker, 1.2, brighten(color, 0.3), Layer::Path);
        if frame.arrow_opacity > 0.0 {
            let tip = GeoPoint::new(marker.0, marker.1);
            let tri = arrowhead(tip, frame.angle, ARROW_SIZE).map(|p| (p.x, p.y));
            canvas.fill_polygon(&tri, fade(frame.color, frame.arrow_opacity * frame.opacity), Layer::Path);
        }
    }

    for impact in paths.impact_frames(now) {
        let at = screen(impact.at);
        for (reach, opacity) in &impact.rings {
            canvas.ring(at, reach * IMPACT_RADIUS, fade(impact.color, *opacity), Layer::Effect);
        }
        if impact.flash > 0.0 {
            canvas.disc(at, 2.0 * impact.flash, brighten(impact.color, impact.flash), Layer::Effect);
        }
    }

    canvas.ring(screen(engine.sensor()), 1.5, SENSOR, Layer::Effect);
    canvas.render(term, area.x as i32, area.y as i32);
}

/// Cheap bounding-box test against the dot canvas.
fn overlaps(points: &[(f64, f64)], width: f64, height: f64) -> bool {
    let (mut min_x, mut min_y) = (f64::INFINITY, f64::INFINITY);
    let (mut max_x, mut max_y) = (f64::NEG_INFINITY, f64::NEG_INFINITY);
    for &(x, y) in points {
        min_x = min_x.min(x);
        max_x = max_x.max(x);
        min_y = min_y.min(y);
        max_y = max_y.max(y);
    }
    max_x >= 0.0 && max_y >= 0.0 && min_x < width && min_y < height
}

fn draw_status(term: &mut Terminal, engine: &Engine, view: &View) {
    let area = view.panes.status;
    if area.height == 0 {
        return;
    }
    let stats = engine.aggregates();
    let mut line = format!(" THREATMAP  {}  total {}  24h {}", view.source, stats.total, stats.last_24h);
    line.push_str(&format!("  queued {}", engine.pending()));
    if let Some(due) = engine.next_reveal() {
        line.push_str(&format!(" (next {}s)", (due - Utc::now()).num_seconds().max(0)));
    }
    line.push_str(&format!("  paths {}", engine.paths().active_paths()));
    if let Some(surface) = engine.surface() {
        line.push_str(&format!("  regions hit {}", surface.highlighter.attacked_count()));
        if let Some(name) = surface.highlighter.last_marked().and_then(|id| surface.asset.region_name(id)) {
            line.push_str(&format!(" (last {})", name));
        }
    }
    line.push_str(&format!("  zoom ×{:.1}", engine.camera().scale()));
    if engine.is_paused() {
        line.push_str("  [PAUSED]");
    }
    let line: String = line.chars().take(area.width as usize).collect();
    term.set_str(0, area.y as i32, &line, Some(Color::White), true);
    let hint = "? help ";
    if line.chars().count() + hint.len() < area.width as usize {
        term.set_str((area.width as usize - hint.len()) as i32, area.y as i32, hint, Some(DIM), false);
    }
}

fn draw_charts(term: &mut Terminal, engine: &Engine, area: Area, legend: &[(String, Color)]) {
    if area.width < 10 || area.height == 0 {
        return;
    }
    let x = area.x as i32 + 1;
    let width = area.width as usize - 2;
    let bottom = (area.y + area.height) as i32;
    let stats = engine.aggregates();
    let mut y = area.y as i32;

    let heading = |term: &mut Terminal, y: &mut i32, title: &str| {
        if *y < bottom {
            term.set_str(x, *y, title, Some(Color::White), true);
        }
        *y += 1;
    };

    heading(term, &mut y, "SERVICES");
    let service_max = stats.services.first().map_or(1, |r| r.count.max(1));
    for row in stats.services.iter().take(8) {
        if y >= bottom {
            break;
        }
        let color = engine.colors().peek(&row.name).unwrap_or(TEXT);
        meter(term, x, y, width, &row.name.to_uppercase(), row.count, service_max, color);
        y += 1;
    }
    y += 1;

    heading(term, &mut y, "COUNTRIES");
    let country_max = stats.countries.first().map_or(1, |r| r.count.max(1));
    for row in stats.countries.iter().take(6) {
        if y >= bottom {
            break;
        }
        meter(term, x, y, width, &row.name, row.count, country_max, ATTACKED);
        y += 1;
    }
    y += 1;

    heading(term, &mut y, "LAST 24H");
    if y < bottom {
        let counts: Vec<u64> = stats.hourly.iter().map(|(_, c)| *c).collect();
        let spark: String = sparkline(&counts).chars().take(width).collect();
        term.set_str(x, y, &spark, Some(Color::Cyan), false);
        y += 1;
    }
    if y < bottom {
        let summary = format!(
            "{} sources  {} countries  {} binaries",
            stats.unique_sources, stats.unique_countries, stats.total_binaries
        );
        let summary: String = summary.chars().take(width).collect();
        term.set_str(x, y, &summary, Some(DIM), false);
        y += 1;
    }
    y += 1;

    if legend.is_empty() {
        return;
    }
    heading(term, &mut y, "LEGEND");
    for row in legend_rows(legend, width) {
        if y >= bottom {
            break;
        }
        let mut cx = x;
        for (name, color) in row {
            term.set(cx, y, '■', Some(*color), false);
            term.set_str(cx + 2, y, name, Some(TEXT), false);
            cx += name.chars().count() as i32 + 4;
        }
        y += 1;
    }
}

/// Pack `■ NAME` swatches into rows of at most `width` cells.
fn legend_rows(legend: &[(String, Color)], width: usize) -> Vec<Vec<&(String, Color)>> {
    let mut rows: Vec<Vec<&(String, Color)>> = Vec::new();
    let mut used = 0;
    for entry in legend {
        let cells = entry.0.chars().count() + 2;
        match rows.last_mut() {
            Some(row) if used + 2 + cells <= width => {
                row.push(entry);
                used += 2 + cells;
            }
            _ => {
                rows.push(vec![entry]);
                used = cells;
            }
        }
    }
    rows
}

/// `label ████░░░ count` in one row of `width` cells.
#[allow(clippy::too_many_arguments)]
fn meter(term: &mut Terminal, x: i32, y: i32, width: usize, label: &str, count: u64, max: u64, color: Color) {
    let label_w = 10.min(width / 3);
    let count_text = count.to_string();
    let bar_w = width.saturating_sub(label_w + count_text.len() + 2);
    let filled = ((count as f64 / max as f64) * bar_w as f64).round() as usize;

    let label: String = label.chars().take(label_w).collect();
    term.set_str(x, y, &label, Some(TEXT), false);
    let bar_x = x + label_w as i32 + 1;
    for i in 0..bar_w {
        let (ch, fg) = if i < filled { ('█', color) } else { ('░', DIM) };
        term.set(bar_x + i as i32, y, ch, Some(fg), false);
    }
    term.set_str(bar_x + bar_w as i32 + 1, y, &count_text, Some(TEXT), false);
}

fn draw_feed(term: &mut Terminal, engine: &Engine, area: Area) {
    if area.height < 2 {
        return;
    }
    let rule: String = "─".repeat(area.width as usize);
    term.set_str(area.x as i32, area.y as i32, &rule, Some(DIM), false);
    term.set_str(area.x as i32 + 2, area.y as i32, " LIVE FEED ", Some(Color::White), true);

    let rows = (area.height - 1) as usize;
    let lines = engine.feed();
    let first_row = area.y as i32 + 1 + rows.saturating_sub(lines.len()) as i32;
    for (i, line) in lines.iter().skip(lines.len().saturating_sub(rows)).enumerate() {
        let text: String = line.text.chars().take(area.width as usize - 1).collect();
        term.set_str(area.x as i32 + 1, first_row + i as i32, &text, Some(line.color), false);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn layout_partitions_screen() {
        let panes = layout(120, 40);
        assert_eq!(panes.status, Area { x: 0, y: 0, width: 120, height: 1 });
        assert_eq!(panes.feed.height, 10);
        assert_eq!(panes.map.height + panes.feed.height + 1, 40);
        assert_eq!(panes.map.width + panes.charts.width, 120);
        assert_eq!(panes.charts.x, panes.map.width);
    }

    #[test]
    fn small_terminal_drops_side_panes() {
        let panes = layout(50, 15);
        assert_eq!(panes.charts.width, 0);
        assert_eq!(panes.feed.height, 0);
        assert_eq!(panes.map.width, 50);
    }

    #[test]
    fn pointer_maps_cells_to_dot_centres() {
        let map = Area { x: 0, y: 1, width: 80, height: 30 };
        assert_eq!(pointer(map, 0, 1), Vec2::new(1.0, 2.0));
        assert_eq!(pointer(map, 10, 6), Vec2::new(21.0, 22.0));
    }

    #[test]
    fn legend_wraps_to_pane_width() {
        let legend: Vec<(String, Color)> = ["SSH", "HTTP", "TELNET", "RDP"]
            .iter()
            .map(|n| (n.to_string(), Color::Red))
            .collect();
        let rows = legend_rows(&legend, 16);
        let names: Vec<Vec<&str>> = rows.iter().map(|r| r.iter().map(|e| e.0.as_str()).collect()).collect();
        // "■ SSH  ■ HTTP" is 13 cells, TELNET would overflow
        assert_eq!(names, vec![vec!["SSH", "HTTP"], vec!["TELNET", "RDP"]]);
        assert!(legend_rows(&[], 16).is_empty());
    }

    #[test]
    fn offscreen_rings_are_culled() {
        assert!(overlaps(&[(-10.0, -10.0), (5.0, 5.0)], 100.0, 50.0));
        assert!(!overlaps(&[(120.0, 10.0), (140.0, 20.0)], 100.0, 50.0));
    }
}
