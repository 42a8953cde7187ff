//! Service category colors
//!
//! Colors are assigned once per category for the lifetime of the session.
//! Known categories get a curated color; anything else takes the next slot
//! of a fallback palette that shares no entries with the curated one.

use crossterm::style::Color;
use std::collections::HashMap;

/// Helper to create RGB colors
pub const fn rgb(r: u8, g: u8, b: u8) -> Color {
    Color::Rgb { r, g, b }
}

const CURATED: [(&str, Color); 20] = [
    ("SSH", rgb(255, 85, 85)),
    ("TELNET", rgb(255, 121, 198)),
    ("HTTP", rgb(255, 170, 60)),
    ("HTTPS", rgb(241, 250, 140)),
    ("FTP", rgb(139, 233, 253)),
    ("TFTP", rgb(98, 190, 230)),
    ("SMB", rgb(189, 147, 249)),
    ("NETBIOS", rgb(150, 120, 230)),
    ("EPMAP", rgb(120, 110, 210)),
    ("MYSQL", rgb(80, 160, 255)),
    ("MSSQL", rgb(60, 120, 220)),
    ("MONGO", rgb(80, 250, 123)),
    ("RDP", rgb(255, 110, 40)),
    ("SIP", rgb(0, 220, 180)),
    ("SMTP", rgb(230, 200, 90)),
    ("DNS", rgb(170, 230, 90)),
    ("MQTT", rgb(255, 140, 140)),
    ("UPNP", rgb(200, 160, 255)),
    ("MEMCACHE", rgb(120, 220, 220)),
    ("PPTP", rgb(250, 200, 200)),
];

const FALLBACK: [Color; 10] = [
    rgb(0, 200, 255),
    rgb(255, 0, 110),
    rgb(160, 255, 0),
    rgb(255, 215, 0),
    rgb(0, 255, 170),
    rgb(200, 80, 255),
    rgb(255, 100, 0),
    rgb(90, 140, 255),
    rgb(240, 240, 240),
    rgb(180, 130, 90),
];

type Listener = Box<dyn FnMut(&str, Color)>;

pub struct ColorRegistry {
    assigned: HashMap<String, Color>,
    /// Categories in first-seen order, for the legend.
    order: Vec<String>,
    unrecognized: usize,
    listeners: Vec<Listener>,
}

impl ColorRegistry {
    pub fn new() -> Self {
        Self {
            assigned: HashMap::new(),
            order: Vec::new(),
            unrecognized: 0,
            listeners: Vec::new(),
        }
    }

    /// Register a callback fired once per newly colored category.
    pub fn subscribe(&mut self, listener: Listener) {
        self.listeners.push(listener);
    }

    pub fn color_for(&mut self, service: &str) -> Color {
        let name = normalize(service);
        if let Some(&color) = self.assigned.get(&name) {
            return color;
        }

        let color = match CURATED.iter().find(|(known, _)| *known == name) {
            Some(&(_, color)) => color,
            None => {
                let color = FALLBACK[self.unrecognized % FALLBACK.len()];
                self.unrecognized += 1;
                color
            }
        };

        self.assigned.insert(name.clone(), color);
        self.order.push(name.clone());
        for listener in &mut self.listeners {
            listener(&name, color);
        }
        color
    }

    /// Color already assigned to a category, without assigning one.
    pub fn peek(&self, service: &str) -> Option<Color> {
        self.assigned.get(&normalize(service)).copied()
    }

    /// Assigned categories in the order they were first seen.
    pub fn legend(&self) -> impl Iterator<Item = (&str, Color)> + '_ {
        self.order
            .iter()
            .filter_map(|name| self.assigned.get(name).map(|&c| (name.as_str(), c)))
    }
}

impl Default for ColorRegistry {
    fn default() -> Self {
        Self::new()
    }
}

pub fn normalize(service: &str) -> String {
    let trimmed = service.trim();
    if trimmed.is_empty() {
        return "UNKNOWN".to_string();
    }
    trimmed.to_uppercase()
}

/// Scale a color toward black; `alpha` in `0..=1`.
pub fn fade(color: Color, alpha: f64) -> Color {
    let a = alpha.clamp(0.0, 1.0);
    match color {
        Color::Rgb { r, g, b } => rgb(
            (r as f64 * a).round() as u8,
            (g as f64 * a).round() as u8,
            (b as f64 * a).round() as u8,
        ),
        other => other,
    }
}

/// Blend a color toward white; `amount` in `0..=1`.
pub fn brighten(color: Color, amount: f64) -> Color {
    let t = amount.clamp(0.0, 1.0);
    match color {
        Color::Rgb { r, g, b } => {
            let up = |c: u8| (c as f64 + (255.0 - c as f64) * t).round() as u8;
            rgb(up(r), up(g), up(b))
        }
        other => other,
    }
}
