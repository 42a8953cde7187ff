//! Attack events as delivered by the sensor feed

use crate::timestamp;
use chrono::{DateTime, Utc};
use serde_json::{Map, Value};
use std::fmt;

/// Place names the producer writes when it could not geolocate a source.
const UNKNOWN_PLACES: [&str; 4] = ["unknown", "private/local", "local network", "n/a"];

/// One observed sensor record.
#[derive(Clone, Debug, PartialEq)]
pub struct AttackEvent {
    pub timestamp: DateTime<Utc>,
    /// The timestamp exactly as the feed sent it; part of the identity key.
    pub raw_timestamp: String,
    pub source_ip: String,
    pub dest_port: Option<u16>,
    pub service: Option<String>,
    pub country: Option<String>,
    pub city: Option<String>,
    pub lat: Option<f64>,
    pub lon: Option<f64>,
}

/// Identity of an event within a feed: `(timestamp, source ip)`.
///
/// Not globally unique. Two records with the same key are the same logical
/// event even if the feed resends them.
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct EventKey {
    pub timestamp: String,
    pub source_ip: String,
}

impl fmt::Display for EventKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}@{}", self.source_ip, self.timestamp)
    }
}

impl AttackEvent {
    pub fn key(&self) -> EventKey {
        EventKey {
            timestamp: self.raw_timestamp.clone(),
            source_ip: self.source_ip.clone(),
        }
    }

    /// Explicit coordinates, if the producer supplied usable ones.
    ///
    /// The producer writes `0, 0` for sources it could not place, so a zero
    /// component counts as missing.
    pub fn coordinates(&self) -> Option<(f64, f64)> {
        let lat = self.lat.filter(|v| v.is_finite() && *v != 0.0)?;
        let lon = self.lon.filter(|v| v.is_finite() && *v != 0.0)?;
        Some((lat, lon))
    }

    /// Service category, derived from the destination port when absent.
    pub fn service_name(&self) -> String {
        match (&self.service, self.dest_port) {
            (Some(s), _) => s.clone(),
            (None, Some(port)) => service_for_port(port),
            (None, None) => "unknown".to_string(),
        }
    }

    /// Decode one raw feed record. Returns `None` for records without a
    /// source address; everything else is optional.
    pub fn from_value(raw: &Value) -> Option<Self> {
        let obj = raw.as_object()?;
        let field = |names: &[&str]| first_field(obj, names);

        let source_ip = field(&["src_ip", "sourceIp", "source_ip"])
            .and_then(Value::as_str)
            .map(str::trim)
            .filter(|s| !s.is_empty())?
            .to_string();

        let ts_value = field(&["timestamp", "time"]).cloned().unwrap_or(Value::Null);
        let raw_timestamp = match &ts_value {
            Value::String(s) => s.clone(),
            Value::Null => String::new(),
            other => other.to_string(),
        };

        Some(Self {
            timestamp: timestamp::normalize(&ts_value),
            raw_timestamp,
            source_ip,
            dest_port: field(&["dst_port", "destPort", "dest_port"]).and_then(parse_port),
            service: field(&["service"]).and_then(text).map(str::to_string),
            country: field(&["country"]).and_then(place),
            city: field(&["city"]).and_then(place),
            lat: field(&["lat", "latitude"]).and_then(parse_f64),
            lon: field(&["lon", "lng", "longitude"]).and_then(parse_f64),
        })
    }
}

/// Decode a whole event list, skipping malformed records.
pub fn decode_events(raw: &Value) -> Vec<AttackEvent> {
    let Some(items) = raw.as_array() else {
        return Vec::new();
    };
    items
        .iter()
        .filter_map(|item| {
            let event = AttackEvent::from_value(item);
            if event.is_none() {
                tracing::debug!(record = %item, "skipping feed record without source address");
            }
            event
        })
        .collect()
}

/// Well-known service for a destination port, as the sensor pipeline names them.
pub fn service_for_port(port: u16) -> String {
    let name = match port {
        21 => "ftp",
        22 => "ssh",
        23 => "telnet",
        25 => "smtp",
        53 => "dns",
        69 => "tftp",
        80 => "http",
        110 => "pop3",
        135 => "epmap",
        139 => "netbios",
        143 => "imap",
        443 => "https",
        445 => "smb",
        631 => "printer",
        993 => "imaps",
        995 => "pop3s",
        1433 => "mssql",
        1723 => "pptp",
        1883 => "mqtt",
        3306 => "mysql",
        3389 => "rdp",
        5000 => "upnp",
        5060 => "sip",
        11211 => "memcache",
        27017 => "mongo",
        _ => return format!("port-{}", port),
    };
    name.to_string()
}

fn first_field<'a>(obj: &'a Map<String, Value>, names: &[&str]) -> Option<&'a Value> {
    names
        .iter()
        .find_map(|n| obj.get(*n))
        .filter(|v| !v.is_null())
}

fn text(v: &Value) -> Option<&str> {
    v.as_str().map(str::trim).filter(|s| !s.is_empty())
}

fn place(v: &Value) -> Option<String> {
    let s = text(v)?;
    if UNKNOWN_PLACES.contains(&s.to_lowercase().as_str()) {
        return None;
    }
    Some(s.to_string())
}

fn parse_port(v: &Value) -> Option<u16> {
    match v {
        Value::Number(n) => n.as_u64().and_then(|p| u16::try_from(p).ok()),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}

fn parse_f64(v: &Value) -> Option<f64> {
    match v {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}
