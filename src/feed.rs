//! Sensor feed sources
//!
//! The producer publishes two documents: `attacks.json`, the complete event
//! list, and `summary.json`, precomputed aggregates. Both can be polled over
//! HTTP or read straight from the directory the producer writes them to.
//! The demo feed synthesises an append-only log for use without a sensor.

use crate::event::{decode_events, AttackEvent};
use chrono::Utc;
use rand::prelude::*;
use serde::Deserialize;
use serde_json::{json, Value};
use std::collections::BTreeMap;
use std::fs;
use std::io;
use std::path::PathBuf;
use std::sync::Mutex;
use std::time::Duration;
use thiserror::Error;

pub const EVENTS_FILE: &str = "attacks.json";
pub const SUMMARY_FILE: &str = "summary.json";

#[derive(Debug, Error)]
pub enum FeedError {
    #[error("request to {url} failed: {source}")]
    Http { url: String, source: Box<ureq::Error> },
    #[error("{url} returned HTTP {status}")]
    Status { url: String, status: u16 },
    #[error("cannot read {path}: {source}")]
    Io { path: PathBuf, source: io::Error },
    #[error("invalid JSON from {origin}: {source}")]
    Json { origin: String, source: serde_json::Error },
}

/// Aggregates as published by the producer. Every field may be missing.
#[derive(Clone, Debug, Default, Deserialize, PartialEq)]
#[serde(default)]
pub struct Summary {
    pub total_attacks: Option<u64>,
    pub unique_ips: Option<u64>,
    pub unique_countries: Option<u64>,
    pub total_binaries: Option<u64>,
    pub top_attackers: Option<BTreeMap<String, u64>>,
    pub services_targeted: Option<BTreeMap<String, u64>>,
    pub countries: Option<BTreeMap<String, u64>>,
    pub last_updated: Option<String>,
    pub last_24h_attacks: Option<u64>,
    pub new_attacks_this_run: Option<u64>,
    pub binary_stats: Option<BinaryStats>,
}

#[derive(Clone, Debug, Default, Deserialize, PartialEq)]
#[serde(default)]
pub struct BinaryStats {
    pub total_binaries: Option<u64>,
    pub file_types: BTreeMap<String, u64>,
    pub size_distribution: BTreeMap<String, u64>,
}

/// Where events and summaries come from.
///
/// Both calls may run at the same time from different threads.
pub trait FeedSource: Send + Sync {
    fn fetch_events(&self) -> Result<Vec<AttackEvent>, FeedError>;
    fn fetch_summary(&self) -> Result<Summary, FeedError>;
    fn describe(&self) -> String;
}

fn parse_events(body: &str, origin: &str) -> Result<Vec<AttackEvent>, FeedError> {
    let raw: Value = serde_json::from_str(body).map_err(|source| FeedError::Json {
        origin: origin.to_string(),
        source,
    })?;
    Ok(decode_events(&raw))
}

fn parse_summary(body: &str, origin: &str) -> Result<Summary, FeedError> {
    serde_json::from_str(body).map_err(|source| FeedError::Json {
        origin: origin.to_string(),
        source,
    })
}

// ============================================================================
// HTTP
// ============================================================================

pub struct HttpFeed {
    agent: ureq::Agent,
    events_url: String,
    summary_url: String,
}

impl HttpFeed {
    /// `base` is the directory URL serving both documents.
    pub fn new(base: &str, timeout: Duration) -> Self {
        let base = base.trim_end_matches('/');
        Self {
            agent: ureq::AgentBuilder::new().timeout(timeout).build(),
            events_url: format!("{}/{}", base, EVENTS_FILE),
            summary_url: format!("{}/{}", base, SUMMARY_FILE),
        }
    }

    fn get(&self, url: &str) -> Result<String, FeedError> {
        let response = self.agent.get(url).call().map_err(|e| match e {
            ureq::Error::Status(status, _) => FeedError::Status {
                url: url.to_string(),
                status,
            },
            other => FeedError::Http {
                url: url.to_string(),
                source: Box::new(other),
            },
        })?;
        response.into_string().map_err(|source| FeedError::Io {
            path: PathBuf::from(url),
            source,
        })
    }
}

impl FeedSource for HttpFeed {
    fn fetch_events(&self) -> Result<Vec<AttackEvent>, FeedError> {
        let body = self.get(&self.events_url)?;
        parse_events(&body, &self.events_url)
    }

    fn fetch_summary(&self) -> Result<Summary, FeedError> {
        let body = self.get(&self.summary_url)?;
        parse_summary(&body, &self.summary_url)
    }

    fn describe(&self) -> String {
        self.events_url.trim_end_matches(EVENTS_FILE).to_string()
    }
}

// ============================================================================
// Directory
// ============================================================================

pub struct DirFeed {
    dir: PathBuf,
}

impl DirFeed {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    fn read(&self, name: &str) -> Result<(String, PathBuf), FeedError> {
        let path = self.dir.join(name);
        let body = fs::read_to_string(&path).map_err(|source| FeedError::Io {
            path: path.clone(),
            source,
        })?;
        Ok((body, path))
    }
}

impl FeedSource for DirFeed {
    fn fetch_events(&self) -> Result<Vec<AttackEvent>, FeedError> {
        let (body, path) = self.read(EVENTS_FILE)?;
        parse_events(&body, &path.display().to_string())
    }

    fn fetch_summary(&self) -> Result<Summary, FeedError> {
        let (body, path) = self.read(SUMMARY_FILE)?;
        parse_summary(&body, &path.display().to_string())
    }

    fn describe(&self) -> String {
        self.dir.display().to_string()
    }
}

// ============================================================================
// Demo
// ============================================================================

struct DemoSource {
    ip: &'static str,
    country: &'static str,
    city: &'static str,
    lat: f64,
    lon: f64,
}

/// Sample sources; the zero-coordinate ones exercise the lookup tables.
const DEMO_SOURCES: [DemoSource; 10] = [
    DemoSource { ip: "45.142.212.33", country: "Russia", city: "Moscow", lat: 55.7558, lon: 37.6173 },
    DemoSource { ip: "103.99.0.122", country: "China", city: "Shanghai", lat: 31.2304, lon: 121.4737 },
    DemoSource { ip: "185.220.101.76", country: "Germany", city: "Frankfurt", lat: 50.1109, lon: 8.6821 },
    DemoSource { ip: "198.51.100.42", country: "United States", city: "New York", lat: 40.7128, lon: -74.0060 },
    DemoSource { ip: "192.0.2.146", country: "France", city: "Paris", lat: 48.8566, lon: 2.3522 },
    DemoSource { ip: "177.54.12.9", country: "Brazil", city: "Sao Paulo", lat: 0.0, lon: 0.0 },
    DemoSource { ip: "41.77.3.200", country: "Nigeria", city: "Unknown", lat: 0.0, lon: 0.0 },
    DemoSource { ip: "14.161.40.7", country: "Vietnam", city: "Hanoi", lat: 0.0, lon: 0.0 },
    DemoSource { ip: "5.188.10.180", country: "Netherlands", city: "Amsterdam", lat: 52.3676, lon: 4.9041 },
    DemoSource { ip: "223.71.167.29", country: "KR", city: "Unknown", lat: 0.0, lon: 0.0 },
];

const DEMO_SERVICES: [(&str, u16); 8] = [
    ("ssh", 22),
    ("http", 80),
    ("ftp", 21),
    ("telnet", 23),
    ("smb", 445),
    ("mysql", 3306),
    ("", 3389),
    ("", 8291),
];

/// Upper bound on the synthetic log, oldest records dropped first.
const DEMO_LOG_LIMIT: usize = 500;

struct DemoState {
    rng: StdRng,
    log: Vec<Value>,
}

pub struct DemoFeed {
    state: Mutex<DemoState>,
}

impl DemoFeed {
    pub fn new() -> Self {
        Self::with_rng(StdRng::from_entropy())
    }

    #[cfg(test)]
    pub fn seeded(seed: u64) -> Self {
        Self::with_rng(StdRng::seed_from_u64(seed))
    }

    fn with_rng(rng: StdRng) -> Self {
        Self {
            state: Mutex::new(DemoState { rng, log: Vec::new() }),
        }
    }
}

impl Default for DemoFeed {
    fn default() -> Self {
        Self::new()
    }
}

impl DemoState {
    fn grow(&mut self) {
        let count: u32 = self.rng.gen_range(0..=3);
        for i in 0..count {
            let source = &DEMO_SOURCES[self.rng.gen_range(0..DEMO_SOURCES.len())];
            let (service, port) = DEMO_SERVICES[self.rng.gen_range(0..DEMO_SERVICES.len())];
            // Spread records created together so their keys stay distinct
            let at = Utc::now() - chrono::Duration::milliseconds(i64::from(count - i) * 137);
            let mut record = json!({
                "timestamp": at.format("%Y-%m-%dT%H:%M:%S%.3f").to_string(),
                "src_ip": source.ip,
                "src_port": self.rng.gen_range(1024..65535),
                "dst_port": port.to_string(),
                "country": source.country,
                "city": source.city,
                "lat": source.lat,
                "lon": source.lon,
            });
            if !service.is_empty() {
                record["service"] = json!(service);
            }
            self.log.push(record);
        }
        if self.log.len() > DEMO_LOG_LIMIT {
            let excess = self.log.len() - DEMO_LOG_LIMIT;
            self.log.drain(..excess);
        }
    }
}

impl FeedSource for DemoFeed {
    fn fetch_events(&self) -> Result<Vec<AttackEvent>, FeedError> {
        let mut state = self.state.lock().unwrap_or_else(|e| e.into_inner());
        state.grow();
        Ok(decode_events(&Value::Array(state.log.clone())))
    }

    /// Only the total is published; everything else is derived locally.
    fn fetch_summary(&self) -> Result<Summary, FeedError> {
        let state = self.state.lock().unwrap_or_else(|e| e.into_inner());
        Ok(Summary {
            total_attacks: Some(state.log.len() as u64),
            last_updated: Some(Utc::now().to_rfc3339()),
            ..Summary::default()
        })
    }

    fn describe(&self) -> String {
        "demo".to_string()
    }
}
