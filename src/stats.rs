//! Aggregate statistics for the chart pane and the `stats` command
//!
//! The producer's summary wins wherever it has a value. Anything it leaves
//! out is derived from the event snapshot, field by field.

use crate::event::AttackEvent;
use crate::feed::Summary;
use chrono::{DateTime, Duration, DurationRound, Utc};
use std::collections::{BTreeMap, HashMap, HashSet};
use std::fmt::Write;

pub const TOP_ATTACKERS: usize = 15;
pub const HOURS: usize = 24;

const SPARK: [char; 8] = ['▁', '▂', '▃', '▄', '▅', '▆', '▇', '█'];

#[derive(Clone, Debug, PartialEq)]
pub struct Ranked {
    pub name: String,
    pub count: u64,
}

#[derive(Clone, Debug, Default, PartialEq)]
pub struct Aggregates {
    pub total: u64,
    pub unique_sources: u64,
    pub unique_countries: u64,
    pub total_binaries: u64,
    pub services: Vec<Ranked>,
    pub countries: Vec<Ranked>,
    pub top_attackers: Vec<Ranked>,
    /// `YYYY-MM-DD HH:00` (UTC) buckets, oldest first, ending at the current hour.
    pub hourly: Vec<(String, u64)>,
    pub last_24h: u64,
    pub last_updated: Option<String>,
}

impl Aggregates {
    pub fn compute(snapshot: &[AttackEvent], summary: Option<&Summary>, now: DateTime<Utc>) -> Self {
        let empty = Summary::default();
        let summary = summary.unwrap_or(&empty);

        let sources: HashSet<&str> = snapshot.iter().map(|e| e.source_ip.as_str()).collect();
        let known_countries: HashSet<&str> = snapshot.iter().filter_map(|e| e.country.as_deref()).collect();
        let day_ago = now - Duration::hours(HOURS as i64);

        let services = match &summary.services_targeted {
            Some(map) => rank_map(map),
            None => rank(snapshot.iter().map(|e| e.service_name().to_lowercase())),
        };
        let countries = match &summary.countries {
            Some(map) => rank_map(map),
            None => rank(
                snapshot
                    .iter()
                    .map(|e| e.country.clone().unwrap_or_else(|| "Unknown".to_string())),
            ),
        };
        let mut top_attackers = match &summary.top_attackers {
            Some(map) => rank_map(map),
            None => rank(snapshot.iter().map(|e| e.source_ip.clone())),
        };
        top_attackers.truncate(TOP_ATTACKERS);

        let total_binaries = summary
            .total_binaries
            .or_else(|| summary.binary_stats.as_ref().and_then(|b| b.total_binaries))
            .unwrap_or(0);

        Self {
            total: summary.total_attacks.unwrap_or(snapshot.len() as u64),
            unique_sources: summary.unique_ips.unwrap_or(sources.len() as u64),
            unique_countries: summary.unique_countries.unwrap_or(known_countries.len() as u64),
            total_binaries,
            services,
            countries,
            top_attackers,
            hourly: hourly_buckets(snapshot, now),
            last_24h: summary
                .last_24h_attacks
                .unwrap_or_else(|| snapshot.iter().filter(|e| e.timestamp > day_ago).count() as u64),
            last_updated: summary.last_updated.clone(),
        }
    }

    /// Plain-text report for print mode.
    pub fn report(&self) -> String {
        let mut out = String::new();
        let _ = writeln!(out, "Total attacks:     {}", self.total);
        let _ = writeln!(out, "Unique sources:    {}", self.unique_sources);
        let _ = writeln!(out, "Unique countries:  {}", self.unique_countries);
        let _ = writeln!(out, "Last 24h:          {}", self.last_24h);
        let _ = writeln!(out, "Binaries captured: {}", self.total_binaries);
        if let Some(updated) = &self.last_updated {
            let _ = writeln!(out, "Last updated:      {}", updated);
        }

        for (title, rows) in [
            ("Services", &self.services),
            ("Countries", &self.countries),
            ("Top attackers", &self.top_attackers),
        ] {
            let _ = writeln!(out, "\n{}:", title);
            if rows.is_empty() {
                let _ = writeln!(out, "  (none)");
            }
            for row in rows.iter().take(TOP_ATTACKERS) {
                let _ = writeln!(out, "  {:<24} {:>8}", row.name, row.count);
            }
        }

        let counts: Vec<u64> = self.hourly.iter().map(|(_, c)| *c).collect();
        let _ = writeln!(out, "\nLast {} hours: {}", HOURS, sparkline(&counts));
        out
    }
}

/// Count occurrences and rank them.
fn rank(items: impl Iterator<Item = String>) -> Vec<Ranked> {
    let mut counts: HashMap<String, u64> = HashMap::new();
    for item in items {
        *counts.entry(item).or_default() += 1;
    }
    sort_ranked(counts.into_iter())
}

fn rank_map(map: &BTreeMap<String, u64>) -> Vec<Ranked> {
    sort_ranked(map.iter().map(|(k, v)| (k.clone(), *v)))
}

/// Count descending, then name ascending.
fn sort_ranked(items: impl Iterator<Item = (String, u64)>) -> Vec<Ranked> {
    let mut ranked: Vec<Ranked> = items.map(|(name, count)| Ranked { name, count }).collect();
    ranked.sort_by(|a, b| b.count.cmp(&a.count).then_with(|| a.name.cmp(&b.name)));
    ranked
}

fn hourly_buckets(snapshot: &[AttackEvent], now: DateTime<Utc>) -> Vec<(String, u64)> {
    let hour = Duration::hours(1);
    let current = now.duration_trunc(hour).unwrap_or(now);
    let mut buckets: Vec<(String, u64)> = (0..HOURS)
        .rev()
        .map(|back| {
            let start = current - hour * back as i32;
            (start.format("%Y-%m-%d %H:00").to_string(), 0)
        })
        .collect();

    let first = current - hour * (HOURS as i32 - 1);
    for event in snapshot {
        if event.timestamp < first || event.timestamp >= current + hour {
            continue;
        }
        let index = ((event.timestamp - first).num_seconds() / 3600) as usize;
        if let Some(bucket) = buckets.get_mut(index) {
            bucket.1 += 1;
        }
    }
    buckets
}

/// One block character per value, scaled to the largest.
pub fn sparkline(values: &[u64]) -> String {
    let max = values.iter().copied().max().unwrap_or(0);
    values
        .iter()
        .map(|&v| {
            if max == 0 || v == 0 {
                ' '
            } else {
                let level = (v * (SPARK.len() as u64 - 1)).div_ceil(max) as usize;
                SPARK[level.min(SPARK.len() - 1)]
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn event(ip: &str, country: Option<&str>, service: &str, at: DateTime<Utc>) -> AttackEvent {
        AttackEvent {
            timestamp: at,
            raw_timestamp: at.to_rfc3339(),
            source_ip: ip.to_string(),
            dest_port: None,
            service: Some(service.to_string()),
            country: country.map(str::to_string),
            city: None,
            lat: None,
            lon: None,
        }
    }

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 8, 25, 14, 38, 18).unwrap()
    }

    fn snapshot() -> Vec<AttackEvent> {
        let n = now();
        vec![
            event("1.1.1.1", Some("China"), "ssh", n - Duration::minutes(5)),
            event("1.1.1.1", Some("China"), "ssh", n - Duration::minutes(70)),
            event("2.2.2.2", Some("Russia"), "http", n - Duration::hours(3)),
            event("3.3.3.3", None, "ssh", n - Duration::hours(30)),
        ]
    }

    #[test]
    fn derives_everything_without_summary() {
        let agg = Aggregates::compute(&snapshot(), None, now());
        assert_eq!(agg.total, 4);
        assert_eq!(agg.unique_sources, 3);
        assert_eq!(agg.unique_countries, 2);
        assert_eq!(agg.last_24h, 3);
        assert_eq!(agg.services[0], Ranked { name: "ssh".into(), count: 3 });
        assert_eq!(agg.countries[0].name, "China");
        assert!(agg.countries.iter().any(|r| r.name == "Unknown"));
        assert_eq!(agg.top_attackers[0].name, "1.1.1.1");
    }

    #[test]
    fn partial_summary_is_merged() {
        let summary = Summary {
            total_attacks: Some(1000),
            services_targeted: Some(BTreeMap::from([("telnet".to_string(), 600), ("ssh".to_string(), 400)])),
            ..Summary::default()
        };
        let agg = Aggregates::compute(&snapshot(), Some(&summary), now());
        assert_eq!(agg.total, 1000);
        assert_eq!(agg.services[0].name, "telnet");
        // Not in the summary, so derived locally
        assert_eq!(agg.unique_sources, 3);
        assert_eq!(agg.countries[0].name, "China");
    }

    #[test]
    fn ties_rank_by_name() {
        let ranked = rank(["b", "a", "c", "a", "b"].iter().map(|s| s.to_string()));
        let names: Vec<&str> = ranked.iter().map(|r| r.name.as_str()).collect();
        assert_eq!(names, vec!["a", "b", "c"]);
    }

    #[test]
    fn top_attackers_capped() {
        let n = now();
        let events: Vec<AttackEvent> = (0..30)
            .map(|i| event(&format!("10.0.0.{}", i), None, "ssh", n))
            .collect();
        let agg = Aggregates::compute(&events, None, n);
        assert_eq!(agg.top_attackers.len(), TOP_ATTACKERS);
    }

    #[test]
    fn hourly_buckets_end_at_current_hour() {
        let agg = Aggregates::compute(&snapshot(), None, now());
        assert_eq!(agg.hourly.len(), HOURS);
        assert_eq!(agg.hourly[HOURS - 1], ("2025-08-25 14:00".to_string(), 1));
        assert_eq!(agg.hourly[HOURS - 2], ("2025-08-25 13:00".to_string(), 1));
        assert_eq!(agg.hourly[HOURS - 4], ("2025-08-25 11:00".to_string(), 1));
        assert_eq!(agg.hourly[0].0, "2025-08-24 15:00");
        let sum: u64 = agg.hourly.iter().map(|(_, c)| c).sum();
        assert_eq!(sum, 3);
    }

    #[test]
    fn binaries_fall_back_to_binary_stats() {
        let summary = Summary {
            binary_stats: Some(crate::feed::BinaryStats {
                total_binaries: Some(7),
                ..Default::default()
            }),
            ..Summary::default()
        };
        assert_eq!(Aggregates::compute(&[], Some(&summary), now()).total_binaries, 7);
    }

    #[test]
    fn sparkline_scales_to_max() {
        assert_eq!(sparkline(&[0, 1, 7]), " ▂█");
        assert_eq!(sparkline(&[0, 0]), "  ");
    }

    #[test]
    fn report_lists_sections() {
        let report = Aggregates::compute(&snapshot(), None, now()).report();
        assert!(report.contains("Total attacks:     4"));
        assert!(report.contains("Top attackers:"));
        assert!(report.contains("1.1.1.1"));
    }
}
