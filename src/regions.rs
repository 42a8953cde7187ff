//! Region highlighting
//!
//! Country names in the feed rarely match the labels on the map asset, so
//! names are expanded through a synonym table. The expansion is done once at
//! load time into an index from every known spelling to all the regions it
//! covers; lookups afterwards are a single hash probe.

use crate::map::{MapAsset, RegionId};
use crossterm::style::Color;
use std::collections::{BTreeSet, HashMap};
use std::time::{Duration, Instant};

/// Canonical country name → alternate codes, spellings and territories
/// drawn as separate shapes.
const SYNONYMS: &[(&str, &[&str])] = &[
    ("United States", &["US", "USA", "United States of America", "America", "Alaska", "Hawaii", "Puerto Rico"]),
    ("United Kingdom", &["UK", "GB", "GBR", "Great Britain", "England", "Scotland", "Wales", "Northern Ireland"]),
    ("Russia", &["RU", "RUS", "Russian Federation"]),
    ("China", &["CN", "CHN", "People's Republic of China"]),
    ("South Korea", &["KR", "KOR", "Korea", "Republic of Korea", "Korea, Republic of"]),
    ("North Korea", &["KP", "PRK", "Dem. Rep. Korea", "Democratic People's Republic of Korea"]),
    ("Germany", &["DE", "DEU", "Deutschland"]),
    ("France", &["FR", "FRA", "French Guiana", "Corsica"]),
    ("Netherlands", &["NL", "NLD", "The Netherlands", "Holland"]),
    ("Brazil", &["BR", "BRA", "Brasil"]),
    ("India", &["IN", "IND"]),
    ("Vietnam", &["VN", "VNM", "Viet Nam"]),
    ("Iran", &["IR", "IRN", "Islamic Republic of Iran", "Iran, Islamic Republic of"]),
    ("Taiwan", &["TW", "TWN", "Republic of China"]),
    ("Hong Kong", &["HK", "HKG"]),
    ("Japan", &["JP", "JPN"]),
    ("Ukraine", &["UA", "UKR"]),
    ("Czechia", &["CZ", "CZE", "Czech Republic", "Czech Rep."]),
    ("Canada", &["CA", "CAN"]),
    ("Mexico", &["MX", "MEX"]),
    ("Indonesia", &["ID", "IDN"]),
    ("Turkey", &["TR", "TUR", "Türkiye", "Turkiye"]),
    ("Singapore", &["SG", "SGP"]),
    ("Bulgaria", &["BG", "BGR"]),
    ("Romania", &["RO", "ROU"]),
    ("Poland", &["PL", "POL"]),
    ("Italy", &["IT", "ITA", "Sicily", "Sardinia"]),
    ("Spain", &["ES", "ESP", "Canary Islands"]),
    ("Norway", &["NO", "NOR", "Svalbard"]),
    ("Denmark", &["DK", "DNK"]),
    ("Australia", &["AU", "AUS", "Tasmania"]),
    ("New Zealand", &["NZ", "NZL"]),
    ("South Africa", &["ZA", "ZAF"]),
    ("Egypt", &["EG", "EGY"]),
    ("Argentina", &["AR", "ARG"]),
    ("Thailand", &["TH", "THA"]),
    ("Philippines", &["PH", "PHL"]),
    ("Malaysia", &["MY", "MYS"]),
    ("Pakistan", &["PK", "PAK"]),
    ("Bangladesh", &["BD", "BGD"]),
    ("Ivory Coast", &["CI", "CIV", "Côte d'Ivoire", "Cote d'Ivoire"]),
    ("Democratic Republic of the Congo", &["CD", "COD", "Dem. Rep. Congo", "DR Congo", "Congo (Kinshasa)"]),
    ("Republic of the Congo", &["CG", "COG", "Congo", "Congo (Brazzaville)"]),
    ("United Arab Emirates", &["AE", "ARE", "UAE"]),
    ("Saudi Arabia", &["SA", "SAU"]),
    ("Bosnia and Herzegovina", &["BA", "BIH", "Bosnia and Herz."]),
    ("Dominican Republic", &["DO", "DOM", "Dominican Rep."]),
    ("Moldova", &["MD", "MDA", "Republic of Moldova"]),
    ("Laos", &["LA", "LAO", "Lao PDR", "Lao People's Democratic Republic"]),
    ("Syria", &["SY", "SYR", "Syrian Arab Republic"]),
    ("Tanzania", &["TZ", "TZA", "United Republic of Tanzania"]),
];

// ============================================================================
// Index
// ============================================================================

/// Every known spelling (lowercased) → regions it covers.
pub struct RegionIndex {
    by_name: HashMap<String, Vec<RegionId>>,
}

impl RegionIndex {
    pub fn build(asset: &MapAsset) -> Self {
        let mut direct: HashMap<String, BTreeSet<RegionId>> = HashMap::new();
        for region in asset.regions() {
            for label in &region.labels {
                direct.entry(label.clone()).or_default().insert(region.id);
            }
        }

        let mut by_name: HashMap<String, Vec<RegionId>> = direct
            .iter()
            .map(|(name, ids)| (name.clone(), ids.iter().copied().collect()))
            .collect();

        for (canonical, alternates) in SYNONYMS {
            let group: Vec<String> = std::iter::once(*canonical)
                .chain(alternates.iter().copied())
                .map(str::to_lowercase)
                .collect();
            let covered: BTreeSet<RegionId> = group
                .iter()
                .filter_map(|name| direct.get(name))
                .flatten()
                .copied()
                .collect();
            if covered.is_empty() {
                continue;
            }
            for name in group {
                let entry = by_name.entry(name).or_default();
                let merged: BTreeSet<RegionId> = entry.iter().copied().chain(covered.iter().copied()).collect();
                *entry = merged.into_iter().collect();
            }
        }

        Self { by_name }
    }

    /// All regions matching `name` or any of its synonyms. Empty on a miss.
    pub fn lookup(&self, name: &str) -> &[RegionId] {
        self.by_name
            .get(&name.trim().to_lowercase())
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }
}

// ============================================================================
// Highlighter
// ============================================================================

#[derive(Clone, Copy, Debug, PartialEq)]
struct Highlight {
    color: Color,
    until: Instant,
}

#[derive(Clone, Debug, Default)]
struct RegionState {
    attacked: bool,
    highlights: Vec<Highlight>,
}

/// How a region should be drawn right now.
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum RegionLook {
    Plain,
    /// Has been the source of a completed attack path.
    Attacked,
    /// Transiently highlighted; the newest live highlight's color.
    Highlighted(Color),
}

pub struct RegionHighlighter {
    index: RegionIndex,
    states: Vec<RegionState>,
    last_marked: Option<RegionId>,
}

impl RegionHighlighter {
    pub fn new(asset: &MapAsset) -> Self {
        Self {
            index: RegionIndex::build(asset),
            states: vec![RegionState::default(); asset.regions().len()],
            last_marked: None,
        }
    }

    /// Highlight every region matching `name` until `now + duration`.
    ///
    /// Repeated calls are independent: each schedules its own removal, and
    /// the region stays lit while any of them is live. Returns how many
    /// regions were marked; zero is a silent miss.
    pub fn highlight(&mut self, name: &str, color: Color, duration: Duration, now: Instant) -> usize {
        let ids = self.index.lookup(name);
        for id in ids {
            if let Some(state) = self.states.get_mut(id.0) {
                state.highlights.push(Highlight {
                    color,
                    until: now + duration,
                });
            }
        }
        if ids.is_empty() {
            tracing::debug!(region = name, "no map region for highlight");
        }
        ids.len()
    }

    /// Permanently mark every region matching `name` as attacked.
    pub fn mark_permanent(&mut self, name: &str) -> usize {
        let ids = self.index.lookup(name);
        for id in ids {
            if let Some(state) = self.states.get_mut(id.0) {
                state.attacked = true;
            }
        }
        if let Some(&first) = ids.first() {
            self.last_marked = Some(first);
        } else {
            tracing::debug!(region = name, "no map region to mark attacked");
        }
        ids.len()
    }

    /// Drop expired highlights. Called every frame.
    pub fn expire(&mut self, now: Instant) {
        for state in &mut self.states {
            state.highlights.retain(|h| h.until > now);
        }
    }

    pub fn look(&self, id: RegionId, now: Instant) -> RegionLook {
        let Some(state) = self.states.get(id.0) else {
            return RegionLook::Plain;
        };
        if let Some(h) = state.highlights.iter().rev().find(|h| h.until > now) {
            return RegionLook::Highlighted(h.color);
        }
        if state.attacked {
            RegionLook::Attacked
        } else {
            RegionLook::Plain
        }
    }

    /// Region most recently marked by an arrival.
    pub fn last_marked(&self) -> Option<RegionId> {
        self.last_marked
    }

    pub fn attacked_count(&self) -> usize {
        self.states.iter().filter(|s| s.attacked).count()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::map::tests::SAMPLE;
    use crate::palette::rgb;

    fn highlighter() -> RegionHighlighter {
        RegionHighlighter::new(&MapAsset::parse(SAMPLE).unwrap())
    }

    #[test]
    fn synonyms_cover_all_territories() {
        let asset = MapAsset::parse(SAMPLE).unwrap();
        let index = RegionIndex::build(&asset);
        let france = index.lookup("France");
        assert_eq!(france, &[RegionId(0), RegionId(1)]);
        assert_eq!(index.lookup("FR"), france);
        assert_eq!(index.lookup("french guiana"), france);
    }

    #[test]
    fn code_only_region_matches_by_long_name() {
        let asset = MapAsset::parse(SAMPLE).unwrap();
        let index = RegionIndex::build(&asset);
        assert_eq!(index.lookup("United States"), &[RegionId(3)]);
        assert_eq!(index.lookup("usa"), &[RegionId(3)]);
    }

    #[test]
    fn unknown_region_is_silent_noop() {
        let mut h = highlighter();
        let now = Instant::now();
        assert_eq!(h.highlight("Atlantis", rgb(255, 0, 0), Duration::from_secs(1), now), 0);
        assert_eq!(h.mark_permanent("Atlantis"), 0);
        assert_eq!(h.attacked_count(), 0);
        assert_eq!(h.last_marked(), None);
    }

    #[test]
    fn highlight_expires_and_permanent_mark_stays() {
        let mut h = highlighter();
        let now = Instant::now();
        let red = rgb(255, 0, 0);
        assert_eq!(h.highlight("Germany", red, Duration::from_millis(500), now), 1);
        assert_eq!(h.look(RegionId(2), now), RegionLook::Highlighted(red));

        h.mark_permanent("DE");
        assert_eq!(h.last_marked(), Some(RegionId(2)));
        let later = now + Duration::from_millis(600);
        h.expire(later);
        assert_eq!(h.look(RegionId(2), later), RegionLook::Attacked);
    }

    #[test]
    fn overlapping_highlights_are_independent() {
        let mut h = highlighter();
        let now = Instant::now();
        let red = rgb(255, 0, 0);
        let blue = rgb(0, 0, 255);
        h.highlight("Germany", red, Duration::from_millis(1000), now);
        h.highlight("Germany", blue, Duration::from_millis(300), now + Duration::from_millis(200));

        let t1 = now + Duration::from_millis(400);
        assert_eq!(h.look(RegionId(2), t1), RegionLook::Highlighted(blue));
        let t2 = now + Duration::from_millis(600);
        h.expire(t2);
        assert_eq!(h.look(RegionId(2), t2), RegionLook::Highlighted(red));
        let t3 = now + Duration::from_millis(1100);
        h.expire(t3);
        assert_eq!(h.look(RegionId(2), t3), RegionLook::Plain);
    }
}
