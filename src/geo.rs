//! Place resolution and map projection
//!
//! Resolves an attack's origin to a point in map space. Explicit coordinates
//! win; otherwise the city table, then the country's capital, then a
//! per-country reference point. Lookups are cached by `city|country`.

use crate::event::AttackEvent;
use std::collections::HashMap;
use std::sync::LazyLock;

// ============================================================================
// Map space
// ============================================================================

/// A point in map-projection space.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct GeoPoint {
    pub x: f64,
    pub y: f64,
}

impl GeoPoint {
    pub fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }

    pub fn lerp(&self, other: GeoPoint, t: f64) -> GeoPoint {
        GeoPoint::new(self.x + (other.x - self.x) * t, self.y + (other.y - self.y) * t)
    }
}

/// Logical size of the map asset's coordinate space.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct ViewBox {
    pub width: f64,
    pub height: f64,
}

impl Default for ViewBox {
    /// One unit per degree.
    fn default() -> Self {
        Self { width: 360.0, height: 180.0 }
    }
}

/// Equirectangular projection into a `W×H` view box. No distortion
/// correction; must match the projection the map asset was drawn with.
pub fn lat_lon_to_xy(lat: f64, lon: f64, view_box: ViewBox) -> GeoPoint {
    GeoPoint {
        x: (lon + 180.0) / 360.0 * view_box.width,
        y: (90.0 - lat) / 180.0 * view_box.height,
    }
}

// ============================================================================
// Resolver
// ============================================================================

/// Where a resolved point came from (reported by `threatmap locate`).
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Resolution {
    Explicit,
    City,
    Capital,
    Country,
}

pub struct GeoResolver {
    view_box: ViewBox,
    cache: HashMap<String, Option<GeoPoint>>,
}

impl GeoResolver {
    pub fn new(view_box: ViewBox) -> Self {
        Self {
            view_box,
            cache: HashMap::new(),
        }
    }

    pub fn view_box(&self) -> ViewBox {
        self.view_box
    }

    /// Project a raw coordinate pair with this resolver's view box.
    pub fn project(&self, lat: f64, lon: f64) -> GeoPoint {
        lat_lon_to_xy(lat, lon, self.view_box)
    }

    /// Resolve an event's origin, or `None` when it cannot be placed.
    pub fn resolve(&mut self, event: &AttackEvent) -> Option<GeoPoint> {
        if let Some((lat, lon)) = event.coordinates() {
            return Some(self.project(lat, lon));
        }

        let key = place_key(event.city.as_deref(), event.country.as_deref());
        if let Some(&cached) = self.cache.get(&key) {
            return cached;
        }

        let view_box = self.view_box;
        let result = lookup(event.city.as_deref(), event.country.as_deref())
            .map(|(lat, lon, _)| lat_lon_to_xy(lat, lon, view_box));
        self.cache.insert(key, result);
        result
    }

    #[cfg(test)]
    fn cached_places(&self) -> usize {
        self.cache.len()
    }
}

/// Uncached table lookup: city, then capital of the country, then country.
pub fn lookup(city: Option<&str>, country: Option<&str>) -> Option<(f64, f64, Resolution)> {
    if let Some(&(lat, lon)) = city.and_then(|c| CITIES.get(normalize(c).as_str())) {
        return Some((lat, lon, Resolution::City));
    }

    let country = canonical_country(country?);
    if let Some(&(lat, lon)) = CAPITALS
        .get(country.as_str())
        .and_then(|capital| CITIES.get(*capital))
    {
        return Some((lat, lon, Resolution::Capital));
    }

    COUNTRIES
        .get(country.as_str())
        .map(|&(lat, lon)| (lat, lon, Resolution::Country))
}

fn place_key(city: Option<&str>, country: Option<&str>) -> String {
    format!(
        "{}|{}",
        city.map(normalize).unwrap_or_default(),
        country.map(normalize).unwrap_or_default()
    )
}

fn normalize(name: &str) -> String {
    name.trim().to_lowercase()
}

/// Fold common codes and long forms onto the table's country names.
fn canonical_country(name: &str) -> String {
    let n = normalize(name);
    let canonical = match n.as_str() {
        "us" | "usa" | "united states of america" | "america" => "united states",
        "uk" | "gb" | "great britain" | "england" => "united kingdom",
        "ru" | "russian federation" => "russia",
        "cn" | "people's republic of china" => "china",
        "kr" | "korea" | "republic of korea" => "south korea",
        "kp" | "democratic people's republic of korea" => "north korea",
        "de" => "germany",
        "fr" => "france",
        "nl" | "the netherlands" | "holland" => "netherlands",
        "br" => "brazil",
        "in" => "india",
        "vn" | "viet nam" => "vietnam",
        "ir" | "islamic republic of iran" => "iran",
        "tw" => "taiwan",
        "hk" => "hong kong",
        "jp" => "japan",
        "ua" => "ukraine",
        "cz" | "czech republic" => "czechia",
        _ => return n,
    };
    canonical.to_string()
}

// ============================================================================
// Tables
// ============================================================================

static CITIES: LazyLock<HashMap<&'static str, (f64, f64)>> = LazyLock::new(|| {
    HashMap::from([
        // North America
        ("new york", (40.71, -74.01)),
        ("los angeles", (34.05, -118.24)),
        ("chicago", (41.88, -87.63)),
        ("houston", (29.76, -95.37)),
        ("dallas", (32.78, -96.80)),
        ("ashburn", (39.04, -77.49)),
        ("san francisco", (37.77, -122.42)),
        ("santa clara", (37.35, -121.96)),
        ("seattle", (47.61, -122.33)),
        ("washington", (38.91, -77.04)),
        ("toronto", (43.65, -79.38)),
        ("montreal", (45.50, -73.57)),
        ("ottawa", (45.42, -75.70)),
        ("mexico city", (19.43, -99.13)),
        // South America
        ("sao paulo", (-23.55, -46.63)),
        ("são paulo", (-23.55, -46.63)),
        ("rio de janeiro", (-22.91, -43.17)),
        ("brasilia", (-15.79, -47.88)),
        ("buenos aires", (-34.60, -58.38)),
        ("santiago", (-33.45, -70.67)),
        ("lima", (-12.05, -77.04)),
        ("bogota", (4.71, -74.07)),
        ("caracas", (10.48, -66.90)),
        // Europe
        ("london", (51.51, -0.13)),
        ("paris", (48.86, 2.35)),
        ("berlin", (52.52, 13.40)),
        ("frankfurt", (50.11, 8.68)),
        ("frankfurt am main", (50.11, 8.68)),
        ("amsterdam", (52.37, 4.90)),
        ("brussels", (50.85, 4.35)),
        ("madrid", (40.42, -3.70)),
        ("lisbon", (38.72, -9.14)),
        ("rome", (41.90, 12.50)),
        ("milan", (45.46, 9.19)),
        ("vienna", (48.21, 16.37)),
        ("prague", (50.08, 14.44)),
        ("warsaw", (52.23, 21.01)),
        ("stockholm", (59.33, 18.07)),
        ("oslo", (59.91, 10.75)),
        ("helsinki", (60.17, 24.94)),
        ("copenhagen", (55.68, 12.57)),
        ("dublin", (53.35, -6.26)),
        ("zurich", (47.38, 8.54)),
        ("bern", (46.95, 7.45)),
        ("athens", (37.98, 23.73)),
        ("bucharest", (44.43, 26.10)),
        ("sofia", (42.70, 23.32)),
        ("budapest", (47.50, 19.04)),
        ("kyiv", (50.45, 30.52)),
        ("kiev", (50.45, 30.52)),
        ("moscow", (55.76, 37.62)),
        ("saint petersburg", (59.93, 30.34)),
        ("istanbul", (41.01, 28.98)),
        ("ankara", (39.93, 32.86)),
        // Africa
        ("cairo", (30.04, 31.24)),
        ("lagos", (6.52, 3.38)),
        ("abuja", (9.08, 7.40)),
        ("nairobi", (-1.29, 36.82)),
        ("johannesburg", (-26.20, 28.05)),
        ("pretoria", (-25.75, 28.19)),
        ("cape town", (-33.92, 18.42)),
        ("casablanca", (33.57, -7.59)),
        ("rabat", (34.02, -6.84)),
        ("algiers", (36.75, 3.06)),
        ("tunis", (36.81, 10.18)),
        // Asia
        ("tokyo", (35.68, 139.69)),
        ("osaka", (34.69, 135.50)),
        ("seoul", (37.57, 126.98)),
        ("pyongyang", (39.04, 125.76)),
        ("beijing", (39.90, 116.41)),
        ("shanghai", (31.23, 121.47)),
        ("shenzhen", (22.54, 114.06)),
        ("guangzhou", (23.13, 113.26)),
        ("hangzhou", (30.27, 120.16)),
        ("hong kong", (22.32, 114.17)),
        ("taipei", (25.03, 121.57)),
        ("singapore", (1.35, 103.82)),
        ("bangkok", (13.76, 100.50)),
        ("hanoi", (21.03, 105.85)),
        ("ho chi minh city", (10.82, 106.63)),
        ("jakarta", (-6.21, 106.85)),
        ("manila", (14.60, 120.98)),
        ("kuala lumpur", (3.14, 101.69)),
        ("new delhi", (28.61, 77.21)),
        ("delhi", (28.70, 77.10)),
        ("mumbai", (19.08, 72.88)),
        ("bangalore", (12.97, 77.59)),
        ("karachi", (24.86, 67.01)),
        ("islamabad", (33.68, 73.05)),
        ("dhaka", (23.81, 90.41)),
        ("tehran", (35.69, 51.39)),
        ("dubai", (25.20, 55.27)),
        ("abu dhabi", (24.45, 54.38)),
        ("riyadh", (24.71, 46.68)),
        ("tel aviv", (32.09, 34.78)),
        ("jerusalem", (31.77, 35.21)),
        ("almaty", (43.24, 76.89)),
        ("astana", (51.17, 71.45)),
        // Oceania
        ("sydney", (-33.87, 151.21)),
        ("melbourne", (-37.81, 144.96)),
        ("canberra", (-35.28, 149.13)),
        ("auckland", (-36.85, 174.76)),
        ("wellington", (-41.29, 174.78)),
    ])
});

static CAPITALS: LazyLock<HashMap<&'static str, &'static str>> = LazyLock::new(|| {
    HashMap::from([
        ("united states", "washington"),
        ("canada", "ottawa"),
        ("mexico", "mexico city"),
        ("brazil", "brasilia"),
        ("argentina", "buenos aires"),
        ("chile", "santiago"),
        ("peru", "lima"),
        ("colombia", "bogota"),
        ("venezuela", "caracas"),
        ("united kingdom", "london"),
        ("france", "paris"),
        ("germany", "berlin"),
        ("netherlands", "amsterdam"),
        ("belgium", "brussels"),
        ("spain", "madrid"),
        ("portugal", "lisbon"),
        ("italy", "rome"),
        ("austria", "vienna"),
        ("czechia", "prague"),
        ("poland", "warsaw"),
        ("sweden", "stockholm"),
        ("norway", "oslo"),
        ("finland", "helsinki"),
        ("denmark", "copenhagen"),
        ("ireland", "dublin"),
        ("switzerland", "bern"),
        ("greece", "athens"),
        ("romania", "bucharest"),
        ("bulgaria", "sofia"),
        ("hungary", "budapest"),
        ("ukraine", "kyiv"),
        ("russia", "moscow"),
        ("turkey", "ankara"),
        ("egypt", "cairo"),
        ("nigeria", "abuja"),
        ("kenya", "nairobi"),
        ("south africa", "pretoria"),
        ("morocco", "rabat"),
        ("algeria", "algiers"),
        ("tunisia", "tunis"),
        ("japan", "tokyo"),
        ("south korea", "seoul"),
        ("north korea", "pyongyang"),
        ("china", "beijing"),
        ("hong kong", "hong kong"),
        ("taiwan", "taipei"),
        ("singapore", "singapore"),
        ("thailand", "bangkok"),
        ("vietnam", "hanoi"),
        ("indonesia", "jakarta"),
        ("philippines", "manila"),
        ("malaysia", "kuala lumpur"),
        ("india", "new delhi"),
        ("pakistan", "islamabad"),
        ("bangladesh", "dhaka"),
        ("iran", "tehran"),
        ("united arab emirates", "abu dhabi"),
        ("saudi arabia", "riyadh"),
        ("israel", "jerusalem"),
        ("kazakhstan", "astana"),
        ("australia", "canberra"),
        ("new zealand", "wellington"),
    ])
});

/// Reference points for countries whose capital is not in the city table.
static COUNTRIES: LazyLock<HashMap<&'static str, (f64, f64)>> = LazyLock::new(|| {
    HashMap::from([
        ("united states", (39.8, -98.6)),
        ("canada", (56.1, -106.3)),
        ("mexico", (23.6, -102.6)),
        ("brazil", (-14.2, -51.9)),
        ("argentina", (-38.4, -63.6)),
        ("bolivia", (-16.3, -63.6)),
        ("ecuador", (-1.8, -78.2)),
        ("uruguay", (-32.5, -55.8)),
        ("paraguay", (-23.4, -58.4)),
        ("panama", (8.5, -80.8)),
        ("cuba", (21.5, -77.8)),
        ("dominican republic", (18.7, -70.2)),
        ("united kingdom", (55.4, -3.4)),
        ("france", (46.2, 2.2)),
        ("germany", (51.2, 10.5)),
        ("spain", (40.5, -3.7)),
        ("italy", (41.9, 12.6)),
        ("serbia", (44.0, 21.0)),
        ("croatia", (45.1, 15.2)),
        ("slovakia", (48.7, 19.7)),
        ("slovenia", (46.2, 14.9)),
        ("lithuania", (55.2, 23.9)),
        ("latvia", (56.9, 24.6)),
        ("estonia", (58.6, 25.0)),
        ("belarus", (53.7, 28.0)),
        ("moldova", (47.4, 28.4)),
        ("luxembourg", (49.8, 6.1)),
        ("iceland", (65.0, -19.0)),
        ("russia", (61.5, 105.3)),
        ("china", (35.9, 104.2)),
        ("india", (20.6, 79.0)),
        ("iraq", (33.2, 43.7)),
        ("syria", (34.8, 39.0)),
        ("jordan", (30.6, 36.2)),
        ("lebanon", (33.9, 35.9)),
        ("qatar", (25.4, 51.2)),
        ("kuwait", (29.3, 47.5)),
        ("oman", (21.5, 55.9)),
        ("yemen", (15.6, 48.5)),
        ("afghanistan", (33.9, 67.7)),
        ("uzbekistan", (41.4, 64.6)),
        ("mongolia", (46.9, 103.8)),
        ("myanmar", (21.9, 95.9)),
        ("cambodia", (12.6, 105.0)),
        ("laos", (19.9, 102.5)),
        ("nepal", (28.4, 84.1)),
        ("sri lanka", (7.9, 80.8)),
        ("georgia", (42.3, 43.4)),
        ("armenia", (40.1, 45.0)),
        ("azerbaijan", (40.1, 47.6)),
        ("ethiopia", (9.1, 40.5)),
        ("ghana", (7.9, -1.0)),
        ("ivory coast", (7.5, -5.5)),
        ("senegal", (14.5, -14.5)),
        ("cameroon", (7.4, 12.4)),
        ("tanzania", (-6.4, 34.9)),
        ("uganda", (1.4, 32.3)),
        ("angola", (-11.2, 17.9)),
        ("zimbabwe", (-19.0, 29.2)),
        ("libya", (26.3, 17.2)),
        ("sudan", (12.9, 30.2)),
        ("australia", (-25.3, 133.8)),
        ("new zealand", (-40.9, 174.9)),
        ("seychelles", (-4.7, 55.5)),
    ])
});
