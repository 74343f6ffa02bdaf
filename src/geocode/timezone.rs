use anyhow::{anyhow, bail, Result};
use chrono::{DateTime, Utc};
use serde::Deserialize;
use std::sync::OnceLock;
use std::time::Duration;
use tzf_rs::DefaultFinder;

use super::LookupTimezone;
use crate::model::Coordinates;

static TZ_FINDER: OnceLock<DefaultFinder> = OnceLock::new();

fn get_finder() -> &'static DefaultFinder {
    TZ_FINDER.get_or_init(DefaultFinder::new)
}

/// Offline lookup against bundled timezone polygons.
pub struct TzfLookup;

/// Half a degree either way along each axis
const NUDGES: [(f64, f64); 4] = [(0.0, 0.5), (0.0, -0.5), (0.5, 0.0), (-0.5, 0.0)];

fn is_named_zone(name: &str) -> bool {
    !name.is_empty() && !name.starts_with("Etc/")
}

impl TzfLookup {
    /// Zone name at `coords`. Points that land in an `Etc/` ocean zone (a
    /// coastal photo, say) take the first named zone half a degree away.
    pub fn resolve(coords: Coordinates) -> String {
        let finder = get_finder();
        let zone_at = |lat: f64, lng: f64| finder.get_tz_name(lng, lat);

        let found = zone_at(coords.lat, coords.lng);
        if is_named_zone(found) {
            return found.to_string();
        }
        NUDGES
            .iter()
            .map(|(d_lat, d_lng)| zone_at(coords.lat + d_lat, coords.lng + d_lng))
            .find(|name| is_named_zone(name))
            .unwrap_or(found)
            .to_string()
    }
}

impl LookupTimezone for TzfLookup {
    fn lookup_timezone(&self, coords: Coordinates, _time: DateTime<Utc>) -> Result<String> {
        let name = Self::resolve(coords);
        if name.is_empty() {
            bail!("no timezone found for {},{}", coords.lat, coords.lng);
        }
        Ok(name)
    }
}

#[derive(Debug, Deserialize)]
struct Geo2TzResponse {
    tz: String,
}

/// Client for a geo2tz service: `GET {base}/tz/{lat}/{lng}` returns `{"tz": ...}`.
pub struct Geo2TzLookup {
    base_url: String,
    agent: ureq::Agent,
}

impl Geo2TzLookup {
    pub fn new(base_url: &str, timeout: Duration) -> Self {
        Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            agent: ureq::AgentBuilder::new().timeout(timeout).build(),
        }
    }

    fn url(&self, coords: Coordinates) -> String {
        format!("{}/tz/{}/{}", self.base_url, coords.lat, coords.lng)
    }
}

impl LookupTimezone for Geo2TzLookup {
    fn lookup_timezone(&self, coords: Coordinates, _time: DateTime<Utc>) -> Result<String> {
        let url = self.url(coords);
        let response: Geo2TzResponse = self
            .agent
            .get(&url)
            .call()
            .map_err(|e| anyhow!("Timezone request to {} failed: {}", url, e))?
            .into_json()
            .map_err(|e| anyhow!("Failed to parse timezone response: {}", e))?;

        if response.tz.is_empty() {
            bail!("timezone service returned no zone for {},{}", coords.lat, coords.lng);
        }
        Ok(response.tz)
    }
}
