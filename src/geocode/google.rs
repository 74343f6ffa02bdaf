//! Google Geocoding API reverse geocoder.

use anyhow::{anyhow, bail, Result};
use chrono::{DateTime, Utc};
use serde::Deserialize;
use std::time::Duration;

use super::ReverseGeocoder;
use crate::model::{Coordinates, Country, Location};

#[derive(Debug, Deserialize)]
struct GeocodeResponse {
    #[serde(default)]
    results: Vec<GeocodeResult>,
    #[serde(default)]
    status: String,
}

#[derive(Debug, Deserialize)]
struct GeocodeResult {
    #[serde(default)]
    types: Vec<String>,
    #[serde(default)]
    address_components: Vec<AddressComponent>,
}

#[derive(Debug, Deserialize)]
struct AddressComponent {
    long_name: String,
    short_name: String,
    #[serde(default)]
    types: Vec<String>,
}

impl GeocodeResult {
    fn component(&self, kind: &str) -> Option<&AddressComponent> {
        self.address_components
            .iter()
            .find(|c| c.types.iter().any(|t| t == kind))
    }

    /// Long name of the first component matching any of `kinds`, in order.
    fn pick(&self, kinds: &[&str]) -> String {
        kinds
            .iter()
            .filter_map(|kind| self.component(kind))
            .map(|c| c.long_name.clone())
            .find(|name| !name.is_empty())
            .unwrap_or_default()
    }
}

pub struct GoogleGeocoder {
    endpoint: String,
    api_key: String,
    agent: ureq::Agent,
}

impl GoogleGeocoder {
    pub fn new(endpoint: &str, api_key: &str, timeout: Duration) -> Self {
        let agent = ureq::AgentBuilder::new().timeout(timeout).build();
        Self {
            endpoint: endpoint.to_string(),
            api_key: api_key.to_string(),
            agent,
        }
    }
}

impl ReverseGeocoder for GoogleGeocoder {
    fn reverse_geocode(&self, coords: Coordinates, _time: DateTime<Utc>) -> Result<Location> {
        let response: GeocodeResponse = self
            .agent
            .get(&self.endpoint)
            .query("latlng", &format!("{},{}", coords.lat, coords.lng))
            .query("key", &self.api_key)
            .call()
            .map_err(|e| anyhow!("Geocode request failed: {}", e))?
            .into_json()
            .map_err(|e| anyhow!("Failed to parse geocode response: {}", e))?;

        location_from_response(response, coords)
    }
}

fn location_from_response(response: GeocodeResponse, coords: Coordinates) -> Result<Location> {
    let Some(first) = response.results.first() else {
        bail!("no geocode results found (status {:?})", response.status);
    };
    let address = response
        .results
        .iter()
        .find(|r| r.types.iter().any(|t| t == "street_address"))
        .unwrap_or(first);

    let country = address
        .component("country")
        .map(|c| Country {
            short: c.short_name.clone(),
            long: c.long_name.clone(),
        })
        .unwrap_or_default();

    Ok(Location {
        country,
        region: address.pick(&["administrative_area_level_2", "administrative_area_level_1"]),
        locality: address.pick(&[
            "sublocality",
            "locality",
            "postal_town",
            "administrative_area_level_2",
        ]),
        timezone: String::new(),
        coordinates: coords,
    })
}
