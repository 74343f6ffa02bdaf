//! Location resolution for imported media.
//!
//! Coordinates come from the file itself or, failing that, from the nearest
//! GPX track point in time. They are then reverse geocoded into a place and
//! paired with a timezone name.

pub mod google;
pub mod timezone;

use anyhow::Result;
use chrono::{DateTime, Utc};
use std::sync::Arc;

use crate::model::{Coordinates, Location};
use crate::track::NearestPointQuery;

pub use google::GoogleGeocoder;
pub use timezone::{Geo2TzLookup, TzfLookup};

/// Coordinates to place. The returned location's `timezone` is left empty.
pub trait ReverseGeocoder: Send + Sync {
    fn reverse_geocode(&self, coords: Coordinates, time: DateTime<Utc>) -> Result<Location>;
}

pub trait LookupTimezone: Send + Sync {
    fn lookup_timezone(&self, coords: Coordinates, time: DateTime<Utc>) -> Result<String>;
}

/// `Ok(None)` means no coordinates could be found, which is not an error.
pub trait Geocoder: Send + Sync {
    fn geocode(
        &self,
        coords: Option<Coordinates>,
        capture_time: DateTime<Utc>,
    ) -> Result<Option<Location>>;
}

/// Reverse geocoder used when no provider is configured: the location keeps
/// its coordinates and timezone but names no place.
pub struct CoordinatesOnly;

impl ReverseGeocoder for CoordinatesOnly {
    fn reverse_geocode(&self, coords: Coordinates, _time: DateTime<Utc>) -> Result<Location> {
        Ok(Location {
            coordinates: coords,
            ..Default::default()
        })
    }
}

pub struct MediaGeocoder {
    nearest: Arc<dyn NearestPointQuery>,
    reverse: Arc<dyn ReverseGeocoder>,
    timezone: Arc<dyn LookupTimezone>,
}

impl MediaGeocoder {
    pub fn new(
        nearest: Arc<dyn NearestPointQuery>,
        reverse: Arc<dyn ReverseGeocoder>,
        timezone: Arc<dyn LookupTimezone>,
    ) -> Self {
        Self {
            nearest,
            reverse,
            timezone,
        }
    }

    fn resolve_coordinates(
        &self,
        coords: Option<Coordinates>,
        capture_time: DateTime<Utc>,
    ) -> Result<Option<Coordinates>> {
        if let Some(c) = coords.filter(|c| !c.is_zero()) {
            return Ok(Some(c));
        }

        let inferred = self
            .nearest
            .nearest(capture_time)?
            .map(|p| p.coordinates)
            .filter(|c| !c.is_zero());
        if let Some(c) = inferred {
            tracing::debug!(lat = c.lat, lng = c.lng, time = %capture_time, "Inferred coordinates from track");
        }
        Ok(inferred)
    }
}

impl Geocoder for MediaGeocoder {
    fn geocode(
        &self,
        coords: Option<Coordinates>,
        capture_time: DateTime<Utc>,
    ) -> Result<Option<Location>> {
        let Some(coords) = self.resolve_coordinates(coords, capture_time)? else {
            return Ok(None);
        };

        let mut location = self.reverse.reverse_geocode(coords, capture_time)?;
        location.coordinates = coords;
        location.timezone = self.timezone.lookup_timezone(coords, capture_time)?;
        Ok(Some(location))
    }
}
