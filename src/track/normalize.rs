//! Rewrites GPX timestamps to local wall-clock time.
//!
//! A normalized point's timestamp carries the local clock reading at the
//! point's position, tagged as UTC. Photo capture times are stored the same
//! way, so nearest-point queries compare plain instants.

use anyhow::{Context, Result};
use chrono::{DateTime, Duration, Timelike, Utc};
use std::collections::HashMap;
use std::sync::Arc;

use crate::geocode::LookupTimezone;
use crate::model::{Coordinates, GpxPoint};

pub struct TrackNormalizer {
    timezone: Arc<dyn LookupTimezone>,
}

/// Hour of day of `t`, so a track never needs more than 24 bucket lookups
fn hour_bucket(t: &DateTime<Utc>) -> u32 {
    t.hour()
}

/// `t` re-expressed as the wall-clock time in `tz_name`, still tagged UTC.
pub fn to_local(t: DateTime<Utc>, tz_name: &str) -> Result<DateTime<Utc>> {
    let tz = jiff::tz::TimeZone::get(tz_name)
        .with_context(|| format!("unknown timezone {}", tz_name))?;
    let instant = jiff::Timestamp::from_second(t.timestamp())?;
    let offset = instant.to_zoned(tz).offset().seconds();
    Ok(t + Duration::seconds(i64::from(offset)))
}

impl TrackNormalizer {
    pub fn new(timezone: Arc<dyn LookupTimezone>) -> Self {
        Self { timezone }
    }

    fn lookup(&self, coords: Coordinates, t: DateTime<Utc>) -> Result<String> {
        let tz = self.timezone.lookup_timezone(coords, t)?;
        tracing::debug!(lat = coords.lat, lng = coords.lng, time = %t, timezone = %tz, "Looked up track timezone");
        Ok(tz)
    }

    /// Normalize a track's points. `points` must be in timestamp order.
    pub fn normalize(&self, points: Vec<GpxPoint>) -> Result<Vec<GpxPoint>> {
        let (Some(first), Some(last)) = (points.first(), points.last()) else {
            return Ok(points);
        };

        let first_tz = self.lookup(first.coordinates, first.timestamp)?;
        // A track that ends where it started needs no second lookup
        let last_tz = if last.coordinates == first.coordinates {
            first_tz.clone()
        } else {
            self.lookup(last.coordinates, last.timestamp)?
        };

        if first_tz == last_tz {
            return points
                .into_iter()
                .map(|p| apply(p, &first_tz))
                .collect();
        }

        tracing::info!(from = %first_tz, to = %last_tz, "Track crosses timezones");

        let mut buckets: HashMap<u32, String> = HashMap::new();
        buckets.insert(hour_bucket(&first.timestamp), first_tz);
        buckets
            .entry(hour_bucket(&last.timestamp))
            .or_insert(last_tz);

        let mut normalized = Vec::with_capacity(points.len());
        for point in points {
            let bucket = hour_bucket(&point.timestamp);
            let tz = match buckets.get(&bucket) {
                Some(tz) => tz.clone(),
                None => {
                    let tz = self.lookup(point.coordinates, point.timestamp)?;
                    buckets.insert(bucket, tz.clone());
                    tz
                }
            };
            normalized.push(apply(point, &tz)?);
        }
        Ok(normalized)
    }
}

fn apply(mut point: GpxPoint, tz: &str) -> Result<GpxPoint> {
    point.timestamp = to_local(point.timestamp, tz)?;
    point.timezone = Some(tz.to_string());
    Ok(point)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use std::sync::atomic::{AtomicUsize, Ordering};

    const SPAIN: (f64, f64) = (11.2222222222, -1.2222222222);
    const LUSAKA: (f64, f64) = (22.2222222222, -3.2222222222);
    const UK: (f64, f64) = (53.8700189722222, -1.561703);

    /// Answers by fixed test coordinates and counts calls.
    #[derive(Default)]
    struct FixedZones {
        calls: AtomicUsize,
    }

    impl LookupTimezone for FixedZones {
        fn lookup_timezone(&self, coords: Coordinates, _t: DateTime<Utc>) -> Result<String> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            let zone = if (coords.lat, coords.lng) == SPAIN {
                "Europe/Madrid"
            } else if (coords.lat, coords.lng) == LUSAKA {
                "Africa/Lusaka"
            } else {
                "Europe/London"
            };
            Ok(zone.to_string())
        }
    }

    fn point(t: DateTime<Utc>, at: (f64, f64)) -> GpxPoint {
        GpxPoint::new(t, at.0, at.1)
    }

    fn jan(hour: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2022, 1, 28, hour, 0, 0).unwrap()
    }

    #[test]
    fn test_single_timezone_track() {
        let normalizer = TrackNormalizer::new(Arc::new(FixedZones::default()));
        let out = normalizer
            .normalize(vec![point(jan(12), SPAIN), point(jan(19), SPAIN)])
            .unwrap();

        assert_eq!(out[0].timestamp, jan(13));
        assert_eq!(out[1].timestamp, jan(20));
        assert!(out.iter().all(|p| p.timezone.as_deref() == Some("Europe/Madrid")));
    }

    #[test]
    fn test_track_crossing_timezones() {
        let normalizer = TrackNormalizer::new(Arc::new(FixedZones::default()));
        let out = normalizer
            .normalize(vec![point(jan(12), LUSAKA), point(jan(19), SPAIN)])
            .unwrap();

        assert_eq!(out[0].timestamp, jan(14));
        assert_eq!(out[0].timezone.as_deref(), Some("Africa/Lusaka"));
        assert_eq!(out[1].timestamp, jan(20));
        assert_eq!(out[1].timezone.as_deref(), Some("Europe/Madrid"));
    }

    #[test]
    fn test_daylight_saving_applies() {
        let normalizer = TrackNormalizer::new(Arc::new(FixedZones::default()));
        let t = Utc.with_ymd_and_hms(2022, 6, 10, 14, 0, 0).unwrap();
        let out = normalizer.normalize(vec![point(t, UK)]).unwrap();

        assert_eq!(out[0].timestamp, Utc.with_ymd_and_hms(2022, 6, 10, 15, 0, 0).unwrap());
        assert_eq!(out[0].timezone.as_deref(), Some("Europe/London"));
    }

    #[test]
    fn test_loop_track_does_one_lookup() {
        let zones = Arc::new(FixedZones::default());
        let normalizer = TrackNormalizer::new(zones.clone());
        let points: Vec<_> = (0..500)
            .map(|i| point(jan(8) + Duration::seconds(i * 30), if i % 2 == 0 { SPAIN } else { (11.3, -1.3) }))
            .chain(std::iter::once(point(jan(18), SPAIN)))
            .collect();

        normalizer.normalize(points).unwrap();
        assert_eq!(zones.calls.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_same_zone_endpoints_skip_per_point_lookups() {
        let zones = Arc::new(FixedZones::default());
        let normalizer = TrackNormalizer::new(zones.clone());
        let points: Vec<_> = (0..1000)
            .map(|i| point(jan(0) + Duration::minutes(i), UK))
            .chain(std::iter::once(point(jan(23), (53.9, -1.6))))
            .collect();

        normalizer.normalize(points).unwrap();
        assert_eq!(zones.calls.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn test_crossing_track_looks_up_once_per_hour_bucket() {
        let zones = Arc::new(FixedZones::default());
        let normalizer = TrackNormalizer::new(zones.clone());
        // 10:00 to 15:59, one point a minute: six hour buckets
        let points: Vec<_> = (0..360)
            .map(|i| {
                let at = if i < 180 { LUSAKA } else { SPAIN };
                point(jan(10) + Duration::minutes(i), at)
            })
            .collect();

        let out = normalizer.normalize(points).unwrap();
        assert_eq!(out.len(), 360);
        // First and last seed their buckets; four more hours need a lookup each
        assert_eq!(zones.calls.load(Ordering::SeqCst), 6);
    }

    #[test]
    fn test_multi_day_crossing_track_is_bounded_by_hours_of_day() {
        let zones = Arc::new(FixedZones::default());
        let normalizer = TrackNormalizer::new(zones.clone());
        // Three days, one point every 30 minutes
        let n = 3 * 48;
        let points: Vec<_> = (0..n)
            .map(|i| {
                let at = if i < n / 2 { LUSAKA } else { SPAIN };
                point(jan(0) + Duration::minutes(30 * i), at)
            })
            .collect();

        let out = normalizer.normalize(points).unwrap();
        assert_eq!(out.len(), n as usize);
        assert_eq!(zones.calls.load(Ordering::SeqCst), 24);
        // 10:00 on day three reuses the bucket looked up on day one
        assert_eq!(out[2 * 48 + 20].timezone.as_deref(), Some("Africa/Lusaka"));
    }
}
