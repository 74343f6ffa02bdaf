use anyhow::Result;
use chrono::{DateTime, Duration, Utc};
use std::sync::Arc;

use crate::db::ArchiveStore;
use crate::model::GpxPoint;

pub trait NearestPointQuery: Send + Sync {
    /// Closest stored track point within the boundary, if any.
    fn nearest(&self, t: DateTime<Utc>) -> Result<Option<GpxPoint>>;
}

pub struct NearestPointResolver {
    db: Arc<dyn ArchiveStore>,
    boundary: Duration,
}

impl NearestPointResolver {
    pub fn new(db: Arc<dyn ArchiveStore>, hours_boundary: i64) -> Self {
        Self {
            db,
            boundary: Duration::hours(hours_boundary),
        }
    }
}

impl NearestPointQuery for NearestPointResolver {
    fn nearest(&self, t: DateTime<Utc>) -> Result<Option<GpxPoint>> {
        let future = self.db.first_gpx_point_between(t, t + self.boundary)?;
        let past = self.db.last_gpx_point_between(t - self.boundary, t)?;

        // Equal distances go to the future point
        Ok(match (future, past) {
            (Some(f), Some(p)) => {
                if f.timestamp - t <= t - p.timestamp {
                    Some(f)
                } else {
                    Some(p)
                }
            }
            (future, past) => future.or(past),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::Database;
    use chrono::TimeZone;

    fn t() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2022, 1, 28, 12, 0, 0).unwrap()
    }

    fn resolver(offsets_hours: &[i64], boundary: i64) -> NearestPointResolver {
        let db = Arc::new(Database::in_memory());
        let points: Vec<_> = offsets_hours
            .iter()
            .map(|h| GpxPoint::new(t() + Duration::hours(*h), *h as f64, 1.0))
            .collect();
        db.insert_gpx_points(&points).unwrap();
        NearestPointResolver::new(db, boundary)
    }

    #[test]
    fn test_closer_future_point_wins() {
        let found = resolver(&[-2, 1], 5).nearest(t()).unwrap().unwrap();
        assert_eq!(found.timestamp, t() + Duration::hours(1));
    }

    #[test]
    fn test_closer_past_point_wins() {
        let found = resolver(&[-1, 3], 5).nearest(t()).unwrap().unwrap();
        assert_eq!(found.timestamp, t() - Duration::hours(1));
    }

    #[test]
    fn test_past_only() {
        let found = resolver(&[-2], 2).nearest(t()).unwrap().unwrap();
        assert_eq!(found.timestamp, t() - Duration::hours(2));
    }

    #[test]
    fn test_nothing_within_boundary() {
        assert!(resolver(&[3], 2).nearest(t()).unwrap().is_none());
    }

    #[test]
    fn test_exact_tie_goes_to_future() {
        let found = resolver(&[-2, 2], 5).nearest(t()).unwrap().unwrap();
        assert_eq!(found.timestamp, t() + Duration::hours(2));
    }
}
