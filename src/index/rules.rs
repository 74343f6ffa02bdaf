//! Membership rules and collection naming.

use crate::model::{CollectionKind, CollectionRef, MediaRecord};

/// Lowercase ASCII alphanumerics; every other run of characters becomes one `-`.
pub fn slugify(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    let mut pending_dash = false;
    for c in s.chars() {
        if c.is_ascii_alphanumeric() {
            if pending_dash && !out.is_empty() {
                out.push('-');
            }
            pending_dash = false;
            out.push(c.to_ascii_lowercase());
        } else {
            pending_dash = true;
        }
    }
    out
}

/// `slug(type)__slug(natural_key)`
pub fn collection_id(kind: CollectionKind, natural_key: &str) -> String {
    format!("{}__{}", slugify(kind.as_str()), slugify(natural_key))
}

pub fn collection_ref(kind: CollectionKind, natural_key: &str, title: &str) -> CollectionRef {
    CollectionRef {
        id: collection_id(kind, natural_key),
        kind,
        title: title.to_string(),
    }
}

/// Collections a record belongs to, in application order.
pub fn memberships(record: &MediaRecord) -> Vec<CollectionRef> {
    let t = record.capture_time();
    let month = t.format("%Y-%m").to_string();
    let mut refs = Vec::with_capacity(6);

    refs.push(collection_ref(
        CollectionKind::Inbox,
        &month,
        &t.format("inbox %b %Y").to_string(),
    ));

    let meta = &record.metadata;
    let camera = format!(
        "{} {}",
        meta.camera_make.as_deref().unwrap_or("").trim(),
        meta.camera_model.as_deref().unwrap_or("").trim()
    );
    let camera = camera.trim();
    if !camera.is_empty() {
        refs.push(collection_ref(CollectionKind::Camera, camera, camera));
    }

    refs.push(collection_ref(
        CollectionKind::TimelineMonth,
        &month,
        &t.format("%Y %B").to_string(),
    ));

    refs.push(collection_ref(
        CollectionKind::TimelineDay,
        &t.format("%Y-%m-%d").to_string(),
        &t.format("%a, %d %b %Y").to_string(),
    ));

    if let Some(location) = &record.location {
        let country = location.country.long.trim();
        if !country.is_empty() {
            refs.push(collection_ref(CollectionKind::PlacesCountry, country, country));

            let region = location.region.trim();
            if !region.is_empty() {
                let place = format!("{}, {}", region, country);
                refs.push(collection_ref(CollectionKind::PlacesRegion, &place, &place));
            }
        }
    }

    refs
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{Country, Location, MediaMetadata};
    use chrono::{TimeZone, Utc};

    fn record() -> MediaRecord {
        let t = Utc.with_ymd_and_hms(2014, 3, 21, 8, 1, 18).unwrap();
        MediaRecord::new("caf73e9785fa54300a051df95cfa2db9", MediaMetadata::new(t, "jpg"))
    }

    #[test]
    fn test_slugify() {
        assert_eq!(slugify("tEst tag 1"), "test-tag-1");
        assert_eq!(slugify("tesTtag*2"), "testtag-2");
        assert_eq!(slugify("  Canon  EOS 5D  "), "canon-eos-5d");
        assert_eq!(slugify("***"), "");
        assert_eq!(collection_id(CollectionKind::TimelineMonth, "2022-01"), "timeline-month__2022-01");
    }

    #[test]
    fn test_fan_out_without_camera_or_location() {
        let refs = memberships(&record());
        let ids: Vec<_> = refs.iter().map(|r| r.id.as_str()).collect();
        assert_eq!(
            ids,
            vec!["inbox__2014-03", "timeline-month__2014-03", "timeline-day__2014-03-21"]
        );
        assert_eq!(refs[0].title, "inbox Mar 2014");
        assert_eq!(refs[1].title, "2014 March");
        assert_eq!(refs[2].title, "Fri, 21 Mar 2014");
    }

    #[test]
    fn test_camera_and_places() {
        let mut record = record();
        record.metadata.camera_make = Some("Apple".to_string());
        record.metadata.camera_model = Some("iPhone 12".to_string());
        record.location = Some(Location {
            country: Country {
                short: "GB".to_string(),
                long: "United Kingdom".to_string(),
            },
            region: "West Yorkshire".to_string(),
            ..Default::default()
        });

        let refs = memberships(&record);
        let kinds: Vec<_> = refs.iter().map(|r| r.kind).collect();
        assert_eq!(
            kinds,
            vec![
                CollectionKind::Inbox,
                CollectionKind::Camera,
                CollectionKind::TimelineMonth,
                CollectionKind::TimelineDay,
                CollectionKind::PlacesCountry,
                CollectionKind::PlacesRegion,
            ]
        );
        assert_eq!(refs[1].id, "camera__apple-iphone-12");
        assert_eq!(refs[1].title, "Apple iPhone 12");
        assert_eq!(refs[5].title, "West Yorkshire, United Kingdom");
    }

    #[test]
    fn test_region_needs_country() {
        let mut record = record();
        record.location = Some(Location {
            region: "Nowhere".to_string(),
            ..Default::default()
        });
        assert_eq!(memberships(&record).len(), 3);
    }
}
