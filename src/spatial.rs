use crate::photo::PhotoRecord;
use serde::{Deserialize, Serialize};

/// Axis-aligned rectangular bound in decimal degrees. Containment is closed
/// on all four edges.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BoundingBox {
    pub min_latitude: f64,
    pub max_latitude: f64,
    pub min_longitude: f64,
    pub max_longitude: f64,
}

impl BoundingBox {
    pub fn contains(&self, latitude: f64, longitude: f64) -> bool {
        self.min_latitude <= latitude
            && latitude <= self.max_latitude
            && self.min_longitude <= longitude
            && longitude <= self.max_longitude
    }
}

/// One-pass linear filter over the in-memory collection; collections are
/// assumed to fit comfortably in memory, so no spatial index is kept.
pub fn photos_within<'a>(photos: &'a [PhotoRecord], bounds: &BoundingBox) -> Vec<&'a PhotoRecord> {
    photos
        .iter()
        .filter(|p| bounds.contains(p.latitude, p.longitude))
        .collect()
}
