use super::types::{GeoBubble, GeoPoint};
use super::utils::{is_null_like, parse_float, value_as_text};
use crate::models::{ProfileDocument, SampleRow};

const DEFAULT_RADIUS: f64 = 10.0;
const DEFAULT_LABEL: &str = "Location";

/// Well-known places with fixed coordinates, keyed by normalized name.
const GAZETTEER: [(&str, GeoPoint); 15] = [
    ("new york", GeoPoint::new(40.71, -74.00)),
    ("london", GeoPoint::new(51.51, -0.12)),
    ("tokyo", GeoPoint::new(35.67, 139.65)),
    ("paris", GeoPoint::new(48.85, 2.35)),
    ("mumbai", GeoPoint::new(19.07, 72.87)),
    ("sydney", GeoPoint::new(-33.86, 151.20)),
    ("germany", GeoPoint::new(51.16, 10.45)),
    ("india", GeoPoint::new(20.59, 78.96)),
    ("china", GeoPoint::new(35.86, 104.19)),
    ("usa", GeoPoint::new(37.09, -95.71)),
    ("brazil", GeoPoint::new(-14.23, -51.92)),
    ("australia", GeoPoint::new(-25.27, 133.77)),
    ("canada", GeoPoint::new(56.13, -106.34)),
    ("uk", GeoPoint::new(55.37, -3.43)),
    ("russia", GeoPoint::new(61.52, 105.31)),
];

pub fn normalize_place(name: &str) -> String {
    name.trim().to_lowercase()
}

pub fn lookup_gazetteer(normalized: &str) -> Option<GeoPoint> {
    GAZETTEER
        .iter()
        .find(|(place, _)| *place == normalized)
        .map(|(_, point)| *point)
}

/// Polynomial fold `hash = unit + ((hash << 5) - hash)` over UTF-16 code
/// units. The shift wraps at 32 bits, the subtraction does not.
pub fn place_hash(normalized: &str) -> i64 {
    normalized.encode_utf16().fold(0_i64, |hash, unit| {
        let shifted = i64::from((hash as i32).wrapping_shl(5));
        i64::from(unit) + (shifted - hash)
    })
}

/// Synthetic, repeatable coordinate for a name the gazetteer lacks. This is a
/// plotting placeholder, not a real location.
pub fn synthetic_point(normalized: &str) -> GeoPoint {
    let hash = place_hash(normalized);
    GeoPoint {
        lat: ((hash % 140).abs() - 70) as f64,
        lng: (((hash * 2) % 360).abs() - 180) as f64,
    }
}

/// Maps a place name to a plottable point: gazetteer first, synthetic otherwise.
pub fn resolve(name: &str) -> GeoPoint {
    let normalized = normalize_place(name);
    lookup_gazetteer(&normalized).unwrap_or_else(|| synthetic_point(&normalized))
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GeoSource {
    /// Real lat/lng columns in the sample.
    SampleCoordinates,
    /// The provider's pre-aggregated `geographic` list.
    ProfileAggregates,
    /// City names in the sample, resolved one row at a time.
    CityNames,
}

pub const GEO_SOURCES: [GeoSource; 3] = [
    GeoSource::SampleCoordinates,
    GeoSource::ProfileAggregates,
    GeoSource::CityNames,
];

impl GeoSource {
    pub fn bubbles(&self, doc: &ProfileDocument) -> Vec<GeoBubble> {
        match self {
            GeoSource::SampleCoordinates => sample_coordinate_bubbles(doc),
            GeoSource::ProfileAggregates => aggregate_bubbles(doc),
            GeoSource::CityNames => city_name_bubbles(doc),
        }
    }
}

/// First non-empty source wins; no source at all yields an empty set.
pub fn resolve_bubbles(doc: &ProfileDocument) -> Vec<GeoBubble> {
    for source in GEO_SOURCES.iter() {
        let bubbles = source.bubbles(doc);
        if !bubbles.is_empty() {
            tracing::debug!("Resolved {} geo points from {:?}", bubbles.len(), source);
            return bubbles;
        }
    }
    Vec::new()
}

fn weight_column(doc: &ProfileDocument) -> Option<&str> {
    let numeric = &doc.metadata()?.numerical_cols;
    numeric.get(2).or_else(|| numeric.first()).map(String::as_str)
}

fn row_weight(row: &SampleRow, weight_col: Option<&str>) -> Option<f64> {
    weight_col
        .and_then(|w| row.get(w))
        .and_then(parse_float)
}

fn row_label(row: &SampleRow, city_col: Option<&str>) -> String {
    city_col
        .and_then(|c| row.get(c))
        .filter(|v| !v.is_null())
        .map(value_as_text)
        .unwrap_or_else(|| DEFAULT_LABEL.to_string())
}

fn sample_coordinate_bubbles(doc: &ProfileDocument) -> Vec<GeoBubble> {
    let Some(geo) = doc.geo_columns() else {
        return Vec::new();
    };
    let (Some(lat_col), Some(lng_col)) = (geo.lat.as_deref(), geo.lng.as_deref()) else {
        return Vec::new();
    };

    let weight_col = weight_column(doc);
    let weight_max = weight_col
        .and_then(|w| doc.column(w))
        .and_then(|c| c.stats.as_ref())
        .and_then(|s| s.max)
        .filter(|m| *m != 0.0)
        .unwrap_or(100.0);

    doc.sample
        .iter()
        .filter(|row| !is_null_like(row.get(lat_col)) && !is_null_like(row.get(lng_col)))
        .filter_map(|row| {
            let lat = row.get(lat_col).and_then(parse_float)?;
            let lng = row.get(lng_col).and_then(parse_float)?;
            let point = GeoPoint { lat, lng };
            if !point.is_valid() {
                return None;
            }
            let radius = if weight_col.is_some() {
                row_weight(row, weight_col)
                    .map(|w| w.abs() / weight_max * 20.0 + 5.0)
                    .unwrap_or(DEFAULT_RADIUS)
            } else {
                DEFAULT_RADIUS
            };
            Some(GeoBubble {
                label: row_label(row, geo.city.as_deref()),
                point,
                radius,
            })
        })
        .collect()
}

fn aggregate_bubbles(doc: &ProfileDocument) -> Vec<GeoBubble> {
    doc.geographic
        .iter()
        .flatten()
        .filter_map(|g| {
            let point = GeoPoint { lat: g.lat, lng: g.lng };
            point.is_valid().then(|| GeoBubble {
                label: g.city.clone().unwrap_or_else(|| DEFAULT_LABEL.to_string()),
                point,
                radius: g
                    .value
                    .map(|v| v.sqrt() / 5.0)
                    .filter(|r| r.is_finite() && *r > 0.0)
                    .unwrap_or(DEFAULT_RADIUS),
            })
        })
        .collect()
}

fn city_name_bubbles(doc: &ProfileDocument) -> Vec<GeoBubble> {
    let Some(city_col) = doc.geo_columns().and_then(|g| g.city.as_deref()) else {
        return Vec::new();
    };
    let weight_col = weight_column(doc);

    doc.sample
        .iter()
        .filter_map(|row| {
            let value = row.get(city_col);
            if is_null_like(value) {
                return None;
            }
            let label = value.map(value_as_text).unwrap_or_default();
            let radius = row_weight(row, weight_col)
                .map(|w| w.abs() % 20.0 + 5.0)
                .unwrap_or(DEFAULT_RADIUS);
            Some(GeoBubble {
                point: resolve(&label),
                label,
                radius,
            })
        })
        .collect()
}
