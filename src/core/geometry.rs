//! Region of interest polygons and their projection into pixel space

use crate::types::{BoundingBox, GeoTransform, SarError, SarResult};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Closed polygon ring in geographic (lon, lat) coordinates
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct RegionOfInterest {
    ring: Vec<(f64, f64)>,
}

impl RegionOfInterest {
    /// Build a region from a ring; the ring must be closed and have at least three distinct vertices
    pub fn new(ring: Vec<(f64, f64)>) -> SarResult<Self> {
        if ring.len() < 4 {
            return Err(SarError::Geometry(format!(
                "Polygon ring needs at least 4 points, got {}",
                ring.len()
            )));
        }
        if ring.first() != ring.last() {
            return Err(SarError::Geometry("Polygon ring is not closed".to_string()));
        }
        if ring.iter().any(|(x, y)| !x.is_finite() || !y.is_finite()) {
            return Err(SarError::Geometry("Polygon has non-finite coordinates".to_string()));
        }
        Ok(Self { ring })
    }

    /// Axis-aligned rectangle
    pub fn from_bounds(min_lon: f64, min_lat: f64, max_lon: f64, max_lat: f64) -> SarResult<Self> {
        Self::new(vec![
            (min_lon, min_lat),
            (min_lon, max_lat),
            (max_lon, max_lat),
            (max_lon, min_lat),
            (min_lon, min_lat),
        ])
    }

    /// Parse WKT `POLYGON((lon lat, ...))`; only the exterior ring is accepted
    pub fn from_wkt(wkt: &str) -> SarResult<Self> {
        let trimmed = wkt.trim();
        let upper = trimmed.to_uppercase();
        let body = upper
            .strip_prefix("POLYGON")
            .ok_or_else(|| SarError::Geometry(format!("Expected a WKT POLYGON, got '{}'", wkt)))?
            .trim();
        let inner = body
            .strip_prefix("((")
            .and_then(|s| s.strip_suffix("))"))
            .ok_or_else(|| SarError::Geometry(format!("Malformed polygon rings in '{}'", wkt)))?;
        if inner.contains('(') || inner.contains(')') {
            return Err(SarError::Geometry("Polygons with interior rings are not supported".to_string()));
        }

        let mut ring = Vec::new();
        for vertex in inner.split(',') {
            let coords: Vec<&str> = vertex.split_whitespace().collect();
            if coords.len() != 2 {
                return Err(SarError::Geometry(format!("Invalid polygon vertex '{}'", vertex.trim())));
            }
            let parse = |s: &str| {
                s.parse::<f64>()
                    .map_err(|_| SarError::Geometry(format!("Invalid coordinate '{}'", s)))
            };
            ring.push((parse(coords[0])?, parse(coords[1])?));
        }
        Self::new(ring)
    }

    pub fn ring(&self) -> &[(f64, f64)] {
        &self.ring
    }

    pub fn bounding_box(&self) -> BoundingBox {
        // Construction guarantees a non-empty ring
        BoundingBox::from_points(self.ring.iter().copied()).unwrap_or(BoundingBox {
            min_lon: 0.0,
            max_lon: 0.0,
            min_lat: 0.0,
            max_lat: 0.0,
        })
    }

    /// True when (lon, lat) lies inside the ring (even-odd rule)
    pub fn contains_point(&self, lon: f64, lat: f64) -> bool {
        point_in_ring((lon, lat), &self.ring)
    }

    /// True when the polygon shares any point with the quadrilateral `quad`
    pub fn intersects_quad(&self, quad: &[(f64, f64); 4]) -> bool {
        let quad_ring = [quad[0], quad[1], quad[2], quad[3], quad[0]];
        if quad.iter().any(|&corner| point_in_ring(corner, &self.ring)) {
            return true;
        }
        if self.ring.iter().any(|&vertex| point_in_ring(vertex, &quad_ring)) {
            return true;
        }
        self.ring.windows(2).any(|edge| {
            quad_ring
                .windows(2)
                .any(|side| segments_intersect(edge[0], edge[1], side[0], side[1]))
        })
    }

    pub fn to_wkt(&self) -> String {
        let vertices: Vec<String> = self.ring.iter().map(|(x, y)| format!("{} {}", x, y)).collect();
        format!("POLYGON(({}))", vertices.join(", "))
    }
}

impl fmt::Display for RegionOfInterest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_wkt())
    }
}

impl FromStr for RegionOfInterest {
    type Err = SarError;

    fn from_str(s: &str) -> SarResult<Self> {
        Self::from_wkt(s)
    }
}

impl TryFrom<String> for RegionOfInterest {
    type Error = SarError;

    fn try_from(value: String) -> SarResult<Self> {
        Self::from_wkt(&value)
    }
}

impl From<RegionOfInterest> for String {
    fn from(roi: RegionOfInterest) -> Self {
        roi.to_wkt()
    }
}

fn point_in_ring(point: (f64, f64), ring: &[(f64, f64)]) -> bool {
    let (x, y) = point;
    let mut inside = false;
    for edge in ring.windows(2) {
        let ((x1, y1), (x2, y2)) = (edge[0], edge[1]);
        if (y1 > y) != (y2 > y) && x < x1 + (y - y1) * (x2 - x1) / (y2 - y1) {
            inside = !inside;
        }
    }
    inside
}

fn orientation(a: (f64, f64), b: (f64, f64), c: (f64, f64)) -> f64 {
    (b.0 - a.0) * (c.1 - a.1) - (b.1 - a.1) * (c.0 - a.0)
}

fn on_segment(a: (f64, f64), b: (f64, f64), p: (f64, f64)) -> bool {
    p.0 >= a.0.min(b.0) && p.0 <= a.0.max(b.0) && p.1 >= a.1.min(b.1) && p.1 <= a.1.max(b.1)
}

fn segments_intersect(p1: (f64, f64), p2: (f64, f64), q1: (f64, f64), q2: (f64, f64)) -> bool {
    let d1 = orientation(q1, q2, p1);
    let d2 = orientation(q1, q2, p2);
    let d3 = orientation(p1, p2, q1);
    let d4 = orientation(p1, p2, q2);
    if ((d1 > 0.0 && d2 < 0.0) || (d1 < 0.0 && d2 > 0.0)) && ((d3 > 0.0 && d4 < 0.0) || (d3 < 0.0 && d4 > 0.0)) {
        return true;
    }
    (d1 == 0.0 && on_segment(q1, q2, p1))
        || (d2 == 0.0 && on_segment(q1, q2, p2))
        || (d3 == 0.0 && on_segment(p1, p2, q1))
        || (d4 == 0.0 && on_segment(p1, p2, q2))
}

/// Inclusive-exclusive pixel rectangle
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PixelWindow {
    pub col: usize,
    pub row: usize,
    pub width: usize,
    pub height: usize,
}

impl PixelWindow {
    /// Pixel rectangle enclosing the region's vertices, clamped to a `width` x `height` raster
    ///
    /// `None` when the polygon itself does not touch the raster, even if its
    /// bounding box does.
    pub fn covering(
        transform: &GeoTransform,
        roi: &RegionOfInterest,
        width: usize,
        height: usize,
    ) -> SarResult<Option<Self>> {
        if width == 0 || height == 0 {
            return Ok(None);
        }
        if !roi.intersects_quad(&transform.corners(width, height)) {
            return Ok(None);
        }

        let mut min_col = f64::INFINITY;
        let mut max_col = f64::NEG_INFINITY;
        let mut min_row = f64::INFINITY;
        let mut max_row = f64::NEG_INFINITY;
        for &(lon, lat) in roi.ring() {
            let (col, row) = transform.geo_to_pixel(lon, lat)?;
            min_col = min_col.min(col);
            max_col = max_col.max(col);
            min_row = min_row.min(row);
            max_row = max_row.max(row);
        }

        let last_col = (width - 1) as f64;
        let last_row = (height - 1) as f64;
        if max_col < 0.0 || max_row < 0.0 || min_col > last_col || min_row > last_row {
            return Ok(None);
        }

        let col0 = snap(min_col).floor().max(0.0) as usize;
        let col1 = snap(max_col).ceil().min(last_col) as usize;
        let row0 = snap(min_row).floor().max(0.0) as usize;
        let row1 = snap(max_row).ceil().min(last_row) as usize;
        Ok(Some(PixelWindow {
            col: col0,
            row: row0,
            width: col1 - col0 + 1,
            height: row1 - row0 + 1,
        }))
    }

    pub fn covers_whole(&self, width: usize, height: usize) -> bool {
        self.col == 0 && self.row == 0 && self.width == width && self.height == height
    }
}

// Pixel coordinates computed from exact tie points carry rounding noise
fn snap(value: f64) -> f64 {
    let rounded = value.round();
    if (value - rounded).abs() < 1e-6 {
        rounded
    } else {
        value
    }
}
