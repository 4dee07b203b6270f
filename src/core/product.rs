//! In-memory product handles and their abstracted metadata

use crate::core::geometry::{PixelWindow, RegionOfInterest};
use crate::types::{
    AcquisitionMode, BoundingBox, GeoTransform, GeocodingState, Polarization, SarError, SarResult,
    Subswath,
};
use chrono::{DateTime, Utc};
use ndarray::Array2;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::PathBuf;

pub const UNIT_REAL: &str = "real";
pub const UNIT_IMAGINARY: &str = "imaginary";
pub const UNIT_COHERENCE: &str = "coherence";
pub const UNIT_AMPLITUDE: &str = "amplitude";

/// One raster band of a product
#[derive(Debug, Clone, PartialEq)]
pub struct Band {
    pub name: String,
    pub unit: String,
    pub data: Array2<f32>,
}

impl Band {
    pub fn new(name: impl Into<String>, unit: impl Into<String>, data: Array2<f32>) -> Self {
        Self { name: name.into(), unit: unit.into(), data }
    }

    pub fn height(&self) -> usize {
        self.data.nrows()
    }

    pub fn width(&self) -> usize {
        self.data.ncols()
    }

    /// Parsed SNAP-style band name
    pub fn band_name(&self) -> Option<BandName> {
        BandName::parse(&self.name)
    }
}

/// Role of a band inside a co-registered stack
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StackRole {
    Primary { date: String },
    Secondary { ordinal: usize, date: String },
}

/// Structured view of SNAP band names
///
/// `i_IW2_VV`, `q_IW2_VV_mst_03Jan2020`, `i_IW2_VV_slv1_15Jan2020`,
/// `coh_IW2_VV_03Jan2020_15Jan2020`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BandName {
    pub prefix: String,
    pub subswath: Subswath,
    pub polarization: Polarization,
    pub role: Option<StackRole>,
}

impl BandName {
    pub fn parse(name: &str) -> Option<Self> {
        let tokens: Vec<&str> = name.split('_').collect();
        if tokens.len() < 3 {
            return None;
        }
        let subswath = tokens[1].parse().ok()?;
        let polarization = tokens[2].parse().ok()?;
        let role = match tokens.get(3) {
            Some(&"mst") => Some(StackRole::Primary { date: tokens.get(4)?.to_string() }),
            Some(tag) if tag.starts_with("slv") => Some(StackRole::Secondary {
                ordinal: tag[3..].parse().ok()?,
                date: tokens.get(4)?.to_string(),
            }),
            _ => None,
        };
        Some(BandName { prefix: tokens[0].to_string(), subswath, polarization, role })
    }

    pub fn format(prefix: &str, subswath: Subswath, pol: Polarization) -> String {
        format!("{}_{}_{}", prefix, subswath, pol)
    }
}

/// SNAP-style date tag used in stack band names (e.g. `03Jan2020`)
pub fn date_tag(time: &DateTime<Utc>) -> String {
    time.format("%d%b%Y").to_string()
}

/// Per sub-swath geometry
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SwathGeometry {
    pub width: usize,
    pub height: usize,
    pub burst_count: usize,
    pub geo_transform: GeoTransform,
    pub range_pixel_spacing: f64,   // slant range, meters
    pub azimuth_pixel_spacing: f64, // meters
    pub incidence_near: f64,        // degrees
    pub incidence_far: f64,         // degrees
}

impl SwathGeometry {
    /// Ground range pixel spacing at mid swath
    pub fn ground_range_spacing(&self) -> f64 {
        let mid = 0.5 * (self.incidence_near + self.incidence_far);
        let sin = mid.to_radians().sin();
        if sin > 0.0 {
            self.range_pixel_spacing / sin
        } else {
            self.range_pixel_spacing
        }
    }

    pub fn footprint(&self) -> BoundingBox {
        self.geo_transform.footprint(self.width, self.height)
    }
}

/// Acquisition that was co-registered into a stack as a secondary
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SecondaryAcquisition {
    pub product_name: String,
    pub first_line_time: DateTime<Utc>,
}

/// Abstracted metadata carried through every stage
#[derive(Debug, Clone, PartialEq)]
pub struct AbstractedMetadata {
    pub mission: String,
    pub acquisition_mode: AcquisitionMode,
    pub product_type: String,
    pub polarizations: Vec<Polarization>,
    pub first_line_time: DateTime<Utc>,
    pub last_line_time: DateTime<Utc>,
    pub absolute_orbit: u32,
    pub swaths: BTreeMap<Subswath, SwathGeometry>,
    pub secondaries: Vec<SecondaryAcquisition>,
    pub history: Vec<String>,
}

impl AbstractedMetadata {
    /// Relative orbit (track) number, derived from the absolute orbit
    pub fn relative_orbit(&self) -> u32 {
        relative_orbit(&self.mission, self.absolute_orbit)
    }
}

/// Sentinel-1 track number for an absolute orbit (175 orbit repeat cycle)
pub fn relative_orbit(mission: &str, absolute_orbit: u32) -> u32 {
    let offset: i64 = match mission {
        "S1B" => 27,
        "S1C" => 172,
        _ => 73,
    };
    ((absolute_orbit as i64 - offset).rem_euclid(175) + 1) as u32
}

/// In-memory handle to a raster dataset
#[derive(Debug, Clone, PartialEq)]
pub struct Product {
    pub name: String,
    pub product_type: String,
    pub width: usize,
    pub height: usize,
    pub bands: Vec<Band>,
    pub geocoding: GeocodingState,
    pub metadata: AbstractedMetadata,
    /// File the product was read from, if any
    pub location: Option<PathBuf>,
    /// Operation and inputs a checkpointed stage built this product from
    pub fingerprint: Option<String>,
}

impl Product {
    /// Assemble a product, deriving the scene raster size from its bands
    pub fn new(
        name: impl Into<String>,
        product_type: impl Into<String>,
        bands: Vec<Band>,
        geocoding: GeocodingState,
        metadata: AbstractedMetadata,
    ) -> SarResult<Self> {
        let name = name.into();
        if bands.is_empty() {
            return Err(SarError::CorruptProduct(format!("Product {} has no bands", name)));
        }
        let width = bands.iter().map(Band::width).max().unwrap_or(0);
        let height = bands.iter().map(Band::height).max().unwrap_or(0);
        Ok(Self {
            name,
            product_type: product_type.into(),
            width,
            height,
            bands,
            geocoding,
            metadata,
            location: None,
            fingerprint: None,
        })
    }

    pub fn band_names(&self) -> Vec<String> {
        self.bands.iter().map(|b| b.name.clone()).collect()
    }

    pub fn band(&self, name: &str) -> Option<&Band> {
        self.bands.iter().find(|b| b.name == name)
    }

    pub fn polarizations(&self) -> &[Polarization] {
        &self.metadata.polarizations
    }

    pub fn subswaths(&self) -> Vec<Subswath> {
        self.metadata.swaths.keys().copied().collect()
    }

    /// The single sub-swath of a split product
    pub fn subswath(&self) -> SarResult<Subswath> {
        self.single_swath().map(|(swath, _)| swath)
    }

    /// Geometry of a split product; products still holding several swaths have none
    pub fn swath_geometry(&self) -> SarResult<&SwathGeometry> {
        self.single_swath().map(|(_, geometry)| geometry)
    }

    fn single_swath(&self) -> SarResult<(Subswath, &SwathGeometry)> {
        let mut swaths = self.metadata.swaths.iter();
        match (swaths.next(), swaths.next()) {
            (Some((swath, geometry)), None) => Ok((*swath, geometry)),
            (None, _) => Err(SarError::Geometry(format!("Product {} has no swath geometry", self.name))),
            _ => Err(SarError::Geometry(format!(
                "Product {} holds {} sub-swaths; split it first",
                self.name,
                self.metadata.swaths.len()
            ))),
        }
    }

    pub fn geo_transform(&self) -> SarResult<&GeoTransform> {
        self.swath_geometry().map(|g| &g.geo_transform)
    }

    /// Geographic extent of the whole product
    pub fn footprint(&self) -> SarResult<BoundingBox> {
        let boxes: Vec<BoundingBox> = self.metadata.swaths.values().map(|g| g.footprint()).collect();
        let corners = boxes
            .iter()
            .flat_map(|b| [(b.min_lon, b.min_lat), (b.max_lon, b.max_lat)]);
        BoundingBox::from_points(corners)
            .ok_or_else(|| SarError::Geometry(format!("Product {} has no swath geometry", self.name)))
    }

    /// Pixel window covered by the region's extent, clamped to the raster
    pub fn pixel_window(&self, roi: &RegionOfInterest) -> SarResult<Option<PixelWindow>> {
        let geometry = self.swath_geometry()?;
        PixelWindow::covering(&geometry.geo_transform, roi, geometry.width, geometry.height)
    }

    /// Date tag of the first line, used in stack band names
    pub fn date_tag(&self) -> String {
        date_tag(&self.metadata.first_line_time)
    }

    /// Complex components (i, q) for a polarization, optionally filtered by stack role
    pub fn complex_bands(
        &self,
        pol: Polarization,
        primary: Option<bool>,
    ) -> Vec<(&Band, &Band, Option<StackRole>)> {
        let mut pairs = Vec::new();
        for band in &self.bands {
            let Some(parsed) = band.band_name() else { continue };
            if parsed.prefix != "i" || parsed.polarization != pol {
                continue;
            }
            let matches_role = match (primary, &parsed.role) {
                (None, _) => true,
                (Some(true), Some(StackRole::Primary { .. })) => true,
                (Some(false), Some(StackRole::Secondary { .. })) => true,
                _ => false,
            };
            if !matches_role {
                continue;
            }
            let q_name = format!("q{}", &band.name[1..]);
            if let Some(q) = self.band(&q_name) {
                pairs.push((band, q, parsed.role.clone()));
            }
        }
        pairs
    }

    pub fn push_history(&mut self, entry: impl Into<String>) {
        self.metadata.history.push(entry.into());
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_band_name_parsing() {
        let plain = BandName::parse("i_IW2_VV").unwrap();
        assert_eq!(plain.subswath, Subswath::IW2);
        assert_eq!(plain.polarization, Polarization::VV);
        assert!(plain.role.is_none());

        let secondary = BandName::parse("q_IW2_VH_slv1_15Jan2020").unwrap();
        assert_eq!(
            secondary.role,
            Some(StackRole::Secondary { ordinal: 1, date: "15Jan2020".to_string() })
        );

        let coherence = BandName::parse("coh_IW2_VV_03Jan2020_15Jan2020").unwrap();
        assert_eq!(coherence.prefix, "coh");
        assert!(coherence.role.is_none());

        assert!(BandName::parse("Intensity").is_none());
    }

    #[test]
    fn test_relative_orbit() {
        assert_eq!(relative_orbit("S1A", 30639), 117);
        assert_eq!(relative_orbit("S1A", 73), 1);
        assert_eq!(relative_orbit("S1A", 73 + 175), 1);
    }
}
