use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;

/// Polarization modes for Sentinel-1
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum Polarization {
    VV,
    VH,
    HV,
    HH,
}

impl fmt::Display for Polarization {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Polarization::VV => write!(f, "VV"),
            Polarization::VH => write!(f, "VH"),
            Polarization::HV => write!(f, "HV"),
            Polarization::HH => write!(f, "HH"),
        }
    }
}

impl FromStr for Polarization {
    type Err = SarError;

    fn from_str(s: &str) -> SarResult<Self> {
        match s.to_uppercase().as_str() {
            "VV" => Ok(Polarization::VV),
            "VH" => Ok(Polarization::VH),
            "HV" => Ok(Polarization::HV),
            "HH" => Ok(Polarization::HH),
            _ => Err(SarError::InvalidParameter(format!("Invalid polarization: {}", s))),
        }
    }
}

/// Sentinel-1 acquisition mode
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum AcquisitionMode {
    IW, // Interferometric Wide swath
    EW, // Extra Wide swath
    SM, // StripMap
    WV, // Wave
}

impl AcquisitionMode {
    /// Sub-swaths a product of this mode can be split into
    pub fn subswaths(&self) -> &'static [Subswath] {
        match self {
            AcquisitionMode::IW => &[Subswath::IW1, Subswath::IW2, Subswath::IW3],
            AcquisitionMode::EW => &[
                Subswath::EW1,
                Subswath::EW2,
                Subswath::EW3,
                Subswath::EW4,
                Subswath::EW5,
            ],
            AcquisitionMode::SM | AcquisitionMode::WV => &[],
        }
    }
}

impl fmt::Display for AcquisitionMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:?}", self)
    }
}

impl FromStr for AcquisitionMode {
    type Err = SarError;

    fn from_str(s: &str) -> SarResult<Self> {
        match s {
            "IW" => Ok(AcquisitionMode::IW),
            "EW" => Ok(AcquisitionMode::EW),
            "WV" => Ok(AcquisitionMode::WV),
            // Stripmap products carry the beam id (S1..S6) in the mode token
            "SM" | "S1" | "S2" | "S3" | "S4" | "S5" | "S6" => Ok(AcquisitionMode::SM),
            _ => Err(SarError::MetadataFormat(format!("Unknown sensing mode: {}", s))),
        }
    }
}

/// TOPS sub-swath identifier
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum Subswath {
    IW1,
    IW2,
    IW3,
    EW1,
    EW2,
    EW3,
    EW4,
    EW5,
}

impl Subswath {
    pub fn as_str(&self) -> &'static str {
        match self {
            Subswath::IW1 => "IW1",
            Subswath::IW2 => "IW2",
            Subswath::IW3 => "IW3",
            Subswath::EW1 => "EW1",
            Subswath::EW2 => "EW2",
            Subswath::EW3 => "EW3",
            Subswath::EW4 => "EW4",
            Subswath::EW5 => "EW5",
        }
    }
}

impl fmt::Display for Subswath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Subswath {
    type Err = SarError;

    fn from_str(s: &str) -> SarResult<Self> {
        match s.to_uppercase().as_str() {
            "IW1" => Ok(Subswath::IW1),
            "IW2" => Ok(Subswath::IW2),
            "IW3" => Ok(Subswath::IW3),
            "EW1" => Ok(Subswath::EW1),
            "EW2" => Ok(Subswath::EW2),
            "EW3" => Ok(Subswath::EW3),
            "EW4" => Ok(Subswath::EW4),
            "EW5" => Ok(Subswath::EW5),
            _ => Err(SarError::InvalidParameter(format!("Invalid subswath: {}", s))),
        }
    }
}

/// How precisely a product is located on the ground
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub enum GeocodingState {
    /// Annotation geolocation grid only
    None,
    /// Precise orbit state vectors applied
    OrbitCorrected,
    /// Back-geocoded onto a DEM-referenced geometry
    Geocoded,
}

impl fmt::Display for GeocodingState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            GeocodingState::None => write!(f, "none"),
            GeocodingState::OrbitCorrected => write!(f, "orbit-corrected"),
            GeocodingState::Geocoded => write!(f, "geocoded"),
        }
    }
}

impl FromStr for GeocodingState {
    type Err = SarError;

    fn from_str(s: &str) -> SarResult<Self> {
        match s {
            "none" => Ok(GeocodingState::None),
            "orbit-corrected" => Ok(GeocodingState::OrbitCorrected),
            "geocoded" => Ok(GeocodingState::Geocoded),
            _ => Err(SarError::CorruptProduct(format!("Unknown geocoding state: {}", s))),
        }
    }
}

/// Geospatial bounding box
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BoundingBox {
    pub min_lon: f64,
    pub max_lon: f64,
    pub min_lat: f64,
    pub max_lat: f64,
}

impl BoundingBox {
    /// Smallest box enclosing all points
    pub fn from_points<I: IntoIterator<Item = (f64, f64)>>(points: I) -> Option<Self> {
        let mut iter = points.into_iter();
        let (lon, lat) = iter.next()?;
        let mut bbox = BoundingBox { min_lon: lon, max_lon: lon, min_lat: lat, max_lat: lat };
        for (lon, lat) in iter {
            bbox.min_lon = bbox.min_lon.min(lon);
            bbox.max_lon = bbox.max_lon.max(lon);
            bbox.min_lat = bbox.min_lat.min(lat);
            bbox.max_lat = bbox.max_lat.max(lat);
        }
        Some(bbox)
    }

    /// True when the two boxes share any area (touching edges do not count)
    pub fn intersects(&self, other: &BoundingBox) -> bool {
        self.min_lon < other.max_lon
            && other.min_lon < self.max_lon
            && self.min_lat < other.max_lat
            && other.min_lat < self.max_lat
    }

    pub fn contains(&self, other: &BoundingBox) -> bool {
        self.min_lon <= other.min_lon
            && self.max_lon >= other.max_lon
            && self.min_lat <= other.min_lat
            && self.max_lat >= other.max_lat
    }
}

/// Affine pixel-to-geographic transformation (GDAL ordering)
///
/// `lon = top_left_x + col * pixel_width + row * rotation_x`
/// `lat = top_left_y + col * rotation_y + row * pixel_height`
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GeoTransform {
    pub top_left_x: f64,
    pub pixel_width: f64,
    pub rotation_x: f64,
    pub top_left_y: f64,
    pub rotation_y: f64,
    pub pixel_height: f64,
}

/// Pixel position with its geographic location
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TiePoint {
    pub col: f64,
    pub row: f64,
    pub lon: f64,
    pub lat: f64,
}

impl GeoTransform {
    /// Fit the transform through an origin tie point, one further along the
    /// same row and one further down the same column
    pub fn from_tie_points(origin: TiePoint, along_row: TiePoint, along_col: TiePoint) -> SarResult<Self> {
        let dc = along_row.col - origin.col;
        let dr = along_col.row - origin.row;
        if dc.abs() < f64::EPSILON || dr.abs() < f64::EPSILON {
            return Err(SarError::Geometry(
                "Tie points do not span both raster axes".to_string(),
            ));
        }
        let pixel_width = (along_row.lon - origin.lon) / dc;
        let rotation_y = (along_row.lat - origin.lat) / dc;
        let rotation_x = (along_col.lon - origin.lon) / dr;
        let pixel_height = (along_col.lat - origin.lat) / dr;
        Ok(GeoTransform {
            top_left_x: origin.lon - origin.col * pixel_width - origin.row * rotation_x,
            pixel_width,
            rotation_x,
            top_left_y: origin.lat - origin.col * rotation_y - origin.row * pixel_height,
            rotation_y,
            pixel_height,
        })
    }

    /// Build the transform from three corner coordinates of a `width` x `height` raster
    pub fn from_corners(
        first_near: (f64, f64),
        first_far: (f64, f64),
        last_near: (f64, f64),
        width: usize,
        height: usize,
    ) -> SarResult<Self> {
        if width < 2 || height < 2 {
            return Err(SarError::Geometry(format!(
                "Cannot derive geocoding for a {}x{} raster",
                width, height
            )));
        }
        let last_col = (width - 1) as f64;
        let last_row = (height - 1) as f64;
        Self::from_tie_points(
            TiePoint { col: 0.0, row: 0.0, lon: first_near.0, lat: first_near.1 },
            TiePoint { col: last_col, row: 0.0, lon: first_far.0, lat: first_far.1 },
            TiePoint { col: 0.0, row: last_row, lon: last_near.0, lat: last_near.1 },
        )
    }

    /// Geographic (lon, lat) of a pixel position
    pub fn pixel_to_geo(&self, col: f64, row: f64) -> (f64, f64) {
        (
            self.top_left_x + col * self.pixel_width + row * self.rotation_x,
            self.top_left_y + col * self.rotation_y + row * self.pixel_height,
        )
    }

    /// Pixel position (col, row) of a geographic coordinate
    pub fn geo_to_pixel(&self, lon: f64, lat: f64) -> SarResult<(f64, f64)> {
        let det = self.pixel_width * self.pixel_height - self.rotation_x * self.rotation_y;
        if det.abs() < f64::EPSILON * 1e-6 {
            return Err(SarError::Geometry("Degenerate geo-transform".to_string()));
        }
        let dx = lon - self.top_left_x;
        let dy = lat - self.top_left_y;
        let col = (dx * self.pixel_height - dy * self.rotation_x) / det;
        let row = (dy * self.pixel_width - dx * self.rotation_y) / det;
        Ok((col, row))
    }

    /// Shift the origin to pixel (col, row), keeping the pixel size
    pub fn offset(&self, col: usize, row: usize) -> Self {
        let (x, y) = self.pixel_to_geo(col as f64, row as f64);
        GeoTransform { top_left_x: x, top_left_y: y, ..*self }
    }

    /// Geographic corners of a `width` x `height` raster as a ring:
    /// first near, first far, last far, last near
    pub fn corners(&self, width: usize, height: usize) -> [(f64, f64); 4] {
        let w = width.saturating_sub(1) as f64;
        let h = height.saturating_sub(1) as f64;
        [(0.0, 0.0), (w, 0.0), (w, h), (0.0, h)].map(|(c, r)| self.pixel_to_geo(c, r))
    }

    /// Footprint of a `width` x `height` raster
    pub fn footprint(&self, width: usize, height: usize) -> BoundingBox {
        // Four corners are always present
        BoundingBox::from_points(self.corners(width, height)).unwrap_or(BoundingBox {
            min_lon: self.top_left_x,
            max_lon: self.top_left_x,
            min_lat: self.top_left_y,
            max_lat: self.top_left_y,
        })
    }
}

/// Error types for the coherence pipeline
#[derive(Debug, thiserror::Error)]
pub enum SarError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Discovery error: {0}")]
    Discovery(String),

    #[error("Metadata format error: {0}")]
    MetadataFormat(String),

    #[error("Corrupt product: {0}")]
    CorruptProduct(String),

    #[error("Invalid parameter: {0}")]
    InvalidParameter(String),

    #[error("Missing parameter: {0}")]
    MissingParameter(String),

    #[error("Failed to write stage artifact {}: {message}", path.display())]
    StageWrite { path: PathBuf, message: String },

    #[error("Failed to read stage artifact {}: {message}", path.display())]
    StageRead { path: PathBuf, message: String },

    #[error("Insufficient acquisitions: {0}")]
    InsufficientAcquisitions(String),

    #[error("Incompatible pair: {0}")]
    IncompatiblePair(String),

    #[error("Empty intersection: {0}")]
    EmptyIntersection(String),

    #[error("Geometry error: {0}")]
    Geometry(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Raster engine error: {0}")]
    Engine(String),

    #[error("XML parsing error: {0}")]
    XmlParsing(String),

    #[error("Stage {key} failed: {source}")]
    Stage {
        key: String,
        #[source]
        source: Box<SarError>,
    },
}

impl SarError {
    /// The innermost error, looking through stage wrappers
    pub fn root_cause(&self) -> &SarError {
        match self {
            SarError::Stage { source, .. } => source.root_cause(),
            other => other,
        }
    }
}

/// Result type for pipeline operations
pub type SarResult<T> = Result<T, SarError>;
