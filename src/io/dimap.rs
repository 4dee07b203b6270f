//! BEAM-DIMAP stage artifacts
//!
//! A product is stored as a `.dim` XML descriptor next to a `.data/`
//! directory holding one ENVI header and one big-endian float32 image per
//! band. The descriptor is written last, to a temporary file that is then
//! persisted into place, so a present `.dim` always describes a complete
//! artifact. Output carries no timestamps of its own; writing the same
//! product twice produces identical bytes.
//!
//! The reader also accepts descriptors written by SNAP itself, whose
//! `Abstracted_Metadata` uses SNAP's attribute names and time format.

use crate::core::product::{AbstractedMetadata, Band, BandName, Product, SecondaryAcquisition, SwathGeometry};
use crate::types::{AcquisitionMode, GeoTransform, GeocodingState, Polarization, SarError, SarResult, Subswath};
use chrono::{DateTime, NaiveDateTime, SecondsFormat, Utc};
use ndarray::Array2;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};

const DIMAP_VERSION: &str = "2.12.1";
const XML_DECLARATION: &str = "<?xml version=\"1.0\" encoding=\"ISO-8859-1\"?>\n";

#[derive(Debug, Serialize, Deserialize)]
struct DimapDocument {
    #[serde(rename = "@name")]
    name: String,
    #[serde(rename = "Metadata_Id")]
    metadata_id: MetadataId,
    #[serde(rename = "Dataset_Id")]
    dataset_id: DatasetId,
    #[serde(rename = "Production")]
    production: Production,
    #[serde(rename = "Raster_Dimensions")]
    raster_dimensions: RasterDimensions,
    #[serde(rename = "Data_Access")]
    data_access: DataAccess,
    #[serde(rename = "Image_Interpretation")]
    image_interpretation: ImageInterpretation,
    #[serde(rename = "Dataset_Sources")]
    dataset_sources: DatasetSources,
}

#[derive(Debug, Serialize, Deserialize)]
struct MetadataId {
    #[serde(rename = "METADATA_FORMAT")]
    metadata_format: VersionedText,
}

#[derive(Debug, Serialize, Deserialize)]
struct VersionedText {
    #[serde(rename = "@version")]
    version: String,
    #[serde(rename = "$text")]
    value: String,
}

#[derive(Debug, Serialize, Deserialize)]
struct DatasetId {
    #[serde(rename = "DATASET_NAME")]
    dataset_name: String,
}

#[derive(Debug, Serialize, Deserialize)]
struct Production {
    #[serde(rename = "PRODUCT_TYPE")]
    product_type: String,
}

#[derive(Debug, Serialize, Deserialize)]
struct RasterDimensions {
    #[serde(rename = "NCOLS")]
    ncols: usize,
    #[serde(rename = "NROWS")]
    nrows: usize,
    #[serde(rename = "NBANDS")]
    nbands: usize,
}

#[derive(Debug, Serialize, Deserialize)]
struct DataAccess {
    #[serde(rename = "DATA_FILE_FORMAT", default)]
    data_file_format: String,
    #[serde(rename = "DATA_FILE_ORGANISATION", default)]
    data_file_organisation: String,
    #[serde(rename = "Data_File", default)]
    data_files: Vec<DataFile>,
}

#[derive(Debug, Serialize, Deserialize)]
struct DataFile {
    #[serde(rename = "DATA_FILE_PATH")]
    data_file_path: Href,
    #[serde(rename = "BAND_INDEX")]
    band_index: usize,
}

#[derive(Debug, Serialize, Deserialize)]
struct Href {
    #[serde(rename = "@href")]
    href: String,
}

#[derive(Debug, Serialize, Deserialize)]
struct ImageInterpretation {
    #[serde(rename = "Spectral_Band_Info", default)]
    bands: Vec<SpectralBandInfo>,
}

#[derive(Debug, Serialize, Deserialize)]
struct SpectralBandInfo {
    #[serde(rename = "BAND_INDEX")]
    band_index: usize,
    #[serde(rename = "BAND_NAME")]
    band_name: String,
    #[serde(rename = "BAND_RASTER_WIDTH")]
    width: usize,
    #[serde(rename = "BAND_RASTER_HEIGHT")]
    height: usize,
    #[serde(rename = "DATA_TYPE")]
    data_type: String,
    #[serde(rename = "PHYSICAL_UNIT", default)]
    unit: String,
    #[serde(rename = "SCALING_FACTOR", default, skip_serializing_if = "Option::is_none")]
    scaling_factor: Option<f64>,
    #[serde(rename = "SCALING_OFFSET", default, skip_serializing_if = "Option::is_none")]
    scaling_offset: Option<f64>,
    /// SNAP band computed from an expression; it has no image file
    #[serde(rename = "VIRTUAL_BAND", default, skip_serializing_if = "is_false")]
    virtual_band: bool,
}

fn is_false(value: &bool) -> bool {
    !*value
}

#[derive(Debug, Serialize, Deserialize)]
struct DatasetSources {
    #[serde(rename = "MDElem")]
    root: MdElem,
}

/// Nested metadata element of the SNAP metadata tree
#[derive(Debug, Default, Serialize, Deserialize)]
struct MdElem {
    #[serde(rename = "@name")]
    name: String,
    #[serde(rename = "MDATTR", default)]
    attrs: Vec<MdAttr>,
    #[serde(rename = "MDElem", default)]
    elems: Vec<MdElem>,
}

#[derive(Debug, Serialize, Deserialize)]
struct MdAttr {
    #[serde(rename = "@name")]
    name: String,
    #[serde(rename = "@type")]
    kind: String,
    #[serde(rename = "$text", default)]
    value: String,
}

impl MdElem {
    fn new(name: impl Into<String>) -> Self {
        Self { name: name.into(), ..Default::default() }
    }

    fn attr(&mut self, name: &str, kind: &str, value: impl ToString) -> &mut Self {
        self.attrs.push(MdAttr { name: name.to_string(), kind: kind.to_string(), value: value.to_string() });
        self
    }

    fn elem(&self, name: &str) -> Option<&MdElem> {
        self.elems.iter().find(|e| e.name == name)
    }

    fn require_elem(&self, name: &str) -> SarResult<&MdElem> {
        self.elem(name)
            .ok_or_else(|| SarError::CorruptProduct(format!("Metadata element '{}' missing", name)))
    }

    fn value(&self, name: &str) -> SarResult<&str> {
        self.attrs
            .iter()
            .find(|a| a.name == name)
            .map(|a| a.value.as_str())
            .ok_or_else(|| {
                SarError::CorruptProduct(format!("Metadata attribute {}.{} missing", self.name, name))
            })
    }

    fn parse<T: std::str::FromStr>(&self, name: &str) -> SarResult<T> {
        let raw = self.value(name)?;
        raw.trim().parse().map_err(|_| {
            SarError::CorruptProduct(format!("Metadata attribute {}.{} has bad value '{}'", self.name, name, raw))
        })
    }

    /// RFC 3339 as written here, or SNAP's `03-JAN-2020 17:08:16.618328`
    fn time(&self, name: &str) -> SarResult<DateTime<Utc>> {
        let raw = self.value(name)?.trim();
        DateTime::parse_from_rfc3339(raw)
            .map(|t| t.with_timezone(&Utc))
            .ok()
            .or_else(|| parse_snap_time(raw))
            .ok_or_else(|| SarError::CorruptProduct(format!("Bad time {}.{}: '{}'", self.name, name, raw)))
    }

    fn has(&self, name: &str) -> bool {
        self.attrs.iter().any(|a| a.name == name)
    }
}

fn parse_snap_time(raw: &str) -> Option<DateTime<Utc>> {
    // chrono expects `Jan`, SNAP writes `JAN`
    let mut parts = raw.splitn(3, '-');
    let (day, month, rest) = (parts.next()?, parts.next()?, parts.next()?);
    let mut chars = month.chars();
    let month: String = chars.next()?.to_uppercase().chain(chars.flat_map(char::to_lowercase)).collect();
    NaiveDateTime::parse_from_str(&format!("{}-{}-{}", day, month, rest), "%d-%b-%Y %H:%M:%S%.f")
        .ok()
        .map(|t| t.and_utc())
}

fn format_time(time: &DateTime<Utc>) -> String {
    time.to_rfc3339_opts(SecondsFormat::AutoSi, true)
}

/// `.data` directory belonging to a `.dim` descriptor
pub fn data_dir(dim_path: &Path) -> PathBuf {
    dim_path.with_extension("data")
}

fn metadata_tree(product: &Product) -> MdElem {
    let meta = &product.metadata;
    let mut abstracted = MdElem::new("Abstracted_Metadata");
    abstracted
        .attr("PRODUCT", "ascii", &product.name)
        .attr("PRODUCT_TYPE", "ascii", &meta.product_type)
        .attr("MISSION", "ascii", &meta.mission)
        .attr("ACQUISITION_MODE", "ascii", meta.acquisition_mode)
        .attr("first_line_time", "utc", format_time(&meta.first_line_time))
        .attr("last_line_time", "utc", format_time(&meta.last_line_time))
        .attr("ABS_ORBIT", "int32", meta.absolute_orbit)
        .attr("REL_ORBIT", "int32", meta.relative_orbit())
        .attr("GEOCODING", "ascii", product.geocoding);
    let pols: Vec<String> = meta.polarizations.iter().map(|p| p.to_string()).collect();
    abstracted.attr("POLARISATIONS", "ascii", pols.join(","));

    for (swath, geometry) in &meta.swaths {
        let gt = &geometry.geo_transform;
        let mut elem = MdElem::new(format!("Swath_{}", swath));
        elem.attr("width", "int32", geometry.width)
            .attr("height", "int32", geometry.height)
            .attr("burst_count", "int32", geometry.burst_count)
            .attr("top_left_x", "float64", gt.top_left_x)
            .attr("pixel_width", "float64", gt.pixel_width)
            .attr("rotation_x", "float64", gt.rotation_x)
            .attr("top_left_y", "float64", gt.top_left_y)
            .attr("rotation_y", "float64", gt.rotation_y)
            .attr("pixel_height", "float64", gt.pixel_height)
            .attr("range_spacing", "float64", geometry.range_pixel_spacing)
            .attr("azimuth_spacing", "float64", geometry.azimuth_pixel_spacing)
            .attr("incidence_near", "float64", geometry.incidence_near)
            .attr("incidence_far", "float64", geometry.incidence_far);
        abstracted.elems.push(elem);
    }

    let mut secondaries = MdElem::new("Secondary_Metadata");
    for (i, secondary) in meta.secondaries.iter().enumerate() {
        let mut elem = MdElem::new(format!("Secondary_{}", i + 1));
        elem.attr("PRODUCT", "ascii", &secondary.product_name)
            .attr("first_line_time", "utc", format_time(&secondary.first_line_time));
        secondaries.elems.push(elem);
    }

    let mut history = MdElem::new("Processing_Graph");
    for (i, entry) in meta.history.iter().enumerate() {
        history.attr(&format!("node.{}", i), "ascii", entry);
    }

    let mut root = MdElem::new("metadata");
    root.elems = vec![abstracted, secondaries, history];
    if let Some(fingerprint) = &product.fingerprint {
        let mut checkpoint = MdElem::new("Stage_Checkpoint");
        checkpoint.attr("fingerprint", "ascii", fingerprint);
        root.elems.push(checkpoint);
    }
    root
}

/// Raster facts the metadata tree is interpreted against
struct RasterLayout<'a> {
    width: usize,
    height: usize,
    band_names: Vec<&'a str>,
}

fn metadata_from_tree(root: &MdElem, layout: &RasterLayout) -> SarResult<(GeocodingState, AbstractedMetadata)> {
    let abstracted = root.require_elem("Abstracted_Metadata")?;
    if !abstracted.has("GEOCODING") {
        return snap_metadata(root, abstracted, layout);
    }

    let polarizations = abstracted
        .value("POLARISATIONS")?
        .split(',')
        .filter(|s| !s.is_empty())
        .map(str::parse::<Polarization>)
        .collect::<SarResult<Vec<_>>>()?;

    let mut swaths = BTreeMap::new();
    for elem in &abstracted.elems {
        let Some(swath_name) = elem.name.strip_prefix("Swath_") else { continue };
        let swath: Subswath = swath_name.parse()?;
        swaths.insert(
            swath,
            SwathGeometry {
                width: elem.parse("width")?,
                height: elem.parse("height")?,
                burst_count: elem.parse("burst_count")?,
                geo_transform: GeoTransform {
                    top_left_x: elem.parse("top_left_x")?,
                    pixel_width: elem.parse("pixel_width")?,
                    rotation_x: elem.parse("rotation_x")?,
                    top_left_y: elem.parse("top_left_y")?,
                    rotation_y: elem.parse("rotation_y")?,
                    pixel_height: elem.parse("pixel_height")?,
                },
                range_pixel_spacing: elem.parse("range_spacing")?,
                azimuth_pixel_spacing: elem.parse("azimuth_spacing")?,
                incidence_near: elem.parse("incidence_near")?,
                incidence_far: elem.parse("incidence_far")?,
            },
        );
    }

    let geocoding: GeocodingState = abstracted.value("GEOCODING")?.parse()?;
    let metadata = AbstractedMetadata {
        mission: abstracted.value("MISSION")?.to_string(),
        acquisition_mode: acquisition_mode(abstracted)?,
        product_type: abstracted.value("PRODUCT_TYPE")?.to_string(),
        polarizations,
        first_line_time: abstracted.time("first_line_time")?,
        last_line_time: abstracted.time("last_line_time")?,
        absolute_orbit: abstracted.parse("ABS_ORBIT")?,
        swaths,
        secondaries: secondaries(root)?,
        history: history(root),
    };
    Ok((geocoding, metadata))
}

/// Interpret the `Abstracted_Metadata` SNAP writes for its own products
fn snap_metadata(
    root: &MdElem,
    abstracted: &MdElem,
    layout: &RasterLayout,
) -> SarResult<(GeocodingState, AbstractedMetadata)> {
    let parsed: Vec<BandName> = layout.band_names.iter().filter_map(|name| BandName::parse(name)).collect();

    let mut polarizations = Vec::new();
    for i in 1..=4 {
        let Ok(raw) = abstracted.value(&format!("mds{}_tx_rx_polar", i)) else { continue };
        if let Ok(pol) = raw.trim().parse::<Polarization>() {
            if !polarizations.contains(&pol) {
                polarizations.push(pol);
            }
        }
    }
    if polarizations.is_empty() {
        for band in &parsed {
            if !polarizations.contains(&band.polarization) {
                polarizations.push(band.polarization);
            }
        }
    }

    // Per-swath geometry is only known once the product holds a single swath
    let mut band_swaths: Vec<Subswath> = parsed.iter().map(|b| b.subswath).collect();
    band_swaths.sort();
    band_swaths.dedup();
    let mut swaths = BTreeMap::new();
    if let [swath] = band_swaths.as_slice() {
        let corner = |lat: &str, lon: &str| -> SarResult<(f64, f64)> { Ok((abstracted.parse(lon)?, abstracted.parse(lat)?)) };
        let geo_transform = GeoTransform::from_corners(
            corner("first_near_lat", "first_near_long")?,
            corner("first_far_lat", "first_far_long")?,
            corner("last_near_lat", "last_near_long")?,
            layout.width,
            layout.height,
        )?;
        swaths.insert(
            *swath,
            SwathGeometry {
                width: layout.width,
                height: layout.height,
                // Burst layout stays inside SNAP's own metadata
                burst_count: 1,
                geo_transform,
                range_pixel_spacing: abstracted.parse("range_spacing")?,
                azimuth_pixel_spacing: abstracted.parse("azimuth_spacing")?,
                incidence_near: abstracted.parse("incidence_near")?,
                incidence_far: abstracted.parse("incidence_far")?,
            },
        );
    }

    let history = history(root);
    let geocoding = if history.iter().any(|h| h.starts_with("Back-Geocoding")) {
        GeocodingState::Geocoded
    } else if history.iter().any(|h| h.starts_with("Apply-Orbit-File")) {
        GeocodingState::OrbitCorrected
    } else {
        GeocodingState::None
    };

    let mission = abstracted.value("MISSION")?.trim();
    let mission = match mission.strip_prefix("SENTINEL-1") {
        Some(unit) => format!("S1{}", unit),
        None => mission.to_string(),
    };

    let metadata = AbstractedMetadata {
        mission,
        acquisition_mode: acquisition_mode(abstracted)?,
        product_type: abstracted.value("PRODUCT_TYPE")?.to_string(),
        polarizations,
        first_line_time: abstracted.time("first_line_time")?,
        last_line_time: abstracted.time("last_line_time")?,
        absolute_orbit: abstracted.parse("ABS_ORBIT")?,
        swaths,
        secondaries: secondaries(root)?,
        history,
    };
    Ok((geocoding, metadata))
}

fn acquisition_mode(abstracted: &MdElem) -> SarResult<AcquisitionMode> {
    abstracted
        .value("ACQUISITION_MODE")?
        .trim()
        .parse()
        .map_err(|e: SarError| SarError::CorruptProduct(e.to_string()))
}

/// Secondary acquisitions; SNAP releases before 9 call the element `Slave_Metadata`
fn secondaries(root: &MdElem) -> SarResult<Vec<SecondaryAcquisition>> {
    match root.elem("Secondary_Metadata").or_else(|| root.elem("Slave_Metadata")) {
        Some(elem) => elem
            .elems
            .iter()
            .map(|s| {
                Ok(SecondaryAcquisition {
                    product_name: s.value("PRODUCT")?.to_string(),
                    first_line_time: s.time("first_line_time")?,
                })
            })
            .collect(),
        None => Ok(Vec::new()),
    }
}

/// History entries; SNAP records graph nodes as `node.N` elements
fn history(root: &MdElem) -> Vec<String> {
    let Some(graph) = root.elem("Processing_Graph") else { return Vec::new() };
    let mut entries: Vec<String> = graph.attrs.iter().map(|a| a.value.clone()).collect();
    entries.extend(
        graph
            .elems
            .iter()
            .filter_map(|node| node.value("operator").ok())
            .filter(|op| !matches!(*op, "Read" | "Write" | "ProductSet-Reader"))
            .map(str::to_string),
    );
    entries
}

fn envi_header(band: &Band) -> String {
    format!(
        "ENVI\n\
         description = {{Sentinel-1 band {name}}}\n\
         samples = {width}\n\
         lines = {height}\n\
         bands = 1\n\
         header offset = 0\n\
         file type = ENVI Standard\n\
         data type = 4\n\
         interleave = bsq\n\
         byte order = 1\n\
         band names = {{ {name} }}\n\
         data gain values = {{1.0}}\n\
         data offset values = {{0.0}}\n",
        name = band.name,
        width = band.width(),
        height = band.height(),
    )
}

fn render_descriptor(product: &Product, dim_path: &Path) -> SarResult<String> {
    let file_name = dim_path
        .file_name()
        .and_then(|n| n.to_str())
        .ok_or_else(|| SarError::InvalidParameter(format!("Bad artifact path {}", dim_path.display())))?;
    let data_dir_name = data_dir(Path::new(file_name)).display().to_string();

    let document = DimapDocument {
        name: file_name.to_string(),
        metadata_id: MetadataId {
            metadata_format: VersionedText { version: DIMAP_VERSION.to_string(), value: "DIMAP".to_string() },
        },
        dataset_id: DatasetId { dataset_name: product.name.clone() },
        production: Production { product_type: product.product_type.clone() },
        raster_dimensions: RasterDimensions {
            ncols: product.width,
            nrows: product.height,
            nbands: product.bands.len(),
        },
        data_access: DataAccess {
            data_file_format: "ENVI".to_string(),
            data_file_organisation: "BAND_SEPARATE".to_string(),
            data_files: product
                .bands
                .iter()
                .enumerate()
                .map(|(i, band)| DataFile {
                    data_file_path: Href { href: format!("{}/{}.hdr", data_dir_name, band.name) },
                    band_index: i,
                })
                .collect(),
        },
        image_interpretation: ImageInterpretation {
            bands: product
                .bands
                .iter()
                .enumerate()
                .map(|(i, band)| SpectralBandInfo {
                    band_index: i,
                    band_name: band.name.clone(),
                    width: band.width(),
                    height: band.height(),
                    data_type: "float32".to_string(),
                    unit: band.unit.clone(),
                    scaling_factor: None,
                    scaling_offset: None,
                    virtual_band: false,
                })
                .collect(),
        },
        dataset_sources: DatasetSources { root: metadata_tree(product) },
    };

    let mut xml = String::from(XML_DECLARATION);
    let mut serializer = quick_xml::se::Serializer::with_root(&mut xml, Some("Dimap_Document"))
        .map_err(|e| SarError::XmlParsing(format!("Failed to start DIMAP document: {}", e)))?;
    serializer.indent(' ', 4);
    document
        .serialize(serializer)
        .map_err(|e| SarError::XmlParsing(format!("Failed to render DIMAP document: {}", e)))?;
    xml.push('\n');
    Ok(xml)
}

/// Write a product as a BEAM-DIMAP artifact
pub fn write_product(product: &Product, dim_path: &Path) -> SarResult<()> {
    if let Some(parent) = dim_path.parent() {
        if !parent.as_os_str().is_empty() {
            fs::create_dir_all(parent)?;
        }
    }

    // Drop the previous descriptor first so a partial rewrite never looks complete
    if dim_path.exists() {
        fs::remove_file(dim_path)?;
    }
    let data = data_dir(dim_path);
    if data.exists() {
        fs::remove_dir_all(&data)?;
    }
    fs::create_dir_all(&data)?;

    for band in &product.bands {
        fs::write(data.join(format!("{}.hdr", band.name)), envi_header(band))?;
        let mut bytes = Vec::with_capacity(band.data.len() * 4);
        for value in band.data.iter() {
            bytes.extend_from_slice(&value.to_be_bytes());
        }
        fs::write(data.join(format!("{}.img", band.name)), bytes)?;
    }

    let descriptor = render_descriptor(product, dim_path)?;
    let parent = dim_path.parent().filter(|p| !p.as_os_str().is_empty()).unwrap_or(Path::new("."));
    let mut temp = tempfile::NamedTempFile::new_in(parent)?;
    temp.write_all(descriptor.as_bytes())?;
    temp.persist(dim_path).map_err(|e| e.error)?;

    log::debug!("Wrote {} ({} bands)", dim_path.display(), product.bands.len());
    Ok(())
}

/// Bytes per sample of a DIMAP data type
fn sample_size(data_type: &str) -> Option<usize> {
    match data_type {
        "int8" | "uint8" => Some(1),
        "int16" | "uint16" => Some(2),
        "int32" | "uint32" | "float32" => Some(4),
        "float64" => Some(8),
        _ => None,
    }
}

/// Decode big-endian samples of `data_type` into f32
fn decode_samples(bytes: &[u8], data_type: &str) -> Vec<f32> {
    match data_type {
        "int8" => bytes.iter().map(|&b| b as i8 as f32).collect(),
        "uint8" => bytes.iter().map(|&b| b as f32).collect(),
        "int16" => bytes.chunks_exact(2).map(|c| i16::from_be_bytes([c[0], c[1]]) as f32).collect(),
        "uint16" => bytes.chunks_exact(2).map(|c| u16::from_be_bytes([c[0], c[1]]) as f32).collect(),
        "int32" => bytes
            .chunks_exact(4)
            .map(|c| i32::from_be_bytes([c[0], c[1], c[2], c[3]]) as f32)
            .collect(),
        "uint32" => bytes
            .chunks_exact(4)
            .map(|c| u32::from_be_bytes([c[0], c[1], c[2], c[3]]) as f32)
            .collect(),
        "float64" => bytes
            .chunks_exact(8)
            .map(|c| f64::from_be_bytes([c[0], c[1], c[2], c[3], c[4], c[5], c[6], c[7]]) as f32)
            .collect(),
        _ => bytes
            .chunks_exact(4)
            .map(|c| f32::from_be_bytes([c[0], c[1], c[2], c[3]]))
            .collect(),
    }
}

fn read_band(data: &Path, info: &SpectralBandInfo) -> SarResult<Band> {
    let img = data.join(format!("{}.img", info.band_name));
    let size = sample_size(&info.data_type).ok_or_else(|| {
        SarError::CorruptProduct(format!("{}: unsupported data type {}", img.display(), info.data_type))
    })?;
    let bytes = fs::read(&img)?;
    let expected = info.width * info.height * size;
    if bytes.len() != expected {
        return Err(SarError::CorruptProduct(format!(
            "{}: {} bytes, expected {} for {}x{} {}",
            img.display(),
            bytes.len(),
            expected,
            info.width,
            info.height,
            info.data_type
        )));
    }
    let mut values = decode_samples(&bytes, &info.data_type);
    if info.scaling_factor.is_some() || info.scaling_offset.is_some() {
        let factor = info.scaling_factor.unwrap_or(1.0);
        let offset = info.scaling_offset.unwrap_or(0.0);
        for v in values.iter_mut() {
            *v = (*v as f64 * factor + offset) as f32;
        }
    }
    let array = Array2::from_shape_vec((info.height, info.width), values)
        .map_err(|e| SarError::CorruptProduct(format!("{}: {}", img.display(), e)))?;
    Ok(Band::new(info.band_name.clone(), info.unit.clone(), array))
}

/// Read a BEAM-DIMAP artifact
pub fn read_product(dim_path: &Path) -> SarResult<Product> {
    // SNAP declares ISO-8859-1; the descriptor is ASCII in practice
    let raw = fs::read(dim_path)?;
    let xml = String::from_utf8_lossy(&raw);
    let document: DimapDocument = quick_xml::de::from_str(&xml)
        .map_err(|e| SarError::CorruptProduct(format!("{}: {}", dim_path.display(), e)))?;

    let data = data_dir(dim_path);
    let stored: Vec<&SpectralBandInfo> =
        document.image_interpretation.bands.iter().filter(|info| !info.virtual_band).collect();
    let bands = stored.iter().map(|info| read_band(&data, info)).collect::<SarResult<Vec<_>>>()?;

    let layout = RasterLayout {
        width: document.raster_dimensions.ncols,
        height: document.raster_dimensions.nrows,
        band_names: stored.iter().map(|info| info.band_name.as_str()).collect(),
    };
    let root = &document.dataset_sources.root;
    let (geocoding, metadata) = metadata_from_tree(root, &layout)?;
    let mut product = Product::new(
        document.dataset_id.dataset_name,
        document.production.product_type,
        bands,
        geocoding,
        metadata,
    )?;
    if product.width != layout.width || product.height != layout.height {
        return Err(SarError::CorruptProduct(format!(
            "{}: bands are {}x{}, descriptor says {}x{}",
            dim_path.display(),
            product.width,
            product.height,
            layout.width,
            layout.height
        )));
    }
    product.location = Some(dim_path.to_path_buf());
    product.fingerprint = root
        .elem("Stage_Checkpoint")
        .and_then(|checkpoint| checkpoint.value("fingerprint").ok())
        .map(str::to_string);
    Ok(product)
}

/// True when a complete artifact exists at `dim_path`
pub fn artifact_exists(dim_path: &Path) -> bool {
    dim_path.is_file() && data_dir(dim_path).is_dir()
}
