use crate::core::product::{AbstractedMetadata, Band, Product, UNIT_IMAGINARY, UNIT_REAL};
use crate::io::acquisition::product_stem;
use crate::io::annotation::AnnotationParser;
use crate::types::{GeocodingState, Polarization, SarError, SarResult, Subswath};
use chrono::{DateTime, Utc};
use ndarray::Array2;
use std::collections::BTreeMap;
use std::fs::File;
use std::io::{Cursor, Read};
use std::path::{Path, PathBuf};
use std::time::Instant;
use tiff::decoder::{Decoder, DecodingResult, Limits};
use zip::ZipArchive;

/// Sentinel-1 SLC reader for zipped SAFE archives
pub struct SlcReader {
    zip_path: PathBuf,
    archive: ZipArchive<File>,
}

impl SlcReader {
    /// Open a Sentinel-1 product archive
    pub fn new<P: AsRef<Path>>(zip_path: P) -> SarResult<Self> {
        let zip_path = zip_path.as_ref().to_path_buf();

        if !zip_path.exists() {
            return Err(SarError::Io(std::io::Error::new(
                std::io::ErrorKind::NotFound,
                format!("File not found: {}", zip_path.display()),
            )));
        }

        let file = File::open(&zip_path)?;
        let archive = ZipArchive::new(file).map_err(|e| {
            SarError::CorruptProduct(format!("Failed to open ZIP {}: {}", zip_path.display(), e))
        })?;

        Ok(Self { zip_path, archive })
    }

    /// List all files in the archive
    pub fn list_files(&self) -> Vec<String> {
        self.archive.file_names().map(str::to_string).collect()
    }

    /// Find annotation files per (sub-swath, polarization)
    pub fn find_annotation_files(&self) -> SarResult<BTreeMap<(Subswath, Polarization), String>> {
        let mut annotations = BTreeMap::new();

        for file in self.list_files() {
            if !file.contains("annotation/") || file.contains("/calibration/") || !file.ends_with(".xml") {
                continue;
            }
            if let Some(key) = Self::swath_and_polarization(&file) {
                annotations.insert(key, file);
            }
        }

        if annotations.is_empty() {
            return Err(SarError::CorruptProduct(format!(
                "No annotation files found in {}",
                self.zip_path.display()
            )));
        }

        Ok(annotations)
    }

    /// Measurement raster belonging to an annotation file
    pub fn find_measurement_file(&self, annotation_file: &str) -> Option<String> {
        let stem = Path::new(annotation_file).file_stem()?.to_str()?.to_string();
        self.archive
            .file_names()
            .find(|name| {
                name.contains("measurement/")
                    && (name.ends_with(&format!("{}.tiff", stem)) || name.ends_with(&format!("{}.tif", stem)))
            })
            .map(str::to_string)
    }

    /// Parse sub-swath and polarization from `s1a-iw2-slc-vv-...` style names
    fn swath_and_polarization(file_name: &str) -> Option<(Subswath, Polarization)> {
        let base = Path::new(file_name).file_name()?.to_str()?;
        let mut tokens = base.split('-');
        let _mission = tokens.next()?;
        let swath: Subswath = tokens.next()?.parse().ok()?;
        let _product_type = tokens.next()?;
        let pol: Polarization = tokens.next()?.parse().ok()?;
        Some((swath, pol))
    }

    fn read_file_bytes(&mut self, file_path: &str) -> SarResult<Vec<u8>> {
        let mut file = self.archive.by_name(file_path).map_err(|e| {
            SarError::CorruptProduct(format!("Failed to read {}: {}", file_path, e))
        })?;
        let mut buffer = Vec::with_capacity(file.size() as usize);
        file.read_to_end(&mut buffer)?;
        Ok(buffer)
    }

    fn read_file_as_string(&mut self, file_path: &str) -> SarResult<String> {
        let bytes = self.read_file_bytes(file_path)?;
        String::from_utf8(bytes)
            .map_err(|e| SarError::CorruptProduct(format!("{} is not UTF-8: {}", file_path, e)))
    }

    /// Read one measurement raster as (i, q) component arrays
    pub fn read_slc_data(&mut self, measurement_file: &str) -> SarResult<(Array2<f32>, Array2<f32>)> {
        log::info!("Reading SLC data from {}", measurement_file);
        let start_time = Instant::now();

        let bytes = self.read_file_bytes(measurement_file)?;
        let tiff_error =
            |e: tiff::TiffError| SarError::CorruptProduct(format!("{}: {}", measurement_file, e));
        let mut decoder = Decoder::new(Cursor::new(bytes))
            .map_err(tiff_error)?
            .with_limits(Limits::unlimited());
        let (width, height) = decoder.dimensions().map_err(tiff_error)?;
        let (width, height) = (width as usize, height as usize);
        let samples = decoding_to_f32(decoder.read_image().map_err(tiff_error)?);

        let pixels = width * height;
        let (i_data, q_data) = if samples.len() == 2 * pixels {
            // Complex samples interleaved as i, q
            let i: Vec<f32> = samples.iter().step_by(2).copied().collect();
            let q: Vec<f32> = samples.iter().skip(1).step_by(2).copied().collect();
            (i, q)
        } else if samples.len() == pixels {
            // Detected data carries no phase
            (samples, vec![0.0f32; pixels])
        } else {
            return Err(SarError::CorruptProduct(format!(
                "{}: {} samples do not fit a {}x{} raster",
                measurement_file,
                samples.len(),
                width,
                height
            )));
        };

        let shape_error =
            |e: ndarray::ShapeError| SarError::CorruptProduct(format!("{}: {}", measurement_file, e));
        let i_array = Array2::from_shape_vec((height, width), i_data).map_err(shape_error)?;
        let q_array = Array2::from_shape_vec((height, width), q_data).map_err(shape_error)?;

        log::debug!(
            "SLC data read complete: {} x {} pixels in {:?}",
            width,
            height,
            start_time.elapsed()
        );
        Ok((i_array, q_array))
    }

    /// Load every sub-swath and polarization of the archive into a product
    pub fn read_product(&mut self) -> SarResult<Product> {
        let annotations = self.find_annotation_files()?;
        let name = self
            .zip_path
            .file_name()
            .and_then(|n| n.to_str())
            .map(|n| product_stem(n).to_string())
            .unwrap_or_else(|| "unnamed".to_string());

        let mut bands = Vec::new();
        let mut swaths = BTreeMap::new();
        let mut polarizations = Vec::new();
        let mut header = None;
        let mut first_line_time: Option<DateTime<Utc>> = None;
        let mut last_line_time: Option<DateTime<Utc>> = None;

        for ((swath, pol), annotation_file) in &annotations {
            let xml = self.read_file_as_string(annotation_file)?;
            let annotation = AnnotationParser::parse_annotation(&xml)?;
            let geometry = AnnotationParser::swath_geometry(&annotation)?;
            let (start, stop) = AnnotationParser::sensing_times(&annotation)?;

            let measurement = self.find_measurement_file(annotation_file).ok_or_else(|| {
                SarError::CorruptProduct(format!("No measurement raster for {}", annotation_file))
            })?;
            let (i_data, q_data) = self.read_slc_data(&measurement)?;
            if i_data.dim() != (geometry.height, geometry.width) {
                return Err(SarError::CorruptProduct(format!(
                    "{}: raster is {:?}, annotation says {}x{}",
                    measurement,
                    i_data.dim(),
                    geometry.width,
                    geometry.height
                )));
            }

            bands.push(Band::new(format!("i_{}_{}", swath, pol), UNIT_REAL, i_data));
            bands.push(Band::new(format!("q_{}_{}", swath, pol), UNIT_IMAGINARY, q_data));
            swaths.entry(*swath).or_insert(geometry);
            if !polarizations.contains(pol) {
                polarizations.push(*pol);
            }
            first_line_time = Some(first_line_time.map_or(start, |t| t.min(start)));
            last_line_time = Some(last_line_time.map_or(stop, |t| t.max(stop)));
            if header.is_none() {
                header = Some((
                    annotation.ads_header.mission_id.clone(),
                    AnnotationParser::acquisition_mode(&annotation)?,
                    annotation.ads_header.product_type.clone(),
                    annotation.ads_header.absolute_orbit_number,
                ));
            }
        }

        let (mission, acquisition_mode, product_type, absolute_orbit) = header
            .ok_or_else(|| SarError::CorruptProduct(format!("{} holds no swaths", name)))?;
        polarizations.sort();

        let metadata = AbstractedMetadata {
            mission,
            acquisition_mode,
            product_type: product_type.clone(),
            polarizations,
            first_line_time: first_line_time.unwrap_or_default(),
            last_line_time: last_line_time.unwrap_or_default(),
            absolute_orbit,
            swaths,
            secondaries: Vec::new(),
            history: Vec::new(),
        };

        log::info!(
            "Loaded {}: {} bands over {} sub-swaths",
            name,
            bands.len(),
            metadata.swaths.len()
        );
        let mut product = Product::new(name, product_type, bands, GeocodingState::None, metadata)?;
        product.location = Some(self.zip_path.clone());
        Ok(product)
    }
}

fn decoding_to_f32(result: DecodingResult) -> Vec<f32> {
    match result {
        DecodingResult::U8(v) => v.into_iter().map(f32::from).collect(),
        DecodingResult::U16(v) => v.into_iter().map(f32::from).collect(),
        DecodingResult::U32(v) => v.into_iter().map(|x| x as f32).collect(),
        DecodingResult::U64(v) => v.into_iter().map(|x| x as f32).collect(),
        DecodingResult::I8(v) => v.into_iter().map(f32::from).collect(),
        DecodingResult::I16(v) => v.into_iter().map(f32::from).collect(),
        DecodingResult::I32(v) => v.into_iter().map(|x| x as f32).collect(),
        DecodingResult::I64(v) => v.into_iter().map(|x| x as f32).collect(),
        DecodingResult::F32(v) => v,
        DecodingResult::F64(v) => v.into_iter().map(|x| x as f32).collect(),
    }
}
