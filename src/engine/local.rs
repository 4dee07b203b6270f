//! In-process reference engine
//!
//! Geocoding is the affine fit carried in each swath's metadata, so
//! back-geocoding reduces to resampling secondaries onto the primary grid.
//! Orbit correction only promotes the geocoding state; no orbit files are
//! fetched.

use crate::core::gateway::RasterEngine;
use crate::core::operators::{
    BackGeocodingParams, CoherenceParams, OperatorRequest, OrbitParams, SplitParams, SubsetParams,
};
use crate::core::product::{
    Band, BandName, Product, SecondaryAcquisition, StackRole, UNIT_COHERENCE,
};
use crate::engine::coherence::{effective_windows, estimate_coherence};
use crate::engine::coregistration::{resample, PixelMapping};
use crate::io::dimap;
use crate::io::slc_reader::SlcReader;
use crate::types::{GeocodingState, Polarization, SarError, SarResult};
use ndarray::s;
use std::path::Path;

#[derive(Debug, Default, Clone)]
pub struct LocalEngine;

impl LocalEngine {
    pub fn new() -> Self {
        Self
    }

    fn apply_orbit_file(&self, params: &OrbitParams, input: &Product) -> SarResult<Product> {
        log::info!("Applying orbit ({}, degree {}) to {}", params.orbit_type, params.poly_degree, input.name);
        let mut product = input.clone();
        product.name = format!("{}_Orb", input.name);
        product.geocoding = product.geocoding.max(GeocodingState::OrbitCorrected);
        product.location = None;
        Ok(product)
    }

    fn topsar_split(&self, params: &SplitParams, input: &Product) -> SarResult<Product> {
        let mut geometry = input
            .metadata
            .swaths
            .get(&params.subswath)
            .cloned()
            .ok_or_else(|| {
                SarError::InvalidParameter(format!(
                    "Product {} has no sub-swath {} (available: {:?})",
                    input.name,
                    params.subswath,
                    input.subswaths()
                ))
            })?;
        for pol in &params.polarizations {
            if !input.polarizations().contains(pol) {
                return Err(SarError::InvalidParameter(format!(
                    "Product {} has no {} polarization",
                    input.name, pol
                )));
            }
        }

        let bursts = geometry.burst_count.max(1);
        let first = params.first_burst_index.unwrap_or(1) as usize;
        let last = params.last_burst_index.map(|l| l as usize).unwrap_or(bursts);
        if first < 1 || last > bursts || first > last {
            return Err(SarError::InvalidParameter(format!(
                "Burst range {}..={} outside 1..={} for {}",
                first, last, bursts, params.subswath
            )));
        }
        let lines_per_burst = geometry.height / bursts;
        let row0 = (first - 1) * lines_per_burst;
        let row1 = if last == bursts { geometry.height } else { last * lines_per_burst };

        let mut bands = Vec::new();
        for band in &input.bands {
            let Some(parsed) = band.band_name() else { continue };
            if parsed.subswath != params.subswath || !params.polarizations.contains(&parsed.polarization) {
                continue;
            }
            let data = band.data.slice(s![row0..row1, ..]).to_owned();
            bands.push(Band::new(band.name.clone(), band.unit.clone(), data));
        }

        geometry.geo_transform = geometry.geo_transform.offset(0, row0);
        geometry.height = row1 - row0;
        geometry.burst_count = last - first + 1;
        log::debug!(
            "Split {}: bursts {}..={}, lines {}..{}",
            params.subswath,
            first,
            last,
            row0,
            row1
        );

        let mut metadata = input.metadata.clone();
        metadata.swaths = [(params.subswath, geometry)].into_iter().collect();
        metadata.polarizations = input
            .polarizations()
            .iter()
            .copied()
            .filter(|p| params.polarizations.contains(p))
            .collect();

        Product::new(
            format!("{}_{}", input.name, params.subswath),
            input.product_type.clone(),
            bands,
            input.geocoding,
            metadata,
        )
    }

    fn back_geocoding(&self, params: &BackGeocodingParams, inputs: &[&Product]) -> SarResult<Product> {
        let primary = inputs[0];
        let swath = primary
            .subswath()
            .map_err(|e| SarError::IncompatiblePair(e.to_string()))?;
        let primary_geometry = primary.swath_geometry()?;
        let primary_date = primary.date_tag();
        let pols: Vec<Polarization> = primary.polarizations().to_vec();

        log::debug!(
            "Back-geocoding against {} ({} resampling, DEM {} not modelled locally)",
            primary.name,
            params.resampling_type.as_str(),
            params.dem_name
        );
        if params.output_deramp_demod_phase {
            log::warn!("Deramp/demod phase bands are not produced by the local engine");
        }

        let complex_pair = |product: &Product, pol: Polarization| -> SarResult<(Band, Band)> {
            let i_name = BandName::format("i", swath, pol);
            let q_name = BandName::format("q", swath, pol);
            match (product.band(&i_name), product.band(&q_name)) {
                (Some(i), Some(q)) => Ok((i.clone(), q.clone())),
                _ => Err(SarError::IncompatiblePair(format!(
                    "Product {} lacks complex bands for {} {}",
                    product.name, swath, pol
                ))),
            }
        };

        let mut bands = Vec::new();
        for pol in &pols {
            let (i, q) = complex_pair(primary, *pol)?;
            bands.push(Band::new(format!("{}_mst_{}", i.name, primary_date), i.unit, i.data));
            bands.push(Band::new(format!("{}_mst_{}", q.name, primary_date), q.unit, q.data));
        }

        let mut metadata = primary.metadata.clone();
        for (k, secondary) in inputs[1..].iter().enumerate() {
            let secondary_swath = secondary
                .subswath()
                .map_err(|e| SarError::IncompatiblePair(e.to_string()))?;
            if secondary_swath != swath {
                return Err(SarError::IncompatiblePair(format!(
                    "{} is {} but {} is {}",
                    primary.name, swath, secondary.name, secondary_swath
                )));
            }
            let secondary_geometry = secondary.swath_geometry()?;
            if !primary_geometry.footprint().intersects(&secondary_geometry.footprint()) {
                return Err(SarError::IncompatiblePair(format!(
                    "Footprints of {} and {} do not overlap",
                    primary.name, secondary.name
                )));
            }

            let mapping = PixelMapping::between(&primary_geometry.geo_transform, &secondary_geometry.geo_transform)?;
            let shape = (primary_geometry.height, primary_geometry.width);
            let date = secondary.date_tag();
            for pol in &pols {
                let (i, q) = complex_pair(secondary, *pol)?;
                let (i_data, covered) = resample(&i.data, &mapping, shape, params.resampling_type)?;
                let (q_data, _) = resample(&q.data, &mapping, shape, params.resampling_type)?;
                if covered == 0 {
                    return Err(SarError::IncompatiblePair(format!(
                        "{} does not cover any pixel of {}",
                        secondary.name, primary.name
                    )));
                }
                log::debug!(
                    "{} {}: {:.1}% of primary grid covered",
                    secondary.name,
                    pol,
                    100.0 * covered as f64 / (shape.0 * shape.1) as f64
                );
                bands.push(Band::new(format!("{}_slv{}_{}", i.name, k + 1, date), i.unit, i_data));
                bands.push(Band::new(format!("{}_slv{}_{}", q.name, k + 1, date), q.unit, q_data));
            }
            metadata.secondaries.push(SecondaryAcquisition {
                product_name: secondary.name.clone(),
                first_line_time: secondary.metadata.first_line_time,
            });
        }

        Product::new(
            format!("{}_Stack", primary.name),
            primary.product_type.clone(),
            bands,
            GeocodingState::Geocoded,
            metadata,
        )
    }

    fn subset(&self, params: &SubsetParams, input: &Product) -> SarResult<Product> {
        let window = input.pixel_window(&params.geo_region)?.ok_or_else(|| {
            SarError::EmptyIntersection(format!(
                "Region {} does not overlap {}",
                params.geo_region, input.name
            ))
        })?;
        let mut geometry = input.swath_geometry()?.clone();

        let rows = window.row..window.row + window.height;
        let cols = window.col..window.col + window.width;
        let mut bands = Vec::with_capacity(input.bands.len());
        for band in &input.bands {
            if band.height() < rows.end || band.width() < cols.end {
                return Err(SarError::Geometry(format!(
                    "Band {} ({}x{}) is smaller than the swath raster",
                    band.name,
                    band.width(),
                    band.height()
                )));
            }
            let data = band.data.slice(s![rows.clone(), cols.clone()]).to_owned();
            bands.push(Band::new(band.name.clone(), band.unit.clone(), data));
        }

        geometry.geo_transform = geometry.geo_transform.offset(window.col, window.row);
        geometry.width = window.width;
        geometry.height = window.height;
        log::debug!("Subset window {:?} of {}x{}", window, input.width, input.height);

        let mut metadata = input.metadata.clone();
        if let Some(swath) = metadata.swaths.keys().next().copied() {
            metadata.swaths.insert(swath, geometry);
        }
        if !params.copy_metadata {
            metadata.history.clear();
        }

        Product::new(
            format!("Subset_{}", input.name),
            input.product_type.clone(),
            bands,
            input.geocoding,
            metadata,
        )
    }

    fn coherence(&self, params: &CoherenceParams, input: &Product) -> SarResult<Product> {
        let geometry = input.swath_geometry().ok();
        let (win_az, win_rg) = effective_windows(params, geometry);
        log::info!("Estimating coherence on {} with a {}x{} window", input.name, win_az, win_rg);

        let mut bands = Vec::new();
        for pol in input.polarizations() {
            let primaries = input.complex_bands(*pol, Some(true));
            let Some((m_i, m_q, Some(StackRole::Primary { date: primary_date }))) = primaries.into_iter().next() else {
                return Err(SarError::Engine(format!(
                    "{} has no primary {} bands; coherence needs a co-registered stack",
                    input.name, pol
                )));
            };
            let secondaries = input.complex_bands(*pol, Some(false));
            if secondaries.is_empty() {
                return Err(SarError::Engine(format!(
                    "{} has no secondary {} bands; coherence needs a co-registered stack",
                    input.name, pol
                )));
            }
            let swath = m_i.band_name().map(|b| b.subswath).ok_or_else(|| {
                SarError::CorruptProduct(format!("Unparseable band name {}", m_i.name))
            })?;

            for (s_i, s_q, role) in secondaries {
                let Some(StackRole::Secondary { date: secondary_date, .. }) = role else { continue };
                let data = estimate_coherence(
                    (m_i.data.view(), m_q.data.view()),
                    (s_i.data.view(), s_q.data.view()),
                    win_az,
                    win_rg,
                )?;
                let name = format!("coh_{}_{}_{}_{}", swath, pol, primary_date, secondary_date);
                bands.push(Band::new(name, UNIT_COHERENCE, data));
            }
        }
        if bands.is_empty() {
            return Err(SarError::Engine(format!("{} produced no coherence bands", input.name)));
        }

        Product::new(
            format!("{}_Coh", input.name),
            "COH",
            bands,
            input.geocoding,
            input.metadata.clone(),
        )
    }
}

impl RasterEngine for LocalEngine {
    fn name(&self) -> &str {
        "local"
    }

    fn read_product(&self, path: &Path) -> SarResult<Product> {
        match path.extension().and_then(|e| e.to_str()) {
            Some("zip") => SlcReader::new(path)?.read_product(),
            Some("dim") => dimap::read_product(path),
            _ => Err(SarError::CorruptProduct(format!(
                "Unsupported product format: {}",
                path.display()
            ))),
        }
    }

    fn write_product(&self, product: &Product, path: &Path) -> SarResult<()> {
        dimap::write_product(product, path)
    }

    fn execute(&self, request: &OperatorRequest, inputs: &[&Product]) -> SarResult<Product> {
        let first = inputs
            .first()
            .copied()
            .ok_or_else(|| SarError::InvalidParameter(format!("{} needs an input product", request.kind())))?;
        let mut product = match request {
            OperatorRequest::ApplyOrbitFile(p) => self.apply_orbit_file(p, first)?,
            OperatorRequest::TopsarSplit(p) => self.topsar_split(p, first)?,
            OperatorRequest::BackGeocoding(p) => self.back_geocoding(p, inputs)?,
            OperatorRequest::Subset(p) => self.subset(p, first)?,
            OperatorRequest::Coherence(p) => self.coherence(p, first)?,
        };
        product.push_history(request.describe());
        Ok(product)
    }
}
