//! End-to-end coherence pipeline
//!
//! discover -> load + orbit -> per sub-swath: split -> pair -> back-geocode
//! -> subset -> coherence. Every step is a checkpointed stage.

use crate::core::gateway::{OperatorGateway, RasterEngine};
use crate::core::operators::{OperatorRequest, SplitParams};
use crate::core::product::Product;
use crate::io::acquisition::AcquisitionFile;
use crate::io::registry::ProductRegistry;
use crate::pipeline::config::PipelineConfig;
use crate::pipeline::pairing::{resolve_pairs, PairingPolicy};
use crate::pipeline::region::RegionSelector;
use crate::pipeline::stage::{lineage, source_id, StageKey, StageKind, StageRecord, StageRunner};
use crate::types::{SarError, SarResult, Subswath};
use rayon::prelude::*;
use serde::Serialize;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Instant;

/// Final coherence product of one pair
#[derive(Debug, Serialize)]
pub struct CoherenceOutput {
    pub subswath: Subswath,
    pub pair_index: usize,
    pub primary: String,
    pub secondary: String,
    pub path: PathBuf,
    pub bands: Vec<String>,
    #[serde(skip)]
    pub product: Option<Product>,
}

#[derive(Debug, Serialize)]
pub struct PipelineReport {
    pub acquisitions: Vec<AcquisitionFile>,
    pub stages: Vec<StageRecord>,
    pub results: Vec<CoherenceOutput>,
}

impl PipelineReport {
    pub fn resumed_stages(&self) -> usize {
        self.stages.iter().filter(|s| s.resumed).count()
    }
}

pub struct CoherencePipeline {
    config: PipelineConfig,
    gateway: Arc<OperatorGateway>,
    registry: ProductRegistry,
    pairing: Box<dyn PairingPolicy + Send + Sync>,
}

impl CoherencePipeline {
    /// Build the pipeline with the engine named in the configuration
    pub fn new(config: PipelineConfig) -> SarResult<Self> {
        let engine = config.engine.build();
        Self::with_engine(config, engine)
    }

    pub fn with_engine(config: PipelineConfig, engine: Arc<dyn RasterEngine>) -> SarResult<Self> {
        config.validate()?;
        let gateway = Arc::new(
            OperatorGateway::new(engine.clone()).with_serialized_heavy_operators(config.serialize_heavy_operators),
        );
        Ok(Self {
            pairing: Box::new(config.pairing),
            registry: ProductRegistry::new(engine),
            gateway,
            config,
        })
    }

    /// Replace the configured pairing strategy
    pub fn with_pairing_policy(mut self, policy: impl PairingPolicy + Send + Sync + 'static) -> Self {
        self.pairing = Box::new(policy);
        self
    }

    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    pub fn run(&self) -> SarResult<PipelineReport> {
        let start = Instant::now();
        log::info!(
            "Coherence pipeline: {} -> {} ({} engine)",
            self.config.input_root.display(),
            self.config.output_root.display(),
            self.gateway.engine().name()
        );

        let acquisitions = ProductRegistry::discover(&self.config.input_root, &self.config.pattern)?;
        let stages = StageRunner::new(self.gateway.clone(), &self.config.output_root, self.config.resume)?;

        let orbit_products = self.orbit_stage(&stages, &acquisitions)?;

        let subswaths = &self.config.subswaths;
        let workers = self.config.max_parallel_subswaths.min(subswaths.len());
        let per_swath: Vec<Vec<CoherenceOutput>> = if workers > 1 {
            let pool = rayon::ThreadPoolBuilder::new()
                .num_threads(workers)
                .build()
                .map_err(|e| SarError::Config(format!("Cannot build worker pool: {}", e)))?;
            pool.install(|| {
                subswaths
                    .par_iter()
                    .map(|swath| self.run_subswath(&stages, *swath, &orbit_products))
                    .collect::<SarResult<Vec<_>>>()
            })?
        } else {
            subswaths
                .iter()
                .map(|swath| self.run_subswath(&stages, *swath, &orbit_products))
                .collect::<SarResult<Vec<_>>>()?
        };

        let report = PipelineReport {
            acquisitions,
            stages: stages.journal(),
            results: per_swath.into_iter().flatten().collect(),
        };
        log::info!(
            "Pipeline finished in {:?}: {} coherence products, {} stages ({} resumed)",
            start.elapsed(),
            report.results.len(),
            report.stages.len(),
            report.resumed_stages()
        );
        Ok(report)
    }

    fn orbit_stage(&self, stages: &StageRunner, acquisitions: &[AcquisitionFile]) -> SarResult<Vec<Product>> {
        let request = OperatorRequest::ApplyOrbitFile(self.config.orbit.clone());
        acquisitions
            .iter()
            .enumerate()
            .map(|(i, file)| {
                let key = StageKey::new(StageKind::OrbitApplied, None, i);
                let fingerprint = lineage(&request.describe(), &[file.path.display().to_string()]);
                let outcome = stages.run_stage_with(key, &fingerprint, || {
                    let raw = self.registry.load(file)?;
                    self.gateway.execute(&request, &[&raw])
                })?;
                Ok(outcome.product)
            })
            .collect()
    }

    fn run_subswath(
        &self,
        stages: &StageRunner,
        swath: Subswath,
        orbit_products: &[Product],
    ) -> SarResult<Vec<CoherenceOutput>> {
        log::info!("Processing sub-swath {}", swath);

        let split_request = OperatorRequest::TopsarSplit(SplitParams {
            subswath: swath,
            polarizations: self.config.polarizations.clone(),
            first_burst_index: None,
            last_burst_index: None,
        });
        let split_products = orbit_products
            .iter()
            .enumerate()
            .map(|(i, product)| {
                let key = StageKey::new(StageKind::Split, Some(swath), i);
                stages.run_stage(key, &split_request, &[product]).map(|o| o.product)
            })
            .collect::<SarResult<Vec<_>>>()?;

        let pairs = resolve_pairs(&split_products, self.pairing.as_ref()).map_err(|e| SarError::Stage {
            key: format!("pair_{}", swath),
            source: Box::new(e),
        })?;
        let back_geocoding = OperatorRequest::BackGeocoding(self.config.back_geocoding.clone());
        let coherence = OperatorRequest::Coherence(self.config.coherence);
        let selector = RegionSelector::new(&self.gateway, self.config.region_of_interest.clone());

        let mut outputs = Vec::with_capacity(pairs.len());
        for (idx, pair) in pairs.iter().enumerate() {
            let stack = stages
                .run_stage(
                    StageKey::new(StageKind::BackGeocoded, Some(swath), idx),
                    &back_geocoding,
                    &[pair.primary, pair.secondary],
                )?
                .product;
            let subset_fingerprint = lineage(&selector.request().describe(), &[source_id(&stack)]);
            let subset = stages
                .run_stage_with(StageKey::new(StageKind::Subset, Some(swath), idx), &subset_fingerprint, || {
                    selector.crop(&stack)
                })?
                .product;
            let result = stages.run_stage(
                StageKey::new(StageKind::Coherence, Some(swath), idx),
                &coherence,
                &[&subset],
            )?;

            outputs.push(CoherenceOutput {
                subswath: swath,
                pair_index: idx,
                primary: pair.primary.name.clone(),
                secondary: pair.secondary.name.clone(),
                path: result.path,
                bands: result.product.band_names(),
                product: Some(result.product),
            });
        }
        Ok(outputs)
    }
}

/// Run the pipeline described by `config`
pub fn run_pipeline(config: PipelineConfig) -> SarResult<PipelineReport> {
    CoherencePipeline::new(config)?.run()
}
