//! Pipeline configuration
//!
//! Loaded from JSON. Only the input and output roots and the region of
//! interest are required; everything else defaults to the classic IW2
//! VV+VH coherence run.

use crate::core::geometry::RegionOfInterest;
use crate::core::operators::{
    BackGeocodingParams, CoherenceParams, OperatorKind, OperatorRequest, OrbitParams,
};
use crate::engine::EngineConfig;
use crate::io::registry::DEFAULT_PATTERN;
use crate::pipeline::pairing::PairingStrategy;
use crate::types::{Polarization, SarError, SarResult, Subswath};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PipelineConfig {
    pub input_root: PathBuf,
    pub output_root: PathBuf,
    #[serde(default = "default_pattern")]
    pub pattern: String,
    pub region_of_interest: RegionOfInterest,
    #[serde(default = "default_subswaths")]
    pub subswaths: Vec<Subswath>,
    #[serde(default = "default_polarizations")]
    pub polarizations: Vec<Polarization>,
    #[serde(default)]
    pub pairing: PairingStrategy,
    #[serde(default)]
    pub orbit: OrbitParams,
    #[serde(default)]
    pub back_geocoding: BackGeocodingParams,
    #[serde(default)]
    pub coherence: CoherenceParams,
    #[serde(default = "default_true")]
    pub resume: bool,
    #[serde(default = "default_parallel_subswaths")]
    pub max_parallel_subswaths: usize,
    #[serde(default)]
    pub serialize_heavy_operators: bool,
    #[serde(default)]
    pub engine: EngineConfig,
}

fn default_pattern() -> String {
    DEFAULT_PATTERN.to_string()
}

fn default_subswaths() -> Vec<Subswath> {
    vec![Subswath::IW2]
}

fn default_polarizations() -> Vec<Polarization> {
    vec![Polarization::VV, Polarization::VH]
}

fn default_true() -> bool {
    true
}

fn default_parallel_subswaths() -> usize {
    1
}

impl PipelineConfig {
    pub fn new(input_root: impl Into<PathBuf>, output_root: impl Into<PathBuf>, roi: RegionOfInterest) -> Self {
        Self {
            input_root: input_root.into(),
            output_root: output_root.into(),
            pattern: default_pattern(),
            region_of_interest: roi,
            subswaths: default_subswaths(),
            polarizations: default_polarizations(),
            pairing: PairingStrategy::default(),
            orbit: OrbitParams::default(),
            back_geocoding: BackGeocodingParams::default(),
            coherence: CoherenceParams::default(),
            resume: true,
            max_parallel_subswaths: default_parallel_subswaths(),
            serialize_heavy_operators: false,
            engine: EngineConfig::default(),
        }
    }

    pub fn from_json(text: &str) -> SarResult<Self> {
        let config: Self =
            serde_json::from_str(text).map_err(|e| SarError::Config(format!("Invalid configuration: {}", e)))?;
        config.validate()?;
        Ok(config)
    }

    pub fn from_file(path: &Path) -> SarResult<Self> {
        let text = std::fs::read_to_string(path)
            .map_err(|e| SarError::Config(format!("Cannot read {}: {}", path.display(), e)))?;
        Self::from_json(&text)
    }

    pub fn to_json(&self) -> SarResult<String> {
        serde_json::to_string_pretty(self).map_err(|e| SarError::Config(e.to_string()))
    }

    pub fn validate(&self) -> SarResult<()> {
        if self.subswaths.is_empty() {
            return Err(SarError::Config("At least one sub-swath must be selected".to_string()));
        }
        if self.polarizations.is_empty() {
            return Err(SarError::Config("At least one polarization must be selected".to_string()));
        }
        if self.max_parallel_subswaths == 0 {
            return Err(SarError::Config("max_parallel_subswaths must be at least 1".to_string()));
        }
        if self.pattern.trim().is_empty() {
            return Err(SarError::Config("Discovery pattern is empty".to_string()));
        }
        if let PairingStrategy::MaxTemporalBaseline { days } = self.pairing {
            if days < 0 {
                return Err(SarError::Config(format!("Temporal baseline of {} days is negative", days)));
            }
        }

        // Operator parameters go through the same schema checks the gateway applies
        let requests = [
            OperatorRequest::ApplyOrbitFile(self.orbit.clone()),
            OperatorRequest::BackGeocoding(self.back_geocoding.clone()),
            OperatorRequest::Coherence(self.coherence),
        ];
        for request in &requests {
            let kind: OperatorKind = request.kind();
            OperatorRequest::from_parameters(kind, &request.parameters())
                .map_err(|e| SarError::Config(format!("{} parameters: {}", kind, e)))?;
        }
        Ok(())
    }
}
