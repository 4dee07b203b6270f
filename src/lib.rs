//! sarcoh: A Staged Sentinel-1 Interferometric Coherence Pipeline
//!
//! Discovers Sentinel-1 SLC acquisitions, runs them through orbit correction,
//! sub-swath split, back-geocoding, subset and coherence estimation, and
//! checkpoints every intermediate product so interrupted runs can resume.

pub mod types;
pub mod io;
pub mod core;
pub mod engine;
pub mod pipeline;

#[cfg(feature = "python")]
mod python;

// Re-export main types and functions for easier access
pub use types::{
    AcquisitionMode, BoundingBox, GeoTransform, GeocodingState, Polarization, SarError, SarResult,
    Subswath,
};

pub use core::{OperatorGateway, OperatorKind, OperatorRequest, Product, RasterEngine, RegionOfInterest};
pub use engine::{EngineConfig, GptEngine, LocalEngine};
pub use io::{AcquisitionFile, ProductRegistry, SlcReader};
pub use pipeline::{run_pipeline, CoherencePipeline, PairingStrategy, PipelineConfig, PipelineReport};
