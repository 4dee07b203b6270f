//! Staged coherence pipeline: checkpointing, pairing, cropping and orchestration

pub mod config;
pub mod pairing;
pub mod region;
pub mod runner;
pub mod stage;

pub use config::PipelineConfig;
pub use pairing::{resolve_pairs, InterferometricPair, PairingPolicy, PairingStrategy};
pub use region::RegionSelector;
pub use runner::{run_pipeline, CoherenceOutput, CoherencePipeline, PipelineReport};
pub use stage::{StageKey, StageKind, StageOutcome, StageRecord, StageRunner};
