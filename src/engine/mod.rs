//! Raster engine implementations

pub mod coherence;
pub mod coregistration;
pub mod gpt;
pub mod local;

pub use gpt::GptEngine;
pub use local::LocalEngine;

use crate::core::gateway::RasterEngine;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::sync::Arc;

/// Which engine executes operators
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum EngineConfig {
    Local,
    Gpt {
        #[serde(default = "default_gpt_executable")]
        executable: PathBuf,
        #[serde(default)]
        args: Vec<String>,
    },
}

impl Default for EngineConfig {
    fn default() -> Self {
        EngineConfig::Local
    }
}

fn default_gpt_executable() -> PathBuf {
    PathBuf::from("gpt")
}

impl EngineConfig {
    pub fn build(&self) -> Arc<dyn RasterEngine> {
        match self {
            EngineConfig::Local => Arc::new(LocalEngine::new()),
            EngineConfig::Gpt { executable, args } => Arc::new(GptEngine::new(executable.clone(), args.clone())),
        }
    }
}
