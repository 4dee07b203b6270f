//! Checkpointed stage execution
//!
//! Every stage output is written to the output directory under a name
//! derived from its [`StageKey`] and read back before anything consumes it.

use crate::core::gateway::OperatorGateway;
use crate::core::operators::{OperatorKind, OperatorRequest};
use crate::core::product::Product;
use crate::io::dimap;
use crate::types::{SarError, SarResult, Subswath};
use serde::Serialize;
use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use std::time::Instant;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum StageKind {
    OrbitApplied,
    Split,
    BackGeocoded,
    Subset,
    Coherence,
}

impl StageKind {
    pub fn label(&self) -> &'static str {
        match self {
            StageKind::OrbitApplied => "orbit_applied",
            StageKind::Split => "split",
            StageKind::BackGeocoded => "BGC",
            StageKind::Subset => "subset",
            StageKind::Coherence => "coherence",
        }
    }

    pub fn operator(&self) -> OperatorKind {
        match self {
            StageKind::OrbitApplied => OperatorKind::ApplyOrbitFile,
            StageKind::Split => OperatorKind::TopsarSplit,
            StageKind::BackGeocoded => OperatorKind::BackGeocoding,
            StageKind::Subset => OperatorKind::Subset,
            StageKind::Coherence => OperatorKind::Coherence,
        }
    }
}

/// Identity of one stage output: `{label}_{subswath?}_{index}`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub struct StageKey {
    pub kind: StageKind,
    pub subswath: Option<Subswath>,
    pub index: usize,
}

impl StageKey {
    pub fn new(kind: StageKind, subswath: Option<Subswath>, index: usize) -> Self {
        Self { kind, subswath, index }
    }

    pub fn file_name(&self) -> String {
        format!("{}.dim", self)
    }
}

impl fmt::Display for StageKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.subswath {
            Some(swath) => write!(f, "{}_{}_{}", self.kind.label(), swath, self.index),
            None => write!(f, "{}_{}", self.kind.label(), self.index),
        }
    }
}

/// A persisted stage output, reloaded from disk
#[derive(Debug)]
pub struct StageOutcome {
    pub key: StageKey,
    pub path: PathBuf,
    pub product: Product,
    pub resumed: bool,
}

#[derive(Debug, Clone, Serialize)]
pub struct StageRecord {
    pub key: String,
    pub path: PathBuf,
    pub resumed: bool,
}

pub struct StageRunner {
    gateway: Arc<OperatorGateway>,
    output_dir: PathBuf,
    resume: bool,
    journal: Mutex<Vec<StageRecord>>,
}

impl StageRunner {
    pub fn new(gateway: Arc<OperatorGateway>, output_dir: impl Into<PathBuf>, resume: bool) -> SarResult<Self> {
        let output_dir = output_dir.into();
        std::fs::create_dir_all(&output_dir).map_err(|e| SarError::StageWrite {
            path: output_dir.clone(),
            message: e.to_string(),
        })?;
        Ok(Self { gateway, output_dir, resume, journal: Mutex::new(Vec::new()) })
    }

    pub fn gateway(&self) -> &OperatorGateway {
        &self.gateway
    }

    pub fn output_dir(&self) -> &Path {
        &self.output_dir
    }

    pub fn path_for(&self, key: &StageKey) -> PathBuf {
        self.output_dir.join(key.file_name())
    }

    /// Run an operator through the gateway and checkpoint its output
    pub fn run_stage(&self, key: StageKey, request: &OperatorRequest, inputs: &[&Product]) -> SarResult<StageOutcome> {
        if request.kind() != key.kind.operator() {
            return Err(SarError::Stage {
                key: key.to_string(),
                source: Box::new(SarError::InvalidParameter(format!(
                    "Stage {} cannot run operator {}",
                    key.kind.label(),
                    request.kind()
                ))),
            });
        }
        let sources: Vec<String> = inputs.iter().map(|p| source_id(p)).collect();
        let fingerprint = lineage(&request.describe(), &sources);
        self.run_stage_with(key, &fingerprint, || self.gateway.execute(request, inputs))
    }

    /// Checkpoint the product built by `produce`
    ///
    /// With resume enabled an existing artifact is reused only when it was
    /// built with the same `fingerprint`; see [`lineage`].
    pub fn run_stage_with<F>(&self, key: StageKey, fingerprint: &str, produce: F) -> SarResult<StageOutcome>
    where
        F: FnOnce() -> SarResult<Product>,
    {
        self.checkpoint(key, fingerprint, produce).map_err(|e| SarError::Stage {
            key: key.to_string(),
            source: Box::new(e),
        })
    }

    fn checkpoint<F>(&self, key: StageKey, fingerprint: &str, produce: F) -> SarResult<StageOutcome>
    where
        F: FnOnce() -> SarResult<Product>,
    {
        let path = self.path_for(&key);
        let engine = self.gateway.engine();

        if self.resume && dimap::artifact_exists(&path) {
            match engine.read_product(&path) {
                Ok(product) if product.fingerprint.as_deref() == Some(fingerprint) => {
                    log::info!("Stage {}: resuming from {}", key, path.display());
                    return Ok(self.record(key, path, product, true));
                }
                Ok(_) => log::info!("Stage {}: operation or inputs changed since {}, recomputing", key, path.display()),
                Err(e) => log::warn!("Stage {}: existing artifact unreadable ({}), recomputing", key, e),
            }
        }

        log::info!("Stage {}: running {}", key, key.kind.operator());
        let start = Instant::now();
        let mut product = produce()?;
        product.fingerprint = Some(fingerprint.to_string());

        engine.write_product(&product, &path).map_err(|e| SarError::StageWrite {
            path: path.clone(),
            message: e.to_string(),
        })?;
        let reloaded = engine.read_product(&path).map_err(|e| SarError::StageRead {
            path: path.clone(),
            message: e.to_string(),
        })?;
        log::info!(
            "Stage {}: wrote {} ({}x{}, {} bands) in {:?}",
            key,
            path.display(),
            reloaded.width,
            reloaded.height,
            reloaded.bands.len(),
            start.elapsed()
        );
        Ok(self.record(key, path, reloaded, false))
    }

    fn record(&self, key: StageKey, path: PathBuf, product: Product, resumed: bool) -> StageOutcome {
        let mut journal = self.journal.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
        journal.push(StageRecord { key: key.to_string(), path: path.clone(), resumed });
        StageOutcome { key, path, product, resumed }
    }

    /// Artifacts written or resumed so far, in completion order
    pub fn journal(&self) -> Vec<StageRecord> {
        self.journal.lock().unwrap_or_else(|poisoned| poisoned.into_inner()).clone()
    }
}

/// Fingerprint of a stage: the operation applied to its sources
///
/// `Subset(copyMetadata=true, geoRegion=...) <- [Back-Geocoding(...) <- [...]]`
pub fn lineage(operation: &str, sources: &[String]) -> String {
    format!("{} <- [{}]", operation, sources.join("; "))
}

/// How a stage input is identified in a downstream fingerprint
pub fn source_id(product: &Product) -> String {
    match (&product.fingerprint, &product.location) {
        (Some(fingerprint), _) => fingerprint.clone(),
        (None, Some(path)) => path.display().to_string(),
        (None, None) => product.name.clone(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_stage_key_names() {
        assert_eq!(StageKey::new(StageKind::OrbitApplied, None, 1).file_name(), "orbit_applied_1.dim");
        assert_eq!(StageKey::new(StageKind::Split, Some(Subswath::IW2), 0).to_string(), "split_IW2_0");
        assert_eq!(StageKey::new(StageKind::BackGeocoded, Some(Subswath::IW2), 0).to_string(), "BGC_IW2_0");
    }

    #[test]
    fn test_lineage_nests_sources() {
        let split = lineage("TOPSAR-Split(subswath=IW2)", &["/raw/a.zip".to_string()]);
        assert_eq!(split, "TOPSAR-Split(subswath=IW2) <- [/raw/a.zip]");
        let stack = lineage("Back-Geocoding()", &[split.clone(), split.replace("a.zip", "b.zip")]);
        assert_eq!(
            stack,
            "Back-Geocoding() <- [TOPSAR-Split(subswath=IW2) <- [/raw/a.zip]; TOPSAR-Split(subswath=IW2) <- [/raw/b.zip]]"
        );
    }
}
