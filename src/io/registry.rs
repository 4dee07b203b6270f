//! Discovery and loading of raw acquisitions

use crate::core::gateway::RasterEngine;
use crate::core::product::Product;
use crate::io::acquisition::AcquisitionFile;
use crate::types::{SarError, SarResult};
use glob::{MatchOptions, Pattern};
use std::path::Path;
use std::sync::Arc;
use walkdir::WalkDir;

pub const DEFAULT_PATTERN: &str = "**/*S1*.zip";

const MATCH_OPTIONS: MatchOptions = MatchOptions {
    case_sensitive: true,
    require_literal_separator: true,
    require_literal_leading_dot: false,
};

fn compile_pattern(pattern: &str) -> SarResult<Pattern> {
    Pattern::new(pattern).map_err(|e| SarError::Config(format!("Invalid discovery pattern '{}': {}", pattern, e)))
}

pub struct ProductRegistry {
    engine: Arc<dyn RasterEngine>,
}

impl ProductRegistry {
    pub fn new(engine: Arc<dyn RasterEngine>) -> Self {
        Self { engine }
    }

    /// Find every archive under `root` whose relative path matches `pattern`, sorted by path
    pub fn discover(root: &Path, pattern: &str) -> SarResult<Vec<AcquisitionFile>> {
        if !root.is_dir() {
            return Err(SarError::Discovery(format!("{} is not a directory", root.display())));
        }
        let matcher = compile_pattern(pattern)?;

        let mut paths = Vec::new();
        for entry in WalkDir::new(root).follow_links(true) {
            let entry = entry.map_err(|e| SarError::Discovery(format!("Walking {}: {}", root.display(), e)))?;
            if !entry.file_type().is_file() {
                continue;
            }
            let Ok(relative) = entry.path().strip_prefix(root) else { continue };
            if matcher.matches_path_with(relative, MATCH_OPTIONS) {
                paths.push(entry.into_path());
            }
        }

        if paths.is_empty() {
            return Err(SarError::Discovery(format!(
                "No files matching '{}' under {}",
                pattern,
                root.display()
            )));
        }
        paths.sort();

        let files = paths
            .iter()
            .map(AcquisitionFile::parse)
            .collect::<SarResult<Vec<_>>>()?;
        log::info!("Discovered {} acquisitions under {}", files.len(), root.display());
        for file in &files {
            log::debug!(
                "  {} ({} {} orbit {}, track {})",
                file.product_name,
                file.mission,
                file.mode,
                file.absolute_orbit,
                file.relative_orbit()
            );
        }
        Ok(files)
    }

    pub fn parse_metadata(path: &Path) -> SarResult<AcquisitionFile> {
        AcquisitionFile::parse(path)
    }

    /// Open an acquisition through the engine
    pub fn load(&self, file: &AcquisitionFile) -> SarResult<Product> {
        log::info!("Loading {}", file.path.display());
        self.engine.read_product(&file.path).map_err(|e| match e {
            SarError::CorruptProduct(_) => e,
            other => SarError::CorruptProduct(format!("{}: {}", file.path.display(), other)),
        })
    }

    /// Discover and load in one ordered pass
    pub fn load_all(&self, root: &Path, pattern: &str) -> SarResult<Vec<(AcquisitionFile, Product)>> {
        Self::discover(root, pattern)?
            .into_iter()
            .map(|file| {
                let product = self.load(&file)?;
                Ok((file, product))
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pattern_matching() {
        let matches = |pattern: &str, path: &str| {
            compile_pattern(pattern).unwrap().matches_path_with(Path::new(path), MATCH_OPTIONS)
        };
        assert!(matches(DEFAULT_PATTERN, "S1A_x.zip"));
        assert!(matches(DEFAULT_PATTERN, "2020/01/S1A_x.zip"));
        assert!(!matches(DEFAULT_PATTERN, "S1A_x.zip.part"));
        assert!(!matches(DEFAULT_PATTERN, "S2A_x.zip"));

        assert!(matches("raw/S1?_*.zip", "raw/S1A_abc.zip"));
        assert!(!matches("raw/S1?_*.zip", "raw/nested/S1A_abc.zip"));

        assert!(matches!(compile_pattern("raw/[S1*.zip"), Err(SarError::Config(_))));
    }

    #[test]
    fn test_discover_missing_root() {
        let err = ProductRegistry::discover(Path::new("/definitely/not/here"), DEFAULT_PATTERN).unwrap_err();
        assert!(matches!(err, SarError::Discovery(_)));
    }
}
