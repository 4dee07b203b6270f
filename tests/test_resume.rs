mod common;

use common::{init_logging, synthetic_product, write_safe_zip, PRIMARY, ROI, SECONDARY};
use sarcoh::core::operators::{CoherenceParams, SubsetParams};
use sarcoh::io::dimap;
use sarcoh::pipeline::{CoherencePipeline, PipelineConfig, PipelineReport, StageKey, StageKind, StageRunner};
use sarcoh::{LocalEngine, OperatorGateway, OperatorRequest, RegionOfInterest, Subswath};
use std::collections::BTreeMap;
use std::path::Path;
use std::sync::Arc;
use tempfile::TempDir;

fn config(root: &Path) -> PipelineConfig {
    init_logging();
    let input = root.join("raw");
    if !input.exists() {
        std::fs::create_dir_all(&input).unwrap();
        write_safe_zip(&input, &PRIMARY);
        write_safe_zip(&input, &SECONDARY);
    }
    PipelineConfig::new(input, root.join("out"), RegionOfInterest::from_wkt(ROI).unwrap())
}

#[test]
fn test_second_run_resumes_every_stage() {
    let dir = TempDir::new().unwrap();
    let first = CoherencePipeline::new(config(dir.path())).unwrap().run().unwrap();
    assert_eq!(first.resumed_stages(), 0);

    let second = CoherencePipeline::new(config(dir.path())).unwrap().run().unwrap();
    assert_eq!(second.stages.len(), first.stages.len());
    assert!(second.stages.iter().all(|s| s.resumed));

    let a = first.results[0].product.as_ref().unwrap();
    let b = second.results[0].product.as_ref().unwrap();
    assert_eq!(a.bands, b.bands);
}

#[test]
fn test_resume_recomputes_missing_and_damaged_stages() {
    let dir = TempDir::new().unwrap();
    CoherencePipeline::new(config(dir.path())).unwrap().run().unwrap();
    let out = dir.path().join("out");

    std::fs::remove_file(out.join("coherence_IW2_0.dim")).unwrap();
    let subset_band = dimap::data_dir(&out.join("subset_IW2_0.dim")).join("i_IW2_VV_mst_03Jan2020.img");
    std::fs::write(&subset_band, b"truncated").unwrap();

    let report = CoherencePipeline::new(config(dir.path())).unwrap().run().unwrap();
    let recomputed: Vec<&str> = report
        .stages
        .iter()
        .filter(|s| !s.resumed)
        .map(|s| s.key.as_str())
        .collect();
    assert_eq!(recomputed, vec!["subset_IW2_0", "coherence_IW2_0"]);
    assert!(dimap::read_product(&out.join("subset_IW2_0.dim")).is_ok());
}

#[test]
fn test_resume_disabled_recomputes_everything() {
    let dir = TempDir::new().unwrap();
    CoherencePipeline::new(config(dir.path())).unwrap().run().unwrap();

    let mut cfg = config(dir.path());
    cfg.resume = false;
    let report = CoherencePipeline::new(cfg).unwrap().run().unwrap();
    assert_eq!(report.resumed_stages(), 0);
    assert_eq!(report.stages.len(), 7);
}

fn recomputed(report: &PipelineReport) -> Vec<&str> {
    report.stages.iter().filter(|s| !s.resumed).map(|s| s.key.as_str()).collect()
}

#[test]
fn test_changed_region_recomputes_downstream_stages() {
    let dir = TempDir::new().unwrap();
    let first = CoherencePipeline::new(config(dir.path())).unwrap().run().unwrap();
    let before = first.results[0].product.as_ref().unwrap();

    let mut cfg = config(dir.path());
    cfg.region_of_interest =
        RegionOfInterest::from_wkt("POLYGON((36.86 37.55, 36.86 37.58, 36.95 37.58, 36.95 37.55, 36.86 37.55))")
            .unwrap();
    let second = CoherencePipeline::new(cfg).unwrap().run().unwrap();
    assert_eq!(recomputed(&second), vec!["subset_IW2_0", "coherence_IW2_0"]);
    assert_eq!(second.resumed_stages(), 5);

    let after = second.results[0].product.as_ref().unwrap();
    assert!(after.width < before.width);
    assert!(after.height < before.height);
}

#[test]
fn test_changed_coherence_window_recomputes_only_coherence() {
    let dir = TempDir::new().unwrap();
    CoherencePipeline::new(config(dir.path())).unwrap().run().unwrap();

    let mut cfg = config(dir.path());
    cfg.coherence = CoherenceParams { coh_win_az: 5, coh_win_rg: 15, square_pixel: false };
    let report = CoherencePipeline::new(cfg).unwrap().run().unwrap();
    assert_eq!(recomputed(&report), vec!["coherence_IW2_0"]);

    // Back to the first settings: the coherence artifact no longer matches them
    let report = CoherencePipeline::new(config(dir.path())).unwrap().run().unwrap();
    assert_eq!(recomputed(&report), vec!["coherence_IW2_0"]);
}

fn snapshot(dim: &Path) -> BTreeMap<String, Vec<u8>> {
    let mut files = BTreeMap::new();
    files.insert("descriptor".to_string(), std::fs::read(dim).unwrap());
    for entry in std::fs::read_dir(dimap::data_dir(dim)).unwrap() {
        let path = entry.unwrap().path();
        files.insert(path.file_name().unwrap().to_string_lossy().into_owned(), std::fs::read(&path).unwrap());
    }
    files
}

#[test]
fn test_recomputing_same_stage_is_byte_identical() {
    init_logging();
    let dir = TempDir::new().unwrap();
    let gateway = Arc::new(OperatorGateway::new(Arc::new(LocalEngine::new())));
    let runner = StageRunner::new(gateway, dir.path(), false).unwrap();
    let product = synthetic_product("P", PRIMARY.start, 30639, 36.80, 40, 25);
    let request = OperatorRequest::Subset(SubsetParams {
        geo_region: RegionOfInterest::from_bounds(36.81, 37.63, 36.83, 37.645).unwrap(),
        copy_metadata: true,
    });
    let key = StageKey::new(StageKind::Subset, Some(Subswath::IW2), 0);

    let first = runner.run_stage(key, &request, &[&product]).unwrap();
    let written = snapshot(&first.path);
    let second = runner.run_stage(key, &request, &[&product]).unwrap();
    assert!(!first.resumed && !second.resumed);
    assert_eq!(second.path, first.path);
    assert_eq!(snapshot(&second.path), written);
    assert!(written.contains_key("i_IW2_VV.img"));
    assert_eq!(second.product.bands, first.product.bands);
}
