mod common;

use common::{init_logging, write_safe_zip, PRIMARY, ROI, SECONDARY};
use sarcoh::io::dimap;
use sarcoh::pipeline::{CoherencePipeline, PipelineConfig, StageKind};
use sarcoh::{GeocodingState, RegionOfInterest, SarError, Subswath};
use tempfile::TempDir;

fn setup() -> (TempDir, PipelineConfig) {
    init_logging();
    let dir = TempDir::new().unwrap();
    let input = dir.path().join("raw");
    std::fs::create_dir_all(&input).unwrap();
    write_safe_zip(&input, &PRIMARY);
    write_safe_zip(&input, &SECONDARY);
    let config = PipelineConfig::new(&input, dir.path().join("out"), RegionOfInterest::from_wkt(ROI).unwrap());
    (dir, config)
}

#[test]
fn test_two_acquisitions_to_coherence() {
    let (dir, config) = setup();
    let report = CoherencePipeline::new(config).unwrap().run().unwrap();
    let out = dir.path().join("out");

    assert_eq!(report.acquisitions.len(), 2);
    let keys: Vec<&str> = report.stages.iter().map(|s| s.key.as_str()).collect();
    assert_eq!(
        keys,
        vec![
            "orbit_applied_0",
            "orbit_applied_1",
            "split_IW2_0",
            "split_IW2_1",
            "BGC_IW2_0",
            "subset_IW2_0",
            "coherence_IW2_0",
        ]
    );
    assert!(report.stages.iter().all(|s| !s.resumed));
    for key in &keys {
        assert!(dimap::artifact_exists(&out.join(format!("{}.dim", key))), "{} missing", key);
    }

    assert_eq!(report.results.len(), 1);
    let result = &report.results[0];
    assert_eq!(result.subswath, Subswath::IW2);
    assert_eq!(result.path, out.join("coherence_IW2_0.dim"));
    assert!(result.primary.contains("20200103"));
    assert!(result.secondary.contains("20200115"));

    let coherence = dimap::read_product(&result.path).unwrap();
    // ROI spans lon 36.84..36.99 and lat 37.54..37.60 on a 0.001 degree grid
    assert_eq!((coherence.width, coherence.height), (151, 61));
    assert_eq!(coherence.product_type, "COH");
    assert_eq!(coherence.geocoding, GeocodingState::Geocoded);
    assert_eq!(coherence.metadata.secondaries.len(), 1);
    for name in ["coh_IW2_VV_03Jan2020_15Jan2020", "coh_IW2_VH_03Jan2020_15Jan2020"] {
        let band = coherence.band(name).unwrap_or_else(|| panic!("{} missing", name));
        assert!(band.data.iter().all(|&v| (0.0..=1.0).contains(&v)));
        // Both acquisitions image the same scene, so the stack is fully coherent
        assert!(band.data.iter().all(|&v| v > 0.99), "{} not coherent", name);
    }

    let history = &coherence.metadata.history;
    assert_eq!(history.len(), 5);
    assert!(history[0].starts_with("Apply-Orbit-File("));
    assert!(history[4].starts_with("Coherence("));
}

#[test]
fn test_split_keeps_only_the_selected_swath() {
    let (dir, config) = setup();
    CoherencePipeline::new(config).unwrap().run().unwrap();
    let split = dimap::read_product(&dir.path().join("out").join("split_IW2_0.dim")).unwrap();
    assert_eq!(split.subswaths(), vec![Subswath::IW2]);
    assert_eq!((split.width, split.height), (300, 150));
    assert_eq!(split.bands.len(), 4);

    let orbit = dimap::read_product(&dir.path().join("out").join("orbit_applied_0.dim")).unwrap();
    assert_eq!(orbit.subswaths(), vec![Subswath::IW1, Subswath::IW2]);
    assert_eq!(orbit.geocoding, GeocodingState::OrbitCorrected);
}

#[test]
fn test_two_subswaths_in_parallel() {
    let (dir, mut config) = setup();
    config.subswaths = vec![Subswath::IW1, Subswath::IW2];
    config.max_parallel_subswaths = 2;
    config.region_of_interest = RegionOfInterest::from_bounds(36.50, 37.55, 37.0, 37.60).unwrap();
    let report = CoherencePipeline::new(config).unwrap().run().unwrap();

    let mut swaths: Vec<Subswath> = report.results.iter().map(|r| r.subswath).collect();
    swaths.sort();
    assert_eq!(swaths, vec![Subswath::IW1, Subswath::IW2]);
    assert!(dir.path().join("out").join("coherence_IW1_0.dim").is_file());
    assert!(dir.path().join("out").join("coherence_IW2_0.dim").is_file());
}

#[test]
fn test_region_outside_scene_fails_at_subset() {
    let (_dir, mut config) = setup();
    config.region_of_interest = RegionOfInterest::from_bounds(10.0, 45.0, 10.5, 45.5).unwrap();
    let err = CoherencePipeline::new(config).unwrap().run().unwrap_err();
    match &err {
        SarError::Stage { key, .. } => assert_eq!(key, "subset_IW2_0"),
        other => panic!("unexpected error {:?}", other),
    }
    assert!(matches!(err.root_cause(), SarError::EmptyIntersection(_)));
}

#[test]
fn test_single_acquisition_is_insufficient() {
    let dir = TempDir::new().unwrap();
    write_safe_zip(dir.path(), &PRIMARY);
    let config = PipelineConfig::new(dir.path(), dir.path().join("out"), RegionOfInterest::from_wkt(ROI).unwrap());
    let err = CoherencePipeline::new(config).unwrap().run().unwrap_err();
    match &err {
        SarError::Stage { key, .. } => assert_eq!(key, "pair_IW2"),
        other => panic!("unexpected error {:?}", other),
    }
    assert!(matches!(err.root_cause(), SarError::InsufficientAcquisitions(_)));
}

#[test]
fn test_stage_labels() {
    assert_eq!(StageKind::BackGeocoded.label(), "BGC");
    assert_eq!(StageKind::Coherence.label(), "coherence");
}
