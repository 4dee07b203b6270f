mod common;

use common::{write_safe_zip, PRIMARY, SECONDARY};
use sarcoh::core::RasterEngine;
use sarcoh::io::registry::DEFAULT_PATTERN;
use sarcoh::{LocalEngine, Polarization, ProductRegistry, SarError, Subswath};
use std::sync::Arc;
use tempfile::TempDir;

#[test]
fn test_discovery_is_sorted_and_filtered() {
    let dir = TempDir::new().unwrap();
    let nested = dir.path().join("2020").join("01");
    std::fs::create_dir_all(&nested).unwrap();
    write_safe_zip(&nested, &SECONDARY);
    write_safe_zip(dir.path(), &PRIMARY);
    std::fs::write(dir.path().join("README.txt"), "not an acquisition").unwrap();
    std::fs::write(dir.path().join("S1A_notes.zip.part"), "partial download").unwrap();

    let files = ProductRegistry::discover(dir.path(), DEFAULT_PATTERN).unwrap();
    assert_eq!(files.len(), 2);
    // Sorted by full path: "2020/..." sorts before the root-level archive
    assert_eq!(files[0].absolute_orbit, 30814);
    assert_eq!(files[1].absolute_orbit, 30639);
    assert!(files.iter().all(|f| f.mission == "S1A" && f.product_type == "SLC"));
    assert_eq!(files[0].relative_orbit(), files[1].relative_orbit());

    let top_level = ProductRegistry::discover(dir.path(), "*S1*.zip").unwrap();
    assert_eq!(top_level.len(), 1);
    assert_eq!(top_level[0].path, dir.path().join(PRIMARY.file_name));
}

#[test]
fn test_discovery_without_matches() {
    let dir = TempDir::new().unwrap();
    std::fs::write(dir.path().join("README.txt"), "nothing here").unwrap();
    assert!(matches!(
        ProductRegistry::discover(dir.path(), DEFAULT_PATTERN),
        Err(SarError::Discovery(_))
    ));
}

#[test]
fn test_malformed_name_is_reported() {
    let dir = TempDir::new().unwrap();
    std::fs::write(dir.path().join("S1A_IW_SLC_broken.zip"), "junk").unwrap();
    let err = ProductRegistry::discover(dir.path(), DEFAULT_PATTERN).unwrap_err();
    assert!(matches!(err, SarError::MetadataFormat(_)));
    assert!(err.to_string().contains("S1A_IW_SLC_broken.zip"));
}

#[test]
fn test_load_archive_through_engine() {
    let dir = TempDir::new().unwrap();
    write_safe_zip(dir.path(), &PRIMARY);
    let engine: Arc<dyn RasterEngine> = Arc::new(LocalEngine::new());
    let registry = ProductRegistry::new(engine);

    let loaded = registry.load_all(dir.path(), DEFAULT_PATTERN).unwrap();
    assert_eq!(loaded.len(), 1);
    let (file, product) = &loaded[0];
    assert_eq!(product.name, file.product_name);
    assert_eq!(product.subswaths(), vec![Subswath::IW1, Subswath::IW2]);
    assert_eq!(product.polarizations(), &[Polarization::VV, Polarization::VH]);
    assert_eq!(product.bands.len(), 8);
    assert_eq!(product.metadata.absolute_orbit, 30639);
    assert_eq!(product.metadata.relative_orbit(), 117);

    let iw2 = product.metadata.swaths.get(&Subswath::IW2).unwrap();
    assert_eq!((iw2.width, iw2.height, iw2.burst_count), (300, 150, 3));
    assert_eq!(product.band("i_IW2_VV").unwrap().data.dim(), (150, 300));
}

#[test]
fn test_unreadable_archive_is_corrupt() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join(PRIMARY.file_name);
    std::fs::write(&path, "truncated download").unwrap();
    let registry = ProductRegistry::new(Arc::new(LocalEngine::new()));
    let file = ProductRegistry::parse_metadata(&path).unwrap();
    assert!(matches!(registry.load(&file), Err(SarError::CorruptProduct(_))));
}
