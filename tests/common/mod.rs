//! Synthetic Sentinel-1 fixtures shared by the integration tests
#![allow(dead_code)]

use chrono::{DateTime, NaiveDateTime, Utc};
use ndarray::Array2;
use sarcoh::core::product::{AbstractedMetadata, Band, Product, SwathGeometry, UNIT_IMAGINARY, UNIT_REAL};
use sarcoh::{AcquisitionMode, GeoTransform, GeocodingState, Polarization, Subswath};
use std::collections::BTreeMap;
use std::io::{Cursor, Write};
use std::path::{Path, PathBuf};
use tiff::encoder::{colortype, TiffEncoder};
use zip::write::FileOptions;
use zip::ZipWriter;

/// Route library logging through the test harness
pub fn init_logging() {
    let _ = env_logger::builder().is_test(true).try_init();
}

pub const PIXEL_DEG: f64 = 0.001;
pub const TOP_LAT: f64 = 37.65;
pub const LINES: usize = 150;
pub const BURSTS: usize = 3;

/// One synthetic acquisition
#[derive(Debug, Clone)]
pub struct Scene {
    pub file_name: &'static str,
    pub start: &'static str,
    pub stop: &'static str,
    pub absolute_orbit: u32,
    /// Longitude shift applied to every sub-swath
    pub lon_shift: f64,
}

pub const PRIMARY: Scene = Scene {
    file_name: "S1A_IW_SLC__1SDV_20200103T170815_20200103T170842_030639_0382D5_DADE.zip",
    start: "2020-01-03T17:08:16.618328",
    stop: "2020-01-03T17:08:42.574658",
    absolute_orbit: 30639,
    lon_shift: 0.0,
};

pub const SECONDARY: Scene = Scene {
    file_name: "S1A_IW_SLC__1SDV_20200115T170815_20200115T170842_030814_038A4B_1F2C.zip",
    start: "2020-01-15T17:08:16.402117",
    stop: "2020-01-15T17:08:42.358446",
    absolute_orbit: 30814,
    lon_shift: 0.002,
};

pub const THIRD: Scene = Scene {
    file_name: "S1A_IW_SLC__1SDV_20200127T170815_20200127T170842_030989_0390C1_77E0.zip",
    start: "2020-01-27T17:08:15.981332",
    stop: "2020-01-27T17:08:41.937660",
    absolute_orbit: 30989,
    lon_shift: 0.001,
};

/// Western longitude and width of each synthetic sub-swath
pub fn swath_layout(swath: Subswath) -> (f64, usize) {
    match swath {
        Subswath::IW1 => (36.50, 120),
        _ => (36.80, 300),
    }
}

/// Scene reflectivity as a function of ground position, so shifted
/// acquisitions see the same signal once co-registered
pub fn reflectivity(lon: f64, lat: f64) -> f32 {
    (2.0 + (lon * 700.0).sin() * (lat * 900.0).cos() + 0.5 * (lon * 1300.0 + lat * 400.0).sin()) as f32
}

fn annotation_xml(scene: &Scene, swath: Subswath, pol: Polarization) -> String {
    let (west, width) = swath_layout(swath);
    let west = west + scene.lon_shift;
    let mut points = String::new();
    for line in [0, LINES - 1] {
        for pixel in [0, width / 2, width - 1] {
            let incidence = 30.0 + 16.0 * pixel as f64 / (width - 1) as f64;
            points.push_str(&format!(
                "<geolocationGridPoint><azimuthTime>{}</azimuthTime><line>{}</line><pixel>{}</pixel>\
                 <latitude>{:.6}</latitude><longitude>{:.6}</longitude><height>0</height>\
                 <incidenceAngle>{:.3}</incidenceAngle></geolocationGridPoint>",
                scene.start,
                line,
                pixel,
                TOP_LAT - PIXEL_DEG * line as f64,
                west + PIXEL_DEG * pixel as f64,
                incidence
            ));
        }
    }
    let bursts: String = (0..BURSTS)
        .map(|b| format!("<burst><azimuthTime>{}</azimuthTime><byteOffset>{}</byteOffset></burst>", scene.start, b))
        .collect();
    format!(
        r#"<?xml version="1.0" encoding="UTF-8"?>
<product>
  <adsHeader>
    <missionId>S1A</missionId>
    <productType>SLC</productType>
    <polarisation>{pol}</polarisation>
    <mode>IW</mode>
    <swath>{swath}</swath>
    <startTime>{start}</startTime>
    <stopTime>{stop}</stopTime>
    <absoluteOrbitNumber>{orbit}</absoluteOrbitNumber>
  </adsHeader>
  <imageAnnotation>
    <imageInformation>
      <numberOfSamples>{width}</numberOfSamples>
      <numberOfLines>{lines}</numberOfLines>
      <rangePixelSpacing>2.329562</rangePixelSpacing>
      <azimuthPixelSpacing>13.93056</azimuthPixelSpacing>
    </imageInformation>
  </imageAnnotation>
  <swathTiming>
    <linesPerBurst>{per_burst}</linesPerBurst>
    <burstList count="{bursts_count}">{bursts}</burstList>
  </swathTiming>
  <geolocationGrid>
    <geolocationGridPointList count="6">{points}</geolocationGridPointList>
  </geolocationGrid>
</product>"#,
        pol = pol,
        swath = swath,
        start = scene.start,
        stop = scene.stop,
        orbit = scene.absolute_orbit,
        width = width,
        lines = LINES,
        per_burst = LINES / BURSTS,
        bursts_count = BURSTS,
        bursts = bursts,
        points = points,
    )
}

fn measurement_tiff(scene: &Scene, swath: Subswath) -> Vec<u8> {
    let (west, width) = swath_layout(swath);
    let west = west + scene.lon_shift;
    let mut data = Vec::with_capacity(width * LINES);
    for line in 0..LINES {
        for pixel in 0..width {
            data.push(reflectivity(west + PIXEL_DEG * pixel as f64, TOP_LAT - PIXEL_DEG * line as f64));
        }
    }
    let mut buffer = Cursor::new(Vec::new());
    {
        let mut encoder = TiffEncoder::new(&mut buffer).unwrap();
        encoder
            .write_image::<colortype::Gray32Float>(width as u32, LINES as u32, &data)
            .unwrap();
    }
    buffer.into_inner()
}

/// Write a zipped SAFE archive with IW1 and IW2, VV and VH
pub fn write_safe_zip(dir: &Path, scene: &Scene) -> PathBuf {
    let path = dir.join(scene.file_name);
    let safe = scene.file_name.trim_end_matches(".zip").to_string() + ".SAFE";
    let mut zip = ZipWriter::new(std::fs::File::create(&path).unwrap());
    let options = FileOptions::default();
    let stamp = scene.file_name[17..32].to_lowercase();

    zip.start_file(format!("{}/manifest.safe", safe), options).unwrap();
    zip.write_all(b"<xfdu:XFDU/>").unwrap();

    for swath in [Subswath::IW1, Subswath::IW2] {
        for pol in [Polarization::VV, Polarization::VH] {
            let stem = format!(
                "s1a-{}-slc-{}-{}-{:06}",
                swath.as_str().to_lowercase(),
                pol.to_string().to_lowercase(),
                stamp,
                scene.absolute_orbit
            );
            zip.start_file(format!("{}/annotation/{}.xml", safe, stem), options).unwrap();
            zip.write_all(annotation_xml(scene, swath, pol).as_bytes()).unwrap();
            zip.start_file(format!("{}/annotation/calibration/calibration-{}.xml", safe, stem), options)
                .unwrap();
            zip.write_all(b"<calibration/>").unwrap();
            zip.start_file(format!("{}/measurement/{}.tiff", safe, stem), options).unwrap();
            zip.write_all(&measurement_tiff(scene, swath)).unwrap();
        }
    }
    zip.finish().unwrap();
    path
}

pub fn time(text: &str) -> DateTime<Utc> {
    NaiveDateTime::parse_from_str(text, "%Y-%m-%dT%H:%M:%S%.f").unwrap().and_utc()
}

/// In-memory single-swath IW2 product with VV complex bands
pub fn synthetic_product(name: &str, start: &str, absolute_orbit: u32, west: f64, width: usize, height: usize) -> Product {
    let geo_transform = GeoTransform {
        top_left_x: west,
        pixel_width: PIXEL_DEG,
        rotation_x: 0.0,
        top_left_y: TOP_LAT,
        rotation_y: 0.0,
        pixel_height: -PIXEL_DEG,
    };
    let geometry = SwathGeometry {
        width,
        height,
        burst_count: 1,
        geo_transform,
        range_pixel_spacing: 2.329562,
        azimuth_pixel_spacing: 13.93056,
        incidence_near: 30.0,
        incidence_far: 46.0,
    };
    let i = Array2::from_shape_fn((height, width), |(r, c)| {
        reflectivity(west + PIXEL_DEG * c as f64, TOP_LAT - PIXEL_DEG * r as f64)
    });
    let q = Array2::<f32>::zeros((height, width));
    let metadata = AbstractedMetadata {
        mission: "S1A".to_string(),
        acquisition_mode: AcquisitionMode::IW,
        product_type: "SLC".to_string(),
        polarizations: vec![Polarization::VV],
        first_line_time: time(start),
        last_line_time: time(start) + chrono::Duration::seconds(26),
        absolute_orbit,
        swaths: BTreeMap::from([(Subswath::IW2, geometry)]),
        secondaries: Vec::new(),
        history: Vec::new(),
    };
    Product::new(
        name,
        "SLC",
        vec![Band::new("i_IW2_VV", UNIT_REAL, i), Band::new("q_IW2_VV", UNIT_IMAGINARY, q)],
        GeocodingState::OrbitCorrected,
        metadata,
    )
    .unwrap()
}

/// Write a configuration file for a run over `input` into `output`
pub fn write_config(dir: &Path, input: &Path, output: &Path, roi: &str) -> PathBuf {
    let config = serde_json::json!({
        "input_root": input,
        "output_root": output,
        "region_of_interest": roi,
    });
    let path = dir.join("pipeline.json");
    std::fs::write(&path, serde_json::to_string_pretty(&config).unwrap()).unwrap();
    path
}

pub const ROI: &str = "POLYGON((36.84 37.54, 36.84 37.60, 36.99 37.60, 36.99 37.54, 36.84 37.54))";
