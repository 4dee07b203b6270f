//! Sentinel-1 product filename grammar
//!
//! `MMM_BB_TTTR_LFPP_YYYYMMDDTHHMMSS_YYYYMMDDTHHMMSS_OOOOOO_DDDDDD_CCCC.SAFE.zip`
//!
//! Products without a resolution class (SLC, RAW, OCN) carry an empty token
//! after the product type, so a valid name splits into 9 or 10 tokens.

use crate::core::product::relative_orbit;
use crate::types::{AcquisitionMode, Polarization, SarError, SarResult, Subswath};
use chrono::{DateTime, NaiveDateTime, Utc};
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::sync::OnceLock;

/// Raw input archive together with the fields encoded in its name
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AcquisitionFile {
    pub path: PathBuf,
    /// Product name without archive suffixes
    pub product_name: String,
    pub mission: String,
    pub mode: AcquisitionMode,
    /// Beam identifier as written in the name (`IW`, `S3`, ...)
    pub beam: String,
    pub product_type: String,
    pub resolution: Option<char>,
    pub processing_level: u8,
    pub product_class: char,
    pub polarization_mode: String,
    pub start_time: DateTime<Utc>,
    pub stop_time: DateTime<Utc>,
    pub absolute_orbit: u32,
    pub datatake_id: String,
    pub unique_id: String,
}

struct Grammar {
    mission: Regex,
    beam: Regex,
    product_type: Regex,
    level_class_pol: Regex,
    timestamp: Regex,
    orbit: Regex,
    datatake: Regex,
    unique_id: Regex,
}

fn grammar() -> SarResult<&'static Grammar> {
    static GRAMMAR: OnceLock<Result<Grammar, regex::Error>> = OnceLock::new();
    let compiled = GRAMMAR.get_or_init(|| {
        Ok(Grammar {
            mission: Regex::new(r"^S1[A-D]$")?,
            beam: Regex::new(r"^(IW|EW|WV|S[1-6])$")?,
            product_type: Regex::new(r"^(SLC|GRD|RAW|OCN)([FHM])?$")?,
            level_class_pol: Regex::new(r"^([0-2])([SA])(SH|SV|DH|DV|HH|HV|VV|VH)$")?,
            timestamp: Regex::new(r"^\d{8}T\d{6}$")?,
            orbit: Regex::new(r"^\d{6}$")?,
            datatake: Regex::new(r"^[0-9A-F]{6}$")?,
            unique_id: Regex::new(r"^[0-9A-F]{4}$")?,
        })
    });
    compiled
        .as_ref()
        .map_err(|e| SarError::MetadataFormat(format!("Regex error: {}", e)))
}

/// Strip `.zip` and `.SAFE` suffixes
pub(crate) fn product_stem(file_name: &str) -> &str {
    let stem = file_name.strip_suffix(".zip").unwrap_or(file_name);
    stem.strip_suffix(".SAFE").unwrap_or(stem)
}

impl AcquisitionFile {
    /// Parse the identifying fields from an archive path
    pub fn parse<P: AsRef<Path>>(path: P) -> SarResult<Self> {
        let path = path.as_ref();
        let file_name = path
            .file_name()
            .and_then(|n| n.to_str())
            .ok_or_else(|| SarError::MetadataFormat(format!("No file name in {}", path.display())))?;
        let stem = product_stem(file_name);
        let tokens: Vec<&str> = stem.split('_').collect();

        let bad = |token: &str, what: &str| {
            SarError::MetadataFormat(format!(
                "{}: token '{}' is not a valid {}",
                file_name, token, what
            ))
        };

        // Normalize to [mission, beam, type, (resolution), lfpp, start, stop, orbit, datatake, unique]
        let (type_token, rest) = match tokens.len() {
            10 if tokens[3].is_empty() => (tokens[2], &tokens[4..]),
            9 => (tokens[2], &tokens[3..]),
            n => {
                return Err(SarError::MetadataFormat(format!(
                    "{}: expected 9 or 10 underscore-separated tokens, found {}",
                    file_name, n
                )))
            }
        };

        let g = grammar()?;
        let mission = tokens[0];
        if !g.mission.is_match(mission) {
            return Err(bad(mission, "mission identifier"));
        }
        let beam = tokens[1];
        if !g.beam.is_match(beam) {
            return Err(bad(beam, "sensing mode"));
        }
        let mode: AcquisitionMode = beam.parse()?;

        let type_caps = g
            .product_type
            .captures(type_token)
            .ok_or_else(|| bad(type_token, "product type"))?;
        let product_type = type_caps[1].to_string();
        let resolution = type_caps.get(2).and_then(|m| m.as_str().chars().next());
        if product_type == "GRD" && resolution.is_none() {
            return Err(bad(type_token, "product type (GRD needs a resolution class)"));
        }

        let lfpp = rest[0];
        let lfpp_caps = g
            .level_class_pol
            .captures(lfpp)
            .ok_or_else(|| bad(lfpp, "level/class/polarization code"))?;
        let processing_level = lfpp_caps[1].parse::<u8>().map_err(|_| bad(lfpp, "processing level"))?;
        let product_class = lfpp_caps[2].chars().next().unwrap_or('S');
        let polarization_mode = lfpp_caps[3].to_string();

        let parse_timestamp = |token: &str| -> SarResult<DateTime<Utc>> {
            if !g.timestamp.is_match(token) {
                return Err(bad(token, "sensing timestamp"));
            }
            NaiveDateTime::parse_from_str(token, "%Y%m%dT%H%M%S")
                .map(|t| t.and_utc())
                .map_err(|_| bad(token, "sensing timestamp"))
        };
        let start_time = parse_timestamp(rest[1])?;
        let stop_time = parse_timestamp(rest[2])?;
        if stop_time < start_time {
            return Err(SarError::MetadataFormat(format!(
                "{}: stop time precedes start time",
                file_name
            )));
        }

        let orbit = rest[3];
        if !g.orbit.is_match(orbit) {
            return Err(bad(orbit, "absolute orbit"));
        }
        let absolute_orbit = orbit.parse::<u32>().map_err(|_| bad(orbit, "absolute orbit"))?;

        let datatake = rest[4];
        if !g.datatake.is_match(datatake) {
            return Err(bad(datatake, "datatake id"));
        }
        let unique_id = rest[5];
        if !g.unique_id.is_match(unique_id) {
            return Err(bad(unique_id, "product unique id"));
        }

        Ok(Self {
            path: path.to_path_buf(),
            product_name: stem.to_string(),
            mission: mission.to_string(),
            mode,
            beam: beam.to_string(),
            product_type,
            resolution,
            processing_level,
            product_class,
            polarization_mode,
            start_time,
            stop_time,
            absolute_orbit,
            datatake_id: datatake.to_string(),
            unique_id: unique_id.to_string(),
        })
    }

    /// Polarizations present in the product
    pub fn polarizations(&self) -> Vec<Polarization> {
        match self.polarization_mode.as_str() {
            "SV" | "VV" => vec![Polarization::VV],
            "DV" => vec![Polarization::VV, Polarization::VH],
            "SH" | "HH" => vec![Polarization::HH],
            "DH" => vec![Polarization::HH, Polarization::HV],
            "VH" => vec![Polarization::VH],
            "HV" => vec![Polarization::HV],
            _ => vec![],
        }
    }

    /// Sub-swaths a TOPS product can be split into
    pub fn subswaths(&self) -> &'static [Subswath] {
        self.mode.subswaths()
    }

    pub fn relative_orbit(&self) -> u32 {
        relative_orbit(&self.mission, self.absolute_orbit)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SLC: &str = "S1A_IW_SLC__1SDV_20200103T170816_20200103T170843_030639_038282_2D2C.zip";

    #[test]
    fn test_parse_slc_name() {
        let file = AcquisitionFile::parse(Path::new("/data").join(SLC)).unwrap();
        assert_eq!(file.mission, "S1A");
        assert_eq!(file.mode, AcquisitionMode::IW);
        assert_eq!(file.product_type, "SLC");
        assert_eq!(file.resolution, None);
        assert_eq!(file.processing_level, 1);
        assert_eq!(file.polarizations(), vec![Polarization::VV, Polarization::VH]);
        assert_eq!(file.absolute_orbit, 30639);
        assert_eq!(file.relative_orbit(), 117);
        assert_eq!(file.subswaths(), &[Subswath::IW1, Subswath::IW2, Subswath::IW3]);
        assert_eq!(file.product_name, &SLC[..SLC.len() - 4]);
    }

    #[test]
    fn test_parse_grd_and_safe_suffix() {
        let file = AcquisitionFile::parse(
            "S1B_EW_GRDM_1SDH_20210101T000000_20210101T000100_024999_02F9A1_ABCD.SAFE.zip",
        )
        .unwrap();
        assert_eq!(file.resolution, Some('M'));
        assert_eq!(file.polarizations(), vec![Polarization::HH, Polarization::HV]);
        assert_eq!(file.subswaths().len(), 5);
    }

    #[test]
    fn test_reject_malformed_names() {
        let err = AcquisitionFile::parse("S1A_IW_SLC__1SDV_20200103T170816.zip").unwrap_err();
        assert!(err.to_string().contains("found 6"));

        let err = AcquisitionFile::parse(
            "S2A_IW_SLC__1SDV_20200103T170816_20200103T170843_030639_038282_2D2C.zip",
        )
        .unwrap_err();
        assert!(matches!(err, SarError::MetadataFormat(_)));
        assert!(err.to_string().contains("S2A"));

        let err = AcquisitionFile::parse(
            "S1A_IW_SLC__1SDV_20200103T170816_20200103T170843_30639_038282_2D2C.zip",
        )
        .unwrap_err();
        assert!(err.to_string().contains("30639"));
    }
}
