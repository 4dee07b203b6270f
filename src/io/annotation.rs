use crate::core::product::SwathGeometry;
use crate::types::{
    AcquisitionMode, GeoTransform, Polarization, SarError, SarResult, Subswath, TiePoint,
};
use chrono::{DateTime, NaiveDateTime, Utc};
use quick_xml::de::from_str;
use serde::Deserialize;

/// Sentinel-1 product annotation
/// This represents the root <product> element directly
#[derive(Debug, Deserialize)]
pub struct AnnotationRoot {
    #[serde(rename = "adsHeader")]
    pub ads_header: AdsHeader,
    #[serde(rename = "imageAnnotation")]
    pub image_annotation: ImageAnnotation,
    #[serde(rename = "swathTiming", default)]
    pub swath_timing: Option<SwathTiming>,
    #[serde(rename = "geolocationGrid")]
    pub geolocation_grid: GeolocationGrid,
}

#[derive(Debug, Deserialize)]
pub struct AdsHeader {
    #[serde(rename = "missionId")]
    pub mission_id: String,
    #[serde(rename = "productType")]
    pub product_type: String,
    #[serde(rename = "polarisation")]
    pub polarisation: String,
    #[serde(rename = "mode")]
    pub mode: String,
    #[serde(rename = "swath")]
    pub swath: String,
    #[serde(rename = "startTime")]
    pub start_time: String,
    #[serde(rename = "stopTime")]
    pub stop_time: String,
    #[serde(rename = "absoluteOrbitNumber")]
    pub absolute_orbit_number: u32,
}

#[derive(Debug, Deserialize)]
pub struct ImageAnnotation {
    #[serde(rename = "imageInformation")]
    pub image_information: ImageInformation,
}

#[derive(Debug, Deserialize)]
pub struct ImageInformation {
    #[serde(rename = "numberOfSamples")]
    pub number_of_samples: usize,
    #[serde(rename = "numberOfLines")]
    pub number_of_lines: usize,
    #[serde(rename = "rangePixelSpacing")]
    pub range_pixel_spacing: f64,
    #[serde(rename = "azimuthPixelSpacing")]
    pub azimuth_pixel_spacing: f64,
}

#[derive(Debug, Deserialize)]
pub struct SwathTiming {
    #[serde(rename = "linesPerBurst", default)]
    pub lines_per_burst: usize,
    #[serde(rename = "burstList")]
    pub burst_list: BurstList,
}

#[derive(Debug, Deserialize)]
pub struct BurstList {
    #[serde(rename = "burst", default)]
    pub bursts: Vec<Burst>,
}

#[derive(Debug, Deserialize)]
pub struct Burst {
    #[serde(rename = "azimuthTime")]
    pub azimuth_time: String,
}

#[derive(Debug, Deserialize)]
pub struct GeolocationGrid {
    #[serde(rename = "geolocationGridPointList")]
    pub point_list: GeolocationGridPointList,
}

#[derive(Debug, Deserialize)]
pub struct GeolocationGridPointList {
    #[serde(rename = "geolocationGridPoint", default)]
    pub points: Vec<GeolocationGridPoint>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct GeolocationGridPoint {
    #[serde(rename = "line")]
    pub line: f64,
    #[serde(rename = "pixel")]
    pub pixel: f64,
    #[serde(rename = "latitude")]
    pub latitude: f64,
    #[serde(rename = "longitude")]
    pub longitude: f64,
    #[serde(rename = "incidenceAngle")]
    pub incidence_angle: f64,
}

/// Parser for Sentinel-1 annotation XML files
pub struct AnnotationParser;

impl AnnotationParser {
    /// Parse complete annotation XML
    pub fn parse_annotation(xml_content: &str) -> SarResult<AnnotationRoot> {
        from_str::<AnnotationRoot>(xml_content)
            .map_err(|e| SarError::XmlParsing(format!("Failed to parse annotation XML: {}", e)))
    }

    pub fn subswath(annotation: &AnnotationRoot) -> SarResult<Subswath> {
        annotation.ads_header.swath.parse()
    }

    pub fn polarization(annotation: &AnnotationRoot) -> SarResult<Polarization> {
        annotation.ads_header.polarisation.parse()
    }

    pub fn acquisition_mode(annotation: &AnnotationRoot) -> SarResult<AcquisitionMode> {
        annotation.ads_header.mode.parse()
    }

    /// Sensing start and stop of the annotated swath
    pub fn sensing_times(annotation: &AnnotationRoot) -> SarResult<(DateTime<Utc>, DateTime<Utc>)> {
        Ok((
            parse_time(&annotation.ads_header.start_time)?,
            parse_time(&annotation.ads_header.stop_time)?,
        ))
    }

    /// Extract the swath geometry, fitting an affine geocoding through the grid corners
    pub fn swath_geometry(annotation: &AnnotationRoot) -> SarResult<SwathGeometry> {
        let image_info = &annotation.image_annotation.image_information;
        let points = &annotation.geolocation_grid.point_list.points;
        if points.len() < 3 {
            return Err(SarError::XmlParsing(format!(
                "Geolocation grid has {} points, need at least 3",
                points.len()
            )));
        }

        let first_line = points.iter().map(|p| p.line).fold(f64::INFINITY, f64::min);
        let last_line = points.iter().map(|p| p.line).fold(f64::NEG_INFINITY, f64::max);
        let near_pixel = points.iter().map(|p| p.pixel).fold(f64::INFINITY, f64::min);
        let far_pixel = points.iter().map(|p| p.pixel).fold(f64::NEG_INFINITY, f64::max);

        let find = |line: f64, pixel: f64| -> SarResult<&GeolocationGridPoint> {
            points
                .iter()
                .find(|p| p.line == line && p.pixel == pixel)
                .ok_or_else(|| {
                    SarError::XmlParsing(format!(
                        "Geolocation grid has no tie point at line {} pixel {}",
                        line, pixel
                    ))
                })
        };
        let first_near = find(first_line, near_pixel)?;
        let first_far = find(first_line, far_pixel)?;
        let last_near = find(last_line, near_pixel)?;

        let tie = |p: &GeolocationGridPoint| TiePoint {
            col: p.pixel,
            row: p.line,
            lon: p.longitude,
            lat: p.latitude,
        };
        let geo_transform = GeoTransform::from_tie_points(tie(first_near), tie(first_far), tie(last_near))?;

        let burst_count = annotation
            .swath_timing
            .as_ref()
            .map(|t| t.burst_list.bursts.len())
            .filter(|&n| n > 0)
            .unwrap_or(1);

        log::debug!(
            "Swath {}: {}x{} pixels, {} bursts, geo-transform {:?}",
            annotation.ads_header.swath,
            image_info.number_of_samples,
            image_info.number_of_lines,
            burst_count,
            geo_transform
        );

        Ok(SwathGeometry {
            width: image_info.number_of_samples,
            height: image_info.number_of_lines,
            burst_count,
            geo_transform,
            range_pixel_spacing: image_info.range_pixel_spacing,
            azimuth_pixel_spacing: image_info.azimuth_pixel_spacing,
            incidence_near: first_near.incidence_angle,
            incidence_far: first_far.incidence_angle,
        })
    }

    /// Extract burst timing information
    pub fn extract_burst_times(annotation: &AnnotationRoot) -> Vec<String> {
        annotation
            .swath_timing
            .as_ref()
            .map(|t| t.burst_list.bursts.iter().map(|b| b.azimuth_time.clone()).collect())
            .unwrap_or_default()
    }
}

/// Parse annotation timestamps, with or without a zone suffix
pub fn parse_time(time_str: &str) -> SarResult<DateTime<Utc>> {
    if let Ok(dt) = DateTime::parse_from_rfc3339(time_str) {
        return Ok(dt.with_timezone(&Utc));
    }
    let trimmed = time_str.trim_end_matches('Z');
    for format in ["%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%dT%H:%M:%S", "%Y%m%dT%H%M%S"] {
        if let Ok(naive) = NaiveDateTime::parse_from_str(trimmed, format) {
            return Ok(naive.and_utc());
        }
    }
    Err(SarError::XmlParsing(format!("Could not parse time '{}'", time_str)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    const SAMPLE_XML: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
        <product>
            <adsHeader>
                <missionId>S1A</missionId>
                <productType>SLC</productType>
                <polarisation>VV</polarisation>
                <mode>IW</mode>
                <swath>IW2</swath>
                <startTime>2020-01-03T17:08:16.618328</startTime>
                <stopTime>2020-01-03T17:08:42.574658</stopTime>
                <absoluteOrbitNumber>30639</absoluteOrbitNumber>
                <missionDataTakeId>230101</missionDataTakeId>
            </adsHeader>
            <imageAnnotation>
                <imageInformation>
                    <productFirstLineUtcTime>2020-01-03T17:08:16.618328</productFirstLineUtcTime>
                    <numberOfSamples>200</numberOfSamples>
                    <numberOfLines>100</numberOfLines>
                    <rangePixelSpacing>2.329562</rangePixelSpacing>
                    <azimuthPixelSpacing>13.93056</azimuthPixelSpacing>
                </imageInformation>
            </imageAnnotation>
            <swathTiming>
                <linesPerBurst>50</linesPerBurst>
                <burstList count="2">
                    <burst><azimuthTime>2020-01-03T17:08:16.618328</azimuthTime><byteOffset>0</byteOffset></burst>
                    <burst><azimuthTime>2020-01-03T17:08:19.376605</azimuthTime><byteOffset>100</byteOffset></burst>
                </burstList>
            </swathTiming>
            <geolocationGrid>
                <geolocationGridPointList count="4">
                    <geolocationGridPoint><line>0</line><pixel>0</pixel><latitude>37.7</latitude><longitude>36.7</longitude><height>0</height><incidenceAngle>36.5</incidenceAngle></geolocationGridPoint>
                    <geolocationGridPoint><line>0</line><pixel>199</pixel><latitude>37.7</latitude><longitude>36.899</longitude><height>0</height><incidenceAngle>41.5</incidenceAngle></geolocationGridPoint>
                    <geolocationGridPoint><line>99</line><pixel>0</pixel><latitude>37.601</latitude><longitude>36.7</longitude><height>0</height><incidenceAngle>36.5</incidenceAngle></geolocationGridPoint>
                    <geolocationGridPoint><line>99</line><pixel>199</pixel><latitude>37.601</latitude><longitude>36.899</longitude><height>0</height><incidenceAngle>41.5</incidenceAngle></geolocationGridPoint>
                </geolocationGridPointList>
            </geolocationGrid>
        </product>"#;

    #[test]
    fn test_annotation_parsing() {
        let annotation = AnnotationParser::parse_annotation(SAMPLE_XML).unwrap();
        assert_eq!(AnnotationParser::subswath(&annotation).unwrap(), Subswath::IW2);
        assert_eq!(AnnotationParser::polarization(&annotation).unwrap(), Polarization::VV);
        assert_eq!(AnnotationParser::extract_burst_times(&annotation).len(), 2);

        let geometry = AnnotationParser::swath_geometry(&annotation).unwrap();
        assert_eq!((geometry.width, geometry.height), (200, 100));
        assert_eq!(geometry.burst_count, 2);
        assert_relative_eq!(geometry.geo_transform.pixel_width, 0.001, epsilon = 1e-12);
        assert_relative_eq!(geometry.geo_transform.pixel_height, -0.001, epsilon = 1e-12);
        assert_relative_eq!(geometry.incidence_far, 41.5);
    }

    #[test]
    fn test_parse_time_variants() {
        assert!(parse_time("2020-01-03T17:08:16.618328").is_ok());
        assert!(parse_time("2020-01-03T17:08:16Z").is_ok());
        assert!(parse_time("20200103T170816").is_ok());
        assert!(parse_time("yesterday").is_err());
    }
}
