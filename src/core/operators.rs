//! Operator catalogue: names, parameter schemas and typed parameter sets
//!
//! Every invocation is checked against the operator's schema before it reaches
//! a raster engine. Unknown parameter names and bad values raise
//! [`SarError::InvalidParameter`], absent required parameters raise
//! [`SarError::MissingParameter`].

use crate::core::geometry::RegionOfInterest;
use crate::types::{Polarization, SarError, SarResult, Subswath};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

/// Raster operators known to the pipeline
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum OperatorKind {
    ApplyOrbitFile,
    TopsarSplit,
    BackGeocoding,
    Subset,
    Coherence,
}

/// Number of input products an operator takes
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Arity {
    Exactly(usize),
    AtLeast(usize),
}

impl Arity {
    pub fn accepts(&self, count: usize) -> bool {
        match self {
            Arity::Exactly(n) => count == *n,
            Arity::AtLeast(n) => count >= *n,
        }
    }
}

impl fmt::Display for Arity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Arity::Exactly(n) => write!(f, "exactly {}", n),
            Arity::AtLeast(n) => write!(f, "at least {}", n),
        }
    }
}

impl OperatorKind {
    pub const ALL: [OperatorKind; 5] = [
        OperatorKind::ApplyOrbitFile,
        OperatorKind::TopsarSplit,
        OperatorKind::BackGeocoding,
        OperatorKind::Subset,
        OperatorKind::Coherence,
    ];

    pub fn name(&self) -> &'static str {
        match self {
            OperatorKind::ApplyOrbitFile => "ApplyOrbitFile",
            OperatorKind::TopsarSplit => "TopsarSplit",
            OperatorKind::BackGeocoding => "BackGeocoding",
            OperatorKind::Subset => "Subset",
            OperatorKind::Coherence => "Coherence",
        }
    }

    /// Operator id understood by SNAP's graph processing tool
    pub fn gpt_name(&self) -> &'static str {
        match self {
            OperatorKind::ApplyOrbitFile => "Apply-Orbit-File",
            OperatorKind::TopsarSplit => "TOPSAR-Split",
            OperatorKind::BackGeocoding => "Back-Geocoding",
            OperatorKind::Subset => "Subset",
            OperatorKind::Coherence => "Coherence",
        }
    }

    pub fn arity(&self) -> Arity {
        match self {
            OperatorKind::BackGeocoding => Arity::AtLeast(2),
            _ => Arity::Exactly(1),
        }
    }

    /// Operators whose working memory scales with the full raster stack
    pub fn is_memory_heavy(&self) -> bool {
        matches!(self, OperatorKind::BackGeocoding | OperatorKind::Coherence)
    }

    pub fn schema(&self) -> &'static [ParamSpec] {
        match self {
            OperatorKind::ApplyOrbitFile => ORBIT_SCHEMA,
            OperatorKind::TopsarSplit => SPLIT_SCHEMA,
            OperatorKind::BackGeocoding => BACK_GEOCODING_SCHEMA,
            OperatorKind::Subset => SUBSET_SCHEMA,
            OperatorKind::Coherence => COHERENCE_SCHEMA,
        }
    }
}

impl fmt::Display for OperatorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for OperatorKind {
    type Err = SarError;

    fn from_str(s: &str) -> SarResult<Self> {
        OperatorKind::ALL
            .iter()
            .find(|kind| kind.name() == s || kind.gpt_name() == s)
            .copied()
            .ok_or_else(|| SarError::InvalidParameter(format!("Unknown operator: {}", s)))
    }
}

/// Untyped parameter value as passed across the gateway
#[derive(Debug, Clone, PartialEq)]
pub enum ParamValue {
    Bool(bool),
    Int(i64),
    Str(String),
    StrList(Vec<String>),
    Polygon(RegionOfInterest),
}

impl ParamValue {
    fn kind_name(&self) -> &'static str {
        match self {
            ParamValue::Bool(_) => "bool",
            ParamValue::Int(_) => "int",
            ParamValue::Str(_) => "string",
            ParamValue::StrList(_) => "string list",
            ParamValue::Polygon(_) => "polygon",
        }
    }

    /// Text form used in graph XML and history entries
    pub fn to_text(&self) -> String {
        match self {
            ParamValue::Bool(b) => b.to_string(),
            ParamValue::Int(i) => i.to_string(),
            ParamValue::Str(s) => s.clone(),
            ParamValue::StrList(items) => items.join(","),
            ParamValue::Polygon(roi) => roi.to_wkt(),
        }
    }
}

impl From<bool> for ParamValue {
    fn from(value: bool) -> Self {
        ParamValue::Bool(value)
    }
}

impl From<i64> for ParamValue {
    fn from(value: i64) -> Self {
        ParamValue::Int(value)
    }
}

impl From<&str> for ParamValue {
    fn from(value: &str) -> Self {
        ParamValue::Str(value.to_string())
    }
}

impl From<String> for ParamValue {
    fn from(value: String) -> Self {
        ParamValue::Str(value)
    }
}

impl From<RegionOfInterest> for ParamValue {
    fn from(value: RegionOfInterest) -> Self {
        ParamValue::Polygon(value)
    }
}

/// Parameter name to value mapping, ordered for deterministic rendering
pub type ParameterMap = BTreeMap<String, ParamValue>;

/// Build a [`ParameterMap`] from `name => value` pairs
#[macro_export]
macro_rules! params {
    ($($name:expr => $value:expr),* $(,)?) => {{
        #[allow(unused_mut)]
        let mut map = $crate::core::operators::ParameterMap::new();
        $(map.insert($name.to_string(), $crate::core::operators::ParamValue::from($value));)*
        map
    }};
}

/// Accepted value shape for a parameter
#[derive(Debug, Clone, Copy)]
pub enum ParamKind {
    Bool,
    Int { min: i64, max: i64 },
    Text,
    Choice(&'static [&'static str]),
    Subswath,
    Polarizations,
    Polygon,
}

#[derive(Debug, Clone, Copy)]
pub struct ParamSpec {
    pub name: &'static str,
    pub kind: ParamKind,
    pub required: bool,
}

const fn required(name: &'static str, kind: ParamKind) -> ParamSpec {
    ParamSpec { name, kind, required: true }
}

const fn optional(name: &'static str, kind: ParamKind) -> ParamSpec {
    ParamSpec { name, kind, required: false }
}

// Integer parameters end up as u32 in the typed requests
const INT_MAX: i64 = u32::MAX as i64;

pub const RESAMPLING_METHODS: &[&str] =
    &["NEAREST_NEIGHBOUR", "BILINEAR_INTERPOLATION", "CUBIC_CONVOLUTION"];

const ORBIT_SCHEMA: &[ParamSpec] = &[
    optional("orbitType", ParamKind::Text),
    optional("polyDegree", ParamKind::Int { min: 1, max: INT_MAX }),
    optional("continueOnFail", ParamKind::Bool),
];

const SPLIT_SCHEMA: &[ParamSpec] = &[
    required("subswath", ParamKind::Subswath),
    required("polarizations", ParamKind::Polarizations),
    optional("firstBurstIndex", ParamKind::Int { min: 1, max: INT_MAX }),
    optional("lastBurstIndex", ParamKind::Int { min: 1, max: INT_MAX }),
];

const BACK_GEOCODING_SCHEMA: &[ParamSpec] = &[
    required("demName", ParamKind::Text),
    required("demResamplingMethod", ParamKind::Choice(RESAMPLING_METHODS)),
    required("resamplingType", ParamKind::Choice(RESAMPLING_METHODS)),
    required("maskOutAreaWithoutElevation", ParamKind::Bool),
    required("outputDerampDemodPhase", ParamKind::Bool),
];

const SUBSET_SCHEMA: &[ParamSpec] = &[
    required("geoRegion", ParamKind::Polygon),
    required("copyMetadata", ParamKind::Bool),
];

const COHERENCE_SCHEMA: &[ParamSpec] = &[
    required("cohWinAz", ParamKind::Int { min: 1, max: INT_MAX }),
    required("cohWinRg", ParamKind::Int { min: 1, max: INT_MAX }),
    required("squarePixel", ParamKind::Bool),
];

impl ParamSpec {
    fn check(&self, op: OperatorKind, value: &ParamValue) -> SarResult<()> {
        let mismatch = || {
            SarError::InvalidParameter(format!(
                "{}.{} expects {}, got {}",
                op,
                self.name,
                self.expected(),
                value.kind_name()
            ))
        };
        match (self.kind, value) {
            (ParamKind::Bool, ParamValue::Bool(_)) => Ok(()),
            (ParamKind::Int { min, max }, ParamValue::Int(v)) => {
                if *v < min || *v > max {
                    Err(SarError::InvalidParameter(format!(
                        "{}.{} must be within {}..={}, got {}",
                        op, self.name, min, max, v
                    )))
                } else {
                    Ok(())
                }
            }
            (ParamKind::Text, ParamValue::Str(_)) => Ok(()),
            (ParamKind::Choice(choices), ParamValue::Str(s)) => {
                if choices.contains(&s.as_str()) {
                    Ok(())
                } else {
                    Err(SarError::InvalidParameter(format!(
                        "{}.{} must be one of {:?}, got '{}'",
                        op, self.name, choices, s
                    )))
                }
            }
            (ParamKind::Subswath, ParamValue::Str(s)) => s.parse::<Subswath>().map(|_| ()),
            (ParamKind::Polarizations, value) => parse_polarizations(value).map(|_| ()),
            (ParamKind::Polygon, ParamValue::Polygon(_)) => Ok(()),
            (ParamKind::Polygon, ParamValue::Str(s)) => RegionOfInterest::from_wkt(s).map(|_| ()),
            _ => Err(mismatch()),
        }
    }

    fn expected(&self) -> &'static str {
        match self.kind {
            ParamKind::Bool => "bool",
            ParamKind::Int { .. } => "int",
            ParamKind::Text | ParamKind::Choice(_) | ParamKind::Subswath => "string",
            ParamKind::Polarizations => "polarization list",
            ParamKind::Polygon => "polygon",
        }
    }
}

/// Check a parameter map against an operator's schema
pub fn validate_parameters(op: OperatorKind, params: &ParameterMap) -> SarResult<()> {
    let schema = op.schema();
    for name in params.keys() {
        if !schema.iter().any(|spec| spec.name == name) {
            return Err(SarError::InvalidParameter(format!(
                "Unrecognized parameter '{}' for operator {}",
                name, op
            )));
        }
    }
    for spec in schema {
        match params.get(spec.name) {
            Some(value) => spec.check(op, value)?,
            None if spec.required => {
                return Err(SarError::MissingParameter(format!(
                    "Operator {} requires parameter '{}'",
                    op, spec.name
                )))
            }
            None => {}
        }
    }
    Ok(())
}

fn parse_polarizations(value: &ParamValue) -> SarResult<Vec<Polarization>> {
    let items: Vec<String> = match value {
        ParamValue::Str(s) => s.split(',').map(|p| p.trim().to_string()).collect(),
        ParamValue::StrList(list) => list.clone(),
        other => {
            return Err(SarError::InvalidParameter(format!(
                "Expected polarization list, got {}",
                other.kind_name()
            )))
        }
    };
    let mut pols = Vec::new();
    for item in items.iter().filter(|s| !s.is_empty()) {
        let pol: Polarization = item.parse()?;
        if !pols.contains(&pol) {
            pols.push(pol);
        }
    }
    if pols.is_empty() {
        return Err(SarError::InvalidParameter("Empty polarization list".to_string()));
    }
    Ok(pols)
}

fn get<'a>(params: &'a ParameterMap, name: &str) -> Option<&'a ParamValue> {
    params.get(name)
}

fn get_bool(params: &ParameterMap, name: &str, default: bool) -> bool {
    match get(params, name) {
        Some(ParamValue::Bool(b)) => *b,
        _ => default,
    }
}

fn get_int(params: &ParameterMap, name: &str) -> Option<i64> {
    match get(params, name) {
        Some(ParamValue::Int(i)) => Some(*i),
        _ => None,
    }
}

fn get_u32(params: &ParameterMap, op: OperatorKind, name: &str) -> SarResult<Option<u32>> {
    get_int(params, name)
        .map(|v| {
            u32::try_from(v).map_err(|_| {
                SarError::InvalidParameter(format!("{}.{} is out of range: {}", op, name, v))
            })
        })
        .transpose()
}

fn get_str(params: &ParameterMap, name: &str) -> Option<String> {
    match get(params, name) {
        Some(ParamValue::Str(s)) => Some(s.clone()),
        _ => None,
    }
}

fn require<T>(value: Option<T>, op: OperatorKind, name: &str) -> SarResult<T> {
    value.ok_or_else(|| {
        SarError::MissingParameter(format!("Operator {} requires parameter '{}'", op, name))
    })
}

/// Resampling kernel names shared with SNAP
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ResamplingMethod {
    #[serde(rename = "NEAREST_NEIGHBOUR")]
    NearestNeighbour,
    #[serde(rename = "BILINEAR_INTERPOLATION")]
    BilinearInterpolation,
    #[serde(rename = "CUBIC_CONVOLUTION")]
    CubicConvolution,
}

impl ResamplingMethod {
    pub fn as_str(&self) -> &'static str {
        match self {
            ResamplingMethod::NearestNeighbour => "NEAREST_NEIGHBOUR",
            ResamplingMethod::BilinearInterpolation => "BILINEAR_INTERPOLATION",
            ResamplingMethod::CubicConvolution => "CUBIC_CONVOLUTION",
        }
    }
}

impl FromStr for ResamplingMethod {
    type Err = SarError;

    fn from_str(s: &str) -> SarResult<Self> {
        match s {
            "NEAREST_NEIGHBOUR" => Ok(ResamplingMethod::NearestNeighbour),
            "BILINEAR_INTERPOLATION" => Ok(ResamplingMethod::BilinearInterpolation),
            "CUBIC_CONVOLUTION" => Ok(ResamplingMethod::CubicConvolution),
            _ => Err(SarError::InvalidParameter(format!("Unknown resampling method: {}", s))),
        }
    }
}

/// Apply-Orbit-File parameters
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct OrbitParams {
    pub orbit_type: String,
    pub poly_degree: u32,
    pub continue_on_fail: bool,
}

impl Default for OrbitParams {
    fn default() -> Self {
        Self {
            orbit_type: "Sentinel Precise (Auto Download)".to_string(),
            poly_degree: 3,
            continue_on_fail: false,
        }
    }
}

/// TOPSAR-Split parameters
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SplitParams {
    pub subswath: Subswath,
    pub polarizations: Vec<Polarization>,
    #[serde(default)]
    pub first_burst_index: Option<u32>,
    #[serde(default)]
    pub last_burst_index: Option<u32>,
}

/// Back-Geocoding parameters
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct BackGeocodingParams {
    pub dem_name: String,
    pub dem_resampling_method: ResamplingMethod,
    pub resampling_type: ResamplingMethod,
    pub mask_out_area_without_elevation: bool,
    pub output_deramp_demod_phase: bool,
}

impl Default for BackGeocodingParams {
    fn default() -> Self {
        Self {
            dem_name: "SRTM 1Sec HGT".to_string(),
            dem_resampling_method: ResamplingMethod::BilinearInterpolation,
            resampling_type: ResamplingMethod::BilinearInterpolation,
            mask_out_area_without_elevation: true,
            output_deramp_demod_phase: false,
        }
    }
}

/// Subset parameters
#[derive(Debug, Clone, PartialEq)]
pub struct SubsetParams {
    pub geo_region: RegionOfInterest,
    pub copy_metadata: bool,
}

/// Coherence estimation parameters
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct CoherenceParams {
    pub coh_win_az: u32,
    pub coh_win_rg: u32,
    pub square_pixel: bool,
}

impl Default for CoherenceParams {
    fn default() -> Self {
        Self { coh_win_az: 3, coh_win_rg: 10, square_pixel: true }
    }
}

/// A schema-checked operator invocation
#[derive(Debug, Clone, PartialEq)]
pub enum OperatorRequest {
    ApplyOrbitFile(OrbitParams),
    TopsarSplit(SplitParams),
    BackGeocoding(BackGeocodingParams),
    Subset(SubsetParams),
    Coherence(CoherenceParams),
}

impl OperatorRequest {
    pub fn kind(&self) -> OperatorKind {
        match self {
            OperatorRequest::ApplyOrbitFile(_) => OperatorKind::ApplyOrbitFile,
            OperatorRequest::TopsarSplit(_) => OperatorKind::TopsarSplit,
            OperatorRequest::BackGeocoding(_) => OperatorKind::BackGeocoding,
            OperatorRequest::Subset(_) => OperatorKind::Subset,
            OperatorRequest::Coherence(_) => OperatorKind::Coherence,
        }
    }

    /// Validate an untyped parameter map and convert it into a typed request
    pub fn from_parameters(op: OperatorKind, params: &ParameterMap) -> SarResult<Self> {
        validate_parameters(op, params)?;
        let request = match op {
            OperatorKind::ApplyOrbitFile => {
                let defaults = OrbitParams::default();
                OperatorRequest::ApplyOrbitFile(OrbitParams {
                    orbit_type: get_str(params, "orbitType").unwrap_or(defaults.orbit_type),
                    poly_degree: get_u32(params, op, "polyDegree")?.unwrap_or(defaults.poly_degree),
                    continue_on_fail: get_bool(params, "continueOnFail", defaults.continue_on_fail),
                })
            }
            OperatorKind::TopsarSplit => {
                let subswath = require(get_str(params, "subswath"), op, "subswath")?.parse()?;
                let polarizations =
                    parse_polarizations(require(get(params, "polarizations"), op, "polarizations")?)?;
                let first = get_u32(params, op, "firstBurstIndex")?;
                let last = get_u32(params, op, "lastBurstIndex")?;
                if let (Some(first), Some(last)) = (first, last) {
                    if first > last {
                        return Err(SarError::InvalidParameter(format!(
                            "TopsarSplit.firstBurstIndex ({}) exceeds lastBurstIndex ({})",
                            first, last
                        )));
                    }
                }
                OperatorRequest::TopsarSplit(SplitParams {
                    subswath,
                    polarizations,
                    first_burst_index: first,
                    last_burst_index: last,
                })
            }
            OperatorKind::BackGeocoding => OperatorRequest::BackGeocoding(BackGeocodingParams {
                dem_name: require(get_str(params, "demName"), op, "demName")?,
                dem_resampling_method: require(get_str(params, "demResamplingMethod"), op, "demResamplingMethod")?
                    .parse()?,
                resampling_type: require(get_str(params, "resamplingType"), op, "resamplingType")?
                    .parse()?,
                mask_out_area_without_elevation: get_bool(params, "maskOutAreaWithoutElevation", true),
                output_deramp_demod_phase: get_bool(params, "outputDerampDemodPhase", false),
            }),
            OperatorKind::Subset => {
                let geo_region = match require(get(params, "geoRegion"), op, "geoRegion")? {
                    ParamValue::Polygon(roi) => roi.clone(),
                    ParamValue::Str(wkt) => RegionOfInterest::from_wkt(wkt)?,
                    other => {
                        return Err(SarError::InvalidParameter(format!(
                            "Subset.geoRegion expects polygon, got {}",
                            other.kind_name()
                        )))
                    }
                };
                OperatorRequest::Subset(SubsetParams {
                    geo_region,
                    copy_metadata: get_bool(params, "copyMetadata", true),
                })
            }
            OperatorKind::Coherence => OperatorRequest::Coherence(CoherenceParams {
                coh_win_az: require(get_u32(params, op, "cohWinAz")?, op, "cohWinAz")?,
                coh_win_rg: require(get_u32(params, op, "cohWinRg")?, op, "cohWinRg")?,
                square_pixel: get_bool(params, "squarePixel", true),
            }),
        };
        Ok(request)
    }

    /// Untyped parameter map for this request
    pub fn parameters(&self) -> ParameterMap {
        match self {
            OperatorRequest::ApplyOrbitFile(p) => crate::params! {
                "orbitType" => p.orbit_type.clone(),
                "polyDegree" => p.poly_degree as i64,
                "continueOnFail" => p.continue_on_fail,
            },
            OperatorRequest::TopsarSplit(p) => {
                let mut map = crate::params! { "subswath" => p.subswath.as_str() };
                map.insert(
                    "polarizations".to_string(),
                    ParamValue::StrList(p.polarizations.iter().map(|pol| pol.to_string()).collect()),
                );
                if let Some(first) = p.first_burst_index {
                    map.insert("firstBurstIndex".to_string(), ParamValue::Int(first as i64));
                }
                if let Some(last) = p.last_burst_index {
                    map.insert("lastBurstIndex".to_string(), ParamValue::Int(last as i64));
                }
                map
            }
            OperatorRequest::BackGeocoding(p) => crate::params! {
                "demName" => p.dem_name.clone(),
                "demResamplingMethod" => p.dem_resampling_method.as_str(),
                "resamplingType" => p.resampling_type.as_str(),
                "maskOutAreaWithoutElevation" => p.mask_out_area_without_elevation,
                "outputDerampDemodPhase" => p.output_deramp_demod_phase,
            },
            OperatorRequest::Subset(p) => crate::params! {
                "geoRegion" => p.geo_region.clone(),
                "copyMetadata" => p.copy_metadata,
            },
            OperatorRequest::Coherence(p) => crate::params! {
                "cohWinAz" => p.coh_win_az as i64,
                "cohWinRg" => p.coh_win_rg as i64,
                "squarePixel" => p.square_pixel,
            },
        }
    }

    /// One-line description for product history
    pub fn describe(&self) -> String {
        let rendered: Vec<String> = self
            .parameters()
            .iter()
            .map(|(name, value)| format!("{}={}", name, value.to_text()))
            .collect();
        format!("{}({})", self.kind().gpt_name(), rendered.join(", "))
    }
}
