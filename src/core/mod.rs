//! Core data model and the operator boundary

pub mod gateway;
pub mod geometry;
pub mod operators;
pub mod product;

// Re-export main types
pub use gateway::{OperatorGateway, RasterEngine};
pub use geometry::{PixelWindow, RegionOfInterest};
pub use operators::{
    BackGeocodingParams, CoherenceParams, OperatorKind, OperatorRequest, OrbitParams, ParamValue,
    ParameterMap, ResamplingMethod, SplitParams, SubsetParams,
};
pub use product::{AbstractedMetadata, Band, BandName, Product, StackRole, SwathGeometry};
