//! Cropping to the region of interest

use crate::core::gateway::OperatorGateway;
use crate::core::geometry::RegionOfInterest;
use crate::core::operators::{OperatorRequest, SubsetParams};
use crate::core::product::Product;
use crate::types::{SarError, SarResult};

pub struct RegionSelector<'g> {
    gateway: &'g OperatorGateway,
    roi: RegionOfInterest,
}

impl<'g> RegionSelector<'g> {
    pub fn new(gateway: &'g OperatorGateway, roi: RegionOfInterest) -> Self {
        Self { gateway, roi }
    }

    pub fn region(&self) -> &RegionOfInterest {
        &self.roi
    }

    pub fn request(&self) -> OperatorRequest {
        OperatorRequest::Subset(SubsetParams { geo_region: self.roi.clone(), copy_metadata: true })
    }

    /// Crop `product` to the region, keeping its metadata
    pub fn crop(&self, product: &Product) -> SarResult<Product> {
        let geometry = product.swath_geometry()?;
        let footprint = geometry.footprint();
        if !self.roi.intersects_quad(&geometry.geo_transform.corners(geometry.width, geometry.height)) {
            return Err(SarError::EmptyIntersection(format!(
                "Region {} lies outside {} ({:.4}..{:.4} E, {:.4}..{:.4} N)",
                self.roi, product.name, footprint.min_lon, footprint.max_lon, footprint.min_lat, footprint.max_lat
            )));
        }
        if product.pixel_window(&self.roi)?.is_none() {
            return Err(SarError::EmptyIntersection(format!(
                "Region {} covers no pixel of {}",
                self.roi, product.name
            )));
        }
        self.gateway.execute(&self.request(), &[product])
    }
}
