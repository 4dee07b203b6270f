//! Uniform entry point for raster operators
//!
//! The gateway validates an invocation against the operator catalogue and
//! hands it to a [`RasterEngine`]. It keeps no state between calls apart from
//! the optional slot that serializes memory-heavy operators.

use crate::core::operators::{validate_parameters, OperatorKind, OperatorRequest, ParameterMap};
use crate::core::product::Product;
use crate::types::{SarError, SarResult};
use std::path::Path;
use std::sync::{Arc, Mutex};
use std::time::Instant;

/// External raster-processing collaborator
pub trait RasterEngine: Send + Sync {
    fn name(&self) -> &str;

    /// Open a raw acquisition archive or a persisted stage artifact
    fn read_product(&self, path: &Path) -> SarResult<Product>;

    /// Persist a product as a BEAM-DIMAP artifact at `path` (`.dim`)
    fn write_product(&self, product: &Product, path: &Path) -> SarResult<()>;

    /// Run one operator on already validated parameters
    fn execute(&self, request: &OperatorRequest, inputs: &[&Product]) -> SarResult<Product>;
}

pub struct OperatorGateway {
    engine: Arc<dyn RasterEngine>,
    heavy_slot: Option<Mutex<()>>,
}

impl OperatorGateway {
    pub fn new(engine: Arc<dyn RasterEngine>) -> Self {
        Self { engine, heavy_slot: None }
    }

    /// Run BackGeocoding and Coherence one at a time across threads
    pub fn with_serialized_heavy_operators(mut self, serialize: bool) -> Self {
        self.heavy_slot = serialize.then(|| Mutex::new(()));
        self
    }

    pub fn engine(&self) -> &Arc<dyn RasterEngine> {
        &self.engine
    }

    /// Invoke an operator by name with an untyped parameter map
    pub fn invoke(&self, operator: &str, parameters: &ParameterMap, inputs: &[&Product]) -> SarResult<Product> {
        let kind: OperatorKind = operator.parse()?;
        let request = OperatorRequest::from_parameters(kind, parameters)?;
        self.execute(&request, inputs)
    }

    /// Invoke an operator with a typed request
    ///
    /// Typed requests go through the same schema as untyped ones, so a zero
    /// window built in code is rejected just like one read from a config.
    pub fn execute(&self, request: &OperatorRequest, inputs: &[&Product]) -> SarResult<Product> {
        let kind = request.kind();
        validate_parameters(kind, &request.parameters())?;
        let arity = kind.arity();
        if !arity.accepts(inputs.len()) {
            return Err(SarError::InvalidParameter(format!(
                "Operator {} takes {} input products, got {}",
                kind,
                arity,
                inputs.len()
            )));
        }

        log::debug!("{} via {} engine: {}", kind, self.engine.name(), request.describe());
        let start = Instant::now();

        let _guard = match (&self.heavy_slot, kind.is_memory_heavy()) {
            (Some(slot), true) => Some(slot.lock().unwrap_or_else(|poisoned| poisoned.into_inner())),
            _ => None,
        };
        let product = self.engine.execute(request, inputs)?;

        log::debug!(
            "{} produced {} ({}x{}, {} bands) in {:?}",
            kind,
            product.name,
            product.width,
            product.height,
            product.bands.len(),
            start.elapsed()
        );
        Ok(product)
    }
}
