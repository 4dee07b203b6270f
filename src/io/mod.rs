//! Input discovery and product codecs

pub mod acquisition;
pub mod annotation;
pub mod dimap;
pub mod registry;
pub mod slc_reader;

pub use acquisition::AcquisitionFile;
pub use annotation::AnnotationParser;
pub use registry::ProductRegistry;
pub use slc_reader::SlcReader;
