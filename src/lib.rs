pub mod config;
pub mod error;
pub mod fetch;
pub mod panel;
pub mod period;
pub mod process;
pub mod reference;

#[cfg(test)]
pub(crate) mod test_support;

pub use config::PipelineConfig;
pub use error::{AcquisitionError, QuarterError, RecodeError, ReferenceError, SchemaError};
pub use period::{FractionalDate, Period};
pub use reference::Reference;
