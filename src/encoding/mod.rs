//! The incremental CNF encoding: variable registry, SAT driver and the
//! per-position encoder.

mod driver;
pub use driver::SatDriver;

mod dnf;

mod encoder;
pub use encoder::Encoding;

mod options;
pub use options::EncodingOptions;

mod registry;
pub use registry::VariableRegistry;
