pub mod config;
pub mod error;
pub mod fetch;
pub mod pipeline;
pub mod server;
pub mod torch;
pub mod vocab;

/// Version identifier of the inference runtime backing this build, reported
/// by the health probe.
pub const RUNTIME_VERSION: &str = "tch-0.14 (libtorch 2.0)";
