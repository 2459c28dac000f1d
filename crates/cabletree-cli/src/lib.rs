//! Library surface of the cabletree driver
//!
//! The binary in `main.rs` is a thin shell over these modules; exposing them
//! as a library keeps option resolution, spike export and trace output
//! testable in isolation.

pub mod config;
pub mod error;
pub mod exporter;
pub mod trace;

pub use config::{Cli, Options};
pub use error::{CliError, CliResult};
pub use exporter::SpikeFileExporter;
pub use trace::SampleTrace;
