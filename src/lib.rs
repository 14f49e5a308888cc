//
// lib.rs
// Dti-Lesion-Stats-rs
//
// Exposes the crate's modules and re-exports the CLI entry point for both binary and library consumers.
//

// Leaf-first: volumes and resampling, masked statistics, then the subject and cohort layers.
pub mod analysis;
pub mod batch;
pub mod cli;
pub mod config;
pub mod error;
pub mod models;
pub mod report;
pub mod resample;
pub mod stats;
pub mod subject;
pub mod volume;

pub use cli::{run as run_cli, Cli};
pub use config::AnalysisConfig;
pub use error::{AnalysisError, ResampleError};
