pub mod config;
pub mod error;
pub mod pipeline;
pub mod server;

pub use config::Config;
pub use error::{DagcheckError, Result};
pub use pipeline::{analyze, has_cycle, PipelineGraph, PipelineReport};
