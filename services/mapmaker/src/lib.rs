//! Renders a styled street map for one job file.
//!
//! The binary in `main.rs` loads a [`config::JobConfig`], builds network
//! [`pipeline::Sources`] and runs the [`pipeline::Pipeline`]. Tests drive the
//! same pipeline with in-memory sources.

pub mod config;
pub mod pipeline;

pub use config::JobConfig;
pub use pipeline::{ComposedData, FetchedData, Pipeline, PipelineError, PipelineOutput, Sources, Stage};
