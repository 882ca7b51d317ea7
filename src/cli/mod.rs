//! CLI layer
//!
//! Command-line interface using clap.

pub mod output;

pub use output::Output;
