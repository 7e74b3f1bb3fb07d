// src/config/mod.rs

//! Run configuration for growdag.
//!
//! Responsibilities:
//! - Define the TOML-backed data model (`model.rs`).
//! - Load a config file from disk (`loader.rs`).
//! - Validate the loaded values (`validate.rs`).

pub mod loader;
pub mod model;
pub mod validate;

pub use loader::{load_and_validate, load_from_path, parse_and_validate};
pub use model::{RawRunConfig, RetrySection, RunConfig, RunSection};
