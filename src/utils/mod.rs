//! Utility functions shared across the crate.
//!
//! - [`app_data`] - User configuration file
//! - [`encoding`] - Varint and fixed-width little-endian helpers
//! - [`progress`] - Progress bars, or a no-op stand-in without the `progress` feature

pub mod app_data;
pub mod encoding;
pub mod progress;

pub use app_data::*;
pub use encoding::*;
