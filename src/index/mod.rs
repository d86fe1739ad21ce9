//! Disk-resident spatial index store.
//!
//! An index is a pair of files sharing a base name: `<base>.idx` holds the
//! header page and R-tree node pages, `<base>.ids` holds the identifiers the
//! leaf entries point at.

pub mod node;
pub mod stats;
pub mod storage;
pub mod tree;
pub mod types;

pub use tree::SpatialIndex;
pub use types::*;
