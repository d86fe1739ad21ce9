//! # shpidx - spatial index builder for shapefiles
//!
//! shpidx reads the records of an ESRI shapefile and persists a paged
//! R-tree over their envelopes, so later spatial queries can skip the
//! full scan of the dataset.
//!
//! ## Architecture
//!
//! - [`geometry`] - Points, rectangles and the geometry stored per entry
//! - [`shapefile`] - Memory-mapped `.shp`/`.shx` reader and a writer
//! - [`index`] - Disk-resident R-tree store (`.idx` pages + `.ids` identifiers)
//! - [`build`] - The build pipeline: jobs, batches, cleanup and reporting hooks
//! - [`output`] - Console reporter (progress bars, coloured status lines)
//! - [`utils`] - Configuration, binary encoding, progress shim
//!
//! ## Quick Start
//!
//! ```no_run
//! use shpidx::build::{self, ShapefileBackend, SilentObserver};
//! use std::path::Path;
//!
//! let backend = ShapefileBackend::default();
//! let report = build::build(
//!     &backend,
//!     Path::new("/data/roads.shp"),
//!     None,
//!     false,
//!     &mut SilentObserver,
//! )
//! .unwrap();
//!
//! for job in &report.jobs {
//!     println!("{}: {:?}", job.destination.display(), job.count());
//! }
//! ```
//!
//! ## Index layout
//!
//! Point datasets store one point per entry, every other shape type its
//! bounding rectangle. Page size grows with the record count so typical
//! datasets fit a tree of height three or less.

pub mod build;
pub mod geometry;
pub mod index;
pub mod output;
pub mod shapefile;
pub mod utils;
