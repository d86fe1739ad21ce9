//! ESRI shapefile access.
//!
//! Only what index building needs is decoded: the main file header, each
//! record's number, shape type and envelope. Attribute tables (`.dbf`) are
//! never read.

pub mod reader;
pub mod types;
pub mod writer;

pub use reader::{Records, Shapefile, parse_header, records};
pub use types::*;
pub use writer::ShapefileWriter;
