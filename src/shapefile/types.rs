use crate::geometry::Rect;
use serde::{Deserialize, Serialize};
use std::io;
use std::path::PathBuf;
use thiserror::Error;

/// Errors raised while reading or writing shapefiles
#[derive(Debug, Error)]
pub enum ShapefileError {
    #[error("shapefile not found: {}", .0.display())]
    NotFound(PathBuf),

    #[error("IO error: {0}")]
    Io(#[from] io::Error),

    #[error("not a shapefile: {0}")]
    InvalidHeader(String),

    #[error("unsupported shape type code {0}")]
    UnsupportedShapeType(i32),

    #[error("record at byte {offset} is truncated")]
    Truncated { offset: usize },

    #[error("record {record} is malformed: {reason}")]
    InvalidRecord { record: i32, reason: String },

    #[error("shapefile is closed")]
    Closed,
}

pub type ShapefileResult<T> = Result<T, ShapefileError>;

/// ESRI shape type codes
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[repr(i32)]
pub enum ShapeType {
    Null = 0,
    Point = 1,
    PolyLine = 3,
    Polygon = 5,
    MultiPoint = 8,
    PointZ = 11,
    PolyLineZ = 13,
    PolygonZ = 15,
    MultiPointZ = 18,
    PointM = 21,
    PolyLineM = 23,
    PolygonM = 25,
    MultiPointM = 28,
    MultiPatch = 31,
}

impl ShapeType {
    pub fn from_code(code: i32) -> ShapefileResult<Self> {
        let shape_type = match code {
            0 => ShapeType::Null,
            1 => ShapeType::Point,
            3 => ShapeType::PolyLine,
            5 => ShapeType::Polygon,
            8 => ShapeType::MultiPoint,
            11 => ShapeType::PointZ,
            13 => ShapeType::PolyLineZ,
            15 => ShapeType::PolygonZ,
            18 => ShapeType::MultiPointZ,
            21 => ShapeType::PointM,
            23 => ShapeType::PolyLineM,
            25 => ShapeType::PolygonM,
            28 => ShapeType::MultiPointM,
            31 => ShapeType::MultiPatch,
            other => return Err(ShapefileError::UnsupportedShapeType(other)),
        };
        Ok(shape_type)
    }

    pub fn code(self) -> i32 {
        self as i32
    }

    /// Single-point shapes: content is the coordinate pair, no bounding box
    pub fn is_point(self) -> bool {
        matches!(
            self,
            ShapeType::Point | ShapeType::PointZ | ShapeType::PointM
        )
    }

    pub fn kind(self) -> ShapeKind {
        if self.is_point() {
            ShapeKind::Point
        } else {
            ShapeKind::Other
        }
    }
}

/// Coarse classification of a dataset's geometry
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ShapeKind {
    Point,
    Other,
}

/// Parsed 100-byte main file header
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ShapefileHeader {
    /// Total file length in bytes, as declared
    pub file_length: usize,
    pub shape_type: ShapeType,
    pub extent: Rect,
}

/// A non-null shapefile record reduced to what indexing needs
#[derive(Debug, Clone, PartialEq)]
pub struct Feature {
    /// Record number as stored in the record header, unique within the file
    pub id: String,
    pub shape_type: ShapeType,
    pub envelope: Rect,
}

impl Feature {
    pub fn envelope(&self) -> Rect {
        self.envelope
    }
}
