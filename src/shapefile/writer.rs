use crate::geometry::{Point, Rect};
use crate::shapefile::reader::{FILE_CODE, HEADER_LEN, RECORD_HEADER_LEN, VERSION};
use crate::shapefile::types::*;
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;

/// Writes a `.shp` + `.shx` pair.
///
/// Records are buffered in memory and written by [`ShapefileWriter::write`].
/// Only 2D geometry is produced; null records can be mixed into any type.
pub struct ShapefileWriter {
    shape_type: ShapeType,
    /// Encoded record contents (without record headers)
    records: Vec<Vec<u8>>,
    extent: Rect,
}

impl ShapefileWriter {
    pub fn new(shape_type: ShapeType) -> Self {
        Self {
            shape_type,
            records: Vec::new(),
            extent: Rect::empty(),
        }
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn add_null(&mut self) {
        self.records.push(ShapeType::Null.code().to_le_bytes().to_vec());
    }

    pub fn add_point(&mut self, point: Point) {
        let mut content = Vec::with_capacity(20);
        content.extend_from_slice(&ShapeType::Point.code().to_le_bytes());
        content.extend_from_slice(&point.x.to_le_bytes());
        content.extend_from_slice(&point.y.to_le_bytes());
        self.extent.expand(&Rect::from_point(point));
        self.records.push(content);
    }

    pub fn add_multipoint(&mut self, points: &[Point]) {
        let bbox = bounds(points.iter());
        let mut content = Vec::new();
        content.extend_from_slice(&ShapeType::MultiPoint.code().to_le_bytes());
        push_rect(&mut content, &bbox);
        content.extend_from_slice(&(points.len() as i32).to_le_bytes());
        for p in points {
            content.extend_from_slice(&p.x.to_le_bytes());
            content.extend_from_slice(&p.y.to_le_bytes());
        }
        self.extent.expand(&bbox);
        self.records.push(content);
    }

    pub fn add_polyline(&mut self, parts: &[Vec<Point>]) {
        self.add_multipart(ShapeType::PolyLine, parts);
    }

    pub fn add_polygon(&mut self, rings: &[Vec<Point>]) {
        self.add_multipart(ShapeType::Polygon, rings);
    }

    fn add_multipart(&mut self, shape_type: ShapeType, parts: &[Vec<Point>]) {
        let bbox = bounds(parts.iter().flatten());
        let num_points: usize = parts.iter().map(Vec::len).sum();

        let mut content = Vec::new();
        content.extend_from_slice(&shape_type.code().to_le_bytes());
        push_rect(&mut content, &bbox);
        content.extend_from_slice(&(parts.len() as i32).to_le_bytes());
        content.extend_from_slice(&(num_points as i32).to_le_bytes());

        let mut start = 0i32;
        for part in parts {
            content.extend_from_slice(&start.to_le_bytes());
            start += part.len() as i32;
        }
        for p in parts.iter().flatten() {
            content.extend_from_slice(&p.x.to_le_bytes());
            content.extend_from_slice(&p.y.to_le_bytes());
        }

        self.extent.expand(&bbox);
        self.records.push(content);
    }

    /// Write `<path>` and its `.shx` sibling
    pub fn write(&self, path: &Path) -> ShapefileResult<()> {
        let shp_len: usize = HEADER_LEN
            + self
                .records
                .iter()
                .map(|r| RECORD_HEADER_LEN + r.len())
                .sum::<usize>();
        let shx_len = HEADER_LEN + self.records.len() * 8;

        let extent = if self.extent.is_empty() {
            Rect::new(0.0, 0.0, 0.0, 0.0)
        } else {
            self.extent
        };

        let mut shp = BufWriter::new(File::create(path)?);
        let mut shx = BufWriter::new(File::create(path.with_extension("shx"))?);

        shp.write_all(&self.header(shp_len, &extent))?;
        shx.write_all(&self.header(shx_len, &extent))?;

        let mut offset = HEADER_LEN;
        for (i, content) in self.records.iter().enumerate() {
            let words = (content.len() / 2) as i32;

            shp.write_all(&((i + 1) as i32).to_be_bytes())?;
            shp.write_all(&words.to_be_bytes())?;
            shp.write_all(content)?;

            shx.write_all(&((offset / 2) as i32).to_be_bytes())?;
            shx.write_all(&words.to_be_bytes())?;

            offset += RECORD_HEADER_LEN + content.len();
        }

        shp.flush()?;
        shx.flush()?;
        Ok(())
    }

    fn header(&self, file_len: usize, extent: &Rect) -> Vec<u8> {
        let mut header = vec![0u8; HEADER_LEN];
        header[0..4].copy_from_slice(&FILE_CODE.to_be_bytes());
        header[24..28].copy_from_slice(&((file_len / 2) as i32).to_be_bytes());
        header[28..32].copy_from_slice(&VERSION.to_le_bytes());
        header[32..36].copy_from_slice(&self.shape_type.code().to_le_bytes());

        let mut bbox = Vec::with_capacity(32);
        push_rect(&mut bbox, extent);
        header[36..68].copy_from_slice(&bbox);
        header
    }
}

fn push_rect(buf: &mut Vec<u8>, rect: &Rect) {
    buf.extend_from_slice(&rect.min_x.to_le_bytes());
    buf.extend_from_slice(&rect.min_y.to_le_bytes());
    buf.extend_from_slice(&rect.max_x.to_le_bytes());
    buf.extend_from_slice(&rect.max_y.to_le_bytes());
}

fn bounds<'a>(points: impl Iterator<Item = &'a Point>) -> Rect {
    points.fold(Rect::empty(), |acc, p| acc.union(&Rect::from_point(*p)))
}
