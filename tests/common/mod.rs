//! Fixture helpers shared by the integration tests

#![allow(dead_code)]

use shpidx::geometry::{Point, Rect};
use shpidx::index::{IndexRecord, OpenMode, SpatialIndex};
use shpidx::shapefile::{ShapeType, ShapefileWriter};
use std::fs;
use std::path::{Path, PathBuf};

/// Write a point shapefile; `None` entries become null records
pub fn write_points(dir: &Path, name: &str, points: &[Option<Point>]) -> PathBuf {
    let path = dir.join(name);
    let mut writer = ShapefileWriter::new(ShapeType::Point);
    for point in points {
        match point {
            Some(p) => writer.add_point(*p),
            None => writer.add_null(),
        }
    }
    writer.write(&path).unwrap();
    path
}

/// Write a polygon shapefile with one rectangular ring per record
pub fn write_boxes(dir: &Path, name: &str, boxes: &[Rect]) -> PathBuf {
    let path = dir.join(name);
    let mut writer = ShapefileWriter::new(ShapeType::Polygon);
    for r in boxes {
        writer.add_polygon(&[vec![
            Point::new(r.min_x, r.min_y),
            Point::new(r.min_x, r.max_y),
            Point::new(r.max_x, r.max_y),
            Point::new(r.max_x, r.min_y),
            Point::new(r.min_x, r.min_y),
        ]]);
    }
    writer.write(&path).unwrap();
    path
}

pub fn sample_points(n: usize) -> Vec<Option<Point>> {
    (0..n)
        .map(|i| Some(Point::new(i as f64 * 0.5, (i % 13) as f64 - 6.0)))
        .collect()
}

pub fn sample_boxes(n: usize) -> Vec<Rect> {
    (0..n)
        .map(|i| {
            let x = (i % 20) as f64 * 10.0;
            let y = (i / 20) as f64 * 10.0;
            Rect::new(x, y, x + 1.0 + (i % 7) as f64, y + 2.0)
        })
        .collect()
}

/// Every entry of the index at `path`, sorted by numeric identifier
pub fn read_entries(path: &Path) -> Vec<IndexRecord> {
    let mut index = SpatialIndex::open(path, OpenMode::ReadOnly).unwrap();
    let mut entries = index.entries().unwrap();
    entries.sort_by_key(|e| e.id.parse::<u64>().unwrap());
    entries
}

pub fn index_count(path: &Path) -> u64 {
    SpatialIndex::open(path, OpenMode::ReadOnly).unwrap().count()
}

/// Names of the files in `dir`, sorted
pub fn list_files(dir: &Path) -> Vec<String> {
    let mut names: Vec<String> = fs::read_dir(dir)
        .unwrap()
        .map(|e| e.unwrap().file_name().to_string_lossy().into_owned())
        .collect();
    names.sort();
    names
}
