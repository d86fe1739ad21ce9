//! The two collaborators a build talks to, and the default backend that
//! wires them to shapefiles and [`SpatialIndex`].

use crate::geometry::Geometry;
use crate::index::{
    DEFAULT_CACHE_PAGES, IndexResult, OpenMode, PageSize, RecordKind, SpatialIndex,
};
use crate::shapefile::{Feature, ShapeKind, Shapefile, ShapefileResult};
use std::path::Path;

/// An opened dataset of geometric records
pub trait GeometrySource {
    fn shape_kind(&self) -> ShapeKind;

    /// Number of records, null records included
    fn count(&self) -> usize;

    /// Forward-only pass over the records. Absent (null) records are
    /// `Ok(None)`.
    fn records(&mut self) -> Box<dyn Iterator<Item = ShapefileResult<Option<Feature>>> + '_>;

    fn close(&mut self);
}

/// An index opened for writing
pub trait IndexStore {
    fn push(&mut self, geometry: &Geometry, id: &str) -> IndexResult<()>;

    fn count(&self) -> u64;

    /// Persist everything and release the handle
    fn close(&mut self) -> IndexResult<()>;
}

/// Opens sources and creates stores for build jobs
pub trait IndexBackend {
    type Source: GeometrySource;
    type Store: IndexStore;

    fn open_source(&self, path: &Path) -> ShapefileResult<Self::Source>;

    fn recommend_page_size(&self, record_count: usize) -> PageSize;

    fn create_store(&self, path: &Path, kind: RecordKind, page_size: PageSize) -> IndexResult<()>;

    /// Open a freshly created store for reading and writing
    fn open_store(&self, path: &Path) -> IndexResult<Self::Store>;
}

impl GeometrySource for Shapefile {
    fn shape_kind(&self) -> ShapeKind {
        self.shape_type().kind()
    }

    fn count(&self) -> usize {
        Shapefile::count(self)
    }

    fn records(&mut self) -> Box<dyn Iterator<Item = ShapefileResult<Option<Feature>>> + '_> {
        Box::new(self.iter())
    }

    fn close(&mut self) {
        Shapefile::close(self)
    }
}

impl IndexStore for SpatialIndex {
    fn push(&mut self, geometry: &Geometry, id: &str) -> IndexResult<()> {
        SpatialIndex::push(self, geometry, id)
    }

    fn count(&self) -> u64 {
        SpatialIndex::count(self)
    }

    fn close(&mut self) -> IndexResult<()> {
        SpatialIndex::close(self)
    }
}

/// Shapefiles in, paged R-tree indexes out
#[derive(Debug, Clone, Copy)]
pub struct ShapefileBackend {
    cache_pages: usize,
}

impl ShapefileBackend {
    pub fn new(cache_pages: usize) -> Self {
        Self { cache_pages }
    }
}

impl Default for ShapefileBackend {
    fn default() -> Self {
        Self::new(DEFAULT_CACHE_PAGES)
    }
}

impl IndexBackend for ShapefileBackend {
    type Source = Shapefile;
    type Store = SpatialIndex;

    fn open_source(&self, path: &Path) -> ShapefileResult<Shapefile> {
        Shapefile::open(path)
    }

    fn recommend_page_size(&self, record_count: usize) -> PageSize {
        SpatialIndex::recommend_page_size(record_count)
    }

    fn create_store(&self, path: &Path, kind: RecordKind, page_size: PageSize) -> IndexResult<()> {
        SpatialIndex::create(path, kind, page_size)
    }

    fn open_store(&self, path: &Path) -> IndexResult<SpatialIndex> {
        SpatialIndex::open_with_cache_size(path, OpenMode::ReadWrite, self.cache_pages)
    }
}
