use crate::geometry::{Geometry, Point, Rect};
use crate::index::node::{ChildRef, LeafEntry, Node, choose_subtree, split_half};
use crate::index::storage::{IdStore, PageFile};
use crate::index::types::*;
use lru::LruCache;
use std::fs;
use std::num::NonZeroUsize;
use std::path::{Path, PathBuf};

/// Smallest cache that still holds a full insertion path plus split pages
const MIN_CACHE_PAGES: usize = 8;

struct CachedPage {
    node: Node,
    dirty: bool,
}

/// Disk-resident R-tree over `(geometry, identifier)` entries.
///
/// Nodes live in fixed-size pages of the `.idx` file and are decoded on
/// demand into an LRU cache; dirty pages are written back on eviction and
/// on [`SpatialIndex::close`]. Identifiers are appended to the `.ids` file.
pub struct SpatialIndex {
    path: PathBuf,
    mode: OpenMode,
    pages: PageFile,
    ids: IdStore,
    header: IndexHeader,
    cache: LruCache<PageId, CachedPage>,
    closed: bool,
}

impl SpatialIndex {
    /// Page size suited to `record_count` entries
    pub fn recommend_page_size(record_count: usize) -> PageSize {
        PageSize::recommend(record_count)
    }

    /// Create an empty index at `path` (the `.idx` file) plus its `.ids`
    /// sibling. Fails if either file already exists.
    pub fn create(path: &Path, kind: RecordKind, page_size: PageSize) -> IndexResult<()> {
        let idx_path = IndexFile::Structure.path_for(path);
        let ids_path = IndexFile::Ids.path_for(path);

        if ids_path.exists() {
            return Err(IndexError::AlreadyExists(ids_path));
        }

        let header = IndexHeader::new(kind, page_size);
        let mut pages = PageFile::create(&idx_path, &header)?;

        let ids = IdStore::create(&ids_path).and_then(|mut ids| {
            ids.flush()?;
            pages.sync()
        });
        if let Err(e) = ids {
            // Leave nothing half-created behind
            let _ = fs::remove_file(&idx_path);
            let _ = fs::remove_file(&ids_path);
            return Err(e);
        }

        log::debug!(
            "created {:?} index {} with {} byte pages",
            kind,
            idx_path.display(),
            page_size.bytes()
        );
        Ok(())
    }

    pub fn open(path: &Path, mode: OpenMode) -> IndexResult<Self> {
        Self::open_with_cache_size(path, mode, DEFAULT_CACHE_PAGES)
    }

    /// Open with a custom cache size (number of pages)
    pub fn open_with_cache_size(
        path: &Path,
        mode: OpenMode,
        cache_pages: usize,
    ) -> IndexResult<Self> {
        let idx_path = IndexFile::Structure.path_for(path);
        let (pages, header) = PageFile::open(&idx_path, mode)?;
        let ids = IdStore::open(&IndexFile::Ids.path_for(path), mode)?;

        let capacity = NonZeroUsize::new(cache_pages.max(MIN_CACHE_PAGES))
            .unwrap_or(NonZeroUsize::MIN);

        Ok(Self {
            path: idx_path,
            mode,
            pages,
            ids,
            header,
            cache: LruCache::new(capacity),
            closed: false,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn record_kind(&self) -> RecordKind {
        self.header.record_kind
    }

    pub fn page_size(&self) -> PageSize {
        self.header.page_size
    }

    /// Number of stored entries
    pub fn count(&self) -> u64 {
        self.header.count
    }

    pub fn height(&self) -> u32 {
        self.header.height
    }

    /// Bounds of everything stored, `None` while empty
    pub fn extent(&self) -> Option<Rect> {
        (!self.header.extent.is_empty()).then_some(self.header.extent)
    }

    pub fn is_closed(&self) -> bool {
        self.closed
    }

    /// Insert one entry
    pub fn push(&mut self, geometry: &Geometry, id: &str) -> IndexResult<()> {
        if self.closed {
            return Err(IndexError::Closed);
        }
        if self.mode == OpenMode::ReadOnly {
            return Err(IndexError::ReadOnly);
        }

        let rect = match (self.header.record_kind, geometry) {
            (RecordKind::Point, Geometry::Point(p)) => Rect::from_point(*p),
            (RecordKind::Point, Geometry::Rect(_)) => {
                return Err(IndexError::GeometryMismatch {
                    kind: RecordKind::Point,
                    geometry: "rectangle",
                });
            }
            (RecordKind::Rectangle, g) => g.envelope(),
        };
        if rect.is_empty() || !rect.is_finite() {
            return Err(IndexError::InvalidGeometry(format!(
                "{} for id {}",
                rect, id
            )));
        }

        let id_offset = self.ids.append(id)?;
        let entry = LeafEntry { rect, id_offset };

        if self.header.root_page == 0 {
            let root = self.allocate_page();
            self.write_node(root, Node::Leaf { entries: vec![entry] })?;
            self.header.root_page = root;
            self.header.height = 1;
        } else {
            self.insert(entry)?;
        }

        self.header.count += 1;
        self.header.extent.expand(&rect);
        Ok(())
    }

    /// Descend to the best leaf, growing child rectangles along the way,
    /// then split upwards if the leaf overflows
    fn insert(&mut self, entry: LeafEntry) -> IndexResult<()> {
        let mut path: Vec<(PageId, usize)> = Vec::with_capacity(self.header.height as usize);
        let mut page_id = self.header.root_page;

        loop {
            match self.read_node(page_id)? {
                Node::Internal { mut children } => {
                    if children.is_empty() {
                        return Err(IndexError::Corrupt(format!(
                            "internal page {} has no children",
                            page_id
                        )));
                    }
                    let idx = choose_subtree(&children, &entry.rect);
                    children[idx].rect.expand(&entry.rect);
                    let child = children[idx].page;
                    self.write_node(page_id, Node::Internal { children })?;

                    path.push((page_id, idx));
                    page_id = child;
                }
                Node::Leaf { mut entries } => {
                    entries.push(entry);
                    if entries.len() <= self.leaf_capacity() {
                        return self.write_node(page_id, Node::Leaf { entries });
                    }

                    let (left, right) = split_half(entries, |e| e.rect);
                    let left_rect = bounds_of(&left, |e| e.rect);
                    let right_rect = bounds_of(&right, |e| e.rect);
                    let sibling = self.allocate_page();

                    self.write_node(page_id, Node::Leaf { entries: left })?;
                    self.write_node(sibling, Node::Leaf { entries: right })?;
                    log::trace!("split leaf {} into {}", page_id, sibling);

                    return self.propagate_split(path, page_id, left_rect, sibling, right_rect);
                }
            }
        }
    }

    /// Replace the split node's rectangle in its parent and add the new
    /// sibling, splitting ancestors as needed. Grows a new root when the
    /// split reaches the top.
    fn propagate_split(
        &mut self,
        mut path: Vec<(PageId, usize)>,
        mut node_page: PageId,
        mut node_rect: Rect,
        mut sibling: PageId,
        mut sibling_rect: Rect,
    ) -> IndexResult<()> {
        while let Some((parent, idx)) = path.pop() {
            let mut children = match self.read_node(parent)? {
                Node::Internal { children } => children,
                Node::Leaf { .. } => {
                    return Err(IndexError::Corrupt(format!(
                        "page {} on an insertion path is a leaf",
                        parent
                    )));
                }
            };

            children[idx].rect = node_rect;
            children.push(ChildRef {
                rect: sibling_rect,
                page: sibling,
            });

            if children.len() <= self.internal_capacity() {
                return self.write_node(parent, Node::Internal { children });
            }

            let (left, right) = split_half(children, |c| c.rect);
            node_rect = bounds_of(&left, |c| c.rect);
            sibling_rect = bounds_of(&right, |c| c.rect);
            sibling = self.allocate_page();
            node_page = parent;

            self.write_node(parent, Node::Internal { children: left })?;
            self.write_node(sibling, Node::Internal { children: right })?;
            log::trace!("split internal {} into {}", parent, sibling);
        }

        let root = self.allocate_page();
        self.write_node(
            root,
            Node::Internal {
                children: vec![
                    ChildRef {
                        rect: node_rect,
                        page: node_page,
                    },
                    ChildRef {
                        rect: sibling_rect,
                        page: sibling,
                    },
                ],
            },
        )?;
        self.header.root_page = root;
        self.header.height += 1;
        log::debug!("tree grew to height {}", self.header.height);
        Ok(())
    }

    fn leaf_capacity(&self) -> usize {
        self.header.page_size.leaf_capacity(self.header.record_kind)
    }

    fn internal_capacity(&self) -> usize {
        self.header.page_size.internal_capacity()
    }

    fn allocate_page(&mut self) -> PageId {
        let page_id = self.header.page_count;
        self.header.page_count += 1;
        page_id
    }

    /// Read a node - cache first, then disk
    fn read_node(&mut self, page_id: PageId) -> IndexResult<Node> {
        if let Some(cached) = self.cache.get(&page_id) {
            return Ok(cached.node.clone());
        }

        let page = self.pages.read_page(page_id)?;
        let node = Node::decode(&page, self.header.record_kind)?;
        self.cache_node(page_id, node.clone(), false)?;
        Ok(node)
    }

    /// Write a node to cache, marked dirty for a later flush
    fn write_node(&mut self, page_id: PageId, node: Node) -> IndexResult<()> {
        self.cache_node(page_id, node, true)
    }

    /// Evicted dirty pages are written to disk
    fn cache_node(&mut self, page_id: PageId, node: Node, dirty: bool) -> IndexResult<()> {
        if let Some((evicted_id, evicted)) = self.cache.push(page_id, CachedPage { node, dirty }) {
            if evicted_id != page_id && evicted.dirty {
                let page = evicted
                    .node
                    .encode(self.header.record_kind, self.header.page_size);
                self.pages.write_page(evicted_id, &page)?;
            }
        }
        Ok(())
    }

    /// Write dirty pages, the header and buffered identifiers to disk
    pub fn flush(&mut self) -> IndexResult<()> {
        if self.mode == OpenMode::ReadOnly {
            return Ok(());
        }

        let kind = self.header.record_kind;
        let page_size = self.header.page_size;
        let mut written = 0usize;
        for (page_id, cached) in self.cache.iter_mut() {
            if cached.dirty {
                self.pages
                    .write_page(*page_id, &cached.node.encode(kind, page_size))?;
                cached.dirty = false;
                written += 1;
            }
        }

        self.ids.flush()?;
        self.pages.write_header(&self.header)?;
        self.pages.sync()?;

        log::debug!(
            "flushed {} pages of {} ({} entries)",
            written,
            self.path.display(),
            self.header.count
        );
        Ok(())
    }

    /// Flush and release the index. Closing twice is a no-op.
    pub fn close(&mut self) -> IndexResult<()> {
        if self.closed {
            return Ok(());
        }
        // Mark closed first so a failed flush is not retried on drop
        self.closed = true;
        self.flush()?;
        self.cache.clear();
        Ok(())
    }

    /// Every stored entry, in tree order
    pub fn entries(&mut self) -> IndexResult<Vec<IndexRecord>> {
        if self.closed {
            return Err(IndexError::Closed);
        }

        let mut leaves = Vec::with_capacity(self.header.count as usize);
        if self.header.root_page != 0 {
            let mut stack = vec![self.header.root_page];
            while let Some(page_id) = stack.pop() {
                match self.read_node(page_id)? {
                    Node::Leaf { entries } => leaves.extend(entries),
                    Node::Internal { children } => {
                        stack.extend(children.iter().rev().map(|c| c.page));
                    }
                }
            }
        }

        let ids = self.ids.load()?;
        let kind = self.header.record_kind;
        leaves
            .into_iter()
            .map(|entry| {
                let geometry = match kind {
                    RecordKind::Point => Geometry::Point(Point::new(entry.rect.min_x, entry.rect.min_y)),
                    RecordKind::Rectangle => Geometry::Rect(entry.rect),
                };
                Ok(IndexRecord {
                    geometry,
                    id: IdStore::id_at(&ids, entry.id_offset)?,
                })
            })
            .collect()
    }

    pub fn stats(&self) -> IndexStats {
        IndexStats {
            path: self.path.clone(),
            record_kind: self.header.record_kind,
            page_size: self.header.page_size.bytes(),
            count: self.header.count,
            height: self.header.height,
            page_count: self.header.page_count,
            extent: self.extent(),
            structure_bytes: file_len(&self.path),
            ids_bytes: file_len(&IndexFile::Ids.path_for(&self.path)),
        }
    }
}

impl Drop for SpatialIndex {
    fn drop(&mut self) {
        // Best effort flush on drop
        if !self.closed {
            if let Err(e) = self.close() {
                log::warn!("failed to flush {} on drop: {}", self.path.display(), e);
            }
        }
    }
}

fn bounds_of<T>(items: &[T], rect_of: impl Fn(&T) -> Rect) -> Rect {
    items
        .iter()
        .fold(Rect::empty(), |acc, item| acc.union(&rect_of(item)))
}

fn file_len(path: &Path) -> u64 {
    fs::metadata(path).map(|m| m.len()).unwrap_or(0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    fn grid_rect(i: usize) -> Rect {
        let x = (i % 37) as f64 * 3.0;
        let y = (i / 37) as f64 * 3.0;
        Rect::new(x, y, x + 2.0, y + 1.0)
    }

    #[test]
    fn test_create_empty_index() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("empty.idx");

        SpatialIndex::create(&path, RecordKind::Rectangle, PageSize::default()).unwrap();
        assert!(path.exists());
        assert!(path.with_extension("ids").exists());

        let mut index = SpatialIndex::open(&path, OpenMode::ReadWrite).unwrap();
        assert_eq!(index.count(), 0);
        assert_eq!(index.height(), 0);
        assert!(index.extent().is_none());
        assert!(index.entries().unwrap().is_empty());
        index.close().unwrap();
    }

    #[test]
    fn test_create_refuses_existing_index() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("twice.idx");

        SpatialIndex::create(&path, RecordKind::Point, PageSize::default()).unwrap();
        let err = SpatialIndex::create(&path, RecordKind::Point, PageSize::default()).unwrap_err();
        assert!(matches!(err, IndexError::AlreadyExists(_)));
    }

    #[test]
    fn test_insert_many_rectangles_splits_and_persists() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("rects.idx");
        let n = 2_000;

        // Small pages and a tiny cache force splits and evictions
        SpatialIndex::create(&path, RecordKind::Rectangle, PageSize::new(512).unwrap()).unwrap();
        let mut index = SpatialIndex::open_with_cache_size(&path, OpenMode::ReadWrite, 8).unwrap();
        for i in 0..n {
            index
                .push(&Geometry::Rect(grid_rect(i)), &format!("r{}", i))
                .unwrap();
        }
        assert!(index.height() >= 3);
        index.close().unwrap();

        let mut index = SpatialIndex::open(&path, OpenMode::ReadOnly).unwrap();
        assert_eq!(index.count(), n as u64);

        let mut entries = index.entries().unwrap();
        assert_eq!(entries.len(), n);
        entries.sort_by_key(|e| e.id[1..].parse::<usize>().unwrap());
        for (i, entry) in entries.iter().enumerate() {
            assert_eq!(entry.id, format!("r{}", i));
            assert_eq!(entry.geometry, Geometry::Rect(grid_rect(i)));
        }

        let extent = index.extent().unwrap();
        assert_eq!(extent.min_x, 0.0);
        assert_eq!(extent.max_x, 36.0 * 3.0 + 2.0);
    }

    #[test]
    fn test_internal_rects_cover_children() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("cover.idx");

        SpatialIndex::create(&path, RecordKind::Rectangle, PageSize::new(512).unwrap()).unwrap();
        let mut index = SpatialIndex::open(&path, OpenMode::ReadWrite).unwrap();
        for i in 0..500 {
            index.push(&Geometry::Rect(grid_rect(i)), &i.to_string()).unwrap();
        }

        let mut stack = vec![index.header.root_page];
        while let Some(page_id) = stack.pop() {
            if let Node::Internal { children } = index.read_node(page_id).unwrap() {
                for child in children {
                    let actual = index.read_node(child.page).unwrap().bounds();
                    assert!(child.rect.contains(&actual));
                    stack.push(child.page);
                }
            }
        }
    }

    #[test]
    fn test_point_index_stores_points() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("pts.idx");

        SpatialIndex::create(&path, RecordKind::Point, PageSize::new(512).unwrap()).unwrap();
        let mut index = SpatialIndex::open(&path, OpenMode::ReadWrite).unwrap();
        for i in 0..100 {
            let p = Point::new(i as f64, -(i as f64));
            index.push(&Geometry::Point(p), &i.to_string()).unwrap();
        }

        let err = index
            .push(&Geometry::Rect(Rect::new(0.0, 0.0, 1.0, 1.0)), "bad")
            .unwrap_err();
        assert!(matches!(err, IndexError::GeometryMismatch { .. }));
        index.close().unwrap();

        let mut index = SpatialIndex::open(&path, OpenMode::ReadOnly).unwrap();
        assert_eq!(index.count(), 100);
        let entries = index.entries().unwrap();
        assert!(entries.iter().all(|e| {
            let i: f64 = e.id.parse().unwrap();
            e.geometry == Geometry::Point(Point::new(i, -i))
        }));
    }

    #[test]
    fn test_read_only_rejects_push() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("ro.idx");

        SpatialIndex::create(&path, RecordKind::Rectangle, PageSize::default()).unwrap();
        let mut index = SpatialIndex::open(&path, OpenMode::ReadOnly).unwrap();
        let err = index
            .push(&Geometry::Rect(Rect::new(0.0, 0.0, 1.0, 1.0)), "1")
            .unwrap_err();
        assert!(matches!(err, IndexError::ReadOnly));
    }

    #[test]
    fn test_push_after_close() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("closed.idx");

        SpatialIndex::create(&path, RecordKind::Rectangle, PageSize::default()).unwrap();
        let mut index = SpatialIndex::open(&path, OpenMode::ReadWrite).unwrap();
        index.close().unwrap();
        index.close().unwrap();
        assert!(matches!(
            index.push(&Geometry::Rect(Rect::new(0.0, 0.0, 1.0, 1.0)), "1"),
            Err(IndexError::Closed)
        ));
    }

    #[test]
    fn test_rejects_non_finite_geometry() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("nan.idx");

        SpatialIndex::create(&path, RecordKind::Point, PageSize::default()).unwrap();
        let mut index = SpatialIndex::open(&path, OpenMode::ReadWrite).unwrap();
        let err = index
            .push(&Geometry::Point(Point::new(f64::NAN, 1.0)), "1")
            .unwrap_err();
        assert!(matches!(err, IndexError::InvalidGeometry(_)));
        assert_eq!(index.count(), 0);
    }

    #[test]
    fn test_open_rejects_foreign_file() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("foreign.idx");
        fs::write(&path, vec![1u8; 1024]).unwrap();
        fs::write(path.with_extension("ids"), b"SPID\x01\0\0\0").unwrap();

        assert!(matches!(
            SpatialIndex::open(&path, OpenMode::ReadOnly),
            Err(IndexError::Incompatible(_))
        ));
    }

    #[test]
    fn test_stats() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("stats.idx");

        SpatialIndex::create(&path, RecordKind::Rectangle, PageSize::new(1024).unwrap()).unwrap();
        let mut index = SpatialIndex::open(&path, OpenMode::ReadWrite).unwrap();
        index.push(&Geometry::Rect(Rect::new(0.0, 0.0, 1.0, 1.0)), "1").unwrap();
        index.close().unwrap();

        let index = SpatialIndex::open(&path, OpenMode::ReadOnly).unwrap();
        let stats = index.stats();
        assert_eq!(stats.count, 1);
        assert_eq!(stats.page_size, 1024);
        assert_eq!(stats.height, 1);
        assert_eq!(stats.page_count, 2);
        assert_eq!(stats.structure_bytes, 2048);
        assert_eq!(stats.extent, Some(Rect::new(0.0, 0.0, 1.0, 1.0)));
    }
}
