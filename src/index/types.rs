use crate::geometry::{Geometry, Rect};
use crate::utils::{read_f64_le, read_u32_le, read_u64_le, write_f64_le, write_u32_le, write_u64_le};
use serde::{Deserialize, Serialize};
use std::io;
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Page number inside the `.idx` file; page 0 holds the header
pub type PageId = u32;

pub const MAGIC: [u8; 4] = *b"SPIX";
pub const IDS_MAGIC: [u8; 4] = *b"SPID";
pub const FORMAT_VERSION: u32 = 1;

/// Encoded size of [`IndexHeader`]
pub const HEADER_LEN: usize = 72;

/// Encoded size of the `.ids` file header
pub const IDS_HEADER_LEN: u64 = 8;

/// Per-page node header: kind, reserved, entry count, reserved
pub const NODE_HEADER_LEN: usize = 8;

pub const LEAF_RECT_ENTRY_LEN: usize = 4 * 8 + 8;
pub const LEAF_POINT_ENTRY_LEN: usize = 2 * 8 + 8;
pub const INTERNAL_ENTRY_LEN: usize = 4 * 8 + 4;

pub const MIN_PAGE_SIZE: u32 = 512;
pub const MAX_PAGE_SIZE: u32 = 65536;

/// Default number of decoded pages kept in memory
pub const DEFAULT_CACHE_PAGES: usize = 256;

/// Errors that can occur in spatial index operations
#[derive(Debug, Error)]
pub enum IndexError {
    #[error("IO error: {0}")]
    Io(#[from] io::Error),

    #[error("index already exists: {}", .0.display())]
    AlreadyExists(PathBuf),

    #[error("index not found: {}", .0.display())]
    NotFound(PathBuf),

    #[error("incompatible index file: {0}")]
    Incompatible(String),

    #[error("corrupt index: {0}")]
    Corrupt(String),

    #[error("invalid page size {0} (expected a power of two between 512 and 65536)")]
    InvalidPageSize(u32),

    #[error("{kind:?} index cannot store a {geometry} geometry")]
    GeometryMismatch {
        kind: RecordKind,
        geometry: &'static str,
    },

    #[error("invalid geometry: {0}")]
    InvalidGeometry(String),

    #[error("identifier of {0} bytes is too long")]
    IdTooLong(usize),

    #[error("index is opened read-only")]
    ReadOnly,

    #[error("index is closed")]
    Closed,
}

pub type IndexResult<T> = Result<T, IndexError>;

/// What each leaf entry stores
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[repr(u8)]
pub enum RecordKind {
    Point = 1,
    Rectangle = 2,
}

impl RecordKind {
    pub fn from_u8(value: u8) -> Option<Self> {
        match value {
            1 => Some(RecordKind::Point),
            2 => Some(RecordKind::Rectangle),
            _ => None,
        }
    }

    pub fn leaf_entry_len(self) -> usize {
        match self {
            RecordKind::Point => LEAF_POINT_ENTRY_LEN,
            RecordKind::Rectangle => LEAF_RECT_ENTRY_LEN,
        }
    }
}

/// Size of one node page in bytes.
///
/// Callers obtain one from [`PageSize::recommend`] and pass it through
/// unchanged; only the store interprets it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PageSize(u32);

impl PageSize {
    pub fn new(bytes: u32) -> IndexResult<Self> {
        if bytes.is_power_of_two() && (MIN_PAGE_SIZE..=MAX_PAGE_SIZE).contains(&bytes) {
            Ok(Self(bytes))
        } else {
            Err(IndexError::InvalidPageSize(bytes))
        }
    }

    /// Smallest page whose rectangle-leaf fan-out cubed covers the record
    /// count, so typical datasets fit a tree of height three or less.
    pub fn recommend(record_count: usize) -> Self {
        let mut size = MIN_PAGE_SIZE;
        while size < MAX_PAGE_SIZE {
            let fanout = ((size as usize - NODE_HEADER_LEN) / LEAF_RECT_ENTRY_LEN) as u128;
            if fanout.pow(3) >= record_count as u128 {
                break;
            }
            size *= 2;
        }
        Self(size)
    }

    pub fn bytes(self) -> u32 {
        self.0
    }

    pub fn as_usize(self) -> usize {
        self.0 as usize
    }

    pub fn leaf_capacity(self, kind: RecordKind) -> usize {
        (self.as_usize() - NODE_HEADER_LEN) / kind.leaf_entry_len()
    }

    pub fn internal_capacity(self) -> usize {
        (self.as_usize() - NODE_HEADER_LEN) / INTERNAL_ENTRY_LEN
    }
}

impl Default for PageSize {
    fn default() -> Self {
        Self(4096)
    }
}

/// Access mode for [`SpatialIndex::open`](crate::index::SpatialIndex::open)
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OpenMode {
    ReadOnly,
    ReadWrite,
}

/// The files making up one persisted index
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IndexFile {
    /// Header and R-tree node pages
    Structure,
    /// Identifier strings referenced by leaf entries
    Ids,
}

impl IndexFile {
    pub const ALL: [IndexFile; 2] = [IndexFile::Structure, IndexFile::Ids];

    pub fn extension(self) -> &'static str {
        match self {
            IndexFile::Structure => "idx",
            IndexFile::Ids => "ids",
        }
    }

    /// Path of this file for an index whose base path is `index_path`
    pub fn path_for(self, index_path: &Path) -> PathBuf {
        index_path.with_extension(self.extension())
    }
}

/// Index header stored at the start of page 0
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct IndexHeader {
    pub version: u32,
    pub record_kind: RecordKind,
    pub page_size: PageSize,
    pub count: u64,
    /// 0 while the tree is empty
    pub root_page: PageId,
    pub height: u32,
    /// Pages allocated so far, header page included
    pub page_count: u32,
    pub extent: Rect,
}

impl IndexHeader {
    pub fn new(record_kind: RecordKind, page_size: PageSize) -> Self {
        Self {
            version: FORMAT_VERSION,
            record_kind,
            page_size,
            count: 0,
            root_page: 0,
            height: 0,
            page_count: 1,
            extent: Rect::empty(),
        }
    }

    pub fn encode(&self) -> Vec<u8> {
        let mut buf = Vec::with_capacity(HEADER_LEN);
        buf.extend_from_slice(&MAGIC);
        // Writes into a Vec cannot fail
        let _ = self.encode_fields(&mut buf);
        debug_assert_eq!(buf.len(), HEADER_LEN);
        buf
    }

    fn encode_fields(&self, buf: &mut Vec<u8>) -> io::Result<()> {
        write_u32_le(buf, self.version)?;
        buf.extend_from_slice(&[self.record_kind as u8, 0, 0, 0]);
        write_u32_le(buf, self.page_size.bytes())?;
        write_u64_le(buf, self.count)?;
        write_u32_le(buf, self.root_page)?;
        write_u32_le(buf, self.height)?;
        write_u32_le(buf, self.page_count)?;
        write_u32_le(buf, 0)?;
        write_f64_le(buf, self.extent.min_x)?;
        write_f64_le(buf, self.extent.min_y)?;
        write_f64_le(buf, self.extent.max_x)?;
        write_f64_le(buf, self.extent.max_y)?;
        Ok(())
    }

    pub fn decode(data: &[u8]) -> IndexResult<Self> {
        if data.len() < HEADER_LEN {
            return Err(IndexError::Incompatible(format!(
                "header is {} bytes, expected {}",
                data.len(),
                HEADER_LEN
            )));
        }
        if data[0..4] != MAGIC {
            return Err(IndexError::Incompatible("bad magic".to_string()));
        }

        let mut cursor = &data[4..HEADER_LEN];
        let version = read_u32_le(&mut cursor)?;
        if version != FORMAT_VERSION {
            return Err(IndexError::Incompatible(format!(
                "unsupported format version {}",
                version
            )));
        }

        let record_kind = RecordKind::from_u8(cursor[0]).ok_or_else(|| {
            IndexError::Incompatible(format!("unknown record kind {}", cursor[0]))
        })?;
        cursor = &cursor[4..];

        let page_size = PageSize::new(read_u32_le(&mut cursor)?)?;
        let count = read_u64_le(&mut cursor)?;
        let root_page = read_u32_le(&mut cursor)?;
        let height = read_u32_le(&mut cursor)?;
        let page_count = read_u32_le(&mut cursor)?;
        let _reserved = read_u32_le(&mut cursor)?;
        let extent = Rect::new(
            read_f64_le(&mut cursor)?,
            read_f64_le(&mut cursor)?,
            read_f64_le(&mut cursor)?,
            read_f64_le(&mut cursor)?,
        );

        if root_page >= page_count.max(1) {
            return Err(IndexError::Corrupt(format!(
                "root page {} outside {} allocated pages",
                root_page, page_count
            )));
        }

        Ok(Self {
            version,
            record_kind,
            page_size,
            count,
            root_page,
            height,
            page_count,
            extent,
        })
    }
}

/// One stored entry, as read back from an index
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct IndexRecord {
    pub geometry: Geometry,
    pub id: String,
}

/// Summary of a persisted index
#[derive(Debug, Clone, Serialize)]
pub struct IndexStats {
    pub path: PathBuf,
    pub record_kind: RecordKind,
    pub page_size: u32,
    pub count: u64,
    pub height: u32,
    pub page_count: u32,
    pub extent: Option<Rect>,
    pub structure_bytes: u64,
    pub ids_bytes: u64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_recommend_page_size_grows_with_count() {
        assert_eq!(PageSize::recommend(0).bytes(), MIN_PAGE_SIZE);
        assert_eq!(PageSize::recommend(1_000).bytes(), 512);
        assert_eq!(PageSize::recommend(10_000).bytes(), 1024);
        assert_eq!(PageSize::recommend(1_000_000).bytes(), 4096);
        assert_eq!(PageSize::recommend(usize::MAX).bytes(), MAX_PAGE_SIZE);
    }

    #[test]
    fn test_page_size_validation() {
        assert!(PageSize::new(4096).is_ok());
        assert!(matches!(
            PageSize::new(3000),
            Err(IndexError::InvalidPageSize(3000))
        ));
        assert!(PageSize::new(256).is_err());
        assert!(PageSize::new(1 << 17).is_err());
    }

    #[test]
    fn test_capacities() {
        let page = PageSize::new(512).unwrap();
        assert_eq!(page.leaf_capacity(RecordKind::Rectangle), 12);
        assert_eq!(page.leaf_capacity(RecordKind::Point), 21);
        assert_eq!(page.internal_capacity(), 14);
    }

    #[test]
    fn test_header_roundtrip() {
        let mut header = IndexHeader::new(RecordKind::Point, PageSize::default());
        header.count = 17;
        header.root_page = 3;
        header.height = 2;
        header.page_count = 5;
        header.extent = Rect::new(-1.0, -2.0, 3.0, 4.0);

        let bytes = header.encode();
        assert_eq!(bytes.len(), HEADER_LEN);
        assert_eq!(IndexHeader::decode(&bytes).unwrap(), header);
    }

    #[test]
    fn test_header_rejects_foreign_file() {
        let err = IndexHeader::decode(&[0u8; HEADER_LEN]).unwrap_err();
        assert!(matches!(err, IndexError::Incompatible(_)));
    }

    #[test]
    fn test_index_file_paths() {
        let base = Path::new("/data/roads.idx");
        assert_eq!(IndexFile::Structure.path_for(base), Path::new("/data/roads.idx"));
        assert_eq!(IndexFile::Ids.path_for(base), Path::new("/data/roads.ids"));
    }
}
