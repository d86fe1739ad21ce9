use crate::geometry::{Point, Rect};
use crate::shapefile::types::*;
use memmap2::Mmap;
use std::fs::{self, File};
use std::path::{Path, PathBuf};

/// Size of the main file and index file headers
pub const HEADER_LEN: usize = 100;

/// Size of a record header (record number + content length)
pub const RECORD_HEADER_LEN: usize = 8;

/// Size of one `.shx` entry (offset + content length)
pub const SHX_ENTRY_LEN: usize = 8;

pub const FILE_CODE: i32 = 9994;
pub const VERSION: i32 = 1000;

#[inline]
fn be_i32(data: &[u8], at: usize) -> i32 {
    i32::from_be_bytes([data[at], data[at + 1], data[at + 2], data[at + 3]])
}

#[inline]
fn le_i32(data: &[u8], at: usize) -> i32 {
    i32::from_le_bytes([data[at], data[at + 1], data[at + 2], data[at + 3]])
}

#[inline]
fn le_f64(data: &[u8], at: usize) -> f64 {
    let mut buf = [0u8; 8];
    buf.copy_from_slice(&data[at..at + 8]);
    f64::from_le_bytes(buf)
}

fn read_rect(data: &[u8], at: usize) -> Rect {
    Rect::new(
        le_f64(data, at),
        le_f64(data, at + 8),
        le_f64(data, at + 16),
        le_f64(data, at + 24),
    )
}

/// Parse the 100-byte header shared by `.shp` and `.shx`
pub fn parse_header(data: &[u8]) -> ShapefileResult<ShapefileHeader> {
    if data.len() < HEADER_LEN {
        return Err(ShapefileError::InvalidHeader(format!(
            "file is {} bytes, header needs {}",
            data.len(),
            HEADER_LEN
        )));
    }

    let file_code = be_i32(data, 0);
    if file_code != FILE_CODE {
        return Err(ShapefileError::InvalidHeader(format!(
            "bad file code {}",
            file_code
        )));
    }

    let version = le_i32(data, 28);
    if version != VERSION {
        return Err(ShapefileError::InvalidHeader(format!(
            "unsupported version {}",
            version
        )));
    }

    // Length is stored in 16-bit words
    let words = be_i32(data, 24);
    if words < (HEADER_LEN / 2) as i32 {
        return Err(ShapefileError::InvalidHeader(format!(
            "declared length {} words is shorter than the header",
            words
        )));
    }

    let shape_type = ShapeType::from_code(le_i32(data, 32))?;

    Ok(ShapefileHeader {
        file_length: words as usize * 2,
        shape_type,
        extent: read_rect(data, 36),
    })
}

/// Forward-only iterator over the records of a `.shp` byte buffer.
///
/// Null records are yielded as `Ok(None)`. Iteration stops after the first
/// error.
pub struct Records<'a> {
    data: &'a [u8],
    offset: usize,
    end: usize,
    pending_error: Option<ShapefileError>,
}

impl<'a> Records<'a> {
    fn new(data: &'a [u8], end: usize) -> Self {
        Self {
            data,
            offset: HEADER_LEN,
            end: end.max(HEADER_LEN),
            pending_error: None,
        }
    }

    fn failed(error: ShapefileError) -> Self {
        Self {
            data: &[],
            offset: 0,
            end: 0,
            pending_error: Some(error),
        }
    }

    fn read_next(&mut self) -> ShapefileResult<Option<Feature>> {
        let offset = self.offset;
        if offset + RECORD_HEADER_LEN > self.end || offset + RECORD_HEADER_LEN > self.data.len() {
            return Err(ShapefileError::Truncated { offset });
        }

        let record = be_i32(self.data, offset);
        let words = be_i32(self.data, offset + 4);
        if words < 2 {
            return Err(ShapefileError::InvalidRecord {
                record,
                reason: format!("content length {} words", words),
            });
        }

        let start = offset + RECORD_HEADER_LEN;
        let stop = start + words as usize * 2;
        if stop > self.data.len() || stop > self.end {
            return Err(ShapefileError::Truncated { offset });
        }
        self.offset = stop;

        decode_record(record, &self.data[start..stop])
    }
}

impl Iterator for Records<'_> {
    type Item = ShapefileResult<Option<Feature>>;

    fn next(&mut self) -> Option<Self::Item> {
        if let Some(error) = self.pending_error.take() {
            self.offset = self.end;
            return Some(Err(error));
        }

        if self.offset >= self.end {
            return None;
        }

        match self.read_next() {
            Ok(feature) => Some(Ok(feature)),
            Err(e) => {
                self.offset = self.end;
                Some(Err(e))
            }
        }
    }
}

/// Decode one record's content into a feature
fn decode_record(record: i32, content: &[u8]) -> ShapefileResult<Option<Feature>> {
    let shape_type = ShapeType::from_code(le_i32(content, 0)).map_err(|_| {
        ShapefileError::InvalidRecord {
            record,
            reason: format!("unknown shape type {}", le_i32(content, 0)),
        }
    })?;

    if shape_type == ShapeType::Null {
        return Ok(None);
    }

    let envelope = if shape_type.is_point() {
        if content.len() < 20 {
            return Err(ShapefileError::InvalidRecord {
                record,
                reason: "point record shorter than 20 bytes".to_string(),
            });
        }
        Rect::from_point(Point::new(le_f64(content, 4), le_f64(content, 12)))
    } else {
        if content.len() < 36 {
            return Err(ShapefileError::InvalidRecord {
                record,
                reason: "record shorter than its bounding box".to_string(),
            });
        }
        read_rect(content, 4)
    };

    if envelope.is_empty() || !envelope.is_finite() {
        return Err(ShapefileError::InvalidRecord {
            record,
            reason: format!("invalid envelope {}", envelope),
        });
    }

    Ok(Some(Feature {
        id: record.to_string(),
        shape_type,
        envelope,
    }))
}

/// Iterate the records of a complete `.shp` byte buffer
pub fn records(data: &[u8]) -> ShapefileResult<Records<'_>> {
    let header = parse_header(data)?;
    Ok(Records::new(data, header.file_length))
}

/// Count records by walking record headers only
fn scan_record_count(data: &[u8], end: usize) -> usize {
    let end = end.min(data.len());
    let mut offset = HEADER_LEN;
    let mut count = 0;

    while offset + RECORD_HEADER_LEN <= end {
        let words = be_i32(data, offset + 4);
        if words < 0 {
            break;
        }
        let next = offset + RECORD_HEADER_LEN + words as usize * 2;
        if next > end {
            break;
        }
        offset = next;
        count += 1;
    }

    count
}

/// Record count from a `.shx` index, if one is present and sane
fn shx_record_count(shx_path: &Path) -> Option<usize> {
    let data = fs::read(shx_path).ok()?;
    let header = parse_header(&data).ok()?;
    let body = header.file_length.min(data.len()).checked_sub(HEADER_LEN)?;
    Some(body / SHX_ENTRY_LEN)
}

/// A memory-mapped shapefile opened for reading
#[derive(Debug)]
pub struct Shapefile {
    path: PathBuf,
    mmap: Option<Mmap>,
    header: ShapefileHeader,
    count: usize,
}

impl Shapefile {
    /// Open a `.shp` file. The sibling `.shx`, when present, supplies the
    /// record count; otherwise the record headers are scanned once.
    pub fn open(path: &Path) -> ShapefileResult<Self> {
        if !path.exists() {
            return Err(ShapefileError::NotFound(path.to_path_buf()));
        }

        let file = File::open(path)?;
        let len = file.metadata()?.len() as usize;
        if len < HEADER_LEN {
            return Err(ShapefileError::InvalidHeader(format!(
                "file is {} bytes, header needs {}",
                len, HEADER_LEN
            )));
        }

        // SAFETY: the map is read-only and dropped on close
        let mmap = unsafe { Mmap::map(&file)? };
        let header = parse_header(&mmap)?;

        let shx_path = path.with_extension("shx");
        let count = match shx_record_count(&shx_path) {
            Some(count) => count,
            None => {
                log::debug!("no usable .shx for {}, scanning records", path.display());
                scan_record_count(&mmap, header.file_length)
            }
        };

        log::debug!(
            "opened {} ({:?}, {} records)",
            path.display(),
            header.shape_type,
            count
        );

        Ok(Self {
            path: path.to_path_buf(),
            mmap: Some(mmap),
            header,
            count,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn header(&self) -> &ShapefileHeader {
        &self.header
    }

    pub fn shape_type(&self) -> ShapeType {
        self.header.shape_type
    }

    /// Number of records, including null records
    pub fn count(&self) -> usize {
        self.count
    }

    pub fn is_closed(&self) -> bool {
        self.mmap.is_none()
    }

    /// Lazily iterate the records in file order
    pub fn iter(&self) -> Records<'_> {
        match &self.mmap {
            Some(mmap) => Records::new(mmap, self.header.file_length),
            None => Records::failed(ShapefileError::Closed),
        }
    }

    /// Release the mapping. Further iteration yields `Closed`.
    pub fn close(&mut self) {
        self.mmap = None;
    }
}
