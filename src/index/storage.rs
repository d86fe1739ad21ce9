//! File access for the two halves of an index: fixed-size node pages in
//! `.idx` and length-prefixed identifiers in `.ids`.

use crate::index::types::*;
use crate::utils::{decode_varint, encode_varint, read_u32_le, write_u32_le};
use std::fs::{File, OpenOptions};
use std::io::{BufWriter, Read, Seek, SeekFrom, Write};
use std::path::Path;

/// Identifiers longer than this are rejected
pub const MAX_ID_LEN: usize = u16::MAX as usize;

/// Page-granular access to the `.idx` file. One seek and one read or
/// write per call.
pub struct PageFile {
    file: File,
    page_size: usize,
}

impl PageFile {
    /// Create a new structure file. Fails if one already exists.
    pub fn create(path: &Path, header: &IndexHeader) -> IndexResult<Self> {
        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .create_new(true)
            .open(path)
            .map_err(|e| match e.kind() {
                std::io::ErrorKind::AlreadyExists => IndexError::AlreadyExists(path.to_path_buf()),
                _ => IndexError::Io(e),
            })?;

        let mut pages = Self {
            file,
            page_size: header.page_size.as_usize(),
        };
        pages.write_header(header)?;
        Ok(pages)
    }

    /// Open an existing structure file and read its header
    pub fn open(path: &Path, mode: OpenMode) -> IndexResult<(Self, IndexHeader)> {
        if !path.exists() {
            return Err(IndexError::NotFound(path.to_path_buf()));
        }

        let mut file = OpenOptions::new()
            .read(true)
            .write(mode == OpenMode::ReadWrite)
            .open(path)?;

        let mut buffer = vec![0u8; HEADER_LEN];
        file.read_exact(&mut buffer).map_err(|e| match e.kind() {
            std::io::ErrorKind::UnexpectedEof => {
                IndexError::Incompatible(format!("{} is too short", path.display()))
            }
            _ => IndexError::Io(e),
        })?;
        let header = IndexHeader::decode(&buffer)?;

        Ok((
            Self {
                file,
                page_size: header.page_size.as_usize(),
            },
            header,
        ))
    }

    /// Header occupies the whole of page 0
    pub fn write_header(&mut self, header: &IndexHeader) -> IndexResult<()> {
        let mut padded = header.encode();
        padded.resize(self.page_size, 0);
        self.file.seek(SeekFrom::Start(0))?;
        self.file.write_all(&padded)?;
        Ok(())
    }

    pub fn read_page(&mut self, page_id: PageId) -> IndexResult<Vec<u8>> {
        if page_id == 0 {
            return Err(IndexError::Corrupt(
                "page 0 is the header, not a node".to_string(),
            ));
        }

        let offset = page_id as u64 * self.page_size as u64;
        self.file.seek(SeekFrom::Start(offset))?;
        let mut buffer = vec![0u8; self.page_size];
        self.file.read_exact(&mut buffer).map_err(|e| match e.kind() {
            std::io::ErrorKind::UnexpectedEof => {
                IndexError::Corrupt(format!("page {} lies past the end of file", page_id))
            }
            _ => IndexError::Io(e),
        })?;
        Ok(buffer)
    }

    pub fn write_page(&mut self, page_id: PageId, page: &[u8]) -> IndexResult<()> {
        if page_id == 0 {
            return Err(IndexError::Corrupt(
                "cannot write a node over the header page".to_string(),
            ));
        }
        debug_assert_eq!(page.len(), self.page_size);

        let offset = page_id as u64 * self.page_size as u64;
        self.file.seek(SeekFrom::Start(offset))?;
        self.file.write_all(page)?;
        Ok(())
    }

    pub fn sync(&mut self) -> IndexResult<()> {
        self.file.sync_all()?;
        Ok(())
    }
}

/// Append-only identifier store. Each identifier is a varint byte length
/// followed by UTF-8 bytes; leaf entries refer to them by byte offset.
pub struct IdStore {
    file: File,
    writer: Option<BufWriter<File>>,
    len: u64,
}

impl IdStore {
    pub fn create(path: &Path) -> IndexResult<Self> {
        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .create_new(true)
            .open(path)
            .map_err(|e| match e.kind() {
                std::io::ErrorKind::AlreadyExists => IndexError::AlreadyExists(path.to_path_buf()),
                _ => IndexError::Io(e),
            })?;

        let mut header = Vec::with_capacity(IDS_HEADER_LEN as usize);
        header.extend_from_slice(&IDS_MAGIC);
        write_u32_le(&mut header, FORMAT_VERSION)?;

        let mut writer = BufWriter::new(file.try_clone()?);
        writer.write_all(&header)?;
        writer.flush()?;

        Ok(Self {
            file,
            writer: Some(writer),
            len: IDS_HEADER_LEN,
        })
    }

    pub fn open(path: &Path, mode: OpenMode) -> IndexResult<Self> {
        if !path.exists() {
            return Err(IndexError::NotFound(path.to_path_buf()));
        }

        let mut file = OpenOptions::new()
            .read(true)
            .write(mode == OpenMode::ReadWrite)
            .open(path)?;

        let mut header = [0u8; IDS_HEADER_LEN as usize];
        file.read_exact(&mut header).map_err(|_| {
            IndexError::Incompatible(format!("{} is too short", path.display()))
        })?;
        if header[0..4] != IDS_MAGIC {
            return Err(IndexError::Incompatible(format!(
                "{} is not an identifier file",
                path.display()
            )));
        }
        let version = read_u32_le(&mut &header[4..])?;
        if version != FORMAT_VERSION {
            return Err(IndexError::Incompatible(format!(
                "unsupported identifier file version {}",
                version
            )));
        }

        let len = file.seek(SeekFrom::End(0))?;
        let writer = match mode {
            OpenMode::ReadWrite => Some(BufWriter::new(file.try_clone()?)),
            OpenMode::ReadOnly => None,
        };

        Ok(Self { file, writer, len })
    }

    /// Append an identifier, returning its offset
    pub fn append(&mut self, id: &str) -> IndexResult<u64> {
        if id.len() > MAX_ID_LEN {
            return Err(IndexError::IdTooLong(id.len()));
        }
        let writer = self.writer.as_mut().ok_or(IndexError::ReadOnly)?;

        let mut prefix = Vec::with_capacity(3);
        encode_varint(id.len() as u32, &mut prefix);
        writer.write_all(&prefix)?;
        writer.write_all(id.as_bytes())?;

        let offset = self.len;
        self.len += (prefix.len() + id.len()) as u64;
        Ok(offset)
    }

    /// Bytes written so far, header included
    pub fn len(&self) -> u64 {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len <= IDS_HEADER_LEN
    }

    pub fn flush(&mut self) -> IndexResult<()> {
        if let Some(writer) = self.writer.as_mut() {
            writer.flush()?;
            writer.get_ref().sync_all()?;
        }
        Ok(())
    }

    /// Read the whole file for offset lookups with [`IdStore::id_at`]
    pub fn load(&mut self) -> IndexResult<Vec<u8>> {
        if let Some(writer) = self.writer.as_mut() {
            writer.flush()?;
        }
        let mut data = Vec::with_capacity(self.len as usize);
        self.file.seek(SeekFrom::Start(0))?;
        self.file.read_to_end(&mut data)?;
        Ok(data)
    }

    /// Decode the identifier stored at `offset` in a loaded file
    pub fn id_at(data: &[u8], offset: u64) -> IndexResult<String> {
        let start = offset as usize;
        if start < IDS_HEADER_LEN as usize || start >= data.len() {
            return Err(IndexError::Corrupt(format!(
                "identifier offset {} outside file",
                offset
            )));
        }

        let (len, consumed) = decode_varint(&data[start..]).ok_or_else(|| {
            IndexError::Corrupt(format!("bad identifier length at {}", offset))
        })?;
        let begin = start + consumed;
        let end = begin + len as usize;
        if end > data.len() {
            return Err(IndexError::Corrupt(format!(
                "identifier at {} runs past end of file",
                offset
            )));
        }

        String::from_utf8(data[begin..end].to_vec())
            .map_err(|_| IndexError::Corrupt(format!("identifier at {} is not UTF-8", offset)))
    }
}
