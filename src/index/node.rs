//! R-tree node representation and its fixed-width page encoding.

use crate::geometry::Rect;
use crate::index::types::*;
use crate::utils::{read_f64_le, read_u32_le, read_u64_le, write_f64_le, write_u32_le, write_u64_le};
use std::io;

const LEAF_TAG: u8 = 0;
const INTERNAL_TAG: u8 = 1;

/// An entry in a leaf node
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LeafEntry {
    pub rect: Rect,
    /// Byte offset of the identifier in the `.ids` file
    pub id_offset: u64,
}

/// A child reference in an internal node
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ChildRef {
    pub rect: Rect,
    pub page: PageId,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Node {
    Leaf { entries: Vec<LeafEntry> },
    Internal { children: Vec<ChildRef> },
}

impl Node {
    pub fn empty_leaf() -> Self {
        Node::Leaf {
            entries: Vec::new(),
        }
    }

    pub fn len(&self) -> usize {
        match self {
            Node::Leaf { entries } => entries.len(),
            Node::Internal { children } => children.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn is_leaf(&self) -> bool {
        matches!(self, Node::Leaf { .. })
    }

    pub fn bounds(&self) -> Rect {
        match self {
            Node::Leaf { entries } => entries
                .iter()
                .fold(Rect::empty(), |acc, e| acc.union(&e.rect)),
            Node::Internal { children } => children
                .iter()
                .fold(Rect::empty(), |acc, c| acc.union(&c.rect)),
        }
    }

    /// Encode into a zero-padded page of `page_size` bytes.
    ///
    /// Point leaves store only the lower-left corner of each entry.
    pub fn encode(&self, kind: RecordKind, page_size: PageSize) -> Vec<u8> {
        let mut page = Vec::with_capacity(page_size.as_usize());
        // Writes into a Vec cannot fail
        let _ = self.encode_into(&mut page, kind);
        debug_assert!(page.len() <= page_size.as_usize());
        page.resize(page_size.as_usize(), 0);
        page
    }

    fn encode_into(&self, page: &mut Vec<u8>, kind: RecordKind) -> io::Result<()> {
        let (tag, len) = match self {
            Node::Leaf { entries } => (LEAF_TAG, entries.len()),
            Node::Internal { children } => (INTERNAL_TAG, children.len()),
        };
        page.push(tag);
        page.push(0);
        page.extend_from_slice(&(len as u16).to_le_bytes());
        write_u32_le(page, 0)?;

        match self {
            Node::Leaf { entries } => {
                for entry in entries {
                    write_f64_le(page, entry.rect.min_x)?;
                    write_f64_le(page, entry.rect.min_y)?;
                    if kind == RecordKind::Rectangle {
                        write_f64_le(page, entry.rect.max_x)?;
                        write_f64_le(page, entry.rect.max_y)?;
                    }
                    write_u64_le(page, entry.id_offset)?;
                }
            }
            Node::Internal { children } => {
                for child in children {
                    write_rect(page, &child.rect)?;
                    write_u32_le(page, child.page)?;
                }
            }
        }
        Ok(())
    }

    pub fn decode(page: &[u8], kind: RecordKind) -> IndexResult<Self> {
        if page.len() < NODE_HEADER_LEN {
            return Err(IndexError::Corrupt(format!(
                "page of {} bytes has no node header",
                page.len()
            )));
        }

        let tag = page[0];
        let len = u16::from_le_bytes([page[2], page[3]]) as usize;
        let entry_len = match tag {
            LEAF_TAG => kind.leaf_entry_len(),
            INTERNAL_TAG => INTERNAL_ENTRY_LEN,
            other => {
                return Err(IndexError::Corrupt(format!("unknown node tag {}", other)));
            }
        };

        if NODE_HEADER_LEN + len * entry_len > page.len() {
            return Err(IndexError::Corrupt(format!(
                "{} entries overflow a {} byte page",
                len,
                page.len()
            )));
        }

        let mut cursor = &page[NODE_HEADER_LEN..];
        if tag == LEAF_TAG {
            let mut entries = Vec::with_capacity(len);
            for _ in 0..len {
                let rect = match kind {
                    RecordKind::Point => {
                        let x = read_f64_le(&mut cursor)?;
                        let y = read_f64_le(&mut cursor)?;
                        Rect::new(x, y, x, y)
                    }
                    RecordKind::Rectangle => read_rect(&mut cursor)?,
                };
                let id_offset = read_u64_le(&mut cursor)?;
                entries.push(LeafEntry { rect, id_offset });
            }
            Ok(Node::Leaf { entries })
        } else {
            let mut children = Vec::with_capacity(len);
            for _ in 0..len {
                let rect = read_rect(&mut cursor)?;
                let child_page = read_u32_le(&mut cursor)?;
                children.push(ChildRef {
                    rect,
                    page: child_page,
                });
            }
            Ok(Node::Internal { children })
        }
    }
}

fn write_rect(buf: &mut Vec<u8>, rect: &Rect) -> io::Result<()> {
    write_f64_le(buf, rect.min_x)?;
    write_f64_le(buf, rect.min_y)?;
    write_f64_le(buf, rect.max_x)?;
    write_f64_le(buf, rect.max_y)
}

fn read_rect(cursor: &mut &[u8]) -> io::Result<Rect> {
    Ok(Rect::new(
        read_f64_le(cursor)?,
        read_f64_le(cursor)?,
        read_f64_le(cursor)?,
        read_f64_le(cursor)?,
    ))
}

/// Split an overfull node's items into two halves.
///
/// Items are ordered by center along the axis where centers spread widest,
/// then cut in the middle.
pub fn split_half<T>(mut items: Vec<T>, rect_of: impl Fn(&T) -> Rect) -> (Vec<T>, Vec<T>) {
    let (mut min_cx, mut max_cx) = (f64::INFINITY, f64::NEG_INFINITY);
    let (mut min_cy, mut max_cy) = (f64::INFINITY, f64::NEG_INFINITY);
    for item in &items {
        let c = rect_of(item).centroid();
        min_cx = min_cx.min(c.x);
        max_cx = max_cx.max(c.x);
        min_cy = min_cy.min(c.y);
        max_cy = max_cy.max(c.y);
    }

    let by_x = max_cx - min_cx >= max_cy - min_cy;
    items.sort_by(|a, b| {
        let (ca, cb) = (rect_of(a).centroid(), rect_of(b).centroid());
        let (ka, kb) = if by_x { (ca.x, cb.x) } else { (ca.y, cb.y) };
        ka.partial_cmp(&kb).unwrap_or(std::cmp::Ordering::Equal)
    });

    let right = items.split_off(items.len() / 2);
    (items, right)
}

/// Index of the child needing the least enlargement to cover `rect`,
/// ties broken by smaller area
pub fn choose_subtree(children: &[ChildRef], rect: &Rect) -> usize {
    let mut best_idx = 0;
    let mut best_enlargement = f64::INFINITY;
    let mut best_area = f64::INFINITY;

    for (i, child) in children.iter().enumerate() {
        let enlargement = child.rect.enlargement(rect);
        let area = child.rect.area();

        if enlargement < best_enlargement
            || (enlargement == best_enlargement && area < best_area)
        {
            best_enlargement = enlargement;
            best_area = area;
            best_idx = i;
        }
    }

    best_idx
}
