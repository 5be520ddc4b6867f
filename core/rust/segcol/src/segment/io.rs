/*******************************************************************************
 *     ___                  _   ____  ____
 *    / _ \ _   _  ___  ___| |_|  _ \| __ )
 *   | | | | | | |/ _ \/ __| __| | | |  _ \
 *   | |_| | |_| |  __/\__ \ |_| |_| | |_) |
 *    \__\_\\__,_|\___||___/\__|____/|____/
 *
 *  Copyright (c) 2014-2019 Appsicle
 *  Copyright (c) 2019-2024 QuestDB
 *
 *  Licensed under the Apache License, Version 2.0 (the "License");
 *  you may not use this file except in compliance with the License.
 *  You may obtain a copy of the License at
 *
 *  http://www.apache.org/licenses/LICENSE-2.0
 *
 *  Unless required by applicable law or agreed to in writing, software
 *  distributed under the License is distributed on an "AS IS" BASIS,
 *  WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
 *  See the License for the specific language governing permissions and
 *  limitations under the License.
 *
 ******************************************************************************/
//! Page envelope and the page source contract.
//!
//! Every page in a segment is laid out as
//! `body | footer | footer_len:u32 | crc32:u32`, little-endian,
//! where the checksum covers everything before it.

use crate::segment::error::{fmt_err, SegmentResult};
use crate::segment::meta::{CompressionCodec, PageLocator};
use bytes::Bytes;
use dashmap::DashMap;
use std::sync::atomic::{AtomicUsize, Ordering};

const FOOTER_TAG_DATA: u8 = 1;
const FOOTER_TAG_INDEX: u8 = 2;
const FOOTER_TAG_DICT: u8 = 3;
const TRAILER_SIZE: usize = 8;

#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum PageType {
    Data,
    Index,
    Dictionary,
}

#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct PageReadOptions {
    pub codec: CompressionCodec,
    pub verify_checksum: bool,
    pub use_page_cache: bool,
    pub kept_in_memory: bool,
    pub page_type: PageType,
}

#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct DataPageFooter {
    pub first_ordinal: u64,
    pub num_values: u32,
    pub nullmap_size: u32,
    /// Only meaningful for the lengths column of an array.
    pub first_array_item_ordinal: u64,
}

#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum PageFooter {
    Data(DataPageFooter),
    Index { num_entries: u32 },
    Dictionary { num_values: u32, encoding: u8 },
}

impl PageFooter {
    pub fn page_type(&self) -> PageType {
        match self {
            PageFooter::Data(_) => PageType::Data,
            PageFooter::Index { .. } => PageType::Index,
            PageFooter::Dictionary { .. } => PageType::Dictionary,
        }
    }

    pub fn serialize(&self, out: &mut Vec<u8>) {
        match self {
            PageFooter::Data(footer) => {
                out.push(FOOTER_TAG_DATA);
                out.extend_from_slice(&footer.first_ordinal.to_le_bytes());
                out.extend_from_slice(&footer.num_values.to_le_bytes());
                out.extend_from_slice(&footer.nullmap_size.to_le_bytes());
                out.extend_from_slice(&footer.first_array_item_ordinal.to_le_bytes());
            }
            PageFooter::Index { num_entries } => {
                out.push(FOOTER_TAG_INDEX);
                out.extend_from_slice(&num_entries.to_le_bytes());
            }
            PageFooter::Dictionary { num_values, encoding } => {
                out.push(FOOTER_TAG_DICT);
                out.extend_from_slice(&num_values.to_le_bytes());
                out.push(*encoding);
            }
        }
    }

    pub fn deserialize(buf: &[u8]) -> SegmentResult<Self> {
        let mut cursor = ByteCursor::new(buf);
        let footer = match cursor.read_u8()? {
            FOOTER_TAG_DATA => PageFooter::Data(DataPageFooter {
                first_ordinal: cursor.read_u64()?,
                num_values: cursor.read_u32()?,
                nullmap_size: cursor.read_u32()?,
                first_array_item_ordinal: cursor.read_u64()?,
            }),
            FOOTER_TAG_INDEX => PageFooter::Index { num_entries: cursor.read_u32()? },
            FOOTER_TAG_DICT => PageFooter::Dictionary {
                num_values: cursor.read_u32()?,
                encoding: cursor.read_u8()?,
            },
            tag => return Err(fmt_err!(Corruption, "unknown page footer tag {}", tag)),
        };
        if !cursor.is_empty() {
            return Err(fmt_err!(
                Corruption,
                "{} trailing bytes in page footer",
                cursor.remaining()
            ));
        }
        Ok(footer)
    }
}

/// Builds a full page envelope around `body`.
pub fn encode_page(body: &[u8], footer: &PageFooter) -> Vec<u8> {
    let mut page = Vec::with_capacity(body.len() + 32);
    page.extend_from_slice(body);
    let footer_start = page.len();
    footer.serialize(&mut page);
    let footer_len = (page.len() - footer_start) as u32;
    page.extend_from_slice(&footer_len.to_le_bytes());
    let crc = crc32fast::hash(&page);
    page.extend_from_slice(&crc.to_le_bytes());
    page
}

/// A decoded page: uncompressed body plus its footer.
#[derive(Debug, Clone)]
pub struct PageHandle {
    pub body: Bytes,
    pub footer: PageFooter,
}

impl PageHandle {
    pub fn data_footer(&self) -> SegmentResult<&DataPageFooter> {
        match &self.footer {
            PageFooter::Data(footer) => Ok(footer),
            other => Err(fmt_err!(
                Corruption,
                "expected a data page, found {:?} page",
                other.page_type()
            )),
        }
    }
}

/// Page-level I/O. Implementations own the file handle, checksum
/// verification and decompression.
pub trait PageSource: Send + Sync {
    fn read_page(&self, opts: &PageReadOptions, locator: PageLocator) -> SegmentResult<PageHandle>;
}

/// Serves pages out of a segment held in memory.
pub struct MemoryPageSource {
    segment: Bytes,
    reads: AtomicUsize,
}

impl MemoryPageSource {
    pub fn new(segment: impl Into<Bytes>) -> Self {
        Self { segment: segment.into(), reads: AtomicUsize::new(0) }
    }

    /// Number of `read_page` calls served so far.
    pub fn reads(&self) -> usize {
        self.reads.load(Ordering::Relaxed)
    }
}

impl PageSource for MemoryPageSource {
    fn read_page(&self, opts: &PageReadOptions, locator: PageLocator) -> SegmentResult<PageHandle> {
        self.reads.fetch_add(1, Ordering::Relaxed);
        if opts.codec != CompressionCodec::None {
            return Err(fmt_err!(
                UnsupportedType,
                "compressed pages are not supported by the in-memory source: {:?}",
                opts.codec
            ));
        }
        let start = locator.offset as usize;
        let end = start
            .checked_add(locator.size as usize)
            .filter(|&end| end <= self.segment.len())
            .ok_or_else(|| {
                fmt_err!(
                    Corruption,
                    "page [{}, +{}) is outside the segment of {} bytes",
                    locator.offset,
                    locator.size,
                    self.segment.len()
                )
            })?;
        let page = self.segment.slice(start..end);
        if page.len() < TRAILER_SIZE {
            return Err(fmt_err!(Corruption, "page of {} bytes is too short", page.len()));
        }

        let crc_pos = page.len() - 4;
        if opts.verify_checksum {
            let expected = u32::from_le_bytes(le_array(&page[crc_pos..]));
            let actual = crc32fast::hash(&page[..crc_pos]);
            if expected != actual {
                return Err(fmt_err!(
                    Corruption,
                    "checksum mismatch at offset {}: expected {:#010x}, actual {:#010x}",
                    locator.offset,
                    expected,
                    actual
                ));
            }
        }

        let footer_len = u32::from_le_bytes(le_array(&page[crc_pos - 4..crc_pos])) as usize;
        let footer_end = crc_pos - 4;
        if footer_len > footer_end {
            return Err(fmt_err!(
                Corruption,
                "footer length {} exceeds page of {} bytes",
                footer_len,
                page.len()
            ));
        }
        let footer_start = footer_end - footer_len;
        let footer = PageFooter::deserialize(&page[footer_start..footer_end])?;
        if footer.page_type() != opts.page_type {
            return Err(fmt_err!(
                Corruption,
                "expected {:?} page at offset {}, found {:?}",
                opts.page_type,
                locator.offset,
                footer.page_type()
            ));
        }
        Ok(PageHandle { body: page.slice(..footer_start), footer })
    }
}

/// Caches page handles of an inner source, keyed by locator.
pub struct CachedPageSource<S> {
    inner: S,
    cache: DashMap<PageLocator, PageHandle>,
}

impl<S: PageSource> CachedPageSource<S> {
    pub fn new(inner: S) -> Self {
        Self { inner, cache: DashMap::new() }
    }

    pub fn inner(&self) -> &S {
        &self.inner
    }

    pub fn cached_pages(&self) -> usize {
        self.cache.len()
    }
}

impl<S: PageSource> PageSource for CachedPageSource<S> {
    fn read_page(&self, opts: &PageReadOptions, locator: PageLocator) -> SegmentResult<PageHandle> {
        if opts.use_page_cache || opts.kept_in_memory {
            if let Some(handle) = self.cache.get(&locator) {
                if handle.footer.page_type() != opts.page_type {
                    return Err(fmt_err!(
                        Corruption,
                        "expected {:?} page at offset {}, found cached {:?}",
                        opts.page_type,
                        locator.offset,
                        handle.footer.page_type()
                    ));
                }
                return Ok(handle.clone());
            }
        }
        let handle = self.inner.read_page(opts, locator)?;
        if opts.use_page_cache || opts.kept_in_memory {
            self.cache.insert(locator, handle.clone());
        }
        Ok(handle)
    }
}

#[inline]
fn le_array<const N: usize>(bytes: &[u8]) -> [u8; N] {
    let mut out = [0u8; N];
    out.copy_from_slice(&bytes[..N]);
    out
}

/// Little-endian reader over a page body. Running out of bytes is corruption.
pub(crate) struct ByteCursor<'a> {
    buf: &'a [u8],
    pos: usize,
}

impl<'a> ByteCursor<'a> {
    pub fn new(buf: &'a [u8]) -> Self {
        Self { buf, pos: 0 }
    }

    pub fn remaining(&self) -> usize {
        self.buf.len() - self.pos
    }

    pub fn is_empty(&self) -> bool {
        self.remaining() == 0
    }

    pub fn position(&self) -> usize {
        self.pos
    }

    pub fn read_bytes(&mut self, len: usize) -> SegmentResult<&'a [u8]> {
        if self.remaining() < len {
            return Err(fmt_err!(
                Corruption,
                "unexpected end of page: need {} bytes at {}, have {}",
                len,
                self.pos,
                self.remaining()
            ));
        }
        let res = &self.buf[self.pos..self.pos + len];
        self.pos += len;
        Ok(res)
    }

    pub fn read_u8(&mut self) -> SegmentResult<u8> {
        Ok(self.read_bytes(1)?[0])
    }

    pub fn read_u32(&mut self) -> SegmentResult<u32> {
        Ok(u32::from_le_bytes(le_array(self.read_bytes(4)?)))
    }

    pub fn read_u64(&mut self) -> SegmentResult<u64> {
        Ok(u64::from_le_bytes(le_array(self.read_bytes(8)?)))
    }

    /// A `len:u32` prefixed byte string.
    pub fn read_len_prefixed(&mut self) -> SegmentResult<&'a [u8]> {
        let len = self.read_u32()? as usize;
        self.read_bytes(len)
    }
}
