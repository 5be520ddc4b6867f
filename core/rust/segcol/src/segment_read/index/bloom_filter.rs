use crate::segment::error::{fmt_err, SegmentResult};
use crate::segment::io::{ByteCursor, PageFooter, PageSource, PageType};
use crate::segment::meta::PageLocator;
use crate::segment_read::index::IndexLoadContext;
use bytes::Bytes;
use once_cell::sync::OnceCell;
use parquet2::bloom_filter::{hash_byte, is_in_set};
use segcol_core::datum::Datum;

const BLOCK_SIZE: usize = 32;

/// Split-block bloom filter of one page.
/// Values are hashed with xxhash64 over their stored bytes.
#[derive(Debug, Clone)]
pub struct BloomFilter {
    bitset: Bytes,
    has_null: bool,
}

impl BloomFilter {
    pub fn try_new(bitset: Bytes, has_null: bool) -> SegmentResult<Self> {
        if bitset.is_empty() || bitset.len() % BLOCK_SIZE != 0 {
            return Err(fmt_err!(
                Corruption,
                "bloom filter of {} bytes is not a whole number of blocks",
                bitset.len()
            ));
        }
        Ok(Self { bitset, has_null })
    }

    pub fn has_null(&self) -> bool {
        self.has_null
    }

    pub fn test_bytes(&self, value: &[u8]) -> bool {
        is_in_set(&self.bitset, hash_byte(value))
    }

    pub fn test_datum(&self, value: &Datum) -> bool {
        match value {
            Datum::Null => self.has_null,
            Datum::Bytes(bytes) => self.test_bytes(bytes),
            other => self.test_bytes(&other.storage_bytes()),
        }
    }
}

fn parse_bloom_filters(body: &Bytes, num_entries: u32) -> SegmentResult<Vec<BloomFilter>> {
    let mut cursor = ByteCursor::new(body);
    let mut filters = Vec::with_capacity(num_entries as usize);
    for _ in 0..num_entries {
        let has_null = cursor.read_u8()? != 0;
        let len = cursor.read_u32()? as usize;
        let start = cursor.position();
        cursor.read_bytes(len)?;
        filters.push(BloomFilter::try_new(body.slice(start..start + len), has_null)?);
    }
    Ok(filters)
}

#[derive(Debug)]
pub struct BloomFilterIndexReader {
    locator: PageLocator,
    filters: OnceCell<Vec<BloomFilter>>,
}

impl BloomFilterIndexReader {
    pub fn new(locator: PageLocator) -> Self {
        Self { locator, filters: OnceCell::new() }
    }

    pub fn load(&self, source: &dyn PageSource, ctx: &IndexLoadContext) -> SegmentResult<&[BloomFilter]> {
        let filters = self.filters.get_or_try_init(|| {
            let handle = source.read_page(&ctx.page_options(PageType::Index), self.locator)?;
            let PageFooter::Index { num_entries } = handle.footer else {
                return Err(fmt_err!(Corruption, "bloom filter index is not an index page"));
            };
            let filters = parse_bloom_filters(&handle.body, num_entries)?;
            log::debug!("loaded bloom filter index of {} [pages={}]", ctx.path, filters.len());
            Ok(filters)
        })?;
        Ok(filters.as_slice())
    }
}
