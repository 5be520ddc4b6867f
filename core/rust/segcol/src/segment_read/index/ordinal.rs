use crate::segment::error::{fmt_err, SegmentResult};
use crate::segment::io::{ByteCursor, PageFooter, PageSource, PageType};
use crate::segment::meta::PageLocator;
use crate::segment_read::index::IndexLoadContext;
use once_cell::sync::OnceCell;

/// Position of one data page in ordinal order.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct PageCursor {
    pub page_index: usize,
    pub first_ordinal: u64,
    /// Exclusive.
    pub end_ordinal: u64,
    pub locator: PageLocator,
}

impl PageCursor {
    pub fn num_rows(&self) -> u64 {
        self.end_ordinal - self.first_ordinal
    }

    pub fn contains(&self, ordinal: u64) -> bool {
        self.first_ordinal <= ordinal && ordinal < self.end_ordinal
    }
}

#[derive(Debug)]
pub struct OrdinalIndex {
    first_ordinals: Vec<u64>,
    pages: Vec<PageLocator>,
    num_rows: u64,
}

impl OrdinalIndex {
    fn parse(body: &[u8], num_entries: u32, num_rows: u64) -> SegmentResult<Self> {
        let mut cursor = ByteCursor::new(body);
        let mut first_ordinals = Vec::with_capacity(num_entries as usize);
        let mut pages = Vec::with_capacity(num_entries as usize);
        for _ in 0..num_entries {
            let first_ordinal = cursor.read_u64()?;
            let offset = cursor.read_u64()?;
            let size = cursor.read_u32()?;
            if let Some(&prev) = first_ordinals.last() {
                if first_ordinal <= prev {
                    return Err(fmt_err!(
                        Corruption,
                        "ordinal index entries out of order: {} after {}",
                        first_ordinal,
                        prev
                    ));
                }
            }
            first_ordinals.push(first_ordinal);
            pages.push(PageLocator::new(offset, size));
        }
        Self::validate(first_ordinals, pages, num_rows)
    }

    fn single_page(locator: PageLocator, num_rows: u64) -> SegmentResult<Self> {
        Self::validate(vec![0], vec![locator], num_rows)
    }

    fn validate(first_ordinals: Vec<u64>, pages: Vec<PageLocator>, num_rows: u64) -> SegmentResult<Self> {
        match (first_ordinals.first(), first_ordinals.last()) {
            (Some(&first), Some(&last)) if first == 0 && last < num_rows => {}
            (None, None) if num_rows == 0 => {}
            _ => {
                return Err(fmt_err!(
                    Corruption,
                    "ordinal index with {} pages does not cover {} rows",
                    pages.len(),
                    num_rows
                ))
            }
        }
        Ok(Self { first_ordinals, pages, num_rows })
    }

    pub fn num_pages(&self) -> usize {
        self.pages.len()
    }

    pub fn num_rows(&self) -> u64 {
        self.num_rows
    }

    pub fn cursor(&self, page_index: usize) -> Option<PageCursor> {
        let locator = *self.pages.get(page_index)?;
        let end_ordinal = self
            .first_ordinals
            .get(page_index + 1)
            .copied()
            .unwrap_or(self.num_rows);
        Some(PageCursor {
            page_index,
            first_ordinal: self.first_ordinals[page_index],
            end_ordinal,
            locator,
        })
    }

    /// Largest page whose first ordinal is `<= ordinal`.
    pub fn seek_at_or_before(&self, ordinal: u64) -> SegmentResult<PageCursor> {
        if ordinal >= self.num_rows {
            return Err(fmt_err!(
                NotFound,
                "ordinal {} is beyond the {} rows of the column",
                ordinal,
                self.num_rows
            ));
        }
        let idx = self.first_ordinals.partition_point(|&first| first <= ordinal);
        idx.checked_sub(1)
            .and_then(|page_index| self.cursor(page_index))
            .ok_or_else(|| fmt_err!(NotFound, "no page holds ordinal {}", ordinal))
    }

    pub fn seek_to_first(&self) -> SegmentResult<PageCursor> {
        self.cursor(0)
            .ok_or_else(|| fmt_err!(NotFound, "column has no data pages"))
    }

    pub fn next_page(&self, cursor: &PageCursor) -> Option<PageCursor> {
        self.cursor(cursor.page_index + 1)
    }

    pub fn iter(&self) -> impl Iterator<Item = PageCursor> + '_ {
        (0..self.num_pages()).filter_map(|idx| self.cursor(idx))
    }
}

/// Maps ordinals to data pages. Loaded once on first use.
#[derive(Debug)]
pub struct OrdinalIndexReader {
    root_page: PageLocator,
    is_root_data_page: bool,
    num_rows: u64,
    index: OnceCell<OrdinalIndex>,
}

impl OrdinalIndexReader {
    pub fn new(root_page: PageLocator, is_root_data_page: bool, num_rows: u64) -> Self {
        Self {
            root_page,
            is_root_data_page,
            num_rows,
            index: OnceCell::new(),
        }
    }

    pub fn is_loaded(&self) -> bool {
        self.index.get().is_some()
    }

    pub fn load(&self, source: &dyn PageSource, ctx: &IndexLoadContext) -> SegmentResult<&OrdinalIndex> {
        self.index.get_or_try_init(|| {
            if self.is_root_data_page {
                return OrdinalIndex::single_page(self.root_page, self.num_rows);
            }
            let handle = source.read_page(&ctx.page_options(PageType::Index), self.root_page)?;
            let PageFooter::Index { num_entries } = handle.footer else {
                return Err(fmt_err!(Corruption, "ordinal index root is not an index page"));
            };
            let index = OrdinalIndex::parse(&handle.body, num_entries, self.num_rows)?;
            log::debug!(
                "loaded ordinal index of {} [pages={}, rows={}]",
                ctx.path,
                index.num_pages(),
                self.num_rows
            );
            Ok(index)
        })
    }
}
