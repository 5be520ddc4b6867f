use crate::segment::error::{fmt_err, SegmentError, SegmentErrorExt, SegmentResult};
use crate::segment::io::{PageFooter, PageHandle, PageReadOptions, PageSource, PageType};
use crate::segment::meta::{ColumnIndexMeta, ColumnMeta, CompressionCodec, PageLocator};
use crate::segment_read::column_sink::ColumnSink;
use crate::segment_read::condition::{ColumnCondition, DelCondSatisfied};
use crate::segment_read::decoders::dict::DictWordTable;
use crate::segment_read::encoding::EncodingInfo;
use crate::segment_read::index::bitmap::{BitmapIndexIterator, BitmapIndexReader};
use crate::segment_read::index::bloom_filter::BloomFilterIndexReader;
use crate::segment_read::index::ordinal::{OrdinalIndex, OrdinalIndexReader, PageCursor};
use crate::segment_read::index::zone_map::{parse_zone_map, ZoneMapIndexReader};
use crate::segment_read::index::IndexLoadContext;
use crate::segment_read::iter::{BatchRead, ColumnIterator, IteratorStats};
use crate::segment_read::page::ParsedPage;
use crate::segment_read::row_ranges::{RowRange, RowRanges};
use crate::segment_read::{ColumnIteratorOptions, ColumnReaderOptions};
use once_cell::sync::OnceCell;
use segcol_core::col_type::FieldType;
use std::fmt::{Debug, Formatter};
use std::sync::Arc;

/// Reader of a leaf column: its data pages plus up to one index of each kind.
pub struct ScalarColumnReader {
    meta: ColumnMeta,
    num_rows: u64,
    encoding: EncodingInfo,
    index_ctx: IndexLoadContext,
    source: Arc<dyn PageSource>,
    ordinal_index: Option<OrdinalIndexReader>,
    zone_map_index: Option<ZoneMapIndexReader>,
    bitmap_index: Option<BitmapIndexReader>,
    bloom_filter_index: Option<BloomFilterIndexReader>,
    dict: OnceCell<Arc<DictWordTable>>,
}

impl Debug for ScalarColumnReader {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ScalarColumnReader")
            .field("column_id", &self.meta.column_id)
            .field("path", &self.index_ctx.path)
            .field("encoding", &self.encoding)
            .field("num_rows", &self.num_rows)
            .finish()
    }
}

fn duplicate_index(meta: &ColumnMeta, index: &ColumnIndexMeta) -> SegmentError {
    fmt_err!(
        Corruption,
        "column {} has more than one {} index",
        meta.column_id,
        index.kind_name()
    )
}

impl ScalarColumnReader {
    pub fn try_new(
        opts: &ColumnReaderOptions,
        meta: &ColumnMeta,
        num_rows: u64,
        path: &str,
        source: Arc<dyn PageSource>,
    ) -> SegmentResult<Self> {
        let encoding = EncodingInfo::resolve(meta.field_type, meta.encoding)
            .with_context(|_| format!("could not open column {} of {}", meta.column_id, path))?;
        if meta.compression == CompressionCodec::Unknown {
            return Err(fmt_err!(
                UnsupportedType,
                "unknown compression codec for column {} of {}",
                meta.column_id,
                path
            ));
        }

        let mut ordinal_index = None;
        let mut zone_map_index = None;
        let mut bitmap_index = None;
        let mut bloom_filter_index = None;
        for index in &meta.indexes {
            match index {
                ColumnIndexMeta::Ordinal { root_page, is_root_data_page } => {
                    if ordinal_index.is_some() {
                        return Err(duplicate_index(meta, index));
                    }
                    ordinal_index = Some(OrdinalIndexReader::new(*root_page, *is_root_data_page, num_rows));
                }
                ColumnIndexMeta::ZoneMap { segment_zone_map, page_zone_maps } => {
                    if zone_map_index.is_some() {
                        return Err(duplicate_index(meta, index));
                    }
                    zone_map_index = Some(ZoneMapIndexReader::new(segment_zone_map.clone(), *page_zone_maps));
                }
                ColumnIndexMeta::Bitmap { dict_column, bitmap_column } => {
                    if bitmap_index.is_some() {
                        return Err(duplicate_index(meta, index));
                    }
                    bitmap_index = Some(BitmapIndexReader::new(*dict_column, *bitmap_column));
                }
                ColumnIndexMeta::BloomFilter { bloom_filters } => {
                    if bloom_filter_index.is_some() {
                        return Err(duplicate_index(meta, index));
                    }
                    bloom_filter_index = Some(BloomFilterIndexReader::new(*bloom_filters));
                }
                ColumnIndexMeta::Unknown => {
                    return Err(fmt_err!(
                        Corruption,
                        "column {} of {} has an index of unknown kind",
                        meta.column_id,
                        path
                    ));
                }
            }
        }
        if ordinal_index.is_none() && num_rows > 0 {
            return Err(fmt_err!(
                Corruption,
                "column {} of {} has {} rows but no ordinal index",
                meta.column_id,
                path,
                num_rows
            ));
        }

        let mut meta = meta.clone();
        meta.children.clear();
        Ok(Self {
            index_ctx: IndexLoadContext {
                path: path.to_string(),
                codec: meta.compression,
                verify_checksum: opts.verify_checksum,
                kept_in_memory: opts.kept_in_memory,
            },
            meta,
            num_rows,
            encoding,
            source,
            ordinal_index,
            zone_map_index,
            bitmap_index,
            bloom_filter_index,
            dict: OnceCell::new(),
        })
    }

    pub fn meta(&self) -> &ColumnMeta {
        &self.meta
    }

    pub fn num_rows(&self) -> u64 {
        self.num_rows
    }

    pub fn field_type(&self) -> FieldType {
        self.meta.field_type
    }

    pub fn is_nullable(&self) -> bool {
        self.meta.is_nullable
    }

    pub fn encoding_info(&self) -> &EncodingInfo {
        &self.encoding
    }

    pub fn path(&self) -> &str {
        &self.index_ctx.path
    }

    pub fn has_zone_map(&self) -> bool {
        self.zone_map_index.is_some()
    }

    pub fn has_bloom_filter(&self) -> bool {
        self.bloom_filter_index.is_some()
    }

    pub fn has_bitmap_index(&self) -> bool {
        self.bitmap_index.is_some()
    }

    /// Loads every index the column carries. Each loads at most once.
    pub fn load_indexes_if_needed(&self) -> SegmentResult<()> {
        let source = self.source.as_ref();
        let ctx = &self.index_ctx;
        if let Some(index) = &self.ordinal_index {
            index.load(source, ctx).context("ordinal index")?;
        }
        if let Some(index) = &self.zone_map_index {
            index.load(source, ctx).context("zone map index")?;
        }
        if let Some(index) = &self.bitmap_index {
            index.load(source, ctx).context("bitmap index")?;
        }
        if let Some(index) = &self.bloom_filter_index {
            index.load(source, ctx).context("bloom filter index")?;
        }
        Ok(())
    }

    fn ordinal_index(&self) -> SegmentResult<&OrdinalIndex> {
        let reader = self.ordinal_index.as_ref().ok_or_else(|| {
            fmt_err!(NotFound, "column {} has no ordinal index", self.meta.column_id)
        })?;
        reader.load(self.source.as_ref(), &self.index_ctx)
    }

    /// Row ranges of the pages whose zone map may match `cond`, minus the
    /// pages `delete_cond` removes entirely.
    pub fn prune_by_zone_map(
        &self,
        cond: &dyn ColumnCondition,
        delete_cond: Option<&dyn ColumnCondition>,
    ) -> SegmentResult<RowRanges> {
        if self.num_rows == 0 {
            return Ok(RowRanges::new());
        }
        let Some(zone_map_index) = &self.zone_map_index else {
            return Ok(RowRanges::create_single(0, self.num_rows));
        };
        let zone_maps = zone_map_index.load(self.source.as_ref(), &self.index_ctx)?;
        let ordinal_index = self.ordinal_index()?;
        if zone_maps.len() != ordinal_index.num_pages() {
            return Err(fmt_err!(
                Corruption,
                "{} page zone maps for {} data pages in {}",
                zone_maps.len(),
                ordinal_index.num_pages(),
                self.path()
            ));
        }

        let mut ranges = RowRanges::new();
        let mut kept = 0;
        for (zone_map, page) in zone_maps.iter().zip(ordinal_index.iter()) {
            if zone_map.is_empty() {
                if page.num_rows() > 0 {
                    log::warn!(
                        "zone map of page {} in {} reports no rows, page spans {}",
                        page.page_index,
                        self.path(),
                        page.num_rows()
                    );
                }
                continue;
            }
            if !zone_map.pass_all {
                let (min, max) = parse_zone_map(zone_map, self.field_type(), self.meta.length as usize)?;
                if !cond.eval(&min, &max) {
                    continue;
                }
                if delete_cond.is_some_and(|del| del.del_eval(&min, &max) == DelCondSatisfied::Satisfied) {
                    continue;
                }
            }
            kept += 1;
            ranges.add(RowRange::new(page.first_ordinal, page.end_ordinal));
        }

        let total = ordinal_index.num_pages();
        let filtered_percent = if total == 0 { 0.0 } else { (total - kept) as f64 * 100.0 / total as f64 };
        log::debug!(
            "zone map pruning of {} [total_pages={}, kept_pages={}, filtered={:.2}%]",
            self.path(),
            total,
            kept,
            filtered_percent
        );
        Ok(ranges)
    }

    /// Narrows `input` to the pages whose bloom filter may hold a match.
    pub fn prune_by_bloom_filter(&self, cond: &dyn ColumnCondition, input: &RowRanges) -> SegmentResult<RowRanges> {
        if self.num_rows == 0 {
            return Ok(RowRanges::new());
        }
        let Some(bloom_index) = &self.bloom_filter_index else {
            return Ok(input.clone());
        };
        if !cond.can_use_bloom_filter() {
            return Ok(input.clone());
        }
        let filters = bloom_index.load(self.source.as_ref(), &self.index_ctx)?;
        let ordinal_index = self.ordinal_index()?;
        if filters.len() != ordinal_index.num_pages() {
            return Err(fmt_err!(
                Corruption,
                "{} bloom filters for {} data pages in {}",
                filters.len(),
                ordinal_index.num_pages(),
                self.path()
            ));
        }

        let mut pages = Vec::new();
        for range in input.iter() {
            if range.is_empty() || range.from >= self.num_rows {
                continue;
            }
            let mut cursor = Some(ordinal_index.seek_at_or_before(range.from)?);
            while let Some(page) = cursor.filter(|page| page.first_ordinal < range.to) {
                if pages.last().map_or(true, |last: &PageCursor| last.page_index < page.page_index) {
                    pages.push(page);
                }
                cursor = ordinal_index.next_page(&page);
            }
        }

        let mut matching = RowRanges::new();
        for page in &pages {
            if cond.eval_bloom(&filters[page.page_index]) {
                matching.add(RowRange::new(page.first_ordinal, page.end_ordinal));
            }
        }
        let result = RowRanges::intersection(input, &matching);
        log::debug!(
            "bloom filter pruning of {} [candidate_pages={}, rows_before={}, rows_after={}]",
            self.path(),
            pages.len(),
            input.count(),
            result.count()
        );
        Ok(result)
    }

    /// Checks the column-level zone map.
    /// False means no row of the column can satisfy `cond`.
    pub fn match_whole_column(&self, cond: Option<&dyn ColumnCondition>) -> SegmentResult<bool> {
        let (Some(cond), Some(zone_map_index)) = (cond, &self.zone_map_index) else {
            return Ok(true);
        };
        let zone_map = zone_map_index.segment_zone_map();
        if zone_map.pass_all {
            return Ok(true);
        }
        if zone_map.is_empty() {
            return Ok(false);
        }
        let (min, max) = parse_zone_map(zone_map, self.field_type(), self.meta.length as usize)?;
        Ok(cond.eval(&min, &max))
    }

    pub fn seek_to_first(&self) -> SegmentResult<PageCursor> {
        self.ordinal_index()?.seek_to_first()
    }

    pub fn seek_at_or_before(&self, ordinal: u64) -> SegmentResult<PageCursor> {
        self.ordinal_index()?.seek_at_or_before(ordinal)
    }

    pub fn next_page(&self, cursor: &PageCursor) -> SegmentResult<Option<PageCursor>> {
        Ok(self.ordinal_index()?.next_page(cursor))
    }

    pub fn read_page(
        &self,
        opts: &ColumnIteratorOptions,
        locator: PageLocator,
        page_type: PageType,
    ) -> SegmentResult<PageHandle> {
        let read_opts = PageReadOptions {
            codec: self.meta.compression,
            verify_checksum: self.index_ctx.verify_checksum,
            use_page_cache: opts.use_page_cache,
            kept_in_memory: self.index_ctx.kept_in_memory,
            page_type,
        };
        self.source.read_page(&read_opts, locator)
    }

    /// Dictionary of the column, decoded on first use and shared afterwards.
    pub fn dictionary(&self, opts: &ColumnIteratorOptions) -> SegmentResult<Arc<DictWordTable>> {
        let dict = self.dict.get_or_try_init(|| {
            let locator = self.meta.dict_page.ok_or_else(|| {
                fmt_err!(
                    Corruption,
                    "column {} of {} has dictionary coded pages but no dictionary page",
                    self.meta.column_id,
                    self.path()
                )
            })?;
            let handle = self.read_page(opts, locator, PageType::Dictionary)?;
            let PageFooter::Dictionary { num_values, encoding } = handle.footer else {
                return Err(fmt_err!(Corruption, "dictionary locator points at a {:?} page", handle.footer.page_type()));
            };
            let words = DictWordTable::try_new(handle.body, num_values, encoding)?;
            log::debug!(
                "loaded dictionary of {} [words={}, avg_word_len={:.1}]",
                self.path(),
                words.len(),
                words.avg_word_len()
            );
            Ok(Arc::new(words))
        })?;
        Ok(dict.clone())
    }

    pub fn new_bitmap_index_iterator(&self) -> SegmentResult<BitmapIndexIterator<'_>> {
        let index = self.bitmap_index.as_ref().ok_or_else(|| {
            fmt_err!(NotFound, "column {} of {} has no bitmap index", self.meta.column_id, self.path())
        })?;
        index.new_iterator(self.source.as_ref(), &self.index_ctx)
    }

    pub fn new_iterator(self: &Arc<Self>, opts: ColumnIteratorOptions) -> ColumnIterator {
        if self.num_rows == 0 {
            return ColumnIterator::Empty;
        }
        ColumnIterator::Scalar(ScalarColumnIterator::new(self.clone(), opts))
    }
}

/// Streams the values of a scalar column, one data page at a time.
#[derive(Debug)]
pub struct ScalarColumnIterator {
    reader: Arc<ScalarColumnReader>,
    opts: ColumnIteratorOptions,
    page: Option<ParsedPage>,
    page_cursor: Option<PageCursor>,
    current_ordinal: u64,
    seeked: bool,
    stats: IteratorStats,
}

impl ScalarColumnIterator {
    pub fn new(reader: Arc<ScalarColumnReader>, opts: ColumnIteratorOptions) -> Self {
        Self {
            reader,
            opts,
            page: None,
            page_cursor: None,
            current_ordinal: 0,
            seeked: false,
            stats: IteratorStats::default(),
        }
    }

    pub fn reader(&self) -> &Arc<ScalarColumnReader> {
        &self.reader
    }

    pub fn current_ordinal(&self) -> u64 {
        self.current_ordinal
    }

    pub fn current_page(&self) -> Option<&ParsedPage> {
        self.page.as_ref()
    }

    pub fn stats(&self) -> &IteratorStats {
        &self.stats
    }

    pub fn seek_to_first(&mut self) -> SegmentResult<()> {
        let cursor = self.reader.seek_to_first()?;
        self.load_page(cursor)?;
        self.current_ordinal = 0;
        self.seeked = true;
        Ok(())
    }

    /// Positions the iterator at row `ordinal`. `ordinal == num_rows` is the end.
    pub fn seek_to_ordinal(&mut self, ordinal: u64) -> SegmentResult<()> {
        let num_rows = self.reader.num_rows();
        if ordinal > num_rows {
            return Err(fmt_err!(
                NotFound,
                "seek to ordinal {} beyond the {} rows of {}",
                ordinal,
                num_rows,
                self.reader.path()
            ));
        }
        // The end of the column is the end of its last page.
        let target = if ordinal == num_rows { ordinal.saturating_sub(1) } else { ordinal };
        let in_current_page = self.page.as_ref().is_some_and(|page| page.contains(target));
        if !in_current_page && num_rows > 0 {
            let cursor = self.reader.seek_at_or_before(target)?;
            self.load_page(cursor)?;
        }
        if let Some(page) = self.page.as_mut() {
            page.seek_to_position((ordinal - page.first_ordinal) as usize)?;
        }
        self.current_ordinal = ordinal;
        self.seeked = true;
        Ok(())
    }

    pub fn seek_to_page_start(&mut self) -> SegmentResult<()> {
        let first_ordinal = self
            .page
            .as_ref()
            .map(|page| page.first_ordinal)
            .ok_or_else(|| fmt_err!(Internal, "seek to page start before any page was loaded"))?;
        self.seek_to_ordinal(first_ordinal)
    }

    /// Reads up to `count` rows. Fewer rows are returned only at the end of the column.
    pub fn next_batch(&mut self, count: usize, sink: &mut dyn ColumnSink) -> SegmentResult<BatchRead> {
        if !self.seeked {
            return Err(fmt_err!(
                Internal,
                "next_batch on {} before any seek",
                self.reader.path()
            ));
        }
        let mut remaining = count;
        let mut has_null = false;
        while remaining > 0 {
            if !self.page.as_ref().is_some_and(ParsedPage::has_remaining) && !self.load_next_page()? {
                break;
            }
            let Some(page) = self.page.as_mut() else {
                break;
            };
            let (read, saw_null) = page.next_batch(remaining, sink)?;
            has_null |= saw_null;
            remaining -= read;
            self.current_ordinal += read as u64;
        }
        Ok(BatchRead { rows: count - remaining, has_null })
    }

    fn load_next_page(&mut self) -> SegmentResult<bool> {
        let next = match &self.page_cursor {
            Some(cursor) => self.reader.next_page(cursor)?,
            None => None,
        };
        match next {
            Some(cursor) => {
                self.load_page(cursor)?;
                Ok(true)
            }
            None => Ok(false),
        }
    }

    fn load_page(&mut self, cursor: PageCursor) -> SegmentResult<()> {
        let reader = &self.reader;
        let opts = self.opts;
        let handle = reader
            .read_page(&opts, cursor.locator, PageType::Data)
            .with_context(|_| format!("could not read page {} of {}", cursor.page_index, reader.path()))?;
        self.stats.bytes_read += handle.body.len() as u64;
        let page = ParsedPage::create(handle, &cursor, reader.encoding_info(), || reader.dictionary(&opts))?;
        self.stats.pages_decoded += 1;
        self.page = Some(page);
        self.page_cursor = Some(cursor);
        Ok(())
    }
}
