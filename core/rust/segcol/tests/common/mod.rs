#![allow(dead_code)]

use parquet2::bloom_filter::{hash_byte, insert};
use roaring::RoaringBitmap;
use segcol::segment::error::SegmentResult;
use segcol::segment::io::{
    encode_page, DataPageFooter, MemoryPageSource, PageFooter, PageHandle, PageReadOptions, PageSource, PageType,
};
use segcol::segment::meta::{ColumnIndexMeta, ColumnMeta, CompressionCodec, EncodingType, PageLocator, ZoneMap};
use segcol_core::col_type::FieldType;
use segcol_core::datum::Datum;
use std::collections::BTreeMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

pub const BLOOM_FILTER_BYTES: usize = 256;

pub fn write_uleb128(out: &mut Vec<u8>, mut value: u64) {
    loop {
        let byte = (value & 0x7f) as u8;
        value >>= 7;
        if value == 0 {
            out.push(byte);
            break;
        }
        out.push(byte | 0x80);
    }
}

/// One bit-packed hybrid RLE run holding all of `values`.
pub fn encode_bitpacked(out: &mut Vec<u8>, values: &[u32], num_bits: usize) {
    if values.is_empty() {
        return;
    }
    let groups = values.len().div_ceil(8);
    write_uleb128(out, ((groups as u64) << 1) | 1);
    let mut packed = vec![0u8; groups * num_bits];
    for (i, &value) in values.iter().enumerate() {
        for bit in 0..num_bits {
            if value >> bit & 1 == 1 {
                let pos = i * num_bits + bit;
                packed[pos / 8] |= 1 << (pos % 8);
            }
        }
    }
    out.extend_from_slice(&packed);
}

pub fn bit_width(max_value: u32) -> usize {
    (32 - max_value.leading_zeros()).max(1) as usize
}

/// How `ColumnBuilder` lays out a scalar column.
#[derive(Debug, Clone)]
pub struct ColumnSpec {
    pub field_type: FieldType,
    pub encoding: EncodingType,
    pub nullable: bool,
    pub length: u32,
    pub page_rows: usize,
    pub zone_map: bool,
    pub bloom_filter: bool,
    pub bitmap_index: bool,
    /// Dictionary coded columns: pages with this index fall back to plain values.
    pub plain_fallback_pages: Vec<usize>,
    /// Lengths of an array: record the first item ordinal of every page.
    pub array_lengths: bool,
    /// Store the single page's locator as the ordinal root.
    pub root_is_data_page: bool,
}

impl ColumnSpec {
    pub fn new(field_type: FieldType) -> Self {
        Self {
            field_type,
            encoding: EncodingType::Default,
            nullable: false,
            length: 0,
            page_rows: 1024,
            zone_map: false,
            bloom_filter: false,
            bitmap_index: false,
            plain_fallback_pages: vec![],
            array_lengths: false,
            root_is_data_page: false,
        }
    }

    pub fn nullable(mut self) -> Self {
        self.nullable = true;
        self
    }

    pub fn encoding(mut self, encoding: EncodingType) -> Self {
        self.encoding = encoding;
        self
    }

    pub fn page_rows(mut self, page_rows: usize) -> Self {
        self.page_rows = page_rows;
        self
    }

    pub fn with_zone_map(mut self) -> Self {
        self.zone_map = true;
        self
    }

    pub fn with_bloom_filter(mut self) -> Self {
        self.bloom_filter = true;
        self
    }

    pub fn with_bitmap_index(mut self) -> Self {
        self.bitmap_index = true;
        self
    }

    fn resolved_encoding(&self) -> EncodingType {
        match self.encoding {
            EncodingType::Default if self.field_type == FieldType::Boolean => EncodingType::Rle,
            EncodingType::Default if self.field_type.is_binary() => EncodingType::Dict,
            EncodingType::Default => EncodingType::Plain,
            other => other,
        }
    }
}

/// Writes pages into an in-memory segment.
#[derive(Debug, Default)]
pub struct SegmentBuilder {
    buf: Vec<u8>,
    next_column_id: u32,
}

impl SegmentBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_page(&mut self, body: &[u8], footer: PageFooter) -> PageLocator {
        let page = encode_page(body, &footer);
        let locator = PageLocator::new(self.buf.len() as u64, page.len() as u32);
        self.buf.extend_from_slice(&page);
        locator
    }

    pub fn add_index_page(&mut self, body: &[u8], num_entries: usize) -> PageLocator {
        self.add_page(body, PageFooter::Index { num_entries: num_entries as u32 })
    }

    pub fn bytes(&self) -> Vec<u8> {
        self.buf.clone()
    }

    pub fn source(&self) -> Arc<CountingPageSource> {
        Arc::new(CountingPageSource::new(MemoryPageSource::new(self.bytes())))
    }

    /// Writes the pages and indexes of a scalar column holding `values`.
    /// `Datum::Null` entries are nulls.
    pub fn add_column(&mut self, spec: &ColumnSpec, values: &[Datum]) -> ColumnMeta {
        let encoding = spec.resolved_encoding();
        let column_id = self.next_column_id;
        self.next_column_id += 1;

        let dictionary = (encoding == EncodingType::Dict).then(|| dictionary_of(values));
        let dict_page = dictionary.as_ref().map(|words| {
            let mut body = Vec::new();
            for word in words.keys() {
                body.extend_from_slice(&(word.len() as u32).to_le_bytes());
                body.extend_from_slice(word);
            }
            self.add_page(&body, PageFooter::Dictionary { num_values: words.len() as u32, encoding: 0 })
        });

        let mut pages = Vec::new();
        let mut page_zone_maps = Vec::new();
        let mut blooms = Vec::new();
        let mut items_before = 0u64;
        for (page_index, chunk) in values.chunks(spec.page_rows.max(1)).enumerate() {
            let first_ordinal = (page_index * spec.page_rows) as u64;
            let non_null: Vec<&Datum> = chunk.iter().filter(|v| !v.is_null()).collect();
            let mut body = match (&dictionary, encoding) {
                (Some(words), EncodingType::Dict) if !spec.plain_fallback_pages.contains(&page_index) => {
                    let codes: Vec<u32> = non_null.iter().map(|v| words[&v.storage_bytes()]).collect();
                    let width = bit_width(words.len().saturating_sub(1) as u32);
                    let mut body = vec![1u8, width as u8];
                    encode_bitpacked(&mut body, &codes, width);
                    body
                }
                (_, EncodingType::Dict) => {
                    let mut body = vec![0u8];
                    encode_plain_binary(&mut body, &non_null);
                    body
                }
                (_, EncodingType::Rle) => {
                    let bits: Vec<u32> = non_null.iter().map(|v| u32::from(**v == Datum::Boolean(true))).collect();
                    let mut body = vec![1u8];
                    encode_bitpacked(&mut body, &bits, 1);
                    body
                }
                _ if spec.field_type.is_binary() => {
                    let mut body = Vec::new();
                    encode_plain_binary(&mut body, &non_null);
                    body
                }
                _ => {
                    let mut body = Vec::new();
                    for value in &non_null {
                        value.encode_storage(&mut body);
                    }
                    body
                }
            };
            let values_len = body.len();
            if spec.nullable {
                let nulls: Vec<u32> = chunk.iter().map(|v| u32::from(v.is_null())).collect();
                encode_bitpacked(&mut body, &nulls, 1);
            }
            let footer = DataPageFooter {
                first_ordinal,
                num_values: chunk.len() as u32,
                nullmap_size: (body.len() - values_len) as u32,
                first_array_item_ordinal: items_before,
            };
            if spec.array_lengths {
                items_before += chunk
                    .iter()
                    .map(|v| match v {
                        Datum::Int(len) => *len as u64,
                        _ => 0,
                    })
                    .sum::<u64>();
            }
            pages.push((first_ordinal, self.add_page(&body, PageFooter::Data(footer))));
            page_zone_maps.push(zone_map_of(chunk));
            blooms.push(bloom_of(chunk));
        }

        let mut indexes = Vec::new();
        if !pages.is_empty() {
            let ordinal = if spec.root_is_data_page && pages.len() == 1 {
                ColumnIndexMeta::Ordinal { root_page: pages[0].1, is_root_data_page: true }
            } else {
                let mut body = Vec::new();
                for (first_ordinal, locator) in &pages {
                    body.extend_from_slice(&first_ordinal.to_le_bytes());
                    body.extend_from_slice(&locator.offset.to_le_bytes());
                    body.extend_from_slice(&locator.size.to_le_bytes());
                }
                ColumnIndexMeta::Ordinal {
                    root_page: self.add_index_page(&body, pages.len()),
                    is_root_data_page: false,
                }
            };
            indexes.push(ordinal);
        }
        if spec.zone_map {
            let body = encode_zone_maps(&page_zone_maps);
            indexes.push(ColumnIndexMeta::ZoneMap {
                segment_zone_map: zone_map_of(values),
                page_zone_maps: self.add_index_page(&body, page_zone_maps.len()),
            });
        }
        if spec.bloom_filter {
            let mut body = Vec::new();
            for (has_null, bitset) in &blooms {
                body.push(u8::from(*has_null));
                body.extend_from_slice(&(bitset.len() as u32).to_le_bytes());
                body.extend_from_slice(bitset);
            }
            indexes.push(ColumnIndexMeta::BloomFilter {
                bloom_filters: self.add_index_page(&body, blooms.len()),
            });
        }
        if spec.bitmap_index {
            let (dict_column, bitmap_column) = self.add_bitmap_index(values);
            indexes.push(ColumnIndexMeta::Bitmap { dict_column, bitmap_column });
        }

        ColumnMeta {
            column_id,
            field_type: spec.field_type,
            encoding: spec.encoding,
            compression: CompressionCodec::None,
            length: spec.length,
            is_nullable: spec.nullable,
            num_rows: values.len() as u64,
            indexes,
            dict_page,
            children: vec![],
        }
    }

    fn add_bitmap_index(&mut self, values: &[Datum]) -> (PageLocator, PageLocator) {
        let mut bitmaps: BTreeMap<Vec<u8>, RoaringBitmap> = BTreeMap::new();
        let mut nulls = RoaringBitmap::new();
        for (row, value) in values.iter().enumerate() {
            if value.is_null() {
                nulls.insert(row as u32);
            } else {
                bitmaps.entry(value.storage_bytes()).or_default().insert(row as u32);
            }
        }
        let mut dict_body = Vec::new();
        for word in bitmaps.keys() {
            dict_body.extend_from_slice(&(word.len() as u32).to_le_bytes());
            dict_body.extend_from_slice(word);
        }
        let mut bitmap_body = Vec::new();
        let has_null = !nulls.is_empty();
        for bitmap in bitmaps.values().chain(has_null.then_some(&nulls)) {
            let mut bytes = Vec::new();
            bitmap.serialize_into(&mut bytes).unwrap();
            bitmap_body.extend_from_slice(&(bytes.len() as u32).to_le_bytes());
            bitmap_body.extend_from_slice(&bytes);
        }
        let num_bitmaps = bitmaps.len() + usize::from(has_null);
        let dict_column = self.add_index_page(&dict_body, bitmaps.len());
        let bitmap_column = self.add_index_page(&bitmap_body, num_bitmaps);
        (dict_column, bitmap_column)
    }

    /// Array rows of ints. `None` rows are null arrays.
    pub fn add_int_array_column(&mut self, rows: &[Option<Vec<i32>>], page_rows: usize) -> ColumnMeta {
        let nullable = rows.iter().any(Option::is_none);
        let items: Vec<Datum> = rows.iter().flatten().flatten().map(|v| Datum::Int(*v)).collect();
        let lengths: Vec<Datum> = rows
            .iter()
            .map(|row| Datum::Int(row.as_ref().map_or(0, |items| items.len() as i32)))
            .collect();
        let item_meta = self.add_column(&ColumnSpec::new(FieldType::Int).page_rows(page_rows), &items);
        let mut lengths_spec = ColumnSpec::new(FieldType::Int).page_rows(page_rows);
        lengths_spec.array_lengths = true;
        let lengths_meta = self.add_column(&lengths_spec, &lengths);
        let mut children = vec![item_meta, lengths_meta];
        if nullable {
            let flags: Vec<Datum> = rows.iter().map(|row| Datum::Boolean(row.is_none())).collect();
            let flags_spec = ColumnSpec::new(FieldType::Boolean).page_rows(page_rows);
            children.push(self.add_column(&flags_spec, &flags));
        }
        let column_id = self.next_column_id;
        self.next_column_id += 1;
        ColumnMeta {
            column_id,
            field_type: FieldType::Array,
            encoding: EncodingType::Default,
            compression: CompressionCodec::None,
            length: 0,
            is_nullable: nullable,
            num_rows: rows.len() as u64,
            indexes: vec![],
            dict_page: None,
            children,
        }
    }
}

fn dictionary_of(values: &[Datum]) -> BTreeMap<Vec<u8>, u32> {
    let mut words: BTreeMap<Vec<u8>, u32> = values
        .iter()
        .filter(|v| !v.is_null())
        .map(|v| (v.storage_bytes(), 0))
        .collect();
    for (code, slot) in words.values_mut().enumerate() {
        *slot = code as u32;
    }
    words
}

fn encode_plain_binary(out: &mut Vec<u8>, values: &[&Datum]) {
    for value in values {
        let bytes = value.storage_bytes();
        out.extend_from_slice(&(bytes.len() as u32).to_le_bytes());
        out.extend_from_slice(&bytes);
    }
}

pub fn zone_map_of(values: &[Datum]) -> ZoneMap {
    let mut min: Option<&Datum> = None;
    let mut max: Option<&Datum> = None;
    for value in values.iter().filter(|v| !v.is_null()) {
        if min.map_or(true, |m| value < m) {
            min = Some(value);
        }
        if max.map_or(true, |m| value > m) {
            max = Some(value);
        }
    }
    ZoneMap {
        min: min.map(ToString::to_string).unwrap_or_default(),
        max: max.map(ToString::to_string).unwrap_or_default(),
        has_null: values.iter().any(Datum::is_null),
        has_not_null: min.is_some(),
        pass_all: false,
    }
}

pub fn encode_zone_maps(zone_maps: &[ZoneMap]) -> Vec<u8> {
    let mut out = Vec::new();
    for zone_map in zone_maps {
        let flags = u8::from(zone_map.has_null) | u8::from(zone_map.has_not_null) << 1 | u8::from(zone_map.pass_all) << 2;
        out.push(flags);
        for text in [&zone_map.min, &zone_map.max] {
            out.extend_from_slice(&(text.len() as u32).to_le_bytes());
            out.extend_from_slice(text.as_bytes());
        }
    }
    out
}

fn bloom_of(values: &[Datum]) -> (bool, Vec<u8>) {
    let mut bitset = vec![0u8; BLOOM_FILTER_BYTES];
    for value in values.iter().filter(|v| !v.is_null()) {
        insert(&mut bitset, hash_byte(value.storage_bytes()));
    }
    (values.iter().any(Datum::is_null), bitset)
}

pub fn ints(values: impl IntoIterator<Item = i32>) -> Vec<Datum> {
    values.into_iter().map(Datum::Int).collect()
}

pub fn strings(values: &[Option<&str>]) -> Vec<Datum> {
    values
        .iter()
        .map(|v| v.map_or(Datum::Null, |s| Datum::Bytes(s.as_bytes().to_vec())))
        .collect()
}

/// Counts reads per page type.
pub struct CountingPageSource {
    inner: MemoryPageSource,
    data: AtomicUsize,
    index: AtomicUsize,
    dictionary: AtomicUsize,
}

impl CountingPageSource {
    pub fn new(inner: MemoryPageSource) -> Self {
        Self {
            inner,
            data: AtomicUsize::new(0),
            index: AtomicUsize::new(0),
            dictionary: AtomicUsize::new(0),
        }
    }

    pub fn reads(&self, page_type: PageType) -> usize {
        self.counter(page_type).load(Ordering::SeqCst)
    }

    pub fn total_reads(&self) -> usize {
        self.inner.reads()
    }

    fn counter(&self, page_type: PageType) -> &AtomicUsize {
        match page_type {
            PageType::Data => &self.data,
            PageType::Index => &self.index,
            PageType::Dictionary => &self.dictionary,
        }
    }
}

impl PageSource for CountingPageSource {
    fn read_page(&self, opts: &PageReadOptions, locator: PageLocator) -> SegmentResult<PageHandle> {
        self.counter(opts.page_type).fetch_add(1, Ordering::SeqCst);
        self.inner.read_page(opts, locator)
    }
}
