//! Column readers over a segment.
//!
//! A [`ColumnReader`] is built once per column and shared between
//! iterators. Scalar columns own their pages and indexes, array columns are
//! composed from the readers of their children.

use crate::segment::error::{fmt_err, SegmentErrorCause, SegmentResult};
use crate::segment::io::PageSource;
use crate::segment::meta::ColumnMeta;
use crate::segment_read::array::ArrayColumnReader;
use crate::segment_read::condition::ColumnCondition;
use crate::segment_read::iter::ColumnIterator;
use crate::segment_read::row_ranges::RowRanges;
use crate::segment_read::scalar::ScalarColumnReader;
use segcol_core::col_type::FieldType;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

pub mod array;
pub mod column_sink;
pub mod condition;
pub mod decoders;
pub mod default_value;
pub mod encoding;
pub mod index;
pub mod iter;
pub mod page;
pub mod row_ranges;
pub mod scalar;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ColumnReaderOptions {
    pub verify_checksum: bool,
    /// Ask the page source to keep every page of the column resident.
    pub kept_in_memory: bool,
}

impl Default for ColumnReaderOptions {
    fn default() -> Self {
        Self { verify_checksum: true, kept_in_memory: false }
    }
}

impl ColumnReaderOptions {
    pub fn from_json(json: &[u8]) -> SegmentResult<Self> {
        serde_json::from_slice(json).map_err(|e| SegmentErrorCause::Metadata(e.into()).into_err())
    }
}

#[derive(Debug, Copy, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ColumnIteratorOptions {
    pub use_page_cache: bool,
}

impl ColumnIteratorOptions {
    pub fn from_json(json: &[u8]) -> SegmentResult<Self> {
        serde_json::from_slice(json).map_err(|e| SegmentErrorCause::Metadata(e.into()).into_err())
    }
}

#[derive(Debug)]
pub enum ColumnReader {
    Scalar(Arc<ScalarColumnReader>),
    Array(ArrayColumnReader),
}

impl ColumnReader {
    /// Builds the reader for `meta`, recursing into the children of arrays.
    pub fn create(
        opts: &ColumnReaderOptions,
        meta: &ColumnMeta,
        num_rows: u64,
        path: &str,
        source: Arc<dyn PageSource>,
    ) -> SegmentResult<Self> {
        if meta.field_type != FieldType::Array {
            let reader = ScalarColumnReader::try_new(opts, meta, num_rows, path, source)?;
            return Ok(ColumnReader::Scalar(Arc::new(reader)));
        }
        let expected_children = if meta.is_nullable { 3 } else { 2 };
        if meta.children.len() != expected_children {
            return Err(fmt_err!(
                Corruption,
                "{} array column {} of {} has {} children, expected {}",
                if meta.is_nullable { "nullable" } else { "non-nullable" },
                meta.column_id,
                path,
                meta.children.len(),
                expected_children
            ));
        }
        let item_meta = &meta.children[0];
        let item = ColumnReader::create(opts, item_meta, item_meta.num_rows, path, source.clone())?;
        let lengths_meta = &meta.children[1];
        let lengths = scalar_child(opts, lengths_meta, path, source.clone(), "lengths")?;
        let null_flags = match meta.children.get(2) {
            Some(flags_meta) => Some(scalar_child(opts, flags_meta, path, source, "null flags")?),
            None => None,
        };
        Ok(ColumnReader::Array(ArrayColumnReader::new(item, lengths, null_flags)))
    }

    pub fn num_rows(&self) -> u64 {
        match self {
            ColumnReader::Scalar(reader) => reader.num_rows(),
            ColumnReader::Array(reader) => reader.num_rows(),
        }
    }

    pub fn field_type(&self) -> FieldType {
        match self {
            ColumnReader::Scalar(reader) => reader.field_type(),
            ColumnReader::Array(_) => FieldType::Array,
        }
    }

    pub fn is_nullable(&self) -> bool {
        match self {
            ColumnReader::Scalar(reader) => reader.is_nullable(),
            ColumnReader::Array(reader) => reader.is_nullable(),
        }
    }

    pub fn load_indexes_if_needed(&self) -> SegmentResult<()> {
        match self {
            ColumnReader::Scalar(reader) => reader.load_indexes_if_needed(),
            ColumnReader::Array(_) => Ok(()),
        }
    }

    pub fn prune_by_zone_map(
        &self,
        cond: &dyn ColumnCondition,
        delete_cond: Option<&dyn ColumnCondition>,
    ) -> SegmentResult<RowRanges> {
        match self {
            ColumnReader::Scalar(reader) => reader.prune_by_zone_map(cond, delete_cond),
            ColumnReader::Array(reader) => Ok(RowRanges::create_single(0, reader.num_rows())),
        }
    }

    pub fn prune_by_bloom_filter(&self, cond: &dyn ColumnCondition, input: &RowRanges) -> SegmentResult<RowRanges> {
        match self {
            ColumnReader::Scalar(reader) => reader.prune_by_bloom_filter(cond, input),
            ColumnReader::Array(_) => Ok(input.clone()),
        }
    }

    pub fn match_whole_column(&self, cond: Option<&dyn ColumnCondition>) -> SegmentResult<bool> {
        match self {
            ColumnReader::Scalar(reader) => reader.match_whole_column(cond),
            ColumnReader::Array(_) => Ok(true),
        }
    }

    pub fn new_iterator(&self, opts: ColumnIteratorOptions) -> ColumnIterator {
        match self {
            ColumnReader::Scalar(reader) => ScalarColumnReader::new_iterator(reader, opts),
            ColumnReader::Array(reader) => reader.new_iterator(opts),
        }
    }
}

fn scalar_child(
    opts: &ColumnReaderOptions,
    meta: &ColumnMeta,
    path: &str,
    source: Arc<dyn PageSource>,
    role: &str,
) -> SegmentResult<Arc<ScalarColumnReader>> {
    if meta.field_type == FieldType::Array {
        return Err(fmt_err!(
            Corruption,
            "array {} column {} of {} must be scalar",
            role,
            meta.column_id,
            path
        ));
    }
    let reader = ScalarColumnReader::try_new(opts, meta, meta.num_rows, path, source)?;
    Ok(Arc::new(reader))
}
