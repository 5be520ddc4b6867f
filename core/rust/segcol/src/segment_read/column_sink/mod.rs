use crate::segment::error::{fmt_err, SegmentResult};
use crate::segment::meta::ColumnMeta;
use segcol_core::col_type::FieldType;
use segcol_core::datum::Datum;

pub mod array;
pub mod fixed;
pub mod var;


pub use array::ArrayColumn;
pub use fixed::FixedColumn;
pub use var::BinaryColumn;

/// Append target for decoded column values.
pub trait ColumnSink {
    fn field_type(&self) -> FieldType;
    fn is_nullable(&self) -> bool;

    /// Number of rows written so far.
    fn len(&self) -> usize;

    fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Rows that fit without reallocating.
    fn capacity(&self) -> usize;
    fn reserve(&mut self, additional: usize);

    /// `count` packed little-endian values of the sink's fixed width.
    fn push_fixed_slice(&mut self, values: &[u8], count: usize) -> SegmentResult<()>;
    fn push_binary(&mut self, value: &[u8]) -> SegmentResult<()>;
    fn push_nulls(&mut self, count: usize) -> SegmentResult<()>;

    /// Appends `count` copies of `value`. `Datum::Null` appends nulls.
    fn push_repeated(&mut self, value: &Datum, count: usize) -> SegmentResult<()>;

    fn as_array_sink(&mut self) -> Option<&mut dyn ArraySink> {
        None
    }
}

/// Array destination: per-row fenceposts, optional null flags and the items.
pub trait ArraySink {
    /// Lengths are appended here, one slot ahead of the row they describe.
    fn offsets(&mut self) -> &mut dyn ColumnSink;
    fn null_flags(&mut self) -> Option<&mut dyn ColumnSink>;
    fn items(&mut self) -> &mut dyn ColumnSink;

    /// Turns the `rows` lengths appended after row `start_row` into fenceposts.
    fn convert_lengths_to_offsets(&mut self, start_row: usize, rows: usize) -> SegmentResult<()>;

    /// Item index where `row` starts. `row == len()` is the end fencepost.
    fn item_offset(&self, row: usize) -> usize;

    /// Makes room for `total_items` items. Returns true if the item storage grew.
    fn ensure_item_capacity(&mut self, total_items: usize) -> bool;

    /// Finalizes row boundaries for rows `[start_row, start_row + rows)`.
    /// With `rebuild` set every row from 0 is recomputed.
    fn prepare_for_read(&mut self, start_row: usize, rows: usize, rebuild: bool);
}

/// A column of decoded values shaped after a `ColumnMeta`.
#[derive(Debug)]
pub enum ColumnBatch {
    Fixed(FixedColumn),
    Binary(BinaryColumn),
    Array(ArrayColumn),
}

impl ColumnBatch {
    pub fn for_column(meta: &ColumnMeta) -> SegmentResult<Self> {
        let field_type = meta.field_type;
        if field_type == FieldType::Array {
            let [item, lengths, rest @ ..] = meta.children.as_slice() else {
                return Err(fmt_err!(
                    Corruption,
                    "array column {} has {} children",
                    meta.column_id,
                    meta.children.len()
                ));
            };
            let items = ColumnBatch::for_column(item)?;
            let null_flags = match rest {
                [] => None,
                [_] => Some(FixedColumn::new(FieldType::Boolean, false)?),
                _ => {
                    return Err(fmt_err!(
                        Corruption,
                        "array column {} has {} children",
                        meta.column_id,
                        meta.children.len()
                    ))
                }
            };
            return Ok(ColumnBatch::Array(ArrayColumn::new(
                lengths.field_type,
                null_flags,
                items,
            )?));
        }
        if field_type.is_var_size() {
            return Ok(ColumnBatch::Binary(BinaryColumn::new(field_type, meta.is_nullable)));
        }
        Ok(ColumnBatch::Fixed(FixedColumn::new(field_type, meta.is_nullable)?))
    }

    fn sink(&self) -> &dyn ColumnSink {
        match self {
            ColumnBatch::Fixed(c) => c,
            ColumnBatch::Binary(c) => c,
            ColumnBatch::Array(c) => c,
        }
    }

    fn sink_mut(&mut self) -> &mut dyn ColumnSink {
        match self {
            ColumnBatch::Fixed(c) => c,
            ColumnBatch::Binary(c) => c,
            ColumnBatch::Array(c) => c,
        }
    }

    pub fn is_null(&self, row: usize) -> bool {
        match self {
            ColumnBatch::Fixed(c) => c.is_null(row),
            ColumnBatch::Binary(c) => c.is_null(row),
            ColumnBatch::Array(c) => c.is_null(row),
        }
    }

    /// Scalar value at `row`. Array rows are read with [`ArrayColumn::row`].
    pub fn value(&self, row: usize) -> SegmentResult<Datum> {
        match self {
            ColumnBatch::Fixed(c) => c.value(row),
            ColumnBatch::Binary(c) => c.value(row),
            ColumnBatch::Array(_) => Err(fmt_err!(
                Internal,
                "array rows have no scalar value, read them through the array view"
            )),
        }
    }

    pub fn values(&self) -> SegmentResult<Vec<Datum>> {
        (0..self.len()).map(|row| self.value(row)).collect()
    }

    pub fn as_array(&self) -> Option<&ArrayColumn> {
        match self {
            ColumnBatch::Array(c) => Some(c),
            _ => None,
        }
    }

    pub fn clear(&mut self) {
        match self {
            ColumnBatch::Fixed(c) => c.clear(),
            ColumnBatch::Binary(c) => c.clear(),
            ColumnBatch::Array(c) => c.clear(),
        }
    }
}

impl ColumnSink for ColumnBatch {
    fn field_type(&self) -> FieldType {
        self.sink().field_type()
    }

    fn is_nullable(&self) -> bool {
        self.sink().is_nullable()
    }

    fn len(&self) -> usize {
        self.sink().len()
    }

    fn capacity(&self) -> usize {
        self.sink().capacity()
    }

    fn reserve(&mut self, additional: usize) {
        self.sink_mut().reserve(additional)
    }

    fn push_fixed_slice(&mut self, values: &[u8], count: usize) -> SegmentResult<()> {
        self.sink_mut().push_fixed_slice(values, count)
    }

    fn push_binary(&mut self, value: &[u8]) -> SegmentResult<()> {
        self.sink_mut().push_binary(value)
    }

    fn push_nulls(&mut self, count: usize) -> SegmentResult<()> {
        self.sink_mut().push_nulls(count)
    }

    fn push_repeated(&mut self, value: &Datum, count: usize) -> SegmentResult<()> {
        self.sink_mut().push_repeated(value, count)
    }

    fn as_array_sink(&mut self) -> Option<&mut dyn ArraySink> {
        match self {
            ColumnBatch::Array(c) => Some(c),
            _ => None,
        }
    }
}
