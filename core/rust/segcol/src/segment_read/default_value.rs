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
use crate::segment::error::{fmt_err, SegmentErrorExt, SegmentResult};
use crate::segment_read::column_sink::ColumnSink;
use crate::segment_read::iter::BatchRead;
use segcol_core::col_type::FieldType;
use segcol_core::datum::Datum;

const NULL_LITERAL: &str = "NULL";

/// Serves a column that is in the schema but not in the segment, e.g. one
/// added after the segment was written. Every row gets the same value.
#[derive(Debug, Clone)]
pub struct DefaultValueColumnIterator {
    value: Datum,
    current_ordinal: u64,
}

impl DefaultValueColumnIterator {
    pub fn try_new(
        has_default: bool,
        default_value: Option<&str>,
        is_nullable: bool,
        field_type: FieldType,
        schema_length: usize,
    ) -> SegmentResult<Self> {
        let value = match default_value.filter(|_| has_default) {
            Some(NULL_LITERAL) if is_nullable => Datum::Null,
            Some(NULL_LITERAL) => {
                return Err(fmt_err!(
                    Internal,
                    "NULL default for a non-nullable {} column",
                    field_type.name()
                ))
            }
            Some(_) if field_type == FieldType::Array => {
                return Err(fmt_err!(UnsupportedType, "array columns cannot have a default value"))
            }
            Some(text) if matches!(field_type, FieldType::Hll | FieldType::Object) => {
                Datum::Bytes(text.as_bytes().to_vec())
            }
            Some(text) => Datum::from_text(field_type, text, schema_length)
                .with_context(|_| format!("invalid default value for {} column", field_type.name()))?,
            None if is_nullable => Datum::Null,
            None => {
                return Err(fmt_err!(
                    Internal,
                    "non-nullable {} column without a default value",
                    field_type.name()
                ))
            }
        };
        Ok(Self { value, current_ordinal: 0 })
    }

    pub fn value(&self) -> &Datum {
        &self.value
    }

    pub fn current_ordinal(&self) -> u64 {
        self.current_ordinal
    }

    pub fn seek_to_ordinal(&mut self, ordinal: u64) -> SegmentResult<()> {
        self.current_ordinal = ordinal;
        Ok(())
    }

    pub fn next_batch(&mut self, count: usize, sink: &mut dyn ColumnSink) -> SegmentResult<BatchRead> {
        sink.push_repeated(&self.value, count)?;
        self.current_ordinal += count as u64;
        Ok(BatchRead { rows: count, has_null: self.value.is_null() && count > 0 })
    }
}
