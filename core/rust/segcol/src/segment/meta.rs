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
use crate::segment::error::{SegmentErrorCause, SegmentResult};
use segcol_core::col_type::FieldType;
use serde::{Deserialize, Serialize};

/// Offset and size of one page inside the segment file.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub struct PageLocator {
    pub offset: u64,
    pub size: u32,
}

impl PageLocator {
    pub fn new(offset: u64, size: u32) -> Self {
        Self { offset, size }
    }
}

#[derive(Debug, Copy, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EncodingType {
    /// Resolved per logical type when the reader is built.
    #[default]
    Default,
    Plain,
    Rle,
    Dict,
    #[serde(other)]
    Unknown,
}

#[derive(Debug, Copy, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CompressionCodec {
    #[default]
    None,
    Snappy,
    Lz4,
    Lz4Frame,
    Zlib,
    Zstd,
    #[serde(other)]
    Unknown,
}

/// Min/max summary of a page or a whole column.
/// Bounds are kept in their textual form and parsed with the column type.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct ZoneMap {
    #[serde(default)]
    pub min: String,
    #[serde(default)]
    pub max: String,
    #[serde(default)]
    pub has_null: bool,
    #[serde(default)]
    pub has_not_null: bool,
    #[serde(default)]
    pub pass_all: bool,
}

impl ZoneMap {
    /// Neither nulls nor values: the page holds no rows.
    pub fn is_empty(&self) -> bool {
        !self.has_null && !self.has_not_null
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ColumnIndexMeta {
    Ordinal {
        root_page: PageLocator,
        /// The column has exactly one data page and `root_page` points at it.
        #[serde(default)]
        is_root_data_page: bool,
    },
    ZoneMap {
        segment_zone_map: ZoneMap,
        page_zone_maps: PageLocator,
    },
    Bitmap {
        dict_column: PageLocator,
        bitmap_column: PageLocator,
    },
    BloomFilter {
        bloom_filters: PageLocator,
    },
    #[serde(other)]
    Unknown,
}

impl ColumnIndexMeta {
    pub fn kind_name(&self) -> &'static str {
        match self {
            ColumnIndexMeta::Ordinal { .. } => "ordinal",
            ColumnIndexMeta::ZoneMap { .. } => "zone_map",
            ColumnIndexMeta::Bitmap { .. } => "bitmap",
            ColumnIndexMeta::BloomFilter { .. } => "bloom_filter",
            ColumnIndexMeta::Unknown => "unknown",
        }
    }
}

/// Immutable description of how one column is stored in a segment.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ColumnMeta {
    pub column_id: u32,

    #[serde(rename = "type")]
    pub field_type: FieldType,

    #[serde(default)]
    pub encoding: EncodingType,

    #[serde(default)]
    pub compression: CompressionCodec,

    /// Declared length from the schema, used for `char` columns.
    #[serde(default)]
    pub length: u32,

    #[serde(default)]
    pub is_nullable: bool,

    pub num_rows: u64,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub indexes: Vec<ColumnIndexMeta>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub dict_page: Option<PageLocator>,

    /// Array columns: item, lengths and, when nullable, null flags.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub children: Vec<ColumnMeta>,
}

impl ColumnMeta {
    pub fn from_json(json: &[u8]) -> SegmentResult<Self> {
        serde_json::from_slice(json)
            .map_err(|e| SegmentErrorCause::Metadata(e.into()).into_err())
    }

    pub fn to_json(&self) -> SegmentResult<String> {
        serde_json::to_string(self).map_err(|e| SegmentErrorCause::Metadata(e.into()).into_err())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_nested_meta_from_json() -> SegmentResult<()> {
        let doc = json!({
            "column_id": 4,
            "type": "array",
            "is_nullable": true,
            "num_rows": 3,
            "children": [
                {
                    "column_id": 4,
                    "type": "int",
                    "num_rows": 5,
                    "indexes": [
                        {"kind": "ordinal", "root_page": {"offset": 0, "size": 60}, "is_root_data_page": true}
                    ]
                },
                {"column_id": 4, "type": "bigint", "num_rows": 3},
                {"column_id": 4, "type": "boolean", "encoding": "rle", "num_rows": 3}
            ]
        });
        let meta = ColumnMeta::from_json(doc.to_string().as_bytes())?;
        assert_eq!(meta.field_type, FieldType::Array);
        assert_eq!(meta.children.len(), 3);
        assert_eq!(meta.children[0].encoding, EncodingType::Default);
        assert_eq!(meta.children[2].encoding, EncodingType::Rle);
        assert_eq!(
            meta.children[0].indexes[0],
            ColumnIndexMeta::Ordinal {
                root_page: PageLocator::new(0, 60),
                is_root_data_page: true
            }
        );
        Ok(())
    }

    #[test]
    fn test_unknown_tags_are_kept() -> SegmentResult<()> {
        let doc = json!({
            "column_id": 1,
            "type": "varchar",
            "encoding": "prefix",
            "compression": "brotli",
            "num_rows": 0,
            "indexes": [{"kind": "inverted"}]
        });
        let meta = ColumnMeta::from_json(doc.to_string().as_bytes())?;
        assert_eq!(meta.encoding, EncodingType::Unknown);
        assert_eq!(meta.compression, CompressionCodec::Unknown);
        assert_eq!(meta.indexes, vec![ColumnIndexMeta::Unknown]);
        Ok(())
    }

    #[test]
    fn test_bad_json_is_a_metadata_error() {
        let err = ColumnMeta::from_json(b"{\"column_id\": 1}").unwrap_err();
        assert!(matches!(err.cause(), SegmentErrorCause::Metadata(_)));
    }
}
