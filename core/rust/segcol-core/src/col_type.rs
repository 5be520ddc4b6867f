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
use crate::error::{fmt_err, CoreError, CoreResult};
use serde::{Deserialize, Serialize};
use std::fmt::{Display, Formatter};

/// Logical type of a segment column.
#[repr(u8)]
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FieldType {
    Boolean = 1,
    TinyInt = 2,
    SmallInt = 3,
    Int = 4,
    UnsignedInt = 5,
    BigInt = 6,
    LargeInt = 7,
    Float = 8,
    Double = 9,
    Decimal = 10,
    Date = 11,
    DateTime = 12,
    Char = 13,
    Varchar = 14,
    String = 15,
    Array = 16,
    Hll = 17,
    Object = 18,
}

impl TryFrom<u8> for FieldType {
    type Error = CoreError;

    fn try_from(tag: u8) -> CoreResult<Self> {
        match tag {
            1 => Ok(FieldType::Boolean),
            2 => Ok(FieldType::TinyInt),
            3 => Ok(FieldType::SmallInt),
            4 => Ok(FieldType::Int),
            5 => Ok(FieldType::UnsignedInt),
            6 => Ok(FieldType::BigInt),
            7 => Ok(FieldType::LargeInt),
            8 => Ok(FieldType::Float),
            9 => Ok(FieldType::Double),
            10 => Ok(FieldType::Decimal),
            11 => Ok(FieldType::Date),
            12 => Ok(FieldType::DateTime),
            13 => Ok(FieldType::Char),
            14 => Ok(FieldType::Varchar),
            15 => Ok(FieldType::String),
            16 => Ok(FieldType::Array),
            17 => Ok(FieldType::Hll),
            18 => Ok(FieldType::Object),
            _ => Err(fmt_err!(InvalidColumnType, "unknown column type tag: {}", tag)),
        }
    }
}

impl FieldType {
    pub fn name(self) -> &'static str {
        match self {
            FieldType::Boolean => "boolean",
            FieldType::TinyInt => "tinyint",
            FieldType::SmallInt => "smallint",
            FieldType::Int => "int",
            FieldType::UnsignedInt => "unsignedint",
            FieldType::BigInt => "bigint",
            FieldType::LargeInt => "largeint",
            FieldType::Float => "float",
            FieldType::Double => "double",
            FieldType::Decimal => "decimal",
            FieldType::Date => "date",
            FieldType::DateTime => "datetime",
            FieldType::Char => "char",
            FieldType::Varchar => "varchar",
            FieldType::String => "string",
            FieldType::Array => "array",
            FieldType::Hll => "hll",
            FieldType::Object => "object",
        }
    }

    /// Every type except the nested ones.
    pub fn is_scalar(self) -> bool {
        !matches!(self, FieldType::Array)
    }

    /// Width in bytes of the stored representation, `None` for variable-width types.
    pub fn fixed_size(self) -> Option<usize> {
        match self {
            FieldType::Boolean | FieldType::TinyInt => Some(1),
            FieldType::SmallInt => Some(2),
            FieldType::Int | FieldType::UnsignedInt | FieldType::Float | FieldType::Date => Some(4),
            FieldType::BigInt | FieldType::Double | FieldType::DateTime => Some(8),
            FieldType::LargeInt | FieldType::Decimal => Some(16),
            FieldType::Char
            | FieldType::Varchar
            | FieldType::String
            | FieldType::Array
            | FieldType::Hll
            | FieldType::Object => None,
        }
    }

    pub fn is_binary(self) -> bool {
        matches!(
            self,
            FieldType::Char | FieldType::Varchar | FieldType::String
        )
    }

    /// Byte-string types, including the opaque aggregate states.
    pub fn is_var_size(self) -> bool {
        self.is_binary() || matches!(self, FieldType::Hll | FieldType::Object)
    }

    /// Types the segment format has a value codec for.
    /// Hll and Object columns are stored by a separate aggregate format.
    pub fn has_codec(self) -> bool {
        self.fixed_size().is_some() || self.is_binary()
    }
}

impl Display for FieldType {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}
