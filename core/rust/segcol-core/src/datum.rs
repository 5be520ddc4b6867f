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
//! Typed scalar values.
//!
//! A `Datum` is what zone-map bounds, default values and predicate operands
//! are parsed into. The same textual decoder is used for all of them, so a
//! zone map written with `Display` parses back to an equal value.

use crate::col_type::FieldType;
use crate::error::{fmt_err, CoreResult};
use chrono::{Duration, NaiveDate, NaiveDateTime, NaiveTime};
use std::cmp::Ordering;
use std::fmt::{Display, Formatter};

/// Decimal values are stored as a 128-bit integer with this many fractional digits.
pub const DECIMAL_SCALE: u32 = 9;
const DECIMAL_FACTOR: i128 = 1_000_000_000;

const DATE_FORMAT: &str = "%Y-%m-%d";
const DATETIME_FORMATS: [&str; 3] = ["%Y-%m-%d %H:%M:%S%.f", "%Y-%m-%dT%H:%M:%S%.f", "%Y%m%d%H%M%S"];

#[derive(Debug, Clone, PartialEq)]
pub enum Datum {
    Null,
    Boolean(bool),
    TinyInt(i8),
    SmallInt(i16),
    Int(i32),
    UnsignedInt(u32),
    BigInt(i64),
    LargeInt(i128),
    Float(f32),
    Double(f64),
    /// Unscaled value, see [`DECIMAL_SCALE`].
    Decimal(i128),
    Date(NaiveDate),
    DateTime(NaiveDateTime),
    Bytes(Vec<u8>),
}

impl Datum {
    pub fn is_null(&self) -> bool {
        matches!(self, Datum::Null)
    }

    /// Parses the textual form of a value of `field_type`.
    ///
    /// `schema_length` is the declared length of the column. It only matters
    /// for `Char`, whose values are zero-padded or truncated to it.
    pub fn from_text(field_type: FieldType, text: &str, schema_length: usize) -> CoreResult<Self> {
        let invalid = || {
            fmt_err!(
                InvalidValue,
                "invalid {} literal: {:?}",
                field_type.name(),
                text
            )
        };
        let trimmed = text.trim();
        let datum = match field_type {
            FieldType::Boolean => match trimmed {
                "1" | "true" | "TRUE" | "True" => Datum::Boolean(true),
                "0" | "false" | "FALSE" | "False" => Datum::Boolean(false),
                _ => return Err(invalid()),
            },
            FieldType::TinyInt => Datum::TinyInt(trimmed.parse().map_err(|_| invalid())?),
            FieldType::SmallInt => Datum::SmallInt(trimmed.parse().map_err(|_| invalid())?),
            FieldType::Int => Datum::Int(trimmed.parse().map_err(|_| invalid())?),
            FieldType::UnsignedInt => Datum::UnsignedInt(trimmed.parse().map_err(|_| invalid())?),
            FieldType::BigInt => Datum::BigInt(trimmed.parse().map_err(|_| invalid())?),
            FieldType::LargeInt => Datum::LargeInt(trimmed.parse().map_err(|_| invalid())?),
            FieldType::Float => Datum::Float(trimmed.parse().map_err(|_| invalid())?),
            FieldType::Double => Datum::Double(trimmed.parse().map_err(|_| invalid())?),
            FieldType::Decimal => Datum::Decimal(parse_decimal(trimmed).ok_or_else(invalid)?),
            FieldType::Date => Datum::Date(parse_date(trimmed).ok_or_else(invalid)?),
            FieldType::DateTime => Datum::DateTime(parse_datetime(trimmed).ok_or_else(invalid)?),
            FieldType::Char => {
                let mut bytes = text.as_bytes().to_vec();
                if schema_length > 0 {
                    bytes.resize(schema_length, 0);
                }
                Datum::Bytes(bytes)
            }
            FieldType::Varchar | FieldType::String => Datum::Bytes(text.as_bytes().to_vec()),
            FieldType::Array | FieldType::Hll | FieldType::Object => {
                return Err(fmt_err!(
                    InvalidColumnType,
                    "no textual form for {} values",
                    field_type.name()
                ))
            }
        };
        Ok(datum)
    }

    /// Decodes one value from its stored little-endian representation.
    /// Binary types take the bytes verbatim.
    pub fn from_storage(field_type: FieldType, bytes: &[u8]) -> CoreResult<Self> {
        if let Some(size) = field_type.fixed_size() {
            if bytes.len() != size {
                return Err(fmt_err!(
                    InvalidValue,
                    "expected {} bytes for a {} value, got {}",
                    size,
                    field_type.name(),
                    bytes.len()
                ));
            }
        }
        let datum = match field_type {
            FieldType::Boolean => Datum::Boolean(bytes[0] != 0),
            FieldType::TinyInt => Datum::TinyInt(bytes[0] as i8),
            FieldType::SmallInt => Datum::SmallInt(i16::from_le_bytes([bytes[0], bytes[1]])),
            FieldType::Int => Datum::Int(i32::from_le_bytes(le_array(bytes))),
            FieldType::UnsignedInt => Datum::UnsignedInt(u32::from_le_bytes(le_array(bytes))),
            FieldType::BigInt => Datum::BigInt(i64::from_le_bytes(le_array(bytes))),
            FieldType::LargeInt => Datum::LargeInt(i128::from_le_bytes(le_array(bytes))),
            FieldType::Float => Datum::Float(f32::from_le_bytes(le_array(bytes))),
            FieldType::Double => Datum::Double(f64::from_le_bytes(le_array(bytes))),
            FieldType::Decimal => Datum::Decimal(i128::from_le_bytes(le_array(bytes))),
            FieldType::Date => {
                let days = i32::from_le_bytes(le_array(bytes));
                let date = NaiveDate::default()
                    .checked_add_signed(Duration::days(days as i64))
                    .ok_or_else(|| fmt_err!(InvalidValue, "date out of range: {} days", days))?;
                Datum::Date(date)
            }
            FieldType::DateTime => {
                let micros = i64::from_le_bytes(le_array(bytes));
                let datetime = NaiveDateTime::default()
                    .checked_add_signed(Duration::microseconds(micros))
                    .ok_or_else(|| {
                        fmt_err!(InvalidValue, "datetime out of range: {} us", micros)
                    })?;
                Datum::DateTime(datetime)
            }
            FieldType::Char | FieldType::Varchar | FieldType::String => {
                Datum::Bytes(bytes.to_vec())
            }
            FieldType::Array | FieldType::Hll | FieldType::Object => {
                return Err(fmt_err!(
                    InvalidColumnType,
                    "no scalar storage for {} values",
                    field_type.name()
                ))
            }
        };
        Ok(datum)
    }

    /// Appends the stored representation of the value. `Null` appends nothing.
    pub fn encode_storage(&self, out: &mut Vec<u8>) {
        match self {
            Datum::Null => {}
            Datum::Boolean(v) => out.push(*v as u8),
            Datum::TinyInt(v) => out.push(*v as u8),
            Datum::SmallInt(v) => out.extend_from_slice(&v.to_le_bytes()),
            Datum::Int(v) => out.extend_from_slice(&v.to_le_bytes()),
            Datum::UnsignedInt(v) => out.extend_from_slice(&v.to_le_bytes()),
            Datum::BigInt(v) => out.extend_from_slice(&v.to_le_bytes()),
            Datum::LargeInt(v) | Datum::Decimal(v) => out.extend_from_slice(&v.to_le_bytes()),
            Datum::Float(v) => out.extend_from_slice(&v.to_le_bytes()),
            Datum::Double(v) => out.extend_from_slice(&v.to_le_bytes()),
            Datum::Date(v) => {
                let days = v.signed_duration_since(NaiveDate::default()).num_days() as i32;
                out.extend_from_slice(&days.to_le_bytes());
            }
            Datum::DateTime(v) => {
                let micros = v
                    .signed_duration_since(NaiveDateTime::default())
                    .num_microseconds()
                    .unwrap_or(i64::MAX);
                out.extend_from_slice(&micros.to_le_bytes());
            }
            Datum::Bytes(v) => out.extend_from_slice(v),
        }
    }

    pub fn storage_bytes(&self) -> Vec<u8> {
        let mut out = Vec::new();
        self.encode_storage(&mut out);
        out
    }
}

#[inline]
fn le_array<const N: usize>(bytes: &[u8]) -> [u8; N] {
    let mut out = [0u8; N];
    out.copy_from_slice(&bytes[..N]);
    out
}

fn parse_decimal(text: &str) -> Option<i128> {
    let (negative, digits) = match text.strip_prefix('-') {
        Some(rest) => (true, rest),
        None => (false, text.strip_prefix('+').unwrap_or(text)),
    };
    let (int_part, frac_part) = match digits.split_once('.') {
        Some((int_part, frac_part)) => (int_part, frac_part),
        None => (digits, ""),
    };
    if int_part.is_empty() && frac_part.is_empty() {
        return None;
    }
    if frac_part.len() > DECIMAL_SCALE as usize
        || !int_part.bytes().all(|b| b.is_ascii_digit())
        || !frac_part.bytes().all(|b| b.is_ascii_digit())
    {
        return None;
    }
    let int_value: i128 = if int_part.is_empty() {
        0
    } else {
        int_part.parse().ok()?
    };
    let mut frac_value: i128 = if frac_part.is_empty() {
        0
    } else {
        frac_part.parse().ok()?
    };
    frac_value *= 10i128.pow(DECIMAL_SCALE - frac_part.len() as u32);
    let value = int_value.checked_mul(DECIMAL_FACTOR)?.checked_add(frac_value)?;
    Some(if negative { -value } else { value })
}

fn parse_date(text: &str) -> Option<NaiveDate> {
    NaiveDate::parse_from_str(text, DATE_FORMAT)
        .ok()
        .or_else(|| parse_datetime(text).map(|dt| dt.date()))
}

fn parse_datetime(text: &str) -> Option<NaiveDateTime> {
    DATETIME_FORMATS
        .iter()
        .find_map(|format| NaiveDateTime::parse_from_str(text, format).ok())
        .or_else(|| {
            NaiveDate::parse_from_str(text, DATE_FORMAT)
                .ok()
                .map(|date| date.and_time(NaiveTime::MIN))
        })
}

impl PartialOrd for Datum {
    /// Null sorts before every value. Values of different types are unordered.
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        match (self, other) {
            (Datum::Null, Datum::Null) => Some(Ordering::Equal),
            (Datum::Null, _) => Some(Ordering::Less),
            (_, Datum::Null) => Some(Ordering::Greater),
            (Datum::Boolean(a), Datum::Boolean(b)) => a.partial_cmp(b),
            (Datum::TinyInt(a), Datum::TinyInt(b)) => a.partial_cmp(b),
            (Datum::SmallInt(a), Datum::SmallInt(b)) => a.partial_cmp(b),
            (Datum::Int(a), Datum::Int(b)) => a.partial_cmp(b),
            (Datum::UnsignedInt(a), Datum::UnsignedInt(b)) => a.partial_cmp(b),
            (Datum::BigInt(a), Datum::BigInt(b)) => a.partial_cmp(b),
            (Datum::LargeInt(a), Datum::LargeInt(b)) => a.partial_cmp(b),
            (Datum::Float(a), Datum::Float(b)) => a.partial_cmp(b),
            (Datum::Double(a), Datum::Double(b)) => a.partial_cmp(b),
            (Datum::Decimal(a), Datum::Decimal(b)) => a.partial_cmp(b),
            (Datum::Date(a), Datum::Date(b)) => a.partial_cmp(b),
            (Datum::DateTime(a), Datum::DateTime(b)) => a.partial_cmp(b),
            (Datum::Bytes(a), Datum::Bytes(b)) => a.partial_cmp(b),
            _ => None,
        }
    }
}

impl Display for Datum {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Datum::Null => f.write_str("NULL"),
            Datum::Boolean(v) => write!(f, "{}", v),
            Datum::TinyInt(v) => write!(f, "{}", v),
            Datum::SmallInt(v) => write!(f, "{}", v),
            Datum::Int(v) => write!(f, "{}", v),
            Datum::UnsignedInt(v) => write!(f, "{}", v),
            Datum::BigInt(v) => write!(f, "{}", v),
            Datum::LargeInt(v) => write!(f, "{}", v),
            Datum::Float(v) => write!(f, "{}", v),
            Datum::Double(v) => write!(f, "{}", v),
            Datum::Decimal(v) => {
                let sign = if *v < 0 { "-" } else { "" };
                let abs = v.unsigned_abs();
                let int_part = abs / DECIMAL_FACTOR as u128;
                let frac_part = abs % DECIMAL_FACTOR as u128;
                if frac_part == 0 {
                    write!(f, "{}{}", sign, int_part)
                } else {
                    let frac = format!("{:09}", frac_part);
                    write!(f, "{}{}.{}", sign, int_part, frac.trim_end_matches('0'))
                }
            }
            Datum::Date(v) => write!(f, "{}", v.format(DATE_FORMAT)),
            Datum::DateTime(v) => write!(f, "{}", v.format("%Y-%m-%d %H:%M:%S%.f")),
            Datum::Bytes(v) => write!(f, "{}", String::from_utf8_lossy(v)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::CoreErrorCause;

    #[test]
    fn test_parse_ints_and_floats() {
        assert_eq!(Datum::from_text(FieldType::Int, "7", 0).unwrap(), Datum::Int(7));
        assert_eq!(Datum::from_text(FieldType::BigInt, " -42 ", 0).unwrap(), Datum::BigInt(-42));
        assert_eq!(Datum::from_text(FieldType::TinyInt, "127", 0).unwrap(), Datum::TinyInt(127));
        assert!(Datum::from_text(FieldType::TinyInt, "128", 0).is_err());
        assert_eq!(Datum::from_text(FieldType::Double, "1.5", 0).unwrap(), Datum::Double(1.5));
        let err = Datum::from_text(FieldType::Int, "seven", 0).unwrap_err();
        assert!(matches!(err.cause(), CoreErrorCause::InvalidValue));
        assert_eq!(err.to_string(), "invalid int literal: \"seven\"");
    }

    #[test]
    fn test_parse_decimal() {
        assert_eq!(parse_decimal("12.5"), Some(12_500_000_000));
        assert_eq!(parse_decimal("-0.000000001"), Some(-1));
        assert_eq!(parse_decimal("3"), Some(3_000_000_000));
        assert_eq!(parse_decimal("1.0000000001"), None);
        assert_eq!(parse_decimal("."), None);
        assert_eq!(Datum::Decimal(12_500_000_000).to_string(), "12.5");
        assert_eq!(Datum::Decimal(-1).to_string(), "-0.000000001");
    }

    #[test]
    fn test_parse_dates_normalizes() {
        let date = Datum::from_text(FieldType::Date, "2021-03-04 10:11:12", 0).unwrap();
        assert_eq!(date, Datum::Date(NaiveDate::from_ymd_opt(2021, 3, 4).unwrap()));

        let datetime = Datum::from_text(FieldType::DateTime, "2021-03-04", 0).unwrap();
        assert_eq!(datetime.to_string(), "2021-03-04 00:00:00");

        let datetime = Datum::from_text(FieldType::DateTime, "2021-03-04 10:11:12", 0).unwrap();
        assert_eq!(datetime.to_string(), "2021-03-04 10:11:12");
        assert!(Datum::from_text(FieldType::Date, "2021-13-01", 0).is_err());
    }

    #[test]
    fn test_char_is_padded_and_truncated() {
        assert_eq!(
            Datum::from_text(FieldType::Char, "ab", 4).unwrap(),
            Datum::Bytes(vec![b'a', b'b', 0, 0])
        );
        assert_eq!(
            Datum::from_text(FieldType::Char, "abcdef", 3).unwrap(),
            Datum::Bytes(b"abc".to_vec())
        );
        assert_eq!(
            Datum::from_text(FieldType::Varchar, "abcdef", 3).unwrap(),
            Datum::Bytes(b"abcdef".to_vec())
        );
    }

    #[test]
    fn test_storage_round_trip_for_temporal_types() {
        let date = Datum::from_text(FieldType::Date, "1969-12-31", 0).unwrap();
        let bytes = date.storage_bytes();
        assert_eq!(bytes, (-1i32).to_le_bytes());
        assert_eq!(Datum::from_storage(FieldType::Date, &bytes).unwrap(), date);

        let datetime = Datum::from_text(FieldType::DateTime, "1970-01-01 00:00:01", 0).unwrap();
        let bytes = datetime.storage_bytes();
        assert_eq!(bytes, 1_000_000i64.to_le_bytes());
        assert_eq!(Datum::from_storage(FieldType::DateTime, &bytes).unwrap(), datetime);

        assert!(Datum::from_storage(FieldType::Int, &[1, 2]).is_err());
    }

    #[test]
    fn test_null_sorts_first() {
        assert!(Datum::Null < Datum::Int(i32::MIN));
        assert!(Datum::Int(1) < Datum::Int(2));
        assert!(Datum::Bytes(b"a".to_vec()) < Datum::Bytes(b"b".to_vec()));
        assert_eq!(Datum::Int(1).partial_cmp(&Datum::BigInt(1)), None);
    }
}
