use crate::segment::error::{fmt_err, SegmentResult};
use crate::segment::meta::EncodingType;
use crate::segment_read::decoders::dict::{is_dict_encoding, DictPageDecoder, DictWordTable};
use crate::segment_read::decoders::plain::{PlainBinaryDecoder, PlainFixedDecoder};
use crate::segment_read::decoders::rle::RleBoolDecoder;
use crate::segment_read::decoders::PageDecoder;
use bytes::Bytes;
use segcol_core::col_type::FieldType;
use std::sync::Arc;

/// A logical type paired with the value encoding of its data pages.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct EncodingInfo {
    field_type: FieldType,
    encoding: EncodingType,
}

impl EncodingInfo {
    /// Resolves `Default` and rejects pairs that have no decoder.
    pub fn resolve(field_type: FieldType, encoding: EncodingType) -> SegmentResult<Self> {
        if !field_type.has_codec() {
            return Err(fmt_err!(
                UnsupportedType,
                "no codec for {} columns",
                field_type.name()
            ));
        }
        let encoding = match encoding {
            EncodingType::Default if field_type == FieldType::Boolean => EncodingType::Rle,
            EncodingType::Default if field_type.is_binary() => EncodingType::Dict,
            EncodingType::Default => EncodingType::Plain,
            other => other,
        };
        let supported = match encoding {
            EncodingType::Plain => true,
            EncodingType::Rle => field_type == FieldType::Boolean,
            EncodingType::Dict => field_type.is_binary(),
            EncodingType::Default | EncodingType::Unknown => false,
        };
        if !supported {
            return Err(fmt_err!(
                UnsupportedType,
                "{:?} encoding is not supported for {} columns",
                encoding,
                field_type.name()
            ));
        }
        Ok(Self { field_type, encoding })
    }

    pub fn field_type(&self) -> FieldType {
        self.field_type
    }

    pub fn encoding(&self) -> EncodingType {
        self.encoding
    }

    /// Builds the value decoder for `count` non-null values.
    /// `dict` is only called for dictionary coded pages.
    pub fn create_page_decoder<F>(&self, values: Bytes, count: usize, dict: F) -> SegmentResult<PageDecoder>
    where
        F: FnOnce() -> SegmentResult<Arc<DictWordTable>>,
    {
        let decoder = match self.encoding {
            EncodingType::Plain => match self.field_type.fixed_size() {
                Some(width) => PageDecoder::PlainFixed(PlainFixedDecoder::try_new(values, width)?),
                None => PageDecoder::PlainBinary(PlainBinaryDecoder::try_new(values)?),
            },
            EncodingType::Rle => PageDecoder::RleBool(RleBoolDecoder::try_new(&values, count)?),
            EncodingType::Dict => {
                let words = if is_dict_encoding(&values)? {
                    Some(dict()?)
                } else {
                    None
                };
                PageDecoder::Dict(DictPageDecoder::try_new(values, count, words)?)
            }
            EncodingType::Default | EncodingType::Unknown => {
                return Err(fmt_err!(
                    Internal,
                    "unresolved {:?} encoding",
                    self.encoding
                ))
            }
        };
        Ok(decoder)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::segment::error::SegmentErrorCause;

    #[test]
    fn test_defaults_resolve_per_type() -> SegmentResult<()> {
        let resolve = |t, e| EncodingInfo::resolve(t, e).map(|info| info.encoding());
        assert_eq!(resolve(FieldType::Boolean, EncodingType::Default)?, EncodingType::Rle);
        assert_eq!(resolve(FieldType::Varchar, EncodingType::Default)?, EncodingType::Dict);
        assert_eq!(resolve(FieldType::BigInt, EncodingType::Default)?, EncodingType::Plain);
        assert_eq!(resolve(FieldType::Char, EncodingType::Plain)?, EncodingType::Plain);
        Ok(())
    }

    #[test]
    fn test_unsupported_pairs() {
        for (t, e) in [
            (FieldType::Int, EncodingType::Rle),
            (FieldType::Int, EncodingType::Dict),
            (FieldType::String, EncodingType::Unknown),
            (FieldType::Hll, EncodingType::Plain),
            (FieldType::Array, EncodingType::Default),
        ] {
            let err = EncodingInfo::resolve(t, e).unwrap_err();
            assert!(matches!(err.cause(), SegmentErrorCause::UnsupportedType));
        }
    }
}
