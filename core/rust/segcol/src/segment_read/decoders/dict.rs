//! Dictionary pages and dictionary-coded data pages.
//!
//! A column has at most one dictionary. Data pages either carry codes into
//! it or fall back to plain values when the writer gave up on the dictionary.

use crate::segment::error::{fmt_err, SegmentResult};
use crate::segment_read::column_sink::ColumnSink;
use crate::segment_read::decoders::plain::PlainBinaryDecoder;
use crate::segment_read::decoders::rle::decode_hybrid_rle;
use bytes::Bytes;
use std::sync::Arc;

const MODE_PLAIN: u8 = 0;
const MODE_DICT: u8 = 1;
const DICT_PAGE_ENCODING_PLAIN: u8 = 0;

/// Decoded words of a column dictionary, shared by every page decoder.
#[derive(Debug, Default)]
pub struct DictWordTable {
    words: Vec<Bytes>,
    avg_word_len: f32,
}

impl DictWordTable {
    /// Parses a dictionary page of `len:u32`-prefixed words.
    pub fn try_new(body: Bytes, num_values: u32, encoding: u8) -> SegmentResult<Self> {
        if encoding != DICT_PAGE_ENCODING_PLAIN {
            return Err(fmt_err!(
                UnsupportedType,
                "unsupported dictionary page encoding {}",
                encoding
            ));
        }
        let words = PlainBinaryDecoder::try_new(body)?.into_values();
        if words.len() != num_values as usize {
            return Err(fmt_err!(
                Corruption,
                "dictionary page declares {} words, holds {}",
                num_values,
                words.len()
            ));
        }
        let total: usize = words.iter().map(Bytes::len).sum();
        let avg_word_len = if words.is_empty() {
            0.0
        } else {
            total as f32 / words.len() as f32
        };
        Ok(Self { words, avg_word_len })
    }

    #[inline]
    pub fn get(&self, code: u32) -> Option<&Bytes> {
        self.words.get(code as usize)
    }

    pub fn len(&self) -> usize {
        self.words.len()
    }

    pub fn is_empty(&self) -> bool {
        self.words.is_empty()
    }

    pub fn avg_word_len(&self) -> f32 {
        self.avg_word_len
    }
}

/// Returns true if a dictionary data page body holds codes.
/// Plain fallback pages do not need the dictionary.
pub fn is_dict_encoding(body: &[u8]) -> SegmentResult<bool> {
    match body.first() {
        Some(&MODE_DICT) => Ok(true),
        Some(&MODE_PLAIN) => Ok(false),
        Some(mode) => Err(fmt_err!(Corruption, "unknown dictionary page mode {}", mode)),
        None => Err(fmt_err!(Corruption, "empty dictionary data page")),
    }
}

#[derive(Debug)]
enum DictValues {
    Codes { codes: Vec<u32>, words: Arc<DictWordTable> },
    Plain(PlainBinaryDecoder),
}

#[derive(Debug)]
pub struct DictPageDecoder {
    values: DictValues,
    pos: usize,
}

impl DictPageDecoder {
    /// `words` must be set for code pages, see [`is_dict_encoding`].
    pub fn try_new(body: Bytes, count: usize, words: Option<Arc<DictWordTable>>) -> SegmentResult<Self> {
        let values = if is_dict_encoding(&body)? {
            let words = words.ok_or_else(|| {
                fmt_err!(Internal, "dictionary coded page decoded without a dictionary")
            })?;
            let bit_width = *body
                .get(1)
                .ok_or_else(|| fmt_err!(Corruption, "dictionary page misses its bit width"))?;
            let codes = decode_hybrid_rle(&body[2..], bit_width as usize, count)?;
            DictValues::Codes { codes, words }
        } else {
            DictValues::Plain(PlainBinaryDecoder::try_new(body.slice(1..))?)
        };
        Ok(Self { values, pos: 0 })
    }

    pub fn count(&self) -> usize {
        match &self.values {
            DictValues::Codes { codes, .. } => codes.len(),
            DictValues::Plain(plain) => plain.count(),
        }
    }

    pub fn position(&self) -> usize {
        self.pos
    }

    pub fn seek(&mut self, pos: usize) {
        self.pos = pos;
        if let DictValues::Plain(plain) = &mut self.values {
            plain.seek(pos);
        }
    }

    pub fn push_slice(&mut self, sink: &mut dyn ColumnSink, count: usize) -> SegmentResult<usize> {
        match &mut self.values {
            DictValues::Codes { codes, words } => {
                let end = (self.pos + count).min(codes.len());
                for &code in &codes[self.pos..end] {
                    let word = words.get(code).ok_or_else(|| {
                        fmt_err!(
                            Corruption,
                            "dictionary code {} out of {} words",
                            code,
                            words.len()
                        )
                    })?;
                    sink.push_binary(word)?;
                }
                let pushed = end - self.pos;
                self.pos = end;
                Ok(pushed)
            }
            DictValues::Plain(plain) => {
                let pushed = plain.push_slice(sink, count)?;
                self.pos = plain.position();
                Ok(pushed)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::segment_read::column_sink::BinaryColumn;
    use crate::segment_read::decoders::rle::test_util::encode_bitpacked;
    use segcol_core::col_type::FieldType;

    fn words(values: &[&str]) -> Bytes {
        let mut page = Vec::new();
        for word in values {
            page.extend_from_slice(&(word.len() as u32).to_le_bytes());
            page.extend_from_slice(word.as_bytes());
        }
        Bytes::from(page)
    }

    #[test]
    fn test_word_table() -> SegmentResult<()> {
        let table = DictWordTable::try_new(words(&["a", "bcd"]), 2, 0)?;
        assert_eq!(table.len(), 2);
        assert_eq!(table.get(1).map(|w| w.as_ref()), Some(&b"bcd"[..]));
        assert_eq!(table.avg_word_len(), 2.0);
        assert!(DictWordTable::try_new(words(&["a"]), 2, 0).unwrap_err().is_corruption());
        assert!(DictWordTable::try_new(words(&["a"]), 1, 7).is_err());
        Ok(())
    }

    #[test]
    fn test_code_page() -> SegmentResult<()> {
        let table = Arc::new(DictWordTable::try_new(words(&["x", "y", "z"]), 3, 0)?);
        let mut body = vec![MODE_DICT, 2];
        encode_bitpacked(&mut body, &[2, 0, 1, 2], 2);
        let mut decoder = DictPageDecoder::try_new(Bytes::from(body), 4, Some(table))?;
        assert_eq!(decoder.count(), 4);
        decoder.seek(1);
        let mut sink = BinaryColumn::new(FieldType::Varchar, false);
        assert_eq!(decoder.push_slice(&mut sink, 5)?, 3);
        assert_eq!(sink.get(0), b"x");
        assert_eq!(sink.get(2), b"z");
        Ok(())
    }

    #[test]
    fn test_plain_fallback_needs_no_dictionary() -> SegmentResult<()> {
        let mut body = vec![MODE_PLAIN];
        body.extend_from_slice(&words(&["hello"]));
        assert!(!is_dict_encoding(&body)?);
        let mut decoder = DictPageDecoder::try_new(Bytes::from(body), 1, None)?;
        let mut sink = BinaryColumn::new(FieldType::String, false);
        assert_eq!(decoder.push_slice(&mut sink, 1)?, 1);
        assert_eq!(sink.get(0), b"hello");
        Ok(())
    }

    #[test]
    fn test_code_out_of_range_is_corruption() -> SegmentResult<()> {
        let table = Arc::new(DictWordTable::try_new(words(&["x"]), 1, 0)?);
        let mut body = vec![MODE_DICT, 2];
        encode_bitpacked(&mut body, &[3], 2);
        let mut decoder = DictPageDecoder::try_new(Bytes::from(body), 1, Some(table))?;
        let mut sink = BinaryColumn::new(FieldType::Varchar, false);
        assert!(decoder.push_slice(&mut sink, 1).unwrap_err().is_corruption());
        Ok(())
    }
}
