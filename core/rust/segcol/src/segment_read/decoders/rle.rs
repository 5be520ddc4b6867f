//! Hybrid RLE / bit-packed helpers shared by the boolean, dictionary and
//! null map decoders.

use crate::segment::error::{fmt_err, SegmentResult};
use parquet2::encoding::bitpacked;
use parquet2::encoding::hybrid_rle::{Decoder as HybridRunDecoder, HybridEncoded as HybridRun};

/// A maximal stretch of values as produced by the hybrid RLE stream.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Run<'a> {
    Repeated { value: u32, len: usize },
    Bitpacked { data: &'a [u8] },
}

/// Decodes up to `count` values of `num_bits` width.
/// Fewer values are returned if the stream ends early.
pub fn decode_hybrid_rle(buf: &[u8], num_bits: usize, count: usize) -> SegmentResult<Vec<u32>> {
    if num_bits > 32 {
        return Err(fmt_err!(Corruption, "invalid hybrid RLE bit width {}", num_bits));
    }
    if num_bits == 0 {
        return Ok(vec![0; count]);
    }
    let mut out = Vec::with_capacity(count);
    let mut decoder = HybridRunDecoder::new(buf, num_bits);
    while out.len() < count {
        let run = match decoder.next() {
            Some(run) => run?,
            None => break,
        };
        let remaining = count - out.len();
        match run {
            HybridRun::Rle(data, run_len) => {
                let value = rle_value(data);
                out.extend(std::iter::repeat(value).take(run_len.min(remaining)));
            }
            HybridRun::Bitpacked(data) => {
                let packed = (data.len() * 8 / num_bits).min(remaining);
                let unpacked = bitpacked::Decoder::<u32>::try_new(data, num_bits, packed)?;
                out.extend(unpacked);
            }
        }
    }
    Ok(out)
}

/// Splits a bit width 1 stream into runs without expanding it.
pub fn decode_bit_runs(buf: &[u8]) -> SegmentResult<Vec<Run<'_>>> {
    let mut runs = Vec::new();
    for run in HybridRunDecoder::new(buf, 1) {
        match run? {
            HybridRun::Rle(data, len) => runs.push(Run::Repeated { value: rle_value(data) & 1, len }),
            HybridRun::Bitpacked(data) => runs.push(Run::Bitpacked { data }),
        }
    }
    Ok(runs)
}

#[inline]
fn rle_value(data: &[u8]) -> u32 {
    let mut bytes = [0u8; 4];
    let len = data.len().min(4);
    bytes[..len].copy_from_slice(&data[..len]);
    u32::from_le_bytes(bytes)
}

/// Boolean values stored as `bit_width:u8` followed by a hybrid RLE stream.
#[derive(Debug)]
pub struct RleBoolDecoder {
    values: Vec<u8>,
    pos: usize,
}

impl RleBoolDecoder {
    pub fn try_new(buf: &[u8], count: usize) -> SegmentResult<Self> {
        let (&bit_width, stream) = buf
            .split_first()
            .ok_or_else(|| fmt_err!(Corruption, "empty boolean RLE page"))?;
        if bit_width != 1 {
            return Err(fmt_err!(
                Corruption,
                "boolean RLE bit width must be 1, got {}",
                bit_width
            ));
        }
        let values = decode_hybrid_rle(stream, 1, count)?
            .into_iter()
            .map(|v| v as u8)
            .collect();
        Ok(Self { values, pos: 0 })
    }

    pub fn count(&self) -> usize {
        self.values.len()
    }

    pub fn position(&self) -> usize {
        self.pos
    }

    pub fn seek(&mut self, pos: usize) {
        self.pos = pos;
    }

    /// Takes up to `count` values as 0/1 bytes.
    pub fn next_slice(&mut self, count: usize) -> &[u8] {
        let end = (self.pos + count).min(self.values.len());
        let res = &self.values[self.pos..end];
        self.pos = end;
        res
    }
}


#[cfg(test)]
mod tests {
    use super::test_util::*;
    use super::*;

    #[test]
    fn test_decode_mixed_runs() -> SegmentResult<()> {
        let mut buf = Vec::new();
        encode_rle_runs(&mut buf, &[(5, 3)], 3);
        encode_bitpacked(&mut buf, &[1, 2, 3, 4, 5, 6, 7, 0], 3);
        assert_eq!(decode_hybrid_rle(&buf, 3, 11)?, vec![5, 5, 5, 1, 2, 3, 4, 5, 6, 7, 0]);
        assert_eq!(decode_hybrid_rle(&buf, 3, 4)?, vec![5, 5, 5, 1]);
        assert_eq!(decode_hybrid_rle(&buf, 3, 100)?.len(), 11);
        Ok(())
    }

    #[test]
    fn test_rle_bool_decoder() -> SegmentResult<()> {
        let mut buf = vec![1u8];
        encode_bitpacked(&mut buf, &[1, 0, 1, 1, 0], 1);
        let mut decoder = RleBoolDecoder::try_new(&buf, 5)?;
        assert_eq!(decoder.count(), 5);
        assert_eq!(decoder.next_slice(2), &[1, 0]);
        decoder.seek(4);
        assert_eq!(decoder.next_slice(10), &[0]);
        assert!(RleBoolDecoder::try_new(&[2u8, 0], 1).unwrap_err().is_corruption());
        Ok(())
    }
}
