use crate::segment::error::{fmt_err, SegmentResult};
use crate::segment_read::decoders::rle::{decode_bit_runs, Run};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct NullRun {
    is_null: bool,
    len: usize,
}

/// Cursor over the null map of a data page.
///
/// The map is split into alternating null / non-null runs once, when the
/// page is parsed. The cursor then only moves: [`skip`](Self::skip) resumes
/// from the current position and [`rewind`](Self::rewind) returns to the
/// page start.
#[derive(Debug, Clone)]
pub struct NullRunDecoder {
    runs: Vec<NullRun>,
    null_count: usize,
    run_idx: usize,
    offset_in_run: usize,
    position: usize,
}

impl NullRunDecoder {
    /// Parses a bit width 1 null map (1 = null) covering `num_rows` rows.
    pub fn try_new(buf: &[u8], num_rows: usize) -> SegmentResult<Self> {
        let mut runs: Vec<NullRun> = Vec::new();
        let mut covered = 0usize;
        fn push(is_null: bool, len: usize, runs: &mut Vec<NullRun>) {
            if len == 0 {
                return;
            }
            match runs.last_mut() {
                Some(last) if last.is_null == is_null => last.len += len,
                _ => runs.push(NullRun { is_null, len }),
            }
        }
        for run in decode_bit_runs(buf)? {
            if covered >= num_rows {
                break;
            }
            match run {
                Run::Repeated { value, len } => {
                    let len = len.min(num_rows - covered);
                    push(value == 1, len, &mut runs);
                    covered += len;
                }
                Run::Bitpacked { data } => {
                    let bits = (data.len() * 8).min(num_rows - covered);
                    for i in 0..bits {
                        push(data[i / 8] >> (i % 8) & 1 == 1, 1, &mut runs);
                    }
                    covered += bits;
                }
            }
        }
        if covered < num_rows {
            return Err(fmt_err!(
                Corruption,
                "null map covers {} rows, page has {}",
                covered,
                num_rows
            ));
        }
        let null_count = runs.iter().filter(|r| r.is_null).map(|r| r.len).sum();
        Ok(Self { runs, null_count, run_idx: 0, offset_in_run: 0, position: 0 })
    }

    pub fn null_count(&self) -> usize {
        self.null_count
    }

    /// Row position of the cursor within the page.
    pub fn position(&self) -> usize {
        self.position
    }

    /// Next run starting at the cursor, cut to at most `max` rows.
    /// Returns `None` at the end of the map.
    pub fn next_run(&mut self, max: usize) -> Option<(bool, usize)> {
        let run = self.runs.get(self.run_idx)?;
        let len = (run.len - self.offset_in_run).min(max);
        let is_null = run.is_null;
        self.advance(len);
        Some((is_null, len))
    }

    /// Moves the cursor forward by `rows`. Returns how many of them were null.
    pub fn skip(&mut self, mut rows: usize) -> usize {
        let mut nulls = 0;
        while rows > 0 {
            let Some(run) = self.runs.get(self.run_idx) else {
                break;
            };
            let len = (run.len - self.offset_in_run).min(rows);
            if run.is_null {
                nulls += len;
            }
            self.advance(len);
            rows -= len;
        }
        nulls
    }

    pub fn rewind(&mut self) {
        self.run_idx = 0;
        self.offset_in_run = 0;
        self.position = 0;
    }

    fn advance(&mut self, len: usize) {
        self.offset_in_run += len;
        self.position += len;
        if self.offset_in_run == self.runs[self.run_idx].len {
            self.run_idx += 1;
            self.offset_in_run = 0;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::segment_read::decoders::rle::test_util::{encode_bitpacked, encode_rle_runs};

    // rows: N N V V V N V V
    fn null_map() -> Vec<u8> {
        let mut buf = Vec::new();
        encode_rle_runs(&mut buf, &[(1, 2)], 1);
        encode_bitpacked(&mut buf, &[0, 0, 0, 1, 0, 0], 1);
        buf
    }

    #[test]
    fn test_runs_are_merged_and_cut() -> SegmentResult<()> {
        let mut decoder = NullRunDecoder::try_new(&null_map(), 8)?;
        assert_eq!(decoder.null_count(), 3);
        assert_eq!(decoder.next_run(1), Some((true, 1)));
        assert_eq!(decoder.next_run(10), Some((true, 1)));
        assert_eq!(decoder.next_run(10), Some((false, 3)));
        assert_eq!(decoder.next_run(10), Some((true, 1)));
        assert_eq!(decoder.next_run(10), Some((false, 2)));
        assert_eq!(decoder.next_run(10), None);
        assert_eq!(decoder.position(), 8);
        Ok(())
    }

    #[test]
    fn test_skip_resumes_and_rewind_restarts() -> SegmentResult<()> {
        let mut decoder = NullRunDecoder::try_new(&null_map(), 8)?;
        assert_eq!(decoder.skip(3), 2);
        assert_eq!(decoder.skip(3), 1);
        assert_eq!(decoder.position(), 6);
        decoder.rewind();
        assert_eq!(decoder.position(), 0);
        assert_eq!(decoder.skip(1), 1);
        assert_eq!(decoder.next_run(10), Some((true, 1)));
        Ok(())
    }

    #[test]
    fn test_short_null_map_is_corruption() {
        let mut buf = Vec::new();
        encode_rle_runs(&mut buf, &[(0, 4)], 1);
        let err = NullRunDecoder::try_new(&buf, 5).unwrap_err();
        assert!(err.is_corruption());
    }
}
