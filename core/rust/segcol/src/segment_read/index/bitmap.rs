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
use crate::segment::error::{fmt_err, SegmentResult};
use crate::segment::io::{ByteCursor, PageFooter, PageSource, PageType};
use crate::segment::meta::PageLocator;
use crate::segment_read::index::IndexLoadContext;
use bytes::Bytes;
use once_cell::sync::OnceCell;
use roaring::RoaringBitmap;

/// Sorted dictionary of distinct values, each with the bitmap of rows
/// holding it. An extra trailing bitmap collects the null rows.
#[derive(Debug)]
pub struct BitmapIndex {
    words: Vec<Bytes>,
    bitmaps: Vec<Bytes>,
    has_null: bool,
}

fn parse_entries(body: &Bytes, num_entries: u32) -> SegmentResult<Vec<Bytes>> {
    let mut cursor = ByteCursor::new(body);
    let mut entries = Vec::with_capacity(num_entries as usize);
    for _ in 0..num_entries {
        let len = cursor.read_u32()? as usize;
        let start = cursor.position();
        cursor.read_bytes(len)?;
        entries.push(body.slice(start..start + len));
    }
    Ok(entries)
}

fn read_index_page(
    source: &dyn PageSource,
    ctx: &IndexLoadContext,
    locator: PageLocator,
) -> SegmentResult<Vec<Bytes>> {
    let handle = source.read_page(&ctx.page_options(PageType::Index), locator)?;
    let PageFooter::Index { num_entries } = handle.footer else {
        return Err(fmt_err!(Corruption, "bitmap index column is not an index page"));
    };
    parse_entries(&handle.body, num_entries)
}

impl BitmapIndex {
    fn try_new(words: Vec<Bytes>, bitmaps: Vec<Bytes>) -> SegmentResult<Self> {
        let has_null = match bitmaps.len().checked_sub(words.len()) {
            Some(0) => false,
            Some(1) => true,
            _ => {
                return Err(fmt_err!(
                    Corruption,
                    "bitmap index has {} words but {} bitmaps",
                    words.len(),
                    bitmaps.len()
                ))
            }
        };
        if words.windows(2).any(|pair| pair[0] >= pair[1]) {
            return Err(fmt_err!(Corruption, "bitmap index dictionary is not sorted"));
        }
        Ok(Self { words, bitmaps, has_null })
    }

    fn bitmap(&self, ordinal: usize) -> SegmentResult<RoaringBitmap> {
        let bytes = self.bitmaps.get(ordinal).ok_or_else(|| {
            fmt_err!(
                NotFound,
                "bitmap {} out of {} bitmaps",
                ordinal,
                self.bitmaps.len()
            )
        })?;
        RoaringBitmap::deserialize_from(bytes.as_ref())
            .map_err(|e| fmt_err!(Corruption, "bitmap {} cannot be decoded: {}", ordinal, e))
    }
}

#[derive(Debug)]
pub struct BitmapIndexReader {
    dict_page: PageLocator,
    bitmap_page: PageLocator,
    index: OnceCell<BitmapIndex>,
}

impl BitmapIndexReader {
    pub fn new(dict_page: PageLocator, bitmap_page: PageLocator) -> Self {
        Self { dict_page, bitmap_page, index: OnceCell::new() }
    }

    pub fn load(&self, source: &dyn PageSource, ctx: &IndexLoadContext) -> SegmentResult<&BitmapIndex> {
        self.index.get_or_try_init(|| {
            let words = read_index_page(source, ctx, self.dict_page)?;
            let bitmaps = read_index_page(source, ctx, self.bitmap_page)?;
            let index = BitmapIndex::try_new(words, bitmaps)?;
            log::debug!(
                "loaded bitmap index of {} [words={}, has_null={}]",
                ctx.path,
                index.words.len(),
                index.has_null
            );
            Ok(index)
        })
    }

    pub fn new_iterator<'a>(
        &'a self,
        source: &dyn PageSource,
        ctx: &IndexLoadContext,
    ) -> SegmentResult<BitmapIndexIterator<'a>> {
        Ok(BitmapIndexIterator { index: self.load(source, ctx)?, current: 0 })
    }
}

/// Walks the dictionary of a bitmap index.
#[derive(Debug)]
pub struct BitmapIndexIterator<'a> {
    index: &'a BitmapIndex,
    current: usize,
}

impl BitmapIndexIterator<'_> {
    /// Number of distinct non-null values.
    pub fn bitmap_nums(&self) -> usize {
        self.index.words.len()
    }

    pub fn has_null_bitmap(&self) -> bool {
        self.index.has_null
    }

    pub fn current_ordinal(&self) -> usize {
        self.current
    }

    pub fn current_value(&self) -> Option<&[u8]> {
        self.index.words.get(self.current).map(Bytes::as_ref)
    }

    /// Positions at the first word `>= value`. Returns true on an exact match,
    /// `NotFound` if every word is smaller.
    pub fn seek_dictionary(&mut self, value: &[u8]) -> SegmentResult<bool> {
        let words = &self.index.words;
        let pos = words.partition_point(|word| word.as_ref() < value);
        if pos == words.len() {
            return Err(fmt_err!(NotFound, "no dictionary value at or after the probe"));
        }
        self.current = pos;
        Ok(words[pos].as_ref() == value)
    }

    pub fn read_bitmap(&self, ordinal: usize) -> SegmentResult<RoaringBitmap> {
        if ordinal >= self.bitmap_nums() {
            return Err(fmt_err!(
                NotFound,
                "bitmap ordinal {} out of {} values",
                ordinal,
                self.bitmap_nums()
            ));
        }
        self.index.bitmap(ordinal)
    }

    /// Rows holding null, empty if the column has none.
    pub fn read_null_bitmap(&self) -> SegmentResult<RoaringBitmap> {
        if self.index.has_null {
            self.index.bitmap(self.index.words.len())
        } else {
            Ok(RoaringBitmap::new())
        }
    }

    /// Union of the bitmaps of dictionary ordinals `[from, to)`.
    pub fn read_union_bitmap(&self, from: usize, to: usize) -> SegmentResult<RoaringBitmap> {
        let to = to.min(self.bitmap_nums());
        let mut result = RoaringBitmap::new();
        for ordinal in from..to {
            result |= self.index.bitmap(ordinal)?;
        }
        Ok(result)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn serialized(rows: &[u32]) -> Bytes {
        let bitmap: RoaringBitmap = rows.iter().copied().collect();
        let mut out = Vec::new();
        bitmap.serialize_into(&mut out).unwrap();
        Bytes::from(out)
    }

    fn index() -> BitmapIndex {
        let words = ["apple", "kiwi", "pear"]
            .iter()
            .map(|w| Bytes::from_static(w.as_bytes()))
            .collect();
        let bitmaps = vec![
            serialized(&[0, 3]),
            serialized(&[1]),
            serialized(&[2, 4]),
            serialized(&[5]),
        ];
        BitmapIndex::try_new(words, bitmaps).unwrap()
    }

    #[test]
    fn test_seek_and_read() -> SegmentResult<()> {
        let index = index();
        let mut iter = BitmapIndexIterator { index: &index, current: 0 };
        assert!(iter.seek_dictionary(b"kiwi")?);
        assert_eq!(iter.current_ordinal(), 1);
        assert!(!iter.seek_dictionary(b"banana")?);
        assert_eq!(iter.current_value(), Some(&b"kiwi"[..]));
        assert!(iter.seek_dictionary(b"zebra").unwrap_err().is_not_found());

        let rows: Vec<u32> = iter.read_bitmap(2)?.iter().collect();
        assert_eq!(rows, vec![2, 4]);
        let nulls: Vec<u32> = iter.read_null_bitmap()?.iter().collect();
        assert_eq!(nulls, vec![5]);
        let union: Vec<u32> = iter.read_union_bitmap(0, 2)?.iter().collect();
        assert_eq!(union, vec![0, 1, 3]);
        assert!(iter.read_bitmap(3).unwrap_err().is_not_found());
        Ok(())
    }

    #[test]
    fn test_mismatched_counts_are_corruption() {
        let words = vec![Bytes::from_static(b"a")];
        let err = BitmapIndex::try_new(words, vec![]).unwrap_err();
        assert!(err.is_corruption());

        let unsorted = vec![Bytes::from_static(b"b"), Bytes::from_static(b"a")];
        let err = BitmapIndex::try_new(unsorted, vec![serialized(&[0]), serialized(&[1])]).unwrap_err();
        assert!(err.is_corruption());
    }
}
