use crate::segment::error::{fmt_err, SegmentErrorExt, SegmentResult};
use crate::segment::io::{ByteCursor, PageFooter, PageSource, PageType};
use crate::segment::meta::{PageLocator, ZoneMap};
use crate::segment_read::index::IndexLoadContext;
use once_cell::sync::OnceCell;
use segcol_core::col_type::FieldType;
use segcol_core::datum::Datum;

const FLAG_HAS_NULL: u8 = 1;
const FLAG_HAS_NOT_NULL: u8 = 2;
const FLAG_PASS_ALL: u8 = 4;

/// Parses the bounds of a zone map.
///
/// With nulls present the min is null. If the page holds nothing but nulls
/// the max is null as well.
pub fn parse_zone_map(zone_map: &ZoneMap, field_type: FieldType, length: usize) -> SegmentResult<(Datum, Datum)> {
    let min = if zone_map.has_null {
        Datum::Null
    } else {
        Datum::from_text(field_type, &zone_map.min, length).context("zone map min")?
    };
    let max = if zone_map.has_null && !zone_map.has_not_null {
        Datum::Null
    } else {
        Datum::from_text(field_type, &zone_map.max, length).context("zone map max")?
    };
    Ok((min, max))
}

fn parse_page_zone_maps(body: &[u8], num_entries: u32) -> SegmentResult<Vec<ZoneMap>> {
    let mut cursor = ByteCursor::new(body);
    let mut zone_maps = Vec::with_capacity(num_entries as usize);
    for idx in 0..num_entries {
        let flags = cursor.read_u8()?;
        let min = read_text(&mut cursor, idx)?;
        let max = read_text(&mut cursor, idx)?;
        zone_maps.push(ZoneMap {
            min,
            max,
            has_null: flags & FLAG_HAS_NULL != 0,
            has_not_null: flags & FLAG_HAS_NOT_NULL != 0,
            pass_all: flags & FLAG_PASS_ALL != 0,
        });
    }
    Ok(zone_maps)
}

fn read_text(cursor: &mut ByteCursor<'_>, idx: u32) -> SegmentResult<String> {
    let bytes = cursor.read_len_prefixed()?;
    String::from_utf8(bytes.to_vec())
        .map_err(|_| fmt_err!(Corruption, "zone map {} bound is not valid utf8", idx))
}

/// Column-level zone map plus the lazily loaded per-page zone maps.
#[derive(Debug)]
pub struct ZoneMapIndexReader {
    page_zone_maps_page: PageLocator,
    segment_zone_map: ZoneMap,
    page_zone_maps: OnceCell<Vec<ZoneMap>>,
}

impl ZoneMapIndexReader {
    pub fn new(segment_zone_map: ZoneMap, page_zone_maps: PageLocator) -> Self {
        Self {
            page_zone_maps_page: page_zone_maps,
            segment_zone_map,
            page_zone_maps: OnceCell::new(),
        }
    }

    pub fn segment_zone_map(&self) -> &ZoneMap {
        &self.segment_zone_map
    }

    pub fn load(&self, source: &dyn PageSource, ctx: &IndexLoadContext) -> SegmentResult<&[ZoneMap]> {
        let zone_maps = self.page_zone_maps.get_or_try_init(|| {
            let handle =
                source.read_page(&ctx.page_options(PageType::Index), self.page_zone_maps_page)?;
            let PageFooter::Index { num_entries } = handle.footer else {
                return Err(fmt_err!(Corruption, "zone map index is not an index page"));
            };
            let zone_maps = parse_page_zone_maps(&handle.body, num_entries)?;
            log::debug!("loaded zone map index of {} [pages={}]", ctx.path, zone_maps.len());
            Ok(zone_maps)
        })?;
        Ok(zone_maps.as_slice())
    }

    pub fn num_pages(&self) -> Option<usize> {
        self.page_zone_maps.get().map(Vec::len)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn encode_page_zone_maps(zone_maps: &[ZoneMap]) -> Vec<u8> {
        let mut out = Vec::new();
        for zm in zone_maps {
            let mut flags = 0;
            if zm.has_null {
                flags |= FLAG_HAS_NULL;
            }
            if zm.has_not_null {
                flags |= FLAG_HAS_NOT_NULL;
            }
            if zm.pass_all {
                flags |= FLAG_PASS_ALL;
            }
            out.push(flags);
            for text in [&zm.min, &zm.max] {
                out.extend_from_slice(&(text.len() as u32).to_le_bytes());
                out.extend_from_slice(text.as_bytes());
            }
        }
        out
    }

    #[test]
    fn test_parse_zone_map_null_rules() -> SegmentResult<()> {
        let mut zm = ZoneMap {
            min: "1".to_string(),
            max: "9".to_string(),
            has_null: false,
            has_not_null: true,
            pass_all: false,
        };
        assert_eq!(parse_zone_map(&zm, FieldType::Int, 0)?, (Datum::Int(1), Datum::Int(9)));

        zm.has_null = true;
        assert_eq!(parse_zone_map(&zm, FieldType::Int, 0)?, (Datum::Null, Datum::Int(9)));

        zm.has_not_null = false;
        zm.max = String::new();
        assert_eq!(parse_zone_map(&zm, FieldType::Int, 0)?, (Datum::Null, Datum::Null));
        Ok(())
    }

    #[test]
    fn test_bad_bound_is_reported_with_context() {
        let zm = ZoneMap {
            min: "x".to_string(),
            max: "9".to_string(),
            has_not_null: true,
            ..ZoneMap::default()
        };
        let err = parse_zone_map(&zm, FieldType::Int, 0).unwrap_err();
        assert_eq!(err.to_string(), "zone map min: invalid int literal: \"x\"");
    }

    #[test]
    fn test_page_zone_maps_layout() -> SegmentResult<()> {
        let zone_maps = vec![
            ZoneMap {
                min: "a".to_string(),
                max: "c".to_string(),
                has_null: true,
                has_not_null: true,
                pass_all: false,
            },
            ZoneMap::default(),
        ];
        let body = encode_page_zone_maps(&zone_maps);
        assert_eq!(parse_page_zone_maps(&body, 2)?, zone_maps);
        assert!(parse_page_zone_maps(&body, 3).unwrap_err().is_corruption());
        Ok(())
    }
}
