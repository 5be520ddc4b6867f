use crate::segment::io::{PageReadOptions, PageType};
use crate::segment::meta::CompressionCodec;

pub mod bitmap;
pub mod bloom_filter;
pub mod ordinal;
pub mod zone_map;

/// What an index reader needs to fetch its pages.
#[derive(Debug, Clone)]
pub struct IndexLoadContext {
    pub path: String,
    pub codec: CompressionCodec,
    pub verify_checksum: bool,
    pub kept_in_memory: bool,
}

impl IndexLoadContext {
    /// Index pages are always eligible for the page cache.
    pub fn page_options(&self, page_type: PageType) -> PageReadOptions {
        PageReadOptions {
            codec: self.codec,
            verify_checksum: self.verify_checksum,
            use_page_cache: true,
            kept_in_memory: self.kept_in_memory,
            page_type,
        }
    }
}
