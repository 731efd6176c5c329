//! Per-handle matchtag allocator (spec §4.5 "allocate a matchtag from the
//! handle's pool", §5 "allocation is reference-counted"). A plain free-list
//! over two disjoint ranges: the regular range and, above
//! [`flux_types::Matchtag::STREAMING_BASE`], the streaming range reserved
//! for streaming RPCs.

use flux_types::{FluxError, FluxResult, Matchtag};

#[derive(Debug)]
pub struct MatchtagPool {
    next_regular: u32,
    next_streaming: u32,
    free_regular: Vec<u32>,
    free_streaming: Vec<u32>,
}

impl Default for MatchtagPool {
    fn default() -> Self {
        Self {
            next_regular: 1,
            next_streaming: Matchtag::STREAMING_BASE,
            free_regular: Vec::new(),
            free_streaming: Vec::new(),
        }
    }
}

impl MatchtagPool {
    pub fn new() -> Self {
        Self::default()
    }

    /// Allocates a tag from the streaming range if `streaming`, otherwise
    /// the regular range. Reuses a freed tag before minting a new one.
    pub fn alloc(&mut self, streaming: bool) -> FluxResult<Matchtag> {
        if streaming {
            if let Some(v) = self.free_streaming.pop() {
                return Ok(Matchtag::new(v));
            }
            if self.next_streaming == u32::MAX {
                return Err(FluxError::NoMemory);
            }
            let v = self.next_streaming;
            self.next_streaming += 1;
            Ok(Matchtag::new(v))
        } else {
            if let Some(v) = self.free_regular.pop() {
                return Ok(Matchtag::new(v));
            }
            if self.next_regular >= Matchtag::STREAMING_BASE {
                return Err(FluxError::NoMemory);
            }
            let v = self.next_regular;
            self.next_regular += 1;
            Ok(Matchtag::new(v))
        }
    }

    /// Returns a tag to the pool. A no-op for `Matchtag::NONE`, so callers
    /// can free unconditionally without checking first.
    pub fn free(&mut self, tag: Matchtag) {
        if tag.is_none() {
            return;
        }
        if tag.is_streaming() {
            self.free_streaming.push(tag.get());
        } else {
            self.free_regular.push(tag.get());
        }
    }
}
