//! Synthetic byte generator, the `BaseSourceOps` analogue of the
//! teacher's `source-videos` pattern generators (`src/patterns.rs`):
//! no demuxer, no codec, just bytes shaped the way tests need them.

use corestream::base_src::{BaseSource, BaseSourceOps, GetRangeResult};
use corestream::{Buffer, Caps};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

/// Byte pattern a `FakeSrc` fills each buffer with.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FillPattern {
    Zero,
    /// Each byte set to `offset mod 256`, so a buffer's content encodes
    /// where in the stream it came from (useful for assertions).
    Counter,
}

pub struct FakeSrc {
    pattern: FillPattern,
    total_size: Option<i64>,
    created: AtomicU64,
}

impl FakeSrc {
    pub fn new(pattern: FillPattern, total_size: Option<i64>) -> Self {
        Self {
            pattern,
            total_size,
            created: AtomicU64::new(0),
        }
    }

    /// Number of buffers actually produced by `create` so far.
    pub fn created_count(&self) -> u64 {
        self.created.load(Ordering::SeqCst)
    }

    pub fn element(name: impl Into<String>, pattern: FillPattern, total_size: Option<i64>) -> BaseSource {
        BaseSource::new(name, Arc::new(Self::new(pattern, total_size)))
    }
}

impl BaseSourceOps for FakeSrc {
    fn create(&self, _src: &BaseSource, offset: i64, length: i64) -> GetRangeResult {
        self.created.fetch_add(1, Ordering::SeqCst);
        let mut data = vec![0u8; length as usize];
        if self.pattern == FillPattern::Counter {
            for (i, byte) in data.iter_mut().enumerate() {
                *byte = ((offset + i as i64) % 256) as u8;
            }
        }
        let mut buffer = Buffer::from_vec(data);
        buffer.set_offsets(Some(offset as u64), Some((offset + length) as u64));
        Ok(buffer)
    }

    fn get_size(&self, _src: &BaseSource) -> Option<i64> {
        self.total_size
    }

    fn is_seekable(&self, _src: &BaseSource) -> bool {
        self.total_size.is_some()
    }

    fn get_caps(&self, _src: &BaseSource) -> Caps {
        Caps::new_any()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use corestream::pad::FlowReturn;

    #[test]
    fn produces_requested_number_of_buffers_then_eos() {
        let src = FakeSrc::element("fakesrc0", FillPattern::Zero, None);
        src.set_blocksize(16);
        src.set_num_buffers(Some(3));
        for _ in 0..3 {
            assert!(src.get_range(-1, 16).is_ok());
        }
        assert!(matches!(src.get_range(-1, 16), Err(FlowReturn::Unexpected)));
    }

    #[test]
    fn counter_pattern_encodes_offset() {
        let src = FakeSrc::element("fakesrc1", FillPattern::Counter, Some(64));
        src.set_num_buffers(None);
        let buf = src.get_range(32, 16).unwrap();
        assert_eq!(buf.data()[0], 32);
    }
}
