//! Byte-oriented source backed by an in-memory buffer — the demo
//! stand-in for real file I/O described in SPEC_FULL.md's Non-goals: it
//! never touches the filesystem, only exercises BYTES-format seeking and
//! `get_range`/`do_seek` against a `Vec<u8>`.

use corestream::base_src::{BaseSource, BaseSourceOps, GetRangeResult};
use corestream::pad::FlowReturn;
use corestream::segment::Segment;
use corestream::Buffer;
use std::sync::Arc;

pub struct FileByteSrc {
    data: Vec<u8>,
}

impl FileByteSrc {
    pub fn new(data: Vec<u8>) -> Self {
        Self { data }
    }

    pub fn element(name: impl Into<String>, data: Vec<u8>) -> BaseSource {
        let src = BaseSource::new(name, Arc::new(Self::new(data)));
        src.set_segment_format(corestream::segment::SegmentFormat::Bytes);
        src
    }
}

impl BaseSourceOps for FileByteSrc {
    fn create(&self, _src: &BaseSource, offset: i64, length: i64) -> GetRangeResult {
        let start = offset as usize;
        if start >= self.data.len() {
            return Err(FlowReturn::Unexpected);
        }
        let end = (start + length as usize).min(self.data.len());
        Ok(Buffer::from_vec(self.data[start..end].to_vec()))
    }

    fn get_size(&self, _src: &BaseSource) -> Option<i64> {
        Some(self.data.len() as i64)
    }

    fn is_seekable(&self, _src: &BaseSource) -> bool {
        true
    }

    fn do_seek(&self, _src: &BaseSource, segment: &mut Segment) -> bool {
        segment.position = segment.start;
        segment.time = segment.start;
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use corestream::event::{Event, EventKind, SeekFlags, SeekType};
    use corestream::segment::SegmentFormat;

    fn sample(len: usize) -> Vec<u8> {
        (0..len).map(|i| (i % 256) as u8).collect()
    }

    #[test]
    fn reads_the_requested_byte_range() {
        let src = FileByteSrc::element("filebytesrc0", sample(64));
        let buf = src.get_range(10, 8).unwrap();
        assert_eq!(buf.data(), &sample(64)[10..18]);
    }

    #[test]
    fn flushing_seek_jumps_to_requested_byte() {
        let src = FileByteSrc::element("filebytesrc1", sample(64));
        let ev = Event::new(EventKind::Seek {
            rate: 1.0,
            format: SegmentFormat::Bytes,
            flags: SeekFlags::FLUSH,
            start_type: SeekType::Set,
            start: 40,
            stop_type: SeekType::None,
            stop: 0,
        });
        assert!(src.perform_seek(&ev));
        assert_eq!(src.segment().position, 40);
    }
}
