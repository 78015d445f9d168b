//! Pad/element queries (position, duration, seeking capability, …),
//! answered by [`crate::base_src::BaseSourceOps`] defaults (spec §4.6).

use crate::segment::SegmentFormat;

#[derive(Debug, Clone)]
pub enum Query {
    Position {
        format: SegmentFormat,
        result: Option<i64>,
    },
    Duration {
        format: SegmentFormat,
        result: Option<i64>,
    },
    Seeking {
        format: SegmentFormat,
        seekable: bool,
        segment_start: i64,
        segment_end: Option<i64>,
    },
    Segment {
        rate: f64,
        format: SegmentFormat,
        start: i64,
        stop: Option<i64>,
    },
    Formats {
        formats: Vec<SegmentFormat>,
    },
    Convert {
        src_format: SegmentFormat,
        src_value: i64,
        dest_format: SegmentFormat,
        result: Option<i64>,
    },
}

impl Query {
    pub fn new_position(format: SegmentFormat) -> Self {
        Query::Position { format, result: None }
    }

    pub fn new_duration(format: SegmentFormat) -> Self {
        Query::Duration { format, result: None }
    }

    pub fn new_seeking(format: SegmentFormat) -> Self {
        Query::Seeking {
            format,
            seekable: false,
            segment_start: 0,
            segment_end: None,
        }
    }

    pub fn new_convert(src_format: SegmentFormat, src_value: i64, dest_format: SegmentFormat) -> Self {
        Query::Convert {
            src_format,
            src_value,
            dest_format,
            result: None,
        }
    }
}
