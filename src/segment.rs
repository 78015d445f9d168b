//! Segment arithmetic, kept as one pure module per spec §9's guidance
//! ("Collect all segment math into one pure module with exhaustive
//! tests; it is the highest-bug-density region of the source").

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SegmentFormat {
    Undefined,
    Bytes,
    Time,
    Buffers,
}

/// Running playback coordinates (spec §3 Segment).
#[derive(Debug, Clone, PartialEq)]
pub struct Segment {
    pub rate: f64,
    pub applied_rate: f64,
    pub format: SegmentFormat,
    pub start: i64,
    pub stop: Option<i64>,
    pub time: i64,
    pub position: i64,
    pub duration: Option<i64>,
    pub flags: SegmentFlags,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct SegmentFlags {
    pub segment: bool,
}

impl Default for Segment {
    fn default() -> Self {
        Self::new(SegmentFormat::Bytes)
    }
}

impl Segment {
    pub fn new(format: SegmentFormat) -> Self {
        Self {
            rate: 1.0,
            applied_rate: 1.0,
            format,
            start: 0,
            stop: None,
            time: 0,
            position: 0,
            duration: None,
            flags: SegmentFlags::default(),
        }
    }

    /// Reset to origin, as after a flushing seek to absolute 0 (spec §8
    /// round-trip property).
    pub fn reset_to_origin(&mut self) {
        self.start = 0;
        self.time = 0;
        self.position = 0;
    }

    /// Advance `position` by a buffer of `size` measured in the segment's
    /// own format, capping at `stop` when set (spec §8 testable property).
    pub fn advance_position(&mut self, size: i64) {
        let next = self.position.saturating_add(size);
        self.position = match self.stop {
            Some(stop) => next.min(stop),
            None => next,
        };
    }

    /// Whether `position` has reached `stop` (loop termination per §4.6
    /// step (f)).
    pub fn at_stop(&self) -> bool {
        matches!(self.stop, Some(stop) if self.position >= stop)
    }

    /// Clip `[offset, offset+length)` against an optional total size and
    /// `self.stop`, returning the clipped length or `None` if the range is
    /// entirely past the end (spec §4.6 `get_range` step 3).
    pub fn clip_length(&self, offset: i64, length: i64, size: Option<i64>) -> Option<i64> {
        let mut end = offset.saturating_add(length);
        if let Some(size) = size {
            end = end.min(size);
        }
        if let Some(stop) = self.stop {
            end = end.min(stop);
        }
        if offset >= end {
            return None;
        }
        Some(end - offset)
    }

    /// The running range consumed so far, `[start, position)`, used to
    /// build a close-segment event on a non-flushing seek (spec §4.6
    /// step 6).
    pub fn consumed_range(&self) -> (i64, i64) {
        (self.start, self.position)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn advance_caps_at_stop() {
        let mut seg = Segment::new(SegmentFormat::Bytes);
        seg.stop = Some(40);
        seg.advance_position(16);
        assert_eq!(seg.position, 16);
        seg.advance_position(16);
        assert_eq!(seg.position, 32);
        seg.advance_position(16);
        assert_eq!(seg.position, 40);
        assert!(seg.at_stop());
    }

    #[test]
    fn three_buffers_sum_matches_spec_property() {
        // spec §8: after pushing n buffers of sizes {L_i}, position == sum.
        let mut seg = Segment::new(SegmentFormat::Bytes);
        for l in [16, 16, 16] {
            seg.advance_position(l);
        }
        assert_eq!(seg.position, 48);
    }

    #[test]
    fn reset_to_origin_matches_just_after_start() {
        let mut seg = Segment::new(SegmentFormat::Bytes);
        seg.start = 50;
        seg.time = 50;
        seg.position = 80;
        seg.reset_to_origin();
        assert_eq!(seg.start, 0);
        assert_eq!(seg.time, 0);
        assert_eq!(seg.position, 0);
    }

    #[test]
    fn clip_length_respects_stop_and_size() {
        let mut seg = Segment::new(SegmentFormat::Bytes);
        seg.stop = Some(100);
        assert_eq!(seg.clip_length(50, 30, Some(100)), Some(30));
        assert_eq!(seg.clip_length(80, 30, Some(100)), Some(20));
        assert_eq!(seg.clip_length(100, 30, Some(100)), None);
    }
}
