//! A live source: buffers arrive only once the element reaches PLAYING
//! (spec §4.6 "Live-source gating"), simulating e.g. a capture device
//! that can't rewind and produces data at wall-clock pace.

use corestream::base_src::{BaseSource, BaseSourceOps, GetRangeResult};
use corestream::Buffer;
use rand::Rng;
use std::sync::Arc;
use std::time::Duration;

pub struct LiveSrc {
    period: Duration,
    payload_size: usize,
}

impl LiveSrc {
    pub fn new(period: Duration, payload_size: usize) -> Self {
        Self { period, payload_size }
    }

    pub fn element(name: impl Into<String>, period: Duration, payload_size: usize) -> BaseSource {
        let src = BaseSource::new(name, Arc::new(Self::new(period, payload_size)));
        src.set_live(true);
        src
    }
}

impl BaseSourceOps for LiveSrc {
    fn create(&self, _src: &BaseSource, _offset: i64, _length: i64) -> GetRangeResult {
        std::thread::sleep(jittered(self.period));
        Ok(Buffer::from_vec(vec![0u8; self.payload_size]))
    }

    fn is_seekable(&self, _src: &BaseSource) -> bool {
        false
    }
}

/// +/-20% wall-clock jitter around `period`, the way a real capture
/// device's frame pacing never lands exactly on the nominal interval.
fn jittered(period: Duration) -> Duration {
    let factor = rand::thread_rng().gen_range(0.8..1.2);
    period.mul_f64(factor)
}

#[cfg(test)]
mod tests {
    use super::*;
    use corestream::element::State;

    #[test]
    fn stays_blocked_until_playing() {
        let src = LiveSrc::element("live0", Duration::from_millis(5), 8);
        src.set_num_buffers(None);
        let handle = {
            let s = src.clone();
            std::thread::spawn(move || s.get_range(0, 8))
        };
        std::thread::sleep(Duration::from_millis(30));
        assert!(!handle.is_finished());
        src.element().set_state(State::Playing).unwrap();
        let result = handle.join().unwrap();
        assert!(result.is_ok());
        src.element().set_state(State::Null).unwrap();
    }
}
