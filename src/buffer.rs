//! Payload buffers: refcounted, copy-on-write (spec §3/§5).

use crate::caps::Caps;
use std::sync::Arc;

bitflags::bitflags! {
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct BufferFlags: u32 {
        const NONE = 0;
        const DISCONT = 1 << 0;
        const READONLY = 1 << 1;
    }
}

#[derive(Debug, Clone)]
struct BufferInner {
    data: Vec<u8>,
    timestamp: Option<u64>,
    duration: Option<u64>,
    offset: Option<u64>,
    offset_end: Option<u64>,
    caps: Option<Caps>,
    flags: BufferFlags,
}

/// Buffer handle. Cheap to clone (bumps the `Arc` refcount); mutation
/// performs copy-on-write when the refcount is greater than one or the
/// buffer is marked read-only (spec §3/§5).
#[derive(Debug, Clone)]
pub struct Buffer {
    inner: Arc<BufferInner>,
}

impl Buffer {
    pub fn from_vec(data: Vec<u8>) -> Self {
        Self {
            inner: Arc::new(BufferInner {
                data,
                timestamp: None,
                duration: None,
                offset: None,
                offset_end: None,
                caps: None,
                flags: BufferFlags::NONE,
            }),
        }
    }

    pub fn len(&self) -> usize {
        self.inner.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.data.is_empty()
    }

    pub fn data(&self) -> &[u8] {
        &self.inner.data
    }

    pub fn timestamp(&self) -> Option<u64> {
        self.inner.timestamp
    }

    pub fn duration(&self) -> Option<u64> {
        self.inner.duration
    }

    pub fn offset(&self) -> Option<u64> {
        self.inner.offset
    }

    pub fn offset_end(&self) -> Option<u64> {
        self.inner.offset_end
    }

    pub fn caps(&self) -> Option<&Caps> {
        self.inner.caps.as_ref()
    }

    pub fn flags(&self) -> BufferFlags {
        self.inner.flags
    }

    pub fn is_writable(&self) -> bool {
        Arc::strong_count(&self.inner) == 1 && !self.inner.flags.contains(BufferFlags::READONLY)
    }

    /// Get a mutable view, copying the backing data first if this handle
    /// is shared or read-only (copy-on-write, spec §5).
    fn make_mut(&mut self) -> &mut BufferInner {
        if !self.is_writable() {
            let cloned = (*self.inner).clone();
            self.inner = Arc::new(cloned);
        }
        Arc::get_mut(&mut self.inner).expect("uniquely owned after make_mut")
    }

    pub fn set_timestamp(&mut self, ts: Option<u64>) {
        self.make_mut().timestamp = ts;
    }

    pub fn set_duration(&mut self, dur: Option<u64>) {
        self.make_mut().duration = dur;
    }

    pub fn set_offsets(&mut self, offset: Option<u64>, offset_end: Option<u64>) {
        let inner = self.make_mut();
        inner.offset = offset;
        inner.offset_end = offset_end;
    }

    pub fn set_caps(&mut self, caps: Option<Caps>) {
        self.make_mut().caps = caps;
    }

    pub fn set_discont(&mut self, discont: bool) {
        let inner = self.make_mut();
        if discont {
            inner.flags |= BufferFlags::DISCONT;
        } else {
            inner.flags.remove(BufferFlags::DISCONT);
        }
    }

    pub fn mark_readonly(&mut self) {
        self.make_mut().flags |= BufferFlags::READONLY;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn clone_shares_storage_until_mutated() {
        let a = Buffer::from_vec(vec![1, 2, 3]);
        let mut b = a.clone();
        assert!(!a.is_writable());
        b.set_timestamp(Some(42));
        assert_eq!(a.timestamp(), None);
        assert_eq!(b.timestamp(), Some(42));
    }

    #[test]
    fn unique_buffer_is_writable() {
        let mut a = Buffer::from_vec(vec![1]);
        assert!(a.is_writable());
        a.set_discont(true);
        assert!(a.flags().contains(BufferFlags::DISCONT));
    }

    #[test]
    fn readonly_forces_copy_on_write() {
        let mut a = Buffer::from_vec(vec![1]);
        a.mark_readonly();
        assert!(!a.is_writable());
    }
}
