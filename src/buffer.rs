use arrayvec::ArrayVec;

use crate::frame::MAX_FRAME_LEN;

/// Capture buffer for one received frame, allocated per exchange.
#[derive(Debug, Default, Clone)]
pub struct FrameBuffer {
    data: ArrayVec<u8, MAX_FRAME_LEN>,
}

impl FrameBuffer {
    pub fn new() -> FrameBuffer {
        FrameBuffer {
            data: ArrayVec::new(),
        }
    }

    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    pub fn is_full(&self) -> bool {
        self.data.is_full()
    }

    /// Append a byte, returns false if the buffer is already full.
    pub fn push(&mut self, byte: u8) -> bool {
        self.data.try_push(byte).is_ok()
    }

    pub fn first(&self) -> Option<u8> {
        self.data.first().copied()
    }

    pub fn clear(&mut self) {
        self.data.clear();
    }
}

impl AsRef<[u8]> for FrameBuffer {
    fn as_ref(&self) -> &[u8] {
        self.data.as_slice()
    }
}

impl From<&[u8]> for FrameBuffer {
    /// Bytes beyond the capacity are dropped.
    fn from(bytes: &[u8]) -> Self {
        let mut buf = FrameBuffer::new();
        bytes.iter().take(MAX_FRAME_LEN).for_each(|&b| {
            buf.push(b);
        });
        buf
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn get_buffer() -> FrameBuffer {
        FrameBuffer::from(&b"abcdabcdabcd"[..])
    }

    #[test]
    fn test_slice() {
        let buf = get_buffer();
        assert_eq!(buf.as_ref().len(), buf.len());
        assert_eq!(buf.first(), Some(b'a'));
    }

    #[test]
    fn test_capacity() {
        let mut buf = FrameBuffer::new();
        for n in 0..MAX_FRAME_LEN {
            assert!(buf.push(n as u8));
        }
        assert!(buf.is_full());
        assert!(!buf.push(0xFF));
        assert_eq!(buf.len(), MAX_FRAME_LEN);
        buf.clear();
        assert!(buf.is_empty());
    }
}
