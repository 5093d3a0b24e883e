// SPDX-License-Identifier: Apache-2.0

//! Toy implementation of [`PacketBuffer`] which is useful for testing.

use crate::buffer::{
    Append, Headroom, MemoryBufferNotLongEnough, NotEnoughHeadRoom, NotEnoughTailRoom,
    PacketBufferAllocator, Prepend, Tailroom, TrimFromEnd, TrimFromStart,
};
use tracing::trace;

// only included for doc ref
#[cfg(doc)]
use crate::buffer::PacketBuffer;

// Caution: do not implement Clone for `TestBuffer`.
// Clone would significantly deviate from the actual mechanics of a real pool-backed buffer.
/// Toy data structure which implements [`PacketBuffer`]
///
/// The core function of this structure is to facilitate testing by "faking" many useful properties
/// of a pool-allocated buffer (without the need to spin up a host dataplane).
#[derive(Debug)]
pub struct TestBuffer {
    buffer: Vec<u8>,
    headroom: u16,
    tailroom: u16,
}

impl Drop for TestBuffer {
    fn drop(&mut self) {
        trace!("Dropping TestBuffer");
    }
}

impl TestBuffer {
    /// The maximum capacity of a `TestBuffer`.
    ///
    /// This is the maximum number of octets that can be stored in a `TestBuffer`.
    pub const CAPACITY: u16 = 2048;
    /// The reserved headroom of a `TestBuffer`.
    pub const HEADROOM: u16 = 96;
    /// The reserved tailroom of a `TestBuffer`.
    pub const TAILROOM: u16 = 96;

    /// Create a new (defaulted) `TestBuffer`.
    #[must_use]
    pub fn new() -> TestBuffer {
        let mut buffer = Vec::with_capacity(TestBuffer::CAPACITY as usize);
        let headroom = TestBuffer::HEADROOM;
        let tailroom = TestBuffer::TAILROOM;
        // fill the test buffer with a simple pattern of bytes to help debug any memory access
        // errors
        for i in 0..buffer.capacity() {
            #[allow(clippy::cast_possible_truncation)] // sound due to bitwise and
            buffer.push((i & usize::from(u8::MAX)) as u8);
        }
        TestBuffer {
            buffer,
            headroom,
            tailroom,
        }
    }

    /// Create a new `TestBuffer` from a given slice of octets
    #[must_use]
    pub fn from_raw_data(data: &[u8]) -> TestBuffer {
        let mut buffer = Vec::with_capacity(TestBuffer::CAPACITY as usize);
        buffer.extend_from_slice(&[0; TestBuffer::HEADROOM as usize]);
        buffer.extend_from_slice(data);
        buffer.extend_from_slice(&[0; TestBuffer::TAILROOM as usize]);
        TestBuffer {
            buffer,
            headroom: TestBuffer::HEADROOM,
            tailroom: TestBuffer::TAILROOM,
        }
    }
}

impl Default for TestBuffer {
    fn default() -> TestBuffer {
        TestBuffer::new()
    }
}

impl AsRef<[u8]> for TestBuffer {
    fn as_ref(&self) -> &[u8] {
        let start = self.headroom as usize;
        let end = self.buffer.len() - self.tailroom as usize;
        &self.buffer.as_slice()[start..end]
    }
}

impl AsMut<[u8]> for TestBuffer {
    fn as_mut(&mut self) -> &mut [u8] {
        let start = self.headroom as usize;
        let end = self.buffer.len() - self.tailroom as usize;
        &mut self.buffer.as_mut_slice()[start..end]
    }
}

impl Headroom for TestBuffer {
    fn headroom(&self) -> u16 {
        self.headroom
    }
}

impl Tailroom for TestBuffer {
    fn tailroom(&self) -> u16 {
        self.tailroom
    }
}

impl Prepend for TestBuffer {
    type Error = NotEnoughHeadRoom;
    fn prepend(&mut self, len: u16) -> Result<&mut [u8], Self::Error> {
        if self.headroom < len {
            return Err(NotEnoughHeadRoom);
        }
        self.headroom -= len;
        Ok(self.as_mut())
    }
}

impl Append for TestBuffer {
    type Error = NotEnoughTailRoom;
    fn append(&mut self, len: u16) -> Result<&mut [u8], Self::Error> {
        if self.tailroom < len {
            return Err(NotEnoughTailRoom);
        }
        self.tailroom -= len;
        Ok(self.as_mut())
    }
}

impl TrimFromStart for TestBuffer {
    type Error = MemoryBufferNotLongEnough;
    fn trim_from_start(&mut self, len: u16) -> Result<&mut [u8], MemoryBufferNotLongEnough> {
        debug_assert!((self.headroom + self.tailroom) as usize <= self.buffer.len());
        debug_assert!(
            (self.headroom + self.tailroom) as usize + self.as_ref().len() == self.buffer.len()
        );
        if (self.headroom + self.tailroom + len) as usize > self.buffer.len() {
            return Err(MemoryBufferNotLongEnough);
        }
        self.headroom += len;
        Ok(self.as_mut())
    }
}

impl TrimFromEnd for TestBuffer {
    type Error = MemoryBufferNotLongEnough;
    fn trim_from_end(&mut self, len: u16) -> Result<&mut [u8], MemoryBufferNotLongEnough> {
        debug_assert!((self.headroom + self.tailroom) as usize <= self.buffer.len());
        debug_assert!(
            (self.headroom + self.tailroom) as usize + self.as_ref().len() == self.buffer.len()
        );
        if (self.headroom + self.tailroom + len) as usize > self.buffer.len() {
            return Err(MemoryBufferNotLongEnough);
        }
        self.tailroom += len;
        Ok(self.as_mut())
    }
}

/// Error indicating that a requested [`TestBuffer`] allocation exceeds [`TestBuffer::CAPACITY`].
#[non_exhaustive]
#[repr(transparent)]
#[derive(Debug, thiserror::Error)]
#[error("requested length exceeds TestBuffer capacity")]
pub struct TestBufferTooLong;

/// A trivial [`PacketBufferAllocator`] which mints zeroed [`TestBuffer`]s.
#[derive(Debug, Default, Clone, Copy)]
pub struct TestBufferAllocator;

impl PacketBufferAllocator for TestBufferAllocator {
    type Buf = TestBuffer;
    type Error = TestBufferTooLong;

    fn allocate(&self, len: u16) -> Result<TestBuffer, TestBufferTooLong> {
        if len > TestBuffer::CAPACITY - TestBuffer::HEADROOM - TestBuffer::TAILROOM {
            return Err(TestBufferTooLong);
        }
        Ok(TestBuffer::from_raw_data(&vec![0; usize::from(len)]))
    }
}

#[allow(clippy::unwrap_used)] // valid in test code
#[cfg(test)]
mod test {
    use crate::buffer::{
        PacketBufferAllocator, Prepend, TestBuffer, TestBufferAllocator, TrimFromEnd,
        TrimFromStart,
    };

    #[test]
    fn raw_data_round_trip() {
        let data = [0xAB_u8; 64];
        let buffer = TestBuffer::from_raw_data(&data);
        assert_eq!(buffer.as_ref(), data.as_slice());
    }

    #[test]
    fn trim_and_prepend() {
        let mut buffer = TestBuffer::from_raw_data(&[7_u8; 32]);
        buffer.trim_from_start(4).unwrap();
        buffer.trim_from_end(4).unwrap();
        assert_eq!(buffer.as_ref().len(), 24);
        buffer.prepend(4).unwrap();
        assert_eq!(buffer.as_ref().len(), 28);
    }

    #[test]
    fn allocator_produces_exact_lengths() {
        let allocator = TestBufferAllocator;
        let buffer = allocator.allocate(123).unwrap();
        assert_eq!(buffer.as_ref().len(), 123);
        assert!(buffer.as_ref().iter().all(|b| *b == 0));
        assert!(allocator.allocate(TestBuffer::CAPACITY).is_err());
    }
}
