//! Append-only output sink shared between a task's pumps and its readers.

use std::sync::{PoisonError, RwLock};

use nfdeploy_core::OutputChunk;

/// Combined stdout/stderr of one subprocess, readable from any offset.
///
/// Writers append under the write lock; readers copy the unread suffix under
/// the read lock. Neither side holds the lock for longer than a copy.
#[derive(Debug, Default)]
pub struct OutputBuffer {
    data: RwLock<Vec<u8>>,
}

impl OutputBuffer {
    /// Create an empty buffer.
    pub fn new() -> Self {
        Self::default()
    }

    /// Append bytes.
    pub fn write(&self, bytes: &[u8]) {
        if bytes.is_empty() {
            return;
        }
        let mut data = self.data.write().unwrap_or_else(PoisonError::into_inner);
        data.extend_from_slice(bytes);
    }

    /// Everything written since `offset`, plus the offset to resume from.
    ///
    /// An offset past the end is not an error: it yields no data and the
    /// current length.
    pub fn read_from(&self, offset: usize) -> OutputChunk {
        let data = self.data.read().unwrap_or_else(PoisonError::into_inner);
        let len = data.len();
        if offset >= len {
            return OutputChunk {
                data: Vec::new(),
                new_offset: len,
            };
        }
        OutputChunk {
            data: data[offset..].to_vec(),
            new_offset: len,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    #[test]
    fn test_read_from_start() {
        let buf = OutputBuffer::new();
        assert_eq!(buf.read_from(0).new_offset, 0);
        buf.write(b"hello ");
        buf.write(b"world");

        let chunk = buf.read_from(0);
        assert_eq!(chunk.data, b"hello world");
        assert_eq!(chunk.new_offset, 11);
    }

    #[test]
    fn test_read_resumes_from_offset() {
        let buf = OutputBuffer::new();
        buf.write(b"abc");
        let first = buf.read_from(0);
        buf.write(b"def");
        let second = buf.read_from(first.new_offset);
        assert_eq!(second.data, b"def");
        assert_eq!(second.new_offset, 6);
    }

    #[test]
    fn test_offset_past_end() {
        let buf = OutputBuffer::new();
        buf.write(b"abc");
        let chunk = buf.read_from(100);
        assert!(chunk.data.is_empty());
        assert_eq!(chunk.new_offset, 3);
    }

    #[test]
    fn test_repeated_read_is_idempotent() {
        let buf = OutputBuffer::new();
        buf.write(b"line 1\nline 2\n");
        assert_eq!(buf.read_from(3), buf.read_from(3));
    }

    #[test]
    fn test_concurrent_reader_sees_every_byte_once() {
        let buf = Arc::new(OutputBuffer::new());
        let writer = {
            let buf = buf.clone();
            std::thread::spawn(move || {
                for i in 0..2000u32 {
                    buf.write(format!("{i}\n").as_bytes());
                }
            })
        };

        let mut collected = Vec::new();
        let mut offset = 0;
        loop {
            let done = writer.is_finished();
            let chunk = buf.read_from(offset);
            collected.extend_from_slice(&chunk.data);
            offset = chunk.new_offset;
            if done && chunk.data.is_empty() {
                break;
            }
        }
        writer.join().unwrap();

        let expected: String = (0..2000u32).map(|i| format!("{i}\n")).collect();
        assert_eq!(collected, expected.into_bytes());
    }
}
