//! Newline-delimited frame decoder.
//!
//! The transport hands us byte chunks split at arbitrary points; this
//! state machine accumulates them, yields the payload of every
//! complete `data:` line, and keeps the partial trailing line for the
//! next chunk. Comment and heartbeat lines (no `data:` marker) are
//! dropped silently. Decoding is invariant to how the input is
//! chunked.

/// Cap on buffered bytes awaiting a newline.
const MAX_STREAM_BUFFER_SIZE: usize = 1_000_000;

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum DecodeError {
    #[error("stream buffer exceeded maximum size without a newline")]
    BufferOverflow,
}

/// Incremental decoder for one stream. Create one per session.
///
/// Buffers raw bytes and only converts to text per complete line, so
/// a multi-byte UTF-8 character split across a chunk boundary decodes
/// intact.
#[derive(Debug, Default)]
pub struct SseDecoder {
    buffer: Vec<u8>,
}

impl SseDecoder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Feed one chunk, returning the payloads of all lines it completed.
    pub fn push(&mut self, chunk: &[u8]) -> Result<Vec<String>, DecodeError> {
        if self.buffer.len() + chunk.len() > MAX_STREAM_BUFFER_SIZE {
            return Err(DecodeError::BufferOverflow);
        }
        self.buffer.extend_from_slice(chunk);

        let mut payloads = Vec::new();
        while let Some(newline) = self.buffer.iter().position(|&b| b == b'\n') {
            let line: Vec<u8> = self.buffer.drain(..=newline).collect();
            let text = String::from_utf8_lossy(&line[..line.len() - 1]);
            if let Some(payload) = payload_of(text.trim()) {
                payloads.push(payload);
            }
        }
        Ok(payloads)
    }

    /// Flush the remainder at stream end, in case the final frame was
    /// not newline-terminated.
    pub fn finish(&mut self) -> Option<String> {
        let bytes = std::mem::take(&mut self.buffer);
        let text = String::from_utf8_lossy(&bytes);
        payload_of(text.trim())
    }
}

fn payload_of(line: &str) -> Option<String> {
    let payload = line.strip_prefix("data:")?.trim_start();
    if payload.is_empty() {
        None
    } else {
        Some(payload.to_string())
    }
}
