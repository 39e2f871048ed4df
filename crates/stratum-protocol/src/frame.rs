//! Wire framing: every message is a little-endian `u32 length` followed by
//! `length` bytes, the first of which is the `u8` type id. The pump
//! tolerates frames split across reads and multiple frames per read, and
//! compacts leftover partial bytes to the buffer start after each feed.

use crate::error::NetError;
use byteorder::{ByteOrder, LittleEndian};

/// Upper bound on a single frame; anything larger is a protocol violation,
/// not a frame we should wait for.
const MAX_FRAME_LEN: usize = 1 << 20;

/// One decoded frame: the type id plus its payload bytes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawFrame {
    pub type_id: u8,
    pub payload: Vec<u8>,
}

/// Receive pump. Bytes accumulate in a growable buffer with a pending
/// count; complete frames are dispatched in order and the remainder slides
/// back to offset zero.
#[derive(Debug, Default)]
pub struct FramePump {
    buffer: Vec<u8>,
    pending: usize,
}

impl FramePump {
    pub fn new() -> Self {
        Self::default()
    }

    /// Bytes buffered but not yet dispatched.
    pub fn pending(&self) -> usize {
        self.pending
    }

    /// Appends a read's worth of bytes and returns every complete frame now
    /// buffered, in arrival order.
    pub fn feed(&mut self, chunk: &[u8]) -> Result<Vec<RawFrame>, NetError> {
        if self.pending + chunk.len() > self.buffer.len() {
            self.buffer.resize(self.pending + chunk.len(), 0);
        }
        self.buffer[self.pending..self.pending + chunk.len()].copy_from_slice(chunk);
        self.pending += chunk.len();

        let mut frames = Vec::new();
        let mut offset = 0;
        while self.pending - offset >= 4 {
            let length = LittleEndian::read_u32(&self.buffer[offset..]) as usize;
            if length == 0 {
                return Err(NetError::Protocol("zero-length frame".to_owned()));
            }
            if length > MAX_FRAME_LEN {
                return Err(NetError::Protocol(format!(
                    "frame length {} exceeds limit",
                    length
                )));
            }
            if 4 + length > self.pending - offset {
                break;
            }
            frames.push(RawFrame {
                type_id: self.buffer[offset + 4],
                payload: self.buffer[offset + 5..offset + 4 + length].to_vec(),
            });
            offset += 4 + length;
        }

        if offset > 0 {
            self.buffer.copy_within(offset..self.pending, 0);
            self.pending -= offset;
        }
        Ok(frames)
    }
}

/// Wraps a type id and payload into one length-prefixed frame.
pub fn encode_frame(type_id: u8, payload: &[u8]) -> Vec<u8> {
    let mut frame = Vec::with_capacity(5 + payload.len());
    let mut header = [0u8; 4];
    LittleEndian::write_u32(&mut header, (payload.len() + 1) as u32);
    frame.extend_from_slice(&header);
    frame.push(type_id);
    frame.extend_from_slice(payload);
    frame
}
