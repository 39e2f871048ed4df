use byteorder::{ByteOrder, LittleEndian};
use std::io;

/// Little-endian wire cursor. Contains the buffer and the cursor.
/// The cursor is used to keep track of the current position in the buffer.
/// Both the save format and the network protocol are little-endian and
/// share the same string encoding (LEB128 length prefix + UTF-8), so one
/// cursor type serves both.
#[derive(Debug)]
pub struct WireCursor {
    pub buffer: Vec<u8>,
    cursor: usize,
}

impl WireCursor {
    pub fn new() -> Self {
        Self {
            buffer: Vec::new(),
            cursor: 0,
        }
    }

    /// Creates a cursor over an existing byte vector, positioned at the start.
    pub fn from_bytes(bytes: Vec<u8>) -> Self {
        Self {
            buffer: bytes,
            cursor: 0,
        }
    }

    pub fn position(&self) -> usize {
        self.cursor
    }

    pub fn remaining(&self) -> usize {
        self.buffer.len() - self.cursor
    }

    pub fn into_bytes(self) -> Vec<u8> {
        self.buffer
    }

    fn need(&self, count: usize) -> io::Result<()> {
        if self.cursor + count > self.buffer.len() {
            return Err(io::Error::new(
                io::ErrorKind::UnexpectedEof,
                format!("need {} more bytes at offset {}", count, self.cursor),
            ));
        }
        Ok(())
    }

    /// Advances past `count` bytes without decoding them.
    pub fn skip(&mut self, count: usize) -> io::Result<()> {
        self.need(count)?;
        self.cursor += count;
        Ok(())
    }

    pub fn read_u8(&mut self) -> io::Result<u8> {
        self.need(1)?;
        let value = self.buffer[self.cursor];
        self.cursor += 1;
        Ok(value)
    }

    /// Any nonzero byte reads as true, matching the original writer.
    pub fn read_bool(&mut self) -> io::Result<bool> {
        Ok(self.read_u8()? != 0)
    }

    pub fn read_u16(&mut self) -> io::Result<u16> {
        self.need(2)?;
        let value = LittleEndian::read_u16(&self.buffer[self.cursor..]);
        self.cursor += 2;
        Ok(value)
    }

    pub fn read_i16(&mut self) -> io::Result<i16> {
        Ok(self.read_u16()? as i16)
    }

    pub fn read_u32(&mut self) -> io::Result<u32> {
        self.need(4)?;
        let value = LittleEndian::read_u32(&self.buffer[self.cursor..]);
        self.cursor += 4;
        Ok(value)
    }

    pub fn read_i32(&mut self) -> io::Result<i32> {
        Ok(self.read_u32()? as i32)
    }

    pub fn read_f32(&mut self) -> io::Result<f32> {
        self.need(4)?;
        let value = LittleEndian::read_f32(&self.buffer[self.cursor..]);
        self.cursor += 4;
        Ok(value)
    }

    pub fn read_f64(&mut self) -> io::Result<f64> {
        self.need(8)?;
        let value = LittleEndian::read_f64(&self.buffer[self.cursor..]);
        self.cursor += 8;
        Ok(value)
    }

    /// Reads a LEB128-encoded length. 7 bits per byte, most significant bit
    /// set on every byte except the final one.
    pub fn read_varint(&mut self) -> io::Result<u32> {
        let mut result: u32 = 0;
        let mut shift = 0;

        loop {
            let byte = self.read_u8()?;
            result |= ((byte & 0x7F) as u32) << shift;
            shift += 7;

            if (byte & 0x80) == 0 {
                break;
            }

            if shift >= 32 {
                return Err(io::Error::new(io::ErrorKind::InvalidData, "varint too big"));
            }
        }

        Ok(result)
    }

    /// Reads a varint length prefix followed by that many bytes of UTF-8.
    pub fn read_string(&mut self) -> io::Result<String> {
        let length = self.read_varint()? as usize;
        self.need(length)?;
        let bytes = &self.buffer[self.cursor..self.cursor + length];
        self.cursor += length;
        String::from_utf8(bytes.to_vec())
            .map_err(|_| io::Error::new(io::ErrorKind::InvalidData, "string is not UTF-8"))
    }

    pub fn write_u8(&mut self, value: u8) {
        self.buffer.push(value);
    }

    pub fn write_bool(&mut self, value: bool) {
        self.buffer.push(value as u8);
    }

    pub fn write_u16(&mut self, value: u16) {
        let mut scratch = [0u8; 2];
        LittleEndian::write_u16(&mut scratch, value);
        self.buffer.extend_from_slice(&scratch);
    }

    pub fn write_i16(&mut self, value: i16) {
        self.write_u16(value as u16);
    }

    pub fn write_u32(&mut self, value: u32) {
        let mut scratch = [0u8; 4];
        LittleEndian::write_u32(&mut scratch, value);
        self.buffer.extend_from_slice(&scratch);
    }

    pub fn write_i32(&mut self, value: i32) {
        self.write_u32(value as u32);
    }

    pub fn write_f32(&mut self, value: f32) {
        let mut scratch = [0u8; 4];
        LittleEndian::write_f32(&mut scratch, value);
        self.buffer.extend_from_slice(&scratch);
    }

    pub fn write_f64(&mut self, value: f64) {
        let mut scratch = [0u8; 8];
        LittleEndian::write_f64(&mut scratch, value);
        self.buffer.extend_from_slice(&scratch);
    }

    pub fn write_varint(&mut self, mut value: u32) {
        while (value & !0x7F) != 0 {
            self.buffer.push(((value & 0x7F) as u8) | 0x80);
            value >>= 7;
        }
        self.buffer.push((value & 0x7F) as u8);
    }

    pub fn write_string(&mut self, value: &str) {
        let bytes = value.as_bytes();
        self.write_varint(bytes.len() as u32);
        self.buffer.extend_from_slice(bytes);
    }

    pub fn write_bytes(&mut self, bytes: &[u8]) {
        self.buffer.extend_from_slice(bytes);
    }
}

impl Default for WireCursor {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_primitive_round_trips() {
        let mut cursor = WireCursor::new();
        cursor.write_u8(0xAB);
        cursor.write_bool(true);
        cursor.write_i16(-1234);
        cursor.write_u16(0xBEEF);
        cursor.write_i32(-123456);
        cursor.write_u32(0xDEADBEEF);
        cursor.write_f32(1.5);
        cursor.write_f64(-2.25);

        let mut read = WireCursor::from_bytes(cursor.into_bytes());
        assert_eq!(read.read_u8().unwrap(), 0xAB);
        assert!(read.read_bool().unwrap());
        assert_eq!(read.read_i16().unwrap(), -1234);
        assert_eq!(read.read_u16().unwrap(), 0xBEEF);
        assert_eq!(read.read_i32().unwrap(), -123456);
        assert_eq!(read.read_u32().unwrap(), 0xDEADBEEF);
        assert_eq!(read.read_f32().unwrap(), 1.5);
        assert_eq!(read.read_f64().unwrap(), -2.25);
        assert_eq!(read.remaining(), 0);
    }

    #[test]
    fn test_little_endian_layout() {
        let mut cursor = WireCursor::new();
        cursor.write_u32(0x11223344);
        assert_eq!(cursor.buffer, vec![0x44, 0x33, 0x22, 0x11]);
    }

    #[test]
    fn test_varint() {
        for value in [0u32, 1, 127, 128, 255, 300, 16384, u32::MAX] {
            let mut cursor = WireCursor::new();
            cursor.write_varint(value);

            let mut read = WireCursor::from_bytes(cursor.into_bytes());
            assert_eq!(read.read_varint().unwrap(), value);
        }
    }

    #[test]
    fn test_string() {
        for string in ["", "Dig Site", "🦀", "Обсидиан"] {
            let mut cursor = WireCursor::new();
            cursor.write_string(string);

            let mut read = WireCursor::from_bytes(cursor.into_bytes());
            assert_eq!(read.read_string().unwrap(), string);
        }
    }

    #[test]
    fn test_string_error_handling() {
        // Invalid UTF-8 payload
        let mut cursor = WireCursor::new();
        cursor.write_varint(1);
        cursor.write_u8(0xFF);
        let mut read = WireCursor::from_bytes(cursor.into_bytes());
        assert!(read.read_string().is_err());

        // Claimed length runs past the buffer
        let mut cursor = WireCursor::new();
        cursor.write_varint(100);
        cursor.write_u8(b'A');
        let mut read = WireCursor::from_bytes(cursor.into_bytes());
        assert!(read.read_string().is_err());
    }

    #[test]
    fn test_varint_error_handling() {
        // Five continuation bytes overflow a 32-bit length
        let mut read = WireCursor::from_bytes(vec![0xFF; 5]);
        assert!(read.read_varint().is_err());

        // Continuation bit set with nothing following
        let mut read = WireCursor::from_bytes(vec![0x80]);
        assert!(read.read_varint().is_err());
    }

    #[test]
    fn test_eof_errors() {
        let mut read = WireCursor::from_bytes(vec![0x00]);
        assert!(read.read_u32().is_err());
        // A failed read must not advance the cursor
        assert_eq!(read.position(), 0);
        assert!(read.read_u8().is_ok());
        assert!(read.read_u8().is_err());
    }

    #[test]
    fn test_skip() {
        let mut read = WireCursor::from_bytes(vec![0; 20]);
        read.skip(20).unwrap();
        assert_eq!(read.remaining(), 0);
        assert!(read.skip(1).is_err());
    }
}
