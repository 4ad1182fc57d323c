use crate::error::ClassFormatError;

/// Big-endian cursor over class file data.
pub struct ByteReader<'a> {
    data: &'a [u8],
    pos: usize,
}

impl<'a> ByteReader<'a> {
    pub fn new(data: &'a [u8]) -> Self {
        Self { data, pos: 0 }
    }

    pub fn position(&self) -> usize {
        self.pos
    }

    pub fn remaining(&self) -> usize {
        self.data.len() - self.pos
    }

    pub fn bytes(&mut self, len: usize) -> Result<&'a [u8], ClassFormatError> {
        let end = self
            .pos
            .checked_add(len)
            .filter(|end| *end <= self.data.len())
            .ok_or(ClassFormatError::Truncated(self.pos))?;
        let slice = &self.data[self.pos..end];
        self.pos = end;
        Ok(slice)
    }

    pub fn u8(&mut self) -> Result<u8, ClassFormatError> {
        Ok(self.bytes(1)?[0])
    }

    pub fn u16(&mut self) -> Result<u16, ClassFormatError> {
        let b = self.bytes(2)?;
        Ok(u16::from_be_bytes([b[0], b[1]]))
    }

    pub fn u32(&mut self) -> Result<u32, ClassFormatError> {
        let b = self.bytes(4)?;
        Ok(u32::from_be_bytes([b[0], b[1], b[2], b[3]]))
    }

    pub fn u64(&mut self) -> Result<u64, ClassFormatError> {
        let hi = self.u32()? as u64;
        let lo = self.u32()? as u64;
        Ok((hi << 32) | lo)
    }
}

pub trait WriteBytes {
    fn put_u8(&mut self, value: u8);
    fn put_u16(&mut self, value: u16);
    fn put_u32(&mut self, value: u32);
    fn put_u64(&mut self, value: u64);
    fn put_bytes(&mut self, value: &[u8]);

    /// Writes a `u16` element count, failing when `len` does not fit.
    fn put_len16(&mut self, len: usize, what: &'static str) -> Result<(), ClassFormatError> {
        let len = u16::try_from(len).map_err(|_| ClassFormatError::TooLong { what, len })?;
        self.put_u16(len);
        Ok(())
    }
}

impl WriteBytes for Vec<u8> {
    fn put_u8(&mut self, value: u8) {
        self.push(value);
    }

    fn put_u16(&mut self, value: u16) {
        self.extend_from_slice(&value.to_be_bytes());
    }

    fn put_u32(&mut self, value: u32) {
        self.extend_from_slice(&value.to_be_bytes());
    }

    fn put_u64(&mut self, value: u64) {
        self.extend_from_slice(&value.to_be_bytes());
    }

    fn put_bytes(&mut self, value: &[u8]) {
        self.extend_from_slice(value);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reads_big_endian_values() {
        let data = [0xCA, 0xFE, 0xBA, 0xBE, 0x00, 0x41, 0x07];
        let mut r = ByteReader::new(&data);
        assert_eq!(r.u32().unwrap(), 0xCAFE_BABE);
        assert_eq!(r.u16().unwrap(), 0x41);
        assert_eq!(r.remaining(), 1);
        assert_eq!(r.u8().unwrap(), 7);
    }

    #[test]
    fn reading_past_the_end_reports_offset() {
        let mut r = ByteReader::new(&[1, 2, 3]);
        r.u16().unwrap();
        assert_eq!(r.u16(), Err(ClassFormatError::Truncated(2)));
    }

    #[test]
    fn oversized_counts_are_rejected() {
        let mut out = Vec::new();
        assert!(out.put_len16(70_000, "interfaces").is_err());
        out.put_len16(3, "interfaces").unwrap();
        assert_eq!(out, [0, 3]);
    }
}
