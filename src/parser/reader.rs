use super::DecodeError;

/// Sequential reader over the raw file buffer.
///
/// Every read that would pass the end of the buffer fails with
/// [`DecodeError::Truncated`]; nothing ever indexes past the slice.
#[derive(Debug)]
pub(crate) struct ByteReader<'a> {
    buf: &'a [u8],
    position: usize,
}

impl<'a> ByteReader<'a> {
    pub(crate) fn new(buf: &'a [u8]) -> Self {
        Self { buf, position: 0 }
    }

    pub(crate) fn read_byte(&mut self) -> Result<u8, DecodeError> {
        let byte = *self
            .buf
            .get(self.position)
            .ok_or(DecodeError::Truncated(self.position))?;
        self.position += 1;
        Ok(byte)
    }

    pub(crate) fn read_u16(&mut self) -> Result<u16, DecodeError> {
        // multi-byte numeric fields are ordered least significant byte first
        let bytes = self.read_bytes(2)?;
        Ok(u16::from_le_bytes([bytes[0], bytes[1]]))
    }

    pub(crate) fn read_bytes(&mut self, count: usize) -> Result<&'a [u8], DecodeError> {
        let end = self
            .position
            .checked_add(count)
            .ok_or(DecodeError::Truncated(self.position))?;
        let bytes = self
            .buf
            .get(self.position..end)
            .ok_or(DecodeError::Truncated(self.position))?;
        self.position = end;
        Ok(bytes)
    }

    /// Concatenate a chain of length-prefixed sub-blocks up to the
    /// zero-length terminator.
    pub(crate) fn read_sub_blocks(&mut self) -> Result<Vec<u8>, DecodeError> {
        let mut result = Vec::new();
        loop {
            let block_size = self.read_byte()?;
            if block_size == 0 {
                break Ok(result);
            }
            result.extend_from_slice(self.read_bytes(block_size.into())?);
        }
    }

    /// Step over a sub-block chain without keeping its contents.
    pub(crate) fn skip_sub_blocks(&mut self) -> Result<(), DecodeError> {
        loop {
            let block_size = self.read_byte()?;
            if block_size == 0 {
                break Ok(());
            }
            self.read_bytes(block_size.into())?;
        }
    }
}

/// Bit-level reader for the compressed image data.
#[derive(Debug)]
pub(crate) struct BitReader<'a> {
    buf: &'a [u8],
    // index by bit instead of by byte
    position: usize,
    length: usize,
}

impl<'a> BitReader<'a> {
    pub(crate) fn new(buf: &'a [u8]) -> Self {
        Self {
            buf,
            position: 0,
            length: buf.len() * 8,
        }
    }

    /// Extract the next `count` bits, low bit first. Returns `None` once
    /// fewer than `count` bits remain.
    pub(crate) fn next(&mut self, count: u8) -> Option<u16> {
        let start = self.position;
        let end = start + count as usize;
        if end > self.length {
            return None;
        }

        let mut value: u16 = 0;
        for (out_shift, i) in (start..end).enumerate() {
            let bit = (self.buf[i / 8] >> (i % 8)) as u16 & 1;
            value |= bit << out_shift;
        }
        self.position = end;
        Some(value)
    }
}

#[cfg(test)]
mod tests {
    use super::{BitReader, ByteReader, DecodeError};

    #[test]
    fn bits_come_out_low_bit_first() {
        let buffer = &[
            0b10000100, 0b10001111, 0b10101001, 0b11001011, 0b11101101, 0b00001111, 0b10100011,
        ];
        let mut reader = BitReader::new(buffer);
        assert_eq!(reader.next(3), Some(0b100));
        assert_eq!(reader.next(3), Some(0b000));
        assert_eq!(reader.next(3), Some(0b110));
        assert_eq!(reader.next(3), Some(0b111));
        assert_eq!(reader.next(3), Some(0b000));
        assert_eq!(reader.next(3), Some(0b011));
        assert_eq!(reader.next(3), Some(0b010));
        assert_eq!(reader.next(3), Some(0b101));
    }

    #[test]
    fn bit_reader_stops_at_exhaustion() {
        let mut reader = BitReader::new(&[0xff]);
        assert_eq!(reader.next(5), Some(0b11111));
        assert_eq!(reader.next(5), None);
        // the remaining three bits are still there for a smaller read
        assert_eq!(reader.next(3), Some(0b111));
        assert_eq!(reader.next(1), None);
    }

    #[test]
    fn u16_is_little_endian() {
        let mut reader = ByteReader::new(&[0x34, 0x12]);
        assert_eq!(reader.read_u16().unwrap(), 0x1234);
    }

    #[test]
    fn sub_block_chain_concatenates_until_terminator() {
        let mut reader = ByteReader::new(&[2, 0xaa, 0xbb, 1, 0xcc, 0, 0x3b]);
        assert_eq!(reader.read_sub_blocks().unwrap(), vec![0xaa, 0xbb, 0xcc]);
        assert_eq!(reader.read_byte().unwrap(), 0x3b);
    }

    #[test]
    fn reads_past_the_end_report_truncation() {
        let mut reader = ByteReader::new(&[1, 2]);
        assert!(matches!(
            reader.read_bytes(3),
            Err(DecodeError::Truncated(0))
        ));
        // a failed read consumes nothing
        assert_eq!(reader.read_u16().unwrap(), 0x0201);

        let mut chain = ByteReader::new(&[5, 0xaa]);
        assert!(matches!(
            chain.read_sub_blocks(),
            Err(DecodeError::Truncated(_))
        ));
    }
}
