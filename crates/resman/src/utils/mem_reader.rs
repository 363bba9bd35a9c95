//! Bounds-checked cursors over in-memory byte buffers.

#[derive(Debug, Clone, thiserror::Error)]
#[error("Not enough data in buffer at offset {position}. Needed {required}, but only {available} available.")]
pub struct NotEnoughData {
    position: usize,
    required: usize,
    available: usize,
}

impl NotEnoughData {
    #[must_use]
    pub fn position(&self) -> usize {
        self.position
    }
}

pub type Result<T> = std::result::Result<T, NotEnoughData>;

macro_rules! impl_read_int {
    ($name:ident, $ty:ty, $conv:ident) => {
        fn $name(&mut self) -> Result<$ty> {
            let mut buf = [0u8; std::mem::size_of::<$ty>()];
            self.read_exact(&mut buf)?;
            Ok(<$ty>::$conv(buf))
        }
    };
}

pub trait MemReader {
    fn seek_to(&mut self, offset: usize) -> Result<()>;

    #[must_use]
    fn tell(&self) -> usize;

    #[must_use]
    fn data_size(&self) -> usize;

    fn read_exact(&mut self, buf: &mut [u8]) -> Result<()>;

    #[must_use]
    fn remaining(&self) -> usize {
        self.data_size().saturating_sub(self.tell())
    }

    #[must_use]
    fn is_empty(&self) -> bool {
        self.remaining() == 0
    }

    fn skip(&mut self, count: usize) -> Result<()> {
        let target = self.tell().saturating_add(count);
        self.seek_to(target)
    }

    impl_read_int!(read_u8, u8, from_le_bytes);
    impl_read_int!(read_u16_le, u16, from_le_bytes);
    impl_read_int!(read_u16_be, u16, from_be_bytes);
    impl_read_int!(read_u32_le, u32, from_le_bytes);
    impl_read_int!(read_u32_be, u32, from_be_bytes);

    fn read_u24_le(&mut self) -> Result<u32> {
        let mut buf = [0u8; 3];
        self.read_exact(&mut buf)?;
        Ok(u32::from_le_bytes([buf[0], buf[1], buf[2], 0]))
    }
}

impl<M> MemReader for &mut M
where
    M: MemReader,
{
    fn seek_to(&mut self, offset: usize) -> Result<()> {
        (**self).seek_to(offset)
    }

    fn tell(&self) -> usize {
        (**self).tell()
    }

    fn data_size(&self) -> usize {
        (**self).data_size()
    }

    fn read_exact(&mut self, buf: &mut [u8]) -> Result<()> {
        (**self).read_exact(buf)
    }
}

/// A [`MemReader`] over a borrowed slice.
#[derive(Debug, Clone)]
pub struct SliceReader<'a> {
    data: &'a [u8],
    position: usize,
}

impl<'a> SliceReader<'a> {
    #[must_use]
    pub fn new(data: &'a [u8]) -> Self {
        SliceReader { data, position: 0 }
    }

    fn not_enough(&self, required: usize) -> NotEnoughData {
        NotEnoughData {
            position: self.position,
            required,
            available: self.data.len().saturating_sub(self.position),
        }
    }

    /// Returns the next `len` bytes without copying them, advancing the
    /// cursor past them.
    pub fn read_slice(&mut self, len: usize) -> Result<&'a [u8]> {
        let end = self
            .position
            .checked_add(len)
            .filter(|end| *end <= self.data.len())
            .ok_or_else(|| self.not_enough(len))?;
        let slice = &self.data[self.position..end];
        self.position = end;
        Ok(slice)
    }

    /// A new reader positioned at the start of `len` bytes at `offset`.
    pub fn sub_reader(&self, offset: usize, len: usize) -> Result<SliceReader<'a>> {
        let end = offset
            .checked_add(len)
            .filter(|end| *end <= self.data.len())
            .ok_or_else(|| NotEnoughData {
                position: offset,
                required: len,
                available: self.data.len().saturating_sub(offset),
            })?;
        Ok(SliceReader::new(&self.data[offset..end]))
    }
}

impl MemReader for SliceReader<'_> {
    fn seek_to(&mut self, offset: usize) -> Result<()> {
        if offset > self.data.len() {
            return Err(NotEnoughData {
                position: self.position,
                required: offset - self.position.min(offset),
                available: self.data.len().saturating_sub(self.position),
            });
        }
        self.position = offset;
        Ok(())
    }

    fn tell(&self) -> usize {
        self.position
    }

    fn data_size(&self) -> usize {
        self.data.len()
    }

    fn read_exact(&mut self, buf: &mut [u8]) -> Result<()> {
        let slice = self.read_slice(buf.len())?;
        buf.copy_from_slice(slice);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use datalit::datalit;

    use super::*;

    #[test]
    fn reads_mixed_endianness() {
        let data = datalit!(0x01, 0x0201u16_le, 0x0304u16_be, 0x08070605u32_le, 0xAABBCC);
        let mut reader = SliceReader::new(&data);
        assert_eq!(reader.read_u8().unwrap(), 1);
        assert_eq!(reader.read_u16_le().unwrap(), 0x0201);
        assert_eq!(reader.read_u16_be().unwrap(), 0x0304);
        assert_eq!(reader.read_u32_le().unwrap(), 0x0807_0605);
        assert_eq!(reader.read_u24_le().unwrap(), 0x00CC_BBAA);
        assert!(reader.is_empty());
    }

    #[test]
    fn short_read_reports_position() {
        let data = datalit!(0x01, 0x02, 0x03);
        let mut reader = SliceReader::new(&data);
        reader.skip(2).unwrap();
        let err = reader.read_u16_le().unwrap_err();
        assert_eq!(err.position(), 2);
        // A failed read leaves the cursor where it was.
        assert_eq!(reader.tell(), 2);
    }

    #[test]
    fn seek_past_end_fails() {
        let data = datalit!(0x01, 0x02);
        let mut reader = SliceReader::new(&data);
        assert!(reader.seek_to(2).is_ok());
        assert!(reader.seek_to(3).is_err());
        assert!(reader.skip(1).is_err());
    }

    #[test]
    fn sub_reader_is_bounded() {
        let data = datalit!(0x00, 0x11, 0x22, 0x33);
        let reader = SliceReader::new(&data);
        let mut sub = reader.sub_reader(1, 2).unwrap();
        assert_eq!(sub.read_u16_le().unwrap(), 0x2211);
        assert!(sub.read_u8().is_err());
        assert!(reader.sub_reader(3, 2).is_err());
    }
}
