//! Reconstruction of view and picture resources after LZW1 decoding.
//!
//! LZW1-packed views and pictures store their headers, run-length codes and
//! pixel bytes in separate regions so that each compresses well. These
//! passes interleave them back into the layout the renderer expects.

use crate::utils::mem_reader::{MemReader as _, SliceReader};

use super::{DecompressionError, Result};

const VIEW_HEADER_COLORS_8BIT: u8 = 0x80;
const PIC_OP_OPX: u8 = 0xFE;
const PIC_OPX_EMBEDDED_VIEW: u8 = 0x01;
const PIC_OPX_SET_PALETTE: u8 = 0x02;
const PALETTE_OP_SIZE: usize = 2 + 256 + 4 + 1024;
const EMBEDDED_VIEW_HEADER_SIZE: usize = 15;
const CEL_HEADER_SIZE: usize = 8;
const PALETTE_BLOCK_SIZE: usize = 4 * 256 + 4;

/// A bounds-checked cursor over the fixed-size output buffer.
struct Writer<'a> {
    buffer: &'a mut [u8],
    position: usize,
}

impl<'a> Writer<'a> {
    fn new(buffer: &'a mut [u8]) -> Self {
        Writer {
            buffer,
            position: 0,
        }
    }

    fn overrun(&self) -> DecompressionError {
        DecompressionError::OutputOverrun {
            size: self.buffer.len(),
        }
    }

    fn seek_to(&mut self, position: usize) -> Result<()> {
        if position > self.buffer.len() {
            return Err(self.overrun());
        }
        self.position = position;
        Ok(())
    }

    fn skip(&mut self, count: usize) -> Result<()> {
        self.seek_to(self.position.saturating_add(count))
    }

    fn put_slice(&mut self, bytes: &[u8]) -> Result<()> {
        self.put_slice_at(self.position, bytes)?;
        self.position += bytes.len();
        Ok(())
    }

    fn put_slice_at(&mut self, position: usize, bytes: &[u8]) -> Result<()> {
        let end = position.saturating_add(bytes.len());
        let overrun = self.overrun();
        self.buffer
            .get_mut(position..end)
            .ok_or(overrun)?
            .copy_from_slice(bytes);
        Ok(())
    }

    fn put_u8(&mut self, value: u8) -> Result<()> {
        self.put_slice(&[value])
    }

    fn put_u16_le(&mut self, value: u16) -> Result<()> {
        self.put_slice(&value.to_le_bytes())
    }
}

fn to_u16(value: usize) -> Result<u16> {
    u16::try_from(value)
        .map_err(|_| DecompressionError::Inconsistent(format!("offset {value} exceeds 16 bits")))
}

fn identity_map() -> [u8; 256] {
    std::array::from_fn(|i| u8::try_from(i).unwrap_or(u8::MAX))
}

/// Counts the run-length code bytes that produce `size` output bytes.
fn rle_code_count(codes: &mut SliceReader<'_>, size: usize) -> Result<usize> {
    let start = codes.tell();
    let mut pos = 0;
    while pos < size {
        let code = codes.read_u8()?;
        pos += 1;
        match code & 0xC0 {
            // Both 0x00 and 0x40 are literal runs, so the length is all 7 low bits.
            0x00 | 0x40 => pos += usize::from(code),
            0x80 => pos += 1,
            _ => {}
        }
    }
    Ok(codes.tell() - start)
}

/// Writes `size` bytes of interleaved run-length codes and pixels. Every
/// code byte is copied to the output. Codes below 0x80 are followed by that
/// many pixel bytes, codes 0x80-0xBF by one pixel byte, and codes from 0xC0
/// by none.
fn decode_rle(
    codes: &mut SliceReader<'_>,
    pixels: &mut SliceReader<'_>,
    writer: &mut Writer<'_>,
    size: usize,
) -> Result<()> {
    let mut pos = 0;
    while pos < size {
        let code = codes.read_u8()?;
        writer.put_u8(code)?;
        pos += 1;
        match code & 0xC0 {
            0x00 | 0x40 => {
                // The run length is the whole code, not just its low 6 bits.
                let run = usize::from(code);
                writer.put_slice(pixels.read_slice(run)?)?;
                pos += run;
            }
            0x80 => {
                writer.put_u8(pixels.read_u8()?)?;
                pos += 1;
            }
            _ => {}
        }
    }
    Ok(())
}

pub(super) fn reorder_view(src: &[u8]) -> Result<Vec<u8>> {
    let mut dest = vec![0u8; src.len()];
    let mut writer = Writer::new(&mut dest);
    let mut seeker = SliceReader::new(src);

    let cel_lengths_offset = usize::from(seeker.read_u16_le()?) + 2;
    let loop_count = seeker.read_u8()?;
    let present_loops = seeker.read_u8()?;
    let missing_mask = seeker.read_u16_le()?;
    let unknown = seeker.read_u16_le()?;
    let palette_offset = seeker.read_u16_le()?;
    let cel_total = usize::from(seeker.read_u16_le()?);

    let mut lengths = SliceReader::new(src).sub_reader(cel_lengths_offset, cel_total * 2)?;
    let cel_lengths = (0..cel_total)
        .map(|_| lengths.read_u16_le().map(usize::from))
        .collect::<std::result::Result<Vec<_>, _>>()?;

    writer.put_u8(loop_count)?;
    writer.put_u8(VIEW_HEADER_COLORS_8BIT)?;
    writer.put_u16_le(missing_mask)?;
    writer.put_u16_le(unknown)?;
    writer.put_u16_le(palette_offset)?;

    let mut loop_table_pos = writer.position;
    writer.skip(2 * usize::from(loop_count))?;

    let cel_counts = seeker.read_slice(usize::from(present_loops))?;
    let mut next_present = cel_counts.iter().copied();
    let mut cel_positions = Vec::with_capacity(cel_total);
    let mut last_loop: Option<u16> = None;

    for loop_index in 0..loop_count {
        let is_missing = loop_index < 16 && missing_mask & (1 << loop_index) != 0;
        if is_missing {
            let reused = last_loop.unwrap_or_else(|| {
                log::warn!("View loop {loop_index} is missing but no earlier loop can be reused");
                0
            });
            last_loop = Some(reused);
            writer.put_slice_at(loop_table_pos, &reused.to_le_bytes())?;
            loop_table_pos += 2;
            continue;
        }

        let loop_start = to_u16(writer.position)?;
        last_loop = Some(loop_start);
        writer.put_slice_at(loop_table_pos, &loop_start.to_le_bytes())?;
        loop_table_pos += 2;

        let cel_count = next_present.next().ok_or_else(|| {
            DecompressionError::Inconsistent("more loops than loop cel counts".into())
        })?;
        let cel_count = usize::from(cel_count);
        writer.put_u16_le(to_u16(cel_count)?)?;
        writer.put_u16_le(0)?;

        let first_cel = cel_positions.len();
        let loop_lengths = cel_lengths
            .get(first_cel..first_cel + cel_count)
            .ok_or_else(|| {
                DecompressionError::Inconsistent("loop cel counts exceed the cel total".into())
            })?;

        let mut cel_pos = writer.position + 2 * cel_count;
        for &length in loop_lengths {
            writer.put_u16_le(to_u16(cel_pos)?)?;
            cel_positions.push(cel_pos);
            cel_pos += CEL_HEADER_SIZE + length;
        }

        for &length in loop_lengths {
            writer.put_slice(seeker.read_slice(6)?)?;
            writer.put_u16_le(u16::from(seeker.read_u8()?))?;
            writer.skip(length)?;
        }
    }

    if cel_positions.len() < cel_total {
        return Err(DecompressionError::Inconsistent(format!(
            "view loops describe {} of {cel_total} cels",
            cel_positions.len()
        )));
    }
    let end_of_cels = writer.position;

    let mut codes = SliceReader::new(src);
    codes.seek_to(cel_lengths_offset + cel_total * 2)?;
    let mut pixel_start = codes.clone();
    for &length in &cel_lengths {
        rle_code_count(&mut pixel_start, length)?;
    }
    let mut pixels = SliceReader::new(src);
    pixels.seek_to(pixel_start.tell())?;

    for (&position, &length) in cel_positions.iter().zip(&cel_lengths) {
        writer.seek_to(position + CEL_HEADER_SIZE)?;
        decode_rle(&mut codes, &mut pixels, &mut writer, length)?;
    }

    if palette_offset != 0 {
        writer.seek_to(end_of_cels)?;
        writer.put_slice(b"PAL")?;
        writer.put_slice(&identity_map())?;
        // The palette block starts four bytes before the end of the cel
        // headers.
        let mut palette = SliceReader::new(src);
        palette.seek_to(seeker.tell() - 4)?;
        writer.put_slice(palette.read_slice(PALETTE_BLOCK_SIZE)?)?;
    }

    Ok(dest)
}

pub(super) fn reorder_pic(src: &[u8]) -> Result<Vec<u8>> {
    let size = src.len();
    let mut dest = vec![0u8; size];
    let mut writer = Writer::new(&mut dest);
    let mut seeker = SliceReader::new(src);

    writer.put_u8(PIC_OP_OPX)?;
    writer.put_u8(PIC_OPX_SET_PALETTE)?;
    writer.put_slice(&identity_map())?;
    // Palette stamp.
    writer.put_slice(&[0; 4])?;

    let view_size = seeker.read_u16_le()?;
    let view_start = usize::from(seeker.read_u16_le()?);
    let cdata_size = usize::from(seeker.read_u16_le()?);
    let view_header = seeker.read_slice(7)?;
    writer.put_slice(seeker.read_slice(1024)?)?;

    let pre_view_len = view_start.checked_sub(PALETTE_OP_SIZE).ok_or_else(|| {
        DecompressionError::Inconsistent(format!("embedded view starts inside the palette at {view_start}"))
    })?;
    if pre_view_len > 0 {
        writer.put_slice(seeker.read_slice(pre_view_len)?)?;
    }

    let view_end = view_start + EMBEDDED_VIEW_HEADER_SIZE + usize::from(view_size);
    if size != view_end {
        let tail_len = size.checked_sub(view_end).ok_or(DecompressionError::OutputOverrun { size })?;
        writer.put_slice_at(view_end, seeker.read_slice(tail_len)?)?;
    }

    let mut pixels = SliceReader::new(seeker.read_slice(cdata_size)?);

    writer.seek_to(view_start)?;
    writer.put_slice(&[PIC_OP_OPX, PIC_OPX_EMBEDDED_VIEW, 0, 0, 0])?;
    writer.put_u16_le(view_size.wrapping_add(8))?;
    writer.put_slice(view_header)?;
    writer.put_u8(0)?;

    decode_rle(&mut seeker, &mut pixels, &mut writer, usize::from(view_size))?;
    Ok(dest)
}

#[cfg(test)]
mod tests {
    use datalit::datalit;

    use super::*;

    fn padded(mut data: Vec<u8>, size: usize) -> Vec<u8> {
        data.resize(size, 0);
        data
    }

    #[test]
    fn literal_runs_use_seven_bits_of_their_code() {
        let codes = [0x41, 0xC0];
        let pixels: Vec<u8> = (0..0x41).collect();
        let mut codes = SliceReader::new(&codes);
        let mut pixel_reader = SliceReader::new(&pixels);
        assert_eq!(rle_code_count(&mut codes.clone(), 0x43).unwrap(), 2);

        let mut out = [0u8; 0x43];
        decode_rle(&mut codes, &mut pixel_reader, &mut Writer::new(&mut out), 0x43).unwrap();
        assert_eq!(out[0], 0x41);
        assert_eq!(&out[1..0x42], &pixels[..]);
        assert_eq!(out[0x42], 0xC0);
        assert!(pixel_reader.read_slice(1).is_err());
    }

    #[test]
    fn view_is_interleaved() {
        let src = datalit! {
            @endian = le,
            25u16,          // cel lengths at 27
            2u8,            // loops
            1u8,            // present loops
            0b10u16,        // loop 1 mirrors loop 0
            0x1234u16,      // unknown
            0u16,           // no palette
            2u16,           // cels
            0x02,           // cels in loop 0
            0x040001000000, 0x05,
            0x020002000000, 0x07,
            3u16, 4u16,     // decoded cel lengths
            0x0281C3C0,     // run-length codes
            0xAABBCC,       // pixels
        };
        let out = reorder_view(&padded(src.to_vec(), 43)).unwrap();
        let expected = datalit! {
            @endian = le,
            0x02, 0x80, 0b10u16, 0x1234u16, 0u16,
            12u16, 12u16,            // loop table
            2u16, 0u16,              // loop 0: cel count, padding
            20u16, 31u16,            // cel offsets
            0x040001000000, 0x0500, 0x02AABB,
            0x020002000000, 0x0700, 0x81CCC3C0,
        };
        assert_eq!(out, expected.to_vec());
    }

    #[test]
    fn view_with_too_few_cels_is_rejected() {
        let src = datalit! {
            @endian = le,
            18u16, 1u8, 1u8, 0u16, 0u16, 0u16,
            2u16,           // two cels, but the only loop has one
            0x01,
            0x040001000000, 0x05,
            3u16, 3u16,
        };
        let err = reorder_view(&padded(src.to_vec(), 64)).unwrap_err();
        assert!(matches!(err, DecompressionError::Inconsistent(_)));
    }

    #[test]
    fn view_with_truncated_header_fails() {
        assert!(reorder_view(&[0x10, 0x00, 0x01]).is_err());
    }

    #[test]
    fn pic_gets_palette_and_embedded_view() {
        let palette: Vec<u8> = (0..1024).map(|i| (i % 251) as u8).collect();
        let mut src = datalit! {
            @endian = le,
            4u16,                   // view size
            1286u16,                // view start
            1u16,                   // compressed pixel bytes
            0x01020304050607,       // view header
        }
        .to_vec();
        src.extend_from_slice(&palette);
        src.extend_from_slice(&[0xEE, 0xEF]); // trailing picture data
        src.push(0x99); // pixels
        src.extend_from_slice(&[0x81, 0xC5, 0xC6]); // run-length codes
        let size = 1286 + 15 + 4 + 2;
        let out = reorder_pic(&padded(src, size)).unwrap();

        assert_eq!(out.len(), size);
        assert_eq!(out[..2], [0xFE, 0x02]);
        assert_eq!(out[2..258], identity_map());
        assert_eq!(out[258..262], [0; 4]);
        assert_eq!(out[262..1286], palette[..]);
        assert_eq!(
            out[1286..1301],
            [0xFE, 0x01, 0, 0, 0, 12, 0, 1, 2, 3, 4, 5, 6, 7, 0]
        );
        assert_eq!(out[1301..1305], [0x81, 0x99, 0xC5, 0xC6]);
        assert_eq!(out[1305..], [0xEE, 0xEF]);
    }

    #[test]
    fn pic_with_view_inside_palette_is_rejected() {
        let mut src = datalit!(@endian = le, 4u16, 100u16, 1u16).to_vec();
        src.resize(2000, 0);
        assert!(matches!(reorder_pic(&src), Err(DecompressionError::Inconsistent(_))));
    }
}
