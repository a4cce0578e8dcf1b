use bytes::{BufMut, BytesMut};

use crate::error::{Result, ThermalError};

/// Samples per line.
pub const WIDTH: usize = 80;

/// Lines per frame.
pub const HEIGHT: usize = 60;

/// Samples per frame.
pub const FRAME_SAMPLES: usize = WIDTH * HEIGHT;

/// Line header: line id (2) + checksum (2) = 4 bytes.
pub const LINE_HEADER_SIZE: usize = 4;

/// Wire size of one line: header + `WIDTH` 16-bit samples.
pub const LINE_SIZE: usize = LINE_HEADER_SIZE + WIDTH * 2;

/// Wire size of one full frame.
pub const FRAME_SIZE: usize = LINE_SIZE * HEIGHT;

/// Significant bits of a line id word.
pub const LINE_ID_MASK: u16 = 0x0FFF;

/// Significant bits of a sample word.
pub const SAMPLE_MASK: u16 = 0x3FFF;

/// Encode one line into the sensor wire format.
///
/// Wire format (all words big-endian):
/// ```text
/// ┌──────────────┬──────────────┬──────────────────────────────┐
/// │ Line id (2B) │ Checksum (2B)│ WIDTH samples (2B each)      │
/// │ low 12 bits  │ not verified │ low 14 bits significant      │
/// └──────────────┴──────────────┴──────────────────────────────┘
/// ```
pub fn encode_line(line_id: u16, checksum: u16, samples: &[u16], dst: &mut BytesMut) -> Result<()> {
    if samples.len() != WIDTH {
        return Err(ThermalError::LineLength {
            len: samples.len(),
            expected: WIDTH,
        });
    }
    dst.reserve(LINE_SIZE);
    dst.put_u16(line_id);
    dst.put_u16(checksum);
    for &sample in samples {
        dst.put_u16(sample);
    }
    Ok(())
}

/// Encode a full frame as `HEIGHT` lines with ids `0..HEIGHT` and zero checksums.
pub fn encode_frame(samples: &[u16], dst: &mut BytesMut) -> Result<()> {
    if samples.len() != FRAME_SAMPLES {
        return Err(ThermalError::FrameLength {
            len: samples.len(),
            expected: FRAME_SAMPLES,
        });
    }
    dst.reserve(FRAME_SIZE);
    for (line_id, line) in samples.chunks_exact(WIDTH).enumerate() {
        encode_line(line_id as u16, 0, line, dst)?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn line_layout_is_big_endian() {
        let mut samples = [0u16; WIDTH];
        samples[0] = 0x1234;
        samples[WIDTH - 1] = 0x3FFF;

        let mut buf = BytesMut::new();
        encode_line(0x0ABC, 0xBEEF, &samples, &mut buf).unwrap();

        assert_eq!(buf.len(), LINE_SIZE);
        assert_eq!(&buf[..6], &[0x0A, 0xBC, 0xBE, 0xEF, 0x12, 0x34]);
        assert_eq!(&buf[LINE_SIZE - 2..], &[0x3F, 0xFF]);
    }

    #[test]
    fn short_line_rejected() {
        let mut buf = BytesMut::new();
        let err = encode_line(0, 0, &[1, 2, 3], &mut buf).unwrap_err();
        assert!(matches!(err, ThermalError::LineLength { len: 3, .. }));
        assert!(buf.is_empty());
    }

    #[test]
    fn frame_numbers_lines_sequentially() {
        let samples = vec![7u16; FRAME_SAMPLES];
        let mut buf = BytesMut::new();
        encode_frame(&samples, &mut buf).unwrap();

        assert_eq!(buf.len(), FRAME_SIZE);
        for line in 0..HEIGHT {
            let at = line * LINE_SIZE;
            assert_eq!(u16::from_be_bytes([buf[at], buf[at + 1]]), line as u16);
        }
    }

    #[test]
    fn wrong_frame_length_rejected() {
        let mut buf = BytesMut::new();
        let err = encode_frame(&[0u16; WIDTH], &mut buf).unwrap_err();
        assert!(matches!(err, ThermalError::FrameLength { len: WIDTH, .. }));
    }
}
