use std::io::Write;

use crate::error::Result;
use crate::frame::ThermalFrame;
use crate::wire::{HEIGHT, WIDTH};

/// Highest color level; hottest pixels are pure red.
const MAX_LEVEL: f32 = 255.0;

/// Level used for every pixel of a frame with no sample variation.
pub const MID_LEVEL: u8 = 128;

/// An RGBA image, one byte per channel, row-major.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Bitmap {
    width: usize,
    height: usize,
    rgba: Vec<u8>,
}

impl Bitmap {
    pub fn width(&self) -> usize {
        self.width
    }

    pub fn height(&self) -> usize {
        self.height
    }

    /// `[r, g, b, a]` at column `x`, row `y`.
    pub fn pixel(&self, x: usize, y: usize) -> Option<[u8; 4]> {
        if x >= self.width || y >= self.height {
            return None;
        }
        let at = (y * self.width + x) * 4;
        self.rgba.get(at..at + 4)?.try_into().ok()
    }

    pub fn as_rgba(&self) -> &[u8] {
        &self.rgba
    }

    pub fn into_rgba(self) -> Vec<u8> {
        self.rgba
    }

    /// Write the image as a binary PAM (`P7`, `RGB_ALPHA`).
    pub fn write_pam<W: Write>(&self, mut out: W) -> Result<()> {
        write!(
            out,
            "P7\nWIDTH {}\nHEIGHT {}\nDEPTH 4\nMAXVAL 255\nTUPLTYPE RGB_ALPHA\nENDHDR\n",
            self.width, self.height
        )?;
        out.write_all(&self.rgba)?;
        out.flush()?;
        Ok(())
    }
}

/// Color level of `value` within `[min, max]`.
///
/// Linear in `value`, 0 at `min` and 255 at `max`. A degenerate range
/// (`max <= min`) maps everything to [`MID_LEVEL`].
pub fn level(value: u16, min: u16, max: u16) -> u8 {
    if max <= min {
        return MID_LEVEL;
    }
    let scale = MAX_LEVEL / f32::from(max - min);
    let offset = f32::from(value.saturating_sub(min));
    (offset * scale).round().clamp(0.0, MAX_LEVEL) as u8
}

/// Map a decoded frame onto the red/blue false-color scale.
///
/// Each pixel is `(level, 0, 255 - level, 255)`: red is hottest, blue is
/// coldest, green stays flat.
pub fn render(frame: &ThermalFrame) -> Bitmap {
    let (min, max) = (frame.min(), frame.max());
    let mut rgba = Vec::with_capacity(WIDTH * HEIGHT * 4);
    for &value in frame.samples() {
        let level = level(value, min, max);
        rgba.extend_from_slice(&[level, 0x00, 0xFF - level, 0xFF]);
    }
    Bitmap {
        width: WIDTH,
        height: HEIGHT,
        rgba,
    }
}
