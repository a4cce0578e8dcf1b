/// Errors from the thermal wire encoder, capture reader and image export.
///
/// Line desynchronization is not an error: the decoder recovers from it and
/// only counts it in [`crate::DecoderStats`].
#[derive(Debug, thiserror::Error)]
pub enum ThermalError {
    /// A line must carry exactly [`crate::WIDTH`] samples.
    #[error("line has {len} samples, expected {expected}")]
    LineLength { len: usize, expected: usize },

    /// A frame must carry exactly [`crate::FRAME_SAMPLES`] samples.
    #[error("frame has {len} samples, expected {expected}")]
    FrameLength { len: usize, expected: usize },

    /// An I/O error occurred while reading a capture or writing an image.
    #[error("thermal I/O error: {0}")]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, ThermalError>;
