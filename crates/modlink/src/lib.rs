//! Talk to an attached accessory over a raw duplex byte channel and decode
//! the thermal sensor's line-synchronized raster into false-color images.
//!
//! # Crate Structure
//!
//! - [`transport`]: device handles, the cancellation signal and the readiness wait
//! - [`thermal`]: line protocol decoder, frame type and renderer
//! - [`channel`]: the read loop, write queue and channel lifecycle

/// Re-export transport types.
pub mod transport {
    pub use modlink_transport::*;
}

/// Re-export thermal decoding types.
pub mod thermal {
    pub use modlink_thermal::*;
}

/// Re-export channel types.
pub mod channel {
    pub use modlink_channel::*;
}
