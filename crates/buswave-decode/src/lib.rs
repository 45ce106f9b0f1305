//! Protocol decoders for captured logic traces.

pub mod i2c;

pub use i2c::{DecodeSink, EventKind, I2cDecoder};

/// One observation of the two bus lines, taken whenever either line changed
/// (or once per acquisition tick, depending on the capture hardware).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Sample {
    /// Clock line (SCL) level.
    pub scl: bool,
    /// Data line (SDA) level.
    pub sda: bool,
    /// Nanoseconds relative to the capture trigger.
    pub time: i64,
}

impl Sample {
    pub fn new(scl: bool, sda: bool, time: i64) -> Self {
        Self { scl, sda, time }
    }
}
