use buswave_decode::{DecodeSink, EventKind, I2cDecoder};
use thiserror::Error;

use crate::capture::Capture;
use crate::records::{merge_rows, rows_to_text, DecodedRow, RecordStore};

#[derive(Debug, Error)]
pub enum SessionError {
    #[error("capture is empty, nothing to decode")]
    EmptyCapture,
}

/// One decode pass over one capture.
///
/// Owns the only `I2cDecoder` of the session; the decode is a left-fold
/// over the capture's samples, so a single session is inherently
/// sequential. Independent captures can be decoded on separate sessions
/// with no coordination.
pub struct DecodeSession {
    capture: Capture,
}

/// The derived containers produced by a session, finalized (padded and
/// hidden past the written prefix) and ready for rendering.
pub struct SessionOutput {
    pub events: RecordStore<EventKind>,
    pub bytes: RecordStore<u8>,
}

impl SessionOutput {
    pub fn merged(&self) -> Vec<DecodedRow> {
        merge_rows(&self.events, &self.bytes)
    }

    pub fn to_text(&self, show_timestamp: bool, show_hex: bool) -> String {
        rows_to_text(&self.merged(), show_timestamp, show_hex)
    }
}

struct StoreSink<'a> {
    events: &'a mut RecordStore<EventKind>,
    bytes: &'a mut RecordStore<u8>,
}

impl DecodeSink for StoreSink<'_> {
    fn event(&mut self, time: i64, kind: EventKind) {
        self.events.push(time, kind);
    }

    fn data(&mut self, time: i64, value: u8) {
        self.bytes.push(time, value);
    }
}

impl DecodeSession {
    /// Set up a session. Fails before any sample is processed if the
    /// capture cannot back the derived containers.
    pub fn new(capture: Capture) -> Result<Self, SessionError> {
        if capture.is_empty() {
            return Err(SessionError::EmptyCapture);
        }
        Ok(Self { capture })
    }

    pub fn capture(&self) -> &Capture {
        &self.capture
    }

    /// Run the decode: fold every sample through the decoder, then pad and
    /// finalize the output containers.
    pub fn run(&self) -> SessionOutput {
        let mut events = RecordStore::new(self.capture.len());
        let mut bytes = RecordStore::new(self.capture.len());
        let mut decoder = I2cDecoder::new();

        let mut last_time = 0;
        {
            let mut sink = StoreSink {
                events: &mut events,
                bytes: &mut bytes,
            };
            for &sample in self.capture.samples() {
                decoder.process(sample, &mut sink);
                last_time = sample.time;
            }
        }

        log::debug!(
            "decoded {} events, {} bytes from {} samples",
            events.len(),
            bytes.len(),
            self.capture.len()
        );

        events.finalize(last_time);
        bytes.finalize(last_time);
        SessionOutput { events, bytes }
    }
}
