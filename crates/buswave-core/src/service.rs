use buswave_decode::{DecodeSink, EventKind, I2cDecoder};
use crossbeam_channel::{unbounded, Receiver, Sender};

use crate::capture::Capture;

/// Updates streamed by a background decode.
#[derive(Debug, Clone)]
pub enum DecodeUpdate {
    Event { time: i64, kind: EventKind },
    Byte { time: i64, value: u8 },
    Diagnostic(String),
    Finished { events: usize, bytes: usize },
    Error(String),
}

struct ChannelSink {
    tx: Sender<DecodeUpdate>,
    events: usize,
    bytes: usize,
}

impl DecodeSink for ChannelSink {
    fn event(&mut self, time: i64, kind: EventKind) {
        self.events += 1;
        let _ = self.tx.send(DecodeUpdate::Event { time, kind });
    }

    fn data(&mut self, time: i64, value: u8) {
        self.bytes += 1;
        let _ = self.tx.send(DecodeUpdate::Byte { time, value });
    }

    fn diagnostic(&mut self, msg: &str) {
        log::warn!(target: "buswave::i2c", "{msg}");
        let _ = self.tx.send(DecodeUpdate::Diagnostic(msg.to_string()));
    }
}

/// Decodes a capture on a worker thread and streams the results, for hosts
/// that render rows as they arrive instead of waiting for the whole pass.
pub struct DecodeService {
    rx_updates: Receiver<DecodeUpdate>,
}

impl DecodeService {
    pub fn start(capture: Capture) -> Self {
        let (tx, rx_updates) = unbounded::<DecodeUpdate>();

        std::thread::spawn(move || {
            if capture.is_empty() {
                let _ = tx.send(DecodeUpdate::Error("capture is empty".to_string()));
                return;
            }

            let mut decoder = I2cDecoder::new();
            let mut sink = ChannelSink {
                tx: tx.clone(),
                events: 0,
                bytes: 0,
            };
            for &sample in capture.samples() {
                decoder.process(sample, &mut sink);
            }
            let _ = tx.send(DecodeUpdate::Finished {
                events: sink.events,
                bytes: sink.bytes,
            });
        });

        Self { rx_updates }
    }

    pub fn updates(&self) -> &Receiver<DecodeUpdate> {
        &self.rx_updates
    }
}
