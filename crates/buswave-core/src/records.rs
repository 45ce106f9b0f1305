use buswave_decode::EventKind;
use serde::Serialize;

/// One written slot of a derived output container.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Row<T> {
    pub time: i64,
    pub value: T,
}

/// A derived output container sized to the capture it was decoded from.
///
/// The decoder writes far fewer rows than the capture has samples, so after
/// the decode the remaining capacity is padded forward in time and hidden
/// (`finalize`). Padded slots carry no value; only the written prefix is
/// ever rendered.
pub struct RecordStore<T> {
    rows: Vec<Row<T>>,
    padding: Vec<i64>,
    capacity: usize,
    finalized: bool,
}

impl<T: Copy> RecordStore<T> {
    pub fn new(capacity: usize) -> Self {
        Self {
            rows: Vec::new(),
            padding: Vec::new(),
            capacity,
            finalized: false,
        }
    }

    /// Append a visible row. Rows past the container's capacity are dropped;
    /// a well-formed trace can never decode to more rows than samples.
    pub fn push(&mut self, time: i64, value: T) {
        if self.rows.len() < self.capacity {
            self.rows.push(Row { time, value });
        } else {
            log::warn!("record store full ({} rows), dropping row", self.capacity);
        }
    }

    /// Fill the unused capacity with hidden placeholder slots at strictly
    /// increasing times past `last_time`.
    pub fn finalize(&mut self, mut last_time: i64) {
        while self.rows.len() + self.padding.len() < self.capacity {
            last_time += 1;
            self.padding.push(last_time);
        }
        self.finalized = true;
    }

    pub fn is_finalized(&self) -> bool {
        self.finalized
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// The written (visible) rows, in emission order.
    pub fn rows(&self) -> &[Row<T>] {
        &self.rows
    }

    /// Timestamps of the hidden padding slots written by `finalize`.
    pub fn padding(&self) -> &[i64] {
        &self.padding
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }
}

/// A merged view over the event and data containers, one entry per
/// timestamp. An `ADDRESS` or `DATA` event and the byte it decoded share a
/// timestamp and collapse into a single row.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct DecodedRow {
    pub time: i64,
    pub event: Option<EventKind>,
    pub byte: Option<u8>,
}

/// Merge the visible event and byte rows into one time-ordered listing.
pub fn merge_rows(events: &RecordStore<EventKind>, bytes: &RecordStore<u8>) -> Vec<DecodedRow> {
    let mut out = Vec::with_capacity(events.len() + bytes.len());
    let mut ev = events.rows().iter().peekable();
    let mut by = bytes.rows().iter().peekable();

    loop {
        match (ev.peek(), by.peek()) {
            (Some(e), Some(b)) if e.time == b.time => {
                out.push(DecodedRow {
                    time: e.time,
                    event: Some(e.value),
                    byte: Some(b.value),
                });
                ev.next();
                by.next();
            }
            (Some(e), Some(b)) if e.time < b.time => {
                out.push(DecodedRow {
                    time: e.time,
                    event: Some(e.value),
                    byte: None,
                });
                ev.next();
            }
            (Some(_), Some(b)) => {
                out.push(DecodedRow {
                    time: b.time,
                    event: None,
                    byte: Some(b.value),
                });
                by.next();
            }
            (Some(e), None) => {
                out.push(DecodedRow {
                    time: e.time,
                    event: Some(e.value),
                    byte: None,
                });
                ev.next();
            }
            (None, Some(b)) => {
                out.push(DecodedRow {
                    time: b.time,
                    event: None,
                    byte: Some(b.value),
                });
                by.next();
            }
            (None, None) => break,
        }
    }
    out
}

/// Render merged rows the way the trace viewer shows them.
pub fn rows_to_text(rows: &[DecodedRow], show_timestamp: bool, show_hex: bool) -> String {
    let mut result = String::new();
    for row in rows {
        if show_timestamp {
            result.push_str(&format!("[{:>12} ns] ", row.time));
        }
        match row.event {
            Some(kind) => result.push_str(kind.label()),
            None => result.push_str("BYTE"),
        }
        if let Some(byte) = row.byte {
            if show_hex {
                result.push_str(&format!(" 0x{byte:02X}"));
            } else {
                result.push_str(&format!(" {byte}"));
            }
        }
        result.push('\n');
    }
    result
}
