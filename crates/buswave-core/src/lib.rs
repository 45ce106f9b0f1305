//! Host-side glue: capture loading, decode sessions, derived record stores.

pub mod capture;
pub mod records;
pub mod service;
pub mod session;

pub use capture::{Capture, CaptureError};
pub use records::{merge_rows, rows_to_text, DecodedRow, RecordStore, Row};
pub use service::{DecodeService, DecodeUpdate};
pub use session::{DecodeSession, SessionError, SessionOutput};
