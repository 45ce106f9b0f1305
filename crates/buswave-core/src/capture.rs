use buswave_decode::Sample;
use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::Path;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum CaptureError {
    #[error("failed to read capture: {0}")]
    Io(#[from] std::io::Error),
    #[error("line {line}: expected `time,scl,sda`, got {got:?}")]
    Malformed { line: usize, got: String },
    #[error("line {line}: line level must be 0 or 1, got {got:?}")]
    BadLevel { line: usize, got: String },
    #[error("sample {index}: timestamp {time} goes backwards (previous {prev})")]
    OutOfOrder { index: usize, time: i64, prev: i64 },
}

/// An acquired two-line trace, ordered by timestamp.
///
/// Timestamps are nanoseconds relative to the capture trigger; samples at or
/// before the trigger carry non-positive times. Ordering is validated here,
/// once, so the decoder downstream never has to.
#[derive(Debug)]
pub struct Capture {
    samples: Vec<Sample>,
}

impl Capture {
    pub fn from_samples(samples: Vec<Sample>) -> Result<Self, CaptureError> {
        for (index, pair) in samples.windows(2).enumerate() {
            if pair[1].time < pair[0].time {
                return Err(CaptureError::OutOfOrder {
                    index: index + 1,
                    time: pair[1].time,
                    prev: pair[0].time,
                });
            }
        }
        Ok(Self { samples })
    }

    /// Parse a `time,scl,sda` CSV trace. Blank lines and `#` comments are
    /// skipped; levels must be literal `0` or `1`.
    pub fn from_reader(reader: impl BufRead) -> Result<Self, CaptureError> {
        let mut samples = Vec::new();
        for (idx, line) in reader.lines().enumerate() {
            let line_no = idx + 1;
            let line = line?;
            let trimmed = line.trim();
            if trimmed.is_empty() || trimmed.starts_with('#') {
                continue;
            }

            let mut fields = trimmed.split(',').map(str::trim);
            let (time, scl, sda) = match (fields.next(), fields.next(), fields.next(), fields.next())
            {
                (Some(t), Some(scl), Some(sda), None) => (t, scl, sda),
                _ => {
                    return Err(CaptureError::Malformed {
                        line: line_no,
                        got: trimmed.to_string(),
                    })
                }
            };

            let time: i64 = time.parse().map_err(|_| CaptureError::Malformed {
                line: line_no,
                got: trimmed.to_string(),
            })?;
            let scl = parse_level(scl, line_no)?;
            let sda = parse_level(sda, line_no)?;
            samples.push(Sample::new(scl, sda, time));
        }
        Self::from_samples(samples)
    }

    pub fn from_path(path: impl AsRef<Path>) -> Result<Self, CaptureError> {
        Self::from_reader(BufReader::new(File::open(path)?))
    }

    pub fn samples(&self) -> &[Sample] {
        &self.samples
    }

    pub fn len(&self) -> usize {
        self.samples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    /// Number of samples at or before the trigger (time <= 0).
    pub fn trigger_index(&self) -> usize {
        self.samples.iter().take_while(|s| s.time <= 0).count()
    }

    /// Shift every timestamp by `bias` nanoseconds.
    pub fn rebase(&mut self, bias: i64) {
        for sample in &mut self.samples {
            sample.time += bias;
        }
    }
}

fn parse_level(field: &str, line: usize) -> Result<bool, CaptureError> {
    match field {
        "0" => Ok(false),
        "1" => Ok(true),
        other => Err(CaptureError::BadLevel {
            line,
            got: other.to_string(),
        }),
    }
}
