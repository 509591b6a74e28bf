//! Newline-delimited JSON event source.
//!
//! Each non-blank line holds one [`ProtocolEvent`]. Lines that fail to
//! decode are logged, counted and skipped; the stream continues.

use std::fs::File;
use std::io::{BufRead, BufReader, Lines};
use std::path::Path;

use restaking_types::ProtocolEvent;
use tracing::warn;

use crate::error::IndexerError;

/// Iterator over the events of an NDJSON stream.
pub struct EventSource<R> {
    lines: Lines<R>,
    line_number: u64,
    malformed: u64,
}

impl EventSource<BufReader<File>> {
    /// Open the event file at `path`.
    pub fn open(path: &Path) -> Result<Self, IndexerError> {
        let file = File::open(path).map_err(|source| IndexerError::Source {
            path: path.to_path_buf(),
            source,
        })?;
        Ok(Self::new(BufReader::new(file)))
    }
}

impl<R: BufRead> EventSource<R> {
    /// Read events from any buffered reader.
    pub fn new(reader: R) -> Self {
        Self {
            lines: reader.lines(),
            line_number: 0,
            malformed: 0,
        }
    }

    /// Lines that could not be decoded so far.
    pub const fn malformed(&self) -> u64 {
        self.malformed
    }

    /// Lines read so far, blank and malformed included.
    pub const fn lines_read(&self) -> u64 {
        self.line_number
    }
}

impl<R: BufRead> Iterator for EventSource<R> {
    type Item = Result<ProtocolEvent, std::io::Error>;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            let line = match self.lines.next()? {
                Ok(line) => line,
                Err(e) => return Some(Err(e)),
            };
            self.line_number = self.line_number.saturating_add(1);
            if line.trim().is_empty() {
                continue;
            }
            match serde_json::from_str::<ProtocolEvent>(&line) {
                Ok(event) => return Some(Ok(event)),
                Err(e) => {
                    self.malformed = self.malformed.saturating_add(1);
                    warn!(line = self.line_number, error = %e, "Malformed event line; dropped");
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use std::io::Cursor;

    use restaking_types::EventKind;

    use super::*;

    const REGISTERED: &str = r#"{"meta":{"txHash":"0x0000000000000000000000000000000000000000000000000000000000000001","logIndex":0,"blockNumber":1,"blockTimestamp":12,"contract":"0x0000000000000000000000000000000000000000"},"payload":{"type":"OperatorRegistered","operator":"0x0101010101010101010101010101010101010101","delegationApprover":"0x0000000000000000000000000000000000000000"}}"#;

    #[test]
    fn skips_blank_and_malformed_lines() {
        let input = format!("{REGISTERED}\n\nnot json\n{{\"meta\":{{}}}}\n{REGISTERED}\n");
        let mut source = EventSource::new(Cursor::new(input));

        let kinds: Vec<_> = source.by_ref().filter_map(Result::ok).map(|e| e.kind()).collect();
        assert_eq!(kinds, vec![EventKind::OperatorRegistered, EventKind::OperatorRegistered]);
        assert_eq!(source.malformed(), 2);
        assert_eq!(source.lines_read(), 5);
    }

    #[test]
    fn unknown_event_names_still_decode() {
        let line = REGISTERED.replace("OperatorRegistered", "SomethingNew");
        let mut source = EventSource::new(Cursor::new(line));
        let kind = source.next().and_then(Result::ok).map(|e| e.kind());
        assert_eq!(kind, Some(EventKind::Unknown));
        assert_eq!(source.malformed(), 0);
    }

    #[test]
    fn missing_file_is_a_source_error() {
        let result = EventSource::open(Path::new("/nonexistent/events.ndjson"));
        assert!(matches!(result, Err(IndexerError::Source { .. })));
    }
}
