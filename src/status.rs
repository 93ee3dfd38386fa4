//! Scanner for the plaintext Gearman status port.
//!
//! Sends the literal `status\n` command and parses the line-oriented reply
//! into a table of per-queue counters. The reply is a sequence of
//! `<name> <queued> <running> <workers>` lines terminated by a line holding
//! a single `.`; blank lines are skipped.
//!
//! Parsing is all-or-nothing: one malformed line aborts the scan and no
//! partial table is returned.

use std::collections::BTreeMap;

use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpStream;
use tracing::debug;

use crate::error::StatusError;
use crate::gearman::GEARMAN_PORT;

/// Socket read size; lines may span chunk boundaries.
const READ_CHUNK: usize = 4096;

const STATUS_REQUEST: &[u8] = b"status\n";

/// End-of-status sentinel line.
const TERMINATOR: &str = ".";

/// Counters for one named queue.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StatusEntry {
    /// Jobs waiting to be picked up.
    pub queued: u32,
    /// Jobs currently in flight.
    pub running: u32,
    /// Workers registered for this queue.
    pub workers: u32,
}

/// One full scan of the status port, keyed by queue name.
pub type StatusTable = BTreeMap<String, StatusEntry>;

/// Scans the status port of `host` on the fixed Gearman port.
pub async fn scan(host: &str) -> Result<StatusTable, StatusError> {
    scan_addr(&format!("{host}:{GEARMAN_PORT}")).await
}

/// Scans the status port at an explicit `host:port` address.
pub async fn scan_addr(addr: &str) -> Result<StatusTable, StatusError> {
    let mut stream =
        TcpStream::connect(addr)
            .await
            .map_err(|e| StatusError::ConnectionFailed {
                addr: addr.to_string(),
                reason: e.to_string(),
            })?;
    stream.write_all(STATUS_REQUEST).await?;

    let mut parser = StatusParser::new();
    let mut chunk = [0u8; READ_CHUNK];
    loop {
        let n = stream.read(&mut chunk).await?;
        if n == 0 {
            return Err(StatusError::Truncated);
        }
        if let Some(table) = parser.feed(&chunk[..n])? {
            debug!(addr, queues = table.len(), "status scan complete");
            return Ok(table);
        }
    }
}

/// Incremental parser for the status reply stream.
///
/// Bytes are buffered across `feed` calls, so lines (the terminator
/// included) may arrive split across chunk boundaries.
#[derive(Debug, Default)]
pub struct StatusParser {
    buffer: Vec<u8>,
    table: StatusTable,
}

impl StatusParser {
    pub fn new() -> Self {
        Self::default()
    }

    /// Feeds one chunk of the stream.
    ///
    /// Returns the accumulated table once the terminator line arrives;
    /// anything buffered past the terminator is discarded.
    pub fn feed(&mut self, chunk: &[u8]) -> Result<Option<StatusTable>, StatusError> {
        self.buffer.extend_from_slice(chunk);
        while let Some(pos) = self.buffer.iter().position(|b| *b == b'\n') {
            let raw: Vec<u8> = self.buffer.drain(..=pos).collect();
            let raw = &raw[..raw.len() - 1];
            let line = std::str::from_utf8(raw)
                .map_err(|_| StatusError::NonUtf8Line(raw.to_vec()))?;
            if line.is_empty() {
                continue;
            }
            if line == TERMINATOR {
                return Ok(Some(std::mem::take(&mut self.table)));
            }
            let (name, entry) = parse_status_line(line)?;
            self.table.insert(name, entry);
        }
        Ok(None)
    }
}

/// Parses one `<name> <queued> <running> <workers>` line.
fn parse_status_line(line: &str) -> Result<(String, StatusEntry), StatusError> {
    let fields: Vec<&str> = line.split_whitespace().collect();
    if fields.len() != 4 {
        return Err(StatusError::MalformedLine {
            line: line.to_string(),
        });
    }

    let counter = |field: &str| {
        field.parse::<u32>().map_err(|_| StatusError::MalformedLine {
            line: line.to_string(),
        })
    };

    Ok((
        fields[0].to_string(),
        StatusEntry {
            queued: counter(fields[1])?,
            running: counter(fields[2])?,
            workers: counter(fields[3])?,
        },
    ))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn feed_all(chunks: &[&[u8]]) -> Result<Option<StatusTable>, StatusError> {
        let mut parser = StatusParser::new();
        let mut result = None;
        for chunk in chunks {
            if let Some(table) = parser.feed(chunk)? {
                result = Some(table);
                break;
            }
        }
        Ok(result)
    }

    #[test]
    fn test_full_block_single_chunk() {
        let table = feed_all(&[b"merger:repo 3 2 1\nexecutor:execute 21 0 0\n.\n"])
            .expect("block should parse")
            .expect("terminator should complete the scan");

        assert_eq!(table.len(), 2);
        assert_eq!(
            table["merger:repo"],
            StatusEntry {
                queued: 3,
                running: 2,
                workers: 1
            }
        );
        assert_eq!(
            table["executor:execute"],
            StatusEntry {
                queued: 21,
                running: 0,
                workers: 0
            }
        );
    }

    #[test]
    fn test_empty_block_is_an_empty_table() {
        let table = feed_all(&[b".\n"])
            .expect("block should parse")
            .expect("terminator should complete the scan");
        assert!(table.is_empty());
    }

    #[test]
    fn test_blank_lines_are_skipped() {
        let table = feed_all(&[b"\nmerger:repo 1 0 1\n\n.\n"])
            .expect("block should parse")
            .expect("terminator should complete the scan");
        assert_eq!(table.len(), 1);
    }

    #[test]
    fn test_lines_split_across_chunks() {
        let table = feed_all(&[b"merger:re", b"po 3 2 1\nexecutor:execute 21 0 0\n", b".\n"])
            .expect("block should parse")
            .expect("terminator should complete the scan");

        assert_eq!(table.len(), 2);
        assert_eq!(table["merger:repo"].queued, 3);
    }

    #[test]
    fn test_terminator_split_across_chunks() {
        let mut parser = StatusParser::new();
        assert!(parser
            .feed(b"merger:repo 1 1 1\n.")
            .expect("chunk should parse")
            .is_none());
        let table = parser
            .feed(b"\n")
            .expect("chunk should parse")
            .expect("terminator should complete the scan");
        assert_eq!(table.len(), 1);
    }

    #[test]
    fn test_no_terminator_means_no_table() {
        let mut parser = StatusParser::new();
        let result = parser
            .feed(b"merger:repo 1 1 1\n")
            .expect("chunk should parse");
        assert!(result.is_none());
    }

    #[test]
    fn test_wrong_field_count_is_rejected() {
        let err = feed_all(&[b"merger:repo 1 1\n.\n"]).expect_err("short line should fail");
        match err {
            StatusError::MalformedLine { line } => assert_eq!(line, "merger:repo 1 1"),
            other => panic!("expected MalformedLine, got {other:?}"),
        }

        let err =
            feed_all(&[b"merger:repo 1 1 1 1\n.\n"]).expect_err("long line should fail");
        assert!(matches!(err, StatusError::MalformedLine { .. }));
    }

    #[test]
    fn test_non_integer_counter_is_rejected() {
        let err = feed_all(&[b"merger:repo one 1 1\n.\n"]).expect_err("line should fail");
        match err {
            StatusError::MalformedLine { line } => assert_eq!(line, "merger:repo one 1 1"),
            other => panic!("expected MalformedLine, got {other:?}"),
        }
    }

    #[test]
    fn test_negative_counter_is_rejected() {
        let err = feed_all(&[b"merger:repo -1 1 1\n.\n"]).expect_err("line should fail");
        assert!(matches!(err, StatusError::MalformedLine { .. }));
    }
}
