//! Error types for gearctl operations.
//!
//! Defines error types for the major subsystems:
//! - Gearman job submission and reply handling
//! - Wire-level packet framing
//! - Status port scanning
//! - Snapshot dump and replay
//!
//! Eligibility skips during replay are intentionally absent from this
//! taxonomy: a change that fails the replay predicate is a silent no-op,
//! not an error.

use std::time::Duration;

use thiserror::Error;

/// Errors that can occur while talking to the Gearman server.
#[derive(Debug, Error)]
pub enum ClientError {
    /// The TCP or TLS connection could not be established.
    #[error("Connection to {addr} failed: {reason}")]
    ConnectionFailed { addr: String, reason: String },

    /// The server did not become ready within the connect budget.
    #[error("Server {addr} did not become ready within {timeout:?}")]
    ConnectTimeout { addr: String, timeout: Duration },

    /// A submitted job did not complete within the job budget.
    #[error("Job '{name}' did not complete within {timeout:?}")]
    JobTimeout { name: String, timeout: Duration },

    /// The server reported the job as failed.
    #[error("Job '{name}' failed on the server (handle {handle})")]
    JobFailed { name: String, handle: String },

    /// The worker raised an exception while running the job.
    #[error("Job '{name}' raised an exception: {detail}")]
    JobException { name: String, detail: String },

    /// The server sent something the client half of the protocol does not
    /// allow at this point.
    #[error("Protocol error: {0}")]
    Protocol(#[from] ProtocolError),

    /// The TLS client configuration could not be assembled.
    #[error("TLS configuration failed: {0}")]
    Tls(String),

    /// Transport-level I/O failure.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Wire-level violations of the Gearman binary protocol.
#[derive(Debug, Error)]
pub enum ProtocolError {
    /// The frame header does not start with `\0REQ` or `\0RES`.
    #[error("Bad packet magic {0:?}")]
    BadMagic([u8; 4]),

    /// The packet type is not one the client understands.
    #[error("Unknown packet type {0}")]
    UnknownPacketType(u32),

    /// A request frame arrived where a response was required.
    #[error("Expected a response packet, got a request packet")]
    UnexpectedRequestPacket,

    /// A response frame arrived out of sequence.
    #[error("Unexpected {packet} packet while waiting for {expected}")]
    UnexpectedPacket { packet: String, expected: String },

    /// The advertised payload size is beyond the sanity cap.
    #[error("Oversized packet payload ({size} bytes)")]
    OversizedPacket { size: u32 },

    /// The reply payload is not valid JSON.
    #[error("Reply payload is not valid JSON: {0}")]
    InvalidReply(#[from] serde_json::Error),

    /// The reply payload is not valid UTF-8.
    #[error("Reply payload is not valid UTF-8")]
    NonUtf8Reply,
}

/// Errors that can occur while scanning the plaintext status port.
#[derive(Debug, Error)]
pub enum StatusError {
    /// The status port could not be reached.
    #[error("Connection to {addr} failed: {reason}")]
    ConnectionFailed { addr: String, reason: String },

    /// A line did not parse as `<name> <queued> <running> <workers>`.
    ///
    /// Carries the raw offending line for diagnosis; no partial table is
    /// returned alongside it.
    #[error("Malformed status line: {line:?}")]
    MalformedLine { line: String },

    /// A status line contained bytes outside UTF-8.
    #[error("Status line is not valid UTF-8: {0:?}")]
    NonUtf8Line(Vec<u8>),

    /// The stream ended before the `.` terminator.
    #[error("Status stream ended before the '.' terminator")]
    Truncated,

    /// Transport-level I/O failure.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Errors that can occur during snapshot dump or replay.
#[derive(Debug, Error)]
pub enum SnapshotError {
    /// A Gearman call failed; the whole dump or replay is abandoned.
    #[error("Gearman call failed: {0}")]
    Client(#[from] ClientError),

    /// The `tenant_list` reply was not an array of `{name}` objects.
    #[error("Unexpected tenant list shape: {0}")]
    BadTenantList(#[source] serde_json::Error),

    /// A tenant's status document does not have the pipeline structure the
    /// replay walk requires.
    #[error("Malformed status for tenant '{tenant}': {source}")]
    BadTenantStatus {
        tenant: String,
        #[source]
        source: serde_json::Error,
    },

    /// The scheduler never came back within the reconnect budget.
    #[error("Gave up connecting to {addr} after {attempts} attempts")]
    RetriesExhausted { addr: String, attempts: u32 },
}
