//! Error types for the modem transport and CSQ parsing.

use thiserror::Error;

/// The modem could not be used at all. Disables the signal monitor for the session.
#[derive(Debug, Error)]
pub enum ModemError {
    #[error("could not open serial port {port}")]
    Open {
        port: String,
        #[source]
        source: serialport::Error,
    },

    #[error("serial transport error")]
    Io(#[from] std::io::Error),
}

/// A CSQ exchange completed but did not yield a reading.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CsqError {
    /// No `+CSQ:` line before the final result code (or before the read timed out).
    #[error("no +CSQ line in modem response")]
    NoResponse,

    /// A `+CSQ:` line was present but its fields were not two integers.
    #[error("malformed +CSQ line: {0}")]
    Malformed(String),
}
