// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! The `errors` module defines the error taxonomy shared by every reader and writer component.

use std::error::Error as StdError;
use std::fmt;
use std::result;

/// `SeekErrorKind` enumerates the generic reasons a seek on an essence or sequence reader may
/// fail.
#[derive(Debug)]
pub enum SeekErrorKind {
    /// The stream is not seekable at all.
    Unseekable,
    /// The timestamp or edit-unit position to seek to is out of range.
    OutOfRange,
    /// The track ID provided is invalid.
    InvalidTrack,
}

impl SeekErrorKind {
    fn as_str(&self) -> &'static str {
        match *self {
            SeekErrorKind::Unseekable => "stream is not seekable",
            SeekErrorKind::OutOfRange => "requested position is out-of-range for stream",
            SeekErrorKind::InvalidTrack => "invalid track id",
        }
    }
}

/// `MxfError` enumerates every error this crate family can report. See the crate documentation
/// for the propagation policy: reader errors encountered mid-walk are generally logged and
/// recovered from, while writer errors always surface to the caller.
#[derive(Debug)]
pub enum MxfError {
    /// An IO error occurred while reading, writing, or seeking the underlying byte source.
    Io(std::io::Error),
    /// A KLV triplet was malformed: a BER length declared a value larger than the remaining file,
    /// a long-form length had an invalid octet count, or a length exceeded `u64`.
    InvalidKlv(&'static str),
    /// The source ended in the middle of a key, a length, or a value.
    UnexpectedEof,
    /// A required Universal Label was not recognised by the label registry (only reported when
    /// strict-mode validation is enabled).
    InvalidLabel(&'static str),
    /// Data read back from the file disagrees with itself: an index entry doesn't match the
    /// walked content package size, a partition's `this_partition` field doesn't match its actual
    /// offset, or similar.
    Inconsistent(&'static str),
    /// The requested operation is not something this engine can produce or consume, e.g. more
    /// than one clip-wrapped track in a single file.
    Unsupported(&'static str),
    /// A conformance rule for a named shim (AS-10, AS-11, ...) was violated.
    ShimViolation(&'static str),
    /// A seek could not be satisfied.
    Seek(SeekErrorKind),
    /// The requested edit unit, byte offset, or index entry lies outside of what is known.
    OutOfRange,
    /// End of the essence or partition sequence; not itself an error condition for callers that
    /// loop on `next_packet`-style APIs.
    EndOfStream,
    Other(&'static str),
}

impl fmt::Display for MxfError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MxfError::Io(err) => write!(f, "io error: {}", err),
            MxfError::InvalidKlv(msg) => write!(f, "malformed klv: {}", msg),
            MxfError::UnexpectedEof => write!(f, "unexpected end of file"),
            MxfError::InvalidLabel(msg) => write!(f, "invalid label: {}", msg),
            MxfError::Inconsistent(msg) => write!(f, "inconsistent file: {}", msg),
            MxfError::Unsupported(msg) => write!(f, "unsupported: {}", msg),
            MxfError::ShimViolation(msg) => write!(f, "shim violation: {}", msg),
            MxfError::Seek(kind) => write!(f, "seek error: {}", kind.as_str()),
            MxfError::OutOfRange => write!(f, "position out of range"),
            MxfError::EndOfStream => write!(f, "end of stream"),
            MxfError::Other(msg) => write!(f, "{}", msg),
        }
    }
}

impl StdError for MxfError {
    fn source(&self) -> Option<&(dyn StdError + 'static)> {
        match self {
            MxfError::Io(err) => Some(err),
            _ => None,
        }
    }
}

impl From<std::io::Error> for MxfError {
    fn from(err: std::io::Error) -> MxfError {
        match err.kind() {
            std::io::ErrorKind::UnexpectedEof => MxfError::UnexpectedEof,
            _ => MxfError::Io(err),
        }
    }
}

pub type Result<T> = result::Result<T, MxfError>;

pub fn invalid_klv<T>(msg: &'static str) -> Result<T> {
    Err(MxfError::InvalidKlv(msg))
}

pub fn inconsistent<T>(msg: &'static str) -> Result<T> {
    Err(MxfError::Inconsistent(msg))
}

pub fn unsupported<T>(msg: &'static str) -> Result<T> {
    Err(MxfError::Unsupported(msg))
}

pub fn shim_violation<T>(msg: &'static str) -> Result<T> {
    Err(MxfError::ShimViolation(msg))
}

pub fn seek_error<T>(kind: SeekErrorKind) -> Result<T> {
    Err(MxfError::Seek(kind))
}

/// Severity of a structured diagnostic. Ordered `Debug < Info < Warn < Error`.
#[derive(Copy, Clone, Debug, PartialEq, Eq, PartialOrd, Ord)]
pub enum Level {
    Debug,
    Info,
    Warn,
    Error,
}

/// A structured diagnostic emitted by the engine. Readers that recover from an error (see
/// `MXFSequenceReader`/`EssenceReader` walk logic) still report what happened through this type
/// rather than silently discarding it.
#[derive(Clone, Debug)]
pub struct Diagnostic {
    pub level: Level,
    /// Identifies which input file produced the diagnostic, for callers consuming several
    /// readers through a `SequenceReader`.
    pub source_file_id: u32,
    pub code: &'static str,
    pub message: String,
}

impl Diagnostic {
    pub fn new(level: Level, source_file_id: u32, code: &'static str, message: String) -> Self {
        Diagnostic { level, source_file_id, code, message }
    }
}

impl fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{:?}] ({}) {}: {}", self.level, self.source_file_id, self.code, self.message)
    }
}

/// A sink that diagnostics are routed to. The default sink forwards to the `log` crate at the
/// matching level; callers may install their own to capture diagnostics instead.
pub trait DiagnosticSink: Send + Sync {
    fn emit(&self, diagnostic: &Diagnostic);
}

/// The default sink: routes every diagnostic through the `log` crate.
pub struct LogDiagnosticSink;

impl DiagnosticSink for LogDiagnosticSink {
    fn emit(&self, diagnostic: &Diagnostic) {
        match diagnostic.level {
            Level::Debug => log::debug!("{}", diagnostic),
            Level::Info => log::info!("{}", diagnostic),
            Level::Warn => log::warn!("{}", diagnostic),
            Level::Error => log::error!("{}", diagnostic),
        }
    }
}
