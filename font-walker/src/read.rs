//! Errors and traits for interpreting font data

use font_types::{Diagnostic, DiagnosticSink, FormatError, Severity};

use crate::Walker;

/// A type that can be read from a [`Walker`].
///
/// Table codecs implement [`read`](FontRead::read), propagating errors with
/// `?`; the validating variant comes for free.
pub trait FontRead<'a>: Sized {
    /// Read an instance of `Self`, advancing the walker past it.
    fn read(walker: &mut Walker<'a>) -> Result<Self, ReadError>;

    /// Read an instance of `Self`, reporting any failure to `sink`.
    ///
    /// On failure exactly one diagnostic is reported and `None` is returned.
    fn read_validated(walker: &mut Walker<'a>, sink: &mut dyn DiagnosticSink) -> Option<Self> {
        Self::read(walker).or_report(sink)
    }

    /// Read an instance of `Self` from the start of `data`.
    fn from_bytes(data: &'a [u8]) -> Result<Self, ReadError> {
        Self::read(&mut Walker::new(data))
    }
}

/// An error that occurs when reading font data
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ReadError {
    /// An operation needed more data than the window holds.
    ///
    /// For bit-level operations, `position`, `needed` and `available` are
    /// measured in bits.
    #[error("{op} at {position} needs {needed}, only {available} available")]
    OutOfBounds {
        op: &'static str,
        position: usize,
        needed: usize,
        available: usize,
    },
    #[error("sub-window {start}..{end} does not fit in the parent window (limit {limit})")]
    MalformedSubWindow {
        start: usize,
        end: usize,
        limit: usize,
    },
    #[error("bit width {0} is not in 1..=32")]
    InvalidBitWidth(u32),
    #[error("position {position} is not a multiple of {multiple}")]
    Misaligned { position: usize, multiple: usize },
    #[error("{remainder} trailing bytes do not make up a whole {record_len}-byte record")]
    PartialRecord { remainder: usize, record_len: usize },
    #[error(transparent)]
    Format(#[from] FormatError),
}

impl ReadError {
    /// A short stable identifier for this kind of error.
    pub fn code(&self) -> &'static str {
        match self {
            ReadError::OutOfBounds { .. } => "V0004",
            ReadError::MalformedSubWindow { .. } => "V0005",
            ReadError::InvalidBitWidth(_) => "V0006",
            ReadError::Misaligned { .. } => "V0007",
            ReadError::PartialRecord { .. } => "V0008",
            ReadError::Format(_) => "V0009",
        }
    }

    /// Convert this error into a [`Diagnostic`] of `Error` severity.
    pub fn to_diagnostic(&self) -> Diagnostic {
        let diag = Diagnostic::new(Severity::Error, self.code(), "");
        match self {
            ReadError::OutOfBounds {
                op,
                position,
                needed,
                available,
            } => Diagnostic {
                template: "Insufficient bytes: {} at {} needs {}, {} available.",
                ..diag
            }
            .with_arg(op)
            .with_arg(position)
            .with_arg(needed)
            .with_arg(available),
            ReadError::MalformedSubWindow { start, end, limit } => Diagnostic {
                template: "Sub-window {}..{} extends past the parent window limit {}.",
                ..diag
            }
            .with_arg(start)
            .with_arg(end)
            .with_arg(limit),
            ReadError::InvalidBitWidth(width) => Diagnostic {
                template: "Bit width {} is not supported.",
                ..diag
            }
            .with_arg(width),
            ReadError::Misaligned { position, multiple } => Diagnostic {
                template: "Position {} is not aligned to {}.",
                ..diag
            }
            .with_arg(position)
            .with_arg(multiple),
            ReadError::PartialRecord {
                remainder,
                record_len,
            } => Diagnostic {
                template: "{} trailing bytes are not a whole number of {}-byte records.",
                ..diag
            }
            .with_arg(remainder)
            .with_arg(record_len),
            ReadError::Format(err) => Diagnostic {
                template: "Bad format: {}.",
                ..diag
            }
            .with_arg(err),
        }
    }
}

/// Fold a strict read result into the validating convention.
pub trait ReadResultExt<T> {
    /// Return the value, or report the error to `sink` and return `None`.
    fn or_report(self, sink: &mut dyn DiagnosticSink) -> Option<T>;
}

impl<T> ReadResultExt<T> for Result<T, ReadError> {
    fn or_report(self, sink: &mut dyn DiagnosticSink) -> Option<T> {
        match self {
            Ok(value) => Some(value),
            Err(e) => {
                sink.report(e.to_diagnostic());
                None
            }
        }
    }
}
