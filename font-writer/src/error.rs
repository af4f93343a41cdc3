//! Errors that occur during writing

use font_types::{Diagnostic, FormatError, ScalarKind, Severity};

use crate::{IndexTag, Stake};

/// An error that occurs while building or finalizing a [`LinkedWriter`].
///
/// Finalize-time failures each have their own variant, so callers can tell
/// which invariant was violated.
///
/// [`LinkedWriter`]: crate::LinkedWriter
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum WriteError {
    #[error("{0} is referenced but was never bound")]
    UnboundStake(Stake),
    #[error("{0} is already bound")]
    StakeAlreadyBound(Stake),
    #[error("{0} was not created by this writer")]
    UnknownStake(Stake),
    #[error("deferred value at byte {position} was never set")]
    UnsetDeferredValue { position: usize },
    #[error("offset {value} does not fit in {bits} bits")]
    OffsetOverflow { value: i64, bits: u32 },
    #[error("offset {value} is negative and negative offsets are not allowed")]
    NegativeOffset { value: i64 },
    /// A resolved offset (in bits) is not a multiple of `multiple` bits.
    #[error("offset of {bits} bits is not a multiple of {multiple} bits")]
    MisalignedOffset { bits: i64, multiple: i64 },
    #[error("no index map was added for {0}")]
    MissingIndexMap(IndexTag),
    #[error("the index map for {tag} has no entry for {key}")]
    MissingIndexKey { tag: IndexTag, key: u32 },
    #[error("variable-width offsets did not settle after {iterations} passes")]
    ResizeLoop { iterations: usize },
    #[error("{value} does not fit in {width} bits")]
    BitsOverflow { value: i64, width: u32 },
    #[error("bit width {0} is not in 1..=64")]
    InvalidBitWidth(u32),
    #[error("deferred slot is {expected} bytes, value is {found} bytes")]
    DeferredWidthMismatch { expected: usize, found: usize },
    #[error("deferred slot does not belong to this writer")]
    UnknownDeferred,
    #[error("{0} does not mark a replaceable string")]
    NotReplaceable(Stake),
    #[error("an index map for {0} was already added")]
    DuplicateIndexMap(IndexTag),
    #[error("{0:?} cannot be used for this field")]
    UnsuitableKind(ScalarKind),
    #[error(transparent)]
    Format(#[from] FormatError),
}

impl WriteError {
    /// A short stable identifier for this kind of error.
    pub fn code(&self) -> &'static str {
        match self {
            WriteError::UnboundStake(_) => "W0001",
            WriteError::StakeAlreadyBound(_) => "W0002",
            WriteError::UnknownStake(_) => "W0003",
            WriteError::UnsetDeferredValue { .. } => "W0004",
            WriteError::OffsetOverflow { .. } => "W0005",
            WriteError::NegativeOffset { .. } => "W0006",
            WriteError::MisalignedOffset { .. } => "W0007",
            WriteError::MissingIndexMap(_) => "W0008",
            WriteError::MissingIndexKey { .. } => "W0009",
            WriteError::ResizeLoop { .. } => "W0010",
            WriteError::BitsOverflow { .. } => "W0011",
            WriteError::InvalidBitWidth(_) => "W0012",
            WriteError::DeferredWidthMismatch { .. } => "W0013",
            WriteError::UnknownDeferred => "W0014",
            WriteError::NotReplaceable(_) => "W0015",
            WriteError::DuplicateIndexMap(_) => "W0016",
            WriteError::UnsuitableKind(_) => "W0017",
            WriteError::Format(_) => "W0018",
        }
    }

    /// A `Critical` diagnostic describing this error.
    pub fn to_diagnostic(&self) -> Diagnostic {
        Diagnostic::new(Severity::Critical, self.code(), "Writer failed: {}.").with_arg(self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn diagnostic_text() {
        let err = WriteError::OffsetOverflow {
            value: 300,
            bits: 8,
        };
        let diag = err.to_diagnostic();
        assert_eq!(diag.severity, Severity::Critical);
        assert_eq!(diag.code, "W0005");
        assert_eq!(
            diag.message(),
            "Writer failed: offset 300 does not fit in 8 bits."
        );
    }
}
