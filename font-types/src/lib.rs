//! Common [scalar data types][data types] and shared vocabulary for reading
//! and writing font tables.
//!
//! This crate is the common ground between `font-walker` and `font-writer`:
//! the big-endian scalar types, the [`Format`] vocabulary used to describe
//! packed records, the [`DiagnosticSink`] interface used by validating
//! operations, and a few integer utilities shared by table codecs.
//!
//! [data types]: https://docs.microsoft.com/en-us/typography/opentype/spec/otff#data-types

#![forbid(unsafe_code)]
#![deny(rustdoc::broken_intra_doc_links)]

mod diagnostics;
mod fixed;
pub mod format;
mod int24;
mod ranges;
mod raw;
mod span;

#[cfg(all(test, feature = "serde"))]
mod serde_test;

pub use diagnostics::{Diagnostic, DiagnosticSink, LogSink, NullSink, Severity};
pub use fixed::{F2Dot14, Fixed};
pub use format::{Format, FormatError, Record, ScalarKind, Value, MAX_FORMAT_BYTE_LEN};
pub use int24::{Int24, Uint24};
pub use ranges::{
    contiguous_groups, contiguous_groups_allow_zeroes, cumulative_offsets, pairwise,
    ContiguousGroups, Run,
};
pub use raw::{BeByteArray, Scalar};
pub use span::Span;
