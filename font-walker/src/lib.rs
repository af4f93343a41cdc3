//! Reading font table data.
//!
//! A [`Walker`] is a cursor over a window of a borrowed byte buffer. Every
//! read is big-endian and bounds-checked against the window; sub-walkers
//! narrow the window for nested structures, measuring their offsets from an
//! explicit [`Anchor`].
//!
//! Every operation returns a `Result`. Callers that want to keep going after
//! bad data use the `_validated` variants (or [`ReadResultExt::or_report`]),
//! which report one [`Diagnostic`](font_types::Diagnostic) to a
//! [`DiagnosticSink`](font_types::DiagnosticSink) and return `None`.
//!
//! ```
//! use font_walker::{types::Format, Walker};
//!
//! let data = [0x00, 0x02, 0x00, 0x00, 0x00, 0x03];
//! let mut walker = Walker::new(&data);
//! let count = walker.read::<u16>().unwrap();
//! let format: Format = "H".parse().unwrap();
//! let items = walker.group(&format, count as usize).unwrap();
//! assert_eq!(items.len(), 2);
//! assert!(walker.at_end());
//! ```

#![forbid(unsafe_code)]
#![deny(rustdoc::broken_intra_doc_links)]

mod bit_walker;
mod read;
mod walker;

/// Public re-export of the font-types crate.
pub extern crate font_types as types;

pub use bit_walker::BitWalker;
pub use read::{FontRead, ReadError, ReadResultExt};
pub use walker::{Anchor, Walker};
