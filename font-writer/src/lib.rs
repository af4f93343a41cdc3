//! Building font table data that refers to itself.
//!
//! Font tables are full of offsets to subtables, counts written before the
//! things they count, and indices into other tables. A [`LinkedWriter`]
//! lets these be written in order, as placeholders, and fills them in
//! when the writer is finalized.
//!
//! ```
//! use font_writer::{types::ScalarKind, LinkedWriter};
//!
//! let mut writer = LinkedWriter::new();
//! let table = writer.stake_current();
//! let subtable = writer.new_stake();
//! writer.add(1u16);
//! writer.add_offset(ScalarKind::U16, table, subtable).unwrap();
//! writer.bind_stake(subtable).unwrap();
//! writer.add(0xabcdu16);
//! assert_eq!(writer.finalize().unwrap(), [0x00, 0x01, 0x00, 0x04, 0xab, 0xcd]);
//! ```
//!
//! Subtables that are referenced from several places can be written once
//! with a [`Pool`].

#![forbid(unsafe_code)]
#![deny(rustdoc::broken_intra_doc_links)]

mod bits;
mod build;
mod error;
mod offsets;
mod pool;
mod stake;
mod write;

/// Public re-export of the font-types crate.
pub extern crate font_types as types;

pub use bits::bits_from_number;
pub use build::{dump, BuildBinary};
pub use error::WriteError;
pub use offsets::OffsetOptions;
pub use pool::Pool;
pub use stake::{Deferred, IndexTag, Stake};
pub use write::{compute_checksum, LinkedWriter};
