//! Unresolved offsets and how they are resolved

use font_types::ScalarKind;

use crate::{bits, Stake, WriteError};

/// Adjustments applied when an offset is resolved.
///
/// The default is a plain byte offset that must be non-negative unless the
/// writer allows negative offsets.
///
/// If more than one delta is given, only one is used: a delta in multiples
/// of the divisor wins over a byte delta, which wins over a bit delta.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct OffsetOptions {
    negative_ok: Option<bool>,
    divisor: i64,
    multiple_delta: Option<i64>,
    byte_delta: Option<i64>,
    bit_delta: Option<i64>,
    bit_len: Option<u32>,
}

impl Default for OffsetOptions {
    fn default() -> Self {
        OffsetOptions {
            negative_ok: None,
            divisor: 1,
            multiple_delta: None,
            byte_delta: None,
            bit_delta: None,
            bit_len: None,
        }
    }
}

impl OffsetOptions {
    pub fn new() -> Self {
        Self::default()
    }

    /// Permit (or forbid) a negative result for this offset only, overriding
    /// the writer-wide setting.
    pub fn negative_ok(mut self, allowed: bool) -> Self {
        self.negative_ok = Some(allowed);
        self
    }

    /// Store the offset in units of `divisor` bytes (2 for word offsets, and
    /// so on). The byte distance must be a multiple of the divisor.
    pub fn divisor(mut self, divisor: u32) -> Self {
        self.divisor = divisor.max(1) as i64;
        self
    }

    /// Add `delta` multiples of the divisor to the resolved offset.
    pub fn multiple_delta(mut self, delta: i64) -> Self {
        self.multiple_delta = Some(delta);
        self
    }

    /// Add `delta` bytes to the resolved offset.
    pub fn byte_delta(mut self, delta: i64) -> Self {
        self.byte_delta = Some(delta);
        self
    }

    /// Add `delta` bits to the resolved distance, which must still end up on
    /// a byte boundary.
    pub fn bit_delta(mut self, delta: i64) -> Self {
        self.bit_delta = Some(delta);
        self
    }

    /// Store the offset in a field of `bits` bits rather than the full width
    /// of its kind.
    pub fn bit_len(mut self, bits: u32) -> Self {
        self.bit_len = Some(bits);
        self
    }

    /// The delta in bits, or `None` if it does not fit in an `i64`.
    fn delta_bits(&self) -> Option<i64> {
        match (self.multiple_delta, self.byte_delta, self.bit_delta) {
            (Some(delta), _, _) => delta.checked_mul(self.divisor)?.checked_mul(8),
            (None, Some(delta), _) => delta.checked_mul(8),
            (None, None, delta) => Some(delta.unwrap_or(0)),
        }
    }

    /// Turn a distance in bits into the value stored in the field.
    pub(crate) fn resolve(
        &self,
        distance_bits: i64,
        writer_negative_ok: bool,
    ) -> Result<i64, WriteError> {
        let bits = self
            .delta_bits()
            .and_then(|delta| distance_bits.checked_add(delta))
            .ok_or(WriteError::OffsetOverflow {
                value: distance_bits / 8,
                bits: 64,
            })?;
        if bits % 8 != 0 {
            return Err(WriteError::MisalignedOffset { bits, multiple: 8 });
        }
        let mut value = bits / 8;
        if self.divisor != 1 {
            if value % self.divisor != 0 {
                return Err(WriteError::MisalignedOffset {
                    bits,
                    multiple: 8 * self.divisor,
                });
            }
            value /= self.divisor;
        }
        if value < 0 && !self.negative_ok.unwrap_or(writer_negative_ok) {
            return Err(WriteError::NegativeOffset { value });
        }
        Ok(value)
    }
}

/// A fixed-width field holding the distance between two stakes.
#[derive(Clone, Debug, PartialEq, Eq)]
pub(crate) struct OffsetLink {
    pub(crate) kind: ScalarKind,
    pub(crate) base: Stake,
    pub(crate) target: Stake,
    pub(crate) options: OffsetOptions,
}

impl OffsetLink {
    pub(crate) fn new(
        kind: ScalarKind,
        base: Stake,
        target: Stake,
        options: OffsetOptions,
    ) -> Result<Self, WriteError> {
        if kind.int_bounds().is_none() {
            return Err(WriteError::UnsuitableKind(kind));
        }
        let link = OffsetLink {
            kind,
            base,
            target,
            options,
        };
        let width = link.bit_len() as u32;
        if width > (kind.byte_len() * 8) as u32 {
            return Err(WriteError::InvalidBitWidth(width));
        }
        bits::check_width(width)?;
        Ok(link)
    }

    /// The size of the field, in bits.
    pub(crate) fn bit_len(&self) -> usize {
        self.options
            .bit_len
            .map(|bits| bits as usize)
            .unwrap_or(self.kind.byte_len() * 8)
    }

    /// Encode a resolved value, left-justified in the returned bytes.
    pub(crate) fn encode(&self, value: i64) -> Result<Vec<u8>, WriteError> {
        let bits = self.bit_len() as u32;
        let (min, max) = field_bounds(self.kind, bits);
        if !(min..=max).contains(&(value as i128)) {
            return Err(WriteError::OffsetOverflow { value, bits });
        }
        Ok(bits::low_bits(value, bits))
    }
}

/// The range of a `bits`-wide field with the signedness of `kind`.
fn field_bounds(kind: ScalarKind, bits: u32) -> (i128, i128) {
    let (kind_min, kind_max) = kind.int_bounds().unwrap_or_default();
    let (min, max) = if kind.is_signed() {
        (-(1i128 << (bits - 1)), (1i128 << (bits - 1)) - 1)
    } else {
        (0, (1i128 << bits) - 1)
    };
    (min.max(kind_min as i128), max.min(kind_max as i128))
}
