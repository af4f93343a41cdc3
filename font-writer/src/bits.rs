//! Sub-byte encoding helpers.

use crate::WriteError;

/// The largest supported bit field.
pub(crate) const MAX_BIT_WIDTH: u32 = 64;

/// Encode the low `width` bits of `value`, left-justified in the returned bytes.
///
/// Negative values are stored in two's complement. The value must lie in
/// `-2^(width-1) ..= 2^width - 1`; anything outside that range would lose
/// significant bits.
pub fn bits_from_number(value: i64, width: u32) -> Result<Vec<u8>, WriteError> {
    check_width(width)?;
    let (min, max) = (-(1i128 << (width - 1)), (1i128 << width) - 1);
    if !(min..=max).contains(&(value as i128)) {
        return Err(WriteError::BitsOverflow { value, width });
    }
    Ok(low_bits(value, width))
}

pub(crate) fn check_width(width: u32) -> Result<(), WriteError> {
    if (1..=MAX_BIT_WIDTH).contains(&width) {
        Ok(())
    } else {
        Err(WriteError::InvalidBitWidth(width))
    }
}

/// The low `width` bits of `value`, left-justified, without a range check.
pub(crate) fn low_bits(value: i64, width: u32) -> Vec<u8> {
    let justified = (value as u64) << (MAX_BIT_WIDTH - width);
    justified.to_be_bytes()[..byte_len_for_bits(width as usize)].to_vec()
}

pub(crate) fn byte_len_for_bits(bits: usize) -> usize {
    (bits + 7) / 8
}

/// The top `bits` bits of `bytes`, zero-filled if `bytes` is short.
pub(crate) fn high_bits(bytes: &[u8], bits: usize) -> Vec<u8> {
    let mut out = vec![0u8; byte_len_for_bits(bits)];
    let copied = out.len().min(bytes.len());
    out[..copied].copy_from_slice(&bytes[..copied]);
    if let Some(last) = out.last_mut() {
        *last &= top_mask((bits - 1) % 8 + 1);
    }
    out
}

/// A mask selecting the top `n` bits of a byte, for `n` in `1..=8`.
fn top_mask(n: usize) -> u8 {
    (0xff00u16 >> n) as u8
}

/// Accumulates bit strings, most significant bit first.
#[derive(Debug, Default)]
pub(crate) struct BitPacker {
    out: Vec<u8>,
    bit_len: usize,
}

impl BitPacker {
    pub(crate) fn with_capacity(bytes: usize) -> Self {
        BitPacker {
            out: Vec::with_capacity(bytes),
            bit_len: 0,
        }
    }

    /// Append the top `bits` bits of `bytes`.
    pub(crate) fn push(&mut self, bytes: &[u8], bits: usize) {
        if self.bit_len % 8 == 0 && bits % 8 == 0 {
            self.out.extend_from_slice(&bytes[..bits / 8]);
            self.bit_len += bits;
            return;
        }
        let mut remaining = bits;
        for byte in bytes {
            if remaining == 0 {
                break;
            }
            let n = remaining.min(8);
            self.push_byte(*byte, n);
            remaining -= n;
        }
    }

    fn push_byte(&mut self, byte: u8, n: usize) {
        let byte = byte & top_mask(n);
        let shift = self.bit_len % 8;
        match self.out.last_mut() {
            Some(last) if shift != 0 => {
                *last |= byte >> shift;
                if n > 8 - shift {
                    self.out.push(byte << (8 - shift));
                }
            }
            _ => self.out.push(byte),
        }
        self.bit_len += n;
    }

    pub(crate) fn bit_len(&self) -> usize {
        self.bit_len
    }

    /// The packed bytes; a trailing partial byte is zero-padded.
    pub(crate) fn into_bytes(self) -> Vec<u8> {
        self.out
    }
}
