//! Bit-level reading, for packed bitmap rows and masks.

use font_types::{DiagnosticSink, Format, Record};

use crate::{walker::decode_group, Anchor, ReadError, ReadResultExt, Walker};

/// A cursor that reads big-endian bit fields from a walker's window.
///
/// Bits are consumed most significant first. Every operation is checked
/// against the window of the walker it was created from, and a failed
/// operation never moves the cursor.
///
/// Positions and lengths reported in errors are measured in bits.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct BitWalker<'a> {
    walker: Walker<'a>,
    // absolute, from the start of the buffer
    bit_pos: usize,
}

impl<'a> BitWalker<'a> {
    pub(crate) fn new(walker: Walker<'a>) -> Self {
        BitWalker {
            bit_pos: walker.offset() * 8,
            walker,
        }
    }

    /// The current position in bits, from the start of the buffer.
    pub fn bit_offset(&self) -> usize {
        self.bit_pos
    }

    /// The position of the cursor within the current byte (0..8).
    pub fn phase(&self) -> u8 {
        (self.bit_pos % 8) as u8
    }

    pub fn remaining_bits(&self) -> usize {
        self.walker.window_end() * 8 - self.bit_pos
    }

    pub fn has_data(&self) -> bool {
        self.remaining_bits() > 0
    }

    /// Return to byte-level reading at the current position.
    ///
    /// Fails if the cursor is not on a byte boundary.
    pub fn into_walker(self) -> Result<Walker<'a>, ReadError> {
        if self.phase() != 0 {
            return Err(ReadError::Misaligned {
                position: self.bit_pos,
                multiple: 8,
            });
        }
        let mut walker = self.walker;
        walker.set_offset(self.bit_pos / 8, Anchor::BufferStart)?;
        Ok(walker)
    }

    /// Skip to the next byte boundary and return to byte-level reading.
    pub fn into_walker_aligned(mut self) -> Result<Walker<'a>, ReadError> {
        self.align_bits(8)?;
        self.into_walker()
    }

    fn check_bits(&self, op: &'static str, needed: usize) -> Result<(), ReadError> {
        if needed > self.remaining_bits() {
            return Err(ReadError::OutOfBounds {
                op,
                position: self.bit_pos,
                needed,
                available: self.remaining_bits(),
            });
        }
        Ok(())
    }

    fn check_width(width: u32) -> Result<(), ReadError> {
        if !(1..=32).contains(&width) {
            return Err(ReadError::InvalidBitWidth(width));
        }
        Ok(())
    }

    fn total_bits(&self, op: &'static str, width: usize, count: usize) -> Result<usize, ReadError> {
        let total = width.checked_mul(count).ok_or(ReadError::OutOfBounds {
            op,
            position: self.bit_pos,
            needed: usize::MAX,
            available: self.remaining_bits(),
        })?;
        self.check_bits(op, total)?;
        Ok(total)
    }

    // caller has checked bounds and width
    fn take_bits(&mut self, width: u32) -> u32 {
        let data = self.walker.buffer();
        let mut acc = 0u64;
        let mut left = width;
        while left > 0 {
            let byte = data[self.bit_pos / 8] as u32;
            let avail = 8 - (self.bit_pos % 8) as u32;
            let take = avail.min(left);
            let bits = (byte >> (avail - take)) & ((1 << take) - 1);
            acc = (acc << take) | bits as u64;
            self.bit_pos += take as usize;
            left -= take;
        }
        acc as u32
    }

    fn sign_extend(value: u32, width: u32) -> i32 {
        let shift = 32 - width;
        ((value << shift) as i32) >> shift
    }

    // caller has checked bounds
    fn take_bytes(&mut self, len: usize) -> Vec<u8> {
        (0..len).map(|_| self.take_bits(8) as u8).collect()
    }

    /// Read an unsigned field of `width` bits (1 to 32).
    pub fn read_bits(&mut self, width: u32) -> Result<u32, ReadError> {
        Self::check_width(width)?;
        self.check_bits("read_bits", width as usize)?;
        Ok(self.take_bits(width))
    }

    /// Read a two's complement field of `width` bits (1 to 32).
    pub fn read_signed_bits(&mut self, width: u32) -> Result<i32, ReadError> {
        let value = self.read_bits(width)?;
        Ok(Self::sign_extend(value, width))
    }

    /// Read `count` unsigned fields of `width` bits, with a single bounds check.
    pub fn unpack_bits(&mut self, width: u32, count: usize) -> Result<Vec<u32>, ReadError> {
        Self::check_width(width)?;
        self.total_bits("unpack_bits", width as usize, count)?;
        Ok((0..count).map(|_| self.take_bits(width)).collect())
    }

    /// Read `count` two's complement fields of `width` bits.
    pub fn unpack_signed_bits(&mut self, width: u32, count: usize) -> Result<Vec<i32>, ReadError> {
        Ok(self
            .unpack_bits(width, count)?
            .into_iter()
            .map(|value| Self::sign_extend(value, width))
            .collect())
    }

    /// Decode one record of `format` starting at the current bit.
    pub fn unpack(&mut self, format: &Format) -> Result<Record, ReadError> {
        self.check_bits("unpack", format.byte_len() * 8)?;
        let mut probe = *self;
        let bytes = probe.take_bytes(format.byte_len());
        let record = font_types::format::decode(format, &bytes)?;
        *self = probe;
        Ok(record)
    }

    /// Decode `count` records of `format`, with a single bounds check.
    pub fn group(&mut self, format: &Format, count: usize) -> Result<Vec<Record>, ReadError> {
        let total = self.total_bits("group", format.byte_len() * 8, count)?;
        let mut probe = *self;
        let bytes = probe.take_bytes(total / 8);
        let records = decode_group(format, &bytes, count)?;
        *self = probe;
        Ok(records)
    }

    /// Read `bit_len` bits as bytes, left-justified in the final byte.
    pub fn chunk_bits(&mut self, bit_len: usize) -> Result<Vec<u8>, ReadError> {
        self.check_bits("chunk_bits", bit_len)?;
        let mut bytes = self.take_bytes(bit_len / 8);
        let tail = (bit_len % 8) as u32;
        if tail != 0 {
            bytes.push((self.take_bits(tail) << (8 - tail)) as u8);
        }
        Ok(bytes)
    }

    pub fn skip_bits(&mut self, bit_len: usize) -> Result<(), ReadError> {
        self.check_bits("skip_bits", bit_len)?;
        self.bit_pos += bit_len;
        Ok(())
    }

    /// Advance to the next multiple of `multiple` bits from the buffer start.
    pub fn align_bits(&mut self, multiple: usize) -> Result<(), ReadError> {
        if multiple <= 1 {
            return Ok(());
        }
        let padding = (multiple - self.bit_pos % multiple) % multiple;
        self.skip_bits(padding)
    }

    pub fn read_bits_validated(
        &mut self,
        width: u32,
        sink: &mut dyn DiagnosticSink,
    ) -> Option<u32> {
        self.read_bits(width).or_report(sink)
    }

    pub fn unpack_bits_validated(
        &mut self,
        width: u32,
        count: usize,
        sink: &mut dyn DiagnosticSink,
    ) -> Option<Vec<u32>> {
        self.unpack_bits(width, count).or_report(sink)
    }

    pub fn unpack_signed_bits_validated(
        &mut self,
        width: u32,
        count: usize,
        sink: &mut dyn DiagnosticSink,
    ) -> Option<Vec<i32>> {
        self.unpack_signed_bits(width, count).or_report(sink)
    }

    pub fn unpack_validated(
        &mut self,
        format: &Format,
        sink: &mut dyn DiagnosticSink,
    ) -> Option<Record> {
        self.unpack(format).or_report(sink)
    }

    pub fn group_validated(
        &mut self,
        format: &Format,
        count: usize,
        sink: &mut dyn DiagnosticSink,
    ) -> Option<Vec<Record>> {
        self.group(format, count).or_report(sink)
    }

    pub fn chunk_bits_validated(
        &mut self,
        bit_len: usize,
        sink: &mut dyn DiagnosticSink,
    ) -> Option<Vec<u8>> {
        self.chunk_bits(bit_len).or_report(sink)
    }
}
