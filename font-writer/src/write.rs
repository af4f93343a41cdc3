use std::collections::{HashMap, HashSet};
use std::ops::{Bound, RangeBounds};

use font_types::{format::encode_into, DiagnosticSink, Format, Scalar, ScalarKind, Value};

use crate::bits::{self, BitPacker};
use crate::offsets::{OffsetLink, OffsetOptions};
use crate::{Deferred, IndexTag, Stake, WriteError};

/// Variable-width offsets get this many passes to settle on their sizes.
const MAX_RESIZE_PASSES: usize = 64;

/// A builder for binary data that refers to itself.
///
/// Content is appended in order. Anything that cannot be known yet (the
/// distance to a subtable that has not been written, a count that is only
/// known after the items are written, an index assigned by some other
/// table) is recorded symbolically and resolved by [`finalize`].
///
/// Positions are tracked in bits, so bit fields, byte data and offsets
/// may be freely interleaved; offsets themselves must always resolve to
/// whole bytes.
///
/// [`finalize`]: LinkedWriter::finalize
#[derive(Debug, Default)]
pub struct LinkedWriter {
    chunks: Vec<Chunk>,
    /// Each stake made by this writer, and the index of the chunk it marks.
    ///
    /// A stake bound at `chunks.len()` marks whatever is written next (or
    /// the end of the output, if nothing is).
    stakes: HashMap<Stake, Option<usize>>,
    /// Literal bytes may only be merged into chunks at or after this index.
    fence: usize,
    /// Length in bits, not counting variable-width offsets.
    bit_len: usize,
    allow_negative: bool,
    index_maps: HashMap<IndexTag, HashMap<u32, u32>>,
}

#[derive(Debug)]
enum Chunk {
    Bytes(Vec<u8>),
    /// The top `bit_len` bits of `bytes`
    Bits {
        bytes: Vec<u8>,
        bit_len: usize,
    },
    Deferred {
        width: usize,
        bytes: Option<Vec<u8>>,
    },
    Replaceable(Vec<u8>),
    Offset(OffsetLink),
    VariableOffset {
        base: Stake,
        target: Stake,
        encoder: Encoder,
    },
    Index {
        kind: ScalarKind,
        tag: IndexTag,
        key: u32,
    },
}

struct Encoder(Box<dyn Fn(i64) -> Vec<u8>>);

impl std::fmt::Debug for Encoder {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("Encoder")
    }
}

impl Chunk {
    /// The size of this chunk; variable-width offsets report zero.
    fn fixed_bit_len(&self) -> usize {
        match self {
            Chunk::Bytes(bytes) | Chunk::Replaceable(bytes) => bytes.len() * 8,
            Chunk::Bits { bit_len, .. } => *bit_len,
            Chunk::Deferred { width, .. } => width * 8,
            Chunk::Offset(link) => link.bit_len(),
            Chunk::VariableOffset { .. } => 0,
            Chunk::Index { kind, .. } => kind.byte_len() * 8,
        }
    }
}

impl LinkedWriter {
    pub fn new() -> Self {
        Self::default()
    }

    /// The current length, in bits.
    ///
    /// Variable-width offsets have no size until the writer is finalized,
    /// and are not counted.
    pub fn bit_len(&self) -> usize {
        self.bit_len
    }

    /// The current length in bytes, counting a partial final byte.
    pub fn byte_len(&self) -> usize {
        bits::byte_len_for_bits(self.bit_len)
    }

    pub fn is_empty(&self) -> bool {
        self.chunks.is_empty()
    }

    /// Discard everything, returning the writer to its initial state.
    ///
    /// Stakes created before the reset are not recognized afterwards.
    pub fn reset(&mut self) {
        *self = LinkedWriter::default();
    }

    /// Allow offsets to resolve to negative values, unless an offset's own
    /// [`OffsetOptions`] say otherwise.
    pub fn allow_negative_offsets(&mut self) {
        self.allow_negative = true;
    }

    fn push_chunk(&mut self, chunk: Chunk) {
        self.bit_len += chunk.fixed_bit_len();
        self.chunks.push(chunk);
    }

    fn push_literal(&mut self, bytes: &[u8]) {
        if self.chunks.len() > self.fence {
            if let Some(Chunk::Bytes(last)) = self.chunks.last_mut() {
                last.extend_from_slice(bytes);
                self.bit_len += bytes.len() * 8;
                return;
            }
        }
        self.push_chunk(Chunk::Bytes(bytes.to_vec()));
    }

    /// Write a scalar value.
    pub fn add<T: Scalar>(&mut self, value: T) {
        self.push_literal(value.to_raw().as_ref())
    }

    pub fn add_array<T: Scalar>(&mut self, values: &[T]) {
        for value in values {
            self.add(*value);
        }
    }

    /// Write raw bytes.
    ///
    /// The caller is responsible for ensuring bytes are in big-endian order.
    pub fn add_raw(&mut self, bytes: &[u8]) {
        self.push_literal(bytes)
    }

    /// Write one record of `format`.
    ///
    /// Nothing is written if any value is out of range.
    pub fn add_bytes(&mut self, format: &Format, values: &[Value]) -> Result<(), WriteError> {
        let mut buf = Vec::with_capacity(format.byte_len());
        encode_into(format, values, &mut buf)?;
        self.push_literal(&buf);
        Ok(())
    }

    /// Write each of `records` with `format`, back to back.
    ///
    /// Nothing is written unless every record can be encoded.
    pub fn add_group<R: AsRef<[Value]>>(
        &mut self,
        format: &Format,
        records: impl IntoIterator<Item = R>,
    ) -> Result<(), WriteError> {
        let mut buf = Vec::new();
        for record in records {
            encode_into(format, record.as_ref(), &mut buf)?;
        }
        self.push_literal(&buf);
        Ok(())
    }

    /// Write a length byte followed by `bytes`.
    pub fn add_pascal_string(&mut self, bytes: &[u8]) -> Result<(), WriteError> {
        let len = u8::try_from(bytes.len()).map_err(|_| font_types::FormatError::OutOfRange {
            kind: ScalarKind::U8,
            value: bytes.len() as i64,
        })?;
        self.add(len);
        self.add_raw(bytes);
        Ok(())
    }

    /// Write the top `bit_count` bits of `bytes`.
    ///
    /// If `bytes` holds fewer than `bit_count` bits, the rest are zero.
    pub fn add_bits(&mut self, bytes: &[u8], bit_count: usize) {
        let bytes = bits::high_bits(bytes, bit_count);
        if bit_count % 8 == 0 {
            self.push_literal(&bytes);
        } else {
            self.push_chunk(Chunk::Bits {
                bytes,
                bit_len: bit_count,
            });
        }
    }

    /// Write the low `width` bits of `value`.
    ///
    /// Negative values are written in two's complement; it is an error if
    /// `value` has significant bits that do not fit.
    pub fn add_bits_from_number(&mut self, value: i64, width: u32) -> Result<(), WriteError> {
        let bytes = bits::bits_from_number(value, width)?;
        self.add_bits(&bytes, width as usize);
        Ok(())
    }

    /// Write each value in a `width`-bit field.
    ///
    /// Nothing is written unless every value fits.
    pub fn add_bits_group(
        &mut self,
        values: &[i64],
        width: u32,
        signed: bool,
    ) -> Result<(), WriteError> {
        bits::check_width(width)?;
        let (min, max) = if signed {
            (-(1i128 << (width - 1)), (1i128 << (width - 1)) - 1)
        } else {
            (0, (1i128 << width) - 1)
        };
        let total_bits = values.len() * width as usize;
        let mut packer = BitPacker::with_capacity(bits::byte_len_for_bits(total_bits));
        for &value in values {
            if !(min..=max).contains(&(value as i128)) {
                return Err(WriteError::BitsOverflow { value, width });
            }
            packer.push(&bits::low_bits(value, width), width as usize);
        }
        let bit_len = packer.bit_len();
        self.add_bits(&packer.into_bytes(), bit_len);
        Ok(())
    }

    /// Pad with zero bits up to a multiple of `multiple` bits.
    pub fn align_to_bits(&mut self, multiple: usize) {
        let multiple = multiple.max(1);
        let pad = (multiple - self.bit_len % multiple) % multiple;
        if pad != 0 {
            self.add_bits(&[], pad);
        }
    }

    /// Pad with zero bits up to a multiple of `multiple` bytes.
    pub fn align_to_bytes(&mut self, multiple: usize) {
        self.align_to_bits(multiple.max(1) * 8)
    }

    /// Create a new, unbound stake.
    pub fn new_stake(&mut self) -> Stake {
        let stake = Stake::next();
        self.stakes.insert(stake, None);
        stake
    }

    /// Create a stake bound to the current position.
    pub fn stake_current(&mut self) -> Stake {
        let stake = self.new_stake();
        self.bind(stake);
        stake
    }

    /// Bind `stake` to the current position.
    pub fn bind_stake(&mut self, stake: Stake) -> Result<(), WriteError> {
        match self.stakes.get(&stake) {
            None => Err(WriteError::UnknownStake(stake)),
            Some(Some(_)) => Err(WriteError::StakeAlreadyBound(stake)),
            Some(None) => {
                self.bind(stake);
                Ok(())
            }
        }
    }

    fn bind(&mut self, stake: Stake) {
        self.stakes.insert(stake, Some(self.chunks.len()));
        self.fence = self.chunks.len();
    }

    pub fn is_bound(&self, stake: Stake) -> bool {
        matches!(self.stakes.get(&stake), Some(Some(_)))
    }

    fn check_known(&self, stake: Stake) -> Result<(), WriteError> {
        if self.stakes.contains_key(&stake) {
            Ok(())
        } else {
            Err(WriteError::UnknownStake(stake))
        }
    }

    /// Reserve a slot for a value of `kind`, to be filled in with
    /// [`set_deferred`](Self::set_deferred) before finalizing.
    pub fn add_deferred(&mut self, kind: ScalarKind) -> Result<Deferred, WriteError> {
        if !kind.has_value() {
            return Err(WriteError::UnsuitableKind(kind));
        }
        let stake = self.stake_current();
        self.push_chunk(Chunk::Deferred {
            width: kind.byte_len(),
            bytes: None,
        });
        Ok(Deferred { stake })
    }

    /// Fill in a slot reserved with [`add_deferred`](Self::add_deferred).
    ///
    /// `kind` may differ from the kind the slot was reserved with (to write
    /// a signed value into a slot reserved as unsigned, for instance) but
    /// must have the same width.
    pub fn set_deferred(
        &mut self,
        handle: Deferred,
        kind: ScalarKind,
        value: impl Into<Value>,
    ) -> Result<(), WriteError> {
        let idx = match self.stakes.get(&handle.stake) {
            Some(Some(idx)) => *idx,
            _ => return Err(WriteError::UnknownDeferred),
        };
        match self.chunks.get_mut(idx) {
            Some(Chunk::Deferred { width, bytes }) => {
                if kind.byte_len() != *width {
                    return Err(WriteError::DeferredWidthMismatch {
                        expected: *width,
                        found: kind.byte_len(),
                    });
                }
                let mut encoded = Vec::with_capacity(*width);
                kind.encode(value.into(), &mut encoded)?;
                *bytes = Some(encoded);
                Ok(())
            }
            _ => Err(WriteError::UnknownDeferred),
        }
    }

    /// Bind `stake` here and write `bytes`, which may later be replaced with
    /// [`set_replaceable`](Self::set_replaceable).
    pub fn add_replaceable(&mut self, stake: Stake, bytes: &[u8]) -> Result<(), WriteError> {
        self.bind_stake(stake)?;
        self.push_chunk(Chunk::Replaceable(bytes.to_vec()));
        Ok(())
    }

    /// Replace the bytes written by [`add_replaceable`](Self::add_replaceable).
    ///
    /// The new bytes may have a different length; everything after them
    /// moves, and offsets are resolved against the new positions.
    pub fn set_replaceable(&mut self, stake: Stake, bytes: &[u8]) -> Result<(), WriteError> {
        let chunk = match self.stakes.get(&stake) {
            Some(Some(idx)) => self.chunks.get_mut(*idx),
            _ => None,
        };
        match chunk {
            Some(Chunk::Replaceable(old)) => {
                self.bit_len = self.bit_len - old.len() * 8 + bytes.len() * 8;
                *old = bytes.to_vec();
                Ok(())
            }
            _ => Err(WriteError::NotReplaceable(stake)),
        }
    }

    /// Write a field of `kind` holding the byte distance from `base` to
    /// `target`, resolved when the writer is finalized.
    pub fn add_offset(
        &mut self,
        kind: ScalarKind,
        base: Stake,
        target: Stake,
    ) -> Result<(), WriteError> {
        self.add_offset_with(kind, base, target, OffsetOptions::default())
    }

    /// Write an offset field with the given adjustments.
    pub fn add_offset_with(
        &mut self,
        kind: ScalarKind,
        base: Stake,
        target: Stake,
        options: OffsetOptions,
    ) -> Result<(), WriteError> {
        self.check_known(base)?;
        self.check_known(target)?;
        let link = OffsetLink::new(kind, base, target, options)?;
        self.push_chunk(Chunk::Offset(link));
        Ok(())
    }

    /// Write an offset whose encoding is chosen by `encoder`.
    ///
    /// `encoder` is called with the resolved distance in bytes and may
    /// return bytes of any length. Because its length can move other
    /// content, finalizing repeats until every such offset has a stable
    /// size.
    pub fn add_variable_offset(
        &mut self,
        base: Stake,
        target: Stake,
        encoder: impl Fn(i64) -> Vec<u8> + 'static,
    ) -> Result<(), WriteError> {
        self.check_known(base)?;
        self.check_known(target)?;
        self.push_chunk(Chunk::VariableOffset {
            base,
            target,
            encoder: Encoder(Box::new(encoder)),
        });
        Ok(())
    }

    /// Create a tag for a family of indices that will be resolved by one map.
    pub fn new_index_tag(&mut self) -> IndexTag {
        IndexTag::next()
    }

    /// Write a field of `kind` holding the value `key` maps to in the index
    /// map for `tag`, which may be added at any time before finalizing.
    pub fn add_index(
        &mut self,
        kind: ScalarKind,
        tag: IndexTag,
        key: u32,
    ) -> Result<(), WriteError> {
        if kind.int_bounds().is_none() {
            return Err(WriteError::UnsuitableKind(kind));
        }
        self.push_chunk(Chunk::Index { kind, tag, key });
        Ok(())
    }

    pub fn add_index_map(
        &mut self,
        tag: IndexTag,
        map: impl IntoIterator<Item = (u32, u32)>,
    ) -> Result<(), WriteError> {
        if self.index_maps.contains_key(&tag) {
            return Err(WriteError::DuplicateIndexMap(tag));
        }
        self.index_maps.insert(tag, map.into_iter().collect());
        Ok(())
    }

    pub fn remove_index_map(&mut self, tag: IndexTag) -> Option<HashMap<u32, u32>> {
        self.index_maps.remove(&tag)
    }

    /// Resolve everything and return the bytes.
    ///
    /// This does not consume or modify the writer; more content can be added
    /// and the writer finalized again.
    pub fn finalize(&self) -> Result<Vec<u8>, WriteError> {
        log::trace!(
            "finalizing {} chunks, {} stakes, {} bits",
            self.chunks.len(),
            self.stakes.len(),
            self.bit_len
        );
        self.resolve(false).map(BitPacker::into_bytes)
    }

    /// Finalize, reporting any failure to `sink` as a critical diagnostic.
    pub fn finalize_validated(&self, sink: &mut dyn DiagnosticSink) -> Option<Vec<u8>> {
        match self.finalize() {
            Ok(bytes) => Some(bytes),
            Err(e) => {
                sink.report(e.to_diagnostic());
                None
            }
        }
    }

    /// The OpenType checksum of a byte range of the output.
    ///
    /// Offsets to stakes that are not bound yet, and deferred values that
    /// are not set yet, are treated as zero; the range being summed may
    /// well be complete while the rest of the writer is not.
    pub fn checksum(&self, range: impl RangeBounds<usize>) -> Result<u32, WriteError> {
        let bytes = self.resolve(true)?.into_bytes();
        let start = match range.start_bound() {
            Bound::Included(start) => *start,
            Bound::Excluded(start) => start.saturating_add(1),
            Bound::Unbounded => 0,
        };
        let end = match range.end_bound() {
            Bound::Included(end) => end.saturating_add(1),
            Bound::Excluded(end) => *end,
            Bound::Unbounded => bytes.len(),
        }
        .min(bytes.len());
        Ok(compute_checksum(bytes.get(start.min(end)..end).unwrap_or_default()))
    }

    fn resolve(&self, lenient: bool) -> Result<BitPacker, WriteError> {
        let variable = self.resolve_variable_offsets(lenient)?;
        let starts = self.chunk_starts(&variable);
        let total = starts.last().copied().unwrap_or_default();
        let mut packer = BitPacker::with_capacity(bits::byte_len_for_bits(total));

        for (idx, chunk) in self.chunks.iter().enumerate() {
            match chunk {
                Chunk::Bytes(bytes) | Chunk::Replaceable(bytes) => {
                    packer.push(bytes, bytes.len() * 8)
                }
                Chunk::Bits { bytes, bit_len } => packer.push(bytes, *bit_len),
                Chunk::Deferred { width, bytes } => match bytes {
                    Some(bytes) => packer.push(bytes, width * 8),
                    None if lenient => packer.push(&vec![0; *width], width * 8),
                    None => {
                        return Err(WriteError::UnsetDeferredValue {
                            position: starts[idx] / 8,
                        })
                    }
                },
                Chunk::Offset(link) => {
                    let value =
                        self.link_value(link.base, link.target, &link.options, &starts, lenient)?;
                    let bytes = match value {
                        Some(value) => link.encode(value)?,
                        None => vec![0; bits::byte_len_for_bits(link.bit_len())],
                    };
                    packer.push(&bytes, link.bit_len());
                }
                Chunk::VariableOffset { .. } => {
                    if let Some(bytes) = variable.get(&idx) {
                        packer.push(bytes, bytes.len() * 8);
                    }
                }
                Chunk::Index { kind, tag, key } => {
                    let index = self
                        .index_maps
                        .get(tag)
                        .ok_or(WriteError::MissingIndexMap(*tag))?
                        .get(key)
                        .ok_or(WriteError::MissingIndexKey {
                            tag: *tag,
                            key: *key,
                        })?;
                    let mut bytes = Vec::with_capacity(kind.byte_len());
                    kind.encode(Value::from(*index), &mut bytes)?;
                    packer.push(&bytes, bytes.len() * 8);
                }
            }
        }
        debug_assert_eq!(packer.bit_len(), total);
        Ok(packer)
    }

    /// The bit position of each chunk, followed by the total length.
    fn chunk_starts(&self, variable: &HashMap<usize, Vec<u8>>) -> Vec<usize> {
        let mut starts = Vec::with_capacity(self.chunks.len() + 1);
        let mut pos = 0;
        for (idx, chunk) in self.chunks.iter().enumerate() {
            starts.push(pos);
            pos += match variable.get(&idx) {
                Some(bytes) => bytes.len() * 8,
                None => chunk.fixed_bit_len(),
            };
        }
        starts.push(pos);
        starts
    }

    fn stake_start(&self, stake: Stake, starts: &[usize]) -> Result<usize, WriteError> {
        match self.stakes.get(&stake) {
            Some(Some(idx)) => starts.get(*idx).copied().ok_or(WriteError::UnboundStake(stake)),
            Some(None) => Err(WriteError::UnboundStake(stake)),
            None => Err(WriteError::UnknownStake(stake)),
        }
    }

    /// The resolved value of an offset, or `None` if leniently skipped.
    fn link_value(
        &self,
        base: Stake,
        target: Stake,
        options: &OffsetOptions,
        starts: &[usize],
        lenient: bool,
    ) -> Result<Option<i64>, WriteError> {
        let (base, target) = match (
            self.stake_start(base, starts),
            self.stake_start(target, starts),
        ) {
            (Ok(base), Ok(target)) => (base, target),
            (Err(WriteError::UnboundStake(_)), _) | (_, Err(WriteError::UnboundStake(_)))
                if lenient =>
            {
                return Ok(None)
            }
            (Err(e), _) | (_, Err(e)) => return Err(e),
        };
        options
            .resolve(target as i64 - base as i64, self.allow_negative)
            .map(Some)
    }

    /// Encode every variable-width offset, repeating until their sizes
    /// stop changing.
    fn resolve_variable_offsets(
        &self,
        lenient: bool,
    ) -> Result<HashMap<usize, Vec<u8>>, WriteError> {
        let variable: Vec<_> = self
            .chunks
            .iter()
            .enumerate()
            .filter_map(|(idx, chunk)| match chunk {
                Chunk::VariableOffset {
                    base,
                    target,
                    encoder,
                } => Some((idx, *base, *target, encoder)),
                _ => None,
            })
            .collect();
        let mut encoded = HashMap::new();
        if variable.is_empty() {
            return Ok(encoded);
        }

        let options = OffsetOptions::default();
        let mut seen = HashSet::new();
        for pass in 0..MAX_RESIZE_PASSES {
            let sizes: Vec<_> = variable
                .iter()
                .map(|(idx, ..)| encoded.get(idx).map_or(0, Vec::len))
                .collect();
            if !seen.insert(sizes.clone()) {
                return Err(WriteError::ResizeLoop { iterations: pass });
            }
            let starts = self.chunk_starts(&encoded);
            let mut next = HashMap::with_capacity(variable.len());
            for (idx, base, target, encoder) in &variable {
                let value = self.link_value(*base, *target, &options, &starts, lenient)?;
                if let Some(value) = value {
                    next.insert(*idx, (encoder.0)(value));
                }
            }
            let next_sizes: Vec<_> = variable
                .iter()
                .map(|(idx, ..)| next.get(idx).map_or(0, Vec::len))
                .collect();
            encoded = next;
            if next_sizes == sizes {
                log::debug!(
                    "{} variable offsets settled after {} passes",
                    variable.len(),
                    pass + 1
                );
                return Ok(encoded);
            }
        }
        Err(WriteError::ResizeLoop {
            iterations: MAX_RESIZE_PASSES,
        })
    }
}

/// The OpenType table checksum: the sum of big-endian `u32`s, with the
/// final partial word zero-padded.
pub fn compute_checksum(data: &[u8]) -> u32 {
    data.chunks(4).fold(0u32, |sum, word| {
        let mut padded = [0u8; 4];
        padded[..word.len()].copy_from_slice(word);
        sum.wrapping_add(u32::from_be_bytes(padded))
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use font_types::Fixed;
    use pretty_assertions::assert_eq;

    #[test]
    fn literals_merge() {
        let mut writer = LinkedWriter::new();
        writer.add(5u16);
        writer.add_raw(b"Hi there!");
        assert_eq!(writer.chunks.len(), 1);
        assert_eq!(writer.byte_len(), 11);
        assert_eq!(
            writer.finalize().unwrap(),
            [0x00, 0x05, b'H', b'i', b' ', b't', b'h', b'e', b'r', b'e', b'!']
        );
    }

    #[test]
    fn literals_do_not_merge_across_stakes() {
        let mut writer = LinkedWriter::new();
        writer.add(1u8);
        let stake = writer.stake_current();
        writer.add(2u8);
        writer.add(3u8);
        assert_eq!(writer.chunks.len(), 2);
        assert_eq!(writer.stakes[&stake], Some(1));
    }

    #[test]
    fn finalize_is_repeatable() {
        let mut writer = LinkedWriter::new();
        writer.add(5u16);
        assert_eq!(writer.finalize().unwrap(), [0, 5]);
        writer.add_raw(b"ab");
        assert_eq!(writer.finalize().unwrap(), [0, 5, b'a', b'b']);
    }

    #[test]
    fn bytes_with_format() {
        let mut writer = LinkedWriter::new();
        let format: Format = "LH".parse().unwrap();
        writer
            .add_bytes(&format, &[Value::from(1u32), Value::from(2u16)])
            .unwrap();
        assert_eq!(writer.byte_len(), 6);
        writer.add_bits(&[0xff, 0xff], 10);
        assert_eq!(writer.bit_len(), 58);
        assert_eq!(writer.byte_len(), 8);

        // a failed record writes nothing
        let before = writer.bit_len();
        let err = writer.add_bytes(&format, &[Value::from(-1), Value::from(2u16)]);
        assert!(matches!(err, Err(WriteError::Format(_))));
        assert_eq!(writer.bit_len(), before);
    }

    #[test]
    fn group_is_atomic() {
        let mut writer = LinkedWriter::new();
        let format = Format::single(ScalarKind::U8);
        let good = [[Value::from(65u8)], [Value::from(66u8)]];
        writer.add_group(&format, good).unwrap();
        let bad = [[Value::from(67u8)], [Value::from(300)]];
        assert!(writer.add_group(&format, bad).is_err());
        assert_eq!(writer.finalize().unwrap(), b"AB");

        let pairs: Format = "BB".parse().unwrap();
        writer.reset();
        writer
            .add_group(
                &pairs,
                vec![
                    vec![Value::from(65u8), Value::from(66u8)],
                    vec![Value::from(67u8), Value::from(68u8)],
                ],
            )
            .unwrap();
        assert_eq!(writer.finalize().unwrap(), b"ABCD");
    }

    #[test]
    fn pascal_string() {
        let mut writer = LinkedWriter::new();
        writer.add_pascal_string(b"abc").unwrap();
        assert_eq!(writer.finalize().unwrap(), [3, b'a', b'b', b'c']);
        assert!(writer.add_pascal_string(&[0; 256]).is_err());
    }

    #[test]
    fn bits() {
        let mut writer = LinkedWriter::new();
        writer.add_bits(&[0xff, 0xff], 9);
        assert_eq!(writer.finalize().unwrap(), [0xff, 0x80]);
        writer.add_bits(&[0x55], 6);
        assert_eq!(writer.finalize().unwrap(), [0xff, 0xaa]);
    }

    #[test]
    fn bits_from_numbers() {
        let mut writer = LinkedWriter::new();
        writer.add_bits_from_number(-5, 4).unwrap();
        writer.add_bits_from_number(5, 4).unwrap();
        writer.add_bits_from_number(3, 8).unwrap();
        assert_eq!(writer.finalize().unwrap(), [0xb5, 0x03]);
        assert_eq!(
            writer.add_bits_from_number(15, 3),
            Err(WriteError::BitsOverflow {
                value: 15,
                width: 3
            })
        );
    }

    #[test]
    fn bits_groups() {
        let values = [4, 12, 2, 9, 10, 5, 5];
        let mut writer = LinkedWriter::new();
        writer.add_bits_group(&values, 4, false).unwrap();
        assert_eq!(writer.finalize().unwrap(), [0x4c, 0x29, 0xa5, 0x50]);

        writer.reset();
        writer.add_bits_group(&values, 5, false).unwrap();
        assert_eq!(writer.finalize().unwrap(), [0x23, 0x04, 0x95, 0x14, 0xa0]);

        let signed = [-4, -3, -2, -1, 0, 1, 2, 3];
        writer.reset();
        writer.add_bits_group(&signed, 3, true).unwrap();
        assert_eq!(writer.finalize().unwrap(), [0x97, 0x70, 0x53]);

        writer.reset();
        assert_eq!(
            writer.add_bits_group(&signed, 3, false),
            Err(WriteError::BitsOverflow {
                value: -4,
                width: 3
            })
        );
        assert!(writer.is_empty());
    }

    #[test]
    fn alignment() {
        let mut writer = LinkedWriter::new();
        writer.add_bits(&[0x80], 1);
        writer.align_to_bytes(1);
        assert_eq!(writer.bit_len(), 8);
        writer.add(1u8);
        writer.align_to_bytes(4);
        assert_eq!(writer.finalize().unwrap(), [0x80, 0x01, 0x00, 0x00]);
        writer.align_to_bits(3);
        assert_eq!(writer.bit_len(), 33);
        writer.align_to_bytes(4);
        assert_eq!(writer.byte_len(), 8);
    }

    #[test]
    fn deferred_values() {
        let mut writer = LinkedWriter::new();
        writer.add_raw(b"ab");
        let count = writer.add_deferred(ScalarKind::U16).unwrap();
        writer.add_raw(b"yz");
        assert_eq!(
            writer.finalize(),
            Err(WriteError::UnsetDeferredValue { position: 2 })
        );
        writer.set_deferred(count, ScalarKind::I16, -1).unwrap();
        assert_eq!(writer.finalize().unwrap(), *b"ab\xff\xffyz");
        assert_eq!(
            writer.set_deferred(count, ScalarKind::U32, 1u32),
            Err(WriteError::DeferredWidthMismatch {
                expected: 2,
                found: 4
            })
        );
        assert!(matches!(
            writer.set_deferred(count, ScalarKind::U16, 70000),
            Err(WriteError::Format(_))
        ));
        writer
            .set_deferred(count, ScalarKind::U16, 0x1234u16)
            .unwrap();
        assert_eq!(writer.finalize().unwrap(), *b"ab\x12\x34yz");
        assert_eq!(
            writer.add_deferred(ScalarKind::Pad),
            Err(WriteError::UnsuitableKind(ScalarKind::Pad))
        );
    }

    #[test]
    fn deferred_fixed() {
        let mut writer = LinkedWriter::new();
        let slot = writer.add_deferred(ScalarKind::Fixed).unwrap();
        writer
            .set_deferred(slot, ScalarKind::Fixed, Fixed::from_f64(1.5))
            .unwrap();
        assert_eq!(writer.finalize().unwrap(), [0x00, 0x01, 0x80, 0x00]);
    }

    #[test]
    fn deferred_from_another_writer() {
        let mut other = LinkedWriter::new();
        let slot = other.add_deferred(ScalarKind::U8).unwrap();
        let mut writer = LinkedWriter::new();
        assert_eq!(
            writer.set_deferred(slot, ScalarKind::U8, 1u8),
            Err(WriteError::UnknownDeferred)
        );
    }

    #[test]
    fn replaceable_reflows_offsets() {
        let mut writer = LinkedWriter::new();
        let from = writer.stake_current();
        let to = writer.new_stake();
        writer.add_offset(ScalarKind::U16, from, to).unwrap();
        let name = writer.new_stake();
        writer.add_replaceable(name, b"Fred").unwrap();
        writer.bind_stake(to).unwrap();
        writer.add(255u16);
        assert_eq!(writer.finalize().unwrap(), *b"\x00\x06Fred\x00\xff");

        writer.set_replaceable(name, b"Charlie").unwrap();
        assert_eq!(writer.byte_len(), 11);
        assert_eq!(writer.finalize().unwrap(), *b"\x00\x09Charlie\x00\xff");
        assert_eq!(
            writer.set_replaceable(from, b"x"),
            Err(WriteError::NotReplaceable(from))
        );
    }

    #[test]
    fn offset_deltas() {
        let mut writer = LinkedWriter::new();
        writer.add(-1i16);
        let start = writer.stake_current();
        let end = writer.new_stake();
        writer.add_offset(ScalarKind::U16, start, end).unwrap();
        writer.add(-2i16);
        writer
            .add_offset_with(
                ScalarKind::U16,
                start,
                end,
                OffsetOptions::new().byte_delta(10),
            )
            .unwrap();
        writer.add(-3i16);
        writer.bind_stake(end).unwrap();
        writer.add_raw(b"Hi there");
        let mut expected = vec![0xff, 0xff, 0x00, 0x08, 0xff, 0xfe, 0x00, 0x12, 0xff, 0xfd];
        expected.extend_from_slice(b"Hi there");
        assert_eq!(writer.finalize().unwrap(), expected);
    }

    #[test]
    fn offset_in_bit_field() {
        let mut writer = LinkedWriter::new();
        writer.add(-1i16);
        let start = writer.stake_current();
        let end = writer.new_stake();
        writer.add_bits(&[0xc0], 2);
        writer
            .add_offset_with(ScalarKind::U16, start, end, OffsetOptions::new().bit_len(14))
            .unwrap();
        writer.add(-2i16);
        writer.bind_stake(end).unwrap();
        writer.add(-3i16);
        assert_eq!(
            writer.finalize().unwrap(),
            [0xff, 0xff, 0xc0, 0x04, 0xff, 0xfe, 0xff, 0xfd]
        );
    }

    #[test]
    fn negative_word_offsets() {
        let mut writer = LinkedWriter::new();
        let ten: Vec<u16> = (1..=10).collect();
        writer.add(0xabcdu16);
        let start = writer.stake_current();
        writer.add_array(&ten);
        let end = writer.new_stake();
        let options = OffsetOptions::new()
            .negative_ok(true)
            .divisor(2)
            .multiple_delta(-70);
        writer
            .add_offset_with(ScalarKind::I16, start, end, options)
            .unwrap();
        writer.add_array(&ten);
        writer.add_bits_from_number(0, 3).unwrap();
        writer
            .add_offset_with(ScalarKind::I32, start, end, options.bit_len(29))
            .unwrap();
        writer.add_array(&ten);
        writer.bind_stake(end).unwrap();
        writer.add(100u16);

        let bytes = writer.finalize().unwrap();
        assert_eq!(bytes.len(), 0x46);
        assert_eq!(&bytes[0x16..0x18], &[0xff, 0xdb]);
        assert_eq!(&bytes[0x2c..0x30], &[0x1f, 0xff, 0xff, 0xdb]);
        assert_eq!(&bytes[0x44..], &[0x00, 0x64]);
    }

    #[test]
    fn negative_offsets_are_opt_in() {
        let mut writer = LinkedWriter::new();
        let target = writer.stake_current();
        writer.add(0u32);
        let base = writer.stake_current();
        writer.add_offset(ScalarKind::I16, base, target).unwrap();
        assert_eq!(
            writer.finalize(),
            Err(WriteError::NegativeOffset { value: -4 })
        );
        writer.allow_negative_offsets();
        assert_eq!(writer.finalize().unwrap(), [0, 0, 0, 0, 0xff, 0xfc]);
    }

    #[test]
    fn misaligned_offset() {
        let mut writer = LinkedWriter::new();
        let start = writer.stake_current();
        writer.add_bits(&[0], 4);
        let end = writer.stake_current();
        writer.add_bits(&[0], 4);
        writer.add_offset(ScalarKind::U8, start, end).unwrap();
        assert_eq!(
            writer.finalize(),
            Err(WriteError::MisalignedOffset {
                bits: 4,
                multiple: 8
            })
        );
    }

    #[test]
    fn variable_offsets() {
        let mut writer = LinkedWriter::new();
        writer.add(1u32);
        let start = writer.stake_current();
        let end = writer.new_stake();
        writer
            .add_variable_offset(start, end, |n| match n {
                0..=0xff => vec![n as u8],
                0x100..=0xffff => (n as u16).to_be_bytes().to_vec(),
                _ => (n as u32).to_be_bytes().to_vec(),
            })
            .unwrap();
        writer.add_array(&[2u32, 3, 4, 5]);
        writer.bind_stake(end).unwrap();
        writer.add(6u32);
        assert_eq!(
            writer.finalize().unwrap(),
            [0, 0, 0, 1, 0x11, 0, 0, 0, 2, 0, 0, 0, 3, 0, 0, 0, 4, 0, 0, 0, 5, 0, 0, 0, 6]
        );
    }

    #[test]
    fn variable_offset_that_never_settles() {
        let mut writer = LinkedWriter::new();
        let start = writer.stake_current();
        let end = writer.new_stake();
        // an offset that is long when the target is near and short when far
        writer
            .add_variable_offset(start, end, |n| vec![0; if n < 3 { 4 } else { 1 }])
            .unwrap();
        writer.bind_stake(end).unwrap();
        assert!(matches!(
            writer.finalize(),
            Err(WriteError::ResizeLoop { .. })
        ));
    }

    #[test]
    fn indices() {
        let mut writer = LinkedWriter::new();
        let tag = writer.new_index_tag();
        writer.add_index(ScalarKind::U32, tag, 1).unwrap();
        writer.add_index(ScalarKind::U16, tag, 2).unwrap();
        assert_eq!(writer.finalize(), Err(WriteError::MissingIndexMap(tag)));
        writer.add_index_map(tag, [(1, 12), (2, 13)]).unwrap();
        assert_eq!(writer.finalize().unwrap(), [0, 0, 0, 12, 0, 13]);
        assert_eq!(
            writer.add_index_map(tag, [(1, 1)]),
            Err(WriteError::DuplicateIndexMap(tag))
        );
        writer.remove_index_map(tag);
        writer.add_index_map(tag, [(1, 1)]).unwrap();
        assert_eq!(
            writer.finalize(),
            Err(WriteError::MissingIndexKey { tag, key: 2 })
        );
    }

    #[test]
    fn checksums() {
        let mut writer = LinkedWriter::new();
        let format: Format = "B2H".parse().unwrap();
        writer
            .add_bytes(
                &format,
                &[Value::from(1u8), Value::from(0x203u16), Value::from(0x405u16)],
            )
            .unwrap();
        assert_eq!(writer.checksum(..), Ok(0x0602_0304));
        assert_eq!(writer.checksum(2..4), Ok(0x0304_0000));
        assert_eq!(writer.checksum(10..), Ok(0));
        assert_eq!(writer.checksum(..=usize::MAX), Ok(0x0602_0304));
        assert_eq!(
            writer.checksum((Bound::Excluded(usize::MAX), Bound::Unbounded)),
            Ok(0)
        );
    }

    #[test]
    fn checksum_tolerates_unresolved_offsets() {
        let mut writer = LinkedWriter::new();
        let start = writer.stake_current();
        let later = writer.new_stake();
        writer.add(0x0102_0304u32);
        writer.add_offset(ScalarKind::U16, start, later).unwrap();
        assert_eq!(writer.checksum(..4), Ok(0x0102_0304));
        assert_eq!(writer.checksum(..), Ok(0x0102_0304));
        assert_eq!(writer.finalize(), Err(WriteError::UnboundStake(later)));
    }

    #[test]
    fn reset_forgets_stakes() {
        let mut writer = LinkedWriter::new();
        writer.add_raw(b"This is quite a lengthy string, actually.");
        let stake = writer.stake_current();
        writer.allow_negative_offsets();
        assert_eq!(writer.byte_len(), 41);
        writer.reset();
        assert_eq!(writer.byte_len(), 0);
        assert!(!writer.is_bound(stake));
        assert_eq!(
            writer.add_offset(ScalarKind::U16, stake, stake),
            Err(WriteError::UnknownStake(stake))
        );
        assert!(!writer.allow_negative);
    }

    #[test]
    fn computed_checksum() {
        assert_eq!(compute_checksum(&[]), 0);
        assert_eq!(compute_checksum(&[1]), 0x0100_0000);
        assert_eq!(compute_checksum(&[0xff; 8]), 0xffff_fffe);
    }
}
