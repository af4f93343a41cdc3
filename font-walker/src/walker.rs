//! A bounds-checked cursor over a window of font data.

use font_types::{format, DiagnosticSink, Format, FormatError, Record, Scalar};

use crate::{BitWalker, ReadError, ReadResultExt};

/// The base from which an offset is measured.
///
/// Binary formats disagree about whether a nested offset is relative to the
/// enclosing structure, to the current position, or to the start of the
/// whole buffer, so every call that takes an offset also takes an anchor.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Anchor {
    /// The start of the walker's window.
    WindowStart,
    /// The walker's current position.
    Current,
    /// The start of the underlying buffer.
    BufferStart,
}

/// A position-tracking reader over a window of a borrowed buffer.
///
/// All reads are big-endian and bounds-checked against the window, and a
/// failed read never moves the cursor. Walkers are cheap to copy; creating a
/// sub-walker never affects the parent.
///
/// The window always lies within the buffer, and the cursor always lies
/// within the window.
#[derive(Clone, Copy, PartialEq, Eq)]
pub struct Walker<'a> {
    data: &'a [u8],
    start: usize,
    pos: usize,
    end: usize,
}

impl<'a> Walker<'a> {
    /// A walker over the whole of `data`.
    pub fn new(data: &'a [u8]) -> Self {
        Walker {
            data,
            start: 0,
            pos: 0,
            end: data.len(),
        }
    }

    /// A walker over `data[start..end]`, positioned at `start`.
    pub fn with_window(data: &'a [u8], start: usize, end: usize) -> Result<Self, ReadError> {
        if start > end || end > data.len() {
            return Err(ReadError::MalformedSubWindow {
                start,
                end,
                limit: data.len(),
            });
        }
        Ok(Walker {
            data,
            start,
            pos: start,
            end,
        })
    }

    /// The current position, from the start of the buffer.
    pub fn offset(&self) -> usize {
        self.pos
    }

    /// The current position, from the start of the window.
    pub fn relative_offset(&self) -> usize {
        self.pos - self.start
    }

    /// The window start, from the start of the buffer.
    pub fn window_start(&self) -> usize {
        self.start
    }

    /// The (exclusive) window end, from the start of the buffer.
    pub fn window_end(&self) -> usize {
        self.end
    }

    pub fn window_len(&self) -> usize {
        self.end - self.start
    }

    /// The number of bytes between the current position and the window end.
    pub fn remaining_len(&self) -> usize {
        self.end - self.pos
    }

    /// `true` if there is at least one more byte to read.
    pub fn has_data(&self) -> bool {
        self.pos < self.end
    }

    pub fn at_end(&self) -> bool {
        !self.has_data()
    }

    /// The whole underlying buffer.
    pub fn buffer(&self) -> &'a [u8] {
        self.data
    }

    /// The bytes of the window.
    pub fn window(&self) -> &'a [u8] {
        &self.data[self.start..self.end]
    }

    fn check(&self, op: &'static str, needed: usize) -> Result<(), ReadError> {
        if needed > self.remaining_len() {
            return Err(ReadError::OutOfBounds {
                op,
                position: self.pos,
                needed,
                available: self.remaining_len(),
            });
        }
        Ok(())
    }

    // the next `len` bytes, without advancing
    fn bytes_ahead(&self, op: &'static str, len: usize) -> Result<&'a [u8], ReadError> {
        self.check(op, len)?;
        Ok(&self.data[self.pos..self.pos + len])
    }

    fn total_len(
        &self,
        op: &'static str,
        item_len: usize,
        count: usize,
    ) -> Result<usize, ReadError> {
        item_len
            .checked_mul(count)
            .ok_or(ReadError::OutOfBounds {
                op,
                position: self.pos,
                needed: usize::MAX,
                available: self.remaining_len(),
            })
    }

    /// Read a scalar and advance past it.
    pub fn read<T: Scalar>(&mut self) -> Result<T, ReadError> {
        let value = self.peek()?;
        self.pos += T::RAW_BYTE_LEN;
        Ok(value)
    }

    /// Read a scalar without advancing.
    pub fn peek<T: Scalar>(&self) -> Result<T, ReadError> {
        let bytes = self.bytes_ahead("read", T::RAW_BYTE_LEN)?;
        T::read(bytes).ok_or(ReadError::OutOfBounds {
            op: "read",
            position: self.pos,
            needed: T::RAW_BYTE_LEN,
            available: bytes.len(),
        })
    }

    /// Read `count` scalars, with a single bounds check.
    pub fn read_array<T: Scalar>(&mut self, count: usize) -> Result<Vec<T>, ReadError> {
        let len = self.total_len("read_array", T::RAW_BYTE_LEN, count)?;
        let bytes = self.bytes_ahead("read_array", len)?;
        let values = bytes
            .chunks_exact(T::RAW_BYTE_LEN.max(1))
            .filter_map(T::read)
            .collect();
        self.pos += len;
        Ok(values)
    }

    /// Decode one record of `format` and advance past it.
    pub fn unpack(&mut self, format: &Format) -> Result<Record, ReadError> {
        let record = self.peek_unpack(format)?;
        self.pos += format.byte_len();
        Ok(record)
    }

    /// Decode one record of `format` without advancing.
    pub fn peek_unpack(&self, format: &Format) -> Result<Record, ReadError> {
        let bytes = self.bytes_ahead("unpack", format.byte_len())?;
        Ok(format::decode(format, bytes)?)
    }

    /// Decode `count` consecutive records of `format`.
    ///
    /// The whole group is bounds-checked once up front: either every record
    /// is decoded and the cursor advances past all of them, or nothing is
    /// decoded and the cursor does not move.
    pub fn group(&mut self, format: &Format, count: usize) -> Result<Vec<Record>, ReadError> {
        let len = self.total_len("group", format.byte_len(), count)?;
        let bytes = self.bytes_ahead("group", len)?;
        let records = decode_group(format, bytes, count)?;
        self.pos += len;
        Ok(records)
    }

    /// Decode records of `format` until the window is exhausted.
    ///
    /// Fails without advancing if the remaining bytes are not a whole number
    /// of records.
    pub fn unpack_rest(&mut self, format: &Format) -> Result<Vec<Record>, ReadError> {
        let record_len = format.byte_len();
        if record_len == 0 {
            return Ok(Vec::new());
        }
        let remainder = self.remaining_len() % record_len;
        if remainder != 0 {
            return Err(ReadError::PartialRecord {
                remainder,
                record_len,
            });
        }
        self.group(format, self.remaining_len() / record_len)
    }

    /// Return the next `len` bytes and advance past them.
    pub fn chunk(&mut self, len: usize) -> Result<&'a [u8], ReadError> {
        let bytes = self.bytes_ahead("chunk", len)?;
        self.pos += len;
        Ok(bytes)
    }

    /// Return everything up to the window end and advance there.
    pub fn rest(&mut self) -> &'a [u8] {
        let bytes = &self.data[self.pos..self.end];
        self.pos = self.end;
        bytes
    }

    fn anchor_base(&self, anchor: Anchor) -> usize {
        match anchor {
            Anchor::WindowStart => self.start,
            Anchor::Current => self.pos,
            Anchor::BufferStart => 0,
        }
    }

    // resolve an anchored range, which must lie within the window
    fn resolve(
        &self,
        offset: usize,
        len: Option<usize>,
        anchor: Anchor,
    ) -> Result<(usize, usize), ReadError> {
        let start = self.anchor_base(anchor).saturating_add(offset);
        let end = match len {
            Some(len) => start.saturating_add(len),
            None => self.end.max(start),
        };
        if start < self.start || end > self.end {
            return Err(ReadError::MalformedSubWindow {
                start,
                end,
                limit: self.end,
            });
        }
        Ok((start, end))
    }

    /// Return `len` bytes at an anchored offset, without moving the cursor.
    pub fn piece(&self, len: usize, offset: usize, anchor: Anchor) -> Result<&'a [u8], ReadError> {
        let (start, end) = self.resolve(offset, Some(len), anchor)?;
        Ok(&self.data[start..end])
    }

    /// Read a length byte followed by that many bytes.
    pub fn pascal_string(&mut self) -> Result<&'a [u8], ReadError> {
        let len = self.peek::<u8>()? as usize;
        let bytes = self.bytes_ahead("pascal_string", len + 1)?;
        self.pos += len + 1;
        Ok(&bytes[1..])
    }

    pub fn skip(&mut self, len: usize) -> Result<(), ReadError> {
        self.check("skip", len)?;
        self.pos += len;
        Ok(())
    }

    /// Move the cursor to an anchored offset within the window.
    pub fn set_offset(&mut self, offset: usize, anchor: Anchor) -> Result<(), ReadError> {
        let (pos, _) = self.resolve(offset, Some(0), anchor)?;
        self.pos = pos;
        Ok(())
    }

    /// Move the cursor back to the window start.
    pub fn reset(&mut self) {
        self.pos = self.start;
    }

    /// Advance to the next multiple of `multiple`, measured from the start
    /// of the buffer.
    pub fn align(&mut self, multiple: usize) -> Result<(), ReadError> {
        self.align_from(0, multiple)
    }

    /// Advance to the next multiple of `multiple`, measured from the start
    /// of the window.
    pub fn align_in_window(&mut self, multiple: usize) -> Result<(), ReadError> {
        self.align_from(self.start, multiple)
    }

    fn align_from(&mut self, base: usize, multiple: usize) -> Result<(), ReadError> {
        if multiple <= 1 {
            return Ok(());
        }
        let rel = self.pos - base;
        let padding = (multiple - rel % multiple) % multiple;
        self.check("align", padding)?;
        self.pos += padding;
        Ok(())
    }

    /// Create a walker over a narrower window of the same buffer.
    ///
    /// The new window starts `offset` bytes from `anchor` and is `len` bytes
    /// long, or runs to the end of this walker's window if `len` is `None`.
    /// The new walker is positioned at its window start.
    ///
    /// A window that would extend outside this walker's window is an error;
    /// it is never clamped.
    pub fn sub_walker(
        &self,
        offset: usize,
        len: Option<usize>,
        anchor: Anchor,
    ) -> Result<Walker<'a>, ReadError> {
        let (start, end) = self.resolve(offset, len, anchor)?;
        log::trace!("sub-walker {start}..{end} at offset {offset} from {anchor:?}");
        Ok(Walker {
            data: self.data,
            start,
            pos: start,
            end,
        })
    }

    /// Switch to bit-level reading, starting at the current byte.
    pub fn bits(&self) -> BitWalker<'a> {
        BitWalker::new(*self)
    }

    pub fn read_validated<T: Scalar>(&mut self, sink: &mut dyn DiagnosticSink) -> Option<T> {
        self.read().or_report(sink)
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

    pub fn unpack_rest_validated(
        &mut self,
        format: &Format,
        sink: &mut dyn DiagnosticSink,
    ) -> Option<Vec<Record>> {
        self.unpack_rest(format).or_report(sink)
    }

    pub fn chunk_validated(
        &mut self,
        len: usize,
        sink: &mut dyn DiagnosticSink,
    ) -> Option<&'a [u8]> {
        self.chunk(len).or_report(sink)
    }

    pub fn sub_walker_validated(
        &self,
        offset: usize,
        len: Option<usize>,
        anchor: Anchor,
        sink: &mut dyn DiagnosticSink,
    ) -> Option<Walker<'a>> {
        self.sub_walker(offset, len, anchor).or_report(sink)
    }
}

pub(crate) fn decode_group(
    format: &Format,
    bytes: &[u8],
    count: usize,
) -> Result<Vec<Record>, ReadError> {
    let record_len = format.byte_len();
    if record_len == 0 {
        if count > 0 {
            return Err(FormatError::EmptyFormat { count }.into());
        }
        return Ok(Vec::new());
    }
    bytes
        .chunks_exact(record_len)
        .take(count)
        .map(|chunk| format::decode(format, chunk).map_err(ReadError::from))
        .collect()
}

impl std::fmt::Debug for Walker<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Walker")
            .field("buffer_len", &self.data.len())
            .field("window", &(self.start..self.end))
            .field("pos", &self.pos)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use font_types::{Diagnostic, Fixed, Int24, Severity, Uint24, Value};
    use pretty_assertions::assert_eq;
    use rstest::rstest;

    use super::*;

    fn fmt(codes: &str) -> Format {
        Format::parse(codes).unwrap()
    }

    fn ints(records: &[Record]) -> Vec<Vec<i64>> {
        records
            .iter()
            .map(|r| r.iter().filter_map(Value::to_i64).collect())
            .collect()
    }

    #[test]
    fn unpack_then_group() {
        let data = [0x00, 0x02, 0x00, 0x00, 0x00, 0x03];
        let mut walker = Walker::new(&data);
        let first = walker.unpack(&fmt("H")).unwrap();
        assert_eq!(first.single(), Some(Value::Int(2)));
        assert_eq!(walker.offset(), 2);
        assert_eq!(walker.remaining_len(), 4);

        let rest = walker.group(&fmt("H"), 2).unwrap();
        assert_eq!(ints(&rest), [[0], [3]]);
        assert!(walker.at_end());
    }

    #[test]
    fn unpack_too_short() {
        let data = [0x00, 0x02, 0x00];
        let mut walker = Walker::new(&data);
        assert_eq!(
            walker.unpack(&fmt("L")),
            Err(ReadError::OutOfBounds {
                op: "unpack",
                position: 0,
                needed: 4,
                available: 3
            })
        );
        assert_eq!(walker.offset(), 0);

        let mut sink: Vec<Diagnostic> = Vec::new();
        assert_eq!(walker.unpack_validated(&fmt("L"), &mut sink), None);
        assert_eq!(sink.len(), 1);
        assert_eq!(sink[0].severity, Severity::Error);
        assert_eq!(sink[0].code, "V0004");
    }

    #[rstest]
    #[case::u8(1)]
    #[case::u16(2)]
    #[case::u24(3)]
    #[case::u32(4)]
    #[case::u64(8)]
    fn bounds_exactness(#[case] width: usize) {
        let kind = [
            font_types::ScalarKind::U8,
            font_types::ScalarKind::U16,
            font_types::ScalarKind::U24,
            font_types::ScalarKind::U32,
            font_types::ScalarKind::U64,
        ]
        .into_iter()
        .find(|k| k.byte_len() == width)
        .unwrap();
        let format = Format::single(kind);
        let data = [0xab; 10];
        for offset in 0..=data.len() {
            let mut walker = Walker::new(&data);
            walker.skip(offset).unwrap();
            let result = walker.unpack(&format);
            assert_eq!(result.is_ok(), width <= data.len() - offset, "offset {offset}");
        }
    }

    #[test]
    fn zero_count_group() {
        let mut walker = Walker::new(&[]);
        assert_eq!(walker.group(&fmt("L"), 0), Ok(Vec::new()));
        assert_eq!(walker.read_array::<u32>(0), Ok(Vec::new()));
    }

    #[test]
    fn group_is_atomic() {
        let data = [0, 1, 0, 2, 0, 3, 0];
        let mut walker = Walker::new(&data);
        assert!(walker.group(&fmt("H"), 4).is_err());
        assert_eq!(walker.offset(), 0);
        assert_eq!(ints(&walker.group(&fmt("H"), 3).unwrap()), [[1], [2], [3]]);
        assert_eq!(walker.offset(), 6);
        assert!(walker.group(&fmt("H"), usize::MAX).is_err());
    }

    #[test]
    fn empty_format_groups() {
        let data = [0; 4];
        let mut walker = Walker::new(&data);
        assert_eq!(walker.group(&fmt("0H"), 0), Ok(Vec::new()));
        assert_eq!(
            walker.group(&fmt("0H"), usize::MAX / 2),
            Err(ReadError::Format(FormatError::EmptyFormat {
                count: usize::MAX / 2
            }))
        );
        assert!(walker.group(&Format::default(), 1).is_err());
        assert_eq!(walker.offset(), 0);
    }

    #[test]
    fn typed_reads() {
        let data = [0xff, 0xfe, 0x80, 0x00, 0x00, 0x00, 0x01, 0x80, 0x00, 0x12];
        let mut walker = Walker::new(&data);
        assert_eq!(walker.peek::<i16>(), Ok(-2));
        assert_eq!(walker.read::<u16>(), Ok(0xfffe));
        assert_eq!(walker.read::<Int24>(), Ok(Int24::MIN));
        assert_eq!(walker.read::<Fixed>(), Ok(Fixed::from_f64(1.5)));
        assert_eq!(walker.remaining_len(), 1);
        assert!(walker.read::<Uint24>().is_err());
        assert_eq!(walker.read_array::<u8>(1), Ok(vec![0x12]));
    }

    #[test]
    fn unpack_rest_requires_whole_records() {
        let data = [0, 1, 0, 2, 0];
        let mut walker = Walker::new(&data);
        assert_eq!(
            walker.unpack_rest(&fmt("H")),
            Err(ReadError::PartialRecord {
                remainder: 1,
                record_len: 2
            })
        );
        walker.skip(1).unwrap();
        assert_eq!(ints(&walker.unpack_rest(&fmt("H")).unwrap()), [[256], [512]]);
    }

    #[test]
    fn sub_walker_anchors() {
        let data = [0, 1, 2, 3, 4, 5, 6, 7, 8, 9];
        let mut parent = Walker::with_window(&data, 2, 9).unwrap();
        parent.skip(3).unwrap();
        assert_eq!(parent.offset(), 5);

        let from_window = parent.sub_walker(1, Some(2), Anchor::WindowStart).unwrap();
        assert_eq!(from_window.window(), &[3, 4]);

        let from_current = parent.sub_walker(1, Some(2), Anchor::Current).unwrap();
        assert_eq!(from_current.window(), &[6, 7]);

        let from_buffer = parent.sub_walker(3, None, Anchor::BufferStart).unwrap();
        assert_eq!(from_buffer.window(), &[3, 4, 5, 6, 7, 8]);
        assert_eq!(from_buffer.relative_offset(), 0);
    }

    #[test]
    fn sub_walker_never_clamps() {
        let data = [0u8; 10];
        let parent = Walker::with_window(&data, 2, 8).unwrap();
        assert_eq!(
            parent.sub_walker(4, Some(4), Anchor::WindowStart),
            Err(ReadError::MalformedSubWindow {
                start: 6,
                end: 10,
                limit: 8
            })
        );
        // inside the buffer, but outside the parent's window
        assert!(parent.sub_walker(0, Some(2), Anchor::BufferStart).is_err());
        assert!(parent.sub_walker(7, None, Anchor::WindowStart).is_err());
        assert!(parent.sub_walker(usize::MAX, Some(1), Anchor::Current).is_err());

        let mut sink: Vec<Diagnostic> = Vec::new();
        assert!(parent
            .sub_walker_validated(6, Some(1), Anchor::WindowStart, &mut sink)
            .is_none());
        assert_eq!(sink.len(), 1);
        assert_eq!(sink[0].code, "V0005");
    }

    #[test]
    fn sub_walker_containment() {
        let data: Vec<u8> = (0..32).collect();
        let parent = Walker::with_window(&data, 4, 20).unwrap();
        for offset in 0..20 {
            for len in 0..20 {
                let Ok(mut sub) = parent.sub_walker(offset, Some(len), Anchor::WindowStart) else {
                    continue;
                };
                let bytes = sub.rest();
                assert!(bytes.iter().all(|b| (4..20).contains(b)));
                assert!(sub.read::<u8>().is_err());
            }
        }
    }

    #[test]
    fn pieces_and_strings() {
        let data = [3, b'a', b'b', b'c', 2, b'x'];
        let mut walker = Walker::new(&data);
        assert_eq!(walker.piece(2, 1, Anchor::Current), Ok(&b"ab"[..]));
        assert_eq!(walker.offset(), 0);
        assert_eq!(walker.pascal_string(), Ok(&b"abc"[..]));
        // the length byte promises more than there is
        assert!(walker.pascal_string().is_err());
        assert_eq!(walker.offset(), 4);
        assert!(walker.piece(3, 4, Anchor::BufferStart).is_err());
        assert_eq!(walker.chunk(2), Ok(&[2, b'x'][..]));
        assert_eq!(walker.rest(), &[] as &[u8]);
    }

    #[test]
    fn positioning() {
        let data = [0u8; 16];
        let mut walker = Walker::with_window(&data, 3, 16).unwrap();
        walker.align(4).unwrap();
        assert_eq!(walker.offset(), 4);
        walker.skip(1).unwrap();
        walker.align_in_window(4).unwrap();
        assert_eq!(walker.offset(), 7);
        walker.set_offset(2, Anchor::WindowStart).unwrap();
        assert_eq!(walker.offset(), 5);
        walker.set_offset(13, Anchor::WindowStart).unwrap();
        assert!(walker.at_end());
        assert!(walker.set_offset(14, Anchor::WindowStart).is_err());
        assert!(walker.set_offset(0, Anchor::BufferStart).is_err());
        walker.reset();
        assert_eq!(walker.offset(), 3);
        assert_eq!(walker.relative_offset(), 0);

        let mut short = Walker::with_window(&data, 1, 2).unwrap();
        assert!(short.align(4).is_err());
        assert_eq!(short.offset(), 1);
    }

    #[test]
    fn bad_window() {
        let data = [0u8; 4];
        assert!(Walker::with_window(&data, 3, 2).is_err());
        assert!(Walker::with_window(&data, 0, 5).is_err());
        assert!(Walker::with_window(&data, 4, 4).unwrap().at_end());
    }
}
