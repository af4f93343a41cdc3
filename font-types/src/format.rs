//! The shared format vocabulary for packed records.
//!
//! A [`Format`] is an ordered list of [`ScalarKind`]s. It is resolved once,
//! either from a slice of kinds or from a compact code string such as
//! `"2H l"`, and then used by both the walker (to decode) and the writer (to
//! encode). Because both sides go through [`decode`] and [`encode_into`], a
//! record written with a format always reads back as the same values.
//!
//! The codes are:
//!
//! | code | kind      | bytes |
//! |------|-----------|-------|
//! | `B`  | `u8`      | 1     |
//! | `b`  | `i8`      | 1     |
//! | `H`  | `u16`     | 2     |
//! | `h`  | `i16`     | 2     |
//! | `T`  | `Uint24`  | 3     |
//! | `t`  | `Int24`   | 3     |
//! | `L`  | `u32`     | 4     |
//! | `l`  | `i32`     | 4     |
//! | `Q`  | `u64`     | 8     |
//! | `q`  | `i64`     | 8     |
//! | `F`  | 16.16     | 4     |
//! | `D`  | 2.14      | 2     |
//! | `x`  | pad byte  | 1     |
//!
//! Data is always big-endian; a leading `>` or `!` is accepted and ignored.

use std::str::FromStr;

use crate::{F2Dot14, Fixed, Scalar};

/// The kind of a single field in a [`Format`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum ScalarKind {
    U8,
    I8,
    U16,
    I16,
    U24,
    I24,
    U32,
    I32,
    U64,
    I64,
    /// 16.16 signed fixed point
    Fixed,
    /// 2.14 signed fixed point
    F2Dot14,
    /// A single zero byte that carries no value.
    Pad,
}

impl ScalarKind {
    /// The encoded size of this kind, in bytes.
    pub const fn byte_len(self) -> usize {
        match self {
            ScalarKind::U8 | ScalarKind::I8 | ScalarKind::Pad => 1,
            ScalarKind::U16 | ScalarKind::I16 | ScalarKind::F2Dot14 => 2,
            ScalarKind::U24 | ScalarKind::I24 => 3,
            ScalarKind::U32 | ScalarKind::I32 | ScalarKind::Fixed => 4,
            ScalarKind::U64 | ScalarKind::I64 => 8,
        }
    }

    pub const fn is_signed(self) -> bool {
        matches!(
            self,
            ScalarKind::I8
                | ScalarKind::I16
                | ScalarKind::I24
                | ScalarKind::I32
                | ScalarKind::I64
                | ScalarKind::Fixed
                | ScalarKind::F2Dot14
        )
    }

    /// `true` if this kind consumes (or produces) a [`Value`].
    pub const fn has_value(self) -> bool {
        !matches!(self, ScalarKind::Pad)
    }

    /// The single-character code for this kind.
    pub const fn code(self) -> char {
        match self {
            ScalarKind::U8 => 'B',
            ScalarKind::I8 => 'b',
            ScalarKind::U16 => 'H',
            ScalarKind::I16 => 'h',
            ScalarKind::U24 => 'T',
            ScalarKind::I24 => 't',
            ScalarKind::U32 => 'L',
            ScalarKind::I32 => 'l',
            ScalarKind::U64 => 'Q',
            ScalarKind::I64 => 'q',
            ScalarKind::Fixed => 'F',
            ScalarKind::F2Dot14 => 'D',
            ScalarKind::Pad => 'x',
        }
    }

    pub fn from_code(code: char) -> Option<Self> {
        Some(match code {
            'B' => ScalarKind::U8,
            'b' => ScalarKind::I8,
            'H' => ScalarKind::U16,
            'h' => ScalarKind::I16,
            'T' => ScalarKind::U24,
            't' => ScalarKind::I24,
            'L' => ScalarKind::U32,
            'l' => ScalarKind::I32,
            'Q' => ScalarKind::U64,
            'q' => ScalarKind::I64,
            'F' => ScalarKind::Fixed,
            'D' => ScalarKind::F2Dot14,
            'x' => ScalarKind::Pad,
            _ => return None,
        })
    }

    /// The inclusive range of integers representable by this kind.
    ///
    /// Returns `None` for the fixed point kinds and for padding.
    pub const fn int_bounds(self) -> Option<(i64, i64)> {
        match self {
            ScalarKind::U8 => Some((0, u8::MAX as i64)),
            ScalarKind::I8 => Some((i8::MIN as i64, i8::MAX as i64)),
            ScalarKind::U16 => Some((0, u16::MAX as i64)),
            ScalarKind::I16 => Some((i16::MIN as i64, i16::MAX as i64)),
            ScalarKind::U24 => Some((0, 0xff_ffff)),
            ScalarKind::I24 => Some((-0x80_0000, 0x7f_ffff)),
            ScalarKind::U32 => Some((0, u32::MAX as i64)),
            ScalarKind::I32 => Some((i32::MIN as i64, i32::MAX as i64)),
            // values above i64::MAX are not representable by `Value`
            ScalarKind::U64 => Some((0, i64::MAX)),
            ScalarKind::I64 => Some((i64::MIN, i64::MAX)),
            ScalarKind::Fixed | ScalarKind::F2Dot14 | ScalarKind::Pad => None,
        }
    }

    /// Check that `value` can be encoded as this kind.
    pub fn check(self, value: Value) -> Result<(), FormatError> {
        match (self, value) {
            (ScalarKind::Fixed, Value::Fixed(_)) | (ScalarKind::F2Dot14, Value::F2Dot14(_)) => {
                Ok(())
            }
            (kind, Value::Int(int)) => match kind.int_bounds() {
                Some((min, max)) if (min..=max).contains(&int) => Ok(()),
                Some(_) => Err(FormatError::OutOfRange { kind, value: int }),
                None => Err(FormatError::WrongVariant { kind, value }),
            },
            (kind, value) => Err(FormatError::WrongVariant { kind, value }),
        }
    }

    /// Append the encoding of `value` to `out`.
    pub fn encode(self, value: Value, out: &mut Vec<u8>) -> Result<(), FormatError> {
        self.check(value)?;
        match value {
            Value::Fixed(fixed) => out.extend_from_slice(&fixed.to_raw()),
            Value::F2Dot14(f2dot14) => out.extend_from_slice(&f2dot14.to_raw()),
            // in range, so the low bytes of the two's complement are the encoding
            Value::Int(int) => out.extend_from_slice(&int.to_be_bytes()[8 - self.byte_len()..]),
        }
        Ok(())
    }

    /// Decode one value of this kind from the front of `bytes`.
    ///
    /// Returns `Ok(None)` for padding.
    pub fn decode(self, bytes: &[u8]) -> Result<Option<Value>, FormatError> {
        let len = self.byte_len();
        let raw = bytes.get(..len).ok_or(FormatError::Truncated {
            needed: len,
            available: bytes.len(),
        })?;
        let value = match self {
            ScalarKind::Pad => return Ok(None),
            ScalarKind::Fixed => Value::Fixed(Fixed::read(raw).unwrap_or_default()),
            ScalarKind::F2Dot14 => Value::F2Dot14(F2Dot14::read(raw).unwrap_or_default()),
            kind => {
                let unsigned = raw.iter().fold(0u64, |acc, b| (acc << 8) | *b as u64);
                let bits = (len * 8) as u32;
                let int = if kind.is_signed() && bits < 64 {
                    // shift up and back down to sign-extend
                    ((unsigned << (64 - bits)) as i64) >> (64 - bits)
                } else {
                    unsigned as i64
                };
                if kind == ScalarKind::U64 && int < 0 {
                    return Err(FormatError::OutOfRange { kind, value: int });
                }
                Value::Int(int)
            }
        };
        Ok(Some(value))
    }
}

/// A single decoded (or to-be-encoded) field.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum Value {
    Int(i64),
    Fixed(Fixed),
    F2Dot14(F2Dot14),
}

impl Value {
    pub fn to_i64(self) -> Option<i64> {
        match self {
            Value::Int(int) => Some(int),
            _ => None,
        }
    }

    pub fn to_u32(self) -> Option<u32> {
        self.to_i64().and_then(|int| int.try_into().ok())
    }

    pub fn to_u16(self) -> Option<u16> {
        self.to_i64().and_then(|int| int.try_into().ok())
    }

    pub fn to_usize(self) -> Option<usize> {
        self.to_i64().and_then(|int| int.try_into().ok())
    }

    pub fn to_fixed(self) -> Option<Fixed> {
        match self {
            Value::Fixed(fixed) => Some(fixed),
            _ => None,
        }
    }

    pub fn to_f2dot14(self) -> Option<F2Dot14> {
        match self {
            Value::F2Dot14(f2dot14) => Some(f2dot14),
            _ => None,
        }
    }
}

macro_rules! value_from_int {
    ($($ty:ty),*) => {
        $(
            impl From<$ty> for Value {
                fn from(src: $ty) -> Value {
                    Value::Int(src as i64)
                }
            }
        )*
    };
}

value_from_int!(u8, i8, u16, i16, u32, i32, i64);

impl From<crate::Uint24> for Value {
    fn from(src: crate::Uint24) -> Value {
        Value::Int(src.to_u32() as i64)
    }
}

impl From<crate::Int24> for Value {
    fn from(src: crate::Int24) -> Value {
        Value::Int(src.to_i32() as i64)
    }
}

impl From<Fixed> for Value {
    fn from(src: Fixed) -> Value {
        Value::Fixed(src)
    }
}

impl From<F2Dot14> for Value {
    fn from(src: F2Dot14) -> Value {
        Value::F2Dot14(src)
    }
}

impl std::fmt::Display for Value {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Value::Int(int) => write!(f, "{int}"),
            Value::Fixed(fixed) => write!(f, "{fixed}"),
            Value::F2Dot14(f2dot14) => write!(f, "{f2dot14}"),
        }
    }
}

/// The largest record a format string may describe, in bytes.
pub const MAX_FORMAT_BYTE_LEN: usize = u16::MAX as usize;

/// A resolved sequence of [`ScalarKind`]s.
#[derive(Clone, Debug, Default, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Format {
    kinds: Vec<ScalarKind>,
    byte_len: usize,
    value_count: usize,
}

impl Format {
    pub fn new(kinds: &[ScalarKind]) -> Self {
        kinds.iter().copied().collect()
    }

    /// A format with a single field.
    pub fn single(kind: ScalarKind) -> Self {
        Format::new(&[kind])
    }

    /// Parse a format from its code string.
    pub fn parse(codes: &str) -> Result<Self, FormatError> {
        let mut kinds = Vec::new();
        let mut count: Option<usize> = None;
        let mut byte_len = 0usize;
        for (i, c) in codes.chars().enumerate() {
            match c {
                c if c.is_whitespace() => continue,
                '>' | '!' if i == 0 => continue,
                '<' | '=' | '@' => return Err(FormatError::ByteOrder(c)),
                '0'..='9' => {
                    let digit = c as usize - '0' as usize;
                    let next = count
                        .unwrap_or(0)
                        .checked_mul(10)
                        .and_then(|n| n.checked_add(digit))
                        .filter(|n| *n <= MAX_FORMAT_BYTE_LEN)
                        .ok_or(FormatError::TooLarge)?;
                    count = Some(next);
                }
                c => {
                    let kind = ScalarKind::from_code(c).ok_or(FormatError::UnknownCode(c))?;
                    let n = count.take().unwrap_or(1);
                    byte_len = n
                        .checked_mul(kind.byte_len())
                        .and_then(|len| len.checked_add(byte_len))
                        .filter(|len| *len <= MAX_FORMAT_BYTE_LEN)
                        .ok_or(FormatError::TooLarge)?;
                    kinds.extend(std::iter::repeat(kind).take(n));
                }
            }
        }
        if let Some(count) = count {
            return Err(FormatError::DanglingCount(count));
        }
        Ok(Format::new(&kinds))
    }

    pub fn kinds(&self) -> &[ScalarKind] {
        &self.kinds
    }

    /// The total encoded size of one record, in bytes.
    pub fn byte_len(&self) -> usize {
        self.byte_len
    }

    /// The number of values in one record (padding excluded).
    pub fn value_count(&self) -> usize {
        self.value_count
    }

    pub fn is_empty(&self) -> bool {
        self.kinds.is_empty()
    }
}

impl FromIterator<ScalarKind> for Format {
    fn from_iter<I: IntoIterator<Item = ScalarKind>>(iter: I) -> Self {
        let kinds: Vec<_> = iter.into_iter().collect();
        let byte_len = kinds.iter().map(|kind| kind.byte_len()).sum();
        let value_count = kinds.iter().filter(|kind| kind.has_value()).count();
        Format {
            kinds,
            byte_len,
            value_count,
        }
    }
}

impl From<ScalarKind> for Format {
    fn from(src: ScalarKind) -> Format {
        Format::single(src)
    }
}

impl FromStr for Format {
    type Err = FormatError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Format::parse(s)
    }
}

impl std::fmt::Display for Format {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        self.kinds
            .iter()
            .try_for_each(|kind| write!(f, "{}", kind.code()))
    }
}

/// The values decoded from one record of a [`Format`].
#[derive(Clone, Debug, Default, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Record(Vec<Value>);

impl Record {
    pub fn new(values: Vec<Value>) -> Self {
        Record(values)
    }

    pub fn get(&self, idx: usize) -> Option<Value> {
        self.0.get(idx).copied()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = Value> + '_ {
        self.0.iter().copied()
    }

    pub fn values(&self) -> &[Value] {
        &self.0
    }

    pub fn into_values(self) -> Vec<Value> {
        self.0
    }

    /// The only value in this record, if it has exactly one.
    pub fn single(&self) -> Option<Value> {
        match self.0.as_slice() {
            [value] => Some(*value),
            _ => None,
        }
    }
}

impl std::ops::Index<usize> for Record {
    type Output = Value;

    fn index(&self, index: usize) -> &Self::Output {
        &self.0[index]
    }
}

impl IntoIterator for Record {
    type Item = Value;
    type IntoIter = std::vec::IntoIter<Value>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.into_iter()
    }
}

impl AsRef<[Value]> for Record {
    fn as_ref(&self) -> &[Value] {
        &self.0
    }
}

impl From<Vec<Value>> for Record {
    fn from(src: Vec<Value>) -> Record {
        Record(src)
    }
}

/// Encode one record of `format` onto the end of `out`.
///
/// On error, `out` is left unchanged.
pub fn encode_into(format: &Format, values: &[Value], out: &mut Vec<u8>) -> Result<(), FormatError> {
    if values.len() != format.value_count() {
        return Err(FormatError::CountMismatch {
            expected: format.value_count(),
            found: values.len(),
        });
    }
    let start = out.len();
    out.reserve(format.byte_len());
    let mut values = values.iter();
    for kind in format.kinds() {
        let result = match kind {
            ScalarKind::Pad => {
                out.push(0);
                Ok(())
            }
            kind => match values.next() {
                Some(value) => kind.encode(*value, out),
                None => Err(FormatError::CountMismatch {
                    expected: format.value_count(),
                    found: 0,
                }),
            },
        };
        if let Err(e) = result {
            out.truncate(start);
            return Err(e);
        }
    }
    Ok(())
}

/// Decode one record of `format` from the front of `bytes`.
pub fn decode(format: &Format, bytes: &[u8]) -> Result<Record, FormatError> {
    if bytes.len() < format.byte_len() {
        return Err(FormatError::Truncated {
            needed: format.byte_len(),
            available: bytes.len(),
        });
    }
    let mut values = Vec::with_capacity(format.value_count());
    let mut pos = 0;
    for kind in format.kinds() {
        if let Some(value) = kind.decode(&bytes[pos..])? {
            values.push(value);
        }
        pos += kind.byte_len();
    }
    Ok(Record(values))
}

/// An error in constructing or applying a [`Format`].
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum FormatError {
    #[error("unknown format code '{0}'")]
    UnknownCode(char),
    #[error("byte order '{0}' is not supported; all data is big-endian")]
    ByteOrder(char),
    #[error("repeat count {0} is not followed by a format code")]
    DanglingCount(usize),
    #[error("format describes a record larger than {MAX_FORMAT_BYTE_LEN} bytes")]
    TooLarge,
    #[error("format has no fields, so {count} records cannot be read")]
    EmptyFormat { count: usize },
    #[error("format expects {expected} values, found {found}")]
    CountMismatch { expected: usize, found: usize },
    #[error("value {value} is out of range for {kind:?}")]
    OutOfRange { kind: ScalarKind, value: i64 },
    #[error("value {value} cannot be encoded as {kind:?}")]
    WrongVariant { kind: ScalarKind, value: Value },
    #[error("record needs {needed} bytes, only {available} available")]
    Truncated { needed: usize, available: usize },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_codes() {
        let format: Format = "2H l".parse().unwrap();
        assert_eq!(
            format.kinds(),
            &[ScalarKind::U16, ScalarKind::U16, ScalarKind::I32]
        );
        assert_eq!(format.byte_len(), 8);
        assert_eq!(format.value_count(), 3);
        assert_eq!(format.to_string(), "HHl");

        let padded = Format::parse(">B3xT").unwrap();
        assert_eq!(padded.byte_len(), 7);
        assert_eq!(padded.value_count(), 2);
    }

    #[test]
    fn parse_errors() {
        assert_eq!(Format::parse("Hz"), Err(FormatError::UnknownCode('z')));
        assert_eq!(Format::parse("<H"), Err(FormatError::ByteOrder('<')));
        assert_eq!(Format::parse("H>"), Err(FormatError::UnknownCode('>')));
        assert_eq!(Format::parse("H12"), Err(FormatError::DanglingCount(12)));
        assert_eq!(Format::parse("0H").map(|f| f.is_empty()), Ok(true));
    }

    #[test]
    fn huge_repeat_counts() {
        assert_eq!(
            Format::parse("99999999999999999999999H"),
            Err(FormatError::TooLarge)
        );
        assert_eq!(Format::parse("40000H"), Err(FormatError::TooLarge));
        assert_eq!(Format::parse("30000H 30000H"), Err(FormatError::TooLarge));
        let widest = Format::parse("65535B").unwrap();
        assert_eq!(widest.byte_len(), MAX_FORMAT_BYTE_LEN);
    }

    #[test]
    fn range_checks() {
        assert!(ScalarKind::U8.check(Value::Int(255)).is_ok());
        assert_eq!(
            ScalarKind::U8.check(Value::Int(256)),
            Err(FormatError::OutOfRange {
                kind: ScalarKind::U8,
                value: 256
            })
        );
        assert!(ScalarKind::I24.check(Value::Int(-0x80_0000)).is_ok());
        assert!(ScalarKind::I24.check(Value::Int(-0x80_0001)).is_err());
        assert!(matches!(
            ScalarKind::Fixed.check(Value::Int(1)),
            Err(FormatError::WrongVariant { .. })
        ));
        assert!(ScalarKind::Fixed.check(Fixed::ONE.into()).is_ok());
    }

    #[test]
    fn encode_signed() {
        let format = Format::parse("bhtl").unwrap();
        let mut out = Vec::new();
        let values = [-1i64, -2, -3, -4].map(Value::Int);
        encode_into(&format, &values, &mut out).unwrap();
        assert_eq!(
            out,
            [0xff, 0xff, 0xfe, 0xff, 0xff, 0xfd, 0xff, 0xff, 0xff, 0xfc]
        );
        assert_eq!(decode(&format, &out).unwrap().into_values(), values);
    }

    #[test]
    fn encode_failure_leaves_buffer() {
        let format = Format::parse("HB").unwrap();
        let mut out = vec![1];
        let err = encode_into(&format, &[Value::Int(1), Value::Int(300)], &mut out);
        assert!(err.is_err());
        assert_eq!(out, [1]);
        assert_eq!(
            encode_into(&format, &[Value::Int(1)], &mut out),
            Err(FormatError::CountMismatch {
                expected: 2,
                found: 1
            })
        );
    }

    #[test]
    fn decode_fixed_and_pad() {
        let format = Format::parse("FxD").unwrap();
        let record = decode(&format, &[0x00, 0x01, 0x80, 0x00, 0xaa, 0x40, 0x00]).unwrap();
        assert_eq!(record.len(), 2);
        assert_eq!(record[0], Value::Fixed(Fixed::from_f64(1.5)));
        assert_eq!(record.get(1), Some(Value::F2Dot14(F2Dot14::ONE)));
        assert_eq!(record.single(), None);
    }

    #[test]
    fn decode_truncated() {
        let format = Format::single(ScalarKind::U32);
        assert_eq!(
            decode(&format, &[0, 0, 0]),
            Err(FormatError::Truncated {
                needed: 4,
                available: 3
            })
        );
    }

    #[test]
    fn u64_above_i64() {
        let format = Format::single(ScalarKind::U64);
        assert!(decode(&format, &[0x80, 0, 0, 0, 0, 0, 0, 0]).is_err());
        assert_eq!(
            decode(&format, &[0x7f, 0xff, 0xff, 0xff, 0xff, 0xff, 0xff, 0xff])
                .unwrap()
                .single(),
            Some(Value::Int(i64::MAX))
        );
    }
}
