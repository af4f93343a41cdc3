//! 24-bit integer types

/// 24-bit unsigned integer.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "bytemuck", derive(bytemuck::AnyBitPattern))]
#[repr(transparent)]
pub struct Uint24(u32);

/// 24-bit signed integer.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "bytemuck", derive(bytemuck::AnyBitPattern))]
#[repr(transparent)]
pub struct Int24(i32);

impl Uint24 {
    /// The smallest value that can be represented by this integer type.
    pub const MIN: Self = Uint24(0);

    /// The largest value that can be represented by this integer type.
    pub const MAX: Self = Uint24(0xff_ffff);

    /// Create from a u32. Saturates on overflow.
    pub const fn new(raw: u32) -> Uint24 {
        if raw > Self::MAX.0 {
            Self::MAX
        } else {
            Uint24(raw)
        }
    }

    /// Create from a u32, returning `None` if the value overflows.
    pub const fn checked_new(raw: u32) -> Option<Uint24> {
        if raw > Self::MAX.0 {
            None
        } else {
            Some(Uint24(raw))
        }
    }

    /// Returns this value as an unsigned 32-bit integer.
    pub const fn to_u32(self) -> u32 {
        self.0
    }

    pub const fn to_be_bytes(self) -> [u8; 3] {
        let [_, a, b, c] = self.0.to_be_bytes();
        [a, b, c]
    }

    pub const fn from_be_bytes(bytes: [u8; 3]) -> Self {
        Uint24((bytes[0] as u32) << 16 | (bytes[1] as u32) << 8 | bytes[2] as u32)
    }
}

impl Int24 {
    /// The smallest value that can be represented by this integer type.
    pub const MIN: Self = Int24(-0x80_0000);

    /// The largest value that can be represented by this integer type.
    pub const MAX: Self = Int24(0x7f_ffff);

    /// Create from an i32. Saturates on overflow.
    pub const fn new(raw: i32) -> Int24 {
        if raw > Self::MAX.0 {
            Self::MAX
        } else if raw < Self::MIN.0 {
            Self::MIN
        } else {
            Int24(raw)
        }
    }

    /// Create from an i32, returning `None` if the value overflows.
    pub const fn checked_new(raw: i32) -> Option<Int24> {
        if raw > Self::MAX.0 || raw < Self::MIN.0 {
            None
        } else {
            Some(Int24(raw))
        }
    }

    /// Returns this value as a signed 32-bit integer.
    pub const fn to_i32(self) -> i32 {
        self.0
    }

    pub const fn to_be_bytes(self) -> [u8; 3] {
        let [_, a, b, c] = self.0.to_be_bytes();
        [a, b, c]
    }

    pub const fn from_be_bytes(bytes: [u8; 3]) -> Self {
        // place the value in the high bytes and shift back to sign-extend
        let wide = i32::from_be_bytes([bytes[0], bytes[1], bytes[2], 0]);
        Int24(wide >> 8)
    }
}

impl From<Uint24> for u32 {
    fn from(src: Uint24) -> u32 {
        src.0
    }
}

impl From<Uint24> for usize {
    fn from(src: Uint24) -> usize {
        src.0 as usize
    }
}

impl From<Int24> for i32 {
    fn from(src: Int24) -> i32 {
        src.0
    }
}

impl std::fmt::Display for Uint24 {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        std::fmt::Display::fmt(&self.0, f)
    }
}

impl std::fmt::Display for Int24 {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        std::fmt::Display::fmt(&self.0, f)
    }
}
