//! fixed-point numerical types

// shared between Fixed and F2Dot14
macro_rules! fixed_impl {
    ($name:ident, $bits:literal, $fract_bits:literal, $ty:ty, $len:literal) => {
        #[derive(Copy, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
        #[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
        #[cfg_attr(feature = "bytemuck", derive(bytemuck::AnyBitPattern))]
        #[repr(transparent)]
        #[doc = concat!(stringify!($bits), "-bit signed fixed point number with ", stringify!($fract_bits), " bits of fraction." )]
        pub struct $name($ty);

        impl $name {
            /// Minimum value.
            pub const MIN: Self = Self(<$ty>::MIN);

            /// Maximum value.
            pub const MAX: Self = Self(<$ty>::MAX);

            /// This type's smallest representable value
            pub const EPSILON: Self = Self(1);

            /// Representation of 0.0.
            pub const ZERO: Self = Self(0);

            /// Representation of 1.0.
            pub const ONE: Self = Self(1 << $fract_bits);

            const FRACT_BITS: u32 = $fract_bits;

            /// Creates a new fixed point value from the underlying bit representation.
            pub const fn from_bits(bits: $ty) -> Self {
                Self(bits)
            }

            /// Returns the underlying bit representation of the value.
            pub const fn to_bits(self) -> $ty {
                self.0
            }

            /// Creates a fixed point value from an integer, saturating on overflow.
            pub fn from_i32(int: i32) -> Self {
                let wide = (int as i64) << Self::FRACT_BITS;
                Self(wide.clamp(<$ty>::MIN as i64, <$ty>::MAX as i64) as $ty)
            }

            /// Creates a fixed point value from a float.
            ///
            /// This operation is lossy; the float will be rounded to the nearest
            /// representable value, saturating at the bounds of the type.
            pub fn from_f64(x: f64) -> Self {
                let scaled = (x * (1u64 << Self::FRACT_BITS) as f64).round();
                Self(scaled.clamp(<$ty>::MIN as f64, <$ty>::MAX as f64) as $ty)
            }

            /// Returns the value as an f64.
            ///
            /// This operation is lossless: all representable values can be
            /// round-tripped.
            pub fn to_f64(self) -> f64 {
                self.0 as f64 / (1u64 << Self::FRACT_BITS) as f64
            }
        }

        impl crate::raw::Scalar for $name {
            type Raw = [u8; $len];

            fn to_raw(self) -> [u8; $len] {
                self.0.to_be_bytes()
            }

            fn from_raw(raw: [u8; $len]) -> Self {
                Self(<$ty>::from_be_bytes(raw))
            }
        }

        //hack: we can losslessly go to float, so use those fmt impls
        impl std::fmt::Display for $name {
            fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
                std::fmt::Display::fmt(&self.to_f64(), f)
            }
        }

        impl std::fmt::Debug for $name {
            fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
                write!(f, "{}({})", stringify!($name), self.to_f64())
            }
        }
    };
}

fixed_impl!(F2Dot14, 16, 14, i16, 2);
fixed_impl!(Fixed, 32, 16, i32, 4);
