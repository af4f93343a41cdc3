//! types for working with raw big-endian bytes

/// A fixed-size array of big-endian bytes.
///
/// This is the raw representation of a [`Scalar`]. It is implemented for
/// `[u8; N]`, and there is no reason to implement it for anything else.
pub trait BeByteArray: Copy + AsRef<[u8]> {
    /// The number of bytes in the array.
    const LEN: usize;

    /// Copy the first `Self::LEN` bytes of `slice`, if there are enough.
    fn from_slice(slice: &[u8]) -> Option<Self>;
}

impl<const N: usize> BeByteArray for [u8; N] {
    const LEN: usize = N;

    #[inline]
    fn from_slice(slice: &[u8]) -> Option<Self> {
        slice.get(..N)?.try_into().ok()
    }
}

/// A trait for font scalars.
///
/// This is an internal trait for encoding and decoding big-endian bytes.
/// All values in the formats handled by this workspace are big-endian.
pub trait Scalar: Sized + Copy {
    /// The raw byte representation of this type.
    type Raw: BeByteArray;

    /// The size of the raw type, in bytes.
    const RAW_BYTE_LEN: usize = <Self::Raw as BeByteArray>::LEN;

    /// Create an instance of this type from raw big-endian bytes
    fn from_raw(raw: Self::Raw) -> Self;

    /// Encode this type as raw big-endian bytes
    fn to_raw(self) -> Self::Raw;

    /// Attempt to read a scalar from the front of a slice.
    ///
    /// Returns `None` if the slice is shorter than `Self::RAW_BYTE_LEN`.
    #[inline]
    fn read(slice: &[u8]) -> Option<Self> {
        <Self::Raw as BeByteArray>::from_slice(slice).map(Self::from_raw)
    }
}

macro_rules! int_scalar {
    ($ty:ty, $len:literal) => {
        impl Scalar for $ty {
            type Raw = [u8; $len];

            #[inline]
            fn to_raw(self) -> [u8; $len] {
                self.to_be_bytes()
            }

            #[inline]
            fn from_raw(raw: [u8; $len]) -> $ty {
                Self::from_be_bytes(raw)
            }
        }
    };
}

int_scalar!(u8, 1);
int_scalar!(i8, 1);
int_scalar!(u16, 2);
int_scalar!(i16, 2);
int_scalar!(u32, 4);
int_scalar!(i32, 4);
int_scalar!(u64, 8);
int_scalar!(i64, 8);
int_scalar!(crate::Uint24, 3);
int_scalar!(crate::Int24, 3);
