//! Types that know how to write themselves

use font_types::{F2Dot14, Fixed, Int24, Uint24};

use crate::{LinkedWriter, WriteError};

/// A type that can be written to a [`LinkedWriter`].
///
/// Table codecs implement this to write their fields, including offsets to
/// their subtables, propagating errors with `?`.
pub trait BuildBinary {
    fn build_binary(&self, writer: &mut LinkedWriter) -> Result<(), WriteError>;
}

/// Build `obj` with a fresh writer and return the finalized bytes.
pub fn dump<T: BuildBinary + ?Sized>(obj: &T) -> Result<Vec<u8>, WriteError> {
    let mut writer = LinkedWriter::new();
    obj.build_binary(&mut writer)?;
    writer.finalize()
}

macro_rules! build_be_bytes {
    ($ty:ty) => {
        impl BuildBinary for $ty {
            #[inline]
            fn build_binary(&self, writer: &mut LinkedWriter) -> Result<(), WriteError> {
                writer.add(*self);
                Ok(())
            }
        }
    };
}

build_be_bytes!(u8);
build_be_bytes!(i8);
build_be_bytes!(u16);
build_be_bytes!(i16);
build_be_bytes!(u32);
build_be_bytes!(i32);
build_be_bytes!(u64);
build_be_bytes!(i64);
build_be_bytes!(Uint24);
build_be_bytes!(Int24);
build_be_bytes!(Fixed);
build_be_bytes!(F2Dot14);

impl<T: BuildBinary> BuildBinary for [T] {
    fn build_binary(&self, writer: &mut LinkedWriter) -> Result<(), WriteError> {
        self.iter().try_for_each(|item| item.build_binary(writer))
    }
}

impl<T: BuildBinary> BuildBinary for Vec<T> {
    fn build_binary(&self, writer: &mut LinkedWriter) -> Result<(), WriteError> {
        self.as_slice().build_binary(writer)
    }
}
