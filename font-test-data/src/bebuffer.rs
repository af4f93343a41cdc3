//! small utilities used in tests

use font_types::Scalar;
use std::collections::HashMap;

/// A convenience type for generating a buffer of big-endian bytes.
#[derive(Debug, Clone, Default)]
pub struct BeBuffer {
    data: Vec<u8>,
    tagged_locations: HashMap<String, usize>,
}

impl BeBuffer {
    pub fn new() -> Self {
        Default::default()
    }

    /// The current length of the buffer in bytes.
    pub fn len(&self) -> usize {
        self.data.len()
    }

    /// Returns `true` if the buffer contains zero bytes.
    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    /// Return a reference to the contents of the buffer
    pub fn as_slice(&self) -> &[u8] {
        &self.data
    }

    /// Write any scalar to this buffer.
    pub fn push(mut self, item: impl Scalar) -> Self {
        self.data.extend(item.to_raw().as_ref());
        self
    }

    pub fn push_with_tag(mut self, item: impl Scalar, tag: &str) -> Self {
        self.tagged_locations
            .insert(tag.to_string(), self.data.len());
        self.data.extend(item.to_raw().as_ref());
        self
    }

    /// Write multiple scalars into the buffer
    pub fn extend<T: Scalar>(mut self, iter: impl IntoIterator<Item = T>) -> Self {
        for item in iter {
            self.data.extend(item.to_raw().as_ref());
        }
        self
    }

    /// The offset of the item pushed with `tag`.
    ///
    /// Panics if the tag was never used.
    pub fn offset_for(&self, tag: &str) -> usize {
        self.tagged_locations[tag]
    }
}

impl std::ops::Deref for BeBuffer {
    type Target = [u8];
    fn deref(&self) -> &Self::Target {
        &self.data
    }
}

/// Build a [`BeBuffer`] from a list of scalars.
///
/// Items are literals (`4u16`), parenthesized expressions (`(x as u32)`),
/// arrays of literals (`[1u8, 2, 3]`) or tagged items (`{0u16: "offset"}`),
/// whose position can later be looked up with [`BeBuffer::offset_for`].
#[macro_export]
macro_rules! be_buffer {
    ( $( $item:tt ),* $(,)? ) => {{
        let builder = $crate::bebuffer::BeBuffer::new();
        $(
            let builder = $crate::be_buffer_add!(builder, $item);
        )*
        builder
    }};
}

#[doc(hidden)]
#[macro_export]
macro_rules! be_buffer_add {
    ($b:ident, $v:literal) => {
        $b.push($v)
    };
    ($b:ident, [$($v:literal),+ $(,)?]) => {
        $b.extend([$($v),*])
    };
    ($b:ident, {$v:tt : $tag:literal}) => {
        $b.push_with_tag($v, $tag)
    };
    ($b:ident, ($v:expr)) => {
        $b.push($v)
    };
}
