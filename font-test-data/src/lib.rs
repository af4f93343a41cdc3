//! test data shared between the font-walker and font-writer crates.

pub mod bebuffer;

/// A count followed by two `u16` values.
pub static COUNTED_U16S: &[u8] = &[0x00, 0x02, 0x00, 0x00, 0x00, 0x03];

/// A table whose two subtables use different offset conventions.
///
/// The header's first offset is measured from the table start; the first
/// subtable's own offset is measured from that subtable.
pub mod nested {
    #[rustfmt::skip]
    pub static TABLE: &[u8] = &[
        0x00, 0x01,             // version
        0x00, 0x08,             // offset to subtable A, from table start
        0x00, 0x02,             // count
        0xff, 0xff,             // padding
        // subtable A (at 8)
        0x00, 0x05,             // value
        0x00, 0x06,             // offset to subtable B, from subtable A
        0xee, 0xee,             // padding
        // subtable B (at 14)
        0x12, 0x34, 0x56, 0x78,
    ];

    pub const SUBTABLE_A: usize = 8;
    pub const SUBTABLE_B: usize = 14;
}

/// A 5x3 monochrome bitmap with one bit per pixel, rows packed
/// without padding.
pub mod bitmap {
    #[rustfmt::skip]
    pub static PACKED_ROWS: &[u8] = &[
        0b1000_1010, // row 0: 10001, row 1 starts: 010
        0b1000_1000, // row 1 ends: 10, row 2: 00100, padding: 0
    ];

    pub const ROWS: [u32; 3] = [0b10001, 0b01010, 0b00100];
    pub const WIDTH: u32 = 5;
}
