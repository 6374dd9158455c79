//! Constant tables of RFC 1951

/// End of block symbol
pub const END_OF_BLOCK: u16 = 256;

/// Literal/length symbols allowed in a dynamic header (HLIT + 257)
pub const MAX_LITLEN_CODES: usize = 286;

/// Distance symbols allowed in a dynamic header (HDIST + 1)
pub const MAX_DIST_CODES: usize = 30;

/// Size of the fixed literal/length alphabet
pub const FIXED_LITLEN_CODES: usize = 288;

/// Size of the fixed distance alphabet
pub const FIXED_DIST_CODES: usize = 32;

/// Maximum back-reference distance (32KB)
pub const WINDOW_SIZE: usize = 32 * 1024;

/// Base lengths for length symbols 257..=285
pub const LEN_START: [u16; 29] = [
    3, 4, 5, 6, 7, 8, 9, 10, 11, 13, 15, 17, 19, 23, 27, 31, 35, 43, 51, 59, 67, 83, 99, 115, 131,
    163, 195, 227, 258,
];

/// Extra bits for length symbols 257..=285
pub const LEN_EXTRA_BITS: [u8; 29] = [
    0, 0, 0, 0, 0, 0, 0, 0, 1, 1, 1, 1, 2, 2, 2, 2, 3, 3, 3, 3, 4, 4, 4, 4, 5, 5, 5, 5, 0,
];

/// Base distances for distance symbols 0..=29
pub const DIST_START: [u16; 30] = [
    1, 2, 3, 4, 5, 7, 9, 13, 17, 25, 33, 49, 65, 97, 129, 193, 257, 385, 513, 769, 1025, 1537,
    2049, 3073, 4097, 6145, 8193, 12289, 16385, 24577,
];

/// Extra bits for distance symbols 0..=29
pub const DIST_EXTRA_BITS: [u8; 30] = [
    0, 0, 0, 0, 1, 1, 2, 2, 3, 3, 4, 4, 5, 5, 6, 6, 7, 7, 8, 8, 9, 9, 10, 10, 11, 11, 12, 12, 13,
    13,
];

/// Order in which code length code lengths are stored in a dynamic header
pub const CODE_LENGTH_ORDER: [usize; 19] = [
    16, 17, 18, 0, 8, 7, 9, 6, 10, 5, 11, 4, 12, 3, 13, 2, 14, 1, 15,
];

/// Code lengths of the fixed literal/length code (BTYPE=01)
pub fn fixed_litlen_lengths() -> [u8; FIXED_LITLEN_CODES] {
    let mut lengths = [0u8; FIXED_LITLEN_CODES];
    lengths[..144].fill(8);
    lengths[144..256].fill(9);
    lengths[256..280].fill(7);
    lengths[280..].fill(8);
    lengths
}

/// Code lengths of the fixed distance code (BTYPE=01)
pub fn fixed_dist_lengths() -> [u8; FIXED_DIST_CODES] {
    [5u8; FIXED_DIST_CODES]
}
