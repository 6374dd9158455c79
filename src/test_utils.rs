#[macro_export]
macro_rules! assert_slices_eq {
    ($left:expr, $right:expr) => {
        let left = &$left[..];
        let right = &$right[..];
        if left != right {
            if left.len() != right.len() {
                panic!(
                    "assertion failed: `(left == right)`\n  left len: {},\n right len: {}",
                    left.len(),
                    right.len()
                );
            }
            for (i, (a, b)) in left.iter().zip(right.iter()).enumerate() {
                if a != b {
                    let start = i.saturating_sub(16);
                    let end = (i + 16).min(left.len());
                    panic!(
                        "assertion failed: `(left == right)` at index {}\n  left[{:?}]: {:02X?}\n right[{:?}]: {:02X?}\n context around index {}:\n left:  {:02X?}\n right: {:02X?}",
                        i, i, a, i, b, i, &left[start..end], &right[start..end]
                    );
                }
            }
        }
    };
    ($left:expr, $right:expr, $msg:expr) => {
        let left = &$left[..];
        let right = &$right[..];
        if left != right {
            if left.len() != right.len() {
                panic!(
                    "assertion failed: `(left == right)`: {}\n  left len: {},\n right len: {}",
                    $msg,
                    left.len(),
                    right.len()
                );
            }
            for (i, (a, b)) in left.iter().zip(right.iter()).enumerate() {
                if a != b {
                    let start = i.saturating_sub(16);
                    let end = (i + 16).min(left.len());
                    panic!(
                        "assertion failed: `(left == right)`: {}\n at index {}\n  left[{:?}]: {:02X?}\n right[{:?}]: {:02X?}\n context around index {}:\n left:  {:02X?}\n right: {:02X?}",
                        $msg, i, i, a, i, b, i, &left[start..end], &right[start..end]
                    );
                }
            }
        }
    };
}

/// Deterministic LCG for test data
pub struct Rng(u64);

impl Rng {
    pub fn new(seed: u64) -> Self {
        Rng(seed ^ 0x9E37_79B9_7F4A_7C15)
    }

    pub fn next_u32(&mut self) -> u32 {
        self.0 = self
            .0
            .wrapping_mul(6364136223846793005)
            .wrapping_add(1442695040888963407);
        (self.0 >> 33) as u32
    }

    /// Uniform-ish value in `0..n`
    pub fn below(&mut self, n: u32) -> u32 {
        self.next_u32() % n
    }
}

/// Reverse the low `len` bits of `code` (Huffman codes are stored
/// MSB-first inside LSB-first deflate streams)
pub fn reverse_bits(code: u32, len: u32) -> u32 {
    if len == 0 {
        return 0;
    }
    code.reverse_bits() >> (32 - len)
}

#[test]
fn test_reverse_bits() {
    assert_eq!(reverse_bits(0b1, 1), 0b1);
    assert_eq!(reverse_bits(0b110, 3), 0b011);
    assert_eq!(reverse_bits(0b0011_0000, 8), 0b0000_1100);
    assert_eq!(reverse_bits(5, 0), 0);
}
