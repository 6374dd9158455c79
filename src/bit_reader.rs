//! Bit cursor over an in-memory byte buffer.
//!
//! JPEG scan data and new-style TIFF LZW pack bits MSB-first; DEFLATE and
//! GIF pack them LSB-first. A single cursor type serves both, selected by
//! [`BitOrder`] when the reader is created.
//!
//! The cursor never reads outside its slice: every read checks the number
//! of remaining bits first and fails with
//! [`CodecError::StreamTruncated`] without moving.

use crate::error::{CodecError, CodecResult};

/// Which end of each byte is consumed first.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum BitOrder {
    /// Bit 7 of each byte first (JPEG, TIFF)
    #[default]
    Msb,
    /// Bit 0 of each byte first (DEFLATE, GIF)
    Lsb,
}

/// Bit-level reader over a borrowed byte slice
#[derive(Debug, Clone)]
pub struct BitReader<'a> {
    data: &'a [u8],
    bit_pos: usize,
    order: BitOrder,
}

impl<'a> BitReader<'a> {
    /// MSB-first reader starting at bit 0
    pub fn new(data: &'a [u8]) -> Self {
        Self::with_order(data, BitOrder::Msb)
    }

    pub fn with_order(data: &'a [u8], order: BitOrder) -> Self {
        Self {
            data,
            bit_pos: 0,
            order,
        }
    }

    #[inline]
    pub fn order(&self) -> BitOrder {
        self.order
    }

    /// Current bit position in stream
    #[inline]
    pub fn bit_position(&self) -> usize {
        self.bit_pos
    }

    /// Total number of bits in the underlying buffer
    #[inline]
    pub fn len_bits(&self) -> usize {
        self.data.len() * 8
    }

    #[inline]
    pub fn bits_remaining(&self) -> usize {
        self.len_bits() - self.bit_pos
    }

    /// True if `n` more bits can be read without failure
    #[inline]
    pub fn peek_available(&self, n: usize) -> bool {
        n <= self.bits_remaining()
    }

    #[inline]
    pub fn is_eof(&self) -> bool {
        self.bit_pos >= self.len_bits()
    }

    #[inline]
    pub fn is_aligned(&self) -> bool {
        self.bit_pos % 8 == 0
    }

    /// Bytes touched so far, counting a partially consumed byte as whole
    #[inline]
    pub fn bytes_consumed(&self) -> usize {
        (self.bit_pos + 7) / 8
    }

    #[inline]
    fn truncated(&self, needed: usize) -> CodecError {
        CodecError::StreamTruncated {
            position: self.bit_pos,
            needed,
            available: self.bits_remaining(),
        }
    }

    #[inline]
    fn ensure(&self, n: usize) -> CodecResult<()> {
        if self.peek_available(n) {
            Ok(())
        } else {
            Err(self.truncated(n))
        }
    }

    /// Bit at absolute position `pos`; caller guarantees `pos < len_bits()`
    #[inline]
    fn bit_at(&self, pos: usize) -> u32 {
        let byte = self.data[pos >> 3];
        let shift = match self.order {
            BitOrder::Msb => 7 - (pos & 7),
            BitOrder::Lsb => pos & 7,
        };
        ((byte >> shift) & 1) as u32
    }

    /// Read a single bit
    #[inline]
    pub fn read_bit(&mut self) -> CodecResult<u8> {
        self.ensure(1)?;
        let bit = self.bit_at(self.bit_pos);
        self.bit_pos += 1;
        Ok(bit as u8)
    }

    /// Read `n` bits (up to 32).
    ///
    /// MSB order: the first bit read is the most significant bit of the
    /// result. LSB order: the first bit read is the least significant bit,
    /// which is how DEFLATE stores lengths and extra bits.
    pub fn read_bits(&mut self, n: usize) -> CodecResult<u32> {
        if n > 32 {
            return Err(CodecError::invalid_parameter(format!(
                "cannot read {} bits at once",
                n
            )));
        }
        self.ensure(n)?;

        let mut value = 0u32;
        match self.order {
            BitOrder::Msb => {
                for i in 0..n {
                    value = (value << 1) | self.bit_at(self.bit_pos + i);
                }
            }
            BitOrder::Lsb => {
                for i in 0..n {
                    value |= self.bit_at(self.bit_pos + i) << i;
                }
            }
        }
        self.bit_pos += n;
        Ok(value)
    }

    /// Read `n` bits with the first bit as most significant, whatever the
    /// byte order. Huffman codewords are stored this way in every format.
    pub fn read_code(&mut self, n: usize) -> CodecResult<u32> {
        let (value, available) = self.peek_code(n)?;
        if available < n {
            return Err(self.truncated(n));
        }
        self.bit_pos += n;
        Ok(value)
    }

    /// Look at the next `n` bits (first bit most significant) without
    /// consuming them. Bits past the end read as zero; the second value is
    /// how many of the `n` bits really exist.
    pub fn peek_code(&self, n: usize) -> CodecResult<(u32, usize)> {
        if n > 32 {
            return Err(CodecError::invalid_parameter(format!(
                "cannot peek {} bits at once",
                n
            )));
        }
        let available = n.min(self.bits_remaining());
        let mut value = 0u32;
        for i in 0..available {
            value = (value << 1) | self.bit_at(self.bit_pos + i);
        }
        if available < n {
            value = value.checked_shl((n - available) as u32).unwrap_or(0);
        }
        Ok((value, available))
    }

    /// Read `n` bits and add `base`; `n == 0` yields `base` unchanged
    #[inline]
    pub fn read_bits_base(&mut self, n: usize, base: u32) -> CodecResult<u32> {
        if n == 0 {
            return Ok(base);
        }
        Ok(base + self.read_bits(n)?)
    }

    pub fn skip_bits(&mut self, n: usize) -> CodecResult<()> {
        self.ensure(n)?;
        self.bit_pos += n;
        Ok(())
    }

    /// Rewind the cursor by `n` bits. Rewinding past the start fails and
    /// leaves the cursor where it was.
    pub fn step_back(&mut self, n: usize) -> CodecResult<()> {
        if n > self.bit_pos {
            return Err(CodecError::invalid_parameter(format!(
                "cannot step back {} bits from bit {}",
                n, self.bit_pos
            )));
        }
        self.bit_pos -= n;
        Ok(())
    }

    /// Drop the rest of a partially consumed byte
    #[inline]
    pub fn realign_to_byte(&mut self) {
        self.bit_pos = (self.bit_pos + 7) & !7;
    }

    #[inline]
    fn ensure_aligned(&self) -> CodecResult<()> {
        if self.is_aligned() {
            Ok(())
        } else {
            Err(CodecError::invalid_parameter(format!(
                "byte read at unaligned bit {}",
                self.bit_pos
            )))
        }
    }

    /// Read a whole byte; the cursor must be byte aligned
    pub fn read_aligned_byte(&mut self) -> CodecResult<u8> {
        self.ensure_aligned()?;
        self.ensure(8)?;
        let byte = self.data[self.bit_pos >> 3];
        self.bit_pos += 8;
        Ok(byte)
    }

    /// Little-endian u16 from two aligned bytes, independent of host order
    pub fn read_u16_le(&mut self) -> CodecResult<u16> {
        self.ensure_aligned()?;
        self.ensure(16)?;
        let lo = self.read_aligned_byte()?;
        let hi = self.read_aligned_byte()?;
        Ok(u16::from_le_bytes([lo, hi]))
    }

    /// Borrow the next `len` bytes; the cursor must be byte aligned
    pub fn read_aligned_slice(&mut self, len: usize) -> CodecResult<&'a [u8]> {
        self.ensure_aligned()?;
        self.ensure(len.saturating_mul(8))?;
        let start = self.bit_pos >> 3;
        self.bit_pos += len * 8;
        Ok(&self.data[start..start + len])
    }

    /// Bytes after the current (aligned) position
    pub fn remaining_bytes(&self) -> &'a [u8] {
        &self.data[self.bytes_consumed().min(self.data.len())..]
    }
}
