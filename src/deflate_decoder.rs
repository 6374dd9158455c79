//! DEFLATE Decoder (RFC 1951)
//!
//! Decodes a raw deflate stream into a caller-provided, fully pre-allocated
//! output buffer. The whole output doubles as the LZ77 window, so
//! back-references are resolved directly against bytes already written.
//!
//! # Architecture
//!
//! - `BitReader` (LSB-first): bit-level stream reading
//! - `HuffmanTable`: literal/length and distance codes, rebuilt per block
//! - `DeflateDecoder`: block state machine, records a `BlockInfo` per block
//!
//! The zlib wrapper used by PNG lives in [`crate::zlib`].

use crate::bit_reader::{BitOrder, BitReader};
use crate::error::{CodecError, CodecResult};
use crate::huffman::HuffmanTable;
use crate::inflate_tables::{
    CODE_LENGTH_ORDER, DIST_EXTRA_BITS, DIST_START, END_OF_BLOCK, LEN_EXTRA_BITS, LEN_START,
    MAX_DIST_CODES, MAX_LITLEN_CODES,
};

/// Block encoding selected by the 2-bit BTYPE field
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BlockType {
    Stored,
    FixedHuffman,
    DynamicHuffman,
}

impl BlockType {
    fn from_bits(btype: u32) -> CodecResult<Self> {
        match btype {
            0 => Ok(BlockType::Stored),
            1 => Ok(BlockType::FixedHuffman),
            2 => Ok(BlockType::DynamicHuffman),
            _ => Err(CodecError::unsupported_block("reserved block type 3")),
        }
    }
}

/// Recorded block boundary
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BlockInfo {
    pub block_type: BlockType,
    pub is_final: bool,
    /// Bit offset of the block header in the compressed stream
    pub bit_offset: usize,
    /// Byte offset in decompressed output where the block starts
    pub output_offset: usize,
}

/// Main deflate decoder
pub struct DeflateDecoder<'a, 'o> {
    reader: BitReader<'a>,
    out: &'o mut [u8],
    pos: usize,
    blocks: Vec<BlockInfo>,
    fixed: Option<(HuffmanTable, HuffmanTable)>,
}

impl<'a, 'o> DeflateDecoder<'a, 'o> {
    /// Create a decoder over `data` writing into `out`
    pub fn new(data: &'a [u8], out: &'o mut [u8]) -> Self {
        Self {
            reader: BitReader::with_order(data, BitOrder::Lsb),
            out,
            pos: 0,
            blocks: Vec::new(),
            fixed: None,
        }
    }

    /// Decode blocks until the one flagged final; returns the output length
    pub fn decode(&mut self) -> CodecResult<usize> {
        loop {
            let bit_offset = self.reader.bit_position();
            let is_final = self.reader.read_bit()? == 1;
            let block_type = BlockType::from_bits(self.reader.read_bits(2)?)?;

            log::debug!(
                "deflate: {:?} block at bit {} (output {}){}",
                block_type,
                bit_offset,
                self.pos,
                if is_final { ", final" } else { "" }
            );

            self.blocks.push(BlockInfo {
                block_type,
                is_final,
                bit_offset,
                output_offset: self.pos,
            });

            match block_type {
                BlockType::Stored => self.decode_stored_block()?,
                BlockType::FixedHuffman => self.decode_fixed_block()?,
                BlockType::DynamicHuffman => self.decode_dynamic_block()?,
            }

            if is_final {
                break;
            }
        }

        Ok(self.pos)
    }

    /// Decode a stored block (BTYPE=00)
    fn decode_stored_block(&mut self) -> CodecResult<()> {
        self.reader.realign_to_byte();

        let len = self.reader.read_u16_le()?;
        let nlen = self.reader.read_u16_le()?;

        if len != !nlen {
            return Err(CodecError::ChecksumMismatch {
                what: "stored block LEN/NLEN",
                expected: (!nlen) as u32,
                found: len as u32,
            });
        }

        let len = len as usize;
        let bytes = self.reader.read_aligned_slice(len)?;
        self.reserve(len)?;
        self.out[self.pos..self.pos + len].copy_from_slice(bytes);
        self.pos += len;

        Ok(())
    }

    /// Decode a block with fixed Huffman codes (BTYPE=01)
    fn decode_fixed_block(&mut self) -> CodecResult<()> {
        // Built once per decoder, on first use
        let (litlen, dist) = match self.fixed.take() {
            Some(tables) => tables,
            None => (HuffmanTable::fixed_litlen(), HuffmanTable::fixed_dist()),
        };
        let result = self.decode_huffman_block(&litlen, &dist);
        self.fixed = Some((litlen, dist));
        result
    }

    /// Decode a block with dynamic Huffman codes (BTYPE=10)
    fn decode_dynamic_block(&mut self) -> CodecResult<()> {
        let (litlen, dist) = self.read_dynamic_tables()?;
        self.decode_huffman_block(&litlen, &dist)
    }

    /// Read the code length header of a dynamic block and build its codes
    fn read_dynamic_tables(&mut self) -> CodecResult<(HuffmanTable, HuffmanTable)> {
        let hlit = self.reader.read_bits_base(5, 257)? as usize;
        let hdist = self.reader.read_bits_base(5, 1)? as usize;
        let hclen = self.reader.read_bits_base(4, 4)? as usize;

        // HDIST may encode up to 32, but codes 30 and 31 carry no meaning
        if hlit > MAX_LITLEN_CODES || hdist > MAX_DIST_CODES {
            return Err(CodecError::unsupported_block(format!(
                "dynamic header declares {} literal/length and {} distance codes",
                hlit, hdist
            )));
        }

        let mut codelen_lengths = [0u8; 19];
        for &symbol in &CODE_LENGTH_ORDER[..hclen] {
            codelen_lengths[symbol] = self.reader.read_bits(3)? as u8;
        }
        let codelen_table = HuffmanTable::from_lengths(&codelen_lengths)?;

        let total = hlit + hdist;
        let mut lengths = [0u8; MAX_LITLEN_CODES + MAX_DIST_CODES];
        let mut i = 0;

        while i < total {
            let symbol = codelen_table.decode_symbol(&mut self.reader)?;

            let (value, repeat) = match symbol {
                0..=15 => (symbol as u8, 1),
                16 => {
                    if i == 0 {
                        return Err(CodecError::decode(
                            "repeat of previous code length with no previous length",
                        ));
                    }
                    (lengths[i - 1], self.reader.read_bits_base(2, 3)? as usize)
                }
                17 => (0, self.reader.read_bits_base(3, 3)? as usize),
                18 => (0, self.reader.read_bits_base(7, 11)? as usize),
                _ => {
                    return Err(CodecError::decode(format!(
                        "invalid code length symbol {}",
                        symbol
                    )))
                }
            };

            if repeat > total - i {
                return Err(CodecError::decode(format!(
                    "code length repeat of {} overruns {} remaining lengths",
                    repeat,
                    total - i
                )));
            }
            lengths[i..i + repeat].fill(value);
            i += repeat;
        }

        if lengths[END_OF_BLOCK as usize] == 0 {
            return Err(CodecError::unsupported_block(
                "dynamic block has no end-of-block code",
            ));
        }

        let litlen = HuffmanTable::from_lengths(&lengths[..hlit])?;
        let dist = HuffmanTable::from_lengths(&lengths[hlit..total])?;
        log::trace!(
            "deflate: dynamic tables, {} literal/length codes (max {} bits), {} distance codes",
            litlen.len(),
            litlen.max_len(),
            dist.len()
        );

        Ok((litlen, dist))
    }

    /// Decode a Huffman-coded block
    fn decode_huffman_block(
        &mut self,
        litlen_table: &HuffmanTable,
        dist_table: &HuffmanTable,
    ) -> CodecResult<()> {
        loop {
            let symbol = litlen_table.decode_symbol(&mut self.reader)?;

            if symbol < END_OF_BLOCK {
                self.push_literal(symbol as u8)?;
            } else if symbol == END_OF_BLOCK {
                break;
            } else {
                // Length/distance pair
                let length_code = (symbol - 257) as usize;
                if length_code >= LEN_START.len() {
                    return Err(CodecError::decode(format!(
                        "invalid length symbol {}",
                        symbol
                    )));
                }
                let length = self.reader.read_bits_base(
                    LEN_EXTRA_BITS[length_code] as usize,
                    LEN_START[length_code] as u32,
                )? as usize;

                let dist_code = dist_table.decode_symbol(&mut self.reader)? as usize;
                if dist_code >= DIST_START.len() {
                    return Err(CodecError::decode(format!(
                        "invalid distance symbol {}",
                        dist_code
                    )));
                }
                let distance = self.reader.read_bits_base(
                    DIST_EXTRA_BITS[dist_code] as usize,
                    DIST_START[dist_code] as u32,
                )? as usize;

                self.copy_match(distance, length)?;
            }
        }

        Ok(())
    }

    /// Fail unless `n` more bytes fit in the output
    #[inline]
    fn reserve(&self, n: usize) -> CodecResult<()> {
        if n > self.out.len() - self.pos {
            return Err(CodecError::overflow(self.pos + n, self.out.len()));
        }
        Ok(())
    }

    /// Output a literal byte
    #[inline]
    fn push_literal(&mut self, byte: u8) -> CodecResult<()> {
        self.reserve(1)?;
        self.out[self.pos] = byte;
        self.pos += 1;
        Ok(())
    }

    /// Copy from back-reference
    #[inline]
    fn copy_match(&mut self, distance: usize, length: usize) -> CodecResult<()> {
        if distance > self.pos {
            return Err(CodecError::InvalidBackReference {
                distance,
                available: self.pos,
            });
        }
        self.reserve(length)?;

        // Byte by byte: a distance shorter than the length repeats the
        // most recent bytes
        let start = self.pos;
        for i in start..start + length {
            self.out[i] = self.out[i - distance];
        }
        self.pos += length;
        Ok(())
    }

    /// Recorded block boundaries
    pub fn blocks(&self) -> &[BlockInfo] {
        &self.blocks
    }

    /// Current bit position in the compressed stream
    pub fn bit_position(&self) -> usize {
        self.reader.bit_position()
    }

    /// Compressed bytes consumed so far, including a partial last byte
    pub fn bytes_consumed(&self) -> usize {
        self.reader.bytes_consumed()
    }

    /// Total output bytes
    pub fn total_output(&self) -> usize {
        self.pos
    }
}

/// Inflate a raw deflate stream into `out`, returning the decoded length
pub fn inflate(data: &[u8], out: &mut [u8]) -> CodecResult<usize> {
    DeflateDecoder::new(data, out).decode()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils::{reverse_bits, Rng};
    use bitstream_io::{BitWrite, BitWriter, LittleEndian};
    use flate2::write::DeflateEncoder;
    use flate2::Compression;
    use std::io::Write;

    /// Writes deflate blocks bit by bit
    struct BlockWriter {
        bytes: Vec<u8>,
        bits: Vec<(u32, u32)>,
    }

    impl BlockWriter {
        fn empty() -> Self {
            Self {
                bytes: Vec::new(),
                bits: Vec::new(),
            }
        }

        fn fixed(is_final: bool) -> Self {
            let mut w = Self::empty();
            w.bits(is_final as u32, 1);
            w.bits(1, 2);
            w
        }

        /// Final dynamic block header up to and including the code length
        /// code lengths, given in transmission order (16, 17, 18, 0, ...)
        fn dynamic(hlit: u32, hdist: u32, codelen_lengths: &[u32]) -> Self {
            let mut w = Self::empty();
            w.bits(1, 1)
                .bits(2, 2)
                .bits(hlit - 257, 5)
                .bits(hdist - 1, 5)
                .bits(codelen_lengths.len() as u32 - 4, 4);
            for &len in codelen_lengths {
                w.bits(len, 3);
            }
            w
        }

        /// Value stored LSB first (headers, extra bits)
        fn bits(&mut self, value: u32, n: u32) -> &mut Self {
            self.bits.push((n, value));
            self
        }

        /// Huffman code stored MSB first
        fn code(&mut self, code: u32, len: u32) -> &mut Self {
            self.bits(reverse_bits(code, len), len)
        }

        fn literal(&mut self, byte: u8) -> &mut Self {
            if byte < 144 {
                self.code(0x30 + byte as u32, 8)
            } else {
                self.code(0x190 + (byte as u32 - 144), 9)
            }
        }

        /// Match with length 3..=10 and distance 1..=4 (no extra bits)
        fn short_match(&mut self, length: u32, distance: u32) -> &mut Self {
            self.code(length - 2, 7);
            self.code(distance - 1, 5)
        }

        fn end_of_block(&mut self) -> &mut Self {
            self.code(0, 7)
        }

        fn finish(&mut self) -> Vec<u8> {
            {
                let mut writer = BitWriter::endian(&mut self.bytes, LittleEndian);
                for &(n, value) in &self.bits {
                    writer.write(n, value).unwrap();
                }
                writer.byte_align().unwrap();
            }
            std::mem::take(&mut self.bytes)
        }
    }

    fn deflate(data: &[u8], level: u32) -> Vec<u8> {
        let mut encoder = DeflateEncoder::new(Vec::new(), Compression::new(level));
        encoder.write_all(data).unwrap();
        encoder.finish().unwrap()
    }

    #[test]
    fn test_stored_block() {
        let data = [0x01, 0x05, 0x00, 0xFA, 0xFF, 1, 2, 3, 4, 5];
        let mut out = [0u8; 16];
        let n = inflate(&data, &mut out).unwrap();
        assert_eq!(&out[..n], &[1, 2, 3, 4, 5]);
    }

    #[test]
    fn test_stored_block_bad_complement() {
        let data = [0x01, 0x05, 0x00, 0xFB, 0xFF, 1, 2, 3, 4, 5];
        let mut out = [0u8; 16];
        assert!(matches!(
            inflate(&data, &mut out),
            Err(CodecError::ChecksumMismatch { .. })
        ));
    }

    #[test]
    fn test_stored_block_truncated_payload() {
        let data = [0x01, 0x05, 0x00, 0xFA, 0xFF, 1, 2, 3];
        let mut out = [0u8; 16];
        assert!(matches!(
            inflate(&data, &mut out),
            Err(CodecError::StreamTruncated { .. })
        ));
    }

    #[test]
    fn test_overlapping_back_reference() {
        let data = BlockWriter::fixed(true)
            .literal(b'A')
            .literal(b'B')
            .short_match(3, 1)
            .end_of_block()
            .finish();
        let mut out = [0u8; 16];
        let n = inflate(&data, &mut out).unwrap();
        assert_eq!(&out[..n], b"ABBBB");

        let data = BlockWriter::fixed(true)
            .literal(b'A')
            .literal(b'B')
            .short_match(4, 2)
            .end_of_block()
            .finish();
        let n = inflate(&data, &mut out).unwrap();
        assert_eq!(&out[..n], b"ABABAB");
    }

    #[test]
    fn test_distance_beyond_output() {
        let data = BlockWriter::fixed(true)
            .literal(b'A')
            .short_match(3, 2)
            .end_of_block()
            .finish();
        let mut out = [0u8; 16];
        assert_eq!(
            inflate(&data, &mut out).unwrap_err(),
            CodecError::InvalidBackReference {
                distance: 2,
                available: 1
            }
        );
    }

    #[test]
    fn test_output_overflow() {
        let data = BlockWriter::fixed(true)
            .literal(b'x')
            .short_match(10, 1)
            .end_of_block()
            .finish();

        let mut exact = [0u8; 11];
        assert_eq!(inflate(&data, &mut exact).unwrap(), 11);

        let mut small = [0u8; 8];
        assert_eq!(
            inflate(&data, &mut small).unwrap_err(),
            CodecError::OutputOverflow {
                needed: 11,
                capacity: 8
            }
        );
        // nothing written past the literal
        assert_eq!(small, [b'x', 0, 0, 0, 0, 0, 0, 0]);
    }

    #[test]
    fn test_reserved_block_type() {
        // BFINAL=1, BTYPE=11
        assert!(matches!(
            inflate(&[0x07], &mut [0u8; 4]),
            Err(CodecError::UnsupportedBlockType(_))
        ));
    }

    #[test]
    fn test_dynamic_header_counts_out_of_range() {
        // HLIT = 287
        let data = BlockWriter::dynamic(287, 1, &[0, 0, 0, 0]).finish();
        assert!(matches!(
            inflate(&data, &mut [0u8; 16]),
            Err(CodecError::UnsupportedBlockType(_))
        ));

        // HDIST = 31
        let data = BlockWriter::dynamic(257, 31, &[0, 0, 0, 0]).finish();
        assert!(matches!(
            inflate(&data, &mut [0u8; 16]),
            Err(CodecError::UnsupportedBlockType(_))
        ));
    }

    #[test]
    fn test_dynamic_header_without_end_of_block() {
        // code length code: 0 -> "0", 18 -> "1"
        let data = BlockWriter::dynamic(257, 1, &[0, 0, 1, 1])
            .code(1, 1)
            .bits(127, 7) // 138 zeros
            .code(1, 1)
            .bits(109, 7) // 120 zeros: all 258 lengths are 0
            .finish();
        assert!(matches!(
            inflate(&data, &mut [0u8; 16]),
            Err(CodecError::UnsupportedBlockType(_))
        ));
    }

    #[test]
    fn test_dynamic_header_repeat_without_previous() {
        // code length code: 0 -> "0", 16 -> "1"; 16 comes first
        let data = BlockWriter::dynamic(257, 1, &[1, 0, 0, 1])
            .code(1, 1)
            .bits(0, 2)
            .finish();
        assert!(matches!(
            inflate(&data, &mut [0u8; 16]),
            Err(CodecError::DecodeError(_))
        ));
    }

    #[test]
    fn test_dynamic_header_repeat_overrun() {
        // code length code: 0 -> "0", 17 -> "10", 18 -> "11"
        let lengths = [0, 2, 2, 1];

        // 138 + 138 zeros for 258 lengths
        let data = BlockWriter::dynamic(257, 1, &lengths)
            .code(0b11, 2)
            .bits(127, 7)
            .code(0b11, 2)
            .bits(127, 7)
            .finish();
        assert!(matches!(
            inflate(&data, &mut [0u8; 16]),
            Err(CodecError::DecodeError(_))
        ));

        // 138 + 118 zeros leave 2 lengths; 17 repeats at least 3
        let data = BlockWriter::dynamic(257, 1, &lengths)
            .code(0b11, 2)
            .bits(127, 7)
            .code(0b11, 2)
            .bits(107, 7)
            .code(0b10, 2)
            .bits(0, 3)
            .finish();
        assert!(matches!(
            inflate(&data, &mut [0u8; 16]),
            Err(CodecError::DecodeError(_))
        ));
    }

    #[test]
    fn test_high_literals_and_multiple_blocks() {
        let mut first = BlockWriter::fixed(false);
        first.literal(200).literal(255).end_of_block();
        // second block: stored, final
        first.bits(1, 1).bits(0, 2);
        let mut data = first.finish();
        data.extend_from_slice(&[0x02, 0x00, 0xFD, 0xFF, 7, 8]);

        let mut out = [0u8; 8];
        let mut decoder = DeflateDecoder::new(&data, &mut out);
        let n = decoder.decode().unwrap();
        let blocks = decoder.blocks().to_vec();
        assert_eq!(n, 4);
        assert_eq!(&out[..n], &[200, 255, 7, 8]);
        assert_eq!(blocks.len(), 2);
        assert_eq!(blocks[0].block_type, BlockType::FixedHuffman);
        assert!(!blocks[0].is_final);
        assert_eq!(blocks[1].block_type, BlockType::Stored);
        assert_eq!(blocks[1].output_offset, 2);
        assert!(blocks[1].is_final);
    }

    #[test]
    fn test_dynamic_block_from_flate2() {
        let original = b"Hello, World! Hello, World! ".repeat(40);
        let compressed = deflate(&original, 9);

        let mut out = vec![0u8; original.len()];
        let mut decoder = DeflateDecoder::new(&compressed, &mut out);
        let n = decoder.decode().unwrap();
        assert!(decoder
            .blocks()
            .iter()
            .any(|b| b.block_type != BlockType::Stored));
        assert_eq!(decoder.bytes_consumed(), compressed.len());
        assert_eq!(n, original.len());
        assert_eq!(out, original);
    }

    #[test]
    fn test_round_trip_levels() {
        let mut rng = Rng::new(42);
        let mut original = Vec::new();
        for _ in 0..20_000 {
            // skewed alphabet with runs
            let byte = b"abcdefgh  \n"[rng.below(11) as usize];
            let run = 1 + rng.below(4) as usize;
            original.extend(std::iter::repeat(byte).take(run));
        }

        for level in [0, 1, 6, 9] {
            let compressed = deflate(&original, level);
            let mut out = vec![0u8; original.len()];
            let n = inflate(&compressed, &mut out).unwrap();
            assert_eq!(n, original.len(), "level {}", level);
            assert_slices_eq!(out, original, format!("level {}", level));
        }
    }

    #[test]
    fn test_corrupt_input_never_panics() {
        let original = b"The quick brown fox jumps over the lazy dog. ".repeat(30);
        let compressed = deflate(&original, 6);

        for cut in 0..compressed.len() {
            let mut out = vec![0u8; original.len()];
            if let Ok(n) = inflate(&compressed[..cut], &mut out) {
                assert!(n <= out.len());
            }
        }

        let mut rng = Rng::new(99);
        for _ in 0..500 {
            let mut corrupt = compressed.clone();
            let idx = rng.below(corrupt.len() as u32) as usize;
            corrupt[idx] ^= 1 << rng.below(8);
            let mut out = vec![0u8; 64];
            if let Ok(n) = inflate(&corrupt, &mut out) {
                assert!(n <= 64);
            }
        }
    }
}
