//! Canonical Huffman tables with a fast/slow lookup split
//!
//! A table is built either from per-length code counts (the JPEG `DHT`
//! layout) or from a per-symbol code length array (DEFLATE). Decoding uses
//! two levels:
//!
//! - **Fast**: a dense `2^FAST_BITS` array indexed by the next 8 bits of
//!   the stream, holding `(symbol, length)` for every code of length ≤ 8
//! - **Slow**: for each longer length, the list of `(codeword, symbol)`
//!   pairs, scanned linearly one extra bit at a time
//!
//! Tables are immutable once built and hold no cursor; the bit position
//! lives in the caller's [`BitReader`] or [`HuffmanSession`].

use crate::bit_reader::BitReader;
use crate::error::{CodecError, CodecResult};

/// Width of the dense lookup table
pub const FAST_BITS: usize = 8;
const FAST_SIZE: usize = 1 << FAST_BITS;

/// Longest code any table may contain (JPEG allows 16)
pub const MAX_CODE_LEN: usize = 16;

/// Dense table entry; `len == 0` marks a miss
#[derive(Debug, Clone, Copy, Default)]
struct FastEntry {
    symbol: u16,
    len: u8,
}

#[derive(Debug, Clone, Copy)]
struct SlowCode {
    code: u16,
    symbol: u16,
}

/// Canonical Huffman code with its derived fast/slow decode tables
#[derive(Debug, Clone)]
pub struct HuffmanTable {
    fast: Vec<FastEntry>,
    /// Indexed by `len - FAST_BITS - 1`
    slow: Vec<Vec<SlowCode>>,
    /// Number of codes of each length, index 0 unused
    counts: [u16; MAX_CODE_LEN + 1],
    /// Symbols in canonical (code) order
    symbols: Vec<u16>,
    max_len: usize,
}

impl HuffmanTable {
    /// Build from code counts per length and symbols in canonical order.
    ///
    /// `counts[i]` is the number of codes of length `i + 1`; `symbols`
    /// lists the symbols by ascending code length exactly as a JPEG `DHT`
    /// segment stores them. The code may leave code space unused (JPEG
    /// never assigns the all-ones code); it must not be oversubscribed.
    pub fn build<S: Copy + Into<u16>>(counts: &[u8], symbols: &[S]) -> CodecResult<Self> {
        if counts.len() > MAX_CODE_LEN {
            return Err(CodecError::InvalidSymbolTable(format!(
                "{} code lengths given, at most {} supported",
                counts.len(),
                MAX_CODE_LEN
            )));
        }

        let mut per_len = [0u16; MAX_CODE_LEN + 1];
        for (i, &count) in counts.iter().enumerate() {
            per_len[i + 1] = count as u16;
        }

        let total: usize = per_len.iter().map(|&c| c as usize).sum();
        if symbols.len() < total {
            return Err(CodecError::InvalidSymbolTable(format!(
                "{} codes declared but only {} symbols given",
                total,
                symbols.len()
            )));
        }

        check_code_space(&per_len)?;

        let symbols = symbols[..total].iter().map(|&s| s.into()).collect();
        Ok(Self::assemble(per_len, symbols))
    }

    /// Build from a code length per symbol (0 = symbol unused).
    ///
    /// Symbols of equal length are ordered by symbol index using a
    /// distribution sort over per-length offsets. The code must be
    /// complete, except for a single code of length 1 or no codes at all
    /// (a DEFLATE block holding only literals may have an empty distance
    /// code).
    pub fn from_lengths(lengths: &[u8]) -> CodecResult<Self> {
        let mut counts = [0u16; MAX_CODE_LEN + 1];
        for (symbol, &len) in lengths.iter().enumerate() {
            if len as usize > MAX_CODE_LEN {
                return Err(CodecError::InvalidSymbolTable(format!(
                    "symbol {} has code length {}",
                    symbol, len
                )));
            }
            if len > 0 {
                counts[len as usize] += 1;
            }
        }

        let unused = check_code_space(&counts)?;

        // Offset of the first symbol of each length in canonical order
        let mut offsets = [0usize; MAX_CODE_LEN + 2];
        for len in 1..=MAX_CODE_LEN {
            offsets[len + 1] = offsets[len] + counts[len] as usize;
        }
        let num_codes = offsets[MAX_CODE_LEN + 1];

        if (num_codes > 1 && unused > 0) || (num_codes == 1 && counts[1] != 1) {
            return Err(CodecError::IncompleteCode { codes: num_codes });
        }

        let mut symbols = vec![0u16; num_codes];
        for (symbol, &len) in lengths.iter().enumerate() {
            if len > 0 {
                symbols[offsets[len as usize]] = symbol as u16;
                offsets[len as usize] += 1;
            }
        }

        Ok(Self::assemble(counts, symbols))
    }

    /// Assign canonical codewords and fill the fast and slow tables.
    /// Code space has already been checked.
    fn assemble(counts: [u16; MAX_CODE_LEN + 1], symbols: Vec<u16>) -> Self {
        let max_len = (1..=MAX_CODE_LEN)
            .rev()
            .find(|&len| counts[len] > 0)
            .unwrap_or(0);

        let mut fast = vec![FastEntry::default(); FAST_SIZE];
        let mut slow = vec![Vec::new(); MAX_CODE_LEN - FAST_BITS];

        let mut code = 0u32;
        let mut next = 0usize;
        for len in 1..=max_len {
            for _ in 0..counts[len] {
                let symbol = symbols[next];
                if len <= FAST_BITS {
                    // Every pattern starting with this code maps to it
                    let shift = FAST_BITS - len;
                    let base = (code << shift) as usize;
                    let entry = FastEntry {
                        symbol,
                        len: len as u8,
                    };
                    fast[base..base + (1 << shift)].fill(entry);
                } else {
                    slow[len - FAST_BITS - 1].push(SlowCode {
                        code: code as u16,
                        symbol,
                    });
                }
                code += 1;
                next += 1;
            }
            code <<= 1;
        }

        log::trace!(
            "huffman: built {} codes, max length {}",
            symbols.len(),
            max_len
        );

        Self {
            fast,
            slow,
            counts,
            symbols,
            max_len,
        }
    }

    /// Fixed literal/length code of DEFLATE block type 1
    pub fn fixed_litlen() -> Self {
        // The fixed lengths form a complete code
        Self::from_lengths(&crate::inflate_tables::fixed_litlen_lengths())
            .unwrap_or_else(|_| unreachable!("fixed literal/length code is complete"))
    }

    /// Fixed distance code of DEFLATE block type 1
    pub fn fixed_dist() -> Self {
        Self::from_lengths(&crate::inflate_tables::fixed_dist_lengths())
            .unwrap_or_else(|_| unreachable!("fixed distance code is complete"))
    }

    /// Longest code length in use (0 for an empty code)
    #[inline]
    pub fn max_len(&self) -> usize {
        self.max_len
    }

    /// Number of codes
    #[inline]
    pub fn len(&self) -> usize {
        self.symbols.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.symbols.is_empty()
    }

    /// Symbols in canonical order
    pub fn symbols(&self) -> &[u16] {
        &self.symbols
    }

    /// Number of codes of length `len`
    pub fn count(&self, len: usize) -> usize {
        self.counts.get(len).copied().unwrap_or(0) as usize
    }

    /// Decode one symbol.
    ///
    /// Looks at the next `FAST_BITS` bits first; on a hit only the code's
    /// true length is kept and the rest is stepped back. On a miss the code
    /// is extended one bit at a time through the slow lists. If nothing
    /// matches the cursor is restored and `DecodeError` is returned.
    pub fn decode_symbol(&self, reader: &mut BitReader) -> CodecResult<u16> {
        let start = reader.bit_position();
        if self.is_empty() {
            return Err(CodecError::decode(format!(
                "empty Huffman code used at bit {}",
                start
            )));
        }

        let (bits, available) = reader.peek_code(FAST_BITS)?;
        reader.skip_bits(available)?;

        let entry = self.fast[bits as usize];
        if entry.len > 0 && entry.len as usize <= available {
            reader.step_back(available - entry.len as usize)?;
            return Ok(entry.symbol);
        }

        // Past the end of the stream the slow lists cannot help either
        if available == FAST_BITS {
            let mut code = bits;
            for len in FAST_BITS + 1..=self.max_len {
                let bit = match reader.read_bit() {
                    Ok(bit) => bit,
                    Err(_) => break,
                };
                code = (code << 1) | bit as u32;
                let hit = self.slow[len - FAST_BITS - 1]
                    .iter()
                    .find(|c| c.code as u32 == code);
                if let Some(hit) = hit {
                    return Ok(hit.symbol);
                }
            }
        }

        let consumed = reader.bit_position() - start;
        reader.step_back(consumed)?;
        Err(CodecError::decode(format!(
            "no Huffman code matches at bit {}",
            start
        )))
    }

    /// Log the fast and slow tables at trace level
    pub fn dump_table(&self) {
        if !log::log_enabled!(log::Level::Trace) {
            return;
        }
        log::trace!("fast lookup table:");
        for (pattern, entry) in self.fast.iter().enumerate() {
            if entry.len > 0 {
                log::trace!("\t{:08b}\t{:#x}\t{}", pattern, entry.symbol, entry.len);
            }
        }
        log::trace!("slow lookup table:");
        for (i, codes) in self.slow.iter().enumerate() {
            for c in codes {
                log::trace!("\t{:#x}\t{:#x}\t{}", c.code, c.symbol, i + FAST_BITS + 1);
            }
        }
    }
}

/// Check no length holds more codes than the code space left for it.
/// Returns the code space still unused, in units of `2^-MAX_CODE_LEN`.
fn check_code_space(counts: &[u16; MAX_CODE_LEN + 1]) -> CodecResult<u32> {
    let mut available = 1u32;
    for (len, &used) in counts.iter().enumerate().skip(1) {
        available *= 2;
        if used as u32 > available {
            return Err(CodecError::OversubscribedCode { length: len });
        }
        available -= used as u32;
    }
    Ok(available)
}

/// Per-decode Huffman bitstream session.
///
/// Owns the MSB-first cursor for one entropy-coded segment so several
/// segments (or images) can be decoded independently, each with its own
/// session.
#[derive(Debug, Clone)]
pub struct HuffmanSession<'a> {
    reader: BitReader<'a>,
}

impl<'a> HuffmanSession<'a> {
    pub fn new(data: &'a [u8]) -> Self {
        Self {
            reader: BitReader::new(data),
        }
    }

    #[inline]
    pub fn decode_symbol(&mut self, table: &HuffmanTable) -> CodecResult<u16> {
        table.decode_symbol(&mut self.reader)
    }

    /// Raw bits following a symbol (JPEG coefficient magnitudes)
    #[inline]
    pub fn read_bits(&mut self, n: usize) -> CodecResult<u32> {
        self.reader.read_bits(n)
    }

    /// Skip to the next byte boundary, as at a restart marker
    pub fn reset_stream(&mut self) {
        self.reader.realign_to_byte();
    }

    pub fn position(&self) -> usize {
        self.reader.bit_position()
    }

    pub fn bits_remaining(&self) -> usize {
        self.reader.bits_remaining()
    }
}
