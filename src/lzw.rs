//! Variable-width LZW decoder for GIF and TIFF
//!
//! The string table is an arena of entries linked backwards through
//! `prev` indices: each entry is its parent's string plus one byte.
//! Emitting a code walks the chain from the end and fills the output
//! backwards, so no intermediate buffer is needed.
//!
//! GIF streams are LSB-first and widen the code one entry late; TIFF
//! streams are MSB-first and widen one entry early ("early change").

use crate::bit_reader::{BitOrder, BitReader};
use crate::error::{CodecError, CodecResult};

/// Widest code any stream may use
pub const MAX_CODE_WIDTH: usize = 12;

/// Table capacity at the maximum width
const MAX_ENTRIES: usize = 1 << MAX_CODE_WIDTH;

/// LZW minimum code size used by TIFF
pub const TIFF_MIN_CODE_SIZE: u8 = 8;

/// Largest minimum code size; literals must fit a dictionary byte
pub const MAX_MIN_CODE_SIZE: u8 = 8;

/// Stream parameters
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LzwOptions {
    /// Bits per literal symbol; codes start one bit wider
    pub min_code_size: u8,
    pub order: BitOrder,
    /// Widen the code one entry before the table fills (TIFF)
    pub early_change: bool,
}

impl LzwOptions {
    pub fn gif(min_code_size: u8) -> Self {
        LzwOptions {
            min_code_size,
            order: BitOrder::Lsb,
            early_change: false,
        }
    }

    pub fn tiff() -> Self {
        LzwOptions {
            min_code_size: TIFF_MIN_CODE_SIZE,
            order: BitOrder::Msb,
            early_change: true,
        }
    }

    /// Old-style (pre-6.0) TIFF LZW: LSB-first without early change
    pub fn tiff_compat() -> Self {
        LzwOptions {
            min_code_size: TIFF_MIN_CODE_SIZE,
            order: BitOrder::Lsb,
            early_change: false,
        }
    }

    fn validate(&self) -> CodecResult<()> {
        check_min_code_size(self.min_code_size)
    }
}

fn check_min_code_size(min_code_size: u8) -> CodecResult<()> {
    if !(1..=MAX_MIN_CODE_SIZE).contains(&min_code_size) {
        return Err(CodecError::invalid_parameter(format!(
            "LZW minimum code size {} outside 1..={}",
            min_code_size, MAX_MIN_CODE_SIZE
        )));
    }
    Ok(())
}

impl Default for LzwOptions {
    fn default() -> Self {
        LzwOptions::gif(8)
    }
}

#[derive(Debug, Clone, Copy)]
struct LzwEntry {
    prev: Option<u16>,
    /// Length of the string ending at this entry; 0 for the reserved
    /// clear/end slots
    len: u16,
    byte: u8,
}

const RESERVED: LzwEntry = LzwEntry {
    prev: None,
    len: 0,
    byte: 0,
};

/// LZW string table
#[derive(Debug, Clone)]
pub struct LzwDictionary {
    entries: Vec<LzwEntry>,
    clear_code: u16,
}

impl LzwDictionary {
    pub fn new(min_code_size: u8) -> CodecResult<Self> {
        check_min_code_size(min_code_size)?;
        let mut dict = LzwDictionary {
            entries: Vec::with_capacity(MAX_ENTRIES),
            clear_code: 1 << min_code_size,
        };
        dict.reset();
        Ok(dict)
    }

    /// Back to the single-byte entries plus the clear and end slots
    pub fn reset(&mut self) {
        self.entries.clear();
        self.entries.extend((0..self.clear_code).map(|value| LzwEntry {
            prev: None,
            len: 1,
            byte: value as u8,
        }));
        self.entries.push(RESERVED);
        self.entries.push(RESERVED);
    }

    #[inline]
    pub fn clear_code(&self) -> u16 {
        self.clear_code
    }

    #[inline]
    pub fn end_code(&self) -> u16 {
        self.clear_code + 1
    }

    /// Index the next added entry will get
    #[inline]
    pub fn next_code(&self) -> u16 {
        self.entries.len() as u16
    }

    /// Populated entries, not counting the clear and end slots
    #[inline]
    pub fn len(&self) -> usize {
        self.entries.len() - 2
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    #[inline]
    pub fn is_full(&self) -> bool {
        self.entries.len() >= MAX_ENTRIES
    }

    #[inline]
    fn corrupt(&self, code: u16) -> CodecError {
        CodecError::CorruptDictionary {
            code,
            next_free: self.next_code(),
        }
    }

    /// Entry for `code`, which must already be populated
    fn entry(&self, code: u16) -> CodecResult<LzwEntry> {
        match self.entries.get(code as usize) {
            Some(entry) if entry.len > 0 => Ok(*entry),
            _ => Err(self.corrupt(code)),
        }
    }

    /// First byte of the string for `code`
    pub fn first_byte(&self, code: u16) -> CodecResult<u8> {
        let mut current = code;
        let mut entry = self.entry(current)?;
        while let Some(prev) = entry.prev {
            if prev >= current {
                return Err(self.corrupt(current));
            }
            current = prev;
            entry = self.entry(current)?;
        }
        Ok(entry.byte)
    }

    /// Append `prev`'s string plus `byte`; returns the new code
    pub fn push(&mut self, prev: u16, byte: u8) -> CodecResult<u16> {
        if self.is_full() {
            return Err(self.corrupt(prev));
        }
        let parent = self.entry(prev)?;
        let code = self.next_code();
        self.entries.push(LzwEntry {
            prev: Some(prev),
            len: parent.len + 1,
            byte,
        });
        Ok(code)
    }

    /// Write the string for `code` to `out[pos..]`; returns its length
    pub fn emit(&self, code: u16, out: &mut [u8], pos: usize) -> CodecResult<usize> {
        let len = self.entry(code)?.len as usize;
        if len > out.len().saturating_sub(pos) {
            return Err(CodecError::overflow(pos + len, out.len()));
        }

        let mut current = code;
        for i in (pos..pos + len).rev() {
            let entry = self.entry(current)?;
            out[i] = entry.byte;
            if i > pos {
                match entry.prev {
                    Some(prev) if prev < current => current = prev,
                    _ => return Err(self.corrupt(current)),
                }
            }
        }
        Ok(len)
    }
}

/// LZW decoder session
#[derive(Debug, Clone)]
pub struct LzwDecoder {
    options: LzwOptions,
    dict: LzwDictionary,
    width: usize,
}

impl LzwDecoder {
    pub fn new(options: LzwOptions) -> CodecResult<Self> {
        options.validate()?;
        Ok(LzwDecoder {
            options,
            dict: LzwDictionary::new(options.min_code_size)?,
            width: options.min_code_size as usize + 1,
        })
    }

    pub fn options(&self) -> &LzwOptions {
        &self.options
    }

    /// Current code width in bits
    pub fn code_width(&self) -> usize {
        self.width
    }

    pub fn dictionary(&self) -> &LzwDictionary {
        &self.dict
    }

    fn reset(&mut self) {
        self.dict.reset();
        self.width = self.options.min_code_size as usize + 1;
    }

    /// Widen the code once the table reaches the current width's capacity
    fn grow_width(&mut self) {
        let capacity = (1usize << self.width) - self.options.early_change as usize;
        if self.dict.next_code() as usize >= capacity && self.width < MAX_CODE_WIDTH {
            self.width += 1;
        }
    }

    /// Decode `data` into `out`, returning the number of bytes written.
    ///
    /// Decoding stops at the end code or when the input runs out of whole
    /// codes; a stream without an end code is not an error.
    pub fn decode(&mut self, data: &[u8], out: &mut [u8]) -> CodecResult<usize> {
        self.reset();
        let clear_code = self.dict.clear_code();
        let end_code = self.dict.end_code();

        let mut reader = BitReader::with_order(data, self.options.order);
        let mut pos = 0usize;
        let mut previous: Option<u16> = None;

        loop {
            if !reader.peek_available(self.width) {
                log::debug!(
                    "lzw: input exhausted at bit {} without end code",
                    reader.bit_position()
                );
                break;
            }
            let code = reader.read_bits(self.width)? as u16;

            if code == clear_code {
                self.reset();
                previous = None;
                continue;
            }
            if code == end_code {
                break;
            }

            let next = self.dict.next_code();
            if code > next || (code == next && previous.is_none()) {
                return Err(CodecError::CorruptDictionary {
                    code,
                    next_free: next,
                });
            }

            if let Some(prev) = previous {
                if !self.dict.is_full() {
                    // code == next is the string-plus-own-first-byte case
                    let byte = if code == next {
                        self.dict.first_byte(prev)?
                    } else {
                        self.dict.first_byte(code)?
                    };
                    self.dict.push(prev, byte)?;
                    self.grow_width();
                }
            }

            pos += self.dict.emit(code, out, pos)?;
            previous = Some(code);
        }

        Ok(pos)
    }
}

/// Decode GIF image data: the LZW minimum code size byte followed by the
/// concatenated sub-block payload (length prefixes already removed)
pub fn decode_gif(data: &[u8], out: &mut [u8]) -> CodecResult<usize> {
    let (&min_code_size, payload) = data.split_first().ok_or(CodecError::StreamTruncated {
        position: 0,
        needed: 8,
        available: 0,
    })?;
    LzwDecoder::new(LzwOptions::gif(min_code_size))?.decode(payload, out)
}

/// Decode one TIFF LZW strip.
///
/// Streams written by current encoders are MSB-first with early change;
/// old-style streams are LSB-first. The variant is detected from the
/// leading clear code.
pub fn decode_tiff(data: &[u8], out: &mut [u8]) -> CodecResult<usize> {
    let options = if is_msb_tiff(data) {
        LzwOptions::tiff()
    } else {
        log::debug!("lzw: old-style LSB TIFF strip");
        LzwOptions::tiff_compat()
    };
    LzwDecoder::new(options)?.decode(data, out)
}

fn is_msb_tiff(data: &[u8]) -> bool {
    let width = TIFF_MIN_CODE_SIZE as usize + 1;
    let clear_code = 1u32 << TIFF_MIN_CODE_SIZE;
    match BitReader::new(data).read_bits(width) {
        Ok(first) => first == clear_code,
        // too short to tell; assume the common variant
        Err(_) => true,
    }
}
