use std::fmt;
use thiserror::Error;

/// Failures surfaced by the bit cursor and the three decoders.
///
/// Every condition is recoverable: the container parser that called us
/// decides whether to abort the load or keep a partial image.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CodecError {
    #[error("Stream truncated: need {needed} bits at bit {position}, {available} available")]
    StreamTruncated {
        position: usize,
        needed: usize,
        available: usize,
    },

    #[error("Oversubscribed Huffman code: too many codes of length {length}")]
    OversubscribedCode { length: usize },

    #[error("Incomplete Huffman code: {codes} codes leave unused code space")]
    IncompleteCode { codes: usize },

    #[error("Invalid Huffman symbol table: {0}")]
    InvalidSymbolTable(String),

    #[error("Decode error: {0}")]
    DecodeError(String),

    #[error("{what} mismatch: expected {expected:#010x}, found {found:#010x}")]
    ChecksumMismatch {
        what: &'static str,
        expected: u32,
        found: u32,
    },

    #[error("Invalid back-reference: distance {distance} with only {available} bytes produced")]
    InvalidBackReference { distance: usize, available: usize },

    #[error("Output overflow: need {needed} bytes, capacity is {capacity}")]
    OutputOverflow { needed: usize, capacity: usize },

    #[error("Unsupported block: {0}")]
    UnsupportedBlockType(String),

    #[error("Corrupt LZW dictionary: code {code} (next free entry {next_free})")]
    CorruptDictionary { code: u16, next_free: u16 },

    #[error("Invalid header: {0}")]
    InvalidHeader(String),

    #[error("Invalid parameter: {0}")]
    InvalidParameter(String),
}

impl CodecError {
    pub fn decode<T: fmt::Display>(msg: T) -> Self {
        CodecError::DecodeError(msg.to_string())
    }

    pub fn unsupported_block<T: fmt::Display>(msg: T) -> Self {
        CodecError::UnsupportedBlockType(msg.to_string())
    }

    pub fn invalid_header<T: fmt::Display>(msg: T) -> Self {
        CodecError::InvalidHeader(msg.to_string())
    }

    pub fn invalid_parameter<T: fmt::Display>(msg: T) -> Self {
        CodecError::InvalidParameter(msg.to_string())
    }

    pub(crate) fn overflow(needed: usize, capacity: usize) -> Self {
        CodecError::OutputOverflow { needed, capacity }
    }
}

pub type CodecResult<T> = Result<T, CodecError>;
