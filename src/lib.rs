//! imgcoding - entropy decoding for image formats
//!
//! The bit-level layer shared by JPEG, PNG, GIF and TIFF decoders:
//! - [`BitReader`]: MSB-first (JPEG, TIFF) and LSB-first (deflate, GIF)
//!   bit extraction over a borrowed byte buffer
//! - [`HuffmanTable`]: canonical Huffman codes with an 8-bit lookup table
//!   and a per-length fallback for longer codes
//! - [`inflate`] / [`inflate_zlib`]: RFC 1951 / RFC 1950 decoding into a
//!   caller-sized buffer
//! - [`LzwDecoder`]: variable-width LZW for GIF and TIFF
//!
//! Decoders never allocate the output; callers size it from the image
//! header and every overrun is reported as an error.

#[cfg(test)]
#[macro_use]
mod test_utils;

pub mod bit_reader;
pub mod deflate_decoder;
pub mod error;
pub mod huffman;
pub mod inflate_tables;
pub mod lzw;
pub mod zlib;


pub use bit_reader::{BitOrder, BitReader};
pub use deflate_decoder::{inflate, BlockInfo, BlockType, DeflateDecoder};
pub use error::{CodecError, CodecResult};
pub use huffman::{HuffmanSession, HuffmanTable};
pub use lzw::{decode_gif, decode_tiff, LzwDecoder, LzwDictionary, LzwOptions};
pub use zlib::{adler32, inflate_zlib, inflate_zlib_with, InflateOptions, ZlibHeader};
