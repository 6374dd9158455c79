//! zlib wrapper (RFC 1950) around the deflate decoder, as used by PNG
//!
//! Stream layout: 2-byte header (CMF, FLG), deflate blocks, 4-byte
//! big-endian Adler-32 of the decompressed data.

use crate::deflate_decoder::DeflateDecoder;
use crate::error::{CodecError, CodecResult};

/// Compression method 8 = deflate
pub const ZLIB_METHOD_DEFLATE: u8 = 8;

const ADLER_MOD: u32 = 65521;

/// Largest n with 255·n·(n+1)/2 + (n+1)·(ADLER_MOD−1) < 2^32
const ADLER_NMAX: usize = 5552;

/// Parsed zlib header fields
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ZlibHeader {
    /// CM, low nibble of CMF
    pub method: u8,
    /// CINFO: base-2 log of the window size minus 8
    pub window_bits: u8,
    /// FCHECK, low 5 bits of FLG
    pub check: u8,
    /// FDICT
    pub preset_dictionary: bool,
    /// FLEVEL, informational only
    pub level: u8,
}

impl ZlibHeader {
    /// Parse and validate the two header bytes field by field
    pub fn parse(data: &[u8]) -> CodecResult<Self> {
        if data.len() < 2 {
            return Err(CodecError::StreamTruncated {
                position: 0,
                needed: 16,
                available: data.len() * 8,
            });
        }
        let cmf = data[0];
        let flg = data[1];

        let header = ZlibHeader {
            method: cmf & 0x0F,
            window_bits: cmf >> 4,
            check: flg & 0x1F,
            preset_dictionary: flg & 0x20 != 0,
            level: flg >> 6,
        };

        if header.method != ZLIB_METHOD_DEFLATE {
            return Err(CodecError::invalid_header(format!(
                "compression method {} is not deflate",
                header.method
            )));
        }
        if u16::from_be_bytes([cmf, flg]) % 31 != 0 {
            return Err(CodecError::invalid_header(format!(
                "header check failed (FCHECK {:#x})",
                header.check
            )));
        }
        if header.window_bits > 7 {
            return Err(CodecError::invalid_header(format!(
                "window size 2^{} exceeds 32KB",
                header.window_bits as u32 + 8
            )));
        }
        if header.preset_dictionary {
            return Err(CodecError::invalid_header(
                "preset dictionary is not supported",
            ));
        }

        Ok(header)
    }

    /// LZ77 window size in bytes
    pub fn window_size(&self) -> usize {
        1 << (self.window_bits as usize + 8)
    }
}

/// Options for [`inflate_zlib_with`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct InflateOptions {
    /// Check the trailing Adler-32 against the decoded bytes
    pub verify_checksum: bool,
}

impl Default for InflateOptions {
    fn default() -> Self {
        InflateOptions {
            verify_checksum: true,
        }
    }
}

/// Inflate a zlib stream into `out` with default options
pub fn inflate_zlib(data: &[u8], out: &mut [u8]) -> CodecResult<usize> {
    inflate_zlib_with(data, out, &InflateOptions::default())
}

/// Inflate a zlib stream into `out`, returning the decoded length
pub fn inflate_zlib_with(
    data: &[u8],
    out: &mut [u8],
    options: &InflateOptions,
) -> CodecResult<usize> {
    let header = ZlibHeader::parse(data)?;
    log::debug!(
        "zlib: window {} bytes, level {}",
        header.window_size(),
        header.level
    );

    let body = &data[2..];
    let mut decoder = DeflateDecoder::new(body, out);
    let len = decoder.decode()?;
    let trailer_start = decoder.bytes_consumed();
    drop(decoder);

    if !options.verify_checksum {
        return Ok(len);
    }

    let trailer = body
        .get(trailer_start..trailer_start + 4)
        .ok_or(CodecError::StreamTruncated {
            position: (2 + trailer_start) * 8,
            needed: 32,
            available: body.len().saturating_sub(trailer_start) * 8,
        })?;
    let expected = u32::from_be_bytes([trailer[0], trailer[1], trailer[2], trailer[3]]);
    let found = adler32(&out[..len]);
    if expected != found {
        return Err(CodecError::ChecksumMismatch {
            what: "Adler-32",
            expected,
            found,
        });
    }

    Ok(len)
}

/// Adler-32 checksum of `data`
pub fn adler32(data: &[u8]) -> u32 {
    let mut a = 1u32;
    let mut b = 0u32;
    for chunk in data.chunks(ADLER_NMAX) {
        for &byte in chunk {
            a += byte as u32;
            b += a;
        }
        a %= ADLER_MOD;
        b %= ADLER_MOD;
    }
    (b << 16) | a
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils::Rng;
    use flate2::write::ZlibEncoder;
    use flate2::Compression;
    use std::io::Write;

    fn zlib(data: &[u8], level: u32) -> Vec<u8> {
        let mut encoder = ZlibEncoder::new(Vec::new(), Compression::new(level));
        encoder.write_all(data).unwrap();
        encoder.finish().unwrap()
    }

    #[test]
    fn test_adler32() {
        assert_eq!(adler32(b""), 1);
        assert_eq!(adler32(b"Wikipedia"), 0x11E6_0398);
        // long input crosses the deferred modulo boundary
        let long = vec![0xFFu8; 100_000];
        let mut a = 1u64;
        let mut b = 0u64;
        for &byte in &long {
            a = (a + byte as u64) % 65521;
            b = (b + a) % 65521;
        }
        assert_eq!(adler32(&long), ((b << 16) | a) as u32);
    }

    #[test]
    fn test_header_parse() {
        let header = ZlibHeader::parse(&[0x78, 0x9C]).unwrap();
        assert_eq!(header.method, 8);
        assert_eq!(header.window_bits, 7);
        assert_eq!(header.window_size(), 32 * 1024);
        assert_eq!(header.level, 2);
        assert!(!header.preset_dictionary);

        assert!(ZlibHeader::parse(&[0x78, 0x01]).is_ok());
        assert!(ZlibHeader::parse(&[0x78, 0xDA]).is_ok());
    }

    #[test]
    fn test_header_rejects() {
        // method 7
        assert!(matches!(
            ZlibHeader::parse(&[0x77, 0x00]),
            Err(CodecError::InvalidHeader(_))
        ));
        // FCHECK wrong
        assert!(matches!(
            ZlibHeader::parse(&[0x78, 0x9D]),
            Err(CodecError::InvalidHeader(_))
        ));
        // CINFO 8: 0x88, FLG chosen so the check passes
        assert!(matches!(
            ZlibHeader::parse(&[0x88, 0x1C]),
            Err(CodecError::InvalidHeader(_))
        ));
        // FDICT set: 0x78 0xBB passes the check
        assert!(matches!(
            ZlibHeader::parse(&[0x78, 0xBB]),
            Err(CodecError::InvalidHeader(_))
        ));
        assert!(matches!(
            ZlibHeader::parse(&[0x78]),
            Err(CodecError::StreamTruncated { .. })
        ));
    }

    #[test]
    fn test_round_trip() {
        let mut rng = Rng::new(5);
        let original: Vec<u8> = (0..50_000)
            .map(|i| if i % 7 == 0 { rng.below(256) as u8 } else { (i / 13) as u8 })
            .collect();

        for level in [0, 1, 6, 9] {
            let compressed = zlib(&original, level);
            let mut out = vec![0u8; original.len()];
            let n = inflate_zlib(&compressed, &mut out).unwrap();
            assert_eq!(n, original.len());
            assert_slices_eq!(out, original, format!("level {}", level));
        }
    }

    #[test]
    fn test_checksum_mismatch() {
        let original = b"png scanlines png scanlines png scanlines";
        let mut compressed = zlib(original, 6);
        let last = compressed.len() - 1;
        compressed[last] ^= 0x01;

        let mut out = vec![0u8; original.len()];
        assert!(matches!(
            inflate_zlib(&compressed, &mut out),
            Err(CodecError::ChecksumMismatch {
                what: "Adler-32",
                ..
            })
        ));

        let options = InflateOptions {
            verify_checksum: false,
        };
        let n = inflate_zlib_with(&compressed, &mut out, &options).unwrap();
        assert_eq!(&out[..n], original);
    }

    #[test]
    fn test_missing_trailer() {
        let original = b"no trailer here";
        let compressed = zlib(original, 6);
        let cut = &compressed[..compressed.len() - 4];

        let mut out = vec![0u8; original.len()];
        assert!(matches!(
            inflate_zlib(cut, &mut out),
            Err(CodecError::StreamTruncated { .. })
        ));
        let options = InflateOptions {
            verify_checksum: false,
        };
        assert_eq!(inflate_zlib_with(cut, &mut out, &options).unwrap(), 15);
    }
}
