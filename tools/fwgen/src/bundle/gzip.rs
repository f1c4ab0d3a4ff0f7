//! gzip (RFC 1952) member writer.
//!
//! The web server hands compressed assets to the browser with
//! `Content-Encoding: gzip`, so payloads need the full gzip framing rather
//! than a bare deflate stream. The header's MTIME field is left at zero so the
//! same input always produces the same bytes.

use miniz_oxide::deflate::compress_to_vec;

const GZIP_MAGIC: [u8; 2] = [0x1F, 0x8B];
const METHOD_DEFLATE: u8 = 8;
/// XFL value for maximum compression
const XFL_SLOWEST: u8 = 2;
/// OS field: unknown
const OS_UNKNOWN: u8 = 255;

/// Deflate level used for web assets
pub const LEVEL: u8 = 9;

/// Compress `data` into a single gzip member.
pub fn compress(data: &[u8]) -> Vec<u8> {
    let deflated = compress_to_vec(data, LEVEL);

    let mut out = Vec::with_capacity(10 + deflated.len() + 8);
    out.extend_from_slice(&GZIP_MAGIC);
    out.push(METHOD_DEFLATE);
    out.push(0); // FLG: no name, comment or extra fields
    out.extend_from_slice(&0u32.to_le_bytes()); // MTIME
    out.push(XFL_SLOWEST);
    out.push(OS_UNKNOWN);
    out.extend_from_slice(&deflated);
    out.extend_from_slice(&crc32fast::hash(data).to_le_bytes());
    out.extend_from_slice(&(data.len() as u32).to_le_bytes()); // ISIZE is mod 2^32
    out
}

#[cfg(test)]
pub(crate) fn decompress(member: &[u8]) -> Vec<u8> {
    assert!(member.len() >= 18, "gzip member too short");
    assert_eq!(&member[..2], &GZIP_MAGIC);
    let body = &member[10..member.len() - 8];
    let data = miniz_oxide::inflate::decompress_to_vec(body).expect("invalid deflate stream");

    let trailer = &member[member.len() - 8..];
    let crc = u32::from_le_bytes([trailer[0], trailer[1], trailer[2], trailer[3]]);
    let size = u32::from_le_bytes([trailer[4], trailer[5], trailer[6], trailer[7]]);
    assert_eq!(crc, crc32fast::hash(&data), "crc mismatch");
    assert_eq!(size as usize, data.len(), "size mismatch");
    data
}
