//! # gzip Member Framing
//!
//! Only the framing is handled here: magic detection, the trailing size field
//! and locating the raw deflate payload. Inflating is a platform service.

/// First two bytes of a gzip member.
pub const GZIP_MAGIC: [u8; 2] = [0x1f, 0x8b];

const HEADER_LEN: usize = 10;
const TRAILER_LEN: usize = 8;
const METHOD_DEFLATE: u8 = 8;

const FHCRC: u8 = 0x02;
const FEXTRA: u8 = 0x04;
const FNAME: u8 = 0x08;
const FCOMMENT: u8 = 0x10;

#[must_use]
pub fn is_gzip(data: &[u8]) -> bool {
    data.starts_with(&GZIP_MAGIC)
}

/// Uncompressed size from the trailing `ISIZE` field (size modulo 2^32).
#[must_use]
pub fn uncompressed_size(data: &[u8]) -> Option<u32> {
    let tail = data.len().checked_sub(4)?;
    let s = data.get(tail..)?;
    Some(u32::from_le_bytes([s[0], s[1], s[2], s[3]]))
}

fn skip_cstr(data: &[u8], offset: usize) -> Option<usize> {
    let nul = data.get(offset..)?.iter().position(|&b| b == 0)?;
    offset.checked_add(nul + 1)
}

/// The raw deflate stream between header and trailer.
///
/// Returns `None` if `data` is not a well-formed deflate member.
#[must_use]
pub fn deflate_payload(data: &[u8]) -> Option<&[u8]> {
    if !is_gzip(data) || data.len() < HEADER_LEN + TRAILER_LEN {
        return None;
    }
    if data[2] != METHOD_DEFLATE {
        return None;
    }

    let flags = data[3];
    let mut offset = HEADER_LEN;
    if flags & FEXTRA != 0 {
        let xlen = data.get(offset..offset + 2)?;
        offset += 2 + usize::from(u16::from_le_bytes([xlen[0], xlen[1]]));
    }
    if flags & FNAME != 0 {
        offset = skip_cstr(data, offset)?;
    }
    if flags & FCOMMENT != 0 {
        offset = skip_cstr(data, offset)?;
    }
    if flags & FHCRC != 0 {
        offset += 2;
    }

    let end = data.len() - TRAILER_LEN;
    data.get(offset..end)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn member(flags: u8, extra: &[u8], payload: &[u8], isize: u32) -> Vec<u8> {
        let mut out = vec![0x1f, 0x8b, 8, flags, 0, 0, 0, 0, 0, 3];
        out.extend_from_slice(extra);
        out.extend_from_slice(payload);
        out.extend_from_slice(&[0; 4]);
        out.extend_from_slice(&isize.to_le_bytes());
        out
    }

    #[test]
    fn plain_member() {
        let data = member(0, &[], b"DEFLATE", 1234);
        assert!(is_gzip(&data));
        assert_eq!(uncompressed_size(&data), Some(1234));
        assert_eq!(deflate_payload(&data), Some(&b"DEFLATE"[..]));
    }

    #[test]
    fn optional_header_fields_are_skipped() {
        let mut extra = vec![3, 0, b'x', b'y', b'z'];
        extra.extend_from_slice(b"ramdisk.cpio\0");
        extra.extend_from_slice(b"comment\0");
        extra.extend_from_slice(&[0xaa, 0xbb]);
        let data = member(FEXTRA | FNAME | FCOMMENT | FHCRC, &extra, b"body", 4);
        assert_eq!(deflate_payload(&data), Some(&b"body"[..]));
    }

    #[test]
    fn rejects_other_streams() {
        assert!(!is_gzip(b"070701"));
        assert_eq!(deflate_payload(b"070701000000000000000000"), None);
        let mut data = member(0, &[], b"x", 1);
        data[2] = 7;
        assert_eq!(deflate_payload(&data), None);
        assert_eq!(uncompressed_size(b"abc"), None);
    }

    #[test]
    fn unterminated_name_is_rejected() {
        let data = member(FNAME, b"no-terminator", b"", 0);
        // The trailer bytes contain zeros, so the name ends inside the trailer.
        assert_eq!(deflate_payload(&data), None);
    }
}
