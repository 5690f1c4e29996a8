//! # ASCII hex header fields
//!
//! Every numeric field of a newc header is eight ASCII hex digits without a
//! terminator. Parsing is deliberately lenient; formatting is strict.

use crate::CpioError;

/// Width, in characters, of every numeric header field.
pub const FIELD_WIDTH: usize = 8;

/// Parses a hex field the way boot-time cpio readers do.
///
/// Leading spaces and zeros are skipped, then hex digits (either case) are
/// accumulated until the first character that is not a hex digit, where
/// parsing stops without an error. An empty or garbage field yields `0`.
///
/// ```
/// # use cpio_archive::hex::parse_hex;
/// assert_eq!(parse_hex(b"0000001f"), 0x1f);
/// assert_eq!(parse_hex(b" 1x"), 1);
/// assert_eq!(parse_hex(b"zzzzzzzz"), 0);
/// ```
#[must_use]
pub fn parse_hex(field: &[u8]) -> u32 {
    let digits = field
        .iter()
        .position(|&c| c != b' ' && c != b'0')
        .map_or(&[][..], |start| &field[start..]);

    let mut value: u32 = 0;
    for &c in digits {
        let Some(nibble) = hex_value(c) else {
            break;
        };
        value = value.wrapping_shl(4) | u32::from(nibble);
    }
    value
}

/// Writes `value` into `field` as zero-padded lowercase hex.
///
/// Digits are produced from the least significant end; the remaining leading
/// positions are filled with `'0'`.
///
/// # Errors
/// Returns [`CpioError::FieldOverflow`] when `value` needs more digits than
/// `field` has room for. The field is left untouched in that case.
#[allow(clippy::cast_possible_truncation)]
pub fn write_hex(value: u64, field: &mut [u8]) -> Result<(), CpioError> {
    let width = field.len();
    let fits = match u32::try_from(width * 4) {
        Ok(bits) if bits < u64::BITS => value >> bits == 0,
        _ => true,
    };
    if !fits {
        return Err(CpioError::FieldOverflow { value, width });
    }

    let mut rest = value;
    for slot in field.iter_mut().rev() {
        *slot = HEX_DIGITS[(rest & 0xf) as usize];
        rest >>= 4;
    }
    Ok(())
}

const HEX_DIGITS: &[u8; 16] = b"0123456789abcdef";

const fn hex_value(c: u8) -> Option<u8> {
    match c {
        b'0'..=b'9' => Some(c - b'0'),
        b'a'..=b'f' => Some(c - b'a' + 10),
        b'A'..=b'F' => Some(c - b'A' + 10),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_plain_fields() {
        assert_eq!(parse_hex(b"00000000"), 0);
        assert_eq!(parse_hex(b"000001ED"), 0x1ed);
        assert_eq!(parse_hex(b"000001ed"), 0x1ed);
        assert_eq!(parse_hex(b"ffffffff"), u32::MAX);
    }

    #[test]
    fn tolerates_leading_blanks_and_trailing_garbage() {
        assert_eq!(parse_hex(b" 1x"), 1);
        assert_eq!(parse_hex(b"   0 0ab"), 0xab);
        assert_eq!(parse_hex(b"  12zz34"), 0x12);
        assert_eq!(parse_hex(b""), 0);
    }

    #[test]
    fn writes_zero_padded_lowercase() {
        let mut field = [b'X'; FIELD_WIDTH];
        write_hex(0x1ED, &mut field).unwrap();
        assert_eq!(&field, b"000001ed");

        write_hex(0, &mut field).unwrap();
        assert_eq!(&field, b"00000000");
    }

    #[test]
    fn rejects_values_wider_than_the_field() {
        let mut field = [b'X'; FIELD_WIDTH];
        let err = write_hex(0x1_0000_0000, &mut field).unwrap_err();
        assert_eq!(
            err,
            CpioError::FieldOverflow {
                value: 0x1_0000_0000,
                width: FIELD_WIDTH
            }
        );
        assert_eq!(&field, b"XXXXXXXX");

        let mut narrow = [0u8; 2];
        assert!(write_hex(0x100, &mut narrow).is_err());
        assert!(write_hex(0xff, &mut narrow).is_ok());
    }

    #[test]
    fn every_u32_survives_a_field() {
        let mut field = [0u8; FIELD_WIDTH];
        for value in [0u32, 1, 9, 10, 0xabc, 0x7fff_ffff, 0x8000_0000, u32::MAX]
            .into_iter()
            .chain((0..32).map(|shift| 1u32 << shift))
        {
            write_hex(u64::from(value), &mut field).unwrap();
            assert_eq!(parse_hex(&field), value);
        }
    }
}
