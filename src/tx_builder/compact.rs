//! Compact-u16 ("shortvec") length prefixes
//!
//! 7 bits per byte, least significant group first, high bit set on every
//! byte except the last. Values up to `u16::MAX` need at most 3 bytes.

use super::errors::EncodingError;

/// Append the compact encoding of `value` to `out`
pub fn encode_u16(value: u16, out: &mut Vec<u8>) {
    let mut rem = value;
    loop {
        let mut byte = (rem & 0x7f) as u8;
        rem >>= 7;
        if rem == 0 {
            out.push(byte);
            return;
        }
        byte |= 0x80;
        out.push(byte);
    }
}

/// Append the compact encoding of a collection length
pub fn encode_len(len: usize, out: &mut Vec<u8>) -> Result<(), EncodingError> {
    let value = u16::try_from(len).map_err(|_| EncodingError::CompactLengthOverflow(len))?;
    encode_u16(value, out);
    Ok(())
}
