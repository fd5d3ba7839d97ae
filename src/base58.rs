//! Base58 codec for addresses, blockhashes and exported private keys
//!
//! Bytes are treated as one big-endian unsigned integer and re-expressed in
//! base 58 over the Bitcoin alphabet (no `0`, `O`, `I`, `l`). Every leading
//! zero byte maps to one leading `'1'` and back.

use thiserror::Error;

/// The base58 alphabet; index 0 (`'1'`) is the leading-zero character
pub const ALPHABET: &[u8; 58] = b"123456789ABCDEFGHJKLMNPQRSTUVWXYZabcdefghijkmnopqrstuvwxyz";

const INVALID: u8 = 0xFF;

/// Reverse lookup table from ASCII byte to alphabet index
const DECODE_MAP: [u8; 128] = {
    let mut map = [INVALID; 128];
    let mut i = 0;
    while i < ALPHABET.len() {
        map[ALPHABET[i] as usize] = i as u8;
        i += 1;
    }
    map
};

/// Errors produced by the base58 codec and by fixed-length decodes
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CodecError {
    /// A character outside the base58 alphabet
    #[error("Invalid base58 character {character:?} at position {position}")]
    InvalidCharacter { character: char, position: usize },

    /// A decoded address that is not exactly 32 bytes
    #[error("Invalid address length: expected 32 bytes, got {0}")]
    InvalidAddressLength(usize),

    /// A decoded base64 payload that could not be read
    #[error("Invalid base64 payload: {0}")]
    InvalidBase64(String),
}

/// Encode raw bytes as base58.
///
/// Empty input deliberately encodes to `""`, not `"1"`: `"1"` is the
/// encoding of `[0]`, and `decode(encode(b)) == b` must hold for every `b`.
pub fn encode(bytes: &[u8]) -> String {
    let leading_zeros = bytes.iter().take_while(|&&b| b == 0).count();

    // Little-endian base-58 digits of the big integer
    let mut digits: Vec<u8> = Vec::with_capacity(bytes.len() * 138 / 100 + 1);
    for &byte in &bytes[leading_zeros..] {
        let mut carry = byte as u32;
        for digit in digits.iter_mut() {
            carry += (*digit as u32) << 8;
            *digit = (carry % 58) as u8;
            carry /= 58;
        }
        while carry > 0 {
            digits.push((carry % 58) as u8);
            carry /= 58;
        }
    }

    let mut out = String::with_capacity(leading_zeros + digits.len());
    for _ in 0..leading_zeros {
        out.push(ALPHABET[0] as char);
    }
    for &digit in digits.iter().rev() {
        out.push(ALPHABET[digit as usize] as char);
    }
    out
}

/// Decode a base58 string back into raw bytes.
pub fn decode(input: &str) -> Result<Vec<u8>, CodecError> {
    let mut leading_zeros = 0usize;
    let mut seen_non_zero = false;

    // Little-endian base-256 bytes of the big integer
    let mut bytes: Vec<u8> = Vec::with_capacity(input.len() * 733 / 1000 + 1);
    for (position, character) in input.chars().enumerate() {
        let index = if character.is_ascii() {
            DECODE_MAP[character as usize]
        } else {
            INVALID
        };
        if index == INVALID {
            return Err(CodecError::InvalidCharacter {
                character,
                position,
            });
        }

        if index == 0 && !seen_non_zero {
            leading_zeros += 1;
            continue;
        }
        seen_non_zero = true;

        let mut carry = index as u32;
        for byte in bytes.iter_mut() {
            carry += (*byte as u32) * 58;
            *byte = (carry & 0xFF) as u8;
            carry >>= 8;
        }
        while carry > 0 {
            bytes.push((carry & 0xFF) as u8);
            carry >>= 8;
        }
    }

    let mut out = vec![0u8; leading_zeros];
    out.extend(bytes.iter().rev());
    Ok(out)
}

/// Decode a base58 string that must hold exactly 32 bytes (address, blockhash)
pub fn decode_32(input: &str) -> Result<[u8; 32], CodecError> {
    let bytes = decode(input)?;
    <[u8; 32]>::try_from(bytes.as_slice())
        .map_err(|_| CodecError::InvalidAddressLength(bytes.len()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_encode_known_vectors() {
        assert_eq!(encode(b"hello world"), "StV1DL6CwTryKyV");
        assert_eq!(encode(&[0, 0, 1]), "112");
        assert_eq!(encode(&[0xFF]), "5Q");
    }

    #[test]
    fn test_empty_input_round_trips() {
        assert_eq!(encode(&[]), "");
        assert_eq!(decode("").unwrap(), Vec::<u8>::new());
        assert_eq!(encode(&[0]), "1");
        assert_eq!(decode("1").unwrap(), vec![0]);
    }

    #[test]
    fn test_all_zero_bytes() {
        assert_eq!(encode(&[0, 0, 0]), "111");
        assert_eq!(decode("111").unwrap(), vec![0, 0, 0]);
    }

    #[test]
    fn test_system_program_id() {
        assert_eq!(encode(&[0u8; 32]), "11111111111111111111111111111111");
        assert_eq!(decode_32("11111111111111111111111111111111").unwrap(), [0u8; 32]);
    }

    #[test]
    fn test_invalid_character_rejected() {
        let err = decode("abc0def").unwrap_err();
        assert_eq!(
            err,
            CodecError::InvalidCharacter {
                character: '0',
                position: 3
            }
        );
        assert!(matches!(decode("Il"), Err(CodecError::InvalidCharacter { .. })));
        assert!(matches!(decode("é"), Err(CodecError::InvalidCharacter { .. })));
    }

    #[test]
    fn test_decode_32_length_check() {
        let err = decode_32(&encode(&[7u8; 31])).unwrap_err();
        assert_eq!(err, CodecError::InvalidAddressLength(31));
    }

    #[test]
    fn test_wrapped_sol_mint_decodes_to_32_bytes() {
        let mint = decode_32("So11111111111111111111111111111111111111112").unwrap();
        assert_eq!(encode(&mint), "So11111111111111111111111111111111111111112");
    }

    proptest! {
        #[test]
        fn prop_round_trip(bytes in proptest::collection::vec(any::<u8>(), 0..96)) {
            let encoded = encode(&bytes);
            prop_assert_eq!(decode(&encoded).unwrap(), bytes);
        }

        #[test]
        fn prop_matches_bs58_oracle(bytes in proptest::collection::vec(any::<u8>(), 0..80)) {
            prop_assert_eq!(encode(&bytes), bs58::encode(&bytes).into_string());
        }
    }
}
