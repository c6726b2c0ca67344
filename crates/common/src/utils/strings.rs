use alloy::primitives::{I256, U256};
use eyre::{eyre, Result};
use std::fmt::Write;

/// Reinterprets an unsigned 256-bit word as a signed one (two's complement).
pub fn sign_uint(unsigned: U256) -> I256 {
    I256::from_raw(unsigned)
}

/// Decodes a hex string into a vector of bytes
///
/// ```
/// use sevm_common::utils::strings::decode_hex;
///
/// let hex = "48656c6c6f20576f726c64"; // "Hello World" in hex
/// let result = decode_hex(hex).expect("should decode hex");
/// assert_eq!(result, vec![72, 101, 108, 108, 111, 32, 87, 111, 114, 108, 100]);
/// ```
pub fn decode_hex(mut s: &str) -> Result<Vec<u8>> {
    // normalize
    s = s.trim_start_matches("0x").trim();

    if s.is_empty() {
        return Ok(vec![]);
    }

    if s.len() % 2 != 0 {
        return Err(eyre!("odd-length hex string: {}", s));
    }

    (0..s.len())
        .step_by(2)
        .map(|i| u8::from_str_radix(&s[i..i + 2], 16))
        .collect::<Result<Vec<u8>, _>>()
        .map_err(|_| eyre!("invalid hex string: {}", s))
}

/// Encodes a vector of bytes into a hex string
///
/// ```
/// use sevm_common::utils::strings::encode_hex;
///
/// let bytes = vec![72, 101, 108, 108, 111, 32, 87, 111, 114, 108, 100];
/// let result = encode_hex(&bytes);
/// assert_eq!(result, "48656c6c6f20576f726c64");
/// ```
pub fn encode_hex(s: &[u8]) -> String {
    s.iter().fold(String::new(), |mut acc, b| {
        write!(acc, "{b:02x}").expect("unable to write");
        acc
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sign_uint() {
        assert_eq!(sign_uint(U256::from(10)), I256::try_from(10).expect("10 fits"));
        assert_eq!(sign_uint(U256::MAX), I256::try_from(-1).expect("-1 fits"));
    }

    #[test]
    fn test_decode_hex_prefixed() {
        assert_eq!(decode_hex("0x00ff").expect("should decode hex"), vec![0x00, 0xff]);
    }

    #[test]
    fn test_decode_hex_empty() {
        assert_eq!(decode_hex("0x").expect("should decode hex"), Vec::<u8>::new());
    }

    #[test]
    fn test_decode_hex_invalid() {
        assert!(decode_hex("zz").is_err());
        assert!(decode_hex("0xabc").is_err());
    }

    #[test]
    fn test_encode_round_trip() {
        let bytes = vec![0xde, 0xad, 0xbe, 0xef];
        assert_eq!(decode_hex(&encode_hex(&bytes)).expect("should decode hex"), bytes);
    }
}
