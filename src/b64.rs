//! URL-safe base64 transforms for the token wire format
//!
//! Tokens use the URL-safe alphabet (`-` and `_`) with no padding on the
//! wire. Decoding is tolerant of padding so tokens produced by stricter
//! encoders still parse; malformed content is not diagnosed here and
//! surfaces later as a parse failure in the decoder.

use base64::{
    alphabet,
    engine::{DecodePaddingMode, GeneralPurpose, GeneralPurposeConfig},
    DecodeError, Engine,
};

const CONFIG: GeneralPurposeConfig = GeneralPurposeConfig::new()
    .with_encode_padding(false)
    .with_decode_padding_mode(DecodePaddingMode::Indifferent);

const URL_SAFE: GeneralPurpose = GeneralPurpose::new(&alphabet::URL_SAFE, CONFIG);

/// Encodes bytes as unpadded URL-safe base64
pub(crate) fn encode(data: impl AsRef<[u8]>) -> String {
    URL_SAFE.encode(data)
}

/// Decodes URL-safe base64, with or without padding
pub(crate) fn decode(encoded: impl AsRef<[u8]>) -> Result<Vec<u8>, DecodeError> {
    URL_SAFE.decode(encoded)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn encode_is_unpadded_and_url_safe() {
        assert_eq!(encode(b"{\"alg\":\"none\"}"), "eyJhbGciOiJub25lIn0");
        // 0xfb 0xff encodes to characters outside the standard alphabet
        assert_eq!(encode([0xfbu8, 0xff]), "-_8");
    }

    #[test]
    fn decode_accepts_padded_input() {
        assert_eq!(decode("aGk").unwrap(), b"hi");
        assert_eq!(decode("aGk=").unwrap(), b"hi");
    }

    #[test]
    fn decode_rejects_standard_alphabet() {
        assert!(decode("+/8").is_err());
    }
}
