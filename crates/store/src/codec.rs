//! Reversible byte transform applied to conversation records before they
//! hit disk.
//!
//! The default codec is a repeating-key XOR. This is obfuscation, not
//! encryption: it keeps transcripts from turning up in casual text
//! searches but offers zero confidentiality against anyone who looks at
//! the key. If real confidentiality is ever needed, implement
//! [`RecordCodec`] over an authenticated cipher and hand it to the store;
//! none of the store logic changes.

/// Tag prepended to every encoded record. Files without it are treated as
/// legacy plain-serialized records.
pub const RECORD_MAGIC: &[u8; 9] = b"ORION_ENC";

const XOR_KEY: &[u8] = b"OrionEncryptedChatV1";

/// Byte transform between the serialized record and what is written to
/// disk. Encode and decode must be exact inverses.
pub trait RecordCodec {
    fn encode(&self, plain: &[u8]) -> Vec<u8>;
    fn decode(&self, coded: &[u8]) -> Vec<u8>;
}

/// Repeating-key XOR. Self-inverse, so encode and decode are the same
/// operation.
pub struct XorObfuscator;

fn xor_with_key(data: &[u8]) -> Vec<u8> {
    data.iter()
        .enumerate()
        .map(|(i, b)| b ^ XOR_KEY[i % XOR_KEY.len()])
        .collect()
}

impl RecordCodec for XorObfuscator {
    fn encode(&self, plain: &[u8]) -> Vec<u8> {
        xor_with_key(plain)
    }

    fn decode(&self, coded: &[u8]) -> Vec<u8> {
        xor_with_key(coded)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_decode_inverts_encode() {
        let codec = XorObfuscator;
        let samples: Vec<Vec<u8>> = vec![
            b"".to_vec(),
            b"x".to_vec(),
            b"{\"id\":1,\"turns\":[]}".to_vec(),
            (0u8..=255).collect(),
            vec![0u8; 1024],
        ];
        for sample in samples {
            assert_eq!(codec.decode(&codec.encode(&sample)), sample);
        }
    }

    #[test]
    fn test_encode_actually_changes_bytes() {
        let codec = XorObfuscator;
        let plain = b"plainly readable transcript text";
        assert_ne!(codec.encode(plain), plain.to_vec());
    }
}
