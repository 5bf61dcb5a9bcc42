use sha2::{Digest, Sha512};

/// SHA-512 hex digest of `bytes`, used for the plaintext integrity checksum
/// stored alongside backup metadata (spec.md §3 `checksum_sha512`).
pub fn sha512_hex(bytes: &[u8]) -> String {
    hex::encode(Sha512::digest(bytes))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn known_vector() {
        let digest = sha512_hex(b"");
        assert_eq!(
            digest,
            "cf83e1357eefb8bdf1542850d66d8007d620e4050b5715dc83f4a921d36ce9ce47d0d13c5d85f2b0ff8318d2877eec2f63b931bd47417a81a538327af927da3"
        );
    }

    #[test]
    fn different_input_different_digest() {
        assert_ne!(sha512_hex(b"a"), sha512_hex(b"b"));
    }
}
