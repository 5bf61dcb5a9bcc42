//! AEAD envelope encryption and checksums (spec.md §4.4, §4.6).

mod aead;
mod checksum;

pub use aead::{decrypt_blob, encrypt_blob, EncryptedBlob};
pub use checksum::sha512_hex;
