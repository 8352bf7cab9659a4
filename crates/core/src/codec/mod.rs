//! Codec primitives for PDF encryption.
//!
//! This module contains:
//! - `aes`: AES-128-CBC encryption/decryption
//! - `arcfour`: RC4 stream cipher

pub mod aes;
pub mod arcfour;

pub use aes::{aes_cbc_decrypt, aes_cbc_encrypt, unpad_aes};
pub use arcfour::Rc4;
