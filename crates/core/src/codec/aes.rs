//! AES-128-CBC helpers for PDF encryption.

use crate::error::{PdfError, Result};
use aes::cipher::block_padding::NoPadding;
use aes::cipher::{BlockDecryptMut, BlockEncryptMut, KeyIvInit};

type Aes128CbcEnc = cbc::Encryptor<aes::Aes128>;
type Aes128CbcDec = cbc::Decryptor<aes::Aes128>;

pub const AES_BLOCK_SIZE: usize = 16;

/// Encrypt data using AES-128-CBC, applying PKCS#7 padding.
///
/// The output is always a whole number of blocks and at least one block
/// longer than the input would require, because padding is mandatory.
pub fn aes_cbc_encrypt(key: &[u8; 16], iv: &[u8; 16], plaintext: &[u8]) -> Vec<u8> {
    let pad = AES_BLOCK_SIZE - plaintext.len() % AES_BLOCK_SIZE;
    let mut buf = Vec::with_capacity(plaintext.len() + pad);
    buf.extend_from_slice(plaintext);
    buf.resize(plaintext.len() + pad, pad as u8);

    let len = buf.len();
    let cipher = Aes128CbcEnc::new(key.into(), iv.into());
    // NoPadding cannot fail on a whole number of blocks.
    cipher
        .encrypt_padded_mut::<NoPadding>(&mut buf, len)
        .expect("buffer is block aligned");
    buf
}

/// Decrypt AES-128-CBC data. The input must be a whole number of blocks;
/// PKCS#7 padding is left in place (see [`unpad_aes`]).
pub fn aes_cbc_decrypt(key: &[u8; 16], iv: &[u8; 16], data: &[u8]) -> Result<Vec<u8>> {
    if data.len() % AES_BLOCK_SIZE != 0 {
        return Err(PdfError::InvalidStream(format!(
            "AES ciphertext length {} is not a multiple of {}",
            data.len(),
            AES_BLOCK_SIZE
        )));
    }
    let mut buf = data.to_vec();
    let cipher = Aes128CbcDec::new(key.into(), iv.into());
    cipher
        .decrypt_padded_mut::<NoPadding>(&mut buf)
        .map_err(|_| PdfError::InvalidStream("AES block decryption failed".into()))?;
    Ok(buf)
}

/// Remove PKCS#7 padding from AES-decrypted data.
///
/// Returns data unchanged if the padding is invalid:
/// - padding byte value is 0 or > 16
/// - not enough bytes for the claimed padding
/// - padding bytes are not all equal to the padding length
pub fn unpad_aes(data: &[u8]) -> &[u8] {
    if data.is_empty() {
        return data;
    }

    let pad_len = data[data.len() - 1] as usize;
    if pad_len == 0 || pad_len > AES_BLOCK_SIZE || pad_len > data.len() {
        return data;
    }

    let start = data.len() - pad_len;
    if data[start..].iter().any(|&byte| byte as usize != pad_len) {
        return data;
    }

    &data[..start]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn encrypt_pads_to_block() {
        let key = [0u8; 16];
        let iv = [0u8; 16];
        assert_eq!(aes_cbc_encrypt(&key, &iv, b"PDF").len(), 16);
        assert_eq!(aes_cbc_encrypt(&key, &iv, &[0u8; 16]).len(), 32);
    }

    #[test]
    fn roundtrip_strips_padding() {
        let key = [7u8; 16];
        let iv = [9u8; 16];
        let ct = aes_cbc_encrypt(&key, &iv, b"some plaintext");
        let pt = aes_cbc_decrypt(&key, &iv, &ct).unwrap();
        assert_eq!(unpad_aes(&pt), b"some plaintext");
    }

    #[test]
    fn unpad_rejects_bad_padding() {
        assert_eq!(unpad_aes(&[1, 2, 3, 0]), &[1, 2, 3, 0]);
        assert_eq!(unpad_aes(&[1, 2, 3, 17]), &[1, 2, 3, 17]);
        assert_eq!(unpad_aes(&[1, 2, 2, 3]), &[1, 2, 2, 3]);
        assert_eq!(unpad_aes(&[1, 2, 2, 2]), &[1, 2]);
    }
}
