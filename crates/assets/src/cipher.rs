//! Whole-blob encryption of the project source entry.
//!
//! AES-192 in CBC mode with a fixed key and IV, no padding: the plaintext is
//! zero-filled up to the block size and the first NUL marks its end.

use aes::Aes192;
use cbc::cipher::block_padding::NoPadding;
use cbc::cipher::{BlockDecryptMut, BlockEncryptMut, KeyIvInit};

use crate::BundleError;

type Aes192CbcEnc = cbc::Encryptor<Aes192>;
type Aes192CbcDec = cbc::Decryptor<Aes192>;

pub const BLOCK_SIZE: usize = 16;

const KEY: [u8; 24] = *b"-P:j$4t&OHIUVM/Z+u4DeDP.";
const IV: [u8; BLOCK_SIZE] = [0, 1, 2, 3, 4, 5, 6, 7, 8, 9, 10, 11, 12, 13, 14, 15];

fn block_aligned(bytes: &[u8]) -> Vec<u8> {
    let padded_len = bytes.len().div_ceil(BLOCK_SIZE) * BLOCK_SIZE;
    let mut buffer = Vec::with_capacity(padded_len);
    buffer.extend_from_slice(bytes);
    buffer.resize(padded_len, 0);
    buffer
}

pub fn encrypt(plaintext: &[u8]) -> Result<Vec<u8>, BundleError> {
    let mut buffer = block_aligned(plaintext);
    let len = buffer.len();
    Aes192CbcEnc::new(&KEY.into(), &IV.into())
        .encrypt_padded_mut::<NoPadding>(&mut buffer, len)
        .map_err(|_| BundleError::DecryptionFailure("encryption failed".to_string()))?;
    Ok(buffer)
}

/// Decrypts `ciphertext` and cuts the result at the first NUL byte.
/// Input whose length is not a block multiple is zero-filled first.
pub fn decrypt(ciphertext: &[u8]) -> Result<Vec<u8>, BundleError> {
    if ciphertext.is_empty() {
        return Err(BundleError::DecryptionFailure(
            "encrypted entry is empty".to_string(),
        ));
    }
    let mut buffer = block_aligned(ciphertext);
    let plain_len = Aes192CbcDec::new(&KEY.into(), &IV.into())
        .decrypt_padded_mut::<NoPadding>(&mut buffer)
        .map_err(|_| BundleError::DecryptionFailure("ciphertext is not block aligned".to_string()))?
        .len();
    buffer.truncate(plain_len);
    if let Some(end) = buffer.iter().position(|byte| *byte == 0) {
        buffer.truncate(end);
    }
    Ok(buffer)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ciphertext_is_block_aligned_and_reversible() {
        let text = br#"{"GDVersion":{"Major":2}}"#;
        let encrypted = encrypt(text).expect("encrypts");
        assert_eq!(encrypted.len() % BLOCK_SIZE, 0);
        assert_ne!(&encrypted[..text.len()], &text[..]);
        assert_eq!(decrypt(&encrypted).expect("decrypts"), text.to_vec());
    }

    #[test]
    fn plaintext_ends_at_first_nul() {
        let encrypted = encrypt(b"abc\0garbage").expect("encrypts");
        assert_eq!(decrypt(&encrypted).expect("decrypts"), b"abc".to_vec());
    }

    #[test]
    fn empty_input_fails() {
        assert!(matches!(decrypt(&[]), Err(BundleError::DecryptionFailure(_))));
    }
}
