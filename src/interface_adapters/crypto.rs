//! Optional confidentiality extension for the frame codec: AES-256-CTR with a
//! fresh random nonce per frame, prepended to the ciphertext so the checksum
//! covers `nonce || ciphertext` rather than the plaintext.

use aes::Aes256;
use ctr::cipher::{KeyIvInit, StreamCipher};
use rand::RngCore;

type Aes256Ctr = ctr::Ctr64BE<Aes256>;

pub const KEY_SIZE: usize = 32;
pub const NONCE_SIZE: usize = 16;

#[derive(Clone)]
pub struct FrameCipher {
    key: [u8; KEY_SIZE],
}

impl FrameCipher {
    pub fn new(key: &[u8; KEY_SIZE]) -> Self {
        Self { key: *key }
    }

    /// Parses a hex-encoded key from configuration, validating its length.
    pub fn from_hex(hex: &str) -> Result<Self, CryptoConfigError> {
        let bytes = decode_hex(hex).ok_or(CryptoConfigError::InvalidHex)?;
        if bytes.len() != KEY_SIZE {
            return Err(CryptoConfigError::WrongLength(bytes.len()));
        }
        let mut key = [0u8; KEY_SIZE];
        key.copy_from_slice(&bytes);
        Ok(Self::new(&key))
    }

    /// Encrypts `plaintext` and returns `nonce || ciphertext`.
    pub fn seal(&self, plaintext: &[u8]) -> Vec<u8> {
        let mut nonce = [0u8; NONCE_SIZE];
        rand::thread_rng().fill_bytes(&mut nonce);

        let mut buf = plaintext.to_vec();
        let mut cipher = Aes256Ctr::new((&self.key).into(), (&nonce).into());
        cipher.apply_keystream(&mut buf);

        let mut out = Vec::with_capacity(NONCE_SIZE + buf.len());
        out.extend_from_slice(&nonce);
        out.extend_from_slice(&buf);
        out
    }

    /// Decrypts a `nonce || ciphertext` region back into plaintext.
    pub fn open(&self, region: &[u8]) -> Option<Vec<u8>> {
        if region.len() < NONCE_SIZE {
            return None;
        }
        let (nonce, ciphertext) = region.split_at(NONCE_SIZE);
        let mut buf = ciphertext.to_vec();
        let mut cipher = Aes256Ctr::new((&self.key).into(), nonce.into());
        cipher.apply_keystream(&mut buf);
        Some(buf)
    }
}

#[derive(Debug, thiserror::Error)]
pub enum CryptoConfigError {
    #[error("encryption key is not valid hex")]
    InvalidHex,
    #[error("encryption key must decode to {KEY_SIZE} bytes, got {0}")]
    WrongLength(usize),
}

fn decode_hex(s: &str) -> Option<Vec<u8>> {
    if s.len() % 2 != 0 {
        return None;
    }
    (0..s.len())
        .step_by(2)
        .map(|i| u8::from_str_radix(&s[i..i + 2], 16).ok())
        .collect()
}
