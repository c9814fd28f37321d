//! # Reversible String Codec
//!
//! Encodes opaque strings (tokens, identifiers stored in the database) so
//! they can be decoded again later with the same secret.
//!
//! ## Derivation
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  secret ──► SHA-256 ──► digest (32 bytes)                               │
//! │                          │                                              │
//! │                          ├──► key = digest          (AES-256)          │
//! │                          └──► iv  = digest[0..16]   (CBC)              │
//! │                                                                         │
//! │  encode: plaintext ──► AES-256-CBC + PKCS#7 ──► base64 (standard)      │
//! │  decode: base64 ──► AES-256-CBC + PKCS#7 ──► UTF-8 plaintext           │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Security Note
//! Key and IV both come from the one secret, so every message under a given
//! secret reuses the same IV. Equal plaintexts give equal ciphertexts and
//! equal prefixes leak. The derivation is kept exactly as is so values
//! encoded by existing deployments still decode; do not use this codec
//! where confidentiality against an observer of many ciphertexts matters.

use aes::cipher::block_padding::Pkcs7;
use aes::cipher::{BlockDecryptMut, BlockEncryptMut, KeyIvInit};
use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use secrecy::{ExposeSecret, SecretString};
use sha2::{Digest, Sha256};
use zeroize::Zeroizing;

use crate::error::CodecError;

type Aes256CbcEnc = cbc::Encryptor<aes::Aes256>;
type Aes256CbcDec = cbc::Decryptor<aes::Aes256>;

const IV_LEN: usize = 16;

/// Symmetric encode/decode helper keyed by a single secret.
///
/// Key material is derived on every call and wiped afterwards; only the
/// secret itself is held.
pub struct Codec {
    secret: SecretString,
}

impl Codec {
    /// Creates a codec for the given secret.
    pub fn new(secret: impl Into<String>) -> Self {
        Codec {
            secret: SecretString::from(secret.into()),
        }
    }

    /// Encrypts `plaintext` and returns standard base64 text.
    pub fn encode(&self, plaintext: &str) -> String {
        let digest = self.derive();
        let cipher = Aes256CbcEnc::new(digest.as_slice().into(), iv_of(&digest).into());
        let ciphertext = cipher.encrypt_padded_vec_mut::<Pkcs7>(plaintext.as_bytes());
        STANDARD.encode(ciphertext)
    }

    /// Reverses [`Codec::encode`].
    ///
    /// ## Errors
    /// - `InvalidBase64` - input is not standard base64
    /// - `InvalidCiphertext` - wrong length/padding (usually a different secret)
    /// - `InvalidUtf8` - decrypted bytes are not text
    pub fn decode(&self, encoded: &str) -> Result<String, CodecError> {
        let ciphertext = STANDARD
            .decode(encoded.trim())
            .map_err(|e| CodecError::InvalidBase64(e.to_string()))?;

        let digest = self.derive();
        let cipher = Aes256CbcDec::new(digest.as_slice().into(), iv_of(&digest).into());
        let plaintext = cipher
            .decrypt_padded_vec_mut::<Pkcs7>(&ciphertext)
            .map_err(|_| CodecError::InvalidCiphertext)?;

        String::from_utf8(plaintext).map_err(|_| CodecError::InvalidUtf8)
    }

    fn derive(&self) -> Zeroizing<[u8; 32]> {
        let mut digest = Zeroizing::new([0u8; 32]);
        digest.copy_from_slice(&Sha256::digest(self.secret.expose_secret().as_bytes()));
        digest
    }
}

fn iv_of(digest: &[u8; 32]) -> &[u8] {
    &digest[..IV_LEN]
}

impl std::fmt::Debug for Codec {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Codec")
            .field("secret", &"[REDACTED]")
            .finish()
    }
}

// =============================================================================
// Unit Tests
// =============================================================================
