use aes::cipher::{block_padding::Pkcs7, BlockDecryptMut, BlockEncryptMut, KeyIvInit};
use rand::RngCore;

type Aes256CbcEnc = cbc::Encryptor<aes::Aes256>;
type Aes256CbcDec = cbc::Decryptor<aes::Aes256>;

#[derive(Debug, thiserror::Error)]
pub enum VaultError {
    #[error("Vault key must be 64 hex characters (32 bytes)")]
    InvalidKey,
}

/// Symmetric vault for card numbers at rest: AES-256-CBC, a fresh random IV
/// per value, encoded as `iv:ciphertext` in lowercase hex.
#[derive(Clone)]
pub struct CardVault {
    key: [u8; 32],
}

impl CardVault {
    pub fn new(hex_key: &str) -> Result<Self, VaultError> {
        let bytes = hex::decode(hex_key).map_err(|_| VaultError::InvalidKey)?;
        let key: [u8; 32] = bytes.try_into().map_err(|_| VaultError::InvalidKey)?;
        Ok(Self { key })
    }

    pub fn encrypt(&self, plaintext: &str) -> String {
        let mut iv = [0u8; 16];
        rand::thread_rng().fill_bytes(&mut iv);

        let ciphertext = Aes256CbcEnc::new(&self.key.into(), &iv.into())
            .encrypt_padded_vec_mut::<Pkcs7>(plaintext.as_bytes());

        format!("{}:{}", hex::encode(iv), hex::encode(ciphertext))
    }

    /// Malformed input (missing separator, bad hex, wrong IV length, bad
    /// padding) decrypts to the empty string; callers treat an empty result
    /// for a non-empty stored value as a decryption failure, not as "no card".
    pub fn decrypt(&self, value: &str) -> String {
        let Some((iv_hex, ct_hex)) = value.split_once(':') else {
            return String::new();
        };
        let Ok(iv_bytes) = hex::decode(iv_hex) else {
            return String::new();
        };
        let Ok(iv) = <[u8; 16]>::try_from(iv_bytes) else {
            return String::new();
        };
        let Ok(ciphertext) = hex::decode(ct_hex) else {
            return String::new();
        };

        match Aes256CbcDec::new(&self.key.into(), &iv.into())
            .decrypt_padded_vec_mut::<Pkcs7>(&ciphertext)
        {
            Ok(plain) => String::from_utf8(plain).unwrap_or_default(),
            Err(_) => String::new(),
        }
    }
}
