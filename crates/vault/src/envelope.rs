//! The envelope encryption core.
//!
//! `encrypt` produces a self-describing token of four colon-delimited hex
//! fields (`salt:iv:tag:ciphertext`). Per call, a fresh salt feeds a slow
//! PBKDF2 derivation of the actual AES-256-GCM key from the active data key,
//! and a fresh nonce feeds the cipher. `decrypt` reverses the process and
//! additionally falls back to historical data keys so tokens issued before a
//! rotation stay readable; the GCM tag identifies the matching key.

use aes_gcm::aead::{Aead, KeyInit};
use aes_gcm::{Aes256Gcm, Nonce};
use arbot_core::{Error, Result};
use chrono::Utc;
use pbkdf2::pbkdf2_hmac_array;
use rand::Rng;
use sha2::{Digest, Sha256};
use std::sync::Arc;
use tracing::info;
use uuid::Uuid;

use crate::keystore::{DataKeyRecord, KeyStore};

const SALT_LENGTH: usize = 32;
const NONCE_LENGTH: usize = 12;
const TAG_LENGTH: usize = 16;

/// PBKDF2-HMAC-SHA256 iteration count for per-secret key derivation.
/// Deliberately slow; changing it invalidates no stored tokens (the salt and
/// count are fixed inputs, and the count is part of the scheme, not the token).
const PBKDF2_ITERATIONS: u32 = 100_000;

const FIELD_DELIMITER: char = ':';

/// Two-tier cipher for tenant secrets.
pub struct EnvelopeCipher {
    master_key: Vec<u8>,
    store: Arc<dyn KeyStore>,
    /// Serializes first-key creation within this process.
    create_lock: tokio::sync::Mutex<()>,
}

impl EnvelopeCipher {
    pub fn new(master_key: Vec<u8>, store: Arc<dyn KeyStore>) -> Self {
        Self {
            master_key,
            store,
            create_lock: tokio::sync::Mutex::new(()),
        }
    }

    /// Encrypt a secret string into an opaque token.
    ///
    /// Fails with a generic `Error::Crypto`; no partial output, and the
    /// plaintext is never logged.
    pub async fn encrypt(&self, plaintext: &str) -> Result<String> {
        let data_key = self
            .get_or_create_active_data_key()
            .await
            .map_err(|_| Error::Crypto)?;

        let mut salt = [0u8; SALT_LENGTH];
        rand::thread_rng().fill(&mut salt);
        let mut nonce = [0u8; NONCE_LENGTH];
        rand::thread_rng().fill(&mut nonce);

        let key = pbkdf2_hmac_array::<Sha256, 32>(&data_key, &salt, PBKDF2_ITERATIONS);
        let cipher = Aes256Gcm::new_from_slice(&key).map_err(|_| Error::Crypto)?;

        let sealed = cipher
            .encrypt(Nonce::from_slice(&nonce), plaintext.as_bytes())
            .map_err(|_| Error::Crypto)?;

        // aes-gcm appends the 16-byte tag; the token carries it as its own field.
        let (ciphertext, tag) = sealed.split_at(sealed.len() - TAG_LENGTH);

        Ok(format!(
            "{}{d}{}{d}{}{d}{}",
            hex::encode(salt),
            hex::encode(nonce),
            hex::encode(tag),
            hex::encode(ciphertext),
            d = FIELD_DELIMITER,
        ))
    }

    /// Decrypt a token produced by [`encrypt`](Self::encrypt).
    ///
    /// Tampering, a wrong key, and a malformed token all fail with the same
    /// `Error::Crypto` to avoid oracle leakage.
    pub async fn decrypt(&self, token: &str) -> Result<String> {
        let fields: Vec<&str> = token.split(FIELD_DELIMITER).collect();
        if fields.len() != 4 {
            return Err(Error::Crypto);
        }

        let salt = hex::decode(fields[0]).map_err(|_| Error::Crypto)?;
        let nonce = hex::decode(fields[1]).map_err(|_| Error::Crypto)?;
        let tag = hex::decode(fields[2]).map_err(|_| Error::Crypto)?;
        let mut sealed = hex::decode(fields[3]).map_err(|_| Error::Crypto)?;

        if nonce.len() != NONCE_LENGTH || tag.len() != TAG_LENGTH {
            return Err(Error::Crypto);
        }
        sealed.extend_from_slice(&tag);

        // Active key first, then historical keys newest-first. The GCM tag
        // check tells us which key the token was issued under.
        for data_key in self.candidate_keys().await.map_err(|_| Error::Crypto)? {
            let key = pbkdf2_hmac_array::<Sha256, 32>(&data_key, &salt, PBKDF2_ITERATIONS);
            let cipher = Aes256Gcm::new_from_slice(&key).map_err(|_| Error::Crypto)?;

            if let Ok(plaintext) = cipher.decrypt(Nonce::from_slice(&nonce), sealed.as_slice()) {
                return String::from_utf8(plaintext).map_err(|_| Error::Crypto);
            }
        }

        Err(Error::Crypto)
    }

    /// Mark the current data key inactive. The next encryption creates a
    /// fresh active key; already-issued tokens are untouched.
    pub async fn rotate(&self) -> Result<()> {
        self.store.deactivate_active(Utc::now()).await?;
        info!("encryption key rotation completed");
        Ok(())
    }

    /// Fetch the active data key, creating and persisting one if none exists.
    pub async fn get_or_create_active_data_key(&self) -> Result<Vec<u8>> {
        if let Some(record) = self.store.active_key().await? {
            return self.unwrap_data_key(&record);
        }

        let _guard = self.create_lock.lock().await;

        // A concurrent caller may have won while we waited for the lock.
        if let Some(record) = self.store.active_key().await? {
            return self.unwrap_data_key(&record);
        }

        let mut raw = [0u8; 32];
        rand::thread_rng().fill(&mut raw);

        let record = DataKeyRecord {
            key_id: Uuid::new_v4().to_string(),
            wrapped_key: self.wrap_data_key(&raw)?,
            is_active: true,
            created_at: Utc::now(),
            rotated_at: None,
        };

        if let Err(e) = self.store.insert(&record).await {
            // Lost a cross-process creation race; the winner's record is
            // authoritative.
            if let Some(existing) = self.store.active_key().await? {
                return self.unwrap_data_key(&existing);
            }
            return Err(e);
        }

        info!(key_id = %record.key_id, "created new active data key");
        Ok(raw.to_vec())
    }

    /// Key used to wrap data keys: SHA-256 of the master key.
    fn wrapping_key(&self) -> [u8; 32] {
        Sha256::digest(&self.master_key).into()
    }

    fn wrap_data_key(&self, raw: &[u8]) -> Result<String> {
        let mut nonce = [0u8; NONCE_LENGTH];
        rand::thread_rng().fill(&mut nonce);

        let cipher = Aes256Gcm::new_from_slice(&self.wrapping_key()).map_err(|_| Error::Crypto)?;
        let wrapped = cipher
            .encrypt(Nonce::from_slice(&nonce), raw)
            .map_err(|_| Error::Crypto)?;

        Ok(format!("{}:{}", hex::encode(nonce), hex::encode(wrapped)))
    }

    fn unwrap_data_key(&self, record: &DataKeyRecord) -> Result<Vec<u8>> {
        let (nonce_hex, wrapped_hex) =
            record.wrapped_key.split_once(':').ok_or(Error::Crypto)?;

        let nonce = hex::decode(nonce_hex).map_err(|_| Error::Crypto)?;
        let wrapped = hex::decode(wrapped_hex).map_err(|_| Error::Crypto)?;
        if nonce.len() != NONCE_LENGTH {
            return Err(Error::Crypto);
        }

        let cipher = Aes256Gcm::new_from_slice(&self.wrapping_key()).map_err(|_| Error::Crypto)?;
        cipher
            .decrypt(Nonce::from_slice(&nonce), wrapped.as_slice())
            .map_err(|_| Error::Crypto)
    }

    /// Raw data keys to try for decryption: active first, then historical.
    /// Records that no longer unwrap (for example, wrapped under a replaced
    /// master key) are skipped.
    async fn candidate_keys(&self) -> Result<Vec<Vec<u8>>> {
        let mut keys = Vec::new();

        if let Some(record) = self.store.active_key().await? {
            if let Ok(raw) = self.unwrap_data_key(&record) {
                keys.push(raw);
            }
        }

        for record in self.store.historical_keys().await? {
            if let Ok(raw) = self.unwrap_data_key(&record) {
                keys.push(raw);
            }
        }

        Ok(keys)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::keystore::MemoryKeyStore;

    fn test_cipher() -> (EnvelopeCipher, MemoryKeyStore) {
        let store = MemoryKeyStore::new();
        let cipher = EnvelopeCipher::new(b"test-master-key".to_vec(), Arc::new(store.clone()));
        (cipher, store)
    }

    #[tokio::test]
    async fn test_round_trip() {
        let (cipher, _) = test_cipher();

        let token = cipher.encrypt("sk_live_abc123").await.unwrap();
        assert_eq!(cipher.decrypt(&token).await.unwrap(), "sk_live_abc123");
    }

    #[tokio::test]
    async fn test_token_has_four_hex_fields() {
        let (cipher, _) = test_cipher();

        let token = cipher.encrypt("sk_live_abc123").await.unwrap();
        let fields: Vec<&str> = token.split(':').collect();

        assert_eq!(fields.len(), 4);
        for field in fields {
            assert!(hex::decode(field).is_ok());
        }
    }

    #[tokio::test]
    async fn test_same_plaintext_yields_different_tokens() {
        let (cipher, _) = test_cipher();

        let a = cipher.encrypt("same-secret").await.unwrap();
        let b = cipher.encrypt("same-secret").await.unwrap();
        assert_ne!(a, b);

        assert_eq!(cipher.decrypt(&a).await.unwrap(), "same-secret");
        assert_eq!(cipher.decrypt(&b).await.unwrap(), "same-secret");
    }

    #[tokio::test]
    async fn test_tampered_ciphertext_fails() {
        let (cipher, _) = test_cipher();

        let token = cipher.encrypt("secret").await.unwrap();
        let mut fields: Vec<String> = token.split(':').map(str::to_string).collect();

        // Flip one bit in the ciphertext field.
        let mut ct = hex::decode(&fields[3]).unwrap();
        ct[0] ^= 0x01;
        fields[3] = hex::encode(ct);

        let result = cipher.decrypt(&fields.join(":")).await;
        assert!(matches!(result, Err(Error::Crypto)));
    }

    #[tokio::test]
    async fn test_tampered_tag_fails() {
        let (cipher, _) = test_cipher();

        let token = cipher.encrypt("secret").await.unwrap();
        let mut fields: Vec<String> = token.split(':').map(str::to_string).collect();

        let mut tag = hex::decode(&fields[2]).unwrap();
        tag[15] ^= 0x80;
        fields[2] = hex::encode(tag);

        let result = cipher.decrypt(&fields.join(":")).await;
        assert!(matches!(result, Err(Error::Crypto)));
    }

    #[tokio::test]
    async fn test_malformed_tokens_fail() {
        let (cipher, _) = test_cipher();
        cipher.encrypt("seed the key store").await.unwrap();

        for token in ["", "abc", "aa:bb:cc", "aa:bb:cc:dd:ee", "zz:zz:zz:zz"] {
            assert!(matches!(cipher.decrypt(token).await, Err(Error::Crypto)));
        }
    }

    #[tokio::test]
    async fn test_rotation_creates_new_key_and_keeps_old_tokens_readable() {
        let (cipher, store) = test_cipher();

        let old_token = cipher.encrypt("pre-rotation").await.unwrap();
        let old_key_id = store.all_records().await[0].key_id.clone();

        cipher.rotate().await.unwrap();
        let new_token = cipher.encrypt("post-rotation").await.unwrap();

        let records = store.all_records().await;
        assert_eq!(records.len(), 2);

        let active: Vec<_> = records.iter().filter(|r| r.is_active).collect();
        assert_eq!(active.len(), 1);
        assert_ne!(active[0].key_id, old_key_id);

        let rotated = records.iter().find(|r| r.key_id == old_key_id).unwrap();
        assert!(rotated.rotated_at.is_some());

        // Both tokens decrypt: the new one under the active key, the old one
        // via the historical fallback.
        assert_eq!(cipher.decrypt(&new_token).await.unwrap(), "post-rotation");
        assert_eq!(cipher.decrypt(&old_token).await.unwrap(), "pre-rotation");
    }

    #[tokio::test]
    async fn test_concurrent_first_encrypt_creates_one_key() {
        let store = MemoryKeyStore::new();
        let cipher = Arc::new(EnvelopeCipher::new(
            b"test-master-key".to_vec(),
            Arc::new(store.clone()),
        ));

        let a = tokio::spawn({
            let cipher = cipher.clone();
            async move { cipher.encrypt("first").await }
        });
        let b = tokio::spawn({
            let cipher = cipher.clone();
            async move { cipher.encrypt("second").await }
        });

        a.await.unwrap().unwrap();
        b.await.unwrap().unwrap();

        let records = store.all_records().await;
        assert_eq!(records.len(), 1);
        assert!(records[0].is_active);
    }

    #[tokio::test]
    async fn test_wrong_master_key_is_detected_at_key_check() {
        let store = MemoryKeyStore::new();
        let cipher = EnvelopeCipher::new(b"master-key-a".to_vec(), Arc::new(store.clone()));
        let token = cipher.encrypt("secret").await.unwrap();

        // A cipher holding the wrong master key cannot unwrap the stored
        // active data key, so the startup key check fails rather than
        // silently minting a second key.
        let wrong = EnvelopeCipher::new(b"master-key-b".to_vec(), Arc::new(store.clone()));
        assert!(matches!(
            wrong.get_or_create_active_data_key().await,
            Err(Error::Crypto)
        ));
        assert!(matches!(wrong.decrypt(&token).await, Err(Error::Crypto)));
        assert_eq!(store.all_records().await.len(), 1);
    }

    #[tokio::test]
    async fn test_empty_plaintext_round_trips() {
        let (cipher, _) = test_cipher();

        let token = cipher.encrypt("").await.unwrap();
        assert_eq!(cipher.decrypt(&token).await.unwrap(), "");
    }
}
