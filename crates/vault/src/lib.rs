//! Envelope encryption for tenant exchange credentials.
//!
//! Two-tier scheme: a long-lived master key wraps a rotatable data key, and
//! each stored secret is encrypted under a key derived from the data key with
//! a per-secret random salt. The master key never touches tenant ciphertext
//! directly, so the data key can be rotated without re-wrapping every secret.

pub mod envelope;
pub mod keystore;
pub mod keystore_pg;
pub mod master_key;

pub use envelope::EnvelopeCipher;
pub use keystore::{DataKeyRecord, KeyStore, MemoryKeyStore};
pub use keystore_pg::PgKeyStore;
pub use master_key::MasterKeySource;
