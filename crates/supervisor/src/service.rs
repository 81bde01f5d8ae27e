//! Tenant-facing bot service.
//!
//! Layers identity resolution, entitlement checks, and credential
//! decryption over the process supervisor. This is the surface the web
//! layer calls; everything above it is out of scope here.

use arbot_core::auth::{EntitlementChecker, IdentityProvider};
use arbot_core::store::CredentialStore;
use arbot_core::types::{BotSettings, CredentialRecord, ExchangeCredential};
use arbot_core::{Error, Result};
use chrono::Utc;
use std::sync::Arc;
use tracing::info;
use uuid::Uuid;
use vault::EnvelopeCipher;

use crate::supervisor::ProcessSupervisor;

pub struct BotService {
    identity: Arc<dyn IdentityProvider>,
    entitlements: Arc<dyn EntitlementChecker>,
    credentials: Arc<dyn CredentialStore>,
    cipher: Arc<EnvelopeCipher>,
    supervisor: Arc<ProcessSupervisor>,
}

impl BotService {
    pub fn new(
        identity: Arc<dyn IdentityProvider>,
        entitlements: Arc<dyn EntitlementChecker>,
        credentials: Arc<dyn CredentialStore>,
        cipher: Arc<EnvelopeCipher>,
        supervisor: Arc<ProcessSupervisor>,
    ) -> Self {
        Self {
            identity,
            entitlements,
            credentials,
            cipher,
            supervisor,
        }
    }

    /// Start the calling tenant's bot and return the new instance id.
    pub async fn start_bot(&self, settings: BotSettings) -> Result<String> {
        let tenant_id = self.identity.resolve_tenant().await?;

        if !self.entitlements.is_entitled(&tenant_id).await? {
            return Err(Error::NotEntitled);
        }

        let records = self.credentials.list_active(&tenant_id).await?;
        if records.is_empty() {
            return Err(Error::NoCredentials);
        }

        let mut credentials = Vec::with_capacity(records.len());
        for record in records {
            credentials.push(self.decrypt_credential(record).await?);
        }

        let handle = self
            .supervisor
            .start(&tenant_id, &credentials, &settings)
            .await?;
        Ok(handle.instance_id)
    }

    /// Stop the calling tenant's bot. Idempotent.
    pub async fn stop_bot(&self) -> Result<()> {
        let tenant_id = self.identity.resolve_tenant().await?;
        self.supervisor.stop(&tenant_id).await;
        Ok(())
    }

    /// Store an exchange credential for the calling tenant, encrypting the
    /// secret fields at rest.
    pub async fn store_credential(
        &self,
        exchange_id: &str,
        api_key: &str,
        api_secret: &str,
        passphrase: Option<&str>,
        sandbox: bool,
    ) -> Result<Uuid> {
        let tenant_id = self.identity.resolve_tenant().await?;

        let record = CredentialRecord {
            id: Uuid::new_v4(),
            tenant_id: tenant_id.clone(),
            exchange_id: exchange_id.to_string(),
            api_key: api_key.to_string(),
            api_secret: self.cipher.encrypt(api_secret).await?,
            passphrase: match passphrase {
                Some(p) => Some(self.cipher.encrypt(p).await?),
                None => None,
            },
            sandbox,
            is_active: true,
            created_at: Utc::now(),
        };
        self.credentials.insert(&record).await?;

        info!(tenant_id, exchange_id, "exchange credential stored");
        Ok(record.id)
    }

    pub async fn encrypt_secret(&self, plaintext: &str) -> Result<String> {
        self.cipher.encrypt(plaintext).await
    }

    pub async fn decrypt_secret(&self, token: &str) -> Result<String> {
        self.cipher.decrypt(token).await
    }

    async fn decrypt_credential(&self, record: CredentialRecord) -> Result<ExchangeCredential> {
        Ok(ExchangeCredential {
            exchange_id: record.exchange_id,
            api_key: record.api_key,
            api_secret: self.cipher.decrypt(&record.api_secret).await?,
            passphrase: match &record.passphrase {
                Some(token) => Some(self.cipher.decrypt(token).await?),
                None => None,
            },
            sandbox: record.sandbox,
        })
    }
}
