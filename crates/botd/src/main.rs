//! Arbot control plane daemon.
//!
//! Wires configuration, the database, the envelope cipher, and the process
//! supervisor together, then runs until interrupted. The web layer attaches
//! to the supervisor and cipher through the service facade; it is deployed
//! separately and is not part of this binary.

use anyhow::Result;
use arbot_core::config::Config;
use arbot_core::db::instances::InstanceRepository;
use arbot_core::db::trades::TradeRepository;
use std::sync::Arc;
use supervisor::{ProcessSupervisor, WorkerRegistry};
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};
use vault::{EnvelopeCipher, MasterKeySource, PgKeyStore};

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "botd=info,supervisor=info,vault=info,arbot_core=warn".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    info!("Starting Arbot control plane");

    // Fails here, before anything is served, when APP_ENV=production and no
    // master key is configured.
    let config = Config::from_env()?;

    let pool = arbot_core::db::create_pool(&config.database).await?;
    arbot_core::db::run_migrations(&pool).await?;

    let master_key = MasterKeySource::new(config.security.clone()).resolve().await?;
    let cipher = Arc::new(EnvelopeCipher::new(
        master_key,
        Arc::new(PgKeyStore::new(pool.clone())),
    ));
    // Unwrapping the active data key proves the configured master key matches
    // the stored key material; a mismatch must abort here, not on the first
    // tenant request.
    cipher.get_or_create_active_data_key().await?;
    info!("envelope cipher ready");

    let supervisor = Arc::new(ProcessSupervisor::new(
        Arc::new(WorkerRegistry::new()),
        Arc::new(InstanceRepository::new(pool.clone())),
        Arc::new(TradeRepository::new(pool)),
        config.worker.clone(),
    ));

    // Workers spawned by a previous daemon instance are not re-attached;
    // stale processes need reconciliation by tenant id outside this daemon.
    info!("supervisor ready; registry starts empty");

    tokio::signal::ctrl_c().await?;
    warn!("interrupt received; stopping all workers");
    supervisor.emergency_stop_all().await;

    Ok(())
}
