//! Worker process lifecycle management.
//!
//! One event task per worker owns the child process and multiplexes its
//! stdout, stderr, exit, the stop request, and the forced-kill deadline.
//! Per-tenant start/stop calls are serialized; nothing is locked across
//! tenants.

use arbot_core::config::WorkerConfig;
use arbot_core::store::{InstanceStore, TradeStore};
use arbot_core::types::{BotInstanceRecord, BotSettings, ExchangeCredential, InstanceStatus, TradeRecord};
use arbot_core::{Error, Result};
use chrono::Utc;
use dashmap::DashMap;
use nix::sys::signal::{kill, Signal};
use nix::unistd::Pid;
use std::process::Stdio;
use std::sync::Arc;
use std::time::Duration;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::process::{Child, ChildStderr, ChildStdout, Command};
use tokio::sync::{mpsc, Mutex};
use tokio::task::JoinSet;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::output;
use crate::registry::{WorkerHandle, WorkerRegistry, WorkerState};

/// Supervises at most one worker process per tenant.
pub struct ProcessSupervisor {
    registry: Arc<WorkerRegistry>,
    instances: Arc<dyn InstanceStore>,
    trades: Arc<dyn TradeStore>,
    worker: WorkerConfig,
    /// Serializes start/stop per tenant; never locked across tenants.
    tenant_locks: DashMap<String, Arc<Mutex<()>>>,
}

impl ProcessSupervisor {
    pub fn new(
        registry: Arc<WorkerRegistry>,
        instances: Arc<dyn InstanceStore>,
        trades: Arc<dyn TradeStore>,
        worker: WorkerConfig,
    ) -> Self {
        Self {
            registry,
            instances,
            trades,
            worker,
            tenant_locks: DashMap::new(),
        }
    }

    pub fn registry(&self) -> &Arc<WorkerRegistry> {
        &self.registry
    }

    /// Start a worker for the tenant, tearing down any existing one first.
    ///
    /// The handle is registered before output handling is wired up, so an
    /// immediate exit can never observe an unregistered worker. On launch
    /// failure nothing is registered.
    pub async fn start(
        &self,
        tenant_id: &str,
        credentials: &[ExchangeCredential],
        settings: &BotSettings,
    ) -> Result<WorkerHandle> {
        if credentials.is_empty() {
            return Err(Error::NoCredentials);
        }

        let lock = self.tenant_lock(tenant_id);
        let _guard = lock.lock().await;

        // At most one live worker per tenant.
        self.stop_locked(tenant_id).await;

        let mut child = self
            .build_command(tenant_id, credentials, settings)?
            .spawn()
            .map_err(|e| Error::Launch {
                message: e.to_string(),
            })?;

        let pid = child.id().ok_or_else(|| Error::Launch {
            message: "worker exited before a pid could be read".to_string(),
        })?;

        let stdout = child.stdout.take();
        let stderr = child.stderr.take();
        let (stop_tx, stop_rx) = mpsc::channel(1);

        // Unique per launch; exit handling relies on it to tell a stale
        // worker's events apart from its replacement's.
        let instance_id = format!("bot_{}_{}", tenant_id, Uuid::new_v4().simple());
        let handle = WorkerHandle {
            tenant_id: tenant_id.to_string(),
            instance_id: instance_id.clone(),
            pid,
            state: WorkerState::Running,
            started_at: Utc::now(),
            stop_tx,
        };
        self.registry.set(handle.clone());

        let record = BotInstanceRecord {
            id: instance_id,
            tenant_id: tenant_id.to_string(),
            status: InstanceStatus::Running,
            settings: serde_json::to_value(settings)?,
            started_at: Some(handle.started_at),
            stopped_at: None,
            last_heartbeat: None,
        };
        if let Err(e) = self.instances.upsert(&record).await {
            warn!(tenant_id, error = %e, "instance record write failed; retrying once");
            if let Err(e) = self.instances.upsert(&record).await {
                warn!(tenant_id, error = %e, "instance record write failed");
            }
        }

        let events = WorkerEvents {
            tenant_id: tenant_id.to_string(),
            instance_id: handle.instance_id.clone(),
            pid,
            grace: Duration::from_secs(self.worker.grace_period_secs),
            registry: Arc::clone(&self.registry),
            instances: Arc::clone(&self.instances),
            trades: Arc::clone(&self.trades),
        };
        tokio::spawn(events.run(child, stdout, stderr, stop_rx));

        info!(tenant_id, pid, instance_id = %handle.instance_id, "worker started");
        Ok(handle)
    }

    /// Stop the tenant's worker. A no-op when none is registered.
    ///
    /// The handle leaves the registry immediately; the OS process gets
    /// SIGTERM and, failing that, SIGKILL after the grace period.
    pub async fn stop(&self, tenant_id: &str) {
        let lock = self.tenant_lock(tenant_id);
        let _guard = lock.lock().await;
        self.stop_locked(tenant_id).await;
    }

    /// Concurrently stop every registered worker. Individual failures are
    /// logged, never propagated.
    pub async fn emergency_stop_all(self: &Arc<Self>) {
        let tenants: Vec<String> = self
            .registry
            .list_all()
            .into_iter()
            .map(|h| h.tenant_id)
            .collect();

        warn!(count = tenants.len(), "EMERGENCY STOP: stopping all bot workers");

        let mut tasks = JoinSet::new();
        for tenant_id in tenants {
            let supervisor = Arc::clone(self);
            tasks.spawn(async move { supervisor.stop(&tenant_id).await });
        }

        while let Some(result) = tasks.join_next().await {
            if let Err(e) = result {
                warn!(error = %e, "emergency stop task failed");
            }
        }

        warn!("EMERGENCY STOP: all workers stopped");
    }

    /// Current handle for a tenant, if a worker is registered.
    pub fn status(&self, tenant_id: &str) -> Option<WorkerHandle> {
        self.registry.get(tenant_id)
    }

    /// Handles for all registered workers.
    pub fn list_active(&self) -> Vec<WorkerHandle> {
        self.registry.list_all()
    }

    async fn stop_locked(&self, tenant_id: &str) {
        let Some(handle) = self.registry.remove(tenant_id) else {
            return;
        };

        // The worker is logically stopped as of now; its event task drives
        // the SIGTERM / grace-period / SIGKILL sequence to completion.
        let _ = handle.stop_tx.try_send(());
        info!(tenant_id, pid = handle.pid, "worker stop requested");
    }

    fn build_command(
        &self,
        tenant_id: &str,
        credentials: &[ExchangeCredential],
        settings: &BotSettings,
    ) -> Result<Command> {
        let mut cmd = Command::new(&self.worker.command);
        cmd.arg(&self.worker.script)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped());

        // Secrets travel only through the worker's environment: never on the
        // command line (visible in process listings) and never into logs.
        cmd.env("TENANT_ID", tenant_id)
            .env("BOT_SETTINGS", serde_json::to_string(settings)?)
            .env("BOT_CREDENTIALS", serde_json::to_string(credentials)?);

        for cred in credentials {
            let prefix = cred.exchange_id.to_uppercase();
            cmd.env(format!("{prefix}_API_KEY"), &cred.api_key);
            cmd.env(format!("{prefix}_API_SECRET"), &cred.api_secret);
            if let Some(passphrase) = &cred.passphrase {
                cmd.env(format!("{prefix}_PASSPHRASE"), passphrase);
            }
            cmd.env(format!("{prefix}_SANDBOX"), cred.sandbox.to_string());
        }

        Ok(cmd)
    }

    fn tenant_lock(&self, tenant_id: &str) -> Arc<Mutex<()>> {
        self.tenant_locks
            .entry(tenant_id.to_string())
            .or_default()
            .clone()
    }
}

/// Per-worker event task state.
struct WorkerEvents {
    tenant_id: String,
    instance_id: String,
    pid: u32,
    grace: Duration,
    registry: Arc<WorkerRegistry>,
    instances: Arc<dyn InstanceStore>,
    trades: Arc<dyn TradeStore>,
}

impl WorkerEvents {
    /// Consume worker events until the process exits.
    async fn run(
        self,
        mut child: Child,
        stdout: Option<ChildStdout>,
        stderr: Option<ChildStderr>,
        mut stop_rx: mpsc::Receiver<()>,
    ) {
        let mut stdout_lines = stdout.map(|s| BufReader::new(s).lines());
        let mut stderr_lines = stderr.map(|s| BufReader::new(s).lines());
        let mut stdout_open = stdout_lines.is_some();
        let mut stderr_open = stderr_lines.is_some();

        // Armed with the real deadline once a stop request arrives.
        let force_kill = tokio::time::sleep(Duration::from_secs(u32::MAX as u64));
        tokio::pin!(force_kill);
        let mut stopping = false;
        let mut force_killed = false;

        let exit_status = loop {
            tokio::select! {
                line = next_line(&mut stdout_lines), if stdout_open => match line {
                    Some(line) => self.handle_stdout(&line).await,
                    None => stdout_open = false,
                },
                line = next_line(&mut stderr_lines), if stderr_open => match line {
                    Some(line) => self.handle_stderr(&line).await,
                    None => stderr_open = false,
                },
                _ = stop_rx.recv(), if !stopping => {
                    stopping = true;
                    self.signal(Signal::SIGTERM);
                    force_kill
                        .as_mut()
                        .reset(tokio::time::Instant::now() + self.grace);
                }
                _ = force_kill.as_mut(), if stopping && !force_killed => {
                    force_killed = true;
                    warn!(
                        tenant_id = %self.tenant_id,
                        pid = self.pid,
                        "worker did not exit within grace period; force killing"
                    );
                    self.signal(Signal::SIGKILL);
                }
                status = child.wait() => break status,
            }
        };

        // The pipes may still hold buffered output from a fast exit.
        while let Some(line) = next_line(&mut stdout_lines).await {
            self.handle_stdout(&line).await;
        }
        while let Some(line) = next_line(&mut stderr_lines).await {
            self.handle_stderr(&line).await;
        }

        self.handle_exit(exit_status, stopping).await;
    }

    async fn handle_stdout(&self, line: &str) {
        debug!(tenant_id = %self.tenant_id, line, "worker stdout");

        if let Some(raw) = output::trade_payload(line) {
            match output::parse_trade(&self.tenant_id, raw) {
                Ok(trade) => self.persist_trade(&trade).await,
                Err(e) => {
                    warn!(tenant_id = %self.tenant_id, error = %e, "dropping malformed trade payload")
                }
            }
        }

        self.touch_heartbeat().await;
    }

    async fn handle_stderr(&self, line: &str) {
        warn!(tenant_id = %self.tenant_id, line, "worker stderr");
        self.persist_status(InstanceStatus::Error, None).await;
    }

    async fn handle_exit(&self, status: std::io::Result<std::process::ExitStatus>, stopping: bool) {
        self.registry.remove_instance(&self.tenant_id, &self.instance_id);

        let final_status = match &status {
            Ok(s) if s.success() || stopping => InstanceStatus::Stopped,
            _ => InstanceStatus::Error,
        };

        info!(
            tenant_id = %self.tenant_id,
            pid = self.pid,
            code = status.as_ref().ok().and_then(|s| s.code()),
            status = final_status.as_str(),
            "worker exited"
        );

        // A replacement worker may already own the tenant's instance record;
        // this exit must not overwrite its status.
        if self
            .registry
            .get(&self.tenant_id)
            .is_some_and(|h| h.instance_id != self.instance_id)
        {
            return;
        }

        self.persist_status(final_status, Some(Utc::now())).await;
    }

    fn signal(&self, signal: Signal) {
        if let Err(e) = kill(Pid::from_raw(self.pid as i32), signal) {
            debug!(pid = self.pid, %signal, error = %e, "failed to signal worker");
        }
    }

    // Persistence failures inside event handling are logged, never raised:
    // a failing write must not wedge the supervisor or strand a dead handle.
    // Each write gets one immediate retry before the update is dropped.

    async fn persist_trade(&self, trade: &TradeRecord) {
        if let Err(e) = self.trades.insert(trade).await {
            warn!(tenant_id = %self.tenant_id, error = %e, "trade write failed; retrying once");
            if let Err(e) = self.trades.insert(trade).await {
                warn!(tenant_id = %self.tenant_id, error = %e, "trade write failed; dropping record");
            }
        } else {
            info!(
                tenant_id = %self.tenant_id,
                exchange = %trade.exchange_id,
                profit = %trade.profit_amount,
                "trade persisted"
            );
        }
    }

    async fn touch_heartbeat(&self) {
        if self.instances.touch_heartbeat(&self.tenant_id).await.is_err() {
            if let Err(e) = self.instances.touch_heartbeat(&self.tenant_id).await {
                warn!(tenant_id = %self.tenant_id, error = %e, "heartbeat write failed; dropping update");
            }
        }
    }

    async fn persist_status(
        &self,
        status: InstanceStatus,
        stopped_at: Option<chrono::DateTime<Utc>>,
    ) {
        if self
            .instances
            .set_status(&self.tenant_id, status, stopped_at)
            .await
            .is_err()
        {
            if let Err(e) = self
                .instances
                .set_status(&self.tenant_id, status, stopped_at)
                .await
            {
                warn!(tenant_id = %self.tenant_id, error = %e, "status write failed; dropping update");
            }
        }
    }
}

/// Next line from an optional stream; `None` once the stream is closed.
async fn next_line<R>(lines: &mut Option<tokio::io::Lines<BufReader<R>>>) -> Option<String>
where
    R: tokio::io::AsyncRead + Unpin,
{
    match lines {
        Some(lines) => lines.next_line().await.ok().flatten(),
        None => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::{MemoryInstanceStore, MemoryTradeStore};
    use std::path::PathBuf;

    struct TestCtx {
        supervisor: Arc<ProcessSupervisor>,
        instances: MemoryInstanceStore,
        trades: MemoryTradeStore,
    }

    fn write_script(contents: &str) -> PathBuf {
        let path = std::env::temp_dir().join(format!("arbot-worker-{}.sh", uuid::Uuid::new_v4()));
        std::fs::write(&path, contents).unwrap();
        path
    }

    fn supervisor_for(script: &str, grace_period_secs: u64) -> TestCtx {
        let instances = MemoryInstanceStore::new();
        let trades = MemoryTradeStore::new();
        let supervisor = Arc::new(ProcessSupervisor::new(
            Arc::new(WorkerRegistry::new()),
            Arc::new(instances.clone()),
            Arc::new(trades.clone()),
            WorkerConfig {
                command: "sh".to_string(),
                script: write_script(script),
                grace_period_secs,
            },
        ));
        TestCtx {
            supervisor,
            instances,
            trades,
        }
    }

    fn test_credentials() -> Vec<ExchangeCredential> {
        vec![ExchangeCredential {
            exchange_id: "binance".to_string(),
            api_key: "key".to_string(),
            api_secret: "secret".to_string(),
            passphrase: None,
            sandbox: true,
        }]
    }

    async fn wait_until<F, Fut>(timeout_ms: u64, mut condition: F) -> bool
    where
        F: FnMut() -> Fut,
        Fut: std::future::Future<Output = bool>,
    {
        let deadline = tokio::time::Instant::now() + Duration::from_millis(timeout_ms);
        while tokio::time::Instant::now() < deadline {
            if condition().await {
                return true;
            }
            tokio::time::sleep(Duration::from_millis(50)).await;
        }
        false
    }

    fn pid_alive(pid: u32) -> bool {
        kill(Pid::from_raw(pid as i32), None).is_ok()
    }

    const TRADE_LINE: &str = r#"echo 'TRADE_COMPLETED: {"exchange":"binance","trianglePath":"BTC/USDT -> ETH/BTC -> ETH/USDT","initialAmount":100.0,"finalAmount":100.8,"profitAmount":0.8,"profitPercentage":0.8,"fees":0.15,"status":"success","executionTimeMs":1000}'"#;

    #[tokio::test]
    async fn test_start_with_empty_credentials_fails() {
        let ctx = supervisor_for("sleep 30", 10);

        let result = ctx.supervisor.start("u1", &[], &BotSettings::default()).await;
        assert!(matches!(result, Err(Error::NoCredentials)));
        assert!(ctx.supervisor.registry().is_empty());
    }

    #[tokio::test]
    async fn test_start_registers_handle_and_persists_instance() {
        let ctx = supervisor_for("sleep 30", 10);

        let handle = ctx
            .supervisor
            .start("u1", &test_credentials(), &BotSettings::default())
            .await
            .unwrap();

        assert_eq!(ctx.supervisor.status("u1").unwrap().pid, handle.pid);
        let record = ctx.instances.get("u1").await.unwrap();
        assert_eq!(record.status, InstanceStatus::Running);
        assert!(record.started_at.is_some());

        ctx.supervisor.stop("u1").await;
    }

    #[tokio::test]
    async fn test_trade_output_is_parsed_and_persisted() {
        let ctx = supervisor_for(TRADE_LINE, 10);

        ctx.supervisor
            .start("u2", &test_credentials(), &BotSettings::default())
            .await
            .unwrap();

        let trades = ctx.trades.clone();
        assert!(wait_until(5000, || async { trades.all().await.len() == 1 }).await);

        let trade = &ctx.trades.all().await[0];
        assert_eq!(trade.tenant_id, "u2");
        assert_eq!(trade.exchange_id, "binance");
        assert_eq!(trade.path, "BTC/USDT -> ETH/BTC -> ETH/USDT");
        assert_eq!(trade.status, "success");
    }

    #[tokio::test]
    async fn test_malformed_trade_payload_is_dropped() {
        let ctx = supervisor_for("echo 'TRADE_COMPLETED: {not json'", 10);

        ctx.supervisor
            .start("u1", &test_credentials(), &BotSettings::default())
            .await
            .unwrap();

        // Worker exits after printing; its line still refreshed the heartbeat.
        let instances = ctx.instances.clone();
        assert!(
            wait_until(5000, || async {
                instances
                    .get("u1")
                    .await
                    .is_some_and(|r| r.last_heartbeat.is_some())
            })
            .await
        );
        assert!(ctx.trades.all().await.is_empty());
    }

    #[tokio::test]
    async fn test_clean_exit_deregisters_and_marks_stopped() {
        let ctx = supervisor_for("echo done", 10);

        ctx.supervisor
            .start("u1", &test_credentials(), &BotSettings::default())
            .await
            .unwrap();

        let supervisor = ctx.supervisor.clone();
        assert!(wait_until(5000, || async { supervisor.registry().is_empty() }).await);

        let record = ctx.instances.get("u1").await.unwrap();
        assert_eq!(record.status, InstanceStatus::Stopped);
        assert!(record.stopped_at.is_some());
    }

    #[tokio::test]
    async fn test_crash_is_marked_error() {
        let ctx = supervisor_for("exit 3", 10);

        ctx.supervisor
            .start("u1", &test_credentials(), &BotSettings::default())
            .await
            .unwrap();

        let instances = ctx.instances.clone();
        assert!(
            wait_until(5000, || async {
                instances
                    .get("u1")
                    .await
                    .is_some_and(|r| r.status == InstanceStatus::Error)
            })
            .await
        );
        assert!(ctx.supervisor.registry().is_empty());
    }

    #[tokio::test]
    async fn test_second_start_replaces_first_worker() {
        let ctx = supervisor_for("sleep 30", 10);

        let first = ctx
            .supervisor
            .start("u1", &test_credentials(), &BotSettings::default())
            .await
            .unwrap();
        let second = ctx
            .supervisor
            .start("u1", &test_credentials(), &BotSettings::default())
            .await
            .unwrap();

        assert_eq!(ctx.supervisor.registry().len(), 1);
        assert_eq!(
            ctx.supervisor.status("u1").unwrap().instance_id,
            second.instance_id
        );

        // The first worker received SIGTERM and goes away.
        let first_pid = first.pid;
        assert!(wait_until(5000, || async move { !pid_alive(first_pid) }).await);
        assert!(pid_alive(second.pid));

        // The first worker's exit must not deregister the replacement or
        // overwrite its instance record.
        tokio::time::sleep(Duration::from_millis(200)).await;
        assert_eq!(
            ctx.supervisor.status("u1").unwrap().instance_id,
            second.instance_id
        );
        assert_eq!(
            ctx.instances.get("u1").await.unwrap().status,
            InstanceStatus::Running
        );

        ctx.supervisor.stop("u1").await;
    }

    #[tokio::test]
    async fn test_stop_without_worker_is_noop() {
        let ctx = supervisor_for("sleep 30", 10);
        ctx.supervisor.stop("missing").await;
        assert!(ctx.supervisor.registry().is_empty());
    }

    #[tokio::test]
    async fn test_stop_terminates_worker_and_marks_stopped() {
        let ctx = supervisor_for("sleep 30", 10);

        let handle = ctx
            .supervisor
            .start("u1", &test_credentials(), &BotSettings::default())
            .await
            .unwrap();

        ctx.supervisor.stop("u1").await;
        // Deregistered immediately, independent of OS-level exit.
        assert!(ctx.supervisor.registry().is_empty());

        let pid = handle.pid;
        assert!(wait_until(5000, || async move { !pid_alive(pid) }).await);

        let instances = ctx.instances.clone();
        assert!(
            wait_until(5000, || async {
                instances
                    .get("u1")
                    .await
                    .is_some_and(|r| r.status == InstanceStatus::Stopped)
            })
            .await
        );
    }

    #[tokio::test]
    async fn test_sigterm_resistant_worker_is_force_killed() {
        let ctx = supervisor_for("trap '' TERM\nsleep 30", 1);

        let handle = ctx
            .supervisor
            .start("u1", &test_credentials(), &BotSettings::default())
            .await
            .unwrap();

        ctx.supervisor.stop("u1").await;

        let pid = handle.pid;
        assert!(wait_until(5000, || async move { !pid_alive(pid) }).await);
    }

    struct FailingInstanceStore;

    #[async_trait::async_trait]
    impl InstanceStore for FailingInstanceStore {
        async fn upsert(&self, _record: &BotInstanceRecord) -> Result<()> {
            Err(Error::Config {
                message: "instance write rejected".to_string(),
            })
        }

        async fn set_status(
            &self,
            _tenant_id: &str,
            _status: InstanceStatus,
            _stopped_at: Option<chrono::DateTime<Utc>>,
        ) -> Result<()> {
            Err(Error::Config {
                message: "status write rejected".to_string(),
            })
        }

        async fn touch_heartbeat(&self, _tenant_id: &str) -> Result<()> {
            Err(Error::Config {
                message: "heartbeat write rejected".to_string(),
            })
        }
    }

    struct FailingTradeStore;

    #[async_trait::async_trait]
    impl TradeStore for FailingTradeStore {
        async fn insert(&self, _trade: &TradeRecord) -> Result<()> {
            Err(Error::Config {
                message: "trade write rejected".to_string(),
            })
        }
    }

    #[tokio::test]
    async fn test_persistence_failures_never_wedge_supervisor() {
        // Every durable write fails; the worker prints a trade and exits.
        let supervisor = Arc::new(ProcessSupervisor::new(
            Arc::new(WorkerRegistry::new()),
            Arc::new(FailingInstanceStore),
            Arc::new(FailingTradeStore),
            WorkerConfig {
                command: "sh".to_string(),
                script: write_script(TRADE_LINE),
                grace_period_secs: 10,
            },
        ));

        // Start succeeds despite the failing instance upsert.
        supervisor
            .start("u1", &test_credentials(), &BotSettings::default())
            .await
            .unwrap();

        // The exit handler still deregisters even though the trade,
        // heartbeat, and final status writes all keep failing.
        let s = supervisor.clone();
        assert!(wait_until(5000, || async { s.registry().is_empty() }).await);

        // The tenant is not stuck: a fresh start works and stop still lands.
        supervisor
            .start("u1", &test_credentials(), &BotSettings::default())
            .await
            .unwrap();
        supervisor.stop("u1").await;
        assert!(supervisor.registry().is_empty());
    }

    #[tokio::test]
    async fn test_emergency_stop_all_survives_dead_handles() {
        let ctx = supervisor_for("sleep 30", 10);

        for tenant in ["a", "b", "c"] {
            ctx.supervisor
                .start(tenant, &test_credentials(), &BotSettings::default())
                .await
                .unwrap();
        }

        // A stale handle whose event task is long gone: its stop channel is
        // closed, so signalling it fails internally.
        let (stop_tx, stop_rx) = mpsc::channel(1);
        drop(stop_rx);
        ctx.supervisor.registry().set(WorkerHandle {
            tenant_id: "dead".to_string(),
            instance_id: "bot_dead_0".to_string(),
            pid: 999_999,
            state: WorkerState::Running,
            started_at: Utc::now(),
            stop_tx,
        });
        assert_eq!(ctx.supervisor.registry().len(), 4);

        ctx.supervisor.emergency_stop_all().await;
        assert!(ctx.supervisor.registry().is_empty());
    }
}
