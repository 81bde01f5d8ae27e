//! Bot worker process supervision.
//!
//! Manages the lifecycle of at most one long-running trading worker per
//! tenant: start, stop with a graceful-then-forced termination sequence,
//! crash detection, heartbeat tracking, and structured trade output parsing.

pub mod output;
pub mod registry;
pub mod service;
pub mod store;
pub mod supervisor;

pub use registry::{WorkerHandle, WorkerRegistry, WorkerState};
pub use service::BotService;
pub use supervisor::ProcessSupervisor;
