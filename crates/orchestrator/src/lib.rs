//! Safe-transfer orchestration
//!
//! Drives a transfer from `pending` through its monitored safe period to
//! release or failure, using an injected [`MonitoringProbe`],
//! [`NotificationGateway`], [`Scheduler`] and [`Clock`].

pub mod clock;
pub mod error;
pub mod notifier;
pub mod orchestrator;
pub mod probe;
pub mod scheduler;


pub use clock::{Clock, ManualClock, SystemClock};
pub use error::{BuilderError, ErrorKind, OrchestratorError, Result};
pub use notifier::{
    LoggingNotifier, NotificationError, NotificationGateway, RecordingNotifier, SentNotification,
};
pub use orchestrator::{
    OrchestratorConfig, TickOutcome, TransferOrchestrator, TransferOrchestratorBuilder,
};
pub use probe::{MonitoringProbe, ProbeError, RandomProbe, ScriptedProbe};
pub use scheduler::{Job, JobFuture, ManualScheduler, Scheduler, TokioScheduler};
