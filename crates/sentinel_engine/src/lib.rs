//! Sentinel engine: network IO and request orchestration.
mod client;
mod decode;
mod monitor;
mod scheduler;
mod types;

pub use client::{
    AnalysisBackend, ClientSettings, HttpAnalysisClient, ImageAttachment, TaskState, TaskStatus,
};
pub use monitor::{MonitorHandle, MonitorSettings, PushMonitor};
pub use scheduler::{SchedulerHandle, SchedulerSettings};
pub use types::{
    AgentTask, AnalysisEvent, AnalysisOutcome, AnalyzeError, ErrorKind, MonitorEvent,
};
