//! Sentinel core: pure buffering, breaker, and progress-reconciliation state machines.
mod breaker;
mod buffer;
mod monitor;
mod stats;
mod types;

pub use breaker::{BreakerSettings, CircuitBreaker};
pub use buffer::{BufferSettings, InputBuffer, TextSnippet, TriggerReason};
pub use monitor::{step, MonitorAction, MonitorFault, MonitorInput, MonitorState, PushMessage, TerminalKind};
pub use stats::RequestStatistics;
pub use types::{FinalResult, ProgressEvent, RiskLevel, ToolEvidence};
