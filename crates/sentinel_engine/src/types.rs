use std::fmt;

use sentinel_core::{FinalResult, ProgressEvent};

/// Closed error taxonomy for the analysis client and progress monitor.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    InvalidUrl,
    Encoding,
    Timeout,
    Network,
    BadRequest,
    RateLimited,
    ServerError(u16),
    /// Synthesized locally when the breaker is open; no network attempted.
    CircuitOpen,
    /// Response matched neither the fast-path nor the agent-path shape.
    Protocol,
    Decoding,
    PushChannelFailed,
    FinalFetchFailed,
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ErrorKind::InvalidUrl => write!(f, "invalid url"),
            ErrorKind::Encoding => write!(f, "request encoding failed"),
            ErrorKind::Timeout => write!(f, "timeout"),
            ErrorKind::Network => write!(f, "network error"),
            ErrorKind::BadRequest => write!(f, "bad request"),
            ErrorKind::RateLimited => write!(f, "rate limited"),
            ErrorKind::ServerError(code) => write!(f, "server error {code}"),
            ErrorKind::CircuitOpen => write!(f, "circuit open"),
            ErrorKind::Protocol => write!(f, "protocol error"),
            ErrorKind::Decoding => write!(f, "response decoding failed"),
            ErrorKind::PushChannelFailed => write!(f, "push channel failed"),
            ErrorKind::FinalFetchFailed => write!(f, "final result fetch failed"),
        }
    }
}

/// Structured error surfaced to callers: a kind for dispatch plus a human
/// string for a specific, non-generic message.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("{kind}: {message}")]
pub struct AnalyzeError {
    pub kind: ErrorKind,
    pub message: String,
}

impl AnalyzeError {
    pub fn new(kind: ErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
        }
    }
}

/// Handle to a long-running backend analysis task.
///
/// Lives for the duration of one monitor lifecycle and is discarded on
/// completion or disconnect.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AgentTask {
    pub task_id: String,
    /// WebSocket address of the progress push channel.
    pub push_url: String,
    /// HTTP address for the one-shot final-result pull.
    pub result_url: String,
}

impl AgentTask {
    /// Builds a task handle from the wire fields, deriving the result URL
    /// from the push-channel URL: same host, `ws`/`wss` mapped to
    /// `http`/`https`, path `/agent-task/{task_id}/result`.
    pub fn from_wire(task_id: impl Into<String>, push_url: impl Into<String>) -> Result<Self, AnalyzeError> {
        let task_id = task_id.into();
        let push_url = push_url.into();
        let result_url = derive_result_url(&push_url, &task_id)?;
        Ok(Self {
            task_id,
            push_url,
            result_url,
        })
    }
}

fn derive_result_url(push_url: &str, task_id: &str) -> Result<String, AnalyzeError> {
    let mut parsed = url::Url::parse(push_url)
        .map_err(|err| AnalyzeError::new(ErrorKind::InvalidUrl, err.to_string()))?;
    let scheme = match parsed.scheme() {
        "ws" | "http" => "http",
        "wss" | "https" => "https",
        other => {
            return Err(AnalyzeError::new(
                ErrorKind::InvalidUrl,
                format!("unsupported push channel scheme {other}"),
            ))
        }
    };
    parsed
        .set_scheme(scheme)
        .map_err(|()| AnalyzeError::new(ErrorKind::InvalidUrl, "scheme rewrite rejected"))?;
    parsed.set_path(&format!("/agent-task/{task_id}/result"));
    parsed.set_query(None);
    Ok(parsed.to_string())
}

/// What a single analysis call produced: a terminal verdict (fast path) or
/// a handle to a long-running agent task. Exactly one per call.
#[derive(Debug, Clone, PartialEq)]
pub enum AnalysisOutcome {
    Verdict(FinalResult),
    Agent(AgentTask),
}

/// Event delivered by the scheduler to its caller, polled via `try_recv`.
#[derive(Debug, Clone, PartialEq)]
pub enum AnalysisEvent {
    VerdictReady(FinalResult),
    AgentStarted(AgentTask),
    Failed(AnalyzeError),
}

/// Event delivered by the push monitor to its caller.
#[derive(Debug, Clone, PartialEq)]
pub enum MonitorEvent {
    Progress(ProgressEvent),
    Result(FinalResult),
    Error(AnalyzeError),
}
