use serde::{Deserialize, Serialize};

/// Severity verdict attached to an analyzed snippet.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RiskLevel {
    Low,
    Medium,
    High,
}

/// One piece of supporting evidence produced by a backend tool run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolEvidence {
    pub tool_name: String,
    pub entity_type: String,
    pub entity_value: String,
    pub success: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub execution_time_ms: Option<u64>,
}

/// Terminal analysis verdict, from either the fast path or the agent path.
///
/// Fast-path results carry an empty `evidence` list.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FinalResult {
    pub risk_level: RiskLevel,
    pub confidence: f64,
    pub category: String,
    pub explanation: String,
    #[serde(default)]
    pub evidence: Vec<ToolEvidence>,
}

/// One tick on the agent-task push channel. Transient, never persisted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProgressEvent {
    pub message: String,
    pub percent: u32,
    #[serde(default)]
    pub step: Option<String>,
    #[serde(default)]
    pub tool: Option<String>,
}

impl ProgressEvent {
    /// Whether this tick signals task completion.
    ///
    /// The backend does not guarantee monotonic percentages, so either
    /// signal is accepted, whichever arrives first.
    pub fn is_terminal(&self) -> bool {
        self.percent >= 100 || self.step.as_deref() == Some("completed")
    }
}
