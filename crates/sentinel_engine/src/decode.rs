use serde::Deserialize;

use sentinel_core::{FinalResult, ProgressEvent, PushMessage};

use crate::types::{AgentTask, AnalysisOutcome, AnalyzeError, ErrorKind};

/// Agent-path response shape from `/analyze-text` and `/scan-image`.
/// Only the fields the orchestration layer needs; the rest is ignored.
#[derive(Debug, Deserialize)]
struct AgentPathResponse {
    task_id: String,
    ws_url: String,
}

/// Classifies an analysis response body as fast path or agent path.
///
/// A body carrying `risk_level` is a terminal verdict; a body carrying
/// `task_id` plus a push-channel URL is an agent task; anything else is a
/// protocol error.
pub(crate) fn decode_analysis_response(body: &str) -> Result<AnalysisOutcome, AnalyzeError> {
    if let Ok(verdict) = serde_json::from_str::<FinalResult>(body) {
        return Ok(AnalysisOutcome::Verdict(verdict));
    }
    if let Ok(agent) = serde_json::from_str::<AgentPathResponse>(body) {
        let task = AgentTask::from_wire(agent.task_id, agent.ws_url)?;
        return Ok(AnalysisOutcome::Agent(task));
    }
    Err(AnalyzeError::new(
        ErrorKind::Protocol,
        "response carries neither a verdict nor an agent task",
    ))
}

/// Decodes one push-channel frame, attempting the two shapes in order:
/// progress tick first, then a directly delivered final result.
///
/// Returns `None` for frames matching neither shape; the monitor skips
/// them rather than faulting the channel.
pub(crate) fn decode_push_message(text: &str) -> Option<PushMessage> {
    if let Ok(event) = serde_json::from_str::<ProgressEvent>(text) {
        return Some(PushMessage::Progress(event));
    }
    if let Ok(result) = serde_json::from_str::<FinalResult>(text) {
        return Some(PushMessage::Final(result));
    }
    None
}

/// Decodes the body of the one-shot final-result pull.
pub(crate) fn decode_final_result(body: &str) -> Result<FinalResult, AnalyzeError> {
    serde_json::from_str(body)
        .map_err(|err| AnalyzeError::new(ErrorKind::Decoding, err.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use sentinel_core::RiskLevel;

    #[test]
    fn verdict_body_is_fast_path() {
        let body = r#"{"risk_level":"low","confidence":0.2,"category":"benign","explanation":"ok"}"#;
        match decode_analysis_response(body).unwrap() {
            AnalysisOutcome::Verdict(verdict) => {
                assert_eq!(verdict.risk_level, RiskLevel::Low);
                assert!(verdict.evidence.is_empty());
            }
            other => panic!("expected verdict, got {other:?}"),
        }
    }

    #[test]
    fn task_body_is_agent_path_with_derived_result_url() {
        let body = r#"{"type":"agent","task_id":"t1","ws_url":"wss://h/ws/t1","estimated_time":12}"#;
        match decode_analysis_response(body).unwrap() {
            AnalysisOutcome::Agent(task) => {
                assert_eq!(task.task_id, "t1");
                assert_eq!(task.push_url, "wss://h/ws/t1");
                assert_eq!(task.result_url, "https://h/agent-task/t1/result");
            }
            other => panic!("expected agent task, got {other:?}"),
        }
    }

    #[test]
    fn unknown_body_is_protocol_error() {
        let err = decode_analysis_response(r#"{"status":"??"}"#).unwrap_err();
        assert_eq!(err.kind, ErrorKind::Protocol);
    }

    #[test]
    fn push_frame_prefers_progress_shape() {
        let frame = r#"{"message":"scanning","percent":40,"step":"tools","tool":"scam_db"}"#;
        match decode_push_message(frame) {
            Some(PushMessage::Progress(event)) => {
                assert_eq!(event.percent, 40);
                assert_eq!(event.tool.as_deref(), Some("scam_db"));
            }
            other => panic!("expected progress, got {other:?}"),
        }
    }

    #[test]
    fn push_frame_falls_back_to_final_result() {
        let frame =
            r#"{"risk_level":"high","confidence":0.95,"category":"scam","explanation":"bad"}"#;
        match decode_push_message(frame) {
            Some(PushMessage::Final(result)) => assert_eq!(result.risk_level, RiskLevel::High),
            other => panic!("expected final result, got {other:?}"),
        }
    }

    #[test]
    fn garbage_frame_is_skipped() {
        assert_eq!(decode_push_message("not json"), None);
        assert_eq!(decode_push_message(r#"{"ping":1}"#), None);
    }

    #[test]
    fn ws_port_and_http_scheme_survive_result_url_derivation() {
        let task = AgentTask::from_wire("t9", "ws://127.0.0.1:8443/ws/t9?token=x").unwrap();
        assert_eq!(task.result_url, "http://127.0.0.1:8443/agent-task/t9/result");
    }

    #[test]
    fn invalid_push_url_is_rejected() {
        let err = AgentTask::from_wire("t1", "not a url").unwrap_err();
        assert_eq!(err.kind, ErrorKind::InvalidUrl);
    }
}
