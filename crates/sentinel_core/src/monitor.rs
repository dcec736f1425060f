//! Pure state machine reconciling the two agent-task progress channels.
//!
//! The engine drives this machine with decoded inputs and executes the
//! returned actions (emit to the caller, fetch the final result over HTTP,
//! close the socket). Keeping the transitions pure is what makes the
//! exactly-once delivery guarantee testable without any network.

use crate::{FinalResult, ProgressEvent};

/// A decoded push-channel frame. The backend occasionally sends the
/// terminal result directly instead of a final progress tick, so both
/// shapes arrive on the same channel.
#[derive(Debug, Clone, PartialEq)]
pub enum PushMessage {
    Progress(ProgressEvent),
    Final(FinalResult),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TerminalKind {
    Success,
    Failure,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MonitorState {
    Idle,
    Connecting,
    Streaming,
    /// A terminal progress tick arrived; the final result is being pulled
    /// over HTTP and push-channel failures are suppressed.
    FetchingFinal,
    Terminal(TerminalKind),
    /// The caller disconnected; every further input is inert.
    Detached,
}

/// Why the monitor failed, surfaced through exactly one error emission.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MonitorFault {
    PushChannelFailed(String),
    FinalFetchFailed(String),
}

#[derive(Debug, Clone, PartialEq)]
pub enum MonitorInput {
    ConnectRequested,
    ChannelOpened,
    Message(PushMessage),
    ChannelFailed(String),
    FinalFetched(Result<FinalResult, String>),
    Disconnected,
}

#[derive(Debug, Clone, PartialEq)]
pub enum MonitorAction {
    OpenChannel,
    EmitProgress(ProgressEvent),
    /// Issue the single HTTP GET for the final result.
    FetchFinal,
    EmitResult(FinalResult),
    EmitError(MonitorFault),
    CloseChannel,
}

/// Applies one input to the monitor state, returning the next state and
/// the actions to execute, in order.
///
/// `EmitResult` is always ordered before `CloseChannel`: the caller may
/// inspect the connection during the result delivery and must still see
/// it as open. Terminal and detached states absorb every input, which is
/// what bounds result/error delivery to exactly once per task.
pub fn step(state: MonitorState, input: MonitorInput) -> (MonitorState, Vec<MonitorAction>) {
    match (state, input) {
        (_, MonitorInput::Disconnected) => match state {
            MonitorState::Terminal(_) | MonitorState::Detached => (MonitorState::Detached, vec![]),
            _ => (MonitorState::Detached, vec![MonitorAction::CloseChannel]),
        },

        (MonitorState::Idle, MonitorInput::ConnectRequested) => {
            (MonitorState::Connecting, vec![MonitorAction::OpenChannel])
        }

        (MonitorState::Connecting, MonitorInput::ChannelOpened) => {
            (MonitorState::Streaming, vec![])
        }
        (MonitorState::Connecting, MonitorInput::ChannelFailed(reason)) => (
            MonitorState::Terminal(TerminalKind::Failure),
            vec![MonitorAction::EmitError(MonitorFault::PushChannelFailed(
                reason,
            ))],
        ),

        (MonitorState::Streaming, MonitorInput::Message(PushMessage::Progress(event))) => {
            if event.is_terminal() {
                (
                    MonitorState::FetchingFinal,
                    vec![
                        MonitorAction::EmitProgress(event),
                        MonitorAction::FetchFinal,
                    ],
                )
            } else {
                (
                    MonitorState::Streaming,
                    vec![MonitorAction::EmitProgress(event)],
                )
            }
        }
        (MonitorState::Streaming, MonitorInput::Message(PushMessage::Final(result))) => (
            MonitorState::Terminal(TerminalKind::Success),
            vec![
                MonitorAction::EmitResult(result),
                MonitorAction::CloseChannel,
            ],
        ),
        (MonitorState::Streaming, MonitorInput::ChannelFailed(reason)) => (
            MonitorState::Terminal(TerminalKind::Failure),
            vec![MonitorAction::EmitError(MonitorFault::PushChannelFailed(
                reason,
            ))],
        ),

        // The push channel is superseded once the final fetch is underway;
        // server-side socket teardown around completion must not fault a
        // task that actually succeeded.
        (MonitorState::FetchingFinal, MonitorInput::ChannelFailed(_)) => {
            (MonitorState::FetchingFinal, vec![])
        }
        (MonitorState::FetchingFinal, MonitorInput::Message(_)) => {
            (MonitorState::FetchingFinal, vec![])
        }
        (MonitorState::FetchingFinal, MonitorInput::FinalFetched(Ok(result))) => (
            MonitorState::Terminal(TerminalKind::Success),
            vec![
                MonitorAction::EmitResult(result),
                MonitorAction::CloseChannel,
            ],
        ),
        (MonitorState::FetchingFinal, MonitorInput::FinalFetched(Err(reason))) => (
            MonitorState::Terminal(TerminalKind::Failure),
            vec![
                MonitorAction::EmitError(MonitorFault::FinalFetchFailed(reason)),
                MonitorAction::CloseChannel,
            ],
        ),

        // Everything else is inert: late frames after a terminal state,
        // duplicate opens, inputs before connect.
        (state, _) => (state, vec![]),
    }
}
