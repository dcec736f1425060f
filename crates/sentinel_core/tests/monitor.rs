use sentinel_core::{
    step, FinalResult, MonitorAction, MonitorFault, MonitorInput, MonitorState, ProgressEvent,
    PushMessage, RiskLevel, TerminalKind,
};

fn progress(percent: u32, step_name: Option<&str>) -> ProgressEvent {
    ProgressEvent {
        message: format!("at {percent}%"),
        percent,
        step: step_name.map(ToOwned::to_owned),
        tool: None,
    }
}

fn verdict() -> FinalResult {
    FinalResult {
        risk_level: RiskLevel::High,
        confidence: 0.9,
        category: "phishing".into(),
        explanation: "matched known pattern".into(),
        evidence: Vec::new(),
    }
}

/// Runs a scripted input sequence and returns every action in order.
fn run(inputs: Vec<MonitorInput>) -> (MonitorState, Vec<MonitorAction>) {
    sentinel_logging::initialize_for_tests();
    let mut state = MonitorState::Idle;
    let mut actions = Vec::new();
    for input in inputs {
        let (next, mut out) = step(state, input);
        state = next;
        actions.append(&mut out);
    }
    (state, actions)
}

fn count_results(actions: &[MonitorAction]) -> usize {
    actions
        .iter()
        .filter(|action| matches!(action, MonitorAction::EmitResult(_)))
        .count()
}

fn count_errors(actions: &[MonitorAction]) -> usize {
    actions
        .iter()
        .filter(|action| matches!(action, MonitorAction::EmitError(_)))
        .count()
}

#[test]
fn terminal_tick_then_channel_failure_yields_one_result_no_error() {
    let (state, actions) = run(vec![
        MonitorInput::ConnectRequested,
        MonitorInput::ChannelOpened,
        MonitorInput::Message(PushMessage::Progress(progress(50, None))),
        MonitorInput::Message(PushMessage::Progress(progress(100, Some("completed")))),
        // The server tears the socket down before the HTTP pull finishes.
        MonitorInput::ChannelFailed("connection reset".into()),
        MonitorInput::FinalFetched(Ok(verdict())),
    ]);

    assert_eq!(state, MonitorState::Terminal(TerminalKind::Success));
    assert_eq!(count_results(&actions), 1);
    assert_eq!(count_errors(&actions), 0);
}

#[test]
fn channel_failure_without_terminal_tick_yields_one_error() {
    let (state, actions) = run(vec![
        MonitorInput::ConnectRequested,
        MonitorInput::ChannelOpened,
        MonitorInput::Message(PushMessage::Progress(progress(40, None))),
        MonitorInput::ChannelFailed("connection reset".into()),
    ]);

    assert_eq!(state, MonitorState::Terminal(TerminalKind::Failure));
    assert_eq!(count_results(&actions), 0);
    assert_eq!(count_errors(&actions), 1);
    assert!(actions.contains(&MonitorAction::EmitError(MonitorFault::PushChannelFailed(
        "connection reset".into()
    ))));
}

#[test]
fn completed_step_is_terminal_even_below_100_percent() {
    let (state, actions) = run(vec![
        MonitorInput::ConnectRequested,
        MonitorInput::ChannelOpened,
        MonitorInput::Message(PushMessage::Progress(progress(80, Some("completed")))),
    ]);

    assert_eq!(state, MonitorState::FetchingFinal);
    assert!(actions.contains(&MonitorAction::FetchFinal));
}

#[test]
fn direct_final_message_closes_after_emitting() {
    let (state, actions) = run(vec![
        MonitorInput::ConnectRequested,
        MonitorInput::ChannelOpened,
        MonitorInput::Message(PushMessage::Final(verdict())),
    ]);

    assert_eq!(state, MonitorState::Terminal(TerminalKind::Success));
    assert_eq!(
        actions.last(),
        Some(&MonitorAction::CloseChannel),
        "channel closes only after the result is delivered"
    );
    assert_eq!(count_results(&actions), 1);
}

#[test]
fn fetched_result_is_emitted_before_channel_close() {
    let (_, actions) = run(vec![
        MonitorInput::ConnectRequested,
        MonitorInput::ChannelOpened,
        MonitorInput::Message(PushMessage::Progress(progress(100, None))),
        MonitorInput::FinalFetched(Ok(verdict())),
    ]);

    let emit_idx = actions
        .iter()
        .position(|action| matches!(action, MonitorAction::EmitResult(_)))
        .expect("result emitted");
    let close_idx = actions
        .iter()
        .position(|action| matches!(action, MonitorAction::CloseChannel))
        .expect("channel closed");
    assert!(emit_idx < close_idx);
}

#[test]
fn failed_final_fetch_yields_one_error() {
    let (state, actions) = run(vec![
        MonitorInput::ConnectRequested,
        MonitorInput::ChannelOpened,
        MonitorInput::Message(PushMessage::Progress(progress(100, None))),
        MonitorInput::FinalFetched(Err("status 500".into())),
    ]);

    assert_eq!(state, MonitorState::Terminal(TerminalKind::Failure));
    assert_eq!(count_errors(&actions), 1);
    assert!(actions.contains(&MonitorAction::EmitError(MonitorFault::FinalFetchFailed(
        "status 500".into()
    ))));
}

#[test]
fn connect_failure_is_terminal() {
    let (state, actions) = run(vec![
        MonitorInput::ConnectRequested,
        MonitorInput::ChannelFailed("refused".into()),
    ]);

    assert_eq!(state, MonitorState::Terminal(TerminalKind::Failure));
    assert_eq!(count_errors(&actions), 1);
}

#[test]
fn inputs_after_terminal_state_are_inert() {
    let (state, actions) = run(vec![
        MonitorInput::ConnectRequested,
        MonitorInput::ChannelOpened,
        MonitorInput::Message(PushMessage::Final(verdict())),
        // Late frames and failures after the terminal state do nothing.
        MonitorInput::Message(PushMessage::Final(verdict())),
        MonitorInput::ChannelFailed("late".into()),
        MonitorInput::FinalFetched(Ok(verdict())),
    ]);

    assert_eq!(state, MonitorState::Terminal(TerminalKind::Success));
    assert_eq!(count_results(&actions), 1);
    assert_eq!(count_errors(&actions), 0);
}

#[test]
fn disconnect_silences_everything_afterwards() {
    let (state, actions) = run(vec![
        MonitorInput::ConnectRequested,
        MonitorInput::ChannelOpened,
        MonitorInput::Disconnected,
        MonitorInput::Message(PushMessage::Progress(progress(50, None))),
        MonitorInput::Message(PushMessage::Final(verdict())),
        MonitorInput::ChannelFailed("reset".into()),
        MonitorInput::FinalFetched(Ok(verdict())),
    ]);

    assert_eq!(state, MonitorState::Detached);
    assert_eq!(count_results(&actions), 0);
    assert_eq!(count_errors(&actions), 0);
    // The only effect of a disconnect is tearing down the socket.
    assert_eq!(
        actions,
        vec![MonitorAction::OpenChannel, MonitorAction::CloseChannel]
    );
}

#[test]
fn disconnect_is_idempotent_mid_fetch() {
    let (state, actions) = run(vec![
        MonitorInput::ConnectRequested,
        MonitorInput::ChannelOpened,
        MonitorInput::Message(PushMessage::Progress(progress(100, None))),
        MonitorInput::Disconnected,
        MonitorInput::Disconnected,
        MonitorInput::FinalFetched(Ok(verdict())),
    ]);

    assert_eq!(state, MonitorState::Detached);
    assert_eq!(count_results(&actions), 0);
}
