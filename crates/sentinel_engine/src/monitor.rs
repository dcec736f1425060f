use std::sync::mpsc;
use std::time::Duration;

use futures_util::StreamExt;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream};
use tokio_util::sync::CancellationToken;

use sentinel_core::{
    step, FinalResult, MonitorAction, MonitorFault, MonitorInput, MonitorState,
};
use sentinel_logging::{sentinel_debug, sentinel_warn};

use crate::decode::{decode_final_result, decode_push_message};
use crate::types::{AgentTask, AnalyzeError, ErrorKind, MonitorEvent};

#[derive(Debug, Clone)]
pub struct MonitorSettings {
    /// Timeout for the one-shot final-result pull.
    pub fetch_timeout: Duration,
}

impl Default for MonitorSettings {
    fn default() -> Self {
        Self {
            fetch_timeout: Duration::from_secs(5),
        }
    }
}

type WsStream = WebSocketStream<MaybeTlsStream<tokio::net::TcpStream>>;

/// Caller-side handle to a running push monitor.
///
/// Events are polled from the caller's own thread; after `disconnect`
/// no further event is ever delivered.
pub struct MonitorHandle {
    event_rx: mpsc::Receiver<MonitorEvent>,
    cancel: CancellationToken,
}

impl MonitorHandle {
    pub fn try_recv(&self) -> Option<MonitorEvent> {
        self.event_rx.try_recv().ok()
    }

    pub fn recv_timeout(&self, timeout: Duration) -> Option<MonitorEvent> {
        self.event_rx.recv_timeout(timeout).ok()
    }

    /// Idempotent; callable from any state, including mid-fetch.
    pub fn disconnect(&self) {
        self.cancel.cancel();
    }
}

impl Drop for MonitorHandle {
    fn drop(&mut self) {
        self.cancel.cancel();
    }
}

/// Driver for one agent task: opens the push channel, relays progress and
/// reconciles the two delivery channels into exactly one terminal event.
///
/// All transition logic lives in the pure `sentinel_core` state machine;
/// this type only executes the actions it returns.
pub struct PushMonitor;

impl PushMonitor {
    /// Spawns the monitor task. Must be called within a tokio runtime.
    pub fn connect(task: AgentTask, settings: MonitorSettings) -> MonitorHandle {
        let (event_tx, event_rx) = mpsc::channel();
        let cancel = CancellationToken::new();
        tokio::spawn(run_monitor(task, settings, event_tx, cancel.clone()));
        MonitorHandle { event_rx, cancel }
    }
}

struct Driver {
    state: MonitorState,
    event_tx: mpsc::Sender<MonitorEvent>,
    cancel: CancellationToken,
}

impl Driver {
    fn feed(&mut self, input: MonitorInput) -> Vec<MonitorAction> {
        let (next, actions) = step(self.state, input);
        self.state = next;
        actions
    }

    fn emit(&self, event: MonitorEvent) {
        if !self.cancel.is_cancelled() {
            let _ = self.event_tx.send(event);
        }
    }
}

async fn run_monitor(
    task: AgentTask,
    settings: MonitorSettings,
    event_tx: mpsc::Sender<MonitorEvent>,
    cancel: CancellationToken,
) {
    let mut driver = Driver {
        state: MonitorState::Idle,
        event_tx,
        cancel: cancel.clone(),
    };
    let mut socket: Option<WsStream> = None;
    let _ = driver.feed(MonitorInput::ConnectRequested);
    sentinel_debug!("opening push channel for task {}", task.task_id);

    let connected = tokio::select! {
        _ = cancel.cancelled() => {
            let actions = driver.feed(MonitorInput::Disconnected);
            execute_actions(&driver, actions, &mut socket).await;
            return;
        }
        connected = tokio_tungstenite::connect_async(&task.push_url) => connected,
    };
    match connected {
        Ok((ws, _response)) => {
            socket = Some(ws);
            let actions = driver.feed(MonitorInput::ChannelOpened);
            execute_actions(&driver, actions, &mut socket).await;
        }
        Err(err) => {
            let actions = driver.feed(MonitorInput::ChannelFailed(err.to_string()));
            execute_actions(&driver, actions, &mut socket).await;
            return;
        }
    }

    loop {
        match driver.state {
            MonitorState::Streaming => {
                let input = {
                    let ws = socket.as_mut().expect("streaming requires an open socket");
                    tokio::select! {
                        _ = cancel.cancelled() => MonitorInput::Disconnected,
                        frame = ws.next() => match frame {
                            Some(Ok(Message::Text(text))) => match decode_push_message(&text) {
                                Some(message) => MonitorInput::Message(message),
                                None => {
                                    sentinel_warn!(
                                        "task {}: skipping undecodable push frame",
                                        task.task_id
                                    );
                                    continue;
                                }
                            },
                            // Keepalive traffic.
                            Some(Ok(Message::Ping(_) | Message::Pong(_))) => continue,
                            Some(Ok(Message::Close(_))) | None => {
                                MonitorInput::ChannelFailed("push channel closed".into())
                            }
                            Some(Ok(_)) => continue,
                            Some(Err(err)) => MonitorInput::ChannelFailed(err.to_string()),
                        },
                    }
                };
                let actions = driver.feed(input);
                execute_actions(&driver, actions, &mut socket).await;
            }
            MonitorState::FetchingFinal => {
                // The socket is no longer read from here on; server-side
                // teardown around completion can no longer fault the task.
                let fetched = tokio::select! {
                    _ = cancel.cancelled() => {
                        let actions = driver.feed(MonitorInput::Disconnected);
                        execute_actions(&driver, actions, &mut socket).await;
                        return;
                    }
                    fetched = fetch_final(&task, &settings) => fetched,
                };
                let actions = driver.feed(MonitorInput::FinalFetched(fetched));
                execute_actions(&driver, actions, &mut socket).await;
            }
            _ => break,
        }
    }
}

async fn execute_actions(
    driver: &Driver,
    actions: Vec<MonitorAction>,
    socket: &mut Option<WsStream>,
) {
    for action in actions {
        match action {
            // Connecting and fetching are driven by the monitor loop itself.
            MonitorAction::OpenChannel | MonitorAction::FetchFinal => {}
            MonitorAction::EmitProgress(event) => driver.emit(MonitorEvent::Progress(event)),
            MonitorAction::EmitResult(result) => driver.emit(MonitorEvent::Result(result)),
            MonitorAction::EmitError(fault) => driver.emit(MonitorEvent::Error(fault_to_error(fault))),
            MonitorAction::CloseChannel => {
                if let Some(mut ws) = socket.take() {
                    let _ = ws.close(None).await;
                }
            }
        }
    }
}

async fn fetch_final(task: &AgentTask, settings: &MonitorSettings) -> Result<FinalResult, String> {
    let client = reqwest::Client::builder()
        .timeout(settings.fetch_timeout)
        .build()
        .map_err(|err| err.to_string())?;
    let response = client
        .get(&task.result_url)
        .send()
        .await
        .map_err(|err| err.to_string())?;
    let status = response.status();
    if !status.is_success() {
        return Err(format!("final fetch returned {status}"));
    }
    let body = response.text().await.map_err(|err| err.to_string())?;
    decode_final_result(&body).map_err(|err| err.to_string())
}

fn fault_to_error(fault: MonitorFault) -> AnalyzeError {
    match fault {
        MonitorFault::PushChannelFailed(message) => {
            AnalyzeError::new(ErrorKind::PushChannelFailed, message)
        }
        MonitorFault::FinalFetchFailed(message) => {
            AnalyzeError::new(ErrorKind::FinalFetchFailed, message)
        }
    }
}
