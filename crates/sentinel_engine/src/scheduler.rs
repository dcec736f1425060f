use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{mpsc, Arc};
use std::thread;
use std::time::{Duration, Instant};

use sentinel_core::{RequestStatistics, TextSnippet};
use sentinel_logging::sentinel_debug;

use crate::client::AnalysisBackend;
use crate::types::{AnalysisEvent, AnalysisOutcome};

#[derive(Debug, Clone)]
pub struct SchedulerSettings {
    /// Quiet period after the last trigger before a call is dispatched.
    pub debounce: Duration,
}

impl Default for SchedulerSettings {
    fn default() -> Self {
        Self {
            debounce: Duration::from_millis(500),
        }
    }
}

enum WorkerMessage {
    Schedule { snippet: TextSnippet, immediate: bool },
    CancelPending,
    CallFinished,
    Shutdown,
}

#[derive(Default)]
struct Counters {
    triggered: AtomicU64,
    debounced: AtomicU64,
    sent: AtomicU64,
}

impl Counters {
    fn snapshot(&self) -> RequestStatistics {
        RequestStatistics {
            triggered: self.triggered.load(Ordering::Relaxed),
            debounced: self.debounced.load(Ordering::Relaxed),
            sent: self.sent.load(Ordering::Relaxed),
        }
    }

    fn reset(&self) {
        self.triggered.store(0, Ordering::Relaxed);
        self.debounced.store(0, Ordering::Relaxed);
        self.sent.store(0, Ordering::Relaxed);
    }
}

/// Debouncing scheduler between trigger detection and the analysis backend.
///
/// Owns a dedicated worker thread with its own tokio runtime; callers talk
/// to it through plain channel sends and poll results with `try_recv` from
/// their own thread, so no cross-thread callback marshaling is required.
///
/// Within one handle, at most one analysis call is in flight at a time: a
/// trigger arriving mid-call is coalesced into the next debounce window,
/// which bounds backend call rate independent of typing speed.
pub struct SchedulerHandle {
    cmd_tx: mpsc::Sender<WorkerMessage>,
    event_rx: mpsc::Receiver<AnalysisEvent>,
    counters: Arc<Counters>,
}

impl SchedulerHandle {
    pub fn new(backend: Arc<dyn AnalysisBackend>, settings: SchedulerSettings) -> Self {
        let (cmd_tx, cmd_rx) = mpsc::channel();
        let (event_tx, event_rx) = mpsc::channel();
        let counters = Arc::new(Counters::default());

        let worker = Worker {
            backend,
            settings,
            counters: counters.clone(),
            event_tx,
            self_tx: cmd_tx.clone(),
            pending: None,
            in_flight: false,
        };
        thread::spawn(move || worker.run(cmd_rx));

        Self {
            cmd_tx,
            event_rx,
            counters,
        }
    }

    /// Stores the snippet and restarts the debounce window. Only the last
    /// snippet of a burst is ever sent; the replaced ones count as debounced.
    pub fn schedule(&self, snippet: TextSnippet) {
        let _ = self.cmd_tx.send(WorkerMessage::Schedule {
            snippet,
            immediate: false,
        });
    }

    /// Bypasses the debounce window, for explicit user-triggered actions.
    pub fn schedule_immediate(&self, snippet: TextSnippet) {
        let _ = self.cmd_tx.send(WorkerMessage::Schedule {
            snippet,
            immediate: true,
        });
    }

    /// Discards any not-yet-dispatched snippet. No network round trip and no
    /// counter side effects; nothing is retained and no event will follow.
    pub fn cancel_pending(&self) {
        let _ = self.cmd_tx.send(WorkerMessage::CancelPending);
    }

    pub fn try_recv(&self) -> Option<AnalysisEvent> {
        self.event_rx.try_recv().ok()
    }

    pub fn recv_timeout(&self, timeout: Duration) -> Option<AnalysisEvent> {
        self.event_rx.recv_timeout(timeout).ok()
    }

    pub fn statistics(&self) -> RequestStatistics {
        self.counters.snapshot()
    }

    pub fn reset_statistics(&self) {
        self.counters.reset();
    }
}

impl Drop for SchedulerHandle {
    fn drop(&mut self) {
        // The worker keeps a sender to itself for completion signals, so it
        // needs an explicit shutdown rather than channel disconnect.
        let _ = self.cmd_tx.send(WorkerMessage::Shutdown);
    }
}

struct Worker {
    backend: Arc<dyn AnalysisBackend>,
    settings: SchedulerSettings,
    counters: Arc<Counters>,
    event_tx: mpsc::Sender<AnalysisEvent>,
    self_tx: mpsc::Sender<WorkerMessage>,
    pending: Option<(TextSnippet, Instant)>,
    in_flight: bool,
}

impl Worker {
    fn run(mut self, cmd_rx: mpsc::Receiver<WorkerMessage>) {
        let runtime = tokio::runtime::Runtime::new().expect("tokio runtime");
        loop {
            // Drain queued commands before consulting the deadline: a cancel
            // already in the channel must beat a timer that just expired.
            loop {
                match cmd_rx.try_recv() {
                    Ok(WorkerMessage::Shutdown) => return,
                    Ok(message) => self.apply(message),
                    Err(mpsc::TryRecvError::Empty) => break,
                    Err(mpsc::TryRecvError::Disconnected) => return,
                }
            }

            self.dispatch_due(&runtime);

            let message = match &self.pending {
                Some((_, deadline)) if !self.in_flight => {
                    let wait = deadline.saturating_duration_since(Instant::now());
                    match cmd_rx.recv_timeout(wait) {
                        Ok(message) => message,
                        Err(mpsc::RecvTimeoutError::Timeout) => continue,
                        Err(mpsc::RecvTimeoutError::Disconnected) => return,
                    }
                }
                // Nothing pending, or a call in flight: block until the next
                // command or the in-flight completion signal.
                _ => match cmd_rx.recv() {
                    Ok(message) => message,
                    Err(_) => return,
                },
            };
            match message {
                WorkerMessage::Shutdown => return,
                message => self.apply(message),
            }
        }
    }

    fn apply(&mut self, message: WorkerMessage) {
        match message {
            WorkerMessage::Schedule { snippet, immediate } => {
                self.counters.triggered.fetch_add(1, Ordering::Relaxed);
                if self.pending.take().is_some() {
                    self.counters.debounced.fetch_add(1, Ordering::Relaxed);
                }
                let deadline = if immediate {
                    Instant::now()
                } else {
                    Instant::now() + self.settings.debounce
                };
                self.pending = Some((snippet, deadline));
            }
            WorkerMessage::CancelPending => {
                self.pending = None;
            }
            WorkerMessage::CallFinished => {
                self.in_flight = false;
            }
            WorkerMessage::Shutdown => {}
        }
    }

    /// Dispatches the pending snippet if its deadline has passed and no call
    /// is outstanding. A deadline expiring mid-call waits for `CallFinished`.
    fn dispatch_due(&mut self, runtime: &tokio::runtime::Runtime) {
        if self.in_flight {
            return;
        }
        let due = matches!(&self.pending, Some((_, deadline)) if *deadline <= Instant::now());
        if !due {
            return;
        }
        let (snippet, _) = self.pending.take().expect("due pending request");
        self.counters.sent.fetch_add(1, Ordering::Relaxed);
        self.in_flight = true;
        sentinel_debug!(
            "dispatching analysis of {} chars ({:?})",
            snippet.content.chars().count(),
            snippet.trigger
        );

        let backend = self.backend.clone();
        let event_tx = self.event_tx.clone();
        let self_tx = self.self_tx.clone();
        runtime.spawn(async move {
            let event = match backend.analyze(&snippet.content).await {
                Ok(AnalysisOutcome::Verdict(verdict)) => AnalysisEvent::VerdictReady(verdict),
                Ok(AnalysisOutcome::Agent(task)) => AnalysisEvent::AgentStarted(task),
                Err(err) => AnalysisEvent::Failed(err),
            };
            let _ = event_tx.send(event);
            let _ = self_tx.send(WorkerMessage::CallFinished);
        });
    }
}
