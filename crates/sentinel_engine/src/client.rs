use std::sync::Mutex;
use std::time::{Duration, Instant};

use reqwest::header::CONTENT_TYPE;
use serde::{Deserialize, Serialize};

use sentinel_core::{BreakerSettings, CircuitBreaker, FinalResult};
use sentinel_logging::{sentinel_debug, sentinel_warn};

use crate::decode::decode_analysis_response;
use crate::types::{AnalysisOutcome, AnalyzeError, ErrorKind};

#[derive(Debug, Clone)]
pub struct ClientSettings {
    /// Gateway base URL, e.g. `https://api.example.com`.
    pub base_url: String,
    /// Session identity, owned by the composition root and passed in here.
    pub session_id: String,
    /// Identifier of the application the text was typed into.
    pub app_bundle: String,
    pub request_timeout: Duration,
    pub breaker: BreakerSettings,
}

impl ClientSettings {
    pub fn new(
        base_url: impl Into<String>,
        session_id: impl Into<String>,
        app_bundle: impl Into<String>,
    ) -> Self {
        Self {
            base_url: base_url.into(),
            session_id: session_id.into(),
            app_bundle: app_bundle.into(),
            request_timeout: Duration::from_secs(5),
            breaker: BreakerSettings::default(),
        }
    }
}

/// The seam the scheduler dispatches through; test doubles implement this.
#[async_trait::async_trait]
pub trait AnalysisBackend: Send + Sync {
    async fn analyze(&self, text: &str) -> Result<AnalysisOutcome, AnalyzeError>;
}

/// Optional screenshot attached to an image scan.
#[derive(Debug, Clone)]
pub struct ImageAttachment {
    pub filename: String,
    pub mime: String,
    pub bytes: Vec<u8>,
}

/// Pull/poll view of an agent task, for embedders that do not stream.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct TaskStatus {
    pub task_id: String,
    pub status: TaskState,
    #[serde(default)]
    pub result: Option<FinalResult>,
    #[serde(default)]
    pub error: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TaskState {
    Pending,
    Processing,
    Completed,
    Failed,
}

#[derive(Serialize)]
struct AnalyzeRequest<'a> {
    session_id: &'a str,
    app_bundle: &'a str,
    text: &'a str,
}

/// HTTP client for the analysis gateway, guarded by a circuit breaker.
///
/// One instance per logical endpoint: the breaker accumulates failure
/// state across calls, so independently constructed clients must not
/// share an endpoint.
pub struct HttpAnalysisClient {
    settings: ClientSettings,
    http: reqwest::Client,
    breaker: Mutex<CircuitBreaker>,
}

impl HttpAnalysisClient {
    pub fn new(settings: ClientSettings) -> Result<Self, AnalyzeError> {
        url::Url::parse(&settings.base_url)
            .map_err(|err| AnalyzeError::new(ErrorKind::InvalidUrl, err.to_string()))?;
        let http = reqwest::Client::builder()
            .timeout(settings.request_timeout)
            .build()
            .map_err(|err| AnalyzeError::new(ErrorKind::Network, err.to_string()))?;
        let breaker = Mutex::new(CircuitBreaker::new(settings.breaker.clone()));
        Ok(Self {
            settings,
            http,
            breaker,
        })
    }

    /// Multipart image scan; same response shapes as `analyze`.
    pub async fn scan_image(
        &self,
        ocr_text: &str,
        image: Option<ImageAttachment>,
    ) -> Result<AnalysisOutcome, AnalyzeError> {
        self.check_breaker()?;
        let mut form = reqwest::multipart::Form::new()
            .text("session_id", self.settings.session_id.clone())
            .text("ocr_text", ocr_text.to_string());
        if let Some(image) = image {
            let part = reqwest::multipart::Part::bytes(image.bytes)
                .file_name(image.filename)
                .mime_str(&image.mime)
                .map_err(|err| AnalyzeError::new(ErrorKind::Encoding, err.to_string()))?;
            form = form.part("image", part);
        }
        let request = self.http.post(self.endpoint("scan-image")).multipart(form);
        self.dispatch(request).await
    }

    /// One poll of an agent task over the pull channel. Not routed through
    /// the breaker: the breaker protects the synchronous analysis endpoint.
    pub async fn task_status(&self, task_id: &str) -> Result<TaskStatus, AnalyzeError> {
        let request = self
            .http
            .get(self.endpoint(&format!("agent-task/{task_id}/status")));
        let response = request.send().await.map_err(map_transport_error)?;
        let status = response.status();
        if !status.is_success() {
            return Err(map_status_error(status));
        }
        let body = response.text().await.map_err(map_transport_error)?;
        serde_json::from_str(&body)
            .map_err(|err| AnalyzeError::new(ErrorKind::Decoding, err.to_string()))
    }

    fn endpoint(&self, path: &str) -> String {
        format!("{}/{path}", self.settings.base_url.trim_end_matches('/'))
    }

    fn check_breaker(&self) -> Result<(), AnalyzeError> {
        let mut breaker = self.breaker.lock().expect("lock breaker");
        if breaker.is_open(Instant::now()) {
            sentinel_debug!("circuit open, failing fast without a network call");
            return Err(AnalyzeError::new(
                ErrorKind::CircuitOpen,
                "analysis backend temporarily unavailable",
            ));
        }
        Ok(())
    }

    /// Sends one request and feeds the breaker with the outcome. Agent-path
    /// responses count as successes: the gateway round trip was healthy even
    /// though the analysis itself is still pending.
    async fn dispatch(
        &self,
        request: reqwest::RequestBuilder,
    ) -> Result<AnalysisOutcome, AnalyzeError> {
        let outcome = send_for_outcome(request).await;
        let mut breaker = self.breaker.lock().expect("lock breaker");
        match &outcome {
            Ok(_) => breaker.record_success(),
            Err(err) => {
                breaker.record_failure(Instant::now());
                sentinel_warn!(
                    "analysis call failed ({}), {} consecutive failures",
                    err,
                    breaker.consecutive_failures()
                );
            }
        }
        outcome
    }
}

#[async_trait::async_trait]
impl AnalysisBackend for HttpAnalysisClient {
    async fn analyze(&self, text: &str) -> Result<AnalysisOutcome, AnalyzeError> {
        self.check_breaker()?;
        let payload = AnalyzeRequest {
            session_id: &self.settings.session_id,
            app_bundle: &self.settings.app_bundle,
            text,
        };
        let body = serde_json::to_string(&payload)
            .map_err(|err| AnalyzeError::new(ErrorKind::Encoding, err.to_string()))?;
        let request = self
            .http
            .post(self.endpoint("analyze-text"))
            .header(CONTENT_TYPE, "application/json")
            .body(body);
        self.dispatch(request).await
    }
}

async fn send_for_outcome(
    request: reqwest::RequestBuilder,
) -> Result<AnalysisOutcome, AnalyzeError> {
    let response = request.send().await.map_err(map_transport_error)?;
    let status = response.status();
    if !status.is_success() {
        return Err(map_status_error(status));
    }
    let body = response.text().await.map_err(map_transport_error)?;
    decode_analysis_response(&body)
}

fn map_transport_error(err: reqwest::Error) -> AnalyzeError {
    if err.is_timeout() {
        return AnalyzeError::new(ErrorKind::Timeout, err.to_string());
    }
    AnalyzeError::new(ErrorKind::Network, err.to_string())
}

fn map_status_error(status: reqwest::StatusCode) -> AnalyzeError {
    let kind = match status.as_u16() {
        400 => ErrorKind::BadRequest,
        429 => ErrorKind::RateLimited,
        code @ 500..=599 => ErrorKind::ServerError(code),
        _ => ErrorKind::Network,
    };
    AnalyzeError::new(kind, status.to_string())
}
