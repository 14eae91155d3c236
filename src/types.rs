use chrono::{DateTime, Utc};
use reqwest::Url;
use std::collections::BTreeMap;
use std::fmt;
use std::time::Duration;

// ============================================================================
// Scenario
// ============================================================================

#[derive(Debug, Clone)]
pub struct Target {
    pub url: String,
    pub method: reqwest::Method,
    pub headers: Vec<(String, String)>,
    pub body: Option<String>,
    pub timeout: Duration,
}

#[derive(Debug, Clone)]
pub struct Step {
    pub id: u16,
    pub name: String,
    pub target: Target,
    /// `"<ms>"` or `"<min>-<max>"`, empty for no delay.
    pub sleep: String,
    pub abort_on_failure: bool,
}

impl Step {
    pub fn display_name(&self) -> String {
        if self.name.is_empty() {
            format!("Step {}", self.id)
        } else {
            self.name.clone()
        }
    }
}

/// Ordered steps, fixed at load time.
#[derive(Debug, Clone, Default)]
pub struct Scenario {
    pub steps: Vec<Step>,
}

// ============================================================================
// Proxy
// ============================================================================

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Proxy {
    Direct,
    Via(Url),
}

impl Proxy {
    pub fn parse(s: &str) -> Result<Self, String> {
        Url::parse(s)
            .map(Proxy::Via)
            .map_err(|e| format!("Invalid proxy URL '{}': {}", s, e))
    }
}

impl fmt::Display for Proxy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Proxy::Direct => f.write_str("direct"),
            Proxy::Via(url) => write!(f, "{}", url),
        }
    }
}

// ============================================================================
// Error Types
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    /// Proxy-local and transient; the run continues.
    Proxy,
    /// Deliberate stop signal; the run stops after this step.
    Intended,
    Conn,
    InvalidRequest,
    Unknown,
}

impl ErrorKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorKind::Proxy => "proxy",
            ErrorKind::Intended => "intended",
            ErrorKind::Conn => "connection",
            ErrorKind::InvalidRequest => "invalid_request",
            ErrorKind::Unknown => "unknown",
        }
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("{kind} error: {reason}")]
pub struct RequestError {
    pub kind: ErrorKind,
    pub reason: String,
}

/// Reason attached to work abandoned because the run was cancelled.
pub const REASON_CANCELED: &str = "context canceled";

impl RequestError {
    pub fn new(kind: ErrorKind, reason: impl Into<String>) -> Self {
        Self {
            kind,
            reason: reason.into(),
        }
    }

    pub fn canceled() -> Self {
        Self::new(ErrorKind::Intended, REASON_CANCELED)
    }

    /// Maps a transport failure onto a kind and a stable, groupable reason.
    /// Connect failures through a proxy are blamed on the proxy.
    pub fn from_reqwest_error(err: &reqwest::Error, proxy: &Proxy) -> Self {
        let message = err.to_string().to_lowercase();

        if err.is_timeout() {
            Self::new(ErrorKind::Conn, "timeout")
        } else if err.is_connect() {
            if *proxy != Proxy::Direct {
                Self::new(ErrorKind::Proxy, "proxy connection error")
            } else if message.contains("dns") || message.contains("resolve") {
                Self::new(ErrorKind::Conn, "dns lookup error")
            } else if message.contains("refused") {
                Self::new(ErrorKind::Conn, "connection refused")
            } else if message.contains("reset") {
                Self::new(ErrorKind::Conn, "connection reset")
            } else {
                Self::new(ErrorKind::Conn, "connection error")
            }
        } else if err.is_builder() || err.is_request() {
            Self::new(ErrorKind::InvalidRequest, "invalid request")
        } else if err.is_body() || err.is_decode() {
            Self::new(ErrorKind::Conn, "response read error")
        } else {
            Self::new(ErrorKind::Unknown, err.to_string())
        }
    }
}

// ============================================================================
// Step / Scenario Results
// ============================================================================

/// Timing phases of one request. Ordering is the report's presentation order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum DurationPhase {
    Dns,
    Connection,
    Tls,
    RequestWrite,
    ServerProcessing,
    ResponseRead,
    Total,
}

impl DurationPhase {
    pub fn label(&self) -> &'static str {
        match self {
            DurationPhase::Dns => "DNS",
            DurationPhase::Connection => "Connection",
            DurationPhase::Tls => "TLS",
            DurationPhase::RequestWrite => "Request Write",
            DurationPhase::ServerProcessing => "Server Processing",
            DurationPhase::ResponseRead => "Response Read",
            DurationPhase::Total => "Total",
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct RequestDebug {
    pub url: String,
    pub method: String,
    pub headers: Vec<(String, String)>,
    pub body: String,
}

#[derive(Debug, Clone, Default)]
pub struct ResponseDebug {
    pub status: u16,
    pub headers: Vec<(String, String)>,
    pub body: String,
}

/// Raw request/response captured in debug mode for the verbose transcript.
#[derive(Debug, Clone, Default)]
pub struct DebugInfo {
    pub request: RequestDebug,
    pub response: Option<ResponseDebug>,
}

#[derive(Debug, Clone)]
pub struct StepResult {
    pub step_id: u16,
    pub name: String,
    pub status: Option<u16>,
    /// Elapsed seconds per phase; phases the requester could not observe are absent.
    pub durations: BTreeMap<DurationPhase, f64>,
    pub error: Option<RequestError>,
    pub debug: Option<DebugInfo>,
}

impl StepResult {
    pub fn new(step_id: u16, name: impl Into<String>) -> Self {
        Self {
            step_id,
            name: name.into(),
            status: None,
            durations: BTreeMap::new(),
            error: None,
            debug: None,
        }
    }

    pub fn with_status(mut self, status: u16) -> Self {
        self.status = Some(status);
        self
    }

    pub fn with_duration(mut self, phase: DurationPhase, secs: f64) -> Self {
        self.durations.insert(phase, secs);
        self
    }

    pub fn with_error(mut self, error: RequestError) -> Self {
        self.error = Some(error);
        self
    }

    pub fn is_success(&self) -> bool {
        self.error.is_none()
    }

    pub fn error_kind(&self) -> Option<ErrorKind> {
        self.error.as_ref().map(|e| e.kind)
    }

    pub fn error_reason(&self) -> &str {
        self.error.as_ref().map(|e| e.reason.as_str()).unwrap_or("")
    }

    pub fn total_duration(&self) -> f64 {
        self.durations
            .get(&DurationPhase::Total)
            .copied()
            .unwrap_or(0.0)
    }
}

#[derive(Debug, Clone)]
pub struct ScenarioResult {
    pub start_time: DateTime<Utc>,
    pub proxy: Proxy,
    /// In scenario order; shorter than the scenario when the run was aborted.
    pub step_results: Vec<StepResult>,
}

impl ScenarioResult {
    pub fn new(proxy: Proxy, start_time: DateTime<Utc>) -> Self {
        Self {
            start_time,
            proxy,
            step_results: Vec::new(),
        }
    }

    pub fn is_success(&self) -> bool {
        self.step_results.iter().all(StepResult::is_success)
    }
}

// ============================================================================
// Load Configuration
// ============================================================================

#[derive(Debug, Clone)]
pub struct LoadConfig {
    pub scenario: Scenario,
    pub proxies: Vec<Proxy>,
    pub concurrency: u32,
    /// Total runs across all workers, 0 = unlimited.
    pub iterations: u64,
    pub duration: Option<Duration>,
    pub live_interval: Option<Duration>,
    pub debug: bool,
}
