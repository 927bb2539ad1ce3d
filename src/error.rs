use crate::schema::StatusCode;

/// Internal error type. Every public operation on [`crate::Recorder`] and
/// [`crate::Replayer`] catches this at the boundary and maps it into the
/// result envelope (§7: "all caller-visible failures surface through the
/// envelope; never thrown").
#[derive(thiserror::Error, Debug)]
pub enum VcrError {
    #[error("missing required option: {0}")]
    MissingOption(&'static str),

    #[error("operation not valid in current state: {0}")]
    InvalidState(&'static str),

    #[error("browser launch failed: {0}")]
    LaunchFailed(String),

    #[error("cdp error: {0}")]
    Cdp(String),

    #[error("no active page")]
    NoPage,

    #[error("recorder is not recording")]
    NotRecording,

    #[error("already recording")]
    AlreadyRecording,

    #[error("browser already launched")]
    AlreadyLaunched,

    #[error("failed to start recording: {0}")]
    RecordingStartFailed(String),

    #[error("invalid record data: {0}")]
    InvalidData(String),

    #[error("replay is not playing")]
    NotPlaying,

    #[error("replay stopped by caller")]
    ReplayStopped,

    #[error("action {step} failed: {message}")]
    ActionFailed { step: usize, message: String },

    #[error("busy indicator timeout after {timeout_ms}ms waiting on {selector}")]
    BusyTimeout { timeout_ms: u64, selector: String },

    #[error("browser closed")]
    BrowserClosed,

    #[error("aborted by user")]
    AbortedByUser,

    #[error(transparent)]
    Cdp0(#[from] chromiumoxide::error::CdpError),

    #[error(transparent)]
    Json(#[from] serde_json::Error),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

impl VcrError {
    /// Best-effort classification of whether a message indicates the target
    /// (tab/browser) went away underneath us, vs. a genuine action failure.
    /// Grounded in the teacher's `should_ignore_handler_error` substring
    /// classification in `manager/connection/handler.rs`.
    pub fn looks_like_target_closed(&self) -> bool {
        const TARGET_CLOSED_SUBSTRINGS: &[&str] = &[
            "target closed",
            "target crashed",
            "session closed",
            "no such session",
            "context destroyed",
            "connection closed",
            "browser closed",
            "disconnected",
        ];
        let message = self.to_string().to_ascii_lowercase();
        TARGET_CLOSED_SUBSTRINGS
            .iter()
            .any(|needle| message.contains(needle))
    }

    pub fn status_code(&self) -> StatusCode {
        match self {
            VcrError::MissingOption("url") => StatusCode::NoUrlFound,
            VcrError::MissingOption(_) => StatusCode::LaunchFailed,
            VcrError::LaunchFailed(_) => StatusCode::LaunchFailed,
            VcrError::NoPage => StatusCode::NoPageFound,
            VcrError::NotRecording => StatusCode::NotRecording,
            VcrError::AlreadyRecording => StatusCode::AlreadyRecording,
            VcrError::AlreadyLaunched => StatusCode::AlreadyLaunched,
            VcrError::RecordingStartFailed(_) => StatusCode::RecordingStartFailed,
            VcrError::InvalidData(_) => StatusCode::InvalidData,
            VcrError::NotPlaying => StatusCode::NotPlaying,
            VcrError::ReplayStopped => StatusCode::ReplayStopped,
            VcrError::ActionFailed { .. } => StatusCode::ActionFailed,
            VcrError::BusyTimeout { .. } => StatusCode::BusyTimeout,
            VcrError::BrowserClosed => StatusCode::BrowserClosed,
            VcrError::AbortedByUser => StatusCode::AbortedByUser,
            VcrError::InvalidState(_) => StatusCode::LaunchFailed,
            _ if self.looks_like_target_closed() => StatusCode::BrowserClosed,
            _ => StatusCode::ActionFailed,
        }
    }
}

pub type Result<T> = std::result::Result<T, VcrError>;
