//! Canonical action/recording/error schema shared by the recorder and the
//! replayer (§3).

use serde::{Deserialize, Serialize};

/// One captured user gesture, tagged by `type`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum Action {
    #[serde(rename = "click")]
    Click {
        timestamp: i64,
        selector: String,
        x: i64,
        y: i64,
        #[serde(skip_serializing_if = "Option::is_none")]
        checked: Option<bool>,
    },
    #[serde(rename = "input")]
    Input {
        timestamp: i64,
        selector: String,
        value: String,
        #[serde(skip_serializing_if = "Option::is_none")]
        #[serde(rename = "selectionStart")]
        selection_start: Option<i64>,
        #[serde(skip_serializing_if = "Option::is_none")]
        #[serde(rename = "selectionEnd")]
        selection_end: Option<i64>,
    },
    #[serde(rename = "change")]
    Change {
        timestamp: i64,
        selector: String,
        #[serde(skip_serializing_if = "Option::is_none")]
        checked: Option<bool>,
        #[serde(skip_serializing_if = "Option::is_none")]
        value: Option<String>,
    },
    #[serde(rename = "keydown")]
    Keydown {
        timestamp: i64,
        selector: String,
        key: String,
    },
    #[serde(rename = "scroll")]
    Scroll {
        timestamp: i64,
        selector: String,
        #[serde(rename = "startScrollX")]
        start_scroll_x: f64,
        #[serde(rename = "startScrollY")]
        start_scroll_y: f64,
        #[serde(rename = "scrollX")]
        scroll_x: f64,
        #[serde(rename = "scrollY")]
        scroll_y: f64,
        duration: i64,
    },
    #[serde(rename = "browser_resize")]
    BrowserResize {
        timestamp: i64,
        #[serde(rename = "fromWidth")]
        from_width: i64,
        #[serde(rename = "fromHeight")]
        from_height: i64,
        #[serde(rename = "toWidth")]
        to_width: i64,
        #[serde(rename = "toHeight")]
        to_height: i64,
    },
}

impl Action {
    pub fn timestamp(&self) -> i64 {
        match self {
            Action::Click { timestamp, .. }
            | Action::Input { timestamp, .. }
            | Action::Change { timestamp, .. }
            | Action::Keydown { timestamp, .. }
            | Action::Scroll { timestamp, .. }
            | Action::BrowserResize { timestamp, .. } => *timestamp,
        }
    }

    pub fn type_name(&self) -> &'static str {
        match self {
            Action::Click { .. } => "click",
            Action::Input { .. } => "input",
            Action::Change { .. } => "change",
            Action::Keydown { .. } => "keydown",
            Action::Scroll { .. } => "scroll",
            Action::BrowserResize { .. } => "browser_resize",
        }
    }

    /// Invariant (i): P1's "initial-size" predicate, used both when the
    /// recorder pushes the first action and when validating a recording
    /// before replay.
    pub fn is_initial_resize(&self) -> bool {
        matches!(
            self,
            Action::BrowserResize {
                from_width,
                from_height,
                to_width,
                to_height,
                ..
            } if from_width == to_width && from_height == to_height
        )
    }
}

/// One captured console/network error (§3).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CaptureError {
    #[serde(rename = "type")]
    pub kind: ErrorKind,
    pub message: String,
    pub timestamp: i64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub stack: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub method: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ErrorKind {
    #[serde(rename = "BROWSER_CONSOLE_ERROR")]
    BrowserConsoleError,
    #[serde(rename = "REQUEST_ERROR")]
    RequestError,
}

/// A complete capture session (§3). `schemaVersion` is a supplement beyond
/// the distilled spec (see SPEC_FULL.md, C1) so a future persistence layer
/// can reject recordings made by an incompatible capture script without the
/// core having to guess from shape alone; replay does not currently enforce
/// it.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Recording {
    #[serde(rename = "type")]
    pub kind: String,
    pub url: String,
    #[serde(rename = "recordingStartTime")]
    pub recording_start_time: i64,
    #[serde(rename = "recordingEndTime")]
    pub recording_end_time: i64,
    #[serde(rename = "durationMs", skip_serializing_if = "Option::is_none")]
    pub duration_ms: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub duration: Option<String>,
    #[serde(
        rename = "schemaVersion",
        default,
        skip_serializing_if = "Option::is_none"
    )]
    pub schema_version: Option<u32>,
    pub actions: Vec<Action>,
    pub errors: Vec<CaptureError>,
}

impl Recording {
    /// Validates invariants (i)-(iii) from §3. Used by [`crate::Replayer::play`]
    /// (§4.5: "Validates that `recordData.actions` is an array") and available
    /// to callers constructing recordings programmatically.
    pub fn validate(&self) -> std::result::Result<(), String> {
        let Some(first) = self.actions.first() else {
            return Ok(());
        };
        if !matches!(first, Action::BrowserResize { .. }) || !first.is_initial_resize() {
            return Err("first action must be an initial-size browser_resize".to_string());
        }
        if !self
            .actions
            .windows(2)
            .all(|pair| pair[0].timestamp() <= pair[1].timestamp())
        {
            return Err("actions are not timestamp-sorted".to_string());
        }
        if self.recording_end_time < self.recording_start_time {
            return Err("recordingEndTime precedes recordingStartTime".to_string());
        }
        Ok(())
    }
}

/// Metadata-only view returned by `getMetadata()` (§4.4).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RecordingMetadata {
    #[serde(rename = "type")]
    pub kind: String,
    pub url: String,
    #[serde(rename = "recordingStartTime", skip_serializing_if = "Option::is_none")]
    pub recording_start_time: Option<i64>,
    #[serde(rename = "recordingEndTime", skip_serializing_if = "Option::is_none")]
    pub recording_end_time: Option<i64>,
    #[serde(rename = "durationMs", skip_serializing_if = "Option::is_none")]
    pub duration_ms: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub duration: Option<String>,
}

/// Formats a millisecond duration as `"{h}h {m}m {s}s"`, omitting
/// higher-order zero units (§4.4).
pub fn format_duration(duration_ms: i64) -> String {
    let total_seconds = duration_ms.max(0) / 1000;
    let hours = total_seconds / 3600;
    let minutes = (total_seconds % 3600) / 60;
    let seconds = total_seconds % 60;

    if hours > 0 {
        format!("{hours}h {minutes}m {seconds}s")
    } else if minutes > 0 {
        format!("{minutes}m {seconds}s")
    } else {
        format!("{seconds}s")
    }
}

/// Uniform result envelope (§3, §6): `RETCD="S"` omits `STCOD`/`MSGTX`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Envelope<T> {
    pub retcd: RetCode,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub stcod: Option<StatusCode>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub msgtx: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub rdata: Option<T>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum RetCode {
    S,
    E,
}

impl<T> Envelope<T> {
    pub fn ok(rdata: Option<T>) -> Self {
        Self {
            retcd: RetCode::S,
            stcod: None,
            msgtx: None,
            rdata,
        }
    }

    pub fn err(stcod: StatusCode, msgtx: impl Into<String>) -> Self {
        Self {
            retcd: RetCode::E,
            stcod: Some(stcod),
            msgtx: Some(msgtx.into()),
            rdata: None,
        }
    }

    pub fn from_error(err: &crate::error::VcrError) -> Self {
        Self::err(err.status_code(), err.to_string())
    }

    pub fn is_ok(&self) -> bool {
        self.retcd == RetCode::S
    }
}

/// Status code constants (§6).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum StatusCode {
    #[serde(rename = "NO_URL_FOUND")]
    NoUrlFound,
    #[serde(rename = "LAUNCH_FAILED")]
    LaunchFailed,
    #[serde(rename = "NO_PAGE_FOUND")]
    NoPageFound,
    #[serde(rename = "NOT_RECORDING")]
    NotRecording,
    #[serde(rename = "ALREADY_LAUNCHED")]
    AlreadyLaunched,
    #[serde(rename = "ALREADY_RECORDING")]
    AlreadyRecording,
    #[serde(rename = "RECORDING_START_FAILED")]
    RecordingStartFailed,
    #[serde(rename = "ABORTED_BY_USER")]
    AbortedByUser,
    #[serde(rename = "BROWSER_CONSOLE_ERROR")]
    BrowserConsoleError,
    #[serde(rename = "REQUEST_ERROR")]
    RequestError,
    #[serde(rename = "INVALID_DATA")]
    InvalidData,
    #[serde(rename = "NOT_PLAYING")]
    NotPlaying,
    #[serde(rename = "REPLAY_STOPPED")]
    ReplayStopped,
    #[serde(rename = "ACTION_FAILED")]
    ActionFailed,
    #[serde(rename = "BUSY_TIMEOUT")]
    BusyTimeout,
    #[serde(rename = "BROWSER_CLOSED")]
    BrowserClosed,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn format_duration_omits_zero_high_order_units() {
        assert_eq!(format_duration(0), "0s");
        assert_eq!(format_duration(45_000), "45s");
        assert_eq!(format_duration(125_000), "2m 5s");
        assert_eq!(format_duration(3_725_000), "1h 2m 5s");
    }

    #[test]
    fn initial_resize_detection() {
        let resize = Action::BrowserResize {
            timestamp: 0,
            from_width: 1280,
            from_height: 800,
            to_width: 1280,
            to_height: 800,
        };
        assert!(resize.is_initial_resize());

        let resize_diff = Action::BrowserResize {
            timestamp: 0,
            from_width: 1280,
            from_height: 800,
            to_width: 1024,
            to_height: 768,
        };
        assert!(!resize_diff.is_initial_resize());
    }

    #[test]
    fn recording_validates_timestamp_order() {
        let mut recording = Recording {
            kind: "web".to_string(),
            url: "https://example.com".to_string(),
            recording_start_time: 0,
            recording_end_time: 10,
            duration_ms: None,
            duration: None,
            schema_version: None,
            actions: vec![
                Action::BrowserResize {
                    timestamp: 0,
                    from_width: 100,
                    from_height: 100,
                    to_width: 100,
                    to_height: 100,
                },
                Action::Click {
                    timestamp: 5,
                    selector: "#a".to_string(),
                    x: 1,
                    y: 1,
                    checked: None,
                },
            ],
            errors: vec![],
        };
        assert!(recording.validate().is_ok());

        recording.actions.reverse();
        assert!(recording.validate().is_err());
    }

    #[test]
    fn envelope_ok_omits_status_fields() {
        let env: Envelope<()> = Envelope::ok(None);
        let json = serde_json::to_value(&env).unwrap();
        assert!(json.get("stcod").is_none());
        assert!(json.get("msgtx").is_none());
    }
}
