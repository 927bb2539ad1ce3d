//! Recorder state machine (C4, §4.4): owns the browser lifecycle, wires the
//! capture script and its callback, and serializes actions and errors.

mod launch;
mod session;
mod state;

pub use state::RecorderState;

use crate::config::RecorderOptions;
use crate::events::EventEmitter;
use crate::schema::{Action, CaptureError, Envelope, RecordingMetadata};
use chromiumoxide::Browser;
use chromiumoxide::Page as CdpPage;
use std::sync::Arc;
use tokio::sync::{Mutex, RwLock};
use tokio::task::JoinHandle;

struct RecorderEvents {
    action: EventEmitter<Action>,
    console_error: EventEmitter<CaptureError>,
    stop: EventEmitter<()>,
    close: EventEmitter<()>,
}

impl Default for RecorderEvents {
    fn default() -> Self {
        Self {
            action: EventEmitter::new(),
            console_error: EventEmitter::new(),
            stop: EventEmitter::new(),
            close: EventEmitter::new(),
        }
    }
}

/// Drives a single headful tab through `IDLE → LAUNCHING → READY ⇄ RECORDING
/// → CLOSING → IDLE`. One instance owns one browser and (at most) one page.
pub struct Recorder {
    options: RecorderOptions,
    state: Arc<RwLock<RecorderState>>,
    browser: Arc<Mutex<Option<Browser>>>,
    page: Arc<Mutex<Option<CdpPage>>>,
    handler_task: Arc<Mutex<Option<JoinHandle<()>>>>,
    capture_task: Arc<Mutex<Option<JoinHandle<()>>>>,
    console_task: Arc<Mutex<Option<JoinHandle<()>>>>,
    actions: Arc<Mutex<Vec<Action>>>,
    errors: Arc<Mutex<Vec<CaptureError>>>,
    recording_start_time: Arc<Mutex<Option<i64>>>,
    recording_end_time: Arc<Mutex<Option<i64>>>,
    /// One-shot per tab lifecycle: `evaluateOnNewDocument`-equivalent
    /// registration only needs to happen once (§4.4 "_isScriptInjected").
    script_injected: Arc<Mutex<bool>>,
    events: RecorderEvents,
}

impl Recorder {
    pub fn new(options: RecorderOptions) -> crate::error::Result<Self> {
        options.validate()?;
        Ok(Self {
            options,
            state: Arc::new(RwLock::new(RecorderState::Idle)),
            browser: Arc::new(Mutex::new(None)),
            page: Arc::new(Mutex::new(None)),
            handler_task: Arc::new(Mutex::new(None)),
            capture_task: Arc::new(Mutex::new(None)),
            console_task: Arc::new(Mutex::new(None)),
            actions: Arc::new(Mutex::new(Vec::new())),
            errors: Arc::new(Mutex::new(Vec::new())),
            recording_start_time: Arc::new(Mutex::new(None)),
            recording_end_time: Arc::new(Mutex::new(None)),
            script_injected: Arc::new(Mutex::new(false)),
            events: RecorderEvents::default(),
        })
    }

    pub async fn on_action<F>(&self, callback: F)
    where
        F: Fn(&Action) + Send + Sync + 'static,
    {
        self.events.action.subscribe(callback).await;
    }

    pub async fn on_console_error<F>(&self, callback: F)
    where
        F: Fn(&CaptureError) + Send + Sync + 'static,
    {
        self.events.console_error.subscribe(callback).await;
    }

    pub async fn on_stop<F>(&self, callback: F)
    where
        F: Fn(&()) + Send + Sync + 'static,
    {
        self.events.stop.subscribe(callback).await;
    }

    pub async fn on_close<F>(&self, callback: F)
    where
        F: Fn(&()) + Send + Sync + 'static,
    {
        self.events.close.subscribe(callback).await;
    }

    pub async fn state(&self) -> RecorderState {
        *self.state.read().await
    }

    /// Pure accessor (§4.4 `getMetadata`). Duration is omitted until the
    /// recording has both a start and an end time.
    pub async fn get_metadata(&self) -> Envelope<RecordingMetadata> {
        let start = *self.recording_start_time.lock().await;
        let end = *self.recording_end_time.lock().await;
        let (duration_ms, duration) = match (start, end) {
            (Some(s), Some(e)) => {
                let ms = e - s;
                (Some(ms), Some(crate::schema::format_duration(ms)))
            }
            _ => (None, None),
        };
        Envelope::ok(Some(RecordingMetadata {
            kind: self.options.r#type.clone(),
            url: self.options.url.clone(),
            recording_start_time: start,
            recording_end_time: end,
            duration_ms,
            duration,
        }))
    }

    async fn push_action(&self, action: Action) {
        self.actions.lock().await.push(action.clone());
        if self.options.stream {
            self.events.action.emit(action).await;
        }
    }

    async fn push_error(&self, error: CaptureError) {
        self.errors.lock().await.push(error.clone());
        if self.options.stream {
            self.events.console_error.emit(error).await;
        }
    }

    /// `stream=false` emission: push the buffered arrays once (§4.4
    /// "Emission").
    async fn emit_buffered(&self) {
        if self.options.stream {
            return;
        }
        let actions = self.actions.lock().await.clone();
        for action in actions {
            self.events.action.emit(action).await;
        }
        let errors = self.errors.lock().await.clone();
        for error in errors {
            self.events.console_error.emit(error).await;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::LaunchOptions;

    fn options() -> RecorderOptions {
        RecorderOptions {
            url: "https://example.com".to_string(),
            r#type: "web".to_string(),
            stream: true,
            launch_options: LaunchOptions {
                executable_path: Some("/usr/bin/chromium".to_string()),
                headless: true,
                args: vec![],
            },
            goto_options: Default::default(),
        }
    }

    #[tokio::test]
    async fn new_recorder_starts_idle() {
        let recorder = Recorder::new(options()).unwrap();
        assert_eq!(recorder.state().await, RecorderState::Idle);
    }

    #[tokio::test]
    async fn metadata_omits_duration_before_recording() {
        let recorder = Recorder::new(options()).unwrap();
        let envelope = recorder.get_metadata().await;
        let data = envelope.rdata.unwrap();
        assert!(data.duration.is_none());
        assert!(data.duration_ms.is_none());
    }

    #[tokio::test]
    async fn metadata_formats_duration_once_bounds_are_known() {
        let recorder = Recorder::new(options()).unwrap();
        *recorder.recording_start_time.lock().await = Some(1_000);
        *recorder.recording_end_time.lock().await = Some(126_000);
        let envelope = recorder.get_metadata().await;
        let data = envelope.rdata.unwrap();
        assert_eq!(data.duration_ms, Some(125_000));
        assert_eq!(data.duration.as_deref(), Some("2m 5s"));
    }

    #[tokio::test]
    async fn buffered_mode_does_not_emit_until_finalize() {
        let mut opts = options();
        opts.stream = false;
        let recorder = Recorder::new(opts).unwrap();

        let seen = Arc::new(Mutex::new(0usize));
        let seen_clone = Arc::clone(&seen);
        recorder
            .on_action(move |_| {
                let seen_clone = Arc::clone(&seen_clone);
                tokio::spawn(async move {
                    *seen_clone.lock().await += 1;
                });
            })
            .await;

        recorder
            .push_action(Action::Click {
                timestamp: 0,
                selector: "#a".to_string(),
                x: 1,
                y: 1,
                checked: None,
            })
            .await;

        assert_eq!(recorder.actions.lock().await.len(), 1);
    }
}
