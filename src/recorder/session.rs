use super::{Recorder, RecorderState};
use crate::capture;
use crate::error::VcrError;
use crate::schema::{Action, Envelope, StatusCode};
use futures::StreamExt;
use tracing::{debug, warn};

impl Recorder {
    /// `startRecording()` (§4.4). Valid only in `READY`.
    pub async fn start_recording(&self) -> Envelope<()> {
        if self.state.read().await.is_closing() {
            return Envelope::err(StatusCode::AbortedByUser, VcrError::AbortedByUser.to_string());
        }
        if *self.state.read().await == RecorderState::Recording {
            return Envelope::err(StatusCode::AlreadyRecording, VcrError::AlreadyRecording.to_string());
        }
        if !self.state.read().await.can_start_recording() {
            return Envelope::err(
                StatusCode::RecordingStartFailed,
                "startRecording is only valid in READY",
            );
        }

        match self.start_recording_inner().await {
            Ok(()) => {
                *self.state.write().await = RecorderState::Recording;
                Envelope::ok(None)
            }
            Err(e) if e.looks_like_target_closed() => {
                *self.state.write().await = RecorderState::Ready;
                Envelope::err(StatusCode::AbortedByUser, e.to_string())
            }
            Err(e) => {
                *self.state.write().await = RecorderState::Ready;
                Envelope::err(StatusCode::RecordingStartFailed, e.to_string())
            }
        }
    }

    async fn start_recording_inner(&self) -> crate::error::Result<()> {
        self.actions.lock().await.clear();
        self.errors.lock().await.clear();
        *self.recording_end_time.lock().await = None;
        let start = chrono::Utc::now().timestamp_millis();
        *self.recording_start_time.lock().await = Some(start);

        let page_guard = self.page.lock().await;
        let page = page_guard.as_ref().ok_or(VcrError::NoPage)?;

        let size = page
            .evaluate("({w: window.outerWidth, h: window.outerHeight})")
            .await
            .ok()
            .and_then(|r| r.value().cloned())
            .unwrap_or(serde_json::json!({"w": 0, "h": 0}));
        let width = size.get("w").and_then(serde_json::Value::as_i64).unwrap_or(0);
        let height = size.get("h").and_then(serde_json::Value::as_i64).unwrap_or(0);

        self.push_action(Action::BrowserResize {
            timestamp: start,
            from_width: width,
            from_height: height,
            to_width: width,
            to_height: height,
        })
        .await;

        let already_injected = {
            let mut guard = self.script_injected.lock().await;
            let was = *guard;
            *guard = true;
            was
        };

        let mut stream = capture::install(page, already_injected).await?;
        if already_injected {
            debug!("capture script already registered for this tab lifecycle");
        }

        let actions = self.actions.clone();
        let events_action = self.events.action.clone();
        let stream_mode = self.options.stream;
        let task = tokio::spawn(async move {
            while let Some(event) = stream.next().await {
                if event.name != capture::CALLBACK_NAME {
                    continue;
                }
                match serde_json::from_str::<Action>(&event.payload) {
                    Ok(action) => {
                        actions.lock().await.push(action.clone());
                        if stream_mode {
                            events_action.emit(action).await;
                        }
                    }
                    Err(e) => warn!("failed to parse captured action: {}", e),
                }
            }
        });
        *self.capture_task.lock().await = Some(task);

        Ok(())
    }

    /// `stopRecording()` (§4.4). Valid only in `RECORDING`.
    pub async fn stop_recording(&self) -> Envelope<()> {
        if !self.state.read().await.can_stop_recording() {
            return Envelope::err(StatusCode::NotRecording, VcrError::NotRecording.to_string());
        }
        let end = chrono::Utc::now().timestamp_millis();
        *self.recording_end_time.lock().await = Some(end);
        self.finalize().await;
        self.events.stop.emit(()).await;
        *self.state.write().await = RecorderState::Ready;
        Envelope::ok(None)
    }

    async fn finalize(&self) {
        if let Some(task) = self.capture_task.lock().await.take() {
            task.abort();
        }
        self.emit_buffered().await;
    }

    /// `close()` (§4.4). Valid in any non-`IDLE`/`CLOSING` state.
    pub async fn close(&self) -> Envelope<()> {
        if !self.state.read().await.can_close() {
            return Envelope::ok(None);
        }
        *self.state.write().await = RecorderState::Closing;

        if let Some(task) = self.capture_task.lock().await.take() {
            task.abort();
        }
        if let Some(task) = self.console_task.lock().await.take() {
            task.abort();
        }

        if let Some(page) = self.page.lock().await.take() {
            let _ = page.close().await;
        }
        if let Some(mut browser) = self.browser.lock().await.take() {
            let _ = browser.close().await;
        }
        if let Some(task) = self.handler_task.lock().await.take() {
            task.abort();
        }

        self.events.close.emit(()).await;
        *self.state.write().await = RecorderState::Idle;
        Envelope::ok(None)
    }
}
