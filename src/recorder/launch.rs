use super::{Recorder, RecorderState};
use crate::error::{Result, VcrError};
use chromiumoxide::Browser;
use chromiumoxide::browser::BrowserConfig;
use chromiumoxide::cdp::browser_protocol::network;
use chromiumoxide::cdp::js_protocol::runtime;
use futures::StreamExt;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

impl Recorder {
    /// `launchPage()` (§4.4). Valid only in `IDLE`; transitions through
    /// `LAUNCHING` to `READY`. Checks the state after every suspension so an
    /// in-flight `close()` aborts the launch.
    pub async fn launch_page(&self) -> crate::schema::Envelope<()> {
        if !self.state.read().await.can_launch() {
            return crate::schema::Envelope::err(
                crate::schema::StatusCode::LaunchFailed,
                "launchPage is only valid in IDLE",
            );
        }
        *self.state.write().await = RecorderState::Launching;

        match self.launch_page_inner().await {
            Ok(()) => {
                *self.state.write().await = RecorderState::Ready;
                crate::schema::Envelope::ok(None)
            }
            Err(e) => {
                let aborted = self.state.read().await.is_closing();
                *self.state.write().await = RecorderState::Idle;
                if aborted {
                    crate::schema::Envelope::err(
                        crate::schema::StatusCode::AbortedByUser,
                        VcrError::AbortedByUser.to_string(),
                    )
                } else {
                    crate::schema::Envelope::err(crate::schema::StatusCode::LaunchFailed, e.to_string())
                }
            }
        }
    }

    async fn check_not_closing(&self) -> Result<()> {
        if self.state.read().await.is_closing() {
            return Err(VcrError::AbortedByUser);
        }
        Ok(())
    }

    async fn launch_page_inner(&self) -> Result<()> {
        let executable_path = self
            .options
            .launch_options
            .executable_path
            .clone()
            .ok_or(VcrError::MissingOption("launchOptions.executablePath"))?;

        let mut builder = BrowserConfig::builder()
            .chrome_executable(executable_path)
            .request_timeout(std::time::Duration::from_secs(60));
        if self.options.launch_options.headless {
            builder = builder.headless_mode(chromiumoxide::browser::HeadlessMode::New);
        }
        for arg in &self.options.launch_options.args {
            builder = builder.arg(arg.clone());
        }
        let browser_config = builder
            .build()
            .map_err(|e| VcrError::LaunchFailed(e.to_string()))?;

        let (browser, mut handler) = Browser::launch(browser_config)
            .await
            .map_err(|e| VcrError::LaunchFailed(e.to_string()))?;
        self.check_not_closing().await?;

        let browser_for_task = self.browser.clone();
        let page_for_task = self.page.clone();
        let task = tokio::spawn(async move {
            while let Some(result) = handler.next().await {
                if result.is_err() {
                    debug!("recorder handler event error: {:?}", result.err());
                }
            }
            warn!("[recorder] cdp event handler ended");
            *browser_for_task.lock().await = None;
            *page_for_task.lock().await = None;
        });
        *self.handler_task.lock().await = Some(task);
        *self.browser.lock().await = Some(browser);
        self.check_not_closing().await?;

        let page = {
            let browser_guard = self.browser.lock().await;
            let browser = browser_guard.as_ref().ok_or(VcrError::BrowserClosed)?;
            browser
                .new_page("about:blank")
                .await
                .map_err(|e| VcrError::Cdp(e.to_string()))?
        };
        self.check_not_closing().await?;

        page.execute(network::EnableParams::default())
            .await
            .map_err(|e| VcrError::Cdp(e.to_string()))?;
        page.execute(runtime::EnableParams::default())
            .await
            .map_err(|e| VcrError::Cdp(e.to_string()))?;
        self.install_console_listener(&page).await;
        self.install_pageerror_listener(&page).await;
        self.install_request_failed_listener(&page).await;
        self.install_disconnected_handler().await;
        self.check_not_closing().await?;

        page.goto(&self.options.url)
            .await
            .map_err(|e| VcrError::Cdp(e.to_string()))?;
        let _ = tokio::time::timeout(
            self.options.goto_options.timeout(),
            page.wait_for_navigation(),
        )
        .await;
        self.check_not_closing().await?;

        *self.page.lock().await = Some(page);
        info!("recorder launched and navigated to {}", self.options.url);
        Ok(())
    }

    /// Console `error` messages (§4.4 "Error sources"): each argument is
    /// serialized as its value, or as `description` for error objects
    /// (first line becomes `message`, full text becomes `stack`).
    async fn install_console_listener(&self, page: &chromiumoxide::Page) {
        let Ok(mut stream) = page.event_listener::<runtime::EventConsoleApiCalled>().await else {
            return;
        };
        let errors = self.errors.clone();
        let console_task = self.console_task.clone();
        let task = tokio::spawn(async move {
            while let Some(event) = stream.next().await {
                if !matches!(event.r#type, runtime::ConsoleApiCalledType::Error) {
                    continue;
                }
                for arg in &event.args {
                    let (message, stack) = describe_remote_object(arg);
                    let error = crate::schema::CaptureError {
                        kind: crate::schema::ErrorKind::BrowserConsoleError,
                        message,
                        timestamp: chrono::Utc::now().timestamp_millis(),
                        stack,
                        url: None,
                        method: None,
                    };
                    errors.lock().await.push(error);
                }
            }
        });
        *console_task.lock().await = Some(task);
    }

    /// `pageerror` (§4.4 "Error sources"): uncaught exceptions map directly to
    /// a `BrowserConsoleError`-kind `CaptureError`, same as console `error`.
    async fn install_pageerror_listener(&self, page: &chromiumoxide::Page) {
        let Ok(mut stream) = page.event_listener::<runtime::EventExceptionThrown>().await else {
            return;
        };
        let errors = self.errors.clone();
        tokio::spawn(async move {
            while let Some(event) = stream.next().await {
                let detail = &event.exception_details;
                let message = detail
                    .exception
                    .as_ref()
                    .and_then(|obj| obj.description.clone())
                    .unwrap_or_else(|| detail.text.clone());
                let stack = detail.stack_trace.as_ref().map(|trace| {
                    trace
                        .call_frames
                        .iter()
                        .map(|frame| format!("at {} ({}:{}:{})", frame.function_name, frame.url, frame.line_number, frame.column_number))
                        .collect::<Vec<_>>()
                        .join("\n")
                });
                let error = crate::schema::CaptureError {
                    kind: crate::schema::ErrorKind::BrowserConsoleError,
                    message,
                    timestamp: chrono::Utc::now().timestamp_millis(),
                    stack,
                    url: detail.url.clone(),
                    method: None,
                };
                errors.lock().await.push(error);
            }
        });
    }

    /// `requestfailed` (§4.4): `net::ERR_ABORTED` is filtered as normal
    /// navigation-cancellation noise.
    async fn install_request_failed_listener(&self, page: &chromiumoxide::Page) {
        let Ok(mut will_send) = page.event_listener::<network::EventRequestWillBeSent>().await else {
            return;
        };
        let Ok(mut failed) = page.event_listener::<network::EventLoadingFailed>().await else {
            return;
        };
        let errors = self.errors.clone();
        let requests: Arc<Mutex<HashMap<String, (String, String)>>> =
            Arc::new(Mutex::new(HashMap::new()));
        let requests_writer = requests.clone();
        tokio::spawn(async move {
            while let Some(event) = will_send.next().await {
                requests_writer.lock().await.insert(
                    event.request_id.inner().clone(),
                    (event.request.url.clone(), event.request.method.clone()),
                );
            }
        });
        tokio::spawn(async move {
            while let Some(event) = failed.next().await {
                if event.error_text.contains("net::ERR_ABORTED") {
                    continue;
                }
                let (url, method) = requests
                    .lock()
                    .await
                    .remove(event.request_id.inner())
                    .unwrap_or_default();
                let error = crate::schema::CaptureError {
                    kind: crate::schema::ErrorKind::RequestError,
                    message: event.error_text.clone(),
                    timestamp: chrono::Utc::now().timestamp_millis(),
                    stack: None,
                    url: Some(url),
                    method: Some(method),
                };
                errors.lock().await.push(error);
            }
        });
    }

    /// Disconnected handler (§4.4 "Emission"): if the tab goes away while
    /// `RECORDING`, stamps `recordingEndTime`, finalizes, emits `stop`, then
    /// `close`. Watches the same `self.browser` slot that `launch_page_inner`'s
    /// handler task clears on disconnect, matching the teacher's
    /// handler-task-driven reset in `manager/connection/start.rs`.
    async fn install_disconnected_handler(&self) {
        let state = self.state.clone();
        let browser = self.browser.clone();
        let recording_end_time = self.recording_end_time.clone();
        let capture_task = self.capture_task.clone();
        let console_task = self.console_task.clone();
        let actions = self.actions.clone();
        let errors = self.errors.clone();
        let stream_mode = self.options.stream;
        let events_action = self.events.action.clone();
        let events_error = self.events.console_error.clone();
        let events_stop = self.events.stop.clone();
        let events_close = self.events.close.clone();

        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(std::time::Duration::from_millis(200));
            loop {
                ticker.tick().await;
                if state.read().await.is_closing() || *state.read().await == RecorderState::Idle {
                    return;
                }
                if browser.lock().await.is_some() {
                    continue;
                }
                warn!("recorder tab disconnected unexpectedly");
                let was_recording = *state.read().await == RecorderState::Recording;
                if was_recording {
                    *recording_end_time.lock().await = Some(chrono::Utc::now().timestamp_millis());
                    if let Some(task) = capture_task.lock().await.take() {
                        task.abort();
                    }
                    if !stream_mode {
                        for action in actions.lock().await.clone() {
                            events_action.emit(action).await;
                        }
                        for error in errors.lock().await.clone() {
                            events_error.emit(error).await;
                        }
                    }
                    events_stop.emit(()).await;
                }
                if let Some(task) = console_task.lock().await.take() {
                    task.abort();
                }
                events_close.emit(()).await;
                *state.write().await = RecorderState::Idle;
                return;
            }
        });
    }
}

fn describe_remote_object(obj: &runtime::RemoteObject) -> (String, Option<String>) {
    if let Some(value) = &obj.value {
        return (value.to_string().trim_matches('"').to_string(), None);
    }
    if let Some(description) = &obj.description {
        let message = description.lines().next().unwrap_or(description).to_string();
        return (message, Some(description.clone()));
    }
    (obj.class_name.clone().unwrap_or_default(), None)
}
