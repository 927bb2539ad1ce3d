use super::{Replayer, ReplayerState};
use crate::error::{Result, VcrError};
use crate::config::CaptureScreenOptions;
use crate::schema::{Envelope, StatusCode};
use chromiumoxide::Browser;
use chromiumoxide::browser::BrowserConfig;
use chromiumoxide::cdp::browser_protocol::page::{self as cdp_page, CaptureScreenshotFormat, CaptureScreenshotParams};
use chromiumoxide::cdp::js_protocol::runtime;
use base64::Engine as _;
use futures::StreamExt;
use tracing::{debug, info, warn};

impl Replayer {
    /// `launchPage()` (§4.5): mirrors the Recorder's, plus re-injecting the
    /// overlay (and re-showing the indicator if `PLAYING`) on every
    /// main-frame navigation.
    pub async fn launch_page(&self) -> Envelope<()> {
        if !self.state.read().await.can_launch() {
            return Envelope::err(StatusCode::LaunchFailed, "launchPage is only valid in IDLE");
        }
        *self.state.write().await = ReplayerState::Launching;

        match self.launch_page_inner().await {
            Ok(()) => {
                *self.state.write().await = ReplayerState::Launched;
                Envelope::ok(None)
            }
            Err(e) => {
                let aborted = self.state.read().await.is_closing();
                *self.state.write().await = ReplayerState::Idle;
                if aborted {
                    Envelope::err(StatusCode::BrowserClosed, VcrError::BrowserClosed.to_string())
                } else {
                    Envelope::err(StatusCode::LaunchFailed, e.to_string())
                }
            }
        }
    }

    async fn check_not_closing(&self) -> Result<()> {
        if self.state.read().await.is_closing() {
            return Err(VcrError::BrowserClosed);
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
                    debug!("replayer handler event error: {:?}", result.err());
                }
            }
            warn!("[replayer] cdp event handler ended");
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

        page.execute(runtime::EnableParams::default())
            .await
            .map_err(|e| VcrError::Cdp(e.to_string()))?;
        self.install_console_listener(&page).await;
        self.install_navigation_listener(&page).await;
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

        self.overlay.inject(&page).await;

        *self.page.lock().await = Some(page);
        info!("replayer launched and navigated to {}", self.options.url);
        Ok(())
    }

    async fn install_console_listener(&self, page: &chromiumoxide::Page) {
        let Ok(mut stream) = page.event_listener::<runtime::EventConsoleApiCalled>().await else {
            return;
        };
        let errors = self.console_errors.clone();
        let events_error = self.events.console_error.clone();
        let task = tokio::spawn(async move {
            while let Some(event) = stream.next().await {
                if !matches!(event.r#type, runtime::ConsoleApiCalledType::Error) {
                    continue;
                }
                for arg in &event.args {
                    let message = arg
                        .value
                        .as_ref()
                        .map(|v| v.to_string())
                        .or_else(|| arg.description.clone())
                        .unwrap_or_default();
                    let error = crate::schema::CaptureError {
                        kind: crate::schema::ErrorKind::BrowserConsoleError,
                        message,
                        timestamp: chrono::Utc::now().timestamp_millis(),
                        stack: None,
                        url: None,
                        method: None,
                    };
                    errors.lock().await.push(error.clone());
                    events_error.emit(error).await;
                }
            }
        });
        *self.console_task.lock().await = Some(task);
    }

    /// Re-injects the overlay on every main-frame navigation, and re-shows
    /// the indicator if currently `PLAYING` (§4.5 `launchPage`).
    async fn install_navigation_listener(&self, page: &chromiumoxide::Page) {
        let Ok(mut stream) = page.event_listener::<cdp_page::EventFrameNavigated>().await else {
            return;
        };
        let page_clone = page.clone();
        let state = self.state.clone();
        // DomOverlay/NullOverlay are both zero-sized; re-derive the active
        // one from the stored visual_effects flag rather than trying to
        // clone `Box<dyn ReplayOverlay>`.
        let visual_effects = self.options.visual_effects;
        tokio::spawn(async move {
            let overlay = crate::overlay::overlay_for(visual_effects);
            while let Some(event) = stream.next().await {
                if event.frame.parent_id.is_some() {
                    continue;
                }
                overlay.inject(&page_clone).await;
                if *state.read().await == ReplayerState::Playing {
                    overlay.show_replay_indicator(&page_clone).await;
                }
            }
        });
    }

    /// `reloadPage()` (§4.5): reload the current page, re-inject overlay.
    pub async fn reload_page(&self) -> Envelope<()> {
        let page_guard = self.page.lock().await;
        let Some(page) = page_guard.as_ref() else {
            return Envelope::err(StatusCode::NoPageFound, VcrError::NoPage.to_string());
        };
        if let Err(e) = page.reload().await {
            return Envelope::err(StatusCode::ActionFailed, e.to_string());
        }
        self.overlay.inject(page).await;
        Envelope::ok(None)
    }

    /// `captureScreen(options?)` (§4.5): PNG, non-fullpage by default;
    /// writes to disk and returns the path if `options.path` is set.
    pub async fn capture_screen(&self, options: CaptureScreenOptions) -> Envelope<Vec<u8>> {
        let page_guard = self.page.lock().await;
        let Some(page) = page_guard.as_ref() else {
            return Envelope::err(StatusCode::NoPageFound, VcrError::NoPage.to_string());
        };

        let params = CaptureScreenshotParams::builder()
            .format(CaptureScreenshotFormat::Png)
            .build();
        let response = match page.execute(params).await {
            Ok(r) => r,
            Err(e) => return Envelope::err(StatusCode::ActionFailed, e.to_string()),
        };
        let data_b64: &str = response.data.as_ref();
        let bytes = match base64::engine::general_purpose::STANDARD.decode(data_b64) {
            Ok(b) => b,
            Err(e) => return Envelope::err(StatusCode::ActionFailed, e.to_string()),
        };

        if let Some(path) = options.path {
            return match write_screenshot(&path, &bytes).await {
                Ok(()) => Envelope::ok(Some(path.into_bytes())),
                Err(e) => Envelope::err(StatusCode::ActionFailed, e.to_string()),
            };
        }

        Envelope::ok(Some(bytes))
    }
}

async fn write_screenshot(path: &str, bytes: &[u8]) -> std::io::Result<()> {
    tokio::fs::write(path, bytes).await
}

#[cfg(test)]
mod tests {
    use super::write_screenshot;

    #[tokio::test]
    async fn write_screenshot_writes_bytes_to_disk() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("shot.png");
        write_screenshot(path.to_str().unwrap(), b"fake-png-bytes").await.unwrap();
        assert_eq!(tokio::fs::read(&path).await.unwrap(), b"fake-png-bytes");
    }
}
