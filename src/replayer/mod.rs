//! Replayer state machine (C5, §4.5): consumes an action stream and
//! reconstructs the recorded session at the original wall-clock pacing.

mod executors;
#[cfg(test)]
mod fake_page;
mod launch;
mod play;
mod state;
mod waiter;

pub use play::PlayResult;
pub use state::ReplayerState;

use crate::config::ReplayerOptions;
use crate::events::EventEmitter;
use crate::overlay::{self, ReplayOverlay};
use crate::schema::{Action, CaptureError};
use chromiumoxide::Browser;
use chromiumoxide::Page as CdpPage;
use std::sync::Arc;
use tokio::sync::{Mutex, RwLock};
use tokio::task::JoinHandle;

struct ReplayerEvents {
    action: EventEmitter<Action>,
    console_error: EventEmitter<CaptureError>,
    finish: EventEmitter<()>,
    close: EventEmitter<()>,
}

impl Default for ReplayerEvents {
    fn default() -> Self {
        Self {
            action: EventEmitter::new(),
            console_error: EventEmitter::new(),
            finish: EventEmitter::new(),
            close: EventEmitter::new(),
        }
    }
}

/// Drives a single headful tab through `IDLE → LAUNCHING → LAUNCHED ⇄
/// PLAYING → CLOSING → IDLE`.
pub struct Replayer {
    options: ReplayerOptions,
    state: Arc<RwLock<ReplayerState>>,
    browser: Arc<Mutex<Option<Browser>>>,
    page: Arc<Mutex<Option<CdpPage>>>,
    handler_task: Arc<Mutex<Option<JoinHandle<()>>>>,
    console_task: Arc<Mutex<Option<JoinHandle<()>>>>,
    console_errors: Arc<Mutex<Vec<CaptureError>>>,
    overlay: Box<dyn ReplayOverlay>,
    events: ReplayerEvents,
}

impl Replayer {
    pub fn new(options: ReplayerOptions) -> crate::error::Result<Self> {
        options.validate()?;
        let overlay = overlay::overlay_for(options.visual_effects);
        Ok(Self {
            options,
            state: Arc::new(RwLock::new(ReplayerState::Idle)),
            browser: Arc::new(Mutex::new(None)),
            page: Arc::new(Mutex::new(None)),
            handler_task: Arc::new(Mutex::new(None)),
            console_task: Arc::new(Mutex::new(None)),
            console_errors: Arc::new(Mutex::new(Vec::new())),
            overlay,
            events: ReplayerEvents::default(),
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

    pub async fn on_finish<F>(&self, callback: F)
    where
        F: Fn(&()) + Send + Sync + 'static,
    {
        self.events.finish.subscribe(callback).await;
    }

    pub async fn on_close<F>(&self, callback: F)
    where
        F: Fn(&()) + Send + Sync + 'static,
    {
        self.events.close.subscribe(callback).await;
    }

    pub async fn state(&self) -> ReplayerState {
        *self.state.read().await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::LaunchOptions;

    fn options() -> ReplayerOptions {
        ReplayerOptions {
            url: "https://example.com".to_string(),
            r#type: "web".to_string(),
            launch_options: LaunchOptions {
                executable_path: Some("/usr/bin/chromium".to_string()),
                headless: true,
                args: vec![],
            },
            goto_options: Default::default(),
            busy_indicator_selector: None,
            busy_timeout: 300_000,
            visual_effects: true,
        }
    }

    #[tokio::test]
    async fn new_replayer_starts_idle() {
        let replayer = Replayer::new(options()).unwrap();
        assert_eq!(replayer.state().await, ReplayerState::Idle);
    }
}
