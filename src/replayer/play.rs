use super::{Replayer, ReplayerState};
use crate::error::VcrError;
use crate::schema::{CaptureError, Envelope, Recording, StatusCode};
use serde::Serialize;
use std::time::Duration;

#[derive(Debug, Serialize)]
pub struct PlayResult {
    #[serde(rename = "consoleErrors")]
    pub console_errors: Vec<CaptureError>,
}

impl Replayer {
    /// `play(recordData)` (§4.5). Valid only in `LAUNCHED`. Iterates actions
    /// with the recorded wall-clock pacing, gated by the busy-indicator
    /// waiter before each one.
    pub async fn play(&self, record_data: Recording) -> Envelope<PlayResult> {
        if !self.state.read().await.can_play() {
            return Envelope::err(StatusCode::NoPageFound, "play is only valid in LAUNCHED");
        }
        if let Err(message) = record_data.validate() {
            return Envelope::err(StatusCode::InvalidData, message);
        }

        *self.state.write().await = ReplayerState::Playing;

        let page = {
            let guard = self.page.lock().await;
            match guard.as_ref() {
                Some(page) => page.clone(),
                None => {
                    *self.state.write().await = ReplayerState::Launched;
                    return Envelope::err(StatusCode::NoPageFound, VcrError::NoPage.to_string());
                }
            }
        };

        self.overlay.inject(&page).await;
        self.overlay.show_replay_indicator(&page).await;

        let result = self.play_loop(&page, &record_data).await;

        self.overlay.hide_replay_indicator(&page).await;
        let console_errors = self.console_errors.lock().await.clone();

        match result {
            Ok(()) => {
                self.events.finish.emit(()).await;
                *self.state.write().await = ReplayerState::Launched;
                Envelope::ok(Some(PlayResult { console_errors }))
            }
            Err(PlayError::Stopped) => {
                *self.state.write().await = ReplayerState::Launched;
                Envelope::err(StatusCode::ReplayStopped, VcrError::ReplayStopped.to_string())
            }
            Err(PlayError::BrowserClosed) => {
                *self.state.write().await = ReplayerState::Idle;
                Envelope::err(StatusCode::BrowserClosed, VcrError::BrowserClosed.to_string())
            }
            Err(PlayError::Fatal(step, message)) => {
                *self.state.write().await = ReplayerState::Launched;
                Envelope::err(
                    StatusCode::ActionFailed,
                    VcrError::ActionFailed { step, message }.to_string(),
                )
            }
            Err(PlayError::BusyTimeout(timeout_ms, selector)) => {
                *self.state.write().await = ReplayerState::Launched;
                Envelope::err(
                    StatusCode::BusyTimeout,
                    VcrError::BusyTimeout { timeout_ms, selector }.to_string(),
                )
            }
        }
    }

    /// Replay loop timing (§4.5): running `timeOffset` carries over-runs
    /// from one action's `executionTime` into the next action's wait.
    async fn play_loop(&self, page: &chromiumoxide::Page, record_data: &Recording) -> std::result::Result<(), PlayError> {
        let mut time_offset: i64 = 0;
        let actions = &record_data.actions;

        for (index, action) in actions.iter().enumerate() {
            let state = *self.state.read().await;
            if state == ReplayerState::Closing {
                return Err(PlayError::BrowserClosed);
            }
            if state != ReplayerState::Playing {
                return Err(PlayError::Stopped);
            }

            let selectors = self.options.busy_indicator_selectors();
            if let Err(e) = crate::replayer::waiter::wait_for_idle(page, &selectors, self.options.busy_timeout()).await {
                return Err(match e {
                    VcrError::BusyTimeout { timeout_ms, selector } => PlayError::BusyTimeout(timeout_ms, selector),
                    other => classify(index, other),
                });
            }

            let execution_start = tokio::time::Instant::now();
            if let Err(e) = self.execute_action(page, action).await {
                return Err(classify(index, e));
            }
            self.events.action.emit(action.clone()).await;
            let execution_time = execution_start.elapsed().as_millis() as i64;

            if index + 1 < actions.len() {
                let delay = actions[index + 1].timestamp() - action.timestamp();
                time_offset += execution_time;
                let wait_time = (delay - time_offset).max(0);
                time_offset = (time_offset - delay).max(0);
                tokio::time::sleep(Duration::from_millis(wait_time as u64)).await;
            } else {
                let final_delay = record_data.recording_end_time - action.timestamp();
                time_offset += execution_time;
                let wait_time = (final_delay - time_offset).max(0);
                tokio::time::sleep(Duration::from_millis(wait_time as u64)).await;
            }
        }

        Ok(())
    }

    /// `stop()` (§4.5). Valid only in `PLAYING`; the loop observes the state
    /// change at its next iteration boundary.
    pub async fn stop(&self) -> Envelope<()> {
        if !self.state.read().await.can_stop() {
            return Envelope::err(StatusCode::NotPlaying, VcrError::NotPlaying.to_string());
        }
        *self.state.write().await = ReplayerState::Launched;
        Envelope::ok(None)
    }

    /// `close()` (§4.5). Mirrors the Recorder's.
    pub async fn close(&self) -> Envelope<()> {
        if !self.state.read().await.can_close() {
            return Envelope::ok(None);
        }
        *self.state.write().await = ReplayerState::Closing;

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
        *self.state.write().await = ReplayerState::Idle;
        Envelope::ok(None)
    }
}

enum PlayError {
    Stopped,
    BrowserClosed,
    BusyTimeout(u64, String),
    Fatal(usize, String),
}

/// Error classification (§4.5 "Error classification"): target-closed/missing
/// page signals reset to `BROWSER_CLOSED`; anything else is `ACTION_FAILED`
/// with the step number.
fn classify(step: usize, err: VcrError) -> PlayError {
    if err.looks_like_target_closed() || matches!(err, VcrError::NoPage | VcrError::BrowserClosed) {
        PlayError::BrowserClosed
    } else {
        PlayError::Fatal(step, err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::Action;

    #[test]
    fn classify_target_closed_as_browser_closed() {
        let err = VcrError::Cdp("Target closed.".to_string());
        assert!(matches!(classify(2, err), PlayError::BrowserClosed));
    }

    #[test]
    fn classify_other_errors_as_fatal_with_step() {
        let err = VcrError::Cdp("evaluation threw".to_string());
        match classify(3, err) {
            PlayError::Fatal(step, message) => {
                assert_eq!(step, 3);
                assert!(message.contains("evaluation threw"));
            }
            _ => panic!("expected Fatal"),
        }
    }

    #[test]
    fn timing_offset_carries_overrun_into_next_wait() {
        let mut time_offset: i64 = 0;
        let execution_time = 120i64;
        let delay = 100i64;
        time_offset += execution_time;
        let wait_time = (delay - time_offset).max(0);
        time_offset = (time_offset - delay).max(0);
        assert_eq!(wait_time, 0);
        assert_eq!(time_offset, 20);
        let _ = Action::Click {
            timestamp: 0,
            selector: "#a".to_string(),
            x: 1,
            y: 1,
            checked: None,
        };
    }
}
