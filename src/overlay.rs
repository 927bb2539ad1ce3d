//! Replay overlay (C3): an in-page visual widget, modeled as a trait so the
//! replayer's core logic depends on a seam rather than a concrete DOM
//! widget. All methods swallow internal failures per §4.3 — visual effects
//! must never break functional replay.

use async_trait::async_trait;
use chromiumoxide::Page as CdpPage;
use tracing::warn;

const OVERLAY_JS: &str = include_str!("js/overlay.js");

#[async_trait]
pub trait ReplayOverlay: Send + Sync {
    async fn inject(&self, page: &CdpPage);
    async fn show_replay_indicator(&self, page: &CdpPage);
    async fn hide_replay_indicator(&self, page: &CdpPage);
    async fn show_click(&self, page: &CdpPage, selector: &str, x: i64, y: i64);
    async fn show_input(&self, page: &CdpPage, selector: &str, value: &str);
    async fn show_key_press(&self, page: &CdpPage, key: &str);
    async fn show_scroll(&self, page: &CdpPage, selector: &str);
    async fn show_browser_resize(&self, page: &CdpPage, from_w: i64, from_h: i64, to_w: i64, to_h: i64);
}

/// Drives the `window.__u4arecOverlay` widget injected by [`OVERLAY_JS`].
pub struct DomOverlay;

impl DomOverlay {
    async fn eval(&self, page: &CdpPage, script: String) {
        if let Err(e) = page.evaluate(script).await {
            warn!("overlay evaluate failed: {}", e);
        }
    }
}

#[async_trait]
impl ReplayOverlay for DomOverlay {
    async fn inject(&self, page: &CdpPage) {
        let script = format!("{OVERLAY_JS}\nwindow.__u4arecOverlay.inject();");
        self.eval(page, script).await;
    }

    async fn show_replay_indicator(&self, page: &CdpPage) {
        self.eval(
            page,
            "window.__u4arecOverlay && window.__u4arecOverlay.showReplayIndicator();".to_string(),
        )
        .await;
    }

    async fn hide_replay_indicator(&self, page: &CdpPage) {
        self.eval(
            page,
            "window.__u4arecOverlay && window.__u4arecOverlay.hideReplayIndicator();".to_string(),
        )
        .await;
    }

    async fn show_click(&self, page: &CdpPage, selector: &str, x: i64, y: i64) {
        let selector_json = serde_json::to_string(selector).unwrap_or_else(|_| "null".to_string());
        let script = format!(
            "window.__u4arecOverlay && window.__u4arecOverlay.showClick({selector_json}, {x}, {y});"
        );
        self.eval(page, script).await;
    }

    async fn show_input(&self, page: &CdpPage, selector: &str, value: &str) {
        let selector_json = serde_json::to_string(selector).unwrap_or_else(|_| "null".to_string());
        let value_json = serde_json::to_string(value).unwrap_or_else(|_| "\"\"".to_string());
        let script = format!(
            "window.__u4arecOverlay && window.__u4arecOverlay.showInput({selector_json}, {value_json});"
        );
        self.eval(page, script).await;
    }

    async fn show_key_press(&self, page: &CdpPage, key: &str) {
        let key_json = serde_json::to_string(key).unwrap_or_else(|_| "\"\"".to_string());
        let script = format!("window.__u4arecOverlay && window.__u4arecOverlay.showKeyPress({key_json});");
        self.eval(page, script).await;
    }

    async fn show_scroll(&self, page: &CdpPage, selector: &str) {
        let selector_json = serde_json::to_string(selector).unwrap_or_else(|_| "null".to_string());
        let script = format!("window.__u4arecOverlay && window.__u4arecOverlay.showScroll({selector_json});");
        self.eval(page, script).await;
    }

    async fn show_browser_resize(&self, page: &CdpPage, from_w: i64, from_h: i64, to_w: i64, to_h: i64) {
        let script = format!(
            "window.__u4arecOverlay && window.__u4arecOverlay.showBrowserResize({from_w}, {from_h}, {to_w}, {to_h});"
        );
        self.eval(page, script).await;
    }
}

/// Used when `visualEffects` is `false`; every call is a no-op.
pub struct NullOverlay;

#[async_trait]
impl ReplayOverlay for NullOverlay {
    async fn inject(&self, _page: &CdpPage) {}
    async fn show_replay_indicator(&self, _page: &CdpPage) {}
    async fn hide_replay_indicator(&self, _page: &CdpPage) {}
    async fn show_click(&self, _page: &CdpPage, _selector: &str, _x: i64, _y: i64) {}
    async fn show_input(&self, _page: &CdpPage, _selector: &str, _value: &str) {}
    async fn show_key_press(&self, _page: &CdpPage, _key: &str) {}
    async fn show_scroll(&self, _page: &CdpPage, _selector: &str) {}
    async fn show_browser_resize(&self, _page: &CdpPage, _from_w: i64, _from_h: i64, _to_w: i64, _to_h: i64) {}
}

pub fn overlay_for(visual_effects: bool) -> Box<dyn ReplayOverlay> {
    if visual_effects {
        Box::new(DomOverlay)
    } else {
        Box::new(NullOverlay)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn visual_effects_flag_selects_implementation() {
        // DomOverlay needs a live page to evaluate against; its script
        // assembly follows the same pattern covered by the executors' and
        // waiter's fake-page tests in `replayer/`.
        let _ = overlay_for(false);
        let _ = overlay_for(true);
    }
}
