//! Action executors (C7, §4.7): per-action primitives that drive the page.

use super::Replayer;
use crate::error::{Result, VcrError};
use crate::schema::Action;
use async_trait::async_trait;
use chromiumoxide::Page as CdpPage;
use chromiumoxide::cdp::browser_protocol::input::{
    DispatchKeyEventParams, DispatchKeyEventType, DispatchMouseEventParams, DispatchMouseEventType,
    MouseButton,
};
use serde_json::Value;
use std::time::Duration;

const SELECTOR_WAIT: Duration = Duration::from_secs(5);
const TEXT_LIKE_INPUT_TYPES: &[&str] = &["text", "search", "url", "tel", "password"];

/// Seam between the script-building helpers below and a live page: lets
/// `wait_for_idle` (waiter.rs) and the script-based executors run against an
/// in-process fake in tests, the way [`crate::overlay::ReplayOverlay`] seams
/// the overlay off a live page.
#[async_trait]
pub(super) trait PageEval: Send + Sync {
    async fn evaluate_value(&self, script: &str) -> Result<Option<Value>>;
}

#[async_trait]
impl PageEval for CdpPage {
    async fn evaluate_value(&self, script: &str) -> Result<Option<Value>> {
        self.evaluate(script)
            .await
            .map(|r| r.value().cloned())
            .map_err(|e| VcrError::Cdp(e.to_string()))
    }
}

impl Replayer {
    /// Dispatches one recorded action, firing its overlay hint first.
    pub(super) async fn execute_action(&self, page: &CdpPage, action: &Action) -> Result<()> {
        match action {
            Action::Click { selector, x, y, checked, .. } => {
                self.overlay.show_click(page, selector, *x, *y).await;
                execute_click(page, selector, *x, *y, *checked).await
            }
            Action::Input { selector, value, selection_start, selection_end, .. } => {
                self.overlay.show_input(page, selector, value).await;
                execute_input(page, selector, value, *selection_start, *selection_end).await
            }
            Action::Change { selector, checked, value, .. } => {
                self.overlay
                    .show_input(page, selector, value.as_deref().unwrap_or_default())
                    .await;
                execute_change(page, selector, *checked, value.as_deref()).await
            }
            Action::Keydown { key, .. } => {
                self.overlay.show_key_press(page, key).await;
                execute_keydown(page, key).await
            }
            Action::Scroll { selector, start_scroll_x, start_scroll_y, scroll_x, scroll_y, duration, .. } => {
                self.overlay.show_scroll(page, selector).await;
                execute_scroll(page, selector, *start_scroll_x, *start_scroll_y, *scroll_x, *scroll_y, *duration).await
            }
            Action::BrowserResize { from_width, from_height, to_width, to_height, .. } => {
                self.overlay
                    .show_browser_resize(page, *from_width, *from_height, *to_width, *to_height)
                    .await;
                let browser_guard = self.browser.lock().await;
                let browser = browser_guard.as_ref().ok_or(VcrError::BrowserClosed)?;
                execute_browser_resize(browser, page, *to_width, *to_height).await
            }
        }
    }
}

async fn wait_for_selector(page: &dyn PageEval, selector: &str) -> Result<()> {
    let script = format!(
        "(() => document.querySelector({}) !== null)()",
        serde_json::to_string(selector).unwrap_or_else(|_| "\"\"".to_string())
    );
    let deadline = tokio::time::Instant::now() + SELECTOR_WAIT;
    loop {
        let present = page
            .evaluate_value(&script)
            .await
            .ok()
            .flatten()
            .and_then(|v| v.as_bool())
            .unwrap_or(false);
        if present {
            return Ok(());
        }
        if tokio::time::Instant::now() >= deadline {
            return Err(VcrError::ActionFailed {
                step: 0,
                message: format!("timed out waiting for selector {selector}"),
            });
        }
        tokio::time::sleep(Duration::from_millis(50)).await;
    }
}

/// Uses `dispatchEvent` rather than the native `.click()` — the latter would
/// run the checkbox's own activation behavior and flip `.checked` right back
/// (§4.7: replay must end with the recorded `checked` value).
async fn eval_checked(page: &dyn PageEval, selector: &str, checked: bool) -> Result<()> {
    let script = format!(
        "(() => {{
            const el = document.querySelector({selector_json});
            if (!el) return false;
            el.checked = {checked};
            el.dispatchEvent(new Event('change', {{ bubbles: true }}));
            el.dispatchEvent(new Event('click', {{ bubbles: true }}));
            return true;
        }})()",
        selector_json = serde_json::to_string(selector).unwrap_or_else(|_| "\"\"".to_string()),
        checked = checked,
    );
    page.evaluate_value(&script).await?;
    Ok(())
}

/// `click` (§4.7): `checked` takes priority; otherwise coordinates, which
/// `schema.rs` models as mandatory on `Action::Click`, so the selector-only
/// path is unreachable once `checked` is absent.
async fn execute_click(page: &CdpPage, selector: &str, x: i64, y: i64, checked: Option<bool>) -> Result<()> {
    if let Some(checked) = checked {
        return eval_checked(page, selector, checked).await;
    }
    synthesize_mouse_click(page, x as f64, y as f64).await
}

async fn synthesize_mouse_click(page: &CdpPage, x: f64, y: f64) -> Result<()> {
    let move_params = DispatchMouseEventParams::builder()
        .r#type(DispatchMouseEventType::MouseMoved)
        .x(x)
        .y(y)
        .build()
        .map_err(|e| VcrError::Cdp(e))?;
    page.execute(move_params).await.map_err(|e| VcrError::Cdp(e.to_string()))?;

    let down_params = DispatchMouseEventParams::builder()
        .r#type(DispatchMouseEventType::MousePressed)
        .x(x)
        .y(y)
        .button(MouseButton::Left)
        .click_count(1)
        .build()
        .map_err(|e| VcrError::Cdp(e))?;
    page.execute(down_params).await.map_err(|e| VcrError::Cdp(e.to_string()))?;

    tokio::time::sleep(Duration::from_millis(40)).await;

    let up_params = DispatchMouseEventParams::builder()
        .r#type(DispatchMouseEventType::MouseReleased)
        .x(x)
        .y(y)
        .button(MouseButton::Left)
        .click_count(1)
        .build()
        .map_err(|e| VcrError::Cdp(e))?;
    page.execute(up_params).await.map_err(|e| VcrError::Cdp(e.to_string()))?;
    Ok(())
}

/// `input` (§4.7): direct property set, not keystroke synthesis, so replay is
/// idempotent against the recorded final value.
async fn execute_input(
    page: &dyn PageEval,
    selector: &str,
    value: &str,
    selection_start: Option<i64>,
    selection_end: Option<i64>,
) -> Result<()> {
    wait_for_selector(page, selector).await?;
    let selector_json = serde_json::to_string(selector).unwrap_or_else(|_| "\"\"".to_string());
    let value_json = serde_json::to_string(value).unwrap_or_else(|_| "\"\"".to_string());
    let selection_script = match (selection_start, selection_end) {
        (Some(start), Some(end)) => {
            let type_pattern = TEXT_LIKE_INPUT_TYPES.join("|");
            format!(
                "if (typeof el.setSelectionRange === 'function' && new RegExp('^({type_pattern})$').test(el.type || 'text')) {{ el.setSelectionRange({start}, {end}); }}"
            )
        }
        _ => String::new(),
    };
    let script = format!(
        "(() => {{
            const el = document.querySelector({selector_json});
            if (!el) return false;
            el.value = {value_json};
            el.dispatchEvent(new Event('input', {{ bubbles: true }}));
            {selection_script}
            return true;
        }})()"
    );
    page.evaluate_value(&script).await?;
    Ok(())
}

/// `change` (§4.7): checked toggles dispatch `change`; `<select>` uses the
/// native value-set path; everything else sets `.value` and dispatches
/// `change`.
async fn execute_change(page: &dyn PageEval, selector: &str, checked: Option<bool>, value: Option<&str>) -> Result<()> {
    wait_for_selector(page, selector).await?;
    if let Some(checked) = checked {
        let script = format!(
            "(() => {{
                const el = document.querySelector({selector_json});
                if (!el) return false;
                el.checked = {checked};
                el.dispatchEvent(new Event('change', {{ bubbles: true }}));
                return true;
            }})()",
            selector_json = serde_json::to_string(selector).unwrap_or_else(|_| "\"\"".to_string()),
        );
        page.evaluate_value(&script).await?;
        return Ok(());
    }
    let value = value.unwrap_or_default();
    let script = format!(
        "(() => {{
            const el = document.querySelector({selector_json});
            if (!el) return false;
            el.value = {value_json};
            el.dispatchEvent(new Event('change', {{ bubbles: true }}));
            return true;
        }})()",
        selector_json = serde_json::to_string(selector).unwrap_or_else(|_| "\"\"".to_string()),
        value_json = serde_json::to_string(value).unwrap_or_else(|_| "\"\"".to_string()),
    );
    page.evaluate_value(&script).await?;
    Ok(())
}

/// `keydown` (§4.7): KeyDown, optional Char for printable keys, then KeyUp.
/// Key-to-code/virtual-key-code mapping mirrors the teacher's keyboard
/// primitive in `page/input.rs`.
async fn execute_keydown(page: &CdpPage, key: &str) -> Result<()> {
    let (code, text, virtual_key_code) = match key {
        "Enter" => ("Enter", Some("\r"), Some(13)),
        "Tab" => ("Tab", Some("\t"), Some(9)),
        "Escape" => ("Escape", None, Some(27)),
        "Backspace" => ("Backspace", None, Some(8)),
        "Delete" => ("Delete", None, Some(46)),
        "ArrowUp" => ("ArrowUp", None, Some(38)),
        "ArrowDown" => ("ArrowDown", None, Some(40)),
        "ArrowLeft" => ("ArrowLeft", None, Some(37)),
        "ArrowRight" => ("ArrowRight", None, Some(39)),
        "Home" => ("Home", None, Some(36)),
        "End" => ("End", None, Some(35)),
        "PageUp" => ("PageUp", None, Some(33)),
        "PageDown" => ("PageDown", None, Some(34)),
        "Space" => ("Space", Some(" "), Some(32)),
        "Insert" => ("Insert", None, Some(45)),
        other => (other, None, None),
    };

    let mut down_builder = DispatchKeyEventParams::builder()
        .r#type(DispatchKeyEventType::KeyDown)
        .key(key.to_string())
        .code(code.to_string());
    if let Some(vk) = virtual_key_code {
        down_builder = down_builder.windows_virtual_key_code(vk).native_virtual_key_code(vk);
    }
    let down_params = down_builder.build().map_err(|e| VcrError::Cdp(e))?;
    page.execute(down_params).await.map_err(|e| VcrError::Cdp(e.to_string()))?;

    if let Some(text) = text {
        let char_params = DispatchKeyEventParams::builder()
            .r#type(DispatchKeyEventType::Char)
            .key(key.to_string())
            .code(code.to_string())
            .text(text.to_string())
            .build()
            .map_err(|e| VcrError::Cdp(e))?;
        page.execute(char_params).await.map_err(|e| VcrError::Cdp(e.to_string()))?;
    }

    let mut up_builder = DispatchKeyEventParams::builder()
        .r#type(DispatchKeyEventType::KeyUp)
        .key(key.to_string())
        .code(code.to_string());
    if let Some(vk) = virtual_key_code {
        up_builder = up_builder.windows_virtual_key_code(vk).native_virtual_key_code(vk);
    }
    let up_params = up_builder.build().map_err(|e| VcrError::Cdp(e))?;
    page.execute(up_params).await.map_err(|e| VcrError::Cdp(e.to_string()))?;
    Ok(())
}

/// `scroll` (§4.7): cubic-ease-out animation in-page via `requestAnimationFrame`.
async fn execute_scroll(
    page: &dyn PageEval,
    selector: &str,
    start_x: f64,
    start_y: f64,
    end_x: f64,
    end_y: f64,
    duration_ms: i64,
) -> Result<()> {
    let target_script = if selector == "window" {
        "window".to_string()
    } else {
        format!(
            "document.querySelector({})",
            serde_json::to_string(selector).unwrap_or_else(|_| "\"\"".to_string())
        )
    };
    let script = format!(
        "(() => {{
            const target = {target_script};
            if (!target) return;
            const startX = {start_x}, startY = {start_y}, endX = {end_x}, endY = {end_y};
            const duration = Math.max({duration_ms}, 0);
            const startTime = performance.now();
            const setPos = (x, y) => {{
                if (target === window) window.scrollTo(x, y);
                else {{ target.scrollLeft = x; target.scrollTop = y; }}
            }};
            if (duration === 0) {{ setPos(endX, endY); return; }}
            const easeOutCubic = t => 1 - Math.pow(1 - t, 3);
            const step = (now) => {{
                const t = Math.min((now - startTime) / duration, 1);
                const eased = easeOutCubic(t);
                setPos(startX + (endX - startX) * eased, startY + (endY - startY) * eased);
                if (t < 1) requestAnimationFrame(step);
            }};
            requestAnimationFrame(step);
        }})()"
    );
    page.evaluate_value(&script).await?;
    tokio::time::sleep(Duration::from_millis(duration_ms.max(0) as u64)).await;
    Ok(())
}

/// `browser_resize` (§4.7): raw CDP `Browser.getWindowForTarget` then
/// `Browser.setWindowBounds`, mirrored from the teacher's
/// `execute_cdp_browser` raw-command pattern (no typed chromiumoxide wrapper
/// exists for either call).
async fn execute_browser_resize(
    browser: &chromiumoxide::Browser,
    page: &CdpPage,
    to_width: i64,
    to_height: i64,
) -> Result<()> {
    let target_id = page.target_id().inner().clone();

    #[derive(serde::Serialize)]
    struct GetWindowForTarget {
        #[serde(rename = "targetId")]
        target_id: String,
    }
    impl chromiumoxide_types::Method for GetWindowForTarget {
        fn identifier(&self) -> chromiumoxide_types::MethodId {
            "Browser.getWindowForTarget".into()
        }
    }
    impl chromiumoxide_types::Command for GetWindowForTarget {
        type Response = Value;
    }

    let window_info = browser
        .execute(GetWindowForTarget { target_id })
        .await
        .map_err(|e| VcrError::Cdp(e.to_string()))?
        .result;
    let window_id = window_info
        .get("windowId")
        .cloned()
        .ok_or_else(|| VcrError::Cdp("Browser.getWindowForTarget returned no windowId".to_string()))?;

    #[derive(serde::Serialize)]
    struct SetWindowBounds {
        #[serde(rename = "windowId")]
        window_id: Value,
        bounds: Value,
    }
    impl chromiumoxide_types::Method for SetWindowBounds {
        fn identifier(&self) -> chromiumoxide_types::MethodId {
            "Browser.setWindowBounds".into()
        }
    }
    impl chromiumoxide_types::Command for SetWindowBounds {
        type Response = Value;
    }

    browser
        .execute(SetWindowBounds {
            window_id,
            bounds: serde_json::json!({ "width": to_width, "height": to_height }),
        })
        .await
        .map_err(|e| VcrError::Cdp(e.to_string()))?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::replayer::fake_page::FakePage;
    use serde_json::json;

    #[test]
    fn text_like_input_types_match_spec_list() {
        assert_eq!(TEXT_LIKE_INPUT_TYPES, &["text", "search", "url", "tel", "password"]);
    }

    #[test]
    fn keydown_mapping_preserves_enter_carriage_return() {
        let (code, text, vk) = match "Enter" {
            "Enter" => ("Enter", Some("\r"), Some(13)),
            other => (other, None, None),
        };
        assert_eq!(code, "Enter");
        assert_eq!(text, Some("\r"));
        assert_eq!(vk, Some(13));
    }

    #[tokio::test]
    async fn eval_checked_dispatches_dom_event_not_native_click() {
        let fake = FakePage::new();
        eval_checked(&fake, "#agree", false).await.unwrap();
        let script = fake.last_call();
        assert!(script.contains("dispatchEvent(new Event('click'"));
        assert!(!script.contains("el.click()"));
    }

    #[tokio::test]
    async fn execute_input_applies_selection_range_for_text_like_types() {
        let fake = FakePage::with_responses(vec![json!(true)]);
        execute_input(&fake, "#name", "hello", Some(1), Some(3)).await.unwrap();
        let script = fake.last_call();
        assert!(script.contains("setSelectionRange(1, 3)"));
    }

    #[tokio::test]
    async fn execute_input_skips_selection_range_without_recorded_bounds() {
        let fake = FakePage::with_responses(vec![json!(true)]);
        execute_input(&fake, "#name", "hello", None, None).await.unwrap();
        let script = fake.last_call();
        assert!(!script.contains("setSelectionRange"));
    }

    #[tokio::test]
    async fn execute_change_sets_checked_when_present() {
        let fake = FakePage::with_responses(vec![json!(true)]);
        execute_change(&fake, "#agree", Some(true), None).await.unwrap();
        let script = fake.last_call();
        assert!(script.contains("el.checked = true"));
    }

    #[tokio::test]
    async fn execute_change_sets_value_when_checked_absent() {
        let fake = FakePage::with_responses(vec![json!(true)]);
        execute_change(&fake, "#color", None, Some("blue")).await.unwrap();
        let script = fake.last_call();
        assert!(script.contains("el.value ="));
        assert!(!script.contains("el.checked"));
    }

    #[tokio::test]
    async fn wait_for_selector_returns_as_soon_as_present() {
        let fake = FakePage::always(json!(true));
        wait_for_selector(&fake, "#ready").await.unwrap();
        assert_eq!(fake.calls().len(), 1);
    }
}
