//! Busy-indicator waiter (C6, §4.6): poll-based synchronization barrier
//! between replayed actions.

use super::executors::PageEval;
use crate::error::{Result, VcrError};
use std::time::Duration;

const POLL_INTERVAL: Duration = Duration::from_millis(100);

/// Waits until none of `selectors` resolves to a visible element, or raises
/// `BusyTimeout` after `timeout`. A no-op if `selectors` is empty. Aborts
/// early if the page is closed during polling.
pub async fn wait_for_idle(page: &dyn PageEval, selectors: &[String], timeout: Duration) -> Result<()> {
    if selectors.is_empty() {
        return Ok(());
    }

    let script = busy_check_script(selectors);
    let deadline = tokio::time::Instant::now() + timeout;

    loop {
        let busy = match page.evaluate_value(&script).await {
            Ok(value) => value.and_then(|v| v.as_bool()).unwrap_or(false),
            Err(e) => {
                let message = e.to_string().to_ascii_lowercase();
                if message.contains("target closed") || message.contains("session closed") {
                    return Err(VcrError::BrowserClosed);
                }
                false
            }
        };
        if !busy {
            return Ok(());
        }
        if tokio::time::Instant::now() >= deadline {
            return Err(VcrError::BusyTimeout {
                timeout_ms: timeout.as_millis() as u64,
                selector: selectors.join(","),
            });
        }
        tokio::time::sleep(POLL_INTERVAL).await;
    }
}

fn busy_check_script(selectors: &[String]) -> String {
    let selector_json = serde_json::to_string(&selectors.join(",")).unwrap_or_else(|_| "\"\"".to_string());
    format!(
        "(() => {{
            const list = {selector_json}.split(',').map(s => s.trim()).filter(Boolean);
            for (const sel of list) {{
                for (const el of document.querySelectorAll(sel)) {{
                    const style = window.getComputedStyle(el);
                    if (style.display === 'none' || style.visibility === 'hidden' || el.hidden) continue;
                    return true;
                }}
            }}
            return false;
        }})()"
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::replayer::fake_page::FakePage;
    use serde_json::json;

    #[test]
    fn busy_check_script_embeds_selector_list() {
        let script = busy_check_script(&["#spinner".to_string(), ".loading".to_string()]);
        assert!(script.contains("#spinner,.loading"));
    }

    #[tokio::test]
    async fn empty_selector_list_never_evaluates() {
        let fake = FakePage::always(json!(true));
        wait_for_idle(&fake, &[], Duration::from_millis(10)).await.unwrap();
        assert!(fake.calls().is_empty());
    }

    #[tokio::test]
    async fn polls_until_indicator_reports_idle() {
        let fake = FakePage::with_responses(vec![json!(true), json!(true), json!(false)]);
        wait_for_idle(&fake, &["#spinner".to_string()], Duration::from_secs(5))
            .await
            .unwrap();
        assert_eq!(fake.calls().len(), 3);
    }

    #[tokio::test]
    async fn times_out_while_indicator_stays_visible() {
        let fake = FakePage::always(json!(true));
        let result = wait_for_idle(&fake, &["#spinner".to_string()], Duration::from_millis(250)).await;
        assert!(matches!(result, Err(VcrError::BusyTimeout { .. })));
    }
}
