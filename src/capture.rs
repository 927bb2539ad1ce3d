//! Capture script installation (C2): registers the host callback binding,
//! arranges for the script to run on every future document, and evaluates
//! it immediately for the document that is already loaded.

use crate::error::{Result, VcrError};
use chromiumoxide::Page as CdpPage;
use chromiumoxide::cdp::js_protocol::runtime::{
    AddBindingParams, EventBindingCalled,
};
use chromiumoxide::cdp::browser_protocol::page::AddScriptToEvaluateOnNewDocumentParams;
use chromiumoxide::listeners::EventStream;
use tracing::debug;

const CAPTURE_JS: &str = include_str!("js/capture.js");

/// Name of the CDP binding the capture script calls into (§4.2 "Callback
/// contract" — "a named host function exposed by the driver").
pub const CALLBACK_NAME: &str = "__u4arecCallback";

/// Installs the callback binding and arranges for the capture script to run
/// on this document and every future one, then returns the event stream the
/// caller should drain for `EventBindingCalled` deliveries.
///
/// Tolerates the binding already existing (Open Question (i): the source
/// tolerates `exposeFunction` failing on re-registration). `already_injected`
/// is the recorder's one-shot flag (§4.4 "_isScriptInjected"): the
/// `evaluateOnNewDocument` registration only needs to happen once per tab
/// lifecycle, so it's skipped on subsequent calls — only the immediate
/// evaluation against the currently loaded document repeats.
pub async fn install(page: &CdpPage, already_injected: bool) -> Result<EventStream<EventBindingCalled>> {
    match page.execute(AddBindingParams::new(CALLBACK_NAME)).await {
        Ok(_) => {}
        Err(e) => {
            let message = e.to_string().to_ascii_lowercase();
            if !message.contains("already") {
                return Err(VcrError::Cdp(e.to_string()));
            }
            debug!("capture binding already registered, continuing");
        }
    }

    if !already_injected {
        page.execute(AddScriptToEvaluateOnNewDocumentParams::new(
            CAPTURE_JS.to_string(),
        ))
        .await
        .map_err(|e| VcrError::Cdp(e.to_string()))?;
    }

    // Immediate evaluation for the document already loaded in this tab.
    let _ = page.evaluate(CAPTURE_JS).await;

    page.event_listener::<EventBindingCalled>()
        .await
        .map_err(|e| VcrError::Cdp(e.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn callback_name_matches_script_contract() {
        assert!(CAPTURE_JS.contains("__u4arecCallback"));
        assert_eq!(CALLBACK_NAME, "__u4arecCallback");
    }

    #[test]
    fn capture_script_has_injection_guard() {
        assert!(CAPTURE_JS.contains("window.__u4arec"));
    }
}
