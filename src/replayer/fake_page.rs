//! In-process fake standing in for a live page in tests: records every
//! evaluated script and returns canned values, so the busy waiter's polling
//! and the script-based executors' branch selection can be exercised
//! without a browser.

use super::executors::PageEval;
use crate::error::Result;
use async_trait::async_trait;
use serde_json::Value;
use std::collections::VecDeque;
use std::sync::Mutex;

pub(super) struct FakePage {
    calls: Mutex<Vec<String>>,
    responses: Mutex<VecDeque<Value>>,
    default: Option<Value>,
}

impl FakePage {
    pub(super) fn new() -> Self {
        Self {
            calls: Mutex::new(Vec::new()),
            responses: Mutex::new(VecDeque::new()),
            default: None,
        }
    }

    /// Pops one value per call, in order; falls back to `None` once drained.
    pub(super) fn with_responses(responses: Vec<Value>) -> Self {
        Self {
            calls: Mutex::new(Vec::new()),
            responses: Mutex::new(responses.into()),
            default: None,
        }
    }

    /// Returns the same value for every call, ignoring the queue.
    pub(super) fn always(value: Value) -> Self {
        Self {
            calls: Mutex::new(Vec::new()),
            responses: Mutex::new(VecDeque::new()),
            default: Some(value),
        }
    }

    pub(super) fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }

    pub(super) fn last_call(&self) -> String {
        self.calls.lock().unwrap().last().cloned().unwrap_or_default()
    }
}

#[async_trait]
impl PageEval for FakePage {
    async fn evaluate_value(&self, script: &str) -> Result<Option<Value>> {
        self.calls.lock().unwrap().push(script.to_string());
        let mut responses = self.responses.lock().unwrap();
        match responses.pop_front() {
            Some(value) => Ok(Some(value)),
            None => Ok(self.default.clone()),
        }
    }
}
