//! Option sets accepted by [`crate::Recorder`] and [`crate::Replayer`] (§6).

use crate::error::{Result, VcrError};
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Forwarded to the driver when launching a browser. `executable_path` is
/// required; everything else is optional pass-through.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct LaunchOptions {
    #[serde(rename = "executablePath")]
    pub executable_path: Option<String>,
    #[serde(default)]
    pub headless: bool,
    #[serde(default)]
    pub args: Vec<String>,
}

/// Forwarded to navigation. Defaults mirror `{waitUntil:"load", timeout:30000}`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GotoOptions {
    #[serde(rename = "waitUntil", default = "default_wait_until")]
    pub wait_until: String,
    #[serde(default = "default_goto_timeout_ms")]
    pub timeout: u64,
}

fn default_wait_until() -> String {
    "load".to_string()
}

fn default_goto_timeout_ms() -> u64 {
    30_000
}

impl Default for GotoOptions {
    fn default() -> Self {
        Self {
            wait_until: default_wait_until(),
            timeout: default_goto_timeout_ms(),
        }
    }
}

impl GotoOptions {
    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout)
    }
}

fn default_type() -> String {
    "web".to_string()
}

/// Options accepted by [`crate::Recorder::new`].
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RecorderOptions {
    pub url: String,
    #[serde(default = "default_type")]
    pub r#type: String,
    #[serde(default = "default_true")]
    pub stream: bool,
    pub launch_options: LaunchOptions,
    #[serde(default)]
    pub goto_options: GotoOptions,
}

fn default_true() -> bool {
    true
}

impl RecorderOptions {
    pub fn validate(&self) -> Result<()> {
        if self.url.trim().is_empty() {
            return Err(VcrError::MissingOption("url"));
        }
        match &self.launch_options.executable_path {
            Some(path) if !path.trim().is_empty() => {}
            _ => return Err(VcrError::MissingOption("launchOptions.executablePath")),
        }
        Ok(())
    }
}

fn default_busy_timeout_ms() -> u64 {
    300_000
}

/// Options accepted by [`crate::Replayer::new`].
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReplayerOptions {
    pub url: String,
    #[serde(default = "default_type")]
    pub r#type: String,
    pub launch_options: LaunchOptions,
    #[serde(default)]
    pub goto_options: GotoOptions,
    #[serde(default)]
    pub busy_indicator_selector: Option<String>,
    #[serde(default = "default_busy_timeout_ms")]
    pub busy_timeout: u64,
    #[serde(default = "default_true")]
    pub visual_effects: bool,
}

impl ReplayerOptions {
    pub fn validate(&self) -> Result<()> {
        if self.url.trim().is_empty() {
            return Err(VcrError::MissingOption("url"));
        }
        match &self.launch_options.executable_path {
            Some(path) if !path.trim().is_empty() => {}
            _ => return Err(VcrError::MissingOption("launchOptions.executablePath")),
        }
        Ok(())
    }

    pub fn busy_timeout(&self) -> Duration {
        Duration::from_millis(self.busy_timeout)
    }

    /// Comma-separated selector list as configured; empty when unset, in
    /// which case the busy waiter (C6) is a no-op.
    pub fn busy_indicator_selectors(&self) -> Vec<String> {
        self.busy_indicator_selector
            .as_deref()
            .unwrap_or("")
            .split(',')
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(str::to_string)
            .collect()
    }
}

/// Screenshot request honored by [`crate::Replayer::capture_screen`] (§4.5).
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CaptureScreenOptions {
    #[serde(default)]
    pub path: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn launch_options(executable: Option<&str>) -> LaunchOptions {
        LaunchOptions {
            executable_path: executable.map(str::to_string),
            headless: true,
            args: vec![],
        }
    }

    #[test]
    fn recorder_options_require_url() {
        let opts = RecorderOptions {
            url: "".to_string(),
            r#type: default_type(),
            stream: true,
            launch_options: launch_options(Some("/usr/bin/chromium")),
            goto_options: GotoOptions::default(),
        };
        assert!(matches!(
            opts.validate(),
            Err(VcrError::MissingOption("url"))
        ));
    }

    #[test]
    fn recorder_options_require_executable_path() {
        let opts = RecorderOptions {
            url: "https://example.com".to_string(),
            r#type: default_type(),
            stream: true,
            launch_options: launch_options(None),
            goto_options: GotoOptions::default(),
        };
        assert!(opts.validate().is_err());
    }

    #[test]
    fn busy_indicator_selectors_split_and_trim() {
        let opts = ReplayerOptions {
            url: "https://example.com".to_string(),
            r#type: default_type(),
            launch_options: launch_options(Some("/usr/bin/chromium")),
            goto_options: GotoOptions::default(),
            busy_indicator_selector: Some(" .spinner , #loading ".to_string()),
            busy_timeout: default_busy_timeout_ms(),
            visual_effects: true,
        };
        assert_eq!(
            opts.busy_indicator_selectors(),
            vec![".spinner".to_string(), "#loading".to_string()]
        );
    }
}
