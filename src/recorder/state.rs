//! Recorder lifecycle states (§4.4): `IDLE → LAUNCHING → READY ⇄ RECORDING → CLOSING → IDLE`.

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RecorderState {
    Idle,
    Launching,
    Ready,
    Recording,
    Closing,
}

impl RecorderState {
    pub fn can_launch(self) -> bool {
        self == RecorderState::Idle
    }

    pub fn can_start_recording(self) -> bool {
        self == RecorderState::Ready
    }

    pub fn can_stop_recording(self) -> bool {
        self == RecorderState::Recording
    }

    /// `close()` is valid in any non-`IDLE`/`CLOSING` state (§4.4).
    pub fn can_close(self) -> bool {
        !matches!(self, RecorderState::Idle | RecorderState::Closing)
    }

    pub fn is_closing(self) -> bool {
        self == RecorderState::Closing
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn close_is_rejected_from_idle_and_closing() {
        assert!(!RecorderState::Idle.can_close());
        assert!(!RecorderState::Closing.can_close());
        assert!(RecorderState::Launching.can_close());
        assert!(RecorderState::Ready.can_close());
        assert!(RecorderState::Recording.can_close());
    }

    #[test]
    fn start_recording_only_from_ready() {
        assert!(RecorderState::Ready.can_start_recording());
        assert!(!RecorderState::Recording.can_start_recording());
        assert!(!RecorderState::Idle.can_start_recording());
    }
}
