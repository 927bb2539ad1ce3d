//! Replayer lifecycle states (§4.5): `IDLE → LAUNCHING → LAUNCHED ⇄ PLAYING → CLOSING → IDLE`.

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReplayerState {
    Idle,
    Launching,
    Launched,
    Playing,
    Closing,
}

impl ReplayerState {
    pub fn can_launch(self) -> bool {
        self == ReplayerState::Idle
    }

    pub fn can_play(self) -> bool {
        self == ReplayerState::Launched
    }

    pub fn can_stop(self) -> bool {
        self == ReplayerState::Playing
    }

    pub fn can_close(self) -> bool {
        !matches!(self, ReplayerState::Idle | ReplayerState::Closing)
    }

    pub fn is_closing(self) -> bool {
        self == ReplayerState::Closing
    }

    pub fn is_playing(self) -> bool {
        self == ReplayerState::Playing
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn play_only_valid_from_launched() {
        assert!(ReplayerState::Launched.can_play());
        assert!(!ReplayerState::Playing.can_play());
        assert!(!ReplayerState::Idle.can_play());
    }

    #[test]
    fn stop_only_valid_while_playing() {
        assert!(ReplayerState::Playing.can_stop());
        assert!(!ReplayerState::Launched.can_stop());
    }
}
