//! Browser session record/replay over the Chrome DevTools Protocol: a
//! [`Recorder`] that captures a user session from a live tab into a portable
//! action stream, and a [`Replayer`] that reconstructs it with the original
//! timing.

pub mod config;
pub mod error;
pub mod events;
pub mod overlay;
pub mod recorder;
pub mod replayer;
pub mod schema;

mod capture;

pub use config::{CaptureScreenOptions, GotoOptions, LaunchOptions, RecorderOptions, ReplayerOptions};
pub use error::{Result, VcrError};
pub use recorder::{Recorder, RecorderState};
pub use replayer::{PlayResult, Replayer, ReplayerState};
pub use schema::{
    Action, CaptureError, Envelope, ErrorKind, RecordingMetadata, Recording, RetCode, StatusCode,
};
