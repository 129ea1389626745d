pub mod backend;
pub mod recorder;

pub use backend::{AudioFrame, CaptureBackend, WavFileBackend};
pub use recorder::{AudioPayload, Recorder, RecorderState};
