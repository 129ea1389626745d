use anyhow::{Context, Result};
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, info};

/// Audio sample data (16-bit PCM, interleaved)
#[derive(Debug, Clone)]
pub struct AudioFrame {
    /// Raw audio samples (i16 PCM, interleaved)
    pub samples: Vec<i16>,
    /// Sample rate in Hz
    pub sample_rate: u32,
    /// Number of channels
    pub channels: u16,
    /// Timestamp in milliseconds since capture started
    pub timestamp_ms: u64,
}

/// Audio capture backend trait
///
/// The recorder does not know how capture works internally; it only consumes
/// the frame channel a backend hands it. Acquisition failure (the terminal
/// equivalent of a denied microphone permission) is an error from `start`.
#[async_trait::async_trait]
pub trait CaptureBackend: Send + Sync {
    /// Start capturing audio
    ///
    /// Returns a channel receiver that will receive audio frames
    async fn start(&mut self) -> Result<mpsc::Receiver<AudioFrame>>;

    /// Stop capturing audio
    async fn stop(&mut self) -> Result<()>;

    /// Check if backend is currently capturing
    fn is_capturing(&self) -> bool;

    /// Get backend name for logging
    fn name(&self) -> &str;
}

/// Capture backend that replays a WAV file as a stream of 100ms frames.
///
/// Frames are replayed as fast as the receiver drains them; `stop` waits for
/// the replay to finish, so the full file is always captured.
pub struct WavFileBackend {
    path: PathBuf,
    capturing: Arc<AtomicBool>,
    replay_task: Option<JoinHandle<()>>,
}

impl WavFileBackend {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            capturing: Arc::new(AtomicBool::new(false)),
            replay_task: None,
        }
    }
}

#[async_trait::async_trait]
impl CaptureBackend for WavFileBackend {
    async fn start(&mut self) -> Result<mpsc::Receiver<AudioFrame>> {
        let reader = hound::WavReader::open(&self.path)
            .with_context(|| format!("Failed to open WAV file: {}", self.path.display()))?;

        let spec = reader.spec();
        let samples: Vec<i16> = reader
            .into_samples::<i16>()
            .collect::<Result<Vec<_>, _>>()
            .context("Failed to read audio samples")?;

        info!(
            "Replaying {}: {}Hz, {} channels, {} samples",
            self.path.display(),
            spec.sample_rate,
            spec.channels,
            samples.len()
        );

        let (tx, rx) = mpsc::channel(100);
        let capturing = Arc::clone(&self.capturing);
        capturing.store(true, Ordering::SeqCst);

        // 100ms of interleaved samples per frame
        let frame_len = (spec.sample_rate as usize / 10) * spec.channels as usize;

        self.replay_task = Some(tokio::spawn(async move {
            let mut timestamp_ms = 0u64;

            for chunk in samples.chunks(frame_len.max(1)) {
                let frame = AudioFrame {
                    samples: chunk.to_vec(),
                    sample_rate: spec.sample_rate,
                    channels: spec.channels,
                    timestamp_ms,
                };
                timestamp_ms += 100;

                // Receiver gone means the capture was abandoned
                if tx.send(frame).await.is_err() {
                    debug!("frame receiver dropped, replay stopped");
                    break;
                }
            }

            capturing.store(false, Ordering::SeqCst);
            debug!("WAV replay finished");
        }));

        Ok(rx)
    }

    async fn stop(&mut self) -> Result<()> {
        if let Some(task) = self.replay_task.take() {
            task.await.context("Replay task panicked")?;
        }
        self.capturing.store(false, Ordering::SeqCst);
        Ok(())
    }

    fn is_capturing(&self) -> bool {
        self.capturing.load(Ordering::SeqCst)
    }

    fn name(&self) -> &str {
        "wav-file"
    }
}
