use anyhow::{bail, Context, Result};
use std::io::Cursor;
use std::sync::Arc;
use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use super::backend::CaptureBackend;
use crate::config::AudioConfig;

/// Recorder lifecycle states.
///
/// `Finalized` and `Cancelled` are transient: `stop` and `cancel` pass
/// through them on the way back to `Idle`, so the recorder is reusable.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RecorderState {
    Idle,
    Recording,
    Finalized,
    Cancelled,
}

impl RecorderState {
    fn can_transition(self, next: RecorderState) -> bool {
        matches!(
            (self, next),
            (RecorderState::Idle, RecorderState::Recording)
                | (RecorderState::Recording, RecorderState::Finalized)
                | (RecorderState::Recording, RecorderState::Cancelled)
                | (RecorderState::Finalized, RecorderState::Idle)
                | (RecorderState::Cancelled, RecorderState::Idle)
        )
    }
}

/// A finalized recording, ready for transmission.
#[derive(Debug, Clone)]
pub struct AudioPayload {
    /// Complete WAV file contents (16-bit PCM)
    pub wav: Vec<u8>,

    pub sample_rate: u32,

    pub channels: u16,

    pub duration_secs: f64,

    /// Opaque handle identifying this recording
    pub reference: String,
}

impl AudioPayload {
    pub fn file_name(&self) -> String {
        format!("{}.wav", self.reference)
    }
}

#[derive(Default)]
struct CaptureBuffer {
    samples: Vec<i16>,
    sample_rate: Option<u32>,
    channels: Option<u16>,
}

/// The audio capture adapter.
///
/// Buffers frames from a [`CaptureBackend`] while recording; `stop`
/// finalizes the buffer into a single in-memory WAV payload, `cancel`
/// discards it without transmission. Only one recording session may be
/// active at a time; a second `start` while recording is an error and does
/// not touch the active buffer.
pub struct Recorder {
    state: RecorderState,
    config: AudioConfig,
    backend: Option<Box<dyn CaptureBackend>>,
    buffer: Arc<Mutex<CaptureBuffer>>,
    capture_task: Option<JoinHandle<()>>,
}

impl Recorder {
    pub fn new(config: AudioConfig) -> Self {
        Self {
            state: RecorderState::Idle,
            config,
            backend: None,
            buffer: Arc::new(Mutex::new(CaptureBuffer::default())),
            capture_task: None,
        }
    }

    pub fn state(&self) -> RecorderState {
        self.state
    }

    /// Request a capture stream from the backend and begin buffering.
    ///
    /// If the backend fails to acquire its stream the error is returned and
    /// the recorder stays `Idle`; the failure is fatal to this capture
    /// attempt only.
    pub async fn start(&mut self, mut backend: Box<dyn CaptureBackend>) -> Result<()> {
        if self.state == RecorderState::Recording {
            bail!("A recording session is already active");
        }

        let mut frame_rx = backend
            .start()
            .await
            .context("Failed to acquire capture stream")?;

        self.transition(RecorderState::Recording)?;
        info!("Recording started ({})", backend.name());

        let buffer = Arc::new(Mutex::new(CaptureBuffer::default()));
        self.buffer = Arc::clone(&buffer);

        self.capture_task = Some(tokio::spawn(async move {
            while let Some(frame) = frame_rx.recv().await {
                let mut buf = buffer.lock().await;
                // First frame fixes the capture format
                buf.sample_rate.get_or_insert(frame.sample_rate);
                buf.channels.get_or_insert(frame.channels);
                buf.samples.extend_from_slice(&frame.samples);
            }
            debug!("capture task finished");
        }));

        self.backend = Some(backend);
        Ok(())
    }

    /// Finalize the buffered capture into a single WAV payload.
    pub async fn stop(&mut self) -> Result<AudioPayload> {
        if self.state != RecorderState::Recording {
            bail!("No active recording to stop");
        }

        if let Some(mut backend) = self.backend.take() {
            backend.stop().await.context("Failed to stop capture")?;
        }

        // The backend has stopped feeding frames, so the collector drains
        // whatever is left in the channel and exits
        if let Some(task) = self.capture_task.take() {
            if let Err(e) = task.await {
                warn!("Capture task panicked: {}", e);
            }
        }

        self.transition(RecorderState::Finalized)?;

        let captured = {
            let mut buf = self.buffer.lock().await;
            std::mem::take(&mut *buf)
        };

        let sample_rate = captured.sample_rate.unwrap_or(self.config.sample_rate);
        let channels = captured.channels.unwrap_or(self.config.channels);

        let wav = encode_wav(&captured.samples, sample_rate, channels)?;
        let duration_secs =
            captured.samples.len() as f64 / (sample_rate as f64 * channels as f64);
        let reference = format!("recording-{}", uuid::Uuid::new_v4());

        info!(
            "Recording finalized: {:.1}s, {}Hz, {} channels ({} bytes)",
            duration_secs,
            sample_rate,
            channels,
            wav.len()
        );

        self.transition(RecorderState::Idle)?;

        Ok(AudioPayload {
            wav,
            sample_rate,
            channels,
            duration_secs,
            reference,
        })
    }

    /// Discard the buffered capture without transmission.
    pub async fn cancel(&mut self) -> Result<()> {
        if self.state != RecorderState::Recording {
            warn!("No active recording to cancel");
            return Ok(());
        }

        if let Some(task) = self.capture_task.take() {
            task.abort();
        }

        if let Some(mut backend) = self.backend.take() {
            if let Err(e) = backend.stop().await {
                warn!("Failed to stop capture on cancel: {}", e);
            }
        }

        {
            let mut buf = self.buffer.lock().await;
            *buf = CaptureBuffer::default();
        }

        self.transition(RecorderState::Cancelled)?;
        info!("Recording cancelled, buffer discarded");
        self.transition(RecorderState::Idle)?;

        Ok(())
    }

    fn transition(&mut self, next: RecorderState) -> Result<()> {
        if !self.state.can_transition(next) {
            bail!("Invalid recorder transition: {:?} -> {:?}", self.state, next);
        }
        debug!("recorder state: {:?} -> {:?}", self.state, next);
        self.state = next;
        Ok(())
    }
}

/// Encode 16-bit PCM samples into an in-memory WAV file.
fn encode_wav(samples: &[i16], sample_rate: u32, channels: u16) -> Result<Vec<u8>> {
    let spec = hound::WavSpec {
        channels,
        sample_rate,
        bits_per_sample: 16,
        sample_format: hound::SampleFormat::Int,
    };

    let mut cursor = Cursor::new(Vec::new());
    {
        let mut writer =
            hound::WavWriter::new(&mut cursor, spec).context("Failed to create WAV writer")?;

        for &sample in samples {
            writer
                .write_sample(sample)
                .context("Failed to write sample to WAV")?;
        }

        writer.finalize().context("Failed to finalize WAV")?;
    }

    Ok(cursor.into_inner())
}
