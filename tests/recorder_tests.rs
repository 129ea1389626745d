// Integration tests for the audio capture adapter.
//
// A scripted backend feeds known frames through the recorder so the state
// machine and the finalized WAV payload can be checked without real capture
// hardware.

use anyhow::Result;
use std::io::Cursor;
use tokio::sync::mpsc;

use flowchat::{AudioConfig, AudioFrame, CaptureBackend, Recorder, RecorderState, WavFileBackend};

/// Backend that emits a fixed set of frames and then closes the channel.
struct ScriptedBackend {
    frames: Vec<AudioFrame>,
    capturing: bool,
}

impl ScriptedBackend {
    fn new(frames: Vec<AudioFrame>) -> Self {
        Self {
            frames,
            capturing: false,
        }
    }

    /// Frames of constant-valued 16kHz mono samples, 160 samples each.
    fn constant(value: i16, frame_count: usize) -> Self {
        let frames = (0..frame_count)
            .map(|i| AudioFrame {
                samples: vec![value; 160],
                sample_rate: 16000,
                channels: 1,
                timestamp_ms: i as u64 * 100,
            })
            .collect();
        Self::new(frames)
    }
}

#[async_trait::async_trait]
impl CaptureBackend for ScriptedBackend {
    async fn start(&mut self) -> Result<mpsc::Receiver<AudioFrame>> {
        let (tx, rx) = mpsc::channel(100);
        let frames = self.frames.clone();
        tokio::spawn(async move {
            for frame in frames {
                if tx.send(frame).await.is_err() {
                    break;
                }
            }
        });
        self.capturing = true;
        Ok(rx)
    }

    async fn stop(&mut self) -> Result<()> {
        self.capturing = false;
        Ok(())
    }

    fn is_capturing(&self) -> bool {
        self.capturing
    }

    fn name(&self) -> &str {
        "scripted"
    }
}

/// Backend whose stream acquisition always fails, like a denied microphone
/// permission.
struct DeniedBackend;

#[async_trait::async_trait]
impl CaptureBackend for DeniedBackend {
    async fn start(&mut self) -> Result<mpsc::Receiver<AudioFrame>> {
        anyhow::bail!("Permission denied")
    }

    async fn stop(&mut self) -> Result<()> {
        Ok(())
    }

    fn is_capturing(&self) -> bool {
        false
    }

    fn name(&self) -> &str {
        "denied"
    }
}

fn decode_wav(payload: &[u8]) -> (hound::WavSpec, Vec<i16>) {
    let reader = hound::WavReader::new(Cursor::new(payload)).expect("payload must be valid WAV");
    let spec = reader.spec();
    let samples = reader
        .into_samples::<i16>()
        .collect::<Result<Vec<_>, _>>()
        .unwrap();
    (spec, samples)
}

#[tokio::test]
async fn stop_finalizes_buffered_capture_into_wav() -> Result<()> {
    let mut recorder = Recorder::new(AudioConfig::default());
    assert_eq!(recorder.state(), RecorderState::Idle);

    recorder
        .start(Box::new(ScriptedBackend::constant(7, 3)))
        .await?;
    assert_eq!(recorder.state(), RecorderState::Recording);

    let payload = recorder.stop().await?;
    assert_eq!(recorder.state(), RecorderState::Idle);

    let (spec, samples) = decode_wav(&payload.wav);
    assert_eq!(spec.sample_rate, 16000);
    assert_eq!(spec.channels, 1);
    assert_eq!(samples.len(), 3 * 160);
    assert!(samples.iter().all(|&s| s == 7));

    assert_eq!(payload.sample_rate, 16000);
    assert_eq!(payload.channels, 1);
    assert!((payload.duration_secs - 480.0 / 16000.0).abs() < 1e-9);
    assert!(payload.file_name().ends_with(".wav"));

    Ok(())
}

#[tokio::test]
async fn second_start_while_recording_errors_and_preserves_buffer() -> Result<()> {
    let mut recorder = Recorder::new(AudioConfig::default());

    recorder
        .start(Box::new(ScriptedBackend::constant(1, 2)))
        .await?;

    // The second attempt must fail without touching the active capture
    let err = recorder
        .start(Box::new(ScriptedBackend::constant(2, 5)))
        .await;
    assert!(err.is_err());
    assert_eq!(recorder.state(), RecorderState::Recording);

    let payload = recorder.stop().await?;
    let (_, samples) = decode_wav(&payload.wav);
    assert_eq!(samples.len(), 2 * 160, "no frames from the refused attempt");
    assert!(samples.iter().all(|&s| s == 1), "buffers must not merge");

    Ok(())
}

#[tokio::test]
async fn cancel_discards_buffer_and_returns_to_idle() -> Result<()> {
    let mut recorder = Recorder::new(AudioConfig::default());

    recorder
        .start(Box::new(ScriptedBackend::constant(9, 4)))
        .await?;
    recorder.cancel().await?;
    assert_eq!(recorder.state(), RecorderState::Idle);

    // The recorder is reusable and carries nothing over
    recorder
        .start(Box::new(ScriptedBackend::constant(3, 1)))
        .await?;
    let payload = recorder.stop().await?;

    let (_, samples) = decode_wav(&payload.wav);
    assert_eq!(samples.len(), 160);
    assert!(samples.iter().all(|&s| s == 3));

    Ok(())
}

#[tokio::test]
async fn denied_capture_is_fatal_to_that_attempt_only() -> Result<()> {
    let mut recorder = Recorder::new(AudioConfig::default());

    let err = recorder.start(Box::new(DeniedBackend)).await;
    assert!(err.is_err());
    assert_eq!(recorder.state(), RecorderState::Idle);

    // A later attempt with a working backend succeeds
    recorder
        .start(Box::new(ScriptedBackend::constant(5, 1)))
        .await?;
    let payload = recorder.stop().await?;
    assert!(!payload.wav.is_empty());

    Ok(())
}

#[tokio::test]
async fn stop_without_recording_is_an_error() {
    let mut recorder = Recorder::new(AudioConfig::default());
    assert!(recorder.stop().await.is_err());
    assert_eq!(recorder.state(), RecorderState::Idle);
}

#[tokio::test]
async fn cancel_without_recording_is_a_no_op() -> Result<()> {
    let mut recorder = Recorder::new(AudioConfig::default());
    recorder.cancel().await?;
    assert_eq!(recorder.state(), RecorderState::Idle);
    Ok(())
}

#[tokio::test]
async fn wav_file_backend_replays_the_whole_file() -> Result<()> {
    let temp_dir = tempfile::TempDir::new()?;
    let wav_path = temp_dir.path().join("source.wav");

    // 0.5s of a simple ramp at 16kHz mono
    let source: Vec<i16> = (0..8000).map(|i| (i % 512) as i16).collect();
    let spec = hound::WavSpec {
        channels: 1,
        sample_rate: 16000,
        bits_per_sample: 16,
        sample_format: hound::SampleFormat::Int,
    };
    let mut writer = hound::WavWriter::create(&wav_path, spec)?;
    for &sample in &source {
        writer.write_sample(sample)?;
    }
    writer.finalize()?;

    let mut recorder = Recorder::new(AudioConfig::default());
    recorder.start(Box::new(WavFileBackend::new(&wav_path))).await?;
    let payload = recorder.stop().await?;

    let (decoded_spec, samples) = decode_wav(&payload.wav);
    assert_eq!(decoded_spec.sample_rate, 16000);
    assert_eq!(samples, source, "replayed capture must match the source file");

    Ok(())
}

#[tokio::test]
async fn wav_file_backend_missing_file_fails_acquisition() {
    let mut recorder = Recorder::new(AudioConfig::default());
    let err = recorder
        .start(Box::new(WavFileBackend::new("/nonexistent/missing.wav")))
        .await;
    assert!(err.is_err());
    assert_eq!(recorder.state(), RecorderState::Idle);
}
