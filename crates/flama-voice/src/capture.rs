use flama_core::{FlamaError, FlamaResult};
use parking_lot::Mutex;
use tokio::sync::mpsc;
use tracing::{info, warn};

/// Microphone capture configuration. The voice service expects 16 kHz
/// mono input in small fixed frames.
#[derive(Debug, Clone)]
pub struct CaptureConfig {
    pub sample_rate: u32,
    /// Samples per forwarded frame.
    pub frame_len: usize,
}

impl Default for CaptureConfig {
    fn default() -> Self {
        Self {
            sample_rate: 16_000,
            frame_len: 4096,
        }
    }
}

/// Continuous microphone capture. `start` yields a channel of fixed-size
/// mono f32 frames; `stop` releases the device and must be idempotent.
pub trait MicrophoneCapture: Send + Sync {
    fn start(&self) -> FlamaResult<mpsc::Receiver<Vec<f32>>>;
    fn stop(&self);
}

/// Wrapper to keep `cpal::Stream` inside a `Mutex`.
///
/// `cpal::Stream` carries a `*mut ()` marker that prevents auto
/// `Send`/`Sync`. The handle is only ever stored (to keep capture alive)
/// or dropped (to stop it); the audio callback runs on a thread cpal owns.
struct SendStream(#[allow(dead_code)] cpal::Stream);

// SAFETY: the Stream handle is never used to share data across threads.
// 1. Callbacks run on a separate OS thread managed by cpal
// 2. We only construct the stream, keep it alive, and drop it
// 3. No mutable state is shared between the handle and the callbacks
unsafe impl Send for SendStream {}
unsafe impl Sync for SendStream {}

/// cpal-backed microphone. Downmixes and accumulates device samples into
/// fixed frames pushed onto a bounded channel; frames are dropped rather
/// than blocking the audio callback when the consumer falls behind.
pub struct CpalMicrophone {
    config: CaptureConfig,
    stream: Mutex<Option<SendStream>>,
}

impl CpalMicrophone {
    pub fn new(config: CaptureConfig) -> Self {
        Self {
            config,
            stream: Mutex::new(None),
        }
    }
}

impl MicrophoneCapture for CpalMicrophone {
    fn start(&self) -> FlamaResult<mpsc::Receiver<Vec<f32>>> {
        use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};

        let host = cpal::default_host();
        let device = host
            .default_input_device()
            .ok_or_else(|| FlamaError::Voice("No input device available".into()))?;
        let device_name = device.name().unwrap_or_else(|_| "unknown".to_string());

        let stream_config = cpal::StreamConfig {
            channels: 1,
            sample_rate: cpal::SampleRate(self.config.sample_rate),
            buffer_size: cpal::BufferSize::Default,
        };

        let (tx, rx) = mpsc::channel::<Vec<f32>>(32);
        let frame_len = self.config.frame_len;
        let mut pending: Vec<f32> = Vec::with_capacity(frame_len * 2);

        let stream = device
            .build_input_stream(
                &stream_config,
                move |data: &[f32], _: &cpal::InputCallbackInfo| {
                    pending.extend_from_slice(data);
                    while pending.len() >= frame_len {
                        let frame: Vec<f32> = pending.drain(..frame_len).collect();
                        if tx.try_send(frame).is_err() {
                            // Consumer is behind or gone; drop rather than block.
                        }
                    }
                },
                |err| {
                    warn!(error = %err, "Microphone stream error");
                },
                None,
            )
            .map_err(|e| FlamaError::Voice(format!("Failed to open microphone: {e}")))?;

        stream
            .play()
            .map_err(|e| FlamaError::Voice(format!("Failed to start microphone: {e}")))?;

        *self.stream.lock() = Some(SendStream(stream));
        info!(device = %device_name, sample_rate = self.config.sample_rate, "Microphone capture started");
        Ok(rx)
    }

    fn stop(&self) {
        if self.stream.lock().take().is_some() {
            info!("Microphone capture stopped");
        }
    }
}
