use flama_core::{FlamaError, FlamaResult};
use parking_lot::Mutex;
use std::collections::VecDeque;
use std::sync::Arc;
use tracing::{info, warn};

/// Ordered audio output. `enqueue` appends samples behind everything
/// already queued, so chunks play back-to-back in arrival order; `close`
/// releases the device and is idempotent.
pub trait AudioSink: Send + Sync {
    fn enqueue(&self, samples: Vec<f32>);
    fn close(&self);
}

struct SendStream(#[allow(dead_code)] cpal::Stream);

// SAFETY: same contract as the capture stream — the handle is only
// stored and dropped, callbacks run on cpal's own thread.
unsafe impl Send for SendStream {}
unsafe impl Sync for SendStream {}

/// cpal-backed speaker output at a fixed sample rate (24 kHz mono for the
/// voice service). The output callback drains a shared queue and plays
/// silence when it runs dry, which realizes the back-to-back scheduling
/// rule: a chunk starts where the previous one ended, or immediately
/// after silence.
pub struct CpalSink {
    queue: Arc<Mutex<VecDeque<f32>>>,
    stream: Mutex<Option<SendStream>>,
}

impl CpalSink {
    pub fn new(sample_rate: u32) -> FlamaResult<Self> {
        use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};

        let host = cpal::default_host();
        let device = host
            .default_output_device()
            .ok_or_else(|| FlamaError::Voice("No output device available".into()))?;

        let stream_config = cpal::StreamConfig {
            channels: 1,
            sample_rate: cpal::SampleRate(sample_rate),
            buffer_size: cpal::BufferSize::Default,
        };

        let queue: Arc<Mutex<VecDeque<f32>>> = Arc::new(Mutex::new(VecDeque::new()));
        let callback_queue = Arc::clone(&queue);

        let stream = device
            .build_output_stream(
                &stream_config,
                move |data: &mut [f32], _: &cpal::OutputCallbackInfo| {
                    let mut queue = callback_queue.lock();
                    for slot in data.iter_mut() {
                        *slot = queue.pop_front().unwrap_or(0.0);
                    }
                },
                |err| {
                    warn!(error = %err, "Speaker stream error");
                },
                None,
            )
            .map_err(|e| FlamaError::Voice(format!("Failed to open speaker: {e}")))?;

        stream
            .play()
            .map_err(|e| FlamaError::Voice(format!("Failed to start speaker: {e}")))?;

        info!(sample_rate, "Speaker output started");
        Ok(Self {
            queue,
            stream: Mutex::new(Some(SendStream(stream))),
        })
    }
}

impl AudioSink for CpalSink {
    fn enqueue(&self, samples: Vec<f32>) {
        self.queue.lock().extend(samples);
    }

    fn close(&self) {
        if self.stream.lock().take().is_some() {
            self.queue.lock().clear();
            info!("Speaker output released");
        }
    }
}
