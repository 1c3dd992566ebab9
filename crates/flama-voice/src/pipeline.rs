use crate::capture::MicrophoneCapture;
use crate::clock::PlaybackClock;
use crate::event::{OutboundFrame, VoiceConnector, VoiceEvent};
use crate::pcm::{decode_pcm16, duration_secs, encode_pcm16};
use crate::sink::AudioSink;
use crate::turn::TurnBuffers;
use flama_core::{Department, Role};
use parking_lot::Mutex;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

const MIC_DENIED_NOTICE: &str = "Permissão de microfone negada.";
const CONNECTION_ERROR_NOTICE: &str = "Erro na conexão de voz.";

/// Sample rate of synthesized speech coming back from the service.
const OUTPUT_SAMPLE_RATE: u32 = 24_000;

/// How long to keep draining in-flight events after a stop request.
const STOP_GRACE: Duration = Duration::from_millis(750);

/// Lifecycle of the voice session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VoiceState {
    Inactive,
    Starting,
    Active,
    Stopping,
}

/// What the UI layer sees from the pipeline.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum VoiceUpdate {
    /// Live "currently speaking" indicator line; `None` clears it.
    Live(Option<String>),
    /// A completed turn message to append to the conversation.
    Turn { role: Role, text: String },
    /// User-facing notice (denied microphone, connection failure).
    Notice(String),
    /// The session ended and all devices were released.
    Stopped,
}

/// Drives one live voice session end to end: microphone frames go out to
/// the streaming service, synthesized audio is scheduled back-to-back on
/// the sink, and incremental transcriptions are reassembled into discrete
/// turn messages on the update channel.
///
/// `toggle` is the single entry point: it starts a session when inactive
/// and stops the running one otherwise. Stopping is idempotent and always
/// releases the capture and playback devices.
pub struct VoicePipeline {
    connector: Arc<dyn VoiceConnector>,
    microphone: Arc<dyn MicrophoneCapture>,
    sink: Arc<dyn AudioSink>,
    state: Arc<Mutex<VoiceState>>,
    stop_tx: Mutex<Option<watch::Sender<bool>>>,
    task: tokio::sync::Mutex<Option<JoinHandle<()>>>,
    updates: mpsc::Sender<VoiceUpdate>,
}

impl VoicePipeline {
    pub fn new(
        connector: Arc<dyn VoiceConnector>,
        microphone: Arc<dyn MicrophoneCapture>,
        sink: Arc<dyn AudioSink>,
    ) -> (Self, mpsc::Receiver<VoiceUpdate>) {
        let (updates, update_rx) = mpsc::channel(64);
        (
            Self {
                connector,
                microphone,
                sink,
                state: Arc::new(Mutex::new(VoiceState::Inactive)),
                stop_tx: Mutex::new(None),
                task: tokio::sync::Mutex::new(None),
                updates,
            },
            update_rx,
        )
    }

    pub fn state(&self) -> VoiceState {
        *self.state.lock()
    }

    /// Start a session when inactive, stop the running one otherwise.
    pub async fn toggle(&self, department: Department, grounding: &str) {
        match self.state() {
            VoiceState::Inactive => self.start(department, grounding).await,
            VoiceState::Starting | VoiceState::Active | VoiceState::Stopping => self.stop().await,
        }
    }

    /// Open the microphone and the streaming session, then hand off to the
    /// dispatcher task. Device and connection failures surface as notices
    /// and leave the pipeline inactive instead of propagating.
    pub async fn start(&self, department: Department, grounding: &str) {
        {
            let mut state = self.state.lock();
            if *state != VoiceState::Inactive {
                return;
            }
            *state = VoiceState::Starting;
        }

        let mic_rx = match self.microphone.start() {
            Ok(rx) => rx,
            Err(e) => {
                warn!(error = %e, "Microphone unavailable");
                let _ = self.updates.send(VoiceUpdate::Notice(MIC_DENIED_NOTICE.into())).await;
                *self.state.lock() = VoiceState::Inactive;
                return;
            }
        };

        let session = match self.connector.connect(department, grounding).await {
            Ok(session) => session,
            Err(e) => {
                warn!(error = %e, "Voice session failed to open");
                self.microphone.stop();
                let _ = self
                    .updates
                    .send(VoiceUpdate::Notice(CONNECTION_ERROR_NOTICE.into()))
                    .await;
                *self.state.lock() = VoiceState::Inactive;
                return;
            }
        };

        let (stop_tx, stop_rx) = watch::channel(false);
        *self.stop_tx.lock() = Some(stop_tx);
        *self.state.lock() = VoiceState::Active;
        info!(department = %department, "Voice pipeline active");

        let handle = tokio::spawn(dispatch(
            mic_rx,
            session.outbound,
            session.events,
            stop_rx,
            Arc::clone(&self.microphone),
            Arc::clone(&self.sink),
            Arc::clone(&self.state),
            self.updates.clone(),
        ));
        *self.task.lock().await = Some(handle);
    }

    /// Signal the dispatcher to wind down and wait for it to release the
    /// devices. Safe to call at any time, in any state.
    pub async fn stop(&self) {
        {
            let mut state = self.state.lock();
            if *state == VoiceState::Active || *state == VoiceState::Starting {
                *state = VoiceState::Stopping;
            }
        }
        if let Some(stop_tx) = self.stop_tx.lock().take() {
            let _ = stop_tx.send(true);
        }
        let handle = self.task.lock().await.take();
        if let Some(handle) = handle {
            let _ = handle.await;
        }
        *self.state.lock() = VoiceState::Inactive;
    }
}

/// Per-session event loop. Owns the turn buffers and the playback clock;
/// exits when the service closes the stream, errors out, or a stop is
/// requested (after a short drain grace). Teardown always releases the
/// microphone and the sink and emits a final `Stopped`; the sink stays
/// open until the clock says the scheduled speech has finished, capped
/// at the same grace, so the tail of an answer is not cut off.
#[allow(clippy::too_many_arguments)]
async fn dispatch(
    mut mic_rx: mpsc::Receiver<Vec<f32>>,
    outbound: mpsc::Sender<OutboundFrame>,
    mut events: mpsc::Receiver<VoiceEvent>,
    mut stop_rx: watch::Receiver<bool>,
    microphone: Arc<dyn MicrophoneCapture>,
    sink: Arc<dyn AudioSink>,
    state: Arc<Mutex<VoiceState>>,
    updates: mpsc::Sender<VoiceUpdate>,
) {
    let mut buffers = TurnBuffers::default();
    let mut clock = PlaybackClock::new();
    let started = tokio::time::Instant::now();
    let mut stopping = false;

    let grace = tokio::time::sleep(Duration::from_secs(3600));
    tokio::pin!(grace);

    loop {
        tokio::select! {
            frame = mic_rx.recv() => match frame {
                Some(samples) if !stopping => {
                    if outbound.send(OutboundFrame::Audio(encode_pcm16(&samples))).await.is_err() {
                        break;
                    }
                }
                Some(_) => {}
                None => break,
            },
            event = events.recv() => match event {
                Some(VoiceEvent::Audio(bytes)) => {
                    let samples = decode_pcm16(&bytes);
                    let now = started.elapsed().as_secs_f64();
                    let start = clock.schedule(now, duration_secs(samples.len(), OUTPUT_SAMPLE_RATE));
                    debug!(samples = samples.len(), start, "Scheduled audio chunk");
                    sink.enqueue(samples);
                }
                Some(VoiceEvent::Transcription { text, is_user }) => {
                    let line = buffers.push(is_user, &text);
                    let _ = updates.send(VoiceUpdate::Live(Some(line))).await;
                }
                Some(VoiceEvent::TurnComplete) => {
                    let turns = buffers.flush();
                    // A turn landing after the stop request stays out of
                    // the transcript.
                    if !stopping {
                        for (role, text) in turns {
                            let _ = updates.send(VoiceUpdate::Turn { role, text }).await;
                        }
                        let _ = updates.send(VoiceUpdate::Live(None)).await;
                    }
                }
                Some(VoiceEvent::Error(message)) => {
                    warn!(error = %message, "Voice stream error");
                    let _ = updates
                        .send(VoiceUpdate::Notice(CONNECTION_ERROR_NOTICE.into()))
                        .await;
                    break;
                }
                None => break,
            },
            result = stop_rx.changed(), if !stopping => {
                stopping = true;
                let _ = outbound.send(OutboundFrame::Close).await;
                grace.as_mut().reset(tokio::time::Instant::now() + STOP_GRACE);
                if result.is_err() {
                    break;
                }
            }
            () = &mut grace, if stopping => break,
        }
    }

    microphone.stop();
    // The clock knows when the last scheduled chunk ends; give the sink
    // that long (capped at the drain grace) before releasing the device.
    let remaining = clock.next_start() - started.elapsed().as_secs_f64();
    if remaining > 0.0 {
        let drain = remaining.min(STOP_GRACE.as_secs_f64());
        tokio::time::sleep(Duration::from_secs_f64(drain)).await;
    }
    sink.close();
    let _ = updates.send(VoiceUpdate::Live(None)).await;
    let _ = updates.send(VoiceUpdate::Stopped).await;
    *state.lock() = VoiceState::Inactive;
    info!("Voice pipeline stopped");
}
