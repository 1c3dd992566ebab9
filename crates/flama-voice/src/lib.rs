//! Live voice pipeline: microphone capture, a bidirectional streaming
//! session with the language-model voice service, ordered audio playback,
//! and reassembly of incremental transcriptions into discrete turn
//! messages.
//!
//! The pipeline is a state machine (Inactive → Starting → Active →
//! Stopping) driven by a single dispatcher task per active session; all
//! inbound traffic arrives as tagged [`VoiceEvent`]s on a channel, and
//! cancellation is idempotent.

pub mod capture;
pub mod clock;
pub mod event;
pub mod gemini_live;
pub mod pcm;
pub mod pipeline;
pub mod sink;
pub mod turn;

pub use capture::{CaptureConfig, CpalMicrophone, MicrophoneCapture};
pub use clock::PlaybackClock;
pub use event::{OutboundFrame, VoiceConnector, VoiceEvent, VoiceSessionHandle};
pub use gemini_live::{GeminiLiveConfig, GeminiLiveConnector};
pub use pipeline::{VoicePipeline, VoiceState, VoiceUpdate};
pub use sink::{AudioSink, CpalSink};
pub use turn::TurnBuffers;
