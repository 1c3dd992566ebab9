use async_trait::async_trait;
use flama_core::{Department, FlamaResult};
use tokio::sync::mpsc;

/// Outbound traffic from the pipeline to the voice service.
#[derive(Debug)]
pub enum OutboundFrame {
    /// Raw little-endian 16-bit PCM, 16 kHz mono.
    Audio(Vec<u8>),
    /// Graceful end of the streaming session.
    Close,
}

/// Inbound events from the voice service, one tag per message kind.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum VoiceEvent {
    /// Synthesized speech: little-endian 16-bit PCM, 24 kHz mono.
    Audio(Vec<u8>),
    /// Incremental transcription fragment, tagged by speaker.
    Transcription { text: String, is_user: bool },
    /// The service finished one exchange; buffered transcriptions become
    /// messages.
    TurnComplete,
    /// The stream failed; the pipeline must stop.
    Error(String),
}

/// The two halves of an open streaming session.
pub struct VoiceSessionHandle {
    pub outbound: mpsc::Sender<OutboundFrame>,
    pub events: mpsc::Receiver<VoiceEvent>,
}

/// Opens a bidirectional voice session scoped to a department, with the
/// given grounding text as system instruction.
#[async_trait]
pub trait VoiceConnector: Send + Sync {
    async fn connect(
        &self,
        department: Department,
        grounding: &str,
    ) -> FlamaResult<VoiceSessionHandle>;
}
