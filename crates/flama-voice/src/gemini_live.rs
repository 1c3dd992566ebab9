use crate::event::{OutboundFrame, VoiceConnector, VoiceEvent, VoiceSessionHandle};
use async_trait::async_trait;
use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine as _;
use flama_core::{Department, FlamaError, FlamaResult};
use futures_util::{SinkExt, StreamExt};
use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;
use tokio_tungstenite::tungstenite::Message as WsMessage;
use tracing::{debug, info, warn};

const DEFAULT_ENDPOINT: &str = "wss://generativelanguage.googleapis.com/ws/google.ai.generativelanguage.v1beta.GenerativeService.BidiGenerateContent";

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GeminiLiveConfig {
    #[serde(default = "default_voice_model")]
    pub model_id: String,
    pub api_key: String,
    /// Fixed synthesized voice identity.
    #[serde(default = "default_voice_name")]
    pub voice_name: String,
    pub endpoint: Option<String>,
}

fn default_voice_model() -> String {
    "gemini-2.5-flash-native-audio-preview-12-2025".to_string()
}

fn default_voice_name() -> String {
    "Kore".to_string()
}

impl GeminiLiveConfig {
    fn endpoint(&self) -> String {
        let base = self.endpoint.as_deref().unwrap_or(DEFAULT_ENDPOINT);
        format!("{}?key={}", base, self.api_key)
    }
}

/// Gemini Live bidirectional voice connector.
///
/// Opens one WebSocket per session, sends the setup envelope (audio
/// response modality, fixed voice, input/output transcription, grounded
/// system instruction), then bridges the socket to the pipeline's
/// channels: outbound PCM frames become `realtimeInput` messages and
/// inbound server content is decoded into [`VoiceEvent`]s.
pub struct GeminiLiveConnector {
    config: GeminiLiveConfig,
}

impl GeminiLiveConnector {
    pub fn new(config: GeminiLiveConfig) -> Self {
        Self { config }
    }

    fn setup_message(&self, department: Department, grounding: &str) -> serde_json::Value {
        let instruction = format!(
            "Você é o atendente por voz do Colégio Flama ({department}). Seja conciso. \
             Use a base interna de conhecimento: {grounding}."
        );
        serde_json::json!({
            "setup": {
                "model": format!("models/{}", self.config.model_id),
                "generationConfig": {
                    "responseModalities": ["AUDIO"],
                    "speechConfig": {
                        "voiceConfig": {
                            "prebuiltVoiceConfig": {"voiceName": self.config.voice_name}
                        }
                    }
                },
                "systemInstruction": {"parts": [{"text": instruction}]},
                "inputAudioTranscription": {},
                "outputAudioTranscription": {}
            }
        })
    }
}

/// Decode one server message into the pipeline's event vocabulary.
/// Returns every event carried by the payload, in wire order.
fn parse_server_message(value: &serde_json::Value) -> Vec<VoiceEvent> {
    let mut events = Vec::new();
    let content = &value["serverContent"];

    if let Some(data) = content["modelTurn"]["parts"][0]["inlineData"]["data"].as_str() {
        match BASE64.decode(data) {
            Ok(bytes) => events.push(VoiceEvent::Audio(bytes)),
            Err(e) => debug!(error = %e, "Dropping undecodable audio chunk"),
        }
    }
    if let Some(text) = content["outputTranscription"]["text"].as_str() {
        events.push(VoiceEvent::Transcription {
            text: text.to_string(),
            is_user: false,
        });
    }
    if let Some(text) = content["inputTranscription"]["text"].as_str() {
        events.push(VoiceEvent::Transcription {
            text: text.to_string(),
            is_user: true,
        });
    }
    if content["turnComplete"].as_bool() == Some(true) {
        events.push(VoiceEvent::TurnComplete);
    }
    events
}

#[async_trait]
impl VoiceConnector for GeminiLiveConnector {
    async fn connect(
        &self,
        department: Department,
        grounding: &str,
    ) -> FlamaResult<VoiceSessionHandle> {
        let (ws_stream, _) = tokio_tungstenite::connect_async(self.config.endpoint())
            .await
            .map_err(|e| FlamaError::Voice(format!("Voice stream connect error: {e}")))?;
        let (mut write, mut read) = ws_stream.split();
        info!(department = %department, "Voice session opened");

        let setup = self.setup_message(department, grounding);
        write
            .send(WsMessage::Text(setup.to_string()))
            .await
            .map_err(|e| FlamaError::Voice(format!("Voice setup send error: {e}")))?;

        let (outbound_tx, mut outbound_rx) = mpsc::channel::<OutboundFrame>(64);
        let (event_tx, event_rx) = mpsc::channel::<VoiceEvent>(256);

        // Writer: pipeline frames → realtimeInput messages.
        tokio::spawn(async move {
            while let Some(frame) = outbound_rx.recv().await {
                match frame {
                    OutboundFrame::Audio(pcm) => {
                        let payload = serde_json::json!({
                            "realtimeInput": {
                                "mediaChunks": [{
                                    "mimeType": "audio/pcm;rate=16000",
                                    "data": BASE64.encode(&pcm)
                                }]
                            }
                        });
                        if let Err(e) = write.send(WsMessage::Text(payload.to_string())).await {
                            warn!(error = %e, "Voice frame send failed");
                            break;
                        }
                    }
                    OutboundFrame::Close => {
                        let _ = write.send(WsMessage::Close(None)).await;
                        break;
                    }
                }
            }
            debug!("Voice writer task ended");
        });

        // Reader: socket messages → tagged VoiceEvents.
        tokio::spawn(async move {
            while let Some(msg) = read.next().await {
                match msg {
                    Ok(WsMessage::Text(text)) => match serde_json::from_str(&text) {
                        Ok(value) => {
                            for event in parse_server_message(&value) {
                                if event_tx.send(event).await.is_err() {
                                    return;
                                }
                            }
                        }
                        Err(e) => debug!(error = %e, "Non-JSON voice message ignored"),
                    },
                    Ok(WsMessage::Binary(bytes)) => {
                        // The service may frame JSON payloads as binary.
                        if let Ok(value) = serde_json::from_slice::<serde_json::Value>(&bytes) {
                            for event in parse_server_message(&value) {
                                if event_tx.send(event).await.is_err() {
                                    return;
                                }
                            }
                        }
                    }
                    Ok(WsMessage::Close(_)) => {
                        info!("Voice session closed by server");
                        break;
                    }
                    Ok(_) => {} // Ignore ping/pong.
                    Err(e) => {
                        let _ = event_tx.send(VoiceEvent::Error(e.to_string())).await;
                        break;
                    }
                }
            }
            debug!("Voice reader task ended");
        });

        Ok(VoiceSessionHandle {
            outbound: outbound_tx,
            events: event_rx,
        })
    }
}
