use bytes::Bytes;

use super::{
    chat::interpret_request,
    client::{ApiRequest, AuthorizedClient, FormPart},
    types::{
        ApiError, AsrRequest, AsrResponse, AudioFile, GptReply, SendMessageRequest, TtsRequest,
        VoiceExchange,
    },
};

pub const DEFAULT_VOICE_ID: &str = "default";
pub const DEFAULT_TTS_MODEL: &str = "eleven_multilingual_v2";
pub const DEFAULT_TTS_FORMAT: &str = "mp3_44100_128";

#[derive(Clone)]
pub struct VoiceApi {
    client: AuthorizedClient,
}

impl VoiceApi {
    pub fn new(client: AuthorizedClient) -> Self {
        Self { client }
    }

    /// Synthesizes `text` and returns the encoded audio as sent by the server.
    pub async fn tts(&self, payload: TtsRequest) -> Result<Bytes, ApiError> {
        if payload.text.trim().is_empty() {
            return Err(ApiError::missing_precondition("text is required for speech"));
        }
        let response = self
            .client
            .send(ApiRequest::post("/tts").json(&payload)?)
            .await?
            .error_for_status()?;
        Ok(response.body)
    }

    pub async fn asr(&self, payload: AsrRequest) -> Result<AsrResponse, ApiError> {
        let AudioFile {
            file_name,
            content_type,
            data,
        } = payload.file;
        let mut parts = vec![FormPart::File {
            name: "file".into(),
            file_name,
            content_type,
            data,
        }];
        if let Some(language) = payload.language {
            parts.push(FormPart::Text {
                name: "language".into(),
                value: language,
            });
        }
        if let Some(prompt) = payload.prompt {
            parts.push(FormPart::Text {
                name: "prompt".into(),
                value: prompt,
            });
        }
        self.client
            .send_json(ApiRequest::post("/asr").multipart(parts))
            .await
    }

    /// Speech in, speech out: transcribe, ask the assistant, synthesize the
    /// reply. Any failing step aborts the exchange.
    pub async fn send_voice_message(
        &self,
        audio: AudioFile,
        user_id: &str,
        chat_id: &str,
    ) -> Result<VoiceExchange, ApiError> {
        let AsrResponse { text } = self
            .asr(AsrRequest {
                file: audio,
                language: None,
                prompt: None,
            })
            .await?;

        let reply: GptReply = self
            .client
            .send_json(interpret_request(&SendMessageRequest {
                user_id: user_id.to_string(),
                chat_id: chat_id.to_string(),
                message: text.clone(),
            })?)
            .await?;

        let audio = self
            .tts(TtsRequest {
                text: reply.reply.clone(),
                voice_id: Some(DEFAULT_VOICE_ID.into()),
                model_id: Some(DEFAULT_TTS_MODEL.into()),
                output_format: Some(DEFAULT_TTS_FORMAT.into()),
            })
            .await?;

        Ok(VoiceExchange {
            user_text: text,
            assistant_text: reply.reply,
            audio,
        })
    }
}
