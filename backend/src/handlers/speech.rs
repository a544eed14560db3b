use axum::{
    extract::{Multipart, State},
    http::header::{CONTENT_LENGTH, CONTENT_TYPE},
    response::{IntoResponse, Response},
    Json,
};
use reqwest::multipart::{Form, Part};
use serde_json::Value;

use crate::{
    error::AppError,
    services::upstream::{ForwardHeaders, Upstream, UpstreamRequest},
    state::AppState,
};

const AUDIO_MPEG: &str = "audio/mpeg";
const DEFAULT_AUDIO_FILE_NAME: &str = "audio.wav";
const DEFAULT_AUDIO_CONTENT_TYPE: &str = "application/octet-stream";

/// Relays a synthesis request and returns the audio as `audio/mpeg`.
pub async fn tts(
    State(state): State<AppState>,
    headers: ForwardHeaders,
    Json(payload): Json<Value>,
) -> Result<Response, AppError> {
    let has_text = payload
        .get("text")
        .and_then(Value::as_str)
        .is_some_and(|text| !text.trim().is_empty());
    if !has_text {
        return Err(AppError::BadRequest("Field 'text' is required".to_string()));
    }

    let audio = state
        .upstream
        .send(
            UpstreamRequest::post(Upstream::Ai, "/ai/tts").json(payload),
            &headers,
        )
        .await?;

    let length = audio.len().to_string();
    Ok((
        [(CONTENT_TYPE, AUDIO_MPEG.to_string()), (CONTENT_LENGTH, length)],
        audio,
    )
        .into_response())
}

struct UploadedAudio {
    file_name: String,
    content_type: String,
    data: Vec<u8>,
}

/// Re-sends the uploaded `file` part to the recognizer as `audio`, together
/// with the optional `language` and `prompt` hints.
pub async fn asr(
    State(state): State<AppState>,
    headers: ForwardHeaders,
    mut multipart: Multipart,
) -> Result<Json<Value>, AppError> {
    let mut audio: Option<UploadedAudio> = None;
    let mut hints: Vec<(&'static str, String)> = Vec::new();

    while let Some(field) = multipart.next_field().await? {
        let name = field.name().map(str::to_string);
        match name.as_deref() {
            Some("file") => {
                let file_name = field
                    .file_name()
                    .filter(|name| !name.is_empty())
                    .unwrap_or(DEFAULT_AUDIO_FILE_NAME)
                    .to_string();
                let content_type = field
                    .content_type()
                    .unwrap_or(DEFAULT_AUDIO_CONTENT_TYPE)
                    .to_string();
                let data = field.bytes().await?.to_vec();
                audio = Some(UploadedAudio {
                    file_name,
                    content_type,
                    data,
                });
            }
            Some("language") => hints.push(("language", field.text().await?)),
            Some("prompt") => hints.push(("prompt", field.text().await?)),
            other => tracing::debug!(field = ?other, "Ignoring unexpected multipart field"),
        }
    }

    let audio = audio.ok_or_else(|| AppError::BadRequest("Field 'file' is required".to_string()))?;

    let part = Part::bytes(audio.data)
        .file_name(audio.file_name)
        .mime_str(&audio.content_type)
        .map_err(|_| AppError::BadRequest("Invalid audio content type".to_string()))?;
    let mut form = Form::new().part("audio", part);
    for (name, value) in hints {
        form = form.text(name, value);
    }

    let request = UpstreamRequest::post(Upstream::Ai, "/asr").multipart(form);
    Ok(Json(state.upstream.json(request, &headers).await?))
}
