use serde::{Deserialize, Serialize};
use serde_json::Value;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Credentials {
    pub email: String,
    pub password: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RefreshRequest {
    pub refresh_token: String,
}

/// Token payload returned by `/login`, `/register` and `/refresh`.
/// `expires_at` is an RFC 3339 timestamp.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuthResponse {
    pub access_token: String,
    pub refresh_token: String,
    pub expires_at: String,
    pub user_id: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SendMessageRequest {
    pub user_id: String,
    pub chat_id: String,
    pub message: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GptReply {
    pub chat_id: String,
    pub reply: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatCreateRequest {
    pub user_id: String,
    pub title: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub folder_id: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatsQuery {
    pub user_id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub folder_id: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MessagesQuery {
    pub chat_id: String,
    pub user_id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub limit: Option<u32>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RenameChatRequest {
    pub user_id: String,
    pub title: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Chat {
    pub id: String,
    pub title: String,
    #[serde(default)]
    pub folder_id: Option<String>,
    #[serde(default)]
    pub created_at: Option<String>,
    #[serde(default)]
    pub updated_at: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub id: String,
    pub chat_id: String,
    pub user_id: String,
    pub role: String,
    pub content: String,
    #[serde(default)]
    pub created_at: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FolderCreateRequest {
    pub user_id: String,
    pub title: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Folder {
    pub id: String,
    pub title: String,
    #[serde(default)]
    pub created_at: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TtsRequest {
    pub text: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub voice_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub model_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub output_format: Option<String>,
}

/// Recorded audio handed to speech-to-text.
#[derive(Debug, Clone)]
pub struct AudioFile {
    pub file_name: String,
    pub content_type: String,
    pub data: Vec<u8>,
}

#[derive(Debug, Clone)]
pub struct AsrRequest {
    pub file: AudioFile,
    pub language: Option<String>,
    pub prompt: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AsrResponse {
    pub text: String,
}

/// One spoken round trip: what the user said, what the assistant answered,
/// and the synthesized answer.
#[derive(Debug, Clone)]
pub struct VoiceExchange {
    pub user_text: String,
    pub assistant_text: String,
    pub audio: bytes::Bytes,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ApiError {
    pub error: String,
    pub code: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub status: Option<u16>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<Value>,
}

impl std::fmt::Display for ApiError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.error)
    }
}

impl std::error::Error for ApiError {}

impl From<ApiError> for String {
    fn from(error: ApiError) -> Self {
        error.error
    }
}

impl ApiError {
    fn with_code(msg: impl Into<String>, code: &str) -> Self {
        Self {
            error: msg.into(),
            code: code.to_string(),
            status: None,
            details: None,
        }
    }

    pub fn unknown(msg: impl Into<String>) -> Self {
        Self::with_code(msg, "UNKNOWN")
    }

    pub fn request_failed(msg: impl Into<String>) -> Self {
        Self::with_code(msg, "REQUEST_FAILED")
    }

    pub fn missing_precondition(msg: impl Into<String>) -> Self {
        Self::with_code(msg, "MISSING_PRECONDITION")
    }

    pub fn decode(msg: impl Into<String>) -> Self {
        Self::with_code(msg, "DECODE_FAILED")
    }

    pub fn storage(msg: impl Into<String>) -> Self {
        Self::with_code(msg, "STORAGE_ERROR")
    }

    /// Builds an error from a non-success response. The proxy answers with
    /// `{error, code}`; upstream services sometimes use `message` instead.
    pub fn from_status(status: u16, body: &[u8]) -> Self {
        let parsed: Option<Value> = serde_json::from_slice(body).ok();
        let field = |name: &str| {
            parsed
                .as_ref()
                .and_then(|v| v.get(name))
                .and_then(|v| v.as_str())
                .map(str::to_string)
        };
        let message = field("error")
            .or_else(|| field("message"))
            .unwrap_or_else(|| format!("Request failed with status {}", status));
        let code = field("code").unwrap_or_else(|| match status {
            401 => "UNAUTHORIZED".to_string(),
            400 => "BAD_REQUEST".to_string(),
            _ => "HTTP_ERROR".to_string(),
        });
        Self {
            error: message,
            code,
            status: Some(status),
            details: parsed.as_ref().and_then(|v| v.get("details")).cloned(),
        }
    }

    pub fn is_unauthorized(&self) -> bool {
        self.status == Some(401)
    }
}

impl From<crate::utils::storage::StorageError> for ApiError {
    fn from(err: crate::utils::storage::StorageError) -> Self {
        ApiError::storage(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn api_error_helpers_set_codes() {
        assert_eq!(ApiError::unknown("x").code, "UNKNOWN");
        assert_eq!(ApiError::request_failed("x").code, "REQUEST_FAILED");
        assert_eq!(ApiError::missing_precondition("x").code, "MISSING_PRECONDITION");
        assert_eq!(ApiError::decode("x").code, "DECODE_FAILED");
    }

    #[test]
    fn from_status_prefers_structured_body() {
        let body = json!({ "error": "Invalid credentials", "code": "UNAUTHORIZED" });
        let err = ApiError::from_status(401, body.to_string().as_bytes());
        assert_eq!(err.error, "Invalid credentials");
        assert_eq!(err.code, "UNAUTHORIZED");
        assert!(err.is_unauthorized());

        let body = json!({ "message": "voice not found" });
        let err = ApiError::from_status(404, body.to_string().as_bytes());
        assert_eq!(err.error, "voice not found");
        assert_eq!(err.code, "HTTP_ERROR");
    }

    #[test]
    fn from_status_falls_back_for_opaque_bodies() {
        let err = ApiError::from_status(502, b"<html>bad gateway</html>");
        assert_eq!(err.error, "Request failed with status 502");
        assert_eq!(err.status, Some(502));
        assert!(err.details.is_none());
    }

    #[test]
    fn optional_fields_are_omitted_from_payloads() {
        let payload = serde_json::to_value(ChatCreateRequest {
            user_id: "u1".into(),
            title: "Dreams".into(),
            folder_id: None,
        })
        .unwrap();
        assert_eq!(payload, json!({ "user_id": "u1", "title": "Dreams" }));
    }
}
