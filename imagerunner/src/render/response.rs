//! Render responses in the serving platform's shape.
//!
//! Binary bodies are base64-encoded with an accompanying flag, matching
//! the binary-transport contract of the serverless platform the handler
//! runs on.

use base64::engine::general_purpose::STANDARD;
use base64::Engine as _;

/// A complete response to one render request.
#[derive(Debug, Clone, PartialEq)]
pub struct RenderResponse {
    pub status_code: u16,
    pub content_type: Option<String>,
    pub body: String,
    pub is_base64_encoded: bool,
}

impl RenderResponse {
    /// 404: no descriptor (or unparseable request path).
    pub fn not_found() -> Self {
        Self {
            status_code: 404,
            content_type: None,
            body: "Not found".to_string(),
            is_base64_encoded: false,
        }
    }

    /// 400: valid output, but beyond the response-size ceiling. The bytes
    /// are withheld.
    pub fn too_large() -> Self {
        Self {
            status_code: 400,
            content_type: None,
            body: "Requested image is too large. Maximum size is 6MB.".to_string(),
            is_base64_encoded: false,
        }
    }

    /// 500 with a JSON body carrying the failure detail.
    pub fn server_error(detail: serde_json::Value) -> Self {
        Self {
            status_code: 500,
            content_type: Some("application/json".to_string()),
            body: detail.to_string(),
            is_base64_encoded: false,
        }
    }

    /// 200 with the transformed image, base64-encoded.
    pub fn image(bytes: &[u8], format: &str) -> Self {
        Self {
            status_code: 200,
            content_type: Some(format!("image/{format}")),
            body: STANDARD.encode(bytes),
            is_base64_encoded: true,
        }
    }

    pub fn is_success(&self) -> bool {
        self.status_code == 200
    }

    /// Decodes a base64 body back to bytes; `None` for text bodies.
    pub fn decoded_body(&self) -> Option<Vec<u8>> {
        if self.is_base64_encoded {
            STANDARD.decode(&self.body).ok()
        } else {
            None
        }
    }
}
