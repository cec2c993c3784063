//! Shared wire and domain models.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use validator::Validate;

/// Chat request payload.
///
/// Any `user_id` or `role` field a client sends is ignored; identity comes
/// from the verified token only.
#[derive(Debug, Deserialize, Validate)]
pub struct ChatRequest {
    #[validate(length(min = 1, max = 4000, message = "message must be 1-4000 characters"))]
    pub message: String,
    #[serde(default)]
    pub session_id: Option<String>,
    #[serde(default)]
    pub context: Map<String, Value>,
}

/// One chat turn handed to the conversation engine.
#[derive(Debug, Clone, Serialize)]
pub struct ChatInteraction {
    pub message: String,
    pub session_id: String,
    pub context: Map<String, Value>,
    pub user_id: String,
}

/// Metadata the conversation engine reports alongside its reply.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ChatMetadata {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub query_type: Option<String>,
    /// Engine-side processing time in seconds
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub response_time: Option<f64>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// Chat response payload.
#[derive(Debug, Serialize, Deserialize)]
pub struct ChatResponse {
    pub reply: String,
    pub session_id: String,
    pub metadata: ChatMetadata,
}
