//! Conversation engine client.
//!
//! The dialogue engine runs as its own Lambda; the gateway hands it one
//! [`ChatInteraction`] per chat request and reads back the reply.

use async_trait::async_trait;
use aws_sdk_lambda::primitives::Blob;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::models::{ChatInteraction, ChatMetadata};
use crate::{Error, Result};

/// Reply produced by the conversation engine.
#[derive(Debug, Clone)]
pub struct EngineReply {
    pub reply: String,
    pub metadata: ChatMetadata,
}

/// The dialogue engine contract the gateway depends on.
#[async_trait]
pub trait ConversationEngine: Send + Sync {
    async fn process(&self, interaction: &ChatInteraction) -> Result<EngineReply>;
}

/// Payload sent to the engine Lambda.
#[derive(Debug, Serialize)]
struct EngineRequest<'a> {
    message: &'a str,
    user_id: &'a str,
    session_id: &'a str,
    context: &'a Map<String, Value>,
    source: &'static str,
}

/// Payload returned by the engine Lambda.
#[derive(Debug, Deserialize)]
struct EngineResponse {
    /// `ok` or `error`
    status: String,
    #[serde(default)]
    reply: String,
    #[serde(default)]
    metadata: ChatMetadata,
    #[serde(default)]
    error: Option<String>,
}

impl EngineResponse {
    fn into_reply(self) -> Result<EngineReply> {
        if self.status == "error" {
            return Err(Error::Collaborator(
                self.error
                    .unwrap_or_else(|| "conversation engine reported an error".to_string()),
            ));
        }

        Ok(EngineReply {
            reply: self.reply,
            metadata: self.metadata,
        })
    }
}

/// Invokes the conversation engine Lambda synchronously.
pub struct LambdaConversationEngine {
    lambda_client: aws_sdk_lambda::Client,
    function_name: String,
}

impl LambdaConversationEngine {
    pub fn new(lambda_client: aws_sdk_lambda::Client, function_name: String) -> Self {
        Self {
            lambda_client,
            function_name,
        }
    }
}

#[async_trait]
impl ConversationEngine for LambdaConversationEngine {
    async fn process(&self, interaction: &ChatInteraction) -> Result<EngineReply> {
        let payload = serde_json::to_vec(&EngineRequest {
            message: &interaction.message,
            user_id: &interaction.user_id,
            session_id: &interaction.session_id,
            context: &interaction.context,
            source: "api",
        })?;

        let response = self
            .lambda_client
            .invoke()
            .function_name(&self.function_name)
            .payload(Blob::new(payload))
            .send()
            .await
            .map_err(|e| Error::Aws(format!("Failed to invoke conversation engine: {}", e)))?;

        if let Some(function_error) = response.function_error() {
            return Err(Error::Collaborator(format!(
                "conversation engine raised {}",
                function_error
            )));
        }

        let response_payload = response.payload().ok_or_else(|| {
            Error::Collaborator("No response payload from conversation engine".to_string())
        })?;

        let engine_response: EngineResponse = serde_json::from_slice(response_payload.as_ref())
            .map_err(|e| Error::Collaborator(format!("Failed to parse engine response: {}", e)))?;

        engine_response.into_reply()
    }
}
