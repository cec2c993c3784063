//! Shared library for the fund insights gateway.
//!
//! This crate provides the request pipeline, token verification, health
//! aggregation, telemetry and the collaborator contracts used by the gateway
//! Lambda.

pub mod auth;
pub mod config;
pub mod conversation;
pub mod error;
pub mod gateway;
pub mod health;
pub mod http;
pub mod metrics;
pub mod models;
pub mod pipeline;
pub mod secrets;

pub use auth::{bearer_credential, Identity, Role, TokenClaims, TokenValidator};
pub use config::{Config, SigningSecretSource};
pub use conversation::{ConversationEngine, EngineReply, LambdaConversationEngine};
pub use error::{AuthError, Error, Result};
pub use gateway::Gateway;
pub use health::{
    ComponentStatus, HealthAggregator, HealthCheck, HealthProbe, HealthSnapshot, HttpHealthProbe,
};
pub use http::{AccessPolicy, ApiResponse};
pub use metrics::{
    ChatMetricRecord, InMemoryMetricsRecorder, MetricsRecorder, MetricsSnapshot,
    RequestMetricRecord,
};
pub use models::{ChatInteraction, ChatMetadata, ChatRequest, ChatResponse};
pub use pipeline::RequestPipeline;
pub use secrets::resolve_signing_secret;
