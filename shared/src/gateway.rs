//! Route table for the insights API.
//!
//! Every request moves through authentication, route-specific
//! authorization and dispatch, and ends in exactly one response. Failures
//! become coarse responses here; their detail only reaches the logs.

use std::sync::Arc;
use std::time::{Duration, Instant};

use lambda_http::http::header::{HOST, ORIGIN};
use lambda_http::http::{Method, StatusCode};
use lambda_http::{Body, Request, Response};
use tracing::{error, info, warn};
use uuid::Uuid;
use validator::Validate;

use crate::auth::{bearer_credential, Identity, Role, TokenValidator};
use crate::conversation::ConversationEngine;
use crate::health::{HealthCheck, HealthSnapshot};
use crate::http::{error_response, json_response, parse_json_body, AccessPolicy};
use crate::metrics::{ChatMetricRecord, MetricsRecorder};
use crate::models::{ChatInteraction, ChatRequest, ChatResponse};
use crate::pipeline::RequestPipeline;
use crate::{Error, Result};

/// Default bound on a conversation engine call.
pub const DEFAULT_CHAT_TIMEOUT: Duration = Duration::from_secs(30);

/// Query type recorded when the engine does not report one.
const DEFAULT_QUERY_TYPE: &str = "general";

/// The gateway and every collaborator it dispatches to.
pub struct Gateway {
    validator: TokenValidator,
    engine: Arc<dyn ConversationEngine>,
    health: Arc<dyn HealthCheck>,
    metrics: Arc<dyn MetricsRecorder>,
    pipeline: RequestPipeline,
    access: AccessPolicy,
    chat_timeout: Duration,
}

impl Gateway {
    pub fn new(
        validator: TokenValidator,
        engine: Arc<dyn ConversationEngine>,
        health: Arc<dyn HealthCheck>,
        metrics: Arc<dyn MetricsRecorder>,
    ) -> Self {
        Self {
            validator,
            engine,
            health,
            pipeline: RequestPipeline::new(Arc::clone(&metrics)),
            metrics,
            access: AccessPolicy::default(),
            chat_timeout: DEFAULT_CHAT_TIMEOUT,
        }
    }

    pub fn with_access_policy(mut self, access: AccessPolicy) -> Self {
        self.access = access;
        self
    }

    pub fn with_chat_timeout(mut self, chat_timeout: Duration) -> Self {
        self.chat_timeout = chat_timeout;
        self
    }

    /// Serve one request. Never fails: every outcome is a response.
    pub async fn handle(&self, request: Request) -> Response<Body> {
        self.pipeline
            .run(request, |request| self.dispatch(request))
            .await
    }

    async fn dispatch(&self, request: Request) -> Response<Body> {
        let origin = request
            .headers()
            .get(ORIGIN)
            .and_then(|v| v.to_str().ok())
            .map(str::to_string);

        let mut response = match self.route(&request, origin.as_deref()).await {
            Ok(response) => response,
            Err(err) => reject(err),
        };

        self.access.apply_cors(&mut response, origin.as_deref());
        response
    }

    async fn route(&self, request: &Request, origin: Option<&str>) -> Result<Response<Body>> {
        let host = request.headers().get(HOST).and_then(|v| v.to_str().ok());
        if !self.access.host_allowed(host) {
            return Err(Error::Validation("Invalid host header".to_string()));
        }

        if *request.method() == Method::OPTIONS {
            let header = |name: &str| request.headers().get(name).and_then(|v| v.to_str().ok());
            let requested_method = header("access-control-request-method");
            if let (Some(origin), Some(method)) = (origin, requested_method) {
                let requested_headers = header("access-control-request-headers");
                return self.access.preflight(origin, method, requested_headers);
            }
        }

        match (request.method().as_str(), request.uri().path()) {
            ("POST", "/chat") => self.chat(request).await,
            ("GET", "/health") => Ok(self.health().await),
            ("GET", "/metrics") => self.metrics(request).await,
            (method, path @ ("/chat" | "/health" | "/metrics")) => {
                Err(Error::MethodNotAllowed(format!("{method} {path}")))
            }
            (_, path) => Err(Error::NotFound(path.to_string())),
        }
    }

    /// Unauthenticated -> Authenticated. The failure reason is logged, not returned.
    fn authenticate(&self, request: &Request) -> Result<Identity> {
        let identity = bearer_credential(request.headers())
            .and_then(|credential| self.validator.verify(credential))
            .map_err(|err| {
                warn!(reason = err.reason(), error = %err, "authentication failed");
                Error::Auth(err)
            })?;

        Ok(identity)
    }

    async fn chat(&self, request: &Request) -> Result<Response<Body>> {
        let identity = self.authenticate(request)?;

        let chat_request: ChatRequest = parse_json_body(request.body())?;
        chat_request
            .validate()
            .map_err(|e| Error::Validation(format!("Invalid request: {}", e)))?;
        if chat_request.message.trim().is_empty() {
            return Err(Error::Validation("Message cannot be empty".to_string()));
        }

        let interaction = ChatInteraction {
            message: chat_request.message,
            session_id: chat_request
                .session_id
                .filter(|s| !s.trim().is_empty())
                .unwrap_or_else(|| Uuid::new_v4().to_string()),
            context: chat_request.context,
            user_id: identity.user_id,
        };

        info!(
            user_id = %interaction.user_id,
            session_id = %interaction.session_id,
            preview = %preview(&interaction.message),
            "chat request"
        );

        let started = Instant::now();
        let call = tokio::time::timeout(self.chat_timeout, self.engine.process(&interaction));
        let outcome = match call.await {
            Ok(outcome) => outcome,
            Err(_) => Err(Error::Timeout(format!(
                "conversation engine exceeded {}ms",
                self.chat_timeout.as_millis()
            ))),
        };

        match outcome {
            Ok(mut reply) => {
                // The caller sees the same query type and latency the metric records.
                let query_type = reply
                    .metadata
                    .query_type
                    .get_or_insert_with(|| DEFAULT_QUERY_TYPE.to_string())
                    .clone();
                let latency = *reply
                    .metadata
                    .response_time
                    .get_or_insert_with(|| started.elapsed().as_secs_f64());

                let record =
                    ChatMetricRecord::succeeded(&interaction.user_id, &query_type, latency);
                self.metrics.record_chat(record).await;

                Ok(json_response(
                    StatusCode::OK,
                    &ChatResponse {
                        reply: reply.reply,
                        session_id: interaction.session_id,
                        metadata: reply.metadata,
                    },
                ))
            }
            Err(err) => {
                error!(user_id = %interaction.user_id, error = %err, "chat processing failed");
                self.metrics
                    .record_chat(ChatMetricRecord::failed(&interaction.user_id))
                    .await;
                Err(err)
            }
        }
    }

    /// Unauthenticated; an aggregator failure still yields a snapshot.
    async fn health(&self) -> Response<Body> {
        let snapshot = match self.health.check().await {
            Ok(snapshot) => snapshot,
            Err(err) => {
                error!(error = %err, "health check failed");
                HealthSnapshot::unavailable()
            }
        };
        json_response(StatusCode::OK, &snapshot)
    }

    async fn metrics(&self, request: &Request) -> Result<Response<Body>> {
        let identity = self.authenticate(request)?;
        identity.require_role(Role::Admin)?;

        let snapshot = self.metrics.snapshot().await?;
        Ok(json_response(StatusCode::OK, &snapshot))
    }
}

/// Turn an error into its coarse caller-facing response.
fn reject(err: Error) -> Response<Body> {
    let status =
        StatusCode::from_u16(err.status_code()).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);

    if status.is_server_error() {
        error!(status = status.as_u16(), error = %err, "request failed");
    } else {
        info!(status = status.as_u16(), error = %err, "request rejected");
    }

    error_response(status, err.public_message())
}

fn preview(message: &str) -> String {
    message.chars().take(50).collect()
}
