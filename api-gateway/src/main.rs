//! Gateway Lambda - Handles /chat, /health and /metrics.
//!
//! Builds every component once per container and serves requests through the
//! Lambda HTTP runtime. TLS terminates at the fronting API Gateway.

use std::sync::Arc;

use lambda_http::{run, service_fn, Error, Request};
use shared::{
    resolve_signing_secret, AccessPolicy, Config, Gateway, HealthAggregator, HealthProbe,
    HttpHealthProbe, InMemoryMetricsRecorder, LambdaConversationEngine, TokenValidator,
};
use tracing::info;
use tracing_subscriber::EnvFilter;

async fn build_gateway() -> Result<Gateway, Error> {
    let config = Config::from_env()?;
    let aws_config = aws_config::load_defaults(aws_config::BehaviorVersion::latest()).await;

    let secrets_client = aws_sdk_secretsmanager::Client::new(&aws_config);
    let signing_secret = resolve_signing_secret(&secrets_client, &config.signing_secret).await?;

    let mut validator =
        TokenValidator::new(signing_secret.as_bytes()).with_leeway(config.jwt_leeway_seconds);
    if let Some(issuer) = &config.jwt_issuer {
        validator = validator.with_issuer(issuer);
    }
    if let Some(audience) = &config.jwt_audience {
        validator = validator.with_audience(audience);
    }

    let engine = LambdaConversationEngine::new(
        aws_sdk_lambda::Client::new(&aws_config),
        config.conversation_function_name.clone(),
    );

    let http_client = reqwest::Client::builder()
        .timeout(config.probe_timeout)
        .build()?;
    let probes: Vec<Arc<dyn HealthProbe>> = vec![
        Arc::new(HttpHealthProbe::new(
            "data_pipeline",
            config.data_pipeline_health_url.clone(),
            http_client.clone(),
        )),
        Arc::new(HttpHealthProbe::new(
            "sentiment_analyzer",
            config.sentiment_analyzer_health_url.clone(),
            http_client.clone(),
        )),
        Arc::new(HttpHealthProbe::new(
            "prediction_engine",
            config.prediction_engine_health_url.clone(),
            http_client,
        )),
    ];
    let health = HealthAggregator::new(probes).with_probe_timeout(config.probe_timeout);

    let metrics = InMemoryMetricsRecorder::new(config.metrics_retention);

    info!(
        conversation_function = %config.conversation_function_name,
        allowed_hosts = ?config.allowed_hosts,
        "gateway configured"
    );

    Ok(Gateway::new(validator, Arc::new(engine), Arc::new(health), Arc::new(metrics))
        .with_access_policy(AccessPolicy::new(
            config.allowed_hosts.clone(),
            config.allowed_origins.clone(),
        ))
        .with_chat_timeout(config.chat_timeout))
}

#[tokio::main]
async fn main() -> Result<(), Error> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .json()
        .init();

    let gateway = Arc::new(build_gateway().await?);

    run(service_fn(move |event: Request| {
        let gateway = Arc::clone(&gateway);
        async move { Ok::<_, Error>(gateway.handle(event).await) }
    }))
    .await
}
