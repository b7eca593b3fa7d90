//! vodpipe server: HTTP intake plus the background job pipeline.

use std::sync::Arc;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;
use vodpipe::adapters::aws::S3Adapter;
use vodpipe::adapters::ffmpeg::FfmpegTools;
use vodpipe::adapters::http::api::{self, AppState, RouterOptions};
use vodpipe::adapters::http::registry::HttpJobRegistry;
use vodpipe::adapters::local::FsAdapter;
use vodpipe::adapters::openai::OpenAiSpeech;
use vodpipe::application::dispatcher::JobDispatcher;
use vodpipe::application::pipeline::{JobPipeline, PipelineSettings};
use vodpipe::config::{AppConfig, StorageBackend};
use vodpipe::ports::media::MediaToolsPort;
use vodpipe::ports::registry::JobRegistryPort;
use vodpipe::ports::speech::SpeechPort;
use vodpipe::ports::storage::ObjectStorePort;

#[tokio::main]
async fn main() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt().with_env_filter(filter).init();

    let config = match AppConfig::from_env() {
        Ok(config) => config,
        Err(e) => {
            error!(error = %e, "Invalid configuration");
            std::process::exit(1);
        }
    };

    // 1. Adapters
    let store: Arc<dyn ObjectStorePort> = match &config.storage.backend {
        StorageBackend::S3 => Arc::new(S3Adapter::from_config(&config.storage)),
        StorageBackend::Fs(root) => Arc::new(FsAdapter::new(root.clone())),
    };
    let tools: Arc<dyn MediaToolsPort> = Arc::new(FfmpegTools::default());
    let speech: Arc<dyn SpeechPort> = Arc::new(OpenAiSpeech::new(&config.speech));
    let registry: Arc<dyn JobRegistryPort> = Arc::new(HttpJobRegistry::new(&config.registry));

    // 2. Application services
    let pipeline = Arc::new(JobPipeline::new(
        store,
        tools,
        speech,
        registry.clone(),
        PipelineSettings::from_config(&config),
    ));
    let (dispatcher, _consumer) = JobDispatcher::start(pipeline.clone());

    // 3. HTTP layer
    let state = AppState {
        pipeline,
        registry,
        dispatcher,
        api_secret_key: config.api_secret_key.clone(),
    };
    let app = api::router(state, &RouterOptions::from_config(&config));

    let listener = match tokio::net::TcpListener::bind(config.bind_address()).await {
        Ok(listener) => listener,
        Err(e) => {
            error!(address = %config.bind_address(), error = %e, "Failed to bind TCP listener");
            std::process::exit(1);
        }
    };
    info!(address = %config.bind_address(), env = %config.env, "Listening");

    if let Err(e) = axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
    {
        error!(error = %e, "Server error");
        std::process::exit(1);
    }
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        error!(error = %e, "Failed to listen for shutdown signal");
        return;
    }
    info!("Shutting down");
}
