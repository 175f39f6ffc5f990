mod admin;
mod chat;
mod config;
mod coupons;
mod db;
mod errors;
mod generation;
mod llm_client;
mod models;
mod payment;
mod render;
mod reporting;
mod routes;
mod state;
mod store;
#[cfg(test)]
mod testing;
mod validation;
mod workflow;

use anyhow::{Context, Result};
use aws_config::Region;
use aws_sdk_s3::config::Credentials;
use std::net::SocketAddr;
use std::sync::Arc;
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use crate::config::{Config, LlmProvider};
use crate::db::create_pool;
use crate::generation::generator::Generator;
use crate::generation::queue::{reconcile_interrupted, spawn_workers, GenerationQueue};
use crate::generation::retry::RetryPolicy;
use crate::llm_client::{AnthropicClient, LlmBackend, OpenAiClient};
use crate::payment::PaymentGateway;
use crate::render::{ChromiumRenderer, RenderPool, S3ObjectStore};
use crate::reporting::ErrorReporter;
use crate::routes::build_router;
use crate::state::AppState;
use crate::store::{CvStore, MemoryStore, PgStore};

/// Pending background jobs beyond which producers wait for a free slot.
const GENERATION_QUEUE_CAPACITY: usize = 256;

#[tokio::main]
async fn main() -> Result<()> {
    // Load configuration first (fails on missing required env vars)
    let config = Config::from_env()?;

    // Initialize structured logging
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| {
            EnvFilter::new(format!("{}={}", env!("CARGO_CRATE_NAME"), &config.rust_log))
        }))
        .with(tracing_subscriber::fmt::layer())
        .init();

    info!("Starting CVForge API v{}", env!("CARGO_PKG_VERSION"));

    // Initialize persistence
    let store: Arc<dyn CvStore> = match &config.database_url {
        Some(url) => {
            let pool = create_pool(url).await?;
            info!("PostgreSQL store initialized");
            Arc::new(PgStore::new(pool))
        }
        None => {
            warn!("DATABASE_URL is not set; using the in-memory store (data is lost on restart)");
            Arc::new(MemoryStore::new())
        }
    };

    // Initialize S3 / MinIO
    let s3 = build_s3_client(&config).await;
    let objects = Arc::new(S3ObjectStore::new(s3, config.s3_bucket.clone()));
    info!("S3 client initialized (bucket: {})", config.s3_bucket);

    // Initialize LLM client
    let llm: Arc<dyn LlmBackend> = match config.llm_provider {
        LlmProvider::Anthropic => Arc::new(AnthropicClient::new(
            config
                .anthropic_api_key
                .clone()
                .context("ANTHROPIC_API_KEY is not set")?,
        )),
        LlmProvider::OpenAi => Arc::new(OpenAiClient::new(
            config
                .openai_api_key
                .clone()
                .context("OPENAI_API_KEY is not set")?,
        )),
    };
    info!("LLM client initialized (provider: {})", llm.provider());

    // Initialize PDF rendering
    let renderer = RenderPool::new(
        Arc::new(ChromiumRenderer::new(
            config.chromium_path.clone(),
            config.render_timeout,
        )),
        config.render_workers,
        config.render_queue_depth,
    );
    info!(
        "Render pool: {} worker(s), queue depth {}",
        config.render_workers, config.render_queue_depth
    );

    // Initialize generation pipeline and background workers
    let reporter = ErrorReporter::new(store.clone(), config.operator.clone());
    let generator = Generator::new(
        store.clone(),
        llm.clone(),
        reporter.clone(),
        RetryPolicy::with_max_attempts(config.generation_max_attempts),
    );
    let (jobs, receiver) = GenerationQueue::new(GENERATION_QUEUE_CAPACITY);
    spawn_workers(generator.clone(), receiver, config.generation_workers);
    let requeued = reconcile_interrupted(store.as_ref(), &jobs).await?;
    info!(
        "{} generation worker(s) started; {requeued} interrupted job(s) re-queued",
        config.generation_workers
    );

    // Build app state
    let state = AppState {
        store,
        llm,
        objects,
        renderer,
        generator,
        jobs,
        payments: PaymentGateway::new(config.payment.clone(), config.public_base_url.clone()),
        reporter,
        config: config.clone(),
    };

    // Build router
    let app = build_router(state)
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive()); // TODO: restrict CORS to PUBLIC_BASE_URL once the front end is on its own origin

    let addr: SocketAddr = format!("0.0.0.0:{}", config.port).parse()?;
    info!("Listening on {addr}");

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}

/// Constructs an S3 client configured for MinIO (local) or AWS (production).
async fn build_s3_client(config: &Config) -> aws_sdk_s3::Client {
    let credentials = Credentials::new(
        &config.aws_access_key_id,
        &config.aws_secret_access_key,
        None,
        None,
        "cvforge-static",
    );

    let s3_config = aws_config::defaults(aws_config::BehaviorVersion::latest())
        .region(Region::new(config.s3_region.clone()))
        .credentials_provider(credentials)
        .endpoint_url(&config.s3_endpoint)
        .load()
        .await;

    // MinIO serves buckets under the path, not as subdomains.
    let s3_config = aws_sdk_s3::config::Builder::from(&s3_config)
        .force_path_style(true)
        .build();

    aws_sdk_s3::Client::from_conf(s3_config)
}
