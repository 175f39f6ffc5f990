use std::sync::Arc;

use crate::config::Config;
use crate::generation::generator::Generator;
use crate::generation::queue::GenerationQueue;
use crate::llm_client::LlmBackend;
use crate::payment::PaymentGateway;
use crate::render::{ObjectStore, RenderPool};
use crate::reporting::ErrorReporter;
use crate::store::CvStore;

/// Shared application state injected into all route handlers via Axum extractors.
#[derive(Clone)]
pub struct AppState {
    /// Postgres in production, in-memory when `DATABASE_URL` is unset.
    pub store: Arc<dyn CvStore>,
    pub llm: Arc<dyn LlmBackend>,
    pub objects: Arc<dyn ObjectStore>,
    pub renderer: RenderPool,
    pub generator: Generator,
    /// Producer side of the background generation queue.
    pub jobs: GenerationQueue,
    pub payments: PaymentGateway,
    pub reporter: ErrorReporter,
    pub config: Config,
}
