//! In-process generation queue. Payment and coupon flows push a
//! `GenerationJob`; a fixed set of workers pull jobs and run the generation
//! pipeline. The queue is not persisted: `reconcile_interrupted` re-enqueues
//! whatever a previous process left in `processing`.

use std::sync::Arc;

use tokio::sync::{mpsc, Mutex};
use tokio::task::JoinHandle;
use tracing::{error, info, info_span, warn, Instrument};

use crate::errors::AppError;
use crate::generation::generator::Generator;
use crate::models::content::ContentStatus;
use crate::store::CvStore;

pub const INTERRUPTED_MESSAGE: &str = "Generation interrupted by a restart; re-queued";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GenerationJob {
    pub session_id: String,
    pub lang: Option<String>,
}

/// Producer half of the queue. Cheap to clone.
#[derive(Clone)]
pub struct GenerationQueue {
    sender: mpsc::Sender<GenerationJob>,
}

impl GenerationQueue {
    pub fn new(capacity: usize) -> (Self, mpsc::Receiver<GenerationJob>) {
        let (sender, receiver) = mpsc::channel(capacity.max(1));
        (Self { sender }, receiver)
    }

    /// Queues a job, waiting for room when the queue is full.
    pub async fn enqueue(&self, job: GenerationJob) -> Result<(), AppError> {
        info!("Queueing CV generation for session {}", job.session_id);
        self.sender
            .send(job)
            .await
            .map_err(|_| AppError::Unavailable("Generation workers are not running".to_string()))
    }
}

/// Starts `workers` tasks draining `receiver`. Each job runs the same pipeline
/// as `POST /api/generate-cv`; failures are already dead-lettered by it, so a
/// worker only logs them.
pub fn spawn_workers(
    generator: Generator,
    receiver: mpsc::Receiver<GenerationJob>,
    workers: usize,
) -> Vec<JoinHandle<()>> {
    let receiver = Arc::new(Mutex::new(receiver));
    (0..workers.max(1))
        .map(|worker_id| {
            let generator = generator.clone();
            let receiver = receiver.clone();
            tokio::spawn(
                async move {
                    loop {
                        let job = { receiver.lock().await.recv().await };
                        let Some(job) = job else {
                            info!("Generation queue closed; worker exiting");
                            break;
                        };
                        process_job(&generator, job).await;
                    }
                }
                .instrument(info_span!("generation_worker", worker_id)),
            )
        })
        .collect()
}

async fn process_job(generator: &Generator, job: GenerationJob) {
    match generator.run(&job.session_id, job.lang.as_deref()).await {
        Ok(outcome) if outcome.reused => {
            info!("Session {} was already generated", job.session_id)
        }
        Ok(_) => info!("Background generation finished for session {}", job.session_id),
        // Another request is already generating this session.
        Err(AppError::Conflict(msg)) => warn!("Skipping job for {}: {msg}", job.session_id),
        Err(e) => error!("Background generation failed for {}: {e}", job.session_id),
    }
}

/// Moves every record stuck in `processing` to `error` and queues it again.
/// Returns the number of re-queued sessions.
pub async fn reconcile_interrupted(
    store: &dyn CvStore,
    queue: &GenerationQueue,
) -> Result<usize, AppError> {
    let stuck = store.list_content_with_status(ContentStatus::Processing).await?;
    let mut requeued = 0;
    for row in stuck {
        if !store.fail_processing(&row.session_id, INTERRUPTED_MESSAGE).await? {
            continue;
        }
        queue
            .enqueue(GenerationJob {
                session_id: row.session_id.clone(),
                lang: Some(row.language.clone()),
            })
            .await?;
        requeued += 1;
    }
    if requeued > 0 {
        warn!("Re-queued {requeued} interrupted generation(s)");
    }
    Ok(requeued)
}
