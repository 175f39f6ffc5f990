//! Bounded render admission: `workers` renders run at once, at most
//! `queue_depth` more wait for a slot, and anything beyond that is turned
//! away with 503 instead of piling up browser processes.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use bytes::Bytes;
use tokio::sync::Semaphore;
use tracing::debug;

use crate::errors::AppError;
use crate::render::chromium::{PdfRenderer, RenderError};

#[derive(Clone)]
pub struct RenderPool {
    renderer: Arc<dyn PdfRenderer>,
    slots: Arc<Semaphore>,
    waiting: Arc<AtomicUsize>,
    queue_depth: usize,
}

/// Why a render did not produce a PDF.
#[derive(Debug)]
pub enum PoolError {
    Saturated,
    Render(RenderError),
}

impl From<PoolError> for AppError {
    fn from(e: PoolError) -> Self {
        match e {
            PoolError::Saturated => {
                AppError::Unavailable("PDF rendering is busy, please try again shortly".to_string())
            }
            PoolError::Render(e) => AppError::Render(e.to_string()),
        }
    }
}

struct WaitGuard(Arc<AtomicUsize>);

impl Drop for WaitGuard {
    fn drop(&mut self) {
        self.0.fetch_sub(1, Ordering::Relaxed);
    }
}

impl RenderPool {
    pub fn new(renderer: Arc<dyn PdfRenderer>, workers: usize, queue_depth: usize) -> Self {
        Self {
            renderer,
            slots: Arc::new(Semaphore::new(workers.max(1))),
            waiting: Arc::new(AtomicUsize::new(0)),
            queue_depth,
        }
    }

    pub async fn render(&self, html: &str) -> Result<Bytes, PoolError> {
        let _permit = match self.slots.clone().try_acquire_owned() {
            Ok(permit) => permit,
            Err(_) => {
                let depth = self.waiting.fetch_add(1, Ordering::Relaxed) + 1;
                let _guard = WaitGuard(self.waiting.clone());
                if depth > self.queue_depth {
                    return Err(PoolError::Saturated);
                }
                debug!("Render queued ({depth}/{} waiting)", self.queue_depth);
                self.slots
                    .clone()
                    .acquire_owned()
                    .await
                    .map_err(|_| PoolError::Saturated)?
            }
        };

        self.renderer.render(html).await.map_err(PoolError::Render)
    }
}
