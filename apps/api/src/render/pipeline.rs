//! PDF pipeline: render → upload → presign → persist → prune older objects.
//!
//! Each session keeps one PDF object. Uploads get a fresh timestamped key and
//! the stored pointer only moves forward in `(version, key)` order. Only the
//! run that moved the pointer deletes keys older than its own; a run that
//! lost to a newer one deletes its own upload. A failed upload never leaves
//! the session without its previous PDF.

use std::time::Duration;

use bytes::Bytes;
use chrono::Utc;
use lazy_static::lazy_static;
use regex::Regex;
use serde_json::json;
use tracing::{info, warn};

use crate::errors::AppError;
use crate::models::content::PdfRecord;
use crate::render::objects::ObjectStore;
use crate::render::pool::{PoolError, RenderPool};
use crate::reporting::{ErrorReporter, ReportFlow};
use crate::store::CvStore;
use crate::workflow::session::validate_session_id;

const MAX_FILENAME_CHARS: usize = 80;

lazy_static! {
    static ref UNSAFE_FILENAME_CHARS: Regex = Regex::new(r"[^A-Za-z0-9_\-]+").unwrap();
}

/// Reduces a user-supplied file name to `[A-Za-z0-9_-]`, without extension.
/// Falls back to `cv` when nothing usable is left.
pub fn sanitize_filename(name: &str) -> String {
    let trimmed = name.trim();
    let stem = match trimmed.len().checked_sub(4) {
        Some(cut) if trimmed.is_char_boundary(cut) && trimmed[cut..].eq_ignore_ascii_case(".pdf") => {
            &trimmed[..cut]
        }
        _ => trimmed,
    };
    let cleaned = UNSAFE_FILENAME_CHARS.replace_all(stem, "_");
    let cleaned: String = cleaned
        .trim_matches('_')
        .chars()
        .take(MAX_FILENAME_CHARS)
        .collect();
    if cleaned.is_empty() {
        "cv".to_string()
    } else {
        cleaned
    }
}

pub fn session_prefix(session_id: &str) -> String {
    format!("cv-pdfs/{session_id}/")
}

/// Render timestamp of an object key shaped `<prefix><millis>_<stem>.pdf`.
/// `None` for keys that do not follow that shape.
pub fn key_version(prefix: &str, key: &str) -> Option<i64> {
    let (millis, _) = key.strip_prefix(prefix)?.split_once('_')?;
    millis.parse().ok()
}

#[derive(Debug)]
pub struct RenderedPdf {
    pub bytes: Bytes,
    pub record: PdfRecord,
}

/// Borrowed dependencies of one PDF generation.
pub struct PdfPipeline<'a> {
    pub renderer: &'a RenderPool,
    pub objects: &'a dyn ObjectStore,
    pub store: &'a dyn CvStore,
    pub reporter: &'a ErrorReporter,
    pub signed_url_ttl: Duration,
}

impl PdfPipeline<'_> {
    pub async fn run(&self, session_id: &str, html: &str, file_name: &str) -> Result<RenderedPdf, AppError> {
        validate_session_id(session_id)?;
        if html.trim().is_empty() {
            return Err(AppError::Validation("html cannot be empty".to_string()));
        }
        if self.store.get_content(session_id).await?.is_none() {
            return Err(AppError::NotFound(format!("No CV content for session {session_id}")));
        }

        let bytes = match self.renderer.render(html).await {
            Ok(bytes) => bytes,
            Err(PoolError::Render(e)) => {
                self.reporter
                    .report(
                        ReportFlow::Render,
                        Some(session_id),
                        &format!("PDF render failed: {e}"),
                        json!({"file_name": file_name, "html_bytes": html.len()}),
                    )
                    .await;
                return Err(PoolError::Render(e).into());
            }
            Err(e) => return Err(e.into()),
        };

        let stem = sanitize_filename(file_name);
        let version = Utc::now().timestamp_millis();
        let key = format!("{}{version}_{stem}.pdf", session_prefix(session_id));
        self.objects
            .put(&key, bytes.clone(), "application/pdf")
            .await
            .map_err(|e| AppError::Storage(e.to_string()))?;

        let url = match self.objects.presign_get(&key, self.signed_url_ttl).await {
            Ok(url) => url,
            Err(e) => {
                self.discard(&key).await;
                return Err(AppError::Storage(e.to_string()));
            }
        };

        let record = PdfRecord {
            url,
            filename: format!("{stem}.pdf"),
            key,
            version,
        };
        if self.store.set_pdf(session_id, &record).await? {
            self.prune_older(session_id, &record).await;
            info!("PDF for session {session_id} stored at {}", record.key);
        } else {
            self.discard(&record.key).await;
            if self.store.get_content(session_id).await?.is_none() {
                return Err(AppError::NotFound(format!("No CV content for session {session_id}")));
            }
            info!(
                "PDF {} for session {session_id} superseded by a newer render",
                record.key
            );
        }

        Ok(RenderedPdf { bytes, record })
    }

    /// Best-effort removal of objects under the session prefix that sort before
    /// `current`. Newer keys belong to a concurrent run and are left alone.
    async fn prune_older(&self, session_id: &str, current: &PdfRecord) {
        let prefix = session_prefix(session_id);
        let keys = match self.objects.list(&prefix).await {
            Ok(keys) => keys,
            Err(e) => {
                warn!("Could not list previous PDFs for session {session_id}: {e}");
                return;
            }
        };
        let newest = (Some(current.version), current.key.as_str());
        for key in keys {
            if (key_version(&prefix, &key), key.as_str()) >= newest {
                continue;
            }
            if let Err(e) = self.objects.delete(&key).await {
                warn!("Could not delete stale PDF {key}: {e}");
            }
        }
    }

    async fn discard(&self, key: &str) {
        if let Err(e) = self.objects.delete(key).await {
            warn!("Could not delete unused PDF {key}: {e}");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::OperatorConfig;
    use crate::models::session::PackageTier;
    use crate::store::MemoryStore;
    use crate::testing::{paid_session_with_answers, MemoryObjects, StubRenderer};
    use anyhow::Result;
    use async_trait::async_trait;
    use std::sync::Arc;
    use tokio::sync::Barrier;

    #[test]
    fn test_key_version_parses_millis() {
        let prefix = session_prefix("S1");
        assert_eq!(key_version(&prefix, "cv-pdfs/S1/1792315684794_cv.pdf"), Some(1792315684794));
        assert_eq!(key_version(&prefix, "cv-pdfs/S1/900_my_cv.pdf"), Some(900));
        assert_eq!(key_version(&prefix, "cv-pdfs/S1/legacy.pdf"), None);
        assert_eq!(key_version(&prefix, "cv-pdfs/S10/5_cv.pdf"), None);
    }

    #[test]
    fn test_sanitize_filename() {
        assert_eq!(sanitize_filename("Dana Levi CV.pdf"), "Dana_Levi_CV");
        assert_eq!(sanitize_filename("../../etc/passwd"), "etc_passwd");
        assert_eq!(sanitize_filename("קורות חיים.PDF"), "cv");
        assert_eq!(sanitize_filename(""), "cv");
        assert_eq!(sanitize_filename(&"a".repeat(200)).len(), MAX_FILENAME_CHARS);
    }

    struct Fixture {
        store: Arc<MemoryStore>,
        objects: MemoryObjects,
        pool: RenderPool,
        reporter: ErrorReporter,
    }

    impl Fixture {
        async fn new() -> Self {
            let store = Arc::new(MemoryStore::new());
            paid_session_with_answers(&store, "S1", PackageTier::Basic).await;
            Self {
                reporter: ErrorReporter::new(store.clone(), OperatorConfig::default()),
                store,
                objects: MemoryObjects::default(),
                pool: RenderPool::new(Arc::new(StubRenderer), 2, 2),
            }
        }

        fn pipeline(&self) -> PdfPipeline<'_> {
            self.pipeline_with(&self.objects)
        }

        fn pipeline_with<'a>(&'a self, objects: &'a dyn ObjectStore) -> PdfPipeline<'a> {
            PdfPipeline {
                renderer: &self.pool,
                objects,
                store: self.store.as_ref(),
                reporter: &self.reporter,
                signed_url_ttl: Duration::from_secs(60),
            }
        }
    }

    #[tokio::test]
    async fn test_pdf_is_uploaded_and_pointer_persisted() {
        let fx = Fixture::new().await;
        let pdf = fx.pipeline().run("S1", "<p>cv</p>", "Dana CV").await.unwrap();

        assert!(pdf.bytes.starts_with(b"%PDF"));
        assert!(pdf.record.key.starts_with("cv-pdfs/S1/"));
        assert!(pdf.record.key.ends_with("_Dana_CV.pdf"));

        let row = fx.store.get_content("S1").await.unwrap().unwrap();
        assert_eq!(row.pdf_url.as_deref(), Some(pdf.record.url.as_str()));
        assert_eq!(row.pdf_filename.as_deref(), Some("Dana_CV.pdf"));
    }

    #[tokio::test]
    async fn test_regenerating_leaves_a_single_object() {
        let fx = Fixture::new().await;
        let first = fx.pipeline().run("S1", "<p>v1</p>", "cv").await.unwrap();
        tokio::time::sleep(Duration::from_millis(2)).await;
        let second = fx.pipeline().run("S1", "<p>v2</p>", "cv").await.unwrap();

        let keys = fx.objects.keys();
        assert_eq!(keys, vec![second.record.key.clone()]);
        assert_ne!(first.record.key, second.record.key);

        let row = fx.store.get_content("S1").await.unwrap().unwrap();
        assert_eq!(row.pdf_key.as_deref(), Some(second.record.key.as_str()));
    }

    #[tokio::test]
    async fn test_other_sessions_objects_are_untouched() {
        let fx = Fixture::new().await;
        fx.objects
            .put("cv-pdfs/S10/1_cv.pdf", Bytes::from_static(b"%PDF"), "application/pdf")
            .await
            .unwrap();

        fx.pipeline().run("S1", "<p>cv</p>", "cv").await.unwrap();
        assert!(fx.objects.keys().contains(&"cv-pdfs/S10/1_cv.pdf".to_string()));
    }

    #[tokio::test]
    async fn test_empty_html_is_rejected() {
        let fx = Fixture::new().await;
        let err = fx.pipeline().run("S1", "  ", "cv").await.unwrap_err();
        assert!(matches!(err, AppError::Validation(_)));
        assert!(fx.objects.keys().is_empty());
    }

    #[tokio::test]
    async fn test_unknown_session_is_not_rendered() {
        let fx = Fixture::new().await;
        let err = fx.pipeline().run("S404", "<p>cv</p>", "cv").await.unwrap_err();
        assert!(matches!(err, AppError::NotFound(_)));
    }

    #[tokio::test]
    async fn test_prune_compares_render_time_not_key_text() {
        let fx = Fixture::new().await;
        // "900_" sorts after "1…" as text but is the older render.
        let stale = "cv-pdfs/S1/900_old.pdf".to_string();
        let legacy = "cv-pdfs/S1/legacy.pdf".to_string();
        let future = format!("cv-pdfs/S1/{}_next.pdf", i64::MAX);
        for key in [&stale, &legacy, &future] {
            fx.objects
                .put(key, Bytes::from_static(b"%PDF"), "application/pdf")
                .await
                .unwrap();
        }

        let pdf = fx.pipeline().run("S1", "<p>cv</p>", "cv").await.unwrap();

        let keys = fx.objects.keys();
        assert!(keys.contains(&pdf.record.key));
        assert!(keys.contains(&future));
        assert!(!keys.contains(&stale));
        assert!(!keys.contains(&legacy));
    }

    /// Holds every upload until `parties` uploads have landed, so concurrent
    /// runs are both past `put` before either persists its pointer.
    struct GatedUploads {
        inner: MemoryObjects,
        gate: Barrier,
    }

    #[async_trait]
    impl ObjectStore for GatedUploads {
        async fn put(&self, key: &str, body: Bytes, content_type: &str) -> Result<()> {
            self.inner.put(key, body, content_type).await?;
            self.gate.wait().await;
            Ok(())
        }

        async fn list(&self, prefix: &str) -> Result<Vec<String>> {
            self.inner.list(prefix).await
        }

        async fn delete(&self, key: &str) -> Result<()> {
            self.inner.delete(key).await
        }

        async fn presign_get(&self, key: &str, ttl: Duration) -> Result<String> {
            self.inner.presign_get(key, ttl).await
        }
    }

    #[tokio::test]
    async fn test_overlapping_renders_keep_the_stored_pdf() {
        let fx = Fixture::new().await;
        let gated = GatedUploads {
            inner: fx.objects.clone(),
            gate: Barrier::new(2),
        };
        let pipeline = fx.pipeline_with(&gated);

        let (a, b) = tokio::join!(
            pipeline.run("S1", "<p>a</p>", "a"),
            pipeline.run("S1", "<p>b</p>", "b"),
        );
        let (a, b) = (a.unwrap(), b.unwrap());
        assert_ne!(a.record.key, b.record.key);

        let row = fx.store.get_content("S1").await.unwrap().unwrap();
        let stored = row.pdf_key.expect("pointer persisted");
        let newest = [&a.record, &b.record]
            .into_iter()
            .max_by(|x, y| (x.version, &x.key).cmp(&(y.version, &y.key)))
            .unwrap();
        assert_eq!(stored, newest.key);
        assert_eq!(row.pdf_version, Some(newest.version));
        assert_eq!(fx.objects.keys(), vec![stored]);
    }

    #[tokio::test]
    async fn test_older_render_does_not_replace_newer_pointer() {
        let fx = Fixture::new().await;
        let newer = PdfRecord {
            url: "https://objects.example.test/new".to_string(),
            filename: "new.pdf".to_string(),
            key: format!("cv-pdfs/S1/{}_new.pdf", i64::MAX),
            version: i64::MAX,
        };
        assert!(fx.store.set_pdf("S1", &newer).await.unwrap());

        let pdf = fx.pipeline().run("S1", "<p>cv</p>", "cv").await.unwrap();

        let row = fx.store.get_content("S1").await.unwrap().unwrap();
        assert_eq!(row.pdf_key.as_deref(), Some(newer.key.as_str()));
        assert!(!fx.objects.keys().contains(&pdf.record.key));
    }
}
