//! Test doubles shared by unit and router tests: a scripted model, an
//! in-memory bucket, a stub renderer and fixture helpers.

use std::collections::{BTreeMap, VecDeque};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use anyhow::Result;
use async_trait::async_trait;
use bytes::Bytes;
use chrono::Utc;
use serde_json::json;

use crate::config::Config;
use crate::generation::generator::Generator;
use crate::generation::queue::{GenerationJob, GenerationQueue};
use crate::generation::retry::RetryPolicy;
use crate::llm_client::{LlmBackend, LlmError};
use crate::models::session::{NewSession, PackageTier};
use crate::payment::PaymentGateway;
use crate::render::chromium::{PdfRenderer, RenderError};
use crate::render::objects::ObjectStore;
use crate::render::pool::RenderPool;
use crate::reporting::ErrorReporter;
use crate::state::AppState;
use crate::store::{CvStore, MemoryStore};

/// A formatted CV as the model returns it, including a null to be stripped.
pub const CV_JSON: &str = r#"{
  "personalDetails": {
    "fullName": "Dana Levi",
    "email": "dana@example.com",
    "phone": "052-1234567",
    "linkedin": null
  },
  "summary": "Backend developer with six years of experience.",
  "experience": [
    {
      "title": "Backend Developer",
      "company": "Acme",
      "startDate": "2019",
      "endDate": "2023",
      "achievements": ["Cut API latency by 40%"]
    }
  ],
  "skills": {"technical": ["Rust", "PostgreSQL"], "soft": []}
}"#;

// ────────────────────────────────────────────────────────────────────────────
// Scripted LLM
// ────────────────────────────────────────────────────────────────────────────

struct Rule {
    needle: String,
    /// `None` entries fail the call. The last entry repeats once reached.
    replies: VecDeque<Option<String>>,
}

/// Answers by matching a needle against the system prompt or the prompt.
/// Calls that match no rule fail with a 500.
#[derive(Default)]
pub struct ScriptedLlm {
    rules: Mutex<Vec<Rule>>,
    prompts: Mutex<Vec<String>>,
    calls: AtomicUsize,
}

impl ScriptedLlm {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn respond_to(self, needle: &str, reply: &str) -> Self {
        self.respond_in_sequence(needle, vec![Some(reply)])
    }

    pub fn fail_on(self, needle: &str) -> Self {
        self.respond_in_sequence(needle, vec![None])
    }

    pub fn respond_in_sequence(self, needle: &str, replies: Vec<Option<&str>>) -> Self {
        self.rules.lock().unwrap().push(Rule {
            needle: needle.to_string(),
            replies: replies.into_iter().map(|r| r.map(str::to_string)).collect(),
        });
        self
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub fn last_prompt(&self) -> Option<String> {
        self.prompts.lock().unwrap().last().cloned()
    }
}

#[async_trait]
impl LlmBackend for ScriptedLlm {
    async fn complete(&self, prompt: &str, system: &str) -> Result<String, LlmError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.prompts.lock().unwrap().push(prompt.to_string());

        let mut rules = self.rules.lock().unwrap();
        let rule = rules
            .iter_mut()
            .find(|r| system.contains(&r.needle) || prompt.contains(&r.needle))
            .ok_or_else(|| LlmError::Api {
                status: 500,
                message: "no scripted reply".to_string(),
            })?;
        let reply = if rule.replies.len() > 1 {
            rule.replies.pop_front().flatten()
        } else {
            rule.replies.front().cloned().flatten()
        };
        reply.ok_or_else(|| LlmError::Api {
            status: 503,
            message: "scripted failure".to_string(),
        })
    }

    fn provider(&self) -> &'static str {
        "scripted"
    }
}

// ────────────────────────────────────────────────────────────────────────────
// Rendering and storage
// ────────────────────────────────────────────────────────────────────────────

pub struct StubRenderer;

#[async_trait]
impl PdfRenderer for StubRenderer {
    async fn render(&self, html: &str) -> Result<Bytes, RenderError> {
        Ok(Bytes::from(format!("%PDF-1.4\n% {} bytes of html\n%%EOF", html.len())))
    }
}

#[derive(Default, Clone)]
pub struct MemoryObjects {
    objects: Arc<Mutex<BTreeMap<String, Bytes>>>,
}

impl MemoryObjects {
    pub fn keys(&self) -> Vec<String> {
        self.objects.lock().unwrap().keys().cloned().collect()
    }
}

#[async_trait]
impl ObjectStore for MemoryObjects {
    async fn put(&self, key: &str, body: Bytes, _content_type: &str) -> Result<()> {
        self.objects.lock().unwrap().insert(key.to_string(), body);
        Ok(())
    }

    async fn list(&self, prefix: &str) -> Result<Vec<String>> {
        Ok(self
            .objects
            .lock()
            .unwrap()
            .keys()
            .filter(|k| k.starts_with(prefix))
            .cloned()
            .collect())
    }

    async fn delete(&self, key: &str) -> Result<()> {
        self.objects.lock().unwrap().remove(key);
        Ok(())
    }

    async fn presign_get(&self, key: &str, ttl: Duration) -> Result<String> {
        Ok(format!(
            "https://objects.example.test/{key}?expires={}",
            ttl.as_secs()
        ))
    }
}

// ────────────────────────────────────────────────────────────────────────────
// Fixtures
// ────────────────────────────────────────────────────────────────────────────

pub async fn active_session(store: &MemoryStore, id: &str) {
    store
        .insert_session(NewSession {
            id: id.to_string(),
            template_id: "classic".to_string(),
            language: "he".to_string(),
            metadata: json!({}),
            expires_at: Utc::now() + chrono::Duration::hours(24),
        })
        .await
        .unwrap();
}

/// An `active` session whose TTL ran out an hour ago.
pub async fn expired_session(store: &MemoryStore, id: &str) {
    store
        .insert_session(NewSession {
            id: id.to_string(),
            template_id: "classic".to_string(),
            language: "he".to_string(),
            metadata: json!({}),
            expires_at: Utc::now() - chrono::Duration::hours(1),
        })
        .await
        .unwrap();
}

/// A paid session with saved answers, ready for generation.
pub async fn paid_session_with_answers(store: &MemoryStore, id: &str, package: PackageTier) {
    active_session(store, id).await;
    store
        .upsert_answers(
            id,
            &json!({
                "fullName": "Dana Levi",
                "email": "dana@example.com",
                "phone": "052-1234567",
                "experience": "Backend developer at Acme 2019-2023",
            }),
            "he",
        )
        .await
        .unwrap();
    assert!(store
        .mark_session_paid(id, package, &format!("T-{id}"))
        .await
        .unwrap());
}

/// Everything a router test needs to drive and inspect the app.
pub struct TestApp {
    pub state: AppState,
    pub store: Arc<MemoryStore>,
    pub llm: Arc<ScriptedLlm>,
    pub objects: MemoryObjects,
    pub jobs: tokio::sync::mpsc::Receiver<GenerationJob>,
}

impl TestApp {
    pub fn new(llm: ScriptedLlm) -> Self {
        let config = Config::for_tests();
        let store = Arc::new(MemoryStore::new());
        let llm = Arc::new(llm);
        let objects = MemoryObjects::default();

        let store_dyn: Arc<dyn CvStore> = store.clone();
        let reporter = ErrorReporter::new(store_dyn.clone(), config.operator.clone());
        let generator = Generator::new(
            store_dyn.clone(),
            llm.clone(),
            reporter.clone(),
            RetryPolicy {
                max_attempts: config.generation_max_attempts,
                base_delay: Duration::from_millis(1),
                max_delay: Duration::from_millis(1),
            },
        );
        let (queue, jobs) = GenerationQueue::new(16);

        let state = AppState {
            store: store_dyn,
            llm: llm.clone(),
            objects: Arc::new(objects.clone()),
            renderer: RenderPool::new(
                Arc::new(StubRenderer),
                config.render_workers,
                config.render_queue_depth,
            ),
            generator,
            jobs: queue,
            payments: PaymentGateway::new(config.payment.clone(), config.public_base_url.clone()),
            reporter,
            config,
        };

        Self {
            state,
            store,
            llm,
            objects,
            jobs,
        }
    }
}
