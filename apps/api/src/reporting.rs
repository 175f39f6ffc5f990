//! Operator reporting for the flows where a silent failure costs a paying
//! user: generation and payment. A report writes an `error_logs` row, raises
//! an admin notification and, when configured, emails the operator.
//! Reporting never fails the caller; its own errors are logged and dropped.

use std::sync::Arc;

use reqwest::Client;
use serde_json::{json, Value};
use tracing::{error, warn};

use crate::config::OperatorConfig;
use crate::models::admin::NewNotification;
use crate::store::CvStore;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReportFlow {
    Generation,
    Payment,
    Render,
}

impl ReportFlow {
    pub fn as_str(&self) -> &'static str {
        match self {
            ReportFlow::Generation => "generation",
            ReportFlow::Payment => "payment",
            ReportFlow::Render => "render",
        }
    }
}

#[derive(Clone)]
pub struct ErrorReporter {
    store: Arc<dyn CvStore>,
    http: Client,
    operator: OperatorConfig,
}

impl ErrorReporter {
    pub fn new(store: Arc<dyn CvStore>, operator: OperatorConfig) -> Self {
        Self {
            store,
            http: crate::llm_client::build_http_client(),
            operator,
        }
    }

    pub async fn report(
        &self,
        flow: ReportFlow,
        session_id: Option<&str>,
        message: &str,
        context: Value,
    ) {
        error!(
            flow = flow.as_str(),
            session_id = session_id.unwrap_or("-"),
            "{message}"
        );

        if let Err(e) = self
            .store
            .insert_error_log(flow.as_str(), session_id, message, &context)
            .await
        {
            warn!("Failed to write error log: {e}");
        }

        let title = format!("{} failure", flow.as_str());
        let body = match session_id {
            Some(id) => format!("Session {id}: {message}"),
            None => message.to_string(),
        };
        if let Err(e) = self
            .store
            .insert_notification(NewNotification {
                kind: "error",
                title: &title,
                message: &body,
            })
            .await
        {
            warn!("Failed to create error notification: {e}");
        }

        if let Err(e) = self.email_operator(&title, &body, &context).await {
            warn!("Failed to email operator: {e}");
        }
    }

    async fn email_operator(&self, subject: &str, body: &str, context: &Value) -> anyhow::Result<()> {
        let (Some(to), Some(api_key), Some(api_url)) = (
            self.operator.email.as_deref(),
            self.operator.email_api_key.as_deref(),
            self.operator.email_api_url.as_deref(),
        ) else {
            return Ok(());
        };

        let text = format!(
            "{body}\n\nContext:\n{}",
            serde_json::to_string_pretty(context).unwrap_or_default()
        );
        let response = self
            .http
            .post(api_url)
            .bearer_auth(api_key)
            .json(&json!({
                "from": to,
                "to": [to],
                "subject": format!("[CVForge] {subject}"),
                "text": text,
            }))
            .send()
            .await?;

        if !response.status().is_success() {
            anyhow::bail!("email API returned {}", response.status());
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::MemoryStore;

    #[tokio::test]
    async fn test_report_writes_error_log_and_notification() {
        let store = Arc::new(MemoryStore::new());
        let reporter = ErrorReporter::new(store.clone(), OperatorConfig::default());

        reporter
            .report(
                ReportFlow::Payment,
                Some("S9"),
                "signature mismatch",
                json!({"transaction_id": "T1"}),
            )
            .await;

        let logs = store.error_logs();
        assert_eq!(logs.len(), 1);
        assert_eq!(logs[0].flow, "payment");
        assert_eq!(logs[0].session_id.as_deref(), Some("S9"));

        let notes = store.list_notifications(true).await.unwrap();
        assert_eq!(notes.len(), 1);
        assert_eq!(notes[0].kind, "error");
        assert!(notes[0].message.contains("S9"));
    }
}
