//! HTML → PDF through a headless Chromium subprocess.

use std::process::Stdio;
use std::time::Duration;

use async_trait::async_trait;
use bytes::Bytes;
use thiserror::Error;
use tokio::process::Command;
use tracing::{debug, warn};

#[derive(Debug, Error)]
pub enum RenderError {
    #[error("failed to start renderer: {0}")]
    Spawn(std::io::Error),

    #[error("renderer timed out after {0:?}")]
    Timeout(Duration),

    #[error("renderer exited with {status}: {stderr}")]
    Failed { status: String, stderr: String },

    #[error("renderer I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("renderer produced an empty PDF")]
    EmptyOutput,
}

#[async_trait]
pub trait PdfRenderer: Send + Sync {
    async fn render(&self, html: &str) -> Result<Bytes, RenderError>;
}

/// A4 page setup prepended to every document. Margins are left to the
/// template; backgrounds are forced so coloured sidebars survive printing.
const PRINT_CSS: &str = "<style>@page{size:A4;margin:0}\
html,body{-webkit-print-color-adjust:exact;print-color-adjust:exact}</style>";

/// Inserts the print stylesheet at the end of `<head>`, or at the top of the
/// document when there is no head.
pub fn inject_print_css(html: &str) -> String {
    match find_ascii_ci(html, "</head>") {
        Some(idx) => {
            let mut out = String::with_capacity(html.len() + PRINT_CSS.len());
            out.push_str(&html[..idx]);
            out.push_str(PRINT_CSS);
            out.push_str(&html[idx..]);
            out
        }
        None => format!("{PRINT_CSS}{html}"),
    }
}

fn find_ascii_ci(haystack: &str, needle: &str) -> Option<usize> {
    haystack
        .as_bytes()
        .windows(needle.len())
        .position(|w| w.eq_ignore_ascii_case(needle.as_bytes()))
}

pub struct ChromiumRenderer {
    binary: String,
    timeout: Duration,
}

impl ChromiumRenderer {
    pub fn new(binary: String, timeout: Duration) -> Self {
        Self { binary, timeout }
    }
}

#[async_trait]
impl PdfRenderer for ChromiumRenderer {
    async fn render(&self, html: &str) -> Result<Bytes, RenderError> {
        let workdir = tempfile::tempdir()?;
        let input = workdir.path().join("cv.html");
        let output = workdir.path().join("cv.pdf");
        tokio::fs::write(&input, inject_print_css(html)).await?;

        let child = Command::new(&self.binary)
            .arg("--headless")
            .arg("--disable-gpu")
            .arg("--no-sandbox")
            .arg("--no-pdf-header-footer")
            .arg(format!("--print-to-pdf={}", output.display()))
            .arg(format!("file://{}", input.display()))
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(RenderError::Spawn)?;

        // On timeout the future (and the child with it) is dropped, which kills it.
        let result = tokio::time::timeout(self.timeout, child.wait_with_output())
            .await
            .map_err(|_| RenderError::Timeout(self.timeout))??;

        if !result.status.success() {
            let stderr = String::from_utf8_lossy(&result.stderr);
            warn!("Chromium failed: {stderr}");
            return Err(RenderError::Failed {
                status: result.status.to_string(),
                stderr: stderr.chars().take(500).collect(),
            });
        }

        let pdf = tokio::fs::read(&output).await?;
        if pdf.is_empty() {
            return Err(RenderError::EmptyOutput);
        }
        debug!("Rendered PDF: {} bytes", pdf.len());
        Ok(Bytes::from(pdf))
    }
}
