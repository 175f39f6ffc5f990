use std::time::Duration;

use anyhow::{bail, Context, Result};

use crate::models::session::PackageTier;

/// Which provider backs the `LlmBackend` held in `AppState`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LlmProvider {
    Anthropic,
    OpenAi,
}

/// Hosted payment page settings. Prices are in minor currency units.
#[derive(Debug, Clone)]
pub struct PaymentConfig {
    pub page_url: String,
    pub terminal_id: String,
    pub secret: String,
    pub currency: String,
    pub price_basic: u32,
    pub price_advanced: u32,
    pub price_pro: u32,
}

impl PaymentConfig {
    pub fn price_for(&self, package: PackageTier) -> u32 {
        match package {
            PackageTier::Basic => self.price_basic,
            PackageTier::Advanced => self.price_advanced,
            PackageTier::Pro => self.price_pro,
        }
    }
}

/// Operator alerting. All optional; reporting degrades to logs + DB rows.
#[derive(Debug, Clone, Default)]
pub struct OperatorConfig {
    pub email: Option<String>,
    pub email_api_key: Option<String>,
    pub email_api_url: Option<String>,
}

/// Application configuration loaded from environment variables.
/// Fails at startup if required variables are missing.
#[derive(Debug, Clone)]
pub struct Config {
    /// `None` runs against the in-memory store.
    pub database_url: Option<String>,
    pub s3_bucket: String,
    pub s3_endpoint: String,
    pub s3_region: String,
    pub aws_access_key_id: String,
    pub aws_secret_access_key: String,
    pub llm_provider: LlmProvider,
    pub anthropic_api_key: Option<String>,
    pub openai_api_key: Option<String>,
    pub public_base_url: String,
    pub payment: PaymentConfig,
    pub admin_token: String,
    pub chromium_path: String,
    pub render_workers: usize,
    pub render_queue_depth: usize,
    pub render_timeout: Duration,
    pub generation_workers: usize,
    pub generation_max_attempts: u32,
    pub session_ttl: chrono::Duration,
    pub signed_url_ttl: Duration,
    pub operator: OperatorConfig,
    pub port: u16,
    pub rust_log: String,
}

impl Config {
    pub fn from_env() -> Result<Self> {
        dotenvy::dotenv().ok(); // load .env if present; ignore if missing

        let llm_provider = match optional_env("LLM_PROVIDER")
            .unwrap_or_else(|| "anthropic".to_string())
            .to_lowercase()
            .as_str()
        {
            "anthropic" => LlmProvider::Anthropic,
            "openai" => LlmProvider::OpenAi,
            other => bail!("LLM_PROVIDER must be 'anthropic' or 'openai', got '{other}'"),
        };

        let anthropic_api_key = optional_env("ANTHROPIC_API_KEY");
        let openai_api_key = optional_env("OPENAI_API_KEY");
        match llm_provider {
            LlmProvider::Anthropic if anthropic_api_key.is_none() => {
                bail!("ANTHROPIC_API_KEY is required when LLM_PROVIDER=anthropic")
            }
            LlmProvider::OpenAi if openai_api_key.is_none() => {
                bail!("OPENAI_API_KEY is required when LLM_PROVIDER=openai")
            }
            _ => {}
        }

        Ok(Config {
            database_url: optional_env("DATABASE_URL"),
            s3_bucket: require_env("S3_BUCKET")?,
            s3_endpoint: require_env("S3_ENDPOINT")?,
            s3_region: optional_env("S3_REGION").unwrap_or_else(|| "us-east-1".to_string()),
            aws_access_key_id: require_env("AWS_ACCESS_KEY_ID")?,
            aws_secret_access_key: require_env("AWS_SECRET_ACCESS_KEY")?,
            llm_provider,
            anthropic_api_key,
            openai_api_key,
            public_base_url: optional_env("PUBLIC_BASE_URL")
                .unwrap_or_else(|| "http://localhost:3000".to_string())
                .trim_end_matches('/')
                .to_string(),
            payment: PaymentConfig {
                page_url: require_env("PAYMENT_PAGE_URL")?,
                terminal_id: require_env("PAYMENT_TERMINAL_ID")?,
                secret: require_env("PAYMENT_SECRET")?,
                currency: optional_env("PAYMENT_CURRENCY").unwrap_or_else(|| "ILS".to_string()),
                price_basic: parse_env("PRICE_BASIC", 4900)?,
                price_advanced: parse_env("PRICE_ADVANCED", 9900)?,
                price_pro: parse_env("PRICE_PRO", 14900)?,
            },
            admin_token: require_env("ADMIN_TOKEN")?,
            chromium_path: optional_env("CHROMIUM_PATH").unwrap_or_else(|| "chromium".to_string()),
            render_workers: parse_env("RENDER_WORKERS", 2)?,
            render_queue_depth: parse_env("RENDER_QUEUE_DEPTH", 8)?,
            render_timeout: Duration::from_secs(parse_env("RENDER_TIMEOUT_SECS", 60)?),
            generation_workers: parse_env("GENERATION_WORKERS", 2)?,
            generation_max_attempts: parse_env("GENERATION_MAX_ATTEMPTS", 3)?,
            session_ttl: chrono::Duration::hours(parse_env("SESSION_TTL_HOURS", 24)?),
            signed_url_ttl: Duration::from_secs(parse_env("SIGNED_URL_TTL_SECS", 604_800)?),
            operator: OperatorConfig {
                email: optional_env("OPERATOR_EMAIL"),
                email_api_key: optional_env("EMAIL_API_KEY"),
                email_api_url: optional_env("EMAIL_API_URL"),
            },
            port: parse_env("PORT", 8080)?,
            rust_log: optional_env("RUST_LOG").unwrap_or_else(|| "info".to_string()),
        })
    }
}

fn require_env(key: &str) -> Result<String> {
    std::env::var(key).with_context(|| format!("Required environment variable '{key}' is not set"))
}

fn optional_env(key: &str) -> Option<String> {
    std::env::var(key).ok().filter(|v| !v.trim().is_empty())
}

fn parse_env<T>(key: &str, default: T) -> Result<T>
where
    T: std::str::FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    match optional_env(key) {
        Some(raw) => raw
            .parse::<T>()
            .with_context(|| format!("{key} must be a valid number, got '{raw}'")),
        None => Ok(default),
    }
}

#[cfg(test)]
impl Config {
    /// Configuration used by router-level tests: in-memory store, fake secrets.
    pub fn for_tests() -> Self {
        Config {
            database_url: None,
            s3_bucket: "cv-test".to_string(),
            s3_endpoint: "http://localhost:9000".to_string(),
            s3_region: "us-east-1".to_string(),
            aws_access_key_id: "test".to_string(),
            aws_secret_access_key: "test".to_string(),
            llm_provider: LlmProvider::Anthropic,
            anthropic_api_key: Some("test".to_string()),
            openai_api_key: None,
            public_base_url: "http://localhost:3000".to_string(),
            payment: PaymentConfig {
                page_url: "https://pay.example.test/hosted".to_string(),
                terminal_id: "T-100".to_string(),
                secret: "payment-secret".to_string(),
                currency: "ILS".to_string(),
                price_basic: 4900,
                price_advanced: 9900,
                price_pro: 14900,
            },
            admin_token: "admin-token".to_string(),
            chromium_path: "chromium".to_string(),
            render_workers: 2,
            render_queue_depth: 4,
            render_timeout: Duration::from_secs(5),
            generation_workers: 1,
            generation_max_attempts: 2,
            session_ttl: chrono::Duration::hours(24),
            signed_url_ttl: Duration::from_secs(3600),
            operator: OperatorConfig::default(),
            port: 0,
            rust_log: "debug".to_string(),
        }
    }
}
