//! Hosted payment page integration: signed checkout redirects out, signed
//! callbacks in.

use std::collections::HashMap;

use reqwest::Url;
use serde::Deserialize;
use thiserror::Error;

use crate::config::PaymentConfig;
use crate::models::session::PackageTier;
use crate::payment::signing::{sign, verify, SIGNATURE_FIELD};

/// Payer details forwarded to the payment page so the payer does not retype them.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct CheckoutClient {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub email: String,
    #[serde(default)]
    pub phone: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CallbackStatus {
    Approved,
    Declined,
}

/// A verified callback from the payment provider.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PaymentCallback {
    pub session_id: String,
    pub package: PackageTier,
    pub transaction_id: String,
    pub amount: u32,
    pub status: CallbackStatus,
}

#[derive(Debug, Error)]
pub enum CallbackError {
    #[error("missing or invalid signature")]
    BadSignature,

    #[error("missing field '{0}'")]
    MissingField(&'static str),

    #[error("invalid field '{field}': {value}")]
    InvalidField { field: &'static str, value: String },

    #[error("amount {paid} does not match the {package} price {expected}")]
    AmountMismatch {
        package: PackageTier,
        paid: u32,
        expected: u32,
    },
}

#[derive(Clone)]
pub struct PaymentGateway {
    config: PaymentConfig,
    callback_base: String,
}

impl PaymentGateway {
    /// `callback_base` is the public origin the provider posts back to.
    pub fn new(config: PaymentConfig, callback_base: String) -> Self {
        Self {
            config,
            callback_base: callback_base.trim_end_matches('/').to_string(),
        }
    }

    pub fn price_for(&self, package: PackageTier) -> u32 {
        self.config.price_for(package)
    }

    /// Signed URL of the hosted payment page for `session_id`.
    pub fn checkout_url(
        &self,
        session_id: &str,
        package: PackageTier,
        client: &CheckoutClient,
    ) -> anyhow::Result<String> {
        let amount = self.price_for(package).to_string();
        let success_url = format!("{}/api/payment/success", self.callback_base);
        let failure_url = format!("{}/api/payment/failure", self.callback_base);
        let notify_url = format!("{}/api/payment/notify", self.callback_base);

        let mut params: Vec<(&str, &str)> = vec![
            ("terminal", self.config.terminal_id.as_str()),
            ("amount", amount.as_str()),
            ("currency", self.config.currency.as_str()),
            ("sessionId", session_id),
            ("package", package.as_str()),
            ("contact", client.name.as_str()),
            ("email", client.email.as_str()),
            ("phone", client.phone.as_str()),
            ("successUrl", success_url.as_str()),
            ("failureUrl", failure_url.as_str()),
            ("notifyUrl", notify_url.as_str()),
        ];
        let signature = sign(&self.config.secret, params.iter().copied());
        params.push((SIGNATURE_FIELD, signature.as_str()));

        let url = Url::parse_with_params(&self.config.page_url, &params)?;
        Ok(url.into())
    }

    /// Verifies the signature and parses a form-encoded callback. An approved
    /// callback must carry the exact price of its package.
    pub fn verify_callback(
        &self,
        params: &HashMap<String, String>,
    ) -> Result<PaymentCallback, CallbackError> {
        let signature = params
            .get(SIGNATURE_FIELD)
            .ok_or(CallbackError::BadSignature)?;
        let pairs = params.iter().map(|(k, v)| (k.as_str(), v.as_str()));
        if !verify(&self.config.secret, pairs, signature) {
            return Err(CallbackError::BadSignature);
        }

        let field = |name: &'static str| {
            params
                .get(name)
                .map(|v| v.trim())
                .filter(|v| !v.is_empty())
                .ok_or(CallbackError::MissingField(name))
        };

        let session_id = field("sessionId")?.to_string();
        let package_raw = field("package")?;
        let package: PackageTier = package_raw.parse().map_err(|_| CallbackError::InvalidField {
            field: "package",
            value: package_raw.to_string(),
        })?;
        let amount_raw = field("amount")?;
        let amount: u32 = amount_raw.parse().map_err(|_| CallbackError::InvalidField {
            field: "amount",
            value: amount_raw.to_string(),
        })?;
        let status = match field("status")?.to_ascii_lowercase().as_str() {
            "approved" | "success" | "000" => CallbackStatus::Approved,
            _ => CallbackStatus::Declined,
        };
        let transaction_id = params
            .get("transactionId")
            .map(|v| v.trim().to_string())
            .unwrap_or_default();

        let expected = self.price_for(package);
        if status == CallbackStatus::Approved && amount != expected {
            return Err(CallbackError::AmountMismatch {
                package,
                paid: amount,
                expected,
            });
        }

        Ok(PaymentCallback {
            session_id,
            package,
            transaction_id,
            amount,
            status,
        })
    }

    /// Signs callback parameters the way the provider does.
    #[cfg(test)]
    pub fn sign_callback(&self, params: &[(&str, &str)]) -> String {
        sign(&self.config.secret, params.iter().copied())
    }
}
