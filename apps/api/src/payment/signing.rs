//! HMAC-SHA256 signatures over payment parameters.
//!
//! The signed message is every parameter except `signature`, sorted by key and
//! joined as `key=value` pairs with `&`. The signature is lowercase hex.

use std::collections::BTreeMap;

use hmac::{Hmac, Mac};
use sha2::Sha256;

type HmacSha256 = Hmac<Sha256>;

pub const SIGNATURE_FIELD: &str = "signature";

fn canonical<'a, I>(params: I) -> String
where
    I: IntoIterator<Item = (&'a str, &'a str)>,
{
    let sorted: BTreeMap<&str, &str> = params
        .into_iter()
        .filter(|(k, _)| *k != SIGNATURE_FIELD)
        .collect();
    sorted
        .iter()
        .map(|(k, v)| format!("{k}={v}"))
        .collect::<Vec<_>>()
        .join("&")
}

fn mac(secret: &str, message: &str) -> HmacSha256 {
    let mut mac =
        HmacSha256::new_from_slice(secret.as_bytes()).expect("HMAC accepts keys of any size");
    mac.update(message.as_bytes());
    mac
}

pub fn sign<'a, I>(secret: &str, params: I) -> String
where
    I: IntoIterator<Item = (&'a str, &'a str)>,
{
    hex::encode(mac(secret, &canonical(params)).finalize().into_bytes())
}

/// Constant-time check of `signature` (hex) against `params`.
pub fn verify<'a, I>(secret: &str, params: I, signature: &str) -> bool
where
    I: IntoIterator<Item = (&'a str, &'a str)>,
{
    let Ok(expected) = hex::decode(signature.trim()) else {
        return false;
    };
    mac(secret, &canonical(params)).verify_slice(&expected).is_ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    const SECRET: &str = "payment-secret";

    #[test]
    fn test_signature_ignores_parameter_order() {
        let a = sign(SECRET, [("sessionId", "S1"), ("amount", "4900")]);
        let b = sign(SECRET, [("amount", "4900"), ("sessionId", "S1")]);
        assert_eq!(a, b);
        assert_eq!(a.len(), 64);
    }

    #[test]
    fn test_signature_field_is_excluded() {
        let sig = sign(SECRET, [("sessionId", "S1")]);
        assert!(verify(
            SECRET,
            [("sessionId", "S1"), ("signature", sig.as_str())],
            &sig
        ));
    }

    #[test]
    fn test_tampered_params_fail_verification() {
        let sig = sign(SECRET, [("sessionId", "S1"), ("amount", "4900")]);
        assert!(!verify(SECRET, [("sessionId", "S1"), ("amount", "100")], &sig));
        assert!(!verify("other-secret", [("sessionId", "S1"), ("amount", "4900")], &sig));
    }

    #[test]
    fn test_non_hex_signature_is_rejected() {
        assert!(!verify(SECRET, [("sessionId", "S1")], "not-hex"));
    }
}
