use crate::error::ApiError;
use core_types::Credentials;
use hmac::{Hmac, Mac};
use sha2::Sha256;
use std::collections::BTreeMap;

// Create a type alias for the HMAC-SHA256 implementation.
type HmacSha256 = Hmac<Sha256>;

/// Creates an HMAC-SHA256 signature for a given query string.
///
/// # Arguments
///
/// * `secret` - The user's API secret key.
/// * `query_string` - The url-encoded, key-sorted parameters, without `sign`.
///
/// # Returns
///
/// A lowercase hexadecimal string representation of the signature.
pub fn sign_request(secret: &str, query_string: &str) -> Result<String, ApiError> {
    let mut mac = HmacSha256::new_from_slice(secret.as_bytes())
        .map_err(|e| ApiError::Encoding(format!("invalid HMAC key: {}", e)))?;
    mac.update(query_string.as_bytes());
    Ok(hex::encode(mac.finalize().into_bytes()))
}

/// Adds the authentication parameters and returns the final query string with
/// `sign` appended last.
///
/// `BTreeMap` keeps the parameters sorted by key, which is the order the
/// exchange recomputes the signature in.
pub fn signed_query(
    credentials: &Credentials,
    mut params: BTreeMap<&str, String>,
    recv_window_ms: u64,
    timestamp_ms: i64,
) -> Result<String, ApiError> {
    params.insert("api_key", credentials.api_key.clone());
    params.insert("timestamp", timestamp_ms.to_string());
    params.insert("recv_window", recv_window_ms.to_string());

    let query_string =
        serde_qs::to_string(&params).map_err(|e| ApiError::Encoding(e.to_string()))?;
    let signature = sign_request(&credentials.api_secret, &query_string)?;

    Ok(format!("{}&sign={}", query_string, signature))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn signature_matches_reference_hmac() {
        let signature = sign_request(
            "secret",
            "api_key=key&category=linear&limit=100&recv_window=5000&timestamp=1700000000000",
        )
        .unwrap();
        assert_eq!(
            signature,
            "d736a56b36772ab319312ba7c2e1caa5bb67abca001f33b25eec451f4de1e411"
        );
    }

    #[test]
    fn query_is_sorted_and_signed_last() {
        let mut params = BTreeMap::new();
        params.insert("limit", "100".to_string());
        params.insert("category", "linear".to_string());

        let query = signed_query(&Credentials::new("key", "secret"), params, 5000, 1_700_000_000_000)
            .unwrap();

        assert_eq!(
            query,
            "api_key=key&category=linear&limit=100&recv_window=5000&timestamp=1700000000000\
             &sign=d736a56b36772ab319312ba7c2e1caa5bb67abca001f33b25eec451f4de1e411"
        );
    }

    #[test]
    fn cursor_values_are_url_encoded_before_signing() {
        let mut params = BTreeMap::new();
        params.insert("cursor", "page:2=".to_string());
        let query = signed_query(&Credentials::new("key", "secret"), params, 5000, 1).unwrap();
        assert!(query.starts_with("api_key=key&cursor=page%3A2%3D&recv_window=5000&timestamp=1&sign="));
    }
}
