//! AWS Signature Version 4 request signing, just enough for JSON POSTs to Bedrock.

use crate::error::{ConverSqlError, Result};
use chrono::{DateTime, Utc};
use hmac::{Hmac, Mac};
use itertools::Itertools;
use sha2::{Digest, Sha256};

type HmacSha256 = Hmac<Sha256>;

const ALGORITHM: &str = "AWS4-HMAC-SHA256";

pub struct SigningKey<'a> {
    pub access_key_id: &'a str,
    pub secret_access_key: &'a str,
    pub region: &'a str,
    pub service: &'a str,
}

/// Request parts that take part in the signature.
pub struct CanonicalRequest<'a> {
    pub method: &'a str,
    /// Already canonical (URI-encoded) path
    pub path: &'a str,
    pub query: &'a str,
    /// Headers to sign; names are lowercased and sorted during signing
    pub headers: &'a [(String, String)],
    pub payload_sha256: &'a str,
}

pub fn amz_date(now: DateTime<Utc>) -> String {
    now.format("%Y%m%dT%H%M%SZ").to_string()
}

pub fn sha256_hex(data: &[u8]) -> String {
    hex::encode(Sha256::digest(data))
}

/// RFC 3986 encoding as AWS expects it: unreserved characters pass through.
pub fn uri_encode(segment: &str) -> String {
    segment
        .bytes()
        .map(|b| match b {
            b'A'..=b'Z' | b'a'..=b'z' | b'0'..=b'9' | b'-' | b'_' | b'.' | b'~' => (b as char).to_string(),
            _ => format!("%{:02X}", b),
        })
        .collect()
}

fn hmac(key: &[u8], data: &str) -> Result<Vec<u8>> {
    let mut mac = HmacSha256::new_from_slice(key)
        .map_err(|e| ConverSqlError::Config(format!("invalid signing key: {}", e)))?;
    mac.update(data.as_bytes());
    Ok(mac.finalize().into_bytes().to_vec())
}

/// Value for the `Authorization` header. `amz_date` must match the signed `x-amz-date`.
pub fn authorization(
    request: &CanonicalRequest<'_>,
    key: &SigningKey<'_>,
    amz_date: &str,
) -> Result<String> {
    let headers: Vec<(String, String)> = request
        .headers
        .iter()
        .map(|(name, value)| (name.to_lowercase(), value.trim().to_string()))
        .sorted()
        .collect();
    let signed_headers = headers.iter().map(|(name, _)| name.as_str()).join(";");
    let canonical_headers: String = headers
        .iter()
        .map(|(name, value)| format!("{}:{}\n", name, value))
        .collect();

    let canonical = [
        request.method,
        request.path,
        request.query,
        &canonical_headers,
        &signed_headers,
        request.payload_sha256,
    ]
    .join("\n");

    let date = amz_date
        .get(..8)
        .ok_or_else(|| ConverSqlError::Config(format!("invalid x-amz-date: {}", amz_date)))?;
    let scope = format!("{}/{}/{}/aws4_request", date, key.region, key.service);
    let string_to_sign = [ALGORITHM, amz_date, &scope, &sha256_hex(canonical.as_bytes())].join("\n");

    let k_date = hmac(format!("AWS4{}", key.secret_access_key).as_bytes(), date)?;
    let k_region = hmac(&k_date, key.region)?;
    let k_service = hmac(&k_region, key.service)?;
    let k_signing = hmac(&k_service, "aws4_request")?;
    let signature = hex::encode(hmac(&k_signing, &string_to_sign)?);

    Ok(format!(
        "{} Credential={}/{}, SignedHeaders={}, Signature={}",
        ALGORITHM, key.access_key_id, scope, signed_headers, signature
    ))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn matches_aws_get_vanilla_vector() {
        let headers = vec![
            ("Host".to_string(), "example.amazonaws.com".to_string()),
            ("X-Amz-Date".to_string(), "20150830T123600Z".to_string()),
        ];
        let empty = sha256_hex(b"");
        let request = CanonicalRequest {
            method: "GET",
            path: "/",
            query: "",
            headers: &headers,
            payload_sha256: &empty,
        };
        let key = SigningKey {
            access_key_id: "AKIDEXAMPLE",
            secret_access_key: "wJalrXUtnFEMI/K7MDENG+bPxRfiCYEXAMPLEKEY",
            region: "us-east-1",
            service: "service",
        };
        assert_eq!(
            authorization(&request, &key, "20150830T123600Z").unwrap(),
            "AWS4-HMAC-SHA256 Credential=AKIDEXAMPLE/20150830/us-east-1/service/aws4_request, \
             SignedHeaders=host;x-amz-date, \
             Signature=5fa00fa31553b73ebf1942676e86291e8372ff2a2260956d9b8aae1d763fbf31"
        );
    }

    #[test]
    fn amz_date_format() {
        let now = Utc.with_ymd_and_hms(2024, 1, 2, 3, 4, 5).unwrap();
        assert_eq!(amz_date(now), "20240102T030405Z");
    }

    #[test]
    fn uri_encode_escapes_reserved_bytes() {
        assert_eq!(
            uri_encode("anthropic.claude-3-5-haiku-20241022-v1:0"),
            "anthropic.claude-3-5-haiku-20241022-v1%3A0"
        );
        assert_eq!(uri_encode("a b/c~"), "a%20b%2Fc~");
    }
}
