//! Amazon Bedrock runtime adapter (Anthropic models via `InvokeModel`).
//!
//! Credentials are resolved once: a Bedrock API key (bearer token) wins, otherwise
//! static access keys (environment or shared credentials profile) sign every request
//! with SigV4.

use super::http::{build_client, send_json, Hints};
use super::sigv4::{self, CanonicalRequest, SigningKey};
use super::{ModelInfo, ProviderAdapter, RateLimiter};
use crate::config::{AwsCredentials, BedrockSettings, Secret};
use crate::error::{ConverSqlError, Result};
use async_trait::async_trait;
use chrono::Utc;
use reqwest::{Client, Url};
use serde_json::{json, Value};
use std::time::Duration;
use tracing::{debug, info};

pub const ID: &str = "bedrock";
const NAME: &str = "Amazon Bedrock";
const LABEL: &str = "Bedrock API";
const SERVICE: &str = "bedrock";
const ANTHROPIC_VERSION: &str = "bedrock-2023-05-31";

const AUTH: &[&str] = &["credentials", "access denied", "security token", "signature"];
const RATE: &[&str] = &["throttling", "rate exceeded", "rate limit", "too many requests"];
const MODEL: &[&str] = &["model"];

enum Auth {
    Bearer(Secret),
    SigV4(AwsCredentials),
}

pub struct BedrockAdapter {
    settings: BedrockSettings,
    client: Option<Client>,
    auth: Option<Auth>,
    limiter: Option<RateLimiter>,
    hints: Hints,
}

impl BedrockAdapter {
    pub fn new(settings: BedrockSettings, timeout: Duration) -> Self {
        let auth = if !settings.enabled {
            debug!("Bedrock disabled by ENABLE_BEDROCK");
            None
        } else if let Some(token) = &settings.bearer_token {
            Some(Auth::Bearer(token.clone()))
        } else if let Some(credentials) = &settings.credentials {
            Some(Auth::SigV4(credentials.clone()))
        } else {
            debug!("No AWS credentials found, Bedrock disabled");
            None
        };
        let client = auth.as_ref().and_then(|_| build_client(ID, timeout));

        let hints = vec![
            (AUTH, "Check AWS credentials (aws configure) or IAM permissions".to_string()),
            (RATE, "API rate limit exceeded. Try again in a moment".to_string()),
            (
                MODEL,
                format!(
                    "Model {} may not be available in {}",
                    settings.model_id, settings.region
                ),
            ),
        ];
        Self {
            settings,
            client,
            auth,
            limiter: None,
            hints,
        }
    }

    pub fn with_rate_limiter(mut self, limiter: Option<RateLimiter>) -> Self {
        self.limiter = limiter;
        self
    }

    fn invoke_url(&self) -> Result<Url> {
        let url = format!(
            "{}/model/{}/invoke",
            self.settings.runtime_endpoint().trim_end_matches('/'),
            sigv4::uri_encode(&self.settings.model_id)
        );
        Url::parse(&url).map_err(|e| ConverSqlError::backend(ID, format!("Invalid Bedrock endpoint {}: {}", url, e)))
    }

    /// Headers to add for SigV4, including `authorization`.
    fn signed_headers(&self, credentials: &AwsCredentials, url: &Url, payload: &[u8]) -> Result<Vec<(String, String)>> {
        let host = match (url.host_str(), url.port()) {
            (Some(host), Some(port)) => format!("{}:{}", host, port),
            (Some(host), None) => host.to_string(),
            (None, _) => return Err(ConverSqlError::backend(ID, format!("Bedrock endpoint has no host: {}", url))),
        };
        let amz_date = sigv4::amz_date(Utc::now());
        let payload_hash = sigv4::sha256_hex(payload);

        let mut headers = vec![
            ("host".to_string(), host),
            ("x-amz-content-sha256".to_string(), payload_hash.clone()),
            ("x-amz-date".to_string(), amz_date.clone()),
        ];
        if let Some(token) = &credentials.session_token {
            headers.push(("x-amz-security-token".to_string(), token.expose().to_string()));
        }

        // The canonical URI encodes each path segment a second time.
        let canonical_path = format!(
            "/model/{}/invoke",
            sigv4::uri_encode(&sigv4::uri_encode(&self.settings.model_id))
        );
        let authorization = sigv4::authorization(
            &CanonicalRequest {
                method: "POST",
                path: &canonical_path,
                query: "",
                headers: &headers,
                payload_sha256: &payload_hash,
            },
            &SigningKey {
                access_key_id: &credentials.access_key_id,
                secret_access_key: credentials.secret_access_key.expose(),
                region: &self.settings.region,
                service: SERVICE,
            },
            &amz_date,
        )?;

        // reqwest derives Host from the URL itself
        headers.retain(|(name, _)| name != "host");
        headers.push(("authorization".to_string(), authorization));
        Ok(headers)
    }
}

#[async_trait]
impl ProviderAdapter for BedrockAdapter {
    fn identifier(&self) -> &str {
        ID
    }

    fn display_name(&self) -> &str {
        NAME
    }

    fn is_available(&self) -> bool {
        self.client.is_some()
    }

    async fn generate(&self, prompt: &str) -> Result<String> {
        let (Some(client), Some(auth)) = (&self.client, &self.auth) else {
            return Err(ConverSqlError::backend(
                ID,
                "Bedrock client not available. Check AWS credentials and configuration.",
            ));
        };
        if let Some(limiter) = &self.limiter {
            limiter.acquire().await;
        }

        let body = json!({
            "anthropic_version": ANTHROPIC_VERSION,
            "max_tokens": self.settings.max_tokens,
            "temperature": 0.0,
            "messages": [
                {"role": "user", "content": prompt}
            ]
        });
        let payload = serde_json::to_vec(&body)?;
        let url = self.invoke_url()?;
        info!("🤖 Calling Bedrock ({} in {})", self.settings.model_id, self.settings.region);

        let mut request = client
            .post(url.clone())
            .header("content-type", "application/json")
            .header("accept", "application/json");
        if let Some(guardrail) = &self.settings.guardrail_id {
            request = request
                .header("X-Amzn-Bedrock-GuardrailIdentifier", guardrail)
                .header("X-Amzn-Bedrock-GuardrailVersion", &self.settings.guardrail_version);
        }
        request = match auth {
            Auth::Bearer(token) => request.bearer_auth(token.expose()),
            Auth::SigV4(credentials) => self
                .signed_headers(credentials, &url, &payload)?
                .into_iter()
                .fold(request, |req, (name, value)| req.header(name, value)),
        };

        let response = send_json(ID, LABEL, &self.hints, request.body(payload)).await?;
        match extract_text(&response).map(str::trim) {
            Some(text) if !text.is_empty() => Ok(text.to_string()),
            _ => Err(ConverSqlError::backend(ID, "Bedrock returned empty response")),
        }
    }

    fn model_info(&self) -> ModelInfo {
        ModelInfo {
            provider: NAME.to_string(),
            model: self.settings.model_id.clone(),
            max_tokens: Some(self.settings.max_tokens),
            temperature: Some(0.0),
            capabilities: vec!["sql_generation".to_string(), "guardrails".to_string()],
        }
    }
}

fn extract_text(response: &Value) -> Option<&str> {
    response["content"]
        .as_array()?
        .iter()
        .filter_map(|block| block["text"].as_str())
        .next()
}
