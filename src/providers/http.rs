//! Shared HTTP plumbing for adapters: bounded-timeout clients and translation of
//! transport/status/envelope failures into user-facing backend errors.

use crate::error::ConverSqlError;
use reqwest::{Client, RequestBuilder};
use serde_json::Value;
use std::time::Duration;
use tracing::warn;

/// Keyword set -> hint appended to the error message when any keyword matches.
pub(crate) type Hints = Vec<(&'static [&'static str], String)>;

pub(crate) fn build_client(provider: &str, timeout: Duration) -> Option<Client> {
    match Client::builder().timeout(timeout).build() {
        Ok(client) => Some(client),
        Err(e) => {
            warn!("⚠️  {} HTTP client could not be built: {}", provider, e);
            None
        }
    }
}

/// `"<label> error: <detail>"` plus the first matching hint.
pub(crate) fn failure(provider: &str, label: &str, detail: &str, hints: &Hints) -> ConverSqlError {
    let mut message = format!("{} error: {}", label, detail);
    let lower = detail.to_lowercase();
    if let Some((_, hint)) = hints
        .iter()
        .find(|(keywords, _)| keywords.iter().any(|k| lower.contains(k)))
    {
        message.push('\n');
        message.push_str(hint);
    }
    ConverSqlError::backend(provider, message)
}

/// Send a request and return the decoded JSON body of a successful response.
pub(crate) async fn send_json(
    provider: &str,
    label: &str,
    hints: &Hints,
    request: RequestBuilder,
) -> Result<Value, ConverSqlError> {
    let response = request.send().await.map_err(|e| {
        if e.is_timeout() {
            failure(provider, label, "request timed out", hints)
        } else {
            failure(provider, label, &format!("request failed: {}", e), hints)
        }
    })?;

    let status = response.status();
    if !status.is_success() {
        let body = response
            .text()
            .await
            .unwrap_or_else(|_| "Unknown error".to_string());
        return Err(failure(provider, label, &format!("HTTP {}: {}", status, body.trim()), hints));
    }

    let json: Value = response
        .json()
        .await
        .map_err(|e| failure(provider, label, &format!("malformed response: {}", e), hints))?;

    if let Some(error) = json.get("error").filter(|e| !e.is_null()) {
        let detail = error
            .get("message")
            .and_then(Value::as_str)
            .map(str::to_string)
            .unwrap_or_else(|| error.to_string());
        return Err(failure(provider, label, &detail, hints));
    }

    Ok(json)
}
