//! Configuration
//!
//! All settings are read once at startup from the process environment (after an
//! optional `.env` is loaded by the binary). `Settings::from_lookup` takes any
//! name -> value function so tests can configure providers without touching the
//! real environment.

use std::collections::HashMap;
use std::fmt;
use std::path::PathBuf;
use std::time::Duration;
use tracing::debug;

pub const DEFAULT_CLAUDE_MODEL: &str = "claude-3-5-sonnet-20241022";
pub const DEFAULT_CLAUDE_BASE_URL: &str = "https://api.anthropic.com";
pub const DEFAULT_BEDROCK_MODEL_ID: &str = "anthropic.claude-3-5-haiku-20241022-v1:0";
pub const DEFAULT_AWS_REGION: &str = "us-west-2";
pub const DEFAULT_GEMINI_MODEL: &str = "gemini-1.5-pro";
pub const DEFAULT_GEMINI_BASE_URL: &str = "https://generativelanguage.googleapis.com";
pub const DEFAULT_OPENAI_MODEL: &str = "gpt-4o-mini";
pub const DEFAULT_OPENAI_BASE_URL: &str = "https://api.openai.com/v1";
pub const DEFAULT_OLLAMA_MODEL: &str = "llama3.1";
pub const DEFAULT_MAX_TOKENS: u32 = 4000;
pub const DEFAULT_REQUEST_TIMEOUT_SECS: u64 = 60;
pub const DEFAULT_RATE_LIMIT_WINDOW_SECS: u64 = 60;
pub const DEFAULT_PROMPT_CACHE_TTL_SECS: u64 = 3600;
pub const DEFAULT_SQL_DIALECT: &str = "DuckDB";
pub const DEFAULT_AWS_PROFILE: &str = "default";

/// String that never shows up in `Debug` output.
#[derive(Clone, PartialEq, Eq)]
pub struct Secret(String);

impl Secret {
    pub fn new(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    pub fn expose(&self) -> &str {
        &self.0
    }
}

impl fmt::Debug for Secret {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("Secret(***)")
    }
}

#[derive(Debug, Clone)]
pub struct ClaudeSettings {
    pub api_key: Option<Secret>,
    pub model: String,
    pub base_url: String,
    pub max_tokens: u32,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AwsCredentials {
    pub access_key_id: String,
    pub secret_access_key: Secret,
    pub session_token: Option<Secret>,
}

#[derive(Debug, Clone)]
pub struct BedrockSettings {
    pub enabled: bool,
    pub model_id: String,
    pub region: String,
    /// Overrides the regional runtime endpoint
    pub endpoint: Option<String>,
    pub bearer_token: Option<Secret>,
    pub credentials: Option<AwsCredentials>,
    pub guardrail_id: Option<String>,
    pub guardrail_version: String,
    pub max_tokens: u32,
}

impl BedrockSettings {
    pub fn runtime_endpoint(&self) -> String {
        self.endpoint
            .clone()
            .unwrap_or_else(|| format!("https://bedrock-runtime.{}.amazonaws.com", self.region))
    }
}

#[derive(Debug, Clone)]
pub struct GeminiSettings {
    pub api_key: Option<Secret>,
    pub model: String,
    pub base_url: String,
    pub max_output_tokens: u32,
    pub temperature: f32,
}

#[derive(Debug, Clone)]
pub struct OpenAiSettings {
    pub api_key: Option<Secret>,
    pub model: String,
    pub base_url: String,
    pub max_tokens: u32,
}

#[derive(Debug, Clone)]
pub struct OllamaSettings {
    /// Unset disables the adapter
    pub host: Option<String>,
    pub model: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RateLimitSettings {
    pub max_calls: usize,
    pub window: Duration,
}

#[derive(Debug, Clone)]
pub struct D1Settings {
    pub account_id: String,
    pub database_id: String,
    pub api_token: Secret,
}

#[derive(Debug, Clone)]
pub struct Settings {
    /// Identifier of the preferred provider
    pub preferred_provider: Option<String>,
    pub claude: ClaudeSettings,
    pub bedrock: BedrockSettings,
    pub gemini: GeminiSettings,
    pub openai: OpenAiSettings,
    pub ollama: OllamaSettings,
    pub request_timeout: Duration,
    pub rate_limit: Option<RateLimitSettings>,
    pub prompt_cache_enabled: bool,
    pub prompt_cache_ttl: Duration,
    pub query_log_path: Option<PathBuf>,
    pub d1: Option<D1Settings>,
    pub ontology_path: Option<PathBuf>,
    pub sql_dialect: String,
}

impl Settings {
    pub fn from_env() -> Self {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    pub fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        // Empty values count as unset.
        let get = |name: &str| lookup(name).map(|v| v.trim().to_string()).filter(|v| !v.is_empty());
        let get_or = |name: &str, default: &str| get(name).unwrap_or_else(|| default.to_string());
        let secret = |name: &str| get(name).map(Secret::new);

        let credentials = match (get("AWS_ACCESS_KEY_ID"), get("AWS_SECRET_ACCESS_KEY")) {
            (Some(access_key_id), Some(secret_access_key)) => Some(AwsCredentials {
                access_key_id,
                secret_access_key: Secret::new(secret_access_key),
                session_token: secret("AWS_SESSION_TOKEN"),
            }),
            _ => shared_credentials(&get),
        };

        let temperature = get("GEMINI_TEMPERATURE")
            .and_then(|v| v.parse::<f32>().ok())
            .filter(|t| (0.0..=1.0).contains(t))
            .unwrap_or(0.0);

        let rate_limit = get("AI_RATE_LIMIT_CALLS")
            .and_then(|v| v.parse::<usize>().ok())
            .filter(|n| *n > 0)
            .map(|max_calls| RateLimitSettings {
                max_calls,
                window: Duration::from_secs(positive_u64(
                    get("AI_RATE_LIMIT_WINDOW_SECS"),
                    DEFAULT_RATE_LIMIT_WINDOW_SECS,
                )),
            });

        let d1 = match (
            get("CLOUDFLARE_ACCOUNT_ID"),
            get("CLOUDFLARE_D1_DATABASE_ID"),
            secret("CLOUDFLARE_API_TOKEN"),
        ) {
            (Some(account_id), Some(database_id), Some(api_token)) => Some(D1Settings {
                account_id,
                database_id,
                api_token,
            }),
            _ => None,
        };

        Settings {
            preferred_provider: get("AI_PROVIDER").map(|p| p.to_lowercase()),
            claude: ClaudeSettings {
                api_key: secret("CLAUDE_API_KEY"),
                model: get_or("CLAUDE_MODEL", DEFAULT_CLAUDE_MODEL),
                base_url: get_or("CLAUDE_BASE_URL", DEFAULT_CLAUDE_BASE_URL),
                max_tokens: positive_u32(get("CLAUDE_MAX_TOKENS"), DEFAULT_MAX_TOKENS),
            },
            bedrock: BedrockSettings {
                enabled: parse_bool(get("ENABLE_BEDROCK"), true),
                model_id: get_or("BEDROCK_MODEL_ID", DEFAULT_BEDROCK_MODEL_ID),
                region: get("AWS_DEFAULT_REGION")
                    .or_else(|| get("AWS_REGION"))
                    .unwrap_or_else(|| DEFAULT_AWS_REGION.to_string()),
                endpoint: get("BEDROCK_ENDPOINT"),
                bearer_token: secret("AWS_BEARER_TOKEN_BEDROCK"),
                credentials,
                guardrail_id: get("BEDROCK_GUARDRAIL_ID"),
                guardrail_version: get_or("BEDROCK_GUARDRAIL_VERSION", "DRAFT"),
                max_tokens: DEFAULT_MAX_TOKENS,
            },
            gemini: GeminiSettings {
                api_key: secret("GOOGLE_API_KEY").or_else(|| secret("GEMINI_API_KEY")),
                model: get_or("GEMINI_MODEL", DEFAULT_GEMINI_MODEL),
                base_url: get_or("GEMINI_BASE_URL", DEFAULT_GEMINI_BASE_URL),
                max_output_tokens: positive_u32(get("GEMINI_MAX_OUTPUT_TOKENS"), DEFAULT_MAX_TOKENS),
                temperature,
            },
            openai: OpenAiSettings {
                api_key: secret("OPENAI_API_KEY"),
                model: get_or("OPENAI_MODEL", DEFAULT_OPENAI_MODEL),
                base_url: get_or("OPENAI_BASE_URL", DEFAULT_OPENAI_BASE_URL),
                max_tokens: DEFAULT_MAX_TOKENS,
            },
            ollama: OllamaSettings {
                host: get("OLLAMA_HOST"),
                model: get_or("OLLAMA_MODEL", DEFAULT_OLLAMA_MODEL),
            },
            request_timeout: Duration::from_secs(positive_u64(
                get("AI_REQUEST_TIMEOUT_SECS"),
                DEFAULT_REQUEST_TIMEOUT_SECS,
            )),
            rate_limit,
            prompt_cache_enabled: parse_bool(get("ENABLE_PROMPT_CACHE"), true),
            prompt_cache_ttl: Duration::from_secs(positive_u64(
                get("PROMPT_CACHE_TTL"),
                DEFAULT_PROMPT_CACHE_TTL_SECS,
            )),
            query_log_path: get("QUERY_LOG_PATH").map(PathBuf::from),
            d1,
            ontology_path: get("ONTOLOGY_PATH").map(PathBuf::from),
            sql_dialect: get_or("SQL_DIALECT", DEFAULT_SQL_DIALECT),
        }
    }

    /// Settings with nothing configured; every value at its default.
    pub fn empty() -> Self {
        Self::from_lookup(|_| None)
    }
}

/// Static keys of the `AWS_PROFILE` profile (default `default`) in the shared
/// credentials file: `AWS_SHARED_CREDENTIALS_FILE`, else `~/.aws/credentials`.
fn shared_credentials(get: &impl Fn(&str) -> Option<String>) -> Option<AwsCredentials> {
    let path = get("AWS_SHARED_CREDENTIALS_FILE").map(PathBuf::from).or_else(|| {
        get("HOME")
            .or_else(|| get("USERPROFILE"))
            .map(|home| PathBuf::from(home).join(".aws").join("credentials"))
    })?;
    let profile = get("AWS_PROFILE").unwrap_or_else(|| DEFAULT_AWS_PROFILE.to_string());
    let contents = std::fs::read_to_string(&path).ok()?;
    let credentials = profile_credentials(&contents, &profile);
    match &credentials {
        Some(_) => debug!("Using AWS profile '{}' from {}", profile, path.display()),
        None => debug!("No static keys for AWS profile '{}' in {}", profile, path.display()),
    }
    credentials
}

/// Keys of one `[profile]` section of an INI-style credentials file.
fn profile_credentials(contents: &str, profile: &str) -> Option<AwsCredentials> {
    let mut in_profile = false;
    let mut values: HashMap<String, String> = HashMap::new();
    for line in contents.lines().map(str::trim) {
        if line.is_empty() || line.starts_with('#') || line.starts_with(';') {
            continue;
        }
        if let Some(section) = line.strip_prefix('[').and_then(|l| l.strip_suffix(']')) {
            in_profile = section.trim() == profile;
            continue;
        }
        if !in_profile {
            continue;
        }
        if let Some((key, value)) = line.split_once('=') {
            let value = value.trim();
            if !value.is_empty() {
                values.insert(key.trim().to_lowercase(), value.to_string());
            }
        }
    }

    Some(AwsCredentials {
        access_key_id: values.remove("aws_access_key_id")?,
        secret_access_key: Secret::new(values.remove("aws_secret_access_key")?),
        session_token: values.remove("aws_session_token").map(Secret::new),
    })
}

fn parse_bool(value: Option<String>, default: bool) -> bool {
    match value.as_deref().map(str::to_lowercase).as_deref() {
        Some("true") | Some("1") | Some("yes") => true,
        Some("false") | Some("0") | Some("no") => false,
        _ => default,
    }
}

fn positive_u64(value: Option<String>, default: u64) -> u64 {
    value
        .and_then(|v| v.parse::<u64>().ok())
        .filter(|n| *n > 0)
        .unwrap_or(default)
}

fn positive_u32(value: Option<String>, default: u32) -> u32 {
    value
        .and_then(|v| v.parse::<u32>().ok())
        .filter(|n| *n > 0)
        .unwrap_or(default)
}
