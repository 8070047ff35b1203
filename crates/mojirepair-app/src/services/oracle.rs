//! Gemini-backed fallback for values the dictionary cannot resolve.

use std::{sync::Arc, time::Duration};

use async_trait::async_trait;
use reqwest::{Client, Url};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::constants::{DEFAULT_GEMINI_BASE_URL, DEFAULT_GEMINI_MODEL, DEFAULT_LENGTH_TOLERANCE};

const DEFAULT_TIMEOUT: Duration = Duration::from_secs(60);

/// Untrusted repair service. Implementations return the candidate text or an error;
/// callers decide what to fall back to.
#[async_trait]
pub trait RepairOracle: Send + Sync {
    async fn repair(&self, text: &str) -> Result<String, OracleError>;
}

#[derive(Debug, Error, Clone)]
pub enum OracleError {
    #[error("invalid oracle base URL `{0}`")]
    InvalidBaseUrl(String),
    #[error("oracle request failed: {source}")]
    Request {
        #[source]
        source: Arc<reqwest::Error>,
    },
    #[error("oracle returned HTTP status {status}")]
    HttpStatus { status: u16 },
    #[error("failed to decode oracle response: {source}")]
    Json {
        #[source]
        source: Arc<serde_json::Error>,
    },
    #[error("oracle returned no candidates")]
    NoCandidates,
    #[error("oracle candidate carried no text")]
    EmptyText,
    #[error("oracle candidate length {actual} is too far from input length {expected}")]
    LengthMismatch { expected: usize, actual: usize },
}

impl OracleError {
    // The request URL carries the API key; keep it out of error messages.
    fn request(error: reqwest::Error) -> Self {
        Self::Request {
            source: Arc::new(error.without_url()),
        }
    }
}

/// Builds the instruction sent to the model. The input is embedded verbatim.
pub fn repair_prompt(text: &str) -> String {
    format!(
        "You are a text repair engine. The following text contains '?' or mojibake encoding \
         errors in place of specific characters (such as accents or letters in place names).\n\
         Repair it. ONLY return the repaired text. Do not add any explanation.\n\
         If you are not sure, or if a '?' is a real question mark, return the input exactly as is.\n\
         \n\
         Input: \"{text}\""
    )
}

/// Sanity-checks a raw model answer against the input it was asked to repair.
///
/// Whitespace is trimmed before the length comparison; quotation marks are
/// stripped only from an accepted candidate.
pub fn accept_candidate(
    input: &str,
    raw: &str,
    tolerance: usize,
) -> Result<String, OracleError> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return Err(OracleError::EmptyText);
    }

    let expected = input.chars().count();
    let actual = trimmed.chars().count();
    if expected.abs_diff(actual) > tolerance {
        return Err(OracleError::LengthMismatch { expected, actual });
    }

    Ok(trimmed.replace('"', ""))
}

#[derive(Debug, Serialize)]
struct GenerateContentRequest<'a> {
    contents: [RequestContent<'a>; 1],
}

#[derive(Debug, Serialize)]
struct RequestContent<'a> {
    parts: [RequestPart<'a>; 1],
}

#[derive(Debug, Serialize)]
struct RequestPart<'a> {
    text: &'a str,
}

#[derive(Debug, Deserialize)]
struct GenerateContentResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
}

#[derive(Debug, Deserialize)]
struct Candidate {
    #[serde(default)]
    content: Option<CandidateContent>,
}

#[derive(Debug, Deserialize)]
struct CandidateContent {
    #[serde(default)]
    parts: Vec<CandidatePart>,
}

#[derive(Debug, Deserialize)]
struct CandidatePart {
    #[serde(default)]
    text: Option<String>,
}

impl GenerateContentResponse {
    fn first_text(self) -> Result<String, OracleError> {
        let candidate = self
            .candidates
            .into_iter()
            .next()
            .ok_or(OracleError::NoCandidates)?;
        candidate
            .content
            .and_then(|content| content.parts.into_iter().next())
            .and_then(|part| part.text)
            .ok_or(OracleError::EmptyText)
    }
}

/// `generateContent` client for a single Gemini model.
#[derive(Debug, Clone)]
pub struct GeminiOracle {
    http: Client,
    endpoint: Url,
    api_key: String,
    length_tolerance: usize,
}

impl GeminiOracle {
    pub fn new(api_key: impl Into<String>) -> Result<Self, OracleError> {
        Self::with_endpoint(DEFAULT_GEMINI_BASE_URL, DEFAULT_GEMINI_MODEL, api_key)
    }

    pub fn with_endpoint(
        base_url: &str,
        model: &str,
        api_key: impl Into<String>,
    ) -> Result<Self, OracleError> {
        let mut normalized = base_url.trim().to_owned();
        if !normalized.ends_with('/') {
            normalized.push('/');
        }
        let endpoint = Url::parse(&normalized)
            .and_then(|base| base.join(&format!("v1beta/models/{model}:generateContent")))
            .map_err(|_| OracleError::InvalidBaseUrl(base_url.to_string()))?;

        let http = Client::builder()
            .timeout(DEFAULT_TIMEOUT)
            .build()
            .map_err(OracleError::request)?;

        Ok(Self {
            http,
            endpoint,
            api_key: api_key.into(),
            length_tolerance: DEFAULT_LENGTH_TOLERANCE,
        })
    }

    pub fn with_length_tolerance(mut self, tolerance: usize) -> Self {
        self.length_tolerance = tolerance;
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Result<Self, OracleError> {
        self.http = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(OracleError::request)?;
        Ok(self)
    }

    pub fn endpoint(&self) -> &Url {
        &self.endpoint
    }
}

#[async_trait]
impl RepairOracle for GeminiOracle {
    async fn repair(&self, text: &str) -> Result<String, OracleError> {
        let prompt = repair_prompt(text);
        let body = GenerateContentRequest {
            contents: [RequestContent {
                parts: [RequestPart { text: &prompt }],
            }],
        };

        let response = self
            .http
            .post(self.endpoint.clone())
            .query(&[("key", self.api_key.as_str())])
            .json(&body)
            .send()
            .await
            .map_err(OracleError::request)?;

        let status = response.status();
        if !status.is_success() {
            return Err(OracleError::HttpStatus {
                status: status.as_u16(),
            });
        }

        let bytes = response.bytes().await.map_err(OracleError::request)?;
        let parsed: GenerateContentResponse =
            serde_json::from_slice(&bytes).map_err(|err| OracleError::Json {
                source: Arc::new(err),
            })?;

        let raw = parsed.first_text()?;
        accept_candidate(text, &raw, self.length_tolerance)
    }
}
