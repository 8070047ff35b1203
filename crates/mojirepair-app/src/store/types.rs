use std::{fmt, sync::Arc};

use serde::{Deserialize, Serialize};
use thiserror::Error;
use url::ParseError;

/// Store-assigned record key. PostgREST returns integers or text depending on the schema.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(untagged)]
pub enum RecordId {
    Int(i64),
    Text(String),
}

impl fmt::Display for RecordId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RecordId::Int(id) => write!(f, "{id}"),
            RecordId::Text(id) => f.write_str(id),
        }
    }
}

impl From<i64> for RecordId {
    fn from(value: i64) -> Self {
        RecordId::Int(value)
    }
}

impl From<&str> for RecordId {
    fn from(value: &str) -> Self {
        RecordId::Text(value.to_owned())
    }
}

/// Read-only snapshot of one row.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct Record {
    pub id: RecordId,
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
}

/// Partial update body. Only present fields are serialized.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct RecordPatch {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

impl RecordPatch {
    pub fn title(title: impl Into<String>) -> Self {
        Self {
            title: Some(title.into()),
            description: None,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.title.is_none() && self.description.is_none()
    }
}

#[derive(Debug, Error, Clone)]
pub enum StoreError {
    #[error("invalid store URL `{0}`")]
    InvalidBaseUrl(String),
    #[error("store API key is not a valid HTTP header value")]
    InvalidApiKey,
    #[error("failed to join `{path}` onto store URL: {source}")]
    UrlJoin {
        path: String,
        #[source]
        source: Arc<ParseError>,
    },
    #[error("request error during `{stage}`: {source}")]
    Request {
        stage: &'static str,
        #[source]
        source: Arc<reqwest::Error>,
    },
    #[error("unexpected HTTP status {status} during `{stage}`")]
    HttpStatus { stage: &'static str, status: u16 },
    #[error("failed to read HTTP body during `{stage}`: {source}")]
    Body {
        stage: &'static str,
        #[source]
        source: Arc<reqwest::Error>,
    },
    #[error("JSON decode error during `{stage}`: {source}")]
    Json {
        stage: &'static str,
        #[source]
        source: Arc<serde_json::Error>,
    },
    #[error("refusing to send an empty patch for record `{id}`")]
    EmptyPatch { id: RecordId },
}

impl StoreError {
    pub fn request(stage: &'static str, error: reqwest::Error) -> Self {
        Self::Request {
            stage,
            source: Arc::new(error),
        }
    }

    pub fn body(stage: &'static str, error: reqwest::Error) -> Self {
        Self::Body {
            stage,
            source: Arc::new(error),
        }
    }

    pub fn json(stage: &'static str, error: serde_json::Error) -> Self {
        Self::Json {
            stage,
            source: Arc::new(error),
        }
    }

    /// Whether retrying the same request may succeed.
    pub fn is_transient(&self) -> bool {
        match self {
            StoreError::Request { .. } | StoreError::Body { .. } => true,
            StoreError::HttpStatus { status, .. } => *status == 429 || *status >= 500,
            _ => false,
        }
    }
}
