use http::{HeaderMap, StatusCode};

#[derive(thiserror::Error, Debug)]
pub enum Error {
    #[error("Missing config key {0}")]
    MissingConfig(&'static str),
    #[error("Failed to generate url from {url} caused by {source:?}")]
    InvalidUrl {
        url: String,
        source: url::ParseError,
    },
    #[error(transparent)]
    Reqwest(#[from] reqwest::Error),
    #[error("Received bad response with status {status:?} headers {headers:?} and body {body:?}")]
    BadResponse {
        status: StatusCode,
        headers: HeaderMap,
        body: String,
    },
    #[error("Failed to deserialize response value at {pointer}")]
    Deserialization {
        pointer: String,
        source: serde_json::Error,
    },
    #[error("Missing response value {0}")]
    MissingResponseValue(String),
}

impl Error {
    pub fn status(&self) -> Option<StatusCode> {
        match self {
            Error::BadResponse { status, .. } => Some(*status),
            Error::Reqwest(e) => e.status(),
            _ => None,
        }
    }
}
