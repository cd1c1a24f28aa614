use std::fmt;

use anyhow::Result;
use reqwest::Url;
use reqwest::blocking::Client;
use serde::de::DeserializeOwned;
use serde_json::Value;

use crate::http_client::http_client;
use crate::state::{Prediction, ResultRow, RoundId, RoundInfo, SessionKind, Year};

pub const YEARS_PATH: &str = "/api/years";
pub const ROUNDS_PATH: &str = "/api/rounds";
pub const SESSION_PATH: &str = "/api/session";
pub const LATEST_PREDICTION_PATH: &str = "/api/predictions/latest";

/// Failures surfaced by the backend client.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ApiError {
    /// The base URL plus path did not form a valid URL.
    InvalidUrl { url: String, message: String },
    /// The backend answered with a non-2xx status.
    Http {
        status: u16,
        message: Option<String>,
        path: String,
    },
    /// The request never produced a response.
    Network { path: String, message: String },
    /// A 2xx body that is not the JSON shape we expect.
    Decode { path: String, message: String },
}

impl ApiError {
    pub fn status(&self) -> Option<u16> {
        match self {
            Self::Http { status, .. } => Some(*status),
            _ => None,
        }
    }

    pub fn is_not_found(&self) -> bool {
        self.status() == Some(404)
    }
}

impl fmt::Display for ApiError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::InvalidUrl { url, message } => write!(f, "invalid url {url}: {message}"),
            Self::Http {
                status,
                message: Some(message),
                path,
            } => write!(f, "HTTP {status} for {path}: {message}"),
            Self::Http { status, path, .. } => write!(f, "HTTP {status} for {path}"),
            Self::Network { path, message } => write!(f, "request to {path} failed: {message}"),
            Self::Decode { path, message } => write!(f, "unexpected response from {path}: {message}"),
        }
    }
}

impl std::error::Error for ApiError {}

/// Outcome of asking for the latest prediction. Never an error for the caller.
#[derive(Debug, Clone, PartialEq)]
pub enum PredictionLookup {
    Available(Prediction),
    /// The backend has no prediction yet (HTTP 404).
    NotPublished,
    /// Any other failure, kept only for diagnostics.
    Unavailable(String),
}

impl PredictionLookup {
    pub fn from_result(result: Result<Prediction, ApiError>) -> Self {
        match result {
            Ok(prediction) => Self::Available(prediction),
            Err(err) if err.is_not_found() => Self::NotPublished,
            Err(err) => Self::Unavailable(err.to_string()),
        }
    }

    pub fn into_prediction(self) -> Option<Prediction> {
        match self {
            Self::Available(prediction) => Some(prediction),
            Self::NotPublished | Self::Unavailable(_) => None,
        }
    }
}

/// Read-only view of the results backend.
pub trait F1Api {
    fn years(&self) -> Result<Vec<Year>, ApiError>;

    fn rounds(&self, year: Year) -> Result<Vec<RoundInfo>, ApiError>;

    fn session(
        &self,
        year: Year,
        round: RoundId,
        session: SessionKind,
    ) -> Result<Vec<ResultRow>, ApiError>;

    /// Raw prediction fetch; a missing prediction comes back as an HTTP 404 error.
    fn fetch_latest_prediction(&self) -> Result<Prediction, ApiError>;

    fn latest_prediction(&self) -> PredictionLookup {
        PredictionLookup::from_result(self.fetch_latest_prediction())
    }
}

impl<T: F1Api + ?Sized> F1Api for Box<T> {
    fn years(&self) -> Result<Vec<Year>, ApiError> {
        (**self).years()
    }

    fn rounds(&self, year: Year) -> Result<Vec<RoundInfo>, ApiError> {
        (**self).rounds(year)
    }

    fn session(
        &self,
        year: Year,
        round: RoundId,
        session: SessionKind,
    ) -> Result<Vec<ResultRow>, ApiError> {
        (**self).session(year, round, session)
    }

    fn fetch_latest_prediction(&self) -> Result<Prediction, ApiError> {
        (**self).fetch_latest_prediction()
    }
}

/// Blocking HTTP client for the backend. No retries and no timeout.
#[derive(Debug, Clone)]
pub struct HttpApi {
    base_url: String,
    client: &'static Client,
}

impl HttpApi {
    pub fn new(base_url: &str) -> Result<Self> {
        Ok(Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            client: http_client()?,
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn get_json<T: DeserializeOwned>(
        &self,
        path: &str,
        params: &[(&str, String)],
    ) -> Result<T, ApiError> {
        let url = endpoint_url(&self.base_url, path, params)?;
        let label = request_label(&url);

        let resp = self
            .client
            .get(url)
            .send()
            .map_err(|err| ApiError::Network {
                path: label.clone(),
                message: err.to_string(),
            })?;
        let status = resp.status();
        if !status.is_success() {
            let text = resp.text().unwrap_or_default();
            return Err(ApiError::Http {
                status: status.as_u16(),
                message: (!text.trim().is_empty()).then_some(text),
                path: label,
            });
        }

        let body = resp.text().map_err(|err| ApiError::Network {
            path: label.clone(),
            message: err.to_string(),
        })?;
        decode(&label, &body)
    }
}

impl F1Api for HttpApi {
    fn years(&self) -> Result<Vec<Year>, ApiError> {
        let raw: Value = self.get_json(YEARS_PATH, &[])?;
        years_from_value(YEARS_PATH, raw)
    }

    fn rounds(&self, year: Year) -> Result<Vec<RoundInfo>, ApiError> {
        let raw: Value = self.get_json(ROUNDS_PATH, &[("year", year.to_string())])?;
        rounds_from_value(ROUNDS_PATH, raw)
    }

    fn session(
        &self,
        year: Year,
        round: RoundId,
        session: SessionKind,
    ) -> Result<Vec<ResultRow>, ApiError> {
        let raw: Value = self.get_json(SESSION_PATH, &session_params(year, round, session))?;
        rows_from_value(SESSION_PATH, raw)
    }

    fn fetch_latest_prediction(&self) -> Result<Prediction, ApiError> {
        self.get_json(LATEST_PREDICTION_PATH, &[])
    }
}

pub fn session_params(year: Year, round: RoundId, session: SessionKind) -> Vec<(&'static str, String)> {
    vec![
        ("year", year.to_string()),
        ("round", round.to_string()),
        ("session", session.code().to_string()),
    ]
}

/// Joins base and path and percent-encodes the query parameters.
pub fn endpoint_url(base: &str, path: &str, params: &[(&str, String)]) -> Result<Url, ApiError> {
    let raw = format!("{}{path}", base.trim_end_matches('/'));
    let url = if params.is_empty() {
        Url::parse(&raw)
    } else {
        Url::parse_with_params(&raw, params.iter().map(|(k, v)| (*k, v.as_str())))
    };
    url.map_err(|err| ApiError::InvalidUrl {
        url: raw,
        message: err.to_string(),
    })
}

fn request_label(url: &Url) -> String {
    match url.query() {
        Some(query) => format!("{}?{query}", url.path()),
        None => url.path().to_string(),
    }
}

fn decode<T: DeserializeOwned>(path: &str, body: &str) -> Result<T, ApiError> {
    serde_json::from_str(body).map_err(|err| ApiError::Decode {
        path: path.to_string(),
        message: err.to_string(),
    })
}

fn from_value<T: DeserializeOwned>(path: &str, value: Value) -> Result<T, ApiError> {
    serde_json::from_value(value).map_err(|err| ApiError::Decode {
        path: path.to_string(),
        message: err.to_string(),
    })
}

fn years_from_value(path: &str, value: Value) -> Result<Vec<Year>, ApiError> {
    if value.is_null() {
        return Ok(Vec::new());
    }
    from_value(path, value)
}

fn rounds_from_value(path: &str, value: Value) -> Result<Vec<RoundInfo>, ApiError> {
    if value.is_null() {
        return Ok(Vec::new());
    }
    from_value(path, value)
}

fn rows_from_value(path: &str, value: Value) -> Result<Vec<ResultRow>, ApiError> {
    match value {
        Value::Null => Ok(Vec::new()),
        Value::Array(items) => Ok(items.into_iter().map(ResultRow::from).collect()),
        other => Err(ApiError::Decode {
            path: path.to_string(),
            message: format!("expected an array of rows, got {}", json_kind(&other)),
        }),
    }
}

fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}

pub fn parse_years_json(raw: &str) -> Result<Vec<Year>, ApiError> {
    years_from_value(YEARS_PATH, decode(YEARS_PATH, raw)?)
}

pub fn parse_rounds_json(raw: &str) -> Result<Vec<RoundInfo>, ApiError> {
    rounds_from_value(ROUNDS_PATH, decode(ROUNDS_PATH, raw)?)
}

pub fn parse_session_json(raw: &str) -> Result<Vec<ResultRow>, ApiError> {
    rows_from_value(SESSION_PATH, decode(SESSION_PATH, raw)?)
}

pub fn parse_prediction_json(raw: &str) -> Result<Prediction, ApiError> {
    decode(LATEST_PREDICTION_PATH, raw)
}
