use std::env;

use crate::state::DEFAULT_LOG_LINES;

pub const DEFAULT_API_BASE: &str = "http://127.0.0.1:5000";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ApiSource {
    Http,
    Demo,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Config {
    pub api_base: String,
    pub source: ApiSource,
    pub demo_seed: Option<u64>,
    pub log_lines: usize,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            api_base: DEFAULT_API_BASE.to_string(),
            source: ApiSource::Http,
            demo_seed: None,
            log_lines: DEFAULT_LOG_LINES,
        }
    }
}

impl Config {
    /// Loads `.env.local` then `.env` (both optional) and reads the process environment.
    pub fn load() -> Self {
        let _ = dotenvy::from_filename(".env.local");
        let _ = dotenvy::from_filename(".env");
        Self::from_env()
    }

    pub fn from_env() -> Self {
        Self::from_lookup(|key| env::var(key).ok())
    }

    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let api_base = lookup("F1_API_BASE")
            .map(|val| val.trim().trim_end_matches('/').to_string())
            .filter(|val| !val.is_empty())
            .unwrap_or_else(|| DEFAULT_API_BASE.to_string());
        let source = match lookup("F1_API_SOURCE")
            .map(|val| val.trim().to_lowercase())
            .as_deref()
        {
            Some("demo") | Some("fake") => ApiSource::Demo,
            _ => ApiSource::Http,
        };
        let demo_seed = lookup("F1_DEMO_SEED").and_then(|val| val.trim().parse::<u64>().ok());
        let log_lines = lookup("F1_LOG_LINES")
            .and_then(|val| val.trim().parse::<usize>().ok())
            .unwrap_or(DEFAULT_LOG_LINES)
            .clamp(10, 2000);

        Self {
            api_base,
            source,
            demo_seed,
            log_lines,
        }
    }
}
