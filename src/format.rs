use chrono::NaiveDateTime;
use serde_json::Value;

pub const PLACEHOLDER: &str = "-";

/// Formats a lap time given in seconds as `m:ss.mmm`.
///
/// `null` renders as the placeholder. Numeric strings are treated as numbers; anything else
/// that is not a finite number is returned as its plain string form.
pub fn format_seconds_to_time(value: &Value) -> String {
    match value {
        Value::Null => PLACEHOLDER.to_string(),
        Value::Number(n) => match n.as_f64() {
            Some(secs) if secs.is_finite() => seconds_to_lap(secs),
            _ => n.to_string(),
        },
        Value::String(raw) => match raw.trim().parse::<f64>() {
            Ok(secs) if secs.is_finite() => seconds_to_lap(secs),
            _ => raw.clone(),
        },
        other => plain_string(other),
    }
}

fn seconds_to_lap(secs: f64) -> String {
    let minutes = (secs / 60.0).floor();
    let seconds = secs - minutes * 60.0;
    format!("{}:{:06.3}", minutes as i64, seconds)
}

/// Null, missing or empty values collapse to the placeholder.
pub fn safe(value: &Value) -> String {
    match value {
        Value::Null => PLACEHOLDER.to_string(),
        Value::String(s) if s.is_empty() => PLACEHOLDER.to_string(),
        other => plain_string(other),
    }
}

pub fn safe_str(value: Option<&str>) -> String {
    match value {
        Some(s) if !s.is_empty() => s.to_string(),
        _ => PLACEHOLDER.to_string(),
    }
}

fn plain_string(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

pub fn format_probability(prob: f64) -> String {
    format!("{:.1}%", prob * 100.0)
}

pub fn round_label(round: u32) -> String {
    format!("R{round:02}")
}

/// Shortens backend timestamps to `YYYY-MM-DD HH:MM`; unknown shapes pass through.
pub fn format_created_at(raw: &str) -> String {
    let cleaned = raw.trim();
    if cleaned.is_empty() {
        return PLACEHOLDER.to_string();
    }
    if let Some(dt) = parse_timestamp(cleaned) {
        return dt.format("%Y-%m-%d %H:%M").to_string();
    }
    cleaned.to_string()
}

fn parse_timestamp(raw: &str) -> Option<NaiveDateTime> {
    const FORMATS: [&str; 4] = [
        "%Y-%m-%dT%H:%M:%S%.f",
        "%Y-%m-%dT%H:%M:%S",
        "%Y-%m-%d %H:%M:%S%.f",
        "%Y-%m-%d %H:%M:%S",
    ];

    // Offsets and a trailing `Z` are dropped; the backend writes UTC.
    let trimmed = raw.trim_end_matches('Z');
    let trimmed = match trimmed.rfind('+') {
        Some(idx) if idx > 10 => &trimmed[..idx],
        _ => trimmed,
    };
    for fmt in FORMATS {
        if let Ok(dt) = NaiveDateTime::parse_from_str(trimmed, fmt) {
            return Some(dt);
        }
    }
    None
}
