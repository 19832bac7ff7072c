// Timestamp and duration formats used by the provider APIs
use super::NormalizationError;
use chrono::{DateTime, SecondsFormat};

/// Epoch seconds to `2024-01-01T00:00:00Z`. UTC only.
pub fn to_rfc3339(epoch: i64) -> Result<String, NormalizationError> {
    DateTime::from_timestamp(epoch, 0)
        .map(|dt| dt.to_rfc3339_opts(SecondsFormat::Secs, true))
        .ok_or_else(|| NormalizationError::Timestamp(epoch.to_string()))
}

/// Offsets are honored; the result is always UTC epoch seconds.
pub fn from_rfc3339(value: &str) -> Result<i64, NormalizationError> {
    DateTime::parse_from_rfc3339(value)
        .map(|dt| dt.timestamp())
        .map_err(|_| NormalizationError::Timestamp(value.to_string()))
}

/// Cloud Monitoring protobuf duration, `300s`.
pub fn to_seconds_duration(seconds: u32) -> String {
    format!("{seconds}s")
}

pub fn from_seconds_duration(value: &str) -> Result<u32, NormalizationError> {
    value
        .strip_suffix('s')
        .and_then(|n| n.parse().ok())
        .ok_or_else(|| NormalizationError::Unrecognized {
            field: "duration",
            value: value.to_string(),
        })
}

/// ISO 8601 duration as Azure Monitor writes it: `PT5M`, `PT1H`, `P1D`.
pub fn to_iso8601_duration(seconds: u32) -> String {
    if seconds == 0 {
        return "PT0S".to_string();
    }
    let days = seconds / 86_400;
    let hours = (seconds % 86_400) / 3_600;
    let minutes = (seconds % 3_600) / 60;
    let secs = seconds % 60;

    let mut out = String::from("P");
    if days > 0 {
        out.push_str(&format!("{days}D"));
    }
    if hours > 0 || minutes > 0 || secs > 0 {
        out.push('T');
        if hours > 0 {
            out.push_str(&format!("{hours}H"));
        }
        if minutes > 0 {
            out.push_str(&format!("{minutes}M"));
        }
        if secs > 0 {
            out.push_str(&format!("{secs}S"));
        }
    }
    out
}

pub fn from_iso8601_duration(value: &str) -> Result<u32, NormalizationError> {
    let unrecognized = || NormalizationError::Unrecognized {
        field: "duration",
        value: value.to_string(),
    };
    let body = value.strip_prefix('P').ok_or_else(unrecognized)?;

    let mut total: u32 = 0;
    let mut digits = String::new();
    let mut in_time = false;
    for c in body.chars() {
        match c {
            'T' if !in_time && digits.is_empty() => in_time = true,
            '0'..='9' => digits.push(c),
            unit => {
                let n: u32 = digits.parse().map_err(|_| unrecognized())?;
                digits.clear();
                let scale = match (in_time, unit) {
                    (false, 'D') => 86_400,
                    (true, 'H') => 3_600,
                    (true, 'M') => 60,
                    (true, 'S') => 1,
                    _ => return Err(unrecognized()),
                };
                total = n
                    .checked_mul(scale)
                    .and_then(|v| total.checked_add(v))
                    .ok_or_else(unrecognized)?;
            }
        }
    }
    if !digits.is_empty() {
        return Err(unrecognized());
    }
    Ok(total)
}
