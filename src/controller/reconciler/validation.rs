//! # Declaration Validation
//!
//! Checks an `ExternalSecret` before any backend is contacted, and parses
//! Kubernetes duration strings used by `refreshInterval`.

use super::SyncError;
use crate::crd::ExternalSecretSpec;
use crate::observability::metrics;
use anyhow::Result;
use regex::Regex;
use std::time::Duration;

/// Parse Kubernetes duration string into std::time::Duration
/// Supports formats: "30s", "1m", "5m", "1h", "2h", "1d"
pub fn parse_kubernetes_duration(duration_str: &str) -> Result<Duration> {
    let duration_trimmed = duration_str.trim();

    if duration_trimmed.is_empty() {
        return Err(anyhow::anyhow!("Duration string cannot be empty"));
    }

    let duration_regex = Regex::new(r"^(?P<number>\d+)(?P<unit>[smhd])$")
        .map_err(|e| anyhow::anyhow!("Failed to compile regex: {e}"))?;

    let interval_lower = duration_trimmed.to_lowercase();
    let captures = duration_regex.captures(&interval_lower).ok_or_else(|| {
        anyhow::anyhow!(
            "Invalid duration format '{duration_trimmed}'. Expected format: <number><unit> (e.g., '30s', '5m', '1h')"
        )
    })?;

    let number: u64 = captures["number"]
        .parse()
        .map_err(|e| anyhow::anyhow!("Invalid duration number in '{duration_trimmed}': {e}"))?;

    let multiplier = match &captures["unit"] {
        "s" => 1,
        "m" => 60,
        "h" => 3600,
        _ => 86400,
    };

    number
        .checked_mul(multiplier)
        .map(Duration::from_secs)
        .ok_or_else(|| anyhow::anyhow!("Duration '{duration_trimmed}' is too large"))
}

/// Parse `refreshInterval`
///
/// Returns `None` for `"0"` (periodic refresh disabled).
pub fn parse_refresh_interval(interval: &str, min_seconds: u64) -> Result<Option<Duration>> {
    let interval_trimmed = interval.trim();
    if interval_trimmed == "0" {
        return Ok(None);
    }

    let duration = parse_kubernetes_duration(interval_trimmed)?;
    if duration.is_zero() {
        return Ok(None);
    }
    if duration.as_secs() < min_seconds {
        return Err(anyhow::anyhow!(
            "refreshInterval '{interval_trimmed}' must be at least {min_seconds} seconds (got {} seconds)",
            duration.as_secs()
        ));
    }
    Ok(Some(duration))
}

/// Validate a declaration and return its refresh interval
///
/// # Errors
///
/// `InvalidDeclaration` describing the first problem found.
pub fn validate_external_secret(
    spec: &ExternalSecretSpec,
    min_refresh_seconds: u64,
) -> Result<Option<Duration>, SyncError> {
    if spec.secret_store_ref.name.trim().is_empty() {
        return Err(SyncError::InvalidDeclaration(
            "secretStoreRef.name cannot be empty".to_string(),
        ));
    }

    for (index, entry) in spec.data.iter().enumerate() {
        if entry.secret_key.trim().is_empty() {
            return Err(SyncError::InvalidDeclaration(format!(
                "data[{index}].secretKey cannot be empty"
            )));
        }
        if entry.remote_ref.key.trim().is_empty() {
            return Err(SyncError::InvalidDeclaration(format!(
                "data[{index}].remoteRef.key cannot be empty"
            )));
        }
    }

    if let Some(template) = &spec.target.template {
        if let Some(field) = template.data.keys().find(|k| k.trim().is_empty()) {
            return Err(SyncError::InvalidDeclaration(format!(
                "target.template.data has an empty field name {field:?}"
            )));
        }
    }

    parse_refresh_interval(&spec.refresh_interval, min_refresh_seconds).map_err(|e| {
        metrics::increment_duration_parsing_errors();
        SyncError::InvalidDeclaration(e.to_string())
    })
}
