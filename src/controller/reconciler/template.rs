//! # Template Rendering
//!
//! Renders `spec.target.template.data` over the extracted values.
//!
//! Uses minijinja with strict undefined handling, so a reference to a key that was
//! not extracted fails the attempt instead of rendering an empty string.
//!
//! Scope available to every template:
//! - `data`: map of every extracted key to its (UTF-8, lossy) value
//! - each extracted key at top level, with `-` and `.` replaced by `_`
//!   (`{{ db_password }}` for key `db-password`)
//!
//! Filters: `b64enc`, `b64dec`.
//!
//! The rendered map is the extracted map overlaid with the rendered fields; fields
//! not mentioned in the template pass through unchanged.

use super::SyncError;
use crate::crd::ExternalSecretTemplate;
use base64::{engine::general_purpose::STANDARD, Engine as _};
use minijinja::{Environment, Error, ErrorKind, UndefinedBehavior, Value};
use std::collections::BTreeMap;
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("failed to render template for {field:?}: {reason}")]
pub struct TemplateError {
    pub field: String,
    pub reason: String,
}

impl From<TemplateError> for SyncError {
    fn from(e: TemplateError) -> Self {
        SyncError::TemplateRender {
            field: e.field,
            reason: e.reason,
        }
    }
}

/// Strict minijinja environment for target templates
pub struct TemplateEngine {
    env: Environment<'static>,
}

impl std::fmt::Debug for TemplateEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TemplateEngine").finish_non_exhaustive()
    }
}

impl Default for TemplateEngine {
    fn default() -> Self {
        Self::new()
    }
}

impl TemplateEngine {
    #[must_use]
    pub fn new() -> Self {
        let mut env = Environment::new();
        env.set_undefined_behavior(UndefinedBehavior::Strict);
        env.add_filter("b64enc", b64enc);
        env.add_filter("b64dec", b64dec);
        Self { env }
    }

    /// Render the final key/value set
    ///
    /// # Errors
    ///
    /// Returns the first field that fails to render. Nothing is returned partially.
    pub fn render(
        &self,
        extracted: &BTreeMap<String, Vec<u8>>,
        template: Option<&ExternalSecretTemplate>,
    ) -> Result<BTreeMap<String, Vec<u8>>, TemplateError> {
        let Some(template) = template.filter(|t| !t.data.is_empty()) else {
            return Ok(extracted.clone());
        };

        let scope = scope(extracted);
        let mut rendered = extracted.clone();
        for (field, source) in &template.data {
            let value = self
                .env
                .render_str(source, &scope)
                .map_err(|e| TemplateError {
                    field: field.clone(),
                    reason: describe(&e),
                })?;
            rendered.insert(field.clone(), value.into_bytes());
        }
        Ok(rendered)
    }
}

fn scope(extracted: &BTreeMap<String, Vec<u8>>) -> BTreeMap<String, Value> {
    let data: BTreeMap<&str, String> = extracted
        .iter()
        .map(|(k, v)| (k.as_str(), String::from_utf8_lossy(v).into_owned()))
        .collect();

    let mut scope: BTreeMap<String, Value> = data
        .iter()
        .map(|(k, v)| (normalize_identifier(k), Value::from(v.as_str())))
        .collect();
    scope.insert("data".to_string(), Value::from_serialize(&data));
    scope
}

/// `db-password` / `tls.crt` -> `db_password` / `tls_crt`
fn normalize_identifier(key: &str) -> String {
    key.chars()
        .map(|c| if c == '-' || c == '.' { '_' } else { c })
        .collect()
}

fn describe(e: &Error) -> String {
    let mut reason = e.to_string();
    let mut source = std::error::Error::source(e);
    while let Some(inner) = source {
        reason.push_str(": ");
        reason.push_str(&inner.to_string());
        source = inner.source();
    }
    reason
}

/// Usage: `{{ password | b64enc }}`
fn b64enc(value: &str) -> String {
    STANDARD.encode(value.as_bytes())
}

/// Usage: `{{ encoded | b64dec }}`
fn b64dec(value: &str) -> Result<String, Error> {
    let bytes = STANDARD.decode(value.trim()).map_err(|e| {
        Error::new(
            ErrorKind::InvalidOperation,
            format!("base64 decode error: {e}"),
        )
    })?;
    String::from_utf8(bytes).map_err(|e| {
        Error::new(
            ErrorKind::InvalidOperation,
            format!("base64 decode produced invalid UTF-8: {e}"),
        )
    })
}
