//! Route handlers, one module per agent family

use chrono::Local;
use healthsense_core::AgentResult;
use serde_json::{Map, Value};

pub mod chat;
pub mod doctors;
pub mod emergency;
pub mod hospitals;
pub mod service;

/// `{success: true, <key>: output}` or `{success: false, error}`.
///
/// `fallback` stands in for a missing output, `failure` for a missing error.
pub(crate) fn agent_payload(
    result: &AgentResult,
    key: &str,
    fallback: &str,
    failure: &str,
) -> Map<String, Value> {
    let mut payload = Map::new();
    payload.insert("success".into(), Value::Bool(result.success));
    if result.success {
        payload.insert(key.into(), Value::from(result.text_or(fallback)));
    } else {
        payload.insert("error".into(), Value::from(result.text_or(failure)));
    }
    payload
}

/// `PREFIX-YYYYMMDDHHMMSS` in local time
pub(crate) fn confirmation_id(prefix: &str) -> String {
    format!("{}-{}", prefix, Local::now().format("%Y%m%d%H%M%S"))
}

/// Query parameters arrive as strings; blank means absent
pub(crate) fn present(value: &Option<String>) -> Option<&str> {
    value.as_deref().map(str::trim).filter(|v| !v.is_empty())
}

/// Render a number the way the prompts expect it (`4.0`, `49.99`)
pub(crate) fn format_number(value: f64) -> String {
    format!("{:?}", value)
}
