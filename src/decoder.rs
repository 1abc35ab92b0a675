//! # Payload Decoder
//!
//! Turns an envelope's raw bytes into a routing request: base64 transport
//! decoding, JSON parsing, and routing-key extraction. Decoding is
//! all-or-nothing; a failure at any step yields an error and never a
//! partially populated request.

use crate::error::{DispatchError, DispatchResult};
use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;
use serde_json::{Map, Value};

/// Payload field naming the stored procedure to run
pub const ROUTING_KEY_FIELD: &str = "sp_name";

/// Decoded routing request, read-only after creation.
#[derive(Debug, Clone, PartialEq)]
pub struct RoutingRequest {
    routing_key: String,
    params: Map<String, Value>,
}

impl RoutingRequest {
    /// Catalog key selecting which job to run, never empty
    pub fn routing_key(&self) -> &str {
        &self.routing_key
    }

    /// Payload fields other than the routing key, passed through to the job
    pub fn params(&self) -> &Map<String, Value> {
        &self.params
    }
}

/// Decode raw payload bytes into a [`RoutingRequest`].
///
/// The wire format is base64-encoded UTF-8 text carrying a JSON object with
/// at minimum a non-empty `sp_name` string field. Remaining top-level
/// fields become job parameters.
pub fn decode(raw: &[u8]) -> DispatchResult<RoutingRequest> {
    let decoded = BASE64
        .decode(raw)
        .map_err(|e| DispatchError::decode(format!("invalid base64: {e}")))?;

    let text = String::from_utf8(decoded)
        .map_err(|e| DispatchError::decode(format!("payload is not UTF-8: {e}")))?;

    let document: Value =
        serde_json::from_str(&text).map_err(|e| DispatchError::parse(e.to_string()))?;

    let Value::Object(mut fields) = document else {
        return Err(DispatchError::parse(format!(
            "expected a JSON object, got {}",
            json_type_name(&document)
        )));
    };

    let routing_key = match fields.remove(ROUTING_KEY_FIELD) {
        Some(Value::String(key)) if !key.is_empty() => key,
        _ => return Err(DispatchError::missing_routing_key(ROUTING_KEY_FIELD)),
    };

    Ok(RoutingRequest {
        routing_key,
        params: fields,
    })
}

fn json_type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}
