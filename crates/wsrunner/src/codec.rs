//! Wire codec: newline-free text frames carrying one JSON object
//!
//! Inbound frames are decoded strictly into a flat string-to-string
//! mapping; nested or non-string values are a decode error, not coerced.

use serde_json::Value;
use std::collections::BTreeMap;

use crate::error::{HarnessError, Result};

/// Decoded fields of one inbound message
pub type Fields = BTreeMap<String, String>;

/// Decode a raw text frame into message fields.
pub fn decode_fields(raw: &str) -> Result<Fields> {
    let value: Value =
        serde_json::from_str(raw).map_err(|e| HarnessError::MalformedMessage(e.to_string()))?;

    let Value::Object(map) = value else {
        return Err(HarnessError::MalformedMessage(
            "payload is not a JSON object".to_string(),
        ));
    };

    let mut fields = Fields::new();
    for (key, value) in map {
        match value {
            Value::String(s) => {
                fields.insert(key, s);
            }
            other => {
                return Err(HarnessError::MalformedMessage(format!(
                    "field '{}' is not a string: {}",
                    key, other
                )));
            }
        }
    }

    Ok(fields)
}

/// Serialize an outbound message; it must be a JSON object.
pub fn encode(message: &Value) -> Result<String> {
    if !message.is_object() {
        return Err(HarnessError::MalformedMessage(
            "outbound message must be a JSON object".to_string(),
        ));
    }
    serde_json::to_string(message).map_err(|e| HarnessError::MalformedMessage(e.to_string()))
}
