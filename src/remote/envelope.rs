//! Response envelopes
//!
//! The hosted functions answer in one of three shapes depending on how
//! they are invoked:
//!
//! ```text
//! { "stories": [...] }                              bare payload
//! { "statusCode": 200, "body": "{\"stories\":[]}" } payload encoded as a string
//! { "statusCode": 200, "body": { "stories": [] } }  payload nested as an object
//! ```
//!
//! A wrapped `statusCode` of 400 or more is a failure even when the HTTP
//! status was 200.

use serde::de::DeserializeOwned;
use serde_json::Value;

use super::error::{RemoteError, RemoteResult};

/// Strip the envelope, returning the inner payload
pub fn unwrap_envelope(value: Value) -> RemoteResult<Value> {
    let Value::Object(mut outer) = value else {
        return Ok(value);
    };

    let status = outer.get("statusCode").and_then(Value::as_u64);

    let payload = match outer.remove("body") {
        Some(Value::String(text)) => serde_json::from_str(&text)?,
        Some(body @ Value::Object(_)) => body,
        Some(other) => {
            // Not an envelope after all; keep the field where it was.
            outer.insert("body".to_string(), other);
            Value::Object(outer)
        }
        None => Value::Object(outer),
    };

    match status {
        Some(code) if code >= 400 => Err(wrapped_failure(code as u16, &payload)),
        _ => Ok(payload),
    }
}

/// Strip the envelope and deserialize the payload
pub fn decode<T: DeserializeOwned>(value: Value) -> RemoteResult<T> {
    let payload = unwrap_envelope(value)?;
    Ok(serde_json::from_value(payload)?)
}

/// Pull the `error` message out of a failure payload
pub fn error_message(payload: &Value) -> String {
    payload
        .get("error")
        .and_then(Value::as_str)
        .map(str::to_string)
        .unwrap_or_else(|| payload.to_string())
}

fn wrapped_failure(status: u16, payload: &Value) -> RemoteError {
    let message = error_message(payload);
    if status == 404 {
        RemoteError::NotFound(message)
    } else {
        RemoteError::Api { status, message }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[derive(Debug, serde::Deserialize)]
    struct Saved {
        filename: String,
    }

    #[test]
    fn test_bare_payload() {
        let saved: Saved = decode(json!({"filename": "a.txt"})).unwrap();
        assert_eq!(saved.filename, "a.txt");
    }

    #[test]
    fn test_string_encoded_body() {
        let value = json!({"statusCode": 200, "body": "{\"filename\":\"a.txt\"}"});
        let saved: Saved = decode(value).unwrap();
        assert_eq!(saved.filename, "a.txt");
    }

    #[test]
    fn test_object_body() {
        let value = json!({"body": {"filename": "b.txt"}});
        let saved: Saved = decode(value).unwrap();
        assert_eq!(saved.filename, "b.txt");
    }

    #[test]
    fn test_wrapped_failure_status() {
        let value = json!({"statusCode": 404, "body": "{\"error\":\"Canvas not found\"}"});
        let err = unwrap_envelope(value).unwrap_err();
        assert!(matches!(err, RemoteError::NotFound(ref m) if m == "Canvas not found"));

        let value = json!({"statusCode": 500, "body": "{\"error\":\"boom\"}"});
        let err = unwrap_envelope(value).unwrap_err();
        assert!(matches!(err, RemoteError::Api { status: 500, .. }));
    }

    #[test]
    fn test_malformed_inner_body() {
        let value = json!({"body": "{not json"});
        assert!(matches!(unwrap_envelope(value), Err(RemoteError::Decode(_))));
    }

    #[test]
    fn test_non_envelope_body_field_kept() {
        let value = json!({"body": 5, "x": 1});
        let payload = unwrap_envelope(value).unwrap();
        assert_eq!(payload["body"], 5);
        assert_eq!(payload["x"], 1);
    }
}
