use serde_json::Value;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum PayloadError {
    #[error("webhook payload is not valid json: {0}")]
    InvalidJson(#[from] serde_json::Error),
    #[error("webhook payload must be an object or an array of objects, got {0}")]
    UnexpectedShape(&'static str),
    #[error("webhook payload element {index} is not an object")]
    NonObjectElement { index: usize },
}

/// Decodes a webhook body into its events. Providers send either a single
/// event object or an array of them.
pub fn decode_webhook_payload(body: &[u8]) -> Result<Vec<Value>, PayloadError> {
    let value: Value = serde_json::from_slice(body)?;
    match value {
        Value::Object(_) => Ok(vec![value]),
        Value::Array(items) => {
            if let Some(index) = items.iter().position(|item| !item.is_object()) {
                return Err(PayloadError::NonObjectElement { index });
            }
            Ok(items)
        }
        Value::Null => Err(PayloadError::UnexpectedShape("null")),
        Value::Bool(_) => Err(PayloadError::UnexpectedShape("bool")),
        Value::Number(_) => Err(PayloadError::UnexpectedShape("number")),
        Value::String(_) => Err(PayloadError::UnexpectedShape("string")),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn single_object_becomes_one_event() {
        let events = decode_webhook_payload(br#"{"signature":"abc"}"#).expect("decode");
        assert_eq!(events.len(), 1);
        assert_eq!(events[0]["signature"], "abc");
    }

    #[test]
    fn array_keeps_every_event_in_order() {
        let events =
            decode_webhook_payload(br#"[{"signature":"a"},{"signature":"b"}]"#).expect("decode");
        assert_eq!(events.len(), 2);
        assert_eq!(events[1]["signature"], "b");
    }

    #[test]
    fn rejects_malformed_and_unexpected_payloads() {
        assert!(matches!(
            decode_webhook_payload(b"{not json"),
            Err(PayloadError::InvalidJson(_))
        ));
        assert!(matches!(
            decode_webhook_payload(b"\"text\""),
            Err(PayloadError::UnexpectedShape("string"))
        ));
        assert!(matches!(
            decode_webhook_payload(br#"[{"a":1}, 5]"#),
            Err(PayloadError::NonObjectElement { index: 1 })
        ));
    }
}
