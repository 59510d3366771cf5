//! The storage-agnostic snapshot of a response.
//!
//! An [`Envelope`] is written as a JSON object:
//!
//! ```text
//! {"headers":{"Content-Type":"text/html"},"output":"<base64 body>","status":200,"reason":"OK"}
//! ```
//!
//! `headers` and `output` are required. `status` and `reason` may be absent in
//! entries written before they existed, and default to `200` and `""`.
//! Anything read back from storage goes through [`Envelope::decode`] before it
//! is trusted.

use base64::{Engine, engine::general_purpose::STANDARD};
use serde_json::{Map, Value, json};

use super::error::CorruptKind;
use crate::http::{Headers, Response, StatusCode};

/// A cached response: status, reason phrase, combined headers, and body.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Envelope {
    /// Header name to combined value, in first-appearance order.
    pub headers: Vec<(String, String)>,
    pub output: Vec<u8>,
    pub status: StatusCode,
    /// Empty means "the canonical phrase for `status`".
    pub reason: String,
}

impl Envelope {
    /// Captures a snapshot of `response` without consuming it.
    ///
    /// Repeated headers are folded into one combined value per name.
    pub fn from_response(response: &Response) -> Self {
        let source = response.headers();
        let headers = source
            .names()
            .into_iter()
            .filter_map(|name| Some((name.to_owned(), source.get_line(name)?)))
            .collect();

        Self {
            headers,
            output: response.body_slice().to_vec(),
            status: response.status(),
            reason: response.reason_phrase().to_owned(),
        }
    }

    /// Serializes the envelope to its JSON storage form.
    pub fn encode(&self) -> Result<String, serde_json::Error> {
        let mut headers = Map::with_capacity(self.headers.len());
        for (name, value) in &self.headers {
            headers.insert(name.clone(), Value::String(value.clone()));
        }

        serde_json::to_string(&json!({
            "headers": headers,
            "output": STANDARD.encode(&self.output),
            "status": self.status.as_u16(),
            "reason": self.reason,
        }))
    }

    /// Parses and validates a stored blob.
    ///
    /// # Errors
    ///
    /// Returns the first [`CorruptKind`] found: invalid JSON, a non-object
    /// root, a missing or `null` `output`/`headers`, non-string header values,
    /// a body that is not base64, or an unsupported status code.
    pub fn decode(blob: &str) -> Result<Self, CorruptKind> {
        let root: Value =
            serde_json::from_str(blob).map_err(|e| CorruptKind::Deserialize(e.to_string()))?;
        let Value::Object(mut root) = root else {
            return Err(CorruptKind::NotAMapping);
        };

        let output = take_required(&mut root, "output")?;
        let headers = take_required(&mut root, "headers")?;

        let Value::Object(headers) = headers else {
            return Err(CorruptKind::HeadersNotAMapping);
        };
        let headers = headers
            .into_iter()
            .map(|(name, value)| match value {
                Value::String(value) => Ok((name, value)),
                _ => Err(CorruptKind::InvalidHeaderValue(name)),
            })
            .collect::<Result<Vec<_>, _>>()?;

        let output = output
            .as_str()
            .and_then(|encoded| STANDARD.decode(encoded).ok())
            .ok_or(CorruptKind::InvalidOutput)?;

        let status = match root.remove("status") {
            None | Some(Value::Null) => StatusCode::Ok,
            Some(value) => value
                .as_u64()
                .and_then(|code| u16::try_from(code).ok())
                .and_then(StatusCode::from_u16)
                .ok_or_else(|| CorruptKind::InvalidStatus(value.to_string()))?,
        };

        let reason = match root.remove("reason") {
            None | Some(Value::Null) => String::new(),
            Some(Value::String(reason)) => reason,
            Some(_) => return Err(CorruptKind::InvalidReason),
        };

        Ok(Self {
            headers,
            output,
            status,
            reason,
        })
    }

    /// Rebuilds a response on top of `template`.
    ///
    /// Every header already on the template is dropped first, so the result
    /// carries exactly the stored headers.
    pub fn apply_to(self, mut template: Response) -> Response {
        let headers = template.headers_mut();
        *headers = Headers::with_capacity(self.headers.len());
        for (name, value) in self.headers {
            headers.set(name, value);
        }

        template.set_body(self.output);
        template.set_status(self.status);
        template.set_reason(self.reason);
        template
    }
}

// `null` counts as absent, matching how older writers left optional slots.
fn take_required(root: &mut Map<String, Value>, field: &'static str) -> Result<Value, CorruptKind> {
    match root.remove(field) {
        None | Some(Value::Null) => Err(CorruptKind::MissingField(field)),
        Some(value) => Ok(value),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> Response {
        Response::new(StatusCode::Created)
            .reason("Made It")
            .header("Content-Type", "application/json")
            .header("Set-Cookie", "a=1")
            .header("set-cookie", "b=2")
            .body_bytes(vec![0xde, 0xad, 0xbe, 0xef])
    }

    #[test]
    fn snapshot_combines_repeated_headers() {
        let envelope = Envelope::from_response(&sample());
        assert_eq!(
            envelope.headers,
            vec![
                ("Content-Type".to_owned(), "application/json".to_owned()),
                ("Set-Cookie".to_owned(), "a=1, b=2".to_owned()),
            ]
        );
        assert_eq!(envelope.status, StatusCode::Created);
        assert_eq!(envelope.reason, "Made It");
    }

    #[test]
    fn encoded_form_decodes_to_same_envelope() {
        let envelope = Envelope::from_response(&sample());
        let decoded = Envelope::decode(&envelope.encode().unwrap()).unwrap();
        assert_eq!(decoded, envelope);
    }

    #[test]
    fn status_and_reason_default_when_absent() {
        let decoded = Envelope::decode(r#"{"headers":{},"output":"aGk="}"#).unwrap();
        assert_eq!(decoded.status, StatusCode::Ok);
        assert_eq!(decoded.reason, "");
        assert_eq!(decoded.output, b"hi");
    }

    #[test]
    fn rejects_structurally_invalid_payloads() {
        let cases = [
            ("not json", CorruptKind::Deserialize(String::new())),
            ("[1,2]", CorruptKind::NotAMapping),
            (r#"{"headers":{}}"#, CorruptKind::MissingField("output")),
            (r#"{"output":""}"#, CorruptKind::MissingField("headers")),
            (r#"{"output":"","headers":null}"#, CorruptKind::MissingField("headers")),
            (r#"{"output":"","headers":["a"]}"#, CorruptKind::HeadersNotAMapping),
            (
                r#"{"output":"","headers":{"X-N":1}}"#,
                CorruptKind::InvalidHeaderValue("X-N".to_owned()),
            ),
            (r#"{"output":"%%%","headers":{}}"#, CorruptKind::InvalidOutput),
            (
                r#"{"output":"","headers":{},"status":799}"#,
                CorruptKind::InvalidStatus("799".to_owned()),
            ),
            (r#"{"output":"","headers":{},"reason":5}"#, CorruptKind::InvalidReason),
        ];

        for (blob, expected) in cases {
            let err = Envelope::decode(blob).unwrap_err();
            match (&err, &expected) {
                (CorruptKind::Deserialize(_), CorruptKind::Deserialize(_)) => {}
                _ => assert_eq!(err, expected, "blob: {blob}"),
            }
        }
    }

    #[test]
    fn apply_replaces_template_headers() {
        let envelope = Envelope::decode(
            r#"{"headers":{"X-B":"2","X-A":"1"},"output":"Ym9keQ==","status":404,"reason":""}"#,
        )
        .unwrap();
        let template = Response::new(StatusCode::Ok)
            .header("Content-Type", "text/plain")
            .header("X-B", "stale");

        let rebuilt = envelope.apply_to(template);
        let headers: Vec<_> = rebuilt.headers().iter().collect();
        assert_eq!(headers, vec![("X-B", "2"), ("X-A", "1")]);
        assert_eq!(rebuilt.status(), StatusCode::NotFound);
        assert_eq!(rebuilt.reason_phrase(), "Not Found");
        assert_eq!(rebuilt.body_slice(), b"body");
    }
}
