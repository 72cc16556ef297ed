//! Decoding of Registry v2 error responses
//!
//! A v2 registry reports failures as a JSON body carrying an `errors` array,
//! as outlined in the distribution spec:
//! <https://github.com/docker/distribution/blob/master/docs/spec/api.md#errors>

use std::fmt;

use reqwest::StatusCode;
use serde::Deserialize;
use serde_json::Value;

/// One entry from a registry error response.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct Diagnostic {
    #[serde(default)]
    pub code: String,
    #[serde(default)]
    pub message: String,
    #[serde(default)]
    pub detail: Value,
}

impl Diagnostic {
    /// Detail rendered for display; empty when the registry sent none.
    pub fn detail_text(&self) -> String {
        match &self.detail {
            Value::Null => String::new(),
            Value::String(s) => s.clone(),
            other => other.to_string(),
        }
    }
}

#[derive(Debug, Default, Deserialize)]
struct ErrorEnvelope {
    #[serde(default)]
    errors: Vec<Diagnostic>,
}

/// Decodes a response body into diagnostics, in source order.
///
/// Never fails: a body that is not a structured error document degrades to a
/// single `UNKNOWN` diagnostic whose message is the raw body text.
pub fn diagnostics_from_body(body: &[u8]) -> Vec<Diagnostic> {
    match serde_json::from_slice::<ErrorEnvelope>(body) {
        Ok(envelope) => envelope.errors,
        Err(_) => vec![Diagnostic {
            code: "UNKNOWN".to_string(),
            message: String::from_utf8_lossy(body).into_owned(),
            detail: Value::Null,
        }],
    }
}

/// Raised when a request's final status is not among the accepted codes.
#[derive(Debug, Clone)]
pub struct DiagnosticError {
    pub status: StatusCode,
    pub diagnostics: Vec<Diagnostic>,
}

impl DiagnosticError {
    pub fn from_response(status: StatusCode, body: &[u8]) -> Self {
        Self {
            status,
            diagnostics: diagnostics_from_body(body),
        }
    }

    pub fn status_code(&self) -> u16 {
        self.status.as_u16()
    }
}

impl fmt::Display for DiagnosticError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "response: {}", self.status)?;
        for diagnostic in &self.diagnostics {
            write!(f, "\n{}: {}", diagnostic.message, diagnostic.detail_text())?;
        }
        Ok(())
    }
}

impl std::error::Error for DiagnosticError {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_decode_structured_errors() {
        let body = br#"{"errors":[{"code":"X","message":"m","detail":"d"}]}"#;
        let diagnostics = diagnostics_from_body(body);
        assert_eq!(diagnostics.len(), 1);
        assert_eq!(diagnostics[0].code, "X");
        assert_eq!(diagnostics[0].message, "m");
        assert_eq!(diagnostics[0].detail_text(), "d");
    }

    #[test]
    fn test_decode_preserves_order() {
        let body = br#"{"errors":[
            {"code":"A","message":"first"},
            {"code":"B","message":"second"},
            {"code":"C","message":"third"}
        ]}"#;
        let codes: Vec<_> = diagnostics_from_body(body)
            .into_iter()
            .map(|d| d.code)
            .collect();
        assert_eq!(codes, vec!["A", "B", "C"]);
    }

    #[test]
    fn test_decode_tolerates_missing_fields() {
        let body = br#"{"errors":[{"code":"MANIFEST_UNKNOWN"}]}"#;
        let diagnostics = diagnostics_from_body(body);
        assert_eq!(diagnostics[0].code, "MANIFEST_UNKNOWN");
        assert_eq!(diagnostics[0].message, "");
        assert_eq!(diagnostics[0].detail, Value::Null);
    }

    #[test]
    fn test_decode_object_detail() {
        let body = br#"{"errors":[{"code":"X","message":"m","detail":{"name":"repo"}}]}"#;
        let diagnostics = diagnostics_from_body(body);
        assert_eq!(diagnostics[0].detail_text(), r#"{"name":"repo"}"#);
    }

    #[test]
    fn test_decode_unparseable_body_synthesizes_unknown() {
        let diagnostics = diagnostics_from_body(b"not json");
        assert_eq!(diagnostics.len(), 1);
        assert_eq!(diagnostics[0].code, "UNKNOWN");
        assert_eq!(diagnostics[0].message, "not json");
    }

    #[test]
    fn test_decode_json_without_errors_array() {
        assert!(diagnostics_from_body(br#"{"ok":true}"#).is_empty());
    }

    #[test]
    fn test_error_summary_lines() {
        let error = DiagnosticError::from_response(
            StatusCode::NOT_FOUND,
            br#"{"errors":[{"code":"X","message":"m","detail":"d"},{"code":"Y","message":"n","detail":"e"}]}"#,
        );
        let summary = error.to_string();
        assert!(summary.starts_with("response: 404"));
        assert!(summary.contains("m: d\nn: e"));
        assert_eq!(error.status_code(), 404);
    }
}
