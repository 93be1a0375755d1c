//! JSON messages exchanged with the in-page shim over `/ws/page`.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use painter::PainterError;

/// Server -> page.
#[derive(Debug, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ToPage<'a> {
    /// Perform one Action Surface method; answered by [`FromPage::Reply`].
    Call {
        id: u64,
        method: &'a str,
        params: Value,
    },
}

/// Page -> server.
#[derive(Debug, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum FromPage {
    Reply {
        id: u64,
        #[serde(default)]
        ok: Option<Value>,
        #[serde(default)]
        error: Option<PageFailure>,
    },
    /// A completed request the page itself made.
    Intercepted { url: String, body: String },
    Focus { focused: bool },
}

#[derive(Debug, Clone, Deserialize)]
pub struct PageFailure {
    pub kind: FailureKind,
    #[serde(default)]
    pub message: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureKind {
    NoMarker,
    NoFile,
    NoColors,
    Api,
    #[serde(other)]
    Other,
}

impl From<PageFailure> for PainterError {
    fn from(failure: PageFailure) -> Self {
        match failure.kind {
            FailureKind::NoMarker => PainterError::NoMarker,
            FailureKind::NoFile => PainterError::NoFileSelected,
            FailureKind::NoColors => PainterError::NoColors,
            FailureKind::Api => PainterError::Api(failure.message),
            FailureKind::Other => PainterError::Surface(failure.message),
        }
    }
}

/// Binary payloads travel base64-encoded.
#[derive(Debug, Deserialize)]
pub struct Encoded {
    pub data: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reply_without_error_is_success() {
        let msg: FromPage = serde_json::from_str(r#"{"type":"reply","id":3,"ok":true}"#).unwrap();
        match msg {
            FromPage::Reply { id, ok, error } => {
                assert_eq!(id, 3);
                assert_eq!(ok, Some(Value::Bool(true)));
                assert!(error.is_none());
            }
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn unknown_failure_kinds_are_surface_errors() {
        let msg: FromPage = serde_json::from_str(
            r#"{"type":"reply","id":1,"error":{"kind":"exploded","message":"boom"}}"#,
        )
        .unwrap();
        let FromPage::Reply {
            error: Some(failure),
            ..
        } = msg
        else {
            panic!("expected a failed reply");
        };
        assert!(matches!(PainterError::from(failure), PainterError::Surface(m) if m == "boom"));
    }

    #[test]
    fn marker_failure_maps_to_no_marker() {
        let failure = PageFailure {
            kind: FailureKind::NoMarker,
            message: String::new(),
        };
        assert!(matches!(PainterError::from(failure), PainterError::NoMarker));
    }

    #[test]
    fn calls_are_tagged() {
        let call = ToPage::Call {
            id: 9,
            method: "click",
            params: serde_json::json!({"x": 1.0, "y": 2.0}),
        };
        let json = serde_json::to_value(&call).unwrap();
        assert_eq!(json["type"], "call");
        assert_eq!(json["method"], "click");
        assert_eq!(json["params"]["y"], 2.0);
    }
}
