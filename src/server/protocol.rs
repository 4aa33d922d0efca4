//! Wire types for the JSON interface.

use crate::error::Stage;
use serde::{Deserialize, Serialize};

/// One question about one image, the body of `POST /predict`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InferenceRequest {
    pub image_url: String,
    pub question: String,
}

/// The decoded answer label handed back to the caller.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InferenceResult {
    pub answer: String,
}

/// A failed request: which pipeline stage gave up and why.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FailureResponse {
    pub stage: Stage,
    pub error: String,
}

/// Liveness/diagnostic payload for `GET /test`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthResponse {
    pub status: String,
    pub device: String,
    pub cuda_available: bool,
    pub runtime: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn request_round_trips() {
        let raw = r#"{"image_url": "https://example.com/a.jpg", "question": "what is this?"}"#;
        let req: InferenceRequest = serde_json::from_str(raw).unwrap();
        assert_eq!(req.image_url, "https://example.com/a.jpg");
        assert_eq!(req.question, "what is this?");
    }

    #[test]
    fn request_with_missing_field_is_rejected() {
        let raw = r#"{"image_url": "https://example.com/a.jpg"}"#;
        assert!(serde_json::from_str::<InferenceRequest>(raw).is_err());
    }

    #[test]
    fn result_serializes_answer_only() {
        let result = InferenceResult {
            answer: "red".into(),
        };
        assert_eq!(
            serde_json::to_string(&result).unwrap(),
            r#"{"answer":"red"}"#
        );
    }

    #[test]
    fn failure_names_stage_and_reason() {
        let failure = FailureResponse {
            stage: Stage::Fetch,
            error: "timed out".into(),
        };
        let json = serde_json::to_value(&failure).unwrap();
        assert_eq!(json["stage"], "fetch");
        assert_eq!(json["error"], "timed out");
    }
}
