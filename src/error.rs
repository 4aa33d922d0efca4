//! Error taxonomy for the inference request pipeline. Every stage failure
//! maps to exactly one variant, and every variant knows which pipeline stage
//! it belongs to so the HTTP boundary can name the stage in its response.

use serde::{Deserialize, Serialize};
use thiserror::Error;

pub type Result<T> = std::result::Result<T, Error>;

/// The pipeline stage an error originated from, carried in failure responses.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Stage {
    Validate,
    Fetch,
    Prepare,
    Infer,
    Decode,
}

#[derive(Error, Debug)]
pub enum Error {
    /// The request payload itself is unusable (relative URL, blank question,
    /// malformed JSON). Rejected before any network or model work.
    #[error("invalid request: {0}")]
    Validation(String),

    /// The image could not be retrieved: network failure, timeout, or a
    /// non-2xx status from the remote host.
    #[error("image fetch failed: {0}")]
    Fetch(String),

    /// The fetched bytes are not a supported image format.
    #[error("image decode failed: {0}")]
    ImageDecode(String),

    /// The image or question could not be coerced into the tensor layout the
    /// model expects.
    #[error("input preparation failed: {0}")]
    Preparation(String),

    /// The forward pass failed, e.g. the device became unavailable.
    #[error("inference failed: {0}")]
    Inference(String),

    /// The argmax index has no entry in the label vocabulary. The vocabulary
    /// is contiguous and complete by construction, so this is an internal
    /// invariant violation, not a user error.
    #[error("label lookup failed: {0}")]
    LabelLookup(String),
}

impl Error {
    pub fn stage(&self) -> Stage {
        match self {
            Error::Validation(_) => Stage::Validate,
            Error::Fetch(_) | Error::ImageDecode(_) => Stage::Fetch,
            Error::Preparation(_) => Stage::Prepare,
            Error::Inference(_) => Stage::Infer,
            Error::LabelLookup(_) => Stage::Decode,
        }
    }

    /// Whether the caller is at fault. Validation, fetch, decode, and
    /// preparation failures are client-class; inference and lookup failures
    /// are server-class.
    pub fn is_client_fault(&self) -> bool {
        matches!(
            self,
            Error::Validation(_)
                | Error::Fetch(_)
                | Error::ImageDecode(_)
                | Error::Preparation(_)
        )
    }
}

impl From<image::ImageError> for Error {
    fn from(err: image::ImageError) -> Self {
        Error::ImageDecode(err.to_string())
    }
}
