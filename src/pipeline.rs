//! The request handler: validates the payload, then drives the fetch,
//! prepare, infer, and decode stages in order. Any stage failure
//! short-circuits the remainder; there are no retries.

use crate::error::{Error, Result, Stage};
use crate::fetch::{self, DecodedImage};
use crate::server::protocol::InferenceRequest;
use crate::torch::ModelContext;
use std::sync::Arc;
use tracing::{debug, info};
use url::Url;

/// Reject unusable payloads before any network or model work: the URL must
/// be absolute http(s) and the question non-blank.
pub fn validate(request: &InferenceRequest) -> Result<Url> {
    let url = fetch::validate_url(&request.image_url)?;
    if request.question.trim().is_empty() {
        return Err(Error::Validation("question must be non-empty".into()));
    }
    Ok(url)
}

/// Run one request through the full pipeline and return the decoded answer.
/// The context is shared read-only across requests; the blocking model work
/// (prepare + forward + decode) runs off the async executor, and only the
/// forward pass itself serializes on the context's device lock.
pub async fn run(
    client: &reqwest::Client,
    ctx: Arc<ModelContext>,
    request: InferenceRequest,
) -> Result<String> {
    let url = validate(&request)?;

    debug!(stage = ?Stage::Fetch, url = %url, "fetching image");
    let image = fetch::fetch_image(client, &url).await?;

    let answer = infer_blocking(ctx, image, request.question).await?;
    info!(url = %url, answer = %answer, "answered inference request");
    Ok(answer)
}

async fn infer_blocking(
    ctx: Arc<ModelContext>,
    image: DecodedImage,
    question: String,
) -> Result<String> {
    debug!(stage = ?Stage::Prepare, "preparing model inputs");
    tokio::task::spawn_blocking(move || ctx.answer(image, &question))
        .await
        .map_err(|e| Error::Inference(format!("inference task failed: {e}")))?
}
