//! The image resolver: one bounded fetch attempt per request, decoded into an
//! RGB pixel buffer. No retries and no caching -- the same URL may serve
//! rotating content, so every request pays for its own fetch.

use crate::error::{Error, Result};
use image::RgbImage;
use reqwest::Client;
use std::time::Duration;
use tracing::debug;
use url::Url;

/// An in-memory RGB image, exclusively owned by the request that fetched it.
#[derive(Debug, Clone)]
pub struct DecodedImage {
    pub pixels: RgbImage,
}

impl DecodedImage {
    pub fn width(&self) -> u32 {
        self.pixels.width()
    }

    pub fn height(&self) -> u32 {
        self.pixels.height()
    }
}

/// Build the shared HTTP client. The timeout bounds the whole fetch (connect
/// plus body), after which the stage fails rather than retrying.
pub fn build_client(timeout: Duration) -> anyhow::Result<Client> {
    Ok(Client::builder().timeout(timeout).build()?)
}

/// Check that `raw` is an absolute http(s) URL before dialing anything.
pub fn validate_url(raw: &str) -> Result<Url> {
    let url = Url::parse(raw).map_err(|e| Error::Validation(format!("bad image_url: {e}")))?;
    match url.scheme() {
        "http" | "https" => Ok(url),
        other => Err(Error::Validation(format!(
            "unsupported image_url scheme {other:?}"
        ))),
    }
}

/// Fetch the image at `url` and decode it. A single attempt: network faults,
/// timeouts, and non-2xx statuses fail the request's fetch stage.
pub async fn fetch_image(client: &Client, url: &Url) -> Result<DecodedImage> {
    let resp = client
        .get(url.clone())
        .send()
        .await
        .map_err(fetch_error)?;

    let status = resp.status();
    if !status.is_success() {
        return Err(Error::Fetch(format!("{url} returned {status}")));
    }

    let bytes = resp.bytes().await.map_err(fetch_error)?;
    let pixels = image::load_from_memory(&bytes)?.to_rgb8();
    debug!(
        width = pixels.width(),
        height = pixels.height(),
        "decoded fetched image"
    );

    Ok(DecodedImage { pixels })
}

fn fetch_error(err: reqwest::Error) -> Error {
    if err.is_timeout() {
        Error::Fetch(format!("fetch timed out: {err}"))
    } else {
        Error::Fetch(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{ImageOutputFormat, Rgb};
    use std::io::Cursor;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn png_bytes(width: u32, height: u32, color: [u8; 3]) -> Vec<u8> {
        let img = RgbImage::from_pixel(width, height, Rgb(color));
        let mut buf = Vec::new();
        img.write_to(&mut Cursor::new(&mut buf), ImageOutputFormat::Png)
            .unwrap();
        buf
    }

    #[test]
    fn rejects_relative_urls() {
        let err = validate_url("images/apple.jpg").unwrap_err();
        assert!(matches!(err, Error::Validation(_)));
    }

    #[test]
    fn rejects_non_http_schemes() {
        let err = validate_url("ftp://example.com/apple.jpg").unwrap_err();
        assert!(matches!(err, Error::Validation(_)));
    }

    #[test]
    fn accepts_absolute_http_urls() {
        assert!(validate_url("https://example.com/apple.jpg").is_ok());
    }

    #[tokio::test]
    async fn fetches_and_decodes_an_image() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/apple.png"))
            .respond_with(ResponseTemplate::new(200).set_body_bytes(png_bytes(4, 3, [200, 20, 20])))
            .mount(&server)
            .await;

        let client = build_client(Duration::from_secs(2)).unwrap();
        let url = validate_url(&format!("{}/apple.png", server.uri())).unwrap();
        let image = fetch_image(&client, &url).await.unwrap();
        assert_eq!((image.width(), image.height()), (4, 3));
    }

    #[tokio::test]
    async fn non_2xx_status_is_a_fetch_error() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/missing.png"))
            .respond_with(ResponseTemplate::new(404))
            .mount(&server)
            .await;

        let client = build_client(Duration::from_secs(2)).unwrap();
        let url = validate_url(&format!("{}/missing.png", server.uri())).unwrap();
        let err = fetch_image(&client, &url).await.unwrap_err();
        assert!(matches!(err, Error::Fetch(_)));
    }

    #[tokio::test]
    async fn slow_response_is_a_fetch_error() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/slow.png"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_bytes(png_bytes(4, 4, [0, 0, 255]))
                    .set_delay(Duration::from_secs(5)),
            )
            .mount(&server)
            .await;

        let client = build_client(Duration::from_millis(200)).unwrap();
        let url = validate_url(&format!("{}/slow.png", server.uri())).unwrap();
        let err = fetch_image(&client, &url).await.unwrap_err();
        assert!(matches!(err, Error::Fetch(_)));
        assert!(err.to_string().contains("timed out"));
    }

    #[tokio::test]
    async fn non_image_bytes_are_a_decode_error() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/page.html"))
            .respond_with(ResponseTemplate::new(200).set_body_string("<html>not an image</html>"))
            .mount(&server)
            .await;

        let client = build_client(Duration::from_secs(2)).unwrap();
        let url = validate_url(&format!("{}/page.html", server.uri())).unwrap();
        let err = fetch_image(&client, &url).await.unwrap_err();
        assert!(matches!(err, Error::ImageDecode(_)));
    }

    #[tokio::test]
    async fn unreachable_host_is_a_fetch_error() {
        let client = build_client(Duration::from_millis(500)).unwrap();
        // A reserved port on localhost nothing listens on.
        let url = validate_url("http://127.0.0.1:9/apple.png").unwrap();
        let err = fetch_image(&client, &url).await.unwrap_err();
        assert!(matches!(err, Error::Fetch(_)));
    }
}
