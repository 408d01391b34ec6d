//! Authenticated HTTP image fetcher.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Client, Response, StatusCode, Url, header};
use tracing::{debug, warn};
use uuid::Uuid;

use crate::domain::errors::FetcherError;
use crate::domain::ports::{FetchOptions, FetchResult, ImageFetcher, TokenProvider};

use super::object_url::ObjectUrlRegistry;

/// Default `User-Agent` sent with image requests.
pub const DEFAULT_USER_AGENT: &str = concat!("patchbay-images/", env!("CARGO_PKG_VERSION"));

const REQUEST_ID_HEADER: &str = "x-request-id";

/// Fetches device images from the patchbay API and stores them as object URLs.
pub struct HttpImageFetcher {
    client: Client,
    base_url: Option<Url>,
    tokens: Option<Arc<dyn TokenProvider>>,
    registry: ObjectUrlRegistry,
}

impl std::fmt::Debug for HttpImageFetcher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HttpImageFetcher")
            .field("base_url", &self.base_url.as_ref().map(Url::as_str))
            .field("authenticated", &self.tokens.is_some())
            .finish_non_exhaustive()
    }
}

impl HttpImageFetcher {
    /// Creates a fetcher resolving relative image paths against `base_url`.
    ///
    /// # Errors
    /// Returns error if the base URL is invalid or the HTTP client cannot be built.
    pub fn new(
        base_url: Option<&str>,
        user_agent: &str,
        registry: ObjectUrlRegistry,
    ) -> Result<Self, FetcherError> {
        let base_url = base_url
            .filter(|url| !url.is_empty())
            .map(|url| {
                // a trailing slash keeps the last path segment on join
                let normalized = if url.ends_with('/') {
                    url.to_string()
                } else {
                    format!("{url}/")
                };
                Url::parse(&normalized)
                    .map_err(|e| FetcherError::invalid_base_url(url, e.to_string()))
            })
            .transpose()?;

        let client = Client::builder()
            .user_agent(user_agent)
            .build()
            .map_err(|e| FetcherError::client_build(e.to_string()))?;

        Ok(Self {
            client,
            base_url,
            tokens: None,
            registry,
        })
    }

    /// Sends a bearer token from `provider` with every request.
    #[must_use]
    pub fn with_token_provider(mut self, provider: Arc<dyn TokenProvider>) -> Self {
        self.tokens = Some(provider);
        self
    }

    /// Registry holding the object URLs this fetcher creates.
    #[must_use]
    pub const fn registry(&self) -> &ObjectUrlRegistry {
        &self.registry
    }

    /// Resolves an image URL, joining relative paths onto the base URL.
    ///
    /// # Errors
    /// Returns a message if the URL is relative and no base URL is configured,
    /// or if it cannot be parsed.
    pub fn resolve_url(&self, url: &str) -> Result<Url, String> {
        if let Ok(absolute) = Url::parse(url) {
            return Ok(absolute);
        }
        let base = self
            .base_url
            .as_ref()
            .ok_or_else(|| format!("relative image URL without API base URL: {url}"))?;
        base.join(url.trim_start_matches('/'))
            .map_err(|e| format!("invalid image URL {url}: {e}"))
    }

    async fn send(
        &self,
        url: &Url,
        token: Option<&str>,
        request_id: &str,
        timeout: Duration,
    ) -> Result<Response, reqwest::Error> {
        let mut request = self
            .client
            .get(url.clone())
            .header(REQUEST_ID_HEADER, request_id)
            .timeout(timeout);
        if let Some(token) = token {
            request = request.bearer_auth(token);
        }
        request.send().await
    }

    async fn fetch_authenticated(
        &self,
        url: &Url,
        request_id: &str,
        timeout: Duration,
    ) -> FetchResult {
        let token = match &self.tokens {
            Some(provider) => provider.token(false).await,
            None => None,
        };

        let mut response = match self.send(url, token.as_deref(), request_id, timeout).await {
            Ok(response) => response,
            Err(e) => return transport_failure(&e, request_id),
        };

        if response.status() == StatusCode::UNAUTHORIZED && token.is_some() {
            let fresh = match &self.tokens {
                Some(provider) => provider.token(true).await,
                None => None,
            };
            if let Some(fresh) = fresh {
                warn!(request_id, "Image request unauthorized, retrying with fresh token");
                response = match self.send(url, Some(&fresh), request_id, timeout).await {
                    Ok(response) => response,
                    Err(e) => return transport_failure(&e, request_id),
                };
            }
        }

        self.read_response(response, request_id).await
    }

    async fn read_response(&self, response: Response, request_id: &str) -> FetchResult {
        let status = response.status();
        if !status.is_success() {
            debug!(request_id, status = status.as_u16(), "Image request failed");
            return failure_for_status(status);
        }

        let content_type = response
            .headers()
            .get(header::CONTENT_TYPE)
            .and_then(|value| value.to_str().ok())
            .map(String::from);

        match response.bytes().await {
            Ok(bytes) => {
                debug!(request_id, size = bytes.len(), "Image downloaded");
                FetchResult::Ok(self.registry.create(bytes, content_type))
            }
            Err(e) => transport_failure(&e, request_id),
        }
    }
}

/// Maps a non-success HTTP status to a fetch result.
#[must_use]
pub fn failure_for_status(status: StatusCode) -> FetchResult {
    match status {
        StatusCode::UNAUTHORIZED => FetchResult::Unauthorized,
        StatusCode::FORBIDDEN => FetchResult::Forbidden,
        StatusCode::NOT_FOUND => FetchResult::NotFound,
        StatusCode::REQUEST_TIMEOUT => FetchResult::Timeout,
        other => FetchResult::error(format!("HTTP {}", other.as_u16())),
    }
}

fn transport_failure(error: &reqwest::Error, request_id: &str) -> FetchResult {
    if error.is_timeout() {
        debug!(request_id, "Image request timed out");
        FetchResult::Timeout
    } else {
        warn!(request_id, error = %error, "Image request failed");
        if error.is_connect() {
            FetchResult::error("failed to connect to image server")
        } else {
            FetchResult::error(error.to_string())
        }
    }
}

#[async_trait]
impl ImageFetcher for HttpImageFetcher {
    async fn fetch_image(&self, url: &str, options: FetchOptions) -> FetchResult {
        let target = match self.resolve_url(url) {
            Ok(target) => target,
            Err(message) => return FetchResult::error(message),
        };
        let request_id = Uuid::new_v4().to_string();
        debug!(request_id = %request_id, path = target.path(), "Fetching device image");

        tokio::select! {
            biased;
            () = options.cancel.cancelled() => FetchResult::Aborted,
            result = self.fetch_authenticated(&target, &request_id, options.timeout) => result,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::entities::ImageStatus;
    use crate::domain::ports::mocks::MockTokenProvider;
    use parking_lot::Mutex;
    use test_case::test_case;
    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use tokio::net::TcpListener;
    use tokio_util::sync::CancellationToken;

    /// Serves one scripted response per connection and records each request head.
    async fn serve(responses: Vec<(u16, &'static str)>) -> (String, Arc<Mutex<Vec<String>>>) {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let seen = Arc::new(Mutex::new(Vec::new()));
        let log = seen.clone();

        tokio::spawn(async move {
            for (status, body) in responses {
                let Ok((mut socket, _)) = listener.accept().await else {
                    return;
                };
                let mut buf = vec![0u8; 16 * 1024];
                let mut read = 0;
                loop {
                    let n = socket.read(&mut buf[read..]).await.unwrap_or(0);
                    if n == 0 {
                        break;
                    }
                    read += n;
                    if buf[..read].windows(4).any(|w| w == b"\r\n\r\n") {
                        break;
                    }
                }
                log.lock()
                    .push(String::from_utf8_lossy(&buf[..read]).to_lowercase());
                let response = format!(
                    "HTTP/1.1 {status} Scripted\r\nContent-Type: image/png\r\n\
                     Content-Length: {}\r\nConnection: close\r\n\r\n{body}",
                    body.len()
                );
                let _ = socket.write_all(response.as_bytes()).await;
                let _ = socket.shutdown().await;
            }
        });

        (format!("http://{addr}"), seen)
    }

    fn options(timeout: Duration) -> FetchOptions {
        FetchOptions {
            cancel: CancellationToken::new(),
            timeout,
        }
    }

    fn fetcher(base_url: Option<&str>) -> HttpImageFetcher {
        HttpImageFetcher::new(base_url, DEFAULT_USER_AGENT, ObjectUrlRegistry::new()).unwrap()
    }

    #[test_case(401, ImageStatus::Unauthorized ; "unauthorized")]
    #[test_case(403, ImageStatus::Forbidden ; "forbidden")]
    #[test_case(404, ImageStatus::NotFound ; "not found")]
    #[test_case(408, ImageStatus::Timeout ; "request timeout")]
    #[test_case(500, ImageStatus::Error ; "server error")]
    #[test_case(429, ImageStatus::Error ; "rate limited")]
    fn test_failure_for_status(code: u16, expected: ImageStatus) {
        let status = StatusCode::from_u16(code).unwrap();
        assert_eq!(failure_for_status(status).status(), expected);
    }

    #[test]
    fn test_server_error_message_carries_code() {
        match failure_for_status(StatusCode::BAD_GATEWAY) {
            FetchResult::Error { message } => assert_eq!(message, "HTTP 502"),
            other => panic!("unexpected result: {other:?}"),
        }
    }

    #[test_case("/images/1.png", "https://api.example.com/v1/images/1.png" ; "rooted path")]
    #[test_case("images/1.png", "https://api.example.com/v1/images/1.png" ; "relative path")]
    #[test_case("https://cdn.example.com/a.png", "https://cdn.example.com/a.png" ; "absolute url")]
    fn test_resolve_url(input: &str, expected: &str) {
        let fetcher = fetcher(Some("https://api.example.com/v1"));
        assert_eq!(fetcher.resolve_url(input).unwrap().as_str(), expected);
    }

    #[test]
    fn test_relative_url_without_base_is_error() {
        let fetcher = fetcher(None);
        assert!(fetcher.resolve_url("/images/1.png").is_err());
    }

    #[test]
    fn test_invalid_base_url_is_rejected() {
        let result =
            HttpImageFetcher::new(Some("not a url"), DEFAULT_USER_AGENT, ObjectUrlRegistry::new());
        assert!(matches!(result, Err(FetcherError::InvalidBaseUrl { .. })));
    }

    #[tokio::test]
    async fn test_fetch_creates_object_url() {
        let (base, seen) = serve(vec![(200, "png-bytes")]).await;
        let fetcher = fetcher(Some(&base)).with_token_provider(Arc::new(MockTokenProvider::new(
            Some("secret"),
            None,
        )));

        let result = fetcher
            .fetch_image("/images/1.png", options(Duration::from_secs(5)))
            .await;

        let FetchResult::Ok(handle) = result else {
            panic!("expected loaded image");
        };
        let data = fetcher.registry().resolve(handle.src()).unwrap();
        assert_eq!(&data.bytes[..], b"png-bytes");
        assert_eq!(data.content_type.as_deref(), Some("image/png"));

        let requests = seen.lock();
        assert!(requests[0].starts_with("get /images/1.png"));
        assert!(requests[0].contains("authorization: bearer secret"));
        assert!(requests[0].contains("x-request-id: "));

        drop(handle);
        assert!(fetcher.registry().is_empty());
    }

    #[tokio::test]
    async fn test_unauthorized_retries_once_with_fresh_token() {
        let (base, seen) = serve(vec![(401, ""), (200, "ok")]).await;
        let tokens = Arc::new(MockTokenProvider::new(Some("stale"), Some("fresh")));
        let fetcher = fetcher(Some(&base)).with_token_provider(tokens.clone());

        let result = fetcher
            .fetch_image("/images/1.png", options(Duration::from_secs(5)))
            .await;

        assert_eq!(result.status(), ImageStatus::Loaded);
        assert_eq!(tokens.refresh_calls(), 1);
        let requests = seen.lock();
        assert_eq!(requests.len(), 2);
        assert!(requests[0].contains("authorization: bearer stale"));
        assert!(requests[1].contains("authorization: bearer fresh"));
    }

    #[tokio::test]
    async fn test_unauthorized_without_token_does_not_retry() {
        let (base, seen) = serve(vec![(401, "")]).await;
        let fetcher = fetcher(Some(&base));

        let result = fetcher
            .fetch_image("/images/1.png", options(Duration::from_secs(5)))
            .await;

        assert_eq!(result.status(), ImageStatus::Unauthorized);
        assert_eq!(seen.lock().len(), 1);
    }

    #[tokio::test]
    async fn test_forbidden_response() {
        let (base, _seen) = serve(vec![(403, "")]).await;
        let fetcher = fetcher(Some(&base));

        let result = fetcher
            .fetch_image("/images/1.png", options(Duration::from_secs(5)))
            .await;

        assert_eq!(result.status(), ImageStatus::Forbidden);
        assert!(fetcher.registry().is_empty());
    }

    #[tokio::test]
    async fn test_silent_server_times_out() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let _server = tokio::spawn(async move {
            let _conn = listener.accept().await;
            tokio::time::sleep(Duration::from_secs(30)).await;
        });
        let fetcher = fetcher(Some(&format!("http://{addr}")));

        let result = fetcher
            .fetch_image("/slow.png", options(Duration::from_millis(100)))
            .await;

        assert_eq!(result.status(), ImageStatus::Timeout);
    }

    #[tokio::test]
    async fn test_cancelled_fetch_is_aborted() {
        let fetcher = fetcher(Some("http://127.0.0.1:9"));
        let options = options(Duration::from_secs(5));
        options.cancel.cancel();

        let result = fetcher.fetch_image("/images/1.png", options).await;

        assert_eq!(result.status(), ImageStatus::Aborted);
    }
}
