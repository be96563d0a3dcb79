use std::time::Duration;

use reqwest::header::{HeaderMap, RETRY_AFTER};
use reqwest::{Client as ReqwestClient, Method, RequestBuilder, Response, StatusCode};
use tixlens_core::ServiceError;
use tracing::debug;

/// Single-attempt HTTP transport.
///
/// Retries belong to the resilient client, so `send` makes exactly one
/// attempt and reduces transport failures and non-success statuses to a
/// [`ServiceError`] the retry and breaker layers can classify.
#[derive(Clone)]
pub struct HttpClient {
    client: ReqwestClient,
}

impl HttpClient {
    /// Start building a new HTTP client.
    pub fn builder() -> HttpClientBuilder {
        HttpClientBuilder::default()
    }

    /// Convenience constructor with default configuration.
    pub fn new() -> Result<Self, ServiceError> {
        Self::builder().build()
    }

    /// Create a request builder using the underlying reqwest client.
    pub fn request<U>(&self, method: Method, url: U) -> RequestBuilder
    where
        U: reqwest::IntoUrl,
    {
        self.client.request(method, url)
    }

    /// Execute the request once.
    ///
    /// Any status is returned as a response; use [`check_status`] to turn
    /// non-success statuses into errors. Bodies are never logged.
    pub async fn send(&self, builder: RequestBuilder) -> Result<Response, ServiceError> {
        let request = builder
            .build()
            .map_err(|err| ServiceError::invalid_input(format!("invalid HTTP request: {err}")))?;

        let method = request.method().clone();
        let url = request.url().clone();
        debug!(%method, path = url.path(), "sending HTTP request");

        match self.client.execute(request).await {
            Ok(response) => {
                debug!(%method, path = url.path(), status = %response.status(), "received HTTP response");
                Ok(response)
            }
            Err(err) => {
                debug!(%method, path = url.path(), error = %err, "HTTP request failed");
                Err(map_transport_error(&err))
            }
        }
    }
}

/// Pass success responses through and classify everything else
pub fn check_status(response: Response) -> Result<Response, ServiceError> {
    match classify_status(response.status(), response.headers()) {
        Some(err) => Err(err),
        None => Ok(response),
    }
}

/// Map a non-success status to its error kind; `None` for 2xx.
///
/// 401/403 mean the session is no longer accepted, 408/504 are timeouts,
/// 429 and 5xx are transient, and any other status is a rejection of the
/// request itself.
pub fn classify_status(status: StatusCode, headers: &HeaderMap) -> Option<ServiceError> {
    if status.is_success() {
        return None;
    }
    let code = status.as_u16();
    let err = match status {
        StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => ServiceError::remote_auth_denied(code),
        StatusCode::REQUEST_TIMEOUT | StatusCode::GATEWAY_TIMEOUT => {
            ServiceError::timeout(format!("ticket service timed out (HTTP {code})")).with_status(code)
        }
        StatusCode::TOO_MANY_REQUESTS => {
            ServiceError::connection("ticket service is throttling requests").with_status(code)
        }
        s if s.is_server_error() => {
            ServiceError::connection(format!("ticket service unavailable (HTTP {code})"))
                .with_status(code)
        }
        _ => ServiceError::rejected(code, format!("ticket service rejected the request (HTTP {code})")),
    };
    Some(match retry_after(headers) {
        Some(delay) => err.with_retry_after(delay),
        None => err,
    })
}

fn retry_after(headers: &HeaderMap) -> Option<Duration> {
    let seconds = headers.get(RETRY_AFTER)?.to_str().ok()?.trim().parse::<u64>().ok()?;
    Some(Duration::from_secs(seconds))
}

fn map_transport_error(err: &reqwest::Error) -> ServiceError {
    if err.is_timeout() {
        ServiceError::timeout("ticket service request timed out")
    } else if err.is_decode() || err.is_body() {
        ServiceError::malformed_response(format!("unreadable ticket service response: {err}"))
    } else {
        ServiceError::connection(format!("ticket service unreachable: {}", without_url(err)))
    }
}

fn without_url(err: &reqwest::Error) -> String {
    match err.url() {
        Some(url) => err.to_string().replace(url.as_str(), url.path()),
        None => err.to_string(),
    }
}

/// Builder for [`HttpClient`].
#[derive(Debug)]
pub struct HttpClientBuilder {
    timeout: Duration,
    user_agent: Option<String>,
    default_headers: Option<HeaderMap>,
}

impl Default for HttpClientBuilder {
    fn default() -> Self {
        Self {
            timeout: Duration::from_secs(30),
            user_agent: Some(concat!("tixlens/", env!("CARGO_PKG_VERSION")).to_string()),
            default_headers: None,
        }
    }
}

impl HttpClientBuilder {
    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn user_agent(mut self, agent: impl Into<String>) -> Self {
        self.user_agent = Some(agent.into());
        self
    }

    pub fn default_headers(mut self, headers: HeaderMap) -> Self {
        self.default_headers = Some(headers);
        self
    }

    pub fn build(self) -> Result<HttpClient, ServiceError> {
        let mut builder = ReqwestClient::builder().timeout(self.timeout).no_proxy();

        if let Some(agent) = self.user_agent {
            builder = builder.user_agent(agent);
        }

        if let Some(headers) = self.default_headers {
            builder = builder.default_headers(headers);
        }

        let client = builder
            .build()
            .map_err(|err| ServiceError::connection(format!("failed to build HTTP client: {err}")))?;

        Ok(HttpClient { client })
    }
}

#[cfg(test)]
mod tests {
    use std::net::TcpListener;

    use tixlens_common::error::ErrorClassification;
    use tixlens_core::ServiceErrorKind;
    use wiremock::matchers::method;
    use wiremock::{Mock, MockServer, ResponseTemplate};

    use super::*;

    async fn status_error(template: ResponseTemplate) -> ServiceError {
        let server = MockServer::start().await;
        Mock::given(method("GET")).respond_with(template).expect(1).mount(&server).await;

        let client = HttpClient::new().expect("http client");
        let response =
            client.send(client.request(Method::GET, server.uri())).await.expect("response");
        check_status(response).expect_err("non-success status")
    }

    #[tokio::test]
    async fn sends_exactly_once_and_returns_success() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(200).set_body_string("ok"))
            .expect(1)
            .mount(&server)
            .await;

        let client = HttpClient::new().expect("http client");
        let response =
            client.send(client.request(Method::GET, server.uri())).await.expect("response");

        assert_eq!(check_status(response).expect("success").status(), StatusCode::OK);
        let requests = server.received_requests().await.unwrap();
        assert_eq!(requests.len(), 1);
    }

    #[tokio::test]
    async fn server_errors_are_transient_and_not_retried_here() {
        let err = status_error(ResponseTemplate::new(503)).await;

        assert_eq!(err.kind(), ServiceErrorKind::Connection);
        assert_eq!(err.status(), Some(503));
    }

    #[tokio::test]
    async fn unauthorized_is_a_remote_auth_rejection() {
        let err = status_error(ResponseTemplate::new(401)).await;

        assert!(err.is_remote_auth_rejection());
        assert_eq!(err.status(), Some(401));
    }

    #[tokio::test]
    async fn throttling_carries_retry_after() {
        let err =
            status_error(ResponseTemplate::new(429).insert_header("Retry-After", "7")).await;

        assert_eq!(err.kind(), ServiceErrorKind::Connection);
        assert_eq!(err.retry_after(), Some(Duration::from_secs(7)));
    }

    #[tokio::test]
    async fn other_client_errors_are_rejections() {
        let err = status_error(ResponseTemplate::new(422)).await;

        assert_eq!(err.kind(), ServiceErrorKind::RemoteRejected);
        assert!(!err.kind().is_retryable());
    }

    #[tokio::test]
    async fn slow_server_maps_to_timeout() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(200).set_delay(Duration::from_millis(500)))
            .mount(&server)
            .await;

        let client =
            HttpClient::builder().timeout(Duration::from_millis(50)).build().expect("http client");
        let err = client
            .send(client.request(Method::GET, server.uri()))
            .await
            .expect_err("request should time out");

        assert_eq!(err.kind(), ServiceErrorKind::Timeout);
    }

    #[tokio::test]
    async fn refused_connection_maps_to_connection_error() {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let addr = listener.local_addr().unwrap();
        drop(listener); // release the port so that requests fail with ECONNREFUSED
        let url = format!("http://{addr}/api/v1/tickets/search");

        let client = HttpClient::new().expect("http client");
        let err = client.send(client.request(Method::GET, &url)).await.expect_err("refused");

        assert_eq!(err.kind(), ServiceErrorKind::Connection);
        assert!(!err.message().contains(&addr.to_string()));
    }
}
