use crate::config::FetcherConfig;
use crate::credentials::Authorization;
use async_trait::async_trait;
use reqwest::{Method, StatusCode, Url};
use tokio::time::{Duration, sleep};

#[derive(thiserror::Error, Debug)]
pub enum TransportError {
    #[error("{0}")]
    Http(#[from] reqwest::Error),
    #[error("invalid URL: {0}")]
    InvalidUrl(#[from] url::ParseError),
    #[error("unexpected status code: {0}")]
    Status(StatusCode),
    #[error("retries exceeded after {attempts} attempts, last status: {last_status}")]
    RetriesExceeded { attempts: u32, last_status: StatusCode },
    #[error("request was cancelled")]
    Cancelled,
    #[error("{0}")]
    Other(String),
}

/// Performs the request for a configuration document.
///
/// `retries` is the total number of attempts the fetcher may make before
/// giving up. Implementations must always complete, a cancelled request is
/// reported as [`TransportError::Cancelled`].
#[async_trait]
pub trait RemoteFetcher: Send + Sync {
    async fn get(
        &self,
        url: &str,
        body: Option<&str>,
        authorization: &Authorization,
        retries: u32,
    ) -> Result<String, TransportError>;
}

const RETRIABLE_STATUS_CODES: &[StatusCode] = &[
    StatusCode::TOO_MANY_REQUESTS,     // 429
    StatusCode::INTERNAL_SERVER_ERROR, // 500
    StatusCode::BAD_GATEWAY,           // 502
    StatusCode::SERVICE_UNAVAILABLE,   // 503
    StatusCode::GATEWAY_TIMEOUT,       // 504
];

const MAX_BACKOFF_EXPONENT: u32 = 16;
const MAX_BACKOFF: Duration = Duration::from_secs(60);

pub struct HttpFetcher {
    client: reqwest::Client,
    base_delay: Duration,
}

impl HttpFetcher {
    pub fn new(config: &FetcherConfig) -> Result<Self, TransportError> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()?;

        Ok(HttpFetcher {
            client,
            base_delay: Duration::from_millis(config.base_delay_ms),
        })
    }

    fn backoff(&self, attempt: u32) -> Duration {
        let exponent = attempt.saturating_sub(1).min(MAX_BACKOFF_EXPONENT);
        self.base_delay
            .checked_mul(2_u32.pow(exponent))
            .map_or(MAX_BACKOFF, |delay| delay.min(MAX_BACKOFF))
    }
}

#[async_trait]
impl RemoteFetcher for HttpFetcher {
    async fn get(
        &self,
        url: &str,
        body: Option<&str>,
        authorization: &Authorization,
        retries: u32,
    ) -> Result<String, TransportError> {
        let url = Url::parse(url)?;
        let attempts = retries.max(1);
        let mut attempt = 0;

        loop {
            attempt += 1;

            let mut request = self.client.request(Method::GET, url.clone());
            if let Some(body) = body {
                request = request.body(body.to_owned());
            }
            if let Some(bearer) = authorization.bearer() {
                request = request.bearer_auth(bearer);
            }

            match request.send().await {
                Ok(response) if response.status().is_success() => {
                    return Ok(response.text().await?);
                }
                Ok(response) => {
                    let status = response.status();
                    if !RETRIABLE_STATUS_CODES.contains(&status) {
                        return Err(TransportError::Status(status));
                    }
                    if attempt >= attempts {
                        return Err(TransportError::RetriesExceeded {
                            attempts,
                            last_status: status,
                        });
                    }
                    tracing::warn!(
                        %url,
                        %status,
                        attempt,
                        "configuration request failed, retrying"
                    );
                }
                Err(err) if err.is_connect() || err.is_timeout() => {
                    if attempt >= attempts {
                        return Err(err.into());
                    }
                    tracing::warn!(
                        %url,
                        error = %err,
                        attempt,
                        "configuration request failed, retrying"
                    );
                }
                Err(err) => return Err(err.into()),
            }

            sleep(self.backoff(attempt)).await;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testutils::CONFIGURATION;
    use wiremock::matchers::{header, method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn fetcher() -> HttpFetcher {
        HttpFetcher::new(&FetcherConfig {
            timeout_secs: 5,
            base_delay_ms: 1,
        })
        .unwrap()
    }

    #[tokio::test]
    async fn test_fetch_success() {
        let mock_server = MockServer::start().await;

        Mock::given(method("GET"))
            .and(path("/config"))
            .and(query_param("configVersion", "3"))
            .and(header("Authorization", "Bearer token"))
            .respond_with(ResponseTemplate::new(200).set_body_string(CONFIGURATION))
            .expect(1)
            .mount(&mock_server)
            .await;

        let authorization = Authorization::new("unused", Some("token".into()));
        let url = format!("{}/config?configVersion=3", mock_server.uri());
        let body = fetcher().get(&url, None, &authorization, 3).await.unwrap();
        assert_eq!(body, CONFIGURATION);
    }

    #[tokio::test]
    async fn test_fetch_without_bearer() {
        let mock_server = MockServer::start().await;

        Mock::given(method("GET"))
            .and(path("/config"))
            .respond_with(ResponseTemplate::new(200).set_body_string("{}"))
            .mount(&mock_server)
            .await;

        let authorization = Authorization::new("unused", None);
        let url = format!("{}/config", mock_server.uri());
        let body = fetcher().get(&url, None, &authorization, 3).await.unwrap();
        assert_eq!(body, "{}");

        let requests = mock_server.received_requests().await.unwrap();
        assert_eq!(requests.len(), 1);
        assert!(!requests[0].headers.contains_key("authorization"));
    }

    #[tokio::test]
    async fn test_non_retriable_status() {
        let mock_server = MockServer::start().await;

        Mock::given(method("GET"))
            .and(path("/config"))
            .respond_with(ResponseTemplate::new(404))
            .expect(1)
            .mount(&mock_server)
            .await;

        let authorization = Authorization::new("unused", None);
        let url = format!("{}/config", mock_server.uri());
        let result = fetcher().get(&url, None, &authorization, 3).await;
        assert!(matches!(
            result,
            Err(TransportError::Status(StatusCode::NOT_FOUND))
        ));
    }

    #[tokio::test]
    async fn test_retries_exceeded() {
        let mock_server = MockServer::start().await;

        Mock::given(method("GET"))
            .and(path("/config"))
            .respond_with(ResponseTemplate::new(503))
            .expect(3)
            .mount(&mock_server)
            .await;

        let authorization = Authorization::new("unused", None);
        let url = format!("{}/config", mock_server.uri());
        let err = fetcher()
            .get(&url, None, &authorization, 3)
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            TransportError::RetriesExceeded {
                attempts: 3,
                last_status: StatusCode::SERVICE_UNAVAILABLE
            }
        ));
    }

    #[tokio::test]
    async fn test_retry_then_success() {
        let mock_server = MockServer::start().await;

        Mock::given(method("GET"))
            .and(path("/config"))
            .respond_with(ResponseTemplate::new(502))
            .up_to_n_times(1)
            .mount(&mock_server)
            .await;
        Mock::given(method("GET"))
            .and(path("/config"))
            .respond_with(ResponseTemplate::new(200).set_body_string(CONFIGURATION))
            .mount(&mock_server)
            .await;

        let authorization = Authorization::new("unused", None);
        let url = format!("{}/config", mock_server.uri());
        let body = fetcher().get(&url, None, &authorization, 3).await.unwrap();
        assert_eq!(body, CONFIGURATION);
    }

    #[tokio::test]
    async fn test_invalid_url() {
        let authorization = Authorization::new("unused", None);
        let result = fetcher().get("not a url", None, &authorization, 3).await;
        assert!(matches!(result, Err(TransportError::InvalidUrl(_))));
    }

    #[test]
    fn test_backoff() {
        let fetcher = HttpFetcher::new(&FetcherConfig::default()).unwrap();
        assert_eq!(fetcher.backoff(1), Duration::from_millis(500));
        assert_eq!(fetcher.backoff(2), Duration::from_millis(1000));
        assert_eq!(fetcher.backoff(3), Duration::from_millis(2000));
        assert_eq!(fetcher.backoff(7), Duration::from_millis(32000));
        assert_eq!(fetcher.backoff(8), MAX_BACKOFF);
    }

    #[test]
    fn test_backoff_is_bounded() {
        let fetcher = HttpFetcher::new(&FetcherConfig::default()).unwrap();
        assert_eq!(fetcher.backoff(34), MAX_BACKOFF);
        assert_eq!(fetcher.backoff(u32::MAX), MAX_BACKOFF);

        let slow = HttpFetcher::new(&FetcherConfig {
            base_delay_ms: u64::MAX,
            ..FetcherConfig::default()
        })
        .unwrap();
        assert_eq!(slow.backoff(1), MAX_BACKOFF);
        assert_eq!(slow.backoff(u32::MAX), MAX_BACKOFF);
    }
}
