//! HTTP Client
//!
//! Thin async wrapper over `reqwest` for JSON exchanges and streamed bodies.
//! There is no retry layer: a failed request surfaces its error as is.

use crate::error::{excerpt, ChatError, Result};
use futures::Stream;
use reqwest::header::{HeaderMap, HeaderName, HeaderValue, ACCEPT, AUTHORIZATION, CONTENT_TYPE};
use reqwest::{Client, Response, Url};
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::collections::HashMap;
use std::pin::Pin;
use std::time::Duration;

/// Streamed response body
pub type ByteStream = Pin<Box<dyn Stream<Item = Result<bytes::Bytes>> + Send>>;

/// HTTP client carrying the default headers of every request
#[derive(Debug, Clone)]
pub struct HttpClient {
    /// Inner reqwest client
    client: Client,

    /// Content type, bearer credential and configured extra headers
    headers: HeaderMap,
}

impl HttpClient {
    /// Create a new HTTP client.
    ///
    /// Only the connect phase is bounded; a streamed completion may run for
    /// as long as the server keeps sending.
    pub fn new(
        api_key: Option<&str>,
        extra_headers: &HashMap<String, String>,
        connect_timeout: Duration,
    ) -> Result<Self> {
        let client = Client::builder()
            .connect_timeout(connect_timeout)
            .pool_max_idle_per_host(10)
            .build()
            .map_err(|e| ChatError::Internal(format!("Failed to create HTTP client: {}", e)))?;

        Ok(Self {
            client,
            headers: build_headers(api_key, extra_headers)?,
        })
    }

    /// POST a JSON body and decode a JSON response
    pub async fn post_json<T, R>(&self, url: Url, body: &T) -> Result<R>
    where
        T: Serialize + ?Sized,
        R: DeserializeOwned,
    {
        tracing::debug!(%url, "POST");
        let response = self
            .client
            .post(url)
            .headers(self.headers.clone())
            .json(body)
            .send()
            .await?;

        decode_json(check_status(response).await?).await
    }

    /// GET a JSON resource
    pub async fn get_json<R>(&self, url: Url) -> Result<R>
    where
        R: DeserializeOwned,
    {
        tracing::debug!(%url, "GET");
        let response = self
            .client
            .get(url)
            .headers(self.headers.clone())
            .send()
            .await?;

        decode_json(check_status(response).await?).await
    }

    /// POST a JSON body and return the response body as a byte stream
    pub async fn post_stream<T>(&self, url: Url, body: &T) -> Result<ByteStream>
    where
        T: Serialize + ?Sized,
    {
        use async_stream::stream;
        use futures::StreamExt;

        tracing::debug!(%url, "POST (streaming)");
        let response = self
            .client
            .post(url)
            .headers(self.headers.clone())
            .header(ACCEPT, HeaderValue::from_static("text/event-stream"))
            .json(body)
            .send()
            .await?;

        let response = check_status(response).await?;

        let mut byte_stream = response.bytes_stream();
        let s = stream! {
            while let Some(chunk) = byte_stream.next().await {
                yield chunk.map_err(ChatError::from);
            }
        };

        Ok(Box::pin(s))
    }
}

/// Default headers: JSON content type, optional bearer credential, extras
fn build_headers(
    api_key: Option<&str>,
    extra_headers: &HashMap<String, String>,
) -> Result<HeaderMap> {
    let mut headers = HeaderMap::new();
    headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));

    if let Some(key) = api_key.filter(|k| !k.is_empty()) {
        let mut value = HeaderValue::from_str(&format!("Bearer {}", key))
            .map_err(|e| ChatError::Config(format!("Invalid API key format: {}", e)))?;
        value.set_sensitive(true);
        headers.insert(AUTHORIZATION, value);
    }

    for (key, value) in extra_headers {
        let name = HeaderName::try_from(key.as_str())
            .map_err(|e| ChatError::Config(format!("Invalid header name '{}': {}", key, e)))?;
        let value = HeaderValue::from_str(value)
            .map_err(|e| ChatError::Config(format!("Invalid value for header '{}': {}", key, e)))?;
        headers.insert(name, value);
    }

    Ok(headers)
}

/// Turn a non-success status into [`ChatError::Status`]
async fn check_status(response: Response) -> Result<Response> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }

    let body = match response.text().await {
        Ok(body) => body,
        Err(e) => {
            tracing::debug!(%status, error = %e, "failed to read error body");
            String::new()
        }
    };
    tracing::warn!(%status, "request failed");
    Err(ChatError::Status {
        status,
        body: excerpt(&body),
    })
}

async fn decode_json<R: DeserializeOwned>(response: Response) -> Result<R> {
    let body = response.text().await?;
    serde_json::from_str(&body).map_err(|e| ChatError::parse(e, &body))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[tokio::test]
    async fn test_client_creation() {
        let client = HttpClient::new(None, &HashMap::new(), Duration::from_secs(10));
        assert!(client.is_ok());
    }

    #[test]
    fn test_headers_without_key() {
        let headers = build_headers(None, &HashMap::new()).unwrap();
        assert_eq!(headers[CONTENT_TYPE], "application/json");
        assert!(headers.get(AUTHORIZATION).is_none());

        let headers = build_headers(Some(""), &HashMap::new()).unwrap();
        assert!(headers.get(AUTHORIZATION).is_none());
    }

    #[test]
    fn test_headers_with_key_and_extras() {
        let extra: HashMap<String, String> =
            [("X-Wiki-Client".to_string(), "cli".to_string())].into_iter().collect();
        let headers = build_headers(Some("secret"), &extra).unwrap();

        assert_eq!(headers[AUTHORIZATION], "Bearer secret");
        assert!(headers[AUTHORIZATION].is_sensitive());
        assert_eq!(headers["x-wiki-client"], "cli");
    }

    #[tokio::test]
    async fn test_status_survives_unreadable_error_body() {
        let mut server = mockito::Server::new_async().await;
        let _mock = server
            .mock("GET", "/broken")
            .with_status(503)
            .with_chunked_body(|w| {
                w.write_all(b"partial")?;
                Err(std::io::Error::new(std::io::ErrorKind::Other, "connection dropped"))
            })
            .create_async()
            .await;

        let client = HttpClient::new(None, &HashMap::new(), Duration::from_secs(10)).unwrap();
        let url = Url::parse(&format!("{}/broken", server.url())).unwrap();
        let err = client.get_json::<serde_json::Value>(url).await.unwrap_err();

        match err {
            ChatError::Status { status, .. } => assert_eq!(status.as_u16(), 503),
            other => panic!("unexpected error {other:?}"),
        }
    }

    #[test]
    fn test_invalid_header_is_config_error() {
        let extra: HashMap<String, String> =
            [("bad header".to_string(), "x".to_string())].into_iter().collect();
        assert!(matches!(
            build_headers(None, &extra),
            Err(ChatError::Config(_))
        ));

        assert!(matches!(
            build_headers(Some("line\nbreak"), &HashMap::new()),
            Err(ChatError::Config(_))
        ));
    }
}
