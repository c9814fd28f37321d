//! # HTTP Transport
//!
//! Thin wrapper over `reqwest` for the integrator endpoints.
//!
//! ## Request Flow
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  IntegratorClient                                                       │
//! │       │  (already validated)                                            │
//! │       ▼                                                                 │
//! │  HttpTransport::get(action, params)   HttpTransport::post_json(..)     │
//! │       │                                     │                           │
//! │       ▼                                     ▼                           │
//! │  <base>/server/...?act=<action>&k=v   <base>/server/...?act=updatePos  │
//! │       │                                     │  body: JSON               │
//! │       └──────────────┬──────────────────────┘                           │
//! │                      ▼                                                  │
//! │               2xx ──► Ok(body text)                                     │
//! │               else ─► Err(HttpStatus { status, body })                  │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! One request per call. No retries and no session state.

use reqwest::Client;
use serde::Serialize;
use std::time::Duration;
use tracing::{debug, warn};
use url::Url;

use crate::config::IntegratorConfig;
use crate::error::{ClientError, ClientResult};
use crate::protocol::Action;

/// HTTP access to the integrator service.
#[derive(Debug, Clone)]
pub struct HttpTransport {
    client: Client,
    base_url: Url,
    timeout: Duration,
}

impl HttpTransport {
    /// Builds the transport from validated settings.
    pub fn new(config: &IntegratorConfig) -> ClientResult<Self> {
        let mut base_url = config.parsed_base_url()?;
        // Url::join replaces the last segment unless the path ends in '/'.
        if !base_url.path().ends_with('/') {
            let path = format!("{}/", base_url.path());
            base_url.set_path(&path);
        }

        let client = Client::builder()
            .user_agent(format!("kasir/{}", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| ClientError::InvalidConfig(format!("HTTP client: {e}")))?;

        Ok(HttpTransport {
            client,
            base_url,
            timeout: config.timeout(),
        })
    }

    /// Full URL for an action, including `act=`.
    pub fn endpoint(&self, action: Action) -> ClientResult<Url> {
        let mut url = self.base_url.join(action.path())?;
        url.query_pairs_mut().append_pair("act", action.as_str());
        Ok(url)
    }

    /// Sends a GET with `params` URL-encoded after `act`.
    pub async fn get<'a, I>(&self, action: Action, params: I) -> ClientResult<String>
    where
        I: IntoIterator<Item = (&'a str, &'a str)>,
    {
        let mut url = self.endpoint(action)?;
        url.query_pairs_mut().extend_pairs(params);

        debug!(action = %action, url = %url, "Sending integrator GET");
        let response = self
            .client
            .get(url)
            .timeout(self.timeout)
            .send()
            .await?;
        read_body(action, response).await
    }

    /// Sends a POST with a JSON body.
    pub async fn post_json<T>(&self, action: Action, body: &T) -> ClientResult<String>
    where
        T: Serialize + ?Sized,
    {
        let url = self.endpoint(action)?;
        let payload = serde_json::to_vec(body)?;

        debug!(action = %action, url = %url, bytes = payload.len(), "Sending integrator POST");
        let response = self
            .client
            .post(url)
            .timeout(self.timeout)
            .header(reqwest::header::CONTENT_TYPE, "application/json")
            .body(payload)
            .send()
            .await?;
        read_body(action, response).await
    }
}

async fn read_body(action: Action, response: reqwest::Response) -> ClientResult<String> {
    let status = response.status();
    if !status.is_success() {
        let body = response
            .text()
            .await
            .unwrap_or_else(|_| String::from("Unknown error"));
        warn!(action = %action, status = status.as_u16(), "Integrator returned an error status");
        return Err(ClientError::HttpStatus {
            status: status.as_u16(),
            body,
        });
    }

    let body = response.text().await?;
    debug!(action = %action, status = status.as_u16(), bytes = body.len(), "Integrator response received");
    Ok(body)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn transport(base: &str) -> HttpTransport {
        HttpTransport::new(&IntegratorConfig::new(base)).unwrap()
    }

    #[test]
    fn test_endpoint_urls() {
        let t = transport("https://pos.example.com");
        assert_eq!(
            t.endpoint(Action::UpdateLoginProcess).unwrap().as_str(),
            "https://pos.example.com/server/svr_pos_user.php?act=updateLoginProcess"
        );
        assert_eq!(
            t.endpoint(Action::UpdatePos).unwrap().as_str(),
            "https://pos.example.com/server/svr_group_pos.php?act=updatePos"
        );
    }

    #[test]
    fn test_endpoint_keeps_base_path() {
        let t = transport("https://example.com/pos");
        assert_eq!(
            t.endpoint(Action::GetGroupPos).unwrap().as_str(),
            "https://example.com/pos/server/svr_pos_user.php?act=getGroupPos"
        );
    }

    #[test]
    fn test_rejects_non_http_base() {
        let err = HttpTransport::new(&IntegratorConfig::new("ftp://example.com")).unwrap_err();
        assert!(matches!(err, ClientError::InvalidUrl(_)));
    }

    #[tokio::test]
    async fn test_error_status_carries_body() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("GET", "/server/svr_pos_user.php")
            .match_query(mockito::Matcher::UrlEncoded("act".into(), "getGroupPos".into()))
            .with_status(500)
            .with_body("boom")
            .create_async()
            .await;

        let err = transport(&server.url())
            .get(Action::GetGroupPos, [])
            .await
            .unwrap_err();

        match err {
            ClientError::HttpStatus { status, body } => {
                assert_eq!(status, 500);
                assert_eq!(body, "boom");
            }
            other => panic!("unexpected error: {other:?}"),
        }
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn test_unreachable_host_is_transport_error() {
        let config = IntegratorConfig {
            timeout_secs: 2,
            ..IntegratorConfig::new("http://127.0.0.1:1")
        };
        let err = HttpTransport::new(&config)
            .unwrap()
            .get(Action::GetGroupPos, [])
            .await
            .unwrap_err();
        assert!(matches!(err, ClientError::Transport(_)));
        assert!(err.is_retryable());
    }
}
