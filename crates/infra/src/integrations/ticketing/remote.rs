//! reqwest implementation of [`TicketRemote`]

use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Method, Response, StatusCode};
use serde::de::DeserializeOwned;
use tixlens_core::{ServiceError, ServiceResult, TicketRemote};
use tixlens_domain::{RemoteSettings, Ticket, TicketQuery, TixLensError};
use tracing::{debug, instrument};
use url::Url;

use super::wire::{SearchBody, WireTicket};
use crate::http::{check_status, HttpClient};

const API_SEGMENTS: [&str; 3] = ["api", "v1", "tickets"];

/// Talks to `{base_url}/api/v1/tickets`.
///
/// Every pooled handle is its own [`HttpClient`] with its own connection
/// pool, so the resilient client's pool size bounds open connections.
#[derive(Debug, Clone)]
pub struct HttpTicketRemote {
    base_url: Url,
    request_timeout: Duration,
}

impl HttpTicketRemote {
    /// # Errors
    /// `TixLensError::Config` when `base_url` is not an absolute http(s) URL.
    pub fn new(base_url: &str, request_timeout: Duration) -> Result<Self, TixLensError> {
        let base_url = Url::parse(base_url)
            .map_err(|err| TixLensError::Config(format!("remote.base_url: {err}")))?;
        if !matches!(base_url.scheme(), "http" | "https") || base_url.cannot_be_a_base() {
            return Err(TixLensError::Config(format!(
                "remote.base_url must be an http(s) URL, got scheme '{}'",
                base_url.scheme()
            )));
        }
        Ok(Self { base_url, request_timeout })
    }

    pub fn from_settings(settings: &RemoteSettings) -> Result<Self, TixLensError> {
        Self::new(&settings.base_url, settings.request_timeout())
    }

    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    fn endpoint(&self, tail: &str) -> ServiceResult<Url> {
        let mut url = self.base_url.clone();
        url.path_segments_mut()
            .map_err(|()| ServiceError::invalid_input("remote base URL cannot carry a path"))?
            .pop_if_empty()
            .extend(API_SEGMENTS)
            .push(tail);
        Ok(url)
    }
}

#[async_trait]
impl TicketRemote for HttpTicketRemote {
    type Handle = HttpClient;

    async fn open_handle(&self) -> ServiceResult<HttpClient> {
        debug!(base = %self.base_url, "Opening HTTP handle");
        HttpClient::builder().timeout(self.request_timeout).build()
    }

    #[instrument(skip_all, fields(limit = query.limit))]
    async fn search(&self, handle: &HttpClient, query: &TicketQuery) -> ServiceResult<Vec<Ticket>> {
        let url = self.endpoint("search")?;
        let response = handle.send(handle.request(Method::POST, url).json(query)).await?;
        let body: SearchBody = decode(check_status(response)?).await?;
        let tickets = body.into_tickets()?;
        debug!(count = tickets.len(), "Search returned");
        Ok(tickets)
    }

    #[instrument(skip(self, handle))]
    async fn get(&self, handle: &HttpClient, id: &str) -> ServiceResult<Option<Ticket>> {
        let url = self.endpoint(id)?;
        let response = handle.send(handle.request(Method::GET, url)).await?;
        if response.status() == StatusCode::NOT_FOUND {
            return Ok(None);
        }
        let wire: WireTicket = decode(check_status(response)?).await?;
        wire.into_ticket().map(Some)
    }
}

/// Decode a JSON body, reporting only where it broke, never its content
async fn decode<T: DeserializeOwned>(response: Response) -> ServiceResult<T> {
    let bytes = response.bytes().await.map_err(|err| {
        if err.is_timeout() {
            ServiceError::timeout("ticket service response timed out")
        } else {
            ServiceError::connection("ticket service response was cut off")
        }
    })?;
    serde_json::from_slice(&bytes).map_err(|err| {
        ServiceError::malformed_response(format!(
            "undecodable ticket service payload ({:?} error at line {} column {})",
            err.classify(),
            err.line(),
            err.column()
        ))
    })
}
