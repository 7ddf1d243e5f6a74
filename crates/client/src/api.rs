use std::time::Duration;

use movely_core::config::ApiConfig;
use reqwest::{Method, RequestBuilder, Response, StatusCode, Url};
use secrecy::{ExposeSecret, SecretString};
use serde::de::DeserializeOwned;
use serde::Serialize;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ClientError {
    #[error("invalid api configuration: {0}")]
    Configuration(String),
    #[error("network failure: {0}")]
    Network(String),
    #[error("unexpected status {status}: {body}")]
    Status { status: u16, body: String },
    #[error("response could not be decoded: {0}")]
    Decode(String),
}

impl ClientError {
    fn from_transport(error: reqwest::Error) -> Self {
        if error.is_decode() {
            Self::Decode(error.to_string())
        } else {
            Self::Network(error.to_string())
        }
    }
}

/// Thin JSON client bound to one API base URL. Cheap to clone.
#[derive(Clone)]
pub struct ApiClient {
    http: reqwest::Client,
    base_url: Url,
    auth_token: Option<SecretString>,
}

impl std::fmt::Debug for ApiClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ApiClient")
            .field("base_url", &self.base_url.as_str())
            .field("authenticated", &self.auth_token.is_some())
            .finish()
    }
}

impl ApiClient {
    pub fn new(
        base_url: &str,
        timeout: Duration,
        auth_token: Option<SecretString>,
    ) -> Result<Self, ClientError> {
        let base_url = Url::parse(base_url)
            .map_err(|error| ClientError::Configuration(format!("base url `{base_url}`: {error}")))?;
        if base_url.cannot_be_a_base() {
            return Err(ClientError::Configuration(format!("base url `{base_url}` has no path")));
        }

        let http = reqwest::Client::builder()
            .timeout(timeout)
            .user_agent(concat!("movely/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|error| ClientError::Configuration(error.to_string()))?;

        Ok(Self { http, base_url, auth_token })
    }

    pub fn from_config(config: &ApiConfig) -> Result<Self, ClientError> {
        Self::new(
            &config.base_url,
            Duration::from_secs(config.timeout_secs),
            config.auth_token.clone(),
        )
    }

    pub fn base_url(&self) -> &str {
        self.base_url.as_str()
    }

    /// Appends percent-encoded path segments to the base URL.
    pub fn endpoint(&self, segments: &[&str]) -> Result<Url, ClientError> {
        let mut url = self.base_url.clone();
        url.path_segments_mut()
            .map_err(|()| ClientError::Configuration("base url cannot take a path".to_owned()))?
            .pop_if_empty()
            .extend(segments);
        Ok(url)
    }

    pub async fn get_json<T: DeserializeOwned>(
        &self,
        segments: &[&str],
        query: &[(&str, &str)],
    ) -> Result<T, ClientError> {
        let response = self.send(self.request(Method::GET, segments)?.query(query)).await?;
        decode(response).await
    }

    /// Like [`ApiClient::get_json`] but a 404 yields `None`.
    pub async fn get_optional_json<T: DeserializeOwned>(
        &self,
        segments: &[&str],
    ) -> Result<Option<T>, ClientError> {
        let response = self.request(Method::GET, segments)?.send().await;
        let response = response.map_err(ClientError::from_transport)?;
        if response.status() == StatusCode::NOT_FOUND {
            return Ok(None);
        }
        decode(ensure_success(response).await?).await.map(Some)
    }

    pub async fn post_json<B, T>(&self, segments: &[&str], body: &B) -> Result<T, ClientError>
    where
        B: Serialize + ?Sized,
        T: DeserializeOwned,
    {
        let response = self.send(self.request(Method::POST, segments)?.json(body)).await?;
        decode(response).await
    }

    /// Posts `body` and ignores whatever the server answers with on success.
    pub async fn post_unit<B>(&self, segments: &[&str], body: &B) -> Result<(), ClientError>
    where
        B: Serialize + ?Sized,
    {
        self.send(self.request(Method::POST, segments)?.json(body)).await?;
        Ok(())
    }

    /// Returns whether something was deleted; a 404 is not an error.
    pub async fn delete(&self, segments: &[&str]) -> Result<bool, ClientError> {
        let response = self.request(Method::DELETE, segments)?.send().await;
        let response = response.map_err(ClientError::from_transport)?;
        if response.status() == StatusCode::NOT_FOUND {
            return Ok(false);
        }
        ensure_success(response).await?;
        Ok(true)
    }

    fn request(&self, method: Method, segments: &[&str]) -> Result<RequestBuilder, ClientError> {
        let url = self.endpoint(segments)?;
        let builder = self.http.request(method, url);
        Ok(match &self.auth_token {
            Some(token) => builder.bearer_auth(token.expose_secret()),
            None => builder,
        })
    }

    async fn send(&self, builder: RequestBuilder) -> Result<Response, ClientError> {
        let response = builder.send().await.map_err(ClientError::from_transport)?;
        ensure_success(response).await
    }
}

async fn ensure_success(response: Response) -> Result<Response, ClientError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }

    let url = response.url().clone();
    let body = response.text().await.unwrap_or_default();
    tracing::debug!(
        event_name = "client.unexpected_status",
        status = status.as_u16(),
        url = %url,
        "api responded with an error status"
    );
    Err(ClientError::Status { status: status.as_u16(), body })
}

async fn decode<T: DeserializeOwned>(response: Response) -> Result<T, ClientError> {
    let bytes = response.bytes().await.map_err(ClientError::from_transport)?;
    serde_json::from_slice(&bytes).map_err(|error| ClientError::Decode(error.to_string()))
}
