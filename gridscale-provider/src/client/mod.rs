//! gridscale API client
//!
//! Resource handlers talk to the API only through the [`GridscaleApi`]
//! trait. [`HttpClient`] is the REST implementation; tests substitute an
//! in-memory one.

mod http;
#[cfg(test)]
pub(crate) mod mock;
pub mod models;

use std::time::Duration;

use async_trait::async_trait;
use thiserror::Error;

pub use http::HttpClient;
pub use models::*;

/// Error returned by the API for a non-2xx response
#[derive(Debug, Clone, PartialEq, Error)]
#[error("request failed with status {status_code}: {message}")]
pub struct RequestError {
    pub status_code: u16,
    pub message: String,
    pub request_uuid: Option<String>,
}

impl RequestError {
    pub fn new(status_code: u16, message: impl Into<String>) -> Self {
        Self {
            status_code,
            message: message.into(),
            request_uuid: None,
        }
    }
}

/// Client errors
#[derive(Debug, Error)]
pub enum ClientError {
    #[error(transparent)]
    Request(#[from] RequestError),

    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("failed to decode response: {0}")]
    Decode(#[from] serde_json::Error),

    #[error("operation timed out after {0:?}")]
    Timeout(Duration),
}

impl ClientError {
    /// HTTP status code, when the API answered with an error
    pub fn status_code(&self) -> Option<u16> {
        match self {
            ClientError::Request(e) => Some(e.status_code),
            _ => None,
        }
    }

    pub fn is_not_found(&self) -> bool {
        self.status_code() == Some(404)
    }
}

pub type ClientResult<T> = Result<T, ClientError>;

/// Typed operations of the gridscale API used by the provider
#[async_trait]
pub trait GridscaleApi: Send + Sync {
    async fn get_server(&self, id: &str) -> ClientResult<Server>;
    async fn create_server(&self, request: &ServerCreateRequest) -> ClientResult<CreateResponse>;
    async fn update_server(&self, id: &str, request: &ServerUpdateRequest) -> ClientResult<()>;
    async fn set_server_power(&self, id: &str, power: bool) -> ClientResult<()>;
    async fn delete_server(&self, id: &str) -> ClientResult<()>;

    async fn get_network(&self, id: &str) -> ClientResult<Network>;
    async fn get_network_list(&self) -> ClientResult<Vec<Network>>;
    async fn create_network(&self, request: &NetworkCreateRequest) -> ClientResult<CreateResponse>;
    async fn update_network(&self, id: &str, request: &NetworkUpdateRequest) -> ClientResult<()>;
    async fn delete_network(&self, id: &str) -> ClientResult<()>;

    async fn get_paas_service(&self, id: &str) -> ClientResult<PaaSService>;
    async fn create_paas_service(
        &self,
        request: &PaaSServiceCreateRequest,
    ) -> ClientResult<CreateResponse>;
    async fn update_paas_service(
        &self,
        id: &str,
        request: &PaaSServiceUpdateRequest,
    ) -> ClientResult<()>;
    async fn delete_paas_service(&self, id: &str) -> ClientResult<()>;
    async fn get_paas_template_list(&self) -> ClientResult<Vec<PaaSTemplate>>;
}
