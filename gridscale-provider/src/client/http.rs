//! REST implementation of [`GridscaleApi`]
//!
//! One HTTP request per call. Retries, request polling and backoff are left
//! to the caller.

use async_trait::async_trait;
use reqwest::Method;
use serde::Serialize;
use serde::de::DeserializeOwned;
use serde_json::{Map, Value as Json, json};

use super::models::*;
use super::{ClientError, ClientResult, GridscaleApi, RequestError};
use crate::config::{ConfigError, ProviderConfig};

const HEADER_USER_ID: &str = "X-Auth-UserId";
const HEADER_TOKEN: &str = "X-Auth-Token";
const HEADER_REQUEST_ID: &str = "X-Request-Id";

pub struct HttpClient {
    client: reqwest::Client,
    base_url: String,
    user_uuid: String,
    api_token: String,
}

impl std::fmt::Debug for HttpClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HttpClient")
            .field("base_url", &self.base_url)
            .field("user_uuid", &self.user_uuid)
            .field("api_token", &"<REDACTED>")
            .finish()
    }
}

#[derive(serde::Deserialize)]
struct ServerEnvelope {
    server: Server,
}

#[derive(serde::Deserialize)]
struct NetworkEnvelope {
    network: Network,
}

#[derive(serde::Deserialize)]
struct NetworkListEnvelope {
    #[serde(default)]
    networks: Map<String, Json>,
}

#[derive(serde::Deserialize)]
struct PaaSServiceEnvelope {
    paas_service: PaaSService,
}

#[derive(serde::Deserialize)]
struct PaaSTemplateListEnvelope {
    #[serde(default)]
    paas_service_templates: Map<String, Json>,
}

impl HttpClient {
    pub fn new(config: &ProviderConfig) -> Result<Self, ConfigError> {
        let client = reqwest::Client::builder()
            .timeout(config.http_timeout)
            .build()?;

        Ok(Self {
            client,
            base_url: config.api_url.trim_end_matches('/').to_string(),
            user_uuid: config.user_uuid.clone(),
            api_token: config.api_token.clone(),
        })
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    fn request(&self, method: Method, path: &str) -> reqwest::RequestBuilder {
        log::debug!("{} {}", method, path);
        self.client
            .request(method, self.url(path))
            .header(HEADER_USER_ID, &self.user_uuid)
            .header(HEADER_TOKEN, &self.api_token)
    }

    async fn send(&self, builder: reqwest::RequestBuilder) -> ClientResult<reqwest::Response> {
        let response = builder.send().await?;
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }

        let request_uuid = response
            .headers()
            .get(HEADER_REQUEST_ID)
            .and_then(|v| v.to_str().ok())
            .map(str::to_string);
        let body = response.text().await.unwrap_or_default();

        Err(RequestError {
            status_code: status.as_u16(),
            message: error_message(&body),
            request_uuid,
        }
        .into())
    }

    async fn get_json<T: DeserializeOwned>(&self, path: &str) -> ClientResult<T> {
        let response = self.send(self.request(Method::GET, path)).await?;
        let bytes = response.bytes().await?;
        Ok(serde_json::from_slice(&bytes)?)
    }

    async fn post_json<B, T>(&self, path: &str, body: &B) -> ClientResult<T>
    where
        B: Serialize + ?Sized + Sync,
        T: DeserializeOwned,
    {
        let response = self
            .send(self.request(Method::POST, path).json(body))
            .await?;
        let bytes = response.bytes().await?;
        Ok(serde_json::from_slice(&bytes)?)
    }

    async fn patch_json<B>(&self, path: &str, body: &B) -> ClientResult<()>
    where
        B: Serialize + ?Sized + Sync,
    {
        self.send(self.request(Method::PATCH, path).json(body))
            .await?;
        Ok(())
    }

    async fn delete(&self, path: &str) -> ClientResult<()> {
        self.send(self.request(Method::DELETE, path)).await?;
        Ok(())
    }
}

/// Objects of a list response keyed by UUID, in the order the API sent them
fn listed<T: DeserializeOwned>(objects: Map<String, Json>) -> ClientResult<Vec<T>> {
    objects
        .into_iter()
        .map(|(_, object)| serde_json::from_value(object).map_err(ClientError::from))
        .collect()
}

/// Pull the `message` out of an API error body, falling back to the raw body
fn error_message(body: &str) -> String {
    serde_json::from_str::<serde_json::Value>(body)
        .ok()
        .and_then(|v| v.get("message").and_then(|m| m.as_str()).map(str::to_string))
        .unwrap_or_else(|| body.trim().to_string())
}

#[async_trait]
impl GridscaleApi for HttpClient {
    async fn get_server(&self, id: &str) -> ClientResult<Server> {
        let envelope: ServerEnvelope = self.get_json(&format!("/objects/servers/{}", id)).await?;
        Ok(envelope.server)
    }

    async fn create_server(&self, request: &ServerCreateRequest) -> ClientResult<CreateResponse> {
        self.post_json("/objects/servers", request).await
    }

    async fn update_server(&self, id: &str, request: &ServerUpdateRequest) -> ClientResult<()> {
        self.patch_json(&format!("/objects/servers/{}", id), request)
            .await
    }

    async fn set_server_power(&self, id: &str, power: bool) -> ClientResult<()> {
        self.patch_json(
            &format!("/objects/servers/{}/power", id),
            &json!({ "power": power }),
        )
        .await
    }

    async fn delete_server(&self, id: &str) -> ClientResult<()> {
        self.delete(&format!("/objects/servers/{}", id)).await
    }

    async fn get_network(&self, id: &str) -> ClientResult<Network> {
        let envelope: NetworkEnvelope =
            self.get_json(&format!("/objects/networks/{}", id)).await?;
        Ok(envelope.network)
    }

    async fn get_network_list(&self) -> ClientResult<Vec<Network>> {
        let envelope: NetworkListEnvelope = self.get_json("/objects/networks").await?;
        listed(envelope.networks)
    }

    async fn create_network(&self, request: &NetworkCreateRequest) -> ClientResult<CreateResponse> {
        self.post_json("/objects/networks", request).await
    }

    async fn update_network(&self, id: &str, request: &NetworkUpdateRequest) -> ClientResult<()> {
        self.patch_json(&format!("/objects/networks/{}", id), request)
            .await
    }

    async fn delete_network(&self, id: &str) -> ClientResult<()> {
        self.delete(&format!("/objects/networks/{}", id)).await
    }

    async fn get_paas_service(&self, id: &str) -> ClientResult<PaaSService> {
        let envelope: PaaSServiceEnvelope = self
            .get_json(&format!("/objects/paas/services/{}", id))
            .await?;
        Ok(envelope.paas_service)
    }

    async fn create_paas_service(
        &self,
        request: &PaaSServiceCreateRequest,
    ) -> ClientResult<CreateResponse> {
        self.post_json("/objects/paas/services", request).await
    }

    async fn update_paas_service(
        &self,
        id: &str,
        request: &PaaSServiceUpdateRequest,
    ) -> ClientResult<()> {
        self.patch_json(&format!("/objects/paas/services/{}", id), request)
            .await
    }

    async fn delete_paas_service(&self, id: &str) -> ClientResult<()> {
        self.delete(&format!("/objects/paas/services/{}", id)).await
    }

    async fn get_paas_template_list(&self) -> ClientResult<Vec<PaaSTemplate>> {
        let envelope: PaaSTemplateListEnvelope =
            self.get_json("/objects/paas/service_templates").await?;
        listed(envelope.paas_service_templates)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error_handler::{NOT_FOUND, suppress_http_error_codes};
    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use tokio::net::TcpListener;
    use tokio::task::JoinHandle;

    /// Answer one request with a canned response. The handle yields the
    /// request head as received.
    async fn respond_once(
        status: &str,
        headers: &[(&str, &str)],
        body: &str,
    ) -> (HttpClient, JoinHandle<String>) {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();

        let mut response = format!(
            "HTTP/1.1 {}\r\nContent-Type: application/json\r\nContent-Length: {}\r\nConnection: close\r\n",
            status,
            body.len()
        );
        for (name, value) in headers {
            response.push_str(&format!("{}: {}\r\n", name, value));
        }
        response.push_str("\r\n");
        response.push_str(body);

        let handle = tokio::spawn(async move {
            let (mut socket, _) = listener.accept().await.unwrap();
            let mut head = Vec::new();
            let mut buf = [0u8; 1024];
            while !head.windows(4).any(|w| w == b"\r\n\r\n") {
                let n = socket.read(&mut buf).await.unwrap();
                if n == 0 {
                    break;
                }
                head.extend_from_slice(&buf[..n]);
            }
            socket.write_all(response.as_bytes()).await.unwrap();
            socket.shutdown().await.unwrap();
            String::from_utf8_lossy(&head).into_owned()
        });

        let config = ProviderConfig::new("user-1", "token-1").with_api_url(format!("http://{}", addr));
        (HttpClient::new(&config).unwrap(), handle)
    }

    #[tokio::test]
    async fn get_server_decodes_envelope() {
        let (client, handle) = respond_once(
            "200 OK",
            &[],
            r#"{"server": {"object_uuid": "s-1", "name": "web", "memory": 2, "cores": 1, "power": true}}"#,
        )
        .await;

        let server = client.get_server("s-1").await.unwrap();

        assert_eq!(server.object_uuid, "s-1");
        assert_eq!(server.memory, 2);
        assert!(server.power);

        let head = handle.await.unwrap().to_lowercase();
        assert!(head.starts_with("get /objects/servers/s-1 http/1.1"));
        assert!(head.contains("x-auth-userid: user-1"));
        assert!(head.contains("x-auth-token: token-1"));
    }

    #[tokio::test]
    async fn get_paas_service_decodes_envelope() {
        let (client, _) = respond_once(
            "200 OK",
            &[],
            r#"{"paas_service": {"object_uuid": "p-1", "name": "cache", "service_template_uuid": "tpl-redis"}}"#,
        )
        .await;

        let service = client.get_paas_service("p-1").await.unwrap();

        assert_eq!(service.name, "cache");
        assert_eq!(service.service_template_uuid, "tpl-redis");
    }

    #[tokio::test]
    async fn not_found_becomes_request_error() {
        let (client, _) = respond_once(
            "404 Not Found",
            &[("X-Request-Id", "req-42")],
            r#"{"status_code": 404, "message": "Object not found"}"#,
        )
        .await;

        let err = client.get_server("gone").await.unwrap_err();

        assert_eq!(err.status_code(), Some(404));
        assert!(err.is_not_found());
        match err {
            ClientError::Request(e) => {
                assert_eq!(e.message, "Object not found");
                assert_eq!(e.request_uuid.as_deref(), Some("req-42"));
            }
            other => panic!("expected request error, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn plain_text_error_body_is_kept() {
        let (client, _) = respond_once("502 Bad Gateway", &[], "upstream down").await;

        let err = client.get_network("n-1").await.unwrap_err();

        match err {
            ClientError::Request(e) => {
                assert_eq!(e.status_code, 502);
                assert_eq!(e.message, "upstream down");
                assert!(e.request_uuid.is_none());
            }
            other => panic!("expected request error, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn delete_of_missing_object_can_be_suppressed() {
        let (client, handle) = respond_once("404 Not Found", &[], r#"{"message": "gone"}"#).await;

        let result = suppress_http_error_codes(client.delete_server("s-1").await, &[NOT_FOUND]);

        assert!(result.is_ok());
        assert!(handle.await.unwrap().starts_with("DELETE /objects/servers/s-1"));
    }

    #[test]
    fn error_message_prefers_json_message() {
        assert_eq!(
            error_message(r#"{"status_code": 404, "message": "Object not found"}"#),
            "Object not found"
        );
        assert_eq!(error_message("Bad Gateway\n"), "Bad Gateway");
    }

    #[test]
    fn url_strips_trailing_slash() {
        let config = ProviderConfig::new("u", "t").with_api_url("http://localhost:8080/");
        let client = HttpClient::new(&config).unwrap();
        assert_eq!(
            client.url("/objects/networks"),
            "http://localhost:8080/objects/networks"
        );
    }

    #[test]
    fn debug_hides_token() {
        let client = HttpClient::new(&ProviderConfig::new("u", "secret-token")).unwrap();
        assert!(!format!("{:?}", client).contains("secret-token"));
    }

    #[test]
    fn list_keeps_api_order() {
        let envelope: PaaSTemplateListEnvelope = serde_json::from_value(json!({
            "paas_service_templates": {
                "t-9": {"object_uuid": "t-9", "flavour": "postgres", "release": "14"},
                "t-1": {"object_uuid": "t-1", "flavour": "postgres", "release": "13"}
            }
        }))
        .unwrap();
        let templates: Vec<PaaSTemplate> = listed(envelope.paas_service_templates).unwrap();
        let uuids: Vec<&str> = templates.iter().map(|t| t.object_uuid.as_str()).collect();
        assert_eq!(uuids, vec!["t-9", "t-1"]);
    }
}
