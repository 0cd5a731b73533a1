//! Resource handlers
//!
//! Every resource type pairs its schema with create/read/update/delete
//! handlers. A handler reads the configured values out of a
//! [`ResourceData`], builds one API request, and copies the returned object
//! back into the record. Reads re-fetch the object; a 404 clears the id.

mod network;
mod paas;
mod postgresql;
mod server;

pub use network::NetworkResource;
pub use paas::PaaSResource;
pub use postgresql::PostgreSQLResource;
pub use server::ServerResource;

use std::future::Future;
use std::time::Duration;

use async_trait::async_trait;
use gridscale_core::provider::{ProviderError, ProviderResult, ResourceType};
use gridscale_core::resource::Value;
use gridscale_core::resource_data::ResourceData;
use gridscale_core::schema::{Operation, Timeouts};

use crate::client::{ClientError, ClientResult, GridscaleApi};

/// Timeout of create, update and delete calls
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(15 * 60);

pub fn default_timeouts() -> Timeouts {
    Timeouts::for_writes(DEFAULT_TIMEOUT)
}

/// CRUD handlers of a resource type
#[async_trait]
pub trait ResourceHandler: ResourceType {
    async fn create(&self, api: &dyn GridscaleApi, d: &mut ResourceData) -> ProviderResult<()>;

    /// Refresh `d` from the API. Clears the id when the object is gone.
    async fn read(&self, api: &dyn GridscaleApi, d: &mut ResourceData) -> ProviderResult<()>;

    async fn update(&self, api: &dyn GridscaleApi, d: &mut ResourceData) -> ProviderResult<()>;

    /// Delete the object. An object that is already gone is not an error.
    async fn delete(&self, api: &dyn GridscaleApi, d: &mut ResourceData) -> ProviderResult<()>;

    /// Checks run at plan time that need the API
    async fn customize_diff(
        &self,
        _api: &dyn GridscaleApi,
        _d: &ResourceData,
    ) -> ProviderResult<()> {
        Ok(())
    }
}

/// Returns all resource types supported by this provider
pub fn resource_types() -> Vec<Box<dyn ResourceType>> {
    vec![
        Box::new(ServerResource),
        Box::new(NetworkResource),
        Box::new(PaaSResource),
        Box::new(PostgreSQLResource),
    ]
}

/// Handler of a resource type
pub fn handler(resource_type: &str) -> Option<&'static dyn ResourceHandler> {
    let handlers: [&'static dyn ResourceHandler; 4] = [
        &ServerResource,
        &NetworkResource,
        &PaaSResource,
        &PostgreSQLResource,
    ];
    handlers.into_iter().find(|h| h.name() == resource_type)
}

// =============================================================================
// Handler helpers
// =============================================================================

/// Message prefix naming the operation and object, e.g.
/// `read server (<uuid>) resource -`
pub(crate) fn error_prefix(op: Operation, kind: &str, d: &ResourceData) -> String {
    format!("{} {} ({}) resource -", op, kind, d.id_or_empty())
}

pub(crate) fn api_error(prefix: &str, e: ClientError) -> ProviderError {
    ProviderError::new(format!("{} error: {}", prefix, e)).with_cause(e)
}

/// Write several attributes, naming the first one that fails
pub(crate) fn set_all(
    d: &mut ResourceData,
    prefix: &str,
    values: Vec<(&str, Value)>,
) -> ProviderResult<()> {
    for (key, value) in values {
        d.set(key, value).map_err(|e| {
            ProviderError::new(format!("{} error setting {}: {}", prefix, key, e)).with_cause(e)
        })?;
    }
    Ok(())
}

/// Bound an API call by the operation timeout
pub(crate) async fn with_timeout<T, F>(timeout: Option<Duration>, call: F) -> ClientResult<T>
where
    F: Future<Output = ClientResult<T>>,
{
    match timeout {
        Some(limit) => tokio::time::timeout(limit, call)
            .await
            .map_err(|_| ClientError::Timeout(limit))?,
        None => call.await,
    }
}

/// Object returned by a read call, or `None` after a 404 (the id is cleared)
pub(crate) fn found<T>(
    d: &mut ResourceData,
    prefix: &str,
    result: ClientResult<T>,
) -> ProviderResult<Option<T>> {
    match result {
        Ok(object) => Ok(Some(object)),
        Err(e) if e.is_not_found() => {
            log::info!("{} object is gone, removing it from state", prefix);
            d.clear_id();
            Ok(None)
        }
        Err(e) => Err(api_error(prefix, e)),
    }
}

#[cfg(test)]
pub(crate) fn data_for(handler: &dyn ResourceHandler, config: Vec<(&str, Value)>) -> ResourceData {
    use std::sync::Arc;

    let config = config
        .into_iter()
        .map(|(k, v)| (k.to_string(), v))
        .collect();
    ResourceData::new(Arc::new(handler.schema())).with_config(config)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::client::RequestError;

    #[test]
    fn handler_lookup_by_type_name() {
        assert_eq!(handler("gridscale_paas").unwrap().name(), "gridscale_paas");
        assert!(handler("gridscale_storage").is_none());
        assert_eq!(resource_types().len(), 4);
    }

    #[test]
    fn error_prefix_names_operation_and_id() {
        let d = data_for(&ServerResource, vec![]).with_id("s-1");
        assert_eq!(
            error_prefix(Operation::Delete, "server", &d),
            "delete server (s-1) resource -"
        );
    }

    #[test]
    fn found_clears_id_on_404() {
        let mut d = data_for(&ServerResource, vec![]).with_id("s-1");
        let result: ClientResult<()> = Err(RequestError::new(404, "gone").into());
        assert!(found(&mut d, "read", result).unwrap().is_none());
        assert_eq!(d.id(), None);
    }

    #[test]
    fn found_propagates_other_errors() {
        let mut d = data_for(&ServerResource, vec![]).with_id("s-1");
        let result: ClientResult<()> = Err(RequestError::new(500, "boom").into());
        let err = found(&mut d, "read server (s-1) resource -", result).unwrap_err();
        assert_eq!(
            err.message,
            "read server (s-1) resource - error: request failed with status 500: boom"
        );
        assert_eq!(d.id(), Some("s-1"));
    }

    #[tokio::test]
    async fn with_timeout_reports_elapsed_limit() {
        let result: ClientResult<()> = with_timeout(Some(Duration::from_millis(10)), async {
            tokio::time::sleep(Duration::from_secs(5)).await;
            Ok(())
        })
        .await;
        assert!(matches!(result, Err(ClientError::Timeout(_))));
    }

    #[test]
    fn set_all_names_failing_attribute() {
        let mut d = data_for(&ServerResource, vec![]);
        let err = set_all(&mut d, "read server () resource -", vec![("memory", Value::from("x"))])
            .unwrap_err();
        assert!(err.message.starts_with("read server () resource - error setting memory:"));
    }
}
