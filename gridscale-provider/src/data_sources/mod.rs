//! Data source handlers
//!
//! A data source only reads. Its configuration names an existing object
//! and every other attribute is filled from the API.

mod server;

pub use server::ServerDataSource;

use async_trait::async_trait;
use gridscale_core::provider::{ProviderResult, ResourceType};
use gridscale_core::resource_data::ResourceData;

use crate::client::GridscaleApi;

#[async_trait]
pub trait DataSourceHandler: ResourceType {
    async fn read(&self, api: &dyn GridscaleApi, d: &mut ResourceData) -> ProviderResult<()>;
}

/// Returns all data source types supported by this provider
pub fn data_source_types() -> Vec<Box<dyn ResourceType>> {
    vec![Box::new(ServerDataSource)]
}

pub fn data_source_handler(data_source_type: &str) -> Option<&'static dyn DataSourceHandler> {
    let handlers: [&'static dyn DataSourceHandler; 1] = [&ServerDataSource];
    handlers.into_iter().find(|h| h.name() == data_source_type)
}
