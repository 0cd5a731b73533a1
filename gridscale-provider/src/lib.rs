//! gridscale Provider
//!
//! Manages servers, networks and PaaS services through the gridscale API.
//!
//! ## Module Structure
//!
//! - `client` - API client trait, REST implementation and models
//! - `config` - Credentials and endpoint
//! - `resources` - Resource schemas and CRUD handlers
//! - `data_sources` - Read-only lookups of existing objects
//! - `provider` - GridscaleProvider implementation
//! - `parameters`, `error_handler`, `utils` - Helpers shared by handlers

pub mod client;
pub mod config;
pub mod data_sources;
pub mod error_handler;
pub mod parameters;
pub mod provider;
pub mod resources;
pub mod utils;

// Re-export main types
pub use client::{ClientError, GridscaleApi, HttpClient, RequestError};
pub use config::{ConfigError, ProviderConfig};
pub use provider::GridscaleProvider;

use gridscale_core::differ::Diff;
use gridscale_core::provider::{BoxFuture, Provider, ProviderResult, ResourceType};
use gridscale_core::resource::{Resource, ResourceId, State};

// =============================================================================
// Provider Trait Implementation
// =============================================================================

impl Provider for GridscaleProvider {
    fn name(&self) -> &'static str {
        "gridscale"
    }

    fn resource_types(&self) -> Vec<Box<dyn ResourceType>> {
        resources::resource_types()
    }

    fn data_source_types(&self) -> Vec<Box<dyn ResourceType>> {
        data_sources::data_source_types()
    }

    fn read(&self, current: &State) -> BoxFuture<'_, ProviderResult<State>> {
        let current = current.clone();
        Box::pin(async move { self.read_resource(current).await })
    }

    fn create(&self, resource: &Resource) -> BoxFuture<'_, ProviderResult<State>> {
        let resource = resource.clone();
        Box::pin(async move { self.create_resource(resource).await })
    }

    fn update(
        &self,
        id: &ResourceId,
        identifier: &str,
        from: &State,
        to: &Resource,
    ) -> BoxFuture<'_, ProviderResult<State>> {
        let id = id.clone();
        let identifier = identifier.to_string();
        let from = from.clone();
        let to = to.clone();
        Box::pin(async move { self.update_resource(id, &identifier, from, to).await })
    }

    fn delete(&self, id: &ResourceId, identifier: &str) -> BoxFuture<'_, ProviderResult<()>> {
        let id = id.clone();
        let identifier = identifier.to_string();
        Box::pin(async move { self.delete_resource(&id, &identifier).await })
    }

    fn read_data_source(&self, resource: &Resource) -> BoxFuture<'_, ProviderResult<State>> {
        let resource = resource.clone();
        Box::pin(async move { self.lookup_data_source(resource).await })
    }

    fn plan(&self, desired: &Resource, current: &State) -> BoxFuture<'_, ProviderResult<Diff>> {
        let desired = desired.clone();
        let current = current.clone();
        Box::pin(async move { self.plan_resource(desired, current).await })
    }
}
