//! gridscale provider implementation
//!
//! Validates configuration against the resource schema, builds the
//! [`ResourceData`] record for one call and dispatches it to the handler
//! of the resource type.

use std::sync::Arc;

use gridscale_core::differ::{self, Diff};
use gridscale_core::provider::{ProviderError, ProviderResult};
use gridscale_core::resource::{Resource, ResourceId, State};
use gridscale_core::resource_data::ResourceData;
use gridscale_core::schema::ResourceSchema;

use crate::client::{GridscaleApi, HttpClient};
use crate::config::{ConfigError, ProviderConfig};
use crate::data_sources::{DataSourceHandler, data_source_handler};
use crate::resources::{ResourceHandler, handler};

/// gridscale provider
pub struct GridscaleProvider {
    api: Arc<dyn GridscaleApi>,
}

fn resource_handler(id: &ResourceId) -> ProviderResult<&'static dyn ResourceHandler> {
    handler(&id.resource_type).ok_or_else(|| {
        ProviderError::new(format!("unsupported resource type '{}'", id.resource_type))
            .for_resource(id.clone())
    })
}

fn validated(
    schema: ResourceSchema,
    resource: &Resource,
) -> ProviderResult<Arc<ResourceSchema>> {
    schema.validate(&resource.attributes).map_err(|errors| {
        ProviderError::invalid_config(&errors).for_resource(resource.id.clone())
    })?;
    Ok(Arc::new(schema))
}

/// A failure after the object got its identifier still hands the state
/// back, so the host keeps tracking what exists remotely
fn failed(e: ProviderError, d: ResourceData, id: ResourceId) -> ProviderError {
    let e = e.for_resource(id.clone());
    if d.id().is_some() {
        e.with_state(d.into_state(id))
    } else {
        e
    }
}

impl GridscaleProvider {
    /// Provider talking to the REST API described by `config`
    pub fn new(config: &ProviderConfig) -> Result<Self, ConfigError> {
        let client = HttpClient::new(config)?;
        Ok(Self::with_client(Arc::new(client)))
    }

    /// Provider configured from `GRIDSCALE_UUID` / `GRIDSCALE_TOKEN`
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::new(&ProviderConfig::from_env()?)
    }

    pub fn with_client(api: Arc<dyn GridscaleApi>) -> Self {
        Self { api }
    }

    pub async fn create_resource(&self, resource: Resource) -> ProviderResult<State> {
        let handler = resource_handler(&resource.id)?;
        let schema = validated(handler.schema(), &resource)?;

        let mut d = ResourceData::new(schema).with_config(resource.attributes);
        match handler.create(self.api.as_ref(), &mut d).await {
            Ok(()) => Ok(d.into_state(resource.id)),
            Err(e) => Err(failed(e, d, resource.id)),
        }
    }

    /// Refresh `current`. The last known attributes stand in for the
    /// configuration so attributes the API does not echo are kept.
    pub async fn read_resource(&self, current: State) -> ProviderResult<State> {
        let Some(identifier) = current.identifier.clone() else {
            return Ok(State::not_found(current.id));
        };
        let handler = resource_handler(&current.id)?;

        let mut d = ResourceData::new(Arc::new(handler.schema()))
            .with_config(current.attributes.clone())
            .with_prior(current.attributes)
            .with_id(identifier);
        handler
            .read(self.api.as_ref(), &mut d)
            .await
            .map_err(|e| e.for_resource(current.id.clone()))?;
        Ok(d.into_state(current.id))
    }

    pub async fn update_resource(
        &self,
        id: ResourceId,
        identifier: &str,
        from: State,
        to: Resource,
    ) -> ProviderResult<State> {
        let handler = resource_handler(&id)?;
        let schema = validated(handler.schema(), &to)?;

        let mut d = ResourceData::new(schema)
            .with_config(to.attributes)
            .with_prior(from.attributes)
            .with_id(identifier);
        match handler.update(self.api.as_ref(), &mut d).await {
            Ok(()) => Ok(d.into_state(id)),
            Err(e) => Err(failed(e, d, id)),
        }
    }

    pub async fn delete_resource(&self, id: &ResourceId, identifier: &str) -> ProviderResult<()> {
        let handler = resource_handler(id)?;

        let mut d = ResourceData::new(Arc::new(handler.schema())).with_id(identifier);
        handler
            .delete(self.api.as_ref(), &mut d)
            .await
            .map_err(|e| e.for_resource(id.clone()))
    }

    pub async fn lookup_data_source(&self, resource: Resource) -> ProviderResult<State> {
        let handler: &dyn DataSourceHandler = data_source_handler(&resource.id.resource_type)
            .ok_or_else(|| {
                ProviderError::new(format!(
                    "unsupported data source '{}'",
                    resource.id.resource_type
                ))
                .for_resource(resource.id.clone())
            })?;
        let schema = validated(handler.schema(), &resource)?;

        let mut d = ResourceData::new(schema).with_config(resource.attributes);
        handler
            .read(self.api.as_ref(), &mut d)
            .await
            .map_err(|e| e.for_resource(resource.id.clone()))?;
        Ok(d.into_state(resource.id))
    }

    /// Diff `desired` against `current`, then run the resource's plan-time
    /// checks for anything that changes
    pub async fn plan_resource(&self, desired: Resource, current: State) -> ProviderResult<Diff> {
        let handler = resource_handler(&desired.id)?;
        let schema = validated(handler.schema(), &desired)?;

        let plan = differ::diff(&schema, &desired, &current);
        if !plan.is_change() {
            return Ok(plan);
        }

        let mut d = ResourceData::new(schema)
            .with_config(desired.attributes)
            .with_prior(current.attributes);
        if let Some(identifier) = current.identifier {
            d.set_id(identifier);
        }
        handler
            .customize_diff(self.api.as_ref(), &d)
            .await
            .map_err(|e| e.for_resource(desired.id.clone()))?;
        Ok(plan)
    }
}
