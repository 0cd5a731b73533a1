//! gridscale_server

use async_trait::async_trait;
use gridscale_core::provider::{ProviderResult, ResourceType};
use gridscale_core::resource::Value;
use gridscale_core::resource_data::ResourceData;
use gridscale_core::schema::{AttributeSchema, AttributeType, Operation, ResourceSchema, types};

use super::{
    ResourceHandler, api_error, default_timeouts, error_prefix, found, set_all, with_timeout,
};
use crate::client::{
    GridscaleApi, ServerCreateNetwork, ServerCreateRelations, ServerCreateRequest,
    ServerCreateStorage, ServerUpdateRequest,
};
use crate::error_handler::{NOT_FOUND, suppress_http_error_codes};
use crate::utils::{labels, labels_value};

/// Location used when `location_uuid` is not configured
pub const DEFAULT_LOCATION_UUID: &str = "45ed677b-3702-4b36-be2a-a2eab9827950";

pub struct ServerResource;

impl ResourceType for ServerResource {
    fn name(&self) -> &'static str {
        "gridscale_server"
    }

    fn schema(&self) -> ResourceSchema {
        ResourceSchema::new(self.name())
            .with_description("A virtual server")
            .attribute(
                AttributeSchema::new("name", AttributeType::String)
                    .required()
                    .with_description(
                        "The human-readable name of the object. It supports the full UTF-8 charset, with a maximum of 64 characters",
                    ),
            )
            .attribute(
                AttributeSchema::new("memory", types::positive_int())
                    .required()
                    .force_new()
                    .with_description("Memory in gigabytes"),
            )
            .attribute(
                AttributeSchema::new("cores", types::positive_int())
                    .required()
                    .force_new()
                    .with_description("Amount of CPU cores"),
            )
            .attribute(
                AttributeSchema::new("location_uuid", types::object_uuid())
                    .force_new()
                    .with_default(DEFAULT_LOCATION_UUID)
                    .with_description("Location the server is placed in"),
            )
            .attribute(AttributeSchema::new("hardware_profile", AttributeType::String).computed())
            .attribute(
                AttributeSchema::new("storage", AttributeType::String)
                    .optional()
                    .force_new()
                    .with_description("Storage attached as boot device"),
            )
            .attribute(
                AttributeSchema::new("network", AttributeType::String)
                    .optional()
                    .force_new()
                    .with_description("Network attached as boot device"),
            )
            .attribute(
                AttributeSchema::new("power", AttributeType::Bool)
                    .with_default(false)
                    .with_description("Whether the server is running"),
            )
            .attribute(
                AttributeSchema::new("labels", types::string_set())
                    .optional()
                    .with_description("List of labels."),
            )
            .attribute(AttributeSchema::new("current_price", AttributeType::Float).computed())
            .attribute(AttributeSchema::new("status", AttributeType::String).computed())
            .with_timeouts(default_timeouts())
    }
}

#[async_trait]
impl ResourceHandler for ServerResource {
    async fn create(&self, api: &dyn GridscaleApi, d: &mut ResourceData) -> ProviderResult<()> {
        let prefix = error_prefix(Operation::Create, "server", d);
        let timeout = d.timeout(Operation::Create);

        let mut relations = ServerCreateRelations::default();
        if let Some(storage) = d.get_ok("storage").and_then(Value::as_str) {
            relations.storages.push(ServerCreateStorage {
                storage_uuid: storage.to_string(),
                bootdevice: true,
            });
        }
        if let Some(network) = d.get_ok("network").and_then(Value::as_str) {
            relations.networks.push(ServerCreateNetwork {
                network_uuid: network.to_string(),
                bootdevice: true,
            });
        }

        let request = ServerCreateRequest {
            name: d.get_string("name"),
            memory: d.get_int("memory"),
            cores: d.get_int("cores"),
            location_uuid: d.get_string("location_uuid"),
            labels: labels(d),
            relations,
        };
        let response = with_timeout(timeout, api.create_server(&request))
            .await
            .map_err(|e| api_error(&prefix, e))?;
        d.set_id(&response.object_uuid);
        log::info!(
            "The id for server {} has been set to {}",
            request.name,
            response.object_uuid
        );

        if d.get_bool("power") {
            with_timeout(timeout, api.set_server_power(&response.object_uuid, true))
                .await
                .map_err(|e| api_error(&prefix, e))?;
        }

        self.read(api, d).await
    }

    async fn read(&self, api: &dyn GridscaleApi, d: &mut ResourceData) -> ProviderResult<()> {
        let prefix = error_prefix(Operation::Read, "server", d);
        let Some(id) = d.id().map(str::to_string) else {
            return Ok(());
        };
        let result = with_timeout(d.timeout(Operation::Read), api.get_server(&id)).await;
        let Some(server) = found(d, &prefix, result)? else {
            return Ok(());
        };

        set_all(
            d,
            &prefix,
            vec![
                ("name", server.name.into()),
                ("memory", server.memory.into()),
                ("cores", server.cores.into()),
                ("hardware_profile", server.hardware_profile.into()),
                ("location_uuid", server.location_uuid.into()),
                ("power", server.power.into()),
                ("current_price", server.current_price.into()),
                ("status", server.status.into()),
                ("labels", labels_value(&server.labels)),
            ],
        )
    }

    async fn update(&self, api: &dyn GridscaleApi, d: &mut ResourceData) -> ProviderResult<()> {
        let prefix = error_prefix(Operation::Update, "server", d);
        let timeout = d.timeout(Operation::Update);
        let id = d.id_or_empty().to_string();

        let mut request = ServerUpdateRequest::default();
        if d.has_change("name") {
            request.name = Some(d.get_string("name"));
        }
        if d.has_change("labels") {
            request.labels = Some(labels(d));
        }
        if request != ServerUpdateRequest::default() {
            with_timeout(timeout, api.update_server(&id, &request))
                .await
                .map_err(|e| api_error(&prefix, e))?;
        }

        if d.has_change("power") {
            let power = d.get_bool("power");
            with_timeout(timeout, api.set_server_power(&id, power))
                .await
                .map_err(|e| api_error(&prefix, e))?;
        }

        self.read(api, d).await
    }

    async fn delete(&self, api: &dyn GridscaleApi, d: &mut ResourceData) -> ProviderResult<()> {
        let prefix = error_prefix(Operation::Delete, "server", d);
        let timeout = d.timeout(Operation::Delete);
        let id = d.id_or_empty().to_string();

        // A running server cannot be deleted
        suppress_http_error_codes(
            with_timeout(timeout, api.set_server_power(&id, false)).await,
            &[NOT_FOUND],
        )
        .map_err(|e| api_error(&prefix, e))?;
        suppress_http_error_codes(
            with_timeout(timeout, api.delete_server(&id)).await,
            &[NOT_FOUND],
        )
        .map_err(|e| api_error(&prefix, e))?;

        d.clear_id();
        Ok(())
    }
}
