//! gridscale_network

use async_trait::async_trait;
use gridscale_core::provider::{ProviderResult, ResourceType};
use gridscale_core::resource::Value;
use gridscale_core::resource_data::ResourceData;
use gridscale_core::schema::{AttributeSchema, AttributeType, Operation, ResourceSchema, types};

use super::{
    ResourceHandler, api_error, default_timeouts, error_prefix, found, set_all, with_timeout,
};
use crate::client::{GridscaleApi, NetworkCreateRequest, NetworkUpdateRequest};
use crate::error_handler::{NOT_FOUND, suppress_http_error_codes};
use crate::utils::{format_time, labels, labels_value};

pub struct NetworkResource;

fn computed(name: &str, attr_type: AttributeType) -> AttributeSchema {
    AttributeSchema::new(name, attr_type).computed()
}

fn optional_string(d: &ResourceData, key: &str) -> Option<String> {
    d.get_ok(key).and_then(Value::as_str).map(str::to_string)
}

impl ResourceType for NetworkResource {
    fn name(&self) -> &'static str {
        "gridscale_network"
    }

    fn schema(&self) -> ResourceSchema {
        ResourceSchema::new(self.name())
            .with_description("A private network")
            .attribute(
                AttributeSchema::new("name", types::non_empty_string())
                    .required()
                    .with_description(
                        "The human-readable name of the object. It supports the full UTF-8 charset, with a maximum of 64 characters",
                    ),
            )
            .attribute(
                AttributeSchema::new("l2security", AttributeType::Bool)
                    .with_default(false)
                    .with_description("Defines information about MAC spoofing protection"),
            )
            .attribute(
                AttributeSchema::new("dhcp_active", AttributeType::Bool)
                    .with_default(false)
                    .with_description("Enable DHCP"),
            )
            .attribute(
                AttributeSchema::new("dhcp_gateway", types::ipv4_address())
                    .optional()
                    .computed()
                    .with_description("The general IP Range configured for this network"),
            )
            .attribute(
                AttributeSchema::new("dhcp_dns", types::ipv4_address())
                    .optional()
                    .computed()
                    .with_description("DHCP DNS"),
            )
            .attribute(
                AttributeSchema::new("dhcp_range", types::cidr())
                    .optional()
                    .computed()
                    .with_description("DHCP range"),
            )
            .attribute(
                AttributeSchema::new(
                    "dhcp_reserved_subnet",
                    AttributeType::Set(Box::new(types::cidr())),
                )
                .optional()
                .computed()
                .with_description("Subnets excluded from DHCP"),
            )
            .attribute(
                AttributeSchema::new("labels", types::string_set())
                    .optional()
                    .with_description("List of labels."),
            )
            .attribute(computed("location_uuid", AttributeType::String))
            .attribute(computed("location_country", AttributeType::String))
            .attribute(computed("location_iata", AttributeType::String))
            .attribute(computed("location_name", AttributeType::String))
            .attribute(computed("public_net", AttributeType::Bool))
            .attribute(computed("network_type", AttributeType::String))
            .attribute(computed("delete_block", AttributeType::Bool))
            .attribute(computed("status", AttributeType::String))
            .attribute(computed("create_time", AttributeType::String))
            .attribute(computed("change_time", AttributeType::String))
            .with_timeouts(default_timeouts())
    }
}

#[async_trait]
impl ResourceHandler for NetworkResource {
    async fn create(&self, api: &dyn GridscaleApi, d: &mut ResourceData) -> ProviderResult<()> {
        let prefix = error_prefix(Operation::Create, "network", d);
        let request = NetworkCreateRequest {
            name: d.get_string("name"),
            l2security: d.get_bool("l2security"),
            labels: labels(d),
            dhcp_active: d.get_bool("dhcp_active"),
            dhcp_gateway: optional_string(d, "dhcp_gateway"),
            dhcp_dns: optional_string(d, "dhcp_dns"),
            dhcp_range: optional_string(d, "dhcp_range"),
            dhcp_reserved_subnet: d.get_string_set("dhcp_reserved_subnet"),
        };
        let response = with_timeout(d.timeout(Operation::Create), api.create_network(&request))
            .await
            .map_err(|e| api_error(&prefix, e))?;
        d.set_id(&response.object_uuid);
        log::info!(
            "The id for network {} has been set to {}",
            request.name,
            response.object_uuid
        );

        self.read(api, d).await
    }

    async fn read(&self, api: &dyn GridscaleApi, d: &mut ResourceData) -> ProviderResult<()> {
        let prefix = error_prefix(Operation::Read, "network", d);
        let Some(id) = d.id().map(str::to_string) else {
            return Ok(());
        };
        let result = with_timeout(d.timeout(Operation::Read), api.get_network(&id)).await;
        let Some(network) = found(d, &prefix, result)? else {
            return Ok(());
        };

        let mut values = vec![
            ("name", network.name.into()),
            ("l2security", network.l2security.into()),
            ("dhcp_active", network.dhcp_active.into()),
            (
                "dhcp_reserved_subnet",
                Value::string_list(network.dhcp_reserved_subnet),
            ),
            ("labels", labels_value(&network.labels)),
            ("location_uuid", network.location_uuid.into()),
            ("location_country", network.location_country.into()),
            ("location_iata", network.location_iata.into()),
            ("location_name", network.location_name.into()),
            ("public_net", network.public_net.into()),
            ("network_type", network.network_type.into()),
            ("delete_block", network.delete_block.into()),
            ("status", network.status.into()),
            ("create_time", format_time(network.create_time).into()),
            ("change_time", format_time(network.change_time).into()),
        ];
        for (key, value) in [
            ("dhcp_gateway", network.dhcp_gateway),
            ("dhcp_dns", network.dhcp_dns),
            ("dhcp_range", network.dhcp_range),
        ] {
            if let Some(value) = value {
                values.push((key, value.into()));
            }
        }
        set_all(d, &prefix, values)
    }

    async fn update(&self, api: &dyn GridscaleApi, d: &mut ResourceData) -> ProviderResult<()> {
        let prefix = error_prefix(Operation::Update, "network", d);
        let id = d.id_or_empty().to_string();
        let request = NetworkUpdateRequest {
            name: d.get_string("name"),
            l2security: d.get_bool("l2security"),
            labels: labels(d),
            dhcp_active: d.get_bool("dhcp_active"),
            dhcp_gateway: optional_string(d, "dhcp_gateway"),
            dhcp_dns: optional_string(d, "dhcp_dns"),
            dhcp_range: optional_string(d, "dhcp_range"),
            dhcp_reserved_subnet: d.get_string_set("dhcp_reserved_subnet"),
        };
        with_timeout(d.timeout(Operation::Update), api.update_network(&id, &request))
            .await
            .map_err(|e| api_error(&prefix, e))?;

        self.read(api, d).await
    }

    async fn delete(&self, api: &dyn GridscaleApi, d: &mut ResourceData) -> ProviderResult<()> {
        let prefix = error_prefix(Operation::Delete, "network", d);
        let id = d.id_or_empty().to_string();
        suppress_http_error_codes(
            with_timeout(d.timeout(Operation::Delete), api.delete_network(&id)).await,
            &[NOT_FOUND],
        )
        .map_err(|e| api_error(&prefix, e))?;

        d.clear_id();
        Ok(())
    }
}
