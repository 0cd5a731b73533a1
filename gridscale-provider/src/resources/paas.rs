//! gridscale_paas
//!
//! Generic PaaS service created from a service template. The helpers at the
//! bottom are shared with the PostgreSQL resource, which is a PaaS service
//! with a template picked by release and performance class.

use std::collections::HashMap;

use async_trait::async_trait;
use gridscale_core::provider::{ProviderError, ProviderResult, ResourceType};
use gridscale_core::resource::Value;
use gridscale_core::resource_data::ResourceData;
use gridscale_core::schema::{AttributeSchema, AttributeType, Operation, ResourceSchema, types};

use super::{
    ResourceHandler, api_error, default_timeouts, error_prefix, found, set_all, with_timeout,
};
use crate::client::{
    ClientResult, GridscaleApi, PaaSService, PaaSServiceCreateRequest, PaaSServiceUpdateRequest,
    ResourceLimit,
};
use crate::error_handler::{NOT_FOUND, suppress_http_error_codes};
use crate::parameters::{
    ParamType, ParameterError, SUPPORTED_PRIM_TYPES, string_to_value, type_of, value_to_string,
};
use crate::utils::{find_network_by_security_zone, format_time, labels, labels_value};

pub(crate) const SECURITY_ZONE_DEPRECATION: &str = "Security zone is deprecated for gridSQL, gridStore, and gridFs. Please consider to use private network instead.";

pub struct PaaSResource;

impl ResourceType for PaaSResource {
    fn name(&self) -> &'static str {
        "gridscale_paas"
    }

    fn schema(&self) -> ResourceSchema {
        let parameter = types::block(vec![
            AttributeSchema::new("param", AttributeType::String).required(),
            AttributeSchema::new("value", AttributeType::String).required(),
            AttributeSchema::new(
                "type",
                AttributeType::Enum(SUPPORTED_PRIM_TYPES.iter().map(|t| t.to_string()).collect()),
            )
            .required(),
        ]);
        let resource_limit = types::block(vec![
            AttributeSchema::new("resource", AttributeType::String).required(),
            AttributeSchema::new("limit", AttributeType::Int).required(),
        ]);

        ResourceSchema::new(self.name())
            .with_description("A PaaS service created from a service template")
            .attribute(
                AttributeSchema::new("name", types::non_empty_string())
                    .required()
                    .with_description(
                        "The human-readable name of the object. It supports the full UTF-8 character set, with a maximum of 64 characters",
                    ),
            )
            .attribute(credential("username", "Username for PaaS service"))
            .attribute(credential("password", "Password for PaaS service"))
            .attribute(credential("kubeconfig", "K8s config data"))
            .attribute(listen_port_schema("Ports that PaaS service listens to"))
            .attribute(security_zone_schema("Security zone UUID linked to PaaS service"))
            .attribute(network_schema())
            .attribute(
                AttributeSchema::new("service_template_uuid", types::non_empty_string())
                    .required()
                    .with_description("Template that PaaS service uses"),
            )
            .attribute(
                AttributeSchema::new("service_template_uuid_computed", AttributeType::String)
                    .computed()
                    .with_description(
                        "Template that PaaS service uses. Differs from `service_template_uuid` when the template was changed outside of the provider.",
                    ),
            )
            .attribute(
                AttributeSchema::new("service_template_category", AttributeType::String)
                    .computed()
                    .with_description("The template service's category used to create the service."),
            )
            .attribute(
                AttributeSchema::new("usage_in_minute", AttributeType::Int)
                    .computed()
                    .with_description("Number of minutes that PaaS service is in use"),
            )
            .attribute(
                AttributeSchema::new("current_price", AttributeType::Float)
                    .computed()
                    .with_description("Current price of PaaS service"),
            )
            .attribute(
                AttributeSchema::new("change_time", AttributeType::String)
                    .computed()
                    .with_description("Time of the last change"),
            )
            .attribute(
                AttributeSchema::new("create_time", AttributeType::String)
                    .computed()
                    .with_description("Time of the creation"),
            )
            .attribute(
                AttributeSchema::new("status", AttributeType::String)
                    .computed()
                    .with_description("Current status of PaaS service"),
            )
            .attribute(
                AttributeSchema::new(
                    "parameter",
                    AttributeType::Set(Box::new(AttributeType::Block(parameter))),
                )
                .optional()
                .with_description("Parameter for PaaS service"),
            )
            .attribute(
                AttributeSchema::new(
                    "resource_limit",
                    AttributeType::Set(Box::new(AttributeType::Block(resource_limit))),
                )
                .optional()
                .with_description("Resource for PaaS service"),
            )
            .attribute(labels_schema())
            .with_timeouts(default_timeouts())
    }
}

#[async_trait]
impl ResourceHandler for PaaSResource {
    async fn create(&self, api: &dyn GridscaleApi, d: &mut ResourceData) -> ProviderResult<()> {
        let prefix = error_prefix(Operation::Create, "paas", d);
        let parameters = configured_parameters(d).map_err(|e| parameter_error(&prefix, e))?;
        let (network_uuid, security_zone_uuid) = attachment(d);

        let request = PaaSServiceCreateRequest {
            name: d.get_string("name"),
            paas_service_template_uuid: d.get_string("service_template_uuid"),
            labels: labels(d),
            paas_security_zone_uuid: security_zone_uuid,
            network_uuid,
            parameters,
            resource_limits: configured_resource_limits(d),
        };
        create_service(api, d, &prefix, &request).await?;

        self.read(api, d).await
    }

    async fn read(&self, api: &dyn GridscaleApi, d: &mut ResourceData) -> ProviderResult<()> {
        let prefix = error_prefix(Operation::Read, "paas", d);
        let Some(service) = fetch_service(api, d, &prefix).await? else {
            return Ok(());
        };

        let mut parameters = Vec::with_capacity(service.parameters.len());
        for (param, value) in &service.parameters {
            let param_type = type_of(value).map_err(|e| parameter_error(&prefix, e))?;
            let value = value_to_string(param_type, value).map_err(|e| parameter_error(&prefix, e))?;
            parameters.push(Value::block([
                ("param", Value::from(param.as_str())),
                ("value", Value::from(value)),
                ("type", Value::from(param_type.as_str())),
            ]));
        }
        let resource_limits = service
            .resource_limits
            .iter()
            .map(|limit| {
                Value::block([
                    ("resource", Value::from(limit.resource.as_str())),
                    ("limit", Value::Int(limit.limit)),
                ])
            })
            .collect();

        let mut values = credential_values(&service, true);
        values.extend([
            ("name", service.name.clone().into()),
            ("security_zone_uuid", service.security_zone_uuid.clone().into()),
            ("network_uuid", service.network_uuid.clone().into()),
            (
                "service_template_uuid_computed",
                service.service_template_uuid.clone().into(),
            ),
            (
                "service_template_category",
                service.service_template_category.clone().into(),
            ),
            ("usage_in_minute", service.usage_in_minutes.into()),
            ("current_price", service.current_price.into()),
            ("change_time", format_time(service.change_time).into()),
            ("create_time", format_time(service.create_time).into()),
            ("status", service.status.clone().into()),
            ("listen_port", listen_ports_value(&service.listen_ports)),
            ("parameter", Value::List(parameters)),
            ("resource_limit", Value::List(resource_limits)),
            ("labels", labels_value(&service.labels)),
        ]);
        set_all(d, &prefix, values)?;

        backfill_network(api, d, &prefix, &service.security_zone_uuid).await
    }

    async fn update(&self, api: &dyn GridscaleApi, d: &mut ResourceData) -> ProviderResult<()> {
        let prefix = error_prefix(Operation::Update, "paas", d);
        let parameters = configured_parameters(d).map_err(|e| parameter_error(&prefix, e))?;

        let mut request = PaaSServiceUpdateRequest {
            name: d.get_string("name"),
            labels: Some(labels(d)),
            parameters: Some(parameters),
            resource_limits: Some(configured_resource_limits(d)),
            ..Default::default()
        };
        if d.has_change("network_uuid") {
            request.network_uuid = Some(d.get_string("network_uuid"));
        }
        // Resending an unchanged template would undo template changes made
        // outside of the provider
        if d.has_change("service_template_uuid") {
            request.service_template_uuid = Some(d.get_string("service_template_uuid"));
        }
        update_service(api, d, &prefix, &request).await?;

        self.read(api, d).await
    }

    async fn delete(&self, api: &dyn GridscaleApi, d: &mut ResourceData) -> ProviderResult<()> {
        let prefix = error_prefix(Operation::Delete, "paas", d);
        delete_service(api, d, &prefix).await
    }
}

// =============================================================================
// Shared PaaS helpers
// =============================================================================

pub(crate) fn credential(name: &str, description: &str) -> AttributeSchema {
    AttributeSchema::new(name, AttributeType::String)
        .computed()
        .sensitive()
        .with_description(description)
}

pub(crate) fn listen_port_schema(description: &str) -> AttributeSchema {
    let port = types::block(vec![
        AttributeSchema::new("name", AttributeType::String).computed(),
        AttributeSchema::new("host", AttributeType::String).computed(),
        AttributeSchema::new("port", AttributeType::Int).computed(),
    ]);
    AttributeSchema::new("listen_port", AttributeType::Set(Box::new(AttributeType::Block(port))))
        .computed()
        .with_description(description)
}

pub(crate) fn security_zone_schema(description: &str) -> AttributeSchema {
    AttributeSchema::new("security_zone_uuid", AttributeType::String)
        .optional()
        .computed()
        .force_new()
        .deprecated(SECURITY_ZONE_DEPRECATION)
        .with_description(description)
}

pub(crate) fn network_schema() -> AttributeSchema {
    AttributeSchema::new("network_uuid", AttributeType::String)
        .optional()
        .computed()
        .with_description("The UUID of the network that the service is attached to.")
}

pub(crate) fn labels_schema() -> AttributeSchema {
    AttributeSchema::new("labels", types::string_set())
        .optional()
        .with_description("List of labels.")
}

/// Network and security zone to attach a new service to
///
/// A configured network wins; the security zone is only sent without one.
pub(crate) fn attachment(d: &ResourceData) -> (Option<String>, Option<String>) {
    let network = d
        .get_ok("network_uuid")
        .and_then(Value::as_str)
        .map(str::to_string);
    let security_zone = match network {
        Some(_) => None,
        None => d
            .get_ok("security_zone_uuid")
            .and_then(Value::as_str)
            .map(str::to_string),
    };
    (network, security_zone)
}

/// Listen ports as `{name, host, port}` blocks, ordered by host and name
pub(crate) fn listen_ports_value(listen_ports: &HashMap<String, HashMap<String, i64>>) -> Value {
    let mut ports: Vec<(&String, &String, i64)> = listen_ports
        .iter()
        .flat_map(|(host, ports)| ports.iter().map(move |(name, port)| (host, name, *port)))
        .collect();
    ports.sort();
    Value::List(
        ports
            .into_iter()
            .map(|(host, name, port)| {
                Value::block([
                    ("name", Value::from(name.as_str())),
                    ("host", Value::from(host.as_str())),
                    ("port", Value::Int(port)),
                ])
            })
            .collect(),
    )
}

/// Username and password of the first credential; the kubeconfig too when
/// the schema carries it
pub(crate) fn credential_values(
    service: &PaaSService,
    with_kubeconfig: bool,
) -> Vec<(&'static str, Value)> {
    let Some(credential) = service.credentials.first() else {
        return Vec::new();
    };
    let mut values = vec![
        ("username", Value::from(credential.username.as_str())),
        ("password", Value::from(credential.password.as_str())),
    ];
    if with_kubeconfig {
        values.push(("kubeconfig", Value::from(credential.kubeconfig.as_str())));
    }
    values
}

/// UUID of the network whose security zone is `security_zone_uuid`
pub(crate) async fn security_zone_network(
    api: &dyn GridscaleApi,
    security_zone_uuid: &str,
) -> ClientResult<Option<String>> {
    if security_zone_uuid.is_empty() {
        return Ok(None);
    }
    let networks = api.get_network_list().await?;
    Ok(find_network_by_security_zone(&networks, security_zone_uuid).map(str::to_string))
}

/// Services attached through a security zone report the zone's network
pub(crate) async fn backfill_network(
    api: &dyn GridscaleApi,
    d: &mut ResourceData,
    prefix: &str,
    security_zone_uuid: &str,
) -> ProviderResult<()> {
    let network = security_zone_network(api, security_zone_uuid)
        .await
        .map_err(|e| {
            ProviderError::new(format!("{} error getting networks: {}", prefix, e)).with_cause(e)
        })?;
    match network {
        Some(network_uuid) => set_all(d, prefix, vec![("network_uuid", network_uuid.into())]),
        None => Ok(()),
    }
}

pub(crate) async fn create_service(
    api: &dyn GridscaleApi,
    d: &mut ResourceData,
    prefix: &str,
    request: &PaaSServiceCreateRequest,
) -> ProviderResult<()> {
    let response = with_timeout(d.timeout(Operation::Create), api.create_paas_service(request))
        .await
        .map_err(|e| api_error(prefix, e))?;
    d.set_id(&response.object_uuid);
    log::info!(
        "The id for PaaS service {} has been set to {}",
        request.name,
        response.object_uuid
    );
    Ok(())
}

/// Current service, `None` when it is gone
pub(crate) async fn fetch_service(
    api: &dyn GridscaleApi,
    d: &mut ResourceData,
    prefix: &str,
) -> ProviderResult<Option<PaaSService>> {
    let Some(id) = d.id().map(str::to_string) else {
        return Ok(None);
    };
    let result = with_timeout(d.timeout(Operation::Read), api.get_paas_service(&id)).await;
    found(d, prefix, result)
}

pub(crate) async fn update_service(
    api: &dyn GridscaleApi,
    d: &mut ResourceData,
    prefix: &str,
    request: &PaaSServiceUpdateRequest,
) -> ProviderResult<()> {
    let id = d.id_or_empty().to_string();
    with_timeout(
        d.timeout(Operation::Update),
        api.update_paas_service(&id, request),
    )
    .await
    .map_err(|e| api_error(prefix, e))
}

pub(crate) async fn delete_service(
    api: &dyn GridscaleApi,
    d: &mut ResourceData,
    prefix: &str,
) -> ProviderResult<()> {
    let id = d.id_or_empty().to_string();
    suppress_http_error_codes(
        with_timeout(d.timeout(Operation::Delete), api.delete_paas_service(&id)).await,
        &[NOT_FOUND],
    )
    .map_err(|e| api_error(prefix, e))?;
    d.clear_id();
    Ok(())
}

fn configured_parameters(
    d: &ResourceData,
) -> Result<serde_json::Map<String, serde_json::Value>, ParameterError> {
    let mut parameters = serde_json::Map::new();
    for block in d.get_blocks("parameter") {
        let param_type: ParamType = block_str(block, "type").parse()?;
        let value = string_to_value(param_type, block_str(block, "value"))?;
        parameters.insert(block_str(block, "param").to_string(), value);
    }
    Ok(parameters)
}

fn block_str<'a>(block: &'a HashMap<String, Value>, key: &str) -> &'a str {
    block.get(key).and_then(Value::as_str).unwrap_or_default()
}

fn configured_resource_limits(d: &ResourceData) -> Vec<ResourceLimit> {
    d.get_blocks("resource_limit")
        .into_iter()
        .map(|block| ResourceLimit {
            resource: block_str(block, "resource").to_string(),
            limit: block.get("limit").and_then(Value::as_int).unwrap_or_default(),
        })
        .collect()
}

fn parameter_error(prefix: &str, e: ParameterError) -> ProviderError {
    ProviderError::new(format!("{} error: {}", prefix, e)).with_cause(e)
}
