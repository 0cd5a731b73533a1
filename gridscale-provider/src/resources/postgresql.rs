//! gridscale_postgresql
//!
//! A PaaS service whose template is looked up by PostgreSQL release and
//! performance class instead of being configured directly.

use async_trait::async_trait;
use gridscale_core::provider::{ProviderError, ProviderResult, ResourceType};
use gridscale_core::resource::Value;
use gridscale_core::resource_data::ResourceData;
use gridscale_core::schema::{AttributeSchema, AttributeType, Operation, ResourceSchema, types};
use thiserror::Error;

use super::paas::{
    attachment, backfill_network, create_service, credential, credential_values, delete_service,
    fetch_service, labels_schema, listen_port_schema, listen_ports_value, network_schema,
    security_zone_schema, update_service,
};
use super::{ResourceHandler, api_error, default_timeouts, error_prefix, set_all};
use crate::client::{
    ClientError, GridscaleApi, PaaSServiceCreateRequest, PaaSServiceUpdateRequest, PaaSTemplate,
    ResourceLimit,
};
use crate::utils::{format_time, labels, labels_value};

/// Template flavour of PostgreSQL services
pub const POSTGRES_FLAVOUR: &str = "postgres";

pub const PERFORMANCE_CLASSES: &[&str] = &["standard", "high", "insane", "ultra"];

/// Resource limit that `max_core_count` maps to
const CORES_LIMIT: &str = "cores";

#[derive(Debug, Error)]
pub enum TemplateError {
    #[error(transparent)]
    Client(#[from] ClientError),

    #[error("{release} is not a valid PostgreSQL release. Valid releases are: {}", releases.join(", "))]
    InvalidRelease {
        release: String,
        releases: Vec<String>,
    },
}

/// Distinct PostgreSQL releases, in the order the API lists them
pub fn postgres_releases(templates: &[PaaSTemplate]) -> Vec<String> {
    let mut releases: Vec<String> = Vec::new();
    for template in templates.iter().filter(|t| t.flavour == POSTGRES_FLAVOUR) {
        if !releases.contains(&template.release) {
            releases.push(template.release.clone());
        }
    }
    releases
}

/// PostgreSQL template of a release and performance class
pub fn find_postgres_template<'a>(
    templates: &'a [PaaSTemplate],
    release: &str,
    performance_class: &str,
) -> Result<&'a PaaSTemplate, TemplateError> {
    templates
        .iter()
        .find(|t| {
            t.flavour == POSTGRES_FLAVOUR
                && t.release == release
                && t.performance_class == performance_class
        })
        .ok_or_else(|| TemplateError::InvalidRelease {
            release: release.to_string(),
            releases: postgres_releases(templates),
        })
}

fn core_count() -> AttributeType {
    AttributeType::Custom {
        name: "CoreCount".to_string(),
        base: Box::new(AttributeType::Int),
        validate: |value| match value {
            Value::Int(n) if (1..=32).contains(n) => Ok(()),
            Value::Int(n) => Err(format!(
                "{} is not a valid value for number of \"max_core_count\". Valid value should be between 1 and 32",
                n
            )),
            _ => Err("Expected integer".to_string()),
        },
    }
}

fn template_error(prefix: &str, e: TemplateError) -> ProviderError {
    ProviderError::new(format!("{} error: {}", prefix, e)).with_cause(e)
}

async fn configured_template(
    api: &dyn GridscaleApi,
    d: &ResourceData,
) -> Result<String, TemplateError> {
    let templates = api.get_paas_template_list().await?;
    let template = find_postgres_template(
        &templates,
        &d.get_string("release"),
        &d.get_string("performance_class"),
    )?;
    Ok(template.object_uuid.clone())
}

fn core_limits(d: &ResourceData) -> Option<Vec<ResourceLimit>> {
    d.get_ok("max_core_count")
        .and_then(Value::as_int)
        .map(|limit| {
            vec![ResourceLimit {
                resource: CORES_LIMIT.to_string(),
                limit,
            }]
        })
}

pub struct PostgreSQLResource;

impl ResourceType for PostgreSQLResource {
    fn name(&self) -> &'static str {
        "gridscale_postgresql"
    }

    fn schema(&self) -> ResourceSchema {
        ResourceSchema::new(self.name())
            .with_description("A managed PostgreSQL service")
            .attribute(
                AttributeSchema::new("name", types::non_empty_string())
                    .required()
                    .with_description(
                        "The human-readable name of the object. It supports the full UTF-8 character set, with a maximum of 64 characters.",
                    ),
            )
            .attribute(
                AttributeSchema::new("release", types::non_empty_string())
                    .required()
                    .with_description("The PostgreSQL release of this instance."),
            )
            .attribute(
                AttributeSchema::new(
                    "performance_class",
                    AttributeType::Enum(PERFORMANCE_CLASSES.iter().map(|c| c.to_string()).collect()),
                )
                .required()
                .with_description("Performance class of PostgreSQL service."),
            )
            .attribute(credential(
                "username",
                "Username for PostgreSQL service. It is used to connect to the PostgreSQL instance.",
            ))
            .attribute(credential(
                "password",
                "Password for PostgreSQL service. It is used to connect to the PostgreSQL instance.",
            ))
            .attribute(listen_port_schema(
                "The port numbers where this PostgreSQL service accepts connections.",
            ))
            .attribute(security_zone_schema("Security zone UUID linked to PostgreSQL service."))
            .attribute(network_schema())
            .attribute(
                AttributeSchema::new("service_template_uuid", AttributeType::String)
                    .computed()
                    .with_description("PaaS service template that PostgreSQL service uses."),
            )
            .attribute(
                AttributeSchema::new("service_template_category", AttributeType::String)
                    .computed()
                    .with_description("The template service's category used to create the service."),
            )
            .attribute(
                AttributeSchema::new("usage_in_minutes", AttributeType::Int)
                    .computed()
                    .with_description("Number of minutes that PostgreSQL service is in use."),
            )
            .attribute(
                AttributeSchema::new("change_time", AttributeType::String)
                    .computed()
                    .with_description("Time of the last change."),
            )
            .attribute(
                AttributeSchema::new("create_time", AttributeType::String)
                    .computed()
                    .with_description("Date time this service has been created."),
            )
            .attribute(
                AttributeSchema::new("status", AttributeType::String)
                    .computed()
                    .with_description("Current status of PostgreSQL service."),
            )
            .attribute(
                AttributeSchema::new("max_core_count", core_count())
                    .optional()
                    .computed()
                    .with_description(
                        "Maximum CPU core count. The core count is autoscaled between 1 and `max_core_count` based on the workload.",
                    ),
            )
            .attribute(labels_schema())
            .with_timeouts(default_timeouts())
    }
}

#[async_trait]
impl ResourceHandler for PostgreSQLResource {
    async fn create(&self, api: &dyn GridscaleApi, d: &mut ResourceData) -> ProviderResult<()> {
        let prefix = error_prefix(Operation::Create, "postgresql", d);
        let template_uuid = configured_template(api, d)
            .await
            .map_err(|e| template_error(&prefix, e))?;
        let (network_uuid, security_zone_uuid) = attachment(d);

        let request = PaaSServiceCreateRequest {
            name: d.get_string("name"),
            paas_service_template_uuid: template_uuid,
            labels: labels(d),
            paas_security_zone_uuid: security_zone_uuid,
            network_uuid,
            resource_limits: core_limits(d).unwrap_or_default(),
            ..Default::default()
        };
        create_service(api, d, &prefix, &request).await?;

        self.read(api, d).await
    }

    async fn read(&self, api: &dyn GridscaleApi, d: &mut ResourceData) -> ProviderResult<()> {
        let prefix = error_prefix(Operation::Read, "postgresql", d);
        let Some(service) = fetch_service(api, d, &prefix).await? else {
            return Ok(());
        };

        let mut values = credential_values(&service, false);
        values.extend([
            ("name", service.name.clone().into()),
            ("security_zone_uuid", service.security_zone_uuid.clone().into()),
            ("network_uuid", service.network_uuid.clone().into()),
            (
                "service_template_uuid",
                service.service_template_uuid.clone().into(),
            ),
            (
                "service_template_category",
                service.service_template_category.clone().into(),
            ),
            ("usage_in_minutes", service.usage_in_minutes.into()),
            ("change_time", format_time(service.change_time).into()),
            ("create_time", format_time(service.create_time).into()),
            ("status", service.status.clone().into()),
            ("listen_port", listen_ports_value(&service.listen_ports)),
            ("labels", labels_value(&service.labels)),
        ]);
        if let Some(cores) = service
            .resource_limits
            .iter()
            .find(|limit| limit.resource == CORES_LIMIT)
        {
            values.push(("max_core_count", cores.limit.into()));
        }

        // Imported services know nothing but their id
        if d.get_ok("release").is_none() {
            let templates = api
                .get_paas_template_list()
                .await
                .map_err(|e| api_error(&prefix, e))?;
            if let Some(template) = templates
                .iter()
                .find(|t| t.object_uuid == service.service_template_uuid)
            {
                values.push(("release", template.release.clone().into()));
                values.push(("performance_class", template.performance_class.clone().into()));
            }
        }
        set_all(d, &prefix, values)?;

        backfill_network(api, d, &prefix, &service.security_zone_uuid).await
    }

    async fn update(&self, api: &dyn GridscaleApi, d: &mut ResourceData) -> ProviderResult<()> {
        let prefix = error_prefix(Operation::Update, "postgresql", d);

        let mut request = PaaSServiceUpdateRequest {
            name: d.get_string("name"),
            labels: Some(labels(d)),
            resource_limits: core_limits(d),
            ..Default::default()
        };
        if d.has_change("network_uuid") {
            request.network_uuid = Some(d.get_string("network_uuid"));
        }
        if d.has_change("release") || d.has_change("performance_class") {
            let template_uuid = configured_template(api, d)
                .await
                .map_err(|e| template_error(&prefix, e))?;
            request.service_template_uuid = Some(template_uuid);
        }
        update_service(api, d, &prefix, &request).await?;

        self.read(api, d).await
    }

    async fn delete(&self, api: &dyn GridscaleApi, d: &mut ResourceData) -> ProviderResult<()> {
        let prefix = error_prefix(Operation::Delete, "postgresql", d);
        delete_service(api, d, &prefix).await
    }

    /// A new or changed release must be one the API offers
    async fn customize_diff(&self, api: &dyn GridscaleApi, d: &ResourceData) -> ProviderResult<()> {
        if !d.has_change("release") {
            return Ok(());
        }
        let release = d.get_string("release");
        let templates = api
            .get_paas_template_list()
            .await
            .map_err(|e| ProviderError::new(e.to_string()).with_cause(e))?;
        let releases = postgres_releases(&templates);
        if releases.contains(&release) {
            Ok(())
        } else {
            let e = TemplateError::InvalidRelease { release, releases };
            Err(ProviderError::new(e.to_string()).with_cause(e))
        }
    }
}
