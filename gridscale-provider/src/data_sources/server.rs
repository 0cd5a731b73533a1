//! gridscale_server data source

use async_trait::async_trait;
use gridscale_core::provider::{ProviderResult, ResourceType};
use gridscale_core::resource::Value;
use gridscale_core::resource_data::ResourceData;
use gridscale_core::schema::{AttributeSchema, AttributeType, Operation, ResourceSchema, types};

use super::DataSourceHandler;
use crate::client::{
    FirewallRule, GridscaleApi, ServerNetworkRelation, ServerRelations, ServerStorageRelation,
};
use crate::resources::{api_error, set_all, with_timeout};
use crate::utils::{format_time, labels_value};

pub struct ServerDataSource;

fn computed(name: &str, attr_type: AttributeType) -> AttributeSchema {
    AttributeSchema::new(name, attr_type).computed()
}

fn firewall_rule_schema() -> AttributeType {
    AttributeType::List(Box::new(AttributeType::Block(types::block(vec![
        computed("order", AttributeType::Int),
        computed("action", AttributeType::String),
        computed("protocol", AttributeType::String),
        computed("dst_port", AttributeType::String),
        computed("src_port", AttributeType::String),
        computed("src_cidr", AttributeType::String),
        computed("dst_cidr", AttributeType::String),
        computed("comment", AttributeType::String),
    ]))))
}

fn storage_schema() -> AttributeType {
    AttributeType::List(Box::new(AttributeType::Block(types::block(vec![
        computed("object_uuid", AttributeType::String),
        computed("bootdevice", AttributeType::Bool),
        computed("object_name", AttributeType::String),
        computed("capacity", AttributeType::Int),
        computed("controller", AttributeType::Int),
        computed("bus", AttributeType::Int),
        computed("target", AttributeType::Int),
        computed("lun", AttributeType::Int),
        computed("license_product_no", AttributeType::Int),
        computed("create_time", AttributeType::String),
        computed("storage_type", AttributeType::String),
        computed("last_used_template", AttributeType::String),
    ]))))
}

fn network_schema() -> AttributeType {
    AttributeType::Set(Box::new(AttributeType::Block(types::block(vec![
        computed("object_uuid", AttributeType::String),
        computed("bootdevice", AttributeType::Bool),
        computed("object_name", AttributeType::String),
        computed("mac", AttributeType::String),
        computed("rules_v4_in", firewall_rule_schema()),
        computed("rules_v4_out", firewall_rule_schema()),
        computed("rules_v6_in", firewall_rule_schema()),
        computed("rules_v6_out", firewall_rule_schema()),
        computed("firewall_template_uuid", AttributeType::String),
        computed("ordering", AttributeType::Int),
        computed("create_time", AttributeType::String),
        computed("network_type", AttributeType::String),
    ]))))
}

fn rules_value(rules: &[FirewallRule]) -> Value {
    Value::List(
        rules
            .iter()
            .map(|rule| {
                Value::block([
                    ("order", Value::Int(rule.order)),
                    ("action", Value::from(rule.action.as_str())),
                    ("protocol", Value::from(rule.protocol.as_str())),
                    ("dst_port", Value::from(rule.dst_port.as_str())),
                    ("src_port", Value::from(rule.src_port.as_str())),
                    ("src_cidr", Value::from(rule.src_cidr.as_str())),
                    ("dst_cidr", Value::from(rule.dst_cidr.as_str())),
                    ("comment", Value::from(rule.comment.as_str())),
                ])
            })
            .collect(),
    )
}

fn storage_value(storage: &ServerStorageRelation) -> Value {
    Value::block([
        ("object_uuid", Value::from(storage.object_uuid.as_str())),
        ("bootdevice", Value::Bool(storage.bootdevice)),
        ("object_name", Value::from(storage.object_name.as_str())),
        ("capacity", Value::Int(storage.capacity)),
        ("controller", Value::Int(storage.controller)),
        ("bus", Value::Int(storage.bus)),
        ("target", Value::Int(storage.target)),
        ("lun", Value::Int(storage.lun)),
        ("license_product_no", Value::Int(storage.license_product_no)),
        ("create_time", Value::from(format_time(storage.create_time))),
        ("storage_type", Value::from(storage.storage_type.as_str())),
        ("last_used_template", Value::from(storage.last_used_template.as_str())),
    ])
}

fn network_value(network: &ServerNetworkRelation) -> Value {
    let firewall = network.firewall.clone().unwrap_or_default();
    Value::block([
        ("object_uuid", Value::from(network.object_uuid.as_str())),
        ("bootdevice", Value::Bool(network.bootdevice)),
        ("object_name", Value::from(network.object_name.as_str())),
        ("mac", Value::from(network.mac.as_str())),
        ("rules_v4_in", rules_value(&firewall.rules_v4_in)),
        ("rules_v4_out", rules_value(&firewall.rules_v4_out)),
        ("rules_v6_in", rules_value(&firewall.rules_v6_in)),
        ("rules_v6_out", rules_value(&firewall.rules_v6_out)),
        (
            "firewall_template_uuid",
            Value::from(network.firewall_template_uuid.as_str()),
        ),
        ("ordering", Value::Int(network.ordering)),
        ("create_time", Value::from(format_time(network.create_time))),
        ("network_type", Value::from(network.network_type.as_str())),
    ])
}

/// Public IPv4 and IPv6 object UUIDs; the last of each family wins
fn public_ips(relations: &ServerRelations) -> (String, String) {
    let mut ipv4 = String::new();
    let mut ipv6 = String::new();
    for ip in &relations.public_ips {
        match ip.family {
            4 => ipv4 = ip.object_uuid.clone(),
            6 => ipv6 = ip.object_uuid.clone(),
            _ => {}
        }
    }
    (ipv4, ipv6)
}

impl ResourceType for ServerDataSource {
    fn name(&self) -> &'static str {
        "gridscale_server"
    }

    fn schema(&self) -> ResourceSchema {
        ResourceSchema::new(self.name())
            .with_description("An existing virtual server")
            .attribute(
                AttributeSchema::new("resource_id", types::non_empty_string())
                    .required()
                    .with_description("ID of a resource"),
            )
            .attribute(computed("name", AttributeType::String).with_description(
                "The human-readable name of the object. It supports the full UTF-8 charset, with a maximum of 64 characters",
            ))
            .attribute(
                computed("memory", AttributeType::Int)
                    .with_description("The amount of server memory in GB."),
            )
            .attribute(
                computed("cores", AttributeType::Int).with_description("The number of server cores."),
            )
            .attribute(
                computed("location_uuid", AttributeType::String)
                    .with_description("Helps to identify which datacenter an object belongs to."),
            )
            .attribute(computed("hardware_profile", AttributeType::String))
            .attribute(computed("storage", storage_schema()).with_description(
                "A list of storages attached to the server. The first storage in the list is always set as the boot storage of the server.",
            ))
            .attribute(computed("network", network_schema()))
            .attribute(computed("ipv4", AttributeType::String))
            .attribute(computed("ipv6", AttributeType::String))
            .attribute(computed("isoimage", AttributeType::String))
            .attribute(computed("power", AttributeType::Bool))
            .attribute(computed("current_price", AttributeType::Float))
            .attribute(
                computed("auto_recovery", AttributeType::Bool).with_description(
                    "If the server should be auto-started in case of a failure (default=true).",
                ),
            )
            .attribute(
                computed("availability_zone", AttributeType::String)
                    .with_description("Defines which Availability-Zone the Server is placed."),
            )
            .attribute(
                computed("console_token", AttributeType::String)
                    .sensitive()
                    .with_description(
                        "The token used by the panel to open the websocket VNC connection to the server console.",
                    ),
            )
            .attribute(
                computed("legacy", AttributeType::Bool)
                    .with_description("Legacy-Hardware emulation instead of virtio hardware."),
            )
            .attribute(computed("usage_in_minutes_memory", AttributeType::Int))
            .attribute(computed("usage_in_minutes_cores", AttributeType::Int))
            .attribute(computed("create_time", AttributeType::String))
            .attribute(computed("change_time", AttributeType::String))
            .attribute(computed("status", AttributeType::String))
            .attribute(computed("labels", types::string_set()).with_description("List of labels."))
    }
}

#[async_trait]
impl DataSourceHandler for ServerDataSource {
    async fn read(&self, api: &dyn GridscaleApi, d: &mut ResourceData) -> ProviderResult<()> {
        let id = d.get_string("resource_id");
        let prefix = format!("read server ({}) datasource -", id);
        let server = with_timeout(d.timeout(Operation::Read), api.get_server(&id))
            .await
            .map_err(|e| api_error(&prefix, e))?;
        d.set_id(&server.object_uuid);

        let relations = &server.relations;
        let (ipv4, ipv6) = public_ips(relations);
        // At most one ISO image is attached
        let isoimage = relations
            .isoimages
            .first()
            .map(|iso| iso.object_uuid.clone())
            .unwrap_or_default();
        let storages = Value::List(relations.storages.iter().map(storage_value).collect());
        let networks = Value::List(relations.networks.iter().map(network_value).collect());

        let values: Vec<(&str, Value)> = vec![
            ("name", server.name.as_str().into()),
            ("memory", server.memory.into()),
            ("cores", server.cores.into()),
            ("hardware_profile", server.hardware_profile.as_str().into()),
            ("location_uuid", server.location_uuid.as_str().into()),
            ("power", server.power.into()),
            ("status", server.status.as_str().into()),
            ("create_time", format_time(server.create_time).into()),
            ("change_time", format_time(server.change_time).into()),
            ("current_price", server.current_price.into()),
            ("availability_zone", server.availability_zone.as_str().into()),
            ("auto_recovery", server.auto_recovery.into()),
            ("console_token", server.console_token.as_str().into()),
            ("legacy", server.legacy.into()),
            ("usage_in_minutes_memory", server.usage_in_minutes_memory.into()),
            ("usage_in_minutes_cores", server.usage_in_minutes_cores.into()),
            ("labels", labels_value(&server.labels)),
            ("storage", storages),
            ("network", networks),
            ("ipv4", ipv4.into()),
            ("ipv6", ipv6.into()),
            ("isoimage", isoimage.into()),
        ];
        set_all(d, &prefix, values)
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;
    use std::sync::Arc;

    use super::*;
    use crate::client::mock::MockApi;
    use crate::client::{FirewallRules, ObjectRef, Server, ServerIpRelation};

    fn block_of(value: &Value) -> &HashMap<String, Value> {
        value.as_map().unwrap()
    }

    fn server() -> Server {
        Server {
            object_uuid: "s-1".to_string(),
            name: "web".to_string(),
            memory: 4,
            cores: 2,
            power: true,
            console_token: "tok".to_string(),
            labels: vec!["prod".to_string()],
            relations: ServerRelations {
                isoimages: vec![ObjectRef {
                    object_uuid: "iso-1".to_string(),
                    object_name: "installer".to_string(),
                }],
                networks: vec![ServerNetworkRelation {
                    object_uuid: "n-1".to_string(),
                    bootdevice: true,
                    firewall: Some(FirewallRules {
                        rules_v4_in: vec![FirewallRule {
                            order: 1,
                            action: "accept".to_string(),
                            protocol: "tcp".to_string(),
                            dst_port: "22".to_string(),
                            ..Default::default()
                        }],
                        ..Default::default()
                    }),
                    ..Default::default()
                }],
                public_ips: vec![
                    ServerIpRelation {
                        object_uuid: "ip-4".to_string(),
                        family: 4,
                        ..Default::default()
                    },
                    ServerIpRelation {
                        object_uuid: "ip-6".to_string(),
                        family: 6,
                        ..Default::default()
                    },
                ],
                storages: vec![ServerStorageRelation {
                    object_uuid: "st-1".to_string(),
                    bootdevice: true,
                    capacity: 10,
                    ..Default::default()
                }],
            },
            ..Default::default()
        }
    }

    fn data(resource_id: &str) -> ResourceData {
        let config = [("resource_id".to_string(), Value::from(resource_id))]
            .into_iter()
            .collect();
        ResourceData::new(Arc::new(ServerDataSource.schema())).with_config(config)
    }

    #[tokio::test]
    async fn read_maps_server_and_relations() {
        let api = MockApi::new();
        api.insert_server(server());
        let mut d = data("s-1");

        ServerDataSource.read(&api, &mut d).await.unwrap();

        assert_eq!(d.id(), Some("s-1"));
        assert_eq!(d.get_string("name"), "web");
        assert_eq!(d.get_int("memory"), 4);
        assert_eq!(d.get_string("ipv4"), "ip-4");
        assert_eq!(d.get_string("ipv6"), "ip-6");
        assert_eq!(d.get_string("isoimage"), "iso-1");
        assert_eq!(d.get_string_set("labels"), vec!["prod"]);

        let storages = d.get_blocks("storage");
        assert_eq!(storages.len(), 1);
        assert_eq!(storages[0]["capacity"], Value::Int(10));

        let networks = d.get_blocks("network");
        assert_eq!(networks.len(), 1);
        let rules = networks[0]["rules_v4_in"].as_list().unwrap();
        assert_eq!(block_of(&rules[0])["dst_port"], Value::from("22"));
        assert!(networks[0]["rules_v6_out"].as_list().unwrap().is_empty());
    }

    #[tokio::test]
    async fn console_token_is_sensitive() {
        let api = MockApi::new();
        api.insert_server(server());
        let mut d = data("s-1");
        ServerDataSource.read(&api, &mut d).await.unwrap();

        assert_eq!(d.get_string("console_token"), "tok");
        assert!(ServerDataSource.schema().get("console_token").unwrap().sensitive);
    }

    #[tokio::test]
    async fn missing_server_is_an_error() {
        let api = MockApi::new();
        let mut d = data("nope");

        let err = ServerDataSource.read(&api, &mut d).await.unwrap_err();

        assert!(err.message.starts_with("read server (nope) datasource - error:"));
        assert!(err.message.contains("404"));
        assert_eq!(d.id(), None);
    }

    #[test]
    fn public_ips_by_family() {
        let relations = ServerRelations {
            public_ips: vec![ServerIpRelation {
                object_uuid: "only-6".to_string(),
                family: 6,
                ..Default::default()
            }],
            ..Default::default()
        };
        assert_eq!(public_ips(&relations), (String::new(), "only-6".to_string()));
    }

    #[test]
    fn schema_requires_resource_id() {
        let schema = ServerDataSource.schema();
        assert!(schema.validate(&HashMap::new()).is_err());

        let empty = [("resource_id".to_string(), Value::from(""))].into_iter().collect();
        assert!(schema.validate(&empty).is_err());
    }
}
