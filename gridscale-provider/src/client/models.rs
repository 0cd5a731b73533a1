//! API objects and request bodies
//!
//! Field names follow the JSON of the gridscale REST API.

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Response of every create call
#[derive(Debug, Clone, Default, PartialEq, Deserialize, Serialize)]
pub struct CreateResponse {
    pub object_uuid: String,
    #[serde(default)]
    pub request_uuid: Option<String>,
}

/// Reference to a related object
#[derive(Debug, Clone, Default, PartialEq, Deserialize, Serialize)]
pub struct ObjectRef {
    pub object_uuid: String,
    #[serde(default)]
    pub object_name: String,
}

// =============================================================================
// Servers
// =============================================================================

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(default)]
pub struct Server {
    pub object_uuid: String,
    pub name: String,
    pub memory: i64,
    pub cores: i64,
    pub hardware_profile: String,
    pub location_uuid: String,
    pub power: bool,
    pub current_price: f64,
    pub availability_zone: String,
    pub auto_recovery: bool,
    pub console_token: String,
    pub legacy: bool,
    pub usage_in_minutes_memory: i64,
    pub usage_in_minutes_cores: i64,
    pub labels: Vec<String>,
    pub status: String,
    pub create_time: Option<DateTime<Utc>>,
    pub change_time: Option<DateTime<Utc>>,
    pub relations: ServerRelations,
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(default)]
pub struct ServerRelations {
    pub isoimages: Vec<ObjectRef>,
    pub networks: Vec<ServerNetworkRelation>,
    pub public_ips: Vec<ServerIpRelation>,
    pub storages: Vec<ServerStorageRelation>,
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(default)]
pub struct ServerStorageRelation {
    pub object_uuid: String,
    pub object_name: String,
    pub capacity: i64,
    pub controller: i64,
    pub bus: i64,
    pub target: i64,
    pub lun: i64,
    pub license_product_no: i64,
    pub create_time: Option<DateTime<Utc>>,
    pub bootdevice: bool,
    pub storage_type: String,
    pub last_used_template: String,
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(default)]
pub struct ServerNetworkRelation {
    pub object_uuid: String,
    pub object_name: String,
    pub bootdevice: bool,
    pub mac: String,
    pub firewall: Option<FirewallRules>,
    pub firewall_template_uuid: String,
    pub ordering: i64,
    pub create_time: Option<DateTime<Utc>>,
    pub network_type: String,
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct FirewallRules {
    #[serde(rename = "rules-v4-in")]
    pub rules_v4_in: Vec<FirewallRule>,
    #[serde(rename = "rules-v4-out")]
    pub rules_v4_out: Vec<FirewallRule>,
    #[serde(rename = "rules-v6-in")]
    pub rules_v6_in: Vec<FirewallRule>,
    #[serde(rename = "rules-v6-out")]
    pub rules_v6_out: Vec<FirewallRule>,
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct FirewallRule {
    pub order: i64,
    pub action: String,
    pub protocol: String,
    pub dst_port: String,
    pub src_port: String,
    pub src_cidr: String,
    pub dst_cidr: String,
    pub comment: String,
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(default)]
pub struct ServerIpRelation {
    pub object_uuid: String,
    pub family: i64,
    pub prefix: String,
    pub ip: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ServerCreateRequest {
    pub name: String,
    pub memory: i64,
    pub cores: i64,
    pub location_uuid: String,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub labels: Vec<String>,
    pub relations: ServerCreateRelations,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ServerCreateRelations {
    pub isoimages: Vec<ObjectRef>,
    pub networks: Vec<ServerCreateNetwork>,
    pub public_ips: Vec<ObjectRef>,
    pub storages: Vec<ServerCreateStorage>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ServerCreateStorage {
    pub storage_uuid: String,
    pub bootdevice: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ServerCreateNetwork {
    pub network_uuid: String,
    pub bootdevice: bool,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ServerUpdateRequest {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub labels: Option<Vec<String>>,
}

// =============================================================================
// Networks
// =============================================================================

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(default)]
pub struct Network {
    pub object_uuid: String,
    pub name: String,
    pub location_uuid: String,
    pub location_country: String,
    pub location_iata: String,
    pub location_name: String,
    pub public_net: bool,
    pub l2security: bool,
    pub network_type: String,
    pub delete_block: bool,
    pub status: String,
    pub create_time: Option<DateTime<Utc>>,
    pub change_time: Option<DateTime<Utc>>,
    pub labels: Vec<String>,
    pub dhcp_active: bool,
    pub dhcp_gateway: Option<String>,
    pub dhcp_dns: Option<String>,
    pub dhcp_range: Option<String>,
    pub dhcp_reserved_subnet: Vec<String>,
    pub relations: NetworkRelations,
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(default)]
pub struct NetworkRelations {
    pub paas_security_zones: Vec<ObjectRef>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct NetworkCreateRequest {
    pub name: String,
    pub l2security: bool,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub labels: Vec<String>,
    pub dhcp_active: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub dhcp_gateway: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub dhcp_dns: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub dhcp_range: Option<String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub dhcp_reserved_subnet: Vec<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct NetworkUpdateRequest {
    pub name: String,
    pub l2security: bool,
    pub labels: Vec<String>,
    pub dhcp_active: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub dhcp_gateway: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub dhcp_dns: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub dhcp_range: Option<String>,
    pub dhcp_reserved_subnet: Vec<String>,
}

// =============================================================================
// PaaS services
// =============================================================================

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(default)]
pub struct PaaSService {
    pub object_uuid: String,
    pub name: String,
    pub credentials: Vec<Credential>,
    /// host -> (port name -> port)
    pub listen_ports: HashMap<String, HashMap<String, i64>>,
    pub security_zone_uuid: String,
    pub network_uuid: String,
    pub service_template_uuid: String,
    pub service_template_category: String,
    pub usage_in_minutes: i64,
    pub current_price: f64,
    pub change_time: Option<DateTime<Utc>>,
    pub create_time: Option<DateTime<Utc>>,
    pub status: String,
    pub parameters: serde_json::Map<String, serde_json::Value>,
    pub resource_limits: Vec<ResourceLimit>,
    pub labels: Vec<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(default)]
pub struct Credential {
    pub username: String,
    pub password: String,
    #[serde(rename = "type")]
    pub kind: String,
    pub kubeconfig: String,
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize, Serialize)]
pub struct ResourceLimit {
    pub resource: String,
    pub limit: i64,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct PaaSServiceCreateRequest {
    pub name: String,
    pub paas_service_template_uuid: String,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub labels: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub paas_security_zone_uuid: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub network_uuid: Option<String>,
    #[serde(skip_serializing_if = "serde_json::Map::is_empty")]
    pub parameters: serde_json::Map<String, serde_json::Value>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub resource_limits: Vec<ResourceLimit>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct PaaSServiceUpdateRequest {
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub labels: Option<Vec<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub network_uuid: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub service_template_uuid: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub parameters: Option<serde_json::Map<String, serde_json::Value>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub resource_limits: Option<Vec<ResourceLimit>>,
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(default)]
pub struct PaaSTemplate {
    pub object_uuid: String,
    pub name: String,
    pub flavour: String,
    pub release: String,
    pub performance_class: String,
    pub category: String,
    pub version: String,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn server_decodes_with_missing_fields() {
        let server: Server = serde_json::from_value(json!({
            "object_uuid": "s-1",
            "name": "web",
            "memory": 2,
            "cores": 1,
            "create_time": "2020-01-10T09:46:56Z",
            "relations": {
                "public_ips": [{"object_uuid": "ip-4", "family": 4}]
            }
        }))
        .unwrap();
        assert_eq!(server.name, "web");
        assert!(server.create_time.is_some());
        assert!(server.change_time.is_none());
        assert_eq!(server.relations.public_ips[0].family, 4);
        assert!(server.relations.storages.is_empty());
    }

    #[test]
    fn firewall_rule_lists_use_dashed_keys() {
        let rules: FirewallRules = serde_json::from_value(json!({
            "rules-v4-in": [{"order": 1, "action": "accept", "protocol": "tcp", "dst_port": "22"}]
        }))
        .unwrap();
        assert_eq!(rules.rules_v4_in.len(), 1);
        assert_eq!(rules.rules_v4_in[0].dst_port, "22");
    }

    #[test]
    fn paas_create_request_skips_unset_fields() {
        let body = serde_json::to_value(PaaSServiceCreateRequest {
            name: "db".to_string(),
            paas_service_template_uuid: "tpl".to_string(),
            network_uuid: Some("net".to_string()),
            ..Default::default()
        })
        .unwrap();
        assert_eq!(
            body,
            json!({"name": "db", "paas_service_template_uuid": "tpl", "network_uuid": "net"})
        );
    }
}
