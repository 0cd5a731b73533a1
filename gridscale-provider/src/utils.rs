//! Helpers shared by resources and data sources

use chrono::{DateTime, SecondsFormat, Utc};
use gridscale_core::resource::Value;
use gridscale_core::resource_data::ResourceData;

use crate::client::Network;

/// Labels configured on a resource
pub fn labels(d: &ResourceData) -> Vec<String> {
    d.get_string_set("labels")
}

/// Label list as returned by the API, as a set value
pub fn labels_value(labels: &[String]) -> Value {
    Value::string_list(labels.iter().cloned())
}

/// RFC 3339 rendering of an API timestamp; unset timestamps are empty
pub fn format_time(time: Option<DateTime<Utc>>) -> String {
    time.map(|t| t.to_rfc3339_opts(SecondsFormat::Secs, true))
        .unwrap_or_default()
}

/// UUID of the network a PaaS security zone belongs to
///
/// A network carries at most one security zone; only the first zone
/// relation of each network is considered.
pub fn find_network_by_security_zone<'a>(
    networks: &'a [Network],
    security_zone_uuid: &str,
) -> Option<&'a str> {
    networks
        .iter()
        .find(|network| {
            network
                .relations
                .paas_security_zones
                .first()
                .is_some_and(|zone| zone.object_uuid == security_zone_uuid)
        })
        .map(|network| network.object_uuid.as_str())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::client::{NetworkRelations, ObjectRef};
    use chrono::TimeZone;

    fn network(uuid: &str, zones: &[&str]) -> Network {
        Network {
            object_uuid: uuid.to_string(),
            relations: NetworkRelations {
                paas_security_zones: zones
                    .iter()
                    .map(|z| ObjectRef {
                        object_uuid: z.to_string(),
                        object_name: String::new(),
                    })
                    .collect(),
            },
            ..Default::default()
        }
    }

    #[test]
    fn finds_network_of_security_zone() {
        let networks = vec![
            network("net-1", &[]),
            network("net-2", &["zone-a"]),
            network("net-3", &["zone-b"]),
        ];
        assert_eq!(
            find_network_by_security_zone(&networks, "zone-b"),
            Some("net-3")
        );
        assert_eq!(find_network_by_security_zone(&networks, "zone-c"), None);
    }

    #[test]
    fn only_first_zone_relation_counts() {
        let networks = vec![network("net-1", &["zone-a", "zone-b"])];
        assert_eq!(find_network_by_security_zone(&networks, "zone-b"), None);
        assert_eq!(
            find_network_by_security_zone(&networks, "zone-a"),
            Some("net-1")
        );
    }

    #[test]
    fn format_time_renders_rfc3339() {
        let t = Utc.with_ymd_and_hms(2020, 1, 10, 9, 46, 56).unwrap();
        assert_eq!(format_time(Some(t)), "2020-01-10T09:46:56Z");
        assert_eq!(format_time(None), "");
    }

    #[test]
    fn labels_value_is_string_list() {
        let value = labels_value(&["a".to_string(), "b".to_string()]);
        assert_eq!(value, Value::string_list(["a", "b"]));
    }
}
