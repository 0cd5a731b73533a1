//! ResourceData - The record a handler reads from and writes to
//!
//! One `ResourceData` is built per handler invocation. It layers the values
//! written by the handler (`set`) over the configured values, the prior
//! state and the schema defaults, and tracks the remote object id.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use crate::differ::attribute_eq;
use crate::resource::{ResourceId, State, Value};
use crate::schema::{AttributeType, Operation, ResourceSchema, TypeError};

#[derive(Debug, Clone)]
pub struct ResourceData {
    schema: Arc<ResourceSchema>,
    id: Option<String>,
    config: HashMap<String, Value>,
    prior: HashMap<String, Value>,
    written: HashMap<String, Value>,
}

impl ResourceData {
    pub fn new(schema: Arc<ResourceSchema>) -> Self {
        Self {
            schema,
            id: None,
            config: HashMap::new(),
            prior: HashMap::new(),
            written: HashMap::new(),
        }
    }

    /// Configured (desired) attributes
    pub fn with_config(mut self, config: HashMap<String, Value>) -> Self {
        self.config = config;
        self
    }

    /// Attributes from the last known state
    pub fn with_prior(mut self, prior: HashMap<String, Value>) -> Self {
        self.prior = prior;
        self
    }

    pub fn with_id(mut self, id: impl Into<String>) -> Self {
        self.set_id(id);
        self
    }

    pub fn schema(&self) -> &ResourceSchema {
        &self.schema
    }

    /// Remote object id, `None` when the object does not exist (yet)
    pub fn id(&self) -> Option<&str> {
        self.id.as_deref()
    }

    /// Remote object id or an empty string, for messages
    pub fn id_or_empty(&self) -> &str {
        self.id.as_deref().unwrap_or("")
    }

    pub fn set_id(&mut self, id: impl Into<String>) {
        let id = id.into();
        self.id = if id.is_empty() { None } else { Some(id) };
    }

    /// Mark the remote object as gone
    pub fn clear_id(&mut self) {
        self.id = None;
    }

    /// Timeout configured for an operation
    pub fn timeout(&self, op: Operation) -> Option<Duration> {
        self.schema.timeouts.get(op)
    }

    /// Current value of an attribute
    ///
    /// Lookup order: values written by the handler, configuration, prior
    /// state (computed attributes only), schema default.
    pub fn get(&self, key: &str) -> Option<&Value> {
        if let Some(v) = self.written.get(key) {
            return Some(v);
        }
        self.planned(key)
    }

    /// Like `get`, but unset and zero values are `None`
    pub fn get_ok(&self, key: &str) -> Option<&Value> {
        self.get(key).filter(|v| !v.is_zero())
    }

    pub fn get_string(&self, key: &str) -> String {
        self.get(key)
            .and_then(Value::as_str)
            .map(str::to_string)
            .unwrap_or_default()
    }

    pub fn get_int(&self, key: &str) -> i64 {
        self.get(key).and_then(Value::as_int).unwrap_or_default()
    }

    pub fn get_float(&self, key: &str) -> f64 {
        self.get(key).and_then(Value::as_float).unwrap_or_default()
    }

    pub fn get_bool(&self, key: &str) -> bool {
        self.get(key).and_then(Value::as_bool).unwrap_or_default()
    }

    /// Elements of a list or set of strings
    pub fn get_string_set(&self, key: &str) -> Vec<String> {
        self.get(key)
            .and_then(Value::as_list)
            .map(|items| {
                items
                    .iter()
                    .filter_map(Value::as_str)
                    .map(str::to_string)
                    .collect()
            })
            .unwrap_or_default()
    }

    /// Instances of a nested block attribute
    pub fn get_blocks(&self, key: &str) -> Vec<&HashMap<String, Value>> {
        self.get(key)
            .and_then(Value::as_list)
            .map(|items| items.iter().filter_map(Value::as_map).collect())
            .unwrap_or_default()
    }

    /// Whether the planned value differs from the prior state
    pub fn has_change(&self, key: &str) -> bool {
        let (old, new) = self.get_change(key);
        match (old, new, self.schema.get(key)) {
            (None, None, _) => false,
            (Some(a), Some(b), Some(schema)) => !attribute_eq(&schema.attr_type, a, b),
            (Some(a), Some(b), None) => a != b,
            (Some(v), None, _) | (None, Some(v), _) => !v.is_zero(),
        }
    }

    /// Prior and planned value of an attribute
    pub fn get_change(&self, key: &str) -> (Option<&Value>, Option<&Value>) {
        (self.prior.get(key), self.planned(key))
    }

    /// Write an attribute into the new state
    pub fn set(&mut self, key: &str, value: impl Into<Value>) -> Result<(), TypeError> {
        let value = value.into();
        let schema = self
            .schema
            .get(key)
            .ok_or_else(|| TypeError::UnknownAttribute {
                name: key.to_string(),
            })?;
        check_shape(&schema.attr_type, &value).map_err(|e| TypeError::AttributeError {
            name: key.to_string(),
            inner: Box::new(e),
        })?;
        self.written.insert(key.to_string(), value);
        Ok(())
    }

    /// Attributes of the resulting state
    pub fn state_attributes(&self) -> HashMap<String, Value> {
        let mut attributes = HashMap::new();
        for name in self.schema.attributes.keys() {
            if let Some(v) = self.get(name) {
                attributes.insert(name.clone(), v.clone());
            }
        }
        attributes
    }

    /// Turn the record into the state returned to the host
    pub fn into_state(self, id: ResourceId) -> State {
        match self.id.clone() {
            Some(identifier) => {
                State::existing(id, self.state_attributes()).with_identifier(identifier)
            }
            None => State::not_found(id),
        }
    }

    fn planned(&self, key: &str) -> Option<&Value> {
        if let Some(v) = self.config.get(key) {
            return Some(v);
        }
        let schema = self.schema.get(key)?;
        if schema.computed
            && let Some(v) = self.prior.get(key)
        {
            return Some(v);
        }
        schema.default.as_ref()
    }
}

/// Structural type check without running custom validators
fn check_shape(attr_type: &AttributeType, value: &Value) -> Result<(), TypeError> {
    match (attr_type, value) {
        (AttributeType::Custom { base, .. }, v) => check_shape(base, v),
        (AttributeType::Enum(_), Value::String(_)) => Ok(()),
        (AttributeType::List(inner) | AttributeType::Set(inner), Value::List(items)) => {
            items.iter().try_for_each(|item| check_shape(inner, item))
        }
        (AttributeType::Block(attributes), Value::Map(map)) => {
            for (k, v) in map {
                let schema = attributes
                    .get(k)
                    .ok_or_else(|| TypeError::UnknownAttribute { name: k.clone() })?;
                check_shape(&schema.attr_type, v)?;
            }
            Ok(())
        }
        (t, v) => t.validate(v),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::{AttributeSchema, Timeouts, types};

    fn schema() -> Arc<ResourceSchema> {
        Arc::new(
            ResourceSchema::new("gridscale_server")
                .attribute(AttributeSchema::new("name", AttributeType::String).required())
                .attribute(AttributeSchema::new("power", AttributeType::Bool).with_default(false))
                .attribute(AttributeSchema::new("storage", AttributeType::String).optional())
                .attribute(AttributeSchema::new("labels", types::string_set()).optional())
                .attribute(AttributeSchema::new("memory", types::positive_int()).required())
                .attribute(AttributeSchema::new("status", AttributeType::String).computed())
                .with_timeouts(Timeouts::for_writes(Duration::from_secs(60))),
        )
    }

    fn map(pairs: &[(&str, Value)]) -> HashMap<String, Value> {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.clone()))
            .collect()
    }

    #[test]
    fn get_prefers_written_then_config_then_default() {
        let mut d = ResourceData::new(schema()).with_config(map(&[("name", Value::from("a"))]));
        assert_eq!(d.get_string("name"), "a");
        assert!(!d.get_bool("power"));

        d.set("name", "b").unwrap();
        assert_eq!(d.get_string("name"), "b");
    }

    #[test]
    fn get_ok_skips_zero_values() {
        let d = ResourceData::new(schema()).with_config(map(&[("storage", Value::from(""))]));
        assert!(d.get_ok("storage").is_none());
        assert!(d.get_ok("power").is_none());
        assert!(d.get("power").is_some());
    }

    #[test]
    fn computed_values_survive_from_prior_state() {
        let d = ResourceData::new(schema()).with_prior(map(&[
            ("status", Value::from("active")),
            ("storage", Value::from("s-1")),
        ]));
        assert_eq!(d.get_string("status"), "active");
        // not computed: removed from configuration means unset
        assert!(d.get("storage").is_none());
    }

    #[test]
    fn has_change_compares_prior_and_config() {
        let d = ResourceData::new(schema())
            .with_prior(map(&[
                ("name", Value::from("a")),
                ("labels", Value::string_list(["x", "y"])),
            ]))
            .with_config(map(&[
                ("name", Value::from("b")),
                ("labels", Value::string_list(["y", "x"])),
            ]));
        assert!(d.has_change("name"));
        assert!(!d.has_change("labels"));
        assert!(!d.has_change("power"));
    }

    #[test]
    fn set_rejects_unknown_and_mistyped_attributes() {
        let mut d = ResourceData::new(schema());
        assert!(matches!(
            d.set("colour", "blue"),
            Err(TypeError::UnknownAttribute { .. })
        ));
        assert!(d.set("memory", "two").is_err());
        // custom validators only apply to configuration
        assert!(d.set("memory", 0i64).is_ok());
    }

    #[test]
    fn cleared_id_yields_missing_state() {
        let mut d = ResourceData::new(schema()).with_id("abc");
        assert_eq!(d.id(), Some("abc"));
        d.clear_id();
        let state = d.into_state(ResourceId::new("gridscale_server", "web"));
        assert!(!state.exists);
    }

    #[test]
    fn into_state_merges_config_and_written_values() {
        let mut d = ResourceData::new(schema())
            .with_config(map(&[("name", Value::from("web")), ("memory", Value::Int(2))]))
            .with_id("abc");
        d.set("status", "active").unwrap();

        let state = d.into_state(ResourceId::new("gridscale_server", "web"));
        assert!(state.exists);
        assert_eq!(state.identifier.as_deref(), Some("abc"));
        assert_eq!(state.attributes["name"], Value::from("web"));
        assert_eq!(state.attributes["status"], Value::from("active"));
        assert_eq!(state.attributes["power"], Value::Bool(false));
    }

    #[test]
    fn timeout_comes_from_schema() {
        let d = ResourceData::new(schema());
        assert_eq!(d.timeout(Operation::Update), Some(Duration::from_secs(60)));
        assert_eq!(d.timeout(Operation::Read), None);
    }
}
