use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};

use clap::{Args, Parser, Subcommand};
use colored::Colorize;

use gridscale_core::provider::{Provider, ResourceType};
use gridscale_core::resource::{Resource, ResourceId, State, Value};
use gridscale_core::schema::{AttributeSchema, AttributeType, ResourceSchema};
use gridscale_provider::config::{ENV_API_TOKEN, ENV_API_URL, ENV_USER_UUID};
use gridscale_provider::{GridscaleProvider, ProviderConfig, data_sources, resources};

#[derive(Parser)]
#[command(name = "gridscale")]
#[command(about = "Inspect and manage gridscale objects", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Show resource schemas
    Schema {
        /// Resource type; lists all types when omitted
        resource_type: Option<String>,

        /// Look up data sources instead of resources
        #[arg(long)]
        data: bool,
    },
    /// Validate a configuration file (Terraform JSON syntax)
    Validate {
        #[arg(default_value = "main.tf.json")]
        file: PathBuf,
    },
    /// Read an existing object into state
    Import {
        resource_type: String,
        id: String,
        #[command(flatten)]
        credentials: Credentials,
    },
    /// Read a data source
    Data {
        data_source_type: String,

        /// Configuration attribute, e.g. `--attr resource_id=<uuid>`
        #[arg(long = "attr", value_parser = parse_attr)]
        attrs: Vec<(String, String)>,

        #[command(flatten)]
        credentials: Credentials,
    },
    /// Delete an object
    Delete {
        resource_type: String,
        id: String,
        #[command(flatten)]
        credentials: Credentials,
    },
}

#[derive(Args)]
struct Credentials {
    /// API user UUID
    #[arg(long, env = ENV_USER_UUID)]
    uuid: String,

    /// API token
    #[arg(long, env = ENV_API_TOKEN, hide_env_values = true)]
    token: String,

    /// API endpoint
    #[arg(long, env = ENV_API_URL)]
    url: Option<String>,
}

impl Credentials {
    fn provider(&self) -> Result<GridscaleProvider, String> {
        let mut config = ProviderConfig::new(&self.uuid, &self.token);
        if let Some(url) = &self.url {
            config = config.with_api_url(url);
        }
        log::debug!("provider config: {:?}", config);
        GridscaleProvider::new(&config).map_err(|e| e.to_string())
    }
}

#[tokio::main]
async fn main() {
    env_logger::init();
    let cli = Cli::parse();

    let result = match cli.command {
        Commands::Schema {
            resource_type,
            data,
        } => run_schema(resource_type.as_deref(), data),
        Commands::Validate { file } => run_validate(&file),
        Commands::Import {
            resource_type,
            id,
            credentials,
        } => run_import(&resource_type, &id, &credentials).await,
        Commands::Data {
            data_source_type,
            attrs,
            credentials,
        } => run_data(&data_source_type, attrs, &credentials).await,
        Commands::Delete {
            resource_type,
            id,
            credentials,
        } => run_delete(&resource_type, &id, &credentials).await,
    };

    if let Err(e) = result {
        eprintln!("{} {}", "Error:".red().bold(), e);
        std::process::exit(1);
    }
}

fn parse_attr(s: &str) -> Result<(String, String), String> {
    match s.split_once('=') {
        Some((key, value)) if !key.is_empty() => Ok((key.to_string(), value.to_string())),
        _ => Err(format!("expected KEY=VALUE, got '{}'", s)),
    }
}

fn schemas_of(types: Vec<Box<dyn ResourceType>>) -> HashMap<String, ResourceSchema> {
    types
        .into_iter()
        .map(|t| (t.name().to_string(), t.schema()))
        .collect()
}

fn get_schemas() -> HashMap<String, ResourceSchema> {
    schemas_of(resources::resource_types())
}

fn get_data_schemas() -> HashMap<String, ResourceSchema> {
    schemas_of(data_sources::data_source_types())
}

fn find_schema(resource_type: &str, data: bool) -> Result<ResourceSchema, String> {
    let (mut schemas, kind) = if data {
        (get_data_schemas(), "data source")
    } else {
        (get_schemas(), "resource type")
    };
    schemas
        .remove(resource_type)
        .ok_or_else(|| format!("Unknown {}: {}", kind, resource_type))
}

// =============================================================================
// schema
// =============================================================================

fn run_schema(resource_type: Option<&str>, data: bool) -> Result<(), String> {
    let Some(resource_type) = resource_type else {
        let mut names: Vec<String> = get_schemas().into_keys().collect();
        names.sort();
        println!("{}", "Resources:".cyan().bold());
        for name in names {
            println!("  • {}", name);
        }
        let mut names: Vec<String> = get_data_schemas().into_keys().collect();
        names.sort();
        println!("{}", "Data sources:".cyan().bold());
        for name in names {
            println!("  • {}", name);
        }
        return Ok(());
    };

    let schema = find_schema(resource_type, data)?;
    println!("{}", schema.resource_type.bold());
    if let Some(description) = &schema.description {
        println!("  {}", description.dimmed());
    }
    println!();
    for name in schema.attribute_names() {
        if let Some(attr) = schema.get(name) {
            println!("{}", format_attribute(attr));
        }
    }
    Ok(())
}

fn attribute_flags(attr: &AttributeSchema) -> Vec<&'static str> {
    let mut flags = Vec::new();
    if attr.required {
        flags.push("required");
    } else if attr.optional {
        flags.push("optional");
    }
    if attr.computed {
        flags.push("computed");
    }
    if attr.force_new {
        flags.push("force new");
    }
    if attr.sensitive {
        flags.push("sensitive");
    }
    if attr.deprecated.is_some() {
        flags.push("deprecated");
    }
    flags
}

fn format_attribute(attr: &AttributeSchema) -> String {
    let mut line = format!(
        "  {} {} ({})",
        attr.name.green(),
        attr.attr_type.type_name(),
        attribute_flags(attr).join(", ")
    );
    if let Some(default) = &attr.default {
        line.push_str(&format!(" = {}", format_value(default)));
    }
    if let Some(description) = &attr.description {
        line.push_str(&format!("\n      {}", description.dimmed()));
    }
    line
}

fn format_value(value: &Value) -> String {
    match value {
        Value::String(s) => format!("\"{}\"", s),
        Value::Int(n) => n.to_string(),
        Value::Float(n) => n.to_string(),
        Value::Bool(b) => b.to_string(),
        Value::List(items) => {
            let strs: Vec<_> = items.iter().map(format_value).collect();
            format!("[{}]", strs.join(", "))
        }
        Value::Map(map) => {
            let mut strs: Vec<_> = map
                .iter()
                .map(|(k, v)| format!("{}: {}", k, format_value(v)))
                .collect();
            strs.sort();
            format!("{{{}}}", strs.join(", "))
        }
    }
}

// =============================================================================
// validate
// =============================================================================

/// Resources and data sources declared in a Terraform JSON document
fn parse_config(content: &str) -> Result<Vec<Resource>, String> {
    let root: serde_json::Value =
        serde_json::from_str(content).map_err(|e| format!("Parse error: {}", e))?;

    let mut declared = collect_blocks(&root, "resource", false)?;
    declared.extend(collect_blocks(&root, "data", true)?);
    Ok(declared)
}

fn collect_blocks(
    root: &serde_json::Value,
    section: &str,
    read_only: bool,
) -> Result<Vec<Resource>, String> {
    let Some(types) = root.get(section) else {
        return Ok(Vec::new());
    };
    let types = types
        .as_object()
        .ok_or_else(|| format!("'{}' must be an object", section))?;

    let mut declared = Vec::new();
    for (resource_type, blocks) in types {
        let blocks = blocks
            .as_object()
            .ok_or_else(|| format!("{}.{} must be an object", section, resource_type))?;
        for (name, body) in blocks {
            let body = body.as_object().ok_or_else(|| {
                format!("{}.{}.{} must be an object", section, resource_type, name)
            })?;
            let mut resource = Resource::new(resource_type, name).with_read_only(read_only);
            for (key, value) in body {
                if let Some(value) = Value::from_json(value) {
                    resource.attributes.insert(key.clone(), value);
                }
            }
            declared.push(resource);
        }
    }
    Ok(declared)
}

/// Nested blocks written as a single object stand for a one-element list
fn normalize_blocks(schema: &ResourceSchema, resource: &mut Resource) {
    for (key, value) in resource.attributes.iter_mut() {
        let is_collection = schema.get(key).is_some_and(|attr| {
            matches!(attr.attr_type, AttributeType::List(_) | AttributeType::Set(_))
        });
        if is_collection && matches!(value, Value::Map(_)) {
            *value = Value::List(vec![value.clone()]);
        }
    }
}

fn validate_resources(resources: &mut [Resource]) -> Result<(), String> {
    let schemas = get_schemas();
    let data_schemas = get_data_schemas();
    let mut all_errors = Vec::new();

    for resource in resources.iter_mut() {
        let known = if resource.is_data_source() {
            &data_schemas
        } else {
            &schemas
        };
        let Some(schema) = known.get(&resource.id.resource_type) else {
            all_errors.push(format!(
                "{}.{}: unknown type",
                resource.id.resource_type, resource.id.name
            ));
            continue;
        };
        normalize_blocks(schema, resource);
        if let Err(errors) = schema.validate(&resource.attributes) {
            for error in errors {
                all_errors.push(format!(
                    "{}.{}: {}",
                    resource.id.resource_type, resource.id.name, error
                ));
            }
        }
    }

    if all_errors.is_empty() {
        Ok(())
    } else {
        Err(all_errors.join("\n"))
    }
}

fn run_validate(file: &Path) -> Result<(), String> {
    let content = fs::read_to_string(file)
        .map_err(|e| format!("Failed to read {}: {}", file.display(), e))?;
    let mut declared = parse_config(&content)?;
    log::debug!("{} blocks declared in {}", declared.len(), file.display());

    println!("{}", "Validating...".cyan());

    validate_resources(&mut declared)?;

    println!(
        "{}",
        format!("✓ {} blocks validated successfully.", declared.len())
            .green()
            .bold()
    );
    for resource in &declared {
        let prefix = if resource.is_data_source() { "data." } else { "" };
        println!(
            "  • {}{}.{}",
            prefix, resource.id.resource_type, resource.id.name
        );
    }
    Ok(())
}

// =============================================================================
// import / data / delete
// =============================================================================

/// State as pretty JSON with sensitive attributes masked
fn render_state(state: &State, schema: &ResourceSchema) -> Result<String, String> {
    let masked = State {
        attributes: schema.redact(&state.attributes),
        ..state.clone()
    };
    serde_json::to_string_pretty(&masked.to_json()).map_err(|e| e.to_string())
}

async fn run_import(resource_type: &str, id: &str, credentials: &Credentials) -> Result<(), String> {
    let schema = find_schema(resource_type, false)?;
    let provider = credentials.provider()?;

    let state = provider
        .import(&ResourceId::new(resource_type, "imported"), id)
        .await
        .map_err(|e| e.to_string())?;
    if !state.exists {
        return Err(format!("{} {} does not exist", resource_type, id));
    }

    println!("{}", render_state(&state, &schema)?);
    Ok(())
}

async fn run_data(
    data_source_type: &str,
    attrs: Vec<(String, String)>,
    credentials: &Credentials,
) -> Result<(), String> {
    let schema = find_schema(data_source_type, true)?;
    let provider = credentials.provider()?;

    let mut lookup = Resource::new(data_source_type, "lookup").with_read_only(true);
    for (key, value) in attrs {
        lookup = lookup.with_attribute(key, value);
    }
    let state = provider
        .read_data_source(&lookup)
        .await
        .map_err(|e| e.to_string())?;

    println!("{}", render_state(&state, &schema)?);
    Ok(())
}

async fn run_delete(resource_type: &str, id: &str, credentials: &Credentials) -> Result<(), String> {
    find_schema(resource_type, false)?;
    let provider = credentials.provider()?;

    println!("{}", format!("Deleting {} {}...", resource_type, id).red().bold());
    provider
        .delete(&ResourceId::new(resource_type, "deleted"), id)
        .await
        .map_err(|e| e.to_string())?;
    println!("{}", "✓ Deleted.".green());
    Ok(())
}
