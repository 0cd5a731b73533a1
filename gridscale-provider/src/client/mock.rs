//! In-memory [`GridscaleApi`] for handler tests

use std::collections::HashMap;
use std::sync::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};

use async_trait::async_trait;

use super::models::*;
use super::{ClientError, ClientResult, GridscaleApi, RequestError};

#[derive(Default)]
pub(crate) struct MockApi {
    pub servers: Mutex<HashMap<String, Server>>,
    pub networks: Mutex<HashMap<String, Network>>,
    pub paas: Mutex<HashMap<String, PaaSService>>,
    pub templates: Mutex<Vec<PaaSTemplate>>,
    pub calls: Mutex<Vec<String>>,
    pub last_server_create: Mutex<Option<ServerCreateRequest>>,
    pub last_paas_create: Mutex<Option<PaaSServiceCreateRequest>>,
    pub last_paas_update: Mutex<Option<PaaSServiceUpdateRequest>>,
    /// Status code returned by every call, when set
    pub fail_with: Mutex<Option<u16>>,
    /// Operation name and status code of a single failing operation
    pub fail_call: Mutex<Option<(String, u16)>>,
    next_id: AtomicUsize,
}

fn not_found(kind: &str, id: &str) -> ClientError {
    RequestError::new(404, format!("{} {} not found", kind, id)).into()
}

impl MockApi {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_templates(self, templates: Vec<PaaSTemplate>) -> Self {
        *self.templates.lock().unwrap() = templates;
        self
    }

    pub fn insert_server(&self, server: Server) {
        self.servers
            .lock()
            .unwrap()
            .insert(server.object_uuid.clone(), server);
    }

    pub fn insert_network(&self, network: Network) {
        self.networks
            .lock()
            .unwrap()
            .insert(network.object_uuid.clone(), network);
    }

    pub fn insert_paas(&self, service: PaaSService) {
        self.paas
            .lock()
            .unwrap()
            .insert(service.object_uuid.clone(), service);
    }

    pub fn failing_call(self, operation: &str, code: u16) -> Self {
        *self.fail_call.lock().unwrap() = Some((operation.to_string(), code));
        self
    }

    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }

    fn record(&self, call: String) -> ClientResult<()> {
        if let Some((operation, code)) = self.fail_call.lock().unwrap().clone()
            && call.split(' ').next() == Some(operation.as_str())
        {
            self.calls.lock().unwrap().push(call);
            return Err(RequestError::new(code, "injected failure").into());
        }
        self.calls.lock().unwrap().push(call);
        match *self.fail_with.lock().unwrap() {
            Some(code) => Err(RequestError::new(code, "injected failure").into()),
            None => Ok(()),
        }
    }

    fn next_id(&self, prefix: &str) -> String {
        format!("{}-{}", prefix, self.next_id.fetch_add(1, Ordering::SeqCst) + 1)
    }
}

pub(crate) fn template(uuid: &str, flavour: &str, release: &str, class: &str) -> PaaSTemplate {
    PaaSTemplate {
        object_uuid: uuid.to_string(),
        name: format!("{} {} {}", flavour, release, class),
        flavour: flavour.to_string(),
        release: release.to_string(),
        performance_class: class.to_string(),
        category: "database".to_string(),
        version: String::new(),
    }
}

#[async_trait]
impl GridscaleApi for MockApi {
    async fn get_server(&self, id: &str) -> ClientResult<Server> {
        self.record(format!("get_server {}", id))?;
        self.servers
            .lock()
            .unwrap()
            .get(id)
            .cloned()
            .ok_or_else(|| not_found("server", id))
    }

    async fn create_server(&self, request: &ServerCreateRequest) -> ClientResult<CreateResponse> {
        self.record(format!("create_server {}", request.name))?;
        *self.last_server_create.lock().unwrap() = Some(request.clone());
        let id = self.next_id("server");
        let server = Server {
            object_uuid: id.clone(),
            name: request.name.clone(),
            memory: request.memory,
            cores: request.cores,
            location_uuid: request.location_uuid.clone(),
            hardware_profile: "default".to_string(),
            labels: request.labels.clone(),
            status: "active".to_string(),
            current_price: 1.5,
            relations: ServerRelations {
                storages: request
                    .relations
                    .storages
                    .iter()
                    .map(|s| ServerStorageRelation {
                        object_uuid: s.storage_uuid.clone(),
                        bootdevice: s.bootdevice,
                        ..Default::default()
                    })
                    .collect(),
                networks: request
                    .relations
                    .networks
                    .iter()
                    .map(|n| ServerNetworkRelation {
                        object_uuid: n.network_uuid.clone(),
                        bootdevice: n.bootdevice,
                        ..Default::default()
                    })
                    .collect(),
                ..Default::default()
            },
            ..Default::default()
        };
        self.insert_server(server);
        Ok(CreateResponse {
            object_uuid: id,
            request_uuid: None,
        })
    }

    async fn update_server(&self, id: &str, request: &ServerUpdateRequest) -> ClientResult<()> {
        self.record(format!("update_server {}", id))?;
        let mut servers = self.servers.lock().unwrap();
        let server = servers.get_mut(id).ok_or_else(|| not_found("server", id))?;
        if let Some(name) = &request.name {
            server.name = name.clone();
        }
        if let Some(labels) = &request.labels {
            server.labels = labels.clone();
        }
        Ok(())
    }

    async fn set_server_power(&self, id: &str, power: bool) -> ClientResult<()> {
        self.record(format!("set_server_power {} {}", id, power))?;
        let mut servers = self.servers.lock().unwrap();
        let server = servers.get_mut(id).ok_or_else(|| not_found("server", id))?;
        server.power = power;
        Ok(())
    }

    async fn delete_server(&self, id: &str) -> ClientResult<()> {
        self.record(format!("delete_server {}", id))?;
        self.servers
            .lock()
            .unwrap()
            .remove(id)
            .map(|_| ())
            .ok_or_else(|| not_found("server", id))
    }

    async fn get_network(&self, id: &str) -> ClientResult<Network> {
        self.record(format!("get_network {}", id))?;
        self.networks
            .lock()
            .unwrap()
            .get(id)
            .cloned()
            .ok_or_else(|| not_found("network", id))
    }

    async fn get_network_list(&self) -> ClientResult<Vec<Network>> {
        self.record("get_network_list".to_string())?;
        let mut networks: Vec<Network> = self.networks.lock().unwrap().values().cloned().collect();
        networks.sort_by(|a, b| a.object_uuid.cmp(&b.object_uuid));
        Ok(networks)
    }

    async fn create_network(&self, request: &NetworkCreateRequest) -> ClientResult<CreateResponse> {
        self.record(format!("create_network {}", request.name))?;
        let id = self.next_id("network");
        let network = Network {
            object_uuid: id.clone(),
            name: request.name.clone(),
            l2security: request.l2security,
            labels: request.labels.clone(),
            dhcp_active: request.dhcp_active,
            dhcp_gateway: request.dhcp_gateway.clone(),
            dhcp_dns: request.dhcp_dns.clone(),
            dhcp_range: request.dhcp_range.clone(),
            dhcp_reserved_subnet: request.dhcp_reserved_subnet.clone(),
            location_uuid: "45ed677b-3702-4b36-be2a-a2eab9827950".to_string(),
            network_type: "network".to_string(),
            status: "active".to_string(),
            ..Default::default()
        };
        self.insert_network(network);
        Ok(CreateResponse {
            object_uuid: id,
            request_uuid: None,
        })
    }

    async fn update_network(&self, id: &str, request: &NetworkUpdateRequest) -> ClientResult<()> {
        self.record(format!("update_network {}", id))?;
        let mut networks = self.networks.lock().unwrap();
        let network = networks.get_mut(id).ok_or_else(|| not_found("network", id))?;
        network.name = request.name.clone();
        network.l2security = request.l2security;
        network.labels = request.labels.clone();
        network.dhcp_active = request.dhcp_active;
        network.dhcp_gateway = request.dhcp_gateway.clone();
        network.dhcp_dns = request.dhcp_dns.clone();
        network.dhcp_range = request.dhcp_range.clone();
        network.dhcp_reserved_subnet = request.dhcp_reserved_subnet.clone();
        Ok(())
    }

    async fn delete_network(&self, id: &str) -> ClientResult<()> {
        self.record(format!("delete_network {}", id))?;
        self.networks
            .lock()
            .unwrap()
            .remove(id)
            .map(|_| ())
            .ok_or_else(|| not_found("network", id))
    }

    async fn get_paas_service(&self, id: &str) -> ClientResult<PaaSService> {
        self.record(format!("get_paas_service {}", id))?;
        self.paas
            .lock()
            .unwrap()
            .get(id)
            .cloned()
            .ok_or_else(|| not_found("paas service", id))
    }

    async fn create_paas_service(
        &self,
        request: &PaaSServiceCreateRequest,
    ) -> ClientResult<CreateResponse> {
        self.record(format!("create_paas_service {}", request.name))?;
        *self.last_paas_create.lock().unwrap() = Some(request.clone());
        let id = self.next_id("paas");
        let category = self
            .templates
            .lock()
            .unwrap()
            .iter()
            .find(|t| t.object_uuid == request.paas_service_template_uuid)
            .map(|t| t.category.clone())
            .unwrap_or_default();
        let service = PaaSService {
            object_uuid: id.clone(),
            name: request.name.clone(),
            credentials: vec![Credential {
                username: "admin".to_string(),
                password: "s3cret".to_string(),
                kind: "postgres".to_string(),
                kubeconfig: String::new(),
            }],
            listen_ports: HashMap::from([(
                "10.0.0.5".to_string(),
                HashMap::from([("postgres".to_string(), 5432)]),
            )]),
            security_zone_uuid: request.paas_security_zone_uuid.clone().unwrap_or_default(),
            network_uuid: request.network_uuid.clone().unwrap_or_default(),
            service_template_uuid: request.paas_service_template_uuid.clone(),
            service_template_category: category,
            status: "active".to_string(),
            parameters: request.parameters.clone(),
            resource_limits: request.resource_limits.clone(),
            labels: request.labels.clone(),
            ..Default::default()
        };
        self.insert_paas(service);
        Ok(CreateResponse {
            object_uuid: id,
            request_uuid: None,
        })
    }

    async fn update_paas_service(
        &self,
        id: &str,
        request: &PaaSServiceUpdateRequest,
    ) -> ClientResult<()> {
        self.record(format!("update_paas_service {}", id))?;
        *self.last_paas_update.lock().unwrap() = Some(request.clone());
        let mut services = self.paas.lock().unwrap();
        let service = services
            .get_mut(id)
            .ok_or_else(|| not_found("paas service", id))?;
        service.name = request.name.clone();
        if let Some(labels) = &request.labels {
            service.labels = labels.clone();
        }
        if let Some(network_uuid) = &request.network_uuid {
            service.network_uuid = network_uuid.clone();
        }
        if let Some(template) = &request.service_template_uuid {
            service.service_template_uuid = template.clone();
        }
        if let Some(parameters) = &request.parameters {
            service.parameters = parameters.clone();
        }
        if let Some(limits) = &request.resource_limits {
            service.resource_limits = limits.clone();
        }
        Ok(())
    }

    async fn delete_paas_service(&self, id: &str) -> ClientResult<()> {
        self.record(format!("delete_paas_service {}", id))?;
        self.paas
            .lock()
            .unwrap()
            .remove(id)
            .map(|_| ())
            .ok_or_else(|| not_found("paas service", id))
    }

    async fn get_paas_template_list(&self) -> ClientResult<Vec<PaaSTemplate>> {
        self.record("get_paas_template_list".to_string())?;
        Ok(self.templates.lock().unwrap().clone())
    }
}
