//! Network access for the storage account holding the datasets.
//!
//! Two idempotent steps: make sure the subnet has a storage service
//! endpoint, then make sure the storage account's network rule set allows
//! that subnet. Each step writes only when something was missing, so
//! repeated runs are safe.

use anyhow::Result;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use tracing::info;

pub const STORAGE_SERVICE: &str = "Microsoft.Storage";
pub const ALLOW: &str = "Allow";

/// Identifies the subnet and storage account to link.
#[derive(Debug, Clone)]
pub struct AccessTarget {
    pub subscription_id: String,
    pub resource_group: String,
    pub storage_account: String,
    pub vnet: String,
    pub subnet: String,
    pub location: String,
}

impl AccessTarget {
    pub fn subnet_id(&self) -> String {
        subnet_resource_id(&self.subscription_id, &self.resource_group, &self.vnet, &self.subnet)
    }
}

pub fn subnet_resource_id(subscription_id: &str, resource_group: &str, vnet: &str, subnet: &str) -> String {
    format!(
        "/subscriptions/{}/resourceGroups/{}/providers/Microsoft.Network/virtualNetworks/{}/subnets/{}",
        subscription_id, resource_group, vnet, subnet
    )
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ServiceEndpoint {
    pub service: String,
    #[serde(default)]
    pub locations: Vec<String>,
    /// Fields the management API returns that we pass back untouched.
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl ServiceEndpoint {
    pub fn new(service: &str, location: &str) -> Self {
        Self {
            service: service.to_string(),
            locations: vec![location.to_string()],
            extra: Map::new(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VirtualNetworkRule {
    /// Resource id of the allowed subnet.
    pub id: String,
    #[serde(default = "default_action")]
    pub action: String,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

fn default_action() -> String {
    ALLOW.to_string()
}

impl VirtualNetworkRule {
    pub fn allow(subnet_id: &str) -> Self {
        Self {
            id: subnet_id.to_string(),
            action: default_action(),
            extra: Map::new(),
        }
    }
}

/// Storage account network ACLs. Only the virtual-network rules are
/// interpreted; everything else round-trips through `extra`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NetworkRuleSet {
    #[serde(default)]
    pub virtual_network_rules: Vec<VirtualNetworkRule>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// A subnet as returned by the management API.
#[derive(Debug, Clone, PartialEq)]
pub struct Subnet {
    pub id: String,
    pub service_endpoints: Vec<ServiceEndpoint>,
    /// Full resource document, needed because subnet updates replace the
    /// whole resource.
    pub document: Value,
}

/// Adds `service` for `location` unless an endpoint for that service exists.
/// Returns `true` if the list changed.
pub fn ensure_service_endpoint(endpoints: &mut Vec<ServiceEndpoint>, service: &str, location: &str) -> bool {
    if endpoints.iter().any(|e| e.service.eq_ignore_ascii_case(service)) {
        return false;
    }
    endpoints.push(ServiceEndpoint::new(service, location));
    true
}

/// Appends an `Allow` rule for `subnet_id` unless one already references it.
/// Resource ids compare case-insensitively. Returns `true` if the set changed.
pub fn ensure_virtual_network_rule(rules: &mut NetworkRuleSet, subnet_id: &str) -> bool {
    if rules
        .virtual_network_rules
        .iter()
        .any(|r| r.id.eq_ignore_ascii_case(subnet_id))
    {
        return false;
    }
    rules.virtual_network_rules.push(VirtualNetworkRule::allow(subnet_id));
    true
}

/// Management operations needed to link a subnet to a storage account.
#[async_trait::async_trait]
pub trait NetworkApi: Send + Sync {
    async fn get_subnet(&self, target: &AccessTarget) -> Result<Subnet>;

    /// Writes the subnet back; returns once the update has completed.
    async fn update_subnet(&self, target: &AccessTarget, subnet: &Subnet) -> Result<()>;

    /// `None` when the account has no network rule set yet.
    async fn get_network_rules(&self, target: &AccessTarget) -> Result<Option<NetworkRuleSet>>;

    async fn update_network_rules(&self, target: &AccessTarget, rules: &NetworkRuleSet) -> Result<()>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AccessOutcome {
    pub endpoint_added: bool,
    pub rule_added: bool,
}

#[tracing::instrument(skip(api, target), fields(vnet = %target.vnet, subnet = %target.subnet, account = %target.storage_account))]
pub async fn configure_storage_access(api: &dyn NetworkApi, target: &AccessTarget) -> Result<AccessOutcome> {
    let mut subnet = api.get_subnet(target).await?;

    let endpoint_added = ensure_service_endpoint(&mut subnet.service_endpoints, STORAGE_SERVICE, &target.location);
    if endpoint_added {
        api.update_subnet(target, &subnet).await?;
        info!(service = STORAGE_SERVICE, "Service endpoint added to subnet");
    } else {
        info!(service = STORAGE_SERVICE, "Service endpoint already present on subnet");
    }

    let subnet_id = if subnet.id.is_empty() {
        target.subnet_id()
    } else {
        subnet.id.clone()
    };

    let mut rules = api.get_network_rules(target).await?.unwrap_or_default();
    let rule_added = ensure_virtual_network_rule(&mut rules, &subnet_id);
    if rule_added {
        api.update_network_rules(target, &rules).await?;
        info!(subnet_id = %subnet_id, "Virtual network rule added to storage account");
    } else {
        info!(subnet_id = %subnet_id, "Virtual network rule already present on storage account");
    }

    Ok(AccessOutcome {
        endpoint_added,
        rule_added,
    })
}
