//! Conversions between management API resource documents and the
//! network access types.

use anyhow::{Context, Result, anyhow};
use rating_report::network::{NetworkRuleSet, ServiceEndpoint, Subnet};
use serde_json::{Value, json};

pub fn subnet_from_document(document: Value) -> Result<Subnet> {
    let id = document["id"].as_str().unwrap_or_default().to_string();

    let service_endpoints = match &document["properties"]["serviceEndpoints"] {
        Value::Null => Vec::new(),
        endpoints => serde_json::from_value::<Vec<ServiceEndpoint>>(endpoints.clone())
            .context("subnet has malformed serviceEndpoints")?,
    };

    Ok(Subnet {
        id,
        service_endpoints,
        document,
    })
}

/// The full subnet document with its service endpoints replaced.
pub fn subnet_update_body(subnet: &Subnet) -> Result<Value> {
    let mut body = subnet.document.clone();
    let properties = body
        .as_object_mut()
        .ok_or_else(|| anyhow!("subnet document is not a JSON object"))?
        .entry("properties")
        .or_insert_with(|| json!({}));

    properties
        .as_object_mut()
        .ok_or_else(|| anyhow!("subnet properties are not a JSON object"))?
        .insert(
            "serviceEndpoints".to_string(),
            serde_json::to_value(&subnet.service_endpoints)?,
        );

    Ok(body)
}

pub fn rules_from_account(account: &Value) -> Result<Option<NetworkRuleSet>> {
    match &account["properties"]["networkAcls"] {
        Value::Null => Ok(None),
        acls => Ok(Some(
            serde_json::from_value(acls.clone()).context("storage account has malformed networkAcls")?,
        )),
    }
}

pub fn rules_patch_body(rules: &NetworkRuleSet) -> Result<Value> {
    Ok(json!({ "properties": { "networkAcls": serde_json::to_value(rules)? } }))
}
