//! The annotation ledger.
//!
//! Every Neutron resource the controller provisions for a Kubernetes object
//! is recorded as a JSON snapshot under a well-known annotation key on that
//! object. The annotations are the only persisted record of what was
//! provisioned: deletion reads ids from here, and creation consults this
//! ledger before anything else.
//!
//! Writes go out as a merge-patch whose body contains nothing but the
//! annotations sub-object, so concurrent edits to the rest of the object are
//! never clobbered and unrelated annotations survive untouched.

use crate::error::ControllerError;
use k8s_openapi::apimachinery::pkg::apis::meta::v1::ObjectMeta;
use kube::Client;
use kube::api::{Api, ApiResource, DynamicObject, Patch, PatchParams};
use serde::Serialize;
use serde::de::DeserializeOwned;
use std::collections::BTreeMap;
use tracing::debug;

/// Ledger key holding the network provisioned for a namespace.
pub const NETWORK_ANNOTATION: &str = "neutron.microscaler.io/network";
/// Ledger key holding the subnet provisioned for a namespace (also recorded
/// on pods for port binding).
pub const SUBNET_ANNOTATION: &str = "neutron.microscaler.io/subnet";
/// Ledger key holding the port provisioned for a pod.
pub const PORT_ANNOTATION: &str = "neutron.microscaler.io/port";
/// Ledger key holding the load-balancer pool provisioned for a service.
pub const POOL_ANNOTATION: &str = "neutron.microscaler.io/pool";
/// Ledger key holding the virtual IP provisioned for a service.
pub const VIP_ANNOTATION: &str = "neutron.microscaler.io/vip";

/// Pod label overriding the default security group for its port.
pub const SECURITY_GROUP_LABEL: &str = "neutron.microscaler.io/security-group";

/// device_owner tag stamped on every controller-managed port.
pub const DEVICE_OWNER: &str = "microscaler:container";

/// Reads one ledger entry from an object's annotations.
///
/// An absent key is `Ok(None)` — it legitimately means nothing was
/// provisioned. A present but unparseable value is an error; silently
/// treating it as absent could lead to double provisioning.
pub fn ledger_entry<T: DeserializeOwned>(
    metadata: &ObjectMeta,
    key: &str,
) -> Result<Option<T>, ControllerError> {
    let Some(annotations) = &metadata.annotations else {
        return Ok(None);
    };
    let Some(raw) = annotations.get(key) else {
        return Ok(None);
    };
    serde_json::from_str(raw).map(Some).map_err(|e| {
        ControllerError::MalformedEvent(format!("annotation {} is not valid JSON: {}", key, e))
    })
}

/// Serializes a resource snapshot for storage in the ledger.
pub fn ledger_snapshot<T: Serialize>(value: &T) -> Result<String, ControllerError> {
    Ok(serde_json::to_string(value)?)
}

/// Merge-patches the given annotations onto an object.
///
/// The body carries only `metadata.annotations`; merge-patch map semantics
/// leave every other field and every unrelated annotation alone.
pub async fn patch_annotations(
    client: &Client,
    resource: &ApiResource,
    namespace: Option<&str>,
    name: &str,
    annotations: &BTreeMap<String, String>,
) -> Result<(), ControllerError> {
    let api: Api<DynamicObject> = match namespace {
        Some(ns) => Api::namespaced_with(client.clone(), ns, resource),
        None => Api::all_with(client.clone(), resource),
    };
    let patch = serde_json::json!({ "metadata": { "annotations": annotations } });
    api.patch(name, &PatchParams::default(), &Patch::Merge(&patch)).await?;
    debug!("Patched annotations on {}", name);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use neutron_client::Network;

    fn meta_with_annotation(key: &str, value: &str) -> ObjectMeta {
        ObjectMeta {
            name: Some("team-a".to_string()),
            annotations: Some(BTreeMap::from([(key.to_string(), value.to_string())])),
            ..Default::default()
        }
    }

    #[test]
    fn test_ledger_entry_absent_key_is_none() {
        let meta = ObjectMeta { name: Some("team-a".to_string()), ..Default::default() };
        let entry: Option<Network> = ledger_entry(&meta, NETWORK_ANNOTATION).unwrap();
        assert!(entry.is_none());

        let other = meta_with_annotation("unrelated/key", "true");
        let entry: Option<Network> = ledger_entry(&other, NETWORK_ANNOTATION).unwrap();
        assert!(entry.is_none());
    }

    #[test]
    fn test_ledger_entry_round_trips_snapshot() {
        let network = Network {
            id: "net-1".to_string(),
            name: "team-a".to_string(),
            status: None,
            admin_state_up: true,
            subnets: Vec::new(),
        };
        let snapshot = ledger_snapshot(&network).unwrap();
        let meta = meta_with_annotation(NETWORK_ANNOTATION, &snapshot);

        let entry: Option<Network> = ledger_entry(&meta, NETWORK_ANNOTATION).unwrap();
        assert_eq!(entry.unwrap().id, "net-1");
    }

    #[test]
    fn test_ledger_entry_rejects_garbage() {
        let meta = meta_with_annotation(NETWORK_ANNOTATION, "not json");
        let result: Result<Option<Network>, _> = ledger_entry(&meta, NETWORK_ANNOTATION);
        assert!(matches!(result, Err(ControllerError::MalformedEvent(_))));
    }
}
