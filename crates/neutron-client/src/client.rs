//! Neutron API client
//!
//! Implements the Neutron v2.0 REST API client for the resources the
//! controller manages: networks, subnets, ports, routers and their
//! interfaces, security groups, subnet pools, and load-balancer pools/VIPs.
//!
//! Every request/response body uses Neutron's envelope convention: the
//! resource is wrapped under a singular key for single-resource operations
//! (`{"network": {...}}`) and a plural key for list operations
//! (`{"networks": [...]}`).

use crate::error::NeutronError;
use crate::models::*;
use crate::neutron_api::NeutronApi;
use reqwest::blocking::Client;
use serde::Serialize;
use serde::de::DeserializeOwned;
use std::time::Duration;
use tracing::debug;

/// Neutron API client
pub struct NeutronClient {
    client: Client,
    base_url: String,
    token: String,
}

impl NeutronClient {
    /// Create a new Neutron client
    ///
    /// # Arguments
    /// * `base_url` - Neutron base URL (e.g., "http://neutron:9696")
    /// * `token` - Keystone token for authentication
    pub fn new(base_url: String, token: String) -> Result<Self, NeutronError> {
        let client = Client::builder()
            .timeout(Duration::from_secs(30))
            .build()
            .map_err(NeutronError::Http)?;

        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            token,
        })
    }

    fn url(&self, path: &str, filters: &[(&str, &str)]) -> String {
        let mut url = format!("{}/v2.0{}", self.base_url, path);
        if !filters.is_empty() {
            let query: Vec<String> = filters
                .iter()
                .map(|(k, v)| format!("{}={}", k, urlencoding::encode(v)))
                .collect();
            url.push('?');
            url.push_str(&query.join("&"));
        }
        url
    }

    /// Map a non-2xx response to the error taxonomy.
    fn check(
        &self,
        response: reqwest::blocking::Response,
    ) -> Result<reqwest::blocking::Response, NeutronError> {
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }
        let message = response.text().unwrap_or_default();
        match status.as_u16() {
            404 => Err(NeutronError::NotFound(message)),
            409 => Err(NeutronError::Conflict(message)),
            code => Err(NeutronError::Api { status: code, message }),
        }
    }

    fn unwrap_envelope<T: DeserializeOwned>(
        &self,
        body: serde_json::Value,
        key: &str,
    ) -> Result<T, NeutronError> {
        let inner = body.get(key).cloned().ok_or_else(|| {
            NeutronError::InvalidRequest(format!("response body missing '{}' envelope", key))
        })?;
        Ok(serde_json::from_value(inner)?)
    }

    fn get_list<T: DeserializeOwned>(
        &self,
        path: &str,
        key: &str,
        filters: &[(&str, &str)],
    ) -> Result<Vec<T>, NeutronError> {
        let url = self.url(path, filters);
        debug!("GET {}", url);
        let response = self
            .client
            .get(&url)
            .header("X-Auth-Token", &self.token)
            .header("Accept", "application/json")
            .send()?;
        let body: serde_json::Value = self.check(response)?.json()?;
        self.unwrap_envelope(body, key)
    }

    fn post<T: DeserializeOwned, R: Serialize>(
        &self,
        path: &str,
        key: &str,
        request: &R,
    ) -> Result<T, NeutronError> {
        let url = self.url(path, &[]);
        debug!("POST {}", url);
        let mut envelope = serde_json::Map::new();
        envelope.insert(key.to_string(), serde_json::to_value(request)?);
        let response = self
            .client
            .post(&url)
            .header("X-Auth-Token", &self.token)
            .header("Accept", "application/json")
            .json(&serde_json::Value::Object(envelope))
            .send()?;
        let body: serde_json::Value = self.check(response)?.json()?;
        self.unwrap_envelope(body, key)
    }

    fn put<T: DeserializeOwned>(
        &self,
        path: &str,
        body: serde_json::Value,
    ) -> Result<T, NeutronError> {
        let url = self.url(path, &[]);
        debug!("PUT {}", url);
        let response = self
            .client
            .put(&url)
            .header("X-Auth-Token", &self.token)
            .header("Accept", "application/json")
            .json(&body)
            .send()?;
        let body: serde_json::Value = self.check(response)?.json()?;
        Ok(serde_json::from_value(body)?)
    }

    fn delete(&self, path: &str) -> Result<(), NeutronError> {
        let url = self.url(path, &[]);
        debug!("DELETE {}", url);
        let response = self
            .client
            .delete(&url)
            .header("X-Auth-Token", &self.token)
            .send()?;
        self.check(response)?;
        Ok(())
    }
}

impl NeutronApi for NeutronClient {
    fn base_url(&self) -> &str {
        &self.base_url
    }

    fn list_networks(&self, filters: &[(&str, &str)]) -> Result<Vec<Network>, NeutronError> {
        self.get_list("/networks", "networks", filters)
    }

    fn create_network(&self, request: &NetworkCreate) -> Result<Network, NeutronError> {
        self.post("/networks", "network", request)
    }

    fn delete_network(&self, id: &str) -> Result<(), NeutronError> {
        self.delete(&format!("/networks/{}", id))
    }

    fn list_subnets(&self, filters: &[(&str, &str)]) -> Result<Vec<Subnet>, NeutronError> {
        self.get_list("/subnets", "subnets", filters)
    }

    fn create_subnet(&self, request: &SubnetCreate) -> Result<Subnet, NeutronError> {
        self.post("/subnets", "subnet", request)
    }

    fn list_ports(&self, filters: &[(&str, &str)]) -> Result<Vec<Port>, NeutronError> {
        self.get_list("/ports", "ports", filters)
    }

    fn create_port(&self, request: &PortCreate) -> Result<Port, NeutronError> {
        self.post("/ports", "port", request)
    }

    fn update_port(&self, id: &str, request: &PortUpdate) -> Result<Port, NeutronError> {
        let body: serde_json::Value =
            self.put(&format!("/ports/{}", id), serde_json::json!({ "port": request }))?;
        self.unwrap_envelope(body, "port")
    }

    fn delete_port(&self, id: &str) -> Result<(), NeutronError> {
        self.delete(&format!("/ports/{}", id))
    }

    fn list_routers(&self, filters: &[(&str, &str)]) -> Result<Vec<Router>, NeutronError> {
        self.get_list("/routers", "routers", filters)
    }

    fn create_router(&self, request: &RouterCreate) -> Result<Router, NeutronError> {
        self.post("/routers", "router", request)
    }

    fn add_router_interface(
        &self,
        router_id: &str,
        subnet_id: &str,
    ) -> Result<RouterInterface, NeutronError> {
        self.put(
            &format!("/routers/{}/add_router_interface", router_id),
            serde_json::json!({ "subnet_id": subnet_id }),
        )
    }

    fn remove_router_interface(
        &self,
        router_id: &str,
        subnet_id: &str,
    ) -> Result<(), NeutronError> {
        let _: serde_json::Value = self.put(
            &format!("/routers/{}/remove_router_interface", router_id),
            serde_json::json!({ "subnet_id": subnet_id }),
        )?;
        Ok(())
    }

    fn list_security_groups(
        &self,
        filters: &[(&str, &str)],
    ) -> Result<Vec<SecurityGroup>, NeutronError> {
        self.get_list("/security-groups", "security_groups", filters)
    }

    fn create_security_group(
        &self,
        request: &SecurityGroupCreate,
    ) -> Result<SecurityGroup, NeutronError> {
        self.post("/security-groups", "security_group", request)
    }

    fn create_security_group_rule(
        &self,
        request: &SecurityGroupRuleCreate,
    ) -> Result<SecurityGroupRule, NeutronError> {
        self.post("/security-group-rules", "security_group_rule", request)
    }

    fn list_subnet_pools(&self, filters: &[(&str, &str)]) -> Result<Vec<SubnetPool>, NeutronError> {
        self.get_list("/subnetpools", "subnetpools", filters)
    }

    fn create_subnet_pool(&self, request: &SubnetPoolCreate) -> Result<SubnetPool, NeutronError> {
        self.post("/subnetpools", "subnetpool", request)
    }

    fn list_pools(&self, filters: &[(&str, &str)]) -> Result<Vec<LoadBalancerPool>, NeutronError> {
        self.get_list("/lb/pools", "pools", filters)
    }

    fn create_pool(&self, request: &PoolCreate) -> Result<LoadBalancerPool, NeutronError> {
        self.post("/lb/pools", "pool", request)
    }

    fn delete_pool(&self, id: &str) -> Result<(), NeutronError> {
        self.delete(&format!("/lb/pools/{}", id))
    }

    fn list_vips(&self, filters: &[(&str, &str)]) -> Result<Vec<VirtualIp>, NeutronError> {
        self.get_list("/lb/vips", "vips", filters)
    }

    fn create_vip(&self, request: &VipCreate) -> Result<VirtualIp, NeutronError> {
        self.post("/lb/vips", "vip", request)
    }

    fn delete_vip(&self, id: &str) -> Result<(), NeutronError> {
        self.delete(&format!("/lb/vips/{}", id))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_url_encodes_filters() {
        let client =
            NeutronClient::new("http://neutron:9696/".to_string(), "token".to_string()).unwrap();
        let url = client.url("/networks", &[("name", "team a"), ("status", "ACTIVE")]);
        assert_eq!(url, "http://neutron:9696/v2.0/networks?name=team%20a&status=ACTIVE");
    }

    #[test]
    fn test_base_url_trailing_slash_is_trimmed() {
        let client =
            NeutronClient::new("http://neutron:9696///".to_string(), "token".to_string()).unwrap();
        assert_eq!(client.base_url(), "http://neutron:9696");
    }
}
