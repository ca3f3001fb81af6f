//! Resolved configuration: concrete values for external references
//!
//! Steps name credentials, device groups, templates and variables by id.
//! The caller resolves those ids before compiling and hands the compiler a
//! [`ResourceResolver`]. [`ResolvedConfig`] is the file-loadable
//! implementation; anything else (a secrets vault, an inventory service)
//! can implement the trait directly.

use std::collections::BTreeMap;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::constants::steps;
use crate::error::Result;

/// Login details and connection tuning for one device credential
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Credential {
    pub username: String,
    pub password: String,
    /// Driver name understood by the runner (e.g. `cisco_ios`)
    pub device_type: String,
    #[serde(default = "default_port")]
    pub port: u16,
    /// Enable secret, when the platform has one
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub secret: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub conn_timeout: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub global_delay_factor: Option<f64>,
}

fn default_port() -> u16 {
    steps::DEVICE_PORT
}

impl Credential {
    pub fn new(
        username: impl Into<String>,
        password: impl Into<String>,
        device_type: impl Into<String>,
    ) -> Self {
        Self {
            username: username.into(),
            password: password.into(),
            device_type: device_type.into(),
            port: default_port(),
            secret: None,
            conn_timeout: None,
            global_delay_factor: None,
        }
    }
}

/// A named set of device hosts
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DeviceGroup {
    pub hosts: Vec<String>,
}

/// Lookup for the external values a workflow references
pub trait ResourceResolver {
    fn credential(&self, id: &str) -> Option<&Credential>;

    fn device_group(&self, id: &str) -> Option<&DeviceGroup>;

    /// Literal command text of a configuration template
    fn template(&self, id: &str) -> Option<&str>;

    /// Value substituted for `{{name}}` tokens in command lines
    fn variable(&self, name: &str) -> Option<&str>;
}

/// Resolved values, keyed by reference id
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResolvedConfig {
    #[serde(default)]
    pub credentials: BTreeMap<String, Credential>,
    #[serde(default)]
    pub device_groups: BTreeMap<String, DeviceGroup>,
    #[serde(default)]
    pub templates: BTreeMap<String, String>,
    #[serde(default)]
    pub variables: BTreeMap<String, String>,
}

impl ResolvedConfig {
    pub fn new() -> Self {
        Self::default()
    }

    /// Load resolved values from a JSON file
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path)?;
        let config: Self = serde_json::from_str(&content)?;
        log::info!(
            "Loaded resolved config from {:?}: {} credential(s), {} device group(s), {} template(s), {} variable(s)",
            path,
            config.credentials.len(),
            config.device_groups.len(),
            config.templates.len(),
            config.variables.len()
        );
        Ok(config)
    }

    pub fn with_credential(mut self, id: impl Into<String>, credential: Credential) -> Self {
        self.credentials.insert(id.into(), credential);
        self
    }

    pub fn with_device_group<I, S>(mut self, id: impl Into<String>, hosts: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let hosts = hosts.into_iter().map(Into::into).collect();
        self.device_groups.insert(id.into(), DeviceGroup { hosts });
        self
    }

    pub fn with_template(mut self, id: impl Into<String>, text: impl Into<String>) -> Self {
        self.templates.insert(id.into(), text.into());
        self
    }

    pub fn with_variable(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.variables.insert(name.into(), value.into());
        self
    }
}

impl ResourceResolver for ResolvedConfig {
    fn credential(&self, id: &str) -> Option<&Credential> {
        self.credentials.get(id)
    }

    fn device_group(&self, id: &str) -> Option<&DeviceGroup> {
        self.device_groups.get(id)
    }

    fn template(&self, id: &str) -> Option<&str> {
        self.templates.get(id).map(String::as_str)
    }

    fn variable(&self, name: &str) -> Option<&str> {
        self.variables.get(name).map(String::as_str)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_lookup() {
        let config = ResolvedConfig::new()
            .with_credential("lab", Credential::new("admin", "pw", "cisco_ios"))
            .with_device_group("core", ["10.0.0.1", "10.0.0.2"])
            .with_template("base", "hostname r1")
            .with_variable("vlan", "42");

        assert_eq!(config.credential("lab").unwrap().port, 22);
        assert_eq!(config.device_group("core").unwrap().hosts.len(), 2);
        assert_eq!(config.template("base"), Some("hostname r1"));
        assert_eq!(config.variable("vlan"), Some("42"));
        assert!(config.credential("missing").is_none());
    }

    #[test]
    fn test_from_file_camel_case() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("resolved.json");
        std::fs::write(
            &path,
            r#"{
                "credentials": {
                    "lab": {"username": "admin", "password": "pw", "deviceType": "juniper_junos", "port": 830}
                },
                "deviceGroups": {"edge": {"hosts": ["r1"]}}
            }"#,
        )
        .unwrap();

        let config = ResolvedConfig::from_file(&path).unwrap();
        let lab = config.credential("lab").unwrap();
        assert_eq!(lab.device_type, "juniper_junos");
        assert_eq!(lab.port, 830);
        assert_eq!(config.device_group("edge").unwrap().hosts, vec!["r1"]);
        assert!(config.templates.is_empty());
    }

    #[test]
    fn test_from_file_missing() {
        assert!(ResolvedConfig::from_file("/nonexistent/resolved.json").is_err());
    }
}
