//! Request bodies and their presence checks.

use std::fmt;

use serde::Deserialize;

use fleetgate_core::HardwareInfo;
use fleetgate_orchestrator::JoinRequest;

/// Names of required fields that were absent or blank.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MissingFields(pub Vec<&'static str>);

impl fmt::Display for MissingFields {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "missing required fields: {}", self.0.join(", "))
    }
}

/// Collects required fields, remembering which were missing.
#[derive(Default)]
struct Required(Vec<&'static str>);

impl Required {
    fn take(&mut self, name: &'static str, value: Option<String>) -> String {
        match value {
            Some(v) if !v.trim().is_empty() => v,
            _ => {
                self.0.push(name);
                String::new()
            }
        }
    }

    fn check_hardware(&mut self, hardware: &HardwareInfo) {
        if hardware.name.trim().is_empty() {
            self.0.push("hardwareInfo.name");
        }
        if hardware.ip.trim().is_empty() {
            self.0.push("hardwareInfo.ip");
        }
    }

    fn finish(self) -> Result<(), MissingFields> {
        if self.0.is_empty() { Ok(()) } else { Err(MissingFields(self.0)) }
    }
}

/// `POST /join`
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct JoinBody {
    pub token: Option<String>,
    #[serde(alias = "hash", alias = "ca_cert_hash")]
    pub ca_cert_hash: Option<String>,
    pub username: Option<String>,
    #[serde(alias = "user_password")]
    pub password: Option<String>,
    #[serde(alias = "hardware_info")]
    pub hardware_info: Option<HardwareInfo>,
}

impl JoinBody {
    pub fn into_request(self) -> Result<JoinRequest, MissingFields> {
        let mut required = Required::default();
        let token = required.take("token", self.token);
        let ca_cert_hash = required.take("caCertHash", self.ca_cert_hash);
        let username = required.take("username", self.username);
        let password = required.take("password", self.password);
        if let Some(hardware) = &self.hardware_info {
            required.check_hardware(hardware);
        }
        required.finish()?;
        Ok(JoinRequest {
            token,
            ca_cert_hash,
            username,
            password,
            hardware: self.hardware_info,
        })
    }
}

/// `POST /join-complete`
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct JoinCompleteBody {
    pub username: Option<String>,
    #[serde(alias = "hardware_info")]
    pub hardware_info: Option<HardwareInfo>,
}

impl JoinCompleteBody {
    pub fn into_parts(self) -> Result<(String, HardwareInfo), MissingFields> {
        let mut required = Required::default();
        let username = required.take("username", self.username);
        match self.hardware_info {
            Some(hardware) => {
                required.check_hardware(&hardware);
                required.finish()?;
                Ok((username, hardware))
            }
            None => {
                required.0.push("hardwareInfo");
                Err(MissingFields(required.0))
            }
        }
    }
}

/// `POST /leave`
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct LeaveBody {
    #[serde(alias = "node_name")]
    pub node_name: Option<String>,
    pub username: Option<String>,
    #[serde(alias = "user_password")]
    pub password: Option<String>,
}

/// Validated leave fields.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LeaveParams {
    pub node_name: String,
    pub username: String,
    pub password: String,
}

impl LeaveBody {
    pub fn into_params(self) -> Result<LeaveParams, MissingFields> {
        let mut required = Required::default();
        let node_name = required.take("nodeName", self.node_name);
        let username = required.take("username", self.username);
        let password = required.take("password", self.password);
        required.finish()?;
        Ok(LeaveParams {
            node_name,
            username,
            password,
        })
    }
}
