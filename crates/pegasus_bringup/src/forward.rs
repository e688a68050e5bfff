//! MAVLink forwarding endpoint derived from the vehicle ID
//!
//! Every vehicle forwards its MAVLink stream to a ground station port of its
//! own, so several drones can be watched side by side (e.g. in QGroundControl).

use serde::{Deserialize, Serialize};
use std::fmt;

/// Base port; vehicle N forwards to `DEFAULT_BASE_PORT + N`
pub const DEFAULT_BASE_PORT: u16 = 14559;

/// Ground station host receiving the forwarded stream
pub const DEFAULT_FORWARD_HOST: &str = "192.168.1.69";

/// How the forwarding endpoint is built
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ForwardSpec {
    #[serde(default = "default_scheme")]
    pub scheme: String,

    #[serde(default = "default_host")]
    pub host: String,

    #[serde(default = "default_base_port")]
    pub base_port: u16,
}

fn default_scheme() -> String {
    "udp".to_string()
}

fn default_host() -> String {
    DEFAULT_FORWARD_HOST.to_string()
}

fn default_base_port() -> u16 {
    DEFAULT_BASE_PORT
}

impl Default for ForwardSpec {
    fn default() -> Self {
        Self {
            scheme: default_scheme(),
            host: default_host(),
            base_port: DEFAULT_BASE_PORT,
        }
    }
}

impl ForwardSpec {
    /// Forwarding port for a vehicle
    pub fn port_for(&self, vehicle_id: u16) -> Result<u16, ForwardError> {
        self.base_port
            .checked_add(vehicle_id)
            .ok_or(ForwardError::PortOutOfRange {
                vehicle_id,
                base_port: self.base_port,
            })
    }

    /// Full forwarding endpoint for a vehicle
    pub fn endpoint_for(&self, vehicle_id: u16) -> Result<ForwardEndpoint, ForwardError> {
        Ok(ForwardEndpoint {
            scheme: self.scheme.clone(),
            host: self.host.clone(),
            port: self.port_for(vehicle_id)?,
        })
    }
}

/// A resolved forwarding endpoint
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ForwardEndpoint {
    pub scheme: String,
    pub host: String,
    pub port: u16,
}

impl ForwardEndpoint {
    /// Address string, e.g. `udp://192.168.1.69:14560`
    pub fn address(&self) -> String {
        format!("{}://{}:{}", self.scheme, self.host, self.port)
    }

    /// Bracketed list form expected by the MAVLink interface
    pub fn list(&self) -> String {
        format!("[{}]", self.address())
    }
}

impl fmt::Display for ForwardEndpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.address())
    }
}

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum ForwardError {
    #[error("Vehicle ID {vehicle_id} puts the forward port past 65535 (base port {base_port})")]
    PortOutOfRange { vehicle_id: u16, base_port: u16 },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_port_is_base_plus_id() {
        let spec = ForwardSpec::default();
        assert_eq!(spec.port_for(0).unwrap(), 14559);
        assert_eq!(spec.port_for(1).unwrap(), 14560);
        assert_eq!(spec.port_for(12).unwrap(), 14571);
    }

    #[test]
    fn test_endpoint_strings() {
        let endpoint = ForwardSpec::default().endpoint_for(1).unwrap();
        assert_eq!(endpoint.address(), "udp://192.168.1.69:14560");
        assert_eq!(endpoint.list(), "[udp://192.168.1.69:14560]");
        assert_eq!(endpoint.to_string(), endpoint.address());
    }

    #[test]
    fn test_custom_host() {
        let spec = ForwardSpec {
            host: "127.0.0.1".to_string(),
            base_port: 15000,
            ..Default::default()
        };
        assert_eq!(spec.endpoint_for(3).unwrap().address(), "udp://127.0.0.1:15003");
    }

    #[test]
    fn test_port_overflow() {
        let spec = ForwardSpec::default();
        assert_eq!(spec.port_for(65535 - 14559).unwrap(), 65535);
        assert_eq!(
            spec.port_for(65535 - 14558),
            Err(ForwardError::PortOutOfRange {
                vehicle_id: 50977,
                base_port: 14559
            })
        );
    }
}
