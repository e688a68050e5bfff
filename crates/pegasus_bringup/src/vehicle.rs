//! Vehicle ID resolution from raw launch arguments
//!
//! The vehicle ID feeds the default of other arguments (the MAVLink forward
//! port), so it has to be known before any declared argument is evaluated.
//! It is therefore read straight from the raw `key:=value` tokens.

use serde::{Deserialize, Serialize};

/// Which declared argument carries the vehicle ID, and its fallback
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VehicleSpec {
    /// Name of the launch argument holding the ID
    #[serde(default = "default_id_arg")]
    pub id_arg: String,

    /// ID used when no override is given.
    /// When absent, the declared default of `id_arg` is used.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub default_id: Option<u16>,
}

/// Default vehicle ID when none is passed on the command line
pub const DEFAULT_VEHICLE_ID: u16 = 1;

fn default_id_arg() -> String {
    "vehicle_id".to_string()
}

impl Default for VehicleSpec {
    fn default() -> Self {
        Self {
            id_arg: default_id_arg(),
            default_id: None,
        }
    }
}

/// Resolve the vehicle ID from raw `key:=value` tokens.
///
/// Later tokens override earlier ones. Tokens for other arguments are ignored.
/// `default_id` is returned when no token names `id_arg`.
pub fn resolve_vehicle_id(
    raw: &[String],
    id_arg: &str,
    default_id: u16,
) -> Result<u16, VehicleIdError> {
    let prefix = format!("{}:=", id_arg);
    let mut vehicle_id = default_id;

    for token in raw {
        if let Some(value) = token.strip_prefix(&prefix) {
            vehicle_id = parse_vehicle_id(value)?;
        }
    }

    Ok(vehicle_id)
}

/// Parse a single vehicle ID value
pub fn parse_vehicle_id(value: &str) -> Result<u16, VehicleIdError> {
    value
        .trim()
        .parse::<u16>()
        .map_err(|_| VehicleIdError::Invalid {
            value: value.to_string(),
        })
}

/// Errors that can occur when resolving the vehicle ID
#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum VehicleIdError {
    #[error("Invalid vehicle ID '{value}': expected an integer between 0 and 65535")]
    Invalid { value: String },
}
