//! Bringup profile YAML schema definitions

use crate::forward::ForwardSpec;
use crate::vehicle::{self, VehicleIdError, VehicleSpec, DEFAULT_VEHICLE_ID};
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Root bringup profile: declared arguments and included sub-launches
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BringupFile {
    /// Profile format version
    #[serde(default = "default_version")]
    pub version: String,

    /// Which argument carries the vehicle ID
    #[serde(default)]
    pub vehicle: VehicleSpec,

    /// MAVLink forwarding endpoint derivation
    #[serde(default)]
    pub forward: ForwardSpec,

    /// Declared launch arguments, in declaration order
    #[serde(default)]
    pub args: IndexMap<String, ArgDefinition>,

    /// Environment variables (applied to all includes)
    #[serde(default)]
    pub env: HashMap<String, String>,

    /// Included launch descriptions (ordered map for deterministic launch order)
    pub includes: IndexMap<String, IncludeConfig>,
}

fn default_version() -> String {
    "1.0".to_string()
}

/// Launch argument declaration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ArgDefinition {
    /// Default value, may contain substitutions
    pub default: ArgValue,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

impl ArgDefinition {
    pub fn new(default: impl Into<String>, description: &str) -> Self {
        Self {
            default: ArgValue::String(default.into()),
            description: Some(description.to_string()),
        }
    }
}

/// Argument values can be strings, booleans, or numbers
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ArgValue {
    Bool(bool),
    Int(i64),
    Float(f64),
    String(String),
}

impl ArgValue {
    /// Convert to string representation
    pub fn as_str(&self) -> String {
        match self {
            ArgValue::Bool(b) => b.to_string(),
            ArgValue::Int(i) => i.to_string(),
            ArgValue::Float(f) => f.to_string(),
            ArgValue::String(s) => s.clone(),
        }
    }

    /// Parse from string
    pub fn parse(s: &str) -> Self {
        if s.eq_ignore_ascii_case("true") {
            return ArgValue::Bool(true);
        }
        if s.eq_ignore_ascii_case("false") {
            return ArgValue::Bool(false);
        }
        if let Ok(i) = s.parse::<i64>() {
            return ArgValue::Int(i);
        }
        if let Ok(f) = s.parse::<f64>() {
            return ArgValue::Float(f);
        }
        ArgValue::String(s.to_string())
    }

    /// Check if value is truthy
    pub fn is_truthy(&self) -> bool {
        match self {
            ArgValue::Bool(b) => *b,
            ArgValue::Int(i) => *i != 0,
            ArgValue::Float(f) => *f != 0.0,
            ArgValue::String(s) => {
                !s.is_empty()
                    && !s.eq_ignore_ascii_case("false")
                    && !s.eq_ignore_ascii_case("0")
                    && !s.eq_ignore_ascii_case("no")
            }
        }
    }
}

/// An included launch description of another package
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IncludeConfig {
    /// Package providing the launch file
    pub package: String,

    /// Launch file path relative to the package share directory
    pub file: String,

    /// Arguments handed to the included launch description
    #[serde(default)]
    pub launch_arguments: IndexMap<String, String>,

    /// Environment variables specific to this include
    #[serde(default)]
    pub env: HashMap<String, String>,

    /// Group name for filtering
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub group: Option<String>,

    /// Whether the include is launched
    /// Can be a boolean or a string like "$(arg activate_mocap)"
    #[serde(default = "default_enabled")]
    pub enabled: EnabledValue,

    /// Includes that must be running first
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub depends_on: Vec<String>,

    /// Startup delay in milliseconds after dependencies are running
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub startup_delay_ms: Option<u64>,
}

impl IncludeConfig {
    /// Include `file` from `package` with the given arguments
    pub fn new(package: &str, file: &str, launch_arguments: &[(&str, &str)]) -> Self {
        Self {
            package: package.to_string(),
            file: file.to_string(),
            launch_arguments: launch_arguments
                .iter()
                .map(|(k, v)| (k.to_string(), v.to_string()))
                .collect(),
            env: HashMap::new(),
            group: None,
            enabled: default_enabled(),
            depends_on: Vec::new(),
            startup_delay_ms: None,
        }
    }

    pub fn in_group(mut self, group: &str) -> Self {
        self.group = Some(group.to_string());
        self
    }

    pub fn disabled(mut self) -> Self {
        self.enabled = EnabledValue::Bool(false);
        self
    }
}

fn default_enabled() -> EnabledValue {
    EnabledValue::Bool(true)
}

/// Enabled value can be a direct boolean or a substitution string
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(untagged)]
pub enum EnabledValue {
    Bool(bool),
    String(String),
}

impl BringupFile {
    /// Load a profile from a YAML file
    pub fn from_file(path: &str) -> Result<Self, BringupFileError> {
        let content = std::fs::read_to_string(path).map_err(|e| BringupFileError::Io {
            path: path.to_string(),
            source: e,
        })?;
        Self::from_yaml(&content)
    }

    /// Parse a profile from a YAML string
    pub fn from_yaml(content: &str) -> Result<Self, BringupFileError> {
        let profile: BringupFile = serde_yaml::from_str(content).map_err(BringupFileError::Parse)?;
        profile.validate()?;
        Ok(profile)
    }

    /// Serialize the profile back to YAML
    pub fn to_yaml(&self) -> Result<String, BringupFileError> {
        serde_yaml::to_string(self).map_err(BringupFileError::Parse)
    }

    /// Vehicle ID used when no `<id_arg>:=` override is given.
    ///
    /// `vehicle.default_id` wins; otherwise the declared default of the ID
    /// argument is parsed.
    pub fn default_vehicle_id(&self) -> Result<u16, VehicleIdError> {
        match (self.vehicle.default_id, self.args.get(&self.vehicle.id_arg)) {
            (Some(id), _) => Ok(id),
            (None, Some(def)) => vehicle::parse_vehicle_id(&def.default.as_str()),
            (None, None) => Ok(DEFAULT_VEHICLE_ID),
        }
    }

    /// Validate the profile configuration
    pub fn validate(&self) -> Result<(), BringupFileError> {
        let id_arg = &self.vehicle.id_arg;
        let Some(id_def) = self.args.get(id_arg) else {
            return Err(BringupFileError::Validation(format!(
                "vehicle ID argument '{}' is not declared",
                id_arg
            )));
        };

        match (self.vehicle.default_id, vehicle::parse_vehicle_id(&id_def.default.as_str())) {
            (None, Err(e)) => {
                return Err(BringupFileError::Validation(format!(
                    "vehicle ID argument '{}': {}",
                    id_arg, e
                )));
            }
            (Some(id), Ok(declared)) if id != declared => {
                return Err(BringupFileError::Validation(format!(
                    "vehicle ID argument '{}' declares default {} but vehicle.default_id is {}",
                    id_arg, declared, id
                )));
            }
            _ => {}
        }

        for (name, include) in &self.includes {
            if include.package.trim().is_empty() {
                return Err(BringupFileError::Validation(format!(
                    "Include '{}': 'package' must not be empty",
                    name
                )));
            }
            if include.file.trim().is_empty() {
                return Err(BringupFileError::Validation(format!(
                    "Include '{}': 'file' must not be empty",
                    name
                )));
            }

            for dep_name in &include.depends_on {
                if dep_name == name {
                    return Err(BringupFileError::Validation(format!(
                        "Include '{}': depends on itself",
                        name
                    )));
                }
                if !self.includes.contains_key(dep_name) {
                    return Err(BringupFileError::Validation(format!(
                        "Include '{}': depends on unknown include '{}'",
                        name, dep_name
                    )));
                }
            }
        }

        Ok(())
    }

    /// Get all unique group names
    pub fn groups(&self) -> Vec<String> {
        let mut groups: Vec<String> = self
            .includes
            .values()
            .filter_map(|n| n.group.clone())
            .collect();
        groups.sort();
        groups.dedup();
        groups
    }
}

/// Errors that can occur when loading a profile
#[derive(Debug, thiserror::Error)]
pub enum BringupFileError {
    #[error("Failed to read profile '{path}': {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to parse profile: {0}")]
    Parse(#[from] serde_yaml::Error),

    #[error("Validation error: {0}")]
    Validation(String),
}
