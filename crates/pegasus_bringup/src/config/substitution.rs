//! Substitution engine for $(arg), $(env), $(find-pkg-share), $(forward) and $(timestamp) patterns

use super::ament::AmentIndex;
use crate::forward::ForwardEndpoint;
use regex::{Captures, Regex};
use std::collections::HashMap;
use std::sync::LazyLock;

/// Regex for matching substitution patterns: $(type value)
static SUBSTITUTION_PATTERN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\$\(([\w-]+)\s+([^)]+)\)|\$\(([\w-]+)\)").unwrap());

/// Substitution context containing all available variables
#[derive(Debug, Clone, Default)]
pub struct SubstitutionContext {
    /// Resolved launch arguments
    pub args: HashMap<String, String>,
    /// Additional environment variables
    pub env: HashMap<String, String>,
    /// Package index for $(find-pkg-share)
    pub ament: AmentIndex,
    /// Forwarding endpoint, once the vehicle ID is known
    pub forward: Option<ForwardEndpoint>,
}

impl SubstitutionContext {
    /// Create a new substitution context
    pub fn new() -> Self {
        Self::default()
    }

    /// Add an argument
    pub fn with_arg(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.args.insert(name.into(), value.into());
        self
    }

    /// Add multiple arguments
    pub fn with_args(mut self, args: HashMap<String, String>) -> Self {
        self.args.extend(args);
        self
    }

    /// Add an environment variable
    pub fn with_env(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.env.insert(name.into(), value.into());
        self
    }

    /// Add multiple environment variables
    pub fn with_envs(mut self, envs: HashMap<String, String>) -> Self {
        self.env.extend(envs);
        self
    }

    pub fn with_ament(mut self, ament: AmentIndex) -> Self {
        self.ament = ament;
        self
    }

    pub fn with_forward(mut self, forward: ForwardEndpoint) -> Self {
        self.forward = Some(forward);
        self
    }

    /// Substitute all patterns in a string
    pub fn substitute(&self, input: &str) -> Result<String, SubstitutionError> {
        let mut result = input.to_string();
        let mut last_result = String::new();

        // Iterate until no more substitutions are made (handles nested substitutions)
        let max_iterations = 10;
        let mut iterations = 0;

        while result != last_result && iterations < max_iterations {
            last_result = result.clone();
            result = self.substitute_once(&result)?;
            iterations += 1;
        }

        if iterations >= max_iterations && SUBSTITUTION_PATTERN.is_match(&result) {
            return Err(SubstitutionError::MaxIterationsExceeded(input.to_string()));
        }

        Ok(result)
    }

    /// Perform a single pass of substitution
    fn substitute_once(&self, input: &str) -> Result<String, SubstitutionError> {
        let mut error: Option<SubstitutionError> = None;

        let result = SUBSTITUTION_PATTERN.replace_all(input, |caps: &Captures| {
            if error.is_some() {
                return String::new();
            }

            match self.resolve_capture(caps) {
                Ok(value) => value,
                Err(e) => {
                    error = Some(e);
                    String::new()
                }
            }
        });

        if let Some(e) = error {
            return Err(e);
        }

        Ok(result.into_owned())
    }

    /// Resolve a single capture group
    fn resolve_capture(&self, caps: &Captures) -> Result<String, SubstitutionError> {
        // $(type value), e.g. $(arg vehicle_ns)
        if let (Some(subst_type), Some(value)) = (caps.get(1), caps.get(2)) {
            return self.resolve_typed(subst_type.as_str(), value.as_str().trim());
        }

        // $(type), e.g. $(timestamp)
        if let Some(subst_type) = caps.get(3) {
            return self.resolve_typed(subst_type.as_str(), "");
        }

        Err(SubstitutionError::InvalidPattern(
            caps.get(0).map(|m| m.as_str().to_string()).unwrap_or_default(),
        ))
    }

    /// Resolve a typed substitution
    fn resolve_typed(&self, subst_type: &str, value: &str) -> Result<String, SubstitutionError> {
        match subst_type {
            "arg" => self.resolve_arg(value),
            "env" => self.resolve_env(value),
            "find-pkg-share" => self.resolve_package_share(value),
            "forward" => self.resolve_forward(value),
            "timestamp" => Ok(self.generate_timestamp(value)),
            "date" => Ok(self.generate_date(value)),
            _ => Err(SubstitutionError::UnknownType(subst_type.to_string())),
        }
    }

    /// Resolve an argument reference
    fn resolve_arg(&self, name: &str) -> Result<String, SubstitutionError> {
        self.args
            .get(name)
            .cloned()
            .ok_or_else(|| SubstitutionError::UndefinedArg(name.to_string()))
    }

    /// Resolve an environment variable reference
    fn resolve_env(&self, name: &str) -> Result<String, SubstitutionError> {
        // Local overrides shadow the system environment
        if let Some(value) = self.env.get(name) {
            return Ok(value.clone());
        }

        std::env::var(name).map_err(|_| SubstitutionError::UndefinedEnv(name.to_string()))
    }

    fn resolve_package_share(&self, package: &str) -> Result<String, SubstitutionError> {
        self.ament
            .find_package_share(package)
            .map(|path| path.to_string_lossy().into_owned())
            .ok_or_else(|| SubstitutionError::PackageNotFound(package.to_string()))
    }

    /// Resolve a field of the forwarding endpoint (`port`, `address` or `list`)
    fn resolve_forward(&self, field: &str) -> Result<String, SubstitutionError> {
        let forward = self
            .forward
            .as_ref()
            .ok_or(SubstitutionError::ForwardUnavailable)?;

        match field {
            "port" => Ok(forward.port.to_string()),
            "address" => Ok(forward.address()),
            "list" => Ok(forward.list()),
            _ => Err(SubstitutionError::UnknownForwardField(field.to_string())),
        }
    }

    /// Generate a timestamp
    fn generate_timestamp(&self, format: &str) -> String {
        let now = chrono::Local::now();
        if format.is_empty() {
            // YYYYMMDD_HHMMSS
            now.format("%Y%m%d_%H%M%S").to_string()
        } else {
            now.format(format).to_string()
        }
    }

    /// Generate a date
    fn generate_date(&self, format: &str) -> String {
        let now = chrono::Local::now();
        if format.is_empty() {
            now.format("%Y-%m-%d").to_string()
        } else {
            now.format(format).to_string()
        }
    }
}

/// Errors that can occur during substitution
#[derive(Debug, thiserror::Error)]
pub enum SubstitutionError {
    #[error("Unknown substitution type: {0}")]
    UnknownType(String),

    #[error("Undefined argument: {0}")]
    UndefinedArg(String),

    #[error("Undefined environment variable: {0}")]
    UndefinedEnv(String),

    #[error("Package '{0}' not found in AMENT_PREFIX_PATH")]
    PackageNotFound(String),

    #[error("Forward endpoint is not available in this context")]
    ForwardUnavailable,

    #[error("Unknown forward field '{0}' (expected port, address or list)")]
    UnknownForwardField(String),

    #[error("Invalid substitution pattern: {0}")]
    InvalidPattern(String),

    #[error("Maximum substitution iterations exceeded for: {0}")]
    MaxIterationsExceeded(String),
}
