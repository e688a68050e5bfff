//! Command-line interface for pegasus_bringup

use argh::FromArgs;
use std::collections::HashSet;
use std::time::Duration;

/// Launch the Pegasus drone stack (MAVLink interface, autopilot, motion capture) for one vehicle
#[derive(FromArgs, Debug)]
pub struct BringupArgs {
    /// launch argument overrides (format: key:=value, e.g. vehicle_id:=2)
    #[argh(positional)]
    pub overrides: Vec<String>,

    /// bringup profile YAML to use instead of the built-in real-vehicle profile
    #[argh(option, short = 'f')]
    pub profile: Option<String>,

    /// only launch includes in these groups (comma-separated)
    #[argh(option, short = 'g', from_str_fn(parse_list))]
    pub groups: Option<Vec<String>>,

    /// explicitly enable these includes (comma-separated)
    #[argh(option, from_str_fn(parse_list))]
    pub enable: Option<Vec<String>>,

    /// explicitly disable these includes (comma-separated)
    #[argh(option, from_str_fn(parse_list))]
    pub disable: Option<Vec<String>>,

    /// show launch plan without executing
    #[argh(switch)]
    pub dry_run: bool,

    /// validate the profile and exit
    #[argh(switch)]
    pub validate: bool,

    /// print the profile as YAML and exit
    #[argh(switch)]
    pub export_profile: bool,

    /// dry-run output format (text, json, yaml)
    #[argh(option, default = "OutputFormat::Text", from_str_fn(parse_format))]
    pub format: OutputFormat,

    /// program used to run included launch files (default: ros2)
    #[argh(option, default = "String::from(\"ros2\")")]
    pub launcher: String,

    /// per-include shutdown timeout in milliseconds (default: 5000)
    #[argh(option, default = "5000")]
    pub shutdown_timeout_ms: u64,

    /// log level (error, warn, info, debug, trace)
    #[argh(option, short = 'l', default = "String::from(\"info\")")]
    pub log_level: String,
}

/// How the dry-run plan is printed
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputFormat {
    Text,
    Json,
    Yaml,
}

/// Parse comma-separated list
fn parse_list(s: &str) -> Result<Vec<String>, String> {
    Ok(s.split(',')
        .map(|g| g.trim().to_string())
        .filter(|g| !g.is_empty())
        .collect())
}

fn parse_format(s: &str) -> Result<OutputFormat, String> {
    match s.to_lowercase().as_str() {
        "text" => Ok(OutputFormat::Text),
        "json" => Ok(OutputFormat::Json),
        "yaml" => Ok(OutputFormat::Yaml),
        other => Err(format!(
            "Unknown format '{}'. Expected text, json or yaml",
            other
        )),
    }
}

impl BringupArgs {
    pub fn include_groups(&self) -> Option<HashSet<String>> {
        self.groups.clone().map(|g| g.into_iter().collect())
    }

    pub fn enable_includes(&self) -> HashSet<String> {
        self.enable.clone().unwrap_or_default().into_iter().collect()
    }

    pub fn disable_includes(&self) -> HashSet<String> {
        self.disable.clone().unwrap_or_default().into_iter().collect()
    }

    pub fn shutdown_timeout(&self) -> Duration {
        Duration::from_millis(self.shutdown_timeout_ms)
    }

    /// Log filter, falling back to info for unknown levels
    pub fn log_filter(&self) -> &'static str {
        match self.log_level.to_lowercase().as_str() {
            "error" => "error",
            "warn" => "warn",
            "debug" => "debug",
            "trace" => "trace",
            _ => "info",
        }
    }
}
