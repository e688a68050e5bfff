//! Pegasus Bringup
//!
//! Launch orchestrator for one vehicle of the Pegasus multi-vehicle drone stack.
//!
//! # Overview
//!
//! The bringup:
//! - Declares the vehicle launch arguments (ID, namespace, MAVLink connection,
//!   MAVLink forward list, drone parameter file), overridable as `key:=value`
//! - Resolves the vehicle ID first and derives its MAVLink forward port
//!   (`14559 + vehicle_id`)
//! - Includes the MAVLink interface, autopilot and motion capture launch
//!   descriptions, forwarding the arguments each of them expects
//! - Launches every include as a `ros2 launch` child and stops them in
//!   reverse order on shutdown
//!
//! # Example Profile
//!
//! ```yaml
//! version: "1.0"
//!
//! vehicle:
//!   id_arg: vehicle_id
//!
//! args:
//!   vehicle_id:
//!     default: 1
//!   mavlink_forward:
//!     default: "$(forward list)"
//!
//! includes:
//!   mavlink_interface:
//!     package: mavlink_interface
//!     file: launch/mavlink_interface.launch.py
//!     launch_arguments:
//!       id: "$(arg vehicle_id)"
//!       mavlink_forward: "$(arg mavlink_forward)"
//! ```

pub mod cli;
pub mod composer;
pub mod config;
pub mod forward;
pub mod runtime;
pub mod vehicle;

pub use cli::{BringupArgs, OutputFormat};
pub use composer::pegasus_real;
pub use config::{
    AmentIndex, BringupFile, BringupFileError, IncludeConfig, SubstitutionContext,
    SubstitutionError,
};
pub use forward::{ForwardEndpoint, ForwardError, ForwardSpec};
pub use runtime::{
    DependencyError, DependencyGraph, Executor, ExecutorConfig, ExecutorError, LaunchPlan,
    ManagedProcess, ProcessConfig, ProcessError, ProcessEvent, ProcessStatus,
};
pub use vehicle::{resolve_vehicle_id, VehicleIdError, VehicleSpec};
