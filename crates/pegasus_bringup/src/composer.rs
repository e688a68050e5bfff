//! Built-in bringup profile for a real Pegasus vehicle
//!
//! Declares the vehicle arguments and wires them, by name, into the MAVLink
//! interface, autopilot and motion capture launch descriptions. Camera and
//! visual odometry includes are declared too but disabled by default.

use crate::config::{ArgDefinition, BringupFile, IncludeConfig};
use crate::forward::ForwardSpec;
use crate::vehicle::{VehicleSpec, DEFAULT_VEHICLE_ID};
use indexmap::IndexMap;
use std::collections::HashMap;

/// Default MAVLink connection (Jetson UART).
/// Alternatives: `serial:///dev/ttyACM0:921600`, `udp://:14550`.
pub const DEFAULT_CONNECTION: &str = "serial:///dev/ttyTHS0:921600";

pub const DEFAULT_NAMESPACE: &str = "drone";

/// Profile equivalent to `pegasus_bringup/launch/real/pegasus.launch.py`
pub fn pegasus_real() -> BringupFile {
    let vehicle = VehicleSpec::default();

    let mut args = IndexMap::new();
    args.insert(
        vehicle.id_arg.clone(),
        ArgDefinition::new(DEFAULT_VEHICLE_ID.to_string(), "Drone ID in the network"),
    );
    args.insert(
        "vehicle_ns".to_string(),
        ArgDefinition::new(
            DEFAULT_NAMESPACE,
            "Namespace to append to every topic and node name",
        ),
    );
    args.insert(
        "connection".to_string(),
        ArgDefinition::new(
            DEFAULT_CONNECTION,
            "The interface used to connect to the vehicle",
        ),
    );
    args.insert(
        "mavlink_forward".to_string(),
        ArgDefinition::new(
            "$(forward list)",
            "A list of ips where to forward mavlink messages",
        ),
    );
    args.insert(
        "drone_params".to_string(),
        ArgDefinition::new(
            "$(find-pkg-share pegasus_bringup)/config/pegasus.yaml",
            "The directory where the drone parameters such as mass, thrust curve, etc. are defined",
        ),
    );

    let id = "$(arg vehicle_id)";
    let ns = "$(arg vehicle_ns)";

    let mut includes = IndexMap::new();
    includes.insert(
        "mavlink_interface".to_string(),
        IncludeConfig::new(
            "mavlink_interface",
            "launch/mavlink_interface.launch.py",
            &[
                ("id", id),
                ("namespace", ns),
                ("drone_params", "$(arg drone_params)"),
                ("connection", "$(arg connection)"),
                ("mavlink_forward", "$(arg mavlink_forward)"),
            ],
        )
        .in_group("core"),
    );
    includes.insert(
        "autopilot".to_string(),
        IncludeConfig::new(
            "autopilot",
            "launch/autopilot.launch.py",
            &[
                ("id", id),
                ("namespace", ns),
                ("autopilot_yaml", "$(arg drone_params)"),
            ],
        )
        .in_group("core"),
    );
    includes.insert(
        "mocap".to_string(),
        IncludeConfig::new(
            "mocap_interface",
            "launch/vrpn.launch.py",
            &[("id", id), ("namespace", ns)],
        )
        .in_group("perception"),
    );

    // Optional sensors, launched with --enable
    includes.insert(
        "ueye_camera".to_string(),
        IncludeConfig::new(
            "ueye_driver",
            "launch/ueye_driver.launch.py",
            &[("id", id), ("namespace", ns)],
        )
        .in_group("perception")
        .disabled(),
    );
    includes.insert(
        "realsense".to_string(),
        IncludeConfig::new(
            "pegasus_bringup",
            "launch/dev/realsense.launch.py",
            &[("id", id), ("namespace", ns)],
        )
        .in_group("perception")
        .disabled(),
    );
    includes.insert(
        "visual_odometry".to_string(),
        IncludeConfig::new(
            "visual_odometry",
            "launch/visual_odometry.launch.py",
            &[("id", id), ("namespace", ns)],
        )
        .in_group("perception")
        .disabled(),
    );

    BringupFile {
        version: "1.0".to_string(),
        vehicle,
        forward: ForwardSpec::default(),
        args,
        env: HashMap::new(),
        includes,
    }
}
