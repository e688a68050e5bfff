//! End-to-end launch plan tests against a fake ament install prefix

use pegasus_bringup::{
    pegasus_real, AmentIndex, BringupFile, Executor, ExecutorConfig, ExecutorError, LaunchPlan,
    ProcessStatus,
};
use std::fs;
use std::path::Path;
use tempfile::TempDir;
use tokio::sync::watch;

const PACKAGES: &[&str] = &[
    "pegasus_bringup",
    "mavlink_interface",
    "autopilot",
    "mocap_interface",
    "ueye_driver",
    "visual_odometry",
];

/// Install prefix with a share directory for every package of the stack
fn fake_prefix() -> TempDir {
    let dir = tempfile::tempdir().unwrap();
    for package in PACKAGES {
        fs::create_dir_all(dir.path().join("share").join(package).join("launch")).unwrap();
    }
    dir
}

fn config(prefix: &Path) -> ExecutorConfig {
    ExecutorConfig {
        ament: AmentIndex::default().with_prefix(prefix),
        ..Default::default()
    }
}

fn raw(tokens: &[&str]) -> Vec<String> {
    tokens.iter().map(|s| s.to_string()).collect()
}

fn plan_for(config: ExecutorConfig, tokens: &[&str]) -> LaunchPlan {
    Executor::new(pegasus_real(), config, &raw(tokens))
        .unwrap()
        .plan()
        .unwrap()
}

#[test]
fn default_plan_matches_real_vehicle_bringup() {
    let prefix = fake_prefix();
    let plan = plan_for(config(prefix.path()), &[]);
    let share = prefix.path().join("share");

    assert_eq!(plan.vehicle_id, 1);
    assert_eq!(plan.forward.port, 14560);

    let drone_params = share
        .join("pegasus_bringup")
        .to_string_lossy()
        .into_owned()
        + "/config/pegasus.yaml";
    assert_eq!(plan.args["drone_params"], drone_params);
    assert_eq!(plan.args["mavlink_forward"], "[udp://192.168.1.69:14560]");

    let names: Vec<_> = plan.includes.iter().map(|i| i.name.as_str()).collect();
    assert_eq!(names, vec!["mavlink_interface", "autopilot", "mocap"]);

    let mavlink = &plan.includes[0];
    assert_eq!(
        mavlink.launch_file,
        share.join("mavlink_interface/launch/mavlink_interface.launch.py")
    );
    assert_eq!(mavlink.launch_arguments["id"], "1");
    assert_eq!(mavlink.launch_arguments["namespace"], "drone");
    assert_eq!(mavlink.launch_arguments["connection"], "serial:///dev/ttyTHS0:921600");
    assert_eq!(mavlink.launch_arguments["mavlink_forward"], "[udp://192.168.1.69:14560]");
    assert_eq!(mavlink.launch_arguments["drone_params"], drone_params);

    let autopilot = &plan.includes[1];
    assert_eq!(autopilot.launch_arguments.len(), 3);
    assert_eq!(autopilot.launch_arguments["autopilot_yaml"], drone_params);

    let mocap = &plan.includes[2];
    assert_eq!(mocap.package, "mocap_interface");
    assert_eq!(mocap.launch_file, share.join("mocap_interface/launch/vrpn.launch.py"));
    let keys: Vec<_> = mocap.launch_arguments.keys().map(String::as_str).collect();
    assert_eq!(keys, vec!["id", "namespace"]);
}

#[test]
fn vehicle_id_is_forwarded_everywhere() {
    let prefix = fake_prefix();
    let plan = plan_for(config(prefix.path()), &["vehicle_id:=4", "vehicle_ns:=uav"]);

    assert_eq!(plan.forward.port, 14563);
    for include in &plan.includes {
        assert_eq!(include.launch_arguments["id"], "4", "{}", include.name);
        assert_eq!(include.launch_arguments["namespace"], "uav", "{}", include.name);
    }
    assert_eq!(
        plan.includes[0].launch_arguments["mavlink_forward"],
        "[udp://192.168.1.69:14563]"
    );
}

#[test]
fn padded_vehicle_id_is_forwarded_as_a_number() {
    let prefix = fake_prefix();
    let plan = plan_for(config(prefix.path()), &["vehicle_id:= 5"]);

    assert_eq!(plan.vehicle_id, 5);
    assert_eq!(plan.args["vehicle_id"], "5");
    for include in &plan.includes {
        assert_eq!(include.launch_arguments["id"], "5", "{}", include.name);
        assert!(include.command.contains(&"id:=5".to_string()), "{}", include.name);
    }
}

#[test]
fn command_line_uses_launcher_and_key_value_arguments() {
    let prefix = fake_prefix();
    let config = ExecutorConfig {
        launcher: "/opt/ros/humble/bin/ros2".to_string(),
        ..config(prefix.path())
    };
    let plan = plan_for(config, &["vehicle_id:=2"]);

    let mocap = plan.includes.iter().find(|i| i.name == "mocap").unwrap();
    assert_eq!(
        mocap.command,
        vec![
            "/opt/ros/humble/bin/ros2".to_string(),
            "launch".to_string(),
            mocap.launch_file.to_string_lossy().into_owned(),
            "id:=2".to_string(),
            "namespace:=drone".to_string(),
        ]
    );
}

#[test]
fn optional_sensors_are_opt_in() {
    let prefix = fake_prefix();
    let config = ExecutorConfig {
        enable_includes: ["realsense".to_string()].into_iter().collect(),
        disable_includes: ["mocap".to_string()].into_iter().collect(),
        ..config(prefix.path())
    };
    let plan = plan_for(config, &[]);

    let names: Vec<_> = plan.includes.iter().map(|i| i.name.as_str()).collect();
    assert_eq!(names, vec!["mavlink_interface", "autopilot", "realsense"]);
    assert_eq!(
        plan.includes[2].launch_file,
        prefix
            .path()
            .join("share/pegasus_bringup/launch/dev/realsense.launch.py")
    );
}

#[test]
fn group_filter_keeps_core_only() {
    let prefix = fake_prefix();
    let config = ExecutorConfig {
        include_groups: Some(["core".to_string()].into_iter().collect()),
        ..config(prefix.path())
    };
    let plan = plan_for(config, &[]);

    let names: Vec<_> = plan.includes.iter().map(|i| i.name.as_str()).collect();
    assert_eq!(names, vec!["mavlink_interface", "autopilot"]);
}

#[test]
fn missing_package_is_reported() {
    let dir = tempfile::tempdir().unwrap();
    fs::create_dir_all(dir.path().join("share/pegasus_bringup")).unwrap();
    fs::create_dir_all(dir.path().join("share/mavlink_interface")).unwrap();

    let executor = Executor::new(pegasus_real(), config(dir.path()), &[]).unwrap();
    match executor.plan() {
        Err(ExecutorError::PackageNotFound { include, package }) => {
            assert_eq!(include, "autopilot");
            assert_eq!(package, "autopilot");
        }
        other => panic!("expected PackageNotFound, got {:?}", other.map(|p| p.includes.len())),
    }
}

#[test]
fn custom_profile_with_conditional_include() {
    let prefix = fake_prefix();
    let yaml = r#"
vehicle:
  id_arg: id
forward:
  host: 127.0.0.1
  base_port: 15000
args:
  id:
    default: 7
  activate_mocap:
    default: false
includes:
  mavlink_interface:
    package: mavlink_interface
    file: launch/mavlink_interface.launch.py
    launch_arguments:
      id: "$(arg id)"
      mavlink_forward: "$(forward list)"
  autopilot:
    package: autopilot
    file: launch/autopilot.launch.py
    depends_on: [mavlink_interface]
    startup_delay_ms: 500
  mocap:
    package: mocap_interface
    file: launch/vrpn.launch.py
    enabled: "$(arg activate_mocap)"
"#;
    let profile = BringupFile::from_yaml(yaml).unwrap();

    let executor = Executor::new(profile.clone(), config(prefix.path()), &[]).unwrap();
    let plan = executor.plan().unwrap();
    assert_eq!(plan.vehicle_id, 7);
    assert_eq!(plan.args["id"], "7");
    let names: Vec<_> = plan.includes.iter().map(|i| i.name.as_str()).collect();
    assert_eq!(names, vec!["mavlink_interface", "autopilot"]);
    assert_eq!(
        plan.includes[0].launch_arguments["mavlink_forward"],
        "[udp://127.0.0.1:15007]"
    );
    assert_eq!(plan.includes[1].dependencies, vec!["mavlink_interface"]);
    assert_eq!(plan.includes[1].startup_delay_ms, Some(500));

    let executor =
        Executor::new(profile, config(prefix.path()), &raw(&["activate_mocap:=True"])).unwrap();
    assert_eq!(executor.plan().unwrap().includes.len(), 3);
}

#[test]
fn plan_renders_as_text_and_json() {
    let prefix = fake_prefix();
    let plan = plan_for(config(prefix.path()), &["vehicle_id:=3"]);

    let text = plan.to_string();
    assert!(text.contains("Vehicle: 3"));
    assert!(text.contains("MAVLink forward: udp://192.168.1.69:14562"));
    assert!(text.contains("1. mavlink_interface [core]"));
    assert!(text.contains("3. mocap [perception]"));

    let json: serde_json::Value = serde_json::to_value(&plan).unwrap();
    assert_eq!(json["vehicle_id"], 3);
    assert_eq!(json["forward"]["port"], 14562);
    assert_eq!(json["includes"][1]["name"], "autopilot");
}

#[cfg(unix)]
#[tokio::test]
async fn launch_runs_includes_until_they_exit() {
    let prefix = fake_prefix();
    let config = ExecutorConfig {
        launcher: "echo".to_string(),
        ..config(prefix.path())
    };
    let mut executor = Executor::new(pegasus_real(), config, &[]).unwrap();

    let (_shutdown_tx, shutdown_rx) = watch::channel(());
    executor.launch(shutdown_rx.clone()).await.unwrap();
    executor.wait(shutdown_rx).await;
    executor.shutdown().await;

    let status = executor.status();
    let names: Vec<_> = status.iter().map(|(name, _)| *name).collect();
    assert_eq!(names, vec!["mavlink_interface", "autopilot", "mocap"]);
    assert!(status
        .iter()
        .all(|(_, s)| *s == ProcessStatus::Stopped(Some(0))));
}

#[test]
fn bundled_simulation_profile() {
    let prefix = fake_prefix();
    let profile = BringupFile::from_yaml(include_str!("../launch/sim.pegasus.yaml")).unwrap();

    let executor = Executor::new(profile, config(prefix.path()), &raw(&["vehicle_id:=2"])).unwrap();
    let plan = executor.plan().unwrap();

    assert_eq!(plan.args["connection"], "udp://:14550");
    assert_eq!(plan.args["mavlink_forward"], "[udp://127.0.0.1:14561]");
    assert_eq!(plan.env["RCUTILS_COLORIZED_OUTPUT"], "1");
    let names: Vec<_> = plan.includes.iter().map(|i| i.name.as_str()).collect();
    assert_eq!(names, vec!["mavlink_interface", "autopilot"]);
    assert_eq!(plan.includes[1].env["RCUTILS_COLORIZED_OUTPUT"], "1");
}
