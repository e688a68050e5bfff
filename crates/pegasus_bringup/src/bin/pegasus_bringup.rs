//! Pegasus Bringup CLI
//!
//! Usage:
//!   pegasus_bringup
//!   pegasus_bringup vehicle_id:=2 connection:=udp://:14550
//!   pegasus_bringup vehicle_id:=2 --dry-run --format json
//!   pegasus_bringup -f launch/sim.yaml --enable realsense

use pegasus_bringup::{
    pegasus_real, AmentIndex, BringupArgs, BringupFile, Executor, ExecutorConfig, OutputFormat,
};
use tokio::sync::watch;

#[tokio::main]
async fn main() {
    let args: BringupArgs = argh::from_env();

    let env = env_logger::Env::default().default_filter_or(args.log_filter());
    env_logger::init_from_env(env);

    let profile = match &args.profile {
        Some(path) => {
            log::info!("Loading profile: {}", path);
            match BringupFile::from_file(path) {
                Ok(profile) => profile,
                Err(e) => {
                    log::error!("Failed to load profile: {}", e);
                    std::process::exit(1);
                }
            }
        }
        None => pegasus_real(),
    };

    if args.export_profile {
        match profile.to_yaml() {
            Ok(yaml) => print!("{}", yaml),
            Err(e) => {
                log::error!("Failed to serialize profile: {}", e);
                std::process::exit(1);
            }
        }
        return;
    }

    if args.validate {
        if let Err(e) = profile.validate() {
            log::error!("Invalid profile: {}", e);
            std::process::exit(1);
        }
        println!("Profile is valid");
        println!("  Version: {}", profile.version);
        println!("  Args: {}", profile.args.len());
        println!("  Includes: {}", profile.includes.len());
        println!("  Groups: {}", profile.groups().join(", "));
        return;
    }

    let executor_config = ExecutorConfig {
        launcher: args.launcher.clone(),
        shutdown_timeout: args.shutdown_timeout(),
        include_groups: args.include_groups(),
        enable_includes: args.enable_includes(),
        disable_includes: args.disable_includes(),
        ament: AmentIndex::from_env(),
    };

    let mut executor = match Executor::new(profile, executor_config, &args.overrides) {
        Ok(e) => e,
        Err(e) => {
            log::error!("Failed to resolve launch arguments: {}", e);
            std::process::exit(1);
        }
    };

    if args.dry_run {
        let plan = match executor.plan() {
            Ok(plan) => plan,
            Err(e) => {
                log::error!("Failed to generate launch plan: {}", e);
                std::process::exit(1);
            }
        };
        let rendered = match args.format {
            OutputFormat::Text => Ok(plan.to_string()),
            OutputFormat::Json => serde_json::to_string_pretty(&plan).map_err(|e| e.to_string()),
            OutputFormat::Yaml => serde_yaml::to_string(&plan).map_err(|e| e.to_string()),
        };
        match rendered {
            Ok(text) => println!("{}", text),
            Err(e) => {
                log::error!("Failed to render launch plan: {}", e);
                std::process::exit(1);
            }
        }
        return;
    }

    let (shutdown_tx, shutdown_rx) = watch::channel(());

    {
        let shutdown_tx = shutdown_tx.clone();
        if let Err(e) = ctrlc::set_handler(move || {
            log::info!("Received Ctrl+C, initiating shutdown...");
            let _ = shutdown_tx.send(());
        }) {
            log::error!("Failed to install Ctrl+C handler: {}", e);
            std::process::exit(1);
        }
    }

    if let Err(e) = executor.launch(shutdown_rx.clone()).await {
        log::error!("Launch failed: {}", e);
        executor.shutdown().await;
        std::process::exit(1);
    }

    executor.wait(shutdown_rx).await;
    executor.shutdown().await;

    log::info!("Pegasus bringup exiting");
}
