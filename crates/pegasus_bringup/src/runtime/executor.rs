//! Bringup executor: argument resolution, launch plan and process supervision

use crate::config::{AmentIndex, ArgValue, BringupFile, EnabledValue, SubstitutionContext};
use crate::forward::{ForwardEndpoint, ForwardError};
use crate::runtime::dependency::{DependencyError, DependencyGraph, ResolvedInclude};
use crate::runtime::process::{ManagedProcess, ProcessConfig, ProcessEvent, ProcessStatus};
use crate::vehicle::{self, VehicleIdError};
use indexmap::IndexMap;
use serde::Serialize;
use std::collections::{HashMap, HashSet};
use std::path::PathBuf;
use std::time::Duration;
use tokio::sync::{mpsc, watch};

/// Executor configuration
#[derive(Debug, Clone)]
pub struct ExecutorConfig {
    /// Program used to run an included launch file
    pub launcher: String,
    /// Shutdown timeout per process
    pub shutdown_timeout: Duration,
    /// Groups to include (None = all groups)
    pub include_groups: Option<HashSet<String>>,
    /// Includes to explicitly enable
    pub enable_includes: HashSet<String>,
    /// Includes to explicitly disable
    pub disable_includes: HashSet<String>,
    /// Package index for $(find-pkg-share)
    pub ament: AmentIndex,
}

impl Default for ExecutorConfig {
    fn default() -> Self {
        Self {
            launcher: "ros2".to_string(),
            shutdown_timeout: Duration::from_secs(5),
            include_groups: None,
            enable_includes: HashSet::new(),
            disable_includes: HashSet::new(),
            ament: AmentIndex::default(),
        }
    }
}

/// Parse a single `key:=value` token
pub fn parse_arg_override(token: &str) -> Result<(String, String), String> {
    match token.split_once(":=") {
        Some((key, value)) if !key.is_empty() => Ok((key.to_string(), value.to_string())),
        _ => Err(format!(
            "Invalid argument format '{}'. Expected 'key:=value'",
            token
        )),
    }
}

/// Bringup executor state
pub struct Executor {
    config: ExecutorConfig,
    profile: BringupFile,
    vehicle_id: u16,
    forward: ForwardEndpoint,
    /// Resolved launch arguments, in declaration order
    args: IndexMap<String, String>,
    subst_ctx: SubstitutionContext,
    processes: IndexMap<String, ManagedProcess>,
    /// Graph of the last launch, drives the shutdown order
    graph: Option<DependencyGraph>,
    event_tx: mpsc::UnboundedSender<(String, ProcessEvent)>,
    event_rx: mpsc::UnboundedReceiver<(String, ProcessEvent)>,
}

/// Fully resolved launch graph
#[derive(Debug, Serialize)]
pub struct LaunchPlan {
    pub vehicle_id: u16,
    pub forward: ForwardEndpoint,
    /// Resolved arguments in declaration order
    pub args: IndexMap<String, String>,
    /// Global environment
    pub env: HashMap<String, String>,
    /// Includes in launch order
    pub includes: Vec<LaunchPlanInclude>,
}

/// An include in the launch plan
#[derive(Debug, Serialize)]
pub struct LaunchPlanInclude {
    pub name: String,
    pub package: String,
    pub share_dir: PathBuf,
    pub launch_file: PathBuf,
    pub launch_arguments: IndexMap<String, String>,
    pub env: HashMap<String, String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub group: Option<String>,
    pub dependencies: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub startup_delay_ms: Option<u64>,
    pub command: Vec<String>,
}

impl LaunchPlanInclude {
    fn process_config(&self) -> ProcessConfig {
        let (program, args) = self
            .command
            .split_first()
            .map(|(p, rest)| (p.clone(), rest.to_vec()))
            .unwrap_or_default();

        ProcessConfig {
            name: self.name.clone(),
            program,
            args,
            env: self.env.clone(),
        }
    }
}

impl Executor {
    /// Resolve the vehicle, forward endpoint and every declared argument
    pub fn new(
        profile: BringupFile,
        config: ExecutorConfig,
        raw_overrides: &[String],
    ) -> Result<Self, ExecutorError> {
        let mut overrides = HashMap::new();
        for token in raw_overrides {
            let (name, value) = parse_arg_override(token).map_err(ExecutorError::InvalidOverride)?;
            if !profile.args.contains_key(&name) {
                return Err(ExecutorError::UnknownArgument(name));
            }
            overrides.insert(name, value);
        }

        // The ID must be known before any default is evaluated
        let vehicle_id = vehicle::resolve_vehicle_id(
            raw_overrides,
            &profile.vehicle.id_arg,
            profile.default_vehicle_id()?,
        )?;
        let forward = profile.forward.endpoint_for(vehicle_id)?;
        log::debug!("Vehicle {} forwards MAVLink to {}", vehicle_id, forward);

        let mut subst_ctx = SubstitutionContext::new()
            .with_envs(profile.env.clone())
            .with_ament(config.ament.clone())
            .with_forward(forward.clone());

        let mut args = IndexMap::new();
        for (name, def) in &profile.args {
            // Includes see the parsed ID, never the raw override text
            let value = if *name == profile.vehicle.id_arg {
                vehicle_id.to_string()
            } else if let Some(value) = overrides.get(name) {
                value.clone()
            } else {
                subst_ctx.substitute(&def.default.as_str()).map_err(|e| {
                    ExecutorError::SubstitutionFailed {
                        context: format!("default of argument '{}'", name),
                        source: e,
                    }
                })?
            };
            subst_ctx.args.insert(name.clone(), value.clone());
            args.insert(name.clone(), value);
        }

        let (event_tx, event_rx) = mpsc::unbounded_channel();

        Ok(Self {
            config,
            profile,
            vehicle_id,
            forward,
            args,
            subst_ctx,
            processes: IndexMap::new(),
            graph: None,
            event_tx,
            event_rx,
        })
    }

    pub fn vehicle_id(&self) -> u16 {
        self.vehicle_id
    }

    pub fn forward(&self) -> &ForwardEndpoint {
        &self.forward
    }

    /// Resolved launch arguments, in declaration order
    pub fn args(&self) -> &IndexMap<String, String> {
        &self.args
    }

    fn substitute(&self, value: &str, context: impl FnOnce() -> String) -> Result<String, ExecutorError> {
        self.subst_ctx
            .substitute(value)
            .map_err(|e| ExecutorError::SubstitutionFailed {
                context: context(),
                source: e,
            })
    }

    /// Determine which includes are enabled
    fn resolve_enabled_includes(&self) -> Result<HashSet<String>, ExecutorError> {
        let mut enabled = HashSet::new();

        for (name, include) in &self.profile.includes {
            if let Some(ref groups) = self.config.include_groups {
                match include.group {
                    Some(ref group) if groups.contains(group) => {}
                    _ => continue,
                }
            }

            if self.config.disable_includes.contains(name) {
                continue;
            }

            // Explicit enable overrides the enabled field
            if self.config.enable_includes.contains(name) {
                enabled.insert(name.clone());
                continue;
            }

            let is_enabled = match &include.enabled {
                EnabledValue::Bool(b) => *b,
                EnabledValue::String(s) => {
                    let resolved =
                        self.substitute(s, || format!("include '{}' enabled field", name))?;
                    ArgValue::parse(&resolved).is_truthy()
                }
            };

            if is_enabled {
                enabled.insert(name.clone());
            }
        }

        Ok(enabled)
    }

    fn build_dependency_graph(&self) -> Result<DependencyGraph, ExecutorError> {
        for name in self
            .config
            .enable_includes
            .iter()
            .chain(self.config.disable_includes.iter())
        {
            if !self.profile.includes.contains_key(name) {
                return Err(ExecutorError::UnknownInclude(name.clone()));
            }
        }

        let enabled = self.resolve_enabled_includes()?;
        DependencyGraph::build(&self.profile, &enabled).map_err(ExecutorError::Dependency)
    }

    fn global_env(&self) -> Result<HashMap<String, String>, ExecutorError> {
        self.profile
            .env
            .iter()
            .map(|(k, v)| {
                let resolved = self.substitute(v, || format!("global env '{}'", k))?;
                Ok::<_, ExecutorError>((k.clone(), resolved))
            })
            .collect()
    }

    /// Generate the launch plan (used by dry-run and by launch)
    pub fn plan(&self) -> Result<LaunchPlan, ExecutorError> {
        let graph = self.build_dependency_graph()?;
        self.plan_for(&graph)
    }

    fn plan_for(&self, graph: &DependencyGraph) -> Result<LaunchPlan, ExecutorError> {
        let env = self.global_env()?;

        let includes = graph
            .launch_order()
            .map(|include| self.build_plan_include(include, &env))
            .collect::<Result<Vec<_>, _>>()?;

        Ok(LaunchPlan {
            vehicle_id: self.vehicle_id,
            forward: self.forward.clone(),
            args: self.args.clone(),
            env,
            includes,
        })
    }

    fn build_plan_include(
        &self,
        include: &ResolvedInclude,
        global_env: &HashMap<String, String>,
    ) -> Result<LaunchPlanInclude, ExecutorError> {
        let config = &include.config;
        let share_dir = self
            .config
            .ament
            .find_package_share(&config.package)
            .ok_or_else(|| ExecutorError::PackageNotFound {
                include: include.name.clone(),
                package: config.package.clone(),
            })?;
        let file = self.substitute(&config.file, || format!("include '{}' file", include.name))?;
        let launch_file = share_dir.join(file);

        let mut launch_arguments = IndexMap::new();
        for (key, value) in &config.launch_arguments {
            let resolved = self.substitute(value, || {
                format!("include '{}' launch argument '{}'", include.name, key)
            })?;
            launch_arguments.insert(key.clone(), resolved);
        }

        let mut env = global_env.clone();
        for (k, v) in &config.env {
            let resolved = self.substitute(v, || format!("include '{}' env '{}'", include.name, k))?;
            env.insert(k.clone(), resolved);
        }

        let mut command = vec![
            self.config.launcher.clone(),
            "launch".to_string(),
            launch_file.to_string_lossy().into_owned(),
        ];
        command.extend(launch_arguments.iter().map(|(k, v)| format!("{}:={}", k, v)));

        Ok(LaunchPlanInclude {
            name: include.name.clone(),
            package: config.package.clone(),
            share_dir,
            launch_file,
            launch_arguments,
            env,
            group: config.group.clone(),
            dependencies: include.dependencies.clone(),
            startup_delay_ms: config.startup_delay_ms,
            command,
        })
    }

    /// Launch all includes according to the dependency graph
    pub async fn launch(&mut self, mut shutdown_rx: watch::Receiver<()>) -> Result<(), ExecutorError> {
        let graph = self.build_dependency_graph()?;
        let plan = self.plan_for(&graph)?;
        self.graph = Some(graph);

        log::info!(
            "Launching {} includes for vehicle {} (forwarding to {})",
            plan.includes.len(),
            self.vehicle_id,
            self.forward
        );

        for include in &plan.includes {
            let process = ManagedProcess::new(include.process_config())
                .with_event_sender(self.event_tx.clone());
            self.processes.insert(include.name.clone(), process);
        }

        for include in &plan.includes {
            if shutdown_rx.has_changed().unwrap_or(false) {
                log::info!("Shutdown requested, aborting launch");
                break;
            }

            for dep_name in &include.dependencies {
                if !self
                    .wait_until_running(&include.name, dep_name, &mut shutdown_rx)
                    .await?
                {
                    log::info!("Shutdown requested, aborting launch");
                    return Ok(());
                }
            }

            if let Some(delay) = include.startup_delay_ms {
                log::debug!("[{}] Waiting {}ms before start", include.name, delay);
                tokio::select! {
                    _ = tokio::time::sleep(Duration::from_millis(delay)) => {}
                    Ok(()) = shutdown_rx.changed() => {
                        log::info!("Shutdown requested, aborting launch");
                        return Ok(());
                    }
                }
            }

            if let Some(process) = self.processes.get_mut(&include.name) {
                process
                    .start()
                    .await
                    .map_err(|e| ExecutorError::ProcessFailed {
                        include: include.name.clone(),
                        source: Box::new(e),
                    })?;
            }
        }

        log::info!("All includes launched");
        Ok(())
    }

    /// Returns `false` when shutdown was requested while waiting
    async fn wait_until_running(
        &mut self,
        include: &str,
        dependency: &str,
        shutdown_rx: &mut watch::Receiver<()>,
    ) -> Result<bool, ExecutorError> {
        let mut poll = tokio::time::interval(Duration::from_millis(100));
        loop {
            tokio::select! {
                _ = poll.tick() => {}
                Ok(()) = shutdown_rx.changed() => return Ok(false),
            }

            let Some(dep_process) = self.processes.get_mut(dependency) else {
                return Ok(true);
            };
            let status = dep_process.check_status().await;
            if status == ProcessStatus::Running {
                return Ok(true);
            }
            if status.is_stopped() {
                return Err(ExecutorError::DependencyFailed {
                    include: include.to_string(),
                    dependency: dependency.to_string(),
                });
            }
        }
    }

    /// Relay child output until shutdown or until every child has exited
    pub async fn wait(&mut self, mut shutdown_rx: watch::Receiver<()>) {
        let mut status_check = tokio::time::interval(Duration::from_secs(1));
        loop {
            tokio::select! {
                _ = shutdown_rx.changed() => {
                    log::info!("Shutdown signal received");
                    break;
                }

                event = self.event_rx.recv() => {
                    if let Some((name, event)) = event {
                        log_event(&name, event);
                    }
                }

                _ = status_check.tick() => {
                    let mut all_stopped = true;
                    for process in self.processes.values_mut() {
                        if process.check_status().await.is_running() {
                            all_stopped = false;
                        }
                    }
                    if all_stopped {
                        log::info!("All includes have stopped");
                        break;
                    }
                }
            }
        }
    }

    /// Shutdown all processes in reverse launch order
    pub async fn shutdown(&mut self) {
        log::info!("Shutting down all includes...");

        let Some(graph) = &self.graph else {
            return;
        };

        for include in graph.shutdown_order() {
            let Some(process) = self.processes.get_mut(&include.name) else {
                continue;
            };
            if process.status.is_running() {
                if let Err(e) = process.stop(self.config.shutdown_timeout).await {
                    log::error!("[{}] Error stopping process: {}", include.name, e);
                }
            }
        }

        log::info!("All includes shut down");
    }

    /// Get process status summary
    pub fn status(&self) -> Vec<(&str, ProcessStatus)> {
        self.processes
            .iter()
            .map(|(name, proc)| (name.as_str(), proc.status))
            .collect()
    }
}

fn log_event(name: &str, event: ProcessEvent) {
    match event {
        ProcessEvent::Output { line, is_stderr: true } => log::warn!("[{}] {}", name, line),
        ProcessEvent::Output { line, is_stderr: false } => log::info!("[{}] {}", name, line),
        ProcessEvent::Exited { code } => log::info!("[{}] Process exited with code: {:?}", name, code),
        ProcessEvent::Failed { error } => log::error!("[{}] Process failed: {}", name, error),
        ProcessEvent::Started { pid } => log::info!("[{}] Process started with PID: {}", name, pid),
    }
}

/// Errors that can occur in the executor
#[derive(Debug, thiserror::Error)]
pub enum ExecutorError {
    #[error("{0}")]
    InvalidOverride(String),

    #[error("Unknown argument: {0}")]
    UnknownArgument(String),

    #[error("Unknown include: {0}")]
    UnknownInclude(String),

    #[error(transparent)]
    VehicleId(#[from] VehicleIdError),

    #[error(transparent)]
    Forward(#[from] ForwardError),

    #[error("Dependency error: {0}")]
    Dependency(#[from] DependencyError),

    #[error("Substitution failed in {context}: {source}")]
    SubstitutionFailed {
        context: String,
        #[source]
        source: crate::config::SubstitutionError,
    },

    #[error("Include '{include}': package '{package}' not found in AMENT_PREFIX_PATH")]
    PackageNotFound { include: String, package: String },

    #[error("Process failed for include '{include}': {source}")]
    ProcessFailed {
        include: String,
        #[source]
        source: Box<dyn std::error::Error + Send + Sync>,
    },

    #[error("Dependency '{dependency}' failed before include '{include}' could start")]
    DependencyFailed { include: String, dependency: String },
}

/// Display the launch plan in a human-readable format
impl std::fmt::Display for LaunchPlan {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        writeln!(f, "Launch Plan")?;
        writeln!(f, "===========")?;
        writeln!(f)?;
        writeln!(f, "Vehicle: {}", self.vehicle_id)?;
        writeln!(f, "MAVLink forward: {}", self.forward)?;
        writeln!(f)?;

        if !self.args.is_empty() {
            writeln!(f, "Arguments:")?;
            for (key, value) in &self.args {
                writeln!(f, "  {}: {}", key, value)?;
            }
            writeln!(f)?;
        }

        if !self.env.is_empty() {
            writeln!(f, "Global Environment:")?;
            let mut env: Vec<_> = self.env.iter().collect();
            env.sort();
            for (key, value) in env {
                writeln!(f, "  {}={}", key, value)?;
            }
            writeln!(f)?;
        }

        writeln!(f, "Includes (in launch order):")?;
        for (i, include) in self.includes.iter().enumerate() {
            writeln!(f)?;
            writeln!(
                f,
                "  {}. {} {}",
                i + 1,
                include.name,
                include
                    .group
                    .as_ref()
                    .map(|g| format!("[{}]", g))
                    .unwrap_or_default()
            )?;
            writeln!(f, "     Launch file: {}", include.launch_file.display())?;
            if !include.launch_arguments.is_empty() {
                writeln!(f, "     Launch arguments:")?;
                for (key, value) in &include.launch_arguments {
                    writeln!(f, "       {}: {}", key, value)?;
                }
            }
            writeln!(f, "     Command: {}", include.command.join(" "))?;

            if !include.dependencies.is_empty() {
                writeln!(f, "     Depends on: {}", include.dependencies.join(", "))?;
            }

            if let Some(delay) = include.startup_delay_ms {
                writeln!(f, "     Startup delay: {}ms", delay)?;
            }
        }

        Ok(())
    }
}
