//! Supervised child process running one included launch description

use std::collections::HashMap;
use std::process::Stdio;
use std::time::{Duration, Instant};
use tokio::io::{AsyncBufReadExt, AsyncRead, BufReader};
use tokio::process::{Child, Command};
use tokio::sync::mpsc;

/// Sender half of the process event channel, tagged with the include name
pub type EventSender = mpsc::UnboundedSender<(String, ProcessEvent)>;

/// Process status
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProcessStatus {
    /// Waiting to be started
    Pending,
    Starting,
    Running,
    /// Exited, with exit code when known
    Stopped(Option<i32>),
    /// Could not be spawned
    Failed,
}

impl ProcessStatus {
    pub fn is_running(&self) -> bool {
        matches!(self, ProcessStatus::Running | ProcessStatus::Starting)
    }

    pub fn is_stopped(&self) -> bool {
        matches!(self, ProcessStatus::Stopped(_) | ProcessStatus::Failed)
    }
}

/// Configuration for spawning a process
#[derive(Debug, Clone)]
pub struct ProcessConfig {
    /// Include name (for logging)
    pub name: String,
    /// Program to run, e.g. `ros2`
    pub program: String,
    /// Command line arguments
    pub args: Vec<String>,
    /// Extra environment variables
    pub env: HashMap<String, String>,
}

impl ProcessConfig {
    /// Command line as a single string, for logs and plans
    pub fn command_line(&self) -> String {
        std::iter::once(self.program.as_str())
            .chain(self.args.iter().map(String::as_str))
            .collect::<Vec<_>>()
            .join(" ")
    }
}

/// Event emitted by a managed process
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProcessEvent {
    Started { pid: u32 },
    /// One line of stdout or stderr
    Output { line: String, is_stderr: bool },
    Exited { code: Option<i32> },
    Failed { error: String },
}

/// A managed child process
pub struct ManagedProcess {
    pub config: ProcessConfig,
    pub status: ProcessStatus,
    pub pid: Option<u32>,
    pub started_at: Option<Instant>,
    child: Option<Child>,
    event_tx: Option<EventSender>,
}

impl ManagedProcess {
    pub fn new(config: ProcessConfig) -> Self {
        Self {
            config,
            status: ProcessStatus::Pending,
            pid: None,
            started_at: None,
            child: None,
            event_tx: None,
        }
    }

    /// Set the event sender for this process
    pub fn with_event_sender(mut self, tx: EventSender) -> Self {
        self.event_tx = Some(tx);
        self
    }

    fn emit(&self, event: ProcessEvent) {
        if let Some(tx) = &self.event_tx {
            let _ = tx.send((self.config.name.clone(), event));
        }
    }

    /// Start the process
    pub async fn start(&mut self) -> Result<(), ProcessError> {
        if self.status.is_running() {
            return Err(ProcessError::AlreadyRunning(self.config.name.clone()));
        }

        self.status = ProcessStatus::Starting;
        log::info!("[{}] Starting: {}", self.config.name, self.config.command_line());

        let mut cmd = Command::new(&self.config.program);
        cmd.args(&self.config.args)
            .envs(&self.config.env)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);

        let mut child = match cmd.spawn() {
            Ok(child) => child,
            Err(e) => {
                self.status = ProcessStatus::Failed;
                let error = format!("Failed to spawn process: {}", e);
                log::error!("[{}] {}", self.config.name, error);
                self.emit(ProcessEvent::Failed { error });

                return Err(ProcessError::SpawnFailed {
                    name: self.config.name.clone(),
                    source: e,
                });
            }
        };

        let pid = child.id().unwrap_or(0);
        self.pid = Some(pid);
        self.status = ProcessStatus::Running;
        self.started_at = Some(Instant::now());
        self.emit(ProcessEvent::Started { pid });

        if let Some(tx) = &self.event_tx {
            if let Some(stdout) = child.stdout.take() {
                forward_lines(self.config.name.clone(), stdout, false, tx.clone());
            }
            if let Some(stderr) = child.stderr.take() {
                forward_lines(self.config.name.clone(), stderr, true, tx.clone());
            }
        }

        self.child = Some(child);
        Ok(())
    }

    /// Stop the process gracefully (SIGTERM, then SIGKILL after timeout)
    pub async fn stop(&mut self, timeout: Duration) -> Result<(), ProcessError> {
        let Some(mut child) = self.child.take() else {
            return Ok(());
        };

        log::info!("[{}] Stopping process...", self.config.name);

        #[cfg(unix)]
        self.signal(nix::sys::signal::Signal::SIGTERM);

        #[cfg(not(unix))]
        {
            let _ = child.kill().await;
        }

        match tokio::time::timeout(timeout, child.wait()).await {
            Ok(Ok(status)) => {
                let code = status.code();
                self.status = ProcessStatus::Stopped(code);
                log::info!("[{}] Process exited with code: {:?}", self.config.name, code);
                self.emit(ProcessEvent::Exited { code });
            }
            Ok(Err(e)) => {
                log::error!("[{}] Error waiting for process: {}", self.config.name, e);
                self.status = ProcessStatus::Stopped(None);
            }
            Err(_) => {
                log::warn!(
                    "[{}] Process did not exit within {:?}, forcing kill",
                    self.config.name,
                    timeout
                );
                if let Err(e) = child.kill().await {
                    log::error!("[{}] Failed to kill process: {}", self.config.name, e);
                }
                self.status = ProcessStatus::Stopped(None);
                self.emit(ProcessEvent::Exited { code: None });
            }
        }

        self.pid = None;
        Ok(())
    }

    #[cfg(unix)]
    fn signal(&self, signal: nix::sys::signal::Signal) {
        use nix::sys::signal::kill;
        use nix::unistd::Pid;

        if let Some(pid) = self.pid {
            if let Err(e) = kill(Pid::from_raw(pid as i32), signal) {
                log::debug!("[{}] Failed to send {:?}: {}", self.config.name, signal, e);
            }
        }
    }

    /// Poll the child and update the status if it has exited
    pub async fn check_status(&mut self) -> ProcessStatus {
        if let Some(child) = &mut self.child {
            match child.try_wait() {
                Ok(Some(status)) => {
                    let code = status.code();
                    self.status = ProcessStatus::Stopped(code);
                    self.pid = None;
                    self.child = None;
                    self.emit(ProcessEvent::Exited { code });
                }
                Ok(None) => {}
                Err(e) => {
                    log::error!(
                        "[{}] Error checking process status: {}",
                        self.config.name,
                        e
                    );
                }
            }
        }

        self.status
    }

    pub fn uptime(&self) -> Option<Duration> {
        self.started_at.map(|t| t.elapsed())
    }
}

/// Relay every line of a child stream as an output event
fn forward_lines<R>(name: String, stream: R, is_stderr: bool, tx: EventSender)
where
    R: AsyncRead + Unpin + Send + 'static,
{
    tokio::spawn(async move {
        let mut lines = BufReader::new(stream).lines();
        while let Ok(Some(line)) = lines.next_line().await {
            if tx
                .send((name.clone(), ProcessEvent::Output { line, is_stderr }))
                .is_err()
            {
                break;
            }
        }
    });
}

/// Errors that can occur with managed processes
#[derive(Debug, thiserror::Error)]
pub enum ProcessError {
    #[error("Process '{0}' is already running")]
    AlreadyRunning(String),

    #[error("Failed to spawn process '{name}': {source}")]
    SpawnFailed {
        name: String,
        #[source]
        source: std::io::Error,
    },
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;

    fn config(program: &str, args: &[&str]) -> ProcessConfig {
        ProcessConfig {
            name: "test".to_string(),
            program: program.to_string(),
            args: args.iter().map(|s| s.to_string()).collect(),
            env: HashMap::new(),
        }
    }

    #[test]
    fn test_command_line() {
        let cfg = config("ros2", &["launch", "/share/autopilot/launch/autopilot.launch.py", "id:=1"]);
        assert_eq!(
            cfg.command_line(),
            "ros2 launch /share/autopilot/launch/autopilot.launch.py id:=1"
        );
    }

    #[tokio::test]
    async fn test_output_and_exit_events() {
        let (tx, mut rx) = mpsc::unbounded_channel();
        let mut process =
            ManagedProcess::new(config("sh", &["-c", "echo hello"])).with_event_sender(tx);

        process.start().await.unwrap();
        assert!(matches!(
            rx.recv().await,
            Some((_, ProcessEvent::Started { .. }))
        ));
        assert_eq!(
            rx.recv().await,
            Some((
                "test".to_string(),
                ProcessEvent::Output {
                    line: "hello".to_string(),
                    is_stderr: false
                }
            ))
        );

        let mut status = process.check_status().await;
        for _ in 0..50 {
            if status.is_stopped() {
                break;
            }
            tokio::time::sleep(Duration::from_millis(20)).await;
            status = process.check_status().await;
        }
        assert_eq!(status, ProcessStatus::Stopped(Some(0)));
    }

    #[tokio::test]
    async fn test_spawn_failure() {
        let mut process = ManagedProcess::new(config("/nonexistent/pegasus_launcher", &[]));
        let result = process.start().await;
        assert!(matches!(result, Err(ProcessError::SpawnFailed { .. })));
        assert_eq!(process.status, ProcessStatus::Failed);
    }

    #[tokio::test]
    async fn test_stop_running_process() {
        let mut process = ManagedProcess::new(config("sleep", &["30"]));
        process.start().await.unwrap();
        assert!(process.status.is_running());
        assert!(process.uptime().is_some());

        process.stop(Duration::from_secs(2)).await.unwrap();
        assert!(process.status.is_stopped());
        assert_eq!(process.pid, None);
    }

    #[tokio::test]
    async fn test_start_twice_rejected() {
        let mut process = ManagedProcess::new(config("sleep", &["30"]));
        process.start().await.unwrap();
        let pid = process.pid;

        let result = process.start().await;
        assert!(matches!(result, Err(ProcessError::AlreadyRunning(ref name)) if name == "test"));
        assert_eq!(process.pid, pid);

        process.stop(Duration::from_secs(2)).await.unwrap();
    }
}
