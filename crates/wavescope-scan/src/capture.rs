//! Packet-capture child process lifecycle.
//!
//! A [`CaptureSession`] owns one `tcpdump` child, optionally launched
//! through `pkexec`. It shares nothing with the scan loop: the loop keeps
//! polling whether or not a capture runs.

use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::time::Duration;

use chrono::{DateTime, Utc};
use tokio::process::{Child, Command};

use crate::error::CaptureError;

/// How long `stop` waits after SIGINT before killing the child.
pub const DEFAULT_STOP_GRACE: Duration = Duration::from_secs(2);

/// What to launch.
#[derive(Debug, Clone, PartialEq)]
pub struct CaptureConfig {
    pub program: String,
    pub args: Vec<String>,
    /// Wrap the command (and the stop signal) in `pkexec`.
    pub privileged: bool,
    /// File the child writes to.
    pub output: PathBuf,
}

impl CaptureConfig {
    /// `tcpdump -i <iface> -e -nn -U -w <output>`, unbuffered so the file
    /// grows while the capture runs.
    pub fn tcpdump(interface: &str, output: impl Into<PathBuf>, privileged: bool) -> Self {
        let output = output.into();
        Self {
            program: "tcpdump".into(),
            args: vec![
                "-i".into(),
                interface.into(),
                "-e".into(),
                "-nn".into(),
                "-U".into(),
                "-w".into(),
                output.display().to_string(),
            ],
            privileged,
            output,
        }
    }

    /// Default output file name for a capture started at `at`.
    pub fn default_file_name(interface: &str, at: DateTime<Utc>) -> String {
        format!("wavescope_{interface}_{}.pcap", at.format("%Y%m%d_%H%M%S"))
    }

    fn command(&self) -> (String, Vec<String>) {
        if self.privileged {
            let mut args = Vec::with_capacity(self.args.len() + 1);
            args.push(self.program.clone());
            args.extend(self.args.iter().cloned());
            ("pkexec".into(), args)
        } else {
            (self.program.clone(), self.args.clone())
        }
    }
}

/// Result of a stopped capture.
#[derive(Debug, Clone, PartialEq)]
pub struct CaptureSummary {
    pub output: PathBuf,
    pub bytes: u64,
    pub started_at: DateTime<Utc>,
    pub stopped_at: DateTime<Utc>,
}

struct Running {
    child: Child,
    started_at: DateTime<Utc>,
}

/// Start/stop/cleanup handle for one capture child.
pub struct CaptureSession {
    config: CaptureConfig,
    running: Option<Running>,
}

impl CaptureSession {
    pub fn new(config: CaptureConfig) -> Self {
        Self {
            config,
            running: None,
        }
    }

    pub fn output(&self) -> &Path {
        &self.config.output
    }

    /// Process id of the running child.
    pub fn pid(&self) -> Option<u32> {
        self.running.as_ref().and_then(|r| r.child.id())
    }

    /// Whether the child is still alive. Reaps it if it has exited.
    pub fn is_running(&mut self) -> bool {
        let Some(running) = self.running.as_mut() else {
            return false;
        };
        match running.child.try_wait() {
            Ok(None) => true,
            Ok(Some(status)) => {
                tracing::info!(%status, output = %self.config.output.display(), "capture exited");
                self.running = None;
                false
            }
            Err(e) => {
                tracing::warn!(error = %e, "could not query capture process");
                true
            }
        }
    }

    /// Launch the capture child.
    pub fn start(&mut self) -> Result<(), CaptureError> {
        if self.is_running() {
            return Err(CaptureError::AlreadyRunning { pid: self.pid() });
        }
        if let Some(dir) = self.config.output.parent().filter(|d| !d.as_os_str().is_empty()) {
            std::fs::create_dir_all(dir)?;
        }

        let (program, args) = self.config.command();
        let child = Command::new(&program)
            .args(&args)
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .kill_on_drop(true)
            .spawn()
            .map_err(|source| CaptureError::Spawn {
                program: program.clone(),
                source,
            })?;

        tracing::info!(
            program = %program,
            pid = child.id(),
            output = %self.config.output.display(),
            "capture started"
        );
        self.running = Some(Running {
            child,
            started_at: Utc::now(),
        });
        Ok(())
    }

    /// Interrupt the child so it flushes its output, killing it if it has
    /// not exited after `grace`.
    pub async fn stop(&mut self, grace: Duration) -> Result<CaptureSummary, CaptureError> {
        let Running {
            mut child,
            started_at,
        } = self.running.take().ok_or(CaptureError::NotRunning)?;

        if let Some(pid) = child.id() {
            self.signal(pid, "-INT").await;
        }
        match tokio::time::timeout(grace, child.wait()).await {
            Ok(Ok(status)) => tracing::debug!(%status, "capture exited after interrupt"),
            Ok(Err(e)) => return Err(CaptureError::Io(e)),
            Err(_) => {
                tracing::warn!(grace_ms = grace.as_millis() as u64, "capture ignored interrupt; killing");
                self.force_kill(&mut child, grace).await?;
            }
        }

        let bytes = file_size(&self.config.output);
        let summary = CaptureSummary {
            output: self.config.output.clone(),
            bytes,
            started_at,
            stopped_at: Utc::now(),
        };
        tracing::info!(
            output = %summary.output.display(),
            bytes,
            duration_s = (summary.stopped_at - started_at).num_seconds(),
            "capture stopped"
        );
        Ok(summary)
    }

    /// Kill any running child and delete the output file if it is empty.
    ///
    /// Returns whether a file was deleted.
    pub async fn cleanup(&mut self) -> Result<bool, CaptureError> {
        if let Some(mut running) = self.running.take() {
            self.force_kill(&mut running.child, DEFAULT_STOP_GRACE).await?;
        }
        remove_if_empty(&self.config.output)
    }

    /// SIGKILL the child. A privileged child belongs to root, so the signal
    /// goes through `pkexec` like the interrupt does; `Child::kill` is only
    /// the last resort there.
    async fn force_kill(&self, child: &mut Child, grace: Duration) -> Result<(), CaptureError> {
        if self.config.privileged {
            if let Some(pid) = child.id() {
                self.signal(pid, "-KILL").await;
                if let Ok(status) = tokio::time::timeout(grace, child.wait()).await {
                    tracing::debug!(status = ?status, "capture killed");
                    return Ok(());
                }
            }
            tracing::warn!("privileged kill did not reap capture");
        }
        child.kill().await?;
        Ok(())
    }

    async fn signal(&self, pid: u32, signal: &str) {
        let (program, args) = signal_command(self.config.privileged, signal, pid);
        let result = Command::new(&program)
            .args(&args)
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .status()
            .await;
        if let Err(e) = result {
            tracing::debug!(error = %e, signal, "could not signal capture");
        }
    }
}

/// `kill <signal> <pid>`, through `pkexec` when the child runs as root.
fn signal_command(privileged: bool, signal: &str, pid: u32) -> (String, Vec<String>) {
    let args = vec![signal.to_string(), pid.to_string()];
    if privileged {
        let mut wrapped = vec!["kill".to_string()];
        wrapped.extend(args);
        ("pkexec".into(), wrapped)
    } else {
        ("kill".into(), args)
    }
}

fn file_size(path: &Path) -> u64 {
    std::fs::metadata(path).map(|m| m.len()).unwrap_or(0)
}

/// Delete `path` when it exists and holds no data.
pub fn remove_if_empty(path: &Path) -> Result<bool, CaptureError> {
    match std::fs::metadata(path) {
        Ok(meta) if meta.is_file() && meta.len() == 0 => {
            std::fs::remove_file(path)?;
            tracing::info!(path = %path.display(), "removed empty capture file");
            Ok(true)
        }
        Ok(_) => Ok(false),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(false),
        Err(e) => Err(CaptureError::Io(e)),
    }
}
