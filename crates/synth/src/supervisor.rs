//! Spawning and supervising the synthesis tool.
//!
//! The tool runs in its own process group so that a timeout can be cleaned
//! up by signalling the whole group. The group is only signalled while its
//! leader is still unreaped.

use std::path::{Path, PathBuf};
use std::process::{ExitStatus, Stdio};
use std::time::{Duration, Instant};
use tokio::process::{Child, Command};
use tracing::{debug, warn};

/// Program and leading arguments used to launch the tool.
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct ToolCommand {
    pub program: String,
    #[serde(default)]
    pub args: Vec<String>,
}

impl ToolCommand {
    pub fn new(program: impl Into<String>) -> Self {
        Self {
            program: program.into(),
            args: Vec::new(),
        }
    }

    pub fn with_args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.args = args.into_iter().map(Into::into).collect();
        self
    }
}

impl Default for ToolCommand {
    fn default() -> Self {
        Self::new("vitis_hls")
    }
}

#[derive(Debug)]
pub enum Supervision {
    Exited { status: ExitStatus, elapsed: Duration },
    TimedOut { elapsed: Duration },
}

impl Supervision {
    pub fn finished(&self) -> bool {
        matches!(self, Supervision::Exited { .. })
    }
}

/// An owned, running tool process.
pub struct ToolProcess {
    child: Child,
    pid: Option<u32>,
    started: Instant,
}

impl ToolProcess {
    /// Launch `<tool> [args] -f <script> -l <log>` inside `work_dir`.
    pub fn spawn(
        tool: &ToolCommand,
        work_dir: &Path,
        script: &Path,
        log: &Path,
    ) -> std::io::Result<Self> {
        let mut command = Command::new(&tool.program);
        command
            .args(&tool.args)
            .arg("-f")
            .arg(script)
            .arg("-l")
            .arg(log)
            .current_dir(work_dir)
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .kill_on_drop(true);
        #[cfg(unix)]
        command.process_group(0);

        let child = command.spawn()?;
        let pid = child.id();
        debug!(pid, program = %tool.program, script = %script.display(), "spawned synthesis tool");
        Ok(Self {
            child,
            pid,
            started: Instant::now(),
        })
    }

    pub fn pid(&self) -> Option<u32> {
        self.pid
    }

    /// Wait for exit or `timeout`, whichever comes first, then make sure the
    /// process and everything it started is gone.
    pub async fn supervise(mut self, timeout: Duration) -> Supervision {
        let outcome = match tokio::time::timeout(timeout, self.child.wait()).await {
            Ok(Ok(status)) => Supervision::Exited {
                status,
                elapsed: self.started.elapsed(),
            },
            Ok(Err(err)) => {
                warn!(pid = self.pid, error = %err, "failed to wait on synthesis tool");
                Supervision::TimedOut {
                    elapsed: self.started.elapsed(),
                }
            }
            Err(_) => {
                warn!(
                    pid = self.pid,
                    timeout_secs = timeout.as_secs_f64(),
                    "synthesis timed out"
                );
                Supervision::TimedOut {
                    elapsed: self.started.elapsed(),
                }
            }
        };

        if outcome.finished() {
            // The leader is reaped, so its group id may already belong to
            // someone else.
            debug!(pid = self.pid, "synthesis tool exited; leaving process group alone");
        } else {
            // The leader is still unreaped here, which keeps the group id ours.
            self.kill_tree();
            if let Err(err) = self.child.wait().await {
                warn!(pid = self.pid, error = %err, "failed to reap synthesis tool");
            }
        }
        outcome
    }

    fn kill_tree(&mut self) {
        #[cfg(unix)]
        if let Some(pid) = self.pid {
            kill_process_group(pid);
        }
        if let Err(err) = self.child.start_kill() {
            debug!(pid = self.pid, error = %err, "tool process already gone");
        }
    }
}

#[cfg(unix)]
fn kill_process_group(pgid: u32) {
    let Ok(pgid) = libc::pid_t::try_from(pgid) else {
        return;
    };
    // SAFETY: killpg only sends a signal; the group was created for this tool.
    let rc = unsafe { libc::killpg(pgid, libc::SIGKILL) };
    if rc != 0 {
        let err = std::io::Error::last_os_error();
        if err.raw_os_error() == Some(libc::ESRCH) {
            debug!(pgid, "process group already terminated");
        } else {
            warn!(pgid, error = %err, "failed to kill synthesis process group");
        }
    }
}

/// Working files of one candidate, all relative to the work directory.
#[derive(Debug, Clone)]
pub struct CandidateFiles {
    pub source: PathBuf,
    pub script: PathBuf,
    pub log: PathBuf,
    pub project_dir: PathBuf,
}

impl CandidateFiles {
    pub fn new(work_dir: &Path, project: &str, id: u64, source_extension: &str) -> Self {
        Self {
            source: work_dir.join(format!("kernel_{}{}", id, source_extension)),
            script: work_dir.join(format!("script_{}.tcl", id)),
            log: work_dir.join(format!("vitis_hls_{}.log", id)),
            project_dir: work_dir.join(project),
        }
    }

    /// Best-effort removal; failures are logged and otherwise ignored.
    pub fn remove(&self) {
        for file in [&self.source, &self.script, &self.log] {
            if let Err(err) = std::fs::remove_file(file) {
                if err.kind() != std::io::ErrorKind::NotFound {
                    warn!(path = %file.display(), error = %err, "failed to remove candidate file");
                }
            }
        }
        if let Err(err) = std::fs::remove_dir_all(&self.project_dir) {
            if err.kind() != std::io::ErrorKind::NotFound {
                warn!(
                    path = %self.project_dir.display(),
                    error = %err,
                    "failed to remove project directory"
                );
            }
        }
    }
}
