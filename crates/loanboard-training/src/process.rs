//! External pipeline execution.
//!
//! The pipeline is an opaque program. It reads the dataset, writes the report
//! artifacts and signals success only through its exit code.

use crate::error::{TrainingError, TrainingResult};
use crate::job::{RunOutput, TrainingRunId};
use crate::layout::ProjectLayout;
use crate::progress::{ProgressEvent, ProgressSink};
use crate::trainer::Trainer;
use async_trait::async_trait;
use chrono::Utc;
use std::path::PathBuf;
use std::process::Stdio;
use std::time::Duration;
use tokio::io::{AsyncBufReadExt, AsyncRead, BufReader};
use tokio::process::{Child, Command};
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

/// Environment variables exported to the pipeline so it does not have to
/// hardcode the project paths.
pub const ENV_PROJECT_ROOT: &str = "LOANBOARD_PROJECT_ROOT";
pub const ENV_DATASET_PATH: &str = "LOANBOARD_DATASET_PATH";
pub const ENV_REPORTS_DIR: &str = "LOANBOARD_REPORTS_DIR";

/// How long output readers get to reach EOF after a timed out pipeline is killed.
const KILL_GRACE: Duration = Duration::from_secs(2);

/// How to invoke the external pipeline.
#[derive(Debug, Clone)]
pub struct PipelineCommand {
    pub program: String,
    pub args: Vec<String>,
    pub working_dir: PathBuf,
    pub envs: Vec<(String, String)>,
    /// Kill the pipeline when it runs longer than this. `None` waits forever.
    pub timeout: Option<Duration>,
}

impl PipelineCommand {
    #[must_use]
    pub fn new(program: impl Into<String>, working_dir: PathBuf) -> Self {
        Self { program: program.into(), args: Vec::new(), working_dir, envs: Vec::new(), timeout: None }
    }

    /// Command rooted at the project directory, with the project paths exported.
    #[must_use]
    pub fn for_layout(layout: &ProjectLayout, program: impl Into<String>) -> Self {
        Self::new(program, layout.root().to_path_buf())
            .with_env(ENV_PROJECT_ROOT, layout.root().display().to_string())
            .with_env(ENV_DATASET_PATH, layout.dataset_path().display().to_string())
            .with_env(ENV_REPORTS_DIR, layout.reports_dir().display().to_string())
    }

    #[must_use]
    pub fn with_args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.args.extend(args.into_iter().map(Into::into));
        self
    }

    #[must_use]
    pub fn with_env(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.envs.push((key.into(), value.into()));
        self
    }

    #[must_use]
    pub fn with_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.timeout = timeout;
        self
    }
}

/// Runs the pipeline as a child process and captures both output streams.
#[derive(Debug, Clone)]
pub struct ProcessTrainer {
    command: PipelineCommand,
}

impl ProcessTrainer {
    #[must_use]
    pub fn new(command: PipelineCommand) -> Self {
        Self { command }
    }
}

#[async_trait]
impl Trainer for ProcessTrainer {
    fn id(&self) -> &'static str {
        "process"
    }

    async fn run(&self, run_id: &TrainingRunId, progress: &dyn ProgressSink) -> TrainingResult<RunOutput> {
        let cmd = &self.command;
        let started_at = Utc::now();

        info!(
            %run_id,
            program = %cmd.program,
            args = ?cmd.args,
            working_dir = %cmd.working_dir.display(),
            timeout_secs = cmd.timeout.map(|t| t.as_secs()),
            "Starting training process"
        );

        let mut command = Command::new(&cmd.program);
        command
            .args(&cmd.args)
            .current_dir(&cmd.working_dir)
            .envs(cmd.envs.iter().map(|(k, v)| (k.as_str(), v.as_str())))
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);
        #[cfg(unix)]
        command.process_group(0);

        let mut child = command
            .spawn()
            .map_err(|source| TrainingError::Spawn { program: cmd.program.clone(), source })?;
        let group = ProcessGroup::of(&child);

        progress.on_event(ProgressEvent::Started { run_id: run_id.clone() });

        let stdout = child
            .stdout
            .take()
            .ok_or_else(|| anyhow::anyhow!("pipeline stdout was not captured"))?;
        let stderr = child
            .stderr
            .take()
            .ok_or_else(|| anyhow::anyhow!("pipeline stderr was not captured"))?;

        // Both pipes are drained in their own tasks so the child never blocks on a full pipe.
        let (tx, mut rx) = mpsc::unbounded_channel();
        let stdout_task = tokio::spawn(drain_lines(stdout, tx.clone(), Stream::Stdout));
        let stderr_task = tokio::spawn(drain_lines(stderr, tx, Stream::Stderr));

        // The run is over once the process has exited and both pipes are closed;
        // the timeout covers both.
        let mut output = CapturedOutput::default();
        let finished = {
            let run = async {
                let mut status = None;
                let mut open = true;
                loop {
                    tokio::select! {
                        exited = child.wait(), if status.is_none() => status = Some(exited),
                        received = rx.recv(), if open => match received {
                            Some((stream, line)) => output.record(run_id, progress, stream, line),
                            None => open = false,
                        },
                    }
                    if !open && let Some(status) = status.take() {
                        break status;
                    }
                }
            };
            match cmd.timeout {
                Some(limit) => tokio::time::timeout(limit, run).await.ok(),
                None => Some(run.await),
            }
        };

        let Some(status) = finished else {
            let after = cmd.timeout.unwrap_or_default();
            warn!(%run_id, timeout_secs = after.as_secs(), "Training process timed out, killing it");
            group.kill();
            if let Err(e) = child.kill().await {
                warn!(%run_id, error = %e, "Failed to kill timed out training process");
            }

            let collected = tokio::time::timeout(KILL_GRACE, async {
                while let Some((stream, line)) = rx.recv().await {
                    output.record(run_id, progress, stream, line);
                }
            })
            .await;
            if collected.is_err() {
                warn!(%run_id, "Pipeline output still open after kill, discarding the rest");
                stdout_task.abort();
                stderr_task.abort();
            }

            return Err(TrainingError::TimedOut { after, stdout: output.stdout, stderr: output.stderr });
        };
        let status = status?;

        for task in [stdout_task, stderr_task] {
            task.await.map_err(|e| anyhow::anyhow!("pipeline output reader failed: {e}"))??;
        }
        group.release();

        let exit_code = status.code().unwrap_or(-1);
        progress.on_event(ProgressEvent::Finished { run_id: run_id.clone(), exit_code });

        Ok(RunOutput {
            run_id: run_id.clone(),
            exit_code,
            stdout: output.stdout,
            stderr: output.stderr,
            started_at,
            finished_at: Utc::now(),
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Stream {
    Stdout,
    Stderr,
}

#[derive(Debug, Default)]
struct CapturedOutput {
    stdout: String,
    stderr: String,
}

impl CapturedOutput {
    fn record(&mut self, run_id: &TrainingRunId, progress: &dyn ProgressSink, stream: Stream, line: String) {
        let run_id = run_id.clone();
        match stream {
            Stream::Stdout => {
                self.stdout.push_str(&line);
                progress.on_event(ProgressEvent::Stdout { run_id, line });
            }
            Stream::Stderr => {
                self.stderr.push_str(&line);
                progress.on_event(ProgressEvent::Stderr { run_id, line });
            }
        }
    }
}

/// The pipeline's process group. Helpers the pipeline starts share it, so
/// killing the group stops them along with the pipeline.
///
/// Dropped while still armed (the run was cancelled), the whole group is killed.
#[derive(Debug)]
struct ProcessGroup {
    #[cfg_attr(not(unix), allow(dead_code))]
    pgid: Option<u32>,
    armed: bool,
}

impl ProcessGroup {
    fn of(child: &Child) -> Self {
        Self { pgid: child.id(), armed: true }
    }

    fn kill(mut self) {
        self.signal();
        self.armed = false;
    }

    /// The leader exited on its own; leave any stragglers alone.
    fn release(mut self) {
        self.armed = false;
    }

    #[cfg(unix)]
    fn signal(&self) {
        use nix::sys::signal::{Signal, killpg};
        use nix::unistd::Pid;

        let Some(pgid) = self.pgid.and_then(|id| i32::try_from(id).ok()) else {
            return;
        };
        if let Err(e) = killpg(Pid::from_raw(pgid), Signal::SIGKILL) {
            debug!(pgid, error = %e, "Could not signal pipeline process group");
        }
    }

    #[cfg(not(unix))]
    fn signal(&self) {}
}

impl Drop for ProcessGroup {
    fn drop(&mut self) {
        if self.armed {
            self.signal();
        }
    }
}

/// Read `reader` to EOF, sending each line (lossily decoded) to `tx`.
async fn drain_lines<R>(reader: R, tx: mpsc::UnboundedSender<(Stream, String)>, stream: Stream) -> std::io::Result<()>
where
    R: AsyncRead + Unpin,
{
    let mut reader = BufReader::new(reader);
    let mut line = Vec::new();
    loop {
        line.clear();
        if reader.read_until(b'\n', &mut line).await? == 0 {
            return Ok(());
        }
        if tx.send((stream, String::from_utf8_lossy(&line).into_owned())).is_err() {
            return Ok(());
        }
    }
}
