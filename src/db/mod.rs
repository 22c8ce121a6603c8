use anyhow::{Context, Result, bail};
use std::io::Read;
use std::process::{Command, Stdio};
use std::time::{Duration, Instant};
use tracing::debug;

use crate::config::Endpoint;

pub mod ddl;
pub mod snapshot;

pub use ddl::{CliDdlFetcher, DdlFetcher};
pub use snapshot::load_snapshot;

/// Runs one SQL statement against a database and returns its raw
/// tab-separated output. Both endpoints are driven through this seam so the
/// loaders and tests never touch a real client binary.
pub trait SqlRunner {
    fn run(&self, sql: &str) -> Result<String>;
}

/// Shells out to the configured command-line client in silent mode. The child
/// is killed once the configured timeout elapses; a hung server must never
/// hang the whole run.
pub struct CliRunner {
    endpoint: Endpoint,
    timeout: Duration,
}

impl CliRunner {
    pub fn new(endpoint: Endpoint, timeout: Duration) -> CliRunner {
        CliRunner { endpoint, timeout }
    }
}

/// Run a child process to completion, killing it when the timeout elapses.
/// The pipes are drained on their own threads so large output cannot deadlock
/// against a full pipe buffer while the child is polled.
pub(crate) fn run_with_timeout(
    mut command: Command,
    timeout: Duration,
    what: &str,
) -> Result<(std::process::ExitStatus, String, String)> {
    let mut child = command
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .spawn()
        .with_context(|| format!("failed to launch {what}"))?;

    let mut stdout_pipe = child.stdout.take().context("child stdout unavailable")?;
    let mut stderr_pipe = child.stderr.take().context("child stderr unavailable")?;
    let stdout_reader = std::thread::spawn(move || {
        let mut buf = String::new();
        let _ = stdout_pipe.read_to_string(&mut buf);
        buf
    });
    let stderr_reader = std::thread::spawn(move || {
        let mut buf = String::new();
        let _ = stderr_pipe.read_to_string(&mut buf);
        buf
    });

    let deadline = Instant::now() + timeout;
    let status = loop {
        if let Some(status) = child.try_wait().with_context(|| format!("waiting for {what}"))? {
            break status;
        }
        if Instant::now() >= deadline {
            let _ = child.kill();
            let _ = child.wait();
            bail!("{what} timed out after {}s", timeout.as_secs());
        }
        std::thread::sleep(Duration::from_millis(50));
    };

    let stdout = stdout_reader.join().unwrap_or_default();
    let stderr = stderr_reader.join().unwrap_or_default();
    Ok((status, stdout, stderr))
}

impl SqlRunner for CliRunner {
    fn run(&self, sql: &str) -> Result<String> {
        let mut command = Command::new(&self.endpoint.client_bin);
        command
            .arg("-h")
            .arg(&self.endpoint.host)
            .arg("-P")
            .arg(self.endpoint.port.to_string())
            .arg("-u")
            .arg(&self.endpoint.user)
            .arg(format!("-p{}", self.endpoint.password))
            .arg("-ss")
            .arg("-e")
            .arg(sql);

        let (status, stdout, stderr) = run_with_timeout(
            command,
            self.timeout,
            &format!("client binary {}", self.endpoint.client_bin),
        )?;

        if !status.success() || (!stderr.trim().is_empty() && !stderr.contains("Warning")) {
            bail!("client query failed: {}", stderr.trim());
        }

        debug!("client query returned {} bytes", stdout.len());
        Ok(stdout.trim().to_string())
    }
}
