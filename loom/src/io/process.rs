//! Child process execution with a deadline and bounded capture.

use std::io::Read;
use std::process::{Command, ExitStatus, Stdio};
use std::thread::{self, JoinHandle};
use std::time::Duration;

use anyhow::{Context, Result, anyhow};
use tracing::{debug, instrument, warn};
use wait_timeout::ChildExt;

/// What a finished (or killed) child left behind.
#[derive(Debug)]
pub struct Captured {
    pub status: ExitStatus,
    pub stdout: Vec<u8>,
    pub stderr: Vec<u8>,
    /// Bytes drained but not kept, per stream.
    pub dropped_stdout: usize,
    pub dropped_stderr: usize,
    pub timed_out: bool,
}

impl Captured {
    pub fn stdout_text(&self) -> String {
        String::from_utf8_lossy(&self.stdout).into_owned()
    }

    pub fn stderr_text(&self) -> String {
        String::from_utf8_lossy(&self.stderr).trim().to_string()
    }
}

/// Spawn `cmd` with stdin closed, wait up to `deadline`, and keep at most
/// `keep_bytes` of each output stream.
///
/// Both pipes are drained on their own threads so a chatty child cannot block
/// on a full pipe while we wait. A child past its deadline is killed and
/// reported with `timed_out = true`.
#[instrument(skip_all, fields(deadline_secs = deadline.as_secs(), keep_bytes))]
pub fn run_captured(mut cmd: Command, deadline: Duration, keep_bytes: usize) -> Result<Captured> {
    cmd.stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped());

    let mut child = cmd.spawn().context("spawn child process")?;
    let stdout = child
        .stdout
        .take()
        .ok_or_else(|| anyhow!("child stdout not captured"))?;
    let stderr = child
        .stderr
        .take()
        .ok_or_else(|| anyhow!("child stderr not captured"))?;
    let stdout_reader = thread::spawn(move || drain(stdout, keep_bytes));
    let stderr_reader = thread::spawn(move || drain(stderr, keep_bytes));

    let (status, timed_out) = match child.wait_timeout(deadline).context("wait for child")? {
        Some(status) => (status, false),
        None => {
            warn!(deadline_secs = deadline.as_secs(), "child exceeded deadline, killing");
            child.kill().context("kill child")?;
            (child.wait().context("reap killed child")?, true)
        }
    };

    let (stdout, dropped_stdout) = collect(stdout_reader).context("collect stdout")?;
    let (stderr, dropped_stderr) = collect(stderr_reader).context("collect stderr")?;
    if dropped_stdout > 0 || dropped_stderr > 0 {
        warn!(dropped_stdout, dropped_stderr, "child output exceeded capture limit");
    }
    debug!(code = ?status.code(), timed_out, "child finished");

    Ok(Captured {
        status,
        stdout,
        stderr,
        dropped_stdout,
        dropped_stderr,
        timed_out,
    })
}

fn collect(reader: JoinHandle<Result<(Vec<u8>, usize)>>) -> Result<(Vec<u8>, usize)> {
    reader
        .join()
        .map_err(|_| anyhow!("output reader panicked"))?
}

fn drain<R: Read>(mut stream: R, keep_bytes: usize) -> Result<(Vec<u8>, usize)> {
    let mut kept = Vec::new();
    let mut dropped = 0usize;
    let mut buf = [0u8; 8192];
    loop {
        let n = stream.read(&mut buf).context("read child output")?;
        if n == 0 {
            return Ok((kept, dropped));
        }
        let room = keep_bytes.saturating_sub(kept.len()).min(n);
        kept.extend_from_slice(&buf[..room]);
        dropped += n - room;
    }
}
