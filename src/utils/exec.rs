//! External command execution with piped stdin and a wall-clock timeout.
//!
//! ```text
//!   write stdin ──► child ──► read stdout/stderr   (reader threads)
//!                     │
//!                     └── try_wait() until deadline ── kill on timeout
//! ```
//!
//! Stdout and stderr are drained on their own threads so a chatty child can
//! never block on a full pipe while we poll for its exit.

use std::{
    ffi::OsString,
    io::{self, Read, Write},
    process::{Child, Command, ExitStatus, Stdio},
    thread::{self, JoinHandle},
    time::{Duration, Instant},
};
use thiserror::Error;

/// Interval between exit-status polls
const POLL_INTERVAL: Duration = Duration::from_millis(5);

/// Command execution errors
#[derive(Debug, Error)]
pub enum ExecError {
    #[error("empty command")]
    EmptyCommand,

    #[error("failed to spawn `{name}`")]
    Spawn {
        name: String,
        #[source]
        source: io::Error,
    },

    #[error("`{name}` timed out after {}ms", timeout.as_millis())]
    Timeout { name: String, timeout: Duration },

    #[error("`{name}` failed with {status}: {stderr}")]
    Failed {
        name: String,
        status: ExitStatus,
        stderr: String,
    },

    #[error("I/O error while running `{name}`")]
    Io {
        name: String,
        #[source]
        source: io::Error,
    },
}

/// Captured output of a successful command.
#[derive(Debug, Clone)]
pub struct Captured {
    pub stdout: Vec<u8>,
    pub stderr: Vec<u8>,
}

/// Run `cmd` (program followed by arguments), feed it `input` on stdin and
/// wait at most `timeout` for it to exit.
///
/// The child is killed when the deadline passes.
pub fn exec_with_timeout(
    cmd: &[OsString],
    input: &[u8],
    timeout: Duration,
) -> Result<Captured, ExecError> {
    let (program, args) = cmd.split_first().ok_or(ExecError::EmptyCommand)?;
    let name = program.to_string_lossy().into_owned();

    let mut child = Command::new(program)
        .args(args)
        .stdin(Stdio::piped())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .spawn()
        .map_err(|source| ExecError::Spawn {
            name: name.clone(),
            source,
        })?;

    let stdin = child.stdin.take();
    let input = input.to_vec();
    let writer = thread::spawn(move || -> io::Result<()> {
        if let Some(mut stdin) = stdin {
            // Dropping stdin at the end of scope signals EOF to the child
            stdin.write_all(&input)?;
        }
        Ok(())
    });
    let stdout = drain(child.stdout.take());
    let stderr = drain(child.stderr.take());

    let status = match wait_deadline(&mut child, timeout) {
        Ok(Some(status)) => status,
        Ok(None) => {
            child.kill().ok();
            child.wait().ok();
            return Err(ExecError::Timeout { name, timeout });
        }
        Err(source) => {
            child.kill().ok();
            return Err(ExecError::Io { name, source });
        }
    };

    // A child may exit without reading all of stdin, which is not an error here
    writer.join().ok();
    let stdout = join_output(stdout);
    let stderr = join_output(stderr);

    if !status.success() {
        return Err(ExecError::Failed {
            name,
            status,
            stderr: String::from_utf8_lossy(&stderr).trim().to_owned(),
        });
    }

    Ok(Captured { stdout, stderr })
}

/// Poll the child until it exits or the deadline passes.
fn wait_deadline(child: &mut Child, timeout: Duration) -> io::Result<Option<ExitStatus>> {
    let deadline = Instant::now() + timeout;
    loop {
        if let Some(status) = child.try_wait()? {
            return Ok(Some(status));
        }
        if Instant::now() >= deadline {
            return Ok(None);
        }
        thread::sleep(POLL_INTERVAL);
    }
}

fn drain<R: Read + Send + 'static>(pipe: Option<R>) -> Option<JoinHandle<Vec<u8>>> {
    pipe.map(|mut pipe| {
        thread::spawn(move || {
            let mut buf = Vec::new();
            pipe.read_to_end(&mut buf).ok();
            buf
        })
    })
}

fn join_output(handle: Option<JoinHandle<Vec<u8>>>) -> Vec<u8> {
    handle.and_then(|h| h.join().ok()).unwrap_or_default()
}
