//! Shell command execution.
//!
//! Every command string goes through `sh -c`, so callers pass ordinary shell
//! syntax. Running "as user" is a uid/gid switch on the spawned child rather
//! than a `sudo -u` prefix, so the command string never needs extra quoting
//! for the identity change.
//!
//! No call has a timeout: a command that never exits blocks its caller.

use crate::account::Account;
use crate::error::Result;
use std::io::{self, Read};
use std::os::unix::process::CommandExt;
use std::process::{Child, Command, ExitStatus, Stdio};
use std::sync::{Mutex, PoisonError};
use std::thread;

/// Identity a command runs with.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunAs {
    /// The identity of this process (root when invoked through sudo).
    Current,
    /// The invoking non-privileged user held by the runner.
    User,
}

/// Runs shell commands as this process or as the invoking user.
#[derive(Debug, Clone)]
pub struct CommandRunner {
    user: Account,
}

impl CommandRunner {
    /// Creates a runner whose "as user" calls switch to `user`.
    #[must_use]
    pub const fn new(user: Account) -> Self {
        Self { user }
    }

    /// The account used for "as user" calls.
    #[must_use]
    pub const fn user(&self) -> &Account {
        &self.user
    }

    /// Runs `command` with all output discarded. The exit status is ignored.
    ///
    /// # Errors
    ///
    /// Returns [`DnsError::Io`](crate::DnsError::Io) only if the shell
    /// cannot be spawned.
    pub fn quiet(&self, command: &str) -> Result<()> {
        self.run_silenced(command, RunAs::Current)
    }

    /// Like [`quiet`](Self::quiet), as the invoking user.
    ///
    /// # Errors
    ///
    /// See [`quiet`](Self::quiet).
    pub fn quiet_as_user(&self, command: &str) -> Result<()> {
        self.run_silenced(command, RunAs::User)
    }

    /// Runs `command` with output streamed straight to this process's
    /// stdout and stderr.
    ///
    /// # Errors
    ///
    /// See [`quiet`](Self::quiet).
    pub fn passthrough(&self, command: &str) -> Result<()> {
        let status = self
            .shell(command, RunAs::Current)
            .stdin(Stdio::inherit())
            .stdout(Stdio::inherit())
            .stderr(Stdio::inherit())
            .status()?;
        log_signal(command, status);
        Ok(())
    }

    /// Runs `command` and returns its combined stdout and stderr.
    ///
    /// # Errors
    ///
    /// See [`quiet`](Self::quiet). A non-zero exit is not an error.
    pub fn run(&self, command: &str) -> Result<String> {
        self.run_with(command, |_, _| {})
    }

    /// Runs `command` and returns its combined stdout and stderr.
    ///
    /// If the process exits with a non-zero code, `on_error(code, output)`
    /// is called once before the output is returned.
    ///
    /// # Errors
    ///
    /// See [`quiet`](Self::quiet).
    pub fn run_with<F>(&self, command: &str, on_error: F) -> Result<String>
    where
        F: FnOnce(i32, &str),
    {
        self.run_as(command, RunAs::Current, on_error)
    }

    /// Like [`run`](Self::run), as the invoking user.
    ///
    /// # Errors
    ///
    /// See [`quiet`](Self::quiet).
    pub fn run_as_user(&self, command: &str) -> Result<String> {
        self.run_as_user_with(command, |_, _| {})
    }

    /// Like [`run_with`](Self::run_with), as the invoking user.
    ///
    /// # Errors
    ///
    /// See [`quiet`](Self::quiet).
    pub fn run_as_user_with<F>(&self, command: &str, on_error: F) -> Result<String>
    where
        F: FnOnce(i32, &str),
    {
        self.run_as(command, RunAs::User, on_error)
    }

    fn run_silenced(&self, command: &str, run_as: RunAs) -> Result<()> {
        let status = self
            .shell(command, run_as)
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .status()?;
        log_signal(command, status);
        Ok(())
    }

    /// Runs `command` with the given identity and returns its combined
    /// stdout and stderr, calling `on_error(code, output)` on a non-zero
    /// exit.
    ///
    /// [`run_with`](Self::run_with) and
    /// [`run_as_user_with`](Self::run_as_user_with) are shorthands for the
    /// two identities.
    ///
    /// # Errors
    ///
    /// See [`quiet`](Self::quiet).
    pub fn run_as<F>(&self, command: &str, run_as: RunAs, on_error: F) -> Result<String>
    where
        F: FnOnce(i32, &str),
    {
        let mut child = self
            .shell(command, run_as)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()?;

        let stdout = child.stdout.take();
        let stderr = child.stderr.take();
        let (status, bytes) = collect_output(&mut child, stdout, stderr)?;
        let output = String::from_utf8_lossy(&bytes).into_owned();

        match status.code() {
            Some(0) => {}
            Some(code) => {
                tracing::debug!(command, code, "Command exited with non-zero status");
                on_error(code, &output);
            }
            None => log_signal(command, status),
        }
        Ok(output)
    }

    fn shell(&self, command: &str, run_as: RunAs) -> Command {
        let mut cmd = Command::new("sh");
        cmd.arg("-c").arg(command);

        let as_user = run_as == RunAs::User;
        if as_user {
            cmd.env("HOME", &self.user.home)
                .env("USER", &self.user.name)
                .env("LOGNAME", &self.user.name);
            if !self.user.is_effective_user() {
                cmd.uid(self.user.uid).gid(self.user.gid);
            }
        }

        tracing::debug!(command, as_user, "Running shell command");
        cmd
    }
}

/// Drains stdout and stderr concurrently into one buffer, in the order
/// chunks arrive, then reaps the child. The child is reaped even when a
/// reader fails.
fn collect_output<O, E>(
    child: &mut Child,
    stdout: Option<O>,
    stderr: Option<E>,
) -> io::Result<(ExitStatus, Vec<u8>)>
where
    O: Read + Send,
    E: Read + Send,
{
    let buffer = Mutex::new(Vec::new());
    let sink = &buffer;

    let drained = thread::scope(|scope| {
        let readers = [
            stdout.map(|s| scope.spawn(move || drain(s, sink))),
            stderr.map(|s| scope.spawn(move || drain(s, sink))),
        ];
        for reader in readers.into_iter().flatten() {
            reader
                .join()
                .map_err(|_| io::Error::other("output reader panicked"))??;
        }
        Ok::<_, io::Error>(())
    });

    let status = child.wait()?;
    drained?;
    let bytes = buffer.into_inner().unwrap_or_else(PoisonError::into_inner);
    Ok((status, bytes))
}

fn drain(mut source: impl Read, sink: &Mutex<Vec<u8>>) -> io::Result<()> {
    let mut chunk = [0u8; 8192];
    loop {
        match source.read(&mut chunk) {
            Ok(0) => return Ok(()),
            Ok(n) => sink
                .lock()
                .unwrap_or_else(PoisonError::into_inner)
                .extend_from_slice(&chunk[..n]),
            Err(e) if e.kind() == io::ErrorKind::Interrupted => {}
            Err(e) => return Err(e),
        }
    }
}

fn log_signal(command: &str, status: ExitStatus) {
    if status.code().is_none() {
        tracing::warn!(command, %status, "Command terminated by signal");
    }
}
