//! Homebrew package and service control.

use crate::command::CommandRunner;
use crate::error::{DnsError, Result};
use std::cell::RefCell;

/// Package installation and service lifecycle for the DNS daemon.
#[cfg_attr(test, mockall::automock)]
pub trait ServiceManager {
    /// Installs `package` unless it is already installed.
    fn ensure_installed(&self, package: &str) -> Result<()>;

    /// Restarts the background service `service`.
    fn restart_service(&self, service: &str) -> Result<()>;

    /// Stops the background service `service`.
    fn stop_service(&self, service: &str) -> Result<()>;
}

/// [`ServiceManager`] backed by the `brew` CLI.
///
/// Formula queries and installs run as the invoking user, because Homebrew
/// refuses to run as root. `brew services` runs with the current identity,
/// so services bound to port 53 start as root when the tool runs under sudo.
#[derive(Debug, Clone)]
pub struct Brew {
    cli: CommandRunner,
    program: String,
}

impl Brew {
    /// Creates a Homebrew manager that runs `brew` from `PATH` through `cli`.
    #[must_use]
    pub fn new(cli: CommandRunner) -> Self {
        Self::with_program(cli, "brew")
    }

    /// Uses `program` in place of `brew`. It is spliced into shell command
    /// lines as is, so it must already be shell-safe.
    #[must_use]
    pub fn with_program(cli: CommandRunner, program: impl Into<String>) -> Self {
        Self {
            cli,
            program: program.into(),
        }
    }

    /// The command line used to invoke Homebrew.
    #[must_use]
    pub fn program(&self) -> &str {
        &self.program
    }

    /// Returns `true` if `package` is an installed formula.
    ///
    /// # Errors
    ///
    /// Returns [`DnsError::Io`] if `brew` cannot be spawned.
    pub fn installed(&self, package: &str) -> Result<bool> {
        let listing = self.cli.run_as_user(&format!("{} list --formula", self.program))?;
        Ok(formula_listed(&listing, package))
    }
}

impl ServiceManager for Brew {
    fn ensure_installed(&self, package: &str) -> Result<()> {
        if self.installed(package)? {
            tracing::debug!(package, "Formula already installed");
            return Ok(());
        }

        tracing::info!(package, "Installing formula");
        let command = format!("{} install {package}", self.program);
        let failure = RefCell::new(None);
        self.cli.run_as_user_with(&command, |code, output| {
            *failure.borrow_mut() = Some((code, output.to_string()));
        })?;

        match failure.into_inner() {
            Some((code, output)) => Err(DnsError::CommandFailed {
                command,
                code,
                output,
            }),
            None => Ok(()),
        }
    }

    fn restart_service(&self, service: &str) -> Result<()> {
        tracing::info!(service, "Restarting service");
        self.cli.quiet(&format!("{} services stop {service}", self.program))?;
        self.cli.quiet(&format!("{} services start {service}", self.program))
    }

    fn stop_service(&self, service: &str) -> Result<()> {
        tracing::info!(service, "Stopping service");
        self.cli.quiet(&format!("{} services stop {service}", self.program))
    }
}

/// Checks a `brew list --formula` listing for an exact formula name.
fn formula_listed(listing: &str, package: &str) -> bool {
    listing.lines().map(str::trim).any(|line| line == package)
}
