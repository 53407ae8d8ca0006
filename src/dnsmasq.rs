//! dnsmasq installation and `/etc/resolver/` routing for a development TLD.
//!
//! The installer never rewrites the main dnsmasq config. It keeps its own
//! custom config under the user's home directory, appends a single
//! `conf-file=` import of it to the main config, and writes one resolver
//! file per domain so macOS sends `*.<domain>` lookups to dnsmasq.

use crate::brew::ServiceManager;
use crate::config::DnsConfig;
use crate::error::{DnsError, Result};
use crate::filesystem::Filesystem;
use std::path::{Path, PathBuf};

/// Homebrew formula and service name of the daemon.
pub const DNSMASQ: &str = "dnsmasq";

/// Domain installed when none is given.
pub const DEFAULT_DOMAIN: &str = "test";

/// Address every name under the domain resolves to.
const LOOPBACK: &str = "127.0.0.1";

/// Installs and maintains dnsmasq routing for one development domain.
///
/// # Lifecycle
///
/// 1. [`install`](Self::install) ensures dnsmasq, writes the configs and
///    the resolver file, and restarts the service.
/// 2. [`update_domain`](Self::update_domain) removes the old domain's
///    resolver file and installs the new domain.
/// 3. [`stop`](Self::stop) stops the service.
///
/// Only one domain is active at a time: the custom config is overwritten
/// on every install.
///
/// # Permissions
///
/// Writing to `/etc/resolver/` requires root.
///
/// # Example
///
/// ```rust,ignore
/// use dev_dns::{Account, Brew, CommandRunner, DnsConfig, DnsMasq, LocalFilesystem};
///
/// let config = DnsConfig::from_env()?;
/// let user = Account::lookup(&config.user)?;
/// let dnsmasq = DnsMasq::new(
///     config,
///     Brew::new(CommandRunner::new(user.clone())),
///     LocalFilesystem::new(user),
/// );
/// dnsmasq.install("test")?;
/// ```
pub struct DnsMasq<S, F> {
    config: DnsConfig,
    brew: S,
    files: F,
}

impl<S: ServiceManager, F: Filesystem> DnsMasq<S, F> {
    /// Creates an installer over the given collaborators.
    #[must_use]
    pub const fn new(config: DnsConfig, brew: S, files: F) -> Self {
        Self {
            config,
            brew,
            files,
        }
    }

    /// The injected configuration.
    #[must_use]
    pub const fn config(&self) -> &DnsConfig {
        &self.config
    }

    /// Installs dnsmasq and routes `*.<domain>` to `127.0.0.1`.
    ///
    /// Safe to repeat: the same domain converges to the same files. The
    /// service is restarted on every call.
    ///
    /// # Errors
    ///
    /// Returns [`DnsError::InvalidConfig`] for a domain that is not a
    /// plain file name. Otherwise propagates any package, service, or
    /// filesystem failure. Steps that already ran are not undone.
    pub fn install(&self, domain: &str) -> Result<()> {
        validate_domain(domain)?;

        self.brew.ensure_installed(DNSMASQ)?;

        self.create_custom_config_file(domain)?;

        self.create_domain_resolver(domain)?;

        self.brew.restart_service(DNSMASQ)?;

        tracing::info!(domain, "Installed dnsmasq routing");
        Ok(())
    }

    /// [`install`](Self::install) for [`DEFAULT_DOMAIN`].
    ///
    /// # Errors
    ///
    /// See [`install`](Self::install).
    pub fn install_default(&self) -> Result<()> {
        self.install(DEFAULT_DOMAIN)
    }

    /// Makes the main config import the custom config, then overwrites the
    /// custom config with the `address=` rule for `domain`.
    ///
    /// # Errors
    ///
    /// Returns [`DnsError::InvalidConfig`] for an invalid domain. Propagates
    /// filesystem failures, including a missing example config when the
    /// main config does not exist yet.
    pub fn create_custom_config_file(&self, domain: &str) -> Result<()> {
        validate_domain(domain)?;
        let custom_config_path = self.custom_config_path();

        self.copy_example_config()?;

        self.append_custom_config_import(&custom_config_path)?;

        if let Some(parent) = custom_config_path.parent() {
            self.files.ensure_dir_exists_as_user(parent)?;
        }
        self.files.put_as_user(&custom_config_path, &address_rule(domain))?;

        tracing::info!(
            domain,
            path = %custom_config_path.display(),
            "Wrote custom dnsmasq config"
        );
        Ok(())
    }

    /// Copies Homebrew's example config into place if the main config is
    /// missing. An existing main config is never touched.
    ///
    /// # Errors
    ///
    /// Propagates copy failures.
    pub fn copy_example_config(&self) -> Result<()> {
        let main = self.main_config_path();
        if !self.files.exists(&main) {
            self.files.copy_as_user(&self.example_config_path(), &main)?;
            tracing::debug!(path = %main.display(), "Copied example dnsmasq config");
        }
        Ok(())
    }

    /// Appends a `conf-file=` import of `custom_config_path` to the main
    /// config unless the path already appears in it.
    ///
    /// # Errors
    ///
    /// Propagates read or append failures.
    pub fn append_custom_config_import(&self, custom_config_path: &Path) -> Result<()> {
        if !self.custom_config_is_being_imported(custom_config_path)? {
            self.files
                .append_as_user(&self.main_config_path(), &import_line(custom_config_path))?;
            tracing::info!(
                path = %custom_config_path.display(),
                "Added custom config import to dnsmasq.conf"
            );
        }
        Ok(())
    }

    /// Returns `true` if the main config mentions `custom_config_path`
    /// anywhere.
    ///
    /// This is a plain substring check: a commented-out import, or a longer
    /// path containing this one, both count as imported.
    ///
    /// # Errors
    ///
    /// Propagates read failures, including a missing main config.
    pub fn custom_config_is_being_imported(&self, custom_config_path: &Path) -> Result<bool> {
        let main = self.files.get(&self.main_config_path())?;
        Ok(main.contains(&*custom_config_path.to_string_lossy()))
    }

    /// Writes `<resolver_dir>/<domain>` pointing at the local nameserver.
    ///
    /// # Errors
    ///
    /// Returns [`DnsError::InvalidConfig`] if `domain` would resolve outside
    /// the resolver directory, or [`DnsError::Io`] if the directory cannot
    /// be created or the file cannot be written (typically
    /// `PermissionDenied` without root).
    pub fn create_domain_resolver(&self, domain: &str) -> Result<()> {
        validate_domain(domain)?;
        self.files.ensure_dir_exists(&self.config.resolver_dir)?;

        let path = self.resolver_path(domain);
        self.files.put(&path, &resolver_content())?;

        tracing::info!(
            domain,
            path = %path.display(),
            "Registered macOS DNS resolver"
        );
        Ok(())
    }

    /// Removes the resolver for `old_domain` and installs `new_domain`.
    ///
    /// If the install fails after the removal, neither resolver file is
    /// left in place.
    ///
    /// # Errors
    ///
    /// See [`install`](Self::install). Both domains are checked before
    /// anything is removed.
    pub fn update_domain(&self, old_domain: &str, new_domain: &str) -> Result<()> {
        validate_domain(old_domain)?;
        validate_domain(new_domain)?;

        self.files.unlink(&self.resolver_path(old_domain))?;
        tracing::info!(domain = old_domain, "Unregistered macOS DNS resolver");

        self.install(new_domain)
    }

    /// Restarts the dnsmasq service.
    ///
    /// # Errors
    ///
    /// Propagates the service manager's failure.
    pub fn restart(&self) -> Result<()> {
        self.brew.restart_service(DNSMASQ)
    }

    /// Stops the dnsmasq service.
    ///
    /// # Errors
    ///
    /// Propagates the service manager's failure.
    pub fn stop(&self) -> Result<()> {
        self.brew.stop_service(DNSMASQ)
    }

    /// `~/.valet/dnsmasq.conf` for the configured user.
    #[must_use]
    pub fn custom_config_path(&self) -> PathBuf {
        self.config.custom_config_path()
    }

    /// `<brew_prefix>/etc/dnsmasq.conf`.
    #[must_use]
    pub fn main_config_path(&self) -> PathBuf {
        self.config.main_config_path()
    }

    /// `<brew_prefix>/var/dnsmasq.conf.default`.
    #[must_use]
    pub fn example_config_path(&self) -> PathBuf {
        self.config.example_config_path()
    }

    /// `<resolver_dir>/<domain>`. Callers must pass a validated domain.
    #[must_use]
    pub fn resolver_path(&self, domain: &str) -> PathBuf {
        self.config.resolver_dir.join(domain)
    }
}

// ---------------------------------------------------------------------------
// File content helpers
// ---------------------------------------------------------------------------

/// Rejects domains that are not a single path component or that would
/// break the one-line `address=` rule.
fn validate_domain(domain: &str) -> Result<()> {
    if domain.is_empty()
        || domain == "."
        || domain == ".."
        || domain.contains(['/', '\0', '\n', '\r'])
    {
        return Err(DnsError::InvalidConfig(format!(
            "invalid domain name: {domain:?}"
        )));
    }
    Ok(())
}

/// `address=/.<domain>/127.0.0.1`
fn address_rule(domain: &str) -> String {
    format!("address=/.{domain}/{LOOPBACK}\n")
}

/// Leading newline so the directive never joins an unterminated last line.
fn import_line(custom_config_path: &Path) -> String {
    format!("\nconf-file={}\n", custom_config_path.display())
}

fn resolver_content() -> String {
    format!("nameserver {LOOPBACK}\n")
}
