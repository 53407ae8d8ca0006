//! Installer configuration.
//!
//! Everything the installer would otherwise read from the process
//! environment (invoking user, home directory, Homebrew prefix) is carried
//! here and injected at construction.

use crate::error::{DnsError, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};

/// Default macOS resolver directory.
pub const DEFAULT_RESOLVER_DIR: &str = "/etc/resolver";

/// Custom dnsmasq config, relative to the user's home directory.
const CUSTOM_CONFIG_RELATIVE: &str = ".valet/dnsmasq.conf";

/// Main dnsmasq config, relative to the Homebrew prefix.
const MAIN_CONFIG_RELATIVE: &str = "etc/dnsmasq.conf";

/// Homebrew-installed example config, relative to the Homebrew prefix.
const EXAMPLE_CONFIG_RELATIVE: &str = "var/dnsmasq.conf.default";

/// Paths and identity used by [`DnsMasq`](crate::DnsMasq).
///
/// # Example
///
/// ```
/// use dev_dns::DnsConfig;
///
/// let config = DnsConfig::new("alice", "/Users/alice")
///     .with_brew_prefix("/opt/homebrew");
///
/// assert_eq!(
///     config.custom_config_path(),
///     std::path::Path::new("/Users/alice/.valet/dnsmasq.conf"),
/// );
/// assert_eq!(
///     config.main_config_path(),
///     std::path::Path::new("/opt/homebrew/etc/dnsmasq.conf"),
/// );
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct DnsConfig {
    /// The invoking non-privileged user.
    pub user: String,

    /// That user's home directory.
    pub home: PathBuf,

    /// Homebrew installation prefix.
    #[serde(default = "default_brew_prefix")]
    pub brew_prefix: PathBuf,

    /// Directory holding the per-domain OS resolver files.
    #[serde(default = "default_resolver_dir")]
    pub resolver_dir: PathBuf,
}

impl DnsConfig {
    /// Creates a config with the platform's default Homebrew prefix and
    /// resolver directory.
    #[must_use]
    pub fn new(user: impl Into<String>, home: impl Into<PathBuf>) -> Self {
        Self {
            user: user.into(),
            home: home.into(),
            brew_prefix: default_brew_prefix(),
            resolver_dir: default_resolver_dir(),
        }
    }

    /// Overrides the Homebrew prefix.
    #[must_use]
    pub fn with_brew_prefix(mut self, prefix: impl Into<PathBuf>) -> Self {
        self.brew_prefix = prefix.into();
        self
    }

    /// Overrides the resolver directory.
    #[must_use]
    pub fn with_resolver_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.resolver_dir = dir.into();
        self
    }

    /// Builds a config from the process environment.
    ///
    /// # Errors
    ///
    /// See [`from_env_with`](Self::from_env_with).
    pub fn from_env() -> Result<Self> {
        Self::from_env_with(|key| std::env::var(key).ok())
    }

    /// Builds a config from an environment lookup.
    ///
    /// The user is `SUDO_USER` when present (the tool normally runs under
    /// sudo), otherwise `USER`. `HOMEBREW_PREFIX` overrides the default
    /// prefix.
    ///
    /// # Errors
    ///
    /// Returns [`DnsError::InvalidConfig`] if no user or `HOME` is set.
    pub fn from_env_with<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let non_empty = |key: &str| lookup(key).filter(|v| !v.is_empty());

        let user = non_empty("SUDO_USER")
            .or_else(|| non_empty("USER"))
            .ok_or_else(|| DnsError::InvalidConfig("neither SUDO_USER nor USER is set".into()))?;
        let home = non_empty("HOME")
            .ok_or_else(|| DnsError::InvalidConfig("HOME is not set".into()))?;

        let mut config = Self::new(user, home);
        if let Some(prefix) = non_empty("HOMEBREW_PREFIX") {
            config.brew_prefix = prefix.into();
        }
        Ok(config)
    }

    /// Parses a TOML config.
    ///
    /// # Errors
    ///
    /// Returns [`DnsError::ConfigParse`] on malformed input.
    pub fn from_toml_str(s: &str) -> Result<Self> {
        Ok(toml::from_str(s)?)
    }

    /// Reads and parses a TOML config file.
    ///
    /// # Errors
    ///
    /// Returns [`DnsError::Io`] if the file cannot be read, or
    /// [`DnsError::ConfigParse`] on malformed content.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let contents = std::fs::read_to_string(path)?;
        tracing::debug!(path = %path.display(), "Loaded dev-dns config");
        Self::from_toml_str(&contents)
    }

    /// `~/.valet/dnsmasq.conf`, the file this crate owns outright.
    #[must_use]
    pub fn custom_config_path(&self) -> PathBuf {
        self.home.join(CUSTOM_CONFIG_RELATIVE)
    }

    /// The dnsmasq config Homebrew reads.
    #[must_use]
    pub fn main_config_path(&self) -> PathBuf {
        self.brew_prefix.join(MAIN_CONFIG_RELATIVE)
    }

    /// The template Homebrew ships alongside dnsmasq.
    #[must_use]
    pub fn example_config_path(&self) -> PathBuf {
        self.brew_prefix.join(EXAMPLE_CONFIG_RELATIVE)
    }
}

fn default_brew_prefix() -> PathBuf {
    if cfg!(all(target_os = "macos", target_arch = "aarch64")) {
        PathBuf::from("/opt/homebrew")
    } else {
        PathBuf::from("/usr/local")
    }
}

fn default_resolver_dir() -> PathBuf {
    PathBuf::from(DEFAULT_RESOLVER_DIR)
}
