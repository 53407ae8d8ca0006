//! Error types.

use thiserror::Error;

/// Result alias for dev-dns operations.
pub type Result<T> = std::result::Result<T, DnsError>;

/// Errors returned by dev-dns operations.
#[derive(Debug, Error)]
pub enum DnsError {
    /// Filesystem or process-spawn I/O failed.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// The system password database has no entry for this user.
    #[error("unknown user: {name}")]
    UnknownUser {
        /// The name that was looked up.
        name: String,
    },

    /// A command exited with a non-zero status where success was required.
    #[error("command `{command}` exited with status {code}: {output}")]
    CommandFailed {
        /// The shell command that was run.
        command: String,
        /// Its exit code.
        code: i32,
        /// Combined stdout and stderr.
        output: String,
    },

    /// Invalid or missing configuration values.
    #[error("invalid config: {0}")]
    InvalidConfig(String),

    /// The config file is not valid TOML for [`DnsConfig`](crate::DnsConfig).
    #[error("failed to parse config: {0}")]
    ConfigParse(#[from] toml::de::Error),
}

impl DnsError {
    /// Returns `true` if the underlying I/O error is `PermissionDenied`.
    #[must_use]
    pub fn is_permission_denied(&self) -> bool {
        matches!(self, Self::Io(e) if e.kind() == std::io::ErrorKind::PermissionDenied)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn permission_denied_is_detected() {
        let err = DnsError::from(std::io::Error::from(std::io::ErrorKind::PermissionDenied));
        assert!(err.is_permission_denied());

        let err = DnsError::from(std::io::Error::from(std::io::ErrorKind::NotFound));
        assert!(!err.is_permission_denied());
    }

    #[test]
    fn command_failed_message_includes_code() {
        let err = DnsError::CommandFailed {
            command: "brew install dnsmasq".into(),
            code: 1,
            output: "Error: no bottle".into(),
        };
        assert_eq!(
            err.to_string(),
            "command `brew install dnsmasq` exited with status 1: Error: no bottle"
        );
    }
}
