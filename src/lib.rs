//! # dev-dns
//!
//! Route a local development top-level domain (e.g. `*.test`) to
//! `127.0.0.1` on macOS through Homebrew's dnsmasq and `/etc/resolver/`.
//!
//! ## Quick start
//!
//! ```rust,ignore
//! use dev_dns::{Account, Brew, CommandRunner, DnsConfig, DnsMasq, LocalFilesystem};
//!
//! let config = DnsConfig::from_env()?;
//! let user = Account::lookup(&config.user)?;
//!
//! let dnsmasq = DnsMasq::new(
//!     config,
//!     Brew::new(CommandRunner::new(user.clone())),
//!     LocalFilesystem::new(user),
//! );
//!
//! // Requires root for /etc/resolver/.
//! dnsmasq.install("test")?;
//!
//! // Later, switch to another TLD.
//! dnsmasq.update_domain("test", "localhost")?;
//! ```
//!
//! ## What gets written
//!
//! | File | Content |
//! |------|---------|
//! | `~/.valet/dnsmasq.conf` | `address=/.<domain>/127.0.0.1` |
//! | `<brew>/etc/dnsmasq.conf` | `conf-file=~/.valet/dnsmasq.conf` appended once |
//! | `/etc/resolver/<domain>` | `nameserver 127.0.0.1` |
//!
//! ## Verification
//!
//! ```bash
//! scutil --dns              # show all registered resolvers
//! dscacheutil -q host -a name anything.test
//! ```
//!
//! **Note:** `dig` bypasses the macOS system resolver and will *not* show
//! these entries.
//!
//! ## Commands
//!
//! [`CommandRunner`] runs shell strings through `sh -c`, either as this
//! process or as the invoking user (uid/gid switch on the child). Captured
//! calls return combined stdout and stderr and report non-zero exits through
//! an `on_error(code, output)` handler.

#![warn(clippy::all, clippy::pedantic, clippy::nursery)]
#![allow(clippy::module_name_repetitions)]

pub mod account;
pub mod brew;
pub mod command;
pub mod config;
pub mod dnsmasq;
pub mod error;
pub mod filesystem;

pub use account::Account;
pub use brew::{Brew, ServiceManager};
pub use command::{CommandRunner, RunAs};
pub use config::DnsConfig;
pub use dnsmasq::{DEFAULT_DOMAIN, DNSMASQ, DnsMasq};
pub use error::{DnsError, Result};
pub use filesystem::{Filesystem, LocalFilesystem};
