//! Integration tests for `dev-dns`.
//!
//! Tests marked `#[ignore]` require root and Homebrew:
//!
//! ```bash
//! sudo cargo test -- --ignored
//! ```

use dev_dns::{
    Account, CommandRunner, DnsConfig, DnsMasq, LocalFilesystem, Result, ServiceManager,
};
use std::cell::RefCell;
use std::fs;
use std::path::Path;

/// Records service calls instead of running `brew`.
#[derive(Default)]
struct RecordingServices {
    calls: RefCell<Vec<String>>,
}

impl RecordingServices {
    fn calls(&self) -> Vec<String> {
        self.calls.borrow().clone()
    }
}

impl ServiceManager for &RecordingServices {
    fn ensure_installed(&self, package: &str) -> Result<()> {
        self.calls.borrow_mut().push(format!("install {package}"));
        Ok(())
    }

    fn restart_service(&self, service: &str) -> Result<()> {
        self.calls.borrow_mut().push(format!("restart {service}"));
        Ok(())
    }

    fn stop_service(&self, service: &str) -> Result<()> {
        self.calls.borrow_mut().push(format!("stop {service}"));
        Ok(())
    }
}

fn config_in(root: &Path) -> DnsConfig {
    let prefix = root.join("brew");
    fs::create_dir_all(prefix.join("etc")).unwrap();
    fs::create_dir_all(prefix.join("var")).unwrap();
    fs::write(prefix.join("var/dnsmasq.conf.default"), "# example\n").unwrap();

    DnsConfig::new("tester", root.join("home"))
        .with_brew_prefix(prefix)
        .with_resolver_dir(root.join("resolver"))
}

fn local_files() -> LocalFilesystem {
    LocalFilesystem::new(Account::current().unwrap())
}

// ---------------------------------------------------------------------------
// Tempdir tests (no root required)
// ---------------------------------------------------------------------------

#[test]
fn full_lifecycle() {
    let dir = tempfile::tempdir().unwrap();
    let services = RecordingServices::default();
    let dnsmasq = DnsMasq::new(config_in(dir.path()), &services, local_files());

    dnsmasq.install("test").unwrap();
    assert_eq!(
        fs::read_to_string(dir.path().join("resolver/test")).unwrap(),
        "nameserver 127.0.0.1\n"
    );

    dnsmasq.update_domain("test", "example").unwrap();
    assert!(!dir.path().join("resolver/test").exists());
    assert_eq!(
        fs::read_to_string(dir.path().join("resolver/example")).unwrap(),
        "nameserver 127.0.0.1\n"
    );
    assert_eq!(
        fs::read_to_string(dir.path().join("home/.valet/dnsmasq.conf")).unwrap(),
        "address=/.example/127.0.0.1\n"
    );

    dnsmasq.stop().unwrap();

    assert_eq!(
        services.calls(),
        vec![
            "install dnsmasq",
            "restart dnsmasq",
            "install dnsmasq",
            "restart dnsmasq",
            "stop dnsmasq",
        ]
    );
}

#[test]
fn main_config_gets_single_import() {
    let dir = tempfile::tempdir().unwrap();
    let services = RecordingServices::default();
    let dnsmasq = DnsMasq::new(config_in(dir.path()), &services, local_files());

    dnsmasq.install("test").unwrap();
    dnsmasq.install("test").unwrap();
    dnsmasq.update_domain("test", "localhost").unwrap();

    let main = fs::read_to_string(dir.path().join("brew/etc/dnsmasq.conf")).unwrap();
    let expected = format!(
        "# example\n\nconf-file={}\n",
        dir.path().join("home/.valet/dnsmasq.conf").display()
    );
    assert_eq!(main, expected);
}

#[test]
fn existing_main_config_is_kept() {
    let dir = tempfile::tempdir().unwrap();
    let config = config_in(dir.path());
    fs::write(config.main_config_path(), "port=5353").unwrap();
    let services = RecordingServices::default();
    let dnsmasq = DnsMasq::new(config, &services, local_files());

    dnsmasq.install("test").unwrap();

    let main = fs::read_to_string(dir.path().join("brew/etc/dnsmasq.conf")).unwrap();
    assert!(main.starts_with("port=5353\nconf-file="));
}

#[test]
fn missing_example_config_stops_install_before_restart() {
    let dir = tempfile::tempdir().unwrap();
    let config = config_in(dir.path());
    fs::remove_file(config.example_config_path()).unwrap();
    let services = RecordingServices::default();
    let dnsmasq = DnsMasq::new(config, &services, local_files());

    assert!(dnsmasq.install("test").is_err());
    assert_eq!(services.calls(), vec!["install dnsmasq"]);
    assert!(!dir.path().join("resolver/test").exists());
}

#[test]
fn runner_reports_exit_code_and_output() {
    let cli = CommandRunner::new(Account::current().unwrap());
    let mut seen = None;

    let output = cli
        .run_with("echo partial; exit 2", |code, out| {
            seen = Some((code, out.to_string()));
        })
        .unwrap();

    assert_eq!(output, "partial\n");
    assert_eq!(seen, Some((2, "partial\n".to_string())));
}

// ---------------------------------------------------------------------------
// Root-only tests
// ---------------------------------------------------------------------------

#[test]
#[ignore = "requires root, Homebrew, and writes /etc/resolver/"]
fn real_install_and_stop() {
    let config = DnsConfig::from_env().unwrap();
    let user = Account::lookup(&config.user).unwrap();
    let dnsmasq = DnsMasq::new(
        config,
        dev_dns::Brew::new(CommandRunner::new(user.clone())),
        LocalFilesystem::new(user),
    );

    dnsmasq.install("dev-dns-test").unwrap();
    assert!(Path::new("/etc/resolver/dev-dns-test").exists());

    dnsmasq.update_domain("dev-dns-test", "test").unwrap();
    assert!(!Path::new("/etc/resolver/dev-dns-test").exists());
}
