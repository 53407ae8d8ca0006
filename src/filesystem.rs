//! Filesystem access used by the installer.

use crate::account::Account;
use crate::error::Result;
use std::fs::{self, OpenOptions};
use std::io::Write;
use std::os::unix::fs::chown;
use std::path::Path;

/// File operations the installer performs.
///
/// The `*_as_user` variants leave the file owned by the invoking
/// non-privileged user even when the tool itself runs as root.
pub trait Filesystem {
    /// Returns `true` if `path` exists.
    fn exists(&self, path: &Path) -> bool;

    /// Reads `path` to a string.
    fn get(&self, path: &Path) -> Result<String>;

    /// Writes `contents` to `path`, replacing it, as the current identity.
    fn put(&self, path: &Path, contents: &str) -> Result<()>;

    /// Writes `contents` to `path`, replacing it, owned by the user.
    fn put_as_user(&self, path: &Path, contents: &str) -> Result<()>;

    /// Copies `from` to `to`, leaving `to` owned by the user.
    fn copy_as_user(&self, from: &Path, to: &Path) -> Result<()>;

    /// Appends `contents` to `path`, creating it if needed, owned by the user.
    fn append_as_user(&self, path: &Path, contents: &str) -> Result<()>;

    /// Creates `path` and any missing parents.
    fn ensure_dir_exists(&self, path: &Path) -> Result<()>;

    /// Like [`ensure_dir_exists`](Self::ensure_dir_exists), with every
    /// directory it creates owned by the user. Existing directories keep
    /// their owner.
    fn ensure_dir_exists_as_user(&self, path: &Path) -> Result<()>;

    /// Removes `path` if it exists. Missing files are not an error.
    fn unlink(&self, path: &Path) -> Result<()>;
}

/// [`Filesystem`] over the local disk.
#[derive(Debug, Clone)]
pub struct LocalFilesystem {
    owner: Account,
}

impl LocalFilesystem {
    /// Creates a filesystem whose `*_as_user` writes are chowned to `owner`.
    #[must_use]
    pub const fn new(owner: Account) -> Self {
        Self { owner }
    }

    fn give_to_owner(&self, path: &Path) -> Result<()> {
        chown(path, Some(self.owner.uid), Some(self.owner.gid))?;
        Ok(())
    }
}

impl Filesystem for LocalFilesystem {
    fn exists(&self, path: &Path) -> bool {
        path.exists()
    }

    fn get(&self, path: &Path) -> Result<String> {
        Ok(fs::read_to_string(path)?)
    }

    fn put(&self, path: &Path, contents: &str) -> Result<()> {
        fs::write(path, contents)?;
        Ok(())
    }

    fn put_as_user(&self, path: &Path, contents: &str) -> Result<()> {
        self.put(path, contents)?;
        self.give_to_owner(path)
    }

    fn copy_as_user(&self, from: &Path, to: &Path) -> Result<()> {
        fs::copy(from, to)?;
        self.give_to_owner(to)
    }

    fn append_as_user(&self, path: &Path, contents: &str) -> Result<()> {
        let mut file = OpenOptions::new().create(true).append(true).open(path)?;
        file.write_all(contents.as_bytes())?;
        self.give_to_owner(path)
    }

    fn ensure_dir_exists(&self, path: &Path) -> Result<()> {
        if !path.is_dir() {
            fs::create_dir_all(path)?;
            tracing::debug!(path = %path.display(), "Created directory");
        }
        Ok(())
    }

    fn ensure_dir_exists_as_user(&self, path: &Path) -> Result<()> {
        let missing: Vec<&Path> = path
            .ancestors()
            .take_while(|p| !p.as_os_str().is_empty() && !p.is_dir())
            .collect();
        for dir in missing.into_iter().rev() {
            match fs::create_dir(dir) {
                Ok(()) => {}
                Err(e) if e.kind() == std::io::ErrorKind::AlreadyExists && dir.is_dir() => continue,
                Err(e) => return Err(e.into()),
            }
            self.give_to_owner(dir)?;
            tracing::debug!(path = %dir.display(), owner = %self.owner.name, "Created directory");
        }
        Ok(())
    }

    fn unlink(&self, path: &Path) -> Result<()> {
        // `symlink_metadata` so dangling links are removed too.
        if path.symlink_metadata().is_ok() {
            fs::remove_file(path)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::os::unix::fs::MetadataExt;

    fn local() -> LocalFilesystem {
        LocalFilesystem::new(Account::current().unwrap())
    }

    #[test]
    fn put_and_get() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("a.conf");
        let files = local();

        assert!(!files.exists(&path));
        files.put(&path, "one\n").unwrap();
        files.put(&path, "two\n").unwrap();
        assert!(files.exists(&path));
        assert_eq!(files.get(&path).unwrap(), "two\n");
    }

    #[test]
    fn as_user_writes_are_owned_by_user() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("owned.conf");
        let account = Account::current().unwrap();
        let files = LocalFilesystem::new(account.clone());

        files.put_as_user(&path, "x").unwrap();
        let meta = fs::metadata(&path).unwrap();
        assert_eq!(meta.uid(), account.uid);
        assert_eq!(meta.gid(), account.gid);
    }

    #[test]
    fn append_creates_then_appends() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("main.conf");
        let files = local();

        files.append_as_user(&path, "a\n").unwrap();
        files.append_as_user(&path, "b\n").unwrap();
        assert_eq!(files.get(&path).unwrap(), "a\nb\n");
    }

    #[test]
    fn copy_as_user_copies_content() {
        let dir = tempfile::tempdir().unwrap();
        let from = dir.path().join("from");
        let to = dir.path().join("to");
        fs::write(&from, "template\n").unwrap();

        local().copy_as_user(&from, &to).unwrap();
        assert_eq!(fs::read_to_string(&to).unwrap(), "template\n");
    }

    #[test]
    fn copy_missing_source_fails() {
        let dir = tempfile::tempdir().unwrap();
        let err = local()
            .copy_as_user(&dir.path().join("nope"), &dir.path().join("to"))
            .unwrap_err();
        assert!(matches!(err, crate::DnsError::Io(ref e) if e.kind() == std::io::ErrorKind::NotFound));
    }

    #[test]
    fn ensure_dir_exists_is_idempotent() {
        let dir = tempfile::tempdir().unwrap();
        let nested = dir.path().join("a/b/c");
        let files = local();

        files.ensure_dir_exists(&nested).unwrap();
        files.ensure_dir_exists(&nested).unwrap();
        assert!(nested.is_dir());
    }

    #[test]
    fn ensure_dir_as_user_owns_every_created_level() {
        let dir = tempfile::tempdir().unwrap();
        let account = Account::current().unwrap();
        let files = LocalFilesystem::new(account.clone());
        let nested = dir.path().join("home/.valet");

        files.ensure_dir_exists_as_user(&nested).unwrap();
        files.ensure_dir_exists_as_user(&nested).unwrap();

        for created in [dir.path().join("home"), nested] {
            let meta = fs::metadata(&created).unwrap();
            assert!(meta.is_dir());
            assert_eq!(meta.uid(), account.uid);
            assert_eq!(meta.gid(), account.gid);
        }
    }

    #[test]
    #[ignore = "requires root to chown to another user"]
    fn ensure_dir_as_user_hands_dirs_to_other_user() {
        let dir = tempfile::tempdir().unwrap();
        let nobody = Account::lookup("nobody").unwrap();
        let nested = dir.path().join("home/.valet");

        LocalFilesystem::new(nobody.clone())
            .ensure_dir_exists_as_user(&nested)
            .unwrap();
        assert_eq!(fs::metadata(&nested).unwrap().uid(), nobody.uid);
    }

    #[test]
    fn unlink_missing_is_noop() {
        let dir = tempfile::tempdir().unwrap();
        local().unlink(&dir.path().join("missing")).unwrap();
    }

    #[test]
    fn unlink_removes_dangling_symlink() {
        let dir = tempfile::tempdir().unwrap();
        let link = dir.path().join("link");
        std::os::unix::fs::symlink(dir.path().join("target"), &link).unwrap();

        local().unlink(&link).unwrap();
        assert!(link.symlink_metadata().is_err());
    }
}
