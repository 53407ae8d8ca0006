//! OS user accounts, resolved through the system password database.

use crate::error::{DnsError, Result};
use std::ffi::{CStr, CString, OsStr};
use std::mem::MaybeUninit;
use std::os::unix::ffi::OsStrExt;
use std::path::PathBuf;

/// Upper bound for the `getpw*_r` scratch buffer.
const MAX_PASSWD_BUF: usize = 1 << 20;

/// A resolved user: the identity commands and files are switched to when
/// something runs "as user".
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Account {
    /// Login name.
    pub name: String,
    /// Numeric user id.
    pub uid: libc::uid_t,
    /// Primary group id.
    pub gid: libc::gid_t,
    /// Home directory from the password database.
    pub home: PathBuf,
}

impl Account {
    /// Looks up `name` with `getpwnam_r`.
    ///
    /// # Errors
    ///
    /// Returns [`DnsError::UnknownUser`] if no such user exists, or
    /// [`DnsError::Io`] if the lookup itself fails.
    pub fn lookup(name: &str) -> Result<Self> {
        let unknown = || DnsError::UnknownUser {
            name: name.to_string(),
        };
        let c_name = CString::new(name).map_err(|_| unknown())?;

        // SAFETY: all pointers are valid for the duration of the call and
        // `len` matches the buffer length.
        fetch_passwd(|pwd, buf, len, result| unsafe {
            libc::getpwnam_r(c_name.as_ptr(), pwd, buf, len, result)
        })?
        .ok_or_else(unknown)
    }

    /// Resolves the effective user of this process.
    ///
    /// # Errors
    ///
    /// Returns [`DnsError::UnknownUser`] if the effective uid has no
    /// password entry.
    pub fn current() -> Result<Self> {
        let uid = effective_uid();

        // SAFETY: see `lookup`.
        fetch_passwd(|pwd, buf, len, result| unsafe {
            libc::getpwuid_r(uid, pwd, buf, len, result)
        })?
        .ok_or_else(|| DnsError::UnknownUser {
            name: uid.to_string(),
        })
    }

    /// Returns `true` if this account is the effective user of this process,
    /// so no identity switch is needed to act as it.
    #[must_use]
    pub fn is_effective_user(&self) -> bool {
        self.uid == effective_uid()
    }
}

fn effective_uid() -> libc::uid_t {
    // SAFETY: `geteuid` has no preconditions and cannot fail.
    unsafe { libc::geteuid() }
}

/// Runs a reentrant `getpw*_r` call, growing the scratch buffer on `ERANGE`.
///
/// Returns `Ok(None)` when the entry does not exist.
fn fetch_passwd<F>(mut call: F) -> Result<Option<Account>>
where
    F: FnMut(
        *mut libc::passwd,
        *mut libc::c_char,
        libc::size_t,
        *mut *mut libc::passwd,
    ) -> libc::c_int,
{
    let mut buf_len = 1024;
    loop {
        let mut pwd = MaybeUninit::<libc::passwd>::uninit();
        let mut buf: Vec<libc::c_char> = vec![0; buf_len];
        let mut result: *mut libc::passwd = std::ptr::null_mut();

        let rc = call(pwd.as_mut_ptr(), buf.as_mut_ptr(), buf.len(), &mut result);
        if rc == libc::ERANGE && buf_len < MAX_PASSWD_BUF {
            buf_len *= 2;
            continue;
        }
        // Several platforms report "no such entry" as an errno instead of a
        // null result.
        if matches!(rc, libc::ENOENT | libc::ESRCH | libc::EBADF | libc::EPERM) {
            return Ok(None);
        }
        if rc != 0 {
            return Err(std::io::Error::from_raw_os_error(rc).into());
        }
        if result.is_null() {
            return Ok(None);
        }

        // SAFETY: a non-null `result` means `pwd` was initialized and its
        // string fields point into `buf`, which is still alive.
        let pwd = unsafe { pwd.assume_init() };
        let (name, home) = unsafe {
            (
                CStr::from_ptr(pwd.pw_name).to_string_lossy().into_owned(),
                PathBuf::from(OsStr::from_bytes(CStr::from_ptr(pwd.pw_dir).to_bytes())),
            )
        };
        return Ok(Some(Account {
            name,
            uid: pwd.pw_uid,
            gid: pwd.pw_gid,
            home,
        }));
    }
}
