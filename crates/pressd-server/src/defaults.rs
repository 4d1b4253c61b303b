// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Per-user defaults for the port, spool directory and log file.

use std::path::{Path, PathBuf};

use pressd_core::{PressdError, Result};

/// Base of the automatically chosen port.
const BASE_PORT: u16 = 8000;

/// Effective uid of this process.
pub fn current_uid() -> u32 {
    // SAFETY: getuid(2) has no failure modes.
    unsafe { libc::getuid() }
}

/// `8000 + uid % 1000`, so users on one host do not collide.
pub fn default_port() -> u16 {
    BASE_PORT + (current_uid() % 1000) as u16
}

/// `$TMPDIR`, or `/tmp`.
pub fn temp_dir() -> PathBuf {
    std::env::var_os("TMPDIR")
        .filter(|v| !v.is_empty())
        .map(PathBuf::from)
        .unwrap_or_else(|| PathBuf::from("/tmp"))
}

/// `$TMPDIR/pressd<uid>.d`
pub fn default_spool_dir() -> PathBuf {
    temp_dir().join(format!("pressd{}.d", current_uid()))
}

/// `$TMPDIR/pressd<uid>.log`
pub fn default_log_path() -> PathBuf {
    temp_dir().join(format!("pressd{}.log", current_uid()))
}

/// Create the spool directory with mode 0700 if it does not exist yet.
///
/// An existing directory is accepted as is; anything else in the way is a
/// configuration error.
pub fn ensure_spool_dir(path: &Path) -> Result<()> {
    let mut builder = std::fs::DirBuilder::new();
    #[cfg(unix)]
    {
        use std::os::unix::fs::DirBuilderExt;
        builder.mode(0o700);
    }

    match builder.create(path) {
        Ok(()) => Ok(()),
        Err(e) if e.kind() == std::io::ErrorKind::AlreadyExists && path.is_dir() => Ok(()),
        Err(e) => Err(PressdError::Configuration(format!(
            "unable to create spool directory '{}': {e}",
            path.display()
        ))),
    }
}

/// The host name from gethostname(2), or `"localhost"`.
pub fn system_hostname() -> String {
    let mut buf = [0u8; 256];
    // SAFETY: the buffer is valid for its full length and NUL-terminated
    // below regardless of what the call writes.
    let rc = unsafe { libc::gethostname(buf.as_mut_ptr().cast(), buf.len() - 1) };
    if rc != 0 {
        return "localhost".into();
    }
    let len = buf.iter().position(|&b| b == 0).unwrap_or(buf.len());
    match std::str::from_utf8(&buf[..len]) {
        Ok(name) if !name.is_empty() => name.to_string(),
        _ => "localhost".into(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_port_is_in_the_per_user_range() {
        let port = default_port();
        assert!((8000..9000).contains(&port));
        assert_eq!(port, 8000 + (current_uid() % 1000) as u16);
    }

    #[test]
    fn spool_and_log_names_carry_the_uid() {
        let uid = current_uid();
        assert!(
            default_spool_dir()
                .to_string_lossy()
                .ends_with(&format!("pressd{uid}.d"))
        );
        assert!(
            default_log_path()
                .to_string_lossy()
                .ends_with(&format!("pressd{uid}.log"))
        );
    }

    #[test]
    fn spool_dir_is_private_and_reusable() {
        let tmp = tempfile::tempdir().unwrap();
        let spool = tmp.path().join("spool");

        ensure_spool_dir(&spool).unwrap();
        ensure_spool_dir(&spool).unwrap();

        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            let mode = std::fs::metadata(&spool).unwrap().permissions().mode();
            assert_eq!(mode & 0o077, 0);
        }
    }

    #[test]
    fn spool_dir_blocked_by_file_is_a_configuration_error() {
        let tmp = tempfile::tempdir().unwrap();
        let blocker = tmp.path().join("spool");
        std::fs::write(&blocker, b"not a directory").unwrap();

        let err = ensure_spool_dir(&blocker).unwrap_err();
        assert!(matches!(err, PressdError::Configuration(_)));
    }

    #[test]
    fn spool_dir_with_missing_parent_fails() {
        let tmp = tempfile::tempdir().unwrap();
        let nested = tmp.path().join("missing").join("spool");
        assert!(ensure_spool_dir(&nested).is_err());
    }

    #[test]
    fn hostname_is_never_empty() {
        assert!(!system_hostname().is_empty());
    }
}
