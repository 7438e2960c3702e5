//! `pipe-pane` tee file: append-mode copy of PTY output to a path, guarded
//! by its own mutex per the concurrency model (mutated only by `pipe_pane`
//! and the output pump).

use std::fs::{File, OpenOptions};
use std::io::Write;
use std::path::PathBuf;
use std::sync::Mutex;

use crate::error::{DaemonError, Result};

#[derive(Default)]
pub struct Tee(Mutex<Option<File>>);

impl Tee {
    pub fn new() -> Self {
        Tee(Mutex::new(None))
    }

    /// Apply a `pipe_pane` request. An empty/whitespace-only command closes
    /// any existing tee. Anything else must parse as `cat >> PATH`
    /// (optionally quoted); anything else is rejected.
    pub fn set(&self, shell_cmd: &str) -> Result<()> {
        let target = parse_cat_append(shell_cmd)?;
        let mut guard = self.0.lock().expect("tee mutex poisoned");
        *guard = None;
        if let Some(path) = target {
            if let Some(parent) = path.parent() {
                if !parent.as_os_str().is_empty() {
                    std::fs::create_dir_all(parent).map_err(DaemonError::system)?;
                }
            }
            let file = OpenOptions::new()
                .create(true)
                .append(true)
                .open(&path)
                .map_err(DaemonError::system)?;
            *guard = Some(file);
        }
        Ok(())
    }

    pub fn write(&self, bytes: &[u8]) {
        let mut guard = self.0.lock().expect("tee mutex poisoned");
        if let Some(file) = guard.as_mut() {
            let _ = file.write_all(bytes);
        }
    }

    pub fn close(&self) {
        *self.0.lock().expect("tee mutex poisoned") = None;
    }
}

/// Parse the only pipe-pane shape this daemon supports: `cat >> PATH`,
/// PATH optionally single- or double-quoted. An empty command disables the
/// tee (`Ok(None)`).
fn parse_cat_append(cmd: &str) -> Result<Option<PathBuf>> {
    let trimmed = cmd.trim();
    if trimmed.is_empty() {
        return Ok(None);
    }
    let rest = trimmed
        .strip_prefix("cat >>")
        .ok_or_else(|| DaemonError::ActionRejected(format!("unsupported pipe-pane command: {}", cmd)))?;
    let path_part = rest.trim();
    if path_part.is_empty() {
        return Err(DaemonError::ActionRejected("pipe-pane: missing path".into()));
    }
    let unquoted = if path_part.len() >= 2
        && ((path_part.starts_with('"') && path_part.ends_with('"'))
            || (path_part.starts_with('\'') && path_part.ends_with('\'')))
    {
        &path_part[1..path_part.len() - 1]
    } else {
        path_part
    };
    if unquoted.is_empty() {
        return Err(DaemonError::ActionRejected("pipe-pane: empty path".into()));
    }
    Ok(Some(PathBuf::from(unquoted)))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_command_disables() {
        assert_eq!(parse_cat_append("").unwrap(), None);
        assert_eq!(parse_cat_append("   ").unwrap(), None);
    }

    #[test]
    fn plain_path_parses() {
        assert_eq!(parse_cat_append("cat >> /tmp/out.log").unwrap(), Some(PathBuf::from("/tmp/out.log")));
    }

    #[test]
    fn quoted_path_with_spaces_parses() {
        assert_eq!(
            parse_cat_append("cat >> \"/tmp/my log.txt\"").unwrap(),
            Some(PathBuf::from("/tmp/my log.txt"))
        );
        assert_eq!(
            parse_cat_append("cat >> '/tmp/my log.txt'").unwrap(),
            Some(PathBuf::from("/tmp/my log.txt"))
        );
    }

    #[test]
    fn unsupported_shape_is_rejected() {
        assert!(parse_cat_append("rm -rf /").is_err());
        assert!(parse_cat_append("cat >> a >> b").is_ok()); // path is literally "a >> b"
    }

    #[test]
    fn write_and_close_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("tee.log");
        let tee = Tee::new();
        tee.set(&format!("cat >> {}", path.display())).unwrap();
        tee.write(b"hello\n");
        tee.close();
        let contents = std::fs::read_to_string(&path).unwrap();
        assert_eq!(contents, "hello\n");
    }
}
